use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Normalize social-media exports and summarize post activity",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that an export carries enough recognizable structure
    Validate(ValidateArgs),
    /// Write the cleaned canonical table as CSV
    Standardize(StandardizeArgs),
    /// Compute overview, growth, correlation and trend summaries
    Analyze(AnalyzeArgs),
    /// Print the built-in alias dictionary as YAML
    Dictionary(DictionaryArgs),
}

/// Options shared by every command that reads an export.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input export file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Field delimiter (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Treat the first row as data; columns become field_1..N
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// YAML alias dictionary replacing the built-in one
    #[arg(long)]
    pub dictionary: Option<PathBuf>,
    /// Maximum number of data rows to read (0 reads everything)
    #[arg(long = "max-rows", default_value_t = 0)]
    pub max_rows: usize,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Print the validation report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StandardizeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output CSV file (stdout when omitted or `-`)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output delimiter (defaults to ',')
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Prompt,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Platform used for correlation columns (the table's modal platform by default)
    #[arg(long)]
    pub platform: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Measure growth between the earliest and latest posts instead of file order
    #[arg(long = "chronological-growth")]
    pub chronological_growth: bool,
    /// Combine duplicate metric columns by averaging instead of summing
    #[arg(long = "average-duplicates")]
    pub average_duplicates: bool,
}

#[derive(Debug, Args)]
pub struct DictionaryArgs {
    /// Destination YAML file (stdout when omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
