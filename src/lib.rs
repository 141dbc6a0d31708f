pub mod analytics;
pub mod cleaner;
pub mod cli;
pub mod data;
pub mod dictionary;
pub mod error;
pub mod io_utils;
pub mod mapper;
pub mod pipeline;
pub mod platform;
pub mod raw;
pub mod report;
pub mod result;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    analytics::{AnalysisOptions, AnalyticsEngine, GrowthOrder},
    cli::{
        AnalyzeArgs, Cli, Commands, DictionaryArgs, InputArgs, OutputFormat, StandardizeArgs,
        ValidateArgs,
    },
    dictionary::{CanonicalField, FieldDictionary},
    mapper::{MapperOptions, NumericMergePolicy, SchemaMapper},
    raw::LoadOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("social_insight", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::Standardize(args) => handle_standardize(&args),
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Dictionary(args) => handle_dictionary(&args),
    }
}

fn load_options(args: &InputArgs) -> Result<LoadOptions> {
    let mut options = LoadOptions::for_path(&args.input, args.delimiter);
    options.encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    options.has_headers = !args.no_header;
    options.max_rows = args.max_rows;
    info!(
        "Reading '{}' with delimiter '{}' and encoding {}",
        args.input.display(),
        printable_delimiter(options.delimiter),
        options.encoding.name()
    );
    Ok(options)
}

fn build_mapper(args: &InputArgs, numeric_merge: NumericMergePolicy) -> Result<SchemaMapper> {
    let dictionary = match &args.dictionary {
        Some(path) => FieldDictionary::load(path)
            .with_context(|| format!("Loading dictionary from {path:?}"))?,
        None => FieldDictionary::default(),
    };
    let options = MapperOptions {
        numeric_merge,
        ..MapperOptions::default()
    };
    Ok(SchemaMapper::new(dictionary, options))
}

fn handle_validate(args: &ValidateArgs) -> Result<()> {
    let load = load_options(&args.input)?;
    let mapper = build_mapper(&args.input, NumericMergePolicy::default())?;
    let raw = raw::load_raw_table(&args.input.input, &load)?;
    let report = mapper.validate(&raw);
    if args.json {
        let json = serde_json::to_string(&report).context("Serializing validation report")?;
        println!("{json}");
    } else if report.valid {
        let names = report
            .found_fields
            .iter()
            .map(CanonicalField::as_str)
            .collect::<Vec<_>>();
        println!("valid: {}", names.join(", "));
    }
    match report.error {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn handle_standardize(args: &StandardizeArgs) -> Result<()> {
    let load = load_options(&args.input)?;
    let mapper = build_mapper(&args.input, NumericMergePolicy::default())?;
    let table = pipeline::import_file(&args.input.input, &load, &mapper)?;
    let delimiter = args.output_delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    let mut writer = io_utils::open_csv_writer(args.output.as_deref(), delimiter)?;
    writer
        .write_record(CanonicalField::ALL.iter().map(CanonicalField::as_str))
        .context("Writing canonical header")?;
    for (idx, record) in table.records().iter().enumerate() {
        writer
            .write_record(record.to_fields())
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    writer.flush().context("Flushing standardized output")?;
    info!(
        "Standardized {} row(s); dropped {}",
        table.len(),
        table.dropped_rows()
    );
    Ok(())
}

fn handle_analyze(args: &AnalyzeArgs) -> Result<()> {
    let load = load_options(&args.input)?;
    let merge = if args.average_duplicates {
        NumericMergePolicy::Average
    } else {
        NumericMergePolicy::Sum
    };
    let mapper = build_mapper(&args.input, merge)?;
    let table = pipeline::import_file(&args.input.input, &load, &mapper)?;
    let options = AnalysisOptions {
        platform_hint: args.platform.clone(),
        growth_order: if args.chronological_growth {
            GrowthOrder::Chronological
        } else {
            GrowthOrder::FileOrder
        },
    };
    debug!("Analysis options: {options:?}");
    let result = AnalyticsEngine::new(options).analyze(&table);

    let rendered = match args.format {
        OutputFormat::Text => report::render_result(&result),
        OutputFormat::Json => format!("{}\n", result.to_json_pretty()?),
        OutputFormat::Prompt => {
            let platform = args
                .platform
                .as_deref()
                .and_then(platform::Platform::resolve)
                .map(|p| p.label().to_string())
                .or_else(|| platform::modal_platform(&table).map(str::to_string))
                .unwrap_or_else(|| mapper::DEFAULT_CATEGORY_LABEL.to_string());
            result.to_prompt_context(&platform)
        }
    };
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("Writing analysis output")?;
    Ok(())
}

fn handle_dictionary(args: &DictionaryArgs) -> Result<()> {
    let dictionary = FieldDictionary::default();
    match &args.output {
        Some(path) if !io_utils::is_dash(path) => {
            dictionary
                .save(path)
                .with_context(|| format!("Writing dictionary to {path:?}"))?;
            info!("Default dictionary written to {path:?}");
        }
        _ => print!("{}", dictionary.to_yaml_string()?),
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
