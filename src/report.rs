//! Terminal rendering of analysis results.

use std::{borrow::Cow, fmt::Write as _};

use unicode_width::UnicodeWidthStr;

use crate::result::AnalysisResult;

/// Renders each block as an aligned two-column table under its heading.
pub fn render_result(result: &AnalysisResult) -> String {
    let headers = ["指标".to_string(), "数值".to_string()];
    let mut output = String::new();
    for (idx, (heading, block)) in result.sections().into_iter().enumerate() {
        if idx > 0 {
            output.push('\n');
        }
        let _ = writeln!(output, "{heading}");
        if block.is_empty() {
            let _ = writeln!(output, "(无数据)");
            continue;
        }
        let rows = block
            .iter()
            .map(|(label, value)| vec![label.to_string(), value.to_string()])
            .collect::<Vec<_>>();
        output.push_str(&render_table(&headers, &rows));
    }
    output
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (value, width) in values.iter().zip(widths) {
        let sanitized = sanitize_cell(value);
        let padding = width.saturating_sub(display_width(&sanitized));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    let line = cells.join("  ");
    line.trim_end().to_string()
}

/// Terminal columns occupied by `value`; East Asian wide characters and
/// emoji take two, combining marks none.
pub fn display_width(value: &str) -> usize {
    UnicodeWidthStr::width(value)
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_characters_count_double() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("粉丝数"), 6);
        assert_eq!(display_width("B站"), 3);
        assert_eq!(display_width("🔥热门"), 6);
        assert_eq!(display_width("e\u{301}"), 1);
    }

    #[test]
    fn emoji_labels_keep_columns_aligned() {
        let rendered = render_table(
            &["指标".to_string(), "数值".to_string()],
            &[
                vec!["🔥".to_string(), "1".to_string()],
                vec!["ab".to_string(), "2".to_string()],
            ],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[2], "🔥    1");
        assert_eq!(lines[3], "ab    2");
    }

    #[test]
    fn table_columns_align_with_mixed_scripts() {
        let rendered = render_table(
            &["指标".to_string(), "数值".to_string()],
            &[
                vec!["数据条数".to_string(), "3".to_string()],
                vec!["x".to_string(), "12.5".to_string()],
            ],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "指标      数值");
        assert_eq!(lines[2], "数据条数  3");
        assert_eq!(lines[3], "x         12.5");
    }

    #[test]
    fn empty_blocks_are_marked() {
        let mut result = AnalysisResult::default();
        result.overview.insert_number("数据条数", 1.0);
        let rendered = render_result(&result);
        assert!(rendered.starts_with("基本统计\n指标"));
        assert!(rendered.contains("增长分析\n(无数据)\n"));
    }
}
