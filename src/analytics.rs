//! Descriptive analytics over a cleaned table.
//!
//! Every block is built independently from the [`CleanTable`]. Fields that
//! were never observed in the source omit their keys instead of reporting
//! zeros, and every number passes through [`round2`] before insertion.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use itertools::{Itertools, MinMaxResult};
use log::{debug, info};

use crate::{
    cleaner::{CleanTable, PostRecord},
    data::Cell,
    dictionary::CanonicalField,
    mapper::DEFAULT_CATEGORY_LABEL,
    platform::{self, Platform},
    result::{AnalysisResult, Block},
};

/// Relative weekly slope at or below which a series is reported as flat.
pub const FLAT_SLOPE_RATIO: f64 = 0.01;

pub const TREND_RISING: &str = "rising";
pub const TREND_FLAT: &str = "flat";
pub const TREND_FALLING: &str = "falling";

/// Which rows count as "first" and "last" for growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowthOrder {
    #[default]
    FileOrder,
    Chronological,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Platform name or alias; the table's modal platform is used when unset.
    pub platform_hint: Option<String>,
    pub growth_order: GrowthOrder,
}

/// Display label of a metric field in result keys.
pub const fn metric_label(field: CanonicalField) -> &'static str {
    match field {
        CanonicalField::Engagement => "互动量",
        CanonicalField::Reach => "曝光量",
        CanonicalField::Conversion => "转化率",
        CanonicalField::Followers => "粉丝数",
        _ => "",
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    options: AnalysisOptions,
}

impl AnalyticsEngine {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    pub fn analyze(&self, table: &CleanTable) -> AnalysisResult {
        let platform = platform::resolve_for_table(self.options.platform_hint.as_deref(), table);
        let result = AnalysisResult {
            overview: overview(table),
            growth: growth(table, self.options.growth_order),
            correlation: platform
                .map(|platform| correlation(table, platform))
                .unwrap_or_default(),
            trends: trends(table),
        };
        info!(
            "Analyzed {} row(s){}: {} overview, {} growth, {} correlation, {} trend value(s)",
            table.len(),
            platform
                .map(|p| format!(" for {p}"))
                .unwrap_or_default(),
            result.overview.len(),
            result.growth.len(),
            result.correlation.len(),
            result.trends.len()
        );
        result
    }
}

pub fn analyze(table: &CleanTable, options: &AnalysisOptions) -> AnalysisResult {
    AnalyticsEngine::new(options.clone()).analyze(table)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation; zero below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let Some(mean) = mean(values) else {
        return 0.0;
    };
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squares / (values.len() as f64 - 1.0)).max(0.0).sqrt()
}

/// Pearson correlation, `None` for fewer than two pairs or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;
    let (mut covariance, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let r = covariance / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

/// Least-squares slope of `ys` against `xs`; zero when undefined.
pub fn least_squares_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let (Some(mean_x), Some(mean_y)) = (mean(xs), mean(ys)) else {
        return 0.0;
    };
    let numerator: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let denominator: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn observed_metrics(table: &CleanTable) -> impl Iterator<Item = CanonicalField> + '_ {
    CanonicalField::METRICS
        .into_iter()
        .filter(|field| table.is_observed(*field))
}

fn overview(table: &CleanTable) -> Block {
    let mut block = Block::new();
    block.insert_number("数据条数", table.len() as f64);
    for field in observed_metrics(table) {
        let label = metric_label(field);
        let values = table.metric_series(field);
        let (min, max) = match values.iter().copied().minmax_by(f64::total_cmp) {
            MinMaxResult::NoElements => continue,
            MinMaxResult::OneElement(value) => (value, value),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        if let Some(mean) = mean(&values) {
            block.insert_number(format!("平均{label}"), round2(mean));
        }
        block.insert_number(format!("最大{label}"), round2(max));
        block.insert_number(format!("最小{label}"), round2(min));
        block.insert_number(format!("{label}标准差"), round2(sample_std(&values)));
    }
    block
}

fn growth(table: &CleanTable, order: GrowthOrder) -> Block {
    const GROWTH_FIELDS: [(CanonicalField, &str); 2] = [
        (CanonicalField::Followers, "粉丝"),
        (CanonicalField::Engagement, "互动量"),
    ];

    let mut block = Block::new();
    let records: Vec<&PostRecord> = match order {
        GrowthOrder::FileOrder => table.records().iter().collect(),
        GrowthOrder::Chronological => table
            .records()
            .iter()
            .sorted_by_key(|record| record.date)
            .collect(),
    };
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return block;
    };
    for (field, label) in GROWTH_FIELDS {
        if !table.is_observed(field) {
            continue;
        }
        let (Some(start), Some(end)) = (first.metric(field), last.metric(field)) else {
            continue;
        };
        let delta = end - start;
        let rate = if start > 0.0 { delta / start * 100.0 } else { 0.0 };
        block.insert_number(format!("{label}增长数"), round2(delta));
        block.insert_number(format!("{label}增长率(%)"), round2(rate));
    }
    block
}

/// Numeric series for a platform-specific column: an auxiliary column whose
/// name contains `name`, else a metric field renamed from exactly one such
/// source column.
fn correlation_series(table: &CleanTable, name: &str) -> Option<Vec<f64>> {
    if let Some(column) = table
        .auxiliary()
        .iter()
        .find(|column| column.name.contains(name))
    {
        return Some(column.values.iter().map(Cell::metric_or_zero).collect());
    }
    CanonicalField::METRICS
        .into_iter()
        .filter(|field| *field != CanonicalField::Engagement && table.is_observed(*field))
        .find(|field| matches!(table.lineage(*field), [source] if source.contains(name)))
        .map(|field| table.metric_series(field))
}

fn correlation(table: &CleanTable, platform: Platform) -> Block {
    let mut block = Block::new();
    if !table.is_observed(CanonicalField::Engagement) || table.len() < 2 {
        return block;
    }
    let engagement = table.metric_series(CanonicalField::Engagement);
    for name in platform.correlation_columns() {
        let Some(series) = correlation_series(table, name) else {
            debug!("No '{name}' column for {platform}; skipping correlation");
            continue;
        };
        match pearson(&series, &engagement) {
            Some(r) => {
                block.insert_number(format!("{name}与互动量相关性"), round2(r));
            }
            None => debug!("Correlation between '{name}' and engagement is undefined"),
        }
    }
    block
}

/// Week label under the W-MON convention: the Monday on or after `date`.
pub fn week_ending_monday(date: NaiveDate) -> NaiveDate {
    let offset = (7 - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(i64::from(offset))
}

fn trend_label(weekly_means: &[(NaiveDate, f64)]) -> &'static str {
    if weekly_means.len() < 2 {
        return TREND_FLAT;
    }
    let Some(first_week) = weekly_means.first().map(|(week, _)| *week) else {
        return TREND_FLAT;
    };
    let xs: Vec<f64> = weekly_means
        .iter()
        .map(|(week, _)| (*week - first_week).num_days() as f64 / 7.0)
        .collect();
    let ys: Vec<f64> = weekly_means.iter().map(|(_, value)| *value).collect();
    let slope = least_squares_slope(&xs, &ys);
    let level = mean(&ys).unwrap_or(0.0);
    let ratio = if level == 0.0 {
        if slope == 0.0 { 0.0 } else { slope.signum() }
    } else {
        slope / level.abs()
    };
    if ratio.abs() <= FLAT_SLOPE_RATIO {
        TREND_FLAT
    } else if ratio > 0.0 {
        TREND_RISING
    } else {
        TREND_FALLING
    }
}

fn weekly_means(table: &CleanTable, field: CanonicalField) -> Vec<(NaiveDate, f64)> {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for record in table.records() {
        if let Some(value) = record.metric(field) {
            let slot = buckets
                .entry(week_ending_monday(record.date.date()))
                .or_default();
            slot.0 += value;
            slot.1 += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(week, (sum, count))| (week, sum / count as f64))
        .collect()
}

fn dominant_content_type(table: &CleanTable) -> Option<&str> {
    let values = move || {
        table
            .records()
            .iter()
            .map(|record| record.content_type.as_str())
            .filter(|value| !value.is_empty() && *value != DEFAULT_CATEGORY_LABEL)
    };
    let counts = values().counts();
    let best = counts.values().copied().max()?;
    values().find(|value| counts.get(value) == Some(&best))
}

fn content_type_trend(table: &CleanTable, dominant: &str) -> &'static str {
    let mut weeks: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for record in table.records() {
        let slot = weeks.entry(week_ending_monday(record.date.date())).or_default();
        if record.content_type == dominant {
            *slot += 1;
        }
    }
    let counts: Vec<f64> = weeks.values().map(|count| *count as f64).collect();
    match (counts.last(), mean(&counts)) {
        (Some(last), Some(average)) if *last > average => TREND_RISING,
        _ => TREND_FLAT,
    }
}

fn most_active_window(table: &CleanTable) -> Option<String> {
    let mut hours = [0usize; 24];
    for record in table.records().iter().filter(|record| record.has_time) {
        hours[record.date.hour() as usize] += 1;
    }
    let best = hours.iter().copied().max().filter(|count| *count > 0)?;
    let hour = hours.iter().position(|count| *count == best)?;
    Some(format!("{:02}:00-{:02}:00", hour, (hour + 2) % 24))
}

fn daily_volume(table: &CleanTable) -> Option<(f64, f64)> {
    let days = table
        .records()
        .iter()
        .map(|record| record.date.date())
        .counts();
    if days.is_empty() {
        return None;
    }
    let counts: Vec<f64> = days
        .into_iter()
        .sorted_by_key(|(day, _)| *day)
        .map(|(_, count)| count as f64)
        .collect();
    let xs: Vec<f64> = (0..counts.len()).map(|idx| idx as f64).collect();
    let average = mean(&counts)?;
    Some((average, least_squares_slope(&xs, &counts)))
}

fn trends(table: &CleanTable) -> Block {
    let mut block = Block::new();
    let dated = table.is_observed(CanonicalField::Date);

    if dated {
        for field in [CanonicalField::Followers, CanonicalField::Engagement] {
            if !table.is_observed(field) {
                continue;
            }
            let label = metric_label(field);
            let weekly = weekly_means(table, field);
            for (week, value) in &weekly {
                block.insert_number(
                    format!("{label}周均值 {}", week.format("%Y-%m-%d")),
                    round2(*value),
                );
            }
            block.insert_text(format!("{label}周趋势"), trend_label(&weekly));
        }
    }

    if let Some(dominant) = dominant_content_type(table) {
        block.insert_text("主要内容类型", dominant);
        if dated {
            block.insert_text("主要内容类型趋势", content_type_trend(table, dominant));
        }
    }

    if dated {
        if let Some(window) = most_active_window(table) {
            block.insert_text("最活跃时段", window);
        }
        if let Some((average, slope)) = daily_volume(table) {
            block.insert_number("日均发布量", round2(average));
            block.insert_number("发布量趋势斜率", round2(slope));
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cleaner::clean, mapper::SchemaMapper, raw::RawTable};

    fn table(headers: &[&str], rows: &[&[&str]]) -> CleanTable {
        let raw = RawTable::from_rows(
            headers.iter().copied(),
            rows.iter()
                .map(|row| row.iter().map(|v| Cell::from(*v)).collect())
                .collect::<Vec<Vec<Cell>>>(),
        );
        clean(SchemaMapper::default().standardize(raw))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn statistics_helpers_handle_degenerate_input() {
        assert_eq!(sample_std(&[5.0]), 0.0);
        assert_eq!(sample_std(&[0.0, 0.0, 0.0]), 0.0);
        assert!((sample_std(&[1.0, 2.0, 3.0, 4.0]) - 1.2909944).abs() < 1e-6);
        assert_eq!(pearson(&[1.0, 1.0], &[2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(least_squares_slope(&[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0]), 2.0);
        assert_eq!(least_squares_slope(&[0.0], &[1.0]), 0.0);
    }

    #[test]
    fn week_labels_end_on_monday() {
        assert_eq!(week_ending_monday(date(2024, 1, 1)), date(2024, 1, 1));
        assert_eq!(week_ending_monday(date(2024, 1, 2)), date(2024, 1, 8));
        assert_eq!(week_ending_monday(date(2024, 1, 7)), date(2024, 1, 8));
    }

    #[test]
    fn overview_reports_observed_metrics_only() {
        let table = table(
            &["date", "platform", "content", "likes"],
            &[
                &["2024-01-01", "微博", "a", "10"],
                &["2024-01-02", "微博", "b", "20"],
                &["2024-01-03", "微博", "c", "30"],
            ],
        );
        let block = overview(&table);
        assert_eq!(block.number("数据条数"), Some(3.0));
        assert_eq!(block.number("平均互动量"), Some(20.0));
        assert_eq!(block.number("最大互动量"), Some(30.0));
        assert_eq!(block.number("最小互动量"), Some(10.0));
        assert_eq!(block.number("互动量标准差"), Some(10.0));
        assert!(!block.contains("平均粉丝数"));
        assert!(!block.contains("平均曝光量"));
    }

    #[test]
    fn growth_uses_first_and_last_rows() {
        let table = table(
            &["date", "platform", "content", "fans", "likes"],
            &[
                &["2024-01-05", "微博", "a", "200", "0"],
                &["2024-01-01", "微博", "b", "100", "5"],
                &["2024-01-03", "微博", "c", "250", "8"],
            ],
        );
        let file_order = growth(&table, GrowthOrder::FileOrder);
        assert_eq!(file_order.number("粉丝增长数"), Some(50.0));
        assert_eq!(file_order.number("粉丝增长率(%)"), Some(25.0));
        assert_eq!(file_order.number("互动量增长数"), Some(8.0));
        assert_eq!(file_order.number("互动量增长率(%)"), Some(0.0));

        let chronological = growth(&table, GrowthOrder::Chronological);
        assert_eq!(chronological.number("粉丝增长数"), Some(100.0));
        assert_eq!(chronological.number("粉丝增长率(%)"), Some(100.0));
    }

    #[test]
    fn correlation_reads_auxiliary_and_renamed_columns() {
        let table = table(
            &["date", "platform", "content", "点赞量", "转发量", "评论量"],
            &[
                &["2024-01-01", "微博", "a", "1", "2", "1"],
                &["2024-01-02", "微博", "b", "2", "4", "1"],
                &["2024-01-03", "微博", "c", "3", "7", "1"],
            ],
        );
        let block = correlation(&table, Platform::Weibo);
        assert!(block.number("转发量与互动量相关性").unwrap() > 0.9);
        assert!(block.number("点赞量与互动量相关性").unwrap() > 0.9);
        // constant column has zero variance
        assert!(!block.contains("评论量与互动量相关性"));
    }

    #[test]
    fn trends_cover_weekly_content_and_activity() {
        let table = table(
            &["date", "platform", "content", "content_type", "likes", "fans"],
            &[
                &["2024-01-01 09:15:00", "抖音", "a", "视频", "10", "100"],
                &["2024-01-02 20:00:00", "抖音", "b", "图文", "20", "110"],
                &["2024-01-03 20:30:00", "抖音", "c", "视频", "30", "120"],
                &["2024-01-09 20:45:00", "抖音", "d", "视频", "40", "130"],
            ],
        );
        let block = trends(&table);
        assert_eq!(block.number("互动量周均值 2024-01-01"), Some(10.0));
        assert_eq!(block.number("互动量周均值 2024-01-08"), Some(25.0));
        assert_eq!(block.number("互动量周均值 2024-01-15"), Some(40.0));
        assert_eq!(block.text("互动量周趋势"), Some(TREND_RISING));
        assert_eq!(block.text("粉丝数周趋势"), Some(TREND_RISING));
        assert_eq!(block.text("主要内容类型"), Some("视频"));
        assert_eq!(block.text("最活跃时段"), Some("20:00-22:00"));
        assert_eq!(block.number("日均发布量"), Some(1.0));
        assert_eq!(block.number("发布量趋势斜率"), Some(0.0));
    }

    #[test]
    fn single_week_is_flat_and_date_only_has_no_active_window() {
        let table = table(
            &["date", "platform", "content", "likes"],
            &[&["2024-01-02", "微博", "a", "10"], &["2024-01-03", "微博", "b", "10"]],
        );
        let block = trends(&table);
        assert_eq!(block.text("互动量周趋势"), Some(TREND_FLAT));
        assert!(!block.contains("最活跃时段"));
        assert!(!block.contains("主要内容类型"));
        assert!(!block.contains("粉丝数周趋势"));
    }

    #[test]
    fn declining_weekly_series_is_falling() {
        let table = table(
            &["date", "platform", "content", "likes"],
            &[
                &["2024-01-01", "微博", "a", "40"],
                &["2024-01-03", "微博", "b", "30"],
                &["2024-01-09", "微博", "c", "10"],
            ],
        );
        let block = trends(&table);
        assert_eq!(block.number("互动量周均值 2024-01-01"), Some(40.0));
        assert_eq!(block.number("互动量周均值 2024-01-15"), Some(10.0));
        assert_eq!(block.text("互动量周趋势"), Some(TREND_FALLING));
    }

    #[test]
    fn late_evening_window_wraps_past_midnight() {
        let table = table(
            &["date", "platform", "content", "likes"],
            &[
                &["2024-01-01 23:10:00", "微博", "a", "1"],
                &["2024-01-02 09:00:00", "微博", "b", "2"],
                &["2024-01-02 23:40:00", "微博", "c", "3"],
            ],
        );
        let block = trends(&table);
        assert_eq!(block.text("最活跃时段"), Some("23:00-01:00"));
    }

    #[test]
    fn analyze_resolves_platform_from_table() {
        let table = table(
            &["date", "platform", "content", "点赞量", "弹幕量"],
            &[
                &["2024-01-01", "bilibili", "a", "1", "3"],
                &["2024-01-02", "bilibili", "b", "2", "5"],
                &["2024-01-03", "bilibili", "c", "4", "9"],
            ],
        );
        let result = analyze(&table, &AnalysisOptions::default());
        assert!(result.correlation.contains("弹幕量与互动量相关性"));

        let hinted = analyze(
            &table,
            &AnalysisOptions {
                platform_hint: Some("myspace".to_string()),
                ..AnalysisOptions::default()
            },
        );
        assert!(hinted.correlation.is_empty());
    }
}
