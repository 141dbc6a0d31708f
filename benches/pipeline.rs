use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use social_insight::analytics::{AnalysisOptions, AnalyticsEngine};
use social_insight::mapper::SchemaMapper;
use social_insight::pipeline;
use social_insight::raw::{LoadOptions, load_raw_table};
use tempfile::TempDir;

fn generate_posts(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("posts.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "发布时间,平台,内容类型,点赞数,评论数,转发量,阅读量,粉丝数,内容").expect("header");
    for i in 0..rows {
        let kind = match i % 3 {
            0 => "图文",
            1 => "视频",
            _ => "直播",
        };
        let day = (i % 28) + 1;
        let hour = i % 24;
        let date = if i % 97 == 0 {
            "unknown".to_string()
        } else {
            format!("2024-02-{day:02} {hour:02}:15:00")
        };
        writeln!(
            file,
            "{date},微博,{kind},{},{},{},{},{},post {i}",
            i % 50,
            i % 7,
            i % 11,
            1000 + i % 400,
            5000 + i
        )
        .expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_pipeline(c: &mut Criterion) {
    let (_dir, csv_path) = generate_posts(20_000);
    let load = LoadOptions::for_path(&csv_path, None);
    let mapper = SchemaMapper::default();

    c.bench_function("load_raw_table", |b| {
        b.iter(|| load_raw_table(&csv_path, &load).expect("load"))
    });

    let raw = load_raw_table(&csv_path, &load).expect("load");
    c.bench_function("import_table", |b| {
        b.iter_batched(
            || raw.clone(),
            |raw| pipeline::try_import(raw, &mapper).expect("import"),
            BatchSize::LargeInput,
        )
    });

    let table = pipeline::try_import(raw, &mapper).expect("import");
    let engine = AnalyticsEngine::new(AnalysisOptions::default());
    c.bench_function("analyze", |b| b.iter(|| engine.analyze(&table)));
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
