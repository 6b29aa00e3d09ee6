//! Report tests: grouping aggregated rows into comparison series and
//! rendering them through a chart sink.

use std::fs;
use std::path::Path;

use gemmsweep::analysis::{
    estimator, group_by_bench, AggregatedTable, BenchGroup, ChartSink, Dims, PlottersChart,
    ReportEmitter, RunAggregator,
};
use gemmsweep::error::plot_error;
use gemmsweep::BenchError;
use serde_json::json;

fn write_run(dir: &Path) {
    let files = [
        (
            "square_glare.json",
            json!({
                "bench_name": "sgemm_square",
                "implementation": "glare",
                "dim_strategy": {"Big": [1024, 256, 512]},
                "bench_config": {},
                "times": [[0.011], [0.0002], [0.0015]],
            }),
        ),
        (
            "square_mkl.json",
            json!({
                "bench_name": "sgemm_square",
                "implementation": "mkl",
                "dim_strategy": {"Big": [512, 256]},
                "bench_config": {},
                "times": [[0.0014], [0.00021]],
            }),
        ),
        (
            "tall_glare.json",
            json!({
                "bench_name": "sgemm_small_m",
                "implementation": "glare",
                "dim_strategy": {"SmallM": [4, 8], "Big": 2048},
                "bench_config": {},
                "times": [[0.003], [0.005]],
            }),
        ),
    ];
    for (name, record) in files {
        fs::write(dir.join(name), record.to_string()).unwrap();
    }
}

fn cube(size: u64) -> Dims {
    Dims {
        m: size,
        n: size,
        k: size,
    }
}

/// Remembers what it was asked to draw.
#[derive(Default)]
struct RecordingSink {
    rendered: Vec<BenchGroup>,
    fail_on: Option<String>,
}

impl ChartSink for RecordingSink {
    fn render(&mut self, group: &BenchGroup) -> gemmsweep::Result<()> {
        if self.fail_on.as_deref() == Some(group.bench_name.as_str()) {
            return Err(plot_error("backend unavailable"));
        }
        self.rendered.push(group.clone());
        Ok(())
    }
}

/// Points of a small-m benchmark share `m` and must keep their own rows.
#[test]
fn test_small_m_points_keep_separate_rows() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("small_m.json"),
        json!({
            "bench_name": "sgemm_small_m",
            "implementation": "glare",
            "dim_strategy": {"SmallM": 32, "Big": [512, 4096]},
            "bench_config": {},
            "times": [[0.001], [0.5]],
        })
        .to_string(),
    )
    .unwrap();
    let table = RunAggregator::aggregate(dir.path()).unwrap();

    let groups = group_by_bench(&table);
    let comparison = groups[0].comparison_table();
    let narrow = Dims { m: 32, n: 512, k: 512 };
    let wide = Dims { m: 32, n: 4096, k: 4096 };
    assert_eq!(comparison.sizes, vec![narrow, wide]);

    let fast = 2.0 * 32.0 * 512.0 * 512.0 / 0.001 / 1e9;
    let slow = 2.0 * 32.0 * 4096.0 * 4096.0 / 0.5 / 1e9;
    assert!((comparison.get(narrow, "glare").unwrap() - fast).abs() < 1e-9);
    assert!((comparison.get(wide, "glare").unwrap() - slow).abs() < 1e-9);

    let text = comparison.to_string();
    println!("{text}");
    assert_eq!(text.lines().count(), 4);
    assert!(text.contains("16.78") && text.contains("2.15"));
}

/// Two benchmarks give two groups, each series ascending in m.
#[test]
fn test_groups_per_bench_sorted_by_m() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    let table = RunAggregator::aggregate(dir.path()).unwrap();

    let mut groups = group_by_bench(&table);
    groups.sort_by(|a, b| a.bench_name.cmp(&b.bench_name));
    assert_eq!(groups.len(), 2);

    let small_m = &groups[0];
    assert_eq!(small_m.bench_name, "sgemm_small_m");
    assert_eq!(small_m.series.len(), 1);

    let square = &groups[1];
    assert_eq!(square.series.len(), 2);
    for series in &square.series {
        let sizes: Vec<u64> = series.points.iter().map(|p| p.m).collect();
        let mut sorted = sizes.clone();
        sorted.sort();
        assert_eq!(sizes, sorted, "{} not sorted", series.implementation);
    }

    let triples: Vec<(u64, f64, &str)> = square.triples().collect();
    assert_eq!(triples.len(), 5);
    assert!(triples.iter().all(|(_, gflops, _)| *gflops > 0.0));
}

#[test]
fn test_comparison_table_from_run() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    let table = RunAggregator::aggregate(dir.path()).unwrap();

    let square = group_by_bench(&table)
        .into_iter()
        .find(|g| g.bench_name == "sgemm_square")
        .unwrap();
    let comparison = square.comparison_table();
    assert_eq!(comparison.sizes, vec![cube(256), cube(512), cube(1024)]);
    assert!(comparison.get(cube(1024), "mkl").is_none());
    assert!(
        comparison.get(cube(512), "mkl").unwrap() > comparison.get(cube(512), "glare").unwrap()
    );

    let text = comparison.to_string();
    println!("{text}");
    assert_eq!(text.lines().count(), 5);
}

#[test]
fn test_emitter_renders_each_group_once() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    let table = RunAggregator::aggregate(dir.path()).unwrap();

    let mut emitter = ReportEmitter::new(RecordingSink::default());
    let groups = emitter.emit(&table).unwrap();
    let sink = emitter.into_sink();
    assert_eq!(groups.len(), 2);
    assert_eq!(sink.rendered, groups);
}

#[test]
fn test_emitter_propagates_sink_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    let table = RunAggregator::aggregate(dir.path()).unwrap();

    let mut emitter = ReportEmitter::new(RecordingSink {
        rendered: Vec::new(),
        fail_on: Some("sgemm_small_m".to_string()),
    });
    let err = emitter.emit(&table).unwrap_err();
    assert!(matches!(err, BenchError::PlotError { .. }));
}

#[test]
fn test_empty_table_renders_nothing() {
    let mut emitter = ReportEmitter::new(RecordingSink::default());
    let groups = emitter.emit(&AggregatedTable::default()).unwrap();
    assert!(groups.is_empty());
    assert!(emitter.sink().rendered.is_empty());
}

/// One PNG and one legend per benchmark, named after the benchmark and the run.
#[test]
fn test_plotters_chart_writes_one_png_per_bench() {
    let dir = tempfile::tempdir().unwrap();
    write_run(dir.path());
    let table = RunAggregator::aggregate(dir.path()).unwrap();

    let images = dir.path().join("benchmark_images").join("benchmark_run_3");
    let mut emitter =
        ReportEmitter::new(PlottersChart::new(&images).with_run_index(3).with_size(400, 300));
    emitter.emit(&table).unwrap();

    let mut names: Vec<String> = fs::read_dir(&images)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "sgemm_small_m_3.legend.txt",
            "sgemm_small_m_3.png",
            "sgemm_square_3.legend.txt",
            "sgemm_square_3.png",
        ]
    );
    let legend = fs::read_to_string(images.join("sgemm_square_3.legend.txt")).unwrap();
    assert!(legend.contains(" glare\n") && legend.contains(" mkl\n"));
    assert_eq!(emitter.sink().written().len(), 2);
}

/// Criterion estimates feed the same table and report path.
#[test]
fn test_estimates_feed_report() {
    let dir = tempfile::tempdir().unwrap();
    let group = dir.path().join("bbb");
    for (implementation, size, median_ns) in [
        ("f32-glar-gemm", 256, 2.0e5),
        ("f32-glar-gemm", 512, 1.5e6),
        ("f32-mkl-gemm", 256, 2.1e5),
    ] {
        let base = group.join(implementation).join(size.to_string()).join("base");
        fs::create_dir_all(&base).unwrap();
        fs::write(
            base.join("estimates.json"),
            json!({"median": {"point_estimate": median_ns}}).to_string(),
        )
        .unwrap();
    }

    let records = estimator::load_group(&group, &[]).unwrap();
    let mut table = AggregatedTable::default();
    table.extend_from(&group, records);
    assert_eq!(table.len(), 3);

    let groups = group_by_bench(&table);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].bench_name, "bbb");
    let comparison = groups[0].comparison_table();
    let expected = 2.0 * 256f64.powi(3) / 2.0e-4 / 1e9;
    assert!((comparison.get(cube(256), "f32-glar-gemm").unwrap() - expected).abs() < 1e-9);
}
