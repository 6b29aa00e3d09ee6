//! Loading, normalizing and reporting benchmark measurements.

pub mod aggregate;
pub mod estimator;
pub mod metrics;
pub mod plot;
pub mod record;
pub mod report;
pub mod stats;

pub use aggregate::{discover_runs, run_dir, AggregatedTable, RejectedRow, RunAggregator, RunDir};
pub use metrics::{derive, gflops, DerivedRecord};
pub use plot::PlottersChart;
pub use record::{
    load_measurement_file, normalize, parse_measurement, DimStrategy, Dims, NormalizedRecord,
    RawMeasurementFile,
};
pub use report::{
    group_by_bench, BenchGroup, ChartSink, ComparisonTable, ReportEmitter, Series, SeriesPoint,
};
pub use stats::SampleSummary;
