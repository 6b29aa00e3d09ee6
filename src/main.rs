use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use gemmsweep::analysis::{
    discover_runs, estimator, run_dir, AggregatedTable, PlottersChart, ReportEmitter,
    RunAggregator, RunDir,
};
use gemmsweep::config::{BackendSpec, ReportConfig, SweepConfig};
use gemmsweep::sweep::{ParameterGrid, ProcessRunner, SweepOrchestrator};
use gemmsweep::{
    DEFAULT_BENCH_TYPE, DEFAULT_DIM, DEFAULT_IMAGES_ROOT, DEFAULT_REFERENCE_BACKEND,
    DEFAULT_RESULTS_ROOT, DEFAULT_SWEEP_LOG, DEFAULT_TUNED_BACKEND, DEFAULT_TUNED_ENV_PREFIX,
    KC_CANDIDATES, NC_CANDIDATES,
};

#[derive(Parser)]
#[command(name = "gemmsweep")]
#[command(about = "Cache-blocking sweeps and GFLOPS reports for GEMM benchmarks")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark binary over an NC x KC grid
    Sweep(SweepArgs),
    /// Aggregate measurement runs, print comparison tables and draw charts
    Report(ReportArgs),
    /// Report from criterion estimate directories
    Estimates(EstimatesArgs),
}

#[derive(Args)]
struct SweepArgs {
    /// Benchmark executable
    #[arg(long, value_name = "PATH")]
    binary: PathBuf,

    /// Argument passed before the benchmark flags, repeatable
    #[arg(long = "launcher", value_name = "ARG", allow_hyphen_values = true)]
    launcher_args: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_DIM)]
    m: usize,

    #[arg(long, default_value_t = DEFAULT_DIM)]
    n: usize,

    #[arg(long, default_value_t = DEFAULT_DIM)]
    k: usize,

    #[arg(long, default_value = DEFAULT_BENCH_TYPE)]
    bench_type: String,

    /// Tuned backend receiving the blocking parameters
    #[arg(long, default_value = DEFAULT_TUNED_BACKEND)]
    backend: String,

    /// Prefix of the tuned backend's NC/KC environment keys
    #[arg(long, default_value = DEFAULT_TUNED_ENV_PREFIX)]
    env_prefix: String,

    /// Untuned reference backend
    #[arg(long, default_value = DEFAULT_REFERENCE_BACKEND)]
    reference: String,

    /// NC candidates, comma separated
    #[arg(long, value_delimiter = ',')]
    nc: Option<Vec<usize>>,

    /// KC candidates, comma separated
    #[arg(long, value_delimiter = ',')]
    kc: Option<Vec<usize>>,

    /// Log file receiving headers and benchmark output (appended)
    #[arg(long, default_value = DEFAULT_SWEEP_LOG)]
    output: PathBuf,

    /// Abort the sweep when one invocation runs longer than this
    #[arg(long, value_name = "SECONDS")]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long, default_value = DEFAULT_RESULTS_ROOT)]
    results_root: PathBuf,

    #[arg(long, default_value = DEFAULT_IMAGES_ROOT)]
    images_root: PathBuf,

    /// Only this run instead of every discovered one
    #[arg(long, value_name = "IDX")]
    run: Option<usize>,

    /// Also write each aggregated table as JSON into this directory
    #[arg(long, value_name = "DIR")]
    export_json: Option<PathBuf>,
}

#[derive(Args)]
struct EstimatesArgs {
    /// Criterion group directory, e.g. target/criterion/<group>
    #[arg(long, value_name = "DIR")]
    group_dir: PathBuf,

    /// Implementation directories to load, repeatable; all when omitted
    #[arg(long = "implementation", value_name = "NAME")]
    implementations: Vec<String>,

    #[arg(long, default_value = DEFAULT_IMAGES_ROOT)]
    images_root: PathBuf,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Sweep(args) => sweep(args),
        Commands::Report(args) => report(args),
        Commands::Estimates(args) => estimates(args),
    }
}

fn sweep(args: SweepArgs) -> Result<()> {
    let config = SweepConfig {
        m: args.m,
        n: args.n,
        k: args.k,
        bench_type: args.bench_type,
        tuned: BackendSpec::tuned(args.backend, args.env_prefix),
        reference: BackendSpec::reference(args.reference),
        grid: ParameterGrid::new(
            args.nc.unwrap_or_else(|| NC_CANDIDATES.to_vec()),
            args.kc.unwrap_or_else(|| KC_CANDIDATES.to_vec()),
        ),
        output: args.output,
        timeout: args.timeout_secs.map(Duration::from_secs),
    };

    let runner = ProcessRunner::new(&args.binary).with_launcher_args(args.launcher_args);
    let orchestrator = SweepOrchestrator::new(config, runner).context("invalid sweep settings")?;
    let summary = orchestrator.run().context("sweep aborted")?;

    println!(
        "{} points, {} invocations, {} unsuccessful, log at {}",
        summary.points,
        summary.invocations,
        summary.failures.len(),
        orchestrator.log().path().display()
    );
    for failure in &summary.failures {
        println!(
            "  NC={} KC={} backend={} exit={}",
            failure.point.nc,
            failure.point.kc,
            failure.backend,
            failure.exit
        );
    }
    Ok(())
}

/// Prints the comparison tables of `table` and charts it into `chart`.
fn present(table: &AggregatedTable, chart: PlottersChart) -> Result<()> {
    let mut emitter = ReportEmitter::new(chart);
    let groups = emitter.emit(table).context("rendering charts failed")?;
    for group in &groups {
        println!("{}", group.comparison_table());
    }
    for rejected in table.rejected() {
        println!("excluded: {}", rejected.reason);
    }
    for path in emitter.sink().written() {
        println!("chart: {}", path.display());
    }
    Ok(())
}

fn report_run(run: &RunDir, config: &ReportConfig, export_json: Option<&Path>) -> Result<()> {
    info!(run = run.index, dir = %run.path.display(), "processing run");
    let table = RunAggregator::aggregate(&run.path)
        .with_context(|| format!("aggregating {} failed", run.path.display()))?;

    if table.is_empty() {
        warn!(run = run.index, "run holds no measurements");
    }

    if let Some(dir) = export_json {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {} failed", dir.display()))?;
        let path = dir.join(format!(
            "{}.json",
            run.path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| run.index.to_string())
        ));
        table.write_json(&path)?;
        println!("table: {}", path.display());
    }

    let images = RunDir::new(&config.images_root, run.index).path;
    present(&table, PlottersChart::new(images).with_run_index(run.index))
}

fn report(args: ReportArgs) -> Result<()> {
    let config = ReportConfig {
        results_root: args.results_root,
        images_root: args.images_root,
    };

    let runs = match args.run {
        Some(index) => vec![run_dir(&config.results_root, index)?],
        None => discover_runs(&config.results_root),
    };
    if runs.is_empty() {
        warn!(root = %config.results_root.display(), "no run folders found");
    }

    for run in &runs {
        report_run(run, &config, args.export_json.as_deref())?;
    }
    Ok(())
}

fn estimates(args: EstimatesArgs) -> Result<()> {
    let records = estimator::load_group(&args.group_dir, &args.implementations)
        .with_context(|| format!("loading estimates from {} failed", args.group_dir.display()))?;

    let mut table = AggregatedTable::default();
    table.extend_from(&args.group_dir, records);
    present(&table, PlottersChart::new(args.images_root))
}
