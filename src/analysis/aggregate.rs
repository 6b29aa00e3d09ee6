use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::analysis::metrics::{derive, DerivedRecord};
use crate::analysis::record::{load_measurement_file, NormalizedRecord};
use crate::error::{io_error, BenchError, Result};
use crate::RUN_DIR_PREFIX;

const MEASUREMENT_EXTENSION: &str = "json";

/// A row dropped because its throughput could not be derived.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub file: PathBuf,
    pub row: usize,
    pub reason: String,
}

/// Every derived row of one run.
///
/// Rows keep the order of their file, files the order they were merged in.
#[derive(Debug, Clone, Default)]
pub struct AggregatedTable {
    rows: Vec<DerivedRecord>,
    rejected: Vec<RejectedRow>,
}

impl AggregatedTable {
    pub fn rows(&self) -> &[DerivedRecord] {
        &self.rows
    }

    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DerivedRecord> {
        self.rows.iter()
    }

    /// Derives and appends the rows of one source.
    pub fn extend_from(&mut self, source: &Path, records: Vec<NormalizedRecord>) {
        let (rows, rejected) = derive_rows(source, records);
        self.merge(rows, rejected);
    }

    fn merge(&mut self, rows: Vec<DerivedRecord>, rejected: Vec<RejectedRow>) {
        for row in &rejected {
            warn!(file = %row.file.display(), row = row.row, "row excluded: {}", row.reason);
        }
        self.rows.extend(rows);
        self.rejected.extend(rejected);
    }

    /// Writes the rows as a pretty-printed JSON array.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| io_error(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.rows)
            .map_err(|e| io_error(path, e.into()))
    }
}

impl<'a> IntoIterator for &'a AggregatedTable {
    type Item = &'a DerivedRecord;
    type IntoIter = std::slice::Iter<'a, DerivedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

fn derive_rows(
    source: &Path,
    records: Vec<NormalizedRecord>,
) -> (Vec<DerivedRecord>, Vec<RejectedRow>) {
    let mut rows = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        match derive(record, index) {
            Ok(row) => rows.push(row),
            Err(err) => rejected.push(RejectedRow {
                file: source.to_path_buf(),
                row: index,
                reason: err.in_file(source).to_string(),
            }),
        }
    }
    (rows, rejected)
}

/// Merges the measurement files of a run folder into one table.
pub struct RunAggregator;

impl RunAggregator {
    /// `*.json` files directly inside `dir`, in directory-listing order.
    pub fn measurement_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
            let path = entry.map_err(|e| io_error(dir, e))?.path();
            let is_measurement = path
                .extension()
                .is_some_and(|ext| ext == MEASUREMENT_EXTENSION);
            if is_measurement && path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Loads and derives every measurement file of `dir`.
    ///
    /// Files are processed in parallel and merged in listing order. The first
    /// file in that order that fails to load fails the whole aggregation, so
    /// no table is built from a partial run. A folder without measurement
    /// files gives an empty table.
    pub fn aggregate(dir: &Path) -> Result<AggregatedTable> {
        let files = Self::measurement_files(dir)?;

        let loaded: Vec<Result<(Vec<DerivedRecord>, Vec<RejectedRow>)>> = files
            .par_iter()
            .map(|path| load_measurement_file(path).map(|records| derive_rows(path, records)))
            .collect();

        let mut table = AggregatedTable::default();
        for result in loaded {
            let (rows, rejected) = result?;
            table.merge(rows, rejected);
        }

        info!(
            dir = %dir.display(),
            files = files.len(),
            rows = table.len(),
            rejected = table.rejected().len(),
            "aggregated run"
        );
        Ok(table)
    }
}

/// A `benchmark_run_<index>` folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    pub index: usize,
    pub path: PathBuf,
}

impl RunDir {
    pub fn new(root: &Path, index: usize) -> Self {
        Self {
            index,
            path: root.join(format!("{RUN_DIR_PREFIX}{index}")),
        }
    }
}

/// Run folders numbered from 0 up to the first missing index.
pub fn discover_runs(root: &Path) -> Vec<RunDir> {
    (0..)
        .map(|index| RunDir::new(root, index))
        .take_while(|run| run.path.is_dir())
        .collect()
}

/// Looks up one run folder, failing when it does not exist.
pub fn run_dir(root: &Path, index: usize) -> Result<RunDir> {
    let run = RunDir::new(root, index);
    if run.path.is_dir() {
        Ok(run)
    } else {
        Err(BenchError::IoError {
            path: run.path,
            message: "run folder does not exist".to_string(),
        })
    }
}
