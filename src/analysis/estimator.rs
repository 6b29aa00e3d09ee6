//! Criterion estimate files as an alternate measurement source.
//!
//! Layout consumed: `<group>/<implementation>/<size>/base/estimates.json`,
//! where `<size>` is a directory name ending in the problem size (`1024` or
//! `sgemm-1024`). Only `median.point_estimate`, in nanoseconds, is read.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::analysis::record::{canonical_config_key, NormalizedRecord};
use crate::analysis::stats::SampleSummary;
use crate::error::{io_error, schema_error, Result};

const NANOS_PER_SEC: f64 = 1e9;
const REPORT_DIR: &str = "report";

#[derive(Debug, Deserialize)]
struct Estimates {
    median: Estimate,
}

#[derive(Debug, Deserialize)]
struct Estimate {
    point_estimate: f64,
}

/// Median estimate of `size_dir/base/estimates.json`, in seconds.
pub fn load_estimate(size_dir: &Path) -> Result<f64> {
    let path = size_dir.join("base").join("estimates.json");
    let text = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
    let estimates: Estimates = serde_json::from_str(&text)
        .map_err(|e| schema_error("median.point_estimate", e.to_string()).in_file(&path))?;
    Ok(estimates.median.point_estimate / NANOS_PER_SEC)
}

/// Problem size encoded after the last `-` of a directory name.
pub fn parse_size_label(label: &str) -> Option<u64> {
    label.rsplit('-').next()?.parse().ok()
}

/// Subdirectories of `dir` except criterion's `report`, sorted by name.
fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == REPORT_DIR {
            continue;
        }
        dirs.push((name, path));
    }
    dirs.sort();
    Ok(dirs)
}

fn group_name(group_dir: &Path) -> String {
    group_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| group_dir.display().to_string())
}

/// One row per size directory of `implementation`, sorted by size.
///
/// The median estimate stands in for mean, median and min alike, so the
/// throughput of these rows is computed from the median.
pub fn load_implementation(group_dir: &Path, implementation: &str) -> Result<Vec<NormalizedRecord>> {
    let bench_name = group_name(group_dir);
    let bench_config_key = canonical_config_key(&Value::Object(Map::new()));

    let mut rows = Vec::new();
    for (label, path) in subdirectories(&group_dir.join(implementation))? {
        let size = parse_size_label(&label).ok_or_else(|| {
            schema_error(
                "size",
                format!("cannot read a problem size from directory `{label}`"),
            )
            .in_file(&path)
        })?;
        let summary = SampleSummary::from_point_estimate(load_estimate(&path)?);

        rows.push(NormalizedRecord {
            m: size,
            n: size,
            k: size,
            bench_name: bench_name.clone(),
            implementation: implementation.to_string(),
            bench_config_key: bench_config_key.clone(),
            times_mean: summary.mean,
            times_median: summary.median,
            times_min: summary.min,
        });
    }
    rows.sort_by_key(|row| row.m);
    Ok(rows)
}

/// Rows of every listed implementation of a criterion group, in list order.
///
/// An empty list selects every implementation directory of the group.
pub fn load_group(group_dir: &Path, implementations: &[String]) -> Result<Vec<NormalizedRecord>> {
    let names: Vec<String> = if implementations.is_empty() {
        subdirectories(group_dir)?
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    } else {
        implementations.to_vec()
    };

    let mut rows = Vec::new();
    for name in &names {
        rows.extend(load_implementation(group_dir, name)?);
    }
    Ok(rows)
}
