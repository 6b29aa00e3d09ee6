//! Measurement records as written by the benchmark harness.
//!
//! A record file looks like
//!
//! ```json
//! {
//!   "bench_name": "sgemm_square",
//!   "implementation": "glare",
//!   "dim_strategy": { "Big": [256, 512, 1024] },
//!   "bench_config": { "layout": "nt", "threads": 8 },
//!   "times": [[0.0011, 0.0010], [0.0081, 0.0079], [0.061, 0.060]]
//! }
//! ```
//!
//! `times` holds one list of repeated samples, in seconds, per problem size.
//! `dim_strategy` says how the sizes vary: `Big` alone scales m, n and k
//! together, while `SmallM`, `SmallN` or `SmallK` pins one dimension and takes
//! the other two from an accompanying `Big`. Every size is either a single
//! integer, shared by all points, or a list with one entry per point.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::stats::SampleSummary;
use crate::error::{io_error, schema_error, Result};

const BIG: &str = "Big";
const SMALL_M: &str = "SmallM";
const SMALL_N: &str = "SmallN";
const SMALL_K: &str = "SmallK";
const SMALL_KEYS: [&str; 3] = [SMALL_M, SMALL_N, SMALL_K];

/// One measurement file, before any interpretation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMeasurementFile {
    pub bench_name: String,
    pub implementation: String,
    pub dim_strategy: Value,
    pub bench_config: Value,
    pub times: Vec<Vec<f64>>,
}

/// Size of one dimension across the points of a record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DimAxis {
    /// Same size at every point.
    Fixed(u64),
    /// One size per point.
    Swept(Vec<u64>),
}

impl DimAxis {
    fn at(&self, index: usize) -> u64 {
        match self {
            DimAxis::Fixed(value) => *value,
            DimAxis::Swept(values) => values[index],
        }
    }

    fn points(&self) -> Option<usize> {
        match self {
            DimAxis::Fixed(_) => None,
            DimAxis::Swept(values) => Some(values.len()),
        }
    }
}

/// How m, n and k are derived for each point of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimStrategy {
    Big(DimAxis),
    SmallM { small: DimAxis, big: DimAxis },
    SmallN { small: DimAxis, big: DimAxis },
    SmallK { small: DimAxis, big: DimAxis },
}

/// Concrete problem dimensions of one point, ordered by m, then n, then k.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dims {
    pub m: u64,
    pub n: u64,
    pub k: u64,
}

fn parse_axis(key: &str, value: &Value) -> Result<DimAxis> {
    serde_json::from_value(value.clone()).map_err(|_| {
        schema_error(
            format!("dim_strategy.{key}"),
            format!("expected a non-negative integer or a list of them, found {value}"),
        )
    })
}

impl DimStrategy {
    /// Interprets the `dim_strategy` object of a record.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            schema_error("dim_strategy", format!("expected an object, found {value}"))
        })?;

        if let Some(unknown) = map
            .keys()
            .find(|key| key.as_str() != BIG && !SMALL_KEYS.contains(&key.as_str()))
        {
            return Err(schema_error(
                "dim_strategy",
                format!("unrecognized variant `{unknown}`"),
            ));
        }

        let smalls: Vec<&str> = SMALL_KEYS
            .into_iter()
            .filter(|key| map.contains_key(*key))
            .collect();
        let big = map.get(BIG).map(|v| parse_axis(BIG, v)).transpose()?;

        match (smalls.as_slice(), big) {
            ([], Some(big)) => Ok(DimStrategy::Big(big)),
            ([], None) => Err(schema_error(
                "dim_strategy",
                "none of Big, SmallM, SmallN or SmallK is present",
            )),
            ([small_key], None) => Err(schema_error(
                "dim_strategy.Big",
                format!("{small_key} needs an accompanying Big size"),
            )),
            ([small_key], Some(big)) => {
                let small = parse_axis(small_key, &map[*small_key])?;
                Ok(match *small_key {
                    SMALL_M => DimStrategy::SmallM { small, big },
                    SMALL_N => DimStrategy::SmallN { small, big },
                    _ => DimStrategy::SmallK { small, big },
                })
            }
            _ => Err(schema_error(
                "dim_strategy",
                format!("conflicting variants {}", smalls.join(", ")),
            )),
        }
    }

    fn named_axes(&self) -> Vec<(&'static str, &DimAxis)> {
        match self {
            DimStrategy::Big(big) => vec![(BIG, big)],
            DimStrategy::SmallM { small, big } => vec![(SMALL_M, small), (BIG, big)],
            DimStrategy::SmallN { small, big } => vec![(SMALL_N, small), (BIG, big)],
            DimStrategy::SmallK { small, big } => vec![(SMALL_K, small), (BIG, big)],
        }
    }

    fn dims_at(&self, index: usize) -> Dims {
        match self {
            DimStrategy::Big(big) => {
                let v = big.at(index);
                Dims { m: v, n: v, k: v }
            }
            DimStrategy::SmallM { small, big } => Dims {
                m: small.at(index),
                n: big.at(index),
                k: big.at(index),
            },
            DimStrategy::SmallN { small, big } => Dims {
                m: big.at(index),
                n: small.at(index),
                k: big.at(index),
            },
            DimStrategy::SmallK { small, big } => Dims {
                m: big.at(index),
                n: big.at(index),
                k: small.at(index),
            },
        }
    }

    /// Dimensions of each of `points` points.
    ///
    /// Listed sizes must have exactly `points` entries; single sizes are
    /// repeated.
    pub fn resolve(&self, points: usize) -> Result<Vec<Dims>> {
        for (key, axis) in self.named_axes() {
            if let Some(len) = axis.points() {
                if len != points {
                    return Err(schema_error(
                        format!("dim_strategy.{key}"),
                        format!("lists {len} sizes but `times` has {points} entries"),
                    ));
                }
            }
        }
        Ok((0..points).map(|i| self.dims_at(i)).collect())
    }
}

fn sorted_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted_value(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_value).collect()),
        other => other.clone(),
    }
}

/// Compact JSON of `config` with object keys sorted at every level.
///
/// Two configs with the same fields in a different order give the same key.
pub fn canonical_config_key(config: &Value) -> String {
    sorted_value(config).to_string()
}

/// Parses a key and canonicalizes it again. A canonical key comes back
/// unchanged.
pub fn recanonicalize(key: &str) -> Result<String> {
    let value: Value = serde_json::from_str(key)
        .map_err(|e| schema_error("bench_config", format!("not valid JSON: {e}")))?;
    Ok(canonical_config_key(&value))
}

/// One problem size of one record, timings in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub m: u64,
    pub n: u64,
    pub k: u64,
    pub bench_name: String,
    pub implementation: String,
    pub bench_config_key: String,
    pub times_mean: f64,
    pub times_median: f64,
    pub times_min: f64,
}

impl NormalizedRecord {
    pub fn dims(&self) -> Dims {
        Dims {
            m: self.m,
            n: self.n,
            k: self.k,
        }
    }
}

pub fn parse_measurement(text: &str) -> Result<RawMeasurementFile> {
    serde_json::from_str(text).map_err(|e| schema_error("record", e.to_string()))
}

/// Turns a record into one row per entry of `times`.
///
/// All-or-nothing: any malformed entry fails the whole record.
pub fn normalize(raw: &RawMeasurementFile) -> Result<Vec<NormalizedRecord>> {
    let strategy = DimStrategy::from_value(&raw.dim_strategy)?;
    let dims = strategy.resolve(raw.times.len())?;
    let bench_config_key = canonical_config_key(&raw.bench_config);

    raw.times
        .iter()
        .zip(dims)
        .enumerate()
        .map(|(index, (samples, dims))| {
            if let Some(bad) = samples.iter().find(|t| !(**t >= 0.0)) {
                return Err(schema_error(
                    format!("times[{index}]"),
                    format!("sample {bad} is not a non-negative number of seconds"),
                ));
            }
            let summary = SampleSummary::from_samples(samples)
                .ok_or_else(|| schema_error(format!("times[{index}]"), "no timing samples"))?;

            Ok(NormalizedRecord {
                m: dims.m,
                n: dims.n,
                k: dims.k,
                bench_name: raw.bench_name.clone(),
                implementation: raw.implementation.clone(),
                bench_config_key: bench_config_key.clone(),
                times_mean: summary.mean,
                times_median: summary.median,
                times_min: summary.min,
            })
        })
        .collect()
}

/// Reads and normalizes one measurement file. Errors name the file.
pub fn load_measurement_file(path: &Path) -> Result<Vec<NormalizedRecord>> {
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    parse_measurement(&text)
        .and_then(|raw| normalize(&raw))
        .map_err(|e| e.in_file(path))
}
