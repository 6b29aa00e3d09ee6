use serde::Serialize;

use crate::analysis::record::NormalizedRecord;
use crate::error::{domain_error, Result};

/// Throughput of a dense `m x k` by `k x n` product finished in `seconds`.
#[inline]
pub fn gflops(m: u64, n: u64, k: u64, seconds: f64) -> f64 {
    2.0 * m as f64 * n as f64 * k as f64 / seconds / 1e9
}

/// A normalized row with its throughput.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRecord {
    #[serde(flatten)]
    pub record: NormalizedRecord,
    /// Computed from the fastest sample.
    pub gflops: f64,
}

/// Derives GFLOPS for `record`, the `row`-th of its file.
///
/// A non-positive `times_min` has no meaningful throughput and is rejected
/// rather than reported as zero, as is a time so small that the throughput
/// overflows to infinity.
pub fn derive(record: NormalizedRecord, row: usize) -> Result<DerivedRecord> {
    if !(record.times_min > 0.0) {
        return Err(domain_error(
            row,
            format!(
                "times_min is {} s for {}x{}x{}, throughput is undefined",
                record.times_min, record.m, record.n, record.k
            ),
        ));
    }

    let gflops = gflops(record.m, record.n, record.k, record.times_min);
    if !gflops.is_finite() {
        return Err(domain_error(
            row,
            format!(
                "times_min of {} s for {}x{}x{} gives non-finite throughput",
                record.times_min, record.m, record.n, record.k
            ),
        ));
    }
    Ok(DerivedRecord { record, gflops })
}
