use std::iter::FusedIterator;

use crate::{KC_CANDIDATES, NC_CANDIDATES};

/// A single cache-blocking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterPoint {
    pub nc: usize,
    pub kc: usize,
}

/// Cross product of NC and KC candidates.
///
/// Iteration is outer over NC, inner over KC, so two sweeps over the same
/// grid produce logs that diff line by line. Duplicate candidates are kept:
/// a list with a repeated value yields the repeated points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterGrid {
    nc_values: Vec<usize>,
    kc_values: Vec<usize>,
}

impl ParameterGrid {
    pub fn new(nc_values: impl Into<Vec<usize>>, kc_values: impl Into<Vec<usize>>) -> Self {
        Self {
            nc_values: nc_values.into(),
            kc_values: kc_values.into(),
        }
    }

    /// The full default candidate lists.
    pub fn comprehensive() -> Self {
        Self::new(NC_CANDIDATES, KC_CANDIDATES)
    }

    pub fn nc_values(&self) -> &[usize] {
        &self.nc_values
    }

    pub fn kc_values(&self) -> &[usize] {
        &self.kc_values
    }

    /// Number of points, `|NC| * |KC|`.
    pub fn len(&self) -> usize {
        self.nc_values.len() * self.kc_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a fresh traversal. The grid itself is never consumed.
    pub fn iter(&self) -> GridIter<'_> {
        GridIter {
            grid: self,
            outer: 0,
            inner: 0,
        }
    }
}

impl<'a> IntoIterator for &'a ParameterGrid {
    type Item = ParameterPoint;
    type IntoIter = GridIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy traversal of a [`ParameterGrid`].
#[derive(Debug, Clone)]
pub struct GridIter<'a> {
    grid: &'a ParameterGrid,
    outer: usize,
    inner: usize,
}

impl Iterator for GridIter<'_> {
    type Item = ParameterPoint;

    fn next(&mut self) -> Option<ParameterPoint> {
        let kc_len = self.grid.kc_values.len();
        if kc_len == 0 || self.outer >= self.grid.nc_values.len() {
            return None;
        }

        let point = ParameterPoint {
            nc: self.grid.nc_values[self.outer],
            kc: self.grid.kc_values[self.inner],
        };

        self.inner += 1;
        if self.inner == kc_len {
            self.inner = 0;
            self.outer += 1;
        }

        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let kc_len = self.grid.kc_values.len();
        let remaining = if kc_len == 0 || self.outer >= self.grid.nc_values.len() {
            0
        } else {
            (self.grid.nc_values.len() - self.outer) * kc_len - self.inner
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridIter<'_> {}

impl FusedIterator for GridIter<'_> {}
