/// Reduction of the repeated timing samples of one problem size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    pub mean: f64,
    /// Lower-middle element of the sorted samples, never interpolated.
    pub median: f64,
    pub min: f64,
}

impl SampleSummary {
    /// Summarizes `samples`, `None` when there are none.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
        let median = sorted[(sorted.len() - 1) / 2];
        let min = sorted[0];

        Some(Self { mean, median, min })
    }

    /// A single estimate standing in for every statistic.
    pub fn from_point_estimate(value: f64) -> Self {
        Self {
            mean: value,
            median: value,
            min: value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_has_no_summary() {
        assert!(SampleSummary::from_samples(&[]).is_none());
    }

    #[test]
    fn test_odd_count() {
        let summary = SampleSummary::from_samples(&[0.3, 0.1, 0.2]).unwrap();
        assert!((summary.mean - 0.2).abs() < 1e-12);
        assert_eq!(summary.median, 0.2);
        assert_eq!(summary.min, 0.1);
    }

    #[test]
    fn test_even_count_takes_lower_middle() {
        let summary = SampleSummary::from_samples(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(summary.median, 2.0);
        assert_eq!(summary.mean, 2.5);
        assert_eq!(summary.min, 1.0);
    }

    #[test]
    fn test_single_sample() {
        let summary = SampleSummary::from_samples(&[0.5]).unwrap();
        assert_eq!(summary, SampleSummary::from_point_estimate(0.5));
    }
}
