use crate::histogram::Hist1D;

/// Summary of the amplitude distribution found in one spatial bin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BinStatistics {
    pub count: f64,
    pub mean: f64,
    pub rms: f64,
}

impl BinStatistics {
    /// A missing distribution summarizes to zero entries.
    pub fn summarize(distribution: Option<&Hist1D>) -> Self {
        match distribution {
            Some(hist) => BinStatistics {
                count: hist.entries(),
                mean: hist.mean(),
                rms: hist.rms(),
            },
            None => BinStatistics::default(),
        }
    }

    /// Average occupancy per bin of the whole row; bins above it are fitted.
    pub fn fit_threshold(total_events_in_row: f64, n_bins: usize) -> Option<f64> {
        (n_bins > 0).then(|| total_events_in_row / n_bins as f64)
    }

    pub fn should_fit(count: f64, total_events_in_row: f64, n_bins: usize) -> bool {
        Self::fit_threshold(total_events_in_row, n_bins).is_some_and(|threshold| count > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_absent_distribution() {
        assert_eq!(BinStatistics::summarize(None), BinStatistics::default());
    }

    #[test]
    fn summarize_histogram() {
        let mut hist = Hist1D::new(40, 0.0, 40.0);
        for _ in 0..3 {
            hist.fill(8.5);
            hist.fill(12.5);
        }
        let stats = BinStatistics::summarize(Some(&hist));
        assert_eq!(stats.count, 6.0);
        assert!((stats.mean - 10.5).abs() < 1e-12);
        assert!((stats.rms - 2.0).abs() < 1e-12);
    }

    #[test]
    fn threshold_is_average_occupancy() {
        assert!(BinStatistics::should_fit(100.0, 10.0, 3));
        assert!(BinStatistics::should_fit(5.0, 10.0, 3));
        assert!(!BinStatistics::should_fit(0.0, 10.0, 3));
        // strictly greater than
        assert!(!BinStatistics::should_fit(5.0, 10.0, 2));
        assert!(!BinStatistics::should_fit(1e9, 10.0, 0));
    }
}
