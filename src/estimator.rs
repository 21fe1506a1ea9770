//! Per-bin peak estimation over a signal-vs-position distribution.
//!
//! Every spatial bin yields one non-negative value: the fitted most probable
//! value when the bin holds more than the average number of entries per bin,
//! the plain mean otherwise. A failed fit only affects its own bin.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    error::AnalysisError,
    histogram::{Hist1D, Hist2D},
    stats::BinStatistics,
};

/// Supplies one amplitude distribution per spatial bin.
pub trait DistributionSource {
    /// Distribution of bin `bin` (1-based), `None` if the source has nothing there.
    fn bin_distribution(&self, bin: usize) -> Option<Hist1D>;
    fn row_total_entries(&self) -> f64;
    fn n_bins(&self) -> usize;
}

impl DistributionSource for Hist2D {
    fn bin_distribution(&self, bin: usize) -> Option<Hist1D> {
        (1..=self.x.n_bins).contains(&bin).then(|| self.projection_y(bin))
    }

    fn row_total_entries(&self) -> f64 {
        self.entries()
    }

    fn n_bins(&self) -> usize {
        self.x.n_bins
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitWindow {
    pub low: f64,
    pub high: f64,
}

impl FitWindow {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.low && x <= self.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Location parameter of the fitted peak (most probable value).
    pub peak: f64,
    pub success: bool,
    pub parameters: Vec<f64>,
    pub chi2: f64,
    pub ndf: usize,
}

impl FitResult {
    pub fn failed() -> Self {
        FitResult {
            peak: f64::NAN,
            success: false,
            parameters: vec![],
            chi2: f64::NAN,
            ndf: 0,
        }
    }
}

/// Anything able to locate the peak of a distribution inside a window.
pub trait PeakFitter {
    fn fit(&self, distribution: &Hist1D, window: FitWindow) -> FitResult;
}

impl<F> PeakFitter for F
where
    F: Fn(&Hist1D, FitWindow) -> FitResult,
{
    fn fit(&self, distribution: &Hist1D, window: FitWindow) -> FitResult {
        self(distribution, window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorParams {
    /// Bins with a mean above this use the coarse rebin factor.
    pub rebin_threshold: f64,
    pub coarse_rebin: usize,
    pub fine_rebin: usize,
    /// Window is `[mean - window_low * rms, mean + window_high * rms]`.
    pub window_low: f64,
    pub window_high: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        EstimatorParams {
            rebin_threshold: 50.0,
            coarse_rebin: 5,
            fine_rebin: 10,
            window_low: 1.0,
            window_high: 3.0,
        }
    }
}

impl EstimatorParams {
    pub fn load(filepath: &std::path::Path) -> Result<Self, AnalysisError> {
        if !filepath.exists() {
            return Err(AnalysisError::BadFilePath(filepath.to_path_buf()));
        }
        let yaml = std::fs::read_to_string(filepath)?;
        Ok(serde_yaml::from_str(&yaml)?)
    }

    pub fn rebin_factor(&self, mean: f64) -> usize {
        if mean > self.rebin_threshold {
            self.coarse_rebin
        } else {
            self.fine_rebin
        }
    }

    pub fn fit_window(&self, mean: f64, rms: f64) -> FitWindow {
        FitWindow::new(mean - self.window_low * rms, mean + self.window_high * rms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOutcome {
    /// Fit converged; value is its peak.
    Fitted,
    /// Fit attempted and rejected; value is the mean.
    FitFailed,
    /// Not enough entries to fit; value is the mean.
    Fallback,
}

/// Everything that happened to one spatial bin.
#[derive(Debug, Clone)]
pub struct BinReport {
    pub bin: usize,
    pub stats: BinStatistics,
    pub outcome: BinOutcome,
    pub rebin: Option<usize>,
    pub window: Option<FitWindow>,
    /// Distribution actually handed to the fitter.
    pub fitted: Option<Hist1D>,
    pub fit: Option<FitResult>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    values: Vec<f64>,
}

impl Profile {
    pub fn zeroed(n_bins: usize) -> Self {
        Profile {
            values: vec![0.0; n_bins],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of 1-based bin `bin`.
    pub fn get(&self, bin: usize) -> Option<f64> {
        bin.checked_sub(1).and_then(|idx| self.values.get(idx).copied())
    }

    fn set(&mut self, bin: usize, value: f64) {
        self.values[bin - 1] = value;
    }

    /// `(bin, value)` pairs in ascending bin order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().enumerate().map(|(idx, v)| (idx + 1, *v))
    }

    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Histogram with one bin per profile entry over `[min, max)`.
    pub fn to_hist(&self, min: f64, max: f64) -> Hist1D {
        let mut hist = Hist1D::new(self.len(), min, max);
        for (bin, value) in self.iter() {
            hist.set_content(bin, value);
        }
        hist.set_entries(self.len() as f64);
        hist
    }
}

pub struct PeakEstimator<F> {
    params: EstimatorParams,
    fitter: F,
}

impl<F: PeakFitter> PeakEstimator<F> {
    pub fn new(params: EstimatorParams, fitter: F) -> Self {
        Self { params, fitter }
    }

    pub fn params(&self) -> &EstimatorParams {
        &self.params
    }

    pub fn estimate_bin(
        &self,
        bin: usize,
        distribution: Option<&Hist1D>,
        row_total: f64,
        n_bins: usize,
    ) -> BinReport {
        let stats = BinStatistics::summarize(distribution);
        let mut report = BinReport {
            bin,
            stats,
            outcome: BinOutcome::Fallback,
            rebin: None,
            window: None,
            fitted: None,
            fit: None,
            value: stats.mean,
        };

        if let Some(hist) = distribution.filter(|_| BinStatistics::should_fit(stats.count, row_total, n_bins)) {
            let rebin = self.params.rebin_factor(stats.mean);
            let window = self.params.fit_window(stats.mean, stats.rms);
            let rebinned = hist.rebin(rebin);
            let fit = self.fitter.fit(&rebinned, window);

            if fit.success && fit.peak.is_finite() && window.contains(fit.peak) {
                report.outcome = BinOutcome::Fitted;
                report.value = fit.peak;
            } else {
                log::debug!(
                    "bin {bin}: fit rejected (success: {}, peak: {:.3}, window: [{:.3}, {:.3}]), using mean {:.3}",
                    fit.success, fit.peak, window.low, window.high, stats.mean
                );
                report.outcome = BinOutcome::FitFailed;
            }
            report.rebin = Some(rebin);
            report.window = Some(window);
            report.fitted = Some(rebinned);
            report.fit = Some(fit);
        }

        report.value = report.value.max(0.0);
        report
    }

    pub fn estimate<S: DistributionSource>(&self, source: &S) -> Result<Profile, AnalysisError> {
        self.estimate_with(source, |_| {})
    }

    /// Same as [`estimate`](Self::estimate), handing every bin's report to `on_bin`.
    pub fn estimate_with<S: DistributionSource>(
        &self,
        source: &S,
        mut on_bin: impl FnMut(&BinReport),
    ) -> Result<Profile, AnalysisError> {
        let n_bins = source.n_bins();
        if n_bins == 0 {
            return Err(AnalysisError::NoBins);
        }
        let row_total = source.row_total_entries();

        let mut profile = Profile::zeroed(n_bins);
        for bin in 1..=n_bins {
            let distribution = source.bin_distribution(bin);
            let report = self.estimate_bin(bin, distribution.as_ref(), row_total, n_bins);
            on_bin(&report);
            profile.set(bin, report.value);
        }
        Ok(profile)
    }
}

impl<F> PeakEstimator<F>
where
    F: PeakFitter + Send + Sync + 'static,
{
    /// Estimates every bin on its own blocking task.
    pub async fn estimate_parallel<S>(self: Arc<Self>, source: Arc<S>) -> Result<Profile, AnalysisError>
    where
        S: DistributionSource + Send + Sync + 'static,
    {
        let n_bins = source.n_bins();
        if n_bins == 0 {
            return Err(AnalysisError::NoBins);
        }
        let row_total = source.row_total_entries();

        let profile = Arc::new(Mutex::new(Profile::zeroed(n_bins)));

        let handles = (1..=n_bins)
            .map(|bin| {
                let estimator = Arc::clone(&self);
                let source = Arc::clone(&source);
                let profile = Arc::clone(&profile);
                tokio::spawn(async move {
                    let report = tokio::task::spawn_blocking(move || {
                        let distribution = source.bin_distribution(bin);
                        estimator.estimate_bin(bin, distribution.as_ref(), row_total, n_bins)
                    })
                    .await?;
                    profile.lock().await.set(bin, report.value);
                    Ok::<_, tokio::task::JoinError>(())
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.await??;
        }

        let profile = profile.lock().await.clone();
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Axis;
    use std::cell::RefCell;

    /// Hand-built source so every bin's distribution is exact.
    struct Columns {
        columns: Vec<Hist1D>,
        row_total: f64,
    }

    impl DistributionSource for Columns {
        fn bin_distribution(&self, bin: usize) -> Option<Hist1D> {
            self.columns.get(bin - 1).cloned()
        }

        fn row_total_entries(&self) -> f64 {
            self.row_total
        }

        fn n_bins(&self) -> usize {
            self.columns.len()
        }
    }

    /// `n` entries split evenly between `mean - rms` and `mean + rms`.
    ///
    /// Integer amplitudes sit on bin centers, so mean and rms come out exact.
    fn two_point(mean: f64, rms: f64, n: usize) -> Hist1D {
        let mut hist = Hist1D::new(200, -0.5, 199.5);
        hist.fill_weighted(mean - rms, n as f64 / 2.0);
        hist.fill_weighted(mean + rms, n as f64 / 2.0);
        hist.set_entries(n as f64);
        hist
    }

    fn recording_fitter(
        calls: &RefCell<Vec<(usize, FitWindow)>>,
        success: bool,
    ) -> impl Fn(&Hist1D, FitWindow) -> FitResult + '_ {
        move |hist: &Hist1D, window: FitWindow| {
            calls.borrow_mut().push((hist.n_bins(), window));
            FitResult {
                peak: window.low + 1.0,
                success,
                parameters: vec![],
                chi2: 0.0,
                ndf: 0,
            }
        }
    }

    #[test]
    fn window_and_rebin_policy() {
        let params = EstimatorParams::default();
        assert_eq!(params.fit_window(10.0, 2.0), FitWindow::new(8.0, 16.0));
        assert_eq!(params.rebin_factor(50.0), 10);
        assert_eq!(params.rebin_factor(50.000001), 5);
        assert_eq!(params.rebin_factor(12.0), 10);
    }

    #[test]
    fn end_to_end_three_bins() {
        let empty = Hist1D::new(200, -0.5, 199.5);
        let source = Columns {
            columns: vec![
                two_point(60.0, 5.0, 100),
                two_point(20.0, 3.0, 5),
                empty,
            ],
            row_total: 10.0,
        };
        let calls = RefCell::new(vec![]);
        let estimator = PeakEstimator::new(EstimatorParams::default(), recording_fitter(&calls, true));

        let mut reports = vec![];
        let profile = estimator
            .estimate_with(&source, |report| reports.push(report.clone()))
            .unwrap();

        assert_eq!(profile.len(), 3);
        let calls = calls.borrow().clone();
        assert_eq!(calls.len(), 2);
        // 200 bins rebinned by 5 and by 10
        assert_eq!(calls[0].0, 40);
        assert_eq!(calls[1].0, 20);
        assert_eq!(reports[0].rebin, Some(5));
        assert_eq!(reports[1].rebin, Some(10));

        assert_eq!(reports[0].window, Some(FitWindow::new(55.0, 75.0)));
        assert_eq!(reports[1].window, Some(FitWindow::new(17.0, 29.0)));

        assert_eq!(reports[0].outcome, BinOutcome::Fitted);
        assert_eq!(reports[1].outcome, BinOutcome::Fitted);
        assert_eq!(reports[2].outcome, BinOutcome::Fallback);
        assert_eq!(profile.get(1), Some(56.0));
        assert_eq!(profile.get(2), Some(18.0));
        assert_eq!(profile.get(3), Some(0.0));
        assert_eq!(profile.get(0), None);
    }

    #[test]
    fn failed_fit_falls_back_to_mean() {
        let source = Columns {
            columns: vec![two_point(20.0, 3.0, 50), two_point(30.0, 2.0, 50)],
            row_total: 10.0,
        };
        let calls = RefCell::new(vec![]);
        let estimator = PeakEstimator::new(EstimatorParams::default(), recording_fitter(&calls, false));

        let mut outcomes = vec![];
        let profile = estimator
            .estimate_with(&source, |report| outcomes.push(report.outcome))
            .unwrap();

        assert_eq!(outcomes, vec![BinOutcome::FitFailed, BinOutcome::FitFailed]);
        assert_eq!(profile.get(1), Some(20.0));
        assert_eq!(profile.get(2), Some(30.0));
    }

    #[test]
    fn out_of_window_peak_is_rejected() {
        let source = Columns {
            columns: vec![two_point(20.0, 3.0, 50)],
            row_total: 10.0,
        };
        let estimator = PeakEstimator::new(EstimatorParams::default(), |_: &Hist1D, w: FitWindow| FitResult {
            peak: w.high + 100.0,
            success: true,
            parameters: vec![],
            chi2: 0.0,
            ndf: 0,
        });
        let profile = estimator.estimate(&source).unwrap();
        assert_eq!(profile.get(1), Some(20.0));
    }

    #[test]
    fn unfitted_bins_keep_clamped_mean() {
        // negative amplitudes only: mean below zero is clamped
        let mut negative = Hist1D::new(10, -10.0, 0.0);
        negative.fill(-4.5);
        let mut positive = Hist1D::new(10, 0.0, 10.0);
        positive.fill(4.5);

        let source = Columns {
            columns: vec![negative, positive],
            row_total: 1000.0,
        };
        let estimator = PeakEstimator::new(EstimatorParams::default(), |_: &Hist1D, _: FitWindow| -> FitResult {
            panic!("fit must not be attempted")
        });
        let profile = estimator.estimate(&source).unwrap();
        assert_eq!(profile.get(1), Some(0.0));
        assert_eq!(profile.get(2), Some(4.5));
        assert!(profile.iter().all(|(_, v)| v >= 0.0));
    }

    #[test]
    fn negative_fitted_peak_is_clamped() {
        let mut hist = Hist1D::new(40, -20.0, 20.0);
        for _ in 0..10 {
            hist.fill(-1.5);
            hist.fill(0.5);
        }
        let source = Columns {
            columns: vec![hist],
            row_total: 1.0,
        };
        let estimator = PeakEstimator::new(EstimatorParams::default(), |_: &Hist1D, w: FitWindow| FitResult {
            peak: w.low,
            success: true,
            parameters: vec![],
            chi2: 0.0,
            ndf: 0,
        });
        assert_eq!(estimator.estimate(&source).unwrap().get(1), Some(0.0));
    }

    #[test]
    fn zero_bins_is_an_error() {
        let source = Columns {
            columns: vec![],
            row_total: 0.0,
        };
        let estimator = PeakEstimator::new(EstimatorParams::default(), |_: &Hist1D, _: FitWindow| FitResult::failed());
        assert!(matches!(estimator.estimate(&source), Err(AnalysisError::NoBins)));
    }

    fn grid() -> Hist2D {
        let mut hist = Hist2D::new(Axis::new(5, -2.5, 2.5), Axis::new(100, 0.0, 100.0));
        for ix in 0..5 {
            let x = -2.0 + ix as f64;
            for k in 0..(10 + 20 * ix) {
                hist.fill(x, 20.0 + (k % 7) as f64 * 3.0);
            }
        }
        hist
    }

    fn window_center(_: &Hist1D, w: FitWindow) -> FitResult {
        FitResult {
            peak: 0.5 * (w.low + w.high),
            success: true,
            parameters: vec![],
            chi2: 0.0,
            ndf: 0,
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let source = grid();
        let estimator = PeakEstimator::new(EstimatorParams::default(), window_center);
        let first = estimator.estimate(&source).unwrap();
        let second = estimator.estimate(&source).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[tokio::test]
    async fn parallel_matches_sequential() {
        let source = Arc::new(grid());
        let estimator = Arc::new(PeakEstimator::new(EstimatorParams::default(), window_center));

        let sequential = estimator.estimate(source.as_ref()).unwrap();
        let parallel = Arc::clone(&estimator).estimate_parallel(source).await.unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn profile_to_hist() {
        let source = grid();
        let estimator = PeakEstimator::new(EstimatorParams::default(), window_center);
        let profile = estimator.estimate(&source).unwrap();
        let hist = profile.to_hist(-2.5, 2.5);
        assert_eq!(hist.n_bins(), 5);
        for (bin, value) in profile.iter() {
            assert_eq!(hist.content(bin), value);
        }
    }

    #[test]
    fn params_from_partial_yaml() {
        let path = std::env::temp_dir().join("lgad_analysis_params_test.yaml");
        std::fs::write(&path, "rebin_threshold: 80.0\nfine_rebin: 4\n").unwrap();
        let params = EstimatorParams::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(params.rebin_threshold, 80.0);
        assert_eq!(params.fine_rebin, 4);
        assert_eq!(params.coarse_rebin, 5);
        assert_eq!(params.fit_window(10.0, 2.0), FitWindow::new(8.0, 16.0));
        assert_eq!(params.rebin_factor(60.0), 4);

        assert!(matches!(
            EstimatorParams::load(&path),
            Err(AnalysisError::BadFilePath(_))
        ));
    }
}
