//! Landau distribution convolved with a Gaussian.
//!
//! Parameters follow the usual convention `[width, mpv, area, gsigma]`:
//! `width` is the Landau scale, `mpv` the most probable value of the Landau
//! component, `area` the integral and `gsigma` the Gaussian smearing.

use crate::{
    estimator::{FitResult, FitWindow, PeakFitter},
    histogram::Hist1D,
    minimize::nelder_mead,
};

/// Location of the Landau maximum relative to its location parameter.
pub const MPSHIFT: f64 = -0.222_782_98;

const CONVOLUTION_STEPS: usize = 100;
const CONVOLUTION_SIGMAS: f64 = 5.0;
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

fn ratio(p: &[f64; 5], q: &[f64; 5], x: f64) -> f64 {
    (p[0] + (p[1] + (p[2] + (p[3] + p[4] * x) * x) * x) * x)
        / (q[0] + (q[1] + (q[2] + (q[3] + q[4] * x) * x) * x) * x)
}

/// Standard Landau density (CERNLIB DENLAN).
pub fn landau_density(v: f64) -> f64 {
    const P1: [f64; 5] = [0.4259894875, -0.1249762550, 0.03984243700, -0.006298287635, 0.001511162253];
    const Q1: [f64; 5] = [1.0, -0.3388260629, 0.09594393323, -0.01608042283, 0.003778942063];
    const P2: [f64; 5] = [0.1788541609, 0.1173957403, 0.01488850518, -0.001394989411, 0.0001283617211];
    const Q2: [f64; 5] = [1.0, 0.7428795082, 0.3153932961, 0.06694219548, 0.008790609714];
    const P3: [f64; 5] = [0.1788544503, 0.09359161662, 0.006325387654, 0.00006611667319, -0.000002031049101];
    const Q3: [f64; 5] = [1.0, 0.6097809921, 0.2560616665, 0.04746722384, 0.006957301675];
    const P4: [f64; 5] = [0.9874054407, 118.6723273, 849.2794360, -743.7792444, 427.0262186];
    const Q4: [f64; 5] = [1.0, 106.8615961, 337.6496214, 2016.712389, 1597.063511];
    const P5: [f64; 5] = [1.003675074, 167.5702434, 4789.711289, 21217.86767, -22324.94910];
    const Q5: [f64; 5] = [1.0, 156.9424537, 3745.310488, 9834.698876, 66924.28357];
    const P6: [f64; 5] = [1.000827619, 664.9143136, 62972.92665, 475554.6998, -5743609.109];
    const Q6: [f64; 5] = [1.0, 651.4101098, 56974.73333, 165917.4725, -2815759.939];
    const A1: [f64; 3] = [0.04166666667, -0.01996527778, 0.02709538966];
    const A2: [f64; 2] = [-1.845568670, -4.284640743];

    if v.is_nan() {
        return 0.0;
    }
    if v < -5.5 {
        let u = (v + 1.0).exp();
        if u < 1e-10 {
            return 0.0;
        }
        let ue = (-1.0 / u).exp();
        let us = u.sqrt();
        INV_SQRT_2PI * (ue / us) * (1.0 + (A1[0] + (A1[1] + A1[2] * u) * u) * u)
    } else if v < -1.0 {
        let u = (-v - 1.0).exp();
        (-u).exp() * u.sqrt() * ratio(&P1, &Q1, v)
    } else if v < 1.0 {
        ratio(&P2, &Q2, v)
    } else if v < 5.0 {
        ratio(&P3, &Q3, v)
    } else if v < 12.0 {
        let u = 1.0 / v;
        u * u * ratio(&P4, &Q4, u)
    } else if v < 50.0 {
        let u = 1.0 / v;
        u * u * ratio(&P5, &Q5, u)
    } else if v < 300.0 {
        let u = 1.0 / v;
        u * u * ratio(&P6, &Q6, u)
    } else {
        let u = 1.0 / (v - v * v.ln() / (v + 1.0));
        u * u * (1.0 + (A2[0] + A2[1] * u) * u)
    }
}

/// Normalized Landau density with location `x0` and scale `xi`.
pub fn landau_pdf(x: f64, x0: f64, xi: f64) -> f64 {
    if xi <= 0.0 {
        return 0.0;
    }
    landau_density((x - x0) / xi) / xi
}

/// Value of the convolution at `x`.
pub fn langaus(x: f64, par: &[f64]) -> f64 {
    let (width, mpv, area, gsigma) = (par[0], par[1], par[2], par[3]);
    if width <= 0.0 || gsigma <= 0.0 {
        return 0.0;
    }
    let location = mpv - MPSHIFT * width;

    let low = x - CONVOLUTION_SIGMAS * gsigma;
    let high = x + CONVOLUTION_SIGMAS * gsigma;
    let step = (high - low) / CONVOLUTION_STEPS as f64;

    let gauss = |xx: f64| {
        let t = (x - xx) / gsigma;
        (-0.5 * t * t).exp()
    };

    let sum: f64 = (1..=CONVOLUTION_STEPS / 2)
        .map(|i| {
            let offset = (i as f64 - 0.5) * step;
            let left = low + offset;
            let right = high - offset;
            landau_pdf(left, location, width) * gauss(left)
                + landau_pdf(right, location, width) * gauss(right)
        })
        .sum();

    area * step * sum * INV_SQRT_2PI / gsigma
}

/// Chi-square fit of [`langaus`] to the non-empty bins inside the window.
#[derive(Debug, Clone, Copy)]
pub struct LanGausFit {
    pub max_evals: usize,
    pub tolerance: f64,
}

impl Default for LanGausFit {
    fn default() -> Self {
        LanGausFit {
            max_evals: 4000,
            tolerance: 1e-8,
        }
    }
}

impl LanGausFit {
    pub const N_PARAMS: usize = 4;

    /// `(x, langaus(x))` sampled at `n` points over `[low, high]`, for drawing.
    pub fn curve(params: &[f64], low: f64, high: f64, n: usize) -> Vec<(f64, f64)> {
        let n = n.max(2);
        (0..n)
            .map(|i| {
                let x = low + (high - low) * i as f64 / (n - 1) as f64;
                (x, langaus(x, params))
            })
            .collect()
    }

    fn start_values(points: &[(f64, f64)], hist: &Hist1D, window: FitWindow) -> Option<[f64; 4]> {
        let peak_bin = hist.maximum_bin_in(window.low, window.high)?;
        let spread = window.width() / 10.0;
        if spread <= 0.0 || !spread.is_finite() {
            return None;
        }
        let area = points.iter().map(|(_, y)| y).sum::<f64>() * hist.axis.bin_width();
        Some([spread, hist.axis.bin_center(peak_bin), area, spread])
    }
}

impl PeakFitter for LanGausFit {
    fn fit(&self, hist: &Hist1D, window: FitWindow) -> FitResult {
        let points: Vec<(f64, f64)> = hist
            .bins()
            .filter(|(x, y)| window.contains(*x) && *y > 0.0)
            .collect();
        if points.len() <= Self::N_PARAMS {
            return FitResult::failed();
        }
        let Some(start) = Self::start_values(&points, hist, window) else {
            return FitResult::failed();
        };

        let chi2 = |p: &[f64]| -> f64 {
            if p[0] <= 0.0 || p[2] <= 0.0 || p[3] <= 0.0 {
                return f64::INFINITY;
            }
            points
                .iter()
                .map(|(x, y)| {
                    let r = y - langaus(*x, p);
                    r * r / y
                })
                .sum()
        };

        let steps = [
            0.5 * start[0],
            hist.axis.bin_width().max(0.5 * start[0]),
            0.2 * start[2],
            0.5 * start[3],
        ];
        let first = nelder_mead(chi2, &start, &steps, self.max_evals, self.tolerance);
        // restart from the minimum to escape a collapsed simplex
        let restart_steps: Vec<f64> = first
            .x
            .iter()
            .zip(&steps)
            .map(|(x, s)| (0.1 * x.abs()).max(1e-3 * s))
            .collect();
        let best = nelder_mead(chi2, &first.x, &restart_steps, self.max_evals, self.tolerance);

        let params = best.x;
        let valid = best.converged
            && params.iter().all(|p| p.is_finite())
            && params[0] > 0.0
            && params[3] > 0.0
            && window.contains(params[1]);

        FitResult {
            peak: params[1],
            success: valid,
            chi2: best.fx,
            ndf: points.len() - Self::N_PARAMS,
            parameters: params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landau_density_shape() {
        assert!((landau_density(0.0) - 0.178_854_160_9).abs() < 1e-9);
        let peak = landau_density(MPSHIFT);
        assert!(peak > landau_density(MPSHIFT - 0.1));
        assert!(peak > landau_density(MPSHIFT + 0.1));
        assert!((peak - 0.1806).abs() < 1e-3);
        assert_eq!(landau_density(-30.0), 0.0);
        assert_eq!(landau_pdf(1.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn landau_density_is_normalized() {
        let mut integral = 0.0;
        let mut v = -10.0;
        while v < 50.0 {
            integral += landau_density(v + 0.0005) * 0.001;
            v += 0.001;
        }
        while v < 2000.0 {
            integral += landau_density(v + 0.05) * 0.1;
            v += 0.1;
        }
        // the tail beyond v behaves like 1/v
        assert!(integral > 0.995 && integral < 1.0, "{integral}");
    }

    #[test]
    fn convolution_keeps_area() {
        let par = [2.0, 40.0, 500.0, 3.0];
        let step = 0.05;
        let integral: f64 = (0..20_000).map(|i| langaus(-20.0 + i as f64 * step, &par) * step).sum();
        // the Landau tail beyond x = 980 holds about 0.2% of the area
        assert!((integral / 500.0 - 0.998).abs() < 0.003, "{integral}");
    }

    fn synthetic(par: &[f64]) -> Hist1D {
        let mut hist = Hist1D::new(100, 0.0, 200.0);
        for bin in 1..=hist.n_bins() {
            let x = hist.axis.bin_center(bin);
            hist.set_content(bin, langaus(x, par) * hist.axis.bin_width());
        }
        hist.set_entries(hist.integral());
        hist
    }

    #[test]
    fn recovers_most_probable_value() {
        let truth = [3.0, 42.0, 20_000.0, 4.0];
        let hist = synthetic(&truth);
        let window = FitWindow::new(hist.mean() - hist.rms(), hist.mean() + 3.0 * hist.rms());

        let result = LanGausFit::default().fit(&hist, window);
        assert!(result.success, "{result:?}");
        assert!((result.peak - 42.0).abs() < 0.5, "{result:?}");
        assert_eq!(result.parameters.len(), 4);
    }

    #[test]
    fn too_few_points_fail() {
        let mut hist = Hist1D::new(100, 0.0, 100.0);
        for _ in 0..50 {
            hist.fill(10.5);
            hist.fill(11.5);
        }
        let result = LanGausFit::default().fit(&hist, FitWindow::new(9.0, 14.0));
        assert!(!result.success);
        assert!(result.peak.is_nan());
    }
}
