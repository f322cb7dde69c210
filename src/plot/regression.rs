//! Ordinary least squares with an analytic band around the fitted line.
//!
//! The band half-width at `x` is `t · s · sqrt(k + 1/n + (x - x̄)² / Sxx)`
//! with `k = 0` for the confidence band of the mean response and `k = 1` for
//! the prediction band, `s` the residual standard error and `t` the two-sided
//! Student-t quantile with `n - 2` degrees of freedom.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    /// Band for the fitted mean.
    Confidence,
    /// Band for a single new observation.
    Prediction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub n: usize,
    mean_x: f64,
    sxx: f64,
    sse: f64,
}

impl LinearFit {
    /// `None` for fewer than two points or zero variance in x.
    pub fn fit(points: &[(f64, f64)]) -> Option<Self> {
        let n = points.len();
        if n < 2 {
            return None;
        }
        let nf = n as f64;
        let mean_x = points.iter().map(|p| p.0).sum::<f64>() / nf;
        let mean_y = points.iter().map(|p| p.1).sum::<f64>() / nf;
        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for (x, y) in points {
            let dx = x - mean_x;
            let dy = y - mean_y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        if !(sxx > 0.0) || !sxx.is_finite() {
            return None;
        }
        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let sse: f64 = points
            .iter()
            .map(|(x, y)| {
                let r = y - (intercept + slope * x);
                r * r
            })
            .sum();
        let r_squared = if syy > 0.0 { 1.0 - sse / syy } else { 1.0 };
        Some(Self { slope, intercept, r_squared, n, mean_x, sxx, sse })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Half-width of the band at `x`; needs at least three points.
    pub fn half_width(&self, x: f64, level: f64, kind: IntervalKind) -> Option<f64> {
        if self.n < 3 {
            return None;
        }
        let df = (self.n - 2) as f64;
        let t = t_quantile(level, df)?;
        let s = (self.sse / df).sqrt();
        let extra = match kind {
            IntervalKind::Confidence => 0.0,
            IntervalKind::Prediction => 1.0,
        };
        let dx = x - self.mean_x;
        Some(t * s * (extra + 1.0 / self.n as f64 + dx * dx / self.sxx).sqrt())
    }
}

/// Two-sided Student-t quantile for `level` coverage.
pub fn t_quantile(level: f64, df: f64) -> Option<f64> {
    if !(level > 0.0 && level < 1.0) {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let t = dist.inverse_cdf(1.0 - (1.0 - level) / 2.0);
    t.is_finite().then_some(t)
}

/// `n` x-positions spanning `[min, max]`, geometric when `log` is set.
pub fn sample_xs(min: f64, max: f64, n: usize, log: bool) -> Vec<f64> {
    if n < 2 || min >= max {
        return vec![min];
    }
    let steps = (n - 1) as f64;
    if log && min > 0.0 {
        let ratio = max / min;
        (0..n).map(|i| min * ratio.powf(i as f64 / steps)).collect()
    } else {
        (0..n).map(|i| min + (max - min) * i as f64 / steps).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Band {
    pub kind: IntervalKind,
    pub level: f64,
    pub upper: Vec<(f64, f64)>,
    pub lower: Vec<(f64, f64)>,
}

/// Everything the regression layer draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionLayer {
    pub fit: LinearFit,
    /// Fitted line over the observed x range. Two endpoints on a linear x
    /// axis, the band's sample positions on a log x axis.
    pub line: Vec<(f64, f64)>,
    pub band: Option<Band>,
}

pub struct BandSpec {
    pub level: f64,
    pub kind: IntervalKind,
    pub samples: usize,
    pub log_x: bool,
    /// Non-positive y values cannot be drawn and are left out.
    pub log_y: bool,
}

pub fn regression_layer(points: &[(f64, f64)], spec: &BandSpec) -> Option<RegressionLayer> {
    let fit = LinearFit::fit(points)?;
    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let xs = sample_xs(min_x, max_x, spec.samples, spec.log_x);
    let drawable = |p: &(f64, f64)| !spec.log_y || p.1 > 0.0;

    let line_xs = if spec.log_x { xs.clone() } else { vec![min_x, max_x] };
    let line: Vec<(f64, f64)> = line_xs
        .into_iter()
        .map(|x| (x, fit.predict(x)))
        .filter(drawable)
        .collect();

    let mut upper = Vec::new();
    let mut lower = Vec::new();
    for x in xs {
        let Some(h) = fit.half_width(x, spec.level, spec.kind) else {
            break;
        };
        let y = fit.predict(x);
        upper.push((x, y + h));
        lower.push((x, y - h));
    }
    upper.retain(drawable);
    lower.retain(drawable);
    let band = (!upper.is_empty()).then(|| Band {
        kind: spec.kind,
        level: spec.level,
        upper,
        lower,
    });
    Some(RegressionLayer { fit, line, band })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: IntervalKind) -> BandSpec {
        BandSpec { level: 0.95, kind, samples: 5, log_x: false, log_y: false }
    }

    #[test]
    fn test_exact_line() {
        let pts = [(1.0, 3.0), (2.0, 5.0), (3.0, 7.0)];
        let fit = LinearFit::fit(&pts).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(fit.half_width(2.0, 0.95, IntervalKind::Confidence), Some(0.0));
    }

    #[test]
    fn test_degenerate_input() {
        assert!(LinearFit::fit(&[]).is_none());
        assert!(LinearFit::fit(&[(1.0, 1.0)]).is_none());
        assert!(LinearFit::fit(&[(2.0, 1.0), (2.0, 5.0)]).is_none());
        let two = LinearFit::fit(&[(1.0, 1.0), (2.0, 3.0)]).unwrap();
        assert!(two.half_width(1.5, 0.95, IntervalKind::Confidence).is_none());
    }

    #[test]
    fn test_t_quantile_known_values() {
        assert!((t_quantile(0.95, 2.0).unwrap() - 4.302_653).abs() < 1e-3);
        assert!((t_quantile(0.95, 30.0).unwrap() - 2.042_272).abs() < 1e-3);
        assert!(t_quantile(1.5, 3.0).is_none());
    }

    #[test]
    fn test_band_narrowest_at_mean_and_prediction_wider() {
        let pts = [(1.0, 1.2), (2.0, 1.9), (3.0, 3.4), (4.0, 3.9), (5.0, 5.3)];
        let conf = regression_layer(&pts, &spec(IntervalKind::Confidence)).unwrap();
        let pred = regression_layer(&pts, &spec(IntervalKind::Prediction)).unwrap();
        let width = |b: &Band, i: usize| b.upper[i].1 - b.lower[i].1;
        let cb = conf.band.as_ref().unwrap();
        let pb = pred.band.as_ref().unwrap();
        assert_eq!(cb.upper.len(), 5);
        assert!(width(cb, 2) < width(cb, 0));
        assert!(width(cb, 2) < width(cb, 4));
        for i in 0..5 {
            assert!(width(pb, i) > width(cb, i));
        }
        assert_eq!(conf.line[0].0, 1.0);
        assert_eq!(conf.line[1].0, 5.0);
    }

    #[test]
    fn test_band_needs_three_points() {
        let layer = regression_layer(&[(1.0, 1.0), (2.0, 2.5)], &spec(IntervalKind::Confidence)).unwrap();
        assert!(layer.band.is_none());
    }

    #[test]
    fn test_log_axis_line_follows_fit() {
        let pts = [(1.0, 10.0), (10.0, 11.0), (100.0, 30.0), (1000.0, 200.0)];
        let log = BandSpec { level: 0.95, kind: IntervalKind::Confidence, samples: 7, log_x: true, log_y: true };
        let layer = regression_layer(&pts, &log).unwrap();
        assert_eq!(layer.line.len(), 7);
        let at_100 = layer.line.iter().find(|p| (p.0 - 100.0).abs() < 1e-6).unwrap();
        assert!((at_100.1 - layer.fit.predict(100.0)).abs() < 1e-9);
        assert!(at_100.1 < 40.0);
        assert!(layer.band.as_ref().unwrap().upper.iter().all(|p| p.1 > 0.0));
        assert!(layer.band.as_ref().unwrap().lower.iter().all(|p| p.1 > 0.0));
    }

    #[test]
    fn test_log_y_drops_non_positive_predictions() {
        let pts = [(1.0, 1.0), (2.0, 2.0), (3.0, 100.0)];
        let log = BandSpec { level: 0.95, kind: IntervalKind::Confidence, samples: 5, log_x: false, log_y: true };
        let layer = regression_layer(&pts, &log).unwrap();
        assert!(layer.fit.predict(1.0) < 0.0);
        assert_eq!(layer.line.len(), 1);
        assert_eq!(layer.line[0].0, 3.0);
    }

    #[test]
    fn test_sample_xs_log_spacing() {
        let xs = sample_xs(1.0, 100.0, 3, true);
        assert!((xs[1] - 10.0).abs() < 1e-9);
        assert_eq!(sample_xs(0.0, 4.0, 3, false), vec![0.0, 2.0, 4.0]);
        assert_eq!(sample_xs(2.0, 2.0, 10, false), vec![2.0]);
    }
}
