use std::time::Duration;

use crate::plot::regression::IntervalKind;

#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    /// Idle time before a pending URL write is flushed.
    pub url_debounce_ms: u64,
    pub confidence_level: f64,
    /// Sample points along each confidence band curve.
    pub regression_samples: usize,
    /// The `c` in the `y = c·x` and `y = x/c` reference lines.
    pub reference_factor: f64,
    pub interval_kind: IntervalKind,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            url_debounce_ms: 500,
            confidence_level: 0.95,
            regression_samples: 100,
            reference_factor: 10.0,
            interval_kind: IntervalKind::Confidence,
        }
    }
}

impl ViewConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            url_debounce_ms: std::env::var("URL_DEBOUNCE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.url_debounce_ms),
            confidence_level: std::env::var("CONFIDENCE_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|l: &f64| *l > 0.0 && *l < 1.0)
                .unwrap_or(d.confidence_level),
            regression_samples: std::env::var("REGRESSION_SAMPLES").ok().and_then(|v| v.parse().ok()).filter(|n: &usize| *n >= 2).unwrap_or(d.regression_samples),
            reference_factor: std::env::var("REFERENCE_FACTOR").ok().and_then(|v| v.parse().ok()).unwrap_or(d.reference_factor),
            interval_kind: match std::env::var("INTERVAL_KIND").as_deref() {
                Ok("prediction") => IntervalKind::Prediction,
                _ => d.interval_kind,
            },
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.url_debounce_ms)
    }
}
