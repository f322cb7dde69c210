//! Scatter plot of two columns paired per task.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Category, Column, ColumnKind, Row};
use crate::config::ViewConfig;
use crate::logging::{log_plot_built, Domain, ProfileScope};

use super::regression::{regression_layer, BandSpec, RegressionLayer};
use super::{AxisValue, PointInfo, ScaleKind};

/// Lower bound of a numeric axis never exceeds this.
const DOMAIN_FLOOR_MIN: f64 = 1.0;
/// Upper bound of a numeric axis is at least this.
const DOMAIN_FLOOR_MAX: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSelection {
    pub tool_idx: usize,
    pub col_idx: usize,
}

impl AxisSelection {
    pub fn new(tool_idx: usize, col_idx: usize) -> Self {
        Self { tool_idx, col_idx }
    }

    /// `"<tool>:<col>"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (tool, col) = s.split_once(':')?;
        Some(Self::new(tool.trim().parse().ok()?, col.trim().parse().ok()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegressionMode {
    None,
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterRequest {
    pub x: AxisSelection,
    pub y: AxisSelection,
    /// Applied to numeric axes; text and status axes are ordinal.
    pub scale: ScaleKind,
    pub correct_only: bool,
    pub regression: RegressionMode,
}

impl ScatterRequest {
    pub fn new(x: AxisSelection, y: AxisSelection) -> Self {
        Self {
            x,
            y,
            scale: ScaleKind::Linear,
            correct_only: false,
            regression: RegressionMode::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: AxisValue,
    pub y: AxisValue,
    pub info: PointInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisDomain {
    pub min: f64,
    pub max: f64,
}

impl AxisDomain {
    fn framing(values: impl Iterator<Item = f64>) -> Self {
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Self {
            min: lo.min(DOMAIN_FLOOR_MIN),
            max: hi.max(DOMAIN_FLOOR_MAX),
        }
    }
}

/// `y = c·x` and `y = x/c`, each as a segment across the domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLines {
    pub factor: f64,
    pub upper: [(f64, f64); 2],
    pub lower: [(f64, f64); 2],
}

impl ReferenceLines {
    pub fn new(domain: AxisDomain, factor: f64) -> Option<Self> {
        if !(factor > 0.0) || !factor.is_finite() {
            return None;
        }
        let (a, b) = (domain.min, domain.max);
        Some(Self {
            factor,
            upper: [(a, a * factor), (b, b * factor)],
            lower: [(a, a / factor), (b, b / factor)],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPlot {
    pub points: Vec<ScatterPoint>,
    pub x_scale: ScaleKind,
    pub y_scale: ScaleKind,
    /// Points were dropped for a non-positive coordinate on a log axis.
    pub has_invalid_log: bool,
    pub x_domain: Option<AxisDomain>,
    pub y_domain: Option<AxisDomain>,
    /// Mode actually in effect; `None` when regression is not applicable.
    pub regression_mode: RegressionMode,
    pub regression: Option<RegressionLayer>,
    pub reference: Option<ReferenceLines>,
}

impl ScatterPlot {
    /// Union of both numeric domains, shared by the reference lines.
    pub fn shared_domain(&self) -> Option<AxisDomain> {
        match (self.x_domain, self.y_domain) {
            (Some(x), Some(y)) => Some(AxisDomain { min: x.min.min(y.min), max: x.max.max(y.max) }),
            _ => None,
        }
    }

    pub fn reference_lines(&self, factor: f64) -> Option<ReferenceLines> {
        ReferenceLines::new(self.shared_domain()?, factor)
    }
}

/// Whether the regression control can be offered for these two columns.
pub fn regression_applicable(x: &Column, y: &Column) -> bool {
    x.kind == ColumnKind::Numeric && y.kind == ColumnKind::Numeric
}

pub fn build(catalog: &Catalog, rows: &[&Row], req: &ScatterRequest, cfg: &ViewConfig) -> ScatterPlot {
    let _scope = ProfileScope::new(Domain::Plot, "scatter");
    let x_col = catalog.column(req.x.tool_idx, req.x.col_idx);
    let y_col = catalog.column(req.y.tool_idx, req.y.col_idx);
    let (Some(x_col), Some(y_col)) = (x_col, y_col) else {
        return empty_plot(req.scale);
    };
    let x_scale = req.scale.effective(x_col.kind);
    let y_scale = req.scale.effective(y_col.kind);

    let mut has_invalid_log = false;
    let mut points = Vec::new();
    for row in rows {
        let (Some(xr), Some(yr)) = (row.result(x_col.tool_idx), row.result(y_col.tool_idx)) else {
            continue;
        };
        if req.correct_only && (xr.category != Category::Correct || yr.category != Category::Correct) {
            continue;
        }
        let x = xr.value(x_col.col_idx).and_then(|v| AxisValue::from_value(v, x_col.kind));
        let y = yr.value(y_col.col_idx).and_then(|v| AxisValue::from_value(v, y_col.kind));
        let (Some(x), Some(y)) = (x, y) else {
            continue;
        };
        let log_x = x_scale == ScaleKind::Logarithmic;
        let log_y = y_scale == ScaleKind::Logarithmic;
        if (log_x && !x.fits_log()) || (log_y && !y.fits_log()) {
            has_invalid_log = true;
            continue;
        }
        points.push(ScatterPoint { x, y, info: PointInfo::for_row(row) });
    }

    let numeric = |vals: Vec<Option<f64>>| -> Option<AxisDomain> {
        let vals: Option<Vec<f64>> = vals.into_iter().collect();
        vals.map(|v| AxisDomain::framing(v.into_iter()))
    };
    let x_domain = numeric(points.iter().map(|p| p.x.as_number()).collect());
    let y_domain = numeric(points.iter().map(|p| p.y.as_number()).collect());

    let regression_mode = match req.regression {
        RegressionMode::Linear
            if regression_applicable(x_col, y_col)
                && x_scale != ScaleKind::Ordinal
                && y_scale != ScaleKind::Ordinal
                && !points.is_empty() =>
        {
            RegressionMode::Linear
        }
        _ => RegressionMode::None,
    };
    let regression = match regression_mode {
        RegressionMode::Linear => {
            let pairs: Vec<(f64, f64)> = points
                .iter()
                .filter_map(|p| Some((p.x.as_number()?, p.y.as_number()?)))
                .collect();
            let spec = BandSpec {
                level: cfg.confidence_level,
                kind: cfg.interval_kind,
                samples: cfg.regression_samples,
                log_x: x_scale == ScaleKind::Logarithmic,
                log_y: y_scale == ScaleKind::Logarithmic,
            };
            regression_layer(&pairs, &spec)
        }
        RegressionMode::None => None,
    };

    let mut plot = ScatterPlot {
        points,
        x_scale,
        y_scale,
        has_invalid_log,
        x_domain,
        y_domain,
        regression_mode,
        regression,
        reference: None,
    };
    plot.reference = plot.reference_lines(cfg.reference_factor);
    log_plot_built(
        "scatter",
        1,
        plot.points.len(),
        &[
            ("has_invalid_log", plot.has_invalid_log),
            ("regression", plot.regression.is_some()),
        ],
    );
    plot
}

fn empty_plot(scale: ScaleKind) -> ScatterPlot {
    ScatterPlot {
        points: Vec::new(),
        x_scale: scale,
        y_scale: scale,
        has_invalid_log: false,
        x_domain: None,
        y_domain: None,
        regression_mode: RegressionMode::None,
        regression: None,
        reference: None,
    }
}
