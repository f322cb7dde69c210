//! Quantile plot series.
//!
//! Plain quantile mode sorts each series ascending and uses the 1-based rank
//! as x. Direct mode keeps the filtered row order. Score-based mode only
//! plots correct results and advances x by each result's score, starting
//! from the summed scores of wrong results.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Category, Column, ColumnKind, Row};
use crate::logging::{log_plot_built, Domain, ProfileScope};

use super::{AxisValue, PointInfo, ScaleKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum Selection {
    /// One column title compared across every visible run set having it.
    Value { title: String },
    /// Every non-text visible column of one run set.
    RunSet { tool_idx: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotMode {
    Quantile,
    Direct,
    ScoreBased,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantileRequest {
    pub selection: Selection,
    pub plot_mode: PlotMode,
    pub scale: ScaleKind,
    pub correct_only: bool,
}

impl QuantileRequest {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            plot_mode: PlotMode::Quantile,
            scale: ScaleKind::Linear,
            correct_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantilePoint {
    pub x: f64,
    pub y: AxisValue,
    pub info: PointInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantileSeries {
    pub label: String,
    pub tool_idx: usize,
    pub col_idx: usize,
    pub kind: ColumnKind,
    pub scale: ScaleKind,
    pub points: Vec<QuantilePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantilePlot {
    pub series: Vec<QuantileSeries>,
    /// Mode actually used; score-based falls back to quantile.
    pub plot_mode: PlotMode,
    /// Non-positive values were dropped from a log-scaled series.
    pub values_hidden: bool,
    pub score_unavailable: bool,
}

impl QuantilePlot {
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// Columns taking part in the plot, in run-set order.
pub fn selected_columns<'a>(catalog: &'a Catalog, selection: &Selection) -> Vec<&'a Column> {
    match selection {
        Selection::Value { title } => catalog
            .visible_tools()
            .filter_map(|tool| tool.visible_columns().find(|c| &c.title == title))
            .collect(),
        Selection::RunSet { tool_idx } => catalog
            .tool(*tool_idx)
            .map(|tool| tool.visible_columns().filter(|c| c.kind != ColumnKind::Text).collect())
            .unwrap_or_default(),
    }
}

/// Score-based plots need a score from every visible run set on every row.
pub fn scores_available(catalog: &Catalog, rows: &[&Row]) -> bool {
    catalog.visible_tools().all(|tool| {
        rows.iter()
            .all(|row| row.result(tool.tool_idx).and_then(|r| r.score).is_some())
    })
}

pub fn build(catalog: &Catalog, rows: &[&Row], req: &QuantileRequest) -> QuantilePlot {
    let _scope = ProfileScope::new(Domain::Plot, "quantile");
    let mut plot_mode = req.plot_mode;
    let mut score_unavailable = false;
    if plot_mode == PlotMode::ScoreBased && !scores_available(catalog, rows) {
        plot_mode = PlotMode::Quantile;
        score_unavailable = true;
    }
    let correct_only = req.correct_only || plot_mode == PlotMode::ScoreBased;

    let mut values_hidden = false;
    let mut series = Vec::new();
    for column in selected_columns(catalog, &req.selection) {
        let scale = req.scale.effective(column.kind);
        let mut kept: Vec<(usize, AxisValue, &Row)> = Vec::new();
        for (pos, row) in rows.iter().enumerate() {
            let Some(result) = row.result(column.tool_idx) else {
                continue;
            };
            if correct_only && result.category != Category::Correct {
                continue;
            }
            let Some(y) = result
                .value(column.col_idx)
                .and_then(|v| AxisValue::from_value(v, column.kind))
            else {
                continue;
            };
            if scale == ScaleKind::Logarithmic && !y.fits_log() {
                values_hidden = true;
                continue;
            }
            kept.push((pos + 1, y, row));
        }

        let points = match plot_mode {
            PlotMode::Direct => kept
                .into_iter()
                .map(|(pos, y, row)| QuantilePoint { x: pos as f64, y, info: PointInfo::for_row(row) })
                .collect(),
            PlotMode::Quantile => {
                kept.sort_by(|a, b| a.1.cmp_ascending(&b.1));
                kept.into_iter()
                    .enumerate()
                    .map(|(i, (_, y, row))| QuantilePoint {
                        x: (i + 1) as f64,
                        y,
                        info: PointInfo::for_row(row),
                    })
                    .collect()
            }
            PlotMode::ScoreBased => {
                let mut x: f64 = rows
                    .iter()
                    .filter_map(|row| row.result(column.tool_idx))
                    .filter(|r| r.category == Category::Wrong)
                    .filter_map(|r| r.score)
                    .sum();
                kept.sort_by(|a, b| a.1.cmp_ascending(&b.1));
                kept.into_iter()
                    .map(|(_, y, row)| {
                        x += row.result(column.tool_idx).and_then(|r| r.score).unwrap_or(0.0);
                        QuantilePoint { x, y, info: PointInfo::for_row(row) }
                    })
                    .collect()
            }
        };

        let tool_name = catalog.tool(column.tool_idx).map(|t| t.name.as_str()).unwrap_or("");
        series.push(QuantileSeries {
            label: format!("{} {}", tool_name, column.title),
            tool_idx: column.tool_idx,
            col_idx: column.col_idx,
            kind: column.kind,
            scale,
            points,
        });
    }

    let plot = QuantilePlot { series, plot_mode, values_hidden, score_unavailable };
    log_plot_built(
        "quantile",
        plot.series.len(),
        plot.point_count(),
        &[("values_hidden", values_hidden), ("score_unavailable", score_unavailable)],
    );
    plot
}
