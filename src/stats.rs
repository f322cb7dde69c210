//! Per-column aggregates over the filtered rows.
//!
//! Aggregation is the one computation allowed to run off the interaction
//! path. [`StatsWorker`] hands it to tokio's blocking pool and returns
//! immediately; callers poll and show a placeholder while it is in flight.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::catalog::{Catalog, Category, ColumnKind, Row};
use crate::logging::{log, obj, v_num, Domain, Level, ProfileScope};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatValue {
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub median: Option<f64>,
    pub stdev: Option<f64>,
}

impl StatValue {
    /// A bare count or sum with no distribution.
    pub fn total(sum: f64) -> Self {
        Self { sum, min: None, max: None, avg: None, median: None, stdev: None }
    }

    /// Any NaN poisons every field. Infinite values make the sum, mean and
    /// stdev infinite (or NaN when both signs occur). Stdev is the
    /// population deviation.
    pub fn from_list(values: &[f64]) -> Self {
        if values.iter().any(|v| v.is_nan()) {
            let nan = Some(f64::NAN);
            return Self { sum: f64::NAN, min: nan, max: nan, avg: nan, median: nan, stdev: nan };
        }
        if values.is_empty() {
            return Self::total(0.0);
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        let min = sorted[0];
        let max = sorted[n - 1];

        let (sum, avg, stdev) = if min == f64::NEG_INFINITY && max == f64::INFINITY {
            (f64::NAN, f64::NAN, f64::NAN)
        } else if max == f64::INFINITY {
            (f64::INFINITY, f64::INFINITY, f64::INFINITY)
        } else if min == f64::NEG_INFINITY {
            (f64::NEG_INFINITY, f64::NEG_INFINITY, f64::INFINITY)
        } else {
            let sum: f64 = sorted.iter().sum();
            let mean = sum / n as f64;
            let var = sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
            (sum, mean, var.sqrt())
        };

        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        Self {
            sum,
            min: Some(min),
            max: Some(max),
            avg: Some(avg),
            median: Some(median),
            stdev: Some(stdev),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnStats {
    Numeric {
        tool_idx: usize,
        col_idx: usize,
        title: String,
        total: StatValue,
        correct: StatValue,
        wrong: StatValue,
    },
    Status {
        tool_idx: usize,
        col_idx: usize,
        title: String,
        /// Results with a recorded status.
        total: usize,
        score: f64,
        categories: BTreeMap<Category, usize>,
    },
}

/// Aggregates for every visible non-text column of every visible run set.
pub fn column_stats(catalog: &Catalog, rows: &[&Row]) -> Vec<ColumnStats> {
    let _scope = ProfileScope::new(Domain::Stats, "column_stats");
    let mut out = Vec::new();
    for tool in catalog.visible_tools() {
        let results: Vec<_> = rows.iter().filter_map(|r| r.result(tool.tool_idx)).collect();
        for col in tool.visible_columns() {
            match col.kind {
                ColumnKind::Text => {}
                ColumnKind::Status => {
                    let mut categories = BTreeMap::new();
                    for r in &results {
                        *categories.entry(r.category).or_insert(0) += 1;
                    }
                    out.push(ColumnStats::Status {
                        tool_idx: tool.tool_idx,
                        col_idx: col.col_idx,
                        title: col.title.clone(),
                        total: results
                            .iter()
                            .filter(|r| r.value(col.col_idx).and_then(|v| v.display()).is_some())
                            .count(),
                        score: results.iter().filter_map(|r| r.score).sum(),
                        categories,
                    });
                }
                ColumnKind::Numeric => {
                    let values_where = |keep: &dyn Fn(Category) -> bool| -> Vec<f64> {
                        results
                            .iter()
                            .filter(|r| keep(r.category))
                            .filter_map(|r| r.value(col.col_idx).and_then(|v| v.number))
                            .collect()
                    };
                    out.push(ColumnStats::Numeric {
                        tool_idx: tool.tool_idx,
                        col_idx: col.col_idx,
                        title: col.title.clone(),
                        total: StatValue::from_list(&values_where(&|_| true)),
                        correct: StatValue::from_list(&values_where(&|c| c == Category::Correct)),
                        wrong: StatValue::from_list(&values_where(&|c| c == Category::Wrong)),
                    });
                }
            }
        }
    }
    out
}

// =============================================================================
// Background worker
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StatsState {
    /// Nothing requested yet.
    Idle,
    /// A request is in flight; show a placeholder.
    Pending,
    Ready(Arc<Vec<ColumnStats>>),
}

/// Runs [`column_stats`] on the blocking pool. A new request supersedes the
/// one in flight: its receiver is dropped and its result discarded.
pub struct StatsWorker {
    handle: Handle,
    generation: u64,
    pending: Option<oneshot::Receiver<Vec<ColumnStats>>>,
    latest: Option<Arc<Vec<ColumnStats>>>,
}

impl StatsWorker {
    pub fn new(handle: Handle) -> Self {
        Self { handle, generation: 0, pending: None, latest: None }
    }

    /// Worker on the ambient runtime, if there is one.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Aggregate the catalog rows at `row_indices`.
    pub fn request(&mut self, catalog: Arc<Catalog>, row_indices: Vec<usize>) {
        self.generation += 1;
        let generation = self.generation;
        let (tx, rx) = oneshot::channel();
        self.handle.spawn_blocking(move || {
            let rows: Vec<&Row> = row_indices.iter().filter_map(|&i| catalog.rows().get(i)).collect();
            let stats = column_stats(&catalog, &rows);
            if tx.send(stats).is_err() {
                log(
                    Level::Debug,
                    Domain::Stats,
                    "stats_superseded",
                    obj(&[("generation", v_num(generation as f64))]),
                );
            }
        });
        self.pending = Some(rx);
    }

    /// Non-blocking check for the latest request.
    pub fn poll(&mut self) -> StatsState {
        if let Some(rx) = self.pending.as_mut() {
            match rx.try_recv() {
                Ok(stats) => {
                    self.latest = Some(Arc::new(stats));
                    self.pending = None;
                }
                Err(TryRecvError::Empty) => return StatsState::Pending,
                Err(TryRecvError::Closed) => self.pending = None,
            }
        }
        self.settled()
    }

    /// Wait for the request in flight, if any.
    pub async fn wait(&mut self) -> StatsState {
        if let Some(rx) = self.pending.take() {
            if let Ok(stats) = rx.await {
                self.latest = Some(Arc::new(stats));
            }
        }
        self.settled()
    }

    fn settled(&self) -> StatsState {
        match &self.latest {
            Some(stats) => StatsState::Ready(Arc::clone(stats)),
            None => StatsState::Idle,
        }
    }
}
