//! Pure filter evaluation.
//!
//! A row passes iff every filtered target is satisfied. Missing values
//! never satisfy a text or range predicate. A result with no recorded
//! status (`aborted`/`empty`, or a blank cell) only passes a status column
//! through its category facet.

use crate::catalog::{Row, RunResult};
use crate::logging::{Domain, ProfileScope};

use super::{ColumnFilter, ColumnKey, FilterModel, FilterTarget, StatusSelection};

/// Rows of `rows` that pass `model`, in input order.
pub fn evaluate<'a, I>(rows: I, model: &FilterModel) -> Vec<&'a Row>
where
    I: IntoIterator<Item = &'a Row>,
{
    let _scope = ProfileScope::new(Domain::Filter, "evaluate");
    rows.into_iter().filter(|row| matches(row, model)).collect()
}

pub fn matches(row: &Row, model: &FilterModel) -> bool {
    model.iter().all(|(target, filter)| match target {
        FilterTarget::TaskId => match filter {
            ColumnFilter::Text(needle) => row.task_id.iter().any(|id| id.contains(needle.as_str())),
            _ => true,
        },
        FilterTarget::Column(key) => matches_column(row, key, filter),
    })
}

fn matches_column(row: &Row, key: &ColumnKey, filter: &ColumnFilter) -> bool {
    let Some(result) = row.result(key.tool_idx) else {
        return false;
    };
    let value = result.value(key.col_idx);
    match filter {
        ColumnFilter::Text(needle) => value
            .and_then(|v| v.display())
            .map(|raw| raw.contains(needle.as_str()))
            .unwrap_or(false),
        ColumnFilter::Range(range) => value
            .and_then(|v| v.finite())
            .map(|n| range.contains(n))
            .unwrap_or(false),
        ColumnFilter::Status(sel) => matches_status(result, key.col_idx, sel),
    }
}

fn matches_status(result: &RunResult, col_idx: usize, sel: &StatusSelection) -> bool {
    if !sel.categories.is_empty() && !sel.categories.contains(&result.category) {
        return false;
    }
    let status = result
        .value(col_idx)
        .and_then(|v| v.display())
        .filter(|_| result.category.is_real());
    match status {
        Some(status) => sel.statuses.is_empty() || sel.statuses.contains(status),
        None => !sel.categories.is_empty(),
    }
}
