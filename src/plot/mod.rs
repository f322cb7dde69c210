//! Plot series derived from the filtered rows.
//!
//! Both builders are pure functions of `(catalog, filtered rows, request)`.
//! They never fail: unusable values are skipped and surfaced as flags on the
//! returned plot.

pub mod quantile;
pub mod regression;
pub mod scatter;

use serde::{Deserialize, Serialize};

use crate::catalog::{ColumnKind, Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    Linear,
    Logarithmic,
    Ordinal,
}

impl ScaleKind {
    /// Text and status columns are always ranked.
    pub fn effective(self, kind: ColumnKind) -> Self {
        if kind.is_ordinal() {
            ScaleKind::Ordinal
        } else {
            self
        }
    }
}

/// A plotted coordinate: a magnitude, or a label ranked lexicographically.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AxisValue {
    Number(f64),
    Label(String),
}

impl AxisValue {
    /// `None` for missing and non-finite cells.
    pub fn from_value(value: &Value, kind: ColumnKind) -> Option<Self> {
        if kind.is_ordinal() {
            return value.display().map(|s| AxisValue::Label(s.to_string()));
        }
        value.finite().map(AxisValue::Number)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AxisValue::Number(n) => Some(*n),
            AxisValue::Label(_) => None,
        }
    }

    /// Non-positive magnitudes have no place on a log axis.
    pub(crate) fn fits_log(&self) -> bool {
        self.as_number().map(|n| n > 0.0).unwrap_or(true)
    }

    pub(crate) fn cmp_ascending(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (AxisValue::Number(a), AxisValue::Number(b)) => a.total_cmp(b),
            (AxisValue::Label(a), AxisValue::Label(b)) => a.cmp(b),
            (AxisValue::Number(_), AxisValue::Label(_)) => std::cmp::Ordering::Less,
            (AxisValue::Label(_), AxisValue::Number(_)) => std::cmp::Ordering::Greater,
        }
    }
}

/// Identity of the row behind a plotted point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointInfo {
    pub row_idx: usize,
    pub task_id: String,
}

impl PointInfo {
    pub fn for_row(row: &Row) -> Self {
        Self { row_idx: row.idx, task_id: row.display_id() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_forced_for_text_and_status() {
        assert_eq!(ScaleKind::Logarithmic.effective(ColumnKind::Status), ScaleKind::Ordinal);
        assert_eq!(ScaleKind::Linear.effective(ColumnKind::Text), ScaleKind::Ordinal);
        assert_eq!(ScaleKind::Logarithmic.effective(ColumnKind::Numeric), ScaleKind::Logarithmic);
    }

    #[test]
    fn test_axis_value_from_cells() {
        assert_eq!(
            AxisValue::from_value(&Value::number(2.5), ColumnKind::Numeric),
            Some(AxisValue::Number(2.5))
        );
        assert_eq!(AxisValue::from_value(&Value::text("n/a"), ColumnKind::Numeric), None);
        assert_eq!(
            AxisValue::from_value(&Value::text("TRUE"), ColumnKind::Status),
            Some(AxisValue::Label("TRUE".into()))
        );
        assert_eq!(AxisValue::from_value(&Value::missing(), ColumnKind::Status), None);
        assert!(!AxisValue::Number(0.0).fits_log());
        assert!(AxisValue::Label("x".into()).fits_log());
    }
}
