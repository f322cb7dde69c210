//! End-to-end scenarios over small hand-built catalogs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use benchtable::catalog::{Catalog, Category, Column, ColumnKind, Row, RunResult, RunSet, Value};
use benchtable::config::ViewConfig;
use benchtable::filter::{evaluate, ColumnKey, EntryKind, FilterEntry, FilterModel};
use benchtable::location::{LocationStore, MemoryHistory};
use benchtable::plot::quantile::{self, QuantileRequest, Selection};
use benchtable::plot::scatter::{self, AxisSelection, ScatterRequest};
use benchtable::plot::{AxisValue, ScaleKind};
use benchtable::view::TableView;

fn numeric_catalog(values: &[Option<f64>]) -> Catalog {
    let tools = vec![RunSet::new("tool", vec![Column::new("cputime", ColumnKind::Numeric)])];
    let rows = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let id = format!("t{}", i);
            let value = v.map(Value::number).unwrap_or_default();
            Row::new(&[id.as_str()], vec![RunResult::new(Category::Correct, vec![value])])
        })
        .collect();
    Catalog::new(tools, rows)
}

#[test]
fn scenario_a_quantile_ranks_ascending() {
    let cat = numeric_catalog(&[Some(5.0), Some(1.0), Some(3.0)]);
    let rows: Vec<&Row> = cat.rows().iter().collect();
    let plot = quantile::build(&cat, &rows, &QuantileRequest::new(Selection::RunSet { tool_idx: 0 }));
    let series = &plot.series[0];
    let pairs: Vec<(f64, AxisValue)> = series.points.iter().map(|p| (p.x, p.y.clone())).collect();
    assert_eq!(
        pairs,
        vec![
            (1.0, AxisValue::Number(1.0)),
            (2.0, AxisValue::Number(3.0)),
            (3.0, AxisValue::Number(5.0)),
        ]
    );
    let origin: Vec<usize> = series.points.iter().map(|p| p.info.row_idx).collect();
    assert_eq!(origin, vec![1, 2, 0]);
}

#[test]
fn scenario_b_category_expands_to_its_statuses_only() {
    let tools = vec![RunSet::new("tool", vec![Column::new("status", ColumnKind::Status)])];
    let rows = vec![
        Row::new(&["a"], vec![RunResult::new(Category::Correct, vec![Value::text("TRUE")])]),
        Row::new(&["b"], vec![RunResult::new(Category::Wrong, vec![Value::text("FALSE")])]),
        Row::new(&["c"], vec![RunResult::new(Category::Wrong, vec![Value::text("TIMEOUT")])]),
    ];
    let cat = Catalog::new(tools, rows);
    let key = ColumnKey::for_column(cat.column(0, 0).unwrap());
    assert_eq!(key, ColumnKey::new(0, "status", 0));
    let mut model = FilterModel::new();
    model
        .apply(&cat, &FilterEntry::category(key.clone(), Category::Correct))
        .unwrap();

    let entries = model.entries();
    let statuses: Vec<&str> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Status)
        .map(|e| e.value.as_str())
        .collect();
    assert_eq!(statuses, vec!["TRUE"]);
    assert_eq!(evaluate(cat.rows(), &model).len(), 1);
}

#[test]
fn scenario_c_log_scatter_drops_negative_point() {
    let tools = vec![
        RunSet::new("x", vec![Column::new("cputime", ColumnKind::Numeric)]),
        RunSet::new("y", vec![Column::new("cputime", ColumnKind::Numeric)]),
    ];
    let pairs = [(-1.0, 2.0), (1.0, 2.0), (4.0, 8.0)];
    let rows = pairs
        .iter()
        .enumerate()
        .map(|(i, (x, y))| {
            let id = format!("t{}", i);
            Row::new(
                &[id.as_str()],
                vec![
                    RunResult::new(Category::Correct, vec![Value::number(*x)]),
                    RunResult::new(Category::Correct, vec![Value::number(*y)]),
                ],
            )
        })
        .collect();
    let cat = Catalog::new(tools, rows);
    let rows: Vec<&Row> = cat.rows().iter().collect();
    let mut req = ScatterRequest::new(AxisSelection::new(0, 0), AxisSelection::new(1, 0));
    req.scale = ScaleKind::Logarithmic;
    let plot = scatter::build(&cat, &rows, &req, &ViewConfig::default());

    assert!(plot.has_invalid_log);
    let kept: Vec<(AxisValue, AxisValue)> = plot.points.iter().map(|p| (p.x.clone(), p.y.clone())).collect();
    assert_eq!(
        kept,
        vec![
            (AxisValue::Number(1.0), AxisValue::Number(2.0)),
            (AxisValue::Number(4.0), AxisValue::Number(8.0)),
        ]
    );
}

#[test]
fn scenario_d_open_range_excludes_missing() {
    let cat = numeric_catalog(&[Some(5.0), None, Some(7.5), Some(4.99), Some(12.0)]);
    let mut model = FilterModel::new();
    model.set_range(ColumnKey::new(0, "cputime", 0), "5:");
    let kept: Vec<usize> = evaluate(cat.rows(), &model).iter().map(|r| r.idx).collect();
    assert_eq!(kept, vec![0, 2, 4]);
}

#[test]
fn scenario_e_back_restores_prior_row_count() {
    let cat = Arc::new(numeric_catalog(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0), None]));
    let store = MemoryHistory::new("#/?pageSize=50");
    let mut view = TableView::new(cat, store, ViewConfig::default());
    let key = ColumnKey::new(0, "cputime", 0);
    let t0 = Instant::now();

    view.apply(&FilterEntry::range(key.clone(), "2:"), t0).unwrap();
    assert!(view.tick(t0 + Duration::from_secs(1)));
    let before = view.filtered_count();
    assert_eq!(before, 3);

    view.apply(&FilterEntry::range(key, ":1"), t0 + Duration::from_secs(2)).unwrap();
    assert!(view.tick(t0 + Duration::from_secs(3)));
    assert_eq!(view.filtered_count(), 1);

    assert!(view.store_mut().back());
    assert_eq!(view.filtered_count(), before);
    assert_eq!(view.store().read().get("pageSize").as_deref(), Some("50"));
}

#[test]
fn scenario_e_debounce_timer_after_back_does_not_overwrite_history() {
    let cat = Arc::new(numeric_catalog(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]));
    let mut view = TableView::new(cat, MemoryHistory::new("/"), ViewConfig::default());
    let key = ColumnKey::new(0, "cputime", 0);
    let t0 = Instant::now();

    view.apply(&FilterEntry::range(key.clone(), "2:"), t0).unwrap();
    assert!(view.flush());
    view.apply(&FilterEntry::range(key, "4:"), t0).unwrap();
    assert!(view.store_mut().back());

    assert!(!view.tick(t0 + Duration::from_secs(5)));
    assert_eq!(view.store().current(), "/");
    assert_eq!(view.filtered_count(), 5);
    assert!(view.store_mut().forward());
    assert_eq!(view.filtered_count(), 4);
}
