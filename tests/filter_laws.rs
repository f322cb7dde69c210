//! Randomized checks of the filter laws over seeded catalogs.

use std::collections::BTreeSet;

use benchtable::catalog::{Catalog, Category, Column, ColumnKind, Row, RunResult, RunSet, Value};
use benchtable::codec::{decode, filter_patch};
use benchtable::filter::{evaluate, ColumnKey, FilterEntry, FilterModel, FilterTarget};
use benchtable::location::Location;
use rand::{rngs::StdRng, Rng, SeedableRng};

const SEEDS: u64 = 40;

const OBSERVED: [(Category, &[&str]); 4] = [
    (Category::Correct, &["true", "false"]),
    (Category::Wrong, &["true", "false"]),
    (Category::Error, &["TIMEOUT", "OUT OF MEMORY"]),
    (Category::Unknown, &["unknown"]),
];

fn random_result(rng: &mut StdRng) -> RunResult {
    let roll: f64 = rng.gen();
    if roll < 0.08 {
        return RunResult::new(Category::Aborted, vec![Value::missing(), Value::number(rng.gen_range(0.0..10.0))]);
    }
    if roll < 0.15 {
        return RunResult::new(Category::Empty, vec![Value::missing(), Value::missing()]);
    }
    let (category, statuses) = OBSERVED[rng.gen_range(0..OBSERVED.len())];
    // Some real results carry no status cell at all.
    let status = if rng.gen::<f64>() < 0.1 {
        Value::missing()
    } else {
        Value::text(statuses[rng.gen_range(0..statuses.len())])
    };
    let cpu = if rng.gen::<f64>() < 0.1 {
        Value::missing()
    } else {
        Value::number((rng.gen_range(0.0..100.0f64) * 10.0).round() / 10.0)
    };
    RunResult::new(category, vec![status, cpu])
}

fn random_catalog(rng: &mut StdRng) -> Catalog {
    let columns = || vec![Column::new("status", ColumnKind::Status), Column::new("cpu_time;s", ColumnKind::Numeric)];
    let tools = vec![RunSet::new("first", columns()), RunSet::new("second", columns())];
    let rows = (0..rng.gen_range(5..40))
        .map(|i| {
            let id = format!("dir_{}/task{}.c", i % 3, i);
            Row::new(&[id.as_str()], vec![random_result(rng), random_result(rng)])
        })
        .collect();
    Catalog::new(tools, rows)
}

fn status_key(tool: usize) -> ColumnKey {
    ColumnKey::new(tool, "status", 0)
}

fn cpu_key(tool: usize) -> ColumnKey {
    ColumnKey::new(tool, "cpu_time;s", 1)
}

/// One user interaction on a random target.
fn random_entry(rng: &mut StdRng) -> FilterEntry {
    let tool = rng.gen_range(0..2);
    match rng.gen_range(0..4) {
        0 => FilterEntry::category(status_key(tool), Category::ALL[rng.gen_range(0..Category::ALL.len())]),
        1 => {
            let (_, statuses) = OBSERVED[rng.gen_range(0..OBSERVED.len())];
            FilterEntry::status(status_key(tool), statuses[rng.gen_range(0..statuses.len())])
        }
        2 => {
            let lo = rng.gen_range(0.0..60.0f64).round();
            let literal = match rng.gen_range(0..3) {
                0 => format!("{}:", lo),
                1 => format!(":{}", lo),
                _ => format!("{}:{}", lo, lo + rng.gen_range(1.0..50.0f64).round()),
            };
            FilterEntry::range(cpu_key(tool), &literal)
        }
        _ => FilterEntry::task_id(&format!("dir_{}", rng.gen_range(0..3))),
    }
}

fn random_model(rng: &mut StdRng, cat: &Catalog) -> FilterModel {
    let mut model = FilterModel::new();
    for _ in 0..rng.gen_range(0..5) {
        let _ = model.apply(cat, &random_entry(rng));
    }
    model
}

fn row_set(cat: &Catalog, model: &FilterModel) -> BTreeSet<usize> {
    evaluate(cat.rows(), model).iter().map(|r| r.idx).collect()
}

#[test]
fn url_round_trip_preserves_rows_and_model() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let cat = random_catalog(&mut rng);
        let model = random_model(&mut rng, &cat);

        let mut location = Location::parse("#/?sort=0_cputime_1&pageSize=25");
        location.apply(&filter_patch(&location, &model));
        let reloaded = Location::parse(&location.to_href());
        let (decoded, report) = decode(&cat, &reloaded);

        assert!(report.dropped.is_empty(), "seed {}: {:?}", seed, report.dropped);
        assert_eq!(decoded, model, "seed {}", seed);
        assert_eq!(row_set(&cat, &decoded), row_set(&cat, &model), "seed {}", seed);
        assert_eq!(reloaded.get("sort").as_deref(), Some("0_cputime_1"));
    }
}

#[test]
fn evaluation_is_idempotent() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let cat = random_catalog(&mut rng);
        let model = random_model(&mut rng, &cat);
        let once = evaluate(cat.rows(), &model);
        let twice = evaluate(once.iter().copied(), &model);
        assert_eq!(once, twice, "seed {}", seed);
    }
}

#[test]
fn new_target_never_widens_and_removal_never_narrows() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let cat = random_catalog(&mut rng);
        let model = random_model(&mut rng, &cat);
        let base = row_set(&cat, &model);

        let entry = random_entry(&mut rng);
        if model.get(&entry.target).is_none() {
            let mut narrowed = model.clone();
            let _ = narrowed.apply(&cat, &entry);
            assert!(row_set(&cat, &narrowed).is_subset(&base), "seed {}", seed);
        }

        let targets: Vec<FilterTarget> = model.iter().map(|(t, _)| t.clone()).collect();
        for target in targets {
            let mut widened = model.clone();
            widened.clear(&target);
            assert!(base.is_subset(&row_set(&cat, &widened)), "seed {}", seed);
        }
    }
}

#[test]
fn category_then_status_never_loses_status_rows() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let cat = random_catalog(&mut rng);
        let index = cat.status_index(0, 0).unwrap();
        for category in Category::ALL {
            for status in index.all_statuses() {
                if index.statuses_under(category).contains(&status) {
                    continue;
                }
                let mut alone = FilterModel::new();
                alone.select_status(index, status_key(0), &status);
                let mut combined = FilterModel::new();
                combined.select_category(index, status_key(0), category);
                combined.select_status(index, status_key(0), &status);
                assert!(
                    row_set(&cat, &alone).is_subset(&row_set(&cat, &combined)),
                    "seed {} category {:?} status {}",
                    seed,
                    category,
                    status
                );
            }
        }
    }
}

#[test]
fn show_all_matches_no_filter() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let cat = random_catalog(&mut rng);
        let index = cat.status_index(1, 0).unwrap();
        let mut model = FilterModel::new();
        model.select_all(index, status_key(1));
        assert_eq!(evaluate(cat.rows(), &model).len(), cat.rows().len(), "seed {}", seed);
        assert!(!model.entries().is_empty());
    }
}

#[test]
fn missing_values_never_pass_ranges() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let cat = random_catalog(&mut rng);
        let mut model = FilterModel::new();
        model.set_range(cpu_key(0), ":1000");
        for row in evaluate(cat.rows(), &model) {
            assert!(row.value(0, 1).and_then(Value::finite).is_some(), "seed {}", seed);
        }
    }
}
