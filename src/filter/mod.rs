//! Filter model: which predicates are active on which columns.
//!
//! The model never holds row data. It maps each filter target (a task-id
//! column or a `(tool, name, column)` key) to exactly one [`ColumnFilter`].
//! Status columns hold a [`StatusSelection`] with two facets, categories and
//! raw statuses, so the OR-within-a-column semantics is a property of the
//! data structure rather than of duplicated entries in a flat list.
//!
//! The flat [`FilterEntry`] list is what crosses the boundary to views and
//! the URL codec. On status columns the category facet is marked by a
//! trailing space in the entry value (`"correct "` vs. `"TRUE"`).

pub mod eval;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Category, Column, ColumnKind, StatusIndex};

pub use eval::{evaluate, matches};

/// Marks a category value on a status column.
pub const CATEGORY_SENTINEL: char = ' ';

// =============================================================================
// Keys and entries
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    pub tool_idx: usize,
    pub name: String,
    pub col_idx: usize,
}

impl ColumnKey {
    pub fn new(tool_idx: usize, name: &str, col_idx: usize) -> Self {
        Self { tool_idx, name: name.to_string(), col_idx }
    }

    pub fn for_column(col: &Column) -> Self {
        Self::new(col.tool_idx, &col.title, col.col_idx)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.tool_idx, self.name, self.col_idx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterTarget {
    /// The task-id column shared by all run sets.
    TaskId,
    Column(ColumnKey),
}

impl From<ColumnKey> for FilterTarget {
    fn from(key: ColumnKey) -> Self {
        FilterTarget::Column(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Category,
    Status,
    Range,
    Text,
}

impl EntryKind {
    /// Dispatch on column kind; the trailing-space sentinel decides between
    /// the two facets of a status column.
    pub fn classify(kind: ColumnKind, value: &str) -> Self {
        match kind {
            ColumnKind::Status if value.ends_with(CATEGORY_SENTINEL) => EntryKind::Category,
            ColumnKind::Status => EntryKind::Status,
            ColumnKind::Numeric => EntryKind::Range,
            ColumnKind::Text => EntryKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub target: FilterTarget,
    pub value: String,
    pub kind: EntryKind,
}

impl FilterEntry {
    pub fn task_id(value: &str) -> Self {
        Self { target: FilterTarget::TaskId, value: value.to_string(), kind: EntryKind::Text }
    }

    pub fn text(key: ColumnKey, value: &str) -> Self {
        Self { target: key.into(), value: value.to_string(), kind: EntryKind::Text }
    }

    pub fn range(key: ColumnKey, value: &str) -> Self {
        Self { target: key.into(), value: value.to_string(), kind: EntryKind::Range }
    }

    pub fn category(key: ColumnKey, category: Category) -> Self {
        Self {
            target: key.into(),
            value: format!("{}{}", category.as_str(), CATEGORY_SENTINEL),
            kind: EntryKind::Category,
        }
    }

    pub fn status(key: ColumnKey, status: &str) -> Self {
        Self { target: key.into(), value: status.to_string(), kind: EntryKind::Status }
    }

    /// Entry with the kind derived from the column kind and value.
    pub fn for_column(key: ColumnKey, column_kind: ColumnKind, value: &str) -> Self {
        let kind = EntryKind::classify(column_kind, value);
        Self { target: key.into(), value: value.to_string(), kind }
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// `min:max` with either side optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Range {
    /// Unparsable bounds are unbounded. Returns `None` when neither side
    /// constrains anything. A bare number means `x:x`.
    pub fn parse(value: &str) -> Option<Self> {
        let (min, max) = match value.split_once(':') {
            Some((lo, hi)) => (parse_bound(lo), parse_bound(hi)),
            None => {
                let exact = parse_bound(value);
                (exact, exact)
            }
        };
        if min.is_none() && max.is_none() {
            return None;
        }
        Some(Self { min, max })
    }

    pub fn contains(&self, v: f64) -> bool {
        v.is_finite()
            && self.min.map(|m| v >= m).unwrap_or(true)
            && self.max.map(|m| v <= m).unwrap_or(true)
    }

    pub fn to_literal(&self) -> String {
        let side = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_default();
        format!("{}:{}", side(self.min), side(self.max))
    }
}

fn parse_bound(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Categories and statuses selected on one status column. A row passes
/// when it matches each non-empty facet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSelection {
    pub categories: BTreeSet<Category>,
    pub statuses: BTreeSet<String>,
}

impl StatusSelection {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.statuses.is_empty()
    }

    /// The "show all" cross product for this column.
    pub fn all(index: &StatusIndex) -> Self {
        Self {
            categories: Category::ALL.iter().copied().collect(),
            statuses: index.all_statuses(),
        }
    }

    pub fn is_all(&self, index: &StatusIndex) -> bool {
        self.categories.len() == Category::ALL.len()
            && index.all_statuses().is_subset(&self.statuses)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnFilter {
    Text(String),
    Range(Range),
    Status(StatusSelection),
}

/// Why an entry could not become part of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedEntry {
    pub entry: String,
    pub reason: String,
}

impl DroppedEntry {
    pub fn new(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { entry: entry.into(), reason: reason.into() }
    }
}

// =============================================================================
// Filter model
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterModel {
    filters: BTreeMap<FilterTarget, ColumnFilter>,
}

impl FilterModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Number of distinct filtered targets.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn get(&self, target: &FilterTarget) -> Option<&ColumnFilter> {
        self.filters.get(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FilterTarget, &ColumnFilter)> {
        self.filters.iter()
    }

    /// Drop every entry for this target.
    pub fn clear(&mut self, target: &FilterTarget) {
        self.filters.remove(target);
    }

    /// Substring filter; last write wins, blank removes.
    pub fn set_text(&mut self, target: FilterTarget, value: &str) {
        if value.trim().is_empty() {
            self.filters.remove(&target);
        } else {
            self.filters.insert(target, ColumnFilter::Text(value.to_string()));
        }
    }

    /// Range filter; last write wins. A value with no usable bound removes
    /// the filter.
    pub fn set_range(&mut self, key: ColumnKey, value: &str) {
        let target = FilterTarget::Column(key);
        match Range::parse(value) {
            Some(range) => {
                self.filters.insert(target, ColumnFilter::Range(range));
            }
            None => {
                self.filters.remove(&target);
            }
        }
    }

    /// Edit the status selection for `key`, replacing any other filter
    /// kind on that target.
    fn with_selection(&mut self, key: ColumnKey, edit: impl FnOnce(&mut StatusSelection)) {
        let target = FilterTarget::Column(key);
        let mut sel = match self.filters.remove(&target) {
            Some(ColumnFilter::Status(sel)) => sel,
            _ => StatusSelection::default(),
        };
        edit(&mut sel);
        self.filters.insert(target, ColumnFilter::Status(sel));
    }

    /// Select category `c`: materializes `c` plus every status observed
    /// under `c` on this column.
    pub fn select_category(&mut self, index: &StatusIndex, key: ColumnKey, category: Category) {
        let statuses = index.statuses_under(category);
        self.with_selection(key, |sel| {
            sel.categories.insert(category);
            sel.statuses.extend(statuses);
        });
    }

    /// Select status `s`: materializes `s` plus every category containing
    /// `s`. Returns `false` for a status never observed on this column.
    pub fn select_status(&mut self, index: &StatusIndex, key: ColumnKey, status: &str) -> bool {
        let categories = index.categories_with(status);
        if categories.is_empty() {
            return false;
        }
        self.with_selection(key, |sel| {
            sel.statuses.insert(status.to_string());
            sel.categories.extend(categories);
        });
        true
    }

    /// Record the full cross product so "all" shows as an operative state.
    pub fn select_all(&mut self, index: &StatusIndex, key: ColumnKey) {
        self.filters
            .insert(FilterTarget::Column(key), ColumnFilter::Status(StatusSelection::all(index)));
    }

    /// One user interaction on one column, dispatched on the column kind.
    /// A blank value clears the column.
    pub fn apply(&mut self, catalog: &Catalog, entry: &FilterEntry) -> Result<(), DroppedEntry> {
        if entry.value.trim().is_empty() {
            self.clear(&entry.target);
            return Ok(());
        }
        let key = match &entry.target {
            FilterTarget::TaskId => {
                self.set_text(FilterTarget::TaskId, &entry.value);
                return Ok(());
            }
            FilterTarget::Column(key) => key.clone(),
        };
        let column = resolve_column(catalog, &key).map_err(|r| DroppedEntry::new(&entry.value, r))?;
        match EntryKind::classify(column.kind, &entry.value) {
            EntryKind::Text => self.set_text(key.into(), &entry.value),
            EntryKind::Range => self.set_range(key, &entry.value),
            EntryKind::Category => {
                let index = status_index(catalog, &key)?;
                let category = parse_category(&entry.value)?;
                self.select_category(index, key, category);
            }
            EntryKind::Status => {
                let index = status_index(catalog, &key)?;
                if !self.select_status(index, key, &entry.value) {
                    return Err(DroppedEntry::new(&entry.value, "unknown status"));
                }
            }
        }
        Ok(())
    }

    /// Rebuild a model from already materialized entries (as listed by
    /// [`FilterModel::entries`]). No expansion happens here; entries that
    /// do not fit the catalog are dropped individually.
    pub fn from_entries(catalog: &Catalog, entries: &[FilterEntry]) -> (Self, Vec<DroppedEntry>) {
        let mut model = Self::new();
        let mut dropped = Vec::new();
        for entry in entries {
            if let Err(d) = model.insert_materialized(catalog, entry) {
                dropped.push(d);
            }
        }
        (model, dropped)
    }

    fn insert_materialized(&mut self, catalog: &Catalog, entry: &FilterEntry) -> Result<(), DroppedEntry> {
        let key = match &entry.target {
            FilterTarget::TaskId => {
                if entry.value.is_empty() {
                    return Err(DroppedEntry::new("id", "empty value"));
                }
                self.set_text(FilterTarget::TaskId, &entry.value);
                return Ok(());
            }
            FilterTarget::Column(key) => key.clone(),
        };
        let column = resolve_column(catalog, &key).map_err(|r| DroppedEntry::new(key.to_string(), r))?;
        let label = format!("{}:{}", key, entry.value);
        match EntryKind::classify(column.kind, &entry.value) {
            EntryKind::Text => {
                if entry.value.is_empty() {
                    return Err(DroppedEntry::new(label, "empty value"));
                }
                self.set_text(key.into(), &entry.value);
            }
            EntryKind::Range => match Range::parse(&entry.value) {
                Some(range) => {
                    self.filters.insert(key.into(), ColumnFilter::Range(range));
                }
                None => return Err(DroppedEntry::new(label, "no numeric bound")),
            },
            EntryKind::Category => {
                let category = parse_category(&entry.value).map_err(|d| DroppedEntry::new(label, d.reason))?;
                self.with_selection(key, |sel| {
                    sel.categories.insert(category);
                });
            }
            EntryKind::Status => {
                let known = status_index(catalog, &key)
                    .map(|idx| idx.contains_status(&entry.value))
                    .unwrap_or(false);
                if !known {
                    return Err(DroppedEntry::new(label, "unknown status"));
                }
                self.with_selection(key, |sel| {
                    sel.statuses.insert(entry.value.clone());
                });
            }
        }
        Ok(())
    }

    /// Flat list of active entries, ordered by target.
    pub fn entries(&self) -> Vec<FilterEntry> {
        let mut out = Vec::new();
        for (target, filter) in &self.filters {
            match (target, filter) {
                (FilterTarget::TaskId, ColumnFilter::Text(v)) => out.push(FilterEntry::task_id(v)),
                (FilterTarget::Column(key), ColumnFilter::Text(v)) => {
                    out.push(FilterEntry::text(key.clone(), v))
                }
                (FilterTarget::Column(key), ColumnFilter::Range(r)) => {
                    out.push(FilterEntry::range(key.clone(), &r.to_literal()))
                }
                (FilterTarget::Column(key), ColumnFilter::Status(sel)) => {
                    for c in &sel.categories {
                        out.push(FilterEntry::category(key.clone(), *c));
                    }
                    for s in &sel.statuses {
                        out.push(FilterEntry::status(key.clone(), s));
                    }
                }
                (FilterTarget::TaskId, _) => {}
            }
        }
        out
    }
}

fn resolve_column<'a>(catalog: &'a Catalog, key: &ColumnKey) -> Result<&'a Column, &'static str> {
    match catalog.column(key.tool_idx, key.col_idx) {
        Some(col) if col.title == key.name => Ok(col),
        Some(_) => Err("column name does not match index"),
        None => Err("no such column"),
    }
}

fn status_index<'a>(catalog: &'a Catalog, key: &ColumnKey) -> Result<&'a StatusIndex, DroppedEntry> {
    catalog
        .status_index(key.tool_idx, key.col_idx)
        .ok_or_else(|| DroppedEntry::new(key.to_string(), "not a status column"))
}

fn parse_category(value: &str) -> Result<Category, DroppedEntry> {
    let name = value.strip_suffix(CATEGORY_SENTINEL).unwrap_or(value);
    Category::parse(name).ok_or_else(|| DroppedEntry::new(value, "unknown category"))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, Row, RunResult, RunSet, Value};

    /// Status column with TRUE under correct, FALSE and TIMEOUT under wrong.
    fn catalog() -> Catalog {
        let tools = vec![RunSet::new(
            "tool",
            vec![
                Column::new("status", ColumnKind::Status),
                Column::new("cputime", ColumnKind::Numeric),
                Column::new("host", ColumnKind::Text),
            ],
        )];
        let row = |id: &str, cat: Category, status: &str, t: f64| {
            Row::new(&[id], vec![RunResult::new(cat, vec![Value::text(status), Value::number(t), Value::text("h1")])])
        };
        let rows = vec![
            row("a", Category::Correct, "TRUE", 1.0),
            row("b", Category::Wrong, "FALSE", 2.0),
            row("c", Category::Wrong, "TIMEOUT", 3.0),
        ];
        Catalog::new(tools, rows)
    }

    fn status_key() -> ColumnKey {
        ColumnKey::new(0, "status", 0)
    }

    #[test]
    fn test_select_category_expands_to_observed_statuses() {
        let cat = catalog();
        let idx = cat.status_index(0, 0).unwrap();
        let mut m = FilterModel::new();
        m.select_category(idx, status_key(), Category::Correct);
        let values: Vec<String> = m.entries().into_iter().map(|e| e.value).collect();
        assert_eq!(values, vec!["correct ".to_string(), "TRUE".to_string()]);
    }

    #[test]
    fn test_select_status_adds_owning_categories() {
        let cat = catalog();
        let idx = cat.status_index(0, 0).unwrap();
        let mut m = FilterModel::new();
        assert!(m.select_status(idx, status_key(), "TIMEOUT"));
        let entries = m.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Category);
        assert_eq!(entries[0].value, "wrong ");
        assert_eq!(entries[1].kind, EntryKind::Status);
        assert!(!m.select_status(idx, status_key(), "NOPE"));
    }

    #[test]
    fn test_select_all_is_cross_product() {
        let cat = catalog();
        let idx = cat.status_index(0, 0).unwrap();
        let mut m = FilterModel::new();
        m.select_all(idx, status_key());
        assert_eq!(m.entries().len(), Category::ALL.len() + 3);
        match m.get(&status_key().into()) {
            Some(ColumnFilter::Status(sel)) => assert!(sel.is_all(idx)),
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_text_and_range_last_write_wins() {
        let mut m = FilterModel::new();
        let key = ColumnKey::new(0, "cputime", 1);
        m.set_range(key.clone(), "1:");
        m.set_range(key.clone(), ":5");
        assert_eq!(
            m.get(&key.clone().into()),
            Some(&ColumnFilter::Range(Range { min: None, max: Some(5.0) }))
        );
        m.set_range(key.clone(), "x:y");
        assert!(m.is_empty());

        m.set_text(FilterTarget::TaskId, "a");
        m.set_text(FilterTarget::TaskId, "b");
        assert_eq!(m.entries(), vec![FilterEntry::task_id("b")]);
        m.set_text(FilterTarget::TaskId, "  ");
        assert!(m.is_empty());
    }

    #[test]
    fn test_range_parse() {
        assert_eq!(Range::parse("5:"), Some(Range { min: Some(5.0), max: None }));
        assert_eq!(Range::parse(":2.5"), Some(Range { min: None, max: Some(2.5) }));
        assert_eq!(Range::parse("abc:7"), Some(Range { min: None, max: Some(7.0) }));
        assert_eq!(Range::parse("3"), Some(Range { min: Some(3.0), max: Some(3.0) }));
        assert_eq!(Range::parse(":"), None);
        assert!(!Range { min: Some(1.0), max: None }.contains(f64::NAN));
        assert_eq!(Range { min: Some(5.0), max: None }.to_literal(), "5:");
    }

    #[test]
    fn test_apply_blank_removes_all_entries_for_key() {
        let cat = catalog();
        let mut m = FilterModel::new();
        m.apply(&cat, &FilterEntry::category(status_key(), Category::Wrong)).unwrap();
        assert_eq!(m.entries().len(), 3);
        m.apply(&cat, &FilterEntry::status(status_key(), "")).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn test_apply_rejects_stale_and_unknown() {
        let cat = catalog();
        let mut m = FilterModel::new();
        assert!(m.apply(&cat, &FilterEntry::range(ColumnKey::new(0, "cputime", 9), "1:")).is_err());
        assert!(m.apply(&cat, &FilterEntry::range(ColumnKey::new(0, "walltime", 1), "1:")).is_err());
        assert!(m.apply(&cat, &FilterEntry::status(status_key(), "bogus ")).is_err());
        assert!(m.is_empty());
    }

    #[test]
    fn test_from_entries_round_trips_entries() {
        let cat = catalog();
        let idx = cat.status_index(0, 0).unwrap();
        let mut m = FilterModel::new();
        m.select_category(idx, status_key(), Category::Wrong);
        m.set_range(ColumnKey::new(0, "cputime", 1), "2:");
        m.set_text(ColumnKey::new(0, "host", 2).into(), "h");
        let (rebuilt, dropped) = FilterModel::from_entries(&cat, &m.entries());
        assert!(dropped.is_empty());
        assert_eq!(rebuilt, m);
    }

    #[test]
    fn test_from_entries_drops_individually() {
        let cat = catalog();
        let entries = vec![
            FilterEntry::status(status_key(), "MAYBE"),
            FilterEntry::range(ColumnKey::new(3, "cputime", 1), "1:"),
            FilterEntry::range(ColumnKey::new(0, "cputime", 1), "1:"),
        ];
        let (model, dropped) = FilterModel::from_entries(&cat, &entries);
        assert_eq!(dropped.len(), 2);
        assert_eq!(model.len(), 1);
    }
}
