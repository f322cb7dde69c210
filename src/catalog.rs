//! Run-set catalog: tools, their columns, and the task rows.
//!
//! Built once from the fixture produced by the table generator and never
//! mutated afterwards. Everything downstream (filters, plots, stats) reads
//! from it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logging::log_catalog_loaded;

// =============================================================================
// Column and result classification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Numeric,
    Status,
}

impl ColumnKind {
    /// Text and status columns are ranked, not measured.
    pub fn is_ordinal(&self) -> bool {
        !matches!(self, ColumnKind::Numeric)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Correct,
    Wrong,
    Error,
    Unknown,
    /// Run crashed before a status was recorded.
    Aborted,
    /// Task is not part of this tool's benchmark set.
    Empty,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Correct,
        Category::Wrong,
        Category::Error,
        Category::Unknown,
        Category::Aborted,
        Category::Empty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Correct => "correct",
            Category::Wrong => "wrong",
            Category::Error => "error",
            Category::Unknown => "unknown",
            Category::Aborted => "aborted",
            Category::Empty => "empty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Category::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Lenient mapping for fixture input; tool results the generator could
    /// not classify count as errors.
    pub fn from_fixture(s: &str) -> Self {
        match s {
            "missing" => Category::Unknown,
            other => Category::parse(other).unwrap_or(Category::Error),
        }
    }

    /// `false` for the synthetic categories that carry no status value.
    pub fn is_real(&self) -> bool {
        !matches!(self, Category::Aborted | Category::Empty)
    }
}

// =============================================================================
// Values
// =============================================================================

/// One cell: the raw display text plus, for numeric columns, the
/// normalized float used for sorting and plotting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub raw: Option<String>,
    pub number: Option<f64>,
}

impl Value {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn text(s: &str) -> Self {
        if s.is_empty() {
            return Self::missing();
        }
        Self { raw: Some(s.to_string()), number: None }
    }

    pub fn number(n: f64) -> Self {
        Self {
            raw: Some(format_number(n)),
            number: n.is_finite().then_some(n),
        }
    }

    /// Parse a raw cell according to the column kind.
    pub fn parse(raw: &str, kind: ColumnKind) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::missing();
        }
        let number = match kind {
            ColumnKind::Numeric => parse_with_unit(trimmed),
            _ => None,
        };
        Self { raw: Some(trimmed.to_string()), number }
    }

    fn from_json(v: &serde_json::Value, kind: ColumnKind) -> Self {
        match v {
            serde_json::Value::Null => Self::missing(),
            serde_json::Value::Number(n) => match (kind, n.as_f64()) {
                (ColumnKind::Numeric, Some(f)) => Self::number(f),
                _ => Self::text(&n.to_string()),
            },
            serde_json::Value::String(s) => Self::parse(s, kind),
            serde_json::Value::Bool(b) => Self::text(if *b { "true" } else { "false" }),
            other => Self::text(&other.to_string()),
        }
    }

    pub fn display(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Normalized float, only if finite.
    pub fn finite(&self) -> Option<f64> {
        self.number.filter(|n| n.is_finite())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Split a string into number prefix and unit suffix. The prefix ends at
/// the last digit, so `"1.25s"` → `("1.25", "s")`.
pub fn split_number_and_unit(s: &str) -> (&str, &str) {
    let pos = s
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    (&s[..pos], &s[pos..])
}

fn parse_with_unit(s: &str) -> Option<f64> {
    let (prefix, _unit) = split_number_and_unit(s);
    prefix
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

// =============================================================================
// Columns, run sets, rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub tool_idx: usize,
    pub col_idx: usize,
    pub title: String,
    pub kind: ColumnKind,
    pub unit: Option<String>,
    pub visible: bool,
}

impl Column {
    /// Indices are assigned by [`Catalog::new`].
    pub fn new(title: &str, kind: ColumnKind) -> Self {
        Self {
            tool_idx: 0,
            col_idx: 0,
            title: title.to_string(),
            kind,
            unit: None,
            visible: true,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSet {
    pub tool_idx: usize,
    pub name: String,
    pub columns: Vec<Column>,
}

impl RunSet {
    pub fn new(name: &str, columns: Vec<Column>) -> Self {
        Self { tool_idx: 0, name: name.to_string(), columns }
    }

    /// A run set is invisible iff every one of its columns is hidden.
    pub fn is_visible(&self) -> bool {
        self.columns.iter().any(|c| c.visible)
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.visible)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub category: Category,
    pub href: Option<String>,
    pub score: Option<f64>,
    pub values: Vec<Value>,
}

impl RunResult {
    pub fn new(category: Category, values: Vec<Value>) -> Self {
        Self { category, href: None, score: None, values }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    fn empty(columns: usize) -> Self {
        Self::new(Category::Empty, vec![Value::missing(); columns])
    }

    pub fn value(&self, col_idx: usize) -> Option<&Value> {
        self.values.get(col_idx)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Position in the catalog; stable identity across filtering.
    pub idx: usize,
    pub task_id: Vec<String>,
    pub href: Option<String>,
    pub results: Vec<RunResult>,
}

impl Row {
    pub fn new(task_id: &[&str], results: Vec<RunResult>) -> Self {
        Self {
            idx: 0,
            task_id: task_id.iter().map(|s| s.to_string()).collect(),
            href: None,
            results,
        }
    }

    pub fn result(&self, tool_idx: usize) -> Option<&RunResult> {
        self.results.get(tool_idx)
    }

    pub fn value(&self, tool_idx: usize, col_idx: usize) -> Option<&Value> {
        self.result(tool_idx).and_then(|r| r.value(col_idx))
    }

    pub fn display_id(&self) -> String {
        self.task_id.join(" ")
    }
}

// =============================================================================
// Status index
// =============================================================================

/// Statuses observed per category on one status column, across the full
/// row set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusIndex {
    by_category: BTreeMap<Category, BTreeSet<String>>,
}

impl StatusIndex {
    fn record(&mut self, category: Category, status: &str) {
        self.by_category
            .entry(category)
            .or_default()
            .insert(status.to_string());
    }

    pub fn statuses_under(&self, category: Category) -> BTreeSet<String> {
        self.by_category.get(&category).cloned().unwrap_or_default()
    }

    pub fn categories_with(&self, status: &str) -> BTreeSet<Category> {
        self.by_category
            .iter()
            .filter(|(_, statuses)| statuses.contains(status))
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn all_statuses(&self) -> BTreeSet<String> {
        self.by_category.values().flatten().cloned().collect()
    }

    pub fn contains_status(&self, status: &str) -> bool {
        self.by_category.values().any(|s| s.contains(status))
    }
}

// =============================================================================
// Hidden-column facet
// =============================================================================

/// Visibility read from the `hidden` / `hidden<toolIdx>` location keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiddenColumns {
    pub tools: BTreeSet<usize>,
    pub columns: BTreeMap<usize, BTreeSet<usize>>,
}

impl HiddenColumns {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut hidden = Self::default();
        for (key, value) in pairs {
            let Some(rest) = key.strip_prefix("hidden") else {
                continue;
            };
            let indices: BTreeSet<usize> = value
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if rest.is_empty() {
                hidden.tools.extend(indices);
            } else if let Ok(tool_idx) = rest.parse::<usize>() {
                hidden.columns.entry(tool_idx).or_default().extend(indices);
            }
        }
        hidden
    }

    pub fn is_hidden(&self, tool_idx: usize, col_idx: usize) -> bool {
        self.tools.contains(&tool_idx)
            || self
                .columns
                .get(&tool_idx)
                .map(|c| c.contains(&col_idx))
                .unwrap_or(false)
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone)]
pub struct Catalog {
    tools: Vec<RunSet>,
    rows: Arc<Vec<Row>>,
    status_index: Arc<HashMap<(usize, usize), StatusIndex>>,
    fingerprint: String,
}

impl Catalog {
    /// Assign indices, pad short rows with `empty` results and build the
    /// status index.
    pub fn new(mut tools: Vec<RunSet>, mut rows: Vec<Row>) -> Self {
        for (tool_idx, tool) in tools.iter_mut().enumerate() {
            tool.tool_idx = tool_idx;
            for (col_idx, col) in tool.columns.iter_mut().enumerate() {
                col.tool_idx = tool_idx;
                col.col_idx = col_idx;
            }
        }
        for (idx, row) in rows.iter_mut().enumerate() {
            row.idx = idx;
            for (tool_idx, tool) in tools.iter().enumerate() {
                let width = tool.columns.len();
                if row.results.len() <= tool_idx {
                    row.results.push(RunResult::empty(width));
                }
                let result = &mut row.results[tool_idx];
                if result.values.len() < width {
                    result.values.resize(width, Value::missing());
                }
            }
        }

        let mut status_index: HashMap<(usize, usize), StatusIndex> = HashMap::new();
        for tool in &tools {
            for col in tool.columns.iter().filter(|c| c.kind == ColumnKind::Status) {
                let index = status_index.entry((tool.tool_idx, col.col_idx)).or_default();
                for row in &rows {
                    let Some(result) = row.result(tool.tool_idx) else {
                        continue;
                    };
                    if !result.category.is_real() {
                        continue;
                    }
                    if let Some(status) = result.value(col.col_idx).and_then(Value::display) {
                        index.record(result.category, status);
                    }
                }
            }
        }

        Self {
            tools,
            rows: Arc::new(rows),
            status_index: Arc::new(status_index),
            fingerprint: String::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(text).context("invalid fixture json")?;
        let mut catalog = fixture.into_catalog()?;
        catalog.fingerprint = sha256_hex(text.as_bytes());
        log_catalog_loaded(catalog.tools.len(), catalog.rows.len(), &catalog.fingerprint);
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read fixture {}", path.display()))?;
        Self::from_json(&text)
    }

    /// SHA-256 of the fixture text; empty for catalogs built in code.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn tools(&self) -> &[RunSet] {
        &self.tools
    }

    pub fn tool(&self, tool_idx: usize) -> Option<&RunSet> {
        self.tools.get(tool_idx)
    }

    pub fn visible_tools(&self) -> impl Iterator<Item = &RunSet> {
        self.tools.iter().filter(|t| t.is_visible())
    }

    pub fn column(&self, tool_idx: usize, col_idx: usize) -> Option<&Column> {
        self.tool(tool_idx).and_then(|t| t.columns.get(col_idx))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn status_index(&self, tool_idx: usize, col_idx: usize) -> Option<&StatusIndex> {
        self.status_index.get(&(tool_idx, col_idx))
    }

    /// Copy of this catalog with the hidden-column facet applied. Rows and
    /// the status index are shared.
    pub fn with_hidden(&self, hidden: &HiddenColumns) -> Self {
        let mut tools = self.tools.clone();
        for tool in &mut tools {
            for col in &mut tool.columns {
                col.visible = !hidden.is_hidden(col.tool_idx, col.col_idx);
            }
        }
        Self {
            tools,
            rows: Arc::clone(&self.rows),
            status_index: Arc::clone(&self.status_index),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// =============================================================================
// Fixture format
// =============================================================================

#[derive(Debug, Deserialize)]
struct Fixture {
    tools: Vec<FixtureTool>,
    #[serde(default)]
    rows: Vec<FixtureRow>,
}

#[derive(Debug, Deserialize)]
struct FixtureTool {
    name: String,
    columns: Vec<FixtureColumn>,
}

#[derive(Debug, Deserialize)]
struct FixtureColumn {
    title: String,
    kind: ColumnKind,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    hidden: bool,
}

#[derive(Debug, Deserialize)]
struct FixtureRow {
    id: Vec<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    results: Vec<FixtureResult>,
}

#[derive(Debug, Deserialize)]
struct FixtureResult {
    category: String,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    values: Vec<serde_json::Value>,
}

impl Fixture {
    fn into_catalog(self) -> Result<Catalog> {
        if self.tools.is_empty() {
            return Err(anyhow!("fixture defines no tools"));
        }
        let tools: Vec<RunSet> = self
            .tools
            .into_iter()
            .map(|t| RunSet {
                tool_idx: 0,
                name: t.name,
                columns: t
                    .columns
                    .into_iter()
                    .map(|c| Column {
                        tool_idx: 0,
                        col_idx: 0,
                        title: c.title,
                        kind: c.kind,
                        unit: c.unit,
                        visible: !c.hidden,
                    })
                    .collect(),
            })
            .collect();

        let mut rows = Vec::with_capacity(self.rows.len());
        for (n, fr) in self.rows.into_iter().enumerate() {
            if fr.results.len() > tools.len() {
                return Err(anyhow!(
                    "row {} has {} results but only {} tools",
                    n,
                    fr.results.len(),
                    tools.len()
                ));
            }
            let results = fr
                .results
                .into_iter()
                .zip(&tools)
                .map(|(res, tool)| RunResult {
                    category: Category::from_fixture(&res.category),
                    href: res.href,
                    score: res.score,
                    values: res
                        .values
                        .iter()
                        .zip(&tool.columns)
                        .map(|(v, col)| Value::from_json(v, col.kind))
                        .collect(),
                })
                .collect();
            rows.push(Row { idx: n, task_id: fr.id, href: fr.href, results });
        }
        Ok(Catalog::new(tools, rows))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "tools": [
            {"name": "alpha", "columns": [
                {"title": "status", "kind": "status"},
                {"title": "cputime", "kind": "numeric", "unit": "s"}
            ]},
            {"name": "beta", "columns": [
                {"title": "status", "kind": "status"},
                {"title": "cputime", "kind": "numeric", "unit": "s", "hidden": true}
            ]}
        ],
        "rows": [
            {"id": ["a.c"], "results": [
                {"category": "correct", "values": ["TRUE", "1.5s"]},
                {"category": "wrong", "values": ["FALSE", 2]}
            ]},
            {"id": ["b.c"], "results": [
                {"category": "error", "values": ["TIMEOUT", "900s"]}
            ]}
        ]
    }"#;

    #[test]
    fn test_split_number_and_unit() {
        assert_eq!(split_number_and_unit("1.25s"), ("1.25", "s"));
        assert_eq!(split_number_and_unit("42"), ("42", ""));
        assert_eq!(split_number_and_unit("abc"), ("", "abc"));
        assert_eq!(split_number_and_unit(""), ("", ""));
    }

    #[test]
    fn test_value_parse_numeric_with_unit() {
        let v = Value::parse("1.5s", ColumnKind::Numeric);
        assert_eq!(v.finite(), Some(1.5));
        assert_eq!(v.display(), Some("1.5s"));
        let s = Value::parse("TRUE", ColumnKind::Status);
        assert_eq!(s.number, None);
        assert_eq!(Value::parse("  ", ColumnKind::Text), Value::missing());
    }

    #[test]
    fn test_fixture_loads_and_pads_rows() {
        let cat = Catalog::from_json(FIXTURE).unwrap();
        assert_eq!(cat.tools().len(), 2);
        assert_eq!(cat.rows().len(), 2);
        let missing = cat.rows()[1].result(1).unwrap();
        assert_eq!(missing.category, Category::Empty);
        assert_eq!(missing.values.len(), 2);
        assert_eq!(cat.rows()[0].value(1, 1).unwrap().finite(), Some(2.0));
        assert_eq!(cat.fingerprint().len(), 64);
    }

    #[test]
    fn test_hidden_flag_and_runset_visibility() {
        let cat = Catalog::from_json(FIXTURE).unwrap();
        assert!(!cat.column(1, 1).unwrap().visible);
        assert!(cat.tool(1).unwrap().is_visible());

        let hidden = HiddenColumns::from_pairs([("hidden1", "0,1")]);
        let narrowed = cat.with_hidden(&hidden);
        assert!(!narrowed.tool(1).unwrap().is_visible());
        assert_eq!(narrowed.visible_tools().count(), 1);
        assert_eq!(narrowed.rows().len(), 2);
    }

    #[test]
    fn test_hidden_pairs_parse_tools_and_columns() {
        let hidden = HiddenColumns::from_pairs([("hidden", "2"), ("hidden0", "1,x,3"), ("sort", "1")]);
        assert!(hidden.is_hidden(2, 0));
        assert!(hidden.is_hidden(0, 3));
        assert!(!hidden.is_hidden(0, 2));
    }

    #[test]
    fn test_status_index_skips_synthetic_categories() {
        let cat = Catalog::from_json(FIXTURE).unwrap();
        let idx = cat.status_index(0, 0).unwrap();
        assert!(idx.statuses_under(Category::Correct).contains("TRUE"));
        assert!(idx.statuses_under(Category::Error).contains("TIMEOUT"));
        assert!(idx.categories_with("TIMEOUT").contains(&Category::Error));
        assert!(cat.status_index(0, 1).is_none());
        let beta = cat.status_index(1, 0).unwrap();
        assert_eq!(beta.all_statuses().len(), 1);
    }

    #[test]
    fn test_unknown_category_maps_to_error() {
        assert_eq!(Category::from_fixture("bogus"), Category::Error);
        assert_eq!(Category::from_fixture("missing"), Category::Unknown);
        assert_eq!(Category::parse("empty"), Some(Category::Empty));
    }

    #[test]
    fn test_fixture_rejects_extra_results() {
        let bad = r#"{"tools":[{"name":"t","columns":[]}],
            "rows":[{"id":["x"],"results":[{"category":"correct"},{"category":"correct"}]}]}"#;
        assert!(Catalog::from_json(bad).is_err());
    }
}
