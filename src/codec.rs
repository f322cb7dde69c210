//! URL filter codec.
//!
//! One location parameter per filtered target:
//!
//! ```text
//! filter<N>=<toolIdx>_<name>_<colIdx>:<value>[;<value>...]
//! filter<N>=id:<text>
//! ```
//!
//! The name and every value are form-encoded before joining, so `_`, `:`
//! and `;` inside them cannot break the grammar, and the category sentinel
//! (trailing space) survives as `+`. The whole parameter is encoded again
//! when it is placed into the query. Keys other than `filter<N>` are never
//! touched.

use std::time::{Duration, Instant};

use serde::Serialize;
use url::form_urlencoded;

use crate::catalog::Catalog;
use crate::filter::{ColumnKey, DroppedEntry, FilterEntry, FilterModel, FilterTarget};
use crate::location::{HistoryMode, Location, LocationStore, ParamPatch};
use crate::logging::log_dropped_entry;

const KEY_PREFIX: &str = "filter";
const TASK_ID_TARGET: &str = "id";
const VALUE_SEPARATOR: char = ';';

/// Entries that could not be restored from a location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub dropped: Vec<DroppedEntry>,
}

pub fn is_owned_key(key: &str) -> bool {
    key.strip_prefix(KEY_PREFIX)
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

fn encode_component(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn decode_component(s: &str) -> String {
    form_urlencoded::parse(s.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default()
}

fn encode_target(target: &FilterTarget) -> String {
    match target {
        FilterTarget::TaskId => TASK_ID_TARGET.to_string(),
        FilterTarget::Column(key) => {
            format!("{}_{}_{}", key.tool_idx, encode_component(&key.name), key.col_idx)
        }
    }
}

fn decode_target(s: &str) -> Option<FilterTarget> {
    if s == TASK_ID_TARGET {
        return Some(FilterTarget::TaskId);
    }
    let (tool, rest) = s.split_once('_')?;
    let (name, col) = rest.rsplit_once('_')?;
    Some(FilterTarget::Column(ColumnKey::new(
        tool.parse().ok()?,
        &decode_component(name),
        col.parse().ok()?,
    )))
}

/// Owned parameters for `model`, numbered in target order.
pub fn encode(model: &FilterModel) -> Vec<(String, String)> {
    let entries = model.entries();
    let mut params = Vec::new();
    let mut start = 0;
    while start < entries.len() {
        let target = &entries[start].target;
        let end = entries[start..]
            .iter()
            .position(|e| &e.target != target)
            .map(|n| start + n)
            .unwrap_or(entries.len());
        let values: Vec<String> = entries[start..end].iter().map(|e| encode_component(&e.value)).collect();
        params.push(render_param(params.len(), target, &values));
        start = end;
    }
    params
}

fn render_param(n: usize, target: &FilterTarget, values: &[String]) -> (String, String) {
    let joined = values.join(&VALUE_SEPARATOR.to_string());
    (format!("{}{}", KEY_PREFIX, n), format!("{}:{}", encode_target(target), joined))
}

/// Patch turning the owned keys of `current` into exactly `params`.
pub fn owned_patch(current: &Location, params: &[(String, String)]) -> ParamPatch {
    let mut patch = ParamPatch::new();
    for key in current.keys().filter(|k| is_owned_key(k)) {
        if !params.iter().any(|(k, _)| k == key) {
            patch.remove(key);
        }
    }
    for (key, value) in params {
        if current.get(key).as_deref() != Some(value.as_str()) {
            patch.set(key, value);
        }
    }
    patch
}

pub fn filter_patch(current: &Location, model: &FilterModel) -> ParamPatch {
    owned_patch(current, &encode(model))
}

/// Restore a model from `location`. Malformed or stale parameters are
/// dropped one by one; the rest still apply.
pub fn decode(catalog: &Catalog, location: &Location) -> (FilterModel, DecodeReport) {
    let mut report = DecodeReport::default();
    let mut entries = Vec::new();
    for (key, value) in location.pairs() {
        if !is_owned_key(&key) {
            continue;
        }
        let Some((target_text, values)) = value.split_once(':') else {
            report.dropped.push(DroppedEntry::new(key, "missing ':' separator"));
            continue;
        };
        let Some(target) = decode_target(target_text) else {
            report.dropped.push(DroppedEntry::new(key, "malformed column key"));
            continue;
        };
        let kind = match &target {
            FilterTarget::TaskId => None,
            FilterTarget::Column(k) => match catalog.column(k.tool_idx, k.col_idx) {
                Some(col) => Some(col.kind),
                None => {
                    report.dropped.push(DroppedEntry::new(key, "no such column"));
                    continue;
                }
            },
        };
        for raw in values.split(VALUE_SEPARATOR) {
            let decoded = decode_component(raw);
            let entry = match (&target, kind) {
                (FilterTarget::Column(k), Some(kind)) => FilterEntry::for_column(k.clone(), kind, &decoded),
                _ => FilterEntry::task_id(&decoded),
            };
            entries.push(entry);
        }
    }
    let (model, dropped) = FilterModel::from_entries(catalog, &entries);
    report.dropped.extend(dropped);
    for d in &report.dropped {
        log_dropped_entry(&d.entry, &d.reason);
    }
    (model, report)
}

// =============================================================================
// Debounced writes
// =============================================================================

/// Coalesces rapid filter changes into one history entry. Only the latest
/// parameter set is kept; the patch is computed against the location at
/// flush time.
#[derive(Debug, Clone)]
pub struct DebouncedWriter {
    delay: Duration,
    pending: Option<Vec<(String, String)>>,
    deadline: Option<Instant>,
}

impl DebouncedWriter {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None, deadline: None }
    }

    /// Replace the pending state and restart the idle timer.
    pub fn schedule(&mut self, model: &FilterModel, now: Instant) {
        self.pending = Some(encode(model));
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Flush if the idle timer has expired. Returns `true` on a write.
    pub fn tick<S: LocationStore>(&mut self, store: &mut S, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(store),
            _ => false,
        }
    }

    /// Write the pending state immediately as one history entry.
    pub fn flush<S: LocationStore>(&mut self, store: &mut S) -> bool {
        self.deadline = None;
        let Some(params) = self.pending.take() else {
            return false;
        };
        let patch = owned_patch(&store.read(), &params);
        if patch.is_empty() {
            return false;
        }
        store.write(&patch, HistoryMode::Push);
        true
    }

    pub fn discard(&mut self) {
        self.pending = None;
        self.deadline = None;
    }
}
