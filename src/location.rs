//! Address-bar state as an explicit store.
//!
//! The filter model never touches a global location. It reads and patches a
//! [`LocationStore`], and learns about back/forward navigation through a
//! subscription. [`MemoryHistory`] is the in-process implementation with a
//! browser-like history stack.
//!
//! Parameters are kept as the raw segment text they arrived in, so keys the
//! caller does not patch are written back byte for byte.

use url::form_urlencoded;

use crate::logging::{log_navigation, log_url_write};

// =============================================================================
// Location
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawParam {
    key: String,
    raw: String,
}

impl RawParam {
    fn parse(segment: &str) -> Self {
        let key = form_urlencoded::parse(segment.as_bytes())
            .next()
            .map(|(k, _)| k.into_owned())
            .unwrap_or_default();
        Self { key, raw: segment.to_string() }
    }

    fn encode(key: &str, value: &str) -> Self {
        let raw = form_urlencoded::Serializer::new(String::new())
            .append_pair(key, value)
            .finish();
        Self { key: key.to_string(), raw }
    }

    fn value(&self) -> String {
        form_urlencoded::parse(self.raw.as_bytes())
            .next()
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }
}

/// `path?query`, where the path may itself be a hash route such as `#/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    params: Vec<RawParam>,
}

impl Location {
    pub fn parse(href: &str) -> Self {
        let (path, query) = href.split_once('?').unwrap_or((href, ""));
        let params = query
            .split('&')
            .filter(|s| !s.is_empty())
            .map(RawParam::parse)
            .collect();
        Self { path: path.to_string(), params }
    }

    pub fn to_href(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query: Vec<&str> = self.params.iter().map(|p| p.raw.as_str()).collect();
        format!("{}?{}", self.path, query.join("&"))
    }

    /// Decoded value of the first parameter named `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.params.iter().find(|p| p.key == key).map(RawParam::value)
    }

    /// Decoded `(key, value)` pairs in order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.params.iter().map(|p| (p.key.clone(), p.value())).collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.key.as_str())
    }

    /// Set replaces the first segment with that key in place (dropping any
    /// duplicates) or appends; remove deletes every segment with that key.
    pub fn apply(&mut self, patch: &ParamPatch) {
        for (key, value) in &patch.changes {
            match value {
                Some(v) => {
                    let fresh = RawParam::encode(key, v);
                    match self.params.iter().position(|p| &p.key == key) {
                        Some(pos) => {
                            self.params[pos] = fresh;
                            let mut seen = 0;
                            self.params.retain(|p| {
                                if &p.key != key {
                                    return true;
                                }
                                seen += 1;
                                seen == 1
                            });
                        }
                        None => self.params.push(fresh),
                    }
                }
                None => self.params.retain(|p| &p.key != key),
            }
        }
    }
}

// =============================================================================
// Patches
// =============================================================================

/// Ordered set/remove changes, at most one per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamPatch {
    changes: Vec<(String, Option<String>)>,
}

impl ParamPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.upsert(key, Some(value.to_string()));
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.upsert(key, None);
        self
    }

    fn upsert(&mut self, key: &str, value: Option<String>) {
        match self.changes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.changes.push((key.to_string(), value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[(String, Option<String>)] {
        &self.changes
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Push,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    Write,
    /// Back/forward navigation.
    Pop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationChange {
    pub href: String,
    pub cause: ChangeCause,
}

pub type Listener = Box<dyn FnMut(&LocationChange) + Send>;

pub trait LocationStore {
    fn read(&self) -> Location;
    fn write(&mut self, patch: &ParamPatch, mode: HistoryMode);
    fn subscribe(&mut self, listener: Listener);
}

/// In-memory history stack with back/forward.
pub struct MemoryHistory {
    entries: Vec<String>,
    cursor: usize,
    listeners: Vec<Listener>,
}

impl MemoryHistory {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: vec![initial.to_string()],
            cursor: 0,
            listeners: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> &str {
        &self.entries[self.cursor]
    }

    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        log_navigation("back", self.current());
        self.notify(ChangeCause::Pop);
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        log_navigation("forward", self.current());
        self.notify(ChangeCause::Pop);
        true
    }

    fn notify(&mut self, cause: ChangeCause) {
        let change = LocationChange { href: self.current().to_string(), cause };
        for listener in &mut self.listeners {
            listener(&change);
        }
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("")
    }
}

impl LocationStore for MemoryHistory {
    fn read(&self) -> Location {
        Location::parse(self.current())
    }

    fn write(&mut self, patch: &ParamPatch, mode: HistoryMode) {
        let mut location = self.read();
        location.apply(patch);
        let href = location.to_href();
        if href == self.current() {
            return;
        }
        match mode {
            HistoryMode::Push => {
                self.entries.truncate(self.cursor + 1);
                self.entries.push(href);
                self.cursor += 1;
            }
            HistoryMode::Replace => self.entries[self.cursor] = href,
        }
        log_url_write(patch.len(), self.current());
        self.notify(ChangeCause::Write);
    }

    fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }
}
