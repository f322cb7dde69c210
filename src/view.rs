//! The consumer contract shared by the grid, quantile and scatter views.
//!
//! [`TableView`] owns the filter model and keeps it in step with a
//! [`LocationStore`]. User changes re-evaluate immediately and schedule a
//! debounced URL write. History pops are queued by the store subscription
//! and applied on the next read, so a read after back/forward never sees
//! the stale filter.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::catalog::{Catalog, HiddenColumns, Row};
use crate::codec::{decode, DebouncedWriter, DecodeReport};
use crate::config::ViewConfig;
use crate::filter::{evaluate, ColumnKey, DroppedEntry, FilterEntry, FilterModel, FilterTarget};
use crate::location::{ChangeCause, LocationChange, LocationStore};
use crate::logging::log_filter_change;
use crate::plot::quantile::{self, QuantilePlot, QuantileRequest};
use crate::plot::scatter::{self, ScatterPlot, ScatterRequest};
use crate::stats::{column_stats, StatsState, StatsWorker};

/// Called with the restored filters after a back/forward navigation.
pub type NavigationCallback = Box<dyn FnMut(&[FilterEntry]) + Send>;

pub struct TableView<S: LocationStore> {
    base: Arc<Catalog>,
    catalog: Arc<Catalog>,
    config: ViewConfig,
    store: S,
    model: FilterModel,
    filtered: Vec<usize>,
    report: DecodeReport,
    writer: DebouncedWriter,
    pops: mpsc::UnboundedReceiver<String>,
    callbacks: Vec<NavigationCallback>,
    stats: Option<StatsWorker>,
}

impl<S: LocationStore> TableView<S> {
    /// Mount on `store`: filters and hidden columns come from its current
    /// location.
    pub fn new(catalog: Arc<Catalog>, mut store: S, config: ViewConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        store.subscribe(Box::new(move |change: &LocationChange| {
            if change.cause == ChangeCause::Pop {
                let _ = tx.send(change.href.clone());
            }
        }));
        let writer = DebouncedWriter::new(config.debounce());
        let mut view = Self {
            catalog: Arc::clone(&catalog),
            base: catalog,
            config,
            store,
            model: FilterModel::new(),
            filtered: Vec::new(),
            report: DecodeReport::default(),
            writer,
            pops: rx,
            callbacks: Vec::new(),
            stats: StatsWorker::current(),
        };
        view.restore_from_location();
        view
    }

    /// The catalog with the current location's hidden columns applied.
    pub fn catalog(&mut self) -> &Catalog {
        self.sync_navigation();
        &self.catalog
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct access for navigation (back/forward) and unrelated keys.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn model(&mut self) -> &FilterModel {
        self.sync_navigation();
        &self.model
    }

    /// What the last decode from the location dropped.
    pub fn decode_report(&mut self) -> &DecodeReport {
        self.sync_navigation();
        &self.report
    }

    pub fn on_external_navigation(&mut self, callback: NavigationCallback) {
        self.callbacks.push(callback);
    }

    /// Apply queued history pops. Returns `true` if the model was replaced.
    pub fn sync_navigation(&mut self) -> bool {
        let mut popped = false;
        while self.pops.try_recv().is_ok() {
            popped = true;
        }
        if !popped {
            return false;
        }
        self.writer.discard();
        self.restore_from_location();
        let entries = self.model.entries();
        for callback in &mut self.callbacks {
            callback(entries.as_slice());
        }
        true
    }

    pub fn filtered_rows(&mut self) -> Vec<&Row> {
        self.sync_navigation();
        self.rows_ref()
    }

    pub fn filtered_count(&mut self) -> usize {
        self.sync_navigation();
        self.filtered.len()
    }

    pub fn active_filters(&mut self) -> Vec<FilterEntry> {
        self.sync_navigation();
        self.model.entries()
    }

    /// Replace the whole model with materialized entries.
    pub fn set_filters(&mut self, entries: &[FilterEntry], now: Instant) -> Vec<DroppedEntry> {
        self.sync_navigation();
        let (model, dropped) = FilterModel::from_entries(&self.catalog, entries);
        self.model = model;
        self.changed(now);
        dropped
    }

    /// One user interaction, expanded on status columns.
    pub fn apply(&mut self, entry: &FilterEntry, now: Instant) -> Result<(), DroppedEntry> {
        self.sync_navigation();
        self.model.apply(&self.catalog, entry)?;
        self.changed(now);
        Ok(())
    }

    /// "Show all" on a status column.
    pub fn select_all(&mut self, key: ColumnKey, now: Instant) -> bool {
        self.sync_navigation();
        let Some(index) = self.catalog.status_index(key.tool_idx, key.col_idx) else {
            return false;
        };
        self.model.select_all(index, key);
        self.changed(now);
        true
    }

    pub fn clear(&mut self, target: &FilterTarget, now: Instant) {
        self.sync_navigation();
        self.model.clear(target);
        self.changed(now);
    }

    /// Flush the pending URL write if its idle timer expired. A queued pop
    /// is applied first and cancels the write.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.sync_navigation();
        self.writer.tick(&mut self.store, now)
    }

    pub fn flush(&mut self) -> bool {
        self.sync_navigation();
        self.writer.flush(&mut self.store)
    }

    pub fn write_pending(&self) -> bool {
        self.writer.is_pending()
    }

    pub fn quantile(&mut self, req: &QuantileRequest) -> QuantilePlot {
        self.sync_navigation();
        let rows = self.rows_ref();
        quantile::build(&self.catalog, &rows, req)
    }

    pub fn scatter(&mut self, req: &ScatterRequest) -> ScatterPlot {
        self.sync_navigation();
        let rows = self.rows_ref();
        scatter::build(&self.catalog, &rows, req, &self.config)
    }

    /// Aggregates for the current filter. Without a runtime they are
    /// computed inline.
    pub fn stats(&mut self) -> StatsState {
        self.sync_navigation();
        if let Some(worker) = self.stats.as_mut() {
            return worker.poll();
        }
        let rows = self.rows_ref();
        StatsState::Ready(Arc::new(column_stats(&self.catalog, &rows)))
    }

    /// Wait for the aggregates of the current filter.
    pub async fn stats_ready(&mut self) -> StatsState {
        self.sync_navigation();
        if let Some(worker) = self.stats.as_mut() {
            return worker.wait().await;
        }
        self.stats()
    }

    fn rows_ref(&self) -> Vec<&Row> {
        let rows = self.catalog.rows();
        self.filtered.iter().filter_map(|&i| rows.get(i)).collect()
    }

    fn restore_from_location(&mut self) {
        let location = self.store.read();
        let pairs = location.pairs();
        let hidden = HiddenColumns::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.catalog = Arc::new(self.base.with_hidden(&hidden));
        let (model, report) = decode(&self.catalog, &location);
        self.model = model;
        self.report = report;
        self.refilter();
    }

    fn changed(&mut self, now: Instant) {
        self.refilter();
        self.writer.schedule(&self.model, now);
    }

    fn refilter(&mut self) {
        let filtered: Vec<usize> = evaluate(self.catalog.rows(), &self.model)
            .iter()
            .map(|r| r.idx)
            .collect();
        self.filtered = filtered;
        log_filter_change(
            self.model.len(),
            self.model.entries().len(),
            self.filtered.len(),
            self.catalog.rows().len(),
        );
        if let Some(worker) = self.stats.as_mut() {
            worker.request(Arc::clone(&self.catalog), self.filtered.clone());
        }
    }
}
