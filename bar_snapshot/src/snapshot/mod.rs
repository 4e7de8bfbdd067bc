//! Rolling multi-symbol snapshot of the most recent bars.
//!
//! [`SnapshotCache`] owns the upsert / resize / read policy on top of a lazily
//! created [`SnapshotTable`](table::SnapshotTable). The listener keeps the
//! cache together with the [`WatchRegistry`] inside one [`SnapshotState`]
//! behind a single mutex, so a resize triggered by a watch change and an
//! upsert triggered by a bar never interleave.

pub mod fill;
pub mod lattice;
pub mod reader;
pub mod table;

use std::sync::{Mutex, MutexGuard};

use log::debug;

use crate::{
    models::bar::Bar,
    snapshot::{
        lattice::Lattice,
        reader::MarketSnapshot,
        table::{SnapshotTable, UpsertOutcome},
    },
    watch::WatchRegistry,
};

/// Upper bound on slots pre-allocated by one expansion.
pub const MAX_EXPANSION_STEPS: usize = 1000;

/// Slots to pre-allocate per expansion for a window of `depth` rows.
pub fn expansion_steps(depth: usize) -> usize {
    depth.saturating_mul(10).min(MAX_EXPANSION_STEPS)
}

/// Bounded-depth cache over every watched symbol.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    depth: usize,
    lattice: Lattice,
    table: Option<SnapshotTable>,
}

impl SnapshotCache {
    /// `lattice` spaces the grid: a fixed step for second bars, local
    /// calendar days for daily bars.
    pub fn new(depth: usize, lattice: impl Into<Lattice>) -> Self {
        Self {
            depth,
            lattice: lattice.into(),
            table: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn expansion_steps(&self) -> usize {
        expansion_steps(self.depth)
    }

    pub fn is_populated(&self) -> bool {
        self.table.is_some()
    }

    pub fn table(&self) -> Option<&SnapshotTable> {
        self.table.as_ref()
    }

    /// Admits one bar. The first bar creates the table aligned to `watched`.
    pub fn upsert(&mut self, bar: &Bar, watched: &[String]) -> UpsertOutcome {
        let outcome = match self.table.as_mut() {
            Some(table) => table.upsert(bar, self.depth, expansion_steps(self.depth)),
            None => {
                self.table = Some(SnapshotTable::seed(bar, watched, self.lattice));
                UpsertOutcome::Seeded
            }
        };
        debug!("snapshot upsert {} @ {}: {outcome:?}", bar.symbol, bar.timestamp);
        outcome
    }

    /// Aligns the symbol axis to `symbols`. No-op before the first bar.
    pub fn resize(&mut self, symbols: &[String]) {
        if let Some(table) = self.table.as_mut() {
            table.resize(symbols);
        }
    }

    pub fn read_tail(&self, normalize: bool) -> MarketSnapshot {
        self.table
            .as_ref()
            .map(|table| table.read_tail(self.depth, normalize))
            .unwrap_or_default()
    }
}

/// Everything the listener's lock protects.
#[derive(Debug, Default)]
pub struct SnapshotState {
    pub watch: WatchRegistry,
    /// `None` when snapshots are disabled (depth 0).
    pub cache: Option<SnapshotCache>,
}

impl SnapshotState {
    pub fn new(cache: Option<SnapshotCache>) -> Self {
        Self {
            watch: WatchRegistry::new(),
            cache,
        }
    }

    /// Admits `bar` into the cache, if there is one.
    pub fn upsert(&mut self, bar: &Bar) -> Option<UpsertOutcome> {
        let watched = self.watch.sorted();
        self.cache.as_mut().map(|cache| cache.upsert(bar, &watched))
    }

    /// Re-aligns the cache to the current watch set.
    pub fn resize_to_watch(&mut self) {
        let watched = self.watch.sorted();
        if let Some(cache) = self.cache.as_mut() {
            cache.resize(&watched);
        }
    }
}

/// Locks the shared state, recovering it if a previous holder panicked.
///
/// Every mutation leaves the table structurally valid between statements, so
/// the data behind a poisoned lock is still usable.
pub(crate) fn lock(state: &Mutex<SnapshotState>) -> MutexGuard<'_, SnapshotState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
