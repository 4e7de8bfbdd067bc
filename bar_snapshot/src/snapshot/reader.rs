//! Point-in-time views of the snapshot cache.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::{
    models::{bar::BarValues, field::Field},
    normalizer::{BarRecord, render_record},
    snapshot::{SnapshotState, lock},
};

/// One timestamped row of a symbol's tail window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotRow {
    pub timestamp: DateTime<Utc>,
    pub values: BarValues,
}

impl SnapshotRow {
    pub fn new(timestamp: DateTime<Utc>, values: BarValues) -> Self {
        Self { timestamp, values }
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(field)
    }
}

/// Tail window of every symbol, keyed in symbol order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    series: IndexMap<String, Vec<SnapshotRow>>,
}

impl MarketSnapshot {
    pub fn from_series(series: IndexMap<String, Vec<SnapshotRow>>) -> Self {
        Self { series }
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Number of symbols in the snapshot.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Rows for `symbol`, oldest first. Unknown symbols yield an empty slice.
    pub fn rows(&self, symbol: &str) -> &[SnapshotRow] {
        self.series.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Flattens the snapshot into suffixed records, symbol by symbol.
    pub fn records(&self, suffix: &str) -> Vec<BarRecord> {
        self.series
            .iter()
            .flat_map(|(symbol, rows)| {
                rows.iter()
                    .map(move |row| render_record(symbol, row.timestamp, &row.values, suffix))
            })
            .collect()
    }
}

/// Read handle onto a listener's snapshot cache.
///
/// Clones share the listener's lock, so every read observes one consistent
/// state and never a half-applied upsert.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    state: Arc<Mutex<SnapshotState>>,
    depth: usize,
}

impl SnapshotReader {
    pub(crate) fn new(state: Arc<Mutex<SnapshotState>>, depth: usize) -> Self {
        Self { state, depth }
    }

    /// Configured window depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Reads the last `depth` rows of every symbol. An uninitialized cache
    /// yields an empty snapshot.
    pub fn read(&self, normalize: bool) -> MarketSnapshot {
        let state = lock(&self.state);
        state
            .cache
            .as_ref()
            .map(|cache| cache.read_tail(normalize))
            .unwrap_or_default()
    }
}
