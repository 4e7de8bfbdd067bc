//! Registry of the symbols the listener is subscribed to.
//!
//! The registry records membership plus the symbols whose upstream
//! subscription is in flight. Issuing the subscription and resizing the
//! snapshot are sequenced by the [`BarListener`](crate::listener::BarListener),
//! which owns both.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::interval::{Interval, IntervalType};

/// Subscription request sent upstream for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRequest {
    pub symbol: String,
    pub interval_type: IntervalType,
    pub interval_len: u32,
    /// History the upstream should replay so the snapshot window starts full.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback_bars: Option<usize>,
}

impl WatchRequest {
    pub fn new(symbol: impl Into<String>, interval: Interval, snapshot_depth: usize) -> Self {
        Self {
            symbol: symbol.into(),
            interval_type: interval.kind,
            interval_len: interval.len,
            lookback_bars: (snapshot_depth > 0).then_some(snapshot_depth),
        }
    }
}

/// The set of currently watched symbols, kept sorted.
#[derive(Debug, Clone, Default)]
pub struct WatchRegistry {
    symbols: BTreeSet<String>,
    pending: BTreeSet<String>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Claims the symbols from `requested` that are neither registered nor
    /// in flight, deduplicated and in request order.
    ///
    /// A claimed symbol stays in flight until it is [`insert`](Self::insert)ed
    /// or [`release`](Self::release)d, so concurrent callers never subscribe
    /// it twice.
    pub fn claim<'a, I>(&mut self, requested: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut claimed = Vec::new();
        for symbol in requested.into_iter().map(str::trim) {
            if symbol.is_empty() || self.contains(symbol) {
                continue;
            }
            if self.pending.insert(symbol.to_string()) {
                claimed.push(symbol.to_string());
            }
        }
        claimed
    }

    /// Drops an in-flight claim without registering the symbol.
    pub fn release(&mut self, symbol: &str) {
        self.pending.remove(symbol);
    }

    /// Registers a symbol, settling any claim on it. Returns `false` if it was
    /// already present.
    pub fn insert(&mut self, symbol: impl Into<String>) -> bool {
        let symbol = symbol.into();
        self.pending.remove(&symbol);
        self.symbols.insert(symbol)
    }

    /// Drops a symbol. Unknown symbols are ignored; returns whether anything
    /// was removed.
    pub fn remove(&mut self, symbol: &str) -> bool {
        self.symbols.remove(symbol)
    }

    /// Lexicographically sorted snapshot of the set.
    pub fn sorted(&self) -> Vec<String> {
        self.symbols.iter().cloned().collect()
    }
}
