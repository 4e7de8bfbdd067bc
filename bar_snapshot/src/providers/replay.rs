//! In-memory upstream connections for replaying recorded bars.
//!
//! [`ReplayStream`] accepts subscriptions and remembers them; selected
//! symbols can be marked as rejected to exercise the invalid-symbol path.
//! [`ReplayProvider`] serves history from a fixed set of raw records.

use std::{
    collections::BTreeSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use log::debug;

use crate::{
    models::raw::{RawBar, RawBarBatch, RawSymbol},
    providers::{
        DataProvider, HistoryRequest, ProviderError, ValidationSnafu,
        stream::{BarStream, ConnectionSnafu, StreamError, SubscriptionSnafu},
    },
    watch::WatchRequest,
};

#[derive(Debug, Default)]
pub struct ReplayStream {
    connected: AtomicBool,
    rejected: BTreeSet<String>,
    requests: Mutex<Vec<WatchRequest>>,
    unwatched: Mutex<Vec<String>>,
}

impl ReplayStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriptions for these symbols fail with
    /// [`StreamError::Subscription`].
    pub fn rejecting<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejected: symbols.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Every accepted watch request, in arrival order.
    pub fn requests(&self) -> Vec<WatchRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn unwatched(&self) -> Vec<String> {
        self.unwatched
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl BarStream for ReplayStream {
    fn connect(&self) -> Result<(), StreamError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn watch(&self, request: &WatchRequest) -> Result<(), StreamError> {
        if !self.is_connected() {
            return ConnectionSnafu {
                message: "not connected",
            }
            .fail();
        }
        if self.rejected.contains(&request.symbol) {
            return SubscriptionSnafu {
                symbol: request.symbol.clone(),
                message: "unknown symbol",
            }
            .fail();
        }
        debug!("replay stream watching {}", request.symbol);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        Ok(())
    }

    fn unwatch(&self, symbol: &str) -> Result<(), StreamError> {
        self.unwatched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(symbol.to_string());
        Ok(())
    }

    fn disconnect(&self) -> Result<(), StreamError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return ConnectionSnafu {
                message: "already disconnected",
            }
            .fail();
        }
        Ok(())
    }
}

/// Serves the most recent recorded bars of each symbol.
#[derive(Debug, Clone, Default)]
pub struct ReplayProvider {
    bars: Vec<RawBar>,
}

impl ReplayProvider {
    /// `bars` must be in arrival order (oldest first per symbol).
    pub fn new(bars: Vec<RawBar>) -> Self {
        Self { bars }
    }
}

#[async_trait]
impl DataProvider for ReplayProvider {
    async fn fetch_bars(&self, request: HistoryRequest) -> Result<RawBarBatch, ProviderError> {
        if request.max_bars == 0 {
            return ValidationSnafu {
                message: "max_bars must be > 0",
            }
            .fail();
        }
        let matching: Vec<&RawBar> = self
            .bars
            .iter()
            .filter(|bar| symbol_matches(&bar.symbol, &request.symbol))
            .collect();
        let skip = matching.len().saturating_sub(request.max_bars);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }
}

fn symbol_matches(raw: &RawSymbol, symbol: &str) -> bool {
    match raw {
        RawSymbol::Text(s) => s.trim() == symbol,
        RawSymbol::Bytes(b) => b
            .iter()
            .copied()
            .filter(|c| *c != 0 && !c.is_ascii_whitespace())
            .eq(symbol.bytes()),
    }
}
