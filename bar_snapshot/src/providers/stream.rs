//! Live streaming connection interface.

use snafu::{Backtrace, Snafu};

use crate::watch::WatchRequest;

/// The upstream bar-streaming connection.
///
/// Calls are synchronous and are never made while the listener's snapshot
/// lock is held, so an implementation may block or call back into the
/// listener.
pub trait BarStream: Send + Sync {
    fn connect(&self) -> Result<(), StreamError>;

    /// Subscribes to interval bars for one symbol.
    fn watch(&self, request: &WatchRequest) -> Result<(), StreamError>;

    fn unwatch(&self, symbol: &str) -> Result<(), StreamError>;

    fn disconnect(&self) -> Result<(), StreamError>;
}

/// Errors reported by a [`BarStream`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StreamError {
    /// The connection could not be established or was lost.
    #[snafu(display("Stream connection failed: {message}"))]
    Connection {
        message: String,
        backtrace: Backtrace,
    },

    /// Upstream refused a subscription change for a symbol.
    #[snafu(display("Subscription for {symbol} rejected: {message}"))]
    Subscription {
        symbol: String,
        message: String,
        backtrace: Backtrace,
    },
}
