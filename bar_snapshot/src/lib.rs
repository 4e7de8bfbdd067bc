//! Rolling multi-symbol OHLCV bar snapshot.
//!
//! A [`BarListener`](listener::BarListener) receives bars from an upstream
//! [`BarStream`](providers::BarStream), publishes them as events, and keeps
//! a bounded, time-aligned window of the most recent bars for every watched
//! symbol. Consumers read that window through a
//! [`SnapshotReader`](snapshot::reader::SnapshotReader).

pub mod config;
pub mod errors;
pub mod events;
pub mod listener;
pub mod models;
pub mod normalizer;
pub mod providers;
pub mod snapshot;
pub mod watch;

pub use config::ListenerConfig;
pub use errors::{Error, Result};
pub use listener::BarListener;
