//! Upstream collaborators of the listener.
//!
//! Two narrow interfaces are injected into the
//! [`BarListener`](crate::listener::BarListener):
//!
//! * [`BarStream`](stream::BarStream): the live streaming connection
//!   (connect, watch, unwatch, disconnect). Bars flow back through the
//!   listener's `on_*` callbacks.
//! * [`DataProvider`]: the historical connection, used to backfill the
//!   snapshot window for newly watched symbols.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`dyn DataProvider`) so the concrete vendor can be picked at runtime.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use bar_snapshot::models::raw::RawBarBatch;
//! use bar_snapshot::providers::{DataProvider, HistoryRequest, ProviderError};
//!
//! struct MyProvider;
//!
//! #[async_trait]
//! impl DataProvider for MyProvider {
//!     async fn fetch_bars(&self, _request: HistoryRequest) -> Result<RawBarBatch, ProviderError> {
//!         Ok(RawBarBatch::default())
//!     }
//! }
//! ```

pub mod replay;
pub mod stream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::{Backtrace, Snafu};

use crate::models::{interval::Interval, raw::RawBarBatch};

pub use stream::{BarStream, StreamError};

/// Parameters of one historical bar request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub symbol: String,
    pub interval: Interval,
    /// Number of most recent bars wanted.
    pub max_bars: usize,
}

/// Historical bar source.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches up to `request.max_bars` of the most recent bars for one
    /// symbol, oldest first, in the vendor's columnar layout.
    async fn fetch_bars(&self, request: HistoryRequest) -> Result<RawBarBatch, ProviderError>;
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// The provider returned a specific error message (e.g., unknown symbol).
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::raw::RawBar;
    use chrono::NaiveDate;

    struct FixedProvider;
    struct FailingProvider;

    #[async_trait]
    impl DataProvider for FixedProvider {
        async fn fetch_bars(&self, request: HistoryRequest) -> Result<RawBarBatch, ProviderError> {
            Ok((0..request.max_bars as i64)
                .map(|i| RawBar {
                    symbol: request.symbol.as_str().into(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    time_us: 34_200_000_000 + i * 60_000_000,
                    open_p: 1.0,
                    high_p: 1.0,
                    low_p: 1.0,
                    close_p: 1.0,
                    tot_vlm: 10,
                    prd_vlm: 1,
                    num_trds: 1,
                })
                .collect())
        }
    }

    #[async_trait]
    impl DataProvider for FailingProvider {
        async fn fetch_bars(&self, request: HistoryRequest) -> Result<RawBarBatch, ProviderError> {
            ApiSnafu {
                message: format!("no data for {}", request.symbol),
            }
            .fail()
        }
    }

    // Decides at runtime which provider to hand back.
    fn get_provider(name: &str) -> Box<dyn DataProvider> {
        if name == "fixed" {
            Box::new(FixedProvider)
        } else {
            Box::new(FailingProvider)
        }
    }

    fn request(max_bars: usize) -> HistoryRequest {
        HistoryRequest {
            symbol: "IBM".into(),
            interval: Interval::seconds(60).unwrap(),
            max_bars,
        }
    }

    #[tokio::test]
    async fn test_dynamic_provider() {
        let batch = get_provider("fixed").fetch_bars(request(3)).await.unwrap();
        assert_eq!(batch.len(), 3);

        let err = get_provider("failing").fetch_bars(request(3)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
        assert_eq!(err.to_string(), "API error: no data for IBM");
    }
}
