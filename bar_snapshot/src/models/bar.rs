//! Canonical in-memory representation of a streamed bar (OHLCV).
//!
//! [`Bar`] is what the [`Normalizer`](crate::normalizer::Normalizer) produces
//! from a vendor record. [`BarValues`] is the sparse form the snapshot cache
//! stores, where any cell may be a hole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::field::{FIELD_COUNT, Field, FillStrategy};

/// A single instrument-interval observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Instrument identifier (e.g., "AAPL", "@ESU24").
    pub symbol: String,

    /// Bar timestamp (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Cumulative session volume as of this bar.
    pub total_volume: u64,

    /// Volume traded inside this bar only.
    pub period_volume: u64,

    /// Number of trades inside this bar.
    pub trade_count: u64,
}

impl Bar {
    /// Value of one column as stored in the snapshot table.
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::TotalVolume => self.total_volume as f64,
            Field::PeriodVolume => self.period_volume as f64,
            Field::TradeCount => self.trade_count as f64,
        }
    }
}

/// One row of the snapshot table: a cell per [`Field`], each possibly missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BarValues([Option<f64>; FIELD_COUNT]);

impl BarValues {
    /// A row with every cell missing.
    pub const fn hole() -> Self {
        Self([None; FIELD_COUNT])
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.0[field.index()]
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        self.0[field.index()] = value;
    }

    /// `true` if no cell holds a value.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// `true` if the row carries no price or volume evidence.
    ///
    /// Zero-filled activity columns are ignored because they are fabricated
    /// for every hole regardless of whether the symbol ever traded.
    pub fn is_vacant(&self) -> bool {
        Field::ALL
            .iter()
            .filter(|f| f.fill_strategy() != FillStrategy::ZeroFill)
            .all(|f| self.get(*f).is_none())
    }
}

impl From<&Bar> for BarValues {
    fn from(bar: &Bar) -> Self {
        let mut values = Self::hole();
        for field in Field::ALL {
            values.set(field, Some(bar.value(field)));
        }
        values
    }
}
