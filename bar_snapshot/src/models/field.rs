//! Value columns of a bar and the way each one is filled when a snapshot row
//! has no observation.

use serde::{Deserialize, Serialize};

/// How a missing cell of a column is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStrategy {
    /// Carried forward before any other column is resolved, so the range
    /// prices can fall back on it.
    CarryForward,
    /// A hole means nothing happened; it becomes zero and is never carried.
    ZeroFill,
    /// Forward-filled per symbol, then leading holes are back-filled.
    ForwardThenBackward,
}

/// One value column of a bar.
///
/// The discriminant doubles as the column's slot in
/// [`BarValues`](crate::models::bar::BarValues).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Open = 0,
    High = 1,
    Low = 2,
    Close = 3,
    TotalVolume = 4,
    PeriodVolume = 5,
    TradeCount = 6,
}

/// Number of value columns.
pub const FIELD_COUNT: usize = 7;

impl Field {
    /// Every column, in record order.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::TotalVolume,
        Field::PeriodVolume,
        Field::TradeCount,
    ];

    /// Slot of this column inside a values row.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Record key without suffix.
    pub const fn name(self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::TotalVolume => "total_volume",
            Field::PeriodVolume => "period_volume",
            Field::TradeCount => "trade_count",
        }
    }

    /// Record key with the configured suffix appended.
    pub fn key(self, suffix: &str) -> String {
        format!("{}{suffix}", self.name())
    }

    pub const fn fill_strategy(self) -> FillStrategy {
        match self {
            Field::Open => FillStrategy::CarryForward,
            Field::PeriodVolume | Field::TradeCount => FillStrategy::ZeroFill,
            Field::High | Field::Low | Field::Close | Field::TotalVolume => {
                FillStrategy::ForwardThenBackward
            }
        }
    }

    /// Column consulted before forward filling, if any.
    ///
    /// A quiet bar's high, low and close are all best estimated by its open,
    /// which has already been carried forward at that point.
    pub const fn fallback(self) -> Option<Field> {
        match self {
            Field::High | Field::Low | Field::Close => Some(Field::Open),
            _ => None,
        }
    }

    /// Whether the column holds a whole-number count rather than a price.
    pub const fn is_count(self) -> bool {
        matches!(
            self,
            Field::TotalVolume | Field::PeriodVolume | Field::TradeCount
        )
    }
}
