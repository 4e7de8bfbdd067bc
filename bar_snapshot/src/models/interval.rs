//! Bar interval: a length paired with an [`IntervalType`].
//!
//! Only second bars have a fixed step in absolute time. Daily bars are laid on
//! exchange-local calendar days (see
//! [`Lattice`](crate::snapshot::lattice::Lattice)), and volume and tick bars
//! close on activity, so their timestamps are irregular.
//!
//! ```
//! use bar_snapshot::models::interval::{Interval, IntervalType};
//!
//! let iv: Interval = "60s".parse().unwrap();
//! assert_eq!(iv.kind, IntervalType::Seconds);
//! assert_eq!(iv.step(), Some(chrono::Duration::seconds(60)));
//! assert_eq!(iv.to_string(), "60s");
//! ```

use std::{fmt, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval length must be > 0")]
    ZeroLength,

    #[error("unknown interval type: {0}")]
    UnknownType(String),

    #[error("invalid interval: {0}")]
    InvalidInput(String),
}

/// What closes a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IntervalType {
    /// Fixed number of seconds.
    #[default]
    #[serde(rename = "s")]
    Seconds,
    /// Fixed number of trading days.
    #[serde(rename = "d")]
    Daily,
    /// Fixed traded volume.
    #[serde(rename = "v")]
    Volume,
    /// Fixed number of ticks.
    #[serde(rename = "t")]
    Tick,
}

impl IntervalType {
    /// Single-letter code used on the wire and in config files.
    pub const fn code(self) -> &'static str {
        match self {
            IntervalType::Seconds => "s",
            IntervalType::Daily => "d",
            IntervalType::Volume => "v",
            IntervalType::Tick => "t",
        }
    }

    pub const fn is_time_based(self) -> bool {
        matches!(self, IntervalType::Seconds | IntervalType::Daily)
    }
}

impl FromStr for IntervalType {
    type Err = IntervalError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(IntervalType::Seconds),
            "d" => Ok(IntervalType::Daily),
            "v" => Ok(IntervalType::Volume),
            "t" => Ok(IntervalType::Tick),
            _ => Err(IntervalError::UnknownType(s.to_string())),
        }
    }
}

impl fmt::Display for IntervalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A bar interval = length × type (e.g., 60 seconds, 1 day, 1000 volume).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub len: u32,
    pub kind: IntervalType,
}

impl Interval {
    pub fn new(len: u32, kind: IntervalType) -> Result<Self, IntervalError> {
        if len == 0 {
            return Err(IntervalError::ZeroLength);
        }
        Ok(Self { len, kind })
    }

    pub fn seconds(len: u32) -> Result<Self, IntervalError> {
        Self::new(len, IntervalType::Seconds)
    }

    /// Fixed step of a second interval. Days vary in length across
    /// daylight-saving changes, so daily bars have none.
    pub fn step(&self) -> Option<Duration> {
        match self.kind {
            IntervalType::Seconds => Some(Duration::seconds(i64::from(self.len))),
            IntervalType::Daily | IntervalType::Volume | IntervalType::Tick => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind)
    }
}

/// Parses `"60s"`, `"1d"`, `"500v"`, `"10t"`.
impl FromStr for Interval {
    type Err = IntervalError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < 2 || !s.is_ascii() {
            return Err(IntervalError::InvalidInput(s.to_string()));
        }
        let (digits, code) = s.split_at(s.len() - 1);
        let len: u32 = digits
            .parse()
            .map_err(|_| IntervalError::InvalidInput(s.to_string()))?;
        Self::new(len, code.parse()?)
    }
}
