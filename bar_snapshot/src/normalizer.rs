//! Raw vendor records → canonical [`Bar`]s, and canonical rows → suffixed
//! output records.
//!
//! The normalizer is a pure transformation. A malformed batch (columns of
//! different lengths) is an upstream contract violation and is reported as a
//! [`NormalizeError`] rather than repaired.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    bar::{Bar, BarValues},
    field::Field,
    raw::{RawBar, RawBarBatch, RawSymbol},
};

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Output record: suffixed field name → JSON value, in canonical field order.
pub type BarRecord = IndexMap<String, Value>;

/// Errors raised when a vendor record cannot be turned into a [`Bar`].
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("batch column `{column}` has {found} entries, expected {expected}")]
    ShapeMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("bar record has an empty symbol")]
    EmptySymbol,

    #[error("bar symbol is not ASCII: {0:?}")]
    NonAsciiSymbol(Vec<u8>),

    #[error("invalid bar time for {symbol}: {date} + {time_us}us")]
    Timestamp {
        symbol: String,
        date: NaiveDate,
        time_us: i64,
    },
}

/// Converts vendor bar records into canonical rows for one interval family.
#[derive(Debug, Clone)]
pub struct Normalizer {
    key_suffix: String,
    timezone: Tz,
}

impl Normalizer {
    /// `timezone` is the exchange zone the vendor's `date`/`time` are local to.
    pub fn new(key_suffix: impl Into<String>, timezone: Tz) -> Self {
        Self {
            key_suffix: key_suffix.into(),
            timezone,
        }
    }

    pub fn key_suffix(&self) -> &str {
        &self.key_suffix
    }

    pub fn normalize(&self, raw: &RawBar) -> Result<Bar, NormalizeError> {
        let symbol = decode_symbol(&raw.symbol)?;
        let timestamp = self.timestamp(&symbol, raw.date, raw.time_us)?;

        Ok(Bar {
            symbol,
            timestamp,
            open: raw.open_p,
            high: raw.high_p,
            low: raw.low_p,
            close: raw.close_p,
            total_volume: raw.tot_vlm,
            period_volume: raw.prd_vlm,
            trade_count: raw.num_trds,
        })
    }

    /// Normalizes every record of a columnar batch, preserving order.
    pub fn normalize_batch(&self, batch: &RawBarBatch) -> Result<Vec<Bar>, NormalizeError> {
        let expected = batch.len();
        if let Some((column, found)) = batch
            .column_lengths()
            .into_iter()
            .find(|(_, len)| *len != expected)
        {
            return Err(NormalizeError::ShapeMismatch {
                column,
                expected,
                found,
            });
        }

        (0..expected)
            .map(|i| {
                let symbol = decode_symbol(&batch.symbol[i])?;
                let timestamp = self.timestamp(&symbol, batch.date[i], batch.time_us[i])?;
                Ok(Bar {
                    symbol,
                    timestamp,
                    open: batch.open_p[i],
                    high: batch.high_p[i],
                    low: batch.low_p[i],
                    close: batch.close_p[i],
                    total_volume: batch.tot_vlm[i],
                    period_volume: batch.prd_vlm[i],
                    trade_count: batch.num_trds[i],
                })
            })
            .collect()
    }

    /// Renders a bar with this normalizer's key suffix.
    pub fn record(&self, bar: &Bar) -> BarRecord {
        render_record(
            &bar.symbol,
            bar.timestamp,
            &BarValues::from(bar),
            &self.key_suffix,
        )
    }

    fn timestamp(
        &self,
        symbol: &str,
        date: NaiveDate,
        time_us: i64,
    ) -> Result<DateTime<Utc>, NormalizeError> {
        let invalid = || NormalizeError::Timestamp {
            symbol: symbol.to_string(),
            date,
            time_us,
        };
        if !(0..MICROS_PER_DAY).contains(&time_us) {
            return Err(invalid());
        }
        let naive = date.and_time(NaiveTime::MIN) + Duration::microseconds(time_us);
        // Fall-back hours occur twice; bars are stamped on the first pass.
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(invalid)
    }
}

fn decode_symbol(raw: &RawSymbol) -> Result<String, NormalizeError> {
    let symbol = match raw {
        RawSymbol::Text(s) => s.trim().to_string(),
        RawSymbol::Bytes(b) => {
            if !b.is_ascii() {
                return Err(NormalizeError::NonAsciiSymbol(b.clone()));
            }
            // ASCII is valid UTF-8; vendors pad fixed-width fields with NULs.
            String::from_utf8_lossy(b)
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        }
    };
    if symbol.is_empty() {
        return Err(NormalizeError::EmptySymbol);
    }
    Ok(symbol)
}

/// Renders one (possibly sparse) row with suffixed keys.
///
/// Missing cells become `null`; count columns are emitted as integers.
pub fn render_record(
    symbol: &str,
    timestamp: DateTime<Utc>,
    values: &BarValues,
    suffix: &str,
) -> BarRecord {
    let mut record = BarRecord::with_capacity(Field::ALL.len() + 2);
    record.insert(format!("symbol{suffix}"), Value::from(symbol));
    record.insert(
        format!("timestamp{suffix}"),
        Value::from(timestamp.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
    );
    for field in Field::ALL {
        let value = match values.get(field) {
            None => Value::Null,
            Some(v) if field.is_count() => Value::from(v.max(0.0).round() as u64),
            Some(v) => Value::from(v),
        };
        record.insert(field.key(suffix), value);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ny() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn raw(symbol: RawSymbol, hour: i64, minute: i64) -> RawBar {
        RawBar {
            symbol,
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time_us: (hour * 3600 + minute * 60) * 1_000_000,
            open_p: 10.0,
            high_p: 12.0,
            low_p: 9.5,
            close_p: 11.0,
            tot_vlm: 5_000,
            prd_vlm: 250,
            num_trds: 12,
        }
    }

    #[test]
    fn normalizes_single_record() {
        let n = Normalizer::new("", ny());
        let bar = n.normalize(&raw(RawSymbol::Bytes(b"IBM".to_vec()), 9, 31)).unwrap();

        assert_eq!(bar.symbol, "IBM");
        // 09:31 EST is 14:31 UTC.
        assert_eq!(
            bar.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 14, 31, 0).unwrap()
        );
        assert_eq!(bar.open, 10.0);
        assert_eq!(bar.close, 11.0);
        assert_eq!(bar.total_volume, 5_000);
        assert_eq!(bar.period_volume, 250);
        assert_eq!(bar.trade_count, 12);
    }

    #[test]
    fn utc_exchange_keeps_wall_clock() {
        let n = Normalizer::new("", chrono_tz::UTC);
        let bar = n.normalize(&raw("ES".into(), 0, 0)).unwrap();
        assert_eq!(bar.timestamp, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn strips_padding_from_byte_symbols() {
        let n = Normalizer::new("", ny());
        let bar = n
            .normalize(&raw(RawSymbol::Bytes(b"SPY\0\0".to_vec()), 10, 0))
            .unwrap();
        assert_eq!(bar.symbol, "SPY");
    }

    #[test]
    fn rejects_bad_symbols() {
        let n = Normalizer::new("", ny());
        assert_eq!(
            n.normalize(&raw(RawSymbol::Text("  ".into()), 10, 0)),
            Err(NormalizeError::EmptySymbol)
        );
        assert!(matches!(
            n.normalize(&raw(RawSymbol::Bytes(vec![0xC3, 0xA9]), 10, 0)),
            Err(NormalizeError::NonAsciiSymbol(_))
        ));
    }

    #[test]
    fn rejects_time_outside_the_day() {
        let n = Normalizer::new("", ny());
        let mut bar = raw("IBM".into(), 0, 0);
        bar.time_us = MICROS_PER_DAY;
        assert!(matches!(
            n.normalize(&bar),
            Err(NormalizeError::Timestamp { .. })
        ));
    }

    #[test]
    fn rejects_nonexistent_local_time() {
        let n = Normalizer::new("", ny());
        let mut bar = raw("IBM".into(), 2, 30);
        // New York skips 02:00-03:00 on this date.
        bar.date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(n.normalize(&bar).is_err());
    }

    #[test]
    fn batch_preserves_order() {
        let n = Normalizer::new("", ny());
        let batch: RawBarBatch = vec![raw("A".into(), 9, 30), raw("B".into(), 9, 30)]
            .into_iter()
            .collect();
        let bars = n.normalize_batch(&batch).unwrap();
        assert_eq!(
            bars.iter().map(|b| b.symbol.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(bars[0].timestamp, bars[1].timestamp);
    }

    #[test]
    fn batch_with_mismatched_columns_is_a_shape_error() {
        let n = Normalizer::new("", ny());
        let mut batch: RawBarBatch = vec![raw("A".into(), 9, 30), raw("B".into(), 9, 30)]
            .into_iter()
            .collect();
        batch.close_p.pop();

        assert_eq!(
            n.normalize_batch(&batch),
            Err(NormalizeError::ShapeMismatch {
                column: "close_p",
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn record_keys_carry_suffix() {
        let n = Normalizer::new("_1m", ny());
        let bar = n.normalize(&raw("IBM".into(), 9, 31)).unwrap();
        let record = n.record(&bar);

        let keys: Vec<_> = record.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "symbol_1m",
                "timestamp_1m",
                "open_1m",
                "high_1m",
                "low_1m",
                "close_1m",
                "total_volume_1m",
                "period_volume_1m",
                "trade_count_1m",
            ]
        );
        assert_eq!(record["symbol_1m"], Value::from("IBM"));
        assert_eq!(record["timestamp_1m"], Value::from("2024-01-02T14:31:00Z"));
        assert_eq!(record["trade_count_1m"], Value::from(12u64));
    }

    #[test]
    fn record_timestamp_keeps_sub_second_precision() {
        let n = Normalizer::new("", ny());
        let mut first = raw("IBM".into(), 9, 31);
        first.time_us += 250_000;
        let mut second = first.clone();
        second.time_us += 1;

        let a = n.record(&n.normalize(&first).unwrap());
        let b = n.record(&n.normalize(&second).unwrap());
        assert_eq!(a["timestamp"], Value::from("2024-01-02T14:31:00.250Z"));
        assert_eq!(b["timestamp"], Value::from("2024-01-02T14:31:00.250001Z"));
    }

    #[test]
    fn sparse_rows_render_nulls() {
        let mut values = BarValues::hole();
        values.set(Field::PeriodVolume, Some(0.0));
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, 31, 0).unwrap();
        let record = render_record("B", ts, &values, "");
        assert_eq!(record["open"], Value::Null);
        assert_eq!(record["period_volume"], Value::from(0u64));
    }
}
