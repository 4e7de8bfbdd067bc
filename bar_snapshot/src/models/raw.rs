//! Vendor-shaped bar records as delivered by the upstream connections.
//!
//! Field names follow the vendor's wire layout (`open_p`, `tot_vlm`, ...). The
//! record's `date` and `time` are exchange-local; see
//! [`Normalizer`](crate::normalizer::Normalizer) for the conversion to UTC.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Symbol text as it arrives: either already decoded or raw ASCII bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSymbol {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&str> for RawSymbol {
    fn from(s: &str) -> Self {
        RawSymbol::Text(s.to_string())
    }
}

impl From<&[u8]> for RawSymbol {
    fn from(b: &[u8]) -> Self {
        RawSymbol::Bytes(b.to_vec())
    }
}

/// One bar record from the streaming or historical connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub symbol: RawSymbol,
    /// Exchange-local trading date.
    pub date: NaiveDate,
    /// Microseconds since exchange-local midnight.
    #[serde(rename = "time")]
    pub time_us: i64,
    pub open_p: f64,
    pub high_p: f64,
    pub low_p: f64,
    pub close_p: f64,
    pub tot_vlm: u64,
    pub prd_vlm: u64,
    pub num_trds: u64,
}

/// Columnar batch of bar records, typically one historical backfill response
/// or several symbols closing at the same instant.
///
/// Every column must hold the same number of entries. The normalizer checks
/// this and reports a mismatch instead of guessing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBarBatch {
    pub symbol: Vec<RawSymbol>,
    pub date: Vec<NaiveDate>,
    #[serde(rename = "time")]
    pub time_us: Vec<i64>,
    pub open_p: Vec<f64>,
    pub high_p: Vec<f64>,
    pub low_p: Vec<f64>,
    pub close_p: Vec<f64>,
    pub tot_vlm: Vec<u64>,
    pub prd_vlm: Vec<u64>,
    pub num_trds: Vec<u64>,
}

impl RawBarBatch {
    /// Column lengths keyed by wire name, in declaration order.
    pub fn column_lengths(&self) -> [(&'static str, usize); 10] {
        [
            ("symbol", self.symbol.len()),
            ("date", self.date.len()),
            ("time", self.time_us.len()),
            ("open_p", self.open_p.len()),
            ("high_p", self.high_p.len()),
            ("low_p", self.low_p.len()),
            ("close_p", self.close_p.len()),
            ("tot_vlm", self.tot_vlm.len()),
            ("prd_vlm", self.prd_vlm.len()),
            ("num_trds", self.num_trds.len()),
        ]
    }

    pub fn push(&mut self, bar: RawBar) {
        self.symbol.push(bar.symbol);
        self.date.push(bar.date);
        self.time_us.push(bar.time_us);
        self.open_p.push(bar.open_p);
        self.high_p.push(bar.high_p);
        self.low_p.push(bar.low_p);
        self.close_p.push(bar.close_p);
        self.tot_vlm.push(bar.tot_vlm);
        self.prd_vlm.push(bar.prd_vlm);
        self.num_trds.push(bar.num_trds);
    }

    /// Number of records, taken from the symbol column.
    pub fn len(&self) -> usize {
        self.symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol.is_empty()
    }
}

impl FromIterator<RawBar> for RawBarBatch {
    fn from_iter<I: IntoIterator<Item = RawBar>>(iter: I) -> Self {
        let mut batch = RawBarBatch::default();
        for bar in iter {
            batch.push(bar);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_accepts_text_or_bytes_on_the_wire() {
        let text: RawSymbol = serde_json::from_str(r#""IBM""#).unwrap();
        assert_eq!(text, RawSymbol::Text("IBM".into()));

        let bytes: RawSymbol = serde_json::from_str("[73, 66, 77]").unwrap();
        assert_eq!(bytes, RawSymbol::Bytes(b"IBM".to_vec()));
    }

    #[test]
    fn record_uses_vendor_field_names() {
        let json = r#"{
            "symbol": "IBM", "date": "2024-01-02", "time": 34260000000,
            "open_p": 1.0, "high_p": 2.0, "low_p": 0.5, "close_p": 1.5,
            "tot_vlm": 100, "prd_vlm": 10, "num_trds": 3
        }"#;
        let bar: RawBar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.time_us, 34_260_000_000);
        assert_eq!(bar.num_trds, 3);
    }

    #[test]
    fn collected_batch_has_aligned_columns() {
        let bar = RawBar {
            symbol: "IBM".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time_us: 0,
            open_p: 1.0,
            high_p: 1.0,
            low_p: 1.0,
            close_p: 1.0,
            tot_vlm: 0,
            prd_vlm: 0,
            num_trds: 0,
        };
        let batch: RawBarBatch = vec![bar.clone(), bar].into_iter().collect();
        assert_eq!(batch.len(), 2);
        assert!(batch.column_lengths().iter().all(|(_, n)| *n == 2));
    }
}
