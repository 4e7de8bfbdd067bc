//! Events exchanged with the rest of the system.
//!
//! Outbound: [`BarEvent`]s carrying suffixed records, delivered through an
//! injected [`EventPublisher`]. Inbound: [`ControlEvent`]s decoded from the
//! bus (`{"type": "watch_bars", "data": ...}` and friends).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{models::interval::IntervalType, normalizer::BarRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarEventKind {
    /// A finished bar, or a batch of historical bars.
    Bar,
    /// In-progress update of the current bar.
    LatestBarUpdate,
    /// Tail window of every watched symbol.
    BarMarketSnapshot,
}

/// Payload of an outbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Record(BarRecord),
    Records(Vec<BarRecord>),
}

impl EventData {
    /// Number of records carried.
    pub fn len(&self) -> usize {
        match self {
            EventData::Record(_) => 1,
            EventData::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEvent {
    #[serde(rename = "type")]
    pub kind: BarEventKind,
    pub data: EventData,
    pub interval_type: IntervalType,
    pub interval_len: u32,
}

impl BarEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("event channel closed")]
    Closed,
}

/// Sink for outbound events.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: BarEvent) -> Result<(), PublishError>;
}

/// Publishes into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: UnboundedSender<BarEvent>,
}

impl ChannelPublisher {
    /// Creates a publisher and the receiving end consumers drain.
    pub fn channel() -> (Self, UnboundedReceiver<BarEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: BarEvent) -> Result<(), PublishError> {
        self.tx.send(event).map_err(|_| PublishError::Closed)
    }
}

/// One symbol or a list, as accepted by `watch_bars` / `unwatch_bars`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Symbols {
    One(String),
    Many(Vec<String>),
}

impl Symbols {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Symbols::One(s) => vec![s],
            Symbols::Many(v) => v,
        }
    }
}

/// Symbol payload of a watch control event: bare, or wrapped as
/// `{"symbol": ...}` alongside other keys that are ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymbolSelection {
    Bare(Symbols),
    Keyed { symbol: Symbols },
}

impl SymbolSelection {
    pub fn into_symbols(self) -> Vec<String> {
        match self {
            SymbolSelection::Bare(s) | SymbolSelection::Keyed { symbol: s } => s.into_vec(),
        }
    }
}

/// Inbound control events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    WatchBars {
        data: SymbolSelection,
    },
    UnwatchBars {
        data: SymbolSelection,
    },
    RequestMarketSnapshotBars {
        #[serde(default)]
        normalize: bool,
    },
}

impl ControlEvent {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn decodes_watch_payload_shapes() {
        let one = ControlEvent::from_json(r#"{"type":"watch_bars","data":"IBM"}"#).unwrap();
        let many =
            ControlEvent::from_json(r#"{"type":"watch_bars","data":["GOOG","IBM"]}"#).unwrap();
        let keyed = ControlEvent::from_json(
            r#"{"type":"watch_bars","data":{"symbol":["GOOG","IBM"],"update":1}}"#,
        )
        .unwrap();

        let symbols = |e: ControlEvent| match e {
            ControlEvent::WatchBars { data } => data.into_symbols(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(symbols(one), vec!["IBM"]);
        assert_eq!(symbols(many), vec!["GOOG", "IBM"]);
        assert_eq!(symbols(keyed), vec!["GOOG", "IBM"]);
    }

    #[test]
    fn snapshot_request_defaults_to_raw_read() {
        let e = ControlEvent::from_json(r#"{"type":"request_market_snapshot_bars"}"#).unwrap();
        assert_eq!(e, ControlEvent::RequestMarketSnapshotBars { normalize: false });
    }

    #[test]
    fn unknown_control_type_is_rejected() {
        assert!(ControlEvent::from_json(r#"{"type":"level_1_tick","data":{}}"#).is_err());
    }

    #[test]
    fn bar_event_json_shape() {
        let mut record = BarRecord::new();
        record.insert("symbol".into(), json!("IBM"));
        let event = BarEvent {
            kind: BarEventKind::LatestBarUpdate,
            data: EventData::Record(record),
            interval_type: IntervalType::Seconds,
            interval_len: 60,
        };
        let v: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "latest_bar_update",
                "data": {"symbol": "IBM"},
                "interval_type": "s",
                "interval_len": 60
            })
        );
    }

    #[tokio::test]
    async fn channel_publisher_delivers_until_closed() {
        let (publisher, mut rx) = ChannelPublisher::channel();
        let event = BarEvent {
            kind: BarEventKind::Bar,
            data: EventData::Records(vec![]),
            interval_type: IntervalType::Seconds,
            interval_len: 1,
        };
        publisher.publish(event.clone()).unwrap();
        assert_eq!(rx.recv().await, Some(event.clone()));

        drop(rx);
        assert_eq!(publisher.publish(event), Err(PublishError::Closed));
    }
}
