#![allow(dead_code)]

use std::sync::Arc;

use bar_snapshot::{
    BarListener, ListenerConfig,
    events::{BarEvent, ChannelPublisher},
    models::{
        interval::{Interval, IntervalType},
        raw::RawBar,
    },
    providers::replay::ReplayStream,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

/// 09:30 New York on 2024-01-02, in microseconds since local midnight.
pub const OPEN_US: i64 = (9 * 3600 + 30 * 60) * 1_000_000;

pub fn session_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

/// UTC instant `secs` after the 09:30 open.
pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap() + Duration::seconds(secs)
}

/// Raw bar `secs` after the open with a flat price.
pub fn raw(symbol: &str, secs: i64, price: f64) -> RawBar {
    RawBar {
        tot_vlm: 1_000 + secs as u64,
        ..raw_on(symbol, session_date(), OPEN_US + secs * 1_000_000, price)
    }
}

/// Raw bar stamped `time_us` after local midnight on `date`.
pub fn raw_on(symbol: &str, date: NaiveDate, time_us: i64, price: f64) -> RawBar {
    RawBar {
        symbol: symbol.into(),
        date,
        time_us,
        open_p: price,
        high_p: price + 0.5,
        low_p: price - 0.5,
        close_p: price + 0.25,
        tot_vlm: 1_000,
        prd_vlm: 100,
        num_trds: 5,
    }
}

pub fn config(depth: usize) -> ListenerConfig {
    ListenerConfig::new(Interval::seconds(60).unwrap()).with_snapshot_depth(depth)
}

/// One-day bars in the default New York zone.
pub fn daily_config(depth: usize) -> ListenerConfig {
    ListenerConfig::new(Interval::new(1, IntervalType::Daily).unwrap()).with_snapshot_depth(depth)
}

pub struct Harness {
    pub listener: BarListener,
    pub stream: Arc<ReplayStream>,
    pub events: UnboundedReceiver<BarEvent>,
}

impl Harness {
    pub fn new(config: ListenerConfig) -> Self {
        Self::with_stream(config, ReplayStream::new())
    }

    pub fn with_stream(config: ListenerConfig, stream: ReplayStream) -> Self {
        let stream = Arc::new(stream);
        let (publisher, events) = ChannelPublisher::channel();
        let listener = BarListener::new(config, stream.clone(), Arc::new(publisher)).unwrap();
        listener.connect().unwrap();
        Self {
            listener,
            stream,
            events,
        }
    }

    pub fn drain(&mut self) -> Vec<BarEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
