//! Bar listener: the stream dispatcher in front of the snapshot cache.
//!
//! Upstream callbacks (`on_live_bar`, `on_latest_bar_update`,
//! `on_history_bars`, `on_invalid_symbol`) are normalized, optionally
//! published as [`BarEvent`]s, and admitted into the cache. Control events
//! change the watch set or request a snapshot.
//!
//! One mutex guards the watch registry and the cache together. Upstream
//! calls and event publishing always happen with the lock released.

use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use crate::{
    config::{ConfigError, ListenerConfig},
    errors::Error,
    events::{BarEvent, BarEventKind, ControlEvent, EventData, EventPublisher},
    models::{
        bar::Bar,
        interval::Interval,
        raw::{RawBar, RawBarBatch},
    },
    normalizer::{NormalizeError, Normalizer},
    providers::{BarStream, DataProvider, HistoryRequest, StreamError},
    snapshot::{
        SnapshotCache, SnapshotState, lock,
        reader::{MarketSnapshot, SnapshotReader},
    },
    watch::WatchRequest,
};

pub struct BarListener {
    config: ListenerConfig,
    interval: Interval,
    normalizer: Normalizer,
    stream: Arc<dyn BarStream>,
    publisher: Arc<dyn EventPublisher>,
    state: Arc<Mutex<SnapshotState>>,
}

impl BarListener {
    /// Validates `config` and builds a listener with an empty watch set.
    ///
    /// The snapshot cache exists only when `mkt_snapshot_depth > 0`; its
    /// table is created by the first bar.
    pub fn new(
        config: ListenerConfig,
        stream: Arc<dyn BarStream>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let interval = config.interval()?;
        let normalizer = Normalizer::new(config.key_suffix.clone(), config.tz()?);

        let cache = match (config.mkt_snapshot_depth, config.snapshot_lattice()?) {
            (0, _) => None,
            (depth, Some(lattice)) => Some(SnapshotCache::new(depth, lattice)),
            (_, None) => return Err(ConfigError::SnapshotInterval(interval.kind)),
        };

        Ok(Self {
            config,
            interval,
            normalizer,
            stream,
            publisher,
            state: Arc::new(Mutex::new(SnapshotState::new(cache))),
        })
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn connect(&self) -> Result<(), StreamError> {
        self.stream.connect()?;
        info!("bar listener connected ({} bars)", self.interval);
        Ok(())
    }

    /// Disconnects upstream. Teardown never fails: errors are logged.
    pub fn shutdown(&self) {
        match self.stream.disconnect() {
            Ok(()) => info!("bar listener disconnected"),
            Err(e) => warn!("error while disconnecting bar stream: {e}"),
        }
    }

    /// Read handle sharing this listener's lock.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(Arc::clone(&self.state), self.config.mkt_snapshot_depth)
    }

    /// Currently watched symbols, sorted.
    pub fn watched(&self) -> Vec<String> {
        lock(&self.state).watch.sorted()
    }

    /// Subscribes to every symbol not watched yet.
    ///
    /// Each new symbol is claimed under the lock, subscribed upstream, and
    /// registered only on success; a symbol another caller is already
    /// subscribing is skipped. The first failure stops the batch and releases
    /// the remaining claims; symbols registered before it stay registered and
    /// the snapshot is still re-aligned before the error is returned.
    /// Returns the newly registered symbols.
    pub fn watch<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<String>, StreamError> {
        let fresh = lock(&self.state)
            .watch
            .claim(symbols.iter().map(|s| s.as_ref()));

        let mut registered = Vec::with_capacity(fresh.len());
        let mut failure = None;
        let mut pending = fresh.into_iter();
        for symbol in pending.by_ref() {
            let request = WatchRequest::new(&symbol, self.interval, self.config.mkt_snapshot_depth);
            if let Err(e) = self.stream.watch(&request) {
                lock(&self.state).watch.release(&symbol);
                failure = Some(e);
                break;
            }
            lock(&self.state).watch.insert(symbol.clone());
            info!("watching {symbol} {} bars", self.interval);
            registered.push(symbol);
        }
        if failure.is_some() {
            let mut state = lock(&self.state);
            for symbol in pending {
                state.watch.release(&symbol);
            }
        }

        if !registered.is_empty() {
            lock(&self.state).resize_to_watch();
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(registered),
        }
    }

    /// Unsubscribes watched symbols and drops their snapshot columns.
    /// Symbols that are not watched are skipped.
    pub fn unwatch<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<String>, StreamError> {
        let mut removed = Vec::new();
        let mut failure = None;
        for symbol in symbols.iter().map(|s| s.as_ref().trim()) {
            if !lock(&self.state).watch.contains(symbol) {
                continue;
            }
            if let Err(e) = self.stream.unwatch(symbol) {
                failure = Some(e);
                break;
            }
            lock(&self.state).watch.remove(symbol);
            info!("stopped watching {symbol}");
            removed.push(symbol.to_string());
        }

        if !removed.is_empty() {
            lock(&self.state).resize_to_watch();
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Upstream callback for a symbol it does not recognise.
    pub fn on_invalid_symbol(&self, symbol: &str) -> bool {
        self.unwatch_invalid(symbol)
    }

    /// Forgets `symbol` without an upstream call or touching the snapshot;
    /// unknown symbols are ignored. Returns whether it was watched.
    pub fn unwatch_invalid(&self, symbol: &str) -> bool {
        let removed = lock(&self.state).watch.remove(symbol);
        if removed {
            warn!("upstream rejected {symbol}; removed from watch set");
        } else {
            debug!("ignoring invalid-symbol notice for unwatched {symbol}");
        }
        removed
    }

    pub fn on_live_bar(&self, raw: &RawBar) -> Result<Bar, NormalizeError> {
        self.on_single(raw, BarEventKind::Bar)
    }

    pub fn on_latest_bar_update(&self, raw: &RawBar) -> Result<Bar, NormalizeError> {
        self.on_single(raw, BarEventKind::LatestBarUpdate)
    }

    /// Handles one historical batch: a single `bar` event carrying every
    /// record, then each row admitted in order. Returns the row count.
    pub fn on_history_bars(&self, batch: &RawBarBatch) -> Result<usize, NormalizeError> {
        let bars = self.normalizer.normalize_batch(batch).inspect_err(|e| {
            error!("dropping history batch of {} rows: {e}", batch.len());
        })?;
        if bars.is_empty() {
            return Ok(0);
        }

        if self.config.fire_bars {
            let records = bars.iter().map(|b| self.normalizer.record(b)).collect();
            self.publish(BarEventKind::Bar, EventData::Records(records));
        }
        self.admit(&bars);
        Ok(bars.len())
    }

    /// Reads the snapshot, publishes it as `bar_market_snapshot` and returns
    /// it. Without a cache (or before the first bar) the snapshot is empty.
    pub fn request_market_snapshot(&self, normalize: bool) -> MarketSnapshot {
        let snapshot = self.reader().read(normalize);
        let records = snapshot.records(self.normalizer.key_suffix());
        self.publish(BarEventKind::BarMarketSnapshot, EventData::Records(records));
        snapshot
    }

    pub fn handle(&self, event: ControlEvent) -> Result<(), Error> {
        match event {
            ControlEvent::WatchBars { data } => {
                self.watch(&data.into_symbols())?;
            }
            ControlEvent::UnwatchBars { data } => {
                self.unwatch(&data.into_symbols())?;
            }
            ControlEvent::RequestMarketSnapshotBars { normalize } => {
                self.request_market_snapshot(normalize);
            }
        }
        Ok(())
    }

    /// Decodes a JSON control event and handles it.
    pub fn handle_json(&self, event: &str) -> Result<(), Error> {
        self.handle(ControlEvent::from_json(event)?)
    }

    /// Fills the snapshot window of `symbols` from the historical
    /// connection, one request per symbol. Returns the rows processed.
    ///
    /// A no-op when snapshots are disabled.
    pub async fn backfill(
        &self,
        provider: &dyn DataProvider,
        symbols: &[String],
    ) -> Result<usize, Error> {
        let depth = self.config.mkt_snapshot_depth;
        if depth == 0 {
            debug!("snapshot disabled; skipping backfill");
            return Ok(0);
        }

        let mut total = 0;
        for symbol in symbols {
            let request = HistoryRequest {
                symbol: symbol.clone(),
                interval: self.interval,
                max_bars: depth,
            };
            let batch = provider.fetch_bars(request).await?;
            let n = self.on_history_bars(&batch)?;
            debug!("backfilled {n} bars for {symbol}");
            total += n;
        }
        Ok(total)
    }

    fn on_single(&self, raw: &RawBar, kind: BarEventKind) -> Result<Bar, NormalizeError> {
        let bar = self
            .normalizer
            .normalize(raw)
            .inspect_err(|e| error!("dropping bar: {e}"))?;

        if self.config.fire_bars {
            self.publish(kind, EventData::Record(self.normalizer.record(&bar)));
        }
        self.admit(std::slice::from_ref(&bar));
        Ok(bar)
    }

    fn admit(&self, bars: &[Bar]) {
        let mut state = lock(&self.state);
        if state.cache.is_none() {
            return;
        }
        for bar in bars {
            state.upsert(bar);
        }
    }

    fn publish(&self, kind: BarEventKind, data: EventData) {
        let event = BarEvent {
            kind,
            data,
            interval_type: self.interval.kind,
            interval_len: self.interval.len,
        };
        if let Err(e) = self.publisher.publish(event) {
            warn!("failed to publish {kind:?} event: {e}");
        }
    }
}
