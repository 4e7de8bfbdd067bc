//! The symbol × time table behind the snapshot cache.
//!
//! Each symbol owns an ordered map of timestamp → [`BarValues`]; the table
//! also keeps the shared time grid (every distinct timestamp any symbol
//! holds), laid on a [`Lattice`] anchored at the first bar. Rows at or before the latest observation are "settled" and bounded
//! by the snapshot depth. Rows after it are pre-allocated empty slots created
//! by [`SnapshotTable::expand`], so the next bars overwrite existing keys
//! instead of growing the grid one step at a time.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;

use crate::{
    models::bar::{Bar, BarValues},
    snapshot::{
        fill,
        lattice::Lattice,
        reader::{MarketSnapshot, SnapshotRow},
    },
};

type Series = BTreeMap<DateTime<Utc>, BarValues>;

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First bar: the table was created and aligned to the watch set.
    Seeded,
    /// The (symbol, timestamp) key existed and its row was replaced.
    Overwritten,
    /// A new key was inserted in order.
    Merged,
    /// A new key beyond the horizon was inserted and the grid grew.
    Expanded,
}

#[derive(Debug, Clone)]
pub struct SnapshotTable {
    lattice: Lattice,
    /// Timestamp of the seeding bar. Fixed for the table's lifetime, even
    /// after its row is evicted.
    origin: DateTime<Utc>,
    grid: BTreeSet<DateTime<Utc>>,
    series: BTreeMap<String, Series>,
    /// Latest timestamp holding an observed (or carried) value.
    observed: Option<DateTime<Utc>>,
}

impl SnapshotTable {
    /// Builds a one-row table from the first bar and aligns it to `symbols`.
    ///
    /// The bar's own symbol joins the axis even if it is not watched, so the
    /// first observation is never discarded.
    pub fn seed(bar: &Bar, symbols: &[String], lattice: impl Into<Lattice>) -> Self {
        let mut series = BTreeMap::new();
        series.insert(
            bar.symbol.clone(),
            Series::from([(bar.timestamp, BarValues::from(bar))]),
        );

        let mut table = Self {
            lattice: lattice.into(),
            origin: bar.timestamp,
            grid: BTreeSet::from([bar.timestamp]),
            series,
            observed: Some(bar.timestamp),
        };

        let mut axis = symbols.to_vec();
        if !axis.contains(&bar.symbol) {
            axis.push(bar.symbol.clone());
        }
        table.resize(&axis);
        table
    }

    /// Inserts or replaces one observation.
    ///
    /// A bar beyond the grid horizon triggers [`expand`](Self::expand) with
    /// `expansion_steps`. Old settled rows are evicted only after the new row
    /// is in place, so the newest observation always survives truncation.
    pub fn upsert(&mut self, bar: &Bar, depth: usize, expansion_steps: usize) -> UpsertOutcome {
        let horizon = self.horizon();
        let values = BarValues::from(bar);

        let series = self.series.entry(bar.symbol.clone()).or_default();
        let mut outcome = match series.get_mut(&bar.timestamp) {
            Some(row) => {
                *row = values;
                UpsertOutcome::Overwritten
            }
            None => {
                series.insert(bar.timestamp, values);
                self.grid.insert(bar.timestamp);
                UpsertOutcome::Merged
            }
        };

        if self.observed.is_none_or(|o| bar.timestamp > o) {
            self.observed = Some(bar.timestamp);
        }

        let beyond_horizon = horizon.is_some_and(|h| bar.timestamp > h);
        if beyond_horizon && self.expand(expansion_steps, depth) {
            outcome = UpsertOutcome::Expanded;
        } else {
            if outcome == UpsertOutcome::Merged {
                // A late bar below the grid must not leave missing steps.
                let added = self.fill_lattice(0);
                for rows in self.series.values_mut() {
                    for ts in &added {
                        rows.entry(*ts).or_insert_with(BarValues::hole);
                    }
                }
            }
            self.evict(depth);
        }
        outcome
    }

    /// Re-aligns the table onto `symbols` × the current grid.
    ///
    /// Symbols outside the set are dropped, new ones start as holes, and the
    /// fill policy is re-applied to every settled row.
    pub fn resize(&mut self, symbols: &[String]) {
        let axis: BTreeSet<&String> = symbols.iter().collect();
        let mut rebuilt = BTreeMap::new();
        for symbol in axis {
            let mut rows = self.series.remove(symbol).unwrap_or_default();
            for ts in &self.grid {
                rows.entry(*ts).or_insert_with(BarValues::hole);
            }
            rebuilt.insert(symbol.clone(), rows);
        }
        self.series = rebuilt;
        self.recompute_observed();
        self.fill_settled();
    }

    /// Fills every lattice slot between the oldest and latest grid
    /// timestamps, adds `steps` slots beyond the latest, reindexes every
    /// symbol onto the grid, then truncates each symbol's settled rows to
    /// `max_depth`.
    ///
    /// Returns `false` (and changes nothing) while the grid holds fewer than
    /// two timestamps: a single point does not establish a grid yet.
    pub fn expand(&mut self, steps: usize, max_depth: usize) -> bool {
        if self.grid.len() < 2 || !self.lattice.is_valid() {
            return false;
        }
        self.fill_lattice(steps);

        for rows in self.series.values_mut() {
            for ts in &self.grid {
                rows.entry(*ts).or_insert_with(BarValues::hole);
            }
        }
        debug!(
            "snapshot grid expanded by {steps} steps to {:?} across {} symbols",
            self.grid.last(),
            self.series.len()
        );

        self.evict(max_depth);
        true
    }

    /// Tail window of every symbol.
    ///
    /// Vacant rows are dropped first. Without `normalize` each symbol keeps
    /// its last `depth` remaining rows and symbols left with none are
    /// omitted. With `normalize` every symbol is re-densified onto the
    /// remaining timestamps plus the `depth` grid slots ending at the latest
    /// observation, filled, and cut to exactly `depth` rows.
    pub fn read_tail(&self, depth: usize, normalize: bool) -> MarketSnapshot {
        if depth == 0 {
            return MarketSnapshot::default();
        }
        if normalize {
            self.read_normalized(depth)
        } else {
            self.read_observed(depth)
        }
    }

    fn read_observed(&self, depth: usize) -> MarketSnapshot {
        let mut out = IndexMap::new();
        for (symbol, rows) in &self.series {
            let kept: Vec<SnapshotRow> = rows
                .iter()
                .filter(|(_, v)| !v.is_vacant())
                .map(|(ts, v)| SnapshotRow::new(*ts, *v))
                .collect();
            if kept.is_empty() {
                continue;
            }
            let skip = kept.len().saturating_sub(depth);
            out.insert(symbol.clone(), kept.into_iter().skip(skip).collect());
        }
        MarketSnapshot::from_series(out)
    }

    fn read_normalized(&self, depth: usize) -> MarketSnapshot {
        let Some(latest) = self.observed else {
            return MarketSnapshot::default();
        };

        let mut axis: BTreeSet<DateTime<Utc>> = self
            .series
            .values()
            .flat_map(|rows| rows.iter().filter(|(_, v)| !v.is_vacant()).map(|(ts, _)| *ts))
            .collect();
        axis.extend((0..depth as i64).filter_map(|k| self.lattice.shift(latest, -k)));
        let axis: Vec<DateTime<Utc>> = axis.into_iter().filter(|ts| *ts <= latest).collect();
        let skip = axis.len().saturating_sub(depth);

        let mut out = IndexMap::new();
        for (symbol, rows) in &self.series {
            let mut dense: Vec<BarValues> = axis
                .iter()
                .map(|ts| {
                    rows.get(ts)
                        .filter(|v| !v.is_vacant())
                        .copied()
                        .unwrap_or_else(BarValues::hole)
                })
                .collect();
            fill::apply(&mut dense);

            let tail = axis
                .iter()
                .zip(dense)
                .skip(skip)
                .map(|(ts, v)| SnapshotRow::new(*ts, v))
                .collect();
            out.insert(symbol.clone(), tail);
        }
        MarketSnapshot::from_series(out)
    }

    /// Latest grid timestamp, including pre-allocated slots.
    pub fn horizon(&self) -> Option<DateTime<Utc>> {
        self.grid.last().copied()
    }

    /// Latest timestamp holding an observed or carried value.
    pub fn observed_horizon(&self) -> Option<DateTime<Utc>> {
        self.observed
    }

    pub fn lattice(&self) -> Lattice {
        self.lattice
    }

    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    pub fn grid(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.grid.iter()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn row(&self, symbol: &str, ts: DateTime<Utc>) -> Option<&BarValues> {
        self.series.get(symbol).and_then(|rows| rows.get(&ts))
    }

    /// Number of rows a symbol holds at or before the latest observation.
    pub fn settled_len(&self, symbol: &str) -> usize {
        match (self.series.get(symbol), self.observed) {
            (Some(rows), Some(latest)) => rows.range(..=latest).count(),
            _ => 0,
        }
    }

    /// `true` if every symbol holds a row for every grid timestamp.
    pub fn is_dense(&self) -> bool {
        self.series
            .values()
            .all(|rows| self.grid.iter().all(|ts| rows.contains_key(ts)))
    }

    /// Inserts the lattice slots missing between the oldest and newest grid
    /// timestamps, plus `extra` slots past the newest. Off-lattice keys stay
    /// as they are. Returns the inserted slots.
    fn fill_lattice(&mut self, extra: usize) -> Vec<DateTime<Utc>> {
        let (Some(&first), Some(&last)) = (self.grid.first(), self.grid.last()) else {
            return Vec::new();
        };
        if first == last || !self.lattice.is_valid() {
            return Vec::new();
        }

        let mut inserted = Vec::new();
        let mut index = self.lattice.floor_index(self.origin, first);
        let mut beyond = 0;
        while let Some(slot) = self.lattice.slot(self.origin, index) {
            index += 1;
            if slot < first {
                continue;
            }
            if slot > last {
                if beyond == extra {
                    break;
                }
                beyond += 1;
            }
            if self.grid.insert(slot) {
                inserted.push(slot);
            }
        }
        inserted
    }

    fn fill_settled(&mut self) {
        let Some(latest) = self.observed else {
            return;
        };
        for rows in self.series.values_mut() {
            let mut settled: Vec<BarValues> = rows.range(..=latest).map(|(_, v)| *v).collect();
            fill::apply(&mut settled);
            for ((_, slot), filled) in rows.range_mut(..=latest).zip(settled) {
                *slot = filled;
            }
        }
    }

    fn evict(&mut self, max_depth: usize) {
        let Some(latest) = self.observed else {
            return;
        };
        let max_depth = max_depth.max(1);

        let mut evicted = false;
        for rows in self.series.values_mut() {
            let settled = rows.range(..=latest).count();
            if settled <= max_depth {
                continue;
            }
            let stale: Vec<DateTime<Utc>> =
                rows.keys().take(settled - max_depth).copied().collect();
            for ts in stale {
                rows.remove(&ts);
            }
            evicted = true;
        }

        if evicted {
            let series = &self.series;
            self.grid
                .retain(|ts| series.values().any(|rows| rows.contains_key(ts)));
        }
    }

    fn recompute_observed(&mut self) {
        self.observed = self
            .series
            .values()
            .filter_map(|rows| {
                rows.iter()
                    .rev()
                    .find(|(_, v)| !v.is_vacant())
                    .map(|(ts, _)| *ts)
            })
            .max();
    }
}
