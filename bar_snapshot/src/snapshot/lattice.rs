//! The time lattice the snapshot grid is laid on.
//!
//! Intraday bars sit on a fixed step in absolute time. Daily bars sit on
//! exchange-local calendar days: a daylight-saving change moves their UTC
//! instant by an hour, but they stay on the lattice.
//!
//! ```
//! use bar_snapshot::snapshot::lattice::Lattice;
//! use chrono::{TimeZone, Utc};
//!
//! let daily = Lattice::Calendar { days: 1, tz: chrono_tz::America::New_York };
//! // Local midnight before and after the March 2024 change.
//! let origin = Utc.with_ymd_and_hms(2024, 3, 8, 5, 0, 0).unwrap();
//! let monday = Utc.with_ymd_and_hms(2024, 3, 11, 4, 0, 0).unwrap();
//! assert_eq!(daily.slot(origin, 3), Some(monday));
//! assert!(daily.contains(origin, monday));
//! ```

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::interval::{Interval, IntervalType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lattice {
    /// Evenly spaced instants.
    Fixed(Duration),
    /// Every `days` local calendar days in `tz`, at the origin's wall-clock time.
    Calendar { days: u32, tz: Tz },
}

impl From<Duration> for Lattice {
    fn from(step: Duration) -> Self {
        Lattice::Fixed(step)
    }
}

impl Lattice {
    /// Lattice of a time-based interval whose bars are stamped in `tz`.
    /// `None` for volume and tick bars.
    pub fn for_interval(interval: Interval, tz: Tz) -> Option<Self> {
        match interval.kind {
            IntervalType::Seconds => interval.step().map(Lattice::Fixed),
            IntervalType::Daily => Some(Lattice::Calendar {
                days: interval.len,
                tz,
            }),
            IntervalType::Volume | IntervalType::Tick => None,
        }
    }

    /// `false` for a zero or negative step, which cannot advance.
    pub fn is_valid(&self) -> bool {
        match *self {
            Lattice::Fixed(step) => step > Duration::zero(),
            Lattice::Calendar { days, .. } => days > 0,
        }
    }

    /// Instant `index` steps from `origin`.
    ///
    /// A calendar slot whose wall time falls in a spring-forward gap resolves
    /// to the hour after it.
    pub fn slot(&self, origin: DateTime<Utc>, index: i64) -> Option<DateTime<Utc>> {
        match *self {
            Lattice::Fixed(step) => {
                let offset = step.num_milliseconds().checked_mul(index)?;
                origin.checked_add_signed(Duration::milliseconds(offset))
            }
            Lattice::Calendar { days, tz } => {
                let local = origin.with_timezone(&tz).naive_local();
                let offset = i64::from(days).checked_mul(index)?;
                resolve(tz, local.checked_add_signed(Duration::try_days(offset)?)?)
            }
        }
    }

    /// Index of the last slot at or before `ts`.
    pub fn floor_index(&self, origin: DateTime<Utc>, ts: DateTime<Utc>) -> i64 {
        let guess = match *self {
            Lattice::Fixed(step) => {
                let step_ms = step.num_milliseconds().max(1);
                return (ts - origin).num_milliseconds().div_euclid(step_ms);
            }
            Lattice::Calendar { days, tz } => {
                let from = origin.with_timezone(&tz).date_naive();
                let to = ts.with_timezone(&tz).date_naive();
                (to - from).num_days().div_euclid(i64::from(days.max(1)))
            }
        };
        // Same local day as a slot, but earlier than its wall time.
        match self.slot(origin, guess) {
            Some(slot) if slot > ts => guess - 1,
            _ => guess,
        }
    }

    /// Whether `ts` is a slot of the lattice anchored at `origin`.
    pub fn contains(&self, origin: DateTime<Utc>, ts: DateTime<Utc>) -> bool {
        self.slot(origin, self.floor_index(origin, ts)) == Some(ts)
    }

    /// `ts` moved by `steps` lattice steps, keeping its offset to the lattice.
    pub fn shift(&self, ts: DateTime<Utc>, steps: i64) -> Option<DateTime<Utc>> {
        self.slot(ts, steps)
    }
}

fn resolve(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            let later = local.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&later).earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn ny_midnight(month: u32, day: u32) -> DateTime<Utc> {
        New_York
            .with_ymd_and_hms(2024, month, day, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn utc(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn fixed_lattice_is_origin_aligned() {
        let minute = Lattice::from(Duration::seconds(60));
        assert_eq!(minute.slot(utc(0), -2), Some(utc(-120)));
        assert_eq!(minute.floor_index(utc(0), utc(200)), 3);
        assert_eq!(minute.floor_index(utc(0), utc(-30)), -1);
        assert!(minute.contains(utc(0), utc(180)));
        assert!(!minute.contains(utc(0), utc(90)));
        assert_eq!(minute.shift(utc(90), 1), Some(utc(150)));
    }

    #[test]
    fn calendar_days_follow_local_midnight_across_dst() {
        let daily = Lattice::Calendar { days: 1, tz: New_York };
        let origin = ny_midnight(3, 8);

        let slots: Vec<_> = (0..5).filter_map(|i| daily.slot(origin, i)).collect();
        assert_eq!(
            slots,
            (8..13).map(|d| ny_midnight(3, d)).collect::<Vec<_>>()
        );
        // Sunday 10 March is 23 hours long in New York.
        assert_eq!(slots[3] - slots[2], Duration::hours(23));

        assert!(daily.contains(origin, ny_midnight(3, 13)));
        assert!(!daily.contains(origin, ny_midnight(3, 10) + Duration::hours(24)));
        assert_eq!(daily.floor_index(origin, ny_midnight(3, 11)), 3);
        assert_eq!(daily.shift(ny_midnight(3, 12), -2), Some(ny_midnight(3, 10)));
    }

    #[test]
    fn multi_day_lattice_skips_days() {
        let every_other = Lattice::Calendar { days: 2, tz: New_York };
        let origin = ny_midnight(11, 1);
        assert_eq!(every_other.slot(origin, 3), Some(ny_midnight(11, 7)));
        assert!(!every_other.contains(origin, ny_midnight(11, 4)));
        assert_eq!(every_other.floor_index(origin, ny_midnight(11, 4)), 1);
    }

    #[test]
    fn daily_interval_uses_calendar_lattice() {
        let daily = Interval::new(1, IntervalType::Daily).unwrap();
        assert_eq!(
            Lattice::for_interval(daily, New_York),
            Some(Lattice::Calendar { days: 1, tz: New_York })
        );
        let volume = Interval::new(500, IntervalType::Volume).unwrap();
        assert_eq!(Lattice::for_interval(volume, New_York), None);
    }
}
