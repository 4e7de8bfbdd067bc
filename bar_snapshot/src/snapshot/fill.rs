//! Hole resolution for one symbol's series, driven by each column's
//! [`FillStrategy`].
//!
//! Passes run in a fixed order over rows sorted by timestamp:
//! 1. zero-fill activity columns;
//! 2. carry the open forward;
//! 3. copy the (now propagated) open into missing high/low/close;
//! 4. forward-fill, then back-fill, every non zero-fill column.
//!
//! Back-fill only ever touches leading holes because step 4 forward-fills
//! first, so a series never gains activity after its last observation.

use crate::models::{
    bar::BarValues,
    field::{Field, FillStrategy},
};

/// Resolves holes in place. `rows` must be in ascending timestamp order and
/// belong to a single symbol.
pub fn apply(rows: &mut [BarValues]) {
    for field in fields_with(FillStrategy::ZeroFill) {
        for row in rows.iter_mut() {
            if row.get(field).is_none() {
                row.set(field, Some(0.0));
            }
        }
    }

    for field in fields_with(FillStrategy::CarryForward) {
        forward_fill(rows, field);
    }

    for field in Field::ALL {
        if let Some(source) = field.fallback() {
            for row in rows.iter_mut() {
                if row.get(field).is_none() {
                    row.set(field, row.get(source));
                }
            }
        }
    }

    for field in Field::ALL
        .into_iter()
        .filter(|f| f.fill_strategy() != FillStrategy::ZeroFill)
    {
        forward_fill(rows, field);
        backward_fill(rows, field);
    }
}

fn fields_with(strategy: FillStrategy) -> impl Iterator<Item = Field> {
    Field::ALL
        .into_iter()
        .filter(move |f| f.fill_strategy() == strategy)
}

fn forward_fill(rows: &mut [BarValues], field: Field) {
    let mut last = None;
    for row in rows.iter_mut() {
        match row.get(field) {
            Some(v) => last = Some(v),
            None => row.set(field, last),
        }
    }
}

fn backward_fill(rows: &mut [BarValues], field: Field) {
    let mut next = None;
    for row in rows.iter_mut().rev() {
        match row.get(field) {
            Some(v) => next = Some(v),
            None => row.set(field, next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(open: f64, close: f64, total: f64) -> BarValues {
        let mut v = BarValues::hole();
        v.set(Field::Open, Some(open));
        v.set(Field::High, Some(open.max(close)));
        v.set(Field::Low, Some(open.min(close)));
        v.set(Field::Close, Some(close));
        v.set(Field::TotalVolume, Some(total));
        v.set(Field::PeriodVolume, Some(100.0));
        v.set(Field::TradeCount, Some(7.0));
        v
    }

    #[test]
    fn trailing_hole_uses_open_for_range_prices_and_zero_activity() {
        let mut rows = [observed(10.0, 11.0, 500.0), BarValues::hole()];
        apply(&mut rows);

        let hole = rows[1];
        assert_eq!(hole.get(Field::Open), Some(10.0));
        assert_eq!(hole.get(Field::Close), Some(10.0));
        assert_eq!(hole.get(Field::High), Some(10.0));
        assert_eq!(hole.get(Field::Low), Some(10.0));
        assert_eq!(hole.get(Field::TotalVolume), Some(500.0));
        assert_eq!(hole.get(Field::PeriodVolume), Some(0.0));
        assert_eq!(hole.get(Field::TradeCount), Some(0.0));
    }

    #[test]
    fn leading_holes_are_back_filled_from_first_observation() {
        let mut rows = [BarValues::hole(), BarValues::hole(), observed(10.0, 11.0, 500.0)];
        apply(&mut rows);

        for row in &rows[..2] {
            assert_eq!(row.get(Field::Open), Some(10.0));
            // No earlier open to fall back on, so close comes from its own back-fill.
            assert_eq!(row.get(Field::Close), Some(11.0));
            assert_eq!(row.get(Field::TotalVolume), Some(500.0));
            assert_eq!(row.get(Field::PeriodVolume), Some(0.0));
        }
    }

    #[test]
    fn interior_hole_carries_last_values() {
        let mut rows = [
            observed(10.0, 11.0, 500.0),
            BarValues::hole(),
            observed(12.0, 13.0, 900.0),
        ];
        apply(&mut rows);
        assert_eq!(rows[1].get(Field::Open), Some(10.0));
        assert_eq!(rows[1].get(Field::Close), Some(10.0));
        assert_eq!(rows[1].get(Field::TotalVolume), Some(500.0));
        assert_eq!(rows[1].get(Field::TradeCount), Some(0.0));
    }

    #[test]
    fn series_without_observations_only_gets_zeros() {
        let mut rows = [BarValues::hole(); 3];
        apply(&mut rows);
        for row in rows {
            assert_eq!(row.get(Field::Open), None);
            assert_eq!(row.get(Field::Close), None);
            assert_eq!(row.get(Field::PeriodVolume), Some(0.0));
            assert!(row.is_vacant());
        }
    }

    #[test]
    fn observed_cells_are_never_overwritten() {
        let original = [observed(10.0, 11.0, 500.0), observed(12.0, 9.0, 800.0)];
        let mut rows = original;
        apply(&mut rows);
        assert_eq!(rows, original);
    }
}
