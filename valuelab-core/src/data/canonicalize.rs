//! Canonical ordering of raw inputs: sort ascending, dedupe keeping the last.
//!
//! Upstream data arrives in whatever order the provider returned it. Nothing
//! downstream assumes caller order; everything runs on the canonical form.

use crate::domain::{FundamentalSnapshot, PriceBar};
use std::collections::BTreeMap;

/// Stable-sort bars by date and keep the last occurrence of each date.
pub fn canonicalize_prices(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|b| b.date);

    let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(prev) if prev.date == bar.date => *prev = bar,
            _ => out.push(bar),
        }
    }
    out
}

/// Deduplicate snapshots by `as_of` (last one seen wins) and sort ascending.
pub fn canonicalize_snapshots(snapshots: &[FundamentalSnapshot]) -> Vec<FundamentalSnapshot> {
    let mut by_as_of = BTreeMap::new();
    for snap in snapshots {
        by_as_of.insert(snap.as_of, snap.clone());
    }
    by_as_of.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FundamentalValues;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar::from_close(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(), close)
    }

    fn snap(ts: &str, equity: rust_decimal::Decimal) -> FundamentalSnapshot {
        FundamentalSnapshot::new(
            crate::data::calendar::parse_timestamp(ts).unwrap(),
            FundamentalValues {
                total_stockholder_equity: Some(equity),
                ..Default::default()
            },
        )
    }

    #[test]
    fn prices_sorted_and_last_duplicate_wins() {
        let bars = vec![
            bar("2024-01-03", 3.0),
            bar("2024-01-02", 2.0),
            bar("2024-01-03", 30.0),
            bar("2024-01-01", 1.0),
        ];
        let out = canonicalize_prices(bars);
        let closes: Vec<f64> = out.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 30.0]);
    }

    #[test]
    fn empty_prices_stay_empty() {
        assert!(canonicalize_prices(Vec::new()).is_empty());
    }

    #[test]
    fn snapshots_dedup_keeps_last_and_sorts() {
        let snaps = vec![
            snap("2023-06-30", dec!(2)),
            snap("2023-03-31", dec!(1)),
            snap("2023-06-30", dec!(20)),
        ];
        let out = canonicalize_snapshots(&snaps);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].values.total_stockholder_equity, Some(dec!(1)));
        assert_eq!(out[1].values.total_stockholder_equity, Some(dec!(20)));
    }

    #[test]
    fn same_day_different_times_are_distinct_snapshots() {
        let snaps = vec![snap("2023-03-31 16:00:00", dec!(2)), snap("2023-03-31", dec!(1))];
        let out = canonicalize_snapshots(&snaps);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].values.total_stockholder_equity, Some(dec!(2)));
    }
}
