//! Point-in-time alignment of fundamentals onto the daily price timeline.
//!
//! Each price day receives the values of the most recent snapshot whose
//! `as_of` calendar day is on or before it (backward as-of join). Values are
//! carried forward field by field until a newer snapshot supersedes them.
//! Days before the first snapshot get null fundamentals, never zeros.

use super::canonicalize::{canonicalize_prices, canonicalize_snapshots};
use crate::domain::{AlignedRow, FundamentalSnapshot, FundamentalValues, PriceBar};

/// Join snapshots onto prices.
///
/// Inputs may be in any order and may contain duplicates; the output has
/// exactly one row per distinct price date, sorted ascending.
pub fn align(prices: &[PriceBar], snapshots: &[FundamentalSnapshot]) -> Vec<AlignedRow> {
    let bars = canonicalize_prices(prices.to_vec());
    let snaps = canonicalize_snapshots(snapshots);

    let mut rows = Vec::with_capacity(bars.len());
    let mut current = FundamentalValues::default();
    let mut current_as_of = None;
    let mut next = 0;

    for bar in bars {
        // Advance over every snapshot that is already public on this day.
        while next < snaps.len() && snaps[next].as_of.date() <= bar.date {
            current.carry_forward(&snaps[next].values);
            current_as_of = Some(snaps[next].as_of.date());
            next += 1;
        }

        rows.push(AlignedRow {
            bar,
            fundamentals: current.clone(),
            fundamentals_as_of: current_as_of,
        });
    }

    rows
}
