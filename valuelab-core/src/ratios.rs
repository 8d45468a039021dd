//! Valuation ratios computed from one row's price and fundamentals.
//!
//! All functions are pure and row-local. Division by zero and decimal
//! overflow resolve to `None`, never to a fault.

use crate::domain::FundamentalValues;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Ratio columns for a single row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ratios {
    pub bvps: Option<Decimal>,
    pub price_to_book: Option<Decimal>,
    pub enterprise_value: Option<Decimal>,
}

/// Book value per share: equity / shares outstanding.
pub fn book_value_per_share(equity: Option<Decimal>, shares: Option<Decimal>) -> Option<Decimal> {
    let (equity, shares) = (equity?, shares?);
    if shares.is_zero() {
        return None;
    }
    equity.checked_div(shares)
}

/// Price-to-book: close / book value per share.
pub fn price_to_book(close: f64, bvps: Option<Decimal>) -> Option<Decimal> {
    let bvps = bvps?;
    if bvps.is_zero() {
        return None;
    }
    let close = Decimal::from_f64(close)?;
    close.checked_div(bvps)
}

/// Simplified enterprise value: market cap + debt - cash.
///
/// Requires market cap. Missing debt or cash count as zero; this asymmetry
/// is deliberate and awaiting product review.
pub fn enterprise_value(
    market_cap: Option<Decimal>,
    total_debt: Option<Decimal>,
    cash: Option<Decimal>,
) -> Option<Decimal> {
    market_cap?
        .checked_add(total_debt.unwrap_or(Decimal::ZERO))?
        .checked_sub(cash.unwrap_or(Decimal::ZERO))
}

/// Compute every ratio for one row.
pub fn compute_ratios(close: f64, fundamentals: &FundamentalValues) -> Ratios {
    let bvps = book_value_per_share(
        fundamentals.total_stockholder_equity,
        fundamentals.shares_outstanding,
    );
    Ratios {
        bvps,
        price_to_book: price_to_book(close, bvps),
        enterprise_value: enterprise_value(
            fundamentals.market_cap,
            fundamentals.total_debt,
            fundamentals.cash_and_equivalents,
        ),
    }
}
