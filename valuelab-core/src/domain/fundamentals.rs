//! Fundamental snapshots and the source tier they came from.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five balance-sheet quantities the ratio calculator consumes.
///
/// Every field is optional: upstream providers routinely omit some of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundamentalValues {
    pub total_stockholder_equity: Option<Decimal>,
    pub total_debt: Option<Decimal>,
    pub cash_and_equivalents: Option<Decimal>,
    pub shares_outstanding: Option<Decimal>,
    pub market_cap: Option<Decimal>,
}

impl FundamentalValues {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.total_stockholder_equity.is_none()
            && self.total_debt.is_none()
            && self.cash_and_equivalents.is_none()
            && self.shares_outstanding.is_none()
            && self.market_cap.is_none()
    }

    /// Overlay a newer set of values onto this one, field by field.
    ///
    /// A field the newer set leaves null keeps its current value.
    pub fn carry_forward(&mut self, newer: &FundamentalValues) {
        fn overlay(slot: &mut Option<Decimal>, newer: Option<Decimal>) {
            if newer.is_some() {
                *slot = newer;
            }
        }
        overlay(&mut self.total_stockholder_equity, newer.total_stockholder_equity);
        overlay(&mut self.total_debt, newer.total_debt);
        overlay(&mut self.cash_and_equivalents, newer.cash_and_equivalents);
        overlay(&mut self.shares_outstanding, newer.shares_outstanding);
        overlay(&mut self.market_cap, newer.market_cap);
    }
}

/// Fundamentals reported for one period end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    /// Reporting period end. Only its calendar day matters for alignment.
    pub as_of: NaiveDateTime,
    #[serde(flatten)]
    pub values: FundamentalValues,
}

impl FundamentalSnapshot {
    pub fn new(as_of: NaiveDateTime, values: FundamentalValues) -> Self {
        Self { as_of, values }
    }
}

/// Which upstream tier supplied the snapshots of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundamentalsSource {
    #[serde(rename = "quarterly")]
    Quarterly,
    #[serde(rename = "annual")]
    Annual,
    #[serde(rename = "point-snapshot")]
    PointSnapshot,
    #[serde(rename = "none")]
    None,
}

impl FundamentalsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundamentalsSource::Quarterly => "quarterly",
            FundamentalsSource::Annual => "annual",
            FundamentalsSource::PointSnapshot => "point-snapshot",
            FundamentalsSource::None => "none",
        }
    }
}

impl fmt::Display for FundamentalsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
