//! Fundamentals document loading with tiered fallback.
//!
//! The upstream fetcher writes one JSON document per instrument:
//!
//! ```json
//! {
//!   "quarterly": [{ "as_of": "2023-03-31", "total_stockholder_equity": "1000", ... }],
//!   "annual": [ ... ],
//!   "point_snapshot": { "as_of": "2024-05-01T12:00:00", "market_cap": 3.1e12, ... }
//! }
//! ```
//!
//! Tiers are tried in order quarterly, annual, point snapshot. The first tier
//! that yields at least one usable snapshot wins and names the source. When
//! none does, the run proceeds with no fundamentals and source `none`.

use super::calendar::parse_timestamp;
use crate::domain::{FundamentalSnapshot, FundamentalValues, FundamentalsSource};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FundamentalsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed fundamentals document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Snapshots chosen for a run plus the tier they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFundamentals {
    pub snapshots: Vec<FundamentalSnapshot>,
    pub source: FundamentalsSource,
}

impl LoadedFundamentals {
    pub fn none() -> Self {
        Self {
            snapshots: Vec::new(),
            source: FundamentalsSource::None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    quarterly: Option<Vec<RawSnapshot>>,
    #[serde(default)]
    annual: Option<Vec<RawSnapshot>>,
    #[serde(default)]
    point_snapshot: Option<RawSnapshot>,
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    as_of: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    total_stockholder_equity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    total_debt: Option<Decimal>,
    #[serde(default, alias = "cash_and_cash_equivalents", deserialize_with = "lenient_decimal")]
    cash_and_equivalents: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    shares_outstanding: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    market_cap: Option<Decimal>,
}

impl RawSnapshot {
    fn into_snapshot(self, tier: FundamentalsSource) -> Option<FundamentalSnapshot> {
        let raw_as_of = self.as_of.unwrap_or_default();
        let Some(as_of) = parse_timestamp(&raw_as_of) else {
            warn!(%tier, as_of = raw_as_of.as_str(), "dropping snapshot with unparseable as_of");
            return None;
        };
        let values = FundamentalValues {
            total_stockholder_equity: self.total_stockholder_equity,
            total_debt: self.total_debt,
            cash_and_equivalents: self.cash_and_equivalents,
            shares_outstanding: self.shares_outstanding,
            market_cap: self.market_cap,
        };
        if values.is_empty() {
            debug!(%tier, %as_of, "dropping snapshot with no values");
            return None;
        }
        Some(FundamentalSnapshot::new(as_of, values))
    }
}

/// Accept JSON numbers or numeric strings; anything else becomes null.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_value))
}

/// Convert a JSON scalar to a decimal through its textual form, so
/// `0.1` stays exactly `0.1`.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Load and resolve a fundamentals document from disk.
pub fn load_fundamentals(path: &Path) -> Result<LoadedFundamentals, FundamentalsError> {
    let content = std::fs::read_to_string(path).map_err(|source| FundamentalsError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_fundamentals(&content)
}

/// Resolve a fundamentals document held in memory.
pub fn parse_fundamentals(json: &str) -> Result<LoadedFundamentals, FundamentalsError> {
    let doc: RawDocument = serde_json::from_str(json)?;
    Ok(resolve_tiers(doc))
}

fn resolve_tiers(doc: RawDocument) -> LoadedFundamentals {
    let tiers = [
        (FundamentalsSource::Quarterly, doc.quarterly.unwrap_or_default()),
        (FundamentalsSource::Annual, doc.annual.unwrap_or_default()),
        (
            FundamentalsSource::PointSnapshot,
            doc.point_snapshot.into_iter().collect(),
        ),
    ];

    for (tier, raw) in tiers {
        let snapshots: Vec<FundamentalSnapshot> = raw
            .into_iter()
            .filter_map(|r| r.into_snapshot(tier))
            .collect();
        if !snapshots.is_empty() {
            debug!(%tier, count = snapshots.len(), "fundamentals tier selected");
            return LoadedFundamentals { snapshots, source: tier };
        }
        debug!(%tier, "fundamentals tier empty, falling back");
    }

    warn!("no usable fundamentals at any tier");
    LoadedFundamentals::none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quarterly_wins_over_annual() {
        let json = r#"{
            "quarterly": [{"as_of": "2023-03-31", "total_stockholder_equity": "1000"}],
            "annual": [{"as_of": "2022-12-31", "total_stockholder_equity": "900"}]
        }"#;
        let loaded = parse_fundamentals(json).unwrap();
        assert_eq!(loaded.source, FundamentalsSource::Quarterly);
        assert_eq!(loaded.snapshots.len(), 1);
        assert_eq!(
            loaded.snapshots[0].values.total_stockholder_equity,
            Some(dec!(1000))
        );
    }

    #[test]
    fn empty_quarterly_falls_back_to_annual() {
        let json = r#"{
            "quarterly": [],
            "annual": [{"as_of": "2022-12-31", "total_debt": 50}]
        }"#;
        let loaded = parse_fundamentals(json).unwrap();
        assert_eq!(loaded.source, FundamentalsSource::Annual);
        assert_eq!(loaded.snapshots[0].values.total_debt, Some(dec!(50)));
    }

    #[test]
    fn unusable_tiers_fall_through_to_point_snapshot() {
        let json = r#"{
            "quarterly": [{"as_of": "not a date", "total_debt": 1}],
            "annual": [{"as_of": "2022-12-31"}],
            "point_snapshot": {"as_of": "2024-05-01T12:00:00", "market_cap": 3.1e12, "shares_outstanding": "2460000000"}
        }"#;
        let loaded = parse_fundamentals(json).unwrap();
        assert_eq!(loaded.source, FundamentalsSource::PointSnapshot);
        let values = &loaded.snapshots[0].values;
        assert_eq!(values.market_cap, Some(dec!(3100000000000)));
        assert_eq!(values.shares_outstanding, Some(dec!(2460000000)));
    }

    #[test]
    fn nothing_usable_is_none() {
        let loaded = parse_fundamentals("{}").unwrap();
        assert_eq!(loaded, LoadedFundamentals::none());

        let loaded = parse_fundamentals(r#"{"quarterly": null, "point_snapshot": null}"#).unwrap();
        assert_eq!(loaded.source, FundamentalsSource::None);
    }

    #[test]
    fn decimals_are_exact() {
        assert_eq!(decimal_from_value(&serde_json::json!(0.1)), Some(dec!(0.1)));
        assert_eq!(decimal_from_value(&serde_json::json!("12.50")), Some(dec!(12.50)));
        assert_eq!(decimal_from_value(&serde_json::json!("1e3")), Some(dec!(1000)));
        assert_eq!(decimal_from_value(&serde_json::json!("n/a")), None);
        assert_eq!(decimal_from_value(&serde_json::json!(true)), None);
        assert_eq!(decimal_from_value(&Value::Null), None);
    }

    #[test]
    fn cash_alias_is_accepted() {
        let json = r#"{"quarterly": [{"as_of": "2023-03-31", "cash_and_cash_equivalents": "75"}]}"#;
        let loaded = parse_fundamentals(json).unwrap();
        assert_eq!(loaded.snapshots[0].values.cash_and_equivalents, Some(dec!(75)));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            parse_fundamentals("{not json"),
            Err(FundamentalsError::Json(_))
        ));
    }
}
