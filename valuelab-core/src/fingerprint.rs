//! Content fingerprints: deterministic BLAKE3 hashes of canonicalized data.
//!
//! - `dataset_hash`: identity of a run's inputs (canonical prices + snapshots + source).
//! - `content_hash`: identity of any serializable payload (stored tables).
//!
//! Hashing goes through `serde_json`, whose output for our types has a fixed
//! field order, so identical inputs hash identically across runs and platforms.

use crate::data::{canonicalize_prices, canonicalize_snapshots};
use crate::domain::{DatasetHash, FundamentalSnapshot, FundamentalsSource, InstrumentId, PriceBar};
use crate::pipeline::PipelineInput;
use serde::Serialize;

#[derive(Serialize)]
struct CanonicalDataset<'a> {
    instrument_id: &'a str,
    fundamentals_source: FundamentalsSource,
    prices: Vec<PriceBar>,
    snapshots: Vec<FundamentalSnapshot>,
}

/// Hash of the canonical form of a run's inputs.
///
/// Input order and duplicates do not matter: two inputs that canonicalize to
/// the same table hash the same.
pub fn dataset_hash(
    instrument_id: &InstrumentId,
    input: &PipelineInput,
) -> Result<DatasetHash, serde_json::Error> {
    let canonical = CanonicalDataset {
        instrument_id: instrument_id.as_str(),
        fundamentals_source: input.fundamentals_source,
        prices: canonicalize_prices(input.prices.clone()),
        snapshots: canonicalize_snapshots(&input.snapshots),
    };
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(DatasetHash::from_bytes(&bytes))
}

/// Hex BLAKE3 hash of any serializable value.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
