use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Instrument identifier (ticker symbol).
///
/// Also used as a directory name in the store, so separators and other
/// characters that could escape a partition directory are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid instrument id '{0}': use letters, digits and . - _ ^ = only")]
pub struct InvalidInstrumentId(pub String);

impl InstrumentId {
    pub fn new(raw: &str) -> Result<Self, InvalidInstrumentId> {
        let id = raw.trim();
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '^' | '=');
        if id.is_empty() || id.chars().all(|c| c == '.') || !id.chars().all(allowed) {
            return Err(InvalidInstrumentId(raw.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic dataset hash (content hash of canonicalized inputs)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_tickers() {
        for raw in ["NVDA", "BRK.B", "^GSPC", "EURUSD=X", " spy "] {
            assert!(InstrumentId::new(raw).is_ok(), "{raw} should be accepted");
        }
        assert_eq!(InstrumentId::new(" spy ").unwrap().as_str(), "spy");
    }

    #[test]
    fn rejects_path_like_ids() {
        for raw in ["", "  ", "..", "a/b", "a\\b", "x y"] {
            assert!(InstrumentId::new(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn dataset_hash_is_stable() {
        let a = DatasetHash::from_bytes(b"prices");
        let b = DatasetHash::from_bytes(b"prices");
        let c = DatasetHash::from_bytes(b"prices2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), 64);
    }
}
