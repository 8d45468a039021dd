//! Data ingestion, canonicalization and point-in-time alignment.

pub mod align;
pub mod calendar;
pub mod canonicalize;
pub mod fundamentals;
pub mod ingest;

pub use align::align;
pub use calendar::{parse_day, parse_timestamp};
pub use canonicalize::{canonicalize_prices, canonicalize_snapshots};
pub use fundamentals::{load_fundamentals, parse_fundamentals, FundamentalsError, LoadedFundamentals};
pub use ingest::{parse_price_csv, read_price_csv, IngestError};
