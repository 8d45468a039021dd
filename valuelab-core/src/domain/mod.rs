//! Domain types for ValueLab

pub mod bar;
pub mod fundamentals;
pub mod ids;
pub mod row;
pub mod signal;

pub use bar::PriceBar;
pub use fundamentals::{FundamentalSnapshot, FundamentalValues, FundamentalsSource};
pub use ids::{DatasetHash, InstrumentId, InvalidInstrumentId};
pub use row::{AlignedRow, MetricsRow};
pub use signal::{SignalEvent, SignalKind};
