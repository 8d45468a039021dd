//! ValueLab Core: fundamentals alignment, rolling metrics, valuation ratios,
//! crossover signals and idempotent persistence.
//!
//! This crate contains the metrics pipeline:
//! - Domain types (price bars, fundamental snapshots, metrics rows, signal events)
//! - Point-in-time as-of alignment of fundamentals onto the daily timeline
//! - Trailing-window indicators with min-periods-one semantics
//! - Row-local decimal valuation ratios
//! - Edge-triggered crossover detection
//! - Report export and a Parquet store with replace-on-key upserts

pub mod config;
pub mod data;
pub mod domain;
pub mod fingerprint;
pub mod indicators;
pub mod pipeline;
pub mod ratios;
pub mod report;
pub mod signals;
pub mod store;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{MetricsPipeline, PipelineError, PipelineInput, PipelineOutput};
pub use report::{ReportError, RunReport};
pub use store::{MetricsStore, ParquetStore, StoreError};
