//! Metrics pipeline: align -> rolling metrics -> ratios -> crossover events.
//!
//! One call processes one instrument from immutable inputs and recomputes the
//! whole table. Nothing is carried between runs.

use crate::config::{ConfigError, PipelineConfig};
use crate::data::align;
use crate::domain::{
    FundamentalSnapshot, FundamentalsSource, InstrumentId, InvalidInstrumentId, MetricsRow,
    PriceBar, SignalEvent,
};
use crate::indicators::{pct_from_high, RollingIndicator, Sma, TrailingMax};
use crate::ratios::compute_ratios;
use crate::signals::{detect, TrendPoint};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Instrument(#[from] InvalidInstrumentId),

    #[error("no price rows for instrument '{0}'")]
    EmptyPrices(String),
}

/// Raw inputs for one instrument.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub prices: Vec<PriceBar>,
    pub snapshots: Vec<FundamentalSnapshot>,
    /// Tier the snapshots came from; passed through to the report untouched.
    pub fundamentals_source: FundamentalsSource,
}

impl PipelineInput {
    /// Prices only, no fundamentals.
    pub fn prices_only(prices: Vec<PriceBar>) -> Self {
        Self {
            prices,
            snapshots: Vec::new(),
            fundamentals_source: FundamentalsSource::None,
        }
    }
}

/// Finalized table and events for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub instrument_id: InstrumentId,
    pub fundamentals_source: FundamentalsSource,
    pub rows: Vec<MetricsRow>,
    /// Ordered by `(date, kind)`.
    pub events: Vec<SignalEvent>,
}

/// The orchestrator. Holds only the indicators built from its configuration.
#[derive(Debug, Clone)]
pub struct MetricsPipeline {
    fast: Sma,
    slow: Sma,
    high: TrailingMax,
}

impl MetricsPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            fast: Sma::new(config.fast_window),
            slow: Sma::new(config.slow_window),
            high: TrailingMax::new(config.high_window),
        })
    }

    /// Run the full pipeline for one instrument.
    pub fn run(&self, instrument_id: &str, input: &PipelineInput) -> Result<PipelineOutput, PipelineError> {
        let instrument_id = InstrumentId::new(instrument_id)?;
        if input.prices.is_empty() {
            return Err(PipelineError::EmptyPrices(instrument_id.to_string()));
        }

        info!(
            instrument = %instrument_id,
            prices = input.prices.len(),
            snapshots = input.snapshots.len(),
            source = %input.fundamentals_source,
            "pipeline run started"
        );

        let aligned = align(&input.prices, &input.snapshots);
        debug!(rows = aligned.len(), "aligned fundamentals onto price timeline");

        let closes: Vec<f64> = aligned.iter().map(|r| r.bar.close).collect();
        let sma_fast = self.fast.compute(&closes);
        let sma_slow = self.slow.compute(&closes);
        let highs = self.high.compute(&closes);
        debug!(
            fast = self.fast.name(),
            slow = self.slow.name(),
            high = self.high.name(),
            "rolling metrics computed"
        );

        let rows: Vec<MetricsRow> = aligned
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let ratios = compute_ratios(row.bar.close, &row.fundamentals);
                MetricsRow {
                    instrument_id: instrument_id.to_string(),
                    pct_from_high: pct_from_high(row.bar.close, highs[i]),
                    trailing_high: highs[i],
                    sma_fast: sma_fast[i],
                    sma_slow: sma_slow[i],
                    bvps: ratios.bvps,
                    price_to_book: ratios.price_to_book,
                    enterprise_value: ratios.enterprise_value,
                    bar: row.bar,
                    fundamentals: row.fundamentals,
                    fundamentals_as_of: row.fundamentals_as_of,
                }
            })
            .collect();

        let events = self.detect_events(&instrument_id, &rows);

        info!(
            instrument = %instrument_id,
            rows = rows.len(),
            events = events.len(),
            "pipeline run finished"
        );

        Ok(PipelineOutput {
            instrument_id,
            fundamentals_source: input.fundamentals_source,
            rows,
            events,
        })
    }

    fn detect_events(&self, instrument_id: &InstrumentId, rows: &[MetricsRow]) -> Vec<SignalEvent> {
        let points: Vec<TrendPoint> = rows
            .iter()
            .map(|r| TrendPoint {
                date: r.date(),
                fast: r.sma_fast,
                slow: r.sma_slow,
            })
            .collect();

        let crossings = detect(&points);
        debug!(
            bullish = crossings.bullish.len(),
            bearish = crossings.bearish.len(),
            "crossings detected"
        );

        let mut events: Vec<SignalEvent> = crossings
            .iter()
            .map(|(kind, c)| SignalEvent {
                instrument_id: instrument_id.to_string(),
                date: c.date,
                kind,
                observed_fast_value: c.fast,
                observed_slow_value: c.slow,
            })
            .collect();
        events.sort_by_key(|e| e.key());
        events
    }
}
