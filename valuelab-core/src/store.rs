//! Idempotent Parquet store for finalized metrics and signal events.
//!
//! Layout: `{store_dir}/instrument={ID}/`
//! - `metrics.parquet`: one row per `(instrument, date)`
//! - `signals.parquet`: one row per `(instrument, date, kind)`
//! - `meta.json`: counts, date range and content hashes
//!
//! Upserts replace whole rows on identical keys. Every write goes to its own
//! uniquely named temp file in the partition and is renamed into place, so
//! readers never observe a torn file. Within a process, upserts to the same
//! partition are serialized; across processes the last rename wins.
//! Decimals are stored as their exact string form.

use crate::data::calendar::{from_epoch_days, to_epoch_days};
use crate::domain::{
    FundamentalValues, InstrumentId, InvalidInstrumentId, MetricsRow, PriceBar, SignalEvent,
    SignalKind,
};
use crate::fingerprint::content_hash;
use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

const METRICS_FILE: &str = "metrics.parquet";
const SIGNALS_FILE: &str = "signals.parquet";
const META_FILE: &str = "meta.json";
const PARTITION_PREFIX: &str = "instrument=";

/// Structured error types for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Instrument(#[from] InvalidInstrumentId),

    #[error("event for '{found}' passed to upsert for '{expected}'")]
    InstrumentMismatch { expected: String, found: String },

    #[error("store I/O error: {0}")]
    Io(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("corrupt store file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("meta serialization: {0}")]
    Meta(#[from] serde_json::Error),
}

/// Outcome of one upsert call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub replaced: usize,
}

/// Persistence boundary of the pipeline.
///
/// Both operations are idempotent: applying the same batch twice leaves the
/// store exactly as applying it once.
pub trait MetricsStore {
    /// Upsert rows keyed by `(instrument, date)`. Rows may span instruments.
    fn upsert_metrics(&self, rows: &[MetricsRow]) -> Result<UpsertSummary, StoreError>;

    /// Upsert events keyed by `(instrument, date, kind)`.
    fn upsert_signal_events(
        &self,
        instrument_id: &str,
        events: &[SignalEvent],
    ) -> Result<UpsertSummary, StoreError>;
}

/// Metadata sidecar for one stored instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub instrument_id: String,
    pub metrics_rows: usize,
    pub signal_events: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub metrics_hash: String,
    pub signals_hash: String,
}

/// Store status for a single instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub instrument_id: String,
    pub meta: Option<StoreMeta>,
    pub size_bytes: u64,
}

/// The Parquet store.
pub struct ParquetStore {
    store_dir: PathBuf,
}

impl ParquetStore {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    /// Root directory of the store.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Directory for one instrument: `{store_dir}/instrument={ID}/`
    fn partition_dir(&self, id: &InstrumentId) -> PathBuf {
        self.store_dir.join(format!("{PARTITION_PREFIX}{id}"))
    }

    /// Load stored metrics for an instrument, sorted by date. Empty if none.
    pub fn load_metrics(&self, instrument_id: &str) -> Result<Vec<MetricsRow>, StoreError> {
        let id = InstrumentId::new(instrument_id)?;
        let path = self.partition_dir(&id).join(METRICS_FILE);
        match read_parquet(&path)? {
            Some(df) => dataframe_to_metrics(&df, &id, &path),
            None => Ok(Vec::new()),
        }
    }

    /// Load stored events for an instrument, sorted by `(date, kind)`. Empty if none.
    pub fn load_signal_events(&self, instrument_id: &str) -> Result<Vec<SignalEvent>, StoreError> {
        let id = InstrumentId::new(instrument_id)?;
        let path = self.partition_dir(&id).join(SIGNALS_FILE);
        match read_parquet(&path)? {
            Some(df) => dataframe_to_events(&df, &id, &path),
            None => Ok(Vec::new()),
        }
    }

    /// Read an instrument's metadata sidecar, if present and parseable.
    pub fn get_meta(&self, instrument_id: &str) -> Option<StoreMeta> {
        let id = InstrumentId::new(instrument_id).ok()?;
        let content = fs::read_to_string(self.partition_dir(&id).join(META_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Status of every instrument partition in the store, sorted by id.
    pub fn status(&self) -> Result<Vec<StoreStatus>, StoreError> {
        if !self.store_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.store_dir).map_err(io_err("read store dir"))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err("dir entry"))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(instrument_id) = name.strip_prefix(PARTITION_PREFIX) else {
                continue;
            };
            if !entry.path().is_dir() {
                continue;
            }
            out.push(StoreStatus {
                instrument_id: instrument_id.to_string(),
                meta: self.get_meta(instrument_id),
                size_bytes: dir_size(&entry.path()),
            });
        }
        out.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        Ok(out)
    }

    fn write_metrics(&self, id: &InstrumentId, rows: &[MetricsRow]) -> Result<(), StoreError> {
        let dir = self.partition_dir(id);
        fs::create_dir_all(&dir).map_err(io_err("create partition dir"))?;
        let df = metrics_to_dataframe(rows)?;
        write_parquet_atomic(&df, &dir.join(METRICS_FILE))
    }

    fn write_events(&self, id: &InstrumentId, events: &[SignalEvent]) -> Result<(), StoreError> {
        let dir = self.partition_dir(id);
        fs::create_dir_all(&dir).map_err(io_err("create partition dir"))?;
        let df = events_to_dataframe(events)?;
        write_parquet_atomic(&df, &dir.join(SIGNALS_FILE))
    }

    /// Recompute the sidecar from what is on disk.
    fn refresh_meta(&self, id: &InstrumentId) -> Result<StoreMeta, StoreError> {
        let metrics = self.load_metrics(id.as_str())?;
        let events = self.load_signal_events(id.as_str())?;
        let meta = StoreMeta {
            instrument_id: id.to_string(),
            metrics_rows: metrics.len(),
            signal_events: events.len(),
            start_date: metrics.first().map(|r| r.date()),
            end_date: metrics.last().map(|r| r.date()),
            metrics_hash: content_hash(&metrics)?,
            signals_hash: content_hash(&events)?,
        };

        let json = serde_json::to_string_pretty(&meta)?;
        write_atomic(&self.partition_dir(id).join(META_FILE), |file| {
            file.write_all(json.as_bytes()).map_err(io_err("meta write"))
        })?;
        Ok(meta)
    }
}

impl MetricsStore for ParquetStore {
    fn upsert_metrics(&self, rows: &[MetricsRow]) -> Result<UpsertSummary, StoreError> {
        let mut by_instrument: BTreeMap<&str, Vec<&MetricsRow>> = BTreeMap::new();
        for row in rows {
            by_instrument.entry(row.instrument_id.as_str()).or_default().push(row);
        }

        let mut summary = UpsertSummary::default();
        for (instrument_id, batch) in by_instrument {
            let id = InstrumentId::new(instrument_id)?;
            let lock = partition_lock(&self.partition_dir(&id));
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut merged: BTreeMap<NaiveDate, MetricsRow> = self
                .load_metrics(id.as_str())?
                .into_iter()
                .map(|r| (r.date(), r))
                .collect();

            for row in batch {
                let mut row = row.clone();
                row.instrument_id = id.to_string();
                match merged.insert(row.date(), row) {
                    Some(_) => summary.replaced += 1,
                    None => summary.inserted += 1,
                }
            }

            let merged: Vec<MetricsRow> = merged.into_values().collect();
            self.write_metrics(&id, &merged)?;
            let meta = self.refresh_meta(&id)?;
            debug!(instrument = %id, rows = meta.metrics_rows, "metrics partition written");
        }

        info!(inserted = summary.inserted, replaced = summary.replaced, "metrics upserted");
        Ok(summary)
    }

    fn upsert_signal_events(
        &self,
        instrument_id: &str,
        events: &[SignalEvent],
    ) -> Result<UpsertSummary, StoreError> {
        let id = InstrumentId::new(instrument_id)?;
        if let Some(stray) = events.iter().find(|e| e.instrument_id != id.as_str()) {
            return Err(StoreError::InstrumentMismatch {
                expected: id.to_string(),
                found: stray.instrument_id.clone(),
            });
        }

        let mut summary = UpsertSummary::default();
        if events.is_empty() {
            return Ok(summary);
        }

        let lock = partition_lock(&self.partition_dir(&id));
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut merged: BTreeMap<(NaiveDate, SignalKind), SignalEvent> = self
            .load_signal_events(id.as_str())?
            .into_iter()
            .map(|e| (e.key(), e))
            .collect();
        for event in events {
            match merged.insert(event.key(), event.clone()) {
                Some(_) => summary.replaced += 1,
                None => summary.inserted += 1,
            }
        }

        let merged: Vec<SignalEvent> = merged.into_values().collect();
        self.write_events(&id, &merged)?;
        self.refresh_meta(&id)?;

        info!(
            instrument = %id,
            inserted = summary.inserted,
            replaced = summary.replaced,
            "signal events upserted"
        );
        Ok(summary)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn io_err(what: &'static str) -> impl Fn(std::io::Error) -> StoreError {
    move |e| StoreError::Io(format!("{what}: {e}"))
}

fn parquet_err(what: &'static str) -> impl Fn(PolarsError) -> StoreError {
    move |e| StoreError::Parquet(format!("{what}: {e}"))
}

/// One mutex per partition directory, shared by every store in the process.
fn partition_lock(dir: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(dir.to_path_buf()).or_default())
}

/// Write `path` through a fresh temp file in the same directory, then rename.
/// The temp file is removed if anything fails before the rename.
fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut fs::File) -> Result<(), StoreError>,
) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io(format!("no parent directory for {}", path.display())))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err("create temp file"))?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all().map_err(io_err("sync temp file"))?;
    tmp.persist(path)
        .map_err(|e| StoreError::Io(format!("atomic rename failed: {}", e.error)))?;
    Ok(())
}

/// Write a DataFrame to `path` atomically.
fn write_parquet_atomic(df: &DataFrame, path: &Path) -> Result<(), StoreError> {
    write_atomic(path, |file| {
        ParquetWriter::new(file)
            .finish(&mut df.clone())
            .map(|_| ())
            .map_err(parquet_err("write parquet"))
    })
}

/// Read a Parquet file; `None` when it does not exist.
fn read_parquet(path: &Path) -> Result<Option<DataFrame>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = fs::File::open(path).map_err(io_err("open"))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(parquet_err("read parquet"))?;
    Ok(Some(df))
}

fn dir_size(path: &Path) -> u64 {
    let mut size = 0u64;
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                size += meta.len();
            }
        }
    }
    size
}

fn date_column(name: &str, days: Vec<Option<i32>>) -> Result<Column, StoreError> {
    Column::new(name.into(), days)
        .cast(&DataType::Date)
        .map_err(parquet_err("date cast"))
}

fn decimal_column(name: &str, values: impl Iterator<Item = Option<Decimal>>) -> Column {
    let strings: Vec<Option<String>> = values.map(|v| v.map(|d| d.to_string())).collect();
    Column::new(name.into(), strings)
}

fn metrics_to_dataframe(rows: &[MetricsRow]) -> Result<DataFrame, StoreError> {
    let dates: Vec<Option<i32>> = rows.iter().map(|r| Some(to_epoch_days(r.date()))).collect();
    let as_of: Vec<Option<i32>> = rows
        .iter()
        .map(|r| r.fundamentals_as_of.map(to_epoch_days))
        .collect();
    let f = |get: fn(&MetricsRow) -> f64| -> Vec<f64> { rows.iter().map(get).collect() };
    let opt = |get: fn(&MetricsRow) -> Option<f64>| -> Vec<Option<f64>> { rows.iter().map(get).collect() };
    let dec = |name: &str, get: fn(&MetricsRow) -> Option<Decimal>| decimal_column(name, rows.iter().map(get));

    DataFrame::new(vec![
        date_column("date", dates)?,
        Column::new("open".into(), f(|r| r.bar.open)),
        Column::new("high".into(), f(|r| r.bar.high)),
        Column::new("low".into(), f(|r| r.bar.low)),
        Column::new("close".into(), f(|r| r.bar.close)),
        Column::new("adj_close".into(), opt(|r| r.bar.adj_close)),
        Column::new("volume".into(), rows.iter().map(|r| r.bar.volume).collect::<Vec<u64>>()),
        dec("total_stockholder_equity", |r| r.fundamentals.total_stockholder_equity),
        dec("total_debt", |r| r.fundamentals.total_debt),
        dec("cash_and_equivalents", |r| r.fundamentals.cash_and_equivalents),
        dec("shares_outstanding", |r| r.fundamentals.shares_outstanding),
        dec("market_cap", |r| r.fundamentals.market_cap),
        date_column("fundamentals_as_of", as_of)?,
        Column::new("sma50".into(), opt(|r| r.sma_fast)),
        Column::new("sma200".into(), opt(|r| r.sma_slow)),
        Column::new("trailing_high".into(), opt(|r| r.trailing_high)),
        Column::new("pct_from_high".into(), opt(|r| r.pct_from_high)),
        dec("bvps", |r| r.bvps),
        dec("price_to_book", |r| r.price_to_book),
        dec("enterprise_value", |r| r.enterprise_value),
    ])
    .map_err(parquet_err("dataframe creation"))
}

fn events_to_dataframe(events: &[SignalEvent]) -> Result<DataFrame, StoreError> {
    let dates: Vec<Option<i32>> = events.iter().map(|e| Some(to_epoch_days(e.date))).collect();
    let kinds: Vec<String> = events.iter().map(|e| e.kind.to_string()).collect();
    let fast: Vec<f64> = events.iter().map(|e| e.observed_fast_value).collect();
    let slow: Vec<f64> = events.iter().map(|e| e.observed_slow_value).collect();

    DataFrame::new(vec![
        date_column("date", dates)?,
        Column::new("kind".into(), kinds),
        Column::new("observed_fast_value".into(), fast),
        Column::new("observed_slow_value".into(), slow),
    ])
    .map_err(parquet_err("dataframe creation"))
}

/// Typed column access with the file path in the error.
struct Reader<'a> {
    df: &'a DataFrame,
    path: &'a Path,
}

impl<'a> Reader<'a> {
    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason,
        }
    }

    fn column(&self, name: &str) -> Result<&'a Column, StoreError> {
        self.df
            .column(name)
            .map_err(|e| self.corrupt(format!("missing column '{name}': {e}")))
    }

    fn f64(&self, name: &str) -> Result<&'a Float64Chunked, StoreError> {
        self.column(name)?
            .f64()
            .map_err(|e| self.corrupt(format!("{name} column type: {e}")))
    }

    fn u64(&self, name: &str) -> Result<&'a UInt64Chunked, StoreError> {
        self.column(name)?
            .u64()
            .map_err(|e| self.corrupt(format!("{name} column type: {e}")))
    }

    fn str(&self, name: &str) -> Result<&'a StringChunked, StoreError> {
        self.column(name)?
            .as_materialized_series()
            .str()
            .map_err(|e| self.corrupt(format!("{name} column type: {e}")))
    }

    fn date(&self, name: &str) -> Result<&'a DateChunked, StoreError> {
        self.column(name)?
            .date()
            .map_err(|e| self.corrupt(format!("{name} column type: {e}")))
    }

    fn day_at(&self, ca: &DateChunked, name: &str, i: usize) -> Result<Option<NaiveDate>, StoreError> {
        match ca.get(i) {
            None => Ok(None),
            Some(days) => from_epoch_days(days)
                .map(Some)
                .ok_or_else(|| self.corrupt(format!("{name} out of range at row {i}"))),
        }
    }

    fn decimal_at(&self, ca: &StringChunked, name: &str, i: usize) -> Result<Option<Decimal>, StoreError> {
        match ca.get(i) {
            None => Ok(None),
            Some(s) => Decimal::from_str(s)
                .map(Some)
                .map_err(|e| self.corrupt(format!("{name} at row {i}: {e}"))),
        }
    }
}

fn dataframe_to_metrics(
    df: &DataFrame,
    id: &InstrumentId,
    path: &Path,
) -> Result<Vec<MetricsRow>, StoreError> {
    let r = Reader { df, path };

    let date = r.date("date")?;
    let open = r.f64("open")?;
    let high = r.f64("high")?;
    let low = r.f64("low")?;
    let close = r.f64("close")?;
    let adj_close = r.f64("adj_close")?;
    let volume = r.u64("volume")?;
    let equity = r.str("total_stockholder_equity")?;
    let debt = r.str("total_debt")?;
    let cash = r.str("cash_and_equivalents")?;
    let shares = r.str("shares_outstanding")?;
    let market_cap = r.str("market_cap")?;
    let as_of = r.date("fundamentals_as_of")?;
    let sma_fast = r.f64("sma50")?;
    let sma_slow = r.f64("sma200")?;
    let trailing_high = r.f64("trailing_high")?;
    let pct = r.f64("pct_from_high")?;
    let bvps = r.str("bvps")?;
    let ptb = r.str("price_to_book")?;
    let ev = r.str("enterprise_value")?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let day = r
            .day_at(date, "date", i)?
            .ok_or_else(|| r.corrupt(format!("null date at row {i}")))?;

        rows.push(MetricsRow {
            instrument_id: id.to_string(),
            bar: PriceBar {
                date: day,
                open: open.get(i).unwrap_or(f64::NAN),
                high: high.get(i).unwrap_or(f64::NAN),
                low: low.get(i).unwrap_or(f64::NAN),
                close: close.get(i).unwrap_or(f64::NAN),
                adj_close: adj_close.get(i),
                volume: volume.get(i).unwrap_or(0),
            },
            fundamentals: FundamentalValues {
                total_stockholder_equity: r.decimal_at(equity, "total_stockholder_equity", i)?,
                total_debt: r.decimal_at(debt, "total_debt", i)?,
                cash_and_equivalents: r.decimal_at(cash, "cash_and_equivalents", i)?,
                shares_outstanding: r.decimal_at(shares, "shares_outstanding", i)?,
                market_cap: r.decimal_at(market_cap, "market_cap", i)?,
            },
            fundamentals_as_of: r.day_at(as_of, "fundamentals_as_of", i)?,
            sma_fast: sma_fast.get(i),
            sma_slow: sma_slow.get(i),
            trailing_high: trailing_high.get(i),
            pct_from_high: pct.get(i),
            bvps: r.decimal_at(bvps, "bvps", i)?,
            price_to_book: r.decimal_at(ptb, "price_to_book", i)?,
            enterprise_value: r.decimal_at(ev, "enterprise_value", i)?,
        });
    }

    rows.sort_by_key(|row| row.date());
    Ok(rows)
}

fn dataframe_to_events(
    df: &DataFrame,
    id: &InstrumentId,
    path: &Path,
) -> Result<Vec<SignalEvent>, StoreError> {
    let r = Reader { df, path };

    let date = r.date("date")?;
    let kind = r.str("kind")?;
    let fast = r.f64("observed_fast_value")?;
    let slow = r.f64("observed_slow_value")?;

    let mut events = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let day = r
            .day_at(date, "date", i)?
            .ok_or_else(|| r.corrupt(format!("null date at row {i}")))?;
        let kind = kind
            .get(i)
            .ok_or_else(|| r.corrupt(format!("null kind at row {i}")))?
            .parse::<SignalKind>()
            .map_err(|e| r.corrupt(e))?;

        events.push(SignalEvent {
            instrument_id: id.to_string(),
            date: day,
            kind,
            observed_fast_value: fast.get(i).unwrap_or(f64::NAN),
            observed_slow_value: slow.get(i).unwrap_or(f64::NAN),
        });
    }

    events.sort_by_key(|e| e.key());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn row(instrument: &str, d: u32, close: f64) -> MetricsRow {
        MetricsRow {
            instrument_id: instrument.to_string(),
            bar: PriceBar {
                date: day(d),
                open: close - 1.0,
                high: close + 1.0,
                low: close - 2.0,
                close,
                adj_close: None,
                volume: 1000,
            },
            fundamentals: FundamentalValues {
                total_stockholder_equity: Some(dec!(1000.25)),
                shares_outstanding: Some(dec!(10)),
                ..Default::default()
            },
            fundamentals_as_of: Some(day(1)),
            sma_fast: Some(close),
            sma_slow: None,
            trailing_high: Some(close + 1.0),
            pct_from_high: Some(-0.5),
            bvps: Some(dec!(100.025)),
            price_to_book: None,
            enterprise_value: Some(dec!(123456789.0123456789)),
        }
    }

    fn event(instrument: &str, d: u32, kind: SignalKind, fast: f64) -> SignalEvent {
        SignalEvent {
            instrument_id: instrument.to_string(),
            date: day(d),
            kind,
            observed_fast_value: fast,
            observed_slow_value: 2.0,
        }
    }

    #[test]
    fn metrics_roundtrip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let rows = vec![row("SPY", 3, 101.0), row("SPY", 2, 100.0)];

        store.upsert_metrics(&rows).unwrap();
        let loaded = store.load_metrics("SPY").unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], rows[1]);
        assert_eq!(loaded[1], rows[0]);
        assert!(dir.path().join("instrument=SPY").join("metrics.parquet").exists());
        let mut files: Vec<String> = fs::read_dir(dir.path().join("instrument=SPY"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        files.sort();
        assert_eq!(files, vec!["meta.json", "metrics.parquet"]);

        let df = read_parquet(&dir.path().join("instrument=SPY").join("metrics.parquet"))
            .unwrap()
            .unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|c| c.as_str()).collect();
        assert!(names.contains(&"sma50") && names.contains(&"sma200"));
        assert!(!names.contains(&"sma_fast"));
    }

    #[test]
    fn upsert_twice_equals_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let rows = vec![row("SPY", 2, 100.0), row("SPY", 3, 101.0)];

        let first = store.upsert_metrics(&rows).unwrap();
        let once = store.load_metrics("SPY").unwrap();
        let meta_once = store.get_meta("SPY").unwrap();

        let second = store.upsert_metrics(&rows).unwrap();
        let twice = store.load_metrics("SPY").unwrap();

        assert_eq!(first, UpsertSummary { inserted: 2, replaced: 0 });
        assert_eq!(second, UpsertSummary { inserted: 0, replaced: 2 });
        assert_eq!(once, twice);
        assert_eq!(meta_once, store.get_meta("SPY").unwrap());
    }

    #[test]
    fn upsert_replaces_whole_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store.upsert_metrics(&[row("SPY", 2, 100.0)]).unwrap();

        let mut updated = row("SPY", 2, 200.0);
        updated.bvps = None;
        store.upsert_metrics(&[updated.clone(), row("SPY", 5, 50.0)]).unwrap();

        let loaded = store.load_metrics("SPY").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], updated);
    }

    #[test]
    fn rows_for_several_instruments_are_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store
            .upsert_metrics(&[row("SPY", 2, 1.0), row("QQQ", 2, 2.0), row("SPY", 3, 3.0)])
            .unwrap();

        assert_eq!(store.load_metrics("SPY").unwrap().len(), 2);
        assert_eq!(store.load_metrics("QQQ").unwrap().len(), 1);

        let status = store.status().unwrap();
        let ids: Vec<&str> = status.iter().map(|s| s.instrument_id.as_str()).collect();
        assert_eq!(ids, vec!["QQQ", "SPY"]);
        let spy = status[1].meta.as_ref().unwrap();
        assert_eq!(spy.metrics_rows, 2);
        assert_eq!(spy.start_date, Some(day(2)));
        assert_eq!(spy.end_date, Some(day(3)));
        assert!(status[1].size_bytes > 0);
    }

    #[test]
    fn signal_events_keyed_by_date_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let events = vec![
            event("SPY", 4, SignalKind::BearishCross, 1.0),
            event("SPY", 4, SignalKind::BullishCross, 3.0),
        ];
        store.upsert_signal_events("SPY", &events).unwrap();
        let summary = store
            .upsert_signal_events("SPY", &[event("SPY", 4, SignalKind::BullishCross, 3.5)])
            .unwrap();

        assert_eq!(summary, UpsertSummary { inserted: 0, replaced: 1 });
        let loaded = store.load_signal_events("SPY").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].kind, SignalKind::BullishCross);
        assert_eq!(loaded[0].observed_fast_value, 3.5);
        assert_eq!(loaded[1].kind, SignalKind::BearishCross);
        assert_eq!(store.get_meta("SPY").unwrap().signal_events, 2);
    }

    #[test]
    fn mismatched_event_instrument_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let err = store
            .upsert_signal_events("SPY", &[event("QQQ", 4, SignalKind::BullishCross, 1.0)])
            .unwrap_err();
        assert!(matches!(err, StoreError::InstrumentMismatch { .. }));
    }

    #[test]
    fn empty_store_reads() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path().join("missing"));
        assert!(store.load_metrics("SPY").unwrap().is_empty());
        assert!(store.load_signal_events("SPY").unwrap().is_empty());
        assert!(store.status().unwrap().is_empty());
        assert_eq!(store.get_meta("SPY"), None);
        assert_eq!(
            store.upsert_signal_events("SPY", &[]).unwrap(),
            UpsertSummary::default()
        );
    }

    #[test]
    fn path_escaping_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        assert!(matches!(store.load_metrics("../x"), Err(StoreError::Instrument(_))));
        assert!(matches!(
            store.upsert_metrics(&[row("a/b", 2, 1.0)]),
            Err(StoreError::Instrument(_))
        ));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let part = dir.path().join("instrument=SPY");
        fs::create_dir_all(&part).unwrap();
        fs::write(part.join("metrics.parquet"), b"not parquet").unwrap();
        assert!(matches!(store.load_metrics("SPY"), Err(StoreError::Parquet(_))));
    }

    #[test]
    fn concurrent_upserts_match_a_single_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<MetricsRow> = (2..12).map(|d| row("SPY", d, 100.0 + d as f64)).collect();
        let events = vec![
            event("SPY", 3, SignalKind::BullishCross, 1.0),
            event("SPY", 7, SignalKind::BearishCross, 0.5),
        ];

        let reference = ParquetStore::new(dir.path().join("reference"));
        reference.upsert_metrics(&rows).unwrap();
        reference.upsert_signal_events("SPY", &events).unwrap();

        let shared = dir.path().join("shared");
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let store = ParquetStore::new(&shared);
                    store.upsert_metrics(&rows).unwrap();
                    store.upsert_signal_events("SPY", &events).unwrap();
                });
            }
        });

        let store = ParquetStore::new(&shared);
        assert_eq!(store.load_metrics("SPY").unwrap(), reference.load_metrics("SPY").unwrap());
        assert_eq!(
            store.load_signal_events("SPY").unwrap(),
            reference.load_signal_events("SPY").unwrap()
        );
        assert_eq!(store.get_meta("SPY").unwrap(), reference.get_meta("SPY").unwrap());

        let mut files: Vec<String> = fs::read_dir(shared.join("instrument=SPY"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        files.sort();
        assert_eq!(files, vec!["meta.json", "metrics.parquet", "signals.parquet"]);
    }
}
