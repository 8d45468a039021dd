//! Raw price table ingestion (CSV).
//!
//! Headers are normalized (lower-case, spaces to `_`, adjusted-close aliases
//! folded into `adj_close`). `date` and `close` are mandatory; a table without
//! either is rejected before any row is read. Missing `open/high/low` become
//! NaN, missing `volume` becomes 0. Rows whose date or close cannot be parsed
//! are skipped with a warning. An empty close field is kept as a missing
//! observation (NaN).

use super::calendar::parse_day;
use crate::domain::PriceBar;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from reading a raw price table.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("price table is missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Column positions resolved from a normalized header row.
#[derive(Debug, Default)]
struct Columns {
    date: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    adj_close: Option<usize>,
    volume: Option<usize>,
}

/// Normalize a header cell: `"Adj Close"` -> `"adj_close"`.
pub fn normalize_header(raw: &str) -> String {
    let name = raw.trim().to_lowercase().replace([' ', '-'], "_");
    match name.as_str() {
        "adjusted_close" | "adjclose" => "adj_close".to_string(),
        "timestamp" | "datetime" => "date".to_string(),
        _ => name,
    }
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, IngestError> {
        let names: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        Ok(Self {
            date: find("date").ok_or(IngestError::MissingColumn("date"))?,
            close: find("close").ok_or(IngestError::MissingColumn("close"))?,
            open: find("open"),
            high: find("high"),
            low: find("low"),
            adj_close: find("adj_close"),
            volume: find("volume"),
        })
    }
}

/// Read a CSV price table from disk.
pub fn read_price_csv(path: &Path) -> Result<Vec<PriceBar>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    parse_price_csv(file)
}

/// Parse a CSV price table from any reader.
///
/// Rows come back in file order; sorting and deduplication happen in the
/// aligner.
pub fn parse_price_csv<R: Read>(reader: R) -> Result<Vec<PriceBar>, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let cols = Columns::resolve(rdr.headers()?)?;

    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let Some(date) = parse_day(field(Some(cols.date))) else {
            warn!(row = line + 1, value = field(Some(cols.date)), "skipping row with unparseable date");
            skipped += 1;
            continue;
        };

        let close_raw = field(Some(cols.close));
        let close = if close_raw.is_empty() {
            f64::NAN
        } else {
            match parse_price(close_raw) {
                Some(v) => v,
                None => {
                    warn!(row = line + 1, %date, value = close_raw, "skipping row with unparseable close");
                    skipped += 1;
                    continue;
                }
            }
        };

        bars.push(PriceBar {
            date,
            open: parse_price(field(cols.open)).unwrap_or(f64::NAN),
            high: parse_price(field(cols.high)).unwrap_or(f64::NAN),
            low: parse_price(field(cols.low)).unwrap_or(f64::NAN),
            close,
            adj_close: parse_price(field(cols.adj_close)),
            volume: parse_volume(field(cols.volume)),
        });
    }

    debug!(rows = bars.len(), skipped, "parsed price table");
    let quality = TableQuality::of(&bars);
    if quality.missing_close > 0 {
        warn!(rows = quality.missing_close, "price rows without a close, kept as gaps");
    }
    if quality.inconsistent_ohlc > 0 {
        warn!(rows = quality.inconsistent_ohlc, "price rows with inconsistent OHLC, kept as-is");
    }
    Ok(bars)
}

/// Counts of suspicious rows. Informational: nothing is dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TableQuality {
    missing_close: usize,
    inconsistent_ohlc: usize,
}

impl TableQuality {
    fn of(bars: &[PriceBar]) -> Self {
        let mut q = Self::default();
        for bar in bars {
            if !bar.has_close() {
                q.missing_close += 1;
            } else if bar.has_ohlc() && !bar.is_sane() {
                q.inconsistent_ohlc += 1;
            }
        }
        q
    }
}

fn parse_price(raw: &str) -> Option<f64> {
    let v: f64 = raw.parse().ok()?;
    v.is_finite().then_some(v)
}

/// Volumes sometimes arrive as floats (`1.5e6`); negative or unparseable -> 0.
fn parse_volume(raw: &str) -> u64 {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v.round() as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn yahoo_style_headers() {
        let csv = "Date,Open,High,Low,Close,Adj Close,Volume\n\
                   2024-01-02,100,102,99,101,100.5,1000\n\
                   2024-01-03,101,103,100,102,101.5,1100\n";
        let bars = parse_price_csv(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, day("2024-01-02"));
        assert_eq!(bars[0].adj_close, Some(100.5));
        assert_eq!(bars[1].volume, 1100);
    }

    #[test]
    fn missing_close_column_is_rejected() {
        let csv = "date,open,high\n2024-01-02,1,2\n";
        let err = parse_price_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn("close")));
    }

    #[test]
    fn missing_date_column_is_rejected() {
        let csv = "open,close\n1,2\n";
        let err = parse_price_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn("date")));
    }

    #[test]
    fn optional_columns_default() {
        let csv = "date,close\n2024-01-02,10.5\n";
        let bars = parse_price_csv(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 1);
        assert!(bars[0].open.is_nan());
        assert!(bars[0].high.is_nan());
        assert!(bars[0].low.is_nan());
        assert_eq!(bars[0].adj_close, None);
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn bad_rows_are_skipped_empty_close_is_kept() {
        let csv = "date,close\n\
                   2024-01-02,10\n\
                   garbage,11\n\
                   2024-01-04,abc\n\
                   2024-01-05,\n\
                   2024-01-08 00:00:00-05:00,12\n";
        let bars = parse_price_csv(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 3);
        assert!(bars[1].close.is_nan());
        assert_eq!(bars[1].date, day("2024-01-05"));
        assert_eq!(bars[2].date, day("2024-01-08"));
        assert_eq!(bars[2].close, 12.0);
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header(" Adj Close "), "adj_close");
        assert_eq!(normalize_header("Adjusted_Close"), "adj_close");
        assert_eq!(normalize_header("Stock Splits"), "stock_splits");
        assert_eq!(normalize_header("Datetime"), "date");
    }

    #[test]
    fn float_and_negative_volume() {
        assert_eq!(parse_volume("1.5e6"), 1_500_000);
        assert_eq!(parse_volume("-3"), 0);
        assert_eq!(parse_volume(""), 0);
    }

    #[test]
    fn read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "date,close\n2024-01-02,1\n").unwrap();
        assert_eq!(read_price_csv(&path).unwrap().len(), 1);

        let err = read_price_csv(&dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Open { .. }));
    }

    #[test]
    fn quality_counts_gaps_and_inconsistent_bars() {
        let csv = "date,open,high,low,close\n\
                   2024-01-02,100,102,99,101\n\
                   2024-01-03,100,95,99,101\n\
                   2024-01-04,100,102,99,\n";
        let bars = parse_price_csv(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(
            TableQuality::of(&bars),
            TableQuality {
                missing_close: 1,
                inconsistent_ohlc: 1,
            }
        );
    }

    #[test]
    fn close_only_tables_are_not_flagged() {
        let bars = parse_price_csv("date,close\n2024-01-02,10\n".as_bytes()).unwrap();
        assert_eq!(TableQuality::of(&bars), TableQuality::default());
    }
}
