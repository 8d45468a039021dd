//! Run report export (JSON).
//!
//! The report is byte-for-byte reproducible for identical inputs except for
//! `generated_at`, which the caller supplies.

use crate::domain::{FundamentalsSource, SignalKind};
use crate::fingerprint::dataset_hash;
use crate::pipeline::{PipelineInput, PipelineOutput};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One signal line in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSignal {
    pub date: NaiveDate,
    pub kind: SignalKind,
}

/// Summary artifact of a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub instrument_id: String,
    pub generated_at: DateTime<Utc>,
    pub price_rows_count: usize,
    pub fundamentals_used: FundamentalsSource,
    pub dataset_hash: String,
    pub signals: Vec<ReportSignal>,
}

impl RunReport {
    pub fn build(
        input: &PipelineInput,
        output: &PipelineOutput,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, ReportError> {
        let hash = dataset_hash(&output.instrument_id, input)?;
        Ok(Self {
            instrument_id: output.instrument_id.to_string(),
            generated_at,
            price_rows_count: output.rows.len(),
            fundamentals_used: output.fundamentals_source,
            dataset_hash: hash.0,
            signals: output
                .events
                .iter()
                .map(|e| ReportSignal {
                    date: e.date,
                    kind: e.kind,
                })
                .collect(),
        })
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report atomically through a uniquely named temp file.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_json()?;
        let write_err = |source| ReportError::Write {
            path: path.display().to_string(),
            source,
        };

        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(write_err)?;
                parent
            }
            None => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
