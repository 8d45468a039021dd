//! Application configuration loaded from TOML.
//!
//! Every section is optional; missing sections and fields take defaults.
//!
//! ```toml
//! [store]
//! dir = "data"
//!
//! [logging]
//! level = "info"
//!
//! [data]
//! historical_period = "5y"
//! min_trading_days_for_sma = 200
//!
//! [pipeline]
//! fast_window = 50
//! slow_window = 200
//! high_window = 252
//! ```

use anyhow::{bail, Context, Result};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use valuelab_core::PipelineConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreSection,
    pub logging: LoggingSection,
    pub data: DataSection,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// How much history to keep, counted back from the latest bar:
    /// `30d`, `6mo`, `5y` or `max`.
    pub historical_period: String,
    /// Below this many rows the slow SMA is only a partial-window estimate.
    pub min_trading_days_for_sma: usize,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            historical_period: "5y".into(),
            min_trading_days_for_sma: 200,
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// The requested file does not exist; defaults are in effect.
    Missing(PathBuf),
    Defaults,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("invalid config TOML")?;
        config.pipeline.validate()?;
        HistoricalPeriod::parse(&config.data.historical_period)?;
        Ok(config)
    }

    /// Load `path` if given. A missing file is not an error: the caller gets
    /// defaults and `ConfigOrigin::Missing` so it can warn once logging is up.
    pub fn load(path: Option<&Path>) -> Result<(Self, ConfigOrigin)> {
        let Some(path) = path else {
            return Ok((Self::default(), ConfigOrigin::Defaults));
        };
        if !path.exists() {
            return Ok((Self::default(), ConfigOrigin::Missing(path.to_path_buf())));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        Ok((config, ConfigOrigin::File(path.to_path_buf())))
    }

    pub fn historical_period(&self) -> Result<HistoricalPeriod> {
        HistoricalPeriod::parse(&self.data.historical_period)
    }
}

/// A lookback span such as `5y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoricalPeriod {
    Days(u32),
    Months(u32),
    Years(u32),
    Max,
}

impl HistoricalPeriod {
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim().to_ascii_lowercase();
        if s == "max" {
            return Ok(Self::Max);
        }
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let Ok(n) = digits.parse::<u32>() else {
            bail!("invalid historical_period '{raw}': expected e.g. 30d, 6mo, 5y or max");
        };
        if n == 0 {
            bail!("historical_period '{raw}' must be positive");
        }
        match unit {
            "d" => Ok(Self::Days(n)),
            "mo" => Ok(Self::Months(n)),
            "y" => Ok(Self::Years(n)),
            _ => bail!("invalid historical_period unit in '{raw}': use d, mo or y"),
        }
    }

    /// First calendar day kept when the latest bar is on `end`.
    /// `None` keeps everything.
    pub fn start_from(&self, end: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Self::Days(n) => end.checked_sub_days(chrono::Days::new(u64::from(n))),
            Self::Months(n) => end.checked_sub_months(Months::new(n)),
            Self::Years(n) => end.checked_sub_months(Months::new(n.saturating_mul(12))),
            Self::Max => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.store.dir, PathBuf::from("data"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.data.historical_period, "5y");
        assert_eq!(config.data.min_trading_days_for_sma, 200);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = AppConfig::from_toml(
            r#"
[logging]
level = "debug"

[pipeline]
fast_window = 20
"#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.pipeline.fast_window, 20);
        assert_eq!(config.pipeline.slow_window, 200);
        assert_eq!(config.store.dir, PathBuf::from("data"));
    }

    #[test]
    fn invalid_windows_rejected() {
        let err = AppConfig::from_toml("[pipeline]\nfast_window = 300\n").unwrap_err();
        assert!(err.to_string().contains("slow_window"));
    }

    #[test]
    fn invalid_period_rejected() {
        assert!(AppConfig::from_toml("[data]\nhistorical_period = \"5 weeks\"\n").is_err());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let (config, origin) = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(origin, ConfigOrigin::Missing(path));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valuelab.toml");
        std::fs::write(&path, "[store]\ndir = \"/tmp/metrics\"\n").unwrap();
        let (config, origin) = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store.dir, PathBuf::from("/tmp/metrics"));
        assert_eq!(origin, ConfigOrigin::File(path));
    }

    #[test]
    fn period_parsing() {
        assert_eq!(HistoricalPeriod::parse("5y").unwrap(), HistoricalPeriod::Years(5));
        assert_eq!(HistoricalPeriod::parse("6MO").unwrap(), HistoricalPeriod::Months(6));
        assert_eq!(HistoricalPeriod::parse(" 30d ").unwrap(), HistoricalPeriod::Days(30));
        assert_eq!(HistoricalPeriod::parse("max").unwrap(), HistoricalPeriod::Max);
        assert!(HistoricalPeriod::parse("0y").is_err());
        assert!(HistoricalPeriod::parse("y").is_err());
        assert!(HistoricalPeriod::parse("5w").is_err());
    }

    #[test]
    fn period_start() {
        let end = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            HistoricalPeriod::Years(1).start_from(end),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
        assert_eq!(
            HistoricalPeriod::Days(29).start_from(end),
            NaiveDate::from_ymd_opt(2024, 1, 31)
        );
        assert_eq!(HistoricalPeriod::Max.start_from(end), None);
    }
}
