use crate::error::TallyError;
use crate::tally::TallySettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 30;
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Where the scheduler pulls its collections from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Database(String),
    SnapshotFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: SourceConfig,
    pub refresh_interval: Duration,
    pub fetch_timeout: Duration,
    pub tally: TallySettings,
}

impl Config {
    pub fn from_env() -> Result<Self, TallyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TallyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = match (lookup("DATABASE_URL"), lookup("SNAPSHOT_FILE")) {
            (Some(url), _) if !url.trim().is_empty() => SourceConfig::Database(url),
            (_, Some(path)) if !path.trim().is_empty() => SourceConfig::SnapshotFile(PathBuf::from(path)),
            _ => {
                return Err(TallyError::Config(
                    "set DATABASE_URL or SNAPSHOT_FILE".to_string(),
                ));
            }
        };

        let refresh_seconds: u64 = parse_or(&lookup, "REFRESH_INTERVAL_SECONDS", DEFAULT_REFRESH_INTERVAL_SECONDS)?;
        if refresh_seconds == 0 {
            return Err(TallyError::Config(
                "REFRESH_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }
        let timeout_seconds: u64 = parse_or(&lookup, "FETCH_TIMEOUT_SECONDS", DEFAULT_FETCH_TIMEOUT_SECONDS)?;

        let defaults = TallySettings::default();
        let tally = TallySettings {
            trend_window_days: parse_or(&lookup, "TREND_WINDOW_DAYS", defaults.trend_window_days)?,
            stable_band_percent: parse_or(&lookup, "TREND_STABLE_BAND_PERCENT", defaults.stable_band_percent)?,
            location_top_n: parse_or(&lookup, "LOCATION_TOP_N", defaults.location_top_n)?,
        };
        if tally.trend_window_days <= 0 {
            return Err(TallyError::Config("TREND_WINDOW_DAYS must be positive".to_string()));
        }
        if !tally.stable_band_percent.is_finite() || tally.stable_band_percent < 0.0 {
            return Err(TallyError::Config(
                "TREND_STABLE_BAND_PERCENT must be a non-negative number".to_string(),
            ));
        }

        Ok(Self {
            source,
            refresh_interval: Duration::from_secs(refresh_seconds),
            fetch_timeout: Duration::from_secs(timeout_seconds),
            tally,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, TallyError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| TallyError::Config(format!("{}={:?}: {}", key, raw, e))),
        _ => Ok(default),
    }
}
