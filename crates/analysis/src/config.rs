use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Error, Interval, Result};

use crate::reset::QuietHours;

/// Scan tuning file (TOML). Every field has a default, so a missing file or
/// a partial file is valid.
///
/// Example `config/scanner.toml`:
/// ```toml
/// [schedule]
/// fast_tick_secs = 5
/// scan_interval_secs = 60
///
/// [band]
/// period = 20
/// multiplier = 2.0
///
/// [alerts]
/// quiet_start_hour = 0
/// quiet_end_hour = 6
/// timezone = "Etc/GMT-2"
/// ```
/// Upper bound for tick intervals and the analysis horizon (one day).
const MAX_PERIOD_SECS: u64 = 86_400;
const MAX_RANK_RETENTION_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub schedule: ScheduleConfig,
    pub window: WindowConfig,
    pub ranking: RankingConfig,
    pub channel: ChannelConfig,
    pub band: BandConfig,
    pub universe: UniverseConfig,
    pub alerts: AlertConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Ticker snapshot cadence.
    pub fast_tick_secs: u64,
    /// Full-universe scan cadence.
    pub scan_interval_secs: u64,
    /// Second-of-minute the full scan is aligned to (when the interval is 60 s).
    pub scan_offset_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { fast_tick_secs: 5, scan_interval_secs: 60, scan_offset_secs: 3 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Analysis horizon for volatility and volume change.
    pub horizon_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { horizon_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RankingConfig {
    pub volume_floor_usd: f64,
    pub candidate_threshold: f64,
    pub rank_retention_hours: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            volume_floor_usd: 10_000_000.0,
            candidate_threshold: 15.0,
            rank_retention_hours: 48,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub interval: Interval,
    /// Minimum candles for a regression channel reclaim check.
    pub min_candles: usize,
    /// Candles fetched per candidate on the fast tick.
    pub reclaim_candle_limit: usize,
    /// Candles fetched per symbol on the full scan.
    pub scan_candle_limit: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            interval: Interval::OneMinute,
            min_candles: 10,
            reclaim_candle_limit: 60,
            scan_candle_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BandConfig {
    pub period: usize,
    pub multiplier: f64,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self { period: 20, multiplier: 2.0 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub quote_suffix: String,
    /// Symbols at or below this 24h turnover are not scanned.
    pub min_turnover_usd: f64,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self { quote_suffix: "USDT".to_string(), min_turnover_usd: 1_000_000.0 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    pub quiet_start_hour: u32,
    pub quiet_end_hour: u32,
    /// IANA name of the quiet-hours and chart-label timezone.
    pub timezone: String,
    /// IANA name of the timezone whose calendar day drives the daily reset.
    pub reset_timezone: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            quiet_start_hour: 0,
            quiet_end_hour: 6,
            timezone: "Etc/GMT-2".to_string(),
            reset_timezone: "Etc/GMT-2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { batch_size: 120, batch_delay_ms: 10 }
    }
}

impl ScanConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path, "Scan config not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid scan config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        self.timezone()?;
        self.reset_timezone()?;
        if self.alerts.quiet_start_hour > 23 || self.alerts.quiet_end_hour > 24 {
            return Err(Error::Config("quiet hours must be within 0..=24".into()));
        }
        if self.band.period < 2 {
            return Err(Error::Config("band period must be >= 2".into()));
        }
        if self.fetch.batch_size == 0 {
            return Err(Error::Config("fetch batch_size must be > 0".into()));
        }
        let ticks = [self.schedule.fast_tick_secs, self.schedule.scan_interval_secs];
        if ticks.iter().any(|&secs| secs == 0 || secs > MAX_PERIOD_SECS) {
            return Err(Error::Config(format!(
                "tick intervals must be within 1..={MAX_PERIOD_SECS} seconds"
            )));
        }
        if self.window.horizon_secs == 0 || self.window.horizon_secs > MAX_PERIOD_SECS {
            return Err(Error::Config(format!(
                "window horizon_secs must be within 1..={MAX_PERIOD_SECS}"
            )));
        }
        if !(1..=MAX_RANK_RETENTION_HOURS).contains(&self.ranking.rank_retention_hours) {
            return Err(Error::Config(format!(
                "rank_retention_hours must be within 1..={MAX_RANK_RETENTION_HOURS}"
            )));
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_tz(&self.alerts.timezone)
    }

    pub fn reset_timezone(&self) -> Result<Tz> {
        parse_tz(&self.alerts.reset_timezone)
    }

    pub fn quiet_hours(&self) -> Result<QuietHours> {
        Ok(QuietHours::new(
            self.alerts.quiet_start_hour,
            self.alerts.quiet_end_hour,
            self.timezone()?,
        ))
    }

    pub fn horizon(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window.horizon_secs as i64)
    }

    pub fn fast_tick(&self) -> Duration {
        Duration::from_secs(self.schedule.fast_tick_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.scan_interval_secs)
    }
}

fn parse_tz(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| Error::Config(format!("unknown timezone '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = ScanConfig::from_toml("").unwrap();
        assert_eq!(cfg.band.period, 20);
        assert_eq!(cfg.fetch.batch_size, 120);
        assert_eq!(cfg.ranking.candidate_threshold, 15.0);
        assert_eq!(cfg.channel.interval, Interval::OneMinute);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ScanConfig::from_toml(
            r#"
            [band]
            period = 50

            [channel]
            interval = "5"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.band.period, 50);
        assert_eq!(cfg.band.multiplier, 2.0);
        assert_eq!(cfg.channel.interval, Interval::FiveMinutes);
        assert_eq!(cfg.schedule.fast_tick_secs, 5);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let err = ScanConfig::from_toml(
            r#"
            [alerts]
            timezone = "Mars/Olympus"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_is_default() {
        let cfg = ScanConfig::load("/nonexistent/scanner.toml").unwrap();
        assert_eq!(cfg.window.horizon_secs, 60);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let cfg = ScanConfig::from_toml(include_str!("../../../config/scanner.toml")).unwrap();
        let defaults = ScanConfig::default();
        assert_eq!(cfg.schedule.scan_offset_secs, defaults.schedule.scan_offset_secs);
        assert_eq!(cfg.ranking.volume_floor_usd, defaults.ranking.volume_floor_usd);
        assert_eq!(cfg.alerts.timezone, defaults.alerts.timezone);
    }

    #[test]
    fn oversized_durations_are_rejected() {
        for toml in [
            "[window]\nhorizon_secs = 9223372036854775807",
            "[ranking]\nrank_retention_hours = 9223372036854775807",
            "[ranking]\nrank_retention_hours = -1",
            "[schedule]\nscan_interval_secs = 31536000000",
        ] {
            assert!(
                matches!(ScanConfig::from_toml(toml), Err(Error::Config(_))),
                "accepted: {toml}"
            );
        }
    }
}
