use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

/// Detects calendar-day rollovers in a reference timezone.
///
/// Date based, not duration based: a restart close to midnight can skip or
/// repeat a reset.
#[derive(Debug, Clone)]
pub struct DailyResetController {
    tz: Tz,
    last_reset_day: u32,
}

impl DailyResetController {
    pub fn new(tz: Tz, now: DateTime<Utc>) -> Self {
        Self { tz, last_reset_day: now.with_timezone(&tz).day() }
    }

    /// Returns `true` exactly once per day change, and records the new day.
    pub fn observe(&mut self, now: DateTime<Utc>) -> bool {
        let day = now.with_timezone(&self.tz).day();
        if day == self.last_reset_day {
            return false;
        }
        self.last_reset_day = day;
        true
    }

    pub fn last_reset_day(&self) -> u32 {
        self.last_reset_day
    }
}

/// Local-time window during which alerts are computed but not delivered.
/// `start_hour > end_hour` wraps past midnight; `start == end` is disabled.
#[derive(Debug, Clone, Copy)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub tz: Tz,
}

impl QuietHours {
    pub fn new(start_hour: u32, end_hour: u32, tz: Tz) -> Self {
        Self { start_hour, end_hour, tz }
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let hour = now.with_timezone(&self.tz).hour();
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    /// Local `HH:MM` in the quiet-hours timezone, for log lines.
    pub fn local_time(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.tz).format("%H:%M").to_string()
    }
}
