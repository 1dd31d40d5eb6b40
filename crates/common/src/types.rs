use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fast-tick observation of a tradable instrument.
/// Appended once per tick per symbol and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub symbol: String,
    pub price: f64,
    /// 24h turnover in quote currency (USDT).
    pub volume_24h: f64,
    pub funding_rate: f64,
    pub timestamp: DateTime<Utc>,
}

/// One OHLCV interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time, unix milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_green(&self) -> bool {
        self.close >= self.open
    }
}

/// Sort candles oldest-first. Exchanges return newest-first; every
/// analysis routine in the workspace expects the output of this function.
pub fn normalize_candles(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.timestamp);
    candles
}

/// Row of the exchange ticker snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: f64,
    pub turnover_24h: f64,
    pub funding_rate: f64,
    /// Scheduled delivery/delisting time in unix ms; 0 for perpetuals.
    pub delivery_time: i64,
    /// Number of fractional digits the exchange quotes this symbol with.
    pub price_scale: Option<u32>,
}

impl Ticker {
    pub fn to_sample(&self, timestamp: DateTime<Utc>) -> Sample {
        Sample {
            symbol: self.symbol.clone(),
            price: self.last_price,
            volume_24h: self.turnover_24h,
            funding_rate: self.funding_rate,
            timestamp,
        }
    }
}

/// Result of a ticker poll. Rows that failed to parse are counted in
/// `rejected` so the scanner can flag the tick as partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub tickers: Vec<Ticker>,
    pub rejected: usize,
}

/// Static instrument metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub delivery_time: i64,
    pub price_scale: Option<u32>,
}

impl Instrument {
    /// Instruments with a scheduled delivery are being delisted or expire.
    pub fn is_delisting(&self) -> bool {
        self.delivery_time > 0
    }
}

/// Candle interval as understood by the market data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Interval {
    #[default]
    #[serde(rename = "1")]
    OneMinute,
    #[serde(rename = "5")]
    FiveMinutes,
    #[serde(rename = "15")]
    FifteenMinutes,
    #[serde(rename = "60")]
    OneHour,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1",
            Interval::FiveMinutes => "5",
            Interval::FifteenMinutes => "15",
            Interval::OneHour => "60",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composite score of one symbol for the current tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub symbol: String,
    pub volume_score: f64,
    pub funding_score: f64,
    pub volatility_score: f64,
    pub total: f64,
    pub price_change_pct: f64,
    pub volume_24h: f64,
    pub price: f64,
}

/// Kind of breakout pattern the crossing detector found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    ChannelReclaimUp,
    ChannelReclaimDown,
    BandBreakoutUp,
}

impl DetectionKind {
    pub fn is_up(&self) -> bool {
        !matches!(self, DetectionKind::ChannelReclaimDown)
    }
}

impl std::fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionKind::ChannelReclaimUp => write!(f, "channel reclaim UP"),
            DetectionKind::ChannelReclaimDown => write!(f, "channel reclaim DOWN"),
            DetectionKind::BandBreakoutUp => write!(f, "band breakout UP"),
        }
    }
}

/// A positive detection, carrying everything the renderer and notifier need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub id: String,
    pub symbol: String,
    pub kind: DetectionKind,
    /// Oldest-first candle series the detection was made on.
    pub candles: Vec<Candle>,
    /// Regression channel width as a percentage of the latest close.
    pub potential_gain_pct: f64,
    pub last_price: f64,
    pub price_scale: Option<u32>,
    pub detected_at: DateTime<Utc>,
}

impl Detection {
    pub fn new(
        symbol: impl Into<String>,
        kind: DetectionKind,
        candles: Vec<Candle>,
        potential_gain_pct: f64,
        detected_at: DateTime<Utc>,
    ) -> Self {
        let last_price = candles.last().map(|c| c.close).unwrap_or_default();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            kind,
            candles,
            potential_gain_pct,
            last_price,
            price_scale: None,
            detected_at,
        }
    }
}

/// One outbound alert. `is_final` marks the last alert of a scan batch so
/// the transport can append the "scan finished" marker.
#[derive(Debug, Clone)]
pub enum Alert {
    Detection { detection: Detection, is_final: bool },
    /// A scan produced no deliverable detections.
    ScanFinished,
}

/// Dashboard row for a currently qualifying candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub symbol: String,
    pub price: f64,
    pub total: f64,
    pub volatility_score: f64,
    pub price_change_pct: f64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub daily_count: u32,
}

/// One PerformerRank row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub symbol: String,
    pub count: i64,
    pub last_active: DateTime<Utc>,
}

/// Push events for the dashboard transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DashboardEvent {
    #[serde(rename_all = "camelCase")]
    Candidates {
        potential_candidates: Vec<CandidateView>,
    },
    #[serde(rename_all = "camelCase")]
    Performers {
        current: Option<CandidateScore>,
        history: Vec<RankEntry>,
    },
    Log { message: String },
}

/// Whether the scanner is polling the market data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScannerState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScannerState::Stopped => write!(f, "stopped"),
            ScannerState::Running => write!(f, "running"),
        }
    }
}

/// Commands sent to the scheduler via the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCommand {
    Start,
    Stop,
    /// Run a full scan immediately instead of waiting for the next slot.
    ScanNow,
}

/// Where market data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    Live,
    Replay,
}

impl std::fmt::Display for DataMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataMode::Live => write!(f, "live"),
            DataMode::Replay => write!(f, "replay"),
        }
    }
}
