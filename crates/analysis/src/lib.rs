pub mod config;
pub mod crossing;
pub mod history;
pub mod indicators;
pub mod ranker;
pub mod reset;
pub mod volatility;
pub mod window;

pub use config::ScanConfig;
pub use crossing::{BandBreakoutDetector, ChannelReclaimDetector};
pub use history::{CandidateHistory, CandidateHistoryEntry};
pub use indicators::{Band, BandModel, ChannelWidth, RegressionChannel};
pub use ranker::{best_performer, CandidateRanker, PerformerRank, ScoreComponents};
pub use reset::{DailyResetController, QuietHours};
pub use volatility::VolatilityScorer;
pub use window::RollingWindowStore;

use common::Candle;

/// Channel width of a candle series as a percentage of its latest close,
/// using the population-std-dev channel. Alerts are ordered by this value.
pub fn potential_gain_pct(candles: &[Candle]) -> Option<f64> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let channel = RegressionChannel::fit(&closes, ChannelWidth::PopulationStdDev)?;
    let latest = *closes.last()?;
    Some(channel.width_pct(latest))
}
