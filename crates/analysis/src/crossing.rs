//! Edge-triggered breakout detectors.
//!
//! Both detectors are stateless per call: they look at one symbol's candle
//! series (oldest first, last candle still forming) and report whether the
//! event fired on this evaluation. Too little data is "no signal".

use common::{Candle, DetectionKind};

use crate::indicators::{BandModel, ChannelWidth, RegressionChannel};

/// Regression channel reclaim on the most recent completed candle.
#[derive(Debug, Clone)]
pub struct ChannelReclaimDetector {
    pub min_candles: usize,
}

impl Default for ChannelReclaimDetector {
    fn default() -> Self {
        Self { min_candles: 10 }
    }
}

impl ChannelReclaimDetector {
    pub const WIDTH: ChannelWidth = ChannelWidth::StandardError;

    pub fn new(min_candles: usize) -> Self {
        Self { min_candles: min_candles.max(3) }
    }

    /// Up: the completed candle wicked below the lower bound and closed above it.
    /// Down: the completed candle's high was above the lower bound and it
    /// closed below it. Both directions reference the lower bound.
    pub fn detect(&self, candles: &[Candle]) -> Option<DetectionKind> {
        if candles.len() < self.min_candles {
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let channel = RegressionChannel::fit(&closes, Self::WIDTH)?;

        let idx = candles.len() - 2;
        let completed = &candles[idx];
        let lower = channel.lower(idx as f64);

        if completed.low < lower && completed.close > lower {
            Some(DetectionKind::ChannelReclaimUp)
        } else if completed.high > lower && completed.close < lower {
            Some(DetectionKind::ChannelReclaimDown)
        } else {
            None
        }
    }
}

/// First upper-band breakout since price last returned to the lower band.
#[derive(Debug, Clone, Default)]
pub struct BandBreakoutDetector {
    pub model: BandModel,
}

impl BandBreakoutDetector {
    pub fn new(model: BandModel) -> Self {
        Self { model }
    }

    /// `candles` is the symbol's long history, oldest first, with the last
    /// candle still forming. Bands are computed from completed candles only.
    ///
    /// Fires when:
    /// - the previous completed candle's high stayed below the upper band,
    /// - the previous close was below it and `current_price` is at or above it,
    /// - no completed candle after the most recent lower-band touch reached
    ///   the upper band (at that candle's own rolling band). With no lower
    ///   touch in the history the crossing alone is enough.
    pub fn detect(&self, candles: &[Candle], current_price: f64) -> bool {
        if candles.len() < 2 {
            return false;
        }
        let completed = &candles[..candles.len() - 1];
        let closes: Vec<f64> = completed.iter().map(|c| c.close).collect();

        let Some(band) = self.model.compute(&closes) else {
            return false;
        };

        let prev = &completed[completed.len() - 1];
        if prev.high >= band.upper {
            return false;
        }
        if !(prev.close < band.upper && current_price >= band.upper) {
            return false;
        }

        let rolling = self.model.rolling(&closes);

        let last_lower_touch = (0..completed.len()).rev().find(|&j| {
            rolling[j].is_some_and(|b| completed[j].low <= b.lower)
        });

        match last_lower_touch {
            None => true,
            Some(j) => !(j + 1..completed.len()).any(|k| {
                rolling[k].is_some_and(|b| completed[k].high >= b.upper)
            }),
        }
    }

    pub fn kind(&self) -> DetectionKind {
        DetectionKind::BandBreakoutUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::BandModel;

    fn c(i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle { timestamp: i as i64 * 60_000, open, high, low, close, volume: 1.0 }
    }

    /// Rising series with alternating ±0.3 noise; the last candle is forming.
    fn rising() -> Vec<Candle> {
        (0..10)
            .map(|i| {
                let close = 100.0 + i as f64 + if i % 2 == 0 { 0.3 } else { -0.3 };
                c(i, close, close + 0.1, close - 0.1, close)
            })
            .collect()
    }

    #[test]
    fn reclaim_up_when_wick_dips_below_and_closes_inside() {
        let mut candles = rising();
        // lower bound at index 8 is ~107.28, close is 108.3
        candles[8].low = 106.0;
        assert_eq!(
            ChannelReclaimDetector::default().detect(&candles),
            Some(DetectionKind::ChannelReclaimUp)
        );
    }

    #[test]
    fn no_reclaim_when_candle_stays_above() {
        let mut candles = rising();
        candles[8].low = 107.8;
        assert_eq!(ChannelReclaimDetector::default().detect(&candles), None);
    }

    #[test]
    fn no_reclaim_when_candle_stays_below() {
        let mut candles = rising();
        // lower bound at index 8 drops to ~101.05 once the close is 100
        candles[8] = c(8, 100.0, 100.5, 99.5, 100.0);
        assert_eq!(ChannelReclaimDetector::default().detect(&candles), None);
    }

    #[test]
    fn reclaim_down_references_lower_bound() {
        let mut candles = rising();
        candles[8] = c(8, 101.5, 102.0, 99.8, 100.0);
        assert_eq!(
            ChannelReclaimDetector::default().detect(&candles),
            Some(DetectionKind::ChannelReclaimDown)
        );
    }

    #[test]
    fn reclaim_needs_minimum_candles() {
        let mut candles = rising();
        candles[8].low = 106.0;
        let detector = ChannelReclaimDetector::new(11);
        assert_eq!(detector.detect(&candles), None);
    }

    /// Closes alternate 100/101 with ±0.2 wicks: inside a period-5, k=2 band.
    fn oscillating(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = if i % 2 == 0 { 100.0 } else { 101.0 };
                c(i, close, close + 0.2, close - 0.2, close)
            })
            .collect()
    }

    fn with_breakout(mut candles: Vec<Candle>) -> Vec<Candle> {
        let last = candles.len() - 1;
        candles[last] = c(last, 100.5, 110.0, 100.4, 110.0);
        candles
    }

    fn detector() -> BandBreakoutDetector {
        BandBreakoutDetector::new(BandModel::new(5, 2.0))
    }

    #[test]
    fn breakout_after_lower_touch_fires() {
        let mut candles = with_breakout(oscillating(20));
        candles[10].low = 95.0;
        assert!(detector().detect(&candles, 110.0));
    }

    #[test]
    fn upper_touch_since_lower_touch_suppresses() {
        let mut candles = with_breakout(oscillating(20));
        candles[10].low = 95.0;
        candles[14].high = 105.0;
        assert!(!detector().detect(&candles, 110.0));
    }

    #[test]
    fn upper_touch_before_lower_touch_is_ignored() {
        let mut candles = with_breakout(oscillating(20));
        candles[6].high = 105.0;
        candles[10].low = 95.0;
        assert!(detector().detect(&candles, 110.0));
    }

    #[test]
    fn breakout_without_any_lower_touch_fires() {
        let candles = with_breakout(oscillating(20));
        assert!(detector().detect(&candles, 110.0));
    }

    #[test]
    fn prior_breach_blocks_breakout() {
        let mut candles = with_breakout(oscillating(20));
        candles[18].high = 102.0;
        assert!(!detector().detect(&candles, 110.0));
    }

    #[test]
    fn price_below_upper_is_no_breakout() {
        let candles = with_breakout(oscillating(20));
        // upper band over the last five completed closes is ~101.38
        assert!(!detector().detect(&candles, 101.0));
    }

    #[test]
    fn short_history_is_no_signal() {
        let candles = with_breakout(oscillating(5));
        assert!(!detector().detect(&candles, 110.0));
    }
}
