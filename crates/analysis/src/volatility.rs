use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use common::Sample;

use crate::window::RollingWindowStore;

/// Path-length volatility: sum of absolute consecutive price moves over the
/// window, relative to the window's mean price, in percent.
#[derive(Debug, Clone)]
pub struct VolatilityScorer {
    pub window: Duration,
}

impl Default for VolatilityScorer {
    fn default() -> Self {
        Self { window: Duration::seconds(60) }
    }
}

impl VolatilityScorer {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Returns `None` with fewer than two samples (no score, not zero).
    pub fn score<'a>(&self, samples: impl Iterator<Item = &'a Sample> + Clone) -> Option<f64> {
        let count = samples.clone().count();
        if count < 2 {
            return None;
        }

        let mean = samples.clone().map(|s| s.price).sum::<f64>() / count as f64;
        if mean <= 0.0 {
            return None;
        }

        let prices: Vec<f64> = samples.map(|s| s.price).collect();
        let path: f64 = prices.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        Some(path / mean * 100.0)
    }

    /// Score every symbol in the store that has enough samples.
    pub fn score_all(&self, store: &RollingWindowStore, now: DateTime<Utc>) -> HashMap<String, f64> {
        store
            .symbols()
            .filter_map(|symbol| {
                self.score(store.window(symbol, self.window, now))
                    .map(|v| (symbol.to_string(), v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn samples(prices: &[f64]) -> Vec<Sample> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| Sample {
                symbol: "ETHUSDT".into(),
                price,
                volume_24h: 0.0,
                funding_rate: 0.0,
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
            })
            .collect()
    }

    #[test]
    fn single_sample_has_no_score() {
        let scorer = VolatilityScorer::default();
        assert!(scorer.score(samples(&[100.0]).iter()).is_none());
    }

    #[test]
    fn flat_prices_score_zero() {
        let scorer = VolatilityScorer::default();
        let v = scorer.score(samples(&[100.0, 100.0, 100.0]).iter()).unwrap();
        assert_eq!(v, 0.0);
    }

    #[test]
    fn path_length_over_mean() {
        let scorer = VolatilityScorer::default();
        // |101-100| + |99-101| = 3, mean = 100
        let v = scorer.score(samples(&[100.0, 101.0, 99.0]).iter()).unwrap();
        assert!((v - 3.0).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn score_all_skips_thin_symbols() {
        let mut store = RollingWindowStore::new();
        let now = Utc.timestamp_opt(1_700_000_010, 0).unwrap();
        for s in samples(&[100.0, 102.0]) {
            store.record(s);
        }
        store.record(Sample {
            symbol: "THIN".into(),
            price: 5.0,
            volume_24h: 0.0,
            funding_rate: 0.0,
            timestamp: now,
        });

        let scores = VolatilityScorer::default().score_all(&store, now);
        assert!(scores.contains_key("ETHUSDT"));
        assert!(!scores.contains_key("THIN"));
    }
}
