use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use common::Sample;

/// Per-symbol, time-bounded buffers of fast-tick samples.
///
/// Samples are kept in insertion order; the data source is assumed to
/// deliver monotonically increasing timestamps.
#[derive(Debug, Default)]
pub struct RollingWindowStore {
    buffers: HashMap<String, VecDeque<Sample>>,
}

impl RollingWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: Sample) {
        self.buffers
            .entry(sample.symbol.clone())
            .or_default()
            .push_back(sample);
    }

    /// Samples of `symbol` with `timestamp >= now - duration`.
    pub fn window<'a>(
        &'a self,
        symbol: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a Sample> + Clone + 'a {
        let cutoff = now - duration;
        self.buffers
            .get(symbol)
            .into_iter()
            .flat_map(|buf| buf.iter())
            .filter(move |s| s.timestamp >= cutoff)
    }

    /// Drop samples older than `now - duration`, and any symbol left empty.
    pub fn evict_older_than(&mut self, duration: Duration, now: DateTime<Utc>) {
        let cutoff = now - duration;
        for buf in self.buffers.values_mut() {
            while buf.front().is_some_and(|s| s.timestamp < cutoff) {
                buf.pop_front();
            }
        }
        self.buffers.retain(|_, buf| !buf.is_empty());
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Total number of stored samples across all symbols.
    pub fn len(&self) -> usize {
        self.buffers.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(symbol: &str, price: f64, secs: i64) -> Sample {
        Sample {
            symbol: symbol.into(),
            price,
            volume_24h: 1.0,
            funding_rate: 0.0,
            timestamp: at(secs),
        }
    }

    #[test]
    fn window_filters_by_horizon_without_mutating() {
        let mut store = RollingWindowStore::new();
        for (i, p) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            store.record(sample("BTCUSDT", *p, i as i64 * 30));
        }
        let now = at(90);
        let prices: Vec<f64> = store
            .window("BTCUSDT", Duration::seconds(60), now)
            .map(|s| s.price)
            .collect();
        assert_eq!(prices, vec![2.0, 3.0, 4.0]);
        // Restartable and non-destructive.
        assert_eq!(store.window("BTCUSDT", Duration::seconds(60), now).count(), 3);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn unknown_symbol_yields_empty_window() {
        let store = RollingWindowStore::new();
        assert_eq!(store.window("NOPE", Duration::seconds(60), at(0)).count(), 0);
    }

    #[test]
    fn eviction_trims_front_and_drops_empty_symbols() {
        let mut store = RollingWindowStore::new();
        store.record(sample("A", 1.0, 0));
        store.record(sample("A", 1.0, 100));
        store.record(sample("B", 1.0, 0));

        store.evict_older_than(Duration::seconds(120), at(150));

        assert_eq!(store.len(), 1);
        assert_eq!(store.symbols().collect::<Vec<_>>(), vec!["A"]);
    }
}
