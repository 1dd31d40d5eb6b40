use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use common::{normalize_candles, Candle, Interval, MarketDataGateway};

/// Bounded fan-out of candle requests.
#[derive(Debug, Clone, Copy)]
pub struct BatchFetch {
    pub batch_size: usize,
    pub delay: Duration,
    pub interval: Interval,
    pub limit: usize,
}

/// Candle series that arrived, oldest first, plus how many requests failed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub series: Vec<(String, Vec<Candle>)>,
    pub failures: usize,
}

impl BatchFetch {
    /// Fetch `symbols` in chunks of `batch_size`. Requests inside a chunk
    /// run concurrently; the next chunk starts `delay` after the previous
    /// one completed. A failed request only loses that symbol.
    pub async fn run(&self, gateway: &dyn MarketDataGateway, symbols: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let batch_size = self.batch_size.max(1);
        let chunks: Vec<&[String]> = symbols.chunks(batch_size).collect();

        for (i, chunk) in chunks.iter().enumerate() {
            let requests = chunk
                .iter()
                .map(|symbol| gateway.candles(symbol, self.interval, self.limit));
            let results = join_all(requests).await;

            for (symbol, result) in chunk.iter().zip(results) {
                match result {
                    Ok(candles) => outcome.series.push((symbol.clone(), normalize_candles(candles))),
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Candle fetch failed");
                        outcome.failures += 1;
                    }
                }
            }

            if i + 1 < chunks.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        debug!(
            requested = symbols.len(),
            fetched = outcome.series.len(),
            failures = outcome.failures,
            "Candle batch complete"
        );
        outcome
    }
}
