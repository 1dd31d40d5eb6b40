use async_trait::async_trait;

use crate::{Candle, Instrument, Interval, Result, TickerSnapshot};

/// Abstraction over the market data source.
///
/// `BybitClient` implements this against the public REST API.
/// `ReplayGateway` implements this from scripted frames.
///
/// Only the scheduler holds a `dyn MarketDataGateway`; analysis code
/// receives plain values.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Snapshot of every listed linear instrument's ticker.
    async fn ticker_snapshot(&self) -> Result<TickerSnapshot>;

    /// Candle series for `symbol`, in exchange-native order (newest first).
    async fn candles(&self, symbol: &str, interval: Interval, limit: usize) -> Result<Vec<Candle>>;

    /// Instrument metadata, used to exclude delisting symbols.
    async fn instruments(&self) -> Result<Vec<Instrument>>;
}
