use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Candle, Error, Instrument, Interval, MarketDataGateway, Result, TickerSnapshot,
};

/// Scripted market data source for offline runs and tests.
///
/// Each `ticker_snapshot` call returns the next scripted frame; once the
/// script is exhausted the last frame repeats. Candle series are stored in
/// exchange order (newest first) and served as-is, truncated to `limit`.
/// Nothing ever touches the network.
#[derive(Default)]
pub struct ReplayGateway {
    snapshots: Vec<TickerSnapshot>,
    cursor: Arc<RwLock<usize>>,
    candles: HashMap<String, Vec<Candle>>,
    instruments: Vec<Instrument>,
}

/// On-disk replay script.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplayScript {
    pub snapshots: Vec<TickerSnapshot>,
    pub candles: HashMap<String, Vec<Candle>>,
    pub instruments: Vec<Instrument>,
}

impl ReplayGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_script(script: ReplayScript) -> Self {
        info!(
            frames = script.snapshots.len(),
            series = script.candles.len(),
            "ReplayGateway initialized"
        );
        Self {
            snapshots: script.snapshots,
            cursor: Arc::new(RwLock::new(0)),
            candles: script.candles,
            instruments: script.instruments,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let script: ReplayScript = serde_json::from_str(json)?;
        Ok(Self::from_script(script))
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read replay file '{path}': {e}")))?;
        Self::from_json(&json)
    }

    pub fn with_snapshots(mut self, snapshots: Vec<TickerSnapshot>) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Candles for `symbol`, newest first.
    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.candles.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_instruments(mut self, instruments: Vec<Instrument>) -> Self {
        self.instruments = instruments;
        self
    }

    /// Index of the next frame to be served.
    pub async fn position(&self) -> usize {
        *self.cursor.read().await
    }
}

#[async_trait]
impl MarketDataGateway for ReplayGateway {
    async fn ticker_snapshot(&self) -> Result<TickerSnapshot> {
        if self.snapshots.is_empty() {
            return Err(Error::Exchange("replay script has no ticker frames".into()));
        }
        let mut cursor = self.cursor.write().await;
        let idx = (*cursor).min(self.snapshots.len() - 1);
        if *cursor < self.snapshots.len() {
            *cursor += 1;
        }
        debug!(frame = idx, "Replaying ticker frame");
        Ok(self.snapshots[idx].clone())
    }

    async fn candles(&self, symbol: &str, _interval: Interval, limit: usize) -> Result<Vec<Candle>> {
        self.candles
            .get(symbol)
            .map(|series| series.iter().take(limit).copied().collect())
            .ok_or_else(|| Error::Exchange(format!("no replay candles for {symbol}")))
    }

    async fn instruments(&self) -> Result<Vec<Instrument>> {
        Ok(self.instruments.clone())
    }
}
