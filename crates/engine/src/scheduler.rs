use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{self, interval, interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use analysis::ScanConfig;
use common::{Alert, DashboardEvent, MarketDataGateway, Result, ScanCommand, ScannerState};

use crate::batch::BatchFetch;
use crate::scanner::Scanner;

/// Cloneable handle passed to the Telegram bot and the dashboard.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<ScanCommand>,
    state: Arc<RwLock<ScannerState>>,
    events_tx: broadcast::Sender<DashboardEvent>,
}

impl SchedulerHandle {
    pub async fn send(&self, cmd: ScanCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> ScannerState {
        *self.state.read().await
    }

    /// Subscribe to dashboard push events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events_tx.subscribe()
    }

    pub fn events_sender(&self) -> broadcast::Sender<DashboardEvent> {
        self.events_tx.clone()
    }
}

/// Owns the scan state and drives both cadences from a single task, so
/// ticks never overlap. A tick that overruns its period makes the next one
/// skip rather than queue.
pub struct ScanScheduler {
    gateway: Arc<dyn MarketDataGateway>,
    config: ScanConfig,
    scanner: Scanner,
    state: Arc<RwLock<ScannerState>>,
    events_tx: broadcast::Sender<DashboardEvent>,
    alert_tx: mpsc::Sender<Alert>,
    command_rx: mpsc::Receiver<ScanCommand>,
}

impl ScanScheduler {
    pub fn new(
        gateway: Arc<dyn MarketDataGateway>,
        config: ScanConfig,
        alert_tx: mpsc::Sender<Alert>,
    ) -> Result<(Self, SchedulerHandle)> {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (events_tx, _) = broadcast::channel(256);
        let state = Arc::new(RwLock::new(ScannerState::Stopped));
        let scanner = Scanner::new(&config, Utc::now())?;

        let handle = SchedulerHandle {
            command_tx,
            state: state.clone(),
            events_tx: events_tx.clone(),
        };

        let scheduler = ScanScheduler {
            gateway,
            config,
            scanner,
            state,
            events_tx,
            alert_tx,
            command_rx,
        };

        Ok((scheduler, handle))
    }

    /// Run the scheduler. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Scanner initialized in Stopped state. Waiting for Start command.");

        let mut fast = self.fast_ticker();
        let mut scan = self.scan_ticker();
        let mut running = false;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(ScanCommand::Start) => {
                        if running {
                            info!("Scanner already running");
                            continue;
                        }
                        info!(
                            fast_tick_secs = self.config.schedule.fast_tick_secs,
                            scan_interval_secs = self.config.schedule.scan_interval_secs,
                            "Scanner starting"
                        );
                        *self.state.write().await = ScannerState::Running;
                        fast = self.fast_ticker();
                        scan = self.scan_ticker();
                        running = true;
                        self.log_event("Scanner started");
                    }

                    Some(ScanCommand::Stop) => {
                        if !running {
                            info!("Scanner already stopped");
                            continue;
                        }
                        info!("Scanner stopping, discarding scan state");
                        *self.state.write().await = ScannerState::Stopped;
                        running = false;
                        self.scanner.clear();
                        self.publish(self.scanner.dashboard_events(None));
                        self.log_event("Scanner stopped");
                    }

                    Some(ScanCommand::ScanNow) => {
                        if running {
                            self.full_scan().await;
                        } else {
                            warn!("ScanNow ignored: scanner is stopped");
                        }
                    }

                    None => {
                        warn!("Scanner command channel closed, shutting down");
                        break;
                    }
                },

                _ = fast.tick(), if running => self.fast_tick().await,

                _ = scan.tick(), if running => self.full_scan().await,
            }
        }
    }

    fn fast_ticker(&self) -> time::Interval {
        let mut ticker = interval(self.config.fast_tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    fn scan_ticker(&self) -> time::Interval {
        let period = self.config.scan_interval();
        let first = delay_until_offset(
            Utc::now(),
            self.config.schedule.scan_interval_secs,
            self.config.schedule.scan_offset_secs,
        );
        let mut ticker = interval_at(Instant::now() + first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    /// Snapshot, scoring, then channel reclaim on the current candidates.
    async fn fast_tick(&mut self) {
        let snapshot = match self.gateway.ticker_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Ticker snapshot failed, skipping tick");
                return;
            }
        };

        let now = Utc::now();
        let outcome = self.scanner.on_snapshot(&snapshot, now);
        self.publish(outcome.events);
        if let Some(best) = &outcome.best {
            info!(symbol = %best.symbol, volatility = best.volatility_score, "Top performer");
        }
        if outcome.candidates.is_empty() {
            return;
        }

        let symbols: Vec<String> = outcome.candidates.iter().map(|c| c.symbol.clone()).collect();
        let batch = self
            .batch(self.config.channel.reclaim_candle_limit)
            .run(self.gateway.as_ref(), &symbols)
            .await;

        let detections: Vec<_> = batch
            .series
            .iter()
            .filter_map(|(symbol, candles)| self.scanner.evaluate_reclaim(symbol, candles, now))
            .collect();
        let alerts = self.scanner.gate_alerts(detections, now, false);
        self.deliver(alerts).await;
    }

    /// Universe filter, deep candle fetch, both detectors, gated alerts.
    async fn full_scan(&mut self) {
        if !self.scanner.has_tickers() {
            self.fast_tick().await;
        }

        let instruments = match self.gateway.instruments().await {
            Ok(list) => Some(list),
            Err(e) => {
                warn!(error = %e, "Instrument info failed, scanning without delisting filter");
                None
            }
        };
        let universe = self.scanner.universe(instruments.as_deref());
        info!(symbols = universe.len(), "Full scan starting");

        let batch = self
            .batch(self.config.channel.scan_candle_limit)
            .run(self.gateway.as_ref(), &universe)
            .await;

        let now = Utc::now();
        let detections = self.scanner.evaluate_scan(&batch.series, now);
        let found = detections.len();
        let alerts = self.scanner.finish_scan(detections, now);

        info!(
            scanned = batch.series.len(),
            failures = batch.failures,
            detections = found,
            alerts = alerts.len(),
            "Full scan finished"
        );
        self.log_event(&format!(
            "Scan finished: {} symbols, {found} signals",
            batch.series.len()
        ));
        self.publish(self.scanner.dashboard_events(None));
        self.deliver(alerts).await;
    }

    fn batch(&self, limit: usize) -> BatchFetch {
        BatchFetch {
            batch_size: self.config.fetch.batch_size,
            delay: Duration::from_millis(self.config.fetch.batch_delay_ms),
            interval: self.config.channel.interval,
            limit,
        }
    }

    async fn deliver(&self, alerts: Vec<Alert>) {
        for alert in alerts {
            if self.alert_tx.send(alert).await.is_err() {
                error!("Alert channel closed, dropping alert");
                return;
            }
        }
    }

    fn publish(&self, events: Vec<DashboardEvent>) {
        for event in events {
            // No subscribers is fine.
            let _ = self.events_tx.send(event);
        }
    }

    fn log_event(&self, message: &str) {
        self.publish(vec![DashboardEvent::Log { message: message.to_string() }]);
    }
}

/// Time from `now` until the next instant whose second-of-period equals
/// `offset_secs`. Only periods that divide a minute are aligned; any other
/// period starts immediately.
pub fn delay_until_offset(now: DateTime<Utc>, period_secs: u64, offset_secs: u64) -> Duration {
    if period_secs == 0 || 60 % period_secs != 0 {
        return Duration::ZERO;
    }
    let offset_ms = (offset_secs % period_secs) * 1000;
    let period_ms = period_secs * 1000;
    let into_period_ms =
        (now.second() as u64 % period_secs) * 1000 + (now.nanosecond() as u64 / 1_000_000).min(999);

    let wait = (offset_ms + period_ms - into_period_ms) % period_ms;
    Duration::from_millis(wait)
}
