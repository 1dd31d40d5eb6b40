use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use analysis::{
    best_performer, potential_gain_pct, BandBreakoutDetector, BandModel, CandidateHistory,
    CandidateRanker, ChannelReclaimDetector, DailyResetController, PerformerRank, QuietHours,
    RollingWindowStore, ScanConfig, VolatilityScorer,
};
use common::{
    Alert, Candle, CandidateScore, CandidateView, DashboardEvent, Detection, Instrument, RankEntry,
    Result, Ticker, TickerSnapshot,
};

/// What one fast tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Qualifying candidates, best total first.
    pub candidates: Vec<CandidateScore>,
    /// Top performer; absent when the snapshot was partial.
    pub best: Option<CandidateScore>,
    /// The daily reset fired on this tick.
    pub reset: bool,
    /// Some ticker rows were rejected by the gateway.
    pub partial: bool,
    pub events: Vec<DashboardEvent>,
}

/// All per-run scan state. Every method takes `now` explicitly and performs
/// no I/O; the scheduler feeds it gateway results.
pub struct Scanner {
    store: RollingWindowStore,
    volatility: VolatilityScorer,
    ranker: CandidateRanker,
    ranks: PerformerRank,
    history: CandidateHistory,
    reset: DailyResetController,
    quiet: QuietHours,
    reclaim: ChannelReclaimDetector,
    breakout: BandBreakoutDetector,
    horizon: Duration,
    quote_suffix: String,
    min_turnover_usd: f64,

    candidates: Vec<CandidateScore>,
    tickers: HashMap<String, Ticker>,
    price_scales: HashMap<String, u32>,
    alerted_today: HashSet<String>,
    /// Completed-candle timestamp of each symbol's last recorded detection.
    last_detected: HashMap<String, i64>,
}

impl Scanner {
    pub fn new(config: &ScanConfig, now: DateTime<Utc>) -> Result<Self> {
        let horizon = config.horizon();
        Ok(Self {
            store: RollingWindowStore::new(),
            volatility: VolatilityScorer::new(horizon),
            ranker: CandidateRanker::new(
                horizon,
                config.ranking.volume_floor_usd,
                config.ranking.candidate_threshold,
            ),
            ranks: PerformerRank::new(Duration::hours(config.ranking.rank_retention_hours)),
            history: CandidateHistory::new(),
            reset: DailyResetController::new(config.reset_timezone()?, now),
            quiet: config.quiet_hours()?,
            reclaim: ChannelReclaimDetector::new(config.channel.min_candles),
            breakout: BandBreakoutDetector::new(BandModel::new(
                config.band.period,
                config.band.multiplier,
            )),
            horizon,
            quote_suffix: config.universe.quote_suffix.clone(),
            min_turnover_usd: config.universe.min_turnover_usd,
            candidates: Vec::new(),
            tickers: HashMap::new(),
            price_scales: HashMap::new(),
            alerted_today: HashSet::new(),
            last_detected: HashMap::new(),
        })
    }

    /// Fast-tick path: daily reset check, sample recording, scoring and
    /// ranking.
    pub fn on_snapshot(&mut self, snapshot: &TickerSnapshot, now: DateTime<Utc>) -> TickOutcome {
        let mut events = Vec::new();

        let reset = self.reset.observe(now);
        if reset {
            info!(day = self.reset.last_reset_day(), "Daily reset: clearing scan state");
            self.clear();
            events.extend(self.dashboard_events(None));
            events.push(DashboardEvent::Log { message: "Daily reset".into() });
        }

        for ticker in &snapshot.tickers {
            if !ticker.symbol.ends_with(&self.quote_suffix) {
                continue;
            }
            self.store.record(ticker.to_sample(now));
            self.tickers.insert(ticker.symbol.clone(), ticker.clone());
        }
        self.store.evict_older_than(self.horizon * 2, now);

        let volatility = self.volatility.score_all(&self.store, now);
        let scores = self.ranker.score_all(&self.store, &volatility, now);
        self.candidates = self.ranker.candidates(&scores);

        let partial = snapshot.rejected > 0;
        let best = if partial {
            debug!(rejected = snapshot.rejected, "Partial snapshot, no best performer this tick");
            None
        } else {
            best_performer(&self.candidates).cloned()
        };
        if let Some(best) = &best {
            self.ranks.update(&best.symbol, now);
        }

        events.extend(self.dashboard_events(best.clone()));

        TickOutcome {
            candidates: self.candidates.clone(),
            best,
            reset,
            partial,
            events,
        }
    }

    /// Symbols for the full scan: quote suffix, turnover above the floor,
    /// and no scheduled delivery. `instruments` is `None` when the metadata
    /// call failed; then only the ticker's own delivery time is checked.
    pub fn universe(&mut self, instruments: Option<&[Instrument]>) -> Vec<String> {
        let mut delisting = HashSet::new();
        if let Some(instruments) = instruments {
            for inst in instruments {
                if inst.is_delisting() {
                    delisting.insert(inst.symbol.as_str());
                }
                if let Some(scale) = inst.price_scale {
                    self.price_scales.insert(inst.symbol.clone(), scale);
                }
            }
        }

        let mut symbols: Vec<String> = self
            .tickers
            .values()
            .filter(|t| t.symbol.ends_with(&self.quote_suffix))
            .filter(|t| t.turnover_24h > self.min_turnover_usd)
            .filter(|t| t.delivery_time == 0 && !delisting.contains(t.symbol.as_str()))
            .map(|t| t.symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    pub fn has_tickers(&self) -> bool {
        !self.tickers.is_empty()
    }

    /// Channel reclaim on one symbol's candles (oldest first).
    pub fn evaluate_reclaim(
        &mut self,
        symbol: &str,
        candles: &[Candle],
        now: DateTime<Utc>,
    ) -> Option<Detection> {
        let kind = self.reclaim.detect(candles)?;
        self.record_detection(symbol, kind, candles, now)
    }

    /// Band breakout against the latest ticker price (falls back to the
    /// forming candle's close).
    pub fn evaluate_breakout(
        &mut self,
        symbol: &str,
        candles: &[Candle],
        now: DateTime<Utc>,
    ) -> Option<Detection> {
        let price = self
            .tickers
            .get(symbol)
            .map(|t| t.last_price)
            .or_else(|| candles.last().map(|c| c.close))?;
        if !self.breakout.detect(candles, price) {
            return None;
        }
        self.record_detection(symbol, self.breakout.kind(), candles, now)
    }

    /// Full-scan evaluation: at most one detection per symbol, channel
    /// reclaim taking precedence over band breakout.
    pub fn evaluate_scan(
        &mut self,
        series: &[(String, Vec<Candle>)],
        now: DateTime<Utc>,
    ) -> Vec<Detection> {
        series
            .iter()
            .filter_map(|(symbol, candles)| {
                self.evaluate_reclaim(symbol, candles, now)
                    .or_else(|| self.evaluate_breakout(symbol, candles, now))
            })
            .collect()
    }

    /// Records one occurrence per completed candle; re-evaluating the same
    /// candle on a later tick yields nothing.
    fn record_detection(
        &mut self,
        symbol: &str,
        kind: common::DetectionKind,
        candles: &[Candle],
        now: DateTime<Utc>,
    ) -> Option<Detection> {
        let completed = candles.len().checked_sub(2).or_else(|| candles.len().checked_sub(1))?;
        let candle_ts = candles[completed].timestamp;
        if self.last_detected.get(symbol) == Some(&candle_ts) {
            debug!(symbol, candle_ts, "Detection already recorded for this candle");
            return None;
        }
        self.last_detected.insert(symbol.to_string(), candle_ts);

        let entry = self.history.record(symbol, now);
        info!(symbol, kind = %kind, daily_count = entry.daily_count, "Detection");

        let gain = potential_gain_pct(candles).unwrap_or(0.0);
        let mut detection = Detection::new(symbol, kind, candles.to_vec(), gain, now);
        if let Some(ticker) = self.tickers.get(symbol) {
            detection.last_price = ticker.last_price;
        }
        detection.price_scale = self.price_scales.get(symbol).copied();
        Some(detection)
    }

    /// Quiet hours and once-per-day dedupe, then ordering by potential gain
    /// ascending. With `mark_final` the last alert carries the batch marker.
    pub fn gate_alerts(
        &mut self,
        detections: Vec<Detection>,
        now: DateTime<Utc>,
        mark_final: bool,
    ) -> Vec<Alert> {
        if self.quiet.contains(now) {
            if !detections.is_empty() {
                info!(
                    local = %self.quiet.local_time(now),
                    suppressed = detections.len(),
                    "Quiet hours, alerts suppressed"
                );
            }
            return Vec::new();
        }

        let mut fresh: Vec<Detection> = detections
            .into_iter()
            .filter(|d| self.alerted_today.insert(d.symbol.clone()))
            .collect();
        fresh.sort_by(|a, b| a.potential_gain_pct.total_cmp(&b.potential_gain_pct));

        let last = fresh.len().saturating_sub(1);
        fresh
            .into_iter()
            .enumerate()
            .map(|(i, detection)| Alert::Detection {
                detection,
                is_final: mark_final && i == last,
            })
            .collect()
    }

    /// End of a full scan: gated alerts, or a single "scan finished" notice
    /// when nothing is deliverable outside quiet hours.
    pub fn finish_scan(&mut self, detections: Vec<Detection>, now: DateTime<Utc>) -> Vec<Alert> {
        let alerts = self.gate_alerts(detections, now, true);
        if alerts.is_empty() && !self.quiet.contains(now) {
            return vec![Alert::ScanFinished];
        }
        alerts
    }

    pub fn candidate_views(&self) -> Vec<CandidateView> {
        self.candidates
            .iter()
            .map(|c| {
                let entry = self.history.get(&c.symbol);
                CandidateView {
                    symbol: c.symbol.clone(),
                    price: c.price,
                    total: c.total,
                    volatility_score: c.volatility_score,
                    price_change_pct: c.price_change_pct,
                    first_seen: entry.map(|e| e.first_seen),
                    last_seen: entry.map(|e| e.last_seen),
                    daily_count: entry.map(|e| e.daily_count).unwrap_or(0),
                }
            })
            .collect()
    }

    pub fn ranking(&self) -> Vec<RankEntry> {
        self.ranks.ranking()
    }

    pub fn history(&self) -> &CandidateHistory {
        &self.history
    }

    pub fn candidates(&self) -> &[CandidateScore] {
        &self.candidates
    }

    /// Number of stored fast-tick samples.
    pub fn sample_count(&self) -> usize {
        self.store.len()
    }

    /// Current dashboard state as push events.
    pub fn dashboard_events(&self, current: Option<CandidateScore>) -> Vec<DashboardEvent> {
        vec![
            DashboardEvent::Candidates { potential_candidates: self.candidate_views() },
            DashboardEvent::Performers { current, history: self.ranking() },
        ]
    }

    /// Drop every derived structure. The reset controller keeps its day.
    pub fn clear(&mut self) {
        self.store.clear();
        self.ranks.clear();
        self.history.clear();
        self.candidates.clear();
        self.tickers.clear();
        self.price_scales.clear();
        self.alerted_today.clear();
        self.last_detected.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::DetectionKind;

    /// 12:00 in UTC+2, outside the default quiet hours.
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn secs(s: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(s)
    }

    fn ticker(symbol: &str, price: f64, volume: f64) -> Ticker {
        Ticker {
            symbol: symbol.into(),
            last_price: price,
            turnover_24h: volume,
            funding_rate: 0.0001,
            delivery_time: 0,
            price_scale: None,
        }
    }

    fn snapshot(tickers: Vec<Ticker>) -> TickerSnapshot {
        TickerSnapshot { tickers, rejected: 0 }
    }

    fn scanner() -> Scanner {
        Scanner::new(&ScanConfig::default(), t0()).unwrap()
    }

    /// Ten rising candles whose second-to-last wicks under the standard-error
    /// channel and closes back above it.
    fn reclaim_up_candles() -> Vec<Candle> {
        (0..10)
            .map(|i| {
                let close = 100.0 + i as f64 + if i % 2 == 0 { 0.3 } else { -0.3 };
                let low = if i == 8 { 106.0 } else { close - 0.1 };
                Candle {
                    timestamp: 1_714_557_600_000 + i as i64 * 60_000,
                    open: close,
                    high: close + 0.1,
                    low,
                    close,
                    volume: 1.0,
                }
            })
            .collect()
    }

    /// The same shape moved `minutes` later.
    fn shifted(candles: Vec<Candle>, minutes: i64) -> Vec<Candle> {
        candles
            .into_iter()
            .map(|c| Candle { timestamp: c.timestamp + minutes * 60_000, ..c })
            .collect()
    }

    fn detection(symbol: &str, gain: f64) -> Detection {
        Detection::new(symbol, DetectionKind::ChannelReclaimUp, reclaim_up_candles(), gain, t0())
    }

    #[test]
    fn scripted_ticks_end_to_end() {
        let mut scanner = scanner();

        let o1 = scanner.on_snapshot(&snapshot(vec![ticker("SOLUSDT", 100.0, 20_000_000.0)]), secs(0));
        assert!(o1.candidates.is_empty());
        let o2 = scanner.on_snapshot(&snapshot(vec![ticker("SOLUSDT", 100.0, 20_000_000.0)]), secs(5));
        assert!(o2.candidates.is_empty());

        // +5% price, +50% volume
        let o3 = scanner.on_snapshot(&snapshot(vec![ticker("SOLUSDT", 105.0, 30_000_000.0)]), secs(10));
        assert_eq!(o3.candidates.len(), 1);
        assert_eq!(o3.candidates[0].symbol, "SOLUSDT");
        assert!(o3.candidates[0].total > 15.0);
        assert_eq!(o3.best.as_ref().map(|b| b.symbol.as_str()), Some("SOLUSDT"));
        assert_eq!(scanner.ranking()[0].count, 1);

        let first = scanner.evaluate_reclaim("SOLUSDT", &reclaim_up_candles(), secs(10));
        assert!(first.is_some());
        assert_eq!(scanner.history().daily_count("SOLUSDT"), 1);

        let second = scanner.evaluate_reclaim("SOLUSDT", &shifted(reclaim_up_candles(), 1), secs(70));
        assert!(second.is_some());
        assert_eq!(scanner.history().daily_count("SOLUSDT"), 2);
        assert_eq!(scanner.candidate_views()[0].daily_count, 2);
    }

    #[test]
    fn one_completed_candle_counts_once() {
        let mut scanner = scanner();
        let candles = reclaim_up_candles();

        // fast ticks re-check the same completed candle every 5 s
        let fast: Vec<_> = (0..12)
            .filter_map(|i| scanner.evaluate_reclaim("SOLUSDT", &candles, secs(i * 5)))
            .collect();
        assert_eq!(fast.len(), 1);
        // and the full scan sees it again
        let scan = scanner.evaluate_scan(&[("SOLUSDT".to_string(), candles.clone())], secs(60));
        assert!(scan.is_empty());
        assert_eq!(scanner.history().daily_count("SOLUSDT"), 1);

        let next = scanner.evaluate_reclaim("SOLUSDT", &shifted(candles, 1), secs(65));
        assert!(next.is_some());
        assert_eq!(scanner.history().daily_count("SOLUSDT"), 2);
    }

    #[test]
    fn day_change_clears_everything() {
        let mut scanner = scanner();
        scanner.on_snapshot(&snapshot(vec![ticker("SOLUSDT", 100.0, 20_000_000.0)]), secs(0));
        scanner.on_snapshot(&snapshot(vec![ticker("SOLUSDT", 105.0, 30_000_000.0)]), secs(5));
        scanner.evaluate_reclaim("SOLUSDT", &reclaim_up_candles(), secs(5));
        assert!(!scanner.ranking().is_empty());

        // 22:30 UTC = 00:30 next day in UTC+2
        let next_day = Utc.with_ymd_and_hms(2024, 5, 1, 22, 30, 0).unwrap();
        let outcome = scanner.on_snapshot(&snapshot(vec![]), next_day);

        assert!(outcome.reset);
        assert!(scanner.history().is_empty());
        assert!(scanner.ranking().is_empty());
        assert_eq!(scanner.sample_count(), 0);
        assert!(scanner.candidates().is_empty());
        assert_eq!(scanner.history().daily_count("SOLUSDT"), 0);
        assert!(outcome.events.contains(&DashboardEvent::Candidates { potential_candidates: vec![] }));

        scanner.evaluate_reclaim("SOLUSDT", &reclaim_up_candles(), next_day);
        assert_eq!(scanner.history().daily_count("SOLUSDT"), 1);
    }

    #[test]
    fn partial_snapshot_has_no_best_performer() {
        let mut scanner = scanner();
        scanner.on_snapshot(&snapshot(vec![ticker("SOLUSDT", 100.0, 20_000_000.0)]), secs(0));
        let mut partial = snapshot(vec![ticker("SOLUSDT", 105.0, 30_000_000.0)]);
        partial.rejected = 2;

        let outcome = scanner.on_snapshot(&partial, secs(5));
        assert!(outcome.partial);
        assert_eq!(outcome.candidates.len(), 1);
        assert!(outcome.best.is_none());
        assert!(scanner.ranking().is_empty());
    }

    #[test]
    fn volume_below_floor_never_qualifies() {
        let mut scanner = scanner();
        scanner.on_snapshot(&snapshot(vec![ticker("TINYUSDT", 1.0, 1_000_000.0)]), secs(0));
        let o = scanner.on_snapshot(&snapshot(vec![ticker("TINYUSDT", 2.0, 5_000_000.0)]), secs(5));
        assert!(o.candidates.is_empty());
    }

    #[test]
    fn universe_filters_suffix_turnover_and_delisting() {
        let mut scanner = scanner();
        let mut expiring = ticker("EXPUSDT", 1.0, 50_000_000.0);
        expiring.delivery_time = 1_735_689_600_000;
        scanner.on_snapshot(
            &snapshot(vec![
                ticker("BTCUSDT", 65_000.0, 2_000_000_000.0),
                ticker("ETHUSDC", 3_000.0, 500_000_000.0),
                ticker("DUSTUSDT", 0.01, 900_000.0),
                ticker("OLDUSDT", 1.0, 5_000_000.0),
                expiring,
            ]),
            secs(0),
        );

        assert_eq!(scanner.universe(None), vec!["BTCUSDT", "OLDUSDT"]);

        let instruments = vec![
            Instrument { symbol: "BTCUSDT".into(), delivery_time: 0, price_scale: Some(1) },
            Instrument { symbol: "OLDUSDT".into(), delivery_time: 1_735_689_600_000, price_scale: Some(4) },
        ];
        assert_eq!(scanner.universe(Some(&instruments)), vec!["BTCUSDT"]);
    }

    #[test]
    fn alerts_sorted_by_gain_with_final_marker() {
        let mut scanner = scanner();
        let alerts = scanner.finish_scan(
            vec![detection("AUSDT", 3.0), detection("BUSDT", 1.0), detection("CUSDT", 2.0)],
            t0(),
        );
        let order: Vec<(&str, bool)> = alerts
            .iter()
            .map(|a| match a {
                Alert::Detection { detection, is_final } => (detection.symbol.as_str(), *is_final),
                Alert::ScanFinished => ("", true),
            })
            .collect();
        assert_eq!(order, vec![("BUSDT", false), ("CUSDT", false), ("AUSDT", true)]);
    }

    #[test]
    fn symbol_alerts_once_per_day() {
        let mut scanner = scanner();
        assert_eq!(scanner.gate_alerts(vec![detection("AUSDT", 1.0)], t0(), false).len(), 1);
        assert!(scanner.gate_alerts(vec![detection("AUSDT", 1.0)], secs(60), false).is_empty());
    }

    #[test]
    fn quiet_hours_suppress_everything() {
        let mut scanner = scanner();
        // 23:00 UTC = 01:00 UTC+2
        let night = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        assert!(scanner.finish_scan(vec![detection("AUSDT", 1.0)], night).is_empty());
        assert!(scanner.finish_scan(vec![], night).is_empty());
    }

    #[test]
    fn empty_scan_reports_finished() {
        let mut scanner = scanner();
        let alerts = scanner.finish_scan(vec![], t0());
        assert!(matches!(alerts.as_slice(), [Alert::ScanFinished]));
    }

    #[test]
    fn scan_prefers_reclaim_and_tags_price_scale() {
        let mut scanner = scanner();
        scanner.on_snapshot(&snapshot(vec![ticker("SOLUSDT", 108.3, 20_000_000.0)]), secs(0));
        scanner.universe(Some(&[Instrument {
            symbol: "SOLUSDT".into(),
            delivery_time: 0,
            price_scale: Some(3),
        }]));

        let found = scanner.evaluate_scan(&[("SOLUSDT".to_string(), reclaim_up_candles())], secs(1));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DetectionKind::ChannelReclaimUp);
        assert_eq!(found[0].price_scale, Some(3));
        assert_eq!(found[0].last_price, 108.3);
        assert!(found[0].potential_gain_pct > 0.0);
    }

    #[test]
    fn clear_discards_state() {
        let mut scanner = scanner();
        scanner.on_snapshot(&snapshot(vec![ticker("SOLUSDT", 100.0, 20_000_000.0)]), secs(0));
        scanner.gate_alerts(vec![detection("AUSDT", 1.0)], t0(), false);
        scanner.clear();
        assert!(!scanner.has_tickers());
        assert_eq!(scanner.sample_count(), 0);
        assert_eq!(scanner.gate_alerts(vec![detection("AUSDT", 1.0)], t0(), false).len(), 1);
    }
}
