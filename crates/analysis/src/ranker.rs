use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use common::{CandidateScore, RankEntry, Sample};

use crate::window::RollingWindowStore;

const VOLUME_WEIGHT: f64 = 0.5;
const FUNDING_WEIGHT: f64 = 0.2;
const VOLATILITY_WEIGHT: f64 = 0.3;
/// Tolerance on the volatility key when picking the best performer.
const PERFORMANCE_EPSILON: f64 = 1e-4;

/// Weighted components of a composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreComponents {
    pub volume_score: f64,
    pub funding_score: f64,
    pub volatility_score: f64,
}

impl ScoreComponents {
    pub fn compute(volume_increase_pct: f64, funding_rate: f64, volatility: f64) -> Self {
        Self {
            volume_score: volume_increase_pct.clamp(0.0, 100.0) * VOLUME_WEIGHT,
            funding_score: (funding_rate.abs() * 1000.0).clamp(0.0, 100.0) * FUNDING_WEIGHT,
            volatility_score: volatility * VOLATILITY_WEIGHT,
        }
    }

    pub fn total(&self) -> f64 {
        self.volume_score + self.funding_score + self.volatility_score
    }
}

/// Composite volume / funding / volatility scoring and candidate selection.
#[derive(Debug, Clone)]
pub struct CandidateRanker {
    pub window: Duration,
    pub volume_floor_usd: f64,
    pub threshold: f64,
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self {
            window: Duration::seconds(60),
            volume_floor_usd: 10_000_000.0,
            threshold: 15.0,
        }
    }
}

impl CandidateRanker {
    pub fn new(window: Duration, volume_floor_usd: f64, threshold: f64) -> Self {
        Self { window, volume_floor_usd, threshold }
    }

    /// Score one symbol from its window. Requires a volatility value, so
    /// symbols the volatility scorer skipped are skipped here too.
    pub fn score_symbol(
        &self,
        store: &RollingWindowStore,
        symbol: &str,
        volatility: f64,
        now: DateTime<Utc>,
    ) -> Option<CandidateScore> {
        let mut window = store.window(symbol, self.window, now);
        let first = window.next()?;
        let last = window.last().unwrap_or(first);

        let components = ScoreComponents::compute(
            pct_change(first.volume_24h, last.volume_24h),
            last.funding_rate,
            volatility,
        );

        Some(to_score(last, &components, pct_change(first.price, last.price)))
    }

    /// Score every symbol that has a volatility value.
    pub fn score_all(
        &self,
        store: &RollingWindowStore,
        volatility: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Vec<CandidateScore> {
        volatility
            .iter()
            .filter_map(|(symbol, &v)| self.score_symbol(store, symbol, v, now))
            .collect()
    }

    pub fn qualifies(&self, score: &CandidateScore) -> bool {
        score.total > self.threshold && score.volume_24h >= self.volume_floor_usd
    }

    /// Qualifying scores, sorted by total descending.
    pub fn candidates(&self, scores: &[CandidateScore]) -> Vec<CandidateScore> {
        let mut out: Vec<CandidateScore> =
            scores.iter().filter(|s| self.qualifies(s)).cloned().collect();
        out.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.symbol.cmp(&b.symbol)));
        out
    }
}

/// Ordering for best-performer selection: volatility score descending,
/// ties (within epsilon) broken by 24h volume descending.
///
/// Not a total order because of the tolerance; use it for pairwise
/// selection only, never as a sort comparator.
pub fn compare_performance(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    if (a.volatility_score - b.volatility_score).abs() > PERFORMANCE_EPSILON {
        b.volatility_score.total_cmp(&a.volatility_score)
    } else {
        b.volume_24h.total_cmp(&a.volume_24h)
    }
}

/// The tick's top performer among `candidates`.
pub fn best_performer(candidates: &[CandidateScore]) -> Option<&CandidateScore> {
    candidates.iter().fold(None, |best, c| match best {
        Some(b) if compare_performance(c, b) != Ordering::Less => Some(b),
        _ => Some(c),
    })
}

fn pct_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

fn to_score(last: &Sample, c: &ScoreComponents, price_change_pct: f64) -> CandidateScore {
    CandidateScore {
        symbol: last.symbol.clone(),
        volume_score: c.volume_score,
        funding_score: c.funding_score,
        volatility_score: c.volatility_score,
        total: c.total(),
        price_change_pct,
        volume_24h: last.volume_24h,
        price: last.price,
    }
}

#[derive(Debug, Clone)]
struct RankCounter {
    count: i64,
    last_active: DateTime<Utc>,
}

/// Decaying popularity counter of top performers.
///
/// The winner of each tick gains one point, every other symbol that has ever
/// won loses one (no floor). Symbols that have not won for `retention`
/// are evicted.
#[derive(Debug, Clone)]
pub struct PerformerRank {
    counters: HashMap<String, RankCounter>,
    retention: Duration,
}

impl Default for PerformerRank {
    fn default() -> Self {
        Self::new(Duration::days(2))
    }
}

impl PerformerRank {
    pub fn new(retention: Duration) -> Self {
        Self { counters: HashMap::new(), retention }
    }

    pub fn update(&mut self, winner: &str, now: DateTime<Utc>) {
        for (symbol, counter) in self.counters.iter_mut() {
            if symbol != winner {
                counter.count -= 1;
            }
        }

        let counter = self
            .counters
            .entry(winner.to_string())
            .or_insert(RankCounter { count: 0, last_active: now });
        counter.count += 1;
        counter.last_active = now;

        let cutoff = now - self.retention;
        self.counters.retain(|_, c| c.last_active >= cutoff);
    }

    pub fn get(&self, symbol: &str) -> Option<i64> {
        self.counters.get(symbol).map(|c| c.count)
    }

    /// Counters sorted descending.
    pub fn ranking(&self) -> Vec<RankEntry> {
        let mut out: Vec<RankEntry> = self
            .counters
            .iter()
            .map(|(symbol, c)| RankEntry {
                symbol: symbol.clone(),
                count: c.count,
                last_active: c.last_active,
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.symbol.cmp(&b.symbol)));
        out
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }
}
