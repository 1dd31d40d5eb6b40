use analysis::{ChannelWidth, RegressionChannel};
use common::Candle;

/// Body and wick movement of one candle relative to its open, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandlePercent {
    pub body_pct: f64,
    pub upper_wick_pct: f64,
    pub lower_wick_pct: f64,
    pub range_pct: f64,
    pub is_green: bool,
}

pub fn candle_percentages(candles: &[Candle]) -> Vec<CandlePercent> {
    candles
        .iter()
        .map(|c| {
            if c.open == 0.0 {
                return CandlePercent {
                    body_pct: 0.0,
                    upper_wick_pct: 0.0,
                    lower_wick_pct: 0.0,
                    range_pct: 0.0,
                    is_green: c.is_green(),
                };
            }
            let top = c.open.max(c.close);
            let bottom = c.open.min(c.close);
            CandlePercent {
                body_pct: (c.close - c.open) / c.open * 100.0,
                upper_wick_pct: (c.high - top) / c.open * 100.0,
                lower_wick_pct: (bottom - c.low) / c.open * 100.0,
                range_pct: (c.high - c.low) / c.open * 100.0,
                is_green: c.is_green(),
            }
        })
        .collect()
}

/// Sliding-window average of |body %| centred on each candle.
/// Window is `max(5, n / 20)` candles, clipped at the series edges.
pub fn volatility_zones(percentages: &[CandlePercent]) -> Vec<f64> {
    let n = percentages.len();
    let half = (n / 20).max(5) / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half).min(n - 1);
            let slice = &percentages[start..=end];
            slice.iter().map(|p| p.body_pct.abs()).sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Heat overlay opacity per candle: four steps over the min-max normalised
/// volatility zone.
pub fn heat_opacities(percentages: &[CandlePercent]) -> Vec<f32> {
    let zones = volatility_zones(percentages);
    let max = zones.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = zones.iter().cloned().fold(f64::INFINITY, f64::min);
    let range = max - min;

    zones
        .iter()
        .map(|&z| {
            let normalized = if range > 1e-9 * max.abs().max(1.0) { (z - min) / range } else { 0.0 };
            if normalized > 0.7 {
                0.5
            } else if normalized > 0.4 {
                0.35
            } else if normalized > 0.2 {
                0.25
            } else {
                0.1
            }
        })
        .collect()
}

/// Largest number of fractional digits among the input prices.
pub fn price_decimals(candles: &[Candle]) -> usize {
    candles
        .iter()
        .flat_map(|c| [c.open, c.high, c.low, c.close])
        .map(fraction_digits)
        .max()
        .unwrap_or(0)
}

fn fraction_digits(value: f64) -> usize {
    // Shortest round-trip representation, e.g. 0.0123 -> "0.0123".
    let text = format!("{value}");
    match text.split_once('.') {
        Some((_, frac)) => frac.len().min(10),
        None => 0,
    }
}

/// Numbers printed in the chart's summary line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartSummary {
    pub candle_count: usize,
    pub highest_up_pct: f64,
    pub highest_down_pct: f64,
    pub avg_body_pct: f64,
    /// Full channel width as a percent of the regression price at the
    /// latest candle.
    pub channel_width_pct: f64,
    /// Top of the mini chart's scale (1.1 × largest |body %|).
    pub padded_max_pct: f64,
}

impl ChartSummary {
    /// `candles` must be oldest first.
    pub fn compute(candles: &[Candle], channel: Option<&RegressionChannel>) -> Self {
        let percentages = candle_percentages(candles);
        Self::from_parts(candles.len(), &percentages, channel)
    }

    pub(crate) fn from_parts(
        candle_count: usize,
        percentages: &[CandlePercent],
        channel: Option<&RegressionChannel>,
    ) -> Self {
        let highest_up_pct = percentages
            .iter()
            .filter(|p| p.is_green)
            .map(|p| p.body_pct)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .unwrap_or(0.0);
        let highest_down_pct = percentages
            .iter()
            .filter(|p| !p.is_green)
            .map(|p| p.body_pct)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
            .unwrap_or(0.0);
        let avg_body_pct = if percentages.is_empty() {
            0.0
        } else {
            percentages.iter().map(|p| p.body_pct.abs()).sum::<f64>() / percentages.len() as f64
        };
        let max_abs = percentages.iter().map(|p| p.body_pct.abs()).fold(0.0, f64::max);

        let channel_width_pct = channel
            .filter(|_| candle_count > 0)
            .map(|ch| {
                let last = (candle_count - 1) as f64;
                let center = ch.center(last);
                if center == 0.0 {
                    0.0
                } else {
                    (ch.upper(last) - ch.lower(last)) / center * 100.0
                }
            })
            .unwrap_or(0.0);

        Self {
            candle_count,
            highest_up_pct,
            highest_down_pct,
            avg_body_pct,
            channel_width_pct,
            padded_max_pct: max_abs * 1.1,
        }
    }

    pub fn line(&self) -> String {
        format!(
            "Highest UP candle {:.2}% - Highest DOWN candle {:.2}% - Average candle movement {:.2}% - Channel Width Percentage: {:.2}%",
            self.highest_up_pct, self.highest_down_pct, self.avg_body_pct, self.channel_width_pct
        )
    }
}

/// Population-std-dev channel over the closes, as drawn on the chart.
pub fn chart_channel(candles: &[Candle]) -> Option<RegressionChannel> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    RegressionChannel::fit(&closes, ChannelWidth::PopulationStdDev)
}
