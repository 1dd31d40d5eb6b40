//! PNG candlestick charts for alert messages.
//!
//! Layout: a candlestick panel with the regression channel and price labels,
//! a mini panel of per-candle body movement with a volatility heat overlay,
//! then a one-line summary and local-time labels along the bottom.

mod canvas;
pub mod stats;

use analysis::RegressionChannel;
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use common::{Candle, Error, Result};
use tiny_skia::Color;
use tracing::debug;

use canvas::{rgb, rgba, Align, Canvas};
pub use stats::{
    candle_percentages, chart_channel, heat_opacities, price_decimals, volatility_zones,
    CandlePercent, ChartSummary,
};

const PAD_TOP: f32 = 40.0;
const PAD_RIGHT: f32 = 80.0;
const PAD_BOTTOM: f32 = 120.0;
const PAD_LEFT: f32 = 40.0;
const MINI_GAP: f32 = 20.0;
const PRICE_LABELS: usize = 8;
const MAX_TIME_LABELS: usize = 10;

/// A rendered chart plus the figures printed on it.
#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub png: Vec<u8>,
    pub summary: ChartSummary,
}

#[derive(Debug, Clone)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
    tz: Tz,
}

impl ChartRenderer {
    pub fn new(width: u32, height: u32, tz: Tz) -> Self {
        Self { width, height, tz }
    }

    /// 1200×800 with time labels in `tz`.
    pub fn with_timezone(tz: Tz) -> Self {
        Self::new(1200, 800, tz)
    }

    pub fn render(&self, candles: &[Candle]) -> Result<RenderedChart> {
        self.render_with_channel(candles, None)
    }

    /// Render with a precomputed channel. The channel must be fitted on the
    /// same candles, indexed oldest first; when `None` a population-std-dev
    /// channel is fitted on the closes.
    pub fn render_with_channel(
        &self,
        candles: &[Candle],
        channel: Option<RegressionChannel>,
    ) -> Result<RenderedChart> {
        if candles.is_empty() {
            return Err(Error::Render("no candle data".into()));
        }
        let candles = common::types::normalize_candles(candles.to_vec());
        let channel = channel.or_else(|| chart_channel(&candles));
        let percentages = candle_percentages(&candles);
        let summary = ChartSummary::from_parts(candles.len(), &percentages, channel.as_ref());

        let layout = Layout::new(self.width as f32, self.height as f32, candles.len());
        let mut canvas = Canvas::new(self.width, self.height)?;
        canvas.fill(Color::BLACK);

        let scale = PriceScale::new(&candles, &layout);
        if let Some(channel) = &channel {
            draw_channel(&mut canvas, channel, candles.len(), &layout, &scale);
        }
        self.draw_candles(&mut canvas, &candles, &layout, &scale);
        draw_price_labels(&mut canvas, &layout, &scale, price_decimals(&candles));
        draw_mini_chart(&mut canvas, &percentages, &layout, summary.padded_max_pct);

        canvas.text(
            &summary.line(),
            layout.left + layout.chart_w / 2.0,
            layout.summary_y,
            Color::WHITE,
            Align::Center,
            1.0,
        );
        self.draw_time_labels(&mut canvas, &candles, &layout);

        let png = canvas.encode_png()?;
        debug!(candles = candles.len(), bytes = png.len(), "chart rendered");
        Ok(RenderedChart { png, summary })
    }

    fn draw_candles(&self, canvas: &mut Canvas, candles: &[Candle], layout: &Layout, scale: &PriceScale) {
        let green = rgb(0x00, 0xff, 0x00);
        let red = rgb(0xff, 0x00, 0x00);

        for (i, candle) in candles.iter().enumerate() {
            let x = layout.x_center(i);
            let color = if candle.is_green() { green } else { red };

            canvas.line(
                (x, scale.y(candle.high)),
                (x, scale.y(candle.low)),
                color,
                1.0,
                None,
            );

            let open_y = scale.y(candle.open);
            let close_y = scale.y(candle.close);
            canvas.rect(
                x - layout.candle_w / 2.0,
                open_y.min(close_y),
                layout.candle_w,
                (open_y - close_y).abs(),
                color,
            );
        }
    }

    fn draw_time_labels(&self, canvas: &mut Canvas, candles: &[Candle], layout: &Layout) {
        let n = candles.len();
        let step = (n / MAX_TIME_LABELS.min(n)).max(1);
        let y = self.height as f32 - 15.0;

        for i in (0..n).step_by(step) {
            let Some(ts) = Utc.timestamp_millis_opt(candles[i].timestamp).single() else {
                continue;
            };
            let label = ts.with_timezone(&self.tz).format("%d/%m %H:%M").to_string();
            canvas.text(&label, layout.x_center(i), y, Color::WHITE, Align::Center, 1.0);
        }
    }
}

fn draw_channel(
    canvas: &mut Canvas,
    channel: &RegressionChannel,
    n: usize,
    layout: &Layout,
    scale: &PriceScale,
) {
    let first = 0.0;
    let last = (n - 1) as f64;
    let (x0, x1) = (layout.x_center(0), layout.x_center(n - 1));

    canvas.line(
        (x0, scale.y(channel.center(first))),
        (x1, scale.y(channel.center(last))),
        rgb(0x44, 0x44, 0xff),
        1.0,
        Some([5.0, 5.0]),
    );
    let bounds = [
        (channel.upper(first), channel.upper(last)),
        (channel.lower(first), channel.lower(last)),
    ];
    for (start, end) in bounds {
        canvas.line(
            (x0, scale.y(start)),
            (x1, scale.y(end)),
            Color::WHITE,
            2.0,
            None,
        );
    }
}

fn draw_price_labels(canvas: &mut Canvas, layout: &Layout, scale: &PriceScale, decimals: usize) {
    let x = layout.left + layout.chart_w + 5.0;
    for i in 0..=PRICE_LABELS {
        let price = scale.min + (scale.max - scale.min) * i as f64 / PRICE_LABELS as f64;
        canvas.text(
            &format!("{price:.decimals$}"),
            x,
            scale.y(price),
            Color::WHITE,
            Align::Left,
            1.0,
        );
    }
}

fn draw_mini_chart(canvas: &mut Canvas, percentages: &[CandlePercent], layout: &Layout, padded_max: f64) {
    let top = layout.mini_y;
    let bottom = layout.mini_y + layout.mini_h;

    canvas.rect(layout.left, top, layout.chart_w, layout.mini_h, rgb(0x11, 0x11, 0x11));

    canvas.line(
        (layout.left, bottom),
        (layout.left + layout.chart_w, bottom),
        rgb(0x44, 0x44, 0x44),
        1.0,
        Some([2.0, 2.0]),
    );

    let green = rgb(0x00, 0xff, 0x00);
    let red = rgb(0xff, 0x00, 0x00);
    for (i, p) in percentages.iter().enumerate() {
        if padded_max <= 0.0 {
            break;
        }
        let h = (p.body_pct.abs() / padded_max) as f32 * layout.mini_h;
        if h <= 0.0 {
            continue;
        }
        let x = layout.x_center(i) - layout.candle_w / 2.0;
        canvas.rect(x, bottom - h, layout.candle_w, h, if p.is_green { green } else { red });
    }

    // Heat overlay goes on top of the bars.
    for (i, opacity) in heat_opacities(percentages).into_iter().enumerate() {
        canvas.rect(
            layout.left + i as f32 * layout.slot_w,
            top,
            layout.slot_w,
            layout.mini_h,
            rgba(255, 165, 0, opacity),
        );
    }

    let label_x = layout.left + layout.chart_w + 5.0;
    canvas.text(&format!("{padded_max:.2}%"), label_x, top + 4.0, Color::WHITE, Align::Left, 1.0);
    canvas.text("0%", label_x, bottom - 4.0, Color::WHITE, Align::Left, 1.0);
}

/// Pixel geometry derived from the canvas size and candle count.
struct Layout {
    left: f32,
    top: f32,
    chart_w: f32,
    chart_h: f32,
    mini_y: f32,
    mini_h: f32,
    summary_y: f32,
    slot_w: f32,
    candle_w: f32,
}

impl Layout {
    fn new(width: f32, height: f32, n: usize) -> Self {
        let chart_w = width - PAD_LEFT - PAD_RIGHT;
        let inner_h = height - PAD_TOP - PAD_BOTTOM;
        let chart_h = inner_h * 0.875;
        let mini_h = inner_h * 0.125;
        let mini_y = PAD_TOP + chart_h + MINI_GAP;
        let slot_w = chart_w / n as f32;

        Self {
            left: PAD_LEFT,
            top: PAD_TOP,
            chart_w,
            chart_h,
            mini_y,
            mini_h,
            summary_y: mini_y + mini_h + 30.0,
            slot_w,
            candle_w: (slot_w * 0.8).floor().max(2.0),
        }
    }

    fn x_center(&self, i: usize) -> f32 {
        self.left + i as f32 * self.slot_w + self.slot_w / 2.0
    }
}

/// Maps prices onto the main panel with 5% headroom on both sides.
struct PriceScale {
    min: f64,
    max: f64,
    top: f32,
    height: f32,
}

impl PriceScale {
    fn new(candles: &[Candle], layout: &Layout) -> Self {
        let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let mut range = high - low;
        if range <= 0.0 {
            range = (high.abs() * 0.01).max(1e-9);
        }
        let pad = range * 0.05;
        Self {
            min: low - pad,
            max: high + pad,
            top: layout.top,
            height: layout.chart_h,
        }
    }

    fn y(&self, price: f64) -> f32 {
        let frac = (price - self.min) / (self.max - self.min);
        self.top + self.height - (frac as f32) * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis::ChannelWidth;

    fn series(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.3).sin() * 2.0;
                Candle {
                    timestamp: 1_700_000_000_000 + i as i64 * 60_000,
                    open: base,
                    high: base + 0.5,
                    low: base - 0.5,
                    close: base + if i % 2 == 0 { 0.25 } else { -0.25 },
                    volume: 10.0,
                }
            })
            .collect()
    }

    fn renderer() -> ChartRenderer {
        ChartRenderer::with_timezone("Etc/GMT-2".parse().unwrap())
    }

    #[test]
    fn renders_png() {
        let chart = renderer().render(&series(120)).unwrap();
        assert_eq!(&chart.png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(chart.summary.candle_count, 120);
        assert!(chart.summary.channel_width_pct > 0.0);
    }

    #[test]
    fn newest_first_input_is_normalized() {
        let mut candles = series(30);
        let expected = ChartSummary::compute(&candles, chart_channel(&candles).as_ref());
        candles.reverse();
        let chart = renderer().render(&candles).unwrap();
        assert!((chart.summary.channel_width_pct - expected.channel_width_pct).abs() < 1e-9);
    }

    #[test]
    fn single_flat_candle_still_renders() {
        let candle = Candle {
            timestamp: 1_700_000_000_000,
            open: 5.0,
            high: 5.0,
            low: 5.0,
            close: 5.0,
            volume: 0.0,
        };
        let chart = renderer().render(&[candle]).unwrap();
        assert!(!chart.png.is_empty());
        assert_eq!(chart.summary.channel_width_pct, 0.0);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(renderer().render(&[]), Err(Error::Render(_))));
    }

    #[test]
    fn zero_size_canvas_is_an_error() {
        let r = ChartRenderer::new(0, 0, chrono_tz::UTC);
        assert!(r.render(&series(5)).is_err());
    }

    fn pixel(png: &[u8], x: f32, y: f32) -> (u8, u8, u8) {
        let pixmap = tiny_skia::Pixmap::decode_png(png).unwrap();
        let p = pixmap.pixel(x as u32, y as u32).unwrap();
        (p.red(), p.green(), p.blue())
    }

    #[test]
    fn channel_is_drawn_behind_candle_bodies() {
        let candles: Vec<Candle> = (0..11)
            .map(|i| Candle {
                timestamp: 1_700_000_000_000 + i * 60_000,
                open: 99.0,
                high: 102.0,
                low: 98.0,
                close: 101.0,
                volume: 1.0,
            })
            .collect();
        // flat channel through the middle of every body
        let channel = RegressionChannel::fit(&[100.0; 11], ChannelWidth::PopulationStdDev);
        let chart = renderer().render_with_channel(&candles, channel).unwrap();

        let layout = Layout::new(1200.0, 800.0, candles.len());
        let scale = PriceScale::new(&candles, &layout);
        assert_eq!(pixel(&chart.png, layout.x_center(5), scale.y(100.0)), (0, 255, 0));
    }

    #[test]
    fn heat_overlay_tints_mini_bars() {
        let candles: Vec<Candle> = (0..40)
            .map(|i| Candle {
                timestamp: 1_700_000_000_000 + i * 60_000,
                open: 100.0,
                high: 100.0 + 0.1 * (i + 1) as f64 + 0.1,
                low: 99.9,
                close: 100.0 + 0.1 * (i + 1) as f64,
                volume: 1.0,
            })
            .collect();
        let last = candles.len() - 1;
        let heat = heat_opacities(&candle_percentages(&candles));
        assert!(heat[last] > 0.0);

        let chart = renderer().render(&candles).unwrap();
        let layout = Layout::new(1200.0, 800.0, candles.len());
        let (r, g, _) = pixel(&chart.png, layout.x_center(last), layout.mini_y + layout.mini_h - 3.0);
        // green bar blended with orange
        assert!(r > 0);
        assert!(g > 0);
    }
}
