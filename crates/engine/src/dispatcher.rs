use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use chart::{ChartRenderer, ChartSummary, RenderedChart};
use common::{Alert, Detection, Error, Notifier, Result};

const DEFAULT_PRICE_DECIMALS: u32 = 4;
pub const SCAN_FINISHED: &str = "🔍 Scan finished";

/// Receives gated alerts from the scheduler, renders a chart for each and
/// hands it to the notifier. The only component that talks to the notifier
/// for alerts.
pub struct AlertDispatcher {
    alert_rx: mpsc::Receiver<Alert>,
    notifier: Arc<dyn Notifier>,
    renderer: ChartRenderer,
}

impl AlertDispatcher {
    pub fn new(
        alert_rx: mpsc::Receiver<Alert>,
        notifier: Arc<dyn Notifier>,
        renderer: ChartRenderer,
    ) -> Self {
        Self { alert_rx, notifier, renderer }
    }

    /// Run the dispatcher loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("AlertDispatcher running");
        while let Some(alert) = self.alert_rx.recv().await {
            match alert {
                Alert::Detection { detection, is_final } => {
                    self.dispatch_detection(detection, is_final).await;
                }
                Alert::ScanFinished => {
                    let text = format!("{SCAN_FINISHED}\n\nNo crossing signals found in this scan.");
                    if let Err(e) = self.notifier.send_text(&text).await {
                        error!(error = %e, "Failed to send scan-finished message");
                    }
                }
            }
        }
        warn!("AlertDispatcher: alert channel closed");
    }

    async fn dispatch_detection(&self, detection: Detection, is_final: bool) {
        info!(
            symbol = %detection.symbol,
            kind = %detection.kind,
            gain = detection.potential_gain_pct,
            is_final,
            "Sending alert"
        );

        let chart = match self.render(&detection).await {
            Ok(chart) => chart,
            Err(e) => {
                error!(symbol = %detection.symbol, error = %e, "Chart render failed, alert skipped");
                return;
            }
        };

        let caption = caption(&detection, &chart.summary, is_final);
        if let Err(e) = self.notifier.send_photo(chart.png, &caption).await {
            error!(symbol = %detection.symbol, error = %e, "Alert delivery failed");
        }
    }

    /// Rasterizing is CPU-bound; keep it off the async workers.
    async fn render(&self, detection: &Detection) -> Result<RenderedChart> {
        let renderer = self.renderer.clone();
        let candles = detection.candles.clone();
        tokio::task::spawn_blocking(move || renderer.render(&candles))
            .await
            .map_err(|e| Error::Render(format!("render task failed: {e}")))?
    }
}

/// Alert caption: symbol and pattern, low/high reference prices at the
/// instrument's quote precision, average candle body and potential gain.
pub fn caption(detection: &Detection, summary: &ChartSummary, is_final: bool) -> String {
    let decimals = detection.price_scale.unwrap_or(DEFAULT_PRICE_DECIMALS) as usize;
    let low = detection.last_price * 0.2;
    let high = detection.last_price * 1.8;

    let mut text = format!(
        "{} ({})\nLP {low:.decimals$} - HP {high:.decimals$}\nAvg candle: {:.2}%\nPotential gain: {:.2}%",
        detection.symbol, detection.kind, summary.avg_body_pct, detection.potential_gain_pct,
    );
    if is_final {
        text.push_str("\n\n");
        text.push_str(SCAN_FINISHED);
    }
    text
}
