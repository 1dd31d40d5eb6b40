use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use analysis::ScanConfig;
use chart::ChartRenderer;
use common::{Alert, Config, DataMode, MarketDataGateway, Notifier};
use engine::{AlertDispatcher, BybitClient, ScanScheduler};
use replay::ReplayGateway;
use telegram_alerts::{start_bot, BotDeps, TelegramNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let scan_cfg = ScanConfig::load(&cfg.scan_config_path)
        .with_context(|| format!("loading {}", cfg.scan_config_path))?;
    info!(mode = %cfg.data_mode, config = %cfg.scan_config_path, "ScanBot starting");

    // ── Market data (injected based on DATA_MODE) ─────────────────────────────
    let gateway: Arc<dyn MarketDataGateway> = match cfg.data_mode {
        DataMode::Live => {
            info!(base_url = %cfg.bybit_base_url, "Live mode, using BybitClient");
            Arc::new(BybitClient::new(cfg.bybit_base_url.clone())?)
        }
        DataMode::Replay => {
            let path = cfg.replay_path.as_deref().context("REPLAY_PATH is not set")?;
            info!(path, "Replay mode, using ReplayGateway");
            Arc::new(ReplayGateway::from_file(path)?)
        }
    };

    // ── Scheduler ─────────────────────────────────────────────────────────────
    let tz = scan_cfg.timezone()?;
    let (alert_tx, alert_rx) = mpsc::channel::<Alert>(128);
    let (scheduler, handle) = ScanScheduler::new(gateway, scan_cfg, alert_tx)?;

    // ── Telegram ──────────────────────────────────────────────────────────────
    let bot = teloxide::Bot::new(cfg.telegram_token.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone(), cfg.telegram_chat_id));
    let dispatcher = AlertDispatcher::new(alert_rx, notifier, ChartRenderer::with_timezone(tz));
    let bot_deps = BotDeps {
        scheduler: handle.clone(),
        data_mode: cfg.data_mode,
        dashboard_port: cfg.dashboard_port,
    };

    // ── Dashboard ─────────────────────────────────────────────────────────────
    let api_state = api::AppState::new(handle, cfg.data_mode);
    api::track_events(&api_state);

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    let port = cfg.dashboard_port;
    tokio::spawn(scheduler.run());
    tokio::spawn(dispatcher.run());
    tokio::spawn(start_bot(bot, bot_deps));
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Dashboard server stopped");
        }
    });

    info!("All subsystems started. Send /start in Telegram to begin scanning.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting.");
    Ok(())
}
