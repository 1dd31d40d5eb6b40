use std::sync::Arc;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::info;

use common::{DataMode, ScanCommand, ScannerState};
use engine::SchedulerHandle;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub scheduler: SchedulerHandle,
    pub data_mode: DataMode,
    pub dashboard_port: u16,
}

/// Telegram bot commands exposed to the operator.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "ScanBot commands:")]
pub enum Command {
    #[command(description = "Start scanning")]
    Start,
    #[command(description = "Stop scanning and discard the day's state")]
    Stop,
    #[command(description = "Show scanner status")]
    Status,
    #[command(description = "Run a full scan now")]
    ScanNow,
    #[command(description = "List commands")]
    Help,
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(bot: Bot, deps: BotDeps) {
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Stop].endpoint(handle_stop))
        .branch(case![Command::Status].endpoint(handle_status))
        .branch(case![Command::ScanNow].endpoint(handle_scan_now))
        .branch(case![Command::Help].endpoint(handle_help));

    Update::filter_message().branch(command_handler)
}

async fn handle_start(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    if deps.scheduler.state().await == ScannerState::Running {
        bot.send_message(msg.chat.id, "Scanner is already running.").await?;
    } else {
        deps.scheduler.send(ScanCommand::Start).await;
        bot.send_message(msg.chat.id, "Scanner started.").await?;
    }
    Ok(())
}

async fn handle_stop(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    if deps.scheduler.state().await == ScannerState::Stopped {
        bot.send_message(msg.chat.id, "Scanner is already stopped.").await?;
    } else {
        deps.scheduler.send(ScanCommand::Stop).await;
        bot.send_message(msg.chat.id, "Scanner stopped. Scan state cleared.").await?;
    }
    Ok(())
}

async fn handle_status(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = deps.scheduler.state().await;
    let text = status_text(state, deps.data_mode, deps.dashboard_port);
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_scan_now(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    if deps.scheduler.state().await != ScannerState::Running {
        bot.send_message(msg.chat.id, "Scanner is stopped. Send /start first.").await?;
    } else {
        deps.scheduler.send(ScanCommand::ScanNow).await;
        bot.send_message(msg.chat.id, "Full scan queued.").await?;
    }
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
    Ok(())
}

pub fn status_text(state: ScannerState, mode: DataMode, dashboard_port: u16) -> String {
    format!(
        "ScanBot Status\n\
         Scanner: {state}\n\
         Data: {mode}\n\
         Dashboard: port {dashboard_port}"
    )
}
