use std::sync::Arc;

use teloxide::Bot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{BinanceFeed, Tracker};
use store::SqliteStore;
use strategy::{EvaluatorConfig, SignalEvaluator};
use telegram_ctrl::{start_bot, BotDeps, TelegramNotifier};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(pair = %cfg.trading_pair, "Price tracker starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to open database: {e}"));
    for &admin_id in &cfg.admin_ids {
        store
            .upsert_admin(admin_id)
            .await
            .unwrap_or_else(|e| panic!("Failed to register admin {admin_id}: {e}"));
    }
    info!(admins = cfg.admin_ids.len(), "Admins registered");

    // ── Signal evaluator ─────────────────────────────────────────────────────
    let evaluator = SignalEvaluator::new(EvaluatorConfig::load(&cfg.signal_config_path));

    // ── Market data feed ─────────────────────────────────────────────────────
    let feed = BinanceFeed::new(&cfg.feed())
        .unwrap_or_else(|e| panic!("Failed to build market data client: {e}"));
    if cfg.feed_proxy.is_some() {
        info!("Market data requests go through the configured proxy");
    }

    // ── Tracker ───────────────────────────────────────────────────────────────
    let bot = Bot::new(cfg.telegram_token.clone());
    let store_handle = Arc::new(store.clone());
    let (tracker, handle) = Tracker::new(
        cfg.tracker(),
        Arc::new(feed),
        Arc::new(evaluator),
        store_handle.clone(),
        store_handle,
        Arc::new(TelegramNotifier::new(bot.clone())),
    );

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    let tracker_task = tokio::spawn(Arc::new(tracker).supervise());
    let bot_task = tokio::spawn(start_bot(bot, BotDeps { store }, handle.subscribe()));

    info!("All subsystems started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received. Stopping.");
    handle.shutdown();

    let (tracker_done, bot_done) = tokio::join!(tracker_task, bot_task);
    for (task, result) in [("tracker", tracker_done), ("bot", bot_done)] {
        if let Err(e) = result {
            error!(task, error = %e, "Task ended abnormally");
        }
    }
    info!("Exiting.");
}
