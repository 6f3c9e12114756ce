use std::sync::Arc;

use teloxide::{
    dispatching::UpdateHandler,
    prelude::*,
    types::{ParseMode, User},
    utils::command::BotCommands,
};
use tokio::sync::watch;
use tracing::{info, warn};

use common::Error;
use store::SqliteStore;

use crate::messages;
use crate::notifier::send_alert;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub store: SqliteStore,
}

/// Commands available to every chat user.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Price tracker commands:")]
pub enum Command {
    #[command(description = "Subscribe and show the welcome message")]
    Start,
    #[command(description = "Get your account details")]
    Acc,
    #[command(description = "Turn price alerts on or off")]
    Sw,
    #[command(description = "Set the minimum hourly move in % that triggers an alert (default: 1)")]
    Prc(String),
    #[command(description = "Show this help")]
    Help,
}

/// Start the Telegram bot in long-polling mode. Returns once `shutdown` flips to true.
pub async fn start_bot(bot: Bot, deps: BotDeps, mut shutdown: watch::Receiver<bool>) {
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        if shutdown.wait_for(|stop| *stop).await.is_ok() {
            if let Ok(done) = token.shutdown() {
                done.await;
            }
        }
    });

    dispatcher.dispatch().await;
    info!("Telegram bot stopped");
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Acc].endpoint(handle_account))
        .branch(case![Command::Sw].endpoint(handle_switch))
        .branch(case![Command::Prc(value)].endpoint(handle_percent))
        .branch(case![Command::Help].endpoint(handle_help));

    Update::filter_message()
        .filter_map(|msg: Message| msg.from().cloned())
        .branch(command_handler)
}

async fn reply(bot: &Bot, msg: &Message, text: impl Into<String>) -> HandlerResult {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn handle_start(bot: Bot, msg: Message, user: User, deps: Arc<BotDeps>) -> HandlerResult {
    let id = user.id.0 as i64;
    let username = user.username.as_deref();

    if deps.store.register(id, username).await? {
        info!(user_id = id, username = ?username, "New subscriber");
        let admins = deps.store.admin_ids().await?;
        let notice = messages::new_user_notice(id, username, user.is_bot);
        send_alert(&bot, &admins, &notice).await;
    }

    reply(&bot, &msg, messages::welcome(username)).await
}

async fn handle_account(bot: Bot, msg: Message, user: User, deps: Arc<BotDeps>) -> HandlerResult {
    match deps.store.profile(user.id.0 as i64).await? {
        Some(profile) => reply(&bot, &msg, messages::profile(&profile)).await,
        None => reply(&bot, &msg, messages::NOT_REGISTERED).await,
    }
}

async fn handle_switch(bot: Bot, msg: Message, user: User, deps: Arc<BotDeps>) -> HandlerResult {
    match deps.store.toggle_notifications(user.id.0 as i64).await? {
        Some(enabled) => {
            info!(user_id = user.id.0, enabled, "Alerts toggled");
            reply(&bot, &msg, messages::toggled(enabled)).await
        }
        None => reply(&bot, &msg, messages::NOT_REGISTERED).await,
    }
}

async fn handle_percent(
    bot: Bot,
    msg: Message,
    user: User,
    value: String,
    deps: Arc<BotDeps>,
) -> HandlerResult {
    let Some(percent) = messages::parse_percent(&value) else {
        return reply(&bot, &msg, messages::INCORRECT_PERCENT).await;
    };

    match deps.store.set_alert_percent(user.id.0 as i64, percent).await {
        Ok(true) => reply(&bot, &msg, messages::percent_updated(percent)).await,
        Ok(false) => reply(&bot, &msg, messages::NOT_REGISTERED).await,
        Err(Error::Validation(reason)) => {
            warn!(user_id = user.id.0, reason = %reason, "Rejected alert percent");
            reply(&bot, &msg, messages::INCORRECT_PERCENT).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}
