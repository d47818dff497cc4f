use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::info;

use herald_core::{
    commands::CommandRouter,
    config::Config,
    messaging::{
        port::Notifier,
        throttled::{ThrottleConfig, ThrottledNotifier},
    },
    store::UserStore,
    utils::AuditLogger,
};

use crate::handlers;
use crate::TelegramNotifier;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<CommandRouter>,
    pub notifier: Arc<dyn Notifier>,
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn UserStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!(bot = %me.username(), "herald started");
    }
    info!(
        admin = cfg.admin_username.as_deref().unwrap_or("<none>"),
        broadcast_concurrency = cfg.broadcast_concurrency,
        "configuration loaded"
    );

    // Throttle outbound calls to stay under Telegram's flood limits; the adapter
    // still retries a single RetryAfter.
    let raw: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone()));
    let notifier: Arc<dyn Notifier> =
        Arc::new(ThrottledNotifier::new(raw, ThrottleConfig::default()));

    let router = CommandRouter::new(&cfg, store, notifier.clone()).with_audit(AuditLogger::new(
        cfg.audit_log_path.clone(),
        cfg.audit_log_json,
    ));

    let state = Arc::new(AppState {
        router: Arc::new(router),
        notifier,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_inline_query().endpoint(handlers::handle_inline_query))
        .branch(Update::filter_chosen_inline_result().endpoint(handlers::handle_chosen_inline))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
