use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use teloxide::{prelude::*, utils::command::BotCommands};
use tokio::sync::oneshot;
use tokio::time;

mod bot_state;
mod calendar;
mod config;
mod crm;
mod database;
mod error;
mod handlers;
mod messenger;
mod models;
mod protocol;
#[cfg(test)]
mod testing;

use crate::bot_state::{BotState, RealClock, SessionStore};
use crate::config::AppConfig;
use crate::crm::{CrmClient, DentalProClient, FixtureCrm};
use crate::database::{Database, InMemoryRepository, Repository};
use crate::handlers::Command;
use crate::messenger::{IncomingCallback, IncomingMessage, TelegramMessenger};

async fn command_handler(msg: Message, cmd: Command, state: BotState) -> ResponseResult<()> {
    if let Some(incoming) = IncomingMessage::from_telegram(&msg) {
        handlers::dispatch_message(&state, incoming, Some(cmd)).await;
    }
    Ok(())
}

async fn message_handler(msg: Message, state: BotState) -> ResponseResult<()> {
    if let Some(incoming) = IncomingMessage::from_telegram(&msg) {
        handlers::dispatch_message(&state, incoming, None).await;
    }
    Ok(())
}

async fn callback_handler(q: CallbackQuery, state: BotState) -> ResponseResult<()> {
    match IncomingCallback::from_telegram(&q) {
        Some(incoming) => handlers::dispatch_callback(&state, incoming).await,
        None => log::warn!("⚠️ Callback {} without message or data", q.id),
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                log::warn!("Can't listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// `true`, если обработчики не успели завершиться и диспетчер брошен.
async fn dispatch_until_timeout(dispatch: impl Future<Output = ()>, timed_out: oneshot::Receiver<()>) -> bool {
    tokio::select! {
        _ = dispatch => false,
        Ok(()) = timed_out => true,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Загружаем .env и инициализируем логирование
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting clinic booking bot...");

    let config = AppConfig::from_env().context("reading configuration")?;

    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => {
            let db = Database::new(url).await.context("connecting to database")?;
            db.init().await.context("initializing schema")?;
            log::info!("✅ Database initialized");
            Arc::new(db)
        }
        None => {
            log::warn!("DATABASE_URL is not set, using in-memory storage");
            Arc::new(InMemoryRepository::new())
        }
    };

    let crm: Arc<dyn CrmClient> = if config.crm.test_mode {
        log::warn!("🧪 CRM_TEST_MODE is on, using bundled CRM fixtures");
        Arc::new(FixtureCrm::bundled().context("loading CRM fixtures")?)
    } else {
        Arc::new(DentalProClient::new(&config.crm).context("building CRM client")?)
    };

    let bot = Bot::new(config.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    let state = BotState {
        sessions: sessions.clone(),
        repo,
        crm,
        messenger: Arc::new(TelegramMessenger::new(bot.clone())),
        settings: config.booking.clone(),
        clock: Arc::new(RealClock),
    };

    // Фоновая очистка простаивающих сессий
    let sweeper = tokio::spawn(sessions.run_sweeper(config.session_sweep_interval));

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    let shutdown = dispatcher.shutdown_token();
    let (timed_out_tx, timed_out_rx) = oneshot::channel();
    let shutdown_timeout = config.shutdown_timeout;
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("🛑 Shutdown requested, waiting for running handlers...");
        match shutdown.shutdown() {
            Ok(done) => {
                if time::timeout(shutdown_timeout, done).await.is_err() {
                    let _ = timed_out_tx.send(());
                }
            }
            Err(e) => log::warn!("Dispatcher is not running: {}", e),
        }
    });

    log::info!("🚀 Starting dispatcher...");
    let timed_out = dispatch_until_timeout(dispatcher.dispatch(), timed_out_rx).await;

    sweeper.abort();
    if timed_out {
        log::warn!("Handlers didn't finish in {:?}, stopping anyway", shutdown_timeout);
    }
    log::info!("👋 Bot stopped");
    if timed_out {
        std::process::exit(1);
    }
    Ok(())
}
