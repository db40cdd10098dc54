pub mod callbacks;
pub mod commands;
pub mod common;
pub mod messages;
pub mod texts;
pub mod utils;

pub use commands::Command;

use tokio::time::Instant;

use crate::bot_state::BotState;
use crate::error::BotError;
use crate::messenger::{IncomingCallback, IncomingMessage, OutgoingMessage};
use crate::protocol::Action;

/// Обычное сообщение или команда.
///
/// Сессия чата заблокирована на весь ход. Продолжение, которое никто
/// не поставил заново за этот ход, снимается.
pub async fn dispatch_message(state: &BotState, msg: IncomingMessage, command: Option<Command>) {
    let shared = state.sessions.get_or_create(msg.chat_id).await;
    let mut session = shared.lock().await;
    session.touch(Instant::now());
    let generation = session.generation();

    let (handler, result) = match command {
        Some(command) => (command.name(), commands::handle(state, &mut session, &msg, command).await),
        None => match session.take() {
            Some(continuation) => {
                let name = continuation.name();
                (name, messages::resume(state, &mut session, &msg, continuation).await)
            }
            None => ("unknown", messages::unknown(state, &msg).await),
        },
    };

    session.expire_unless_reinstalled(generation);
    drop(session);

    if let Err(e) = result {
        report(state, msg.chat_id, handler, e).await;
    }
}

/// Нажатие inline-кнопки. Неизвестные и битые токены только логируются.
pub async fn dispatch_callback(state: &BotState, q: IncomingCallback) {
    if let Err(e) = state.messenger.answer_callback(&q.id).await {
        log::warn!("⚠️ Failed to answer callback {}: {}", q.id, e);
    }

    let action = match Action::decode(&q.data) {
        Ok(action) => action,
        Err(e) => {
            log::warn!("⚠️ Dropped callback from chat {}: {}", q.chat_id, e);
            return;
        }
    };

    let shared = state.sessions.get_or_create(q.chat_id).await;
    let mut session = shared.lock().await;
    session.touch(Instant::now());

    let handler = action.command();
    let result = callbacks::handle(state, &mut session, &q, action).await;
    drop(session);

    if let Err(e) = result {
        report(state, q.chat_id, handler, e).await;
    }
}

async fn report(state: &BotState, chat_id: i64, handler: &str, error: BotError) {
    log::error!("❌ Handler {} failed for chat {}: {}", handler, chat_id, error);

    if let Err(e) = state
        .messenger
        .send(chat_id, OutgoingMessage::text(texts::INTERNAL_ERROR))
        .await
    {
        log::error!("❌ Failed to send error message to chat {}: {}", chat_id, e);
    }
}
