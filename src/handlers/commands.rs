use teloxide::utils::command::BotCommands;

use crate::bot_state::BotState;
use crate::error::BotError;
use crate::handlers::common::{self, is_upcoming};
use crate::handlers::{texts, utils};
use crate::messenger::{IncomingMessage, Markup, OutgoingMessage};
use crate::models::{Continuation, Resume, Session, User};

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "начать работу с ботом")]
    Start,
    #[command(description = "записаться на прием")]
    Record,
    #[command(rename = "myrecords", description = "мои записи")]
    MyRecords,
    #[command(description = "удалить запись")]
    DeleteRecord,
    #[command(description = "изменить имя")]
    ChangeName,
    #[command(description = "отменить действие")]
    Cancel,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Record => "record",
            Command::MyRecords => "myrecords",
            Command::DeleteRecord => "delete_record",
            Command::ChangeName => "change_name",
            Command::Cancel => "cancel",
        }
    }
}

pub async fn handle(
    state: &BotState,
    session: &mut Session,
    msg: &IncomingMessage,
    command: Command,
) -> Result<(), BotError> {
    log::info!("📩 /{} from chat {}", command.name(), msg.chat_id);

    match command {
        Command::Start => handle_start(state, msg).await,
        Command::Record => handle_record(state, session, msg).await,
        Command::MyRecords => handle_my_records(state, session, msg).await,
        Command::DeleteRecord => handle_delete_record(state, session, msg).await,
        Command::ChangeName => handle_change_name(state, session, msg.chat_id).await,
        Command::Cancel => handle_cancel(state, session, msg.chat_id).await,
    }
}

async fn handle_start(state: &BotState, msg: &IncomingMessage) -> Result<(), BotError> {
    state.repo.get_or_create_user(msg.user_id).await?;
    state.messenger.send(msg.chat_id, OutgoingMessage::text(texts::WELCOME)).await?;
    Ok(())
}

async fn handle_record(state: &BotState, session: &mut Session, msg: &IncomingMessage) -> Result<(), BotError> {
    if state.repo.get_user(msg.user_id).await?.is_none() {
        return common::request_phone(state, session, msg.chat_id, Resume::Record).await;
    }
    send_doctors(state, msg.chat_id).await
}

/// Список врачей новым сообщением: с него начинается черновик записи.
pub async fn send_doctors(state: &BotState, chat_id: i64) -> Result<(), BotError> {
    let screen = common::doctors_screen(state).await?;
    state.messenger.send(chat_id, screen).await?;
    Ok(())
}

async fn handle_my_records(state: &BotState, session: &mut Session, msg: &IncomingMessage) -> Result<(), BotError> {
    match common::user_with_phone(state, msg.user_id).await? {
        Some(user) => send_records(state, msg.chat_id, &user).await,
        None => common::request_phone(state, session, msg.chat_id, Resume::ShowRecords).await,
    }
}

pub async fn send_records(state: &BotState, chat_id: i64, user: &User) -> Result<(), BotError> {
    let now = state.clinic_now();
    let records = common::sort_records(common::patient_records(state, user).await?, now);
    if records.is_empty() {
        state.messenger.send(chat_id, OutgoingMessage::text(texts::HAS_NO_RECORDS)).await?;
        return Ok(());
    }

    let items: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            texts::record_item(
                i + 1,
                is_upcoming(record, now),
                record.date_start,
                &record.doctor_name,
                &record.doctor_department,
                &record.appointment_name,
                record.duration,
            )
        })
        .collect();

    let text = format!("{}{}", texts::RECORD_LIST, items.join("\n\n"));
    state.messenger.send(chat_id, OutgoingMessage::html(text)).await?;
    Ok(())
}

async fn handle_delete_record(
    state: &BotState,
    session: &mut Session,
    msg: &IncomingMessage,
) -> Result<(), BotError> {
    match common::user_with_phone(state, msg.user_id).await? {
        Some(user) => send_delete_list(state, msg.chat_id, &user).await,
        None => common::request_phone(state, session, msg.chat_id, Resume::DeleteRecords).await,
    }
}

pub async fn send_delete_list(state: &BotState, chat_id: i64, user: &User) -> Result<(), BotError> {
    let now = state.clinic_now();
    let upcoming: Vec<_> = common::sort_records(common::patient_records(state, user).await?, now)
        .into_iter()
        .filter(|record| is_upcoming(record, now))
        .collect();

    let message = if upcoming.is_empty() {
        OutgoingMessage::text(texts::HAS_NO_RECORDS)
    } else {
        OutgoingMessage::text(texts::DELETE_RECORDS).keyboard(utils::make_delete_records_keyboard(&upcoming))
    };
    state.messenger.send(chat_id, message).await?;
    Ok(())
}

async fn handle_change_name(state: &BotState, session: &mut Session, chat_id: i64) -> Result<(), BotError> {
    state
        .messenger
        .send(chat_id, OutgoingMessage::text(texts::CHANGE_FIRST_NAME_REQUEST))
        .await?;
    session.install(Continuation::AwaitingFirstName { resume: None });
    Ok(())
}

async fn handle_cancel(state: &BotState, session: &mut Session, chat_id: i64) -> Result<(), BotError> {
    session.clear();
    state
        .messenger
        .send(chat_id, OutgoingMessage::text(texts::CANCEL).markup(Markup::Remove))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_expected_names() {
        assert_eq!(Command::parse("/start", "bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/myrecords", "bot").unwrap(), Command::MyRecords);
        assert_eq!(Command::parse("/delete_record", "bot").unwrap(), Command::DeleteRecord);
        assert_eq!(Command::parse("/change_name", "bot").unwrap(), Command::ChangeName);
        assert!(Command::parse("/help", "bot").is_err());
    }
}
