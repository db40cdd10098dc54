use chrono::NaiveDateTime;

use crate::bot_state::BotState;
use crate::error::BotError;
use crate::handlers::{callbacks, commands, common, texts, utils};
use crate::messenger::{IncomingMessage, Markup, OutgoingMessage};
use crate::models::{Continuation, DraftKey, Resume, Session};

/// Текст без ожидания: просто приветствие.
pub async fn unknown(state: &BotState, msg: &IncomingMessage) -> Result<(), BotError> {
    state.messenger.send(msg.chat_id, OutgoingMessage::text(texts::WELCOME)).await?;
    Ok(())
}

/// Запускает продолжение, снятое с сессии.
pub async fn resume(
    state: &BotState,
    session: &mut Session,
    msg: &IncomingMessage,
    continuation: Continuation,
) -> Result<(), BotError> {
    log::debug!("↪️ Chat {} resumes {}", msg.chat_id, continuation.name());

    match continuation {
        Continuation::AwaitingPhone { resume } => on_phone(state, session, msg, resume).await,
        Continuation::AwaitingFirstName { resume } => on_first_name(state, session, msg, resume).await,
        Continuation::AwaitingLastName { first_name, resume } => {
            on_last_name(state, session, msg, first_name, resume).await
        }
        Continuation::AwaitingDeleteConfirmation {
            record_id,
            starts_at,
            doctor_name,
        } => on_delete_confirmation(state, session, msg, record_id, starts_at, doctor_name).await,
    }
}

fn entered_text(msg: &IncomingMessage) -> Option<&str> {
    msg.text.as_deref().map(str::trim).filter(|text| !text.is_empty())
}

async fn on_phone(
    state: &BotState,
    session: &mut Session,
    msg: &IncomingMessage,
    resume: Resume,
) -> Result<(), BotError> {
    let Some(phone) = msg.contact_phone.as_deref() else {
        state
            .messenger
            .send(
                msg.chat_id,
                OutgoingMessage::html(texts::PHONE_NUMBER_RETRY).markup(utils::contact_markup()),
            )
            .await?;
        session.install(Continuation::AwaitingPhone { resume });
        return Ok(());
    };

    state.repo.upsert_user_phone(msg.user_id, phone).await?;
    log::info!("📞 Phone saved for user {}", msg.user_id);
    state
        .messenger
        .send(
            msg.chat_id,
            OutgoingMessage::text(texts::CONTACTS_ADDED_SUCCESS).markup(Markup::Remove),
        )
        .await?;

    let user = state.repo.get_or_create_user(msg.user_id).await?;
    match resume {
        Resume::Record => commands::send_doctors(state, msg.chat_id).await,
        Resume::ShowRecords => commands::send_records(state, msg.chat_id, &user).await,
        Resume::DeleteRecords => commands::send_delete_list(state, msg.chat_id, &user).await,
        Resume::ConfirmDeletion { record_id } => {
            callbacks::confirm_deletion(state, session, msg.chat_id, msg.user_id, record_id).await
        }
        Resume::ApproveDraft(key) => callbacks::resume_approval(state, msg.chat_id, &user, key).await,
    }
}

async fn on_first_name(
    state: &BotState,
    session: &mut Session,
    msg: &IncomingMessage,
    resume: Option<DraftKey>,
) -> Result<(), BotError> {
    let Some(first_name) = entered_text(msg) else {
        state
            .messenger
            .send(msg.chat_id, OutgoingMessage::text(texts::CHANGE_FIRST_NAME_REQUEST))
            .await?;
        session.install(Continuation::AwaitingFirstName { resume });
        return Ok(());
    };

    state
        .messenger
        .send(msg.chat_id, OutgoingMessage::text(texts::CHANGE_LAST_NAME_REQUEST))
        .await?;
    session.install(Continuation::AwaitingLastName {
        first_name: first_name.to_string(),
        resume,
    });
    Ok(())
}

async fn on_last_name(
    state: &BotState,
    session: &mut Session,
    msg: &IncomingMessage,
    first_name: String,
    resume: Option<DraftKey>,
) -> Result<(), BotError> {
    let Some(last_name) = entered_text(msg) else {
        state
            .messenger
            .send(msg.chat_id, OutgoingMessage::text(texts::CHANGE_LAST_NAME_REQUEST))
            .await?;
        session.install(Continuation::AwaitingLastName { first_name, resume });
        return Ok(());
    };

    state.repo.get_or_create_user(msg.user_id).await?;
    state.repo.update_user_name(msg.user_id, &first_name, last_name).await?;
    let user = state.repo.get_or_create_user(msg.user_id).await?;

    // Без телефона пациента в CRM не найти
    if let Some(phone) = user.phone() {
        match common::find_patient(state, phone).await? {
            Some(mut patient) => {
                patient.name = first_name.clone();
                patient.surname = last_name.to_string();
                state.crm.edit_patient(&patient).await?;
                if user.dental_pro_id != Some(patient.external_id) {
                    state.repo.update_dental_pro_id(user.tg_user_id, patient.external_id).await?;
                }
            }
            None => {
                let patient = state.crm.create_patient(&first_name, last_name, phone).await?;
                state.repo.update_dental_pro_id(user.tg_user_id, patient.external_id).await?;
            }
        }
    }

    state
        .messenger
        .send(
            msg.chat_id,
            OutgoingMessage::html(texts::change_name_succeed(&first_name, last_name)),
        )
        .await?;

    match resume {
        Some(key) => {
            let user = state.repo.get_or_create_user(msg.user_id).await?;
            callbacks::resume_approval(state, msg.chat_id, &user, key).await
        }
        None => Ok(()),
    }
}

async fn on_delete_confirmation(
    state: &BotState,
    session: &mut Session,
    msg: &IncomingMessage,
    record_id: i64,
    starts_at: NaiveDateTime,
    doctor_name: String,
) -> Result<(), BotError> {
    let answer = msg.text.as_deref().unwrap_or_default();

    if texts::is_match_ignore_case(answer, texts::POSITIVE_ANSWERS) {
        state.crm.delete_record(record_id).await?;
        log::info!("🗑️ Record {} deleted by user {}", record_id, msg.user_id);
        state
            .messenger
            .send(
                msg.chat_id,
                OutgoingMessage::text(texts::success_delete_record(starts_at, &doctor_name)).markup(Markup::Remove),
            )
            .await?;
    } else if texts::is_match_ignore_case(answer, texts::NEGATIVE_ANSWERS) {
        state
            .messenger
            .send(
                msg.chat_id,
                OutgoingMessage::text(texts::cancel_delete_record(starts_at, &doctor_name)).markup(Markup::Remove),
            )
            .await?;
    } else {
        state
            .messenger
            .send(
                msg.chat_id,
                OutgoingMessage::text(texts::UNKNOWN_APPROVE_DELETE_RECORD).markup(utils::confirm_markup()),
            )
            .await?;
        session.install(Continuation::AwaitingDeleteConfirmation {
            record_id,
            starts_at,
            doctor_name,
        });
    }
    Ok(())
}
