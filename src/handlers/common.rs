use chrono::NaiveDateTime;

use crate::bot_state::BotState;
use crate::crm::{Appointment, Patient, ShortRecord};
use crate::error::BotError;
use crate::handlers::{texts, utils};
use crate::messenger::OutgoingMessage;
use crate::models::{BookingDraft, Continuation, Doctor, DraftKey, Resume, Session, User};

/// Просит поделиться контактом и ждет его следующим сообщением.
pub async fn request_phone(
    state: &BotState,
    session: &mut Session,
    chat_id: i64,
    resume: Resume,
) -> Result<(), BotError> {
    state
        .messenger
        .send(
            chat_id,
            OutgoingMessage::html(texts::PHONE_NUMBER_REQUEST).markup(utils::contact_markup()),
        )
        .await?;
    session.install(Continuation::AwaitingPhone { resume });
    Ok(())
}

/// Пользователь, у которого уже есть телефон.
pub async fn user_with_phone(state: &BotState, tg_user_id: i64) -> Result<Option<User>, BotError> {
    Ok(state
        .repo
        .get_user(tg_user_id)
        .await?
        .filter(|user| user.phone().is_some()))
}

/// Пациент CRM по телефону. `None`, если такого нет.
pub async fn find_patient(state: &BotState, phone: &str) -> Result<Option<Patient>, BotError> {
    match state.crm.patient_by_phone(phone).await {
        Ok(patient) => Ok(Some(patient)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// id пациента в CRM. Если в базе его нет, ищем по телефону и запоминаем.
pub async fn ensure_dental_pro_id(state: &BotState, user: &User) -> Result<Option<i64>, BotError> {
    if let Some(id) = user.dental_pro_id {
        return Ok(Some(id));
    }
    let Some(phone) = user.phone() else {
        return Ok(None);
    };
    let Some(patient) = find_patient(state, phone).await? else {
        return Ok(None);
    };

    state.repo.update_dental_pro_id(user.tg_user_id, patient.external_id).await?;
    log::info!("🔗 User {} linked to CRM patient {}", user.tg_user_id, patient.external_id);
    Ok(Some(patient.external_id))
}

/// Пациент CRM по телефону пользователя, при отсутствии создается.
pub async fn get_or_create_patient(state: &BotState, user: &User, phone: &str) -> Result<Patient, BotError> {
    let patient = match find_patient(state, phone).await? {
        Some(patient) => patient,
        None => {
            let name = user.name.as_deref().unwrap_or_default();
            let lastname = user.lastname.as_deref().unwrap_or_default();
            let patient = state.crm.create_patient(name, lastname, phone).await?;
            log::info!("👤 Created CRM patient {} for user {}", patient.external_id, user.tg_user_id);
            patient
        }
    };

    if user.dental_pro_id != Some(patient.external_id) {
        state.repo.update_dental_pro_id(user.tg_user_id, patient.external_id).await?;
    }
    Ok(patient)
}

/// ФИО врача: сначала из кэша, потом из CRM с обновлением кэша.
pub async fn doctor_name(state: &BotState, doctor_id: i64) -> Result<String, BotError> {
    if let Some(doctor) = state.repo.get_doctor(doctor_id).await? {
        return Ok(doctor.fio);
    }

    let doctor = state
        .crm
        .doctors_list()
        .await?
        .into_iter()
        .find(|doctor| doctor.id == doctor_id)
        .ok_or_else(|| BotError::NotFound(format!("doctor {doctor_id}")))?;

    state
        .repo
        .upsert_doctor(&Doctor {
            id: doctor.id,
            fio: doctor.fio.clone(),
        })
        .await?;
    Ok(doctor.fio)
}

pub async fn find_appointment(
    state: &BotState,
    client_id: i64,
    doctor_id: i64,
    appointment_id: i64,
) -> Result<Appointment, BotError> {
    state
        .crm
        .available_appointments(client_id, doctor_id)
        .await?
        .into_iter()
        .find(|appointment| appointment.id == appointment_id)
        .ok_or_else(|| BotError::NotFound(format!("appointment {appointment_id} of doctor {doctor_id}")))
}

/// id клиента для каталога приемов. Без привязки к CRM каталог общий.
pub fn catalog_client_id(user: &User) -> i64 {
    user.dental_pro_id.unwrap_or(1)
}

/// Экран выбора врача филиала. Заодно обновляет кэш ФИО.
pub async fn doctors_screen(state: &BotState) -> Result<OutgoingMessage, BotError> {
    let doctors: Vec<_> = state
        .crm
        .doctors_list()
        .await?
        .into_iter()
        .filter(|doctor| !doctor.is_hidden && doctor.works_in_branch(state.settings.branch_id))
        .collect();

    for doctor in &doctors {
        state
            .repo
            .upsert_doctor(&Doctor {
                id: doctor.id,
                fio: doctor.fio.clone(),
            })
            .await?;
    }

    Ok(OutgoingMessage::text(texts::CHOOSE_DOCTOR).keyboard(utils::make_doctors_keyboard(&doctors)))
}

pub fn is_upcoming(record: &ShortRecord, now: NaiveDateTime) -> bool {
    record.date_start >= now
}

pub fn has_upcoming_record_with(records: &[ShortRecord], doctor_id: i64, now: NaiveDateTime) -> bool {
    records
        .iter()
        .any(|record| record.doctor_id == doctor_id && is_upcoming(record, now))
}

/// Предстоящие по возрастанию, затем прошедшие по убыванию.
pub fn sort_records(mut records: Vec<ShortRecord>, now: NaiveDateTime) -> Vec<ShortRecord> {
    records.sort_by(|a, b| match (is_upcoming(a, now), is_upcoming(b, now)) {
        (true, true) => a.date_start.cmp(&b.date_start),
        (false, false) => b.date_start.cmp(&a.date_start),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
    });
    records
}

/// Записи пациента в CRM. Пусто, если пациента нет.
pub async fn patient_records(state: &BotState, user: &User) -> Result<Vec<ShortRecord>, BotError> {
    match ensure_dental_pro_id(state, user).await? {
        Some(client_id) => records_of(state, client_id).await,
        None => Ok(Vec::new()),
    }
}

pub async fn records_of(state: &BotState, client_id: i64) -> Result<Vec<ShortRecord>, BotError> {
    match state.crm.patient_records(client_id).await {
        Ok(records) => Ok(records),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub async fn load_draft(state: &BotState, key: &DraftKey) -> Result<BookingDraft, BotError> {
    state
        .repo
        .get_draft(key)
        .await?
        .ok_or(BotError::DraftNotFound(key.message_id))
}

pub async fn draft_or_new(state: &BotState, key: DraftKey) -> Result<BookingDraft, BotError> {
    Ok(state.repo.get_draft(&key).await?.unwrap_or_else(|| BookingDraft::new(key)))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(id: i64, day: u32, doctor_id: i64) -> ShortRecord {
        ShortRecord {
            id,
            date_start: NaiveDate::from_ymd_opt(2024, 11, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            doctor_id,
            doctor_name: String::new(),
            doctor_department: String::new(),
            appointment_name: String::new(),
            duration: 30,
        }
    }

    #[test]
    fn upcoming_first_then_past_descending() {
        let now = NaiveDate::from_ymd_opt(2024, 11, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let records = vec![record(1, 10, 2), record(2, 20, 2), record(3, 12, 2), record(4, 18, 2)];

        let ids: Vec<i64> = sort_records(records, now).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }

    #[test]
    fn only_upcoming_records_block_doctor() {
        let now = NaiveDate::from_ymd_opt(2024, 11, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let records = vec![record(1, 10, 2), record(2, 20, 5)];

        assert!(!has_upcoming_record_with(&records, 2, now));
        assert!(has_upcoming_record_with(&records, 5, now));
    }
}
