use chrono::{Duration, NaiveDate, NaiveTime};

use crate::bot_state::BotState;
use crate::calendar::{self, YearMonth, PAGE_SIZE};
use crate::crm::NewRecord;
use crate::error::BotError;
use crate::handlers::common::{self, is_upcoming};
use crate::handlers::{texts, utils};
use crate::messenger::{IncomingCallback, OutgoingMessage};
use crate::models::{BookingDraft, Continuation, DraftKey, Resume, Session, User};
use crate::protocol::{Action, BackTo};

/// Сообщение с inline-клавиатурой, по которому нажали кнопку.
#[derive(Debug, Clone, Copy)]
pub struct Screen {
    pub chat_id: i64,
    pub message_id: i32,
}

impl Screen {
    fn of(q: &IncomingCallback) -> Self {
        Self {
            chat_id: q.chat_id,
            message_id: q.message_id,
        }
    }

    fn draft_key(&self, user: &User) -> DraftKey {
        DraftKey {
            user_id: user.id,
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    async fn show(&self, state: &BotState, message: OutgoingMessage) -> Result<(), BotError> {
        state.messenger.edit(self.chat_id, self.message_id, message).await?;
        Ok(())
    }
}

pub async fn handle(
    state: &BotState,
    session: &mut Session,
    q: &IncomingCallback,
    action: Action,
) -> Result<(), BotError> {
    log::debug!("🔘 Callback {} from chat {}", action.command(), q.chat_id);
    let screen = Screen::of(q);

    match action {
        Action::Noop => Ok(()),
        Action::SelectDoctor { doctor_id } => select_doctor(state, screen, q.user_id, doctor_id).await,
        Action::Appointment { appointment_id } => select_appointment(state, screen, q.user_id, appointment_id).await,
        Action::SwitchMonth { month, doctor_id } => switch_month(state, screen, q.user_id, month, doctor_id).await,
        Action::Day { date, page } => select_day(state, screen, q.user_id, date, page).await,
        Action::Interval { start } => select_interval(state, session, screen, q.user_id, start).await,
        Action::ChangeName => change_name(state, session, screen, q.user_id).await,
        Action::Approve => approve(state, session, screen, q.user_id).await,
        Action::DeleteRecord { record_id } => confirm_deletion(state, session, q.chat_id, q.user_id, record_id).await,
        Action::Back { to } => back(state, screen, q.user_id, to).await,
    }
}

async fn select_doctor(state: &BotState, screen: Screen, tg_user_id: i64, doctor_id: i64) -> Result<(), BotError> {
    let user = state.repo.get_or_create_user(tg_user_id).await?;
    let mut draft = common::draft_or_new(state, screen.draft_key(&user)).await?;

    let doctor_id = if doctor_id != 0 {
        draft.doctor_id = Some(doctor_id);
        state.repo.save_draft(&draft).await?;
        doctor_id
    } else {
        draft.doctor_id()?
    };

    let records = common::patient_records(state, &user).await?;
    if common::has_upcoming_record_with(&records, doctor_id, state.clinic_now()) {
        return screen
            .show(
                state,
                OutgoingMessage::text(texts::HAS_SAME_RECORD).keyboard(utils::make_back_keyboard(BackTo::Doctors)),
            )
            .await;
    }

    let appointments = state
        .crm
        .available_appointments(common::catalog_client_id(&user), doctor_id)
        .await?;

    let message = if appointments.is_empty() {
        let doctor = common::doctor_name(state, doctor_id).await?;
        OutgoingMessage::text(texts::dont_has_appointments(&doctor))
            .keyboard(utils::make_back_keyboard(BackTo::Doctors))
    } else {
        OutgoingMessage::text(texts::CHOOSE_APPOINTMENTS).keyboard(utils::make_appointments_keyboard(&appointments))
    };
    screen.show(state, message).await
}

async fn select_appointment(
    state: &BotState,
    screen: Screen,
    tg_user_id: i64,
    appointment_id: i64,
) -> Result<(), BotError> {
    let user = state.repo.get_or_create_user(tg_user_id).await?;
    let mut draft = common::load_draft(state, &screen.draft_key(&user)).await?;
    draft.appointment_id = Some(appointment_id);
    state.repo.save_draft(&draft).await?;

    render_calendar(state, screen, &user, &draft, YearMonth::of(state.today())).await
}

async fn switch_month(
    state: &BotState,
    screen: Screen,
    tg_user_id: i64,
    month: YearMonth,
    doctor_id: i64,
) -> Result<(), BotError> {
    let user = state.repo.get_or_create_user(tg_user_id).await?;
    let mut draft = common::draft_or_new(state, screen.draft_key(&user)).await?;
    if draft.doctor_id.is_none() && doctor_id != 0 {
        draft.doctor_id = Some(doctor_id);
        state.repo.save_draft(&draft).await?;
    }

    render_calendar(state, screen, &user, &draft, month).await
}

/// Календарь месяца с отмеченными днями, где есть хотя бы один блок.
async fn render_calendar(
    state: &BotState,
    screen: Screen,
    user: &User,
    draft: &BookingDraft,
    month: YearMonth,
) -> Result<(), BotError> {
    let doctor_id = draft.doctor_id()?;
    let appointment =
        common::find_appointment(state, common::catalog_client_id(user), doctor_id, draft.appointment_id()?).await?;
    let doctor = common::doctor_name(state, doctor_id).await?;

    let today = state.today();
    let start = month.first_day().max(today);
    let end = month.last_day();
    let intervals = if start > end {
        Vec::new()
    } else {
        state
            .crm
            .free_intervals(start, end, doctor_id, state.settings.branch_id, appointment.time)
            .await?
    };

    let available = calendar::available_days(
        &intervals,
        today,
        appointment.time,
        state.settings.default_tick_minutes,
    );
    log::debug!("📅 {} days available in {} for doctor {}", available.len(), month, doctor_id);

    screen
        .show(
            state,
            OutgoingMessage::text(texts::calendar_header(&doctor, &appointment.name))
                .keyboard(utils::make_calendar_keyboard(month, today, &available, doctor_id)),
        )
        .await
}

async fn select_day(
    state: &BotState,
    screen: Screen,
    tg_user_id: i64,
    date: NaiveDate,
    page: usize,
) -> Result<(), BotError> {
    let user = state.repo.get_or_create_user(tg_user_id).await?;
    let mut draft = common::load_draft(state, &screen.draft_key(&user)).await?;
    if draft.date != Some(date) {
        draft.date = Some(date);
        draft.start_time = None;
        state.repo.save_draft(&draft).await?;
    }

    let doctor_id = draft.doctor_id()?;
    let appointment =
        common::find_appointment(state, common::catalog_client_id(&user), doctor_id, draft.appointment_id()?).await?;
    let doctor = common::doctor_name(state, doctor_id).await?;

    let intervals = state
        .crm
        .free_intervals(date, date, doctor_id, state.settings.branch_id, appointment.time)
        .await?;
    let blocks = calendar::day_blocks(&intervals, date, appointment.time, state.settings.default_tick_minutes);
    let page = calendar::paginate(&blocks, page, PAGE_SIZE);

    let text = if blocks.is_empty() {
        texts::dont_has_intervals(date, &doctor, &appointment.name)
    } else {
        texts::choose_interval(date, &doctor, &appointment.name)
    };
    let keyboard = utils::make_intervals_keyboard(&page, date, state.now(), &state.settings);
    screen.show(state, OutgoingMessage::text(text).keyboard(keyboard)).await
}

async fn select_interval(
    state: &BotState,
    session: &mut Session,
    screen: Screen,
    tg_user_id: i64,
    start: NaiveTime,
) -> Result<(), BotError> {
    let user = state.repo.get_or_create_user(tg_user_id).await?;
    let key = screen.draft_key(&user);
    let mut draft = common::load_draft(state, &key).await?;
    draft.start_time = Some(start);
    state.repo.save_draft(&draft).await?;

    if user.phone().is_none() {
        return common::request_phone(state, session, screen.chat_id, Resume::ApproveDraft(key)).await;
    }
    render_approval(state, screen, &user, &draft).await
}

/// Экран подтверждения записи. Если время уже за отсечкой, вместо него
/// показывается предупреждение с возвратом к календарю.
pub async fn render_approval(
    state: &BotState,
    screen: Screen,
    user: &User,
    draft: &BookingDraft,
) -> Result<(), BotError> {
    let starts_at = draft.starts_at()?;
    if !calendar::is_selectable(starts_at.date(), starts_at.time(), state.now(), &state.settings) {
        return screen
            .show(
                state,
                OutgoingMessage::text(texts::APPROVE_REGISTER_TIME_LIMIT)
                    .keyboard(utils::make_back_keyboard(BackTo::Calendar)),
            )
            .await;
    }

    let doctor_id = draft.doctor_id()?;
    let appointment =
        common::find_appointment(state, common::catalog_client_id(user), doctor_id, draft.appointment_id()?).await?;
    let doctor = common::doctor_name(state, doctor_id).await?;
    let patient = match user.phone() {
        Some(phone) => common::find_patient(state, phone).await?,
        None => None,
    };

    let text = texts::approve_register(
        starts_at,
        &doctor,
        &appointment.name,
        appointment.time,
        user.last_name(patient.as_ref()),
        user.first_name(patient.as_ref()),
    );
    screen
        .show(state, OutgoingMessage::html(text).keyboard(utils::make_approve_keyboard()))
        .await
}

async fn change_name(state: &BotState, session: &mut Session, screen: Screen, tg_user_id: i64) -> Result<(), BotError> {
    let user = state.repo.get_or_create_user(tg_user_id).await?;
    state
        .messenger
        .send(screen.chat_id, OutgoingMessage::text(texts::CHANGE_FIRST_NAME_REQUEST))
        .await?;
    session.install(Continuation::AwaitingFirstName {
        resume: Some(screen.draft_key(&user)),
    });
    Ok(())
}

async fn approve(state: &BotState, session: &mut Session, screen: Screen, tg_user_id: i64) -> Result<(), BotError> {
    let user = state.repo.get_or_create_user(tg_user_id).await?;
    let key = screen.draft_key(&user);
    let draft = common::load_draft(state, &key).await?;

    let Some(phone) = user.phone() else {
        return common::request_phone(state, session, screen.chat_id, Resume::ApproveDraft(key)).await;
    };
    let patient = common::get_or_create_patient(state, &user, phone).await?;

    let doctor_id = draft.doctor_id()?;
    let starts_at = draft.starts_at()?;

    let records = common::records_of(state, patient.external_id).await?;
    if common::has_upcoming_record_with(&records, doctor_id, state.clinic_now()) {
        return screen
            .show(
                state,
                OutgoingMessage::text(texts::HAS_SAME_RECORD).keyboard(utils::make_back_keyboard(BackTo::Doctors)),
            )
            .await;
    }

    let interval_unavailable =
        OutgoingMessage::text(texts::REGISTER_INTERVAL_ERROR).keyboard(utils::make_back_keyboard(BackTo::Calendar));

    if !calendar::is_selectable(starts_at.date(), starts_at.time(), state.now(), &state.settings) {
        log::info!("⏰ Chat {}: {} is past the booking cutoff", screen.chat_id, starts_at);
        return screen.show(state, interval_unavailable).await;
    }

    let appointment =
        common::find_appointment(state, patient.external_id, doctor_id, draft.appointment_id()?).await?;
    let intervals = state
        .crm
        .free_intervals(
            starts_at.date(),
            starts_at.date(),
            doctor_id,
            state.settings.branch_id,
            appointment.time,
        )
        .await?;
    let blocks = calendar::day_blocks(
        &intervals,
        starts_at.date(),
        appointment.time,
        state.settings.default_tick_minutes,
    );
    if !blocks.iter().any(|block| block.begin == starts_at.time()) {
        log::info!("⛔ Chat {}: {} is no longer free", screen.chat_id, starts_at);
        return screen.show(state, interval_unavailable).await;
    }

    let record = state
        .crm
        .create_record(NewRecord {
            date: starts_at.date(),
            time_start: starts_at.time(),
            time_end: starts_at.time() + Duration::minutes(i64::from(appointment.time)),
            doctor_id,
            client_id: patient.external_id,
            appointment_id: appointment.id,
        })
        .await?;
    log::info!("✅ Record {} created for patient {}", record.id, patient.external_id);

    let doctor = common::doctor_name(state, doctor_id).await?;
    let text = texts::register_success(
        record.date,
        record.time_begin,
        &doctor,
        &appointment.name,
        appointment.time,
        user.last_name(Some(&patient)),
        user.first_name(Some(&patient)),
    );
    screen.show(state, OutgoingMessage::html(text)).await
}

/// Запрос подтверждения удаления записи reply-клавиатурой да/нет.
pub async fn confirm_deletion(
    state: &BotState,
    session: &mut Session,
    chat_id: i64,
    tg_user_id: i64,
    record_id: i64,
) -> Result<(), BotError> {
    let Some(user) = common::user_with_phone(state, tg_user_id).await? else {
        return common::request_phone(state, session, chat_id, Resume::ConfirmDeletion { record_id }).await;
    };

    let now = state.clinic_now();
    let record = common::patient_records(state, &user)
        .await?
        .into_iter()
        .find(|record| record.id == record_id && is_upcoming(record, now));

    let Some(record) = record else {
        state
            .messenger
            .send(chat_id, OutgoingMessage::text(texts::HAS_NO_DELETE_RECORD))
            .await?;
        return Ok(());
    };

    state
        .messenger
        .send(
            chat_id,
            OutgoingMessage::text(texts::approve_delete_record(record.date_start, &record.doctor_name))
                .markup(utils::confirm_markup()),
        )
        .await?;
    session.install(Continuation::AwaitingDeleteConfirmation {
        record_id,
        starts_at: record.date_start,
        doctor_name: record.doctor_name,
    });
    Ok(())
}

/// Возврат пересобирает экран из черновика, стека экранов нет.
async fn back(state: &BotState, screen: Screen, tg_user_id: i64, to: BackTo) -> Result<(), BotError> {
    match to {
        BackTo::Doctors => {
            let doctors = common::doctors_screen(state).await?;
            screen.show(state, doctors).await
        }
        BackTo::Appointments => select_doctor(state, screen, tg_user_id, 0).await,
        BackTo::Calendar => {
            let user = state.repo.get_or_create_user(tg_user_id).await?;
            let draft = common::load_draft(state, &screen.draft_key(&user)).await?;
            let month = YearMonth::of(draft.date.unwrap_or_else(|| state.today()));
            render_calendar(state, screen, &user, &draft, month).await
        }
    }
}

/// Экран подтверждения на новом сообщении: старая клавиатура осталась
/// над ответом пользователя, черновик переезжает под новое сообщение.
pub async fn resume_approval(state: &BotState, chat_id: i64, user: &User, key: DraftKey) -> Result<(), BotError> {
    let draft = common::load_draft(state, &key).await?;
    let message_id = state.messenger.send(chat_id, OutgoingMessage::text(texts::WAIT)).await?;

    let moved = draft.moved_to(message_id);
    state.repo.save_draft(&moved).await?;

    render_approval(state, Screen { chat_id, message_id }, user, &moved).await
}
