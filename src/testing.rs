//! Фейки внешних систем и сквозные проверки разговоров.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use teloxide::RequestError;

use crate::bot_state::Clock;
use crate::crm::{
    crm_phone, Appointment, CrmClient, CrmError, DayInterval, Doctor, NewRecord, Patient, Record, ShortRecord,
};
use crate::messenger::{Messenger, OutgoingMessage};

pub struct FakeCrm {
    pub doctors: Vec<Doctor>,
    pub appointments: Vec<Appointment>,
    pub intervals: Vec<DayInterval>,
    pub patients: Mutex<Vec<Patient>>,
    pub records: Mutex<Vec<ShortRecord>>,
    pub created: Mutex<Vec<NewRecord>>,
    pub deleted: Mutex<Vec<i64>>,
    pub failing: AtomicBool,
    /// Задержка ответа на список врачей.
    pub latency: Mutex<Duration>,
    pub trace: Mutex<Vec<&'static str>>,
}

impl FakeCrm {
    fn unavailable() -> CrmError {
        CrmError::Request {
            status: 500,
            message: "unavailable".to_string(),
        }
    }

    fn check(&self) -> Result<(), CrmError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl CrmClient for FakeCrm {
    async fn doctors_list(&self) -> Result<Vec<Doctor>, CrmError> {
        self.check()?;
        self.trace.lock().unwrap().push("start");
        let latency = *self.latency.lock().unwrap();
        tokio::time::sleep(latency).await;
        self.trace.lock().unwrap().push("end");
        Ok(self.doctors.clone())
    }

    async fn available_appointments(&self, _client_id: i64, _doctor_id: i64) -> Result<Vec<Appointment>, CrmError> {
        self.check()?;
        Ok(self.appointments.clone())
    }

    async fn free_intervals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        _doctor_id: i64,
        _branch_id: i64,
        _duration: u32,
    ) -> Result<Vec<DayInterval>, CrmError> {
        self.check()?;
        Ok(self
            .intervals
            .iter()
            .filter(|interval| interval.date >= start && interval.date <= end)
            .cloned()
            .collect())
    }

    async fn create_record(&self, record: NewRecord) -> Result<Record, CrmError> {
        self.check()?;
        let created = Record {
            id: 501,
            date: record.date,
            time_begin: record.time_start,
            time_end: record.time_end,
        };
        self.created.lock().unwrap().push(record);
        Ok(created)
    }

    async fn patient_records(&self, _client_id: i64) -> Result<Vec<ShortRecord>, CrmError> {
        self.check()?;
        Ok(self.records.lock().unwrap().clone())
    }

    async fn delete_record(&self, record_id: i64) -> Result<(), CrmError> {
        self.check()?;
        self.deleted.lock().unwrap().push(record_id);
        Ok(())
    }

    async fn patient_by_phone(&self, phone: &str) -> Result<Patient, CrmError> {
        self.check()?;
        let phone = crm_phone(phone);
        self.patients
            .lock()
            .unwrap()
            .iter()
            .find(|patient| patient.phone == phone)
            .cloned()
            .ok_or_else(|| CrmError::not_found("patient not found"))
    }

    async fn create_patient(&self, name: &str, surname: &str, phone: &str) -> Result<Patient, CrmError> {
        self.check()?;
        let mut patients = self.patients.lock().unwrap();
        let patient = Patient {
            external_id: 100 + patients.len() as i64,
            name: name.to_string(),
            surname: surname.to_string(),
            phone: crm_phone(phone),
        };
        patients.push(patient.clone());
        Ok(patient)
    }

    async fn edit_patient(&self, patient: &Patient) -> Result<(), CrmError> {
        self.check()?;
        let mut patients = self.patients.lock().unwrap();
        if let Some(stored) = patients.iter_mut().find(|p| p.external_id == patient.external_id) {
            *stored = patient.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Sent { message_id: i32, message: OutgoingMessage },
    Edited { message_id: i32, message: OutgoingMessage },
}

impl Outbound {
    pub fn message(&self) -> &OutgoingMessage {
        match self {
            Outbound::Sent { message, .. } | Outbound::Edited { message, .. } => message,
        }
    }
}

/// Запоминает все исходящие сообщения вместо отправки в Telegram.
pub struct RecordingMessenger {
    log: Mutex<Vec<Outbound>>,
    answered: Mutex<Vec<String>>,
    next_id: AtomicI32,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            answered: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1000),
        }
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.log.lock().unwrap().clone()
    }

    pub fn last(&self) -> Outbound {
        self.log.lock().unwrap().last().cloned().expect("nothing was sent")
    }

    pub fn texts(&self) -> Vec<String> {
        self.outbound().iter().map(|o| o.message().text.clone()).collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, _chat_id: i64, message: OutgoingMessage) -> Result<i32, RequestError> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(Outbound::Sent { message_id, message });
        Ok(message_id)
    }

    async fn edit(&self, _chat_id: i64, message_id: i32, message: OutgoingMessage) -> Result<(), RequestError> {
        self.log.lock().unwrap().push(Outbound::Edited { message_id, message });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), RequestError> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{NaiveTime, TimeZone};

    use super::*;
    use crate::bot_state::{BotState, SessionStore};
    use crate::config::BookingSettings;
    use crate::crm::entities::DaySlot;
    use crate::crm::TimeRange;
    use crate::database::{InMemoryRepository, Repository};
    use crate::handlers::{self, texts, Command};
    use crate::messenger::{IncomingCallback, IncomingMessage, Markup};
    use crate::models::{Continuation, DraftKey};
    use crate::protocol::{Action, BackTo};

    const CHAT: i64 = 10;
    const TG_USER: i64 = 100;
    const SCREEN: i32 = 50;
    const PHONE: &str = "+79990001122";

    struct Harness {
        state: BotState,
        crm: Arc<FakeCrm>,
        messenger: Arc<RecordingMessenger>,
        repo: Arc<InMemoryRepository>,
        clock: Arc<FixedClock>,
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 12).unwrap()
    }

    /// Время клиники (UTC+3) в день записи.
    fn clinic_time(h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day().and_time(hm(h - 3, m)))
    }

    fn fake_crm() -> FakeCrm {
        let ticks = (0..8)
            .map(|i| TimeRange {
                begin: hm(10 + i / 4, (i % 4) * 15),
                end: hm(10 + (i + 1) / 4, ((i + 1) % 4) * 15),
            })
            .collect();

        FakeCrm {
            doctors: vec![Doctor {
                id: 2,
                fio: "Подаева С.Е.".to_string(),
                branches: HashMap::from([("3".to_string(), "Софрино".to_string())]),
                departments: HashMap::from([("2".to_string(), "Терапевты".to_string())]),
                is_hidden: false,
            }],
            appointments: vec![Appointment {
                id: 7,
                name: "Консультация".to_string(),
                time: 60,
                cost: 0.0,
            }],
            intervals: vec![DayInterval {
                date: day(),
                slots: vec![DaySlot {
                    doctor_id: "2".to_string(),
                    doctor_name: "Подаева С.Е.".to_string(),
                    time: ticks,
                }],
            }],
            patients: Mutex::new(Vec::new()),
            records: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            trace: Mutex::new(Vec::new()),
        }
    }

    fn harness(now: DateTime<Utc>) -> Harness {
        let crm = Arc::new(fake_crm());
        let messenger = Arc::new(RecordingMessenger::new());
        let repo = Arc::new(InMemoryRepository::new());
        let clock = Arc::new(FixedClock::new(now));

        let state = BotState {
            sessions: Arc::new(SessionStore::new(Duration::from_secs(24 * 3600))),
            repo: repo.clone(),
            crm: crm.clone(),
            messenger: messenger.clone(),
            settings: BookingSettings::default(),
            clock: clock.clone(),
        };

        Harness {
            state,
            crm,
            messenger,
            repo,
            clock,
        }
    }

    impl Harness {
        async fn press(&self, action: Action) {
            self.press_on(SCREEN, action).await;
        }

        async fn press_on(&self, message_id: i32, action: Action) {
            let q = IncomingCallback {
                id: "cb".to_string(),
                chat_id: CHAT,
                user_id: TG_USER,
                message_id,
                data: action.encode(),
            };
            handlers::dispatch_callback(&self.state, q).await;
        }

        async fn say(&self, text: &str) {
            handlers::dispatch_message(&self.state, self.incoming(Some(text), None), None).await;
        }

        async fn command(&self, command: Command) {
            handlers::dispatch_message(&self.state, self.incoming(Some("/command"), None), Some(command)).await;
        }

        async fn share_contact(&self) {
            handlers::dispatch_message(&self.state, self.incoming(None, Some(PHONE)), None).await;
        }

        fn incoming(&self, text: Option<&str>, phone: Option<&str>) -> IncomingMessage {
            self.incoming_in(CHAT, text, phone)
        }

        fn incoming_in(&self, chat_id: i64, text: Option<&str>, phone: Option<&str>) -> IncomingMessage {
            IncomingMessage {
                chat_id,
                user_id: TG_USER,
                message_id: 1,
                text: text.map(str::to_string),
                contact_phone: phone.map(str::to_string),
            }
        }

        async fn continuation(&self) -> Option<Continuation> {
            let session = self.state.sessions.get_or_create(CHAT).await;
            let session = session.lock().await;
            session.continuation().cloned()
        }

        async fn pick_day(&self) {
            self.press(Action::SelectDoctor { doctor_id: 2 }).await;
            self.press(Action::Appointment { appointment_id: 7 }).await;
            self.press(Action::Day { date: day(), page: 0 }).await;
        }

        fn last_keyboard_texts(&self) -> Vec<Vec<String>> {
            match &self.messenger.last().message().markup {
                Markup::Inline(keyboard) => keyboard
                    .iter()
                    .map(|row| row.iter().map(|b| b.text.clone()).collect())
                    .collect(),
                other => panic!("expected inline keyboard, got {other:?}"),
            }
        }
    }

    /// Две команды /record параллельно и порядок обращений к CRM.
    async fn concurrent_record_trace(chats: [i64; 2]) -> (Vec<&'static str>, usize) {
        let h = harness(clinic_time(8, 0));
        h.repo.get_or_create_user(TG_USER).await.unwrap();
        *h.crm.latency.lock().unwrap() = Duration::from_millis(50);

        let turns = chats.map(|chat_id| {
            let state = h.state.clone();
            let msg = h.incoming_in(chat_id, Some("/record"), None);
            tokio::spawn(async move { handlers::dispatch_message(&state, msg, Some(Command::Record)).await })
        });
        for turn in turns {
            turn.await.unwrap();
        }

        let trace = h.crm.trace.lock().unwrap().clone();
        (trace, h.messenger.outbound().len())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn turns_of_one_chat_never_interleave() {
        let (trace, sent) = concurrent_record_trace([CHAT, CHAT]).await;
        assert_eq!(trace, vec!["start", "end", "start", "end"]);
        assert_eq!(sent, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn turns_of_different_chats_run_concurrently() {
        let (trace, sent) = concurrent_record_trace([CHAT, CHAT + 1]).await;
        assert_eq!(trace, vec!["start", "start", "end", "end"]);
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn hour_long_visit_over_quarter_ticks_gives_two_blocks() {
        let h = harness(clinic_time(8, 0));
        h.pick_day().await;

        let last = h.messenger.last();
        assert!(matches!(last, Outbound::Edited { message_id: SCREEN, .. }));
        assert!(last.message().text.contains("12.11.2024"));

        let rows = h.last_keyboard_texts();
        assert_eq!(rows[0], vec!["10:00 - 11:00".to_string(), "11:00 - 12:00".to_string()]);
        assert_eq!(rows[1], vec![texts::BACK.to_string()]);
    }

    #[tokio::test]
    async fn calendar_marks_day_with_blocks() {
        let h = harness(clinic_time(8, 0));
        h.press(Action::SelectDoctor { doctor_id: 2 }).await;
        h.press(Action::Appointment { appointment_id: 7 }).await;

        assert_eq!(
            h.messenger.last().message().text,
            texts::calendar_header("Подаева С.Е.", "Консультация")
        );
        let marked: Vec<String> = h
            .last_keyboard_texts()
            .into_iter()
            .flatten()
            .filter(|text| text.starts_with("🟢"))
            .collect();
        assert_eq!(marked, vec!["🟢 12".to_string()]);
    }

    #[tokio::test]
    async fn booking_succeeds_before_cutoff() {
        let h = harness(clinic_time(9, 40));
        h.repo.upsert_user_phone(TG_USER, PHONE).await.unwrap();
        h.pick_day().await;
        h.press(Action::Interval { start: hm(10, 0) }).await;

        let approval = h.messenger.last();
        assert!(approval.message().html);
        assert!(approval.message().text.contains("2024-11-12 10:00"));

        h.press(Action::Approve).await;

        let created = h.crm.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].time_start, hm(10, 0));
        assert_eq!(created[0].time_end, hm(11, 0));
        assert_eq!(created[0].appointment_id, 7);

        let success = h.messenger.last();
        assert!(success.message().text.starts_with("Вы успешно записались"));
        assert_eq!(success.message().markup, Markup::None);

        // Пациент создан в CRM и привязан к пользователю
        let user = h.repo.get_user(TG_USER).await.unwrap().unwrap();
        assert_eq!(user.dental_pro_id, Some(created[0].client_id));
    }

    #[tokio::test]
    async fn block_past_cutoff_fails_confirmation() {
        let h = harness(clinic_time(9, 40));
        h.repo.upsert_user_phone(TG_USER, PHONE).await.unwrap();
        h.pick_day().await;
        h.press(Action::Interval { start: hm(10, 0) }).await;

        // 09:50 + 15 минут уже позже 10:00
        h.clock.set(clinic_time(9, 50));
        h.press(Action::Approve).await;

        assert!(h.crm.created.lock().unwrap().is_empty());
        assert_eq!(h.messenger.last().message().text, texts::REGISTER_INTERVAL_ERROR);
        assert_eq!(h.last_keyboard_texts(), vec![vec![texts::BACK.to_string()]]);
    }

    #[tokio::test]
    async fn interval_exactly_at_cutoff_is_approvable() {
        let h = harness(clinic_time(9, 45));
        h.repo.upsert_user_phone(TG_USER, PHONE).await.unwrap();
        h.pick_day().await;
        h.press(Action::Interval { start: hm(10, 0) }).await;

        assert_ne!(h.messenger.last().message().text, texts::APPROVE_REGISTER_TIME_LIMIT);
        assert!(h.messenger.last().message().html);
    }

    #[tokio::test]
    async fn back_to_calendar_renders_from_draft() {
        let h = harness(clinic_time(8, 0));
        h.pick_day().await;
        h.press(Action::Back { to: BackTo::Calendar }).await;

        assert_eq!(
            h.messenger.last().message().text,
            texts::calendar_header("Подаева С.Е.", "Консультация")
        );
        let rows = h.last_keyboard_texts();
        assert_eq!(rows[0], vec!["Ноябрь 2024".to_string()]);

        // Назад к приемам берет врача из черновика
        h.press(Action::Back { to: BackTo::Appointments }).await;
        assert_eq!(h.messenger.last().message().text, texts::CHOOSE_APPOINTMENTS);
    }

    #[tokio::test]
    async fn continuation_fires_once_and_clears() {
        let h = harness(clinic_time(8, 0));
        h.command(Command::ChangeName).await;
        assert!(matches!(
            h.continuation().await,
            Some(Continuation::AwaitingFirstName { resume: None })
        ));

        h.say("Иван").await;
        assert!(matches!(h.continuation().await, Some(Continuation::AwaitingLastName { .. })));

        h.say("Петров").await;
        assert!(h.continuation().await.is_none());

        let user = h.repo.get_user(TG_USER).await.unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Иван"));
        assert_eq!(user.lastname.as_deref(), Some("Петров"));

        h.say("привет").await;
        assert_eq!(h.messenger.last().message().text, texts::WELCOME);
    }

    #[tokio::test]
    async fn other_command_drops_pending_continuation() {
        let h = harness(clinic_time(8, 0));
        h.command(Command::ChangeName).await;
        h.command(Command::Start).await;

        assert!(h.continuation().await.is_none());
    }

    #[tokio::test]
    async fn cancel_clears_continuation() {
        let h = harness(clinic_time(8, 0));
        h.command(Command::ChangeName).await;
        h.command(Command::Cancel).await;

        assert!(h.continuation().await.is_none());
        let last = h.messenger.last();
        assert_eq!(last.message().text, texts::CANCEL);
        assert_eq!(last.message().markup, Markup::Remove);
    }

    #[tokio::test]
    async fn phone_capture_resumes_approval_on_new_message() {
        let h = harness(clinic_time(9, 0));
        h.repo.get_or_create_user(TG_USER).await.unwrap();
        h.pick_day().await;
        h.press(Action::Interval { start: hm(10, 0) }).await;

        assert_eq!(h.messenger.last().message().text, texts::PHONE_NUMBER_REQUEST);
        assert!(matches!(h.continuation().await, Some(Continuation::AwaitingPhone { .. })));

        // Текст вместо контакта: повторный запрос
        h.say("89990001122").await;
        assert_eq!(h.messenger.last().message().text, texts::PHONE_NUMBER_RETRY);
        assert!(matches!(h.continuation().await, Some(Continuation::AwaitingPhone { .. })));

        h.share_contact().await;
        assert!(h.continuation().await.is_none());

        let outbound = h.messenger.outbound();
        let wait_id = outbound
            .iter()
            .find_map(|o| match o {
                Outbound::Sent { message_id, message } if message.text == texts::WAIT => Some(*message_id),
                _ => None,
            })
            .expect("wait message was sent");
        assert!(matches!(h.messenger.last(), Outbound::Edited { message_id, .. } if message_id == wait_id));
        assert!(h.messenger.last().message().html);

        let user = h.repo.get_user(TG_USER).await.unwrap().unwrap();
        let moved = h
            .repo
            .get_draft(&DraftKey {
                user_id: user.id,
                chat_id: CHAT,
                message_id: wait_id,
            })
            .await
            .unwrap()
            .expect("draft moved to the new message");
        assert_eq!(moved.start_time, Some(hm(10, 0)));
    }

    #[tokio::test]
    async fn delete_confirmation_reinstalls_on_unknown_answer() {
        let h = harness(clinic_time(8, 0));
        h.repo.upsert_user_phone(TG_USER, PHONE).await.unwrap();
        h.crm.patients.lock().unwrap().push(Patient {
            external_id: 24,
            name: "Иван".to_string(),
            surname: "Петров".to_string(),
            phone: "79990001122".to_string(),
        });
        h.crm.records.lock().unwrap().push(ShortRecord {
            id: 900,
            date_start: day().and_time(hm(11, 0)),
            doctor_id: 2,
            doctor_name: "Подаева С.Е.".to_string(),
            doctor_department: "Терапевты".to_string(),
            appointment_name: "Консультация".to_string(),
            duration: 60,
        });

        h.press(Action::DeleteRecord { record_id: 900 }).await;
        assert!(matches!(h.messenger.last().message().markup, Markup::Choice(_)));
        assert!(matches!(
            h.continuation().await,
            Some(Continuation::AwaitingDeleteConfirmation { record_id: 900, .. })
        ));

        h.say("может быть").await;
        assert_eq!(h.messenger.last().message().text, texts::UNKNOWN_APPROVE_DELETE_RECORD);
        assert!(h.continuation().await.is_some());
        assert!(h.crm.deleted.lock().unwrap().is_empty());

        h.say("да").await;
        assert_eq!(h.crm.deleted.lock().unwrap().clone(), vec![900]);
        assert!(h.continuation().await.is_none());
        assert_eq!(h.messenger.last().message().markup, Markup::Remove);
    }

    #[tokio::test]
    async fn same_doctor_is_refused_with_upcoming_record() {
        let h = harness(clinic_time(8, 0));
        h.repo.upsert_user_phone(TG_USER, PHONE).await.unwrap();
        h.crm.patients.lock().unwrap().push(Patient {
            external_id: 24,
            name: "Иван".to_string(),
            surname: "Петров".to_string(),
            phone: "79990001122".to_string(),
        });
        h.crm.records.lock().unwrap().push(ShortRecord {
            id: 900,
            date_start: day().and_time(hm(11, 0)),
            doctor_id: 2,
            doctor_name: "Подаева С.Е.".to_string(),
            doctor_department: String::new(),
            appointment_name: String::new(),
            duration: 60,
        });

        h.press(Action::SelectDoctor { doctor_id: 2 }).await;
        assert_eq!(h.messenger.last().message().text, texts::HAS_SAME_RECORD);
    }

    #[tokio::test]
    async fn malformed_callback_is_dropped_silently() {
        let h = harness(clinic_time(8, 0));
        let q = IncomingCallback {
            id: "cb".to_string(),
            chat_id: CHAT,
            user_id: TG_USER,
            message_id: SCREEN,
            data: r#"{"command":"pay","x":1}"#.to_string(),
        };
        handlers::dispatch_callback(&h.state, q).await;

        assert!(h.messenger.outbound().is_empty());
        assert_eq!(h.messenger.answered.lock().unwrap().clone(), vec!["cb".to_string()]);
    }

    #[tokio::test]
    async fn crm_failure_turns_into_apology() {
        let h = harness(clinic_time(8, 0));
        h.repo.get_or_create_user(TG_USER).await.unwrap();
        h.crm.failing.store(true, Ordering::SeqCst);

        h.command(Command::Record).await;
        assert_eq!(h.messenger.texts(), vec![texts::INTERNAL_ERROR.to_string()]);
    }

    #[tokio::test]
    async fn record_without_user_asks_for_phone_first() {
        let h = harness(clinic_time(8, 0));
        h.command(Command::Record).await;
        assert_eq!(h.messenger.last().message().text, texts::PHONE_NUMBER_REQUEST);

        h.share_contact().await;
        assert_eq!(
            h.messenger.texts(),
            vec![
                texts::PHONE_NUMBER_REQUEST.to_string(),
                texts::CONTACTS_ADDED_SUCCESS.to_string(),
                texts::CHOOSE_DOCTOR.to_string(),
            ]
        );
        assert_eq!(h.last_keyboard_texts(), vec![vec!["Подаева С.Е. - Терапевты".to_string()]]);
    }

    #[tokio::test]
    async fn my_records_lists_upcoming_first() {
        let h = harness(clinic_time(8, 0));
        h.repo.upsert_user_phone(TG_USER, PHONE).await.unwrap();
        h.crm.patients.lock().unwrap().push(Patient {
            external_id: 24,
            name: String::new(),
            surname: String::new(),
            phone: "79990001122".to_string(),
        });
        {
            let mut records = h.crm.records.lock().unwrap();
            for (id, date) in [(1, NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()), (2, day())] {
                records.push(ShortRecord {
                    id,
                    date_start: date.and_time(hm(11, 0)),
                    doctor_id: 2,
                    doctor_name: "Подаева С.Е.".to_string(),
                    doctor_department: "Терапевты".to_string(),
                    appointment_name: "Консультация".to_string(),
                    duration: 60,
                });
            }
        }

        h.command(Command::MyRecords).await;
        let text = h.messenger.last().message().text.clone();
        let upcoming = text.find("2024-11-12 11:00").unwrap();
        let past = text.find("2024-10-01 11:00").unwrap();
        assert!(upcoming < past);
        assert!(text.contains("🔴 Запись №1"));
    }
}
