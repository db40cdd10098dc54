use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::BotError;

/// Черновик записи привязан к сообщению с inline-клавиатурой.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftKey {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BookingDraft {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i32,
    pub doctor_id: Option<i64>,
    pub appointment_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
}

impl BookingDraft {
    pub fn new(key: DraftKey) -> Self {
        Self {
            user_id: key.user_id,
            chat_id: key.chat_id,
            message_id: key.message_id,
            doctor_id: None,
            appointment_id: None,
            date: None,
            start_time: None,
        }
    }

    pub fn key(&self) -> DraftKey {
        DraftKey {
            user_id: self.user_id,
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    /// Тот же черновик под новым сообщением.
    pub fn moved_to(&self, message_id: i32) -> Self {
        Self {
            message_id,
            ..self.clone()
        }
    }

    pub fn doctor_id(&self) -> Result<i64, BotError> {
        self.doctor_id.ok_or(BotError::IncompleteDraft("doctor"))
    }

    pub fn appointment_id(&self) -> Result<i64, BotError> {
        self.appointment_id.ok_or(BotError::IncompleteDraft("appointment"))
    }

    pub fn date(&self) -> Result<NaiveDate, BotError> {
        self.date.ok_or(BotError::IncompleteDraft("date"))
    }

    pub fn starts_at(&self) -> Result<NaiveDateTime, BotError> {
        let time = self.start_time.ok_or(BotError::IncompleteDraft("start time"))?;
        Ok(self.date()?.and_time(time))
    }
}
