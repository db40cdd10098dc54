//! Данные inline-кнопок.
//!
//! Токен это плоский JSON: обязательное поле `command` и одно-три поля
//! с однобуквенными ключами. Telegram ограничивает callback data 64 байтами.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar::YearMonth;

pub const MAX_TOKEN_LEN: usize = 64;

const COMMANDS: &[&str] = &[
    "noop",
    "doctor",
    "appointment",
    "month",
    "day",
    "interval",
    "change_name",
    "approve",
    "del_r",
    "back",
];

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed token {token:?}: {source}")]
    Malformed {
        token: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackTo {
    Doctors,
    Appointments,
    Calendar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Action {
    #[serde(rename = "noop")]
    Noop,
    /// `doctor_id == 0` значит "врач из черновика".
    #[serde(rename = "doctor")]
    SelectDoctor {
        #[serde(rename = "d")]
        doctor_id: i64,
    },
    #[serde(rename = "appointment")]
    Appointment {
        #[serde(rename = "a")]
        appointment_id: i64,
    },
    #[serde(rename = "month")]
    SwitchMonth {
        #[serde(rename = "m")]
        month: YearMonth,
        #[serde(rename = "d")]
        doctor_id: i64,
    },
    #[serde(rename = "day")]
    Day {
        #[serde(rename = "dt", with = "day_format")]
        date: NaiveDate,
        #[serde(rename = "s", default)]
        page: usize,
    },
    #[serde(rename = "interval")]
    Interval {
        #[serde(rename = "s", with = "time_format")]
        start: NaiveTime,
    },
    #[serde(rename = "change_name")]
    ChangeName,
    #[serde(rename = "approve")]
    Approve,
    #[serde(rename = "del_r")]
    DeleteRecord {
        #[serde(rename = "r")]
        record_id: i64,
    },
    #[serde(rename = "back")]
    Back {
        #[serde(rename = "b")]
        to: BackTo,
    },
}

#[derive(Deserialize)]
struct Envelope {
    command: String,
}

impl Action {
    pub fn encode(&self) -> String {
        // Все поля скалярные, сериализация не падает
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"command":"noop"}"#.to_string())
    }

    /// Сначала читаем только `command`, потом разбираем конкретную форму.
    pub fn decode(token: &str) -> Result<Self, ProtocolError> {
        let malformed = |source| ProtocolError::Malformed {
            token: token.to_string(),
            source,
        };

        let envelope: Envelope = serde_json::from_str(token).map_err(malformed)?;
        if !COMMANDS.contains(&envelope.command.as_str()) {
            return Err(ProtocolError::UnknownCommand(envelope.command));
        }
        serde_json::from_str(token).map_err(malformed)
    }

    pub fn command(&self) -> &'static str {
        match self {
            Action::Noop => "noop",
            Action::SelectDoctor { .. } => "doctor",
            Action::Appointment { .. } => "appointment",
            Action::SwitchMonth { .. } => "month",
            Action::Day { .. } => "day",
            Action::Interval { .. } => "interval",
            Action::ChangeName => "change_name",
            Action::Approve => "approve",
            Action::DeleteRecord { .. } => "del_r",
            Action::Back { .. } => "back",
        }
    }
}

mod day_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y.%m.%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

mod time_format {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        crate::crm::entities::parse_time(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad time {raw:?}")))
    }
}
