use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::crm::Patient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub tg_user_id: i64,
    pub dental_pro_id: Option<i64>,
    pub name: Option<String>,
    pub lastname: Option<String>,
    /// Всегда в виде `+цифры`.
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|phone| phone.len() > 1)
    }

    /// Имя для экранов записи: сначала из CRM, потом из нашей базы.
    pub fn first_name<'a>(&'a self, patient: Option<&'a Patient>) -> &'a str {
        patient
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty())
            .or(self.name.as_deref())
            .unwrap_or_default()
    }

    pub fn last_name<'a>(&'a self, patient: Option<&'a Patient>) -> &'a str {
        patient
            .map(|p| p.surname.as_str())
            .filter(|surname| !surname.is_empty())
            .or(self.lastname.as_deref())
            .unwrap_or_default()
    }
}

/// Кэш врача: имя нужно на экранах, где в CRM не ходим.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Doctor {
    pub id: i64,
    pub fio: String,
}

pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("+{digits}")
}
