use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Общая обертка всех ответов Dental Pro.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub status: bool,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    #[serde(default)]
    pub fio: String,
    #[serde(default)]
    pub branches: HashMap<String, String>,
    #[serde(default)]
    pub departments: HashMap<String, String>,
    #[serde(default)]
    pub is_hidden: bool,
}

impl Doctor {
    pub fn works_in_branch(&self, branch_id: i64) -> bool {
        self.branches.contains_key(&branch_id.to_string())
    }

    /// Отделения по возрастанию ключа, через запятую. Числовые ключи
    /// сравниваются как числа и идут раньше остальных.
    pub fn departments_label(&self) -> String {
        let mut keys: Vec<&String> = self.departments.keys().collect();
        keys.sort_by_key(|key| (key.parse::<i64>().map_err(drop), *key));
        keys.into_iter()
            .map(|key| self.departments[key].as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub name: String,
    /// Длительность приема в минутах.
    pub time: u32,
    #[serde(default)]
    pub cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patient {
    #[serde(rename = "externalID", default)]
    pub external_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub phone: String,
}

/// Пациент в формате `client_by_phone`.
#[derive(Debug, Deserialize)]
pub(crate) struct CrmUser {
    #[serde(rename = "idClient")]
    pub id_client: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(rename = "contactInformation", default)]
    pub contact_information: ContactInformation,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContactInformation {
    #[serde(rename = "mobilePhone", default)]
    pub mobile_phone: String,
}

impl CrmUser {
    pub fn into_patient(self) -> Option<Patient> {
        let external_id = self.id_client.trim().parse().ok()?;
        Some(Patient {
            external_id,
            name: self.name,
            surname: self.surname,
            phone: self.contact_information.mobile_phone,
        })
    }
}

/// Элементарный тик свободного времени врача.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(deserialize_with = "de_time")]
    pub begin: NaiveTime,
    #[serde(deserialize_with = "de_time")]
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySlot {
    #[serde(default)]
    pub doctor_id: String,
    #[serde(default)]
    pub doctor_name: String,
    #[serde(default)]
    pub time: Vec<TimeRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayInterval {
    pub date: NaiveDate,
    #[serde(default)]
    pub slots: Vec<DaySlot>,
}

impl DayInterval {
    pub fn ticks(&self) -> Vec<TimeRange> {
        self.slots.iter().flat_map(|slot| slot.time.iter().copied()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(deserialize_with = "de_time")]
    pub time_begin: NaiveTime,
    #[serde(deserialize_with = "de_time")]
    pub time_end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortRecord {
    pub id: i64,
    #[serde(rename = "dateStart", deserialize_with = "de_datetime")]
    pub date_start: NaiveDateTime,
    #[serde(rename = "doctorID")]
    pub doctor_id: i64,
    #[serde(rename = "doctorName", default)]
    pub doctor_name: String,
    #[serde(rename = "doctorDepartment", default)]
    pub doctor_department: String,
    #[serde(rename = "appointmentName", default)]
    pub appointment_name: String,
    /// В ответе CRM секунды, после загрузки минуты.
    #[serde(default)]
    pub duration: i64,
}

/// Параметры `records/create`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub date: NaiveDate,
    pub time_start: NaiveTime,
    pub time_end: NaiveTime,
    pub doctor_id: i64,
    pub client_id: i64,
    pub appointment_id: i64,
}

fn de_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad time {raw:?}")))
}

fn de_datetime<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|e| serde::de::Error::custom(format!("bad datetime {raw:?}: {e}")))
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}
