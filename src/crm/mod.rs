pub mod client;
pub mod entities;
pub mod fixtures;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;

pub use client::DentalProClient;
pub use fixtures::FixtureCrm;
pub use entities::{Appointment, DayInterval, Doctor, NewRecord, Patient, Record, ShortRecord, TimeRange};

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    /// CRM продолжала отвечать 429 после всех попыток.
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("request failed with status {status}: {message}")]
    Request { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CrmError {
    pub fn not_found(message: impl Into<String>) -> Self {
        CrmError::Request {
            status: StatusCode::NOT_FOUND.as_u16(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CrmError::Request { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CrmError::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            CrmError::Request { status, .. } => Some(*status),
            CrmError::Transport(e) => e.status().map(|s| s.as_u16()),
            CrmError::Decode(_) => None,
        }
    }
}

/// Внешняя система расписания (Dental Pro).
#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn doctors_list(&self) -> Result<Vec<Doctor>, CrmError>;

    /// Типы приемов, доступные к записи у врача, по возрастанию длительности.
    async fn available_appointments(&self, client_id: i64, doctor_id: i64) -> Result<Vec<Appointment>, CrmError>;

    async fn free_intervals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        doctor_id: i64,
        branch_id: i64,
        duration: u32,
    ) -> Result<Vec<DayInterval>, CrmError>;

    async fn create_record(&self, record: NewRecord) -> Result<Record, CrmError>;

    async fn patient_records(&self, client_id: i64) -> Result<Vec<ShortRecord>, CrmError>;

    async fn delete_record(&self, record_id: i64) -> Result<(), CrmError>;

    /// Ошибка с `is_not_found()`, если пациента с таким телефоном нет.
    async fn patient_by_phone(&self, phone: &str) -> Result<Patient, CrmError>;

    async fn create_patient(&self, name: &str, surname: &str, phone: &str) -> Result<Patient, CrmError>;

    async fn edit_patient(&self, patient: &Patient) -> Result<(), CrmError>;
}

/// Телефон в виде, который понимает CRM: только цифры.
pub fn crm_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}
