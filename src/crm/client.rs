use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::config::{CrmConfig, RateLimitPolicy};
use crate::crm::entities::{ApiResponse, CrmUser};
use crate::crm::{crm_phone, Appointment, CrmClient, CrmError, DayInterval, Doctor, NewRecord, Patient, Record, ShortRecord};

/// HTTP-клиент Dental Pro.
///
/// Все запросы идут строго по одному: мьютекс держится на время всех попыток
/// одного вызова. После ответа 429 следующий запрос (любой) ждет, пока не
/// пройдет `cooldown` с момента этого ответа.
pub struct DentalProClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    secret: String,
    policy: RateLimitPolicy,
    last_throttled: Mutex<Option<Instant>>,
}

#[derive(Debug, Default, Deserialize)]
struct EditResult {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: String,
}

impl DentalProClient {
    pub fn new(config: &CrmConfig) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            secret: config.secret.clone(),
            policy: config.rate_limit,
            last_throttled: Mutex::new(None),
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T, CrmError> {
        let mut last_throttled = self.last_throttled.lock().await;

        for attempt in 1..=self.policy.max_attempts {
            if let Some(throttled_at) = *last_throttled {
                let ready_at = throttled_at + self.policy.cooldown;
                if ready_at > Instant::now() {
                    sleep_until(ready_at).await;
                }
            }

            match self.try_post(path, params).await {
                Err(CrmError::Request { status, .. }) if status == StatusCode::TOO_MANY_REQUESTS.as_u16() => {
                    log::warn!(
                        "⏳ CRM throttled {} (attempt {}/{})",
                        path,
                        attempt,
                        self.policy.max_attempts
                    );
                    *last_throttled = Some(Instant::now());
                }
                result => return result,
            }
        }

        log::error!("CRM still throttling {} after {} attempts", path, self.policy.max_attempts);
        Err(CrmError::RateLimited {
            attempts: self.policy.max_attempts,
        })
    }

    async fn try_post<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T, CrmError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));

        let response = self
            .http
            .post(url)
            .header("Accept", "application/json")
            .query(params)
            .query(&[("token", self.token.as_str()), ("secret", self.secret.as_str())])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status != StatusCode::OK && status != StatusCode::CREATED {
            log::debug!("CRM {} returned {}", path, status);
            return Err(CrmError::Request {
                status: status.as_u16(),
                message: text,
            });
        }

        let envelope = serde_json::from_str::<ApiResponse<T>>(&text)?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl CrmClient for DentalProClient {
    async fn doctors_list(&self) -> Result<Vec<Doctor>, CrmError> {
        self.post("api/mobile/doctor/list", &[]).await
    }

    async fn available_appointments(&self, client_id: i64, doctor_id: i64) -> Result<Vec<Appointment>, CrmError> {
        let params = [
            ("userID", client_id.to_string()),
            ("isPlanned", "0".to_string()),
            ("doctorIDS[]", doctor_id.to_string()),
        ];
        let data: serde_json::Value = self.post("api/mobile/records/appointmentsList", &params).await?;

        // Пустой ответ приходит массивом, а не объектом
        let mut appointments = Vec::new();
        if let serde_json::Value::Object(by_doctor) = data {
            for doctor_appointments in by_doctor.into_values() {
                if let serde_json::Value::Object(by_id) = doctor_appointments {
                    for appointment in by_id.into_values() {
                        appointments.push(serde_json::from_value::<Appointment>(appointment)?);
                    }
                }
            }
        }
        appointments.sort_by_key(|a| (a.time, a.id));
        Ok(appointments)
    }

    async fn free_intervals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        doctor_id: i64,
        branch_id: i64,
        duration: u32,
    ) -> Result<Vec<DayInterval>, CrmError> {
        let params = [
            ("date_start", start.format("%Y-%m-%d").to_string()),
            ("date_end", end.format("%Y-%m-%d").to_string()),
            ("department_id", "-1".to_string()),
            ("doctor_id", doctor_id.to_string()),
            ("branch_id", branch_id.to_string()),
            ("duration", duration.to_string()),
        ];
        self.post("api/twin/freetimeintervals", &params).await
    }

    async fn create_record(&self, record: NewRecord) -> Result<Record, CrmError> {
        let params = [
            ("date", record.date.format("%Y-%m-%d").to_string()),
            ("time_start", record.time_start.format("%H:%M:%S").to_string()),
            ("time_end", record.time_end.format("%H:%M:%S").to_string()),
            ("doctor_id", record.doctor_id.to_string()),
            ("client_id", record.client_id.to_string()),
            ("appointment_id", record.appointment_id.to_string()),
            ("is_planned", "0".to_string()),
        ];
        let created: Option<Record> = self.post("api/records/create", &params).await?;
        created.ok_or_else(|| CrmError::Request {
            status: StatusCode::BAD_GATEWAY.as_u16(),
            message: "records/create returned no record".to_string(),
        })
    }

    async fn patient_records(&self, client_id: i64) -> Result<Vec<ShortRecord>, CrmError> {
        let params = [("client_id", client_id.to_string())];
        let mut records: Vec<ShortRecord> = self.post("api/i/client/records", &params).await?;
        for record in &mut records {
            record.duration /= 60;
        }
        Ok(records)
    }

    async fn delete_record(&self, record_id: i64) -> Result<(), CrmError> {
        let params = [("mediline_record_id", record_id.to_string())];
        let _: serde_json::Value = self.post("api/records/deleteMedilineRecord", &params).await?;
        Ok(())
    }

    async fn patient_by_phone(&self, phone: &str) -> Result<Patient, CrmError> {
        let phone = crm_phone(phone);
        let params = [("phone", phone.clone())];
        let data: serde_json::Value = self.post("api/client_by_phone", &params).await?;

        let serde_json::Value::Object(users) = data else {
            return Err(CrmError::not_found(format!("patient with phone {phone} not found")));
        };
        let Some(user) = users.into_values().next() else {
            return Err(CrmError::not_found(format!("patient with phone {phone} not found")));
        };
        let user: CrmUser = serde_json::from_value(user)?;
        user.into_patient().ok_or_else(|| CrmError::Request {
            status: StatusCode::BAD_GATEWAY.as_u16(),
            message: format!("patient with phone {phone} has malformed id"),
        })
    }

    async fn create_patient(&self, name: &str, surname: &str, phone: &str) -> Result<Patient, CrmError> {
        let params = [
            ("name", name.to_string()),
            ("surname", surname.to_string()),
            ("phone", crm_phone(phone)),
        ];
        self.post("api/records/createClient", &params).await
    }

    async fn edit_patient(&self, patient: &Patient) -> Result<(), CrmError> {
        let params = [
            ("clientID", patient.external_id.to_string()),
            ("name", patient.name.clone()),
            ("surname", patient.surname.clone()),
            ("phone", crm_phone(&patient.phone)),
        ];
        let result: EditResult = self.post("api/records/editClient", &params).await?;
        if !result.status {
            return Err(CrmError::Request {
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                message: result.message,
            });
        }
        Ok(())
    }
}
