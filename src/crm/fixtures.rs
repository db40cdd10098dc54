//! Dental Pro без сети: врачи, приемы и расписание из JSON в `fixtures/crm`.
//!
//! Пациенты и записи живут в памяти процесса.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::crm::entities::DaySlot;
use crate::crm::{
    crm_phone, Appointment, CrmClient, CrmError, DayInterval, Doctor, NewRecord, Patient, Record, ShortRecord,
    TimeRange,
};

const DOCTORS: &str = include_str!("../../fixtures/crm/doctors.json");
const APPOINTMENTS: &str = include_str!("../../fixtures/crm/appointments.json");
const TIMETABLE: &str = include_str!("../../fixtures/crm/timetable.json");

/// Рабочий день врача: смены режутся на тики одной длины.
#[derive(Debug, Clone, Deserialize)]
pub struct Timetable {
    pub tick_minutes: u32,
    /// Выходные, 1 = понедельник.
    #[serde(default)]
    pub days_off: Vec<u32>,
    pub shifts: Vec<TimeRange>,
}

impl Timetable {
    fn works_on(&self, date: NaiveDate) -> bool {
        !self.days_off.contains(&date.weekday().number_from_monday())
    }

    fn ticks(&self) -> Vec<TimeRange> {
        let step = Duration::minutes(i64::from(self.tick_minutes.max(1)));
        let mut ticks = Vec::new();
        for shift in &self.shifts {
            let mut begin = shift.begin;
            while begin < shift.end {
                let end = begin + step;
                // Переход через полночь или хвост короче тика
                if end <= begin || end > shift.end {
                    break;
                }
                ticks.push(TimeRange { begin, end });
                begin = end;
            }
        }
        ticks
    }
}

struct Booked {
    client_id: i64,
    record: NewRecord,
    id: i64,
}

#[derive(Default)]
struct Storage {
    patients: Vec<Patient>,
    booked: Vec<Booked>,
    next_patient_id: i64,
    next_record_id: i64,
}

pub struct FixtureCrm {
    doctors: Vec<Doctor>,
    appointments: Vec<Appointment>,
    timetable: Timetable,
    storage: Mutex<Storage>,
}

impl FixtureCrm {
    /// Данные, вшитые в бинарник.
    pub fn bundled() -> Result<Self, CrmError> {
        Ok(Self::new(
            serde_json::from_str(DOCTORS)?,
            serde_json::from_str(APPOINTMENTS)?,
            serde_json::from_str(TIMETABLE)?,
        ))
    }

    pub fn new(doctors: Vec<Doctor>, mut appointments: Vec<Appointment>, timetable: Timetable) -> Self {
        appointments.sort_by_key(|appointment| appointment.time);
        Self {
            doctors,
            appointments,
            timetable,
            storage: Mutex::new(Storage {
                next_patient_id: 500,
                next_record_id: 1000,
                ..Storage::default()
            }),
        }
    }

    fn doctor(&self, doctor_id: i64) -> Option<&Doctor> {
        self.doctors.iter().find(|doctor| doctor.id == doctor_id)
    }
}

fn overlaps(tick: &TimeRange, record: &NewRecord) -> bool {
    tick.begin < record.time_end && record.time_start < tick.end
}

#[async_trait]
impl CrmClient for FixtureCrm {
    async fn doctors_list(&self) -> Result<Vec<Doctor>, CrmError> {
        Ok(self.doctors.clone())
    }

    async fn available_appointments(&self, _client_id: i64, doctor_id: i64) -> Result<Vec<Appointment>, CrmError> {
        if self.doctor(doctor_id).is_none() {
            return Err(CrmError::not_found(format!("doctor {doctor_id} not found")));
        }
        Ok(self.appointments.clone())
    }

    async fn free_intervals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        doctor_id: i64,
        branch_id: i64,
        _duration: u32,
    ) -> Result<Vec<DayInterval>, CrmError> {
        let Some(doctor) = self.doctor(doctor_id).filter(|doctor| doctor.works_in_branch(branch_id)) else {
            return Ok(Vec::new());
        };

        let storage = self.storage.lock().await;
        let ticks = self.timetable.ticks();
        let mut intervals = Vec::new();

        for date in start.iter_days().take_while(|date| *date <= end) {
            if !self.timetable.works_on(date) {
                continue;
            }
            let busy: Vec<&NewRecord> = storage
                .booked
                .iter()
                .map(|booked| &booked.record)
                .filter(|record| record.doctor_id == doctor_id && record.date == date)
                .collect();
            let time: Vec<TimeRange> = ticks
                .iter()
                .filter(|tick| !busy.iter().any(|record| overlaps(tick, record)))
                .copied()
                .collect();
            if time.is_empty() {
                continue;
            }

            intervals.push(DayInterval {
                date,
                slots: vec![DaySlot {
                    doctor_id: doctor.id.to_string(),
                    doctor_name: doctor.fio.clone(),
                    time,
                }],
            });
        }

        Ok(intervals)
    }

    async fn create_record(&self, record: NewRecord) -> Result<Record, CrmError> {
        let mut storage = self.storage.lock().await;
        let taken = storage.booked.iter().any(|booked| {
            booked.record.doctor_id == record.doctor_id
                && booked.record.date == record.date
                && booked.record.time_start < record.time_end
                && record.time_start < booked.record.time_end
        });
        if taken {
            return Err(CrmError::Request {
                status: 409,
                message: "time is already taken".to_string(),
            });
        }

        let id = storage.next_record_id;
        storage.next_record_id += 1;
        let created = Record {
            id,
            date: record.date,
            time_begin: record.time_start,
            time_end: record.time_end,
        };
        log::info!("🧪 Fixture record {} created for client {}", id, record.client_id);
        storage.booked.push(Booked {
            client_id: record.client_id,
            record,
            id,
        });
        Ok(created)
    }

    async fn patient_records(&self, client_id: i64) -> Result<Vec<ShortRecord>, CrmError> {
        let storage = self.storage.lock().await;
        Ok(storage
            .booked
            .iter()
            .filter(|booked| booked.client_id == client_id)
            .map(|booked| {
                let doctor = self.doctor(booked.record.doctor_id);
                let appointment = self
                    .appointments
                    .iter()
                    .find(|appointment| appointment.id == booked.record.appointment_id);
                ShortRecord {
                    id: booked.id,
                    date_start: booked.record.date.and_time(booked.record.time_start),
                    doctor_id: booked.record.doctor_id,
                    doctor_name: doctor.map(|d| d.fio.clone()).unwrap_or_default(),
                    doctor_department: doctor.map(Doctor::departments_label).unwrap_or_default(),
                    appointment_name: appointment.map(|a| a.name.clone()).unwrap_or_default(),
                    duration: (booked.record.time_end - booked.record.time_start).num_minutes(),
                }
            })
            .collect())
    }

    async fn delete_record(&self, record_id: i64) -> Result<(), CrmError> {
        let mut storage = self.storage.lock().await;
        let before = storage.booked.len();
        storage.booked.retain(|booked| booked.id != record_id);
        if storage.booked.len() == before {
            return Err(CrmError::not_found(format!("record {record_id} not found")));
        }
        Ok(())
    }

    async fn patient_by_phone(&self, phone: &str) -> Result<Patient, CrmError> {
        let phone = crm_phone(phone);
        self.storage
            .lock()
            .await
            .patients
            .iter()
            .find(|patient| patient.phone == phone)
            .cloned()
            .ok_or_else(|| CrmError::not_found(format!("patient with phone {phone} not found")))
    }

    async fn create_patient(&self, name: &str, surname: &str, phone: &str) -> Result<Patient, CrmError> {
        let mut storage = self.storage.lock().await;
        let patient = Patient {
            external_id: storage.next_patient_id,
            name: name.to_string(),
            surname: surname.to_string(),
            phone: crm_phone(phone),
        };
        storage.next_patient_id += 1;
        storage.patients.push(patient.clone());
        Ok(patient)
    }

    async fn edit_patient(&self, patient: &Patient) -> Result<(), CrmError> {
        let mut storage = self.storage.lock().await;
        match storage
            .patients
            .iter_mut()
            .find(|stored| stored.external_id == patient.external_id)
        {
            Some(stored) => {
                *stored = patient.clone();
                Ok(())
            }
            None => Err(CrmError::not_found(format!("patient {} not found", patient.external_id))),
        }
    }
}
