use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{DbError, Repository};
use crate::models::{normalize_phone, BookingDraft, Doctor, DraftKey, User};

/// Хранилище в памяти процесса: для запуска без `DATABASE_URL` и для тестов.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    next_user_id: i64,
    users: HashMap<i64, User>,
    drafts: HashMap<DraftKey, BookingDraft>,
    doctors: HashMap<i64, Doctor>,
}

impl Tables {
    fn user_entry(&mut self, tg_user_id: i64) -> &mut User {
        let next_id = &mut self.next_user_id;
        self.users.entry(tg_user_id).or_insert_with(|| {
            *next_id += 1;
            User {
                id: *next_id,
                tg_user_id,
                dental_pro_id: None,
                name: None,
                lastname: None,
                phone: None,
                created_at: Utc::now(),
            }
        })
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_or_create_user(&self, tg_user_id: i64) -> Result<User, DbError> {
        let mut tables = self.inner.write().await;
        Ok(tables.user_entry(tg_user_id).clone())
    }

    async fn get_user(&self, tg_user_id: i64) -> Result<Option<User>, DbError> {
        Ok(self.inner.read().await.users.get(&tg_user_id).cloned())
    }

    async fn upsert_user_phone(&self, tg_user_id: i64, phone: &str) -> Result<(), DbError> {
        let mut tables = self.inner.write().await;
        tables.user_entry(tg_user_id).phone = Some(normalize_phone(phone));
        Ok(())
    }

    async fn update_user_name(&self, tg_user_id: i64, name: &str, lastname: &str) -> Result<(), DbError> {
        let mut tables = self.inner.write().await;
        let user = tables.users.get_mut(&tg_user_id).ok_or(DbError::UserNotFound(tg_user_id))?;
        user.name = Some(name.to_string());
        user.lastname = Some(lastname.to_string());
        Ok(())
    }

    async fn update_dental_pro_id(&self, tg_user_id: i64, dental_pro_id: i64) -> Result<(), DbError> {
        let mut tables = self.inner.write().await;
        let user = tables.users.get_mut(&tg_user_id).ok_or(DbError::UserNotFound(tg_user_id))?;
        user.dental_pro_id = Some(dental_pro_id);
        Ok(())
    }

    async fn get_draft(&self, key: &DraftKey) -> Result<Option<BookingDraft>, DbError> {
        Ok(self.inner.read().await.drafts.get(key).cloned())
    }

    async fn save_draft(&self, draft: &BookingDraft) -> Result<(), DbError> {
        self.inner.write().await.drafts.insert(draft.key(), draft.clone());
        Ok(())
    }

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, DbError> {
        Ok(self.inner.read().await.doctors.get(&id).cloned())
    }

    async fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), DbError> {
        self.inner.write().await.doctors.insert(doctor.id, doctor.clone());
        Ok(())
    }
}
