pub mod memory;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::models::{normalize_phone, BookingDraft, Doctor, DraftKey, User};

pub use memory::InMemoryRepository;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("user {0} not found")]
    UserNotFound(i64),
}

/// Хранилище пользователей, черновиков записи и кэша врачей.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_or_create_user(&self, tg_user_id: i64) -> Result<User, DbError>;

    async fn get_user(&self, tg_user_id: i64) -> Result<Option<User>, DbError>;

    /// Создает пользователя, если его еще нет. Телефон нормализуется.
    async fn upsert_user_phone(&self, tg_user_id: i64, phone: &str) -> Result<(), DbError>;

    async fn update_user_name(&self, tg_user_id: i64, name: &str, lastname: &str) -> Result<(), DbError>;

    async fn update_dental_pro_id(&self, tg_user_id: i64, dental_pro_id: i64) -> Result<(), DbError>;

    async fn get_draft(&self, key: &DraftKey) -> Result<Option<BookingDraft>, DbError>;

    /// Upsert по (user, chat, message).
    async fn save_draft(&self, draft: &BookingDraft) -> Result<(), DbError>;

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, DbError>;

    async fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), DbError>;
}

#[derive(Clone, Debug)]
pub struct Database {
    pub pool: PgPool,
}

const USER_COLUMNS: &str = "id, tg_user_id, dental_pro_id, name, lastname, phone, created_at";

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn init(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                tg_user_id BIGINT NOT NULL UNIQUE,
                dental_pro_id BIGINT,
                name TEXT,
                lastname TEXT,
                phone TEXT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS doctors (
                id BIGINT PRIMARY KEY,
                fio TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Черновик живет, пока живо сообщение с клавиатурой
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS booking_drafts (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users (id),
                chat_id BIGINT NOT NULL,
                message_id INTEGER NOT NULL,
                doctor_id BIGINT,
                appointment_id BIGINT,
                date DATE,
                start_time TIME,
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                UNIQUE (user_id, chat_id, message_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_booking_drafts_user ON booking_drafts (user_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Repository for Database {
    async fn get_or_create_user(&self, tg_user_id: i64) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (tg_user_id) VALUES ($1)
             ON CONFLICT (tg_user_id) DO UPDATE SET tg_user_id = EXCLUDED.tg_user_id
             RETURNING {USER_COLUMNS}"
        ))
        .bind(tg_user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, tg_user_id: i64) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE tg_user_id = $1"))
            .bind(tg_user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn upsert_user_phone(&self, tg_user_id: i64, phone: &str) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO users (tg_user_id, phone) VALUES ($1, $2)
             ON CONFLICT (tg_user_id) DO UPDATE SET phone = EXCLUDED.phone",
        )
        .bind(tg_user_id)
        .bind(normalize_phone(phone))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_user_name(&self, tg_user_id: i64, name: &str, lastname: &str) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE users SET name = $1, lastname = $2 WHERE tg_user_id = $3")
            .bind(name)
            .bind(lastname)
            .bind(tg_user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::UserNotFound(tg_user_id));
        }
        Ok(())
    }

    async fn update_dental_pro_id(&self, tg_user_id: i64, dental_pro_id: i64) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE users SET dental_pro_id = $1 WHERE tg_user_id = $2")
            .bind(dental_pro_id)
            .bind(tg_user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::UserNotFound(tg_user_id));
        }
        Ok(())
    }

    async fn get_draft(&self, key: &DraftKey) -> Result<Option<BookingDraft>, DbError> {
        let draft = sqlx::query_as::<_, BookingDraft>(
            "SELECT user_id, chat_id, message_id, doctor_id, appointment_id, date, start_time
             FROM booking_drafts
             WHERE user_id = $1 AND chat_id = $2 AND message_id = $3",
        )
        .bind(key.user_id)
        .bind(key.chat_id)
        .bind(key.message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(draft)
    }

    async fn save_draft(&self, draft: &BookingDraft) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO booking_drafts
            (user_id, chat_id, message_id, doctor_id, appointment_id, date, start_time, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (user_id, chat_id, message_id)
            DO UPDATE SET
                doctor_id = EXCLUDED.doctor_id,
                appointment_id = EXCLUDED.appointment_id,
                date = EXCLUDED.date,
                start_time = EXCLUDED.start_time,
                updated_at = NOW()
            "#,
        )
        .bind(draft.user_id)
        .bind(draft.chat_id)
        .bind(draft.message_id)
        .bind(draft.doctor_id)
        .bind(draft.appointment_id)
        .bind(draft.date)
        .bind(draft.start_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, DbError> {
        let doctor = sqlx::query_as::<_, Doctor>("SELECT id, fio FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(doctor)
    }

    async fn upsert_doctor(&self, doctor: &Doctor) -> Result<(), DbError> {
        sqlx::query("INSERT INTO doctors (id, fio) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET fio = EXCLUDED.fio")
            .bind(doctor.id)
            .bind(&doctor.fio)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
