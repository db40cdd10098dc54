use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

const DEFAULT_DENTAL_PRO_URL: &str = "https://olimp.crm3.dental-pro.online/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Настройки процесса, собранные из окружения (и `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub database_url: Option<String>,
    pub crm: CrmConfig,
    pub booking: BookingSettings,
    pub session_ttl: Duration,
    pub session_sweep_interval: Duration,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub base_url: String,
    pub token: String,
    pub secret: String,
    pub request_timeout: Duration,
    pub rate_limit: RateLimitPolicy,
    /// Работать с данными из `fixtures/crm` вместо Dental Pro.
    pub test_mode: bool,
}

/// Параметры лимита CRM: окно ожидания после 429 и число попыток.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub cooldown: Duration,
    pub max_attempts: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(3),
            max_attempts: 5,
        }
    }
}

/// То, что нужно обработчикам записи: филиал, часовой пояс клиники и отсечка.
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub branch_id: i64,
    pub clinic_offset: FixedOffset,
    pub cutoff: chrono::Duration,
    pub default_tick_minutes: u32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            branch_id: 3,
            // Europe/Moscow, без перехода на летнее время
            clinic_offset: FixedOffset::east_opt(3 * 3600).unwrap_or(Utc.fix()),
            cutoff: chrono::Duration::minutes(15),
            default_tick_minutes: 15,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_token =
            env::var("TELEGRAM_BOT_TOKEN").map_err(|_| ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let offset_hours: i32 = parse_or("CLINIC_UTC_OFFSET_HOURS", 3)?;
        let clinic_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or(ConfigError::Invalid {
            name: "CLINIC_UTC_OFFSET_HOURS",
            value: offset_hours.to_string(),
        })?;

        let crm = CrmConfig {
            base_url: env::var("DENTAL_PRO_URL").unwrap_or_else(|_| DEFAULT_DENTAL_PRO_URL.to_string()),
            token: env::var("DENTAL_PRO_TOKEN").unwrap_or_default(),
            secret: env::var("DENTAL_PRO_SECRET").unwrap_or_default(),
            request_timeout: Duration::from_secs(parse_or("CRM_TIMEOUT_SECS", 10)?),
            rate_limit: RateLimitPolicy {
                cooldown: Duration::from_secs(parse_or("CRM_COOLDOWN_SECS", 3)?),
                max_attempts: parse_or::<u32>("CRM_MAX_ATTEMPTS", 5)?.max(1),
            },
            test_mode: parse_or("CRM_TEST_MODE", false)?,
        };

        let booking = BookingSettings {
            branch_id: parse_or("BRANCH_ID", 3)?,
            clinic_offset,
            cutoff: chrono::Duration::minutes(parse_or("BOOKING_CUTOFF_MINUTES", 15)?),
            default_tick_minutes: parse_or::<u32>("DEFAULT_TICK_MINUTES", 15)?.max(1),
        };

        Ok(Self {
            telegram_token,
            database_url,
            crm,
            booking,
            session_ttl: Duration::from_secs(parse_or::<u64>("SESSION_TTL_HOURS", 24)? * 3600),
            session_sweep_interval: Duration::from_secs(parse_or::<u64>("SESSION_SWEEP_MINUTES", 60)? * 60),
            shutdown_timeout: Duration::from_secs(parse_or("SHUTDOWN_TIMEOUT_SECS", 5)?),
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}
