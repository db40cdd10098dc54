use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{self, Instant};

use crate::calendar::clinic_now;
use crate::config::BookingSettings;
use crate::crm::CrmClient;
use crate::database::Repository;
use crate::messenger::Messenger;
use crate::models::Session;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Сессии чатов в памяти.
///
/// Карта закрыта общим мьютексом только на время поиска и удаления,
/// каждая сессия закрыта своим мьютексом на весь ход. Пока кто-то
/// держит `SharedSession`, выданную `get_or_create`, сессия не удаляется.
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, SharedSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get_or_create(&self, chat_id: i64) -> SharedSession {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(Instant::now()))))
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Удаляет сессии, простаивающие дольше TTL. Занятые ходом не трогаем.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut sessions = self.sessions.lock().await;
        let previous_count = sessions.len();

        sessions.retain(|_, shared| {
            // Новую ссылку можно получить только под замком карты
            if Arc::strong_count(shared) > 1 {
                return true;
            }
            match shared.try_lock() {
                Ok(session) => session.idle_for(now) <= ttl,
                Err(_) => true,
            }
        });

        let current_count = sessions.len();
        log::debug!("🧹 Sessions swept: {} -> {}", previous_count, current_count);
        previous_count - current_count
    }

    pub async fn run_sweeper(self: Arc<Self>, every: Duration) {
        let mut interval = time::interval(every);
        // Первый тик срабатывает сразу
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = self.sweep_at(Instant::now()).await;
            if removed > 0 {
                log::info!("🧹 Removed {} idle sessions", removed);
            }
        }
    }
}

#[derive(Clone)]
pub struct BotState {
    pub sessions: Arc<SessionStore>,
    pub repo: Arc<dyn Repository>,
    pub crm: Arc<dyn CrmClient>,
    pub messenger: Arc<dyn Messenger>,
    pub settings: BookingSettings,
    pub clock: Arc<dyn Clock>,
}

impl BotState {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clinic_now(&self) -> NaiveDateTime {
        clinic_now(self.clock.now(), &self.settings)
    }

    pub fn today(&self) -> NaiveDate {
        self.clinic_now().date()
    }
}
