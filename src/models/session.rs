use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::time::Instant;

use super::DraftKey;

/// Что продолжить после того, как пользователь прислал телефон.
#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
    Record,
    ShowRecords,
    DeleteRecords,
    ConfirmDeletion { record_id: i64 },
    ApproveDraft(DraftKey),
}

/// Ожидание ответа пользователя на следующем сообщении.
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    AwaitingPhone {
        resume: Resume,
    },
    AwaitingFirstName {
        resume: Option<DraftKey>,
    },
    AwaitingLastName {
        first_name: String,
        resume: Option<DraftKey>,
    },
    AwaitingDeleteConfirmation {
        record_id: i64,
        starts_at: NaiveDateTime,
        doctor_name: String,
    },
}

impl Continuation {
    pub fn name(&self) -> &'static str {
        match self {
            Continuation::AwaitingPhone { .. } => "awaiting_phone",
            Continuation::AwaitingFirstName { .. } => "awaiting_first_name",
            Continuation::AwaitingLastName { .. } => "awaiting_last_name",
            Continuation::AwaitingDeleteConfirmation { .. } => "awaiting_delete_confirmation",
        }
    }
}

/// Состояние одного чата.
///
/// `generation` растет при каждой установке продолжения, по нему роутер
/// понимает, поставил ли обработчик новое ожидание за время хода.
#[derive(Debug)]
pub struct Session {
    continuation: Option<Continuation>,
    generation: u64,
    last_activity: Instant,
}

impl Session {
    pub fn new(now: Instant) -> Self {
        Self {
            continuation: None,
            generation: 0,
            last_activity: now,
        }
    }

    pub fn install(&mut self, continuation: Continuation) {
        self.continuation = Some(continuation);
        self.generation += 1;
        self.last_activity = Instant::now();
    }

    pub fn clear(&mut self) {
        self.continuation = None;
        self.generation += 1;
    }

    /// Забирает продолжение для запуска. Поколение не меняется.
    pub fn take(&mut self) -> Option<Continuation> {
        self.continuation.take()
    }

    pub fn continuation(&self) -> Option<&Continuation> {
        self.continuation.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Сбрасывает продолжение, если за ход не было новой установки.
    pub fn expire_unless_reinstalled(&mut self, generation: u64) {
        if self.generation == generation {
            self.continuation = None;
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinstall_survives_expiry() {
        let mut session = Session::new(Instant::now());
        session.install(Continuation::AwaitingFirstName { resume: None });

        let generation = session.generation();
        let taken = session.take();
        assert!(matches!(taken, Some(Continuation::AwaitingFirstName { .. })));

        session.install(Continuation::AwaitingLastName {
            first_name: "Иван".to_string(),
            resume: None,
        });
        session.expire_unless_reinstalled(generation);
        assert_eq!(session.continuation().map(Continuation::name), Some("awaiting_last_name"));
    }

    #[test]
    fn untouched_continuation_expires() {
        let mut session = Session::new(Instant::now());
        session.install(Continuation::AwaitingFirstName { resume: None });

        let generation = session.generation();
        session.expire_unless_reinstalled(generation);
        assert!(session.continuation().is_none());
    }

    #[test]
    fn same_value_reinstalled_still_counts() {
        let mut session = Session::new(Instant::now());
        let prompt = Continuation::AwaitingPhone { resume: Resume::Record };
        session.install(prompt.clone());

        let generation = session.generation();
        session.take();
        session.install(prompt.clone());
        session.expire_unless_reinstalled(generation);
        assert_eq!(session.continuation(), Some(&prompt));
    }
}
