use crate::crm::CrmError;
use crate::database::DbError;

/// Ошибка одного хода разговора. Роутер превращает ее в сообщение
/// с извинением и строку в логе, дальше она не уходит.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("crm: {0}")]
    Crm(#[from] CrmError),
    #[error("database: {0}")]
    Db(#[from] DbError),
    #[error("telegram: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("booking draft is missing {0}")]
    IncompleteDraft(&'static str),
    #[error("booking draft for message {0} not found")]
    DraftNotFound(i32),
    #[error("{0}")]
    NotFound(String),
}
