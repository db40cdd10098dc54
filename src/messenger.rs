use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove,
    MessageId, ParseMode, ReplyMarkup,
};
use teloxide::RequestError;

use crate::protocol::Action;

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub text: String,
    pub action: Action,
}

impl Button {
    pub fn new(text: impl Into<String>, action: Action) -> Self {
        Self {
            text: text.into(),
            action,
        }
    }
}

pub type Keyboard = Vec<Vec<Button>>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Markup {
    #[default]
    None,
    Inline(Keyboard),
    /// Reply-клавиатура с одной кнопкой "поделиться контактом".
    RequestContact(String),
    /// Reply-клавиатура с вариантами ответа в один ряд.
    Choice(Vec<String>),
    Remove,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutgoingMessage {
    pub text: String,
    pub markup: Markup,
    pub html: bool,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: true,
            ..Self::default()
        }
    }

    pub fn markup(mut self, markup: Markup) -> Self {
        self.markup = markup;
        self
    }

    pub fn keyboard(self, keyboard: Keyboard) -> Self {
        self.markup(Markup::Inline(keyboard))
    }
}

/// Обычное сообщение или команда из чата.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub message_id: i32,
    pub text: Option<String>,
    pub contact_phone: Option<String>,
}

/// Нажатие inline-кнопки.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingCallback {
    pub id: String,
    pub chat_id: i64,
    pub user_id: i64,
    pub message_id: i32,
    pub data: String,
}

impl IncomingMessage {
    /// `None` для сообщений без отправителя (каналы).
    pub fn from_telegram(msg: &Message) -> Option<Self> {
        let from = msg.from.as_ref()?;
        Some(Self {
            chat_id: msg.chat.id.0,
            user_id: from.id.0 as i64,
            message_id: msg.id.0,
            text: msg.text().map(str::to_string),
            contact_phone: msg.contact().map(|contact| contact.phone_number.clone()),
        })
    }
}

impl IncomingCallback {
    /// `None`, если исходное сообщение недоступно или у кнопки нет данных.
    pub fn from_telegram(q: &CallbackQuery) -> Option<Self> {
        let message = q.message.as_ref()?;
        Some(Self {
            id: q.id.to_string(),
            chat_id: message.chat().id.0,
            user_id: q.from.id.0 as i64,
            message_id: message.id().0,
            data: q.data.clone()?,
        })
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Возвращает id отправленного сообщения.
    async fn send(&self, chat_id: i64, message: OutgoingMessage) -> Result<i32, RequestError>;

    /// Редактирует текст и inline-кнопки. Без `Markup::Inline` кнопки убираются.
    async fn edit(&self, chat_id: i64, message_id: i32, message: OutgoingMessage) -> Result<(), RequestError>;

    async fn answer_callback(&self, callback_id: &str) -> Result<(), RequestError>;
}

pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn inline_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.into_iter().map(|row| {
        row.into_iter()
            .map(|button| InlineKeyboardButton::callback(button.text, button.action.encode()))
            .collect::<Vec<_>>()
    }))
}

fn reply_markup(markup: Markup) -> Option<ReplyMarkup> {
    match markup {
        Markup::None => None,
        Markup::Inline(keyboard) => Some(ReplyMarkup::InlineKeyboard(inline_markup(keyboard))),
        Markup::RequestContact(text) => Some(ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![vec![KeyboardButton::new(text).request(ButtonRequest::Contact)]])
                .resize_keyboard()
                .one_time_keyboard(),
        )),
        Markup::Choice(options) => Some(ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![options.into_iter().map(KeyboardButton::new).collect::<Vec<_>>()])
                .resize_keyboard()
                .one_time_keyboard(),
        )),
        Markup::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, chat_id: i64, message: OutgoingMessage) -> Result<i32, RequestError> {
        let mut request = self.bot.send_message(ChatId(chat_id), message.text);
        if message.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(markup) = reply_markup(message.markup) {
            request = request.reply_markup(markup);
        }

        let sent = request.await?;
        Ok(sent.id.0)
    }

    async fn edit(&self, chat_id: i64, message_id: i32, message: OutgoingMessage) -> Result<(), RequestError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), message.text);
        if message.html {
            request = request.parse_mode(ParseMode::Html);
        }
        match message.markup {
            Markup::Inline(keyboard) => request = request.reply_markup(inline_markup(keyboard)),
            Markup::None => {}
            other => log::warn!("Reply keyboard {:?} can't be attached to an edited message", other),
        }

        request.await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), RequestError> {
        self.bot.answer_callback_query(callback_id.to_string()).await?;
        Ok(())
    }
}
