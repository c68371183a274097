//! Telegram transport
//!
//! The pipeline and the handlers talk to Telegram through [`ChatTransport`],
//! which speaks plain ids and strings. [`TelegramTransport`] maps it onto
//! `teloxide::Bot`.

use async_trait::async_trait;
use teloxide::{
    net::Download,
    payloads::{EditMessageTextSetters, SendMessageSetters},
    prelude::*,
    sugar::request::RequestLinkPreviewExt,
    types::{
        ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode,
        ReplyParameters,
    },
};
use tracing::{debug, warn};

use crate::services::weather::Place;
use crate::utils::errors::{Result, TimeSkedError};

/// Rich-text mode of an outgoing text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    MarkdownV2,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Callback { text: String, data: String },
    Url { text: String, url: String },
}

impl Button {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Button::Callback { text: text.into(), data: data.into() }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url { text: text.into(), url: url.into() }
    }
}

/// Inline keyboard, row by row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    pub fn single(button: Button) -> Self {
        Self { rows: vec![vec![button]] }
    }

    pub fn push_row(&mut self, row: Vec<Button>) {
        self.rows.push(row);
    }

    /// Every callback payload, in layout order
    pub fn callback_data(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|b| match b {
                Button::Callback { data, .. } => Some(data.as_str()),
                Button::Url { .. } => None,
            })
            .collect()
    }
}

/// A text message as it should appear in the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingText {
    pub text: String,
    pub format: TextFormat,
    pub keyboard: Option<Keyboard>,
    pub reply_to: Option<i32>,
}

impl OutgoingText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), format: TextFormat::Plain, keyboard: None, reply_to: None }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self { format: TextFormat::MarkdownV2, ..Self::plain(text) }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self { format: TextFormat::Html, ..Self::plain(text) }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn replying_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    /// Same message without a parse mode
    pub fn as_plain(&self) -> Self {
        Self { format: TextFormat::Plain, ..self.clone() }
    }
}

/// Chat actions shown while the bot works
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Typing,
    FindingLocation,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Returns the id of the sent message
    async fn send_text(&self, chat_id: i64, message: &OutgoingText) -> Result<i32>;
    async fn edit_text(&self, chat_id: i64, message_id: i32, message: &OutgoingText) -> Result<()>;
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()>;
    async fn send_activity(&self, chat_id: i64, activity: Activity) -> Result<()>;
    async fn pin_message(&self, chat_id: i64, message_id: i32) -> Result<()>;
    async fn unpin_all(&self, chat_id: i64) -> Result<()>;
    async fn send_venue(&self, chat_id: i64, place: &Place) -> Result<()>;
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// Edit, retrying once without the parse mode when the rich edit is refused
pub async fn edit_with_fallback(
    transport: &dyn ChatTransport,
    chat_id: i64,
    message_id: i32,
    message: &OutgoingText,
) -> Result<()> {
    match transport.edit_text(chat_id, message_id, message).await {
        Ok(()) => Ok(()),
        Err(e) if message.format != TextFormat::Plain => {
            warn!(chat_id = chat_id, message_id = message_id, error = %e, "Rich edit refused, retrying as plain text");
            transport.edit_text(chat_id, message_id, &message.as_plain()).await
        }
        Err(e) => Err(e),
    }
}

/// Send, retrying once without the parse mode when the rich send is refused
pub async fn send_with_fallback(
    transport: &dyn ChatTransport,
    chat_id: i64,
    message: &OutgoingText,
) -> Result<i32> {
    match transport.send_text(chat_id, message).await {
        Ok(id) => Ok(id),
        Err(e) if message.format != TextFormat::Plain => {
            warn!(chat_id = chat_id, error = %e, "Rich send refused, retrying as plain text");
            transport.send_text(chat_id, &message.as_plain()).await
        }
        Err(e) => Err(e),
    }
}

/// [`ChatTransport`] backed by the Bot API
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn parse_mode(format: TextFormat) -> Option<ParseMode> {
        match format {
            TextFormat::Plain => None,
            TextFormat::MarkdownV2 => Some(ParseMode::MarkdownV2),
            TextFormat::Html => Some(ParseMode::Html),
        }
    }

    /// Convert to the Bot API markup, rejecting malformed URL buttons
    pub fn markup(keyboard: &Keyboard) -> Result<InlineKeyboardMarkup> {
        let mut rows = Vec::with_capacity(keyboard.rows.len());
        for row in &keyboard.rows {
            let mut buttons = Vec::with_capacity(row.len());
            for button in row {
                buttons.push(match button {
                    Button::Callback { text, data } => InlineKeyboardButton::callback(text.clone(), data.clone()),
                    Button::Url { text, url } => InlineKeyboardButton::url(text.clone(), url::Url::parse(url)?),
                });
            }
            rows.push(buttons);
        }
        Ok(InlineKeyboardMarkup::new(rows))
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, message: &OutgoingText) -> Result<i32> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), message.text.clone())
            .disable_link_preview(true);

        if let Some(mode) = Self::parse_mode(message.format) {
            request = request.parse_mode(mode);
        }
        if let Some(keyboard) = &message.keyboard {
            request = request.reply_markup(Self::markup(keyboard)?);
        }
        if let Some(reply_to) = message.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(reply_to)).allow_sending_without_reply());
        }

        let sent = request.await?;
        debug!(chat_id = chat_id, message_id = sent.id.0, "Message sent");
        Ok(sent.id.0)
    }

    async fn edit_text(&self, chat_id: i64, message_id: i32, message: &OutgoingText) -> Result<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), message.text.clone())
            .disable_link_preview(true);

        if let Some(mode) = Self::parse_mode(message.format) {
            request = request.parse_mode(mode);
        }
        if let Some(keyboard) = &message.keyboard {
            request = request.reply_markup(Self::markup(keyboard)?);
        }

        request.await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.bot.delete_message(ChatId(chat_id), MessageId(message_id)).await?;
        Ok(())
    }

    async fn send_activity(&self, chat_id: i64, activity: Activity) -> Result<()> {
        let action = match activity {
            Activity::Typing => ChatAction::Typing,
            Activity::FindingLocation => ChatAction::FindLocation,
        };
        self.bot.send_chat_action(ChatId(chat_id), action).await?;
        Ok(())
    }

    async fn pin_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.bot.pin_chat_message(ChatId(chat_id), MessageId(message_id)).await?;
        Ok(())
    }

    async fn unpin_all(&self, chat_id: i64) -> Result<()> {
        self.bot.unpin_all_chat_messages(ChatId(chat_id)).await?;
        Ok(())
    }

    async fn send_venue(&self, chat_id: i64, place: &Place) -> Result<()> {
        self.bot
            .send_venue(
                ChatId(chat_id),
                place.latitude,
                place.longitude,
                place.name.clone(),
                place.address.clone(),
            )
            .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self.bot.get_file(file_id.to_string()).await?;
        let mut bytes = Vec::with_capacity(file.size as usize);
        self.bot
            .download_file(&file.path, &mut bytes)
            .await
            .map_err(TimeSkedError::Download)?;

        debug!(file_id = %file_id, size = bytes.len(), "File downloaded");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_keeps_layout() {
        let mut keyboard = Keyboard::single(Button::callback("🔁 Regenerate", "regenerate:42"));
        keyboard.push_row(vec![Button::url("🔗 Link", "https://example.com/a")]);

        let markup = TelegramTransport::markup(&keyboard).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(keyboard.callback_data(), vec!["regenerate:42"]);
    }

    #[test]
    fn test_markup_rejects_bad_url() {
        let keyboard = Keyboard::single(Button::url("🔗 Link", "not a url"));
        assert!(matches!(
            TelegramTransport::markup(&keyboard),
            Err(TimeSkedError::UrlParse(_))
        ));
    }

    #[test]
    fn test_as_plain_keeps_keyboard() {
        let message = OutgoingText::markdown("*hi*")
            .with_keyboard(Keyboard::single(Button::callback("a", "b")))
            .replying_to(7);
        let plain = message.as_plain();
        assert_eq!(plain.format, TextFormat::Plain);
        assert_eq!(plain.keyboard, message.keyboard);
        assert_eq!(plain.reply_to, Some(7));
    }
}
