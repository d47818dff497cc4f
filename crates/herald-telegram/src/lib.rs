//! Telegram adapter (teloxide).
//!
//! This crate implements the `herald-core` Notifier port over the Telegram Bot API
//! and turns Telegram updates into `IncomingEvent`s.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        InlineKeyboardButton, InlineKeyboardMarkup, InlineQueryResult, InlineQueryResultArticle,
        InputFile, InputMessageContent, InputMessageContentText,
    },
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use herald_core::{
    errors::Error,
    messaging::{
        port::Notifier,
        types::{InlineResult, KeyboardOption},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Delivery(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// Recipients are stringified chat ids.
pub fn tg_chat(recipient: &str) -> Result<ChatId> {
    recipient
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::Delivery(format!("not a chat id: {recipient:?}")))
}

pub fn keyboard_markup(options: Vec<KeyboardOption>) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = options
        .into_iter()
        .map(|o| vec![InlineKeyboardButton::callback(o.label, o.token)])
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Choosing an article posts its title into the chat.
pub fn inline_articles(results: Vec<InlineResult>) -> Vec<InlineQueryResult> {
    results
        .into_iter()
        .map(|r| {
            let content =
                InputMessageContent::Text(InputMessageContentText::new(r.title.clone()));
            InlineQueryResult::Article(InlineQueryResultArticle::new(r.id, r.title, content))
        })
        .collect()
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<()> {
        let chat = tg_chat(recipient)?;
        self.with_retry(|| self.bot.send_message(chat, text.to_string()))
            .await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        recipient: &str,
        file_ref: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        let chat = tg_chat(recipient)?;
        self.with_retry(|| {
            let mut req = self
                .bot
                .send_photo(chat, InputFile::file_id(file_ref.to_string()));
            if let Some(c) = caption {
                req = req.caption(c.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn send_document(&self, recipient: &str, file_ref: &str) -> Result<()> {
        let chat = tg_chat(recipient)?;
        self.with_retry(|| {
            self.bot
                .send_document(chat, InputFile::file_id(file_ref.to_string()))
        })
        .await?;
        Ok(())
    }

    async fn send_sticker(&self, recipient: &str, file_ref: &str) -> Result<()> {
        let chat = tg_chat(recipient)?;
        self.with_retry(|| {
            self.bot
                .send_sticker(chat, InputFile::file_id(file_ref.to_string()))
        })
        .await?;
        Ok(())
    }

    async fn send_keyboard(
        &self,
        recipient: &str,
        prompt: &str,
        options: Vec<KeyboardOption>,
    ) -> Result<()> {
        let chat = tg_chat(recipient)?;
        let markup = keyboard_markup(options);
        self.with_retry(|| {
            self.bot
                .send_message(chat, prompt.to_string())
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineResult>,
    ) -> Result<()> {
        let articles = inline_articles(results);
        self.with_retry(|| {
            self.bot
                .answer_inline_query(query_id.to_string(), articles.clone())
        })
        .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}
