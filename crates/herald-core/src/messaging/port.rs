use async_trait::async_trait;

use crate::{
    messaging::types::{InlineResult, KeyboardOption},
    Result,
};

/// Chat transport as seen by the core.
///
/// Recipients are usernames (stringified chat ids). Each call is one outbound
/// request; failures are per call and never poison the notifier.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<()>;

    async fn send_photo(&self, recipient: &str, file_ref: &str, caption: Option<&str>)
        -> Result<()>;

    async fn send_document(&self, recipient: &str, file_ref: &str) -> Result<()>;

    async fn send_sticker(&self, recipient: &str, file_ref: &str) -> Result<()>;

    /// Prompt with one selectable option per row.
    async fn send_keyboard(
        &self,
        recipient: &str,
        prompt: &str,
        options: Vec<KeyboardOption>,
    ) -> Result<()>;

    async fn answer_inline_query(&self, query_id: &str, results: Vec<InlineResult>)
        -> Result<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
