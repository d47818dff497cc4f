use crate::domain::Profile;

/// Who triggered an inbound event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sender {
    /// Stringified chat id; the store key.
    pub username: String,
    pub profile: Profile,
}

impl Sender {
    pub fn new(username: impl Into<String>, first_name: &str, last_name: &str) -> Self {
        Self {
            username: username.into(),
            profile: Profile {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                photo_id: None,
            },
        }
    }
}

/// Transport-neutral inbound update.
///
/// Telegram-specific parsing lives in the adapter crate.
#[derive(Clone, Debug)]
pub enum IncomingEvent {
    /// `/name args...`, already split by `commands::parse_command`.
    Command {
        sender: Sender,
        name: String,
        args: String,
    },
    /// A shared contact. `user_id` is `None` when the contact has no chat account.
    Contact {
        sender: Sender,
        user_id: Option<String>,
    },
    Photo {
        sender: Sender,
        file_id: String,
    },
    Document {
        sender: Sender,
        file_id: String,
    },
    Sticker {
        sender: Sender,
        file_id: String,
    },
    InlineQuery {
        sender: Sender,
        query_id: String,
        query: String,
    },
    /// The sender picked `result_id` from inline search results.
    InlineChosen {
        sender: Sender,
        result_id: String,
    },
    /// The sender pressed a keyboard option carrying `token`.
    Selection {
        sender: Sender,
        callback_id: String,
        token: String,
    },
}

impl IncomingEvent {
    pub fn sender(&self) -> &Sender {
        match self {
            IncomingEvent::Command { sender, .. }
            | IncomingEvent::Contact { sender, .. }
            | IncomingEvent::Photo { sender, .. }
            | IncomingEvent::Document { sender, .. }
            | IncomingEvent::Sticker { sender, .. }
            | IncomingEvent::InlineQuery { sender, .. }
            | IncomingEvent::InlineChosen { sender, .. }
            | IncomingEvent::Selection { sender, .. } => sender,
        }
    }

    /// Short label for logs and the audit trail.
    pub fn kind(&self) -> &'static str {
        match self {
            IncomingEvent::Command { .. } => "command",
            IncomingEvent::Contact { .. } => "contact",
            IncomingEvent::Photo { .. } => "photo",
            IncomingEvent::Document { .. } => "document",
            IncomingEvent::Sticker { .. } => "sticker",
            IncomingEvent::InlineQuery { .. } => "inline_query",
            IncomingEvent::InlineChosen { .. } => "inline_chosen",
            IncomingEvent::Selection { .. } => "selection",
        }
    }
}

/// One button of an inline keyboard. `token` comes back in `IncomingEvent::Selection`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyboardOption {
    pub label: String,
    pub token: String,
}

impl KeyboardOption {
    /// Build an option, shortening long labels to `max_label_len` chars.
    pub fn new(label: &str, token: impl Into<String>, max_label_len: usize) -> Self {
        let label = if label.chars().count() > max_label_len {
            format!("{}...", label.chars().take(max_label_len).collect::<String>())
        } else {
            label.to_string()
        };
        Self {
            label,
            token: token.into(),
        }
    }
}

/// One inline-search answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineResult {
    pub id: String,
    pub title: String,
}
