use teloxide::{prelude::*, types::PhotoSize};
use tracing::{debug, warn};

use herald_core::{
    commands::{parse_command, Command},
    messaging::types::IncomingEvent,
};

use super::sender_from_user;

/// Map a chat message onto the event it represents. `None` means ignore it.
pub(super) async fn to_event(bot: &Bot, msg: &Message) -> Option<IncomingEvent> {
    let user = msg.from()?;
    let mut sender = sender_from_user(user);
    sender.username = msg.chat.id.0.to_string();

    if let Some(text) = msg.text() {
        if !text.starts_with('/') {
            debug!(username = %sender.username, "ignoring plain text");
            return None;
        }
        let (name, args) = parse_command(text);
        if needs_profile_photo(&name) {
            sender.profile.photo_id = profile_photo(bot, user.id).await;
        }
        return Some(IncomingEvent::Command { sender, name, args });
    }

    if let Some(contact) = msg.contact() {
        return Some(IncomingEvent::Contact {
            sender,
            user_id: contact.user_id.map(|id| id.0.to_string()),
        });
    }

    if let Some(photos) = msg.photo() {
        let file_id = largest_photo(photos)?;
        return Some(IncomingEvent::Photo { sender, file_id });
    }

    if let Some(doc) = msg.document() {
        return Some(IncomingEvent::Document {
            sender,
            file_id: doc.file.id.clone(),
        });
    }

    if let Some(sticker) = msg.sticker() {
        return Some(IncomingEvent::Sticker {
            sender,
            file_id: sticker.file.id.clone(),
        });
    }

    debug!(username = %sender.username, "ignoring unsupported message");
    None
}

fn needs_profile_photo(command: &str) -> bool {
    matches!(
        Command::parse(command),
        Some(Command::Start) | Some(Command::Update)
    )
}

/// Telegram lists sizes smallest first.
fn largest_photo(sizes: &[PhotoSize]) -> Option<String> {
    sizes.last().map(|p| p.file.id.clone())
}

/// Best-effort lookup of the user's current profile photo.
async fn profile_photo(bot: &Bot, user_id: UserId) -> Option<String> {
    match bot.get_user_profile_photos(user_id).limit(1).await {
        Ok(photos) => photos
            .photos
            .first()
            .and_then(|sizes| largest_photo(sizes)),
        Err(e) => {
            warn!(user_id = user_id.0, error = %e, "profile photo lookup failed");
            None
        }
    }
}
