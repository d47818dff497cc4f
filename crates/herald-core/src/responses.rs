//! Fixed user-facing texts.

pub const EMPTY_ADD: &str =
    "There should be at least one Username to add. For example \"/add @username\" or \"/add username\".";
pub const EMPTY_REMOVE: &str =
    "There should be at least one Username to remove. For example \"/remove @username\" or \"/remove username\".";
pub const NOBODY_TO_REMOVE: &str = "There is nobody to remove, your following list is empty";
pub const REMOVE_PROMPT: &str = "Choose someone to remove";
pub const NOTHING_NEW: &str = "You already follow everyone you listed.";
pub const NOT_FOLLOWING: &str = "You are not following them.";
pub const SELF_FOLLOW: &str = "You cannot follow yourself.";
pub const EMPTY_SEND: &str = "There should be a message after \"/send\". For example \"/send  I have a proof that there are reptilians in the government\".";
pub const EMPTY_SEND_ALL: &str =
    "There should be a message after \"/send_all\". For example \"/send_all The bot will be down tonight\".";
pub const EMPTY_CONTACT: &str = "The user is not in the Telegram yet.";
pub const BEFORE_STICKER: &str = "Someone has just gave me the sticker";
pub const PHOTO_CAPTION: &str = "Somebody has just shown me that";
pub const NEW_FOLLOWER: &str = "Hey bro, I've heard that one more someone started following you";
pub const PROFILE_UPDATED: &str = "Your profile has been updated.";
pub const GENERIC_FAILURE: &str = "Something went wrong on our side. Please try again later.";

pub const HELP: &str = "Hi! I pass along what the people you follow share with me.\n\n\
Commands:\n\
/add @username ... - follow people\n\
/remove [@username ...] - stop following (no names: pick from a list)\n\
/send text - tell your followers something\n\
/update - refresh your name and photo\n\n\
You can also share a contact to follow it, or send a photo, document or sticker to pass it on.";

pub fn follower_message(text: &str) -> String {
    format!("Somebody told me, that \"{text}\"")
}

pub fn important_message(text: &str) -> String {
    format!("Important message for all the users - \"{text}\"")
}

pub fn rate_limited(retry_secs: f64) -> String {
    format!("⏳ Rate limited. Please wait {retry_secs:.1} seconds.")
}

pub fn now_following(names: &[String]) -> String {
    format!("Now following: {}", names.join(", "))
}

pub fn no_longer_following(names: &[String]) -> String {
    format!("No longer following: {}", names.join(", "))
}

pub fn removed(label: &str) -> String {
    format!("Removed {label}")
}
