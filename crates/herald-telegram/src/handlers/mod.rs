//! Telegram update handlers.
//!
//! Each handler is a thin adapter that:
//! - turns a teloxide update into an `IncomingEvent`
//! - hands it to the core `CommandRouter`
//! - logs failures and tells the sender something went wrong

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, ChosenInlineResult, InlineQuery, Message, User},
};
use tracing::error;

use herald_core::{
    messaging::types::{IncomingEvent, Sender},
    responses,
};

use crate::router::AppState;

mod message;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(event) = message::to_event(&bot, &msg).await else {
        return Ok(());
    };
    dispatch(&state, event).await;
    Ok(())
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(token) = q.data.clone().filter(|d| !d.is_empty()) else {
        let _ = bot.answer_callback_query(q.id).await;
        return Ok(());
    };

    let event = IncomingEvent::Selection {
        sender: sender_from_user(&q.from),
        callback_id: q.id.clone(),
        token,
    };
    if !dispatch(&state, event).await {
        // Stop the client spinner even when handling failed.
        let _ = bot.answer_callback_query(q.id).await;
    }
    Ok(())
}

pub async fn handle_inline_query(
    _bot: Bot,
    q: InlineQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let event = IncomingEvent::InlineQuery {
        sender: sender_from_user(&q.from),
        query_id: q.id,
        query: q.query,
    };
    dispatch(&state, event).await;
    Ok(())
}

pub async fn handle_chosen_inline(
    _bot: Bot,
    r: ChosenInlineResult,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let event = IncomingEvent::InlineChosen {
        sender: sender_from_user(&r.from),
        result_id: r.result_id,
    };
    dispatch(&state, event).await;
    Ok(())
}

/// Run one event through the core. Returns `false` if handling failed.
async fn dispatch(state: &AppState, event: IncomingEvent) -> bool {
    let username = event.sender().username.clone();
    let kind = event.kind();

    let Err(e) = state.router.handle(event).await else {
        return true;
    };
    error!(username = %username, kind, error = %e, "event handling failed");
    let _ = state
        .notifier
        .send_text(&username, responses::GENERIC_FAILURE)
        .await;
    false
}

/// In private chats the chat id equals the user id, so both key the same record.
pub(crate) fn sender_from_user(user: &User) -> Sender {
    Sender::new(
        user.id.0.to_string(),
        &user.first_name,
        user.last_name.as_deref().unwrap_or(""),
    )
}
