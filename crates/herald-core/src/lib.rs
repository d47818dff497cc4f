//! Core domain + application logic for the Herald follow/broadcast bot.
//!
//! This crate is framework-agnostic. Telegram and persistent storage live
//! behind ports (`messaging::port::Notifier`, `store::UserStore`) implemented
//! either here (in-memory / JSON file stores) or in adapter crates.

pub mod broadcast;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod messaging;
pub mod resolver;
pub mod responses;
pub mod security;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
