//! Outbound messaging port and the inbound event model.

pub mod port;
pub mod throttled;
pub mod types;
