//! Event models
//!
//! Typed payloads of the records a bot endpoint streams back

mod base;
mod error;
mod file;
mod meta;
mod text;

pub use base::{BotEvent, EventType, PayloadError, record_index};
pub use error::ErrorEvent;
pub use file::FileEvent;
pub use meta::MetaEvent;
pub use text::TextEvent;
