//! Bot protocol data models

pub mod events;
pub mod requests;
pub mod response;
