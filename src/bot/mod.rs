//! Bot protocol client module

pub mod errors;
pub mod model;
pub mod parser;
pub mod provider;
pub mod report;
pub mod stream;
pub mod tools;
