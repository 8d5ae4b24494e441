//! Streaming client for conversational bot endpoints
//!
//! - [`bot::parser`]: event-stream codec
//! - [`bot::provider`]: request orchestration with retries
//! - [`bot::tools`]: two-pass tool calling

pub mod bot;
pub mod http_client;
pub mod model;

pub use bot::errors::BotError;
pub use bot::model::requests::{ProtocolMessage, QueryRequest, ToolDefinition};
pub use bot::model::response::{ResponseMessage, Transcript};
pub use bot::provider::{BotProvider, RetryPolicy, StreamRequestOptions};
pub use bot::report::{Reporter, StreamReport, TracingReporter};
pub use bot::stream::ResponseStream;
pub use bot::tools::ToolExecutable;
