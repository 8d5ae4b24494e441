//! Bot request errors
//!
//! Classifies what can end an attempt and whether another attempt may help.

use reqwest::StatusCode;

use super::parser::CodecError;

/// Error ending one attempt of a bot request
#[derive(Debug)]
pub enum BotError {
    /// Connection, timeout or body read failure
    Transport(String),
    /// Non-2xx response, retryable for 408, 429 and 5xx
    Http { status: StatusCode, body: String },
    /// Malformed record payload
    Protocol(String),
    /// `error` record sent by the bot
    Server {
        text: String,
        allow_retry: bool,
        error_type: Option<String>,
    },
    /// Cancelled by the caller
    Cancelled,
}

impl BotError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            Self::Server { allow_retry, .. } => *allow_retry,
            Self::Protocol(_) | Self::Cancelled => false,
        }
    }
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::Http { status, body } => write!(f, "HTTP {}: {}", status, body),
            Self::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            Self::Server {
                text, error_type, ..
            } => match error_type {
                Some(error_type) => write!(f, "Bot error ({}): {}", error_type, text),
                None => write!(f, "Bot error: {}", text),
            },
            Self::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl std::error::Error for BotError {}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<CodecError> for BotError {
    fn from(e: CodecError) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Result type of a single attempt
pub type BotResult<T> = Result<T, BotError>;
