//! Server error event

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::base::Indexed;

/// `error` event payload
///
/// Retryable unless the server explicitly sets `allow_retry` to false.
/// Any JSON object is accepted; fields of an unexpected type read as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub allow_retry: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ErrorEvent {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            allow_retry: object
                .get("allow_retry")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            text: object
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            error_type: object
                .get("error_type")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

impl<'de> Deserialize<'de> for ErrorEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::deserialize(deserializer)?;
        Ok(Self::from_object(&object))
    }
}

impl Indexed for ErrorEvent {
    fn set_index(&mut self, _index: Option<usize>) {}
}

impl std::fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            Some(error_type) => write!(f, "{} ({})", self.text, error_type),
            None => write!(f, "{}", self.text),
        }
    }
}
