//! Event base definitions
//!
//! Defines event type enum and the unified event structure

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::bot::parser::EventRecord;

use super::{ErrorEvent, FileEvent, MetaEvent, TextEvent};

/// Event type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Text fragment appended to the answer
    Text,
    /// Full replacement of the answer so far
    ReplaceResponse,
    /// Suggested follow-up reply
    SuggestedReply,
    /// File attachment
    File,
    /// Arbitrary JSON payload
    Json,
    /// Response metadata (first record only)
    Meta,
    /// Server error
    Error,
    /// Keep-alive
    Ping,
    /// End of response
    Done,
    /// Unknown event type
    Unknown,
}

impl EventType {
    /// Parse from event type string
    pub fn from_str(s: &str) -> Self {
        match s {
            "text" => Self::Text,
            "replace_response" => Self::ReplaceResponse,
            "suggested_reply" => Self::SuggestedReply,
            "file" => Self::File,
            "json" => Self::Json,
            "meta" => Self::Meta,
            "error" => Self::Error,
            "ping" => Self::Ping,
            "done" => Self::Done,
            _ => Self::Unknown,
        }
    }

    /// Convert to event type string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::ReplaceResponse => "replace_response",
            Self::SuggestedReply => "suggested_reply",
            Self::File => "file",
            Self::Json => "json",
            Self::Meta => "meta",
            Self::Error => "error",
            Self::Ping => "ping",
            Self::Done => "done",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of a record could not be parsed
#[derive(Debug)]
pub struct PayloadError {
    /// Type of the offending record
    pub event_type: EventType,
    /// Raw record data
    pub data: String,
    /// Underlying JSON error
    pub source: serde_json::Error,
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid JSON in {} event: {} ({})",
            self.event_type, self.data, self.source
        )
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Read the optional integer `index` of a record payload
///
/// Non-negative numbers are accepted; fractional values are truncated.
pub fn record_index(value: &Value) -> Option<usize> {
    value.as_object().and_then(object_index)
}

fn object_index(object: &Map<String, Value>) -> Option<usize> {
    let index = object.get("index")?;
    if let Some(n) = index.as_u64() {
        return usize::try_from(n).ok();
    }
    index
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as usize)
}

/// Unified event enum
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    Text(TextEvent),
    ReplaceResponse(TextEvent),
    SuggestedReply(TextEvent),
    File(FileEvent),
    Json {
        payload: Map<String, Value>,
        index: Option<usize>,
    },
    Meta(MetaEvent),
    Error(ErrorEvent),
    Ping,
    Done,
    /// Unrecognized type, payload not inspected
    Unknown { event_type: String },
}

impl BotEvent {
    /// Parse event from record
    pub fn from_record(record: &EventRecord) -> Result<Self, PayloadError> {
        let event_type = EventType::from_str(&record.event);
        let fail = |source| PayloadError {
            event_type,
            data: record.data.clone(),
            source,
        };

        let event = match event_type {
            EventType::Text => Self::Text(parse_indexed(&record.data).map_err(fail)?),
            EventType::ReplaceResponse => {
                Self::ReplaceResponse(parse_indexed(&record.data).map_err(fail)?)
            }
            EventType::SuggestedReply => {
                Self::SuggestedReply(parse_indexed(&record.data).map_err(fail)?)
            }
            EventType::File => Self::File(parse_indexed(&record.data).map_err(fail)?),
            EventType::Json => {
                let payload = parse_object(&record.data).map_err(fail)?;
                let index = object_index(&payload);
                Self::Json { payload, index }
            }
            EventType::Meta => Self::Meta(parse_indexed(&record.data).map_err(fail)?),
            EventType::Error => Self::Error(parse_indexed(&record.data).map_err(fail)?),
            EventType::Ping => Self::Ping,
            EventType::Done => Self::Done,
            EventType::Unknown => Self::Unknown {
                event_type: record.event.clone(),
            },
        };

        Ok(event)
    }

    /// Get event type
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Text(_) => EventType::Text,
            Self::ReplaceResponse(_) => EventType::ReplaceResponse,
            Self::SuggestedReply(_) => EventType::SuggestedReply,
            Self::File(_) => EventType::File,
            Self::Json { .. } => EventType::Json,
            Self::Meta(_) => EventType::Meta,
            Self::Error(_) => EventType::Error,
            Self::Ping => EventType::Ping,
            Self::Done => EventType::Done,
            Self::Unknown { .. } => EventType::Unknown,
        }
    }
}

/// Payloads that carry the record-level `index`
pub(crate) trait Indexed {
    fn set_index(&mut self, index: Option<usize>);
}

fn parse_object(data: &str) -> serde_json::Result<Map<String, Value>> {
    match serde_json::from_str(data)? {
        Value::Object(map) => Ok(map),
        _ => Err(<serde_json::Error as serde::de::Error>::custom(
            "expected a JSON object",
        )),
    }
}

fn parse_indexed<T: DeserializeOwned + Indexed>(data: &str) -> serde_json::Result<T> {
    let value = Value::Object(parse_object(data)?);
    let index = record_index(&value);
    let mut payload: T = serde_json::from_value(value)?;
    payload.set_index(index);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_from_str() {
        assert_eq!(EventType::from_str("text"), EventType::Text);
        assert_eq!(EventType::from_str("replace_response"), EventType::ReplaceResponse);
        assert_eq!(EventType::from_str("suggested_reply"), EventType::SuggestedReply);
        assert_eq!(EventType::from_str("meta"), EventType::Meta);
        assert_eq!(EventType::from_str("done"), EventType::Done);
        assert_eq!(EventType::from_str("message"), EventType::Unknown);
        assert_eq!(EventType::from_str(""), EventType::Unknown);
    }

    #[test]
    fn test_event_type_as_str() {
        assert_eq!(EventType::ReplaceResponse.as_str(), "replace_response");
        assert_eq!(EventType::Ping.to_string(), "ping");
    }

    #[test]
    fn test_record_index() {
        assert_eq!(record_index(&json!({"index": 3})), Some(3));
        assert_eq!(record_index(&json!({"index": 2.0})), Some(2));
        assert_eq!(record_index(&json!({"index": -1})), None);
        assert_eq!(record_index(&json!({"index": "1"})), None);
        assert_eq!(record_index(&json!({})), None);
    }

    #[test]
    fn test_from_record_text_with_index() {
        let record = EventRecord::new("text", r#"{"text": "First", "index": 0}"#);
        let event = BotEvent::from_record(&record).unwrap();
        assert_eq!(
            event,
            BotEvent::Text(TextEvent {
                text: "First".to_string(),
                index: Some(0),
            })
        );
    }

    #[test]
    fn test_from_record_json() {
        let record = EventRecord::new("json", r#"{"key": "value", "count": 42}"#);
        match BotEvent::from_record(&record).unwrap() {
            BotEvent::Json { payload, index } => {
                assert_eq!(payload["key"], "value");
                assert_eq!(payload["count"], 42);
                assert_eq!(index, None);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_from_record_rejects_non_object() {
        let record = EventRecord::new("json", "[1, 2]");
        let err = BotEvent::from_record(&record).unwrap_err();
        assert_eq!(err.event_type, EventType::Json);
        assert_eq!(err.data, "[1, 2]");
    }

    #[test]
    fn test_from_record_text_requires_string() {
        let record = EventRecord::new("text", r#"{"text": 5}"#);
        assert!(BotEvent::from_record(&record).is_err());

        let record = EventRecord::new("text", "not json");
        assert!(BotEvent::from_record(&record).is_err());
    }

    #[test]
    fn test_from_record_ping_and_done_ignore_payload() {
        assert_eq!(
            BotEvent::from_record(&EventRecord::new("ping", "garbage")).unwrap(),
            BotEvent::Ping
        );
        assert_eq!(
            BotEvent::from_record(&EventRecord::new("done", "{}")).unwrap(),
            BotEvent::Done
        );
    }

    #[test]
    fn test_from_record_unknown() {
        let event = BotEvent::from_record(&EventRecord::new("message", "{}")).unwrap();
        assert_eq!(
            event,
            BotEvent::Unknown {
                event_type: "message".to_string()
            }
        );
        assert_eq!(event.event_type(), EventType::Unknown);
    }
}
