//! Response model
//!
//! What a consumer of a bot stream receives, one message per record

use serde_json::{Map, Value, json};

use crate::bot::parser::EventRecord;

use super::events::{EventType, MetaEvent};
use super::requests::{Attachment, ToolCallDelta};

/// Response metadata, first message of a stream only
pub type MetaResponse = MetaEvent;

/// One structured piece of a bot response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseMessage {
    /// Fragment appended to the answer
    Text { text: String, index: Option<usize> },
    /// Replaces everything received so far
    Replace { text: String, index: Option<usize> },
    /// Suggested follow-up, not part of the answer
    SuggestedReply { text: String, index: Option<usize> },
    Attachment {
        attachment: Attachment,
        index: Option<usize>,
    },
    Json {
        payload: Map<String, Value>,
        index: Option<usize>,
    },
    Meta(MetaResponse),
    /// Unaggregated tool call fragments (no executables registered)
    ToolCallDeltas {
        deltas: Vec<ToolCallDelta>,
        index: Option<usize>,
    },
    /// Server error; terminates the attempt and is never delivered to consumers
    Error {
        text: String,
        allow_retry: bool,
        error_type: Option<String>,
    },
    /// End of response; never delivered to consumers
    Done,
}

impl ResponseMessage {
    /// Create a text fragment
    pub fn text_fragment(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            index: None,
        }
    }

    /// Text carried by this message, empty for non-text messages
    pub fn text(&self) -> &str {
        match self {
            Self::Text { text, .. }
            | Self::Replace { text, .. }
            | Self::SuggestedReply { text, .. }
            | Self::Error { text, .. } => text,
            _ => "",
        }
    }

    /// Index carried by the originating record
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Text { index, .. }
            | Self::Replace { index, .. }
            | Self::SuggestedReply { index, .. }
            | Self::Attachment { index, .. }
            | Self::Json { index, .. }
            | Self::ToolCallDeltas { index, .. } => *index,
            Self::Meta(_) | Self::Error { .. } | Self::Done => None,
        }
    }

    /// Whether the message contributes text to the answer
    pub fn is_text_bearing(&self) -> bool {
        matches!(self, Self::Text { .. } | Self::Replace { .. })
    }

    /// Event type this message is sent as
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Text { .. } => EventType::Text,
            Self::Replace { .. } => EventType::ReplaceResponse,
            Self::SuggestedReply { .. } => EventType::SuggestedReply,
            Self::Attachment { .. } => EventType::File,
            Self::Json { .. } | Self::ToolCallDeltas { .. } => EventType::Json,
            Self::Meta(_) => EventType::Meta,
            Self::Error { .. } => EventType::Error,
            Self::Done => EventType::Done,
        }
    }

    /// Render as the record a bot endpoint would send
    pub fn to_record(&self) -> EventRecord {
        let mut data = match self {
            Self::Text { text, .. }
            | Self::Replace { text, .. }
            | Self::SuggestedReply { text, .. } => json!({ "text": text }),
            Self::Attachment { attachment, .. } => {
                serde_json::to_value(attachment).unwrap_or_else(|_| json!({}))
            }
            Self::Json { payload, .. } => Value::Object(payload.clone()),
            Self::Meta(meta) => serde_json::to_value(meta).unwrap_or_else(|_| json!({})),
            Self::ToolCallDeltas { deltas, .. } => json!({
                "choices": [{ "delta": { "tool_calls": deltas }, "finish_reason": null }]
            }),
            Self::Error {
                text,
                allow_retry,
                error_type,
            } => {
                let mut data = json!({ "text": text, "allow_retry": allow_retry });
                if let Some(error_type) = error_type {
                    data["error_type"] = json!(error_type);
                }
                data
            }
            Self::Done => json!({}),
        };

        if let (Some(index), Value::Object(map)) = (self.index(), &mut data) {
            map.insert("index".to_string(), json!(index));
        }

        EventRecord::new(self.event_type().as_str(), data.to_string())
    }
}

/// Accumulates the final answer of a response
///
/// Meta and suggested replies are skipped; a replacement discards what came
/// before it. Non-text messages count as (empty) parts of the answer.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    chunks: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: &ResponseMessage) {
        match message {
            ResponseMessage::Meta(_) | ResponseMessage::SuggestedReply { .. } => {}
            ResponseMessage::Replace { text, .. } => {
                self.chunks.clear();
                self.chunks.push(text.clone());
            }
            other => self.chunks.push(other.text().to_string()),
        }
    }

    /// No part of an answer was received
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn text(&self) -> String {
        self.chunks.concat()
    }
}

impl Extend<ResponseMessage> for Transcript {
    fn extend<T: IntoIterator<Item = ResponseMessage>>(&mut self, iter: T) {
        for message in iter {
            self.push(&message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::model::events::BotEvent;

    fn text(s: &str) -> ResponseMessage {
        ResponseMessage::text_fragment(s)
    }

    #[test]
    fn test_transcript_replace_resets() {
        let mut transcript = Transcript::new();
        transcript.extend([
            ResponseMessage::Meta(MetaResponse::default()),
            text("Hello "),
            text("wrld"),
            ResponseMessage::Replace {
                text: "Hello ".to_string(),
                index: None,
            },
            text("world"),
            ResponseMessage::SuggestedReply {
                text: "Tell me more".to_string(),
                index: None,
            },
        ]);
        assert_eq!(transcript.text(), "Hello world");
    }

    #[test]
    fn test_transcript_empty() {
        let mut transcript = Transcript::new();
        transcript.push(&ResponseMessage::Meta(MetaResponse::default()));
        transcript.push(&ResponseMessage::SuggestedReply {
            text: "x".to_string(),
            index: None,
        });
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_transcript_counts_non_text_messages() {
        let mut transcript = Transcript::new();
        transcript.push(&ResponseMessage::Json {
            payload: Map::new(),
            index: None,
        });
        assert!(!transcript.is_empty());
        assert_eq!(transcript.text(), "");
    }

    #[test]
    fn test_index_and_text_accessors() {
        let message = ResponseMessage::Text {
            text: "a".to_string(),
            index: Some(2),
        };
        assert_eq!(message.text(), "a");
        assert_eq!(message.index(), Some(2));
        assert!(message.is_text_bearing());
        assert_eq!(ResponseMessage::Done.text(), "");
        assert_eq!(ResponseMessage::Done.index(), None);
    }

    #[test]
    fn test_to_record_parses_back() {
        let record = ResponseMessage::Text {
            text: "Hi".to_string(),
            index: Some(1),
        }
        .to_record();
        assert_eq!(record.event, "text");

        match BotEvent::from_record(&record).unwrap() {
            BotEvent::Text(event) => {
                assert_eq!(event.text, "Hi");
                assert_eq!(event.index, Some(1));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_to_record_error_and_done() {
        let record = ResponseMessage::Error {
            text: "boom".to_string(),
            allow_retry: false,
            error_type: Some("user_caused_error".to_string()),
        }
        .to_record();
        assert_eq!(record.event, "error");
        let data: Value = record.data_as_json().unwrap();
        assert_eq!(data["allow_retry"], false);
        assert_eq!(data["error_type"], "user_caused_error");

        assert_eq!(ResponseMessage::Done.to_record(), EventRecord::new("done", "{}"));
    }
}
