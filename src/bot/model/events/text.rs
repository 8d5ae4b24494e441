//! Text-bearing events
//!
//! Shared payload of `text`, `replace_response` and `suggested_reply`

use serde::{Deserialize, Serialize};

use super::base::Indexed;

/// Text event payload
///
/// `text` is required and must be a string; the record is rejected
/// otherwise.
///
/// # Example
///
/// ```rust
/// use botstream::bot::model::events::TextEvent;
///
/// let event: TextEvent = serde_json::from_str(r#"{"text":"Hello"}"#).unwrap();
/// assert_eq!(event.text, "Hello");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEvent {
    pub text: String,

    /// Record-level index, read separately from the raw payload
    #[serde(skip)]
    pub index: Option<usize>,
}

impl Indexed for TextEvent {
    fn set_index(&mut self, index: Option<usize>) {
        self.index = index;
    }
}

impl std::fmt::Display for TextEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_ignores_extra_fields() {
        let event: TextEvent =
            serde_json::from_str(r#"{"text":"hi","index":4,"other":true}"#).unwrap();
        assert_eq!(event.text, "hi");
        // index comes from the record, never from serde
        assert_eq!(event.index, None);
    }

    #[test]
    fn test_missing_text_is_an_error() {
        assert!(serde_json::from_str::<TextEvent>("{}").is_err());
        assert!(serde_json::from_str::<TextEvent>(r#"{"text":null}"#).is_err());
    }

    #[test]
    fn test_serialize_skips_index() {
        let event = TextEvent {
            text: "x".to_string(),
            index: Some(1),
        };
        assert_eq!(serde_json::to_string(&event).unwrap(), r#"{"text":"x"}"#);
    }
}
