//! Meta event
//!
//! Only honored as the first record of a response

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::base::Indexed;

/// Default content type of a bot response
pub const DEFAULT_CONTENT_TYPE: &str = "text/markdown";

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// `meta` event payload
///
/// Fields of an unexpected type fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaEvent {
    pub linkify: bool,
    pub suggested_replies: bool,
    pub content_type: String,
}

impl MetaEvent {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let flag = |key: &str| object.get(key).and_then(Value::as_bool).unwrap_or(false);
        Self {
            linkify: flag("linkify"),
            suggested_replies: flag("suggested_replies"),
            content_type: object
                .get("content_type")
                .and_then(Value::as_str)
                .map_or_else(default_content_type, str::to_string),
        }
    }
}

impl<'de> Deserialize<'de> for MetaEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::deserialize(deserializer)?;
        Ok(Self::from_object(&object))
    }
}

impl Default for MetaEvent {
    fn default() -> Self {
        Self {
            linkify: false,
            suggested_replies: false,
            content_type: default_content_type(),
        }
    }
}

// Meta is stream-level; its index is not kept
impl Indexed for MetaEvent {
    fn set_index(&mut self, _index: Option<usize>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let event: MetaEvent = serde_json::from_str("{}").unwrap();
        assert_eq!(event, MetaEvent::default());
        assert_eq!(event.content_type, "text/markdown");
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{"linkify":true,"suggested_replies":true,"content_type":"text/plain"}"#;
        let event: MetaEvent = serde_json::from_str(json).unwrap();
        assert!(event.linkify);
        assert!(event.suggested_replies);
        assert_eq!(event.content_type, "text/plain");
    }

    #[test]
    fn test_mistyped_fields_fall_back() {
        let json = r#"{"linkify":true,"suggested_replies":"yes","content_type":null}"#;
        let event: MetaEvent = serde_json::from_str(json).unwrap();
        assert!(event.linkify);
        assert!(!event.suggested_replies);
        assert_eq!(event.content_type, DEFAULT_CONTENT_TYPE);

        assert!(serde_json::from_str::<MetaEvent>("true").is_err());
    }
}
