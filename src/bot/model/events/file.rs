//! File attachment event

use serde::{Deserialize, Serialize};

use super::base::Indexed;

/// `file` event payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub name: String,
    /// Reference used to render the attachment inline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_ref: Option<String>,

    #[serde(skip)]
    pub index: Option<usize>,
}

impl Indexed for FileEvent {
    fn set_index(&mut self, index: Option<usize>) {
        self.index = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full() {
        let json = r#"{
            "url": "https://example.com/a.png",
            "content_type": "image/png",
            "name": "a.png",
            "inline_ref": "ref1"
        }"#;
        let event: FileEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.url, "https://example.com/a.png");
        assert_eq!(event.content_type, "image/png");
        assert_eq!(event.name, "a.png");
        assert_eq!(event.inline_ref.as_deref(), Some("ref1"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let event: FileEvent = serde_json::from_str(r#"{"url":"u"}"#).unwrap();
        assert_eq!(event.url, "u");
        assert!(event.name.is_empty());
        assert!(event.inline_ref.is_none());
    }
}
