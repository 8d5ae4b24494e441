//! Event record definition
//!
//! ## Wire Format
//!
//! ```text
//! id: <value>            (optional)
//! event: <value>         (optional)
//! data: <value>          (one or more lines, joined with \n)
//! <blank line>           (ends the record)
//! ```
//!
//! Lines starting with `:` are comments.

/// One decoded event record
///
/// Every field defaults to empty. Records are independent: nothing carries
/// over from one record to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    /// Event id (`id:` field)
    pub id: String,
    /// Event type (`event:` field)
    pub event: String,
    /// Newline-joined `data:` lines
    pub data: String,
}

impl EventRecord {
    /// Create a record with a type and payload
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            event: event.into(),
            data: data.into(),
        }
    }

    /// Set the record id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Parse data as JSON
    pub fn data_as_json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.data)
    }
}

impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "[{}] {}", self.event, self.data)
        } else {
            write!(f, "[{}#{}] {}", self.event, self.id, self.data)
        }
    }
}

/// Accumulates field lines until a blank line closes the record
#[derive(Debug, Default)]
pub(crate) struct RecordBuilder {
    id: String,
    event: String,
    data_lines: Vec<String>,
}

impl RecordBuilder {
    /// Process one line with its terminator already removed
    ///
    /// Returns a record when the line is blank and content is pending.
    pub(crate) fn push_line(&mut self, line: &str) -> Option<EventRecord> {
        if line.is_empty() {
            return self.take();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => self.data_lines.push(value.to_string()),
            "id" => self.id = value.to_string(),
            _ => {}
        }

        None
    }

    /// Take the pending record, if it has any content
    pub(crate) fn take(&mut self) -> Option<EventRecord> {
        if !self.has_content() {
            return None;
        }

        let record = EventRecord {
            id: std::mem::take(&mut self.id),
            event: std::mem::take(&mut self.event),
            data: self.data_lines.join("\n"),
        };
        self.data_lines.clear();
        Some(record)
    }

    fn has_content(&self) -> bool {
        !self.id.is_empty() || !self.event.is_empty() || !self.data_lines.is_empty()
    }
}

/// Strip a trailing `\n` and then a single trailing `\r`
pub(crate) fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(builder: &mut RecordBuilder, input: &[&str]) -> Vec<EventRecord> {
        input.iter().filter_map(|line| builder.push_line(line)).collect()
    }

    #[test]
    fn test_builder_simple_record() {
        let mut builder = RecordBuilder::default();
        let records = feed(&mut builder, &["event: message", "data: Hello, world!", ""]);
        assert_eq!(records, vec![EventRecord::new("message", "Hello, world!")]);
    }

    #[test]
    fn test_builder_last_write_wins() {
        let mut builder = RecordBuilder::default();
        let records = feed(
            &mut builder,
            &["event: first", "id: 1", "event: second", "id: 2", "data: x", ""],
        );
        assert_eq!(records, vec![EventRecord::new("second", "x").with_id("2")]);
    }

    #[test]
    fn test_builder_strips_only_one_space() {
        let mut builder = RecordBuilder::default();
        let records = feed(&mut builder, &["data:   padded", ""]);
        assert_eq!(records[0].data, "  padded");
    }

    #[test]
    fn test_builder_no_space_after_colon() {
        let mut builder = RecordBuilder::default();
        let records = feed(&mut builder, &["data:value_no_space", ""]);
        assert_eq!(records[0].data, "value_no_space");
    }

    #[test]
    fn test_builder_ignores_unknown_fields_and_comments() {
        let mut builder = RecordBuilder::default();
        let records = feed(&mut builder, &["retry: 100", ": note", "foo", ""]);
        assert!(records.is_empty());
    }

    #[test]
    fn test_builder_empty_data_line_is_content() {
        let mut builder = RecordBuilder::default();
        let records = feed(&mut builder, &["data:", ""]);
        assert_eq!(records, vec![EventRecord::default()]);
        assert_eq!(records[0].data, "");
    }

    #[test]
    fn test_builder_fields_do_not_leak() {
        let mut builder = RecordBuilder::default();
        let records = feed(
            &mut builder,
            &["id: 7", "event: a", "data: 1", "", "data: 2", ""],
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], EventRecord::new("", "2"));
    }

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending("data: x\r\n"), "data: x");
        assert_eq!(trim_line_ending("data: x\n"), "data: x");
        assert_eq!(trim_line_ending("data: x"), "data: x");
        assert_eq!(trim_line_ending("\r\n"), "");
    }

    #[test]
    fn test_display() {
        let record = EventRecord::new("text", "{}").with_id("9");
        assert_eq!(record.to_string(), "[text#9] {}");
    }
}
