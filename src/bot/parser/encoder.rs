//! Event stream encoder
//!
//! Writes records in the same line format the decoder reads:
//!
//! ```text
//! id: <id>          (omitted when empty)
//! event: <type>     (omitted when empty)
//! data: <data>      (always present, one line per data segment)
//! <blank line>
//! ```

use std::io::Write;

use super::error::CodecResult;
use super::record::EventRecord;

/// Render a record to its field lines
///
/// Each entry is one atomic write. The last entry carries the blank line
/// terminating the record.
fn field_lines(record: &EventRecord) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);

    if !record.id.is_empty() {
        lines.push(format!("id: {}\n", record.id));
    }
    if !record.event.is_empty() {
        lines.push(format!("event: {}\n", record.event));
    }

    let mut segments = record.data.split('\n').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_some() {
            lines.push(format!("data: {}\n", segment));
        } else {
            lines.push(format!("data: {}\n\n", segment));
        }
    }

    lines
}

impl EventRecord {
    /// Format as an event-stream string
    pub fn to_sse_string(&self) -> String {
        field_lines(self).concat()
    }
}

/// Event writer over any `std::io::Write` sink
///
/// Flushes after every record so records reach the peer as they are
/// produced.
pub struct EventWriter<W> {
    inner: W,
    records_written: usize,
}

impl<W: Write> EventWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            records_written: 0,
        }
    }

    /// Write one record and flush
    ///
    /// The first failed write aborts the rest of the record.
    pub fn write_record(&mut self, record: &EventRecord) -> CodecResult<()> {
        for line in field_lines(record) {
            self.inner.write_all(line.as_bytes())?;
        }
        self.inner.flush()?;
        self.records_written += 1;
        Ok(())
    }

    /// Number of records fully written
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
