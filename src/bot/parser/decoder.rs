//! Event stream push decoder
//!
//! Buffers raw bytes and cuts them into lines, feeding each line to the
//! record state machine.
//!
//! ## State Machine Design
//!
//! ```text
//! ┌─────────────────┐
//! │      Ready      │  (Initial state, accepts data)
//! └────────┬────────┘
//!          │ finish() marks end of input
//!          ↓
//! ┌─────────────────┐
//! │    Finishing    │  decode() drains remaining lines and the pending record
//! └────────┬────────┘
//!          │ nothing left
//!          ↓
//! ┌─────────────────┐
//! │    Finished     │  (Terminal state)
//! └─────────────────┘
//!
//! Any decode error moves the decoder to Stopped (terminal state).
//! ```

use super::error::{CodecError, CodecResult};
use super::record::{EventRecord, RecordBuilder, trim_line_ending};
use bytes::BytesMut;

/// Default maximum buffer size (16 MB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Default initial buffer capacity
pub const DEFAULT_BUFFER_CAPACITY: usize = 8192;

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Ready, can receive data
    Ready,
    /// End of input announced, draining what is buffered
    Finishing,
    /// All input consumed, no more records
    Finished,
    /// Stopped after an error
    Stopped,
}

/// Streaming event decoder
///
/// # Example
///
/// ```rust
/// use botstream::bot::parser::EventStreamDecoder;
///
/// let mut decoder = EventStreamDecoder::new();
/// decoder.feed(b"event: text\ndata: {\"text\":\"hi\"}\n\n").unwrap();
///
/// let record = decoder.decode().unwrap().unwrap();
/// assert_eq!(record.event, "text");
/// assert!(decoder.decode().unwrap().is_none());
/// ```
pub struct EventStreamDecoder {
    /// Bytes not yet split into lines
    buffer: BytesMut,
    /// Current state
    state: DecoderState,
    /// Record being assembled
    builder: RecordBuilder,
    /// Number of records decoded
    records_decoded: usize,
    /// Number of lines consumed
    lines_read: usize,
    /// Maximum buffer size
    max_buffer_size: usize,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStreamDecoder {
    /// Create new decoder
    pub fn new() -> Self {
        Self::with_config(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_BUFFER_SIZE)
    }

    /// Create decoder with custom configuration
    pub fn with_config(capacity: usize, max_buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: DecoderState::Ready,
            builder: RecordBuilder::default(),
            records_decoded: 0,
            lines_read: 0,
            max_buffer_size,
        }
    }

    /// Feed data to decoder
    ///
    /// # Returns
    /// - `Ok(())` - Data added to buffer
    /// - `Err(BufferOverflow)` - Buffer is full
    /// - `Err(Finished)` - `finish()` was already called
    pub fn feed(&mut self, data: &[u8]) -> CodecResult<()> {
        if self.state != DecoderState::Ready {
            return Err(CodecError::Finished);
        }

        let new_size = self.buffer.len() + data.len();
        if new_size > self.max_buffer_size {
            self.state = DecoderState::Stopped;
            return Err(CodecError::BufferOverflow {
                size: new_size,
                max: self.max_buffer_size,
            });
        }

        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Announce end of input
    ///
    /// After this, `decode()` also yields the trailing line without a
    /// newline and the record still pending without a blank line.
    pub fn finish(&mut self) {
        if self.state == DecoderState::Ready {
            self.state = DecoderState::Finishing;
        }
    }

    /// Try to decode next record
    ///
    /// # Returns
    /// - `Ok(Some(record))` - A record was completed
    /// - `Ok(None)` - Need more data, or the stream is over
    /// - `Err(e)` - Decode error, decoder is stopped
    pub fn decode(&mut self) -> CodecResult<Option<EventRecord>> {
        match self.state {
            DecoderState::Finished | DecoderState::Stopped => return Ok(None),
            DecoderState::Ready | DecoderState::Finishing => {}
        }

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            if let Some(record) = self.push_raw_line(&line)? {
                return Ok(Some(record));
            }
        }

        if self.state == DecoderState::Ready {
            return Ok(None);
        }

        // Finishing: the remainder is the last line, then flush
        if !self.buffer.is_empty() {
            let line = self.buffer.split();
            if let Some(record) = self.push_raw_line(&line)? {
                return Ok(Some(record));
            }
        }

        self.state = DecoderState::Finished;
        Ok(self.builder.take().inspect(|_| self.records_decoded += 1))
    }

    /// Create decode iterator
    pub fn decode_iter(&mut self) -> DecodeIter<'_> {
        DecodeIter { decoder: self }
    }

    fn push_raw_line(&mut self, raw: &[u8]) -> CodecResult<Option<EventRecord>> {
        self.lines_read += 1;

        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(_) => {
                self.state = DecoderState::Stopped;
                tracing::warn!("Event stream decoder stopped: invalid UTF-8 on line {}", self.lines_read);
                return Err(CodecError::InvalidUtf8 {
                    line: self.lines_read,
                });
            }
        };

        let record = self.builder.push_line(trim_line_ending(line));
        if record.is_some() {
            self.records_decoded += 1;
        }
        Ok(record)
    }

    // ==================== Lifecycle management methods ====================

    /// Reset decoder to initial state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = DecoderState::Ready;
        self.builder = RecordBuilder::default();
        self.records_decoded = 0;
        self.lines_read = 0;
    }

    /// Get current state
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Check if all input has been consumed
    pub fn is_finished(&self) -> bool {
        self.state == DecoderState::Finished
    }

    /// Get number of decoded records
    pub fn records_decoded(&self) -> usize {
        self.records_decoded
    }

    /// Get number of pending bytes in buffer
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Decode iterator
///
/// Stops at the first error or when no complete record is available.
pub struct DecodeIter<'a> {
    decoder: &'a mut EventStreamDecoder,
}

impl Iterator for DecodeIter<'_> {
    type Item = CodecResult<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.decode().transpose()
    }
}
