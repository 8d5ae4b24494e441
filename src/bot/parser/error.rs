//! Event stream codec error definitions

use std::fmt;

/// Codec error types
///
/// End of stream is never an error; it is reported as `None` by the
/// decoders.
#[derive(Debug)]
pub enum CodecError {
    /// Underlying reader, writer or transport failed
    Io(std::io::Error),
    /// A line was not valid UTF-8
    InvalidUtf8 { line: usize },
    /// Pending bytes exceed the decoder limit
    BufferOverflow { size: usize, max: usize },
    /// Data was fed after `finish()` was called
    Finished,
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Event stream IO error: {}", e),
            Self::InvalidUtf8 { line } => write!(f, "Invalid UTF-8 on line {}", line),
            Self::BufferOverflow { size, max } => {
                write!(f, "Buffer overflow: {} bytes (max {})", size, max)
            }
            Self::Finished => write!(f, "Decoder already finished, no more input accepted"),
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Codec result type
pub type CodecResult<T> = Result<T, CodecError>;
