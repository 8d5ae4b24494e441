//! Event stream parser
//!
//! Line-oriented codec for the `text/event-stream` responses returned by
//! bot endpoints. Knows nothing about the conversation protocol above it.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod reader;
pub mod record;

pub use decoder::EventStreamDecoder;
pub use encoder::EventWriter;
pub use error::{CodecError, CodecResult};
pub use reader::{EventReader, decode_stream};
pub use record::EventRecord;
