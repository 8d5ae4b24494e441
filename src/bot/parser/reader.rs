//! Pull-based front-ends over the record state machine
//!
//! - [`EventReader`]: blocking iterator over any `BufRead`
//! - [`decode_stream`]: async stream over a chunked byte stream (HTTP body)

use std::io::BufRead;

use futures::{Stream, StreamExt};

use super::decoder::EventStreamDecoder;
use super::error::{CodecError, CodecResult};
use super::record::{EventRecord, RecordBuilder, trim_line_ending};

/// Blocking event reader
///
/// Lazy, finite and non-restartable: once it returns `None` or an error,
/// every later call returns `None`.
pub struct EventReader<R> {
    reader: R,
    builder: RecordBuilder,
    line: String,
    done: bool,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            builder: RecordBuilder::default(),
            line: String::new(),
            done: false,
        }
    }

    /// Read the next record, `Ok(None)` at end of stream
    pub fn read_record(&mut self) -> CodecResult<Option<EventRecord>> {
        if self.done {
            return Ok(None);
        }

        loop {
            self.line.clear();
            let read = match self.reader.read_line(&mut self.line) {
                Ok(read) => read,
                Err(e) => {
                    self.done = true;
                    return Err(CodecError::Io(e));
                }
            };

            if read == 0 {
                self.done = true;
                return Ok(self.builder.take());
            }

            if let Some(record) = self.builder.push_line(trim_line_ending(&self.line)) {
                return Ok(Some(record));
            }
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = CodecResult<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Decode a chunked byte stream into event records
///
/// A transport error ends the stream after being yielded as
/// [`CodecError::Io`].
pub fn decode_stream<S, B, E>(body: S) -> impl Stream<Item = CodecResult<EventRecord>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::stream! {
        let mut decoder = EventStreamDecoder::new();
        let mut body = Box::pin(body);

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(CodecError::Io(std::io::Error::other(e)));
                    return;
                }
            };

            if let Err(e) = decoder.feed(chunk.as_ref()) {
                yield Err(e);
                return;
            }

            loop {
                match decoder.decode() {
                    Ok(Some(record)) => yield Ok(record),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        decoder.finish();
        for result in decoder.decode_iter() {
            yield result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};

    fn read_all(input: &str) -> Vec<EventRecord> {
        EventReader::new(Cursor::new(input))
            .collect::<CodecResult<Vec<_>>>()
            .unwrap()
    }

    /// Reader that yields some bytes and then fails
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            Ok(n)
        }
    }

    #[test]
    fn test_reader_sequence() {
        let records = read_all(
            "event: first\ndata: First event\n\nevent: second\ndata: Second event\n\ndata: Third event without type\n\n",
        );
        assert_eq!(
            records,
            vec![
                EventRecord::new("first", "First event"),
                EventRecord::new("second", "Second event"),
                EventRecord::new("", "Third event without type"),
            ]
        );
    }

    #[test]
    fn test_reader_comments_only() {
        assert!(read_all(": comment\n: another comment\n").is_empty());
        assert!(read_all("").is_empty());
    }

    #[test]
    fn test_reader_id_and_empty_data() {
        let records = read_all("id: 123\nevent: ping\ndata:\n\n");
        assert_eq!(records, vec![EventRecord::new("ping", "").with_id("123")]);
    }

    #[test]
    fn test_reader_no_trailing_newline() {
        let records = read_all("event: message\ndata: Hello\n\nevent: last\ndata: No trailing newline");
        assert_eq!(records[1], EventRecord::new("last", "No trailing newline"));
    }

    #[test]
    fn test_reader_io_error_is_not_eof() {
        let reader = io::BufReader::new(FailingReader {
            data: Cursor::new(b"data: ok\n\ndata: partial\n".to_vec()),
        });
        let mut reader = EventReader::new(reader);

        assert_eq!(reader.next().unwrap().unwrap(), EventRecord::new("", "ok"));
        assert!(matches!(reader.next(), Some(Err(CodecError::Io(_)))));
        assert!(reader.next().is_none());
    }

    #[tokio::test]
    async fn test_decode_stream_chunks() {
        let chunks: Vec<Result<&'static [u8], io::Error>> = vec![
            Ok(&b"event: text\nda"[..]),
            Ok(&b"ta: {\"text\": \"Hello\"}\n"[..]),
            Ok(&b"\nevent: done\ndata: {}"[..]),
        ];
        let records: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;

        let records = records.into_iter().collect::<CodecResult<Vec<_>>>().unwrap();
        assert_eq!(
            records,
            vec![
                EventRecord::new("text", r#"{"text": "Hello"}"#),
                EventRecord::new("done", "{}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_stream_transport_error() {
        let chunks: Vec<Result<&'static [u8], io::Error>> = vec![
            Ok(&b"data: one\n\n"[..]),
            Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            Ok(&b"data: never\n\n"[..]),
        ];
        let records: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;

        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        assert!(matches!(records[1], Err(CodecError::Io(_))));
    }
}
