//! Consumer side of a bot request
//!
//! Messages are produced by a spawned task into a bounded channel; a full
//! channel blocks the producer until the consumer catches up.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::model::response::{ResponseMessage, Transcript};

/// Ordered stream of response messages
///
/// Ends when the response completes, fails or is cancelled. Dropping it
/// cancels the producing task.
pub struct ResponseStream {
    rx: mpsc::Receiver<ResponseMessage>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl ResponseStream {
    /// Wrap a receiver; `token` is cancelled when the stream is dropped
    pub(crate) fn new(rx: mpsc::Receiver<ResponseMessage>, token: CancellationToken) -> Self {
        Self {
            rx,
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    /// Receive the next message, `None` once the response is over
    pub async fn recv(&mut self) -> Option<ResponseMessage> {
        self.rx.recv().await
    }

    /// Stop the request; the stream ends after already queued messages
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drain the stream into a transcript
    pub async fn into_transcript(mut self) -> Transcript {
        let mut transcript = Transcript::new();
        while let Some(message) = self.recv().await {
            transcript.push(&message);
        }
        transcript
    }
}

impl Stream for ResponseStream {
    type Item = ResponseMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
