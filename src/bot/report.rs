//! Stream reports
//!
//! Conditions a stream cannot return to its consumer (the consumer only sees
//! messages) are handed to a [`Reporter`] instead.

use std::sync::Arc;
use std::time::Duration;

use super::errors::BotError;

/// Condition observed while running a request
#[derive(Debug)]
pub enum StreamReport {
    /// Retryable failure; another attempt follows after `retry_in`
    AttemptFailed {
        bot: String,
        attempt: usize,
        max_attempts: usize,
        retry_in: Duration,
        error: BotError,
    },
    /// Non-retryable failure, no further attempts
    Aborted { bot: String, error: BotError },
    /// Last attempt failed
    Exhausted {
        bot: String,
        attempts: usize,
        error: BotError,
    },
    /// `done` arrived without any text and no tools were requested
    NoTextInResponse { bot: String },
    /// Body ended without a `done` record
    MissingDone { bot: String },
    UnknownEvent { bot: String, event_type: String },
    /// First record was a `meta` that could not be parsed
    MalformedMeta { bot: String, data: String },
    ToolNotFound { name: String },
    ToolFailed { name: String, error: String },
    Cancelled { bot: String },
}

/// Receiver of stream reports
pub trait Reporter: Send + Sync {
    fn report(&self, report: StreamReport);
}

impl<F> Reporter for F
where
    F: Fn(StreamReport) + Send + Sync,
{
    fn report(&self, report: StreamReport) {
        self(report)
    }
}

/// Shared reporter handle
pub type SharedReporter = Arc<dyn Reporter>;

/// Default reporter, logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, report: StreamReport) {
        match report {
            StreamReport::AttemptFailed {
                bot,
                attempt,
                max_attempts,
                retry_in,
                error,
            } => {
                tracing::warn!(
                    bot = %bot,
                    attempt,
                    max_attempts,
                    "Bot request failed, retrying in {:?}: {}",
                    retry_in,
                    error
                );
            }
            StreamReport::Aborted { bot, error } => {
                tracing::error!(bot = %bot, "Bot request failed: {}", error);
            }
            StreamReport::Exhausted {
                bot,
                attempts,
                error,
            } => {
                tracing::error!(
                    bot = %bot,
                    attempts,
                    "Bot request failed after {} attempts: {}",
                    attempts,
                    error
                );
            }
            StreamReport::NoTextInResponse { bot } => {
                tracing::warn!(bot = %bot, "Bot returned no text in response");
            }
            StreamReport::MissingDone { bot } => {
                tracing::warn!(bot = %bot, "Bot exited without sending 'done' event");
            }
            StreamReport::UnknownEvent { bot, event_type } => {
                tracing::warn!(bot = %bot, "Unknown event type: {}", event_type);
            }
            StreamReport::MalformedMeta { bot, data } => {
                tracing::warn!(bot = %bot, "Invalid JSON in meta event: {}", data);
            }
            StreamReport::ToolNotFound { name } => {
                tracing::warn!("Tool executable not found: {}", name);
            }
            StreamReport::ToolFailed { name, error } => {
                tracing::warn!("Tool {} failed: {}", name, error);
            }
            StreamReport::Cancelled { bot } => {
                tracing::debug!(bot = %bot, "Bot request cancelled");
            }
        }
    }
}

/// Reporter that keeps every report, for inspection in tests
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct CollectingReporter {
    reports: Arc<std::sync::Mutex<Vec<StreamReport>>>,
}

#[cfg(test)]
impl CollectingReporter {
    pub(crate) fn take(&self) -> Vec<StreamReport> {
        std::mem::take(&mut *self.reports.lock().unwrap())
    }
}

#[cfg(test)]
impl Reporter for CollectingReporter {
    fn report(&self, report: StreamReport) {
        self.reports.lock().unwrap().push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_reporter() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let reporter: SharedReporter = Arc::new(move |_report: StreamReport| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(StreamReport::MissingDone {
            bot: "b".to_string(),
        });
        reporter.report(StreamReport::ToolNotFound {
            name: "t".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();
        reporter.report(StreamReport::UnknownEvent {
            bot: "b".to_string(),
            event_type: "message".to_string(),
        });
        let reports = reporter.take();
        assert!(matches!(
            &reports[..],
            [StreamReport::UnknownEvent { event_type, .. }] if event_type == "message"
        ));
        assert!(reporter.take().is_empty());
    }

    #[test]
    fn test_tracing_reporter_accepts_every_report() {
        let reporter = TracingReporter;
        reporter.report(StreamReport::Aborted {
            bot: "b".to_string(),
            error: BotError::Protocol("bad".to_string()),
        });
        reporter.report(StreamReport::Cancelled {
            bot: "b".to_string(),
        });
    }
}
