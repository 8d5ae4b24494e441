//! Bot API Provider
//!
//! Core component responsible for communicating with a bot endpoint
//! Sends one query, decodes the event stream and retries transient failures

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::http_client::{build_client, build_client_from_config};
use crate::model::config::{Config, TlsBackend};

use super::errors::{BotError, BotResult};
use super::model::events::{BotEvent, EventType};
use super::model::requests::{
    Attachment, PayloadBuilder, ProtocolMessage, QueryRequest, ToolDefinition, ToolPayload,
    default_payload_builder,
};
use super::model::response::ResponseMessage;
use super::parser::{EventRecord, decode_stream};
use super::report::{SharedReporter, StreamReport, TracingReporter};
use super::stream::ResponseStream;
use super::tools::{ToolExecutable, stream_request_with_tools};

/// Default bot endpoint base
pub const DEFAULT_BASE_URL: &str = "https://api.poe.com/bot/";

/// Default number of attempts per request
pub const DEFAULT_NUM_TRIES: usize = 2;

/// Default delay between attempts
pub const DEFAULT_RETRY_SLEEP: Duration = Duration::from_millis(500);

/// Default HTTP timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default capacity of the response channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Longest error body kept from a non-2xx response
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Attempt count and fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub num_tries: usize,
    pub retry_sleep: Duration,
}

impl RetryPolicy {
    /// Zero values fall back to the defaults
    pub fn new(num_tries: usize, retry_sleep: Duration) -> Self {
        Self {
            num_tries: if num_tries == 0 {
                DEFAULT_NUM_TRIES
            } else {
                num_tries
            },
            retry_sleep: if retry_sleep.is_zero() {
                DEFAULT_RETRY_SLEEP
            } else {
                retry_sleep
            },
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_TRIES, DEFAULT_RETRY_SLEEP)
    }
}

/// Options of one bot request
#[derive(Clone)]
pub struct StreamRequestOptions {
    /// Bearer token, omitted when `None` or empty
    pub api_key: Option<String>,
    /// Tool definitions; non-empty selects the two-pass tool flow
    pub tools: Vec<ToolDefinition>,
    /// Local implementations of the tools
    pub tool_executables: Vec<ToolExecutable>,
    pub retry: RetryPolicy,
    pub base_url: String,
    /// Sent before the mandatory headers, in order
    pub extra_headers: Vec<(String, String)>,
    pub channel_capacity: usize,
    pub payload_builder: PayloadBuilder,
    pub reporter: SharedReporter,
    /// Cancels the request; each request observes a child of this token
    pub cancel: CancellationToken,
}

impl Default for StreamRequestOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            tools: Vec::new(),
            tool_executables: Vec::new(),
            retry: RetryPolicy::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            extra_headers: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            payload_builder: default_payload_builder(),
            reporter: Arc::new(TracingReporter),
            cancel: CancellationToken::new(),
        }
    }
}

impl StreamRequestOptions {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_executable(mut self, executable: ToolExecutable) -> Self {
        self.tool_executables.push(executable);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_payload_builder(mut self, builder: PayloadBuilder) -> Self {
        self.payload_builder = builder;
        self
    }

    pub fn with_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl std::fmt::Debug for StreamRequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequestOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("tools", &self.tools.len())
            .field("tool_executables", &self.tool_executables.len())
            .field("retry", &self.retry)
            .field("base_url", &self.base_url)
            .field("extra_headers", &self.extra_headers.len())
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

/// Endpoint of a bot: base URL without trailing `/`, then the encoded bot name
pub fn endpoint_url(base_url: &str, bot: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(bot)
    )
}

/// Build request headers
///
/// Authorization first, then caller headers (which may replace it), then the
/// mandatory content negotiation headers. Invalid caller headers are skipped.
fn build_headers(api_key: Option<&str>, extra_headers: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(api_key) = api_key.filter(|key| !key.is_empty()) {
        match HeaderValue::from_str(&format!("Bearer {}", api_key)) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("API key is not a valid header value, sending without it"),
        }
    }

    for (name, value) in extra_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid header: {}", name),
        }
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

    headers
}

/// Open the response channel of one request
///
/// The returned token is a child of the caller's token and is cancelled when
/// the stream is dropped.
pub(crate) fn open_channel(
    options: &StreamRequestOptions,
) -> (mpsc::Sender<ResponseMessage>, ResponseStream, CancellationToken) {
    let token = options.cancel.child_token();
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    (tx, ResponseStream::new(rx, token.clone()), token)
}

/// Bot API Provider
///
/// Cheap to clone; every request runs in its own spawned task.
#[derive(Debug, Clone)]
pub struct BotProvider {
    client: Client,
}

impl BotProvider {
    /// Create a provider around an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a provider with the default timeout and no proxy
    pub fn with_default_client() -> anyhow::Result<Self> {
        let client = build_client(None, DEFAULT_TIMEOUT_SECS, TlsBackend::default())?;
        Ok(Self::new(client))
    }

    /// Create a provider from configuration (timeout, TLS backend and proxy)
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(build_client_from_config(config)?))
    }

    /// Stream a prepared payload to a bot
    pub fn run(
        &self,
        payload: Map<String, Value>,
        bot: &str,
        options: &StreamRequestOptions,
    ) -> ResponseStream {
        let (tx, stream, token) = open_channel(options);
        let orchestrator = Orchestrator::new(self.client.clone(), bot, options, token);

        tokio::spawn(async move {
            orchestrator.run(&payload, &tx).await;
        });

        stream
    }

    /// Stream a query to a bot
    ///
    /// Uses the two-pass tool flow when `options.tools` is non-empty.
    pub fn stream_request(
        &self,
        request: &QueryRequest,
        bot: &str,
        options: &StreamRequestOptions,
    ) -> ResponseStream {
        if !options.tools.is_empty() {
            return stream_request_with_tools(self.client.clone(), request, bot, options);
        }

        match (options.payload_builder)(request, &ToolPayload::default()) {
            Ok(payload) => self.run(payload, bot, options),
            Err(e) => {
                options.reporter.report(StreamReport::Aborted {
                    bot: bot.to_string(),
                    error: BotError::Protocol(format!("Failed to build request: {}", e)),
                });
                let (_, stream, _) = open_channel(options);
                stream
            }
        }
    }

    /// Build a query from messages and stream it
    pub fn get_bot_response(
        &self,
        messages: Vec<ProtocolMessage>,
        bot: &str,
        api_key: &str,
        options: &StreamRequestOptions,
    ) -> ResponseStream {
        let request = QueryRequest::new(messages);
        let options = options.clone().with_api_key(api_key);
        self.stream_request(&request, bot, &options)
    }

    /// Stream a query and return the final answer text
    pub async fn get_final_response(
        &self,
        request: &QueryRequest,
        bot: &str,
        api_key: &str,
        options: &StreamRequestOptions,
    ) -> Result<String, BotError> {
        let mut options = options.clone();
        if !api_key.is_empty() {
            options.api_key = Some(api_key.to_string());
        }

        let transcript = self
            .stream_request(request, bot, &options)
            .into_transcript()
            .await;

        if transcript.is_empty() {
            return Err(BotError::Protocol(format!("Bot {} sent no response", bot)));
        }
        Ok(transcript.text())
    }
}

/// State of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Done,
    /// Waiting before the next attempt
    RetryableFailure,
    FatalFailure,
    Cancelled,
}

/// Outcome of dispatching one record
#[derive(Debug)]
pub(crate) enum Dispatch {
    Emit(ResponseMessage),
    Skip,
    /// Soft anomaly, the stream continues
    Report(StreamReport),
    /// `silent`: no text was emitted and nothing explains it
    Done { silent: bool },
}

/// Maps records of one attempt to response messages
pub(crate) struct EventDispatcher {
    bot: String,
    records_seen: usize,
    text_emitted: usize,
    anomaly_reported: bool,
    has_tools: bool,
}

impl EventDispatcher {
    pub(crate) fn new(bot: impl Into<String>, has_tools: bool) -> Self {
        Self {
            bot: bot.into(),
            records_seen: 0,
            text_emitted: 0,
            anomaly_reported: false,
            has_tools,
        }
    }

    pub(crate) fn dispatch(&mut self, record: &EventRecord) -> BotResult<Dispatch> {
        self.records_seen += 1;

        // meta is only honored as the first record
        if EventType::from_str(&record.event) == EventType::Meta && self.records_seen != 1 {
            return Ok(Dispatch::Skip);
        }

        let event = match BotEvent::from_record(record) {
            Ok(event) => event,
            Err(e) => {
                return match e.event_type {
                    EventType::Meta => {
                        self.anomaly_reported = true;
                        Ok(Dispatch::Report(StreamReport::MalformedMeta {
                            bot: self.bot.clone(),
                            data: e.data,
                        }))
                    }
                    EventType::Error => Err(BotError::Protocol(e.data)),
                    _ => Err(BotError::Protocol(e.to_string())),
                };
            }
        };

        let message = match event {
            BotEvent::Text(text) => {
                self.text_emitted += 1;
                ResponseMessage::Text {
                    text: text.text,
                    index: text.index,
                }
            }
            BotEvent::ReplaceResponse(text) => {
                self.text_emitted += 1;
                ResponseMessage::Replace {
                    text: text.text,
                    index: text.index,
                }
            }
            BotEvent::SuggestedReply(text) => ResponseMessage::SuggestedReply {
                text: text.text,
                index: text.index,
            },
            BotEvent::File(file) => ResponseMessage::Attachment {
                index: file.index,
                attachment: Attachment {
                    url: file.url,
                    content_type: file.content_type,
                    name: file.name,
                    inline_ref: file.inline_ref,
                    parsed_content: None,
                },
            },
            BotEvent::Json { payload, index } => ResponseMessage::Json { payload, index },
            BotEvent::Meta(meta) => ResponseMessage::Meta(meta),
            BotEvent::Error(error) => {
                return Err(BotError::Server {
                    text: error.text,
                    allow_retry: error.allow_retry,
                    error_type: error.error_type,
                });
            }
            BotEvent::Ping => return Ok(Dispatch::Skip),
            BotEvent::Done => {
                return Ok(Dispatch::Done {
                    silent: self.text_emitted == 0 && !self.anomaly_reported && !self.has_tools,
                });
            }
            BotEvent::Unknown { event_type } => {
                self.anomaly_reported = true;
                return Ok(Dispatch::Report(StreamReport::UnknownEvent {
                    bot: self.bot.clone(),
                    event_type,
                }));
            }
        };

        Ok(Dispatch::Emit(message))
    }
}

/// Runs the attempts of one request
#[derive(Clone)]
pub(crate) struct Orchestrator {
    client: Client,
    bot: String,
    url: String,
    headers: HeaderMap,
    retry: RetryPolicy,
    reporter: SharedReporter,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub(crate) fn new(
        client: Client,
        bot: &str,
        options: &StreamRequestOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            bot: bot.to_string(),
            url: endpoint_url(&options.base_url, bot),
            headers: build_headers(options.api_key.as_deref(), &options.extra_headers),
            retry: options.retry,
            reporter: options.reporter.clone(),
            cancel,
        }
    }

    pub(crate) fn bot(&self) -> &str {
        &self.bot
    }

    pub(crate) fn report(&self, report: StreamReport) {
        self.reporter.report(report);
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn enter(&self, state: StreamState, attempt: usize) -> StreamState {
        tracing::trace!(bot = %self.bot, attempt, ?state, "Stream state changed");
        state
    }

    fn cancelled(&self, attempt: usize) -> StreamState {
        self.report(StreamReport::Cancelled {
            bot: self.bot.clone(),
        });
        self.enter(StreamState::Cancelled, attempt)
    }

    /// Run every attempt until one completes, fails fatally or is cancelled
    pub(crate) async fn run(
        &self,
        payload: &Map<String, Value>,
        tx: &mpsc::Sender<ResponseMessage>,
    ) -> StreamState {
        self.enter(StreamState::Idle, 0);

        let body = match serde_json::to_vec(payload) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                self.report(StreamReport::Aborted {
                    bot: self.bot.clone(),
                    error: BotError::Protocol(format!("Failed to serialize request: {}", e)),
                });
                return self.enter(StreamState::FatalFailure, 0);
            }
        };
        let has_tools = payload.get("tools").is_some_and(|tools| !tools.is_null());
        let max_attempts = self.retry.num_tries.max(1);

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return self.cancelled(attempt);
            }

            self.enter(StreamState::Connecting, attempt);
            tracing::debug!(bot = %self.bot, attempt, max_attempts, "Sending bot request");

            let error = match self.perform_query(body.clone(), has_tools, attempt, tx).await {
                Ok(()) => return self.enter(StreamState::Done, attempt),
                Err(BotError::Cancelled) => return self.cancelled(attempt),
                Err(e) => e,
            };

            if !error.is_retryable() {
                self.report(StreamReport::Aborted {
                    bot: self.bot.clone(),
                    error,
                });
                return self.enter(StreamState::FatalFailure, attempt);
            }

            if attempt == max_attempts {
                self.report(StreamReport::Exhausted {
                    bot: self.bot.clone(),
                    attempts: max_attempts,
                    error,
                });
                return self.enter(StreamState::FatalFailure, attempt);
            }

            self.enter(StreamState::RetryableFailure, attempt);
            self.report(StreamReport::AttemptFailed {
                bot: self.bot.clone(),
                attempt,
                max_attempts,
                retry_in: self.retry.retry_sleep,
                error,
            });

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(attempt),
                _ = tokio::time::sleep(self.retry.retry_sleep) => {}
            }
        }

        self.enter(StreamState::FatalFailure, max_attempts)
    }

    /// One attempt: send, check status, then dispatch records until `done`
    async fn perform_query(
        &self,
        body: Bytes,
        has_tools: bool,
        attempt: usize,
        tx: &mpsc::Sender<ResponseMessage>,
    ) -> BotResult<()> {
        let request = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send();

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(BotError::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(BotError::Cancelled),
                body = read_error_body(response) => body,
            };
            return Err(BotError::Http { status, body });
        }

        self.enter(StreamState::Streaming, attempt);

        let mut records = Box::pin(decode_stream(response.bytes_stream()));
        let mut dispatcher = EventDispatcher::new(self.bot.clone(), has_tools);

        loop {
            let record = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(BotError::Cancelled),
                record = records.next() => record,
            };

            let Some(record) = record else {
                self.report(StreamReport::MissingDone {
                    bot: self.bot.clone(),
                });
                return Ok(());
            };

            match dispatcher.dispatch(&record?)? {
                Dispatch::Emit(message) => self.send(tx, message).await?,
                Dispatch::Skip => {}
                Dispatch::Report(report) => self.report(report),
                Dispatch::Done { silent } => {
                    if silent {
                        self.report(StreamReport::NoTextInResponse {
                            bot: self.bot.clone(),
                        });
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Send one message, waiting while the channel is full
    ///
    /// A closed channel means the consumer is gone and counts as cancellation.
    pub(crate) async fn send(
        &self,
        tx: &mpsc::Sender<ResponseMessage>,
        message: ResponseMessage,
    ) -> BotResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BotError::Cancelled),
            result = tx.send(message) => result.map_err(|_| BotError::Cancelled),
        }
    }
}

/// Read at most `MAX_ERROR_BODY` bytes of an error response
async fn read_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(Ok(chunk)) = chunks.next().await {
        let room = MAX_ERROR_BODY - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    String::from_utf8_lossy(&body).into_owned()
}
