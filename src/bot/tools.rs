//! Tool calling
//!
//! Two passes over the same bot:
//!
//! 1. The query is sent with tool definitions. Tool call fragments arrive in
//!    `json` records shaped like chat completion chunks and are merged per
//!    call index.
//! 2. The calls are executed locally and the query is sent again with the
//!    calls and their results. Its output goes straight to the consumer.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::errors::BotError;
use super::model::requests::{
    QueryRequest, ToolCallDefinition, ToolCallDelta, ToolPayload, ToolResultDefinition,
};
use super::model::response::ResponseMessage;
use super::provider::{Orchestrator, StreamRequestOptions, StreamState, open_channel};
use super::report::{Reporter, StreamReport};
use super::stream::ResponseStream;

/// Future returned by a tool; the error becomes the result content
pub type ToolFuture = BoxFuture<'static, Result<String, String>>;

/// A named local function the bot may call
#[derive(Clone)]
pub struct ToolExecutable {
    name: String,
    execute: Arc<dyn Fn(String) -> ToolFuture + Send + Sync>,
}

impl ToolExecutable {
    /// Wrap an async function taking the raw JSON arguments
    pub fn new<F, Fut, E>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, E>> + Send + 'static,
        E: std::fmt::Display + 'static,
    {
        let execute = move |arguments: String| -> ToolFuture {
            let fut = f(arguments);
            Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
        };

        Self {
            name: name.into(),
            execute: Arc::new(execute),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call(&self, arguments: String) -> Result<String, String> {
        (self.execute)(arguments).await
    }
}

impl std::fmt::Debug for ToolExecutable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutable")
            .field("name", &self.name)
            .finish()
    }
}

/// Merges streamed tool call fragments of pass 1
///
/// Calls are keyed by fragment index. The first fragment of an index must
/// carry id, type and function name; otherwise the index is never started and
/// its later fragments are dropped.
#[derive(Debug, Default)]
pub struct ToolCallAggregator {
    calls: BTreeMap<usize, ToolCallDefinition>,
    pass_through: bool,
}

impl ToolCallAggregator {
    /// `pass_through`: forward fragments as [`ResponseMessage::ToolCallDeltas`]
    /// instead of merging them
    pub fn new(pass_through: bool) -> Self {
        Self {
            calls: BTreeMap::new(),
            pass_through,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.pass_through
    }

    /// Inspect one pass-1 message, returning what to forward to the consumer
    pub fn intercept(&mut self, message: ResponseMessage) -> Option<ResponseMessage> {
        let (payload, index) = match &message {
            ResponseMessage::Json { payload, index } => (payload, *index),
            _ => return Some(message),
        };

        let Some(choices) = payload.get("choices").filter(|c| !c.is_null()) else {
            return Some(message);
        };
        let Some(choice) = choices
            .as_array()
            .and_then(|choices| choices.first())
            .and_then(Value::as_object)
        else {
            return Some(message);
        };

        if choice.get("finish_reason").is_some_and(|r| !r.is_null()) {
            return None;
        }

        let Some(delta) = choice.get("delta").and_then(Value::as_object) else {
            return Some(message);
        };

        if let Some(tool_calls) = delta.get("tool_calls") {
            let deltas: Vec<ToolCallDelta> = tool_calls
                .as_array()?
                .iter()
                .filter_map(|raw| ToolCallDelta::deserialize(raw).ok())
                .collect();

            if self.pass_through {
                return Some(ResponseMessage::ToolCallDeltas { deltas, index });
            }

            self.merge(&deltas);
            return None;
        }

        delta
            .get("content")
            .and_then(Value::as_str)
            .map(|content| ResponseMessage::Text {
                text: content.to_string(),
                index,
            })
    }

    /// Merge fragments into the aggregated calls
    pub fn merge(&mut self, deltas: &[ToolCallDelta]) {
        for delta in deltas {
            match self.calls.entry(delta.index) {
                Entry::Occupied(mut entry) => {
                    entry
                        .get_mut()
                        .function
                        .arguments
                        .push_str(&delta.function.arguments);
                }
                Entry::Vacant(entry) => {
                    if let Some(call) = delta.start_call() {
                        entry.insert(call);
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Aggregated calls in ascending index order
    pub fn into_tool_calls(self) -> Vec<ToolCallDefinition> {
        self.calls.into_values().collect()
    }
}

/// Execute tool calls one after another
///
/// Calls without a registered executable are reported and produce no result.
/// A failed call produces its error message as content.
pub async fn execute_tools(
    calls: &[ToolCallDefinition],
    executables: &[ToolExecutable],
    reporter: &dyn Reporter,
    cancel: &CancellationToken,
) -> Result<Vec<ToolResultDefinition>, BotError> {
    let by_name: HashMap<&str, &ToolExecutable> = executables
        .iter()
        .map(|executable| (executable.name(), executable))
        .collect();

    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let Some(executable) = by_name.get(call.function.name.as_str()) else {
            reporter.report(StreamReport::ToolNotFound {
                name: call.function.name.clone(),
            });
            continue;
        };

        tracing::debug!(tool = %call.function.name, call_id = %call.id, "Executing tool");
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BotError::Cancelled),
            outcome = executable.call(call.function.arguments.clone()) => outcome,
        };

        let content = match outcome {
            Ok(content) => content,
            Err(error) => {
                reporter.report(StreamReport::ToolFailed {
                    name: call.function.name.clone(),
                    error: error.clone(),
                });
                error
            }
        };

        results.push(ToolResultDefinition::for_call(call, content));
    }

    Ok(results)
}

/// Start the two-pass tool flow
pub(crate) fn stream_request_with_tools(
    client: Client,
    request: &QueryRequest,
    bot: &str,
    options: &StreamRequestOptions,
) -> ResponseStream {
    let (tx, stream, token) = open_channel(options);
    let orchestrator = Orchestrator::new(client, bot, options, token);
    let request = request.clone();
    let options = options.clone();

    tokio::spawn(async move {
        run_with_tools(orchestrator, request, options, tx).await;
    });

    stream
}

async fn run_with_tools(
    orchestrator: Orchestrator,
    request: QueryRequest,
    options: StreamRequestOptions,
    tx: mpsc::Sender<ResponseMessage>,
) {
    let build = &options.payload_builder;
    let bot = orchestrator.bot().to_string();

    let first_payload = match build(
        &request,
        &ToolPayload {
            tools: Some(&options.tools),
            ..Default::default()
        },
    ) {
        Ok(payload) => payload,
        Err(e) => {
            orchestrator.report(StreamReport::Aborted {
                bot,
                error: BotError::Protocol(format!("Failed to build request: {}", e)),
            });
            return;
        }
    };

    // Pass 1 runs in its own task and channel
    let (first_tx, mut first_rx) = mpsc::channel(options.channel_capacity.max(1));
    let first_pass = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run(&first_payload, &first_tx).await })
    };

    let mut aggregator = ToolCallAggregator::new(options.tool_executables.is_empty());
    while let Some(message) = first_rx.recv().await {
        if let Some(message) = aggregator.intercept(message) {
            if orchestrator.send(&tx, message).await.is_err() {
                return;
            }
        }
    }

    match first_pass.await {
        Ok(StreamState::Cancelled) => return,
        Ok(_) => {}
        Err(e) => {
            tracing::error!(bot = %bot, "Tool call pass failed: {}", e);
            return;
        }
    }

    if aggregator.is_pass_through() || aggregator.is_empty() {
        return;
    }

    let calls = aggregator.into_tool_calls();
    tracing::debug!(bot = %bot, calls = calls.len(), "Executing tool calls");

    let results = match execute_tools(
        &calls,
        &options.tool_executables,
        options.reporter.as_ref(),
        orchestrator.cancel_token(),
    )
    .await
    {
        Ok(results) => results,
        Err(_) => {
            orchestrator.report(StreamReport::Cancelled { bot });
            return;
        }
    };

    let second_payload = match build(
        &request,
        &ToolPayload {
            tools: Some(&options.tools),
            tool_calls: Some(&calls),
            tool_results: Some(&results),
        },
    ) {
        Ok(payload) => payload,
        Err(e) => {
            orchestrator.report(StreamReport::Aborted {
                bot,
                error: BotError::Protocol(format!("Failed to build request: {}", e)),
            });
            return;
        }
    };

    orchestrator.run(&second_payload, &tx).await;
}
