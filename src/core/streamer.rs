//! One conversation turn against the model.
//!
//! ```text
//! Idle -> Sending -> Streaming -> {AwaitingTool -> Streaming}* -> Complete | Failed | Cancelled
//! ```
//!
//! The streamer is the single consumer of the backend's event channel. It
//! owns cancellation (checked between fragments and before each tool call)
//! and throttles view refreshes so bursts of fragments coalesce into one
//! redraw.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ChatMessage, ChatRequest, ChatToolCallDelta};
use crate::core::chat_stream::{ChatBackend, StreamMessage};
use crate::core::error::AgentError;
use crate::core::message::{Conversation, Message, MessageStatus, Part, ROLE_USER};
use crate::tools::executor::{failure_result, label_body_failure};
use crate::tools::{ToolExecutor, ToolInvocation, ToolPayload, ToolResult, ToolStatus};
use crate::ui::live::LiveView;

pub const SUMMARY_PROMPT: &str = "Summarize our conversation so far in a few short bullet points. \
Mention any tool results that matter.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sending,
    Streaming,
    AwaitingTool,
    Complete,
    Failed,
    Cancelled,
}

impl TurnPhase {
    pub fn label(self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Sending => "sending",
            TurnPhase::Streaming => "streaming",
            TurnPhase::AwaitingTool => "running tool",
            TurnPhase::Complete => "complete",
            TurnPhase::Failed => "failed",
            TurnPhase::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Complete,
    Failed(AgentError),
    Cancelled,
}

impl TurnOutcome {
    pub fn phase(&self) -> TurnPhase {
        match self {
            TurnOutcome::Complete => TurnPhase::Complete,
            TurnOutcome::Failed(_) => TurnPhase::Failed,
            TurnOutcome::Cancelled => TurnPhase::Cancelled,
        }
    }
}

/// A tool call the model made during the turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolActivity {
    pub call: String,
    pub result: ToolResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Everything the view showed, across tool rounds.
    pub text: String,
    pub tool_rounds: usize,
    pub tools: Vec<ToolActivity>,
}

#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub enable_tools: bool,
    pub allow_execution: bool,
    pub max_tool_rounds: usize,
    pub refresh_interval: Duration,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Per-round state; dropped when the round ends.
#[derive(Debug, Default)]
struct StreamState {
    text: String,
    pending: BTreeMap<u32, PendingCall>,
    terminal: bool,
}

impl StreamState {
    /// Merge a tool-call fragment. Ids and names arrive once, argument JSON
    /// arrives in pieces keyed by `index`.
    fn absorb(&mut self, delta: ChatToolCallDelta) {
        if self.terminal {
            return;
        }
        let index = match delta.index {
            Some(index) => index,
            None => match (delta.id.as_deref(), self.pending.iter().next_back()) {
                (Some(id), Some((&last, call))) if !call.id.is_empty() && call.id != id => last + 1,
                (_, Some((&last, _))) => last,
                (_, None) => 0,
            },
        };
        let call = self.pending.entry(index).or_default();
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            call.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                call.name = name;
            }
            if let Some(arguments) = function.arguments {
                call.arguments.push_str(&arguments);
            }
        }
    }

    fn take_calls(&mut self) -> Vec<PendingCall> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(index, mut call)| {
                if call.id.is_empty() {
                    call.id = format!("call_{index}");
                }
                call
            })
            .collect()
    }
}

enum RoundEnd {
    Finished,
    Cancelled,
    Error(String),
}

/// Running totals for the report.
#[derive(Default)]
struct Turn {
    display: String,
    rounds: usize,
    tools: Vec<ToolActivity>,
}

pub struct ChatStreamer<'a> {
    backend: &'a dyn ChatBackend,
    executor: &'a ToolExecutor,
    settings: TurnSettings,
}

impl<'a> ChatStreamer<'a> {
    pub fn new(backend: &'a dyn ChatBackend, executor: &'a ToolExecutor, settings: TurnSettings) -> Self {
        Self {
            backend,
            executor,
            settings,
        }
    }

    fn request(&self, messages: Vec<ChatMessage>, with_tools: bool) -> ChatRequest {
        let tools = (with_tools && self.settings.enable_tools)
            .then(|| self.executor.registry().function_definitions())
            .filter(|tools| !tools.is_empty());
        ChatRequest {
            model: self.settings.model.clone(),
            messages,
            stream: true,
            temperature: Some(self.settings.temperature),
            top_p: Some(self.settings.top_p),
            max_tokens: Some(self.settings.max_tokens),
            tools,
        }
    }

    /// `Ok(None)` when the user cancelled before the backend answered.
    async fn submit(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<UnboundedReceiver<StreamMessage>>, AgentError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            opened = self.backend.open_stream(request, cancel.clone()) => opened.map(Some),
        }
    }

    fn enter(&self, view: &mut dyn LiveView, phase: TurnPhase, detail: &str) {
        debug!(phase = phase.label(), detail, "turn phase");
        view.phase(phase, detail);
    }

    fn finish(&self, view: &mut dyn LiveView, turn: Turn, outcome: TurnOutcome) -> TurnReport {
        match &outcome {
            TurnOutcome::Failed(err) => warn!(error = %err, rounds = turn.rounds, "turn failed"),
            other => info!(
                outcome = other.phase().label(),
                rounds = turn.rounds,
                chars = turn.display.len(),
                "turn finished"
            ),
        }
        let detail = match &outcome {
            TurnOutcome::Failed(err) => err.to_string(),
            _ => String::new(),
        };
        view.phase(outcome.phase(), &detail);
        view.finish();
        TurnReport {
            outcome,
            text: turn.display,
            tool_rounds: turn.rounds,
            tools: turn.tools,
        }
    }

    /// Drain one streamed reply into `state`, refreshing the view at most
    /// once per refresh interval.
    async fn consume(
        &self,
        rx: &mut UnboundedReceiver<StreamMessage>,
        state: &mut StreamState,
        prefix: &str,
        view: &mut dyn LiveView,
        cancel: &CancellationToken,
    ) -> RoundEnd {
        let period = self.settings.refresh_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut dirty = false;

        let end = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break RoundEnd::Cancelled,
                _ = ticker.tick(), if dirty => {
                    view.refresh(&format!("{prefix}{}", state.text));
                    dirty = false;
                }
                message = rx.recv() => match message {
                    Some(StreamMessage::Chunk(text)) => {
                        state.text.push_str(&text);
                        dirty = true;
                    }
                    Some(StreamMessage::ToolCall(delta)) => state.absorb(delta),
                    Some(StreamMessage::Error(message)) => break RoundEnd::Error(message),
                    Some(StreamMessage::End) | None => break RoundEnd::Finished,
                },
            }
        };

        state.terminal = true;
        if dirty {
            view.refresh(&format!("{prefix}{}", state.text));
        }
        end
    }

    /// Run a full turn for `user_text`. The user message enters
    /// `conversation` only once the model has accepted the request; at most
    /// one assistant message is committed.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        system_prompt: &str,
        user_text: &str,
        view: &mut dyn LiveView,
        cancel: &CancellationToken,
    ) -> TurnReport {
        let mut turn = Turn::default();

        self.enter(view, TurnPhase::Sending, &self.settings.model);
        let mut messages = conversation.to_api_messages(system_prompt);
        messages.push(ChatMessage::new(ROLE_USER, user_text));
        let mut rx = match self.submit(self.request(messages, true), cancel).await {
            Ok(Some(rx)) => rx,
            Ok(None) => return self.finish(view, turn, TurnOutcome::Cancelled),
            Err(err) => return self.finish(view, turn, TurnOutcome::Failed(err)),
        };
        conversation.push(Message::user(user_text));

        loop {
            self.enter(view, TurnPhase::Streaming, "");
            let mut state = StreamState::default();
            let end = self
                .consume(&mut rx, &mut state, &turn.display, view, cancel)
                .await;
            turn.display.push_str(&state.text);

            match end {
                RoundEnd::Cancelled => {
                    conversation.push(Message::assistant(state.text, MessageStatus::Cancelled));
                    return self.finish(view, turn, TurnOutcome::Cancelled);
                }
                RoundEnd::Error(message) => {
                    if !state.text.is_empty() {
                        conversation.push(Message::assistant(state.text, MessageStatus::Failed));
                    }
                    return self.finish(view, turn, TurnOutcome::Failed(AgentError::ModelStream(message)));
                }
                RoundEnd::Finished if state.pending.is_empty() => {
                    conversation.push(Message::assistant(state.text, MessageStatus::Complete));
                    return self.finish(view, turn, TurnOutcome::Complete);
                }
                RoundEnd::Finished => {}
            }

            let limit = self.settings.max_tool_rounds;
            if turn.rounds >= limit {
                if !state.text.is_empty() {
                    conversation.push(Message::assistant(state.text, MessageStatus::Failed));
                }
                return self.finish(view, turn, TurnOutcome::Failed(AgentError::ToolCallLimitExceeded { limit }));
            }
            turn.rounds += 1;

            let calls = state.take_calls();
            let names = calls
                .iter()
                .map(|call| call.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            self.enter(view, TurnPhase::AwaitingTool, &names);

            let interrupted = self
                .run_tool_round(conversation, &state.text, calls, &mut turn, cancel)
                .await;
            if interrupted {
                conversation.push(Message::assistant("", MessageStatus::Cancelled));
                return self.finish(view, turn, TurnOutcome::Cancelled);
            }
            view.refresh(&turn.display);

            self.enter(view, TurnPhase::Sending, "tool results");
            let messages = conversation.to_api_messages(system_prompt);
            rx = match self.submit(self.request(messages, true), cancel).await {
                Ok(Some(rx)) => rx,
                Ok(None) => {
                    conversation.push(Message::assistant("", MessageStatus::Cancelled));
                    return self.finish(view, turn, TurnOutcome::Cancelled);
                }
                Err(err) => return self.finish(view, turn, TurnOutcome::Failed(err)),
            };
        }
    }

    /// Execute each requested call in order and append the round to the
    /// conversation. Returns true when cancellation stopped the round; calls
    /// that did not run get an error result so every call is answered.
    async fn run_tool_round(
        &self,
        conversation: &mut Conversation,
        lead_in: &str,
        calls: Vec<PendingCall>,
        turn: &mut Turn,
        cancel: &CancellationToken,
    ) -> bool {
        let mut parts: Vec<Part> = calls
            .iter()
            .map(|call| Part::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .collect();
        let mut interrupted = false;

        for call in calls {
            interrupted = interrupted || cancel.is_cancelled();
            let (described, result) = if interrupted {
                (
                    call.name.clone(),
                    ToolResult {
                        tool: call.name.clone(),
                        status: ToolStatus::Error,
                        payload: ToolPayload::Text("Not run: the turn was cancelled.".to_string()),
                        elapsed: Duration::ZERO,
                    },
                )
            } else {
                self.execute_call(&call).await
            };

            turn.display.push_str(&format!(
                "\n[{} {}]\n",
                described,
                if result.is_ok() { "ok" } else { "failed" }
            ));
            parts.push(Part::ToolResult {
                call_id: call.id,
                name: call.name,
                status: result.status,
                content: result.payload.to_plain_text(),
            });
            turn.tools.push(ToolActivity {
                call: described,
                result,
            });
        }

        conversation.push(Message::tool_round(lead_in, parts));
        interrupted || cancel.is_cancelled()
    }

    async fn execute_call(&self, call: &PendingCall) -> (String, ToolResult) {
        match ToolInvocation::from_function_call(&call.name, &call.arguments) {
            Ok(invocation) => {
                let described = invocation.describe();
                let result = match self
                    .executor
                    .execute(&invocation, self.settings.allow_execution)
                    .await
                {
                    Ok(result) => label_body_failure(result),
                    Err(err) => {
                        debug!(tool = %call.name, error = %err, "model tool call rejected");
                        failure_result(&call.name, &err)
                    }
                };
                (described, result)
            }
            Err(err) => (call.name.clone(), failure_result(&call.name, &err)),
        }
    }

    /// Stream a summary of `conversation` without committing anything.
    pub async fn summarize(
        &self,
        conversation: &Conversation,
        system_prompt: &str,
        view: &mut dyn LiveView,
        cancel: &CancellationToken,
    ) -> TurnReport {
        let mut turn = Turn::default();

        self.enter(view, TurnPhase::Sending, &self.settings.model);
        let mut messages = conversation.to_api_messages(system_prompt);
        messages.push(ChatMessage::new(ROLE_USER, SUMMARY_PROMPT));
        let mut rx = match self.submit(self.request(messages, false), cancel).await {
            Ok(Some(rx)) => rx,
            Ok(None) => return self.finish(view, turn, TurnOutcome::Cancelled),
            Err(err) => return self.finish(view, turn, TurnOutcome::Failed(err)),
        };

        self.enter(view, TurnPhase::Streaming, "");
        let mut state = StreamState::default();
        let end = self.consume(&mut rx, &mut state, "", view, cancel).await;
        turn.display = state.text;
        let outcome = match end {
            RoundEnd::Finished => TurnOutcome::Complete,
            RoundEnd::Cancelled => TurnOutcome::Cancelled,
            RoundEnd::Error(message) => TurnOutcome::Failed(AgentError::ModelStream(message)),
        };
        self.finish(view, turn, outcome)
    }
}
