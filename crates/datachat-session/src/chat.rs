use crate::assembler::{MessageAssembler, ToolUpdate};
use crate::driver::FlowDriver;
use crate::progress::{ContentLengthEstimator, ProgressEstimator};
use crate::suggestions::extract_suggestions;
use crate::timer::TurnTimer;
use datachat_config::TurnSettings;
use datachat_core::id::{self, Prefix};
use datachat_core::{Bus, SharedBus};
use datachat_flow::classify_route;
use datachat_stream::{
    ByteStream, ChatTransport, DispatchOutcome, EventDispatcher, LineReader, StreamError,
    StreamHandler,
};
use datachat_types::{
    AssistantMessage, ChatMessage, ChatRequest, FlowView, RouteKind, ToolCallRecord,
    ToolCallStatus, TurnPhase, UserMessage,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::broadcast;

/// Reasons a submission is refused. A refused submission changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyInput,

    #[error("No data source selected")]
    NoDataContext,

    #[error("A turn is already in progress")]
    Busy,
}

/// Everything a renderer needs to follow a conversation incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    TurnStarted {
        turn_id: String,
        message_id: String,
        route: RouteKind,
    },
    TextAppended {
        message_id: String,
        delta: String,
    },
    ToolCallUpdated {
        message_id: String,
        call_id: String,
        record: ToolCallRecord,
    },
    SuggestionsUpdated {
        message_id: String,
        suggestions: Vec<String>,
    },
    FlowUpdated {
        flow: FlowView,
    },
    PhaseChanged {
        phase: TurnPhase,
    },
    Warning {
        message: String,
    },
    TurnFinished {
        turn_id: String,
        message_id: String,
        phase: TurnPhase,
    },
}

/// Cloned view state, safe to render or serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSnapshot {
    pub session_id: String,
    pub model_id: Option<String>,
    pub data_context: Option<String>,
    pub phase: TurnPhase,
    pub messages: Vec<ChatMessage>,
    pub flow: FlowView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn_id: String,
    pub message_id: String,
    pub route: RouteKind,
    pub phase: TurnPhase,
}

struct TurnState {
    id: String,
    message_id: String,
    route: RouteKind,
    timer: TurnTimer,
    text_chars: usize,
    timed_out: bool,
}

struct ChatState {
    session_id: String,
    model_id: Option<String>,
    data_context: Option<String>,
    phase: TurnPhase,
    messages: Vec<ChatMessage>,
    driver: FlowDriver,
    turn: Option<TurnState>,
}

impl ChatState {
    fn assistant_mut(&mut self, message_id: &str) -> Option<&mut AssistantMessage> {
        self.messages
            .iter_mut()
            .rev()
            .filter_map(ChatMessage::as_assistant_mut)
            .find(|m| m.id == message_id)
    }

    /// Flow and phase belong to a turn only until it finishes or times out.
    fn owns_flow(&self, turn_id: &str) -> bool {
        self.phase.is_in_flight()
            && self
                .turn
                .as_ref()
                .is_some_and(|t| t.id == turn_id && !t.timed_out)
    }

    fn set_phase(&mut self, phase: TurnPhase, events: &mut Vec<ViewEvent>) {
        if self.phase != phase {
            tracing::debug!(from = self.phase.as_str(), to = phase.as_str(), "turn phase");
            self.phase = phase;
            events.push(ViewEvent::PhaseChanged { phase });
        }
    }

    fn flow_event(&self) -> ViewEvent {
        ViewEvent::FlowUpdated {
            flow: self.driver.view(),
        }
    }
}

enum TurnEnd {
    Done,
    Failed(String),
}

struct Inner<T> {
    transport: T,
    settings: TurnSettings,
    state: Mutex<ChatState>,
    bus: SharedBus<ViewEvent>,
}

/// One conversation. Cloning yields another handle to the same state, so a
/// renderer task can observe a turn that another task is driving.
pub struct ChatSession<T: ChatTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: ChatTransport> Clone for ChatSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T, settings: TurnSettings) -> Self {
        let estimator = ContentLengthEstimator::new(
            settings.summary_progress_chars.clone(),
            settings.tool_progress_chars.clone(),
        );
        Self::with_estimator(transport, settings, Box::new(estimator))
    }

    pub fn with_estimator(
        transport: T,
        settings: TurnSettings,
        estimator: Box<dyn ProgressEstimator>,
    ) -> Self {
        let state = ChatState {
            session_id: id::create(Prefix::Session, None),
            model_id: None,
            data_context: None,
            phase: TurnPhase::Idle,
            messages: Vec::new(),
            driver: FlowDriver::new(estimator),
            turn: None,
        };
        Self {
            inner: Arc::new(Inner {
                transport,
                settings,
                state: Mutex::new(state),
                bus: Arc::new(Bus::default()),
            }),
        }
    }

    pub fn with_session_id(self, session_id: impl Into<String>) -> Self {
        self.inner.state.lock().session_id = session_id.into();
        self
    }

    pub fn session_id(&self) -> String {
        self.inner.state.lock().session_id.clone()
    }

    pub fn phase(&self) -> TurnPhase {
        self.inner.state.lock().phase
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.inner.settings
    }

    pub fn select_data_context(&self, context: Option<String>) {
        self.inner.state.lock().data_context = context.filter(|c| !c.trim().is_empty());
    }

    pub fn set_model(&self, model_id: Option<String>) {
        self.inner.state.lock().model_id = model_id;
    }

    /// Manual route reset: both routes back to pending, no route selected.
    pub fn reset_flow(&self) {
        self.with_state(|state, events| {
            state.driver.reset();
            events.push(state.flow_event());
        });
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.inner.state.lock();
        ChatSnapshot {
            session_id: state.session_id.clone(),
            model_id: state.model_id.clone(),
            data_context: state.data_context.clone(),
            phase: state.phase,
            messages: state.messages.clone(),
            flow: state.driver.view(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.inner.bus.subscribe_channel()
    }

    pub fn bus(&self) -> SharedBus<ViewEvent> {
        self.inner.bus.clone()
    }

    /// Runs one turn to the end of its stream.
    ///
    /// Transport and protocol failures do not surface here: they end the turn
    /// as `errored` and become part of the visible message.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, ChatError> {
        let (turn_id, message_id, route, request) = self.begin_turn(text)?;
        tracing::info!(turn_id = %turn_id, route = %route, "turn started");

        match self.inner.transport.open(&request).await {
            Ok(stream) => {
                self.with_state(|state, events| {
                    if state.owns_flow(&turn_id) {
                        state.set_phase(TurnPhase::Streaming, events);
                    }
                });
                let reader =
                    LineReader::new(stream).with_max_line_bytes(self.inner.settings.max_line_bytes);
                self.consume(reader, &turn_id, &message_id).await;
            }
            Err(err) => {
                tracing::warn!(turn_id = %turn_id, %err, "failed to open chat stream");
                self.end_turn(&turn_id, &message_id, TurnEnd::Failed(err.to_string()));
            }
        }

        let phase = {
            let state = self.inner.state.lock();
            match &state.turn {
                Some(turn) if turn.id == turn_id => state.phase,
                _ => TurnPhase::TimedOut,
            }
        };
        tracing::info!(turn_id = %turn_id, phase = phase.as_str(), "turn finished");
        Ok(TurnOutcome {
            turn_id,
            message_id,
            route,
            phase,
        })
    }

    async fn consume(&self, mut reader: LineReader<ByteStream>, turn_id: &str, message_id: &str) {
        let mut dispatcher = EventDispatcher::new();
        let mut handler = TurnHandler {
            session: self,
            turn_id,
            message_id,
        };

        while let Some(line) = reader.next_line().await {
            match line {
                Ok(line) => {
                    if dispatcher.dispatch(&line, &mut handler) == DispatchOutcome::Finished {
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!(turn_id, %err, "chat stream failed");
                    self.end_turn(turn_id, message_id, TurnEnd::Failed(err.to_string()));
                    return;
                }
            }
        }

        tracing::warn!(turn_id, "chat stream closed without a terminal event");
        self.end_turn(
            turn_id,
            message_id,
            TurnEnd::Failed(StreamError::ClosedEarly.to_string()),
        );
    }

    fn begin_turn(
        &self,
        text: &str,
    ) -> Result<(String, String, RouteKind, ChatRequest), ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        self.with_state(|state, events| {
            if state.data_context.is_none() {
                return Err(ChatError::NoDataContext);
            }
            if state.phase.is_in_flight() {
                return Err(ChatError::Busy);
            }

            if let Some(mut previous) = state.turn.take() {
                previous.timer.dispose();
            }
            state.driver.reset();
            state.set_phase(TurnPhase::AwaitingRouteSelection, events);

            for message in state
                .messages
                .iter_mut()
                .filter_map(ChatMessage::as_assistant_mut)
            {
                if !message.suggestions.is_empty() {
                    message.suggestions.clear();
                    events.push(ViewEvent::SuggestionsUpdated {
                        message_id: message.id.clone(),
                        suggestions: Vec::new(),
                    });
                }
            }

            let route = classify_route(text, self.inner.settings.long_input_chars);
            let user = UserMessage::new(text);
            let assistant = AssistantMessage::placeholder();
            let message_id = assistant.id.clone();
            state.messages.push(ChatMessage::User(user));
            state.messages.push(ChatMessage::Assistant(assistant));

            let turn_id = id::create(Prefix::Turn, None);
            let timer = self.arm_timer(&turn_id);
            state.driver.turn_started(route);
            state.turn = Some(TurnState {
                id: turn_id.clone(),
                message_id: message_id.clone(),
                route,
                timer,
                text_chars: 0,
                timed_out: false,
            });

            events.push(ViewEvent::TurnStarted {
                turn_id: turn_id.clone(),
                message_id: message_id.clone(),
                route,
            });
            events.push(state.flow_event());

            let request = ChatRequest {
                message: text.to_string(),
                session_id: state.session_id.clone(),
                model_id: state.model_id.clone(),
            };
            Ok((turn_id, message_id, route, request))
        })
    }

    fn arm_timer(&self, turn_id: &str) -> TurnTimer {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        let turn_id = turn_id.to_string();
        TurnTimer::arm(self.inner.settings.timeout, move || {
            if let Some(inner) = weak.upgrade() {
                ChatSession { inner }.on_timeout(&turn_id);
            }
        })
    }

    fn on_timeout(&self, turn_id: &str) {
        let timeout = self.inner.settings.timeout;
        self.with_state(|state, events| {
            if !state.owns_flow(turn_id) {
                return;
            }
            let Some(turn) = state.turn.as_mut() else {
                return;
            };
            tracing::warn!(
                turn_id,
                route = %turn.route,
                timeout_secs = timeout.as_secs(),
                "turn timed out"
            );
            turn.timed_out = true;
            turn.timer.dispose();
            let message_id = turn.message_id.clone();

            if let Some(message) = state.assistant_mut(&message_id) {
                MessageAssembler::new(message).finish();
            }
            state.driver.timed_out();
            events.push(state.flow_event());
            state.set_phase(TurnPhase::TimedOut, events);
            events.push(ViewEvent::Warning {
                message: format!("Response timed out after {}s", timeout.as_secs()),
            });
            events.push(ViewEvent::TurnFinished {
                turn_id: turn_id.to_string(),
                message_id,
                phase: TurnPhase::TimedOut,
            });
        });
    }

    fn end_turn(&self, turn_id: &str, message_id: &str, end: TurnEnd) {
        self.with_state(|state, events| {
            if let Some(message) = state.assistant_mut(message_id) {
                let mut assembler = MessageAssembler::new(message);
                if let TurnEnd::Failed(error) = &end {
                    let delta = assembler.append_error(error);
                    events.push(ViewEvent::TextAppended {
                        message_id: message_id.to_string(),
                        delta,
                    });
                }
                assembler.finish();
            }
            if let TurnEnd::Failed(error) = &end {
                events.push(ViewEvent::Warning {
                    message: error.clone(),
                });
            }

            if !state.owns_flow(turn_id) {
                return;
            }
            if let Some(turn) = state.turn.as_mut() {
                turn.timer.dispose();
            }
            state.set_phase(TurnPhase::Finalizing, events);
            let final_phase = match end {
                TurnEnd::Done => {
                    state.driver.done();
                    TurnPhase::Completed
                }
                TurnEnd::Failed(_) => {
                    state.driver.errored();
                    TurnPhase::Errored
                }
            };
            events.push(state.flow_event());
            state.set_phase(final_phase, events);
            events.push(ViewEvent::TurnFinished {
                turn_id: turn_id.to_string(),
                message_id: message_id.to_string(),
                phase: final_phase,
            });
        });
    }

    /// Applies `f` under the state lock, then publishes what it produced.
    fn with_state<R>(&self, f: impl FnOnce(&mut ChatState, &mut Vec<ViewEvent>) -> R) -> R {
        let mut events = Vec::new();
        let result = {
            let mut state = self.inner.state.lock();
            f(&mut state, &mut events)
        };
        for event in events {
            self.inner.bus.publish(event);
        }
        result
    }
}

/// Routes one turn's events into the message and, while the turn still owns
/// it, the flow panel.
struct TurnHandler<'a, T: ChatTransport> {
    session: &'a ChatSession<T>,
    turn_id: &'a str,
    message_id: &'a str,
}

impl<T: ChatTransport> StreamHandler for TurnHandler<'_, T> {
    fn on_token(&mut self, content: String) {
        let (turn_id, message_id) = (self.turn_id, self.message_id);
        self.session.with_state(|state, events| {
            {
                let Some(message) = state.assistant_mut(message_id) else {
                    return;
                };
                let mut assembler = MessageAssembler::new(message);
                let suggestions = extract_suggestions(assembler.append_text(&content));
                let changed = assembler.set_suggestions(suggestions);
                events.push(ViewEvent::TextAppended {
                    message_id: message_id.to_string(),
                    delta: content.clone(),
                });
                if changed {
                    events.push(ViewEvent::SuggestionsUpdated {
                        message_id: message_id.to_string(),
                        suggestions: assembler.message().suggestions.clone(),
                    });
                }
            }

            if !state.owns_flow(turn_id) {
                return;
            }
            let total = match state.turn.as_mut() {
                Some(turn) => {
                    turn.text_chars += content.chars().count();
                    turn.text_chars
                }
                None => return,
            };
            if state.driver.text_progress(total) {
                events.push(state.flow_event());
            }
        });
    }

    fn on_tool_call(&mut self, id: String, name: String, args: Value) {
        let (turn_id, message_id) = (self.turn_id, self.message_id);
        self.session.with_state(|state, events| {
            {
                let Some(message) = state.assistant_mut(message_id) else {
                    return;
                };
                let mut assembler = MessageAssembler::new(message);
                assembler.register_tool_call(&id, &name, args);
                if let Some(record) = assembler.message().tool_calls.get(&id) {
                    events.push(ViewEvent::ToolCallUpdated {
                        message_id: message_id.to_string(),
                        call_id: id.clone(),
                        record: record.clone(),
                    });
                }
            }
            tracing::debug!(call_id = %id, tool = %name, "tool call started");

            if state.owns_flow(turn_id) && state.driver.tool_call(&name) {
                events.push(state.flow_event());
            }
        });
    }

    fn on_tool_result(&mut self, id: String, result: Value, artifact: Option<Value>) {
        self.settle_tool(id, |assembler, id| {
            assembler.resolve_tool_call(id, result, artifact)
        });
    }

    fn on_tool_error(&mut self, id: String, error: String) {
        self.settle_tool(id, |assembler, id| assembler.fail_tool_call(id, &error));
    }

    fn on_done(&mut self) {
        self.session
            .end_turn(self.turn_id, self.message_id, TurnEnd::Done);
    }

    fn on_error(&mut self, message: String) {
        tracing::warn!(turn_id = self.turn_id, error = %message, "chat stream reported an error");
        self.session
            .end_turn(self.turn_id, self.message_id, TurnEnd::Failed(message));
    }
}

impl<T: ChatTransport> TurnHandler<'_, T> {
    fn settle_tool<F>(&mut self, id: String, settle: F)
    where
        F: FnOnce(&mut MessageAssembler<'_>, &str) -> ToolUpdate,
    {
        let (turn_id, message_id) = (self.turn_id, self.message_id);
        self.session.with_state(|state, events| {
            let success = {
                let Some(message) = state.assistant_mut(message_id) else {
                    return;
                };
                let mut assembler = MessageAssembler::new(message);
                if settle(&mut assembler, &id) != ToolUpdate::Applied {
                    return;
                }
                let Some(record) = assembler.message().tool_calls.get(&id) else {
                    return;
                };
                events.push(ViewEvent::ToolCallUpdated {
                    message_id: message_id.to_string(),
                    call_id: id.clone(),
                    record: record.clone(),
                });
                record.status == ToolCallStatus::Success
            };

            if state.owns_flow(turn_id) && state.driver.tool_finished(success) {
                events.push(state.flow_event());
            }
        });
    }
}
