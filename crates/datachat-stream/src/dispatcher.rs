use crate::event::{parse_event, StreamEvent};
use serde_json::Value;

/// Receives decoded events in arrival order. Every callback runs
/// synchronously inside [`EventDispatcher::dispatch`].
pub trait StreamHandler {
    fn on_token(&mut self, _content: String) {}
    fn on_tool_call(&mut self, _id: String, _name: String, _args: Value) {}
    fn on_tool_result(&mut self, _id: String, _result: Value, _artifact: Option<Value>) {}
    fn on_tool_error(&mut self, _id: String, _error: String) {}
    fn on_done(&mut self) {}
    fn on_error(&mut self, _message: String) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A non-terminal event reached the handler.
    Delivered,
    /// The line was malformed, unknown, or arrived after a terminal event.
    Skipped,
    /// `done` or `error` reached the handler; later lines are ignored.
    Finished,
}

#[derive(Debug, Default)]
pub struct EventDispatcher {
    finished: bool,
    lines_seen: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// Decodes `line` and hands it to `handler`. Malformed input is logged and
    /// skipped, never fatal.
    pub fn dispatch<H: StreamHandler + ?Sized>(
        &mut self,
        line: &str,
        handler: &mut H,
    ) -> DispatchOutcome {
        self.lines_seen += 1;
        if self.finished {
            tracing::debug!(line = self.lines_seen, "ignoring event after stream end");
            return DispatchOutcome::Skipped;
        }

        match parse_event(line) {
            Ok(event) => self.dispatch_event(event, handler),
            Err(err) => {
                tracing::warn!(line = self.lines_seen, %err, "skipping stream event");
                DispatchOutcome::Skipped
            }
        }
    }

    pub fn dispatch_event<H: StreamHandler + ?Sized>(
        &mut self,
        event: StreamEvent,
        handler: &mut H,
    ) -> DispatchOutcome {
        if self.finished {
            return DispatchOutcome::Skipped;
        }

        match event {
            StreamEvent::Token { content } => handler.on_token(content),
            StreamEvent::ToolCall { id, name, args } => handler.on_tool_call(id, name, args),
            StreamEvent::ToolResult {
                id,
                result,
                artifact,
            } => handler.on_tool_result(id, result, artifact),
            StreamEvent::ToolError { id, error } => handler.on_tool_error(id, error),
            StreamEvent::Done => {
                self.finished = true;
                handler.on_done();
                return DispatchOutcome::Finished;
            }
            StreamEvent::Error { message } => {
                self.finished = true;
                handler.on_error(message);
                return DispatchOutcome::Finished;
            }
        }
        DispatchOutcome::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        done: usize,
    }

    impl StreamHandler for Recorder {
        fn on_token(&mut self, content: String) {
            self.events.push(format!("token:{content}"));
        }
        fn on_tool_call(&mut self, id: String, name: String, _args: Value) {
            self.events.push(format!("call:{id}:{name}"));
        }
        fn on_tool_result(&mut self, id: String, _result: Value, _artifact: Option<Value>) {
            self.events.push(format!("result:{id}"));
        }
        fn on_tool_error(&mut self, id: String, error: String) {
            self.events.push(format!("tool_error:{id}:{error}"));
        }
        fn on_done(&mut self) {
            self.done += 1;
        }
        fn on_error(&mut self, message: String) {
            self.events.push(format!("error:{message}"));
        }
    }

    #[test]
    fn malformed_line_then_done_completes_once() {
        let mut dispatcher = EventDispatcher::new();
        let mut recorder = Recorder::default();

        assert_eq!(
            dispatcher.dispatch("{bad json}", &mut recorder),
            DispatchOutcome::Skipped
        );
        assert_eq!(
            dispatcher.dispatch(r#"{"type":"done"}"#, &mut recorder),
            DispatchOutcome::Finished
        );
        assert_eq!(
            dispatcher.dispatch(r#"{"type":"done"}"#, &mut recorder),
            DispatchOutcome::Skipped
        );

        assert_eq!(recorder.done, 1);
        assert!(recorder.events.is_empty());
        assert!(dispatcher.is_finished());
    }

    #[test]
    fn callbacks_run_in_arrival_order() {
        let mut dispatcher = EventDispatcher::new();
        let mut recorder = Recorder::default();
        for line in [
            r#"{"type":"token","content":"a"}"#,
            r#"{"type":"tool_call","id":"t1","name":"plot","args":{}}"#,
            r#"{"type":"heartbeat"}"#,
            r#"{"type":"tool_result","id":"t1","result":null}"#,
            r#"{"type":"tool_error","id":"t2","error":"bad column"}"#,
            r#"{"type":"chunk","content":"b"}"#,
        ] {
            dispatcher.dispatch(line, &mut recorder);
        }

        assert_eq!(
            recorder.events,
            vec![
                "token:a",
                "call:t1:plot",
                "result:t1",
                "tool_error:t2:bad column",
                "token:b"
            ]
        );
        assert!(!dispatcher.is_finished());
    }

    #[test]
    fn error_event_is_terminal() {
        let mut dispatcher = EventDispatcher::new();
        let mut recorder = Recorder::default();

        dispatcher.dispatch(r#"{"type":"error","message":"model overloaded"}"#, &mut recorder);
        dispatcher.dispatch(r#"{"type":"token","content":"late"}"#, &mut recorder);

        assert_eq!(recorder.events, vec!["error:model overloaded"]);
        assert_eq!(recorder.done, 0);
        assert_eq!(dispatcher.lines_seen(), 2);
    }
}
