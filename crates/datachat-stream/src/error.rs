use thiserror::Error;

/// Failures of the transport or the line framing. All of them end the turn.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Stream closed before completion")]
    ClosedEarly,
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_builder() || err.is_request() {
            StreamError::Request(err.to_string())
        } else {
            StreamError::Transport(err.to_string())
        }
    }
}

/// Why a single line could not be turned into an event. Never terminal.
#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event is not a JSON object")]
    NotAnObject,

    #[error("Event has no type")]
    MissingType,

    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("{kind} event is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}
