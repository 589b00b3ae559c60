use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingRouteSelection,
    Streaming,
    Finalizing,
    Completed,
    Errored,
    TimedOut,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnPhase::Completed | TurnPhase::Errored | TurnPhase::TimedOut
        )
    }

    /// A turn in one of these phases blocks new submissions.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            TurnPhase::AwaitingRouteSelection | TurnPhase::Streaming | TurnPhase::Finalizing
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::AwaitingRouteSelection => "awaiting_route_selection",
            TurnPhase::Streaming => "streaming",
            TurnPhase::Finalizing => "finalizing",
            TurnPhase::Completed => "completed",
            TurnPhase::Errored => "errored",
            TurnPhase::TimedOut => "timed_out",
        }
    }
}

/// Body of the chat request that opens one turn's stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub model_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_turn_no_longer_blocks() {
        assert!(TurnPhase::Streaming.is_in_flight());
        assert!(!TurnPhase::TimedOut.is_in_flight());
        assert!(TurnPhase::TimedOut.is_terminal());
        assert!(!TurnPhase::Idle.is_terminal());
    }

    #[test]
    fn chat_request_wire_shape() {
        let request = ChatRequest {
            message: "请绘制散点图".to_string(),
            session_id: "ses_1".to_string(),
            model_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"], "请绘制散点图");
        assert_eq!(json["session_id"], "ses_1");
        assert!(json["model_id"].is_null());
    }
}
