use datachat_types::{FlowStep, RouteKind, StepRole, StepStatus};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Activate,
    Complete,
    Fail,
    Reset,
}

impl StepAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StepAction::Activate => "activate",
            StepAction::Complete => "complete",
            StepAction::Fail => "fail",
            StepAction::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} a step that is {from:?}")]
    Invalid { action: &'static str, from: StepStatus },

    #[error("route {route} has no {role:?} step")]
    MissingStep { route: RouteKind, role: StepRole },

    #[error("no route selected")]
    NoRoute,
}

/// Status after applying `action`, or `None` when the transition is not
/// allowed from `from`.
pub fn transition(from: StepStatus, action: StepAction) -> Option<StepStatus> {
    use StepStatus::*;
    match (from, action) {
        (Pending | Completed, StepAction::Activate) => Some(Active),
        (Active, StepAction::Complete) => Some(Completed),
        (Active, StepAction::Fail) => Some(Error),
        (_, StepAction::Reset) => Some(Pending),
        _ => None,
    }
}

/// Applies `action` to `step` in place.
pub fn apply(step: &mut FlowStep, action: StepAction) -> Result<StepStatus, TransitionError> {
    let next = transition(step.status, action).ok_or(TransitionError::Invalid {
        action: action.as_str(),
        from: step.status,
    })?;
    step.status = next;
    if action == StepAction::Reset {
        step.tool_name = None;
        step.tool_history.clear();
        step.next_loop.clear();
    }
    Ok(next)
}
