use crate::route::loop_child;
use crate::step::{apply, StepAction};
use datachat_types::{FlowStep, StepRole, StepStatus};

/// Whether the agent goes around the tool loop again. Decided by the
/// orchestrator from the event stream, never guessed by the flow panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDecision {
    Reenter,
    Exit,
}

/// Route-specific handling of the loop decision step.
pub trait LoopPolicy: Send + Sync {
    /// Runs after the loop decision step has moved to `completed`.
    fn on_loop_completed(
        &self,
        steps: &mut [FlowStep],
        decision: LoopDecision,
        tool_name: Option<&str>,
    );

    /// A new tool call starts while the loop is already unrolled.
    fn begin_iteration(&self, steps: &mut [FlowStep], tool_name: &str);
}

/// Keeps at most one synthesized tool-execution child under the loop step.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolLoopPolicy;

fn position(steps: &[FlowStep], role: StepRole) -> Option<usize> {
    steps.iter().position(|s| s.role == role)
}

fn demote_active(step: &mut FlowStep) {
    if step.status == StepStatus::Active {
        let _ = apply(step, StepAction::Complete);
    }
}

impl LoopPolicy for ToolLoopPolicy {
    fn on_loop_completed(
        &self,
        steps: &mut [FlowStep],
        decision: LoopDecision,
        tool_name: Option<&str>,
    ) {
        if decision == LoopDecision::Exit {
            return;
        }
        let (Some(tool_idx), Some(loop_idx)) = (
            position(steps, StepRole::ToolExecution),
            position(steps, StepRole::LoopDecision),
        ) else {
            tracing::warn!("tool route is missing its loop steps");
            return;
        };

        if steps[loop_idx].next_loop.is_empty() {
            let name = tool_name
                .map(str::to_string)
                .or_else(|| steps[tool_idx].tool_name.clone());
            let mut child = loop_child(name);
            child.status = StepStatus::Active;
            steps[loop_idx].next_loop.push(child);
        }
        demote_active(&mut steps[tool_idx]);
    }

    fn begin_iteration(&self, steps: &mut [FlowStep], tool_name: &str) {
        let Some(loop_idx) = position(steps, StepRole::LoopDecision) else {
            return;
        };
        let parent = &mut steps[loop_idx];
        for mut previous in parent.next_loop.drain(..) {
            demote_active(&mut previous);
            if let Some(name) = previous.tool_name {
                parent.tool_history.push(name);
            }
        }
        let mut child = loop_child(Some(tool_name.to_string()));
        child.status = StepStatus::Active;
        parent.next_loop.push(child);

        if let Some(tool_idx) = position(steps, StepRole::ToolExecution) {
            demote_active(&mut steps[tool_idx]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::route_template;
    use datachat_types::RouteKind;

    fn tool_steps() -> Vec<FlowStep> {
        let mut steps = route_template(RouteKind::Tool);
        steps[2].status = StepStatus::Active;
        steps[2].tool_name = Some("plot_scatter".to_string());
        steps
    }

    #[test]
    fn reenter_without_child_creates_one() {
        let mut steps = tool_steps();
        ToolLoopPolicy.on_loop_completed(&mut steps, LoopDecision::Reenter, Some("plot_bar"));

        assert_eq!(steps[2].status, StepStatus::Completed);
        assert_eq!(steps[3].next_loop.len(), 1);
        let child = &steps[3].next_loop[0];
        assert_eq!(child.status, StepStatus::Active);
        assert_eq!(child.tool_name.as_deref(), Some("plot_bar"));
    }

    #[test]
    fn reenter_falls_back_to_tool_step_name() {
        let mut steps = tool_steps();
        ToolLoopPolicy.on_loop_completed(&mut steps, LoopDecision::Reenter, None);
        assert_eq!(
            steps[3].next_loop[0].tool_name.as_deref(),
            Some("plot_scatter")
        );
    }

    #[test]
    fn reenter_with_child_does_not_duplicate() {
        let mut steps = tool_steps();
        ToolLoopPolicy.on_loop_completed(&mut steps, LoopDecision::Reenter, Some("a"));
        ToolLoopPolicy.on_loop_completed(&mut steps, LoopDecision::Reenter, Some("b"));
        assert_eq!(steps[3].next_loop.len(), 1);
        assert_eq!(steps[3].next_loop[0].tool_name.as_deref(), Some("a"));
    }

    #[test]
    fn exit_leaves_loop_empty() {
        let mut steps = tool_steps();
        ToolLoopPolicy.on_loop_completed(&mut steps, LoopDecision::Exit, Some("a"));
        assert!(steps[3].next_loop.is_empty());
        assert_eq!(steps[2].status, StepStatus::Active);
    }

    #[test]
    fn begin_iteration_consumes_previous_child() {
        let mut steps = tool_steps();
        ToolLoopPolicy.on_loop_completed(&mut steps, LoopDecision::Reenter, Some("a"));
        ToolLoopPolicy.begin_iteration(&mut steps, "b");

        let parent = &steps[3];
        assert_eq!(parent.tool_history, vec!["a".to_string()]);
        assert_eq!(parent.next_loop.len(), 1);
        assert_eq!(parent.next_loop[0].tool_name.as_deref(), Some("b"));
        assert_eq!(parent.next_loop[0].status, StepStatus::Active);
    }
}
