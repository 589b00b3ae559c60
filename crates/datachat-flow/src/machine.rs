use crate::policy::{LoopDecision, LoopPolicy, ToolLoopPolicy};
use crate::route::route_template;
use crate::step::{apply, StepAction, TransitionError};
use datachat_types::{FlowStep, FlowView, RouteKind, StepRole, StepStatus};

/// Step lists of both routes plus the route that is live for this turn.
/// Only the selected route is ever mutated; the other stays pending.
pub struct FlowStateMachine {
    summary: Vec<FlowStep>,
    tool: Vec<FlowStep>,
    selected: Option<RouteKind>,
    loop_policy: Box<dyn LoopPolicy>,
}

impl Default for FlowStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FlowStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowStateMachine")
            .field("selected", &self.selected)
            .field("summary", &self.summary)
            .field("tool", &self.tool)
            .finish()
    }
}

impl FlowStateMachine {
    pub fn new() -> Self {
        Self::with_loop_policy(Box::new(ToolLoopPolicy))
    }

    pub fn with_loop_policy(loop_policy: Box<dyn LoopPolicy>) -> Self {
        Self {
            summary: route_template(RouteKind::Summary),
            tool: route_template(RouteKind::Tool),
            selected: None,
            loop_policy,
        }
    }

    /// Returns every step of both routes to `pending` and deselects the route.
    pub fn reset(&mut self) {
        for step in self.summary.iter_mut().chain(self.tool.iter_mut()) {
            let _ = apply(step, StepAction::Reset);
        }
        self.selected = None;
    }

    /// Switching routes is destructive: both routes are reset first.
    pub fn select_route(&mut self, kind: RouteKind) {
        self.reset();
        self.selected = Some(kind);
        tracing::debug!(route = %kind, "flow route selected");
    }

    pub fn selected_route(&self) -> Option<RouteKind> {
        self.selected
    }

    pub fn steps(&self, kind: RouteKind) -> &[FlowStep] {
        match kind {
            RouteKind::Summary => &self.summary,
            RouteKind::Tool => &self.tool,
        }
    }

    pub fn step(&self, role: StepRole) -> Option<&FlowStep> {
        let kind = self.selected?;
        self.steps(kind).iter().find(|s| s.role == role)
    }

    pub fn is_active(&self, role: StepRole) -> bool {
        self.step(role)
            .is_some_and(|s| s.status == StepStatus::Active)
    }

    pub fn activate(&mut self, role: StepRole) -> Result<StepStatus, TransitionError> {
        self.apply_to(role, StepAction::Activate)
    }

    pub fn complete(&mut self, role: StepRole) -> Result<StepStatus, TransitionError> {
        self.apply_to(role, StepAction::Complete)
    }

    pub fn fail(&mut self, role: StepRole) -> Result<StepStatus, TransitionError> {
        self.apply_to(role, StepAction::Fail)
    }

    /// Completes the loop decision step and lets the loop policy react to
    /// `decision`. `tool_name` labels a synthesized loop child. On an
    /// already completed loop step only the policy runs.
    pub fn complete_loop(
        &mut self,
        decision: LoopDecision,
        tool_name: Option<&str>,
    ) -> Result<(), TransitionError> {
        let idx = self.index_of(StepRole::LoopDecision)?;
        if self.selected_steps_mut()?[idx].status != StepStatus::Completed {
            self.apply_to(StepRole::LoopDecision, StepAction::Complete)?;
        }
        let (steps, policy) = self.steps_and_policy()?;
        policy.on_loop_completed(steps, decision, tool_name);
        Ok(())
    }

    /// Starts another pass through the tool loop for `tool_name`.
    pub fn begin_loop_iteration(&mut self, tool_name: &str) -> Result<(), TransitionError> {
        self.index_of(StepRole::LoopDecision)?;
        let (steps, policy) = self.steps_and_policy()?;
        policy.begin_iteration(steps, tool_name);
        Ok(())
    }

    pub fn has_loop_child(&self) -> bool {
        self.step(StepRole::LoopDecision)
            .is_some_and(|s| !s.next_loop.is_empty())
    }

    pub fn set_tool_name(&mut self, role: StepRole, name: &str) -> Result<(), TransitionError> {
        let idx = self.index_of(role)?;
        let steps = self.selected_steps_mut()?;
        steps[idx].tool_name = Some(name.to_string());
        Ok(())
    }

    /// Labels whichever tool node is currently running with `name`.
    pub fn note_tool(&mut self, name: &str) -> Result<(), TransitionError> {
        let node = self.current_tool_node()?;
        node.tool_name = Some(name.to_string());
        Ok(())
    }

    /// Closes the running tool node (loop child if there is one) as
    /// completed or failed.
    pub fn finish_tool(&mut self, success: bool) -> Result<StepStatus, TransitionError> {
        let action = if success {
            StepAction::Complete
        } else {
            StepAction::Fail
        };
        let node = self.current_tool_node()?;
        apply(node, action)
    }

    /// Moves the selected route forward so that step `index` is active and
    /// every active step before it is completed. Never moves backward.
    pub fn advance_to(&mut self, index: usize) -> Result<(), TransitionError> {
        if self.furthest_started().is_some_and(|furthest| furthest >= index) {
            return Ok(());
        }
        let steps = self.selected_steps_mut()?;
        if index >= steps.len() {
            return Ok(());
        }
        for step in steps[..index].iter_mut() {
            if step.status == StepStatus::Active {
                let _ = apply(step, StepAction::Complete);
            }
        }
        apply(&mut steps[index], StepAction::Activate).map(|_| ())
    }

    /// Index of the furthest started step of the selected route.
    pub fn furthest_started(&self) -> Option<usize> {
        let kind = self.selected?;
        self.steps(kind).iter().rposition(FlowStep::is_started)
    }

    /// Every `active` step, loop children included, becomes `completed`.
    pub fn force_complete_active(&mut self) {
        self.for_each_selected(|step| {
            if step.status == StepStatus::Active {
                let _ = apply(step, StepAction::Complete);
            }
        });
    }

    /// Every step that is not already `completed` or `error` becomes
    /// `completed`.
    pub fn force_complete_all(&mut self) {
        self.for_each_selected(|step| {
            if matches!(step.status, StepStatus::Pending | StepStatus::Active) {
                step.status = StepStatus::Completed;
            }
        });
    }

    pub fn view(&self) -> FlowView {
        FlowView {
            selected: self.selected,
            summary: self.summary.clone(),
            tool: self.tool.clone(),
        }
    }

    fn for_each_selected<F: FnMut(&mut FlowStep)>(&mut self, mut f: F) {
        let Ok(steps) = self.selected_steps_mut() else {
            return;
        };
        for step in steps.iter_mut() {
            f(step);
            for child in step.next_loop.iter_mut() {
                f(child);
            }
        }
    }

    fn selected_steps_mut(&mut self) -> Result<&mut Vec<FlowStep>, TransitionError> {
        match self.selected {
            Some(RouteKind::Summary) => Ok(&mut self.summary),
            Some(RouteKind::Tool) => Ok(&mut self.tool),
            None => Err(TransitionError::NoRoute),
        }
    }

    fn steps_and_policy(
        &mut self,
    ) -> Result<(&mut Vec<FlowStep>, &dyn LoopPolicy), TransitionError> {
        let steps = match self.selected {
            Some(RouteKind::Summary) => &mut self.summary,
            Some(RouteKind::Tool) => &mut self.tool,
            None => return Err(TransitionError::NoRoute),
        };
        Ok((steps, self.loop_policy.as_ref()))
    }

    fn index_of(&self, role: StepRole) -> Result<usize, TransitionError> {
        let route = self.selected.ok_or(TransitionError::NoRoute)?;
        self.steps(route)
            .iter()
            .position(|s| s.role == role)
            .ok_or(TransitionError::MissingStep { route, role })
    }

    fn apply_to(&mut self, role: StepRole, action: StepAction) -> Result<StepStatus, TransitionError> {
        let idx = self.index_of(role)?;
        let steps = self.selected_steps_mut()?;
        let result = apply(&mut steps[idx], action);
        if let Err(err) = &result {
            tracing::debug!(?role, %err, "flow transition ignored");
        }
        result
    }

    fn current_tool_node(&mut self) -> Result<&mut FlowStep, TransitionError> {
        let tool_idx = self.index_of(StepRole::ToolExecution)?;
        let loop_idx = self.index_of(StepRole::LoopDecision).ok();
        let steps = self.selected_steps_mut()?;
        let child_holder = loop_idx.filter(|idx| !steps[*idx].next_loop.is_empty());
        match child_holder {
            Some(idx) => steps[idx]
                .next_loop
                .last_mut()
                .ok_or(TransitionError::MissingStep {
                    route: RouteKind::Tool,
                    role: StepRole::ToolExecution,
                }),
            None => Ok(&mut steps[tool_idx]),
        }
    }
}
