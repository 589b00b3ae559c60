use crate::progress::ProgressEstimator;
use datachat_flow::{FlowStateMachine, LoopDecision};
use datachat_types::{FlowView, RouteKind, StepRole};

/// Translates turn signals into flow transitions. Every method returns
/// whether the flow view changed.
pub struct FlowDriver {
    machine: FlowStateMachine,
    estimator: Box<dyn ProgressEstimator>,
    tools_started: usize,
}

impl FlowDriver {
    pub fn new(estimator: Box<dyn ProgressEstimator>) -> Self {
        Self {
            machine: FlowStateMachine::new(),
            estimator,
            tools_started: 0,
        }
    }

    pub fn machine(&self) -> &FlowStateMachine {
        &self.machine
    }

    pub fn route(&self) -> Option<RouteKind> {
        self.machine.selected_route()
    }

    pub fn view(&self) -> FlowView {
        self.machine.view()
    }

    pub fn reset(&mut self) {
        self.machine.reset();
        self.estimator.reset();
        self.tools_started = 0;
    }

    pub fn turn_started(&mut self, route: RouteKind) -> bool {
        self.reset();
        self.machine.select_route(route);
        let _ = self.machine.activate(StepRole::Intake);
        let _ = self.machine.complete(StepRole::Intake);
        let next = match route {
            RouteKind::Summary => StepRole::Retrieve,
            RouteKind::Tool => StepRole::Intent,
        };
        let _ = self.machine.activate(next);
        true
    }

    pub fn text_progress(&mut self, total_chars: usize) -> bool {
        let Some(route) = self.route() else {
            return false;
        };
        match self.estimator.observe_text(route, total_chars) {
            // Stage 1 is the step after the one opened at turn start.
            Some(stage) => self.machine.advance_to(1 + stage).is_ok(),
            None => false,
        }
    }

    pub fn tool_call(&mut self, name: &str) -> bool {
        if self.route() != Some(RouteKind::Tool) {
            self.tools_started += 1;
            return false;
        }

        let changed = if self.tools_started == 0 {
            let _ = self.machine.complete(StepRole::Intent);
            let _ = self.machine.activate(StepRole::ToolExecution);
            self.machine
                .set_tool_name(StepRole::ToolExecution, name)
                .is_ok()
        } else if self.machine.is_active(StepRole::LoopDecision) {
            let had_child = self.machine.has_loop_child();
            let reentered = self
                .machine
                .complete_loop(LoopDecision::Reenter, Some(name))
                .is_ok();
            if had_child {
                self.machine.begin_loop_iteration(name).is_ok() || reentered
            } else {
                reentered
            }
        } else {
            // Another call while the previous one is still running.
            self.machine.note_tool(name).is_ok()
        };

        self.tools_started += 1;
        changed
    }

    pub fn tool_finished(&mut self, success: bool) -> bool {
        if self.route() != Some(RouteKind::Tool) {
            return false;
        }
        let finished = self.machine.finish_tool(success).is_ok();
        let opened = self.machine.activate(StepRole::LoopDecision).is_ok();
        finished || opened
    }

    pub fn done(&mut self) -> bool {
        if self.route().is_none() {
            return false;
        }
        if self.machine.is_active(StepRole::LoopDecision) {
            let _ = self.machine.complete_loop(LoopDecision::Exit, None);
        }
        self.machine.force_complete_active();
        true
    }

    pub fn errored(&mut self) -> bool {
        if self.route().is_none() {
            return false;
        }
        self.machine.force_complete_active();
        true
    }

    pub fn timed_out(&mut self) -> bool {
        if self.route().is_none() {
            return false;
        }
        self.machine.force_complete_all();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ContentLengthEstimator;
    use datachat_types::StepStatus;

    fn driver() -> FlowDriver {
        FlowDriver::new(Box::new(ContentLengthEstimator::new(vec![20, 120], vec![])))
    }

    fn statuses(driver: &FlowDriver, route: RouteKind) -> Vec<StepStatus> {
        driver
            .machine()
            .steps(route)
            .iter()
            .map(|s| s.status)
            .collect()
    }

    #[test]
    fn summary_route_advances_by_text_volume() {
        let mut d = driver();
        d.turn_started(RouteKind::Summary);
        assert_eq!(
            statuses(&d, RouteKind::Summary),
            vec![
                StepStatus::Completed,
                StepStatus::Active,
                StepStatus::Pending,
                StepStatus::Pending
            ]
        );

        assert!(!d.text_progress(10));
        assert!(d.text_progress(30));
        assert!(d.text_progress(200));
        assert_eq!(
            statuses(&d, RouteKind::Summary),
            vec![
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Completed,
                StepStatus::Active
            ]
        );

        d.done();
        assert!(statuses(&d, RouteKind::Summary)
            .iter()
            .all(|s| *s == StepStatus::Completed));
    }

    #[test]
    fn single_tool_call_closes_loop_with_exit() {
        let mut d = driver();
        d.turn_started(RouteKind::Tool);
        d.tool_call("plot_scatter");
        let tool_step = &d.machine().steps(RouteKind::Tool)[2];
        assert_eq!(tool_step.status, StepStatus::Active);
        assert_eq!(tool_step.tool_name.as_deref(), Some("plot_scatter"));

        d.tool_finished(true);
        assert!(d.machine().is_active(StepRole::LoopDecision));

        d.done();
        let steps = d.machine().steps(RouteKind::Tool);
        assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
        assert!(steps[3].next_loop.is_empty());
    }

    #[test]
    fn repeated_tool_calls_unroll_the_loop_once() {
        let mut d = driver();
        d.turn_started(RouteKind::Tool);
        for name in ["describe", "plot_bar", "plot_line"] {
            d.tool_call(name);
            d.tool_finished(true);
        }
        d.done();

        let loop_step = &d.machine().steps(RouteKind::Tool)[3];
        assert_eq!(loop_step.next_loop.len(), 1);
        assert_eq!(loop_step.next_loop[0].tool_name.as_deref(), Some("plot_line"));
        assert_eq!(loop_step.tool_history, vec!["plot_bar".to_string()]);
        assert_eq!(loop_step.status, StepStatus::Completed);
        assert_eq!(loop_step.next_loop[0].status, StepStatus::Completed);
    }

    #[test]
    fn failed_tool_marks_step_error() {
        let mut d = driver();
        d.turn_started(RouteKind::Tool);
        d.tool_call("plot");
        d.tool_finished(false);
        d.errored();

        let steps = d.machine().steps(RouteKind::Tool);
        assert_eq!(steps[2].status, StepStatus::Error);
        assert_eq!(steps[3].status, StepStatus::Completed);
    }

    #[test]
    fn tool_signals_do_not_touch_summary_route() {
        let mut d = driver();
        d.turn_started(RouteKind::Summary);
        assert!(!d.tool_call("plot"));
        assert!(!d.tool_finished(true));
        assert!(d
            .machine()
            .steps(RouteKind::Tool)
            .iter()
            .all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn timeout_completes_remaining_steps() {
        let mut d = driver();
        d.turn_started(RouteKind::Tool);
        d.timed_out();
        assert!(d
            .machine()
            .steps(RouteKind::Tool)
            .iter()
            .all(|s| s.status == StepStatus::Completed));
    }
}
