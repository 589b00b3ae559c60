use crate::cli::OutputFormat;
use datachat_session::ViewEvent;
use datachat_types::{FlowStep, FlowView, RouteKind, StepStatus, ToolCallStatus, TurnPhase};
use datachat_util::text::{one_line, truncate_chars};
use std::io::Write;

const ARGS_PREVIEW_CHARS: usize = 80;

/// Prints view events as they arrive on the bus.
pub(crate) struct Renderer {
    format: OutputFormat,
    suggestions: Vec<String>,
    mid_line: bool,
}

impl Renderer {
    pub(crate) fn new(format: OutputFormat) -> Self {
        Self {
            format,
            suggestions: Vec::new(),
            mid_line: false,
        }
    }

    pub(crate) fn handle(&mut self, event: &ViewEvent) {
        match self.format {
            OutputFormat::Json => match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(error) => tracing::warn!(%error, "failed to serialize view event"),
            },
            OutputFormat::Default => self.render_text(event),
        }
    }

    fn render_text(&mut self, event: &ViewEvent) {
        match event {
            ViewEvent::TurnStarted { route, .. } => {
                self.suggestions.clear();
                println!("\n[{}]", route_label(*route));
            }
            ViewEvent::TextAppended { delta, .. } => {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
                self.mid_line = !delta.ends_with('\n');
            }
            ViewEvent::ToolCallUpdated { record, .. } => {
                self.break_line();
                let args = truncate_chars(&one_line(&record.args.to_string()), ARGS_PREVIEW_CHARS);
                match record.status {
                    ToolCallStatus::Running => println!("  ◐ {} {}", record.name, args),
                    ToolCallStatus::Success => println!("  ● {} done", record.name),
                    ToolCallStatus::Error => println!(
                        "  ✗ {} failed: {}",
                        record.name,
                        record.error.as_deref().unwrap_or("unknown error")
                    ),
                }
            }
            ViewEvent::SuggestionsUpdated { suggestions, .. } => {
                self.suggestions = suggestions.clone();
            }
            ViewEvent::Warning { message } => {
                self.break_line();
                eprintln!("warning: {}", message);
            }
            ViewEvent::TurnFinished { phase, .. } => {
                self.break_line();
                if *phase != TurnPhase::Completed {
                    eprintln!("turn ended: {:?}", phase);
                }
                if !self.suggestions.is_empty() {
                    println!("\nSuggestions:");
                    for (idx, item) in self.suggestions.iter().enumerate() {
                        println!("  {}. {}", idx + 1, item);
                    }
                }
            }
            ViewEvent::FlowUpdated { .. } | ViewEvent::PhaseChanged { .. } => {}
        }
    }

    fn break_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }
}

fn route_label(route: RouteKind) -> &'static str {
    match route {
        RouteKind::Summary => "summary",
        RouteKind::Tool => "tool",
    }
}

fn status_glyph(status: StepStatus) -> char {
    match status {
        StepStatus::Pending => '○',
        StepStatus::Active => '◐',
        StepStatus::Completed => '●',
        StepStatus::Error => '✗',
    }
}

fn push_step(out: &mut Vec<String>, step: &FlowStep, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    let mut line = format!("{}{} {}", indent, status_glyph(step.status), step.title);
    if let Some(tool) = &step.tool_name {
        line.push_str(&format!(" ({})", tool));
    }
    out.push(line);
    if !step.tool_history.is_empty() {
        out.push(format!("{}  history: {}", indent, step.tool_history.join(", ")));
    }
    for child in &step.next_loop {
        push_step(out, child, depth + 1);
    }
}

/// Renders the selected route as an indented step list.
pub(crate) fn format_flow(flow: &FlowView) -> String {
    let Some(route) = flow.selected else {
        return "No active flow".to_string();
    };
    let mut lines = vec![format!("Flow: {}", route_label(route))];
    for step in flow.route(route) {
        push_step(&mut lines, step, 0);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use datachat_types::StepRole;

    #[test]
    fn unselected_flow_has_placeholder() {
        assert_eq!(format_flow(&FlowView::default()), "No active flow");
    }

    #[test]
    fn flow_lists_steps_children_and_history() {
        let mut loop_step = FlowStep::new(StepRole::LoopDecision, "循环判断", "");
        loop_step.status = StepStatus::Completed;
        loop_step.tool_history = vec!["plot_bar".to_string()];
        let mut child = FlowStep::new(StepRole::ToolExecution, "工具执行", "");
        child.status = StepStatus::Active;
        child.tool_name = Some("plot_line".to_string());
        loop_step.next_loop.push(child);

        let mut intake = FlowStep::new(StepRole::Intake, "接收问题", "");
        intake.status = StepStatus::Completed;

        let flow = FlowView {
            selected: Some(RouteKind::Tool),
            summary: Vec::new(),
            tool: vec![intake, loop_step],
        };

        let rendered = format_flow(&flow);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Flow: tool");
        assert_eq!(lines[1], "  ● 接收问题");
        assert_eq!(lines[2], "  ● 循环判断");
        assert_eq!(lines[3], "    history: plot_bar");
        assert_eq!(lines[4], "    ◐ 工具执行 (plot_line)");
    }

    #[test]
    fn suggestions_reset_on_new_turn() {
        let mut renderer = Renderer::new(OutputFormat::Default);
        renderer.handle(&ViewEvent::SuggestionsUpdated {
            message_id: "msg_1".to_string(),
            suggestions: vec!["a".to_string()],
        });
        assert_eq!(renderer.suggestions.len(), 1);
        renderer.handle(&ViewEvent::TurnStarted {
            turn_id: "trn_2".to_string(),
            message_id: "msg_2".to_string(),
            route: RouteKind::Summary,
        });
        assert!(renderer.suggestions.is_empty());
    }
}
