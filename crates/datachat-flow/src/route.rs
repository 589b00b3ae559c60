use datachat_types::{FlowStep, RouteKind, StepRole};

const TOOL_KEYWORDS: &[&str] = &[
    "绘制",
    "画",
    "图",
    "散点图",
    "柱状图",
    "折线图",
    "饼图",
    "可视化",
    "plot",
    "chart",
    "draw",
    "visualize",
    "graph",
];

const SUMMARY_KEYWORDS: &[&str] = &[
    "总结",
    "概括",
    "分析",
    "报告",
    "解释",
    "summary",
    "summarize",
    "analyze",
    "explain",
    "report",
];

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Picks the route for a turn from the user's text alone.
///
/// Only tool keywords on a short input select the tool route. Long input,
/// mixed intent and everything else fall back to the summary route.
pub fn classify_route(text: &str, long_input_chars: usize) -> RouteKind {
    let lowered = text.to_lowercase();
    let wants_tool = contains_any(&lowered, TOOL_KEYWORDS);
    let wants_summary = contains_any(&lowered, SUMMARY_KEYWORDS);
    let is_long = text.chars().count() > long_input_chars;

    match (wants_tool, wants_summary) {
        (true, false) if !is_long => RouteKind::Tool,
        _ => RouteKind::Summary,
    }
}

/// Fresh, all-pending steps for `kind`.
pub fn route_template(kind: RouteKind) -> Vec<FlowStep> {
    match kind {
        RouteKind::Summary => vec![
            FlowStep::new(StepRole::Intake, "接收问题", "解析用户输入"),
            FlowStep::new(StepRole::Retrieve, "检索数据", "读取所选数据源"),
            FlowStep::new(StepRole::Analyze, "分析推理", "模型分析数据"),
            FlowStep::new(StepRole::Summarize, "生成总结", "输出分析结论"),
        ],
        RouteKind::Tool => vec![
            FlowStep::new(StepRole::Intake, "接收问题", "解析用户输入"),
            FlowStep::new(StepRole::Intent, "意图识别", "判断需要调用的工具"),
            FlowStep::new(StepRole::ToolExecution, "工具执行", "调用数据工具"),
            FlowStep::new(StepRole::LoopDecision, "是否循环", "判断是否继续调用工具"),
        ],
    }
}

pub(crate) fn loop_child(tool_name: Option<String>) -> FlowStep {
    let mut step = FlowStep::new(StepRole::ToolExecution, "工具执行", "再次调用数据工具");
    step.tool_name = tool_name;
    step
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: usize = 200;

    #[test]
    fn chart_request_takes_tool_route() {
        assert_eq!(classify_route("请绘制散点图", LONG), RouteKind::Tool);
        assert_eq!(classify_route("Plot revenue by month", LONG), RouteKind::Tool);
    }

    #[test]
    fn mixed_intent_takes_summary_route() {
        assert_eq!(classify_route("画一张图并总结趋势", LONG), RouteKind::Summary);
    }

    #[test]
    fn plain_question_falls_back_to_summary() {
        assert_eq!(classify_route("上个季度销售额是多少", LONG), RouteKind::Summary);
        assert_eq!(classify_route("", LONG), RouteKind::Summary);
    }

    #[test]
    fn long_tool_request_takes_summary_route() {
        let text = format!("请绘制散点图{}", "，并且考虑更多条件".repeat(30));
        assert_eq!(classify_route(&text, LONG), RouteKind::Summary);
        assert_eq!(classify_route(&text, 10_000), RouteKind::Tool);
    }

    #[test]
    fn templates_start_pending_with_expected_roles() {
        let tool = route_template(RouteKind::Tool);
        let roles: Vec<StepRole> = tool.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![
                StepRole::Intake,
                StepRole::Intent,
                StepRole::ToolExecution,
                StepRole::LoopDecision
            ]
        );
        assert!(route_template(RouteKind::Summary)
            .iter()
            .all(|s| !s.is_started()));
    }
}
