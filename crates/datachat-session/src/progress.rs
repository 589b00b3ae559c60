use datachat_types::RouteKind;

/// Turns streamed-text volume into flow progress.
pub trait ProgressEstimator: Send + Sync {
    fn reset(&mut self);

    /// Called with the cumulative character count after every token. Returns
    /// the stage reached when it moved past a new threshold; stage `n` means
    /// `n` thresholds have been crossed.
    fn observe_text(&mut self, route: RouteKind, total_chars: usize) -> Option<usize>;
}

/// Advances by fixed cumulative character thresholds, one list per route.
#[derive(Debug, Clone)]
pub struct ContentLengthEstimator {
    summary: Vec<usize>,
    tool: Vec<usize>,
    stage: usize,
}

impl ContentLengthEstimator {
    pub fn new(mut summary: Vec<usize>, mut tool: Vec<usize>) -> Self {
        summary.sort_unstable();
        tool.sort_unstable();
        Self {
            summary,
            tool,
            stage: 0,
        }
    }

    fn thresholds(&self, route: RouteKind) -> &[usize] {
        match route {
            RouteKind::Summary => &self.summary,
            RouteKind::Tool => &self.tool,
        }
    }
}

impl ProgressEstimator for ContentLengthEstimator {
    fn reset(&mut self) {
        self.stage = 0;
    }

    fn observe_text(&mut self, route: RouteKind, total_chars: usize) -> Option<usize> {
        let reached = self
            .thresholds(route)
            .iter()
            .take_while(|threshold| total_chars >= **threshold)
            .count();
        if reached > self.stage {
            self.stage = reached;
            Some(reached)
        } else {
            None
        }
    }
}
