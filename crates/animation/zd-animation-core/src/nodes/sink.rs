//! Graph result node.

use super::{AnimGraph, AnimLink, AnimNodeBehavior, NodeEnv, UpdateContext};
use crate::playback::PlaybackData;

/// Result node of a graph (root graph, state graph or transitional graph).
#[derive(Clone, Debug, Default)]
pub struct SinkNode {
    pub result: AnimLink,
}

impl SinkNode {
    pub fn new(result: AnimLink) -> Self {
        Self { result }
    }

    /// Graphs whose result is not connected produce no animation.
    pub fn has_animation_data(&self) -> bool {
        self.result.is_linked()
    }
}

impl AnimNodeBehavior for SinkNode {
    fn on_initialize(&mut self, graph: &mut AnimGraph, env: &mut NodeEnv<'_>) {
        self.result.initialize(graph, env);
    }

    fn on_update(&mut self, graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        self.result.update(graph, ctx, env);
    }

    fn on_evaluate(&mut self, graph: &mut AnimGraph, out: &mut PlaybackData) {
        self.result.evaluate(graph, out);
    }
}
