//! Per-frame cached sub-graph and its readers.
//!
//! A [`CacheAnimationNode`] updates its input at most once per frame number and memoizes the
//! evaluated result until the next update, however many [`UseCachedAnimationNode`]s reach it.

use super::{AnimGraph, AnimLink, AnimNodeBehavior, NodeEnv, UpdateContext};
use crate::ids::NodeId;
use crate::playback::PlaybackData;

#[derive(Clone, Debug, Default)]
pub struct CacheAnimationNode {
    pub name: String,
    pub input: AnimLink,
    ever_initialized: bool,
    last_update_frame: Option<u64>,
    stale: bool,
    cached: PlaybackData,
}

impl CacheAnimationNode {
    pub fn new(name: impl Into<String>, input: AnimLink) -> Self {
        Self {
            name: name.into(),
            input,
            ..Default::default()
        }
    }

    pub fn last_update_frame(&self) -> Option<u64> {
        self.last_update_frame
    }
}

impl AnimNodeBehavior for CacheAnimationNode {
    fn on_initialize(&mut self, graph: &mut AnimGraph, env: &mut NodeEnv<'_>) {
        if self.ever_initialized {
            return;
        }
        self.ever_initialized = true;
        self.last_update_frame = None;
        self.input.initialize(graph, env);
    }

    fn on_update(&mut self, graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        if self.last_update_frame == Some(ctx.frame) {
            return;
        }
        self.last_update_frame = Some(ctx.frame);
        self.input.update(graph, ctx, env);
        self.stale = true;
    }

    fn on_evaluate(&mut self, graph: &mut AnimGraph, out: &mut PlaybackData) {
        if self.stale {
            self.cached.clear();
            self.input.evaluate(graph, &mut self.cached);
            self.stale = false;
        }
        out.clone_from(&self.cached);
    }
}

/// Reader forwarding every call to a cache node resolved at compile time.
#[derive(Clone, Debug)]
pub struct UseCachedAnimationNode {
    pub cache: NodeId,
}

impl UseCachedAnimationNode {
    pub fn new(cache: NodeId) -> Self {
        Self { cache }
    }
}

impl AnimNodeBehavior for UseCachedAnimationNode {
    fn on_initialize(&mut self, graph: &mut AnimGraph, env: &mut NodeEnv<'_>) {
        graph.initialize(self.cache, env);
    }

    fn on_update(&mut self, graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        graph.update(self.cache, ctx, env);
    }

    fn on_evaluate(&mut self, graph: &mut AnimGraph, out: &mut PlaybackData) {
        graph.evaluate(self.cache, out);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::nodes::test_support::EnvParts;
    use crate::nodes::AnimNode;

    #[derive(Clone, Debug, Default)]
    struct Counting {
        initializes: Arc<AtomicUsize>,
        updates: Arc<AtomicUsize>,
        evaluates: Arc<AtomicUsize>,
    }

    impl AnimNodeBehavior for Counting {
        fn on_initialize(&mut self, _graph: &mut AnimGraph, _env: &mut NodeEnv<'_>) {
            self.initializes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_update(
            &mut self,
            _graph: &mut AnimGraph,
            _ctx: &UpdateContext,
            _env: &mut NodeEnv<'_>,
        ) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn on_evaluate(&mut self, _graph: &mut AnimGraph, out: &mut PlaybackData) {
            self.evaluates.fetch_add(1, Ordering::SeqCst);
            out.directional_angle = 42.0;
        }
    }

    struct Shared {
        graph: AnimGraph,
        readers: [NodeId; 2],
        counts: Counting,
    }

    fn shared() -> Shared {
        let counts = Counting::default();
        let mut graph = AnimGraph::default();
        let child = graph.push(AnimNode::Custom(Box::new(counts.clone())));
        let cache = graph.push(AnimNode::CacheAnimation(CacheAnimationNode::new(
            "Shared",
            AnimLink::to(child),
        )));
        let a = graph.push(AnimNode::UseCachedAnimation(UseCachedAnimationNode::new(cache)));
        let b = graph.push(AnimNode::UseCachedAnimation(UseCachedAnimationNode::new(cache)));
        Shared {
            graph,
            readers: [a, b],
            counts,
        }
    }

    #[test]
    fn shared_cache_evaluates_child_once_per_frame() {
        let Shared {
            mut graph,
            readers,
            counts,
        } = shared();
        let mut parts = EnvParts::new();

        for reader in readers {
            graph.initialize(reader, &mut parts.env());
        }
        assert_eq!(counts.initializes.load(Ordering::SeqCst), 1);

        for frame in 1..=3u64 {
            let ctx = UpdateContext::new(0.016, frame);
            for reader in readers {
                graph.update(reader, &ctx, &mut parts.env());
            }
            for reader in readers {
                let mut out = PlaybackData::new();
                graph.evaluate(reader, &mut out);
                assert_eq!(out.directional_angle, 42.0);
            }
            assert_eq!(counts.updates.load(Ordering::SeqCst), frame as usize);
            assert_eq!(counts.evaluates.load(Ordering::SeqCst), frame as usize);
        }
    }

    #[test]
    fn first_update_after_initialize_always_runs() {
        let Shared {
            mut graph,
            readers,
            counts,
        } = shared();
        let mut parts = EnvParts::new();
        graph.initialize(readers[0], &mut parts.env());
        graph.update(readers[0], &UpdateContext::new(0.016, 0), &mut parts.env());
        assert_eq!(counts.updates.load(Ordering::SeqCst), 1);
    }
}
