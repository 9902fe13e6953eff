//! Anim node graph: a flat arena of nodes addressed by [`NodeId`].
//!
//! Every node implements the three-phase contract of [`AnimNodeBehavior`]:
//! - `initialize` when the node becomes relevant (instance start, state entry),
//! - `update` once per tick to advance time and collect notifies,
//! - `evaluate` to produce the [`PlaybackData`] for this tick.
//!
//! While a node runs it is taken out of the arena, so it can freely borrow the graph to
//! drive its children. A node reached again while it is running sees an empty slot and
//! the call is skipped.

use std::fmt;

use rand::rngs::StdRng;

use crate::ids::NodeId;
use crate::logic::AnimLogic;
use crate::machine::StateMachineData;
use crate::playback::PlaybackData;
use crate::player::AnimPlayer;

pub mod cache;
pub mod random;
pub mod sequence_player;
pub mod sink;
pub mod slot;
pub mod state_machine;

pub use cache::{CacheAnimationNode, UseCachedAnimationNode};
pub use random::{RandomEntry, RandomPlayerNode, SelectionMode};
pub use sequence_player::PlaySequenceNode;
pub use sink::SinkNode;
pub use slot::{OverrideSlotNode, SlotOverrides};
pub use state_machine::StateMachineNode;

/// Per-tick update parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UpdateContext {
    pub delta_time: f32,
    /// Effective blend weight of the branch being updated.
    pub weight: f32,
    /// Host frame counter. Cache nodes update at most once per value.
    pub frame: u64,
}

impl UpdateContext {
    pub fn new(delta_time: f32, frame: u64) -> Self {
        Self {
            delta_time,
            weight: 1.0,
            frame,
        }
    }

    pub fn with_weight(&self, weight: f32) -> Self {
        Self { weight, ..*self }
    }

    pub fn fractional_weight(&self, fraction: f32) -> Self {
        self.with_weight(self.weight * fraction)
    }
}

/// Everything a node may touch outside the graph during initialize/update.
pub struct NodeEnv<'a> {
    pub player: &'a mut AnimPlayer,
    pub overrides: &'a SlotOverrides,
    pub logic: &'a mut dyn AnimLogic,
    pub machines: &'a [StateMachineData],
    pub rng: &'a mut StdRng,
    pub allow_transitional_states: bool,
}

impl fmt::Debug for NodeEnv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeEnv")
            .field("machines", &self.machines.len())
            .field("allow_transitional_states", &self.allow_transitional_states)
            .finish_non_exhaustive()
    }
}

pub trait AnimNodeBehavior: fmt::Debug + Send {
    fn on_initialize(&mut self, graph: &mut AnimGraph, env: &mut NodeEnv<'_>);

    fn on_update(&mut self, graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>);

    fn on_evaluate(&mut self, graph: &mut AnimGraph, out: &mut PlaybackData);
}

/// Host-provided node kinds stored in the arena.
pub trait CustomAnimNode: AnimNodeBehavior {
    fn box_clone(&self) -> Box<dyn CustomAnimNode>;

    fn as_behavior_mut(&mut self) -> &mut dyn AnimNodeBehavior;
}

impl<T> CustomAnimNode for T
where
    T: AnimNodeBehavior + Clone + 'static,
{
    fn box_clone(&self) -> Box<dyn CustomAnimNode> {
        Box::new(self.clone())
    }

    fn as_behavior_mut(&mut self) -> &mut dyn AnimNodeBehavior {
        self
    }
}

impl Clone for Box<dyn CustomAnimNode> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

#[derive(Clone, Debug, Default)]
pub enum AnimNode {
    /// Placeholder left in the arena while the node is running.
    #[default]
    Vacant,
    Sink(SinkNode),
    PlaySequence(PlaySequenceNode),
    StateMachine(StateMachineNode),
    CacheAnimation(CacheAnimationNode),
    UseCachedAnimation(UseCachedAnimationNode),
    OverrideSlot(OverrideSlotNode),
    RandomPlayer(RandomPlayerNode),
    Custom(Box<dyn CustomAnimNode>),
}

impl AnimNode {
    fn behavior(&mut self) -> Option<&mut dyn AnimNodeBehavior> {
        let behavior: &mut dyn AnimNodeBehavior = match self {
            AnimNode::Vacant => return None,
            AnimNode::Sink(n) => n,
            AnimNode::PlaySequence(n) => n,
            AnimNode::StateMachine(n) => n,
            AnimNode::CacheAnimation(n) => n,
            AnimNode::UseCachedAnimation(n) => n,
            AnimNode::OverrideSlot(n) => n,
            AnimNode::RandomPlayer(n) => n,
            AnimNode::Custom(n) => n.as_behavior_mut(),
        };
        Some(behavior)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnimNode::Vacant => "vacant",
            AnimNode::Sink(_) => "sink",
            AnimNode::PlaySequence(_) => "play_sequence",
            AnimNode::StateMachine(_) => "state_machine",
            AnimNode::CacheAnimation(_) => "cache_animation",
            AnimNode::UseCachedAnimation(_) => "use_cached_animation",
            AnimNode::OverrideSlot(_) => "override_slot",
            AnimNode::RandomPlayer(_) => "random_player",
            AnimNode::Custom(_) => "custom",
        }
    }

    pub fn as_sink(&self) -> Option<&SinkNode> {
        match self {
            AnimNode::Sink(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_sequence_player(&self) -> Option<&PlaySequenceNode> {
        match self {
            AnimNode::PlaySequence(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_state_machine(&self) -> Option<&StateMachineNode> {
        match self {
            AnimNode::StateMachine(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_random_player(&self) -> Option<&RandomPlayerNode> {
        match self {
            AnimNode::RandomPlayer(n) => Some(n),
            _ => None,
        }
    }
}

/// Arena of anim nodes owned by one instance.
#[derive(Clone, Debug, Default)]
pub struct AnimGraph {
    nodes: Vec<AnimNode>,
}

impl AnimGraph {
    pub fn new(nodes: Vec<AnimNode>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&AnimNode> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut AnimNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn push(&mut self, node: AnimNode) -> NodeId {
        self.nodes.push(node);
        NodeId::from_index(self.nodes.len() - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &AnimNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::from_index(i), n))
    }

    pub fn initialize(&mut self, id: NodeId, env: &mut NodeEnv<'_>) {
        self.with_node(id, |node, graph| node.on_initialize(graph, env));
    }

    pub fn update(&mut self, id: NodeId, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        self.with_node(id, |node, graph| node.on_update(graph, ctx, env));
    }

    pub fn evaluate(&mut self, id: NodeId, out: &mut PlaybackData) {
        self.with_node(id, |node, graph| node.on_evaluate(graph, out));
    }

    /// Run `f` on the node taken out of its slot. `None` if the id is unknown or the node is
    /// already running.
    pub(crate) fn with_node<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn AnimNodeBehavior, &mut AnimGraph) -> R,
    ) -> Option<R> {
        self.with_node_mut(id, |node, graph| node.behavior().map(|b| f(b, graph)))
            .flatten()
    }

    /// Like [`Self::with_node`] but exposes the concrete node.
    pub(crate) fn with_node_mut<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut AnimNode, &mut AnimGraph) -> R,
    ) -> Option<R> {
        let slot = self.nodes.get_mut(id.index())?;
        if matches!(slot, AnimNode::Vacant) {
            log::warn!("anim node {:?} reached while already running", id);
            return None;
        }
        let mut node = std::mem::take(slot);
        let result = f(&mut node, self);
        self.nodes[id.index()] = node;
        Some(result)
    }
}

/// Optional edge to an input node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimLink(pub Option<NodeId>);

impl AnimLink {
    pub fn to(id: NodeId) -> Self {
        Self(Some(id))
    }

    pub fn is_linked(&self) -> bool {
        self.0.is_some()
    }

    pub fn initialize(&self, graph: &mut AnimGraph, env: &mut NodeEnv<'_>) {
        if let Some(id) = self.0 {
            graph.initialize(id, env);
        }
    }

    pub fn update(&self, graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        if let Some(id) = self.0 {
            graph.update(id, ctx, env);
        }
    }

    pub fn evaluate(&self, graph: &mut AnimGraph, out: &mut PlaybackData) {
        if let Some(id) = self.0 {
            graph.evaluate(id, out);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::logic::NoLogic;
    use rand::SeedableRng;

    /// Owns everything a [`NodeEnv`] borrows.
    pub struct EnvParts {
        pub player: AnimPlayer,
        pub overrides: SlotOverrides,
        pub logic: NoLogic,
        pub machines: Vec<StateMachineData>,
        pub rng: StdRng,
    }

    impl EnvParts {
        pub fn new() -> Self {
            Self {
                player: AnimPlayer::new(),
                overrides: SlotOverrides::default(),
                logic: NoLogic,
                machines: Vec::new(),
                rng: StdRng::seed_from_u64(7),
            }
        }

        pub fn env(&mut self) -> NodeEnv<'_> {
            NodeEnv {
                player: &mut self.player,
                overrides: &self.overrides,
                logic: &mut self.logic,
                machines: &self.machines,
                rng: &mut self.rng,
                allow_transitional_states: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::EnvParts;
    use super::*;

    /// Node that links back to itself.
    #[derive(Clone, Debug)]
    struct Loopback(NodeId, usize);

    impl AnimNodeBehavior for Loopback {
        fn on_initialize(&mut self, graph: &mut AnimGraph, env: &mut NodeEnv<'_>) {
            self.1 += 1;
            graph.initialize(self.0, env);
        }

        fn on_update(
            &mut self,
            _graph: &mut AnimGraph,
            _ctx: &UpdateContext,
            _env: &mut NodeEnv<'_>,
        ) {
        }

        fn on_evaluate(&mut self, _graph: &mut AnimGraph, _out: &mut PlaybackData) {}
    }

    #[test]
    fn reentrant_calls_are_skipped_and_node_restored() {
        let mut graph = AnimGraph::default();
        let id = graph.push(AnimNode::Custom(Box::new(Loopback(NodeId(0), 0))));
        let mut parts = EnvParts::new();
        graph.initialize(id, &mut parts.env());
        assert_eq!(graph.get(id).map(AnimNode::kind), Some("custom"));
        graph.initialize(id, &mut parts.env());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut graph = AnimGraph::default();
        let mut out = PlaybackData::new();
        graph.evaluate(NodeId(5), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn context_weights_compose() {
        let ctx = UpdateContext::new(0.1, 3).with_weight(0.5);
        assert_eq!(ctx.fractional_weight(0.5).weight, 0.25);
        assert_eq!(ctx.frame, 3);
    }
}
