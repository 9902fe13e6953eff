//! Circular reference detection over a lowered node arena.
//!
//! The walk starts at every sink and follows the edges nodes actually traverse at runtime:
//! sink results, cache inputs, cache readers, slot inputs and the state/transitional graphs
//! of state machines. The on-path set is per branch, so two branches reading the same cache
//! are fine while a cache that (transitively) reads itself is not.

use hashbrown::HashSet;

use crate::error::CompileError;
use crate::ids::NodeId;
use crate::machine::StateMachineData;
use crate::nodes::AnimNode;

pub(crate) fn check_cycles(nodes: &[AnimNode], machines: &[StateMachineData]) -> Vec<CompileError> {
    let mut walk = CycleWalk {
        nodes,
        machines,
        path: Vec::new(),
        on_path: HashSet::new(),
        done: HashSet::new(),
        errors: Vec::new(),
    };
    for (index, node) in nodes.iter().enumerate() {
        if matches!(node, AnimNode::Sink(_)) {
            walk.visit(NodeId::from_index(index));
        }
    }
    walk.errors
}

struct CycleWalk<'a> {
    nodes: &'a [AnimNode],
    machines: &'a [StateMachineData],
    path: Vec<NodeId>,
    on_path: HashSet<NodeId>,
    done: HashSet<NodeId>,
    errors: Vec<CompileError>,
}

impl CycleWalk<'_> {
    fn edges(&self, id: NodeId) -> Vec<NodeId> {
        match self.nodes.get(id.index()) {
            Some(AnimNode::Sink(n)) => n.result.0.into_iter().collect(),
            Some(AnimNode::CacheAnimation(n)) => n.input.0.into_iter().collect(),
            Some(AnimNode::UseCachedAnimation(n)) => vec![n.cache],
            Some(AnimNode::OverrideSlot(n)) => n.input.0.into_iter().collect(),
            Some(AnimNode::StateMachine(n)) => self
                .machines
                .get(n.machine_index)
                .map(|machine| {
                    machine
                        .nodes
                        .iter()
                        .flat_map(|state| {
                            state.anim_node.into_iter().chain(
                                state
                                    .outward_links
                                    .iter()
                                    .filter_map(|link| link.transitional_anim_node),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn visit(&mut self, id: NodeId) {
        if self.done.contains(&id) {
            return;
        }
        if self.on_path.contains(&id) {
            self.report(id);
            return;
        }
        self.on_path.insert(id);
        self.path.push(id);
        for next in self.edges(id) {
            self.visit(next);
        }
        self.path.pop();
        self.on_path.remove(&id);
        self.done.insert(id);
    }

    /// Name the cycle after the first cache on it, or the first state machine otherwise.
    fn report(&mut self, repeated: NodeId) {
        let start = self.path.iter().position(|&id| id == repeated).unwrap_or(0);
        let cycle = &self.path[start..];
        let cache = cycle.iter().find_map(|id| match self.nodes.get(id.index()) {
            Some(AnimNode::CacheAnimation(n)) => Some(n.name.clone()),
            _ => None,
        });
        let error = match cache {
            Some(cache) => CompileError::CircularReference { cache },
            None => {
                let machine = cycle
                    .iter()
                    .find_map(|id| match self.nodes.get(id.index()) {
                        Some(AnimNode::StateMachine(n)) => self
                            .machines
                            .get(n.machine_index)
                            .map(|m| m.machine_name.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                CompileError::RecursiveStateMachine { machine }
            }
        };
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }
}
