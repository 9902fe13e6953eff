//! Runtime walk of a compiled state machine.
//!
//! Each update first takes every transition available this tick (bounded by the nodes
//! visited so far, and to a single step when transitional states are disabled), then
//! updates the active graph: the transitional graph of the last taken link if any,
//! otherwise the state graph.

use hashbrown::HashSet;

use super::{AnimGraph, AnimNode, AnimNodeBehavior, NodeEnv, SinkNode, UpdateContext};
use crate::events::AnimEvent;
use crate::ids::NodeId;
use crate::logic::AnimLogic;
use crate::machine::{StateMachineData, StateMachineLink};
use crate::playback::PlaybackData;

#[derive(Clone, Debug, Default)]
pub struct StateMachineNode {
    /// Index into the state machine tables of the blueprint class.
    pub machine_index: usize,
    current_state: Option<usize>,
    current_state_time: f32,
    current_state_node: Option<NodeId>,
    transitional_node: Option<NodeId>,
    pop_transitional: bool,
}

impl StateMachineNode {
    pub fn new(machine_index: usize) -> Self {
        Self {
            machine_index,
            ..Default::default()
        }
    }

    pub fn current_state(&self) -> Option<usize> {
        self.current_state
    }

    /// Seconds spent in the current state.
    pub fn current_state_time(&self) -> f32 {
        self.current_state_time
    }

    pub fn transitional_node(&self) -> Option<NodeId> {
        self.transitional_node
    }

    pub fn machine_name<'m>(&self, machines: &'m [StateMachineData]) -> Option<&'m str> {
        machines
            .get(self.machine_index)
            .map(|m| m.machine_name.as_str())
    }

    pub fn current_state_name<'m>(&self, machines: &'m [StateMachineData]) -> Option<&'m str> {
        let machine = machines.get(self.machine_index)?;
        let node = machine.nodes.get(self.current_state?)?;
        Some(node.name.as_str())
    }

    fn current_anim_node(&self) -> Option<NodeId> {
        self.transitional_node.or(self.current_state_node)
    }

    fn set_state(
        &mut self,
        new_state: usize,
        machine: &StateMachineData,
        logic: &mut dyn AnimLogic,
    ) {
        if let Some(exit) = self
            .current_state
            .and_then(|i| machine.nodes.get(i))
            .and_then(|n| n.on_exit_event.as_deref())
        {
            logic.call_event(exit);
        }

        self.current_state = Some(new_state);
        self.current_state_time = 0.0;
        self.transitional_node = None;
        self.current_state_node = machine.nodes.get(new_state).and_then(|n| n.anim_node);

        if let Some(node) = machine.nodes.get(new_state) {
            log::debug!(
                "state machine '{}' entered '{}'",
                machine.machine_name,
                node.name
            );
            if let Some(enter) = node.on_enter_event.as_deref() {
                logic.call_event(enter);
            }
        }
    }

    /// Conduits must pass their own rule; nodes visited this walk cannot be re-entered.
    fn can_enter(
        node_index: usize,
        visited: &HashSet<usize>,
        machine: &StateMachineData,
        logic: &mut dyn AnimLogic,
    ) -> bool {
        if visited.contains(&node_index) {
            return false;
        }
        let Some(node) = machine.nodes.get(node_index) else {
            return false;
        };
        if !node.is_conduit {
            return true;
        }
        node.conduit_rule_index
            .and_then(|i| machine.rule(i))
            .is_some_and(|rule| rule.evaluate(logic))
    }

    /// First outward link (in priority order) whose rule passes and whose target can be
    /// entered. Links into conduits resolve to the conduit's own valid link, so a conduit is
    /// never the end of a transition.
    fn check_valid_transition<'m>(
        node_index: usize,
        visited: &mut HashSet<usize>,
        machine: &'m StateMachineData,
        logic: &mut dyn AnimLogic,
    ) -> Option<&'m StateMachineLink> {
        let node = machine.nodes.get(node_index)?;
        for link in &node.outward_links {
            let Some(rule) = machine.rule(link.transition_rule_index) else {
                continue;
            };
            if !rule.evaluate(logic)
                || !Self::can_enter(link.target_node_index, visited, machine, logic)
            {
                continue;
            }
            let Some(target) = machine.nodes.get(link.target_node_index) else {
                continue;
            };
            if !target.is_conduit {
                return Some(link);
            }
            let mut conduit_visited = visited.clone();
            conduit_visited.insert(link.target_node_index);
            if let Some(conduit_link) = Self::check_valid_transition(
                link.target_node_index,
                &mut conduit_visited,
                machine,
                logic,
            ) {
                *visited = conduit_visited;
                return Some(conduit_link);
            }
        }
        None
    }

    /// Enter the state registered under `jump` and initialize its graph.
    pub fn jump_to_node(
        &mut self,
        jump: &str,
        graph: &mut AnimGraph,
        env: &mut NodeEnv<'_>,
    ) -> bool {
        let machines = env.machines;
        let Some(machine) = machines.get(self.machine_index) else {
            return false;
        };
        let Some(&target) = machine.jump_links.get(jump) else {
            return false;
        };
        self.set_state(target, machine, env.logic);
        if let Some(node) = self.current_state_node {
            graph.initialize(node, env);
        }
        true
    }
}

impl AnimNodeBehavior for StateMachineNode {
    fn on_initialize(&mut self, graph: &mut AnimGraph, env: &mut NodeEnv<'_>) {
        let machines = env.machines;
        let Some(machine) = machines.get(self.machine_index) else {
            log::warn!(
                "state machine node references missing machine {}",
                self.machine_index
            );
            return;
        };
        if machine.initial_state >= machine.nodes.len() {
            return;
        }
        self.set_state(machine.initial_state, machine, env.logic);
        if let Some(node) = self.current_state_node {
            graph.initialize(node, env);
        }
    }

    fn on_update(&mut self, graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        let machines = env.machines;
        let Some(machine) = machines.get(self.machine_index) else {
            return;
        };
        let Some(start) = self.current_state else {
            return;
        };

        // Popped here so a finished transitional graph is still evaluated on the tick it ends.
        if self.pop_transitional {
            self.transitional_node = None;
            self.pop_transitional = false;
        }

        let mut visited = HashSet::new();
        visited.insert(start);
        let mut state = start;
        while let Some(link) = Self::check_valid_transition(state, &mut visited, machine, env.logic)
        {
            state = link.target_node_index;
            self.set_state(state, machine, env.logic);
            visited.insert(state);

            if let Some(transitional) = link.transitional_anim_node {
                let has_data = graph
                    .get(transitional)
                    .and_then(AnimNode::as_sink)
                    .is_some_and(SinkNode::has_animation_data);
                if has_data {
                    self.transitional_node = Some(transitional);
                }
            }

            if let Some(node) = self.current_state_node {
                graph.initialize(node, env);
            }
            if let Some(node) = self.transitional_node {
                graph.initialize(node, env);
            }

            if !env.allow_transitional_states {
                break;
            }
        }

        self.current_state_time += ctx.delta_time;

        let events_before = env.player.events().len();
        if let Some(node) = self.current_anim_node() {
            graph.update(node, ctx, env);
        }
        let completed = env
            .player
            .events()
            .get(events_before..)
            .is_some_and(|events| {
                events
                    .iter()
                    .any(|e| matches!(e, AnimEvent::SequenceComplete { .. }))
            });
        if completed && self.transitional_node.is_some() {
            self.pop_transitional = true;
        }
    }

    fn on_evaluate(&mut self, graph: &mut AnimGraph, out: &mut PlaybackData) {
        if let Some(node) = self.current_anim_node() {
            graph.evaluate(node, out);
        }
    }
}
