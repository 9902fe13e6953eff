//! Flat state-machine tables produced by the blueprint compiler.
//!
//! Every reference is a plain index: links point at node indices inside the same machine,
//! rules at entries of `transition_rules`, and anim graphs at [`NodeId`]s of the instance
//! node arena.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::logic::AnimLogic;

/// Boolean rule guarding a transition or a conduit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    /// Dynamic rules call `rule_function` on the host logic every evaluation.
    pub is_dynamic: bool,
    pub constant_value: bool,
    #[serde(default)]
    pub rule_function: Option<String>,
}

impl TransitionRule {
    pub fn constant(value: bool) -> Self {
        Self {
            is_dynamic: false,
            constant_value: value,
            rule_function: None,
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self {
            is_dynamic: true,
            constant_value: false,
            rule_function: Some(name.into()),
        }
    }

    pub fn evaluate(&self, logic: &mut dyn AnimLogic) -> bool {
        match (&self.rule_function, self.is_dynamic) {
            (Some(function), true) => logic.evaluate_rule(function),
            _ => self.constant_value,
        }
    }
}

/// Outward link of a machine node, already sorted by descending priority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateMachineLink {
    pub target_node_index: usize,
    pub transition_rule_index: usize,
    /// Sink of a graph played while this transition is in flight.
    #[serde(default)]
    pub transitional_anim_node: Option<NodeId>,
}

impl StateMachineLink {
    pub fn has_transitional_animations(&self) -> bool {
        self.transitional_anim_node.is_some()
    }
}

/// A state or a conduit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateMachineNode {
    pub name: String,
    #[serde(default)]
    pub is_conduit: bool,
    /// Sink of the state's anim graph. Conduits have none.
    #[serde(default)]
    pub anim_node: Option<NodeId>,
    #[serde(default)]
    pub conduit_rule_index: Option<usize>,
    #[serde(default)]
    pub on_enter_event: Option<String>,
    #[serde(default)]
    pub on_exit_event: Option<String>,
    #[serde(default)]
    pub outward_links: Vec<StateMachineLink>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMachineData {
    pub machine_name: String,
    pub initial_state: usize,
    pub nodes: Vec<StateMachineNode>,
    pub transition_rules: Vec<TransitionRule>,
    /// Jump name to target node index.
    #[serde(default)]
    pub jump_links: HashMap<String, usize>,
}

impl StateMachineData {
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn rule(&self, index: usize) -> Option<&TransitionRule> {
        self.transition_rules.get(index)
    }
}
