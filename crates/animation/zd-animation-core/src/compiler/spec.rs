//! Authored blueprint description consumed by the compiler.
//!
//! Node references inside a graph use the node `id`s of that graph. Sequences are referenced
//! by library name, state machines and caches by their blueprint-wide names.

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::nodes::SelectionMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimBlueprintSpec {
    pub name: String,
    pub anim_graph: GraphSpec,
    #[serde(default)]
    pub state_machines: Vec<MachineSpec>,
}

impl AnimBlueprintSpec {
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSpec {
    /// Used in diagnostics only.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKindSpec,
}

fn default_play_rate() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKindSpec {
    Sink {
        #[serde(default)]
        result: Option<String>,
    },
    PlaySequence {
        sequence: String,
        #[serde(default = "default_play_rate")]
        play_rate: f32,
        #[serde(default = "default_true")]
        looping: bool,
        #[serde(default)]
        directional_angle: f32,
        #[serde(default)]
        directional_angle_variable: Option<String>,
    },
    StateMachine {
        machine: String,
    },
    CacheAnimation {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Option<String>,
    },
    UseCachedAnimation {
        cache: String,
    },
    OverrideSlot {
        #[serde(default)]
        input: Option<String>,
        #[serde(default)]
        slot: String,
        #[serde(default)]
        group: String,
    },
    RandomPlayer {
        #[serde(default)]
        entries: Vec<RandomEntrySpec>,
        #[serde(default)]
        mode: SelectionMode,
        #[serde(default)]
        directional_angle: f32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomEntrySpec {
    pub sequence: String,
    #[serde(default = "default_play_rate")]
    pub chance_to_play: f32,
    #[serde(default)]
    pub min_loop_count: i32,
    #[serde(default)]
    pub max_loop_count: i32,
    #[serde(default = "default_play_rate")]
    pub min_play_rate: f32,
    #[serde(default = "default_play_rate")]
    pub max_play_rate: f32,
}

/// `true`/`false` for constant rules, a string for a host rule function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    Constant(bool),
    Function(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSpec {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<MachineNodeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MachineNodeSpec {
    Entry {
        #[serde(default)]
        target: Option<String>,
    },
    State {
        name: String,
        #[serde(default)]
        graph: GraphSpec,
        #[serde(default)]
        on_enter: Option<String>,
        #[serde(default)]
        on_exit: Option<String>,
    },
    Conduit {
        name: String,
        #[serde(default)]
        rule: Option<RuleSpec>,
    },
    Transition {
        from: String,
        to: String,
        #[serde(default)]
        rule: Option<RuleSpec>,
        /// Higher priorities are tested first.
        #[serde(default)]
        priority: i32,
        #[serde(default)]
        transitional_graph: Option<GraphSpec>,
    },
    Jump {
        name: String,
        target: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_nodes_and_rules() {
        let json = r#"{
            "name": "Hero",
            "anim_graph": { "nodes": [
                { "id": "out", "kind": "sink", "result": "sm" },
                { "id": "sm", "kind": "state_machine", "machine": "Locomotion" }
            ] },
            "state_machines": [ { "name": "Locomotion", "nodes": [
                { "kind": "entry", "target": "Idle" },
                { "kind": "state", "name": "Idle" },
                { "kind": "transition", "from": "Idle", "to": "Idle", "rule": "CanIdle", "priority": 2 },
                { "kind": "conduit", "name": "Gate", "rule": true }
            ] } ]
        }"#;
        let spec = AnimBlueprintSpec::from_json(json).unwrap();
        assert_eq!(spec.anim_graph.nodes.len(), 2);
        let machine = &spec.state_machines[0];
        assert!(matches!(
            &machine.nodes[2],
            MachineNodeSpec::Transition {
                rule: Some(RuleSpec::Function(f)),
                priority: 2,
                ..
            } if f == "CanIdle"
        ));
        assert!(matches!(
            &machine.nodes[3],
            MachineNodeSpec::Conduit { rule: Some(RuleSpec::Constant(true)), .. }
        ));
    }
}
