//! Compiled blueprint: the immutable template every [`AnimInstance`](crate::AnimInstance)
//! clones its node arena from.

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::machine::StateMachineData;
use crate::nodes::{AnimGraph, AnimNode};

/// Slot registered by an override slot node, with the group it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideSlotDescriptor {
    pub slot: String,
    pub group: String,
}

#[derive(Clone, Debug)]
pub struct AnimBlueprintClass {
    pub name: String,
    nodes: Vec<AnimNode>,
    root: NodeId,
    state_machines: Vec<StateMachineData>,
    state_machine_nodes: Vec<NodeId>,
    override_slots: Vec<OverrideSlotDescriptor>,
}

impl AnimBlueprintClass {
    pub(crate) fn new(
        name: String,
        nodes: Vec<AnimNode>,
        root: NodeId,
        state_machines: Vec<StateMachineData>,
        override_slots: Vec<OverrideSlotDescriptor>,
    ) -> Self {
        let state_machine_nodes = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, AnimNode::StateMachine(_)))
            .map(|(i, _)| NodeId::from_index(i))
            .collect();
        Self {
            name,
            nodes,
            root,
            state_machines,
            state_machine_nodes,
            override_slots,
        }
    }

    /// Main sink of the blueprint.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&AnimNode> {
        self.nodes.get(id.index())
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn state_machines(&self) -> &[StateMachineData] {
        &self.state_machines
    }

    /// Arena ids of every state machine runtime node.
    pub fn state_machine_nodes(&self) -> &[NodeId] {
        &self.state_machine_nodes
    }

    pub fn override_slots(&self) -> &[OverrideSlotDescriptor] {
        &self.override_slots
    }

    pub fn slot_group(&self, slot: &str) -> Option<&str> {
        self.override_slots
            .iter()
            .find(|d| d.slot == slot)
            .map(|d| d.group.as_str())
    }

    /// Fresh copy of the node arena for a new instance.
    pub fn instantiate_graph(&self) -> AnimGraph {
        AnimGraph::new(self.nodes.clone())
    }
}
