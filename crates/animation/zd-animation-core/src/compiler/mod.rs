//! Blueprint bake: lowers an [`AnimBlueprintSpec`] into the flat node arena and state
//! machine tables of an [`AnimBlueprintClass`].
//!
//! Every graph (the main anim graph, each state graph and each transitional graph) is
//! lowered into the same arena; node references become [`NodeId`]s and state machine
//! references become table indices. Diagnostics are collected rather than returned on the
//! first failure so one compile reports everything wrong with the blueprint.

use std::cmp::Reverse;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::class::{AnimBlueprintClass, OverrideSlotDescriptor};
use crate::error::{CompileError, CompileFailure};
use crate::ids::NodeId;
use crate::library::SequenceLibrary;
use crate::machine::{self, StateMachineData, StateMachineLink, TransitionRule};
use crate::nodes::{
    AnimLink, AnimNode, CacheAnimationNode, OverrideSlotNode, PlaySequenceNode, RandomEntry,
    RandomPlayerNode, SinkNode, StateMachineNode, UseCachedAnimationNode,
};
use crate::sequence::AnimSequence;

pub mod spec;
mod validate;

pub use spec::{
    AnimBlueprintSpec, GraphSpec, MachineNodeSpec, MachineSpec, NodeKindSpec, NodeSpec,
    RandomEntrySpec, RuleSpec,
};

/// Compile `spec` against the sequences of `library`.
pub fn compile(
    spec: &AnimBlueprintSpec,
    library: &SequenceLibrary,
) -> Result<AnimBlueprintClass, CompileFailure> {
    let mut compiler = Compiler::new(spec, library);

    let graph_name = if spec.anim_graph.name.is_empty() {
        "AnimGraph"
    } else {
        spec.anim_graph.name.as_str()
    };
    let root = compiler.lower_graph(&spec.anim_graph, graph_name);

    for (index, machine) in spec.state_machines.iter().enumerate() {
        let data = compiler.lower_machine(machine);
        compiler.machines[index] = data;
    }

    compiler.resolve_cache_readers();

    let Compiler {
        nodes,
        machines,
        slots,
        mut errors,
        ..
    } = compiler;

    for error in validate::check_cycles(&nodes, &machines) {
        if !errors.contains(&error) {
            errors.push(error);
        }
    }

    match root {
        Some(root) if errors.is_empty() => {
            log::debug!(
                "compiled anim blueprint '{}': {} nodes, {} state machines, {} slots",
                spec.name,
                nodes.len(),
                machines.len(),
                slots.len()
            );
            Ok(AnimBlueprintClass::new(
                spec.name.clone(),
                nodes,
                root,
                machines,
                slots,
            ))
        }
        _ => Err(CompileFailure {
            blueprint: spec.name.clone(),
            errors,
        }),
    }
}

/// Reader whose cache is looked up once every graph has been lowered.
struct PendingCacheReader {
    id: NodeId,
    node: String,
    cache: String,
}

struct Compiler<'a> {
    library: &'a SequenceLibrary,
    machine_lookup: HashMap<&'a str, usize>,
    machine_uses: HashMap<usize, usize>,
    nodes: Vec<AnimNode>,
    machines: Vec<StateMachineData>,
    caches: HashMap<String, NodeId>,
    pending_readers: Vec<PendingCacheReader>,
    slots: Vec<OverrideSlotDescriptor>,
    errors: Vec<CompileError>,
}

impl<'a> Compiler<'a> {
    fn new(spec: &'a AnimBlueprintSpec, library: &'a SequenceLibrary) -> Self {
        let mut machine_lookup = HashMap::new();
        for (index, machine) in spec.state_machines.iter().enumerate() {
            // Later duplicates are unreachable by name; the first definition wins.
            machine_lookup.entry(machine.name.as_str()).or_insert(index);
        }
        Self {
            library,
            machine_lookup,
            machine_uses: HashMap::new(),
            nodes: Vec::new(),
            machines: vec![StateMachineData::default(); spec.state_machines.len()],
            caches: HashMap::new(),
            pending_readers: Vec::new(),
            slots: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn reserve(&mut self) -> NodeId {
        self.nodes.push(AnimNode::Vacant);
        NodeId::from_index(self.nodes.len() - 1)
    }

    fn sequence(&mut self, node: &str, name: &str) -> Option<Arc<AnimSequence>> {
        let found = self.library.get(name).cloned();
        if found.is_none() {
            self.errors.push(CompileError::UnknownSequence {
                node: node.to_string(),
                sequence: name.to_string(),
            });
        }
        found
    }

    /// Lower one graph and return the id of its sink.
    fn lower_graph(&mut self, graph: &GraphSpec, label: &str) -> Option<NodeId> {
        let label = if graph.name.is_empty() {
            label
        } else {
            graph.name.as_str()
        };

        let mut local: HashMap<&str, NodeId> = HashMap::new();
        let mut reserved: Vec<(NodeId, &NodeSpec)> = Vec::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            if local.contains_key(node.id.as_str()) {
                self.errors.push(CompileError::DuplicateNode {
                    graph: label.to_string(),
                    node: node.id.clone(),
                });
                continue;
            }
            let id = self.reserve();
            local.insert(node.id.as_str(), id);
            reserved.push((id, node));
        }

        let sinks: Vec<NodeId> = reserved
            .iter()
            .filter(|(_, n)| matches!(n.kind, NodeKindSpec::Sink { .. }))
            .map(|(id, _)| *id)
            .collect();
        match sinks.len() {
            0 => self.errors.push(CompileError::MissingSink {
                graph: label.to_string(),
            }),
            1 => {}
            _ => self.errors.push(CompileError::DuplicateSink {
                graph: label.to_string(),
            }),
        }

        for (id, node) in reserved {
            if let Some(lowered) = self.lower_node(id, node, &local, label) {
                self.nodes[id.index()] = lowered;
            }
        }

        sinks.first().copied()
    }

    fn link(
        &mut self,
        local: &HashMap<&str, NodeId>,
        graph: &str,
        node: &str,
        target: Option<&String>,
    ) -> AnimLink {
        let Some(target) = target else {
            return AnimLink::default();
        };
        match local.get(target.as_str()) {
            Some(id) => AnimLink::to(*id),
            None => {
                self.errors.push(CompileError::UnknownNode {
                    graph: graph.to_string(),
                    node: node.to_string(),
                    target: target.clone(),
                });
                AnimLink::default()
            }
        }
    }

    fn lower_node(
        &mut self,
        id: NodeId,
        node: &NodeSpec,
        local: &HashMap<&str, NodeId>,
        graph: &str,
    ) -> Option<AnimNode> {
        let name = node.id.as_str();
        match &node.kind {
            NodeKindSpec::Sink { result } => {
                let result = self.link(local, graph, name, result.as_ref());
                Some(AnimNode::Sink(SinkNode::new(result)))
            }
            NodeKindSpec::PlaySequence {
                sequence,
                play_rate,
                looping,
                directional_angle,
                directional_angle_variable,
            } => {
                let sequence = self.sequence(name, sequence)?;
                let mut player = PlaySequenceNode::new(sequence)
                    .with_play_rate(*play_rate)
                    .with_looping(*looping);
                player.directional_angle = *directional_angle;
                player.directional_angle_variable = directional_angle_variable.clone();
                Some(AnimNode::PlaySequence(player))
            }
            NodeKindSpec::StateMachine { machine } => {
                let Some(&index) = self.machine_lookup.get(machine.as_str()) else {
                    self.errors.push(CompileError::UnknownStateMachine {
                        node: name.to_string(),
                        machine: machine.clone(),
                    });
                    return None;
                };
                let uses = self.machine_uses.entry(index).or_insert(0);
                *uses += 1;
                if *uses == 2 {
                    self.errors.push(CompileError::StateMachineReused {
                        machine: machine.clone(),
                    });
                }
                Some(AnimNode::StateMachine(StateMachineNode::new(index)))
            }
            NodeKindSpec::CacheAnimation { name: cache, input } => {
                let input = self.link(local, graph, name, input.as_ref());
                if cache.is_empty() {
                    self.errors.push(CompileError::MissingCacheName {
                        node: name.to_string(),
                    });
                } else if self.caches.contains_key(cache.as_str()) {
                    self.errors.push(CompileError::DuplicateCacheName {
                        name: cache.clone(),
                    });
                } else {
                    self.caches.insert(cache.clone(), id);
                }
                Some(AnimNode::CacheAnimation(CacheAnimationNode::new(
                    cache.clone(),
                    input,
                )))
            }
            NodeKindSpec::UseCachedAnimation { cache } => {
                self.pending_readers.push(PendingCacheReader {
                    id,
                    node: name.to_string(),
                    cache: cache.clone(),
                });
                None
            }
            NodeKindSpec::OverrideSlot { input, slot, group } => {
                let input = self.link(local, graph, name, input.as_ref());
                if slot.is_empty() {
                    self.errors.push(CompileError::MissingSlotName {
                        node: name.to_string(),
                    });
                }
                if group.is_empty() {
                    self.errors.push(CompileError::MissingGroupName {
                        node: name.to_string(),
                    });
                }
                if !slot.is_empty() && !group.is_empty() {
                    self.register_slot(slot, group);
                }
                Some(AnimNode::OverrideSlot(OverrideSlotNode::new(
                    input,
                    slot.clone(),
                    group.clone(),
                )))
            }
            NodeKindSpec::RandomPlayer {
                entries,
                mode,
                directional_angle,
            } => {
                let mut lowered = Vec::with_capacity(entries.len());
                for entry in entries {
                    let Some(sequence) = self.sequence(name, &entry.sequence) else {
                        continue;
                    };
                    lowered.push(RandomEntry {
                        sequence: Some(sequence),
                        chance_to_play: entry.chance_to_play,
                        min_loop_count: entry.min_loop_count,
                        max_loop_count: entry.max_loop_count,
                        min_play_rate: entry.min_play_rate,
                        max_play_rate: entry.max_play_rate,
                    });
                }
                let mut player = RandomPlayerNode::new(lowered, *mode);
                player.directional_angle = *directional_angle;
                Some(AnimNode::RandomPlayer(player))
            }
        }
    }

    fn register_slot(&mut self, slot: &str, group: &str) {
        match self.slots.iter().find(|d| d.slot == slot) {
            Some(existing) if existing.group != group => {
                self.errors.push(CompileError::ConflictingSlotGroup {
                    slot: slot.to_string(),
                    existing: existing.group.clone(),
                    requested: group.to_string(),
                });
            }
            Some(_) => {}
            None => self.slots.push(OverrideSlotDescriptor {
                slot: slot.to_string(),
                group: group.to_string(),
            }),
        }
    }

    fn push_rule(data: &mut StateMachineData, rule: &RuleSpec) -> usize {
        data.transition_rules.push(match rule {
            RuleSpec::Constant(value) => TransitionRule::constant(*value),
            RuleSpec::Function(function) => TransitionRule::function(function.clone()),
        });
        data.transition_rules.len() - 1
    }

    fn lower_machine(&mut self, spec: &MachineSpec) -> StateMachineData {
        let machine_name = spec.name.clone();
        let mut data = StateMachineData {
            machine_name: machine_name.clone(),
            ..Default::default()
        };

        // States and conduits first so transitions can refer to them in any order.
        for node in &spec.nodes {
            let (name, record) = match node {
                MachineNodeSpec::State {
                    name,
                    graph,
                    on_enter,
                    on_exit,
                } => {
                    let label = format!("{machine_name}/{name}");
                    let anim_node = self.lower_graph(graph, &label);
                    (
                        name,
                        machine::StateMachineNode {
                            name: name.clone(),
                            is_conduit: false,
                            anim_node,
                            conduit_rule_index: None,
                            on_enter_event: on_enter.clone(),
                            on_exit_event: on_exit.clone(),
                            outward_links: Vec::new(),
                        },
                    )
                }
                MachineNodeSpec::Conduit { name, rule } => {
                    let conduit_rule_index = match rule {
                        Some(rule) => Some(Self::push_rule(&mut data, rule)),
                        None => {
                            self.errors.push(CompileError::ConduitWithoutResult {
                                machine: machine_name.clone(),
                                conduit: name.clone(),
                            });
                            None
                        }
                    };
                    (
                        name,
                        machine::StateMachineNode {
                            name: name.clone(),
                            is_conduit: true,
                            anim_node: None,
                            conduit_rule_index,
                            on_enter_event: None,
                            on_exit_event: None,
                            outward_links: Vec::new(),
                        },
                    )
                }
                _ => continue,
            };
            if data.node_index(name).is_some() {
                self.errors.push(CompileError::DuplicateState {
                    machine: machine_name.clone(),
                    state: name.clone(),
                });
                continue;
            }
            data.nodes.push(record);
        }

        let entries: Vec<&Option<String>> = spec
            .nodes
            .iter()
            .filter_map(|n| match n {
                MachineNodeSpec::Entry { target } => Some(target),
                _ => None,
            })
            .collect();
        match entries.as_slice() {
            [] => self.errors.push(CompileError::MissingEntry {
                machine: machine_name.clone(),
            }),
            [target] => match target {
                None => self.errors.push(CompileError::UnconnectedEntry {
                    machine: machine_name.clone(),
                }),
                Some(target) => match data.node_index(target) {
                    Some(index) => data.initial_state = index,
                    None => self.errors.push(CompileError::UnknownState {
                        machine: machine_name.clone(),
                        state: target.clone(),
                    }),
                },
            },
            _ => self.errors.push(CompileError::DuplicateEntry {
                machine: machine_name.clone(),
            }),
        }

        let mut links: Vec<(usize, i32, StateMachineLink)> = Vec::new();
        for node in &spec.nodes {
            let MachineNodeSpec::Transition {
                from,
                to,
                rule,
                priority,
                transitional_graph,
            } = node
            else {
                continue;
            };
            let resolve = |state: &String, errors: &mut Vec<CompileError>| {
                let index = data.node_index(state);
                if index.is_none() {
                    errors.push(CompileError::UnknownState {
                        machine: machine_name.clone(),
                        state: state.clone(),
                    });
                }
                index
            };
            let from_index = resolve(from, &mut self.errors);
            let to_index = resolve(to, &mut self.errors);

            let Some(rule) = rule else {
                self.errors.push(CompileError::TransitionWithoutResult {
                    machine: machine_name.clone(),
                    from: from.clone(),
                    to: to.clone(),
                });
                continue;
            };
            let transitional_anim_node = transitional_graph.as_ref().and_then(|graph| {
                let label = format!("{machine_name}/{from}->{to}");
                self.lower_graph(graph, &label)
            });
            let (Some(from_index), Some(to_index)) = (from_index, to_index) else {
                continue;
            };
            let transition_rule_index = Self::push_rule(&mut data, rule);
            links.push((
                from_index,
                *priority,
                StateMachineLink {
                    target_node_index: to_index,
                    transition_rule_index,
                    transitional_anim_node,
                },
            ));
        }
        // Stable: equal priorities keep authoring order.
        links.sort_by_key(|(_, priority, _)| Reverse(*priority));
        for (from, _, link) in links {
            data.nodes[from].outward_links.push(link);
        }

        for node in &spec.nodes {
            let MachineNodeSpec::Jump { name, target } = node else {
                continue;
            };
            if data.jump_links.contains_key(name.as_str()) {
                self.errors.push(CompileError::DuplicateJump {
                    machine: machine_name.clone(),
                    jump: name.clone(),
                });
                continue;
            }
            match data.node_index(target) {
                Some(index) => {
                    data.jump_links.insert(name.clone(), index);
                }
                None => self.errors.push(CompileError::UnknownState {
                    machine: machine_name.clone(),
                    state: target.clone(),
                }),
            }
        }

        data
    }

    fn resolve_cache_readers(&mut self) {
        for reader in std::mem::take(&mut self.pending_readers) {
            match self.caches.get(reader.cache.as_str()) {
                Some(&cache) => {
                    self.nodes[reader.id.index()] =
                        AnimNode::UseCachedAnimation(UseCachedAnimationNode::new(cache));
                }
                None => self.errors.push(CompileError::UnknownCache {
                    node: reader.node,
                    cache: reader.cache,
                }),
            }
        }
    }
}
