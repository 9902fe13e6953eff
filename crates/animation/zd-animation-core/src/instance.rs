//! Anim instance: one running copy of a compiled blueprint.
//!
//! Per tick:
//! 1. advance animation overrides and publish their data per slot,
//! 2. update the node graph from the main sink,
//! 3. evaluate the graph and hand the result to the player, which renders it and then
//!    flushes the notifies collected during the update.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::class::AnimBlueprintClass;
use crate::config::InstanceConfig;
use crate::events::AnimEvent;
use crate::ids::NodeId;
use crate::logic::AnimLogic;
use crate::nodes::{
    AnimGraph, AnimNode, NodeEnv, PlaySequenceNode, RandomPlayerNode, SlotOverrides,
    StateMachineNode, UpdateContext,
};
use crate::playback::PlaybackData;
use crate::player::{AnimPlayer, TickOptions};
use crate::render::{PlaybackHandle, RenderComponent};
use crate::sequence::AnimSequence;

/// Host frame parameters for one tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameInfo {
    pub delta_time: f32,
    /// Monotonic host frame counter.
    pub frame: u64,
    /// Global time dilation applied by the host to `delta_time`.
    pub time_dilation: f32,
}

impl FrameInfo {
    pub fn new(delta_time: f32, frame: u64) -> Self {
        Self {
            delta_time,
            frame,
            time_dilation: 1.0,
        }
    }

    pub fn with_time_dilation(mut self, time_dilation: f32) -> Self {
        self.time_dilation = time_dilation;
        self
    }

    fn effective_delta(&self, ignore_time_dilation: bool) -> f32 {
        if ignore_time_dilation && self.time_dilation > 0.0 {
            self.delta_time / self.time_dilation
        } else {
            self.delta_time
        }
    }
}

/// Sequence played imperatively on an override slot.
#[derive(Clone, Debug)]
pub struct AnimationOverride {
    pub sequence: Arc<AnimSequence>,
    pub slot: String,
    pub group: String,
    pub playback_time: f32,
    pub play_rate: f32,
}

impl AnimationOverride {
    fn is_finished(&self) -> bool {
        const TOLERANCE: f32 = 1.0e-6;
        (self.play_rate > 0.0
            && (self.playback_time - self.sequence.total_duration()).abs() <= TOLERANCE)
            || (self.play_rate < 0.0 && self.playback_time.abs() <= TOLERANCE)
    }
}

#[derive(Debug)]
pub struct AnimInstance {
    class: Arc<AnimBlueprintClass>,
    graph: AnimGraph,
    player: AnimPlayer,
    config: InstanceConfig,
    overrides: Vec<AnimationOverride>,
    processed: SlotOverrides,
    rng: StdRng,
    initialized: bool,
}

impl AnimInstance {
    pub fn new(
        class: Arc<AnimBlueprintClass>,
        handle: Box<dyn PlaybackHandle>,
        render_component: Box<dyn RenderComponent>,
        config: InstanceConfig,
    ) -> Self {
        let mut player = AnimPlayer::new();
        player.set_preview(config.preview);
        player.init(handle);
        player.register_render_component(render_component);
        if let Some(fire) = config.fire_sequence_changed_events {
            player.fire_sequence_changed_events = fire;
        }
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            graph: class.instantiate_graph(),
            class,
            player,
            config,
            overrides: Vec::new(),
            processed: SlotOverrides::default(),
            rng,
            initialized: false,
        }
    }

    pub fn class(&self) -> &Arc<AnimBlueprintClass> {
        &self.class
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn graph(&self) -> &AnimGraph {
        &self.graph
    }

    pub fn player(&self) -> &AnimPlayer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut AnimPlayer {
        &mut self.player
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run host init and initialize every node reachable from the main sink.
    /// Called lazily by the first [`Self::tick`].
    pub fn init(&mut self, logic: &mut dyn AnimLogic) {
        logic.on_init();
        let root = self.class.root();
        let mut env = NodeEnv {
            player: &mut self.player,
            overrides: &self.processed,
            logic,
            machines: self.class.state_machines(),
            rng: &mut self.rng,
            allow_transitional_states: self.config.allow_transitional_states,
        };
        self.graph.initialize(root, &mut env);
        self.initialized = true;
    }

    /// Advance one frame. Events left over from the previous frame are discarded first.
    pub fn tick(&mut self, frame: FrameInfo, logic: &mut dyn AnimLogic) {
        self.player.clear_events();
        if !self.initialized {
            self.init(logic);
        }
        let delta_time = frame.effective_delta(self.config.ignore_time_dilation);
        let root = self.class.root();

        self.update_animation_overrides(delta_time);

        let ctx = UpdateContext::new(delta_time, frame.frame);
        {
            let mut env = NodeEnv {
                player: &mut self.player,
                overrides: &self.processed,
                logic: &mut *logic,
                machines: self.class.state_machines(),
                rng: &mut self.rng,
                allow_transitional_states: self.config.allow_transitional_states,
            };
            self.graph.update(root, &ctx, &mut env);
        }
        self.processed.clear();

        let mut playback_data = PlaybackData::new();
        self.graph.evaluate(root, &mut playback_data);
        self.player.play(&playback_data, Some(&mut *logic));

        logic.on_tick(delta_time);
    }

    // --- animation overrides ------------------------------------------------

    fn update_animation_overrides(&mut self, delta_time: f32) {
        for index in (0..self.overrides.len()).rev() {
            let handle = &mut self.overrides[index];
            let sequence = Arc::clone(&handle.sequence);
            self.player.tick_playback(
                Some(&sequence),
                &mut handle.playback_time,
                delta_time * handle.play_rate,
                false,
                TickOptions::owned(1.0),
            );

            if handle.is_finished() {
                let finished = self.overrides.remove(index);
                log::debug!(
                    "animation override '{}' on slot '{}' completed",
                    finished.sequence.name,
                    finished.slot
                );
                self.player.push_event(AnimEvent::OverrideEnded {
                    slot: finished.slot,
                    group: finished.group,
                    completed: true,
                });
            } else {
                let data = PlaybackData::single(sequence, handle.playback_time);
                let slot = handle.slot.clone();
                self.set_animation_override_data_by_slot(&slot, data, false);
            }
        }
    }

    /// Play `sequence` on `slot`, replacing any override running on the slot's group.
    /// Returns false when the blueprint has no such slot.
    pub fn play_animation_override(
        &mut self,
        sequence: &Arc<AnimSequence>,
        slot: &str,
        play_rate: f32,
        starting_position: f32,
    ) -> bool {
        let Some(group) = self.class.slot_group(slot) else {
            log::warn!("tried to play animation override on unknown slot '{slot}'");
            return false;
        };
        let group = group.to_string();
        let playback_time = starting_position
            .max(0.0)
            .min(sequence.total_duration());
        let handle = AnimationOverride {
            sequence: Arc::clone(sequence),
            slot: slot.to_string(),
            group,
            playback_time,
            play_rate,
        };

        match self.overrides.iter_mut().find(|o| o.group == handle.group) {
            Some(existing) => {
                let replaced = std::mem::replace(existing, handle);
                self.player.push_event(AnimEvent::OverrideEnded {
                    slot: replaced.slot,
                    group: replaced.group,
                    completed: false,
                });
            }
            None => self.overrides.push(handle),
        }
        log::debug!(
            "playing animation override '{}' on slot '{slot}'",
            sequence.name
        );
        true
    }

    pub fn stop_animation_override_by_group(&mut self, group: &str) {
        for index in (0..self.overrides.len()).rev() {
            if self.overrides[index].group == group {
                let stopped = self.overrides.remove(index);
                self.player.push_event(AnimEvent::OverrideEnded {
                    slot: stopped.slot,
                    group: stopped.group,
                    completed: false,
                });
            }
        }
    }

    pub fn stop_all_animation_overrides(&mut self) {
        for stopped in std::mem::take(&mut self.overrides).into_iter().rev() {
            self.player.push_event(AnimEvent::OverrideEnded {
                slot: stopped.slot,
                group: stopped.group,
                completed: false,
            });
        }
    }

    pub fn active_overrides(&self) -> &[AnimationOverride] {
        &self.overrides
    }

    /// Override data published for `slot` this tick. Cleared after every graph update.
    pub fn animation_override_data_by_slot(&self, slot: &str) -> Option<&PlaybackData> {
        self.processed.get(slot)
    }

    /// Publish override data for `slot`. Existing data for the slot is kept unless
    /// `overwrite_existing` is set.
    pub fn set_animation_override_data_by_slot(
        &mut self,
        slot: &str,
        data: PlaybackData,
        overwrite_existing: bool,
    ) {
        if overwrite_existing || self.processed.get(slot).is_none() {
            self.processed.set(slot, data);
        }
    }

    // --- state machines -------------------------------------------------------

    /// Take the jump link `jump` on every state machine, or only on the machine named
    /// `machine`. Returns whether any machine jumped.
    pub fn jump_to_node(
        &mut self,
        jump: &str,
        machine: Option<&str>,
        logic: &mut dyn AnimLogic,
    ) -> bool {
        let class = Arc::clone(&self.class);
        let machines = class.state_machines();
        let mut jumped = false;
        for &id in class.state_machine_nodes() {
            let outcome = self.graph.with_node_mut(id, |node, graph| {
                let AnimNode::StateMachine(state_machine) = node else {
                    return None;
                };
                let name = state_machine.machine_name(machines);
                if machine.is_some() && name != machine {
                    return None;
                }
                let mut env = NodeEnv {
                    player: &mut self.player,
                    overrides: &self.processed,
                    logic: &mut *logic,
                    machines,
                    rng: &mut self.rng,
                    allow_transitional_states: self.config.allow_transitional_states,
                };
                Some(state_machine.jump_to_node(jump, graph, &mut env))
            });
            match outcome.flatten() {
                Some(taken) => {
                    jumped |= taken;
                    if machine.is_some() {
                        break;
                    }
                }
                None => continue,
            }
        }
        jumped
    }

    /// Runtime node of the state machine named `name`.
    pub fn state_machine(&self, name: &str) -> Option<&StateMachineNode> {
        let machines = self.class.state_machines();
        self.class
            .state_machine_nodes()
            .iter()
            .filter_map(|&id| self.graph.get(id).and_then(AnimNode::as_state_machine))
            .find(|node| node.machine_name(machines) == Some(name))
    }

    /// Name of the active state of the machine named `machine`.
    pub fn current_state_name(&self, machine: &str) -> Option<&str> {
        self.state_machine(machine)?
            .current_state_name(self.class.state_machines())
    }

    // --- asset players ------------------------------------------------------

    pub fn sequence_player(&self, id: NodeId) -> Option<&PlaySequenceNode> {
        self.graph.get(id).and_then(AnimNode::as_sequence_player)
    }

    pub fn random_player(&self, id: NodeId) -> Option<&RandomPlayerNode> {
        self.graph.get(id).and_then(AnimNode::as_random_player)
    }

    // --- events ---------------------------------------------------------------

    /// Events raised since the start of the last tick.
    pub fn events(&self) -> &[AnimEvent] {
        self.player.events()
    }

    pub fn drain_events(&mut self) -> Vec<AnimEvent> {
        self.player.drain_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, AnimBlueprintSpec};
    use crate::library::SequenceLibrary;
    use crate::logic::NoLogic;
    use crate::render::{FlipbookComponent, FlipbookPlaybackHandle};

    fn instance(json: &str, library: &SequenceLibrary) -> AnimInstance {
        let spec = AnimBlueprintSpec::from_json(json).unwrap();
        let class = Arc::new(compile(&spec, library).unwrap());
        AnimInstance::new(
            class,
            Box::new(FlipbookPlaybackHandle::new()),
            Box::new(FlipbookComponent::new("sprite")),
            InstanceConfig::default().with_seed(1),
        )
    }

    const SLOTTED: &str = r#"{
        "name": "Slotted",
        "anim_graph": { "nodes": [
            { "id": "out", "kind": "sink", "result": "slot" },
            { "id": "slot", "kind": "override_slot", "input": "idle", "slot": "Attack", "group": "Upper" },
            { "id": "idle", "kind": "play_sequence", "sequence": "Idle" }
        ] }
    }"#;

    fn library() -> SequenceLibrary {
        let mut lib = SequenceLibrary::new();
        lib.insert(AnimSequence::new("Idle", 1.0, 10.0));
        lib.insert(AnimSequence::new("Swing", 0.5, 10.0));
        lib.insert(AnimSequence::new("Kick", 0.5, 10.0));
        lib
    }

    #[test]
    fn time_dilation_is_undone_only_when_ignored() {
        let frame = FrameInfo::new(0.1, 0).with_time_dilation(0.5);
        assert_eq!(frame.effective_delta(false), 0.1);
        assert_eq!(frame.effective_delta(true), 0.2);
    }

    #[test]
    fn override_replaces_graph_output_until_it_completes() {
        let lib = library();
        let swing = lib.get("Swing").unwrap().clone();
        let mut inst = instance(SLOTTED, &lib);
        let mut logic = NoLogic;

        inst.tick(FrameInfo::new(0.1, 0), &mut logic);
        assert_eq!(inst.player().current_sequence().map(|s| s.name.as_str()), Some("Idle"));

        assert!(inst.play_animation_override(&swing, "Attack", 1.0, 0.0));
        inst.tick(FrameInfo::new(0.2, 1), &mut logic);
        assert_eq!(inst.player().current_sequence().map(|s| s.name.as_str()), Some("Swing"));
        assert!(inst.animation_override_data_by_slot("Attack").is_none());

        inst.tick(FrameInfo::new(0.4, 2), &mut logic);
        assert!(inst.active_overrides().is_empty());
        assert_eq!(inst.player().current_sequence().map(|s| s.name.as_str()), Some("Idle"));
        assert!(inst.drain_events().iter().any(|e| matches!(
            e,
            AnimEvent::OverrideEnded { slot, completed: true, .. } if slot == "Attack"
        )));
    }

    #[test]
    fn second_override_on_group_interrupts_first() {
        let lib = library();
        let mut inst = instance(SLOTTED, &lib);
        let swing = lib.get("Swing").unwrap().clone();
        let kick = lib.get("Kick").unwrap().clone();

        assert!(!inst.play_animation_override(&swing, "Legs", 1.0, 0.0));
        assert!(inst.play_animation_override(&swing, "Attack", 1.0, 0.0));
        assert!(inst.play_animation_override(&kick, "Attack", 1.0, 9.0));
        assert_eq!(inst.active_overrides().len(), 1);
        assert_eq!(inst.active_overrides()[0].playback_time, 0.5);

        let events = inst.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            AnimEvent::OverrideEnded { completed: false, group, .. } if group == "Upper"
        ));

        inst.stop_all_animation_overrides();
        assert!(inst.active_overrides().is_empty());
        assert_eq!(inst.drain_events().len(), 1);
    }

    #[test]
    fn event_queue_only_holds_the_last_tick() {
        let lib = library();
        let mut inst = instance(SLOTTED, &lib);
        let mut logic = NoLogic;
        for frame in 0..1000u64 {
            inst.tick(FrameInfo::new(0.25, frame), &mut logic);
            assert!(inst.events().len() <= 2, "frame {frame}");
        }
        inst.tick(FrameInfo::new(1.0, 1000), &mut logic);
        assert!(inst.events().iter().any(|e| matches!(
            e,
            AnimEvent::SequenceLooped { sequence } if sequence.name == "Idle"
        )));
    }
}
