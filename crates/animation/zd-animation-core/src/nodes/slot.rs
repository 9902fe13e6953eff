//! Override slots: named points where imperative playback replaces the graph output.

use hashbrown::HashMap;

use super::{AnimGraph, AnimLink, AnimNodeBehavior, NodeEnv, UpdateContext};
use crate::playback::PlaybackData;

/// Override payloads keyed by slot name, rebuilt by the instance every tick.
#[derive(Clone, Debug, Default)]
pub struct SlotOverrides {
    data: HashMap<String, PlaybackData>,
}

impl SlotOverrides {
    pub fn get(&self, slot: &str) -> Option<&PlaybackData> {
        self.data.get(slot)
    }

    /// Store the payload for `slot`, replacing any previous one.
    pub fn set(&mut self, slot: impl Into<String>, data: PlaybackData) {
        self.data.insert(slot.into(), data);
    }

    pub fn remove(&mut self, slot: &str) -> Option<PlaybackData> {
        self.data.remove(slot)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct OverrideSlotNode {
    pub input: AnimLink,
    pub slot_name: String,
    pub group_name: String,
    is_overriding: bool,
    override_data: PlaybackData,
}

impl OverrideSlotNode {
    pub fn new(
        input: AnimLink,
        slot_name: impl Into<String>,
        group_name: impl Into<String>,
    ) -> Self {
        Self {
            input,
            slot_name: slot_name.into(),
            group_name: group_name.into(),
            ..Default::default()
        }
    }

    pub fn is_overriding(&self) -> bool {
        self.is_overriding
    }
}

impl AnimNodeBehavior for OverrideSlotNode {
    fn on_initialize(&mut self, graph: &mut AnimGraph, env: &mut NodeEnv<'_>) {
        self.is_overriding = false;
        self.input.initialize(graph, env);
    }

    fn on_update(&mut self, graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        match env.overrides.get(&self.slot_name) {
            Some(data) => {
                self.override_data.clone_from(data);
                self.is_overriding = true;
                // Keep the wrapped graph advancing without letting it fire notifies.
                self.input.update(graph, &ctx.with_weight(0.0), env);
            }
            None => {
                self.is_overriding = false;
                self.input.update(graph, ctx, env);
            }
        }
    }

    fn on_evaluate(&mut self, graph: &mut AnimGraph, out: &mut PlaybackData) {
        if self.is_overriding {
            out.clone_from(&self.override_data);
        } else {
            self.input.evaluate(graph, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::library::SequenceLibrary;
    use crate::nodes::test_support::EnvParts;
    use crate::nodes::AnimNode;
    use crate::playback::same_sequence;
    use crate::sequence::AnimSequence;

    #[derive(Clone, Debug, Default)]
    struct WeightProbe {
        seen: Arc<Mutex<Vec<f32>>>,
    }

    impl AnimNodeBehavior for WeightProbe {
        fn on_initialize(&mut self, _graph: &mut AnimGraph, _env: &mut NodeEnv<'_>) {}

        fn on_update(
            &mut self,
            _graph: &mut AnimGraph,
            ctx: &UpdateContext,
            _env: &mut NodeEnv<'_>,
        ) {
            self.seen.lock().unwrap().push(ctx.weight);
        }

        fn on_evaluate(&mut self, _graph: &mut AnimGraph, out: &mut PlaybackData) {
            out.directional_angle = 7.0;
        }
    }

    #[test]
    fn active_override_suppresses_weight_and_replaces_output() {
        let probe = WeightProbe::default();
        let mut graph = AnimGraph::default();
        let child = graph.push(AnimNode::Custom(Box::new(probe.clone())));
        let slot = graph.push(AnimNode::OverrideSlot(OverrideSlotNode::new(
            AnimLink::to(child),
            "Attack",
            "Upper",
        )));

        let mut lib = SequenceLibrary::new();
        let swing = lib.insert(AnimSequence::new("Swing", 1.0, 12.0));

        let mut parts = EnvParts::new();
        graph.initialize(slot, &mut parts.env());

        let ctx = UpdateContext::new(0.1, 1).with_weight(0.8);
        graph.update(slot, &ctx, &mut parts.env());
        let mut out = PlaybackData::new();
        graph.evaluate(slot, &mut out);
        assert_eq!(out.directional_angle, 7.0);

        parts
            .overrides
            .set("Attack", PlaybackData::single(swing.clone(), 0.3));
        graph.update(slot, &ctx, &mut parts.env());
        let mut out = PlaybackData::new();
        graph.evaluate(slot, &mut out);
        assert_eq!(out.len(), 1);
        assert!(same_sequence(
            out.weighted_animations[0].sequence.as_ref(),
            Some(&swing)
        ));
        assert_eq!(out.directional_angle, 0.0);

        assert_eq!(*probe.seen.lock().unwrap(), vec![0.8, 0.0]);
    }
}
