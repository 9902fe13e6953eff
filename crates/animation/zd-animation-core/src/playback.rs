//! Playback data passed between animation nodes and handed to render backends.
//!
//! A [`PlaybackData`] is an ordered list of weighted `(sequence, time)` pairs plus the
//! directional angle used to pick an entry of multi-directional sequences. Nodes build
//! it during evaluation; it lives on the call stack for one tick (cache nodes keep a copy).

use std::sync::Arc;

use crate::sequence::AnimSequence;

/// One sequence contribution inside a [`PlaybackData`].
#[derive(Clone, Debug)]
pub struct WeightedAnimation {
    pub sequence: Option<Arc<AnimSequence>>,
    pub playback_time: f32,
    /// Blend weight in `[0, 1]`.
    pub weight: f32,
    pub layer: u32,
    pub layer_weight: f32,
}

impl Default for WeightedAnimation {
    fn default() -> Self {
        Self {
            sequence: None,
            playback_time: 0.0,
            weight: 1.0,
            layer: 0,
            layer_weight: 1.0,
        }
    }
}

impl WeightedAnimation {
    pub fn new(sequence: Arc<AnimSequence>, playback_time: f32, weight: f32) -> Self {
        Self {
            sequence: Some(sequence),
            playback_time,
            weight,
            ..Default::default()
        }
    }

    /// True if both entries reference the same sequence (or both reference none).
    pub fn same_sequence(&self, other: &WeightedAnimation) -> bool {
        same_sequence(self.sequence.as_ref(), other.sequence.as_ref())
    }
}

/// Sequence identity comparison used by the player and tests.
pub fn same_sequence(a: Option<&Arc<AnimSequence>>, b: Option<&Arc<AnimSequence>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.id() == b.id(),
        (None, None) => true,
        _ => false,
    }
}

/// Weighted list of animations produced by the node graph for one tick.
#[derive(Clone, Debug, Default)]
pub struct PlaybackData {
    pub weighted_animations: Vec<WeightedAnimation>,
    /// Angle in degrees used to resolve directional sequences.
    pub directional_angle: f32,
}

impl PlaybackData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor holding exactly one full-weight entry.
    pub fn single(sequence: Arc<AnimSequence>, playback_time: f32) -> Self {
        let mut data = Self::default();
        data.set_animation(sequence, playback_time);
        data
    }

    /// Replace the whole list with exactly one full-weight entry.
    pub fn set_animation(&mut self, sequence: Arc<AnimSequence>, playback_time: f32) {
        self.weighted_animations.clear();
        self.weighted_animations
            .push(WeightedAnimation::new(sequence, playback_time, 1.0));
    }

    /// Append a contribution. Entries with a weight of zero or less are dropped.
    pub fn add_animation(&mut self, sequence: Arc<AnimSequence>, playback_time: f32, weight: f32) {
        if weight > 0.0 {
            self.weighted_animations
                .push(WeightedAnimation::new(sequence, playback_time, weight));
        }
    }

    /// Collapse the list into its highest-weight entry, which becomes full weight.
    /// The first entry wins ties. No-op on an empty list.
    pub fn remove_weights(&mut self) {
        let Some(winner) = self.primary_index() else {
            return;
        };
        let mut entry = self.weighted_animations.swap_remove(winner);
        entry.weight = 1.0;
        self.weighted_animations.clear();
        self.weighted_animations.push(entry);
    }

    /// The highest-weight entry, first one on ties.
    pub fn primary(&self) -> Option<&WeightedAnimation> {
        self.primary_index().map(|i| &self.weighted_animations[i])
    }

    fn primary_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, entry) in self.weighted_animations.iter().enumerate() {
            match best {
                Some(b) if self.weighted_animations[b].weight >= entry.weight => {}
                _ => best = Some(i),
            }
        }
        best
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weighted_animations.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weighted_animations.len()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.weighted_animations.clear();
        self.directional_angle = 0.0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedAnimation> {
        self.weighted_animations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::SequenceLibrary;

    fn library() -> (Arc<AnimSequence>, Arc<AnimSequence>) {
        let mut lib = SequenceLibrary::new();
        let a = lib.insert(AnimSequence::new("Idle", 1.0, 12.0));
        let b = lib.insert(AnimSequence::new("Run", 0.5, 12.0));
        (a, b)
    }

    #[test]
    fn set_animation_replaces_list() {
        let (a, b) = library();
        let mut data = PlaybackData::new();
        data.add_animation(a.clone(), 0.1, 0.5);
        data.add_animation(b.clone(), 0.2, 0.5);
        data.set_animation(b.clone(), 0.3);
        assert_eq!(data.len(), 1);
        let entry = &data.weighted_animations[0];
        assert_eq!(entry.weight, 1.0);
        assert_eq!(entry.playback_time, 0.3);
        assert!(same_sequence(entry.sequence.as_ref(), Some(&b)));
    }

    #[test]
    fn add_animation_drops_non_positive_weights() {
        let (a, b) = library();
        let mut data = PlaybackData::new();
        data.add_animation(a.clone(), 0.0, 0.0);
        data.add_animation(b.clone(), 0.0, -0.2);
        assert!(data.is_empty());
        data.add_animation(a, 0.0, 0.01);
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn add_animation_keeps_duplicates() {
        let (a, _) = library();
        let mut data = PlaybackData::new();
        data.add_animation(a.clone(), 0.0, 0.4);
        data.add_animation(a, 0.0, 0.4);
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn remove_weights_keeps_winner() {
        let (a, b) = library();
        let mut data = PlaybackData::new();
        data.add_animation(a, 0.1, 0.3);
        data.add_animation(b.clone(), 0.2, 0.7);
        data.remove_weights();
        assert_eq!(data.len(), 1);
        let entry = &data.weighted_animations[0];
        assert!(same_sequence(entry.sequence.as_ref(), Some(&b)));
        assert_eq!(entry.playback_time, 0.2);
        assert_eq!(entry.weight, 1.0);
    }

    #[test]
    fn remove_weights_on_empty_list_is_noop() {
        let mut data = PlaybackData::new();
        data.remove_weights();
        assert!(data.is_empty());
    }

    #[test]
    fn primary_prefers_first_on_ties() {
        let (a, b) = library();
        let mut data = PlaybackData::new();
        data.add_animation(a.clone(), 0.0, 0.5);
        data.add_animation(b, 0.0, 0.5);
        assert!(same_sequence(
            data.primary().and_then(|p| p.sequence.as_ref()),
            Some(&a)
        ));
    }
}
