//! Semantic events raised while ticking an anim instance.
//!
//! Events are queued on the player (or instance) in the order they happen and drained by
//! the host after the tick.

use std::sync::Arc;

use crate::sequence::AnimSequence;

#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum AnimEvent {
    /// Primary sequence differs from the one played last call.
    SequenceChanged {
        from: Option<Arc<AnimSequence>>,
        to: Option<Arc<AnimSequence>>,
        /// Playback progress of `to` in `[0, 1]`.
        progress: f32,
    },
    /// Non-looping sequence reached its end this tick.
    SequenceComplete { sequence: Arc<AnimSequence> },
    SequenceLooped { sequence: Arc<AnimSequence> },
    /// An animation override stopped playing; `completed` is false when it was interrupted.
    OverrideEnded {
        slot: String,
        group: String,
        completed: bool,
    },
}

impl AnimEvent {
    /// Sequence completion raised for exactly this sequence.
    pub fn is_complete_of(&self, sequence: &AnimSequence) -> bool {
        matches!(self, AnimEvent::SequenceComplete { sequence: s } if s.id() == sequence.id())
    }
}
