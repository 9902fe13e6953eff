//! Leaf node playing a single sequence.

use std::sync::Arc;

use super::{AnimGraph, AnimNodeBehavior, NodeEnv, UpdateContext};
use crate::playback::PlaybackData;
use crate::player::TickOptions;
use crate::sequence::AnimSequence;

#[derive(Clone, Debug)]
pub struct PlaySequenceNode {
    pub sequence: Option<Arc<AnimSequence>>,
    pub play_rate: f32,
    pub looping: bool,
    pub directional_angle: f32,
    /// Host variable polled every update for the directional angle.
    pub directional_angle_variable: Option<String>,
    playback_time: f32,
}

impl Default for PlaySequenceNode {
    fn default() -> Self {
        Self {
            sequence: None,
            play_rate: 1.0,
            looping: true,
            directional_angle: 0.0,
            directional_angle_variable: None,
            playback_time: 0.0,
        }
    }
}

impl PlaySequenceNode {
    pub fn new(sequence: Arc<AnimSequence>) -> Self {
        Self {
            sequence: Some(sequence),
            ..Default::default()
        }
    }

    pub fn with_play_rate(mut self, play_rate: f32) -> Self {
        self.play_rate = play_rate;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn duration(&self) -> f32 {
        self.sequence
            .as_ref()
            .map_or(0.0, |s| s.total_duration())
    }

    // --- asset player queries ---------------------------------------------

    pub fn anim_length(&self) -> f32 {
        self.duration()
    }

    pub fn anim_time(&self) -> f32 {
        self.playback_time
    }

    pub fn anim_time_fraction(&self) -> f32 {
        let duration = self.duration();
        if duration > 0.0 {
            self.playback_time / duration
        } else {
            0.0
        }
    }

    pub fn anim_time_from_end(&self) -> f32 {
        let duration = self.duration();
        if duration > 0.0 {
            duration - self.playback_time
        } else {
            0.0
        }
    }

    pub fn anim_time_from_end_fraction(&self) -> f32 {
        let duration = self.duration();
        if duration > 0.0 {
            (duration - self.playback_time) / duration
        } else {
            0.0
        }
    }
}

impl AnimNodeBehavior for PlaySequenceNode {
    fn on_initialize(&mut self, _graph: &mut AnimGraph, _env: &mut NodeEnv<'_>) {
        self.playback_time = if self.play_rate < 0.0 {
            self.duration()
        } else {
            0.0
        };
    }

    fn on_update(&mut self, _graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        if let Some(variable) = self.directional_angle_variable.as_deref() {
            if let Some(angle) = env.logic.directional_angle(variable) {
                self.directional_angle = angle;
            }
        }
        env.player.tick_playback(
            self.sequence.as_ref(),
            &mut self.playback_time,
            ctx.delta_time * self.play_rate,
            self.looping,
            TickOptions::owned(ctx.weight),
        );
    }

    fn on_evaluate(&mut self, _graph: &mut AnimGraph, out: &mut PlaybackData) {
        if let Some(sequence) = self.sequence.as_ref() {
            out.set_animation(Arc::clone(sequence), self.playback_time);
            out.directional_angle = self.directional_angle;
        }
    }
}
