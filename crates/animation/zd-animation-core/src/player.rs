//! AnimPlayer: sequence ticking, render hand-off and deferred notify dispatch.
//!
//! Nodes call [`AnimPlayer::tick_playback`] while the graph updates. This advances their
//! playback markers, queues the notifies of relevant sequences and records completion/loop
//! events. [`AnimPlayer::play`] then pushes the evaluated [`PlaybackData`] into the render
//! backend and only afterwards flushes the queued notifies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::events::AnimEvent;
use crate::ids::NotifyKey;
use crate::logic::AnimLogic;
use crate::notify::{ActiveNotifies, CollectedNotifies, NotifyTick, NotifyUpdateHandle};
use crate::playback::{same_sequence, PlaybackData, WeightedAnimation};
use crate::render::{PlaybackHandle, RenderComponent};
use crate::sequence::AnimSequence;

/// Weight above which a ticked sequence is considered active enough to fire notifies.
pub const MIN_RELEVANT_WEIGHT: f32 = 0.35;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    #[default]
    Forward,
    Reversed,
}

/// Per-call options of [`AnimPlayer::tick_playback`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TickOptions {
    /// Tick issued by an anim instance; its logic receives the notify callbacks.
    pub owned: bool,
    pub weight: f32,
    pub skip_notifies: bool,
}

impl Default for TickOptions {
    fn default() -> Self {
        Self {
            owned: false,
            weight: 1.0,
            skip_notifies: false,
        }
    }
}

impl TickOptions {
    pub fn owned(weight: f32) -> Self {
        Self {
            owned: true,
            weight,
            skip_notifies: false,
        }
    }
}

#[inline]
pub fn is_relevant_weight(weight: f32) -> bool {
    weight > MIN_RELEVANT_WEIGHT
}

#[derive(Debug)]
pub struct AnimPlayer {
    handle: Option<Box<dyn PlaybackHandle>>,
    render_component: Option<Box<dyn RenderComponent>>,
    last_playback_data: PlaybackData,
    last_weighted_animation: WeightedAnimation,
    deferred: CollectedNotifies,
    active: ActiveNotifies,
    playing: bool,
    preview: bool,
    pub playback_mode: PlaybackMode,
    /// Raise [`AnimEvent::SequenceChanged`] when the primary sequence changes.
    pub fire_sequence_changed_events: bool,
    events: Vec<AnimEvent>,
}

impl Default for AnimPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimPlayer {
    pub fn new() -> Self {
        Self {
            handle: None,
            render_component: None,
            last_playback_data: PlaybackData::default(),
            last_weighted_animation: WeightedAnimation::default(),
            deferred: CollectedNotifies::default(),
            active: ActiveNotifies::default(),
            playing: true,
            preview: false,
            playback_mode: PlaybackMode::Forward,
            fire_sequence_changed_events: false,
            events: Vec::new(),
        }
    }

    /// Install the backend. Sequence-changed events default to on for non-blending backends.
    pub fn init(&mut self, mut handle: Box<dyn PlaybackHandle>) {
        self.fire_sequence_changed_events = !handle.supports_blending();
        if let Some(component) = self.render_component.as_mut() {
            handle.configure_render_component(component.as_mut(), self.preview);
        }
        self.handle = Some(handle);
    }

    pub fn register_render_component(&mut self, mut component: Box<dyn RenderComponent>) {
        if let Some(handle) = self.handle.as_mut() {
            handle.configure_render_component(component.as_mut(), self.preview);
        }
        self.render_component = Some(component);
    }

    pub fn render_component(&self) -> Option<&dyn RenderComponent> {
        self.render_component.as_deref()
    }

    pub fn render_component_mut(&mut self) -> Option<&mut (dyn RenderComponent + 'static)> {
        self.render_component.as_deref_mut()
    }

    pub fn set_preview(&mut self, preview: bool) {
        self.preview = preview;
    }

    pub fn is_preview(&self) -> bool {
        self.preview
    }

    // --- playback controls ------------------------------------------------

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn resume(&mut self) {
        self.playing = true;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Advance `marker` through `sequence`, queueing notifies and raising completion events.
    pub fn tick_playback(
        &mut self,
        sequence: Option<&Arc<AnimSequence>>,
        marker: &mut f32,
        delta_time: f32,
        looping: bool,
        options: TickOptions,
    ) {
        let Some(sequence) = sequence else {
            return;
        };
        let duration = sequence.total_duration();
        if duration <= 0.0 || !self.playing {
            return;
        }
        if self.render_component.is_none() {
            log::warn!(
                "ticking sequence '{}' without a registered render component",
                sequence.name
            );
        }

        let delta_time = match self.playback_mode {
            PlaybackMode::Forward => delta_time,
            PlaybackMode::Reversed => -delta_time,
        };
        let previous_time = *marker;
        let mut completed = false;

        if delta_time > 0.0 {
            *marker += delta_time;
            completed = *marker >= duration;
            *marker = if looping {
                *marker % duration
            } else {
                marker.min(duration)
            };
        } else if delta_time < 0.0 {
            *marker += delta_time;
            completed = *marker <= 0.0;
            *marker = if looping && completed {
                duration + *marker
            } else {
                marker.max(0.0)
            };
        }

        if is_relevant_weight(options.weight)
            && !options.skip_notifies
            && self.render_component.is_some()
        {
            self.collect_notifies(sequence, delta_time, *marker, previous_time, options.owned);
        }

        if completed {
            if looping {
                self.events.push(AnimEvent::SequenceLooped {
                    sequence: Arc::clone(sequence),
                });
            } else if *marker != previous_time {
                self.events.push(AnimEvent::SequenceComplete {
                    sequence: Arc::clone(sequence),
                });
            }
        }
    }

    fn collect_notifies(
        &mut self,
        sequence: &AnimSequence,
        delta_time: f32,
        current_time: f32,
        previous_time: f32,
        owned: bool,
    ) {
        for (index, instance) in sequence.notifies().iter().enumerate() {
            self.deferred.push(NotifyUpdateHandle {
                key: NotifyKey {
                    sequence: sequence.id(),
                    index: index as u32,
                },
                notify: Arc::clone(&instance.notify),
                tick: NotifyTick {
                    delta_time,
                    current_time,
                    previous_time,
                },
                owned,
            });
        }
    }

    /// Notifies queued since the last flush.
    pub fn pending_notifies(&self) -> &CollectedNotifies {
        &self.deferred
    }

    pub fn active_notifies(&self) -> &ActiveNotifies {
        &self.active
    }

    /// Render the given data, then flush the notifies collected while producing it.
    pub fn play(&mut self, playback_data: &PlaybackData, owner: Option<&mut dyn AnimLogic>) {
        if !playback_data.is_empty() {
            if let (Some(handle), Some(component)) =
                (self.handle.as_mut(), self.render_component.as_mut())
            {
                handle.update_render_playback(component.as_mut(), playback_data, self.preview);

                let previous = self.last_weighted_animation.sequence.clone();
                self.last_playback_data = playback_data.clone();
                if let Some(primary) = playback_data.primary() {
                    self.last_weighted_animation = primary.clone();
                }
                self.raise_sequence_changed(previous);
            }
        }
        self.flush_deferred(owner);
    }

    /// Render one sequence at the given time, bypassing the graph.
    pub fn play_single_animation(
        &mut self,
        sequence: &Arc<AnimSequence>,
        playback_time: f32,
        owner: Option<&mut dyn AnimLogic>,
    ) {
        if let (Some(handle), Some(component)) =
            (self.handle.as_mut(), self.render_component.as_mut())
        {
            let previous = self.last_weighted_animation.sequence.clone();
            self.last_playback_data
                .set_animation(Arc::clone(sequence), playback_time);
            self.last_weighted_animation = self.last_playback_data.weighted_animations[0].clone();
            handle.update_render_playback(
                component.as_mut(),
                &self.last_playback_data,
                self.preview,
            );
            self.raise_sequence_changed(previous);
        }
        self.flush_deferred(owner);
    }

    fn raise_sequence_changed(&mut self, previous: Option<Arc<AnimSequence>>) {
        let current = &self.last_weighted_animation.sequence;
        if self.fire_sequence_changed_events && !same_sequence(current.as_ref(), previous.as_ref())
        {
            self.events.push(AnimEvent::SequenceChanged {
                from: previous,
                to: current.clone(),
                progress: self.playback_progress(),
            });
        }
    }

    fn flush_deferred(&mut self, owner: Option<&mut dyn AnimLogic>) {
        let collected = std::mem::take(&mut self.deferred);
        collected.flush_after_render(&mut self.active, self.render_component.as_deref(), owner);
    }

    // --- queries ------------------------------------------------------------

    pub fn last_playback_data(&self) -> &PlaybackData {
        &self.last_playback_data
    }

    pub fn current_playback_time(&self) -> f32 {
        self.last_weighted_animation.playback_time
    }

    pub fn playback_progress(&self) -> f32 {
        match self.last_weighted_animation.sequence.as_ref() {
            Some(seq) if seq.total_duration() > 0.0 => {
                self.last_weighted_animation.playback_time / seq.total_duration()
            }
            _ => 0.0,
        }
    }

    pub fn current_sequence(&self) -> Option<&Arc<AnimSequence>> {
        self.last_weighted_animation.sequence.as_ref()
    }

    pub fn clear_cached_animation_data(&mut self) {
        self.last_playback_data = PlaybackData::default();
        self.last_weighted_animation = WeightedAnimation::default();
    }

    // --- events -------------------------------------------------------------

    pub fn events(&self) -> &[AnimEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<AnimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn push_event(&mut self, event: AnimEvent) {
        self.events.push(event);
    }
}
