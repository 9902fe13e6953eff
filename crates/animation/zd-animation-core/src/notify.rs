//! Anim notifies and their deferred, post-render dispatch.
//!
//! Ticking a sequence only *collects* the notifies that should be processed into a
//! [`CollectedNotifies`] queue. The queue is consumed by
//! [`CollectedNotifies::flush_after_render`] once the render backend has been updated, which
//! ticks every queued notify and reports the ones that were active last frame but were not
//! queued this frame as aborted.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::ids::NotifyKey;
use crate::logic::{reborrow_logic, AnimLogic, NotifyStatePhase};
use crate::render::RenderComponent;

/// Shortest duration a notify state can have.
pub const MIN_NOTIFY_STATE_DURATION: f32 = 1.0 / 30.0;

/// Timing information handed to a notify when it is ticked.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct NotifyTick {
    /// Signed delta, negative while playing backwards.
    pub delta_time: f32,
    pub current_time: f32,
    pub previous_time: f32,
}

/// An object living on a sequence notify track.
pub trait AnimNotify: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Position of the notify on the sequence timeline.
    fn time(&self) -> f32;

    /// Process one playback step. `persistent_active` carries whether the notify was active
    /// last frame; set it to request being considered active on the next flush.
    fn tick(
        &self,
        tick: &NotifyTick,
        render_component: Option<&dyn RenderComponent>,
        persistent_active: &mut bool,
        owner: Option<&mut dyn AnimLogic>,
    );

    /// Called when a notify active last frame was not processed this frame.
    fn on_aborted(&self, _owner: Option<&mut dyn AnimLogic>) {}
}

/// True if `time` was crossed while moving the playhead from `previous` to `current`.
/// Handles a single wrap in either direction.
pub fn notify_in_window(time: f32, previous: f32, current: f32, delta_time: f32) -> bool {
    if delta_time > 0.0 {
        if current >= previous {
            time > previous && time <= current
        } else {
            time > previous || time <= current
        }
    } else if delta_time < 0.0 {
        if current <= previous {
            time < previous && time >= current
        } else {
            time < previous || time >= current
        }
    } else {
        false
    }
}

/// Single-shot notify forwarded by name to the host logic.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomNotify {
    pub name: String,
    pub time: f32,
}

impl CustomNotify {
    pub fn new(name: impl Into<String>, time: f32) -> Self {
        Self {
            name: name.into(),
            time,
        }
    }
}

impl AnimNotify for CustomNotify {
    fn name(&self) -> &str {
        &self.name
    }

    fn time(&self) -> f32 {
        self.time
    }

    fn tick(
        &self,
        tick: &NotifyTick,
        _render_component: Option<&dyn RenderComponent>,
        _persistent_active: &mut bool,
        owner: Option<&mut dyn AnimLogic>,
    ) {
        if notify_in_window(self.time, tick.previous_time, tick.current_time, tick.delta_time) {
            if let Some(owner) = owner {
                owner.receive_notify(&self.name);
            }
        }
    }
}

/// Notify spanning `[time, time + duration]`, reporting begin, tick and end phases.
/// An abort is reported as an end.
#[derive(Clone, Debug, PartialEq)]
pub struct NotifyState {
    pub name: String,
    pub time: f32,
    duration: f32,
}

impl NotifyState {
    pub fn new(name: impl Into<String>, time: f32, duration: f32) -> Self {
        Self {
            name: name.into(),
            time,
            duration: duration.max(MIN_NOTIFY_STATE_DURATION),
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn end_time(&self) -> f32 {
        self.time + self.duration
    }

    fn emit(&self, owner: &mut Option<&mut dyn AnimLogic>, phase: NotifyStatePhase) {
        if let Some(owner) = reborrow_logic(owner) {
            owner.notify_state_event(&self.name, phase);
        }
    }

    fn warn_remainder(&self) {
        log::warn!(
            "notify state '{}' finished tick with remainder time; the sequence looped more than once in one frame",
            self.name
        );
    }
}

impl AnimNotify for NotifyState {
    fn name(&self) -> &str {
        &self.name
    }

    fn time(&self) -> f32 {
        self.time
    }

    fn tick(
        &self,
        tick: &NotifyTick,
        _render_component: Option<&dyn RenderComponent>,
        persistent_active: &mut bool,
        mut owner: Option<&mut dyn AnimLogic>,
    ) {
        let end_time = self.end_time();
        let was_active = *persistent_active;
        let mut remaining = tick.delta_time;
        let forward = tick.delta_time > 0.0;

        if was_active {
            let tick_time = if forward {
                remaining.min(end_time - tick.previous_time)
            } else {
                remaining.max(self.time - tick.previous_time)
            };
            self.emit(&mut owner, NotifyStatePhase::Tick(tick_time));
            remaining -= tick_time;
        }

        let exhausted = if forward {
            remaining <= 0.0
        } else {
            remaining >= 0.0
        };
        if exhausted {
            return;
        }

        if was_active {
            self.emit(&mut owner, NotifyStatePhase::End);
            *persistent_active = false;
        }

        let currently_inside = tick.current_time > self.time && tick.current_time < end_time;
        if currently_inside {
            self.emit(&mut owner, NotifyStatePhase::Begin);
            let tick_time = if forward {
                remaining.min(self.duration)
            } else {
                remaining.max(-self.duration)
            };
            self.emit(&mut owner, NotifyStatePhase::Tick(tick_time));
            remaining -= tick_time;
            *persistent_active = true;

            let leftover = if forward {
                remaining > 0.0
            } else {
                remaining < 0.0
            };
            if leftover {
                self.warn_remainder();
            }
        }
    }

    fn on_aborted(&self, owner: Option<&mut dyn AnimLogic>) {
        if let Some(owner) = owner {
            owner.notify_state_event(&self.name, NotifyStatePhase::End);
        }
    }
}

/// A notify queued for processing after the render pass.
#[derive(Clone, Debug)]
pub struct NotifyUpdateHandle {
    pub key: NotifyKey,
    pub notify: Arc<dyn AnimNotify>,
    pub tick: NotifyTick,
    /// Whether the tick happened on behalf of an anim instance, which receives the callbacks.
    pub owned: bool,
}

/// Notifies collected while updating the graph. Consumed by [`Self::flush_after_render`].
#[derive(Debug, Default)]
#[must_use = "collected notifies only fire once flushed after rendering"]
pub struct CollectedNotifies {
    handles: Vec<NotifyUpdateHandle>,
}

impl CollectedNotifies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: NotifyUpdateHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotifyUpdateHandle> {
        self.handles.iter()
    }

    /// Tick every queued notify and abort the ones that dropped out of the active set.
    pub fn flush_after_render(
        self,
        active: &mut ActiveNotifies,
        render_component: Option<&dyn RenderComponent>,
        mut owner: Option<&mut dyn AnimLogic>,
    ) {
        let mut last_frame = std::mem::take(&mut active.handles);
        for handle in self.handles {
            let mut currently_active = last_frame.remove(&handle.key).is_some();
            let handle_owner = if handle.owned {
                reborrow_logic(&mut owner)
            } else {
                None
            };
            handle.notify.tick(
                &handle.tick,
                render_component,
                &mut currently_active,
                handle_owner,
            );
            if currently_active {
                active.handles.insert(handle.key, handle);
            }
        }

        for (_, handle) in last_frame {
            let handle_owner = if handle.owned {
                reborrow_logic(&mut owner)
            } else {
                None
            };
            handle.notify.on_aborted(handle_owner);
        }
    }
}

/// Notifies that requested persistence on the last flush.
#[derive(Debug, Default)]
pub struct ActiveNotifies {
    handles: HashMap<NotifyKey, NotifyUpdateHandle>,
}

impl ActiveNotifies {
    pub fn contains(&self, key: &NotifyKey) -> bool {
        self.handles.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }
}
