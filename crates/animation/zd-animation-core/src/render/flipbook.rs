//! Flipbook sprite backend.

use std::any::Any;
use std::sync::Arc;

use crate::flipbook::Flipbook;
use crate::playback::PlaybackData;
use crate::sequence::AnimData;

use super::{PlaybackHandle, RenderComponent};

/// Minimal flipbook renderer state: which flipbook is shown and at what position.
#[derive(Clone, Debug, Default)]
pub struct FlipbookComponent {
    pub name: String,
    flipbook: Option<Arc<Flipbook>>,
    playback_position: f32,
    looping: bool,
    playing: bool,
}

impl FlipbookComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flipbook: None,
            playback_position: 0.0,
            looping: true,
            playing: true,
        }
    }

    pub fn flipbook(&self) -> Option<&Arc<Flipbook>> {
        self.flipbook.as_ref()
    }

    /// Returns true if the flipbook changed.
    pub fn set_flipbook(&mut self, flipbook: Arc<Flipbook>) -> bool {
        if self
            .flipbook
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &flipbook))
        {
            return false;
        }
        self.flipbook = Some(flipbook);
        self.playback_position = 0.0;
        true
    }

    pub fn playback_position(&self) -> f32 {
        self.playback_position
    }

    pub fn set_playback_position(&mut self, position: f32) {
        self.playback_position = position;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Sprite currently on screen.
    pub fn current_sprite(&self) -> Option<&str> {
        self.flipbook
            .as_ref()
            .and_then(|fb| fb.sprite_at_time(self.playback_position))
    }
}

impl RenderComponent for FlipbookComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Playback handle for flipbook sequences. Shows only the primary animation.
#[derive(Debug, Default)]
pub struct FlipbookPlaybackHandle;

impl FlipbookPlaybackHandle {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackHandle for FlipbookPlaybackHandle {
    fn configure_render_component(
        &mut self,
        component: &mut dyn RenderComponent,
        _is_preview: bool,
    ) {
        match component.as_any_mut().downcast_mut::<FlipbookComponent>() {
            Some(flipbook) => {
                // The player drives the position; the component must not advance on its own.
                flipbook.stop();
                flipbook.set_looping(false);
            }
            None => log::warn!(
                "flipbook playback handle cannot configure render component '{}'",
                component.name()
            ),
        }
    }

    fn update_render_playback(
        &mut self,
        component: &mut dyn RenderComponent,
        playback_data: &PlaybackData,
        is_preview: bool,
    ) {
        let name = component.name().to_string();
        let Some(flipbook_component) = component.as_any_mut().downcast_mut::<FlipbookComponent>()
        else {
            log::warn!("flipbook playback handle cannot render into '{name}'");
            return;
        };
        let Some(primary) = playback_data.primary() else {
            return;
        };
        let Some(sequence) = primary.sequence.as_ref() else {
            return;
        };
        if let Some(AnimData::Flipbook(flipbook)) =
            sequence.animation_data(playback_data.directional_angle, is_preview)
        {
            flipbook_component.set_flipbook(Arc::clone(flipbook));
            flipbook_component.set_playback_position(primary.playback_time);
        }
    }
}
