//! Render backend contract.
//!
//! [`PlaybackData`] only becomes visible through a [`PlaybackHandle`], which knows how to
//! push it into a concrete [`RenderComponent`]. The crate ships the flipbook backend;
//! other backends implement the same two traits.

use std::any::Any;
use std::fmt;

use crate::playback::PlaybackData;

pub mod flipbook;

pub use flipbook::{FlipbookComponent, FlipbookPlaybackHandle};

/// Host-side object that displays the animation.
pub trait RenderComponent: fmt::Debug + Send {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Strategy turning playback data into render state.
pub trait PlaybackHandle: fmt::Debug + Send {
    /// Blending backends mix every weighted entry; non-blending ones only show the primary.
    fn supports_blending(&self) -> bool {
        false
    }

    fn configure_render_component(
        &mut self,
        _component: &mut dyn RenderComponent,
        _is_preview: bool,
    ) {
    }

    fn update_render_playback(
        &mut self,
        component: &mut dyn RenderComponent,
        playback_data: &PlaybackData,
        is_preview: bool,
    );
}
