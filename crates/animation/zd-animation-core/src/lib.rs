//! ZD Animation Core (engine-agnostic 2D sprite animation runtime)
//!
//! Authored blueprints are compiled into an [`AnimBlueprintClass`]: a flat arena of anim
//! nodes plus state machine tables. Each [`AnimInstance`] owns a copy of that arena and,
//! once per frame, updates it, evaluates it into [`PlaybackData`] and hands the result to an
//! [`AnimPlayer`], which renders it through a pluggable [`PlaybackHandle`] and dispatches
//! sequence notifies after rendering.

pub mod class;
pub mod compiler;
pub mod config;
pub mod error;
pub mod events;
pub mod flipbook;
pub mod ids;
pub mod instance;
pub mod library;
pub mod logic;
pub mod machine;
pub mod nodes;
pub mod notify;
pub mod playback;
pub mod player;
pub mod render;
pub mod sequence;

// Re-exports for hosts and render backends
pub use class::{AnimBlueprintClass, OverrideSlotDescriptor};
pub use compiler::{compile, AnimBlueprintSpec};
pub use config::InstanceConfig;
pub use error::{CompileError, CompileFailure, LoadError, SequenceError};
pub use events::AnimEvent;
pub use flipbook::Flipbook;
pub use ids::{NodeId, NotifyKey, SequenceId};
pub use instance::{AnimInstance, AnimationOverride, FrameInfo};
pub use library::SequenceLibrary;
pub use logic::{AnimLogic, NoLogic, NotifyStatePhase};
pub use machine::{StateMachineData, StateMachineLink, TransitionRule};
pub use nodes::{
    AnimGraph, AnimLink, AnimNode, AnimNodeBehavior, CustomAnimNode, NodeEnv, UpdateContext,
};
pub use notify::{ActiveNotifies, AnimNotify, CollectedNotifies, CustomNotify, NotifyState};
pub use playback::{PlaybackData, WeightedAnimation};
pub use player::{AnimPlayer, PlaybackMode, TickOptions};
pub use render::{FlipbookComponent, FlipbookPlaybackHandle, PlaybackHandle, RenderComponent};
pub use sequence::{AnimData, AnimSequence};
