//! Host logic seam.
//!
//! The runtime never owns gameplay state. Transition rules, state enter/exit events and
//! notify callbacks are resolved by name against an [`AnimLogic`] implementation supplied
//! by the host for every call that may need it.

use serde::{Deserialize, Serialize};

/// Phase reported to the host for duration-based notifies.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NotifyStatePhase {
    Begin,
    Tick(f32),
    End,
}

pub trait AnimLogic {
    /// Called once before the first graph initialization.
    fn on_init(&mut self) {}

    /// Called after the animations of a tick have been processed.
    fn on_tick(&mut self, _delta_time: f32) {}

    /// Evaluate a dynamic transition or conduit rule.
    fn evaluate_rule(&mut self, _function: &str) -> bool {
        false
    }

    /// State enter/exit events.
    fn call_event(&mut self, _event: &str) {}

    /// Single-shot custom notifies.
    fn receive_notify(&mut self, _name: &str) {}

    /// Duration-based notifies.
    fn notify_state_event(&mut self, _name: &str, _phase: NotifyStatePhase) {}

    /// Angle variable read by sequence players bound to it.
    fn directional_angle(&mut self, _variable: &str) -> Option<f32> {
        None
    }
}

/// Logic that answers every rule with `false` and ignores every callback.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoLogic;

impl AnimLogic for NoLogic {}

/// Shorten the borrow of an optional logic reference so it can be handed out repeatedly.
pub(crate) fn reborrow_logic<'a>(
    logic: &'a mut Option<&mut dyn AnimLogic>,
) -> Option<&'a mut dyn AnimLogic> {
    match logic {
        Some(logic) => {
            let logic: &'a mut dyn AnimLogic = &mut **logic;
            Some(logic)
        }
        None => None,
    }
}
