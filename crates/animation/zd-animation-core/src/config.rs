//! Per-instance configuration.

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Runtime switches for one [`AnimInstance`](crate::AnimInstance).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Let a state entered this tick transition again in the same tick. When disabled every
    /// entered state is held for at least one tick.
    pub allow_transitional_states: bool,
    /// Tick with real time: the frame delta is divided by the host time dilation.
    pub ignore_time_dilation: bool,
    /// Force sequence-changed events on or off. `None` derives it from the render backend
    /// (fired when the backend cannot blend).
    pub fire_sequence_changed_events: Option<bool>,
    pub preview: bool,
    /// Seed for random player draws. `None` seeds from OS entropy.
    pub random_seed: Option<u64>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            allow_transitional_states: true,
            ignore_time_dilation: false,
            fire_sequence_changed_events: None,
            preview: false,
            random_seed: None,
        }
    }
}

impl InstanceConfig {
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg = InstanceConfig::from_json(r#"{ "random_seed": 9 }"#).unwrap();
        assert!(cfg.allow_transitional_states);
        assert_eq!(cfg.random_seed, Some(9));
        assert_eq!(cfg.fire_sequence_changed_events, None);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            InstanceConfig::from_json("{ nope"),
            Err(LoadError::Json(_))
        ));
    }
}
