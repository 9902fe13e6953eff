//! Error types for sequence editing, blueprint compilation and loading.

use thiserror::Error;

/// Errors raised while editing the tracks and notifies of a sequence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("track index {index} out of range (sequence has {count} tracks)")]
    InvalidTrack { index: usize, count: usize },
    #[error("notify index {index} out of range (sequence has {count} notifies)")]
    InvalidNotify { index: usize, count: usize },
    #[error("sequence already has the maximum of {max} tracks")]
    TooManyTracks { max: usize },
}

/// A single diagnostic produced by the blueprint compiler. Any error blocks compilation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("graph '{graph}' has no result sink")]
    MissingSink { graph: String },
    #[error("graph '{graph}' has more than one result sink")]
    DuplicateSink { graph: String },
    #[error("node '{node}' in graph '{graph}' references unknown node '{target}'")]
    UnknownNode {
        graph: String,
        node: String,
        target: String,
    },
    #[error("duplicate node id '{node}' in graph '{graph}'")]
    DuplicateNode { graph: String, node: String },
    #[error("node '{node}' references unknown sequence '{sequence}'")]
    UnknownSequence { node: String, sequence: String },
    #[error("node '{node}' references unknown state machine '{machine}'")]
    UnknownStateMachine { node: String, machine: String },
    #[error("state machine '{machine}' is used by more than one node")]
    StateMachineReused { machine: String },
    #[error("override slot node '{node}' has no slot name")]
    MissingSlotName { node: String },
    #[error("override slot node '{node}' has no group name")]
    MissingGroupName { node: String },
    #[error("slot '{slot}' is registered with groups '{existing}' and '{requested}'")]
    ConflictingSlotGroup {
        slot: String,
        existing: String,
        requested: String,
    },
    #[error("cache node '{node}' has no cache name")]
    MissingCacheName { node: String },
    #[error("duplicate cache name '{name}'")]
    DuplicateCacheName { name: String },
    #[error("node '{node}' uses unknown cached animation '{cache}'")]
    UnknownCache { node: String, cache: String },
    #[error("circular reference through cached animation '{cache}'")]
    CircularReference { cache: String },
    #[error("state machine '{machine}' is reachable from one of its own states")]
    RecursiveStateMachine { machine: String },
    #[error("state machine '{machine}' has no entry node")]
    MissingEntry { machine: String },
    #[error("state machine '{machine}' has more than one entry node")]
    DuplicateEntry { machine: String },
    #[error("entry node of state machine '{machine}' is not connected to a state")]
    UnconnectedEntry { machine: String },
    #[error("state machine '{machine}' has duplicate state '{state}'")]
    DuplicateState { machine: String, state: String },
    #[error("state machine '{machine}' references unknown state '{state}'")]
    UnknownState { machine: String, state: String },
    #[error("state machine '{machine}' has duplicate jump node '{jump}'")]
    DuplicateJump { machine: String, jump: String },
    #[error("transition '{from}' -> '{to}' in state machine '{machine}' produces no result")]
    TransitionWithoutResult {
        machine: String,
        from: String,
        to: String,
    },
    #[error("conduit '{conduit}' in state machine '{machine}' produces no result")]
    ConduitWithoutResult { machine: String, conduit: String },
}

/// Every diagnostic from a failed compilation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("anim blueprint '{blueprint}' failed to compile with {} error(s)", errors.len())]
pub struct CompileFailure {
    pub blueprint: String,
    pub errors: Vec<CompileError>,
}

impl CompileFailure {
    pub fn contains(&self, predicate: impl Fn(&CompileError) -> bool) -> bool {
        self.errors.iter().any(predicate)
    }
}

/// Errors produced while loading authored JSON.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate sequence name '{0}'")]
    DuplicateSequence(String),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Compile(#[from] CompileFailure),
}
