//! Identifiers and simple allocators for runtime entities.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of an [`AnimSequence`](crate::sequence::AnimSequence), unique across libraries.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SequenceId(pub u32);

/// Index of a node inside the flat node arena of a compiled blueprint.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

/// Identity of one notify instance: the owning sequence and its position in the notify list.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NotifyKey {
    pub sequence: SequenceId,
    pub index: u32,
}

static NEXT_SEQUENCE: AtomicU32 = AtomicU32::new(0);

impl SequenceId {
    /// Allocate an id no other sequence in this process holds.
    #[inline]
    pub fn fresh() -> Self {
        SequenceId(NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_never_reused() {
        let a = SequenceId::fresh();
        let b = SequenceId::fresh();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn node_id_round_trips_index() {
        assert_eq!(NodeId::from_index(7).index(), 7);
    }
}
