//! Sequence library: owns the loaded sequences and hands out shared references.
//!
//! Inserted sequences get a fresh [`SequenceId`](crate::ids::SequenceId), so a library entry
//! never compares equal to a sequence from another library or to a clone kept outside.
//! Libraries can be authored as JSON:
//!
//! ```json
//! { "sequences": [ {
//!     "name": "Attack",
//!     "flipbooks": [ { "name": "attack", "frames_per_second": 12,
//!                      "key_frames": [ { "sprite": "a0", "frame_run": 6 } ] } ],
//!     "notifies": [ { "kind": "custom", "name": "Hit", "time": 0.25 } ]
//! } ] }
//! ```

use std::sync::Arc;

use hashbrown::HashMap;
use serde::Deserialize;

use crate::error::LoadError;
use crate::flipbook::Flipbook;
use crate::ids::SequenceId;
use crate::notify::{AnimNotify, CustomNotify, NotifyState};
use crate::sequence::{AnimData, AnimSequence, AnimTrackMetadata, DEFAULT_CATEGORY};

#[derive(Debug, Default)]
pub struct SequenceLibrary {
    items: HashMap<String, Arc<AnimSequence>>,
}

impl SequenceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sequence, replacing any sequence with the same name.
    pub fn insert(&mut self, mut sequence: AnimSequence) -> Arc<AnimSequence> {
        sequence.set_id(SequenceId::fresh());
        let sequence = Arc::new(sequence);
        self.items
            .insert(sequence.name.clone(), Arc::clone(&sequence));
        sequence
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AnimSequence>> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AnimSequence>> {
        self.items.values()
    }

    /// Parse a JSON sequence library.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let mut library = Self::new();
        library.load_json(json)?;
        Ok(library)
    }

    /// Add every sequence of a JSON library. Names must be unique within the library.
    pub fn load_json(&mut self, json: &str) -> Result<(), LoadError> {
        let spec: LibrarySpec = serde_json::from_str(json)?;
        for sequence in spec.sequences {
            if self.contains(&sequence.name) {
                return Err(LoadError::DuplicateSequence(sequence.name));
            }
            let sequence = sequence.build()?;
            self.insert(sequence);
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct LibrarySpec {
    #[serde(default)]
    sequences: Vec<SequenceSpec>,
}

#[derive(Deserialize)]
struct SequenceSpec {
    name: String,
    #[serde(default)]
    category: Option<String>,
    /// Defaults to the duration of the first flipbook.
    #[serde(default)]
    duration: Option<f32>,
    #[serde(default)]
    frames_per_second: Option<f32>,
    /// One flipbook per direction.
    #[serde(default)]
    flipbooks: Vec<Flipbook>,
    #[serde(default)]
    directional_angle_offset: f32,
    #[serde(default)]
    directional_preview_index: Option<usize>,
    #[serde(default)]
    tracks: Vec<AnimTrackMetadata>,
    #[serde(default)]
    notifies: Vec<NotifySpec>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum NotifySpec {
    Custom {
        name: String,
        time: f32,
        #[serde(default)]
        track: usize,
    },
    State {
        name: String,
        time: f32,
        #[serde(default)]
        duration: f32,
        #[serde(default)]
        track: usize,
    },
}

impl SequenceSpec {
    fn build(self) -> Result<AnimSequence, LoadError> {
        let first = self.flipbooks.first();
        let duration = self
            .duration
            .or_else(|| first.map(Flipbook::total_duration))
            .unwrap_or(0.0);
        let fps = self
            .frames_per_second
            .or_else(|| first.map(|f| f.frames_per_second))
            .unwrap_or(0.0);

        let mut sequence = AnimSequence::new(self.name, duration, fps);
        sequence.category = self
            .category
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        sequence.directional_angle_offset = self.directional_angle_offset;
        sequence.directional_preview_index = self.directional_preview_index;
        sequence.set_directional_data(
            self.flipbooks
                .into_iter()
                .map(|fb| AnimData::Flipbook(Arc::new(fb)))
                .collect(),
        );

        for (index, metadata) in self.tracks.into_iter().enumerate() {
            if index >= sequence.num_tracks() {
                sequence.create_track(None)?;
            }
            if let Some(slot) = sequence.track_metadata_mut(index) {
                *slot = metadata;
            }
        }

        for notify in self.notifies {
            let (notify, track): (Arc<dyn AnimNotify>, usize) = match notify {
                NotifySpec::Custom { name, time, track } => {
                    (Arc::new(CustomNotify::new(name, time)), track)
                }
                NotifySpec::State {
                    name,
                    time,
                    duration,
                    track,
                } => (Arc::new(NotifyState::new(name, time, duration)), track),
            };
            while track >= sequence.num_tracks() {
                sequence.create_track(None)?;
            }
            sequence.add_notify_to_track(notify, track)?;
        }
        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"{
        "sequences": [
            {
                "name": "Walk",
                "flipbooks": [
                    { "name": "walk_up", "frames_per_second": 10,
                      "key_frames": [ { "sprite": "up0", "frame_run": 5 }, { "sprite": "up1", "frame_run": 5 } ] },
                    { "name": "walk_down", "frames_per_second": 10,
                      "key_frames": [ { "sprite": "down0", "frame_run": 10 } ] }
                ],
                "notifies": [
                    { "kind": "custom", "name": "Step", "time": 0.5 },
                    { "kind": "state", "name": "Dust", "time": 0.1, "duration": 0.2, "track": 1 }
                ]
            },
            { "name": "Idle", "duration": 2.0, "frames_per_second": 8 }
        ]
    }"#;

    #[test]
    fn loads_sequences_from_json() {
        let library = SequenceLibrary::from_json(LIBRARY).unwrap();
        assert_eq!(library.len(), 2);

        let walk = library.get("Walk").unwrap();
        assert!(walk.is_directional());
        assert_eq!(walk.num_directional_entries(), 2);
        assert!((walk.total_duration() - 1.0).abs() < 1e-6);
        assert_eq!(walk.notifies().len(), 2);
        assert_eq!(walk.num_tracks(), 2);
        assert_eq!(walk.notifies()[1].track_index, 1);

        let idle = library.get("Idle").unwrap();
        assert!(!idle.is_directional());
        assert_eq!(idle.number_of_frames(), 16);
        assert_ne!(idle.id(), walk.id());
    }

    #[test]
    fn same_named_sequences_from_two_libraries_are_distinct() {
        let first = SequenceLibrary::from_json(LIBRARY).unwrap();
        let second = SequenceLibrary::from_json(LIBRARY).unwrap();
        let a = first.get("Idle").unwrap();
        let b = second.get("Idle").unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!crate::playback::same_sequence(Some(a), Some(b)));

        let mut third = SequenceLibrary::new();
        let loose = AnimSequence::new("Loose", 1.0, 10.0);
        let inserted = third.insert(loose.clone());
        assert_ne!(loose.id(), inserted.id());
    }

    #[test]
    fn rejects_duplicate_names() {
        let json = r#"{ "sequences": [ { "name": "A", "duration": 1.0 }, { "name": "A", "duration": 1.0 } ] }"#;
        assert!(matches!(
            SequenceLibrary::from_json(json),
            Err(LoadError::DuplicateSequence(name)) if name == "A"
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            SequenceLibrary::from_json("{ \"sequences\": 3 }"),
            Err(LoadError::Json(_))
        ));
    }
}
