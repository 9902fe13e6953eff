//! Animation sequence asset: duration/frame math, directional data and notify tracks.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SequenceError;
use crate::flipbook::Flipbook;
use crate::ids::SequenceId;
use crate::notify::AnimNotify;

/// Frame rate reported by sequences that do not carry their own.
pub const DEFAULT_FRAMES_PER_SECOND: f32 = 24.0;

/// Hard cap on notify tracks per sequence.
pub const MAX_NUM_TRACKS: usize = 10;

pub const DEFAULT_CATEGORY: &str = "Default";

/// Renderer payload stored per directional entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum AnimData {
    #[default]
    Empty,
    Flipbook(Arc<Flipbook>),
    /// Opaque payload for backends this crate does not ship.
    Custom(serde_json::Value),
}

impl AnimData {
    pub fn is_set(&self) -> bool {
        !matches!(self, AnimData::Empty)
    }

    pub fn as_flipbook(&self) -> Option<&Arc<Flipbook>> {
        match self {
            AnimData::Flipbook(fb) => Some(fb),
            _ => None,
        }
    }
}

/// Display-only metadata of a notify track.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimTrackMetadata {
    pub display_name: String,
    #[serde(default)]
    pub color: Option<[f32; 4]>,
}

/// A notify placed on a track of a sequence.
#[derive(Clone)]
pub struct NotifyInstance {
    pub track_index: usize,
    pub notify: Arc<dyn AnimNotify>,
}

impl fmt::Debug for NotifyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyInstance")
            .field("track_index", &self.track_index)
            .field("name", &self.notify.name())
            .field("time", &self.notify.time())
            .finish()
    }
}

/// Track view: metadata plus the notifies living on it.
#[derive(Debug)]
pub struct AnimTrack<'a> {
    pub metadata: &'a AnimTrackMetadata,
    pub notifies: Vec<&'a NotifyInstance>,
}

#[derive(Clone, Debug)]
pub struct AnimSequence {
    id: SequenceId,
    pub name: String,
    pub category: String,
    duration: f32,
    frames_per_second: f32,
    directional: bool,
    pub directional_angle_offset: f32,
    /// Entry used by preview players instead of the angle math.
    pub directional_preview_index: Option<usize>,
    anim_data: Vec<AnimData>,
    notifies: Vec<NotifyInstance>,
    tracks: Vec<AnimTrackMetadata>,
}

impl PartialEq for AnimSequence {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl AnimSequence {
    /// Create a non-directional sequence with an empty data entry and one track.
    pub fn new(name: impl Into<String>, duration: f32, frames_per_second: f32) -> Self {
        let mut seq = Self {
            id: SequenceId::fresh(),
            name: name.into(),
            category: DEFAULT_CATEGORY.to_string(),
            duration: duration.max(0.0),
            frames_per_second,
            directional: false,
            directional_angle_offset: 0.0,
            directional_preview_index: None,
            anim_data: vec![AnimData::Empty],
            notifies: Vec::new(),
            tracks: Vec::new(),
        };
        seq.init_tracks();
        seq
    }

    /// Sequence whose timing comes from the given flipbook.
    pub fn from_flipbook(name: impl Into<String>, flipbook: Flipbook) -> Self {
        let mut seq = Self::new(name, flipbook.total_duration(), flipbook.frames_per_second);
        seq.anim_data = vec![AnimData::Flipbook(Arc::new(flipbook))];
        seq
    }

    pub(crate) fn set_id(&mut self, id: SequenceId) {
        self.id = id;
    }

    #[inline]
    pub fn id(&self) -> SequenceId {
        self.id
    }

    #[inline]
    pub fn total_duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    pub fn frames_per_second(&self) -> f32 {
        if self.frames_per_second > 0.0 {
            self.frames_per_second
        } else {
            DEFAULT_FRAMES_PER_SECOND
        }
    }

    pub fn number_of_frames(&self) -> i32 {
        (self.frames_per_second() * self.total_duration()).ceil() as i32
    }

    pub fn frame_at_time(&self, time: f32) -> i32 {
        let num_frames = self.number_of_frames();
        let frame = if num_frames > 0 {
            (time * self.frames_per_second()).round() as i32
        } else {
            0
        };
        frame.clamp(0, num_frames.max(0))
    }

    pub fn time_at_frame(&self, frame: i32) -> f32 {
        let time = if self.number_of_frames() > 0 {
            frame as f32 / self.frames_per_second()
        } else {
            0.0
        };
        time.clamp(0.0, self.total_duration())
    }

    // --- directional data -------------------------------------------------

    #[inline]
    pub fn is_directional(&self) -> bool {
        self.directional
    }

    /// Replace the directional entries. An empty list resets to one empty,
    /// non-directional entry; more than one entry makes the sequence directional.
    pub fn set_directional_data(&mut self, data: Vec<AnimData>) {
        if data.is_empty() {
            self.anim_data = vec![AnimData::Empty];
            self.directional = false;
        } else {
            self.directional = data.len() > 1;
            self.anim_data = data;
        }
    }

    pub fn set_directional(&mut self, directional: bool) {
        self.directional = directional;
    }

    pub fn num_directional_entries(&self) -> usize {
        self.anim_data.len()
    }

    pub fn animation_data_by_index(&self, directional_index: usize) -> Option<&AnimData> {
        let index = if self.directional { directional_index } else { 0 };
        self.anim_data.get(index)
    }

    /// Index of the entry resolved for the given angle (nearest sector, no interpolation).
    pub fn directional_index(&self, directional_angle: f32) -> usize {
        if !self.directional || self.anim_data.is_empty() {
            return 0;
        }
        let num = self.anim_data.len() as i64;
        let separation = 360.0 / num as f32;
        let area = ((directional_angle + self.directional_angle_offset + separation / 2.0 + 360.0)
            / separation)
            .floor() as i64;
        area.rem_euclid(num) as usize
    }

    pub fn animation_data(&self, directional_angle: f32, is_preview: bool) -> Option<&AnimData> {
        if is_preview {
            if let Some(index) = self.directional_preview_index {
                return self.animation_data_by_index(index);
            }
        }
        self.animation_data_by_index(self.directional_index(directional_angle))
    }

    // --- notifies and tracks ----------------------------------------------

    pub fn notifies(&self) -> &[NotifyInstance] {
        &self.notifies
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_metadata(&self, index: usize) -> Option<&AnimTrackMetadata> {
        self.tracks.get(index)
    }

    pub fn track_metadata_mut(&mut self, index: usize) -> Option<&mut AnimTrackMetadata> {
        self.tracks.get_mut(index)
    }

    pub fn track(&self, index: usize) -> Option<AnimTrack<'_>> {
        let metadata = self.tracks.get(index)?;
        let notifies = self
            .notifies
            .iter()
            .filter(|n| n.track_index.min(MAX_NUM_TRACKS - 1) == index)
            .collect();
        Some(AnimTrack { metadata, notifies })
    }

    /// Insert a track (or append when `insert_into` is `None`), shifting notifies above it.
    pub fn create_track(&mut self, insert_into: Option<usize>) -> Result<usize, SequenceError> {
        if self.tracks.len() >= MAX_NUM_TRACKS {
            return Err(SequenceError::TooManyTracks {
                max: MAX_NUM_TRACKS,
            });
        }
        let index = match insert_into {
            Some(i) if i <= self.tracks.len() => i,
            Some(i) => {
                return Err(SequenceError::InvalidTrack {
                    index: i,
                    count: self.tracks.len(),
                })
            }
            None => self.tracks.len(),
        };
        self.tracks.insert(
            index,
            AnimTrackMetadata {
                display_name: (self.tracks.len() + 1).to_string(),
                color: None,
            },
        );
        for notify in &mut self.notifies {
            if notify.track_index >= index {
                notify.track_index += 1;
            }
        }
        Ok(index)
    }

    /// Remove a track together with its notifies, collapsing the tracks above it.
    pub fn remove_track(&mut self, index: usize) -> Result<(), SequenceError> {
        self.check_track(index)?;
        self.notifies.retain(|n| n.track_index != index);
        for notify in &mut self.notifies {
            if notify.track_index > index {
                notify.track_index -= 1;
            }
        }
        self.tracks.remove(index);
        Ok(())
    }

    pub fn add_notify_to_track(
        &mut self,
        notify: Arc<dyn AnimNotify>,
        track_index: usize,
    ) -> Result<usize, SequenceError> {
        self.check_track(track_index)?;
        self.notifies.push(NotifyInstance {
            track_index,
            notify,
        });
        Ok(self.notifies.len() - 1)
    }

    pub fn remove_notify(&mut self, notify_index: usize) -> Result<(), SequenceError> {
        self.check_notify(notify_index)?;
        self.notifies.remove(notify_index);
        Ok(())
    }

    pub fn move_notify(
        &mut self,
        notify_index: usize,
        to_track: usize,
    ) -> Result<(), SequenceError> {
        self.check_notify(notify_index)?;
        self.check_track(to_track)?;
        self.notifies[notify_index].track_index = to_track;
        Ok(())
    }

    /// Make sure there is a track for every stored notify (at least one track).
    pub fn init_tracks(&mut self) {
        let required = self
            .notifies
            .iter()
            .map(|n| (n.track_index + 1).min(MAX_NUM_TRACKS))
            .max()
            .unwrap_or(1)
            .max(1);
        while self.tracks.len() < required {
            let display_name = (self.tracks.len() + 1).to_string();
            self.tracks.push(AnimTrackMetadata {
                display_name,
                color: None,
            });
        }
    }

    fn check_track(&self, index: usize) -> Result<(), SequenceError> {
        if index < self.tracks.len() {
            Ok(())
        } else {
            Err(SequenceError::InvalidTrack {
                index,
                count: self.tracks.len(),
            })
        }
    }

    fn check_notify(&self, index: usize) -> Result<(), SequenceError> {
        if index < self.notifies.len() {
            Ok(())
        } else {
            Err(SequenceError::InvalidNotify {
                index,
                count: self.notifies.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::CustomNotify;

    fn directional(n: usize) -> AnimSequence {
        let mut seq = AnimSequence::new("Walk", 1.0, 12.0);
        let data = (0..n)
            .map(|i| AnimData::Custom(serde_json::json!(i)))
            .collect();
        seq.set_directional_data(data);
        seq
    }

    #[test]
    fn non_directional_always_returns_first_entry() {
        let seq = AnimSequence::new("Idle", 1.0, 12.0);
        assert_eq!(seq.directional_index(123.0), 0);
        assert_eq!(seq.animation_data(270.0, false), Some(&AnimData::Empty));
    }

    #[test]
    fn directional_angles_resolve_to_nearest_sector() {
        let seq = directional(4);
        assert_eq!(seq.directional_index(44.0), 0);
        assert_eq!(seq.directional_index(46.0), 1);
        assert_eq!(seq.directional_index(359.0), 0);
        assert_eq!(seq.directional_index(-46.0), 3);
        assert_eq!(seq.directional_index(-800.0), 3);
    }

    #[test]
    fn directional_offset_shifts_sectors() {
        let mut seq = directional(4);
        seq.directional_angle_offset = 90.0;
        assert_eq!(seq.directional_index(0.0), 1);
    }

    #[test]
    fn preview_index_bypasses_angle() {
        let mut seq = directional(4);
        seq.directional_preview_index = Some(2);
        assert_eq!(
            seq.animation_data(0.0, true),
            Some(&AnimData::Custom(serde_json::json!(2)))
        );
        assert_eq!(
            seq.animation_data(0.0, false),
            Some(&AnimData::Custom(serde_json::json!(0)))
        );
    }

    #[test]
    fn empty_directional_data_resets_to_single_entry() {
        let mut seq = directional(4);
        seq.set_directional_data(Vec::new());
        assert!(!seq.is_directional());
        assert_eq!(seq.num_directional_entries(), 1);
    }

    #[test]
    fn frame_math_basics() {
        let seq = AnimSequence::new("Attack", 2.0, 24.0);
        assert_eq!(seq.number_of_frames(), 48);
        assert_eq!(seq.frame_at_time(-1.0), 0);
        assert_eq!(seq.frame_at_time(10.0), 48);
        assert_eq!(seq.time_at_frame(100), 2.0);
        assert_eq!(seq.time_at_frame(-3), 0.0);
    }

    #[test]
    fn zero_duration_frame_math_is_degenerate() {
        let seq = AnimSequence::new("Empty", 0.0, 24.0);
        assert_eq!(seq.number_of_frames(), 0);
        assert_eq!(seq.frame_at_time(1.0), 0);
        assert_eq!(seq.time_at_frame(5), 0.0);
    }

    #[test]
    fn track_editing_shifts_notifies() {
        let mut seq = AnimSequence::new("Attack", 1.0, 12.0);
        assert_eq!(seq.num_tracks(), 1);
        seq.add_notify_to_track(Arc::new(CustomNotify::new("Hit", 0.5)), 0)
            .unwrap();
        let inserted = seq.create_track(Some(0)).unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(seq.notifies()[0].track_index, 1);
        assert_eq!(seq.track(1).unwrap().notifies.len(), 1);

        seq.remove_track(0).unwrap();
        assert_eq!(seq.notifies()[0].track_index, 0);

        seq.create_track(None).unwrap();
        seq.move_notify(0, 1).unwrap();
        seq.remove_track(1).unwrap();
        assert!(seq.notifies().is_empty());
    }

    #[test]
    fn track_editing_rejects_bad_indices() {
        let mut seq = AnimSequence::new("Attack", 1.0, 12.0);
        let err = seq
            .add_notify_to_track(Arc::new(CustomNotify::new("Hit", 0.5)), 3)
            .unwrap_err();
        assert_eq!(err, SequenceError::InvalidTrack { index: 3, count: 1 });
        assert!(seq.remove_notify(0).is_err());
        for _ in 1..MAX_NUM_TRACKS {
            seq.create_track(None).unwrap();
        }
        assert!(matches!(
            seq.create_track(None),
            Err(SequenceError::TooManyTracks { .. })
        ));
    }
}
