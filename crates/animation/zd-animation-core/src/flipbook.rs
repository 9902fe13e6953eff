//! Flipbook asset: a run-length list of sprite key frames played at a fixed rate.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlipbookKeyFrame {
    pub sprite: String,
    /// Number of frames this sprite stays on screen.
    #[serde(default = "default_frame_run")]
    pub frame_run: u32,
}

fn default_frame_run() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flipbook {
    pub name: String,
    #[serde(default = "default_fps")]
    pub frames_per_second: f32,
    #[serde(default)]
    pub key_frames: Vec<FlipbookKeyFrame>,
}

fn default_fps() -> f32 {
    15.0
}

impl Flipbook {
    pub fn new(name: impl Into<String>, frames_per_second: f32) -> Self {
        Self {
            name: name.into(),
            frames_per_second,
            key_frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, sprite: impl Into<String>, frame_run: u32) -> Self {
        self.key_frames.push(FlipbookKeyFrame {
            sprite: sprite.into(),
            frame_run,
        });
        self
    }

    pub fn num_frames(&self) -> u32 {
        self.key_frames.iter().map(|k| k.frame_run).sum()
    }

    pub fn total_duration(&self) -> f32 {
        if self.frames_per_second > 0.0 {
            self.num_frames() as f32 / self.frames_per_second
        } else {
            0.0
        }
    }

    /// Sprite shown at the given playback position, if any.
    pub fn sprite_at_time(&self, time: f32) -> Option<&str> {
        let total = self.num_frames();
        if total == 0 || self.frames_per_second <= 0.0 {
            return None;
        }
        let frame = ((time * self.frames_per_second).floor().max(0.0) as u32).min(total - 1);
        let mut acc = 0;
        for key in &self.key_frames {
            acc += key.frame_run;
            if frame < acc {
                return Some(key.sprite.as_str());
            }
        }
        self.key_frames.last().map(|k| k.sprite.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_frame_runs() {
        let fb = Flipbook::new("walk", 10.0)
            .with_frame("walk_0", 2)
            .with_frame("walk_1", 3);
        assert_eq!(fb.num_frames(), 5);
        assert!((fb.total_duration() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sprite_lookup_follows_runs() {
        let fb = Flipbook::new("walk", 10.0)
            .with_frame("a", 2)
            .with_frame("b", 1);
        assert_eq!(fb.sprite_at_time(0.0), Some("a"));
        assert_eq!(fb.sprite_at_time(0.15), Some("a"));
        assert_eq!(fb.sprite_at_time(0.25), Some("b"));
        assert_eq!(fb.sprite_at_time(5.0), Some("b"));
        assert_eq!(Flipbook::new("empty", 10.0).sprite_at_time(0.0), None);
    }
}
