//! Random sequence player.
//!
//! Picks an entry either by weighted roulette over `chance_to_play` or by walking a
//! pre-shuffled order, plays it for a random number of loops at a random play rate, then
//! picks again.

use std::cmp::Ordering;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{AnimGraph, AnimNodeBehavior, NodeEnv, UpdateContext};
use crate::playback::PlaybackData;
use crate::player::TickOptions;
use crate::sequence::AnimSequence;

#[derive(Clone, Debug)]
pub struct RandomEntry {
    pub sequence: Option<Arc<AnimSequence>>,
    pub chance_to_play: f32,
    pub min_loop_count: i32,
    pub max_loop_count: i32,
    pub min_play_rate: f32,
    pub max_play_rate: f32,
}

impl RandomEntry {
    pub fn new(sequence: Arc<AnimSequence>, chance_to_play: f32) -> Self {
        Self {
            sequence: Some(sequence),
            chance_to_play,
            ..Default::default()
        }
    }
}

impl Default for RandomEntry {
    fn default() -> Self {
        Self {
            sequence: None,
            chance_to_play: 1.0,
            min_loop_count: 0,
            max_loop_count: 0,
            min_play_rate: 1.0,
            max_play_rate: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Weighted,
    Shuffle,
}

#[derive(Clone, Debug, Default)]
pub struct RandomPlayerNode {
    pub entries: Vec<RandomEntry>,
    pub mode: SelectionMode,
    pub directional_angle: f32,
    ordered: Vec<usize>,
    aggregated_chance: f32,
    shuffle_cursor: Option<usize>,
    current: Option<usize>,
    remaining_loops: i32,
    play_rate: f32,
    playback_time: f32,
}

impl RandomPlayerNode {
    pub fn new(entries: Vec<RandomEntry>, mode: SelectionMode) -> Self {
        Self {
            entries,
            mode,
            ..Default::default()
        }
    }

    pub fn current_entry(&self) -> Option<usize> {
        self.current
    }

    pub fn remaining_loops(&self) -> i32 {
        self.remaining_loops
    }

    pub fn play_rate(&self) -> f32 {
        self.play_rate
    }

    pub fn playback_time(&self) -> f32 {
        self.playback_time
    }

    /// Order in which entries are walked: shuffled, or by descending chance with ties kept
    /// in authoring order.
    pub fn ordered_entries(&self) -> &[usize] {
        &self.ordered
    }

    pub fn generate_ordered_list(&mut self, rng: &mut StdRng) {
        self.aggregated_chance = self.entries.iter().map(|e| e.chance_to_play).sum();
        self.ordered = (0..self.entries.len()).collect();
        match self.mode {
            SelectionMode::Shuffle => {
                self.ordered.shuffle(rng);
                self.shuffle_cursor = None;
            }
            SelectionMode::Weighted => {
                let entries = &self.entries;
                // Stable sort: equal chances keep their authoring order.
                self.ordered.sort_by(|&a, &b| {
                    entries[b]
                        .chance_to_play
                        .partial_cmp(&entries[a].chance_to_play)
                        .unwrap_or(Ordering::Equal)
                });
            }
        }
    }

    /// Roulette-wheel walk over the ordered list. The first entry whose running sum reaches
    /// `draw` wins; draws past the total select the last entry of the walk.
    pub fn select_weighted(&self, draw: f32) -> Option<usize> {
        let mut running = 0.0;
        for &index in &self.ordered {
            running += self.entries[index].chance_to_play;
            if running >= draw {
                return Some(index);
            }
        }
        self.ordered.last().copied()
    }

    pub fn pick_next_entry(&mut self, rng: &mut StdRng) {
        if self.ordered.is_empty() {
            return;
        }
        let selected = match self.mode {
            SelectionMode::Shuffle => {
                let cursor = self
                    .shuffle_cursor
                    .map_or(0, |c| (c + 1) % self.ordered.len());
                self.shuffle_cursor = Some(cursor);
                Some(self.ordered[cursor])
            }
            SelectionMode::Weighted => {
                let draw = rng.random_range(0.0..=self.aggregated_chance.max(0.0));
                self.select_weighted(draw)
            }
        };
        let Some(index) = selected else {
            return;
        };

        let entry = &self.entries[index];
        let (min_loops, max_loops) = ordered_pair(entry.min_loop_count, entry.max_loop_count);
        let (min_rate, max_rate) = if entry.min_play_rate <= entry.max_play_rate {
            (entry.min_play_rate, entry.max_play_rate)
        } else {
            (entry.max_play_rate, entry.min_play_rate)
        };
        self.remaining_loops = rng.random_range(min_loops..=max_loops);
        let mut play_rate = rng.random_range(min_rate..=max_rate);
        if play_rate == 0.0 {
            play_rate = if max_rate != 0.0 { max_rate } else { min_rate };
        }
        self.play_rate = play_rate;
        self.playback_time = if play_rate < 0.0 {
            entry.sequence.as_ref().map_or(0.0, |s| s.total_duration())
        } else {
            0.0
        };
        self.current = Some(index);
        log::debug!(
            "random player picked entry {index} ({} loops at rate {play_rate})",
            self.remaining_loops
        );
    }
}

fn ordered_pair(a: i32, b: i32) -> (i32, i32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl AnimNodeBehavior for RandomPlayerNode {
    fn on_initialize(&mut self, _graph: &mut AnimGraph, env: &mut NodeEnv<'_>) {
        if self.entries.is_empty() {
            return;
        }
        self.generate_ordered_list(env.rng);
        self.pick_next_entry(env.rng);
    }

    fn on_update(&mut self, _graph: &mut AnimGraph, ctx: &UpdateContext, env: &mut NodeEnv<'_>) {
        let Some(index) = self.current else {
            return;
        };
        let previous_time = self.playback_time;
        env.player.tick_playback(
            self.entries[index].sequence.as_ref(),
            &mut self.playback_time,
            ctx.delta_time * self.play_rate,
            true,
            TickOptions::owned(ctx.weight),
        );

        // At most one loop is counted per update.
        let looped = if self.play_rate > 0.0 {
            previous_time > self.playback_time
        } else if self.play_rate < 0.0 {
            previous_time < self.playback_time
        } else {
            false
        };
        if looped {
            self.remaining_loops -= 1;
            if self.remaining_loops < 0 {
                self.pick_next_entry(env.rng);
            }
        }
    }

    fn on_evaluate(&mut self, _graph: &mut AnimGraph, out: &mut PlaybackData) {
        let Some(sequence) = self
            .current
            .and_then(|i| self.entries[i].sequence.as_ref())
        else {
            return;
        };
        out.set_animation(Arc::clone(sequence), self.playback_time);
        out.directional_angle = self.directional_angle;
    }
}
