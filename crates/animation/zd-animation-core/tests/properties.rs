use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use zd_animation_core::nodes::{CacheAnimationNode, SlotOverrides, UseCachedAnimationNode};
use zd_animation_core::notify::{NotifyTick, NotifyUpdateHandle};
use zd_animation_core::{
    ActiveNotifies, AnimData, AnimEvent, AnimGraph, AnimLink, AnimLogic, AnimNode,
    AnimNodeBehavior, AnimNotify, AnimPlayer, AnimSequence, CollectedNotifies, Flipbook,
    FlipbookComponent, NoLogic, NodeEnv, NotifyKey, PlaybackData, RenderComponent,
    SequenceId, SequenceLibrary, TickOptions, UpdateContext,
};

fn directional(entries: usize) -> AnimSequence {
    let mut seq = AnimSequence::new("Walk", 1.0, 12.0);
    seq.set_directional_data(
        (0..entries)
            .map(|i| AnimData::Flipbook(Arc::new(Flipbook::new(format!("walk_{i}"), 12.0))))
            .collect(),
    );
    seq
}

#[test]
fn directional_buckets_round_to_the_nearest_sector() {
    let seq = directional(4);
    assert_eq!(seq.directional_index(44.0), 0);
    assert_eq!(seq.directional_index(46.0), 1);
    assert_eq!(seq.directional_index(359.0), 0);

    let separation = 90.0_f32;
    for angle in 0..360 {
        let angle = angle as f32;
        let expected = (((angle + separation / 2.0) / separation).floor() as usize) % 4;
        assert_eq!(seq.directional_index(angle), expected, "angle {angle}");
    }
}

#[test]
fn frame_and_time_are_inverse_within_a_frame() {
    let seq = AnimSequence::new("Attack", 2.0, 24.0);
    assert_eq!(seq.number_of_frames(), 48);
    let frame_time = 1.0 / 24.0;
    for step in 0..=200 {
        let t = step as f32 * 0.01;
        let back = seq.time_at_frame(seq.frame_at_time(t));
        assert_abs_diff_eq!(back, t.clamp(0.0, 2.0), epsilon = frame_time);
    }
}

/// Leaf that counts how often it is evaluated.
#[derive(Clone, Debug)]
struct Counting(Arc<AtomicUsize>);

impl AnimNodeBehavior for Counting {
    fn on_initialize(&mut self, _graph: &mut AnimGraph, _env: &mut NodeEnv<'_>) {}

    fn on_update(&mut self, _graph: &mut AnimGraph, _ctx: &UpdateContext, _env: &mut NodeEnv<'_>) {}

    fn on_evaluate(&mut self, _graph: &mut AnimGraph, _out: &mut PlaybackData) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn shared_cache_evaluates_its_input_once_per_frame() {
    let evaluations = Arc::new(AtomicUsize::new(0));
    let mut graph = AnimGraph::default();
    let leaf = graph.push(AnimNode::Custom(Box::new(Counting(evaluations.clone()))));
    let cache = graph.push(AnimNode::CacheAnimation(CacheAnimationNode::new(
        "Base",
        AnimLink::to(leaf),
    )));
    let first = graph.push(AnimNode::UseCachedAnimation(UseCachedAnimationNode::new(cache)));
    let second = graph.push(AnimNode::UseCachedAnimation(UseCachedAnimationNode::new(cache)));

    let mut player = AnimPlayer::new();
    let overrides = SlotOverrides::default();
    let mut logic = NoLogic;
    let mut rng = StdRng::seed_from_u64(0);
    let mut env = NodeEnv {
        player: &mut player,
        overrides: &overrides,
        logic: &mut logic,
        machines: &[],
        rng: &mut rng,
        allow_transitional_states: true,
    };

    for frame in 0..3u64 {
        let ctx = UpdateContext::new(0.1, frame);
        graph.update(first, &ctx, &mut env);
        graph.update(second, &ctx, &mut env);
        let mut out = PlaybackData::new();
        graph.evaluate(first, &mut out);
        graph.evaluate(second, &mut out);
        assert_eq!(evaluations.load(Ordering::SeqCst), frame as usize + 1);
    }
}

#[test]
fn completion_and_looping_are_exclusive() {
    let mut library = SequenceLibrary::new();
    let seq = library.insert(AnimSequence::new("Swing", 1.0, 10.0));
    let mut player = AnimPlayer::new();
    player.register_render_component(Box::new(FlipbookComponent::new("sprite")));

    let mut marker = 0.0;
    for _ in 0..5 {
        player.tick_playback(Some(&seq), &mut marker, 0.6, true, TickOptions::default());
    }
    let events = player.drain_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, AnimEvent::SequenceComplete { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, AnimEvent::SequenceLooped { .. })));

    let mut marker = 0.0;
    for _ in 0..5 {
        player.tick_playback(Some(&seq), &mut marker, 0.6, false, TickOptions::default());
    }
    let completes = player
        .drain_events()
        .iter()
        .filter(|e| e.is_complete_of(&seq))
        .count();
    assert_eq!(completes, 1);
    assert_eq!(marker, 1.0);
}

/// Notify that stays active for as long as it is ticked.
#[derive(Debug)]
struct Sticky {
    aborted: Mutex<usize>,
}

impl AnimNotify for Sticky {
    fn name(&self) -> &str {
        "Sticky"
    }

    fn time(&self) -> f32 {
        0.0
    }

    fn tick(
        &self,
        _tick: &NotifyTick,
        _render_component: Option<&dyn RenderComponent>,
        persistent_active: &mut bool,
        _owner: Option<&mut dyn AnimLogic>,
    ) {
        *persistent_active = true;
    }

    fn on_aborted(&self, _owner: Option<&mut dyn AnimLogic>) {
        *self.aborted.lock().unwrap() += 1;
    }
}

#[test]
fn notify_missing_from_a_frame_is_aborted_exactly_once() {
    let sticky = Arc::new(Sticky {
        aborted: Mutex::new(0),
    });
    let key = NotifyKey {
        sequence: SequenceId(4),
        index: 0,
    };
    let handle = NotifyUpdateHandle {
        key,
        notify: sticky.clone(),
        tick: NotifyTick::default(),
        owned: false,
    };
    let mut active = ActiveNotifies::default();

    let mut frame = CollectedNotifies::new();
    frame.push(handle.clone());
    frame.flush_after_render(&mut active, None, None);
    assert!(active.contains(&key));

    CollectedNotifies::new().flush_after_render(&mut active, None, None);
    assert!(!active.contains(&key));
    CollectedNotifies::new().flush_after_render(&mut active, None, None);
    assert_eq!(*sticky.aborted.lock().unwrap(), 1);
}
