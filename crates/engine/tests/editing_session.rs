use std::time::{Duration, Instant};

use chapter_engine::gaps::{gap_containing, gaps};
use chapter_engine::{
    Command, DragTarget, Edge, Engine, EngineConfig, EngineError, Event, PlaybackAction,
    PlaybackContext, Timeline, TimelineSnapshot,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SECOND: i64 = 1_000_000;

fn loaded_engine(duration_s: i64, now: Instant) -> Engine {
    let mut engine = Engine::new(EngineConfig::default());
    engine
        .handle_command(
            Command::Load {
                duration_tl: duration_s * SECOND,
                chapters: Vec::new(),
            },
            now,
        )
        .expect("load must succeed");
    engine
}

fn last_snapshot(events: &[Event]) -> Option<&TimelineSnapshot> {
    events.iter().rev().find_map(|event| match event {
        Event::TimelineChanged { snapshot, .. } => Some(snapshot),
        _ => None,
    })
}

fn assert_timeline_invariants(timeline: &Timeline) {
    let segments = timeline.segments();
    for segment in segments {
        assert!(segment.start_tl >= 0, "segment starts before zero: {segment:?}");
        assert!(
            segment.end_tl <= timeline.duration_tl(),
            "segment ends after duration: {segment:?}"
        );
        assert!(
            segment.duration_tl() >= timeline.min_segment_tl(),
            "segment shorter than minimum: {segment:?}"
        );
    }
    for pair in segments.windows(2) {
        assert!(
            pair[0].end_tl <= pair[1].start_tl,
            "segments overlap or are unordered: {:?} / {:?}",
            pair[0],
            pair[1]
        );
    }

    let gap_total: i64 = gaps(timeline).iter().map(|gap| gap.duration_tl()).sum();
    assert_eq!(timeline.covered_tl() + gap_total, timeline.duration_tl());
}

#[test]
fn create_in_empty_timeline_uses_requested_length() {
    let now = Instant::now();
    let mut engine = loaded_engine(100, now);

    let events = engine
        .handle_command(
            Command::CreateInGap {
                at_tl: 10 * SECOND,
                length_tl: 15 * SECOND,
                label: None,
            },
            now,
        )
        .expect("create must succeed");

    let snapshot = last_snapshot(&events).expect("timeline event");
    assert_eq!(snapshot.segments.len(), 1);
    assert_eq!(snapshot.segments[0].start_tl, 10 * SECOND);
    assert_eq!(snapshot.segments[0].end_tl, 25 * SECOND);
    assert_eq!(snapshot.segments[0].label, "Chapter 1");
}

#[test]
fn resize_without_nearby_neighbor_is_exact_and_close_neighbor_snaps() {
    let now = Instant::now();
    let mut engine = loaded_engine(100, now);
    for (at_s, length_s) in [(0, 10), (30, 10)] {
        engine
            .handle_command(
                Command::CreateInGap {
                    at_tl: at_s * SECOND,
                    length_tl: length_s * SECOND,
                    label: None,
                },
                now,
            )
            .expect("create must succeed");
    }
    let ids: Vec<_> = engine
        .timeline()
        .expect("timeline")
        .segments()
        .iter()
        .map(|segment| segment.id)
        .collect();

    engine
        .handle_command(
            Command::ResizeEdge {
                segment_id: ids[1],
                edge: Edge::Start,
                to_tl: 24 * SECOND,
            },
            now,
        )
        .expect("resize must succeed");
    assert_eq!(engine.timeline().expect("timeline").segments()[1].start_tl, 24 * SECOND);

    engine
        .handle_command(
            Command::ResizeEdge {
                segment_id: ids[0],
                edge: Edge::End,
                to_tl: 23_800_000,
            },
            now,
        )
        .expect("resize must succeed");
    let segments = engine.timeline().expect("timeline").segments().to_vec();
    assert_eq!(segments[0].end_tl, 24 * SECOND);
    assert_eq!(segments[1].start_tl, 24 * SECOND);
}

#[test]
fn gap_bounds_between_two_segments() {
    let now = Instant::now();
    let mut engine = loaded_engine(30, now);
    for at_s in [0, 20] {
        engine
            .handle_command(
                Command::CreateInGap {
                    at_tl: at_s * SECOND,
                    length_tl: 10 * SECOND,
                    label: None,
                },
                now,
            )
            .expect("create must succeed");
    }

    let bounds = engine.gap_bounds(15 * SECOND).expect("bounds");

    assert_eq!(bounds.lower_bound_tl, 10 * SECOND);
    assert_eq!(bounds.upper_bound_tl, 20 * SECOND);
}

#[test]
fn cutaway_reaching_next_chapter_clamps_exactly_on_boundary() {
    let now = Instant::now();
    let mut engine = loaded_engine(100, now);
    for (at_s, length_s) in [(0, 20), (30, 10)] {
        engine
            .handle_command(
                Command::CreateInGap {
                    at_tl: at_s * SECOND,
                    length_tl: length_s * SECOND,
                    label: None,
                },
                now,
            )
            .expect("create must succeed");
    }
    let next_id = engine.timeline().expect("timeline").segments()[1].id;

    let events = engine
        .handle_command(Command::PlayGap { at_tl: 25 * SECOND }, now)
        .expect("gap preview");
    assert!(matches!(
        events.last(),
        Some(Event::PlaybackContextChanged(PlaybackContext::InVirtualCutaway(_)))
    ));

    let mut actions = Vec::new();
    for t_tl in [21 * SECOND, 27 * SECOND, 29_990_000, 30 * SECOND] {
        let events = engine
            .handle_command(Command::PositionChanged { t_tl }, now)
            .expect("position");
        actions.extend(events.into_iter().filter_map(|event| match event {
            Event::Playback(action) => Some(action),
            _ => None,
        }));
    }

    assert_eq!(
        actions,
        vec![PlaybackAction::Pause, PlaybackAction::Seek { t_tl: 30 * SECOND }]
    );
    assert_eq!(engine.playback_context(), PlaybackContext::InSegment(next_id));
}

#[test]
fn drag_then_quick_click_is_suppressed_and_net_edit_recorded_once() {
    let start = Instant::now();
    let mut engine = loaded_engine(60, start);
    engine
        .handle_command(
            Command::CreateInGap {
                at_tl: 0,
                length_tl: 10 * SECOND,
                label: Some("Intro".to_string()),
            },
            start,
        )
        .expect("create must succeed");
    let requests = engine.poll(start + Duration::from_secs(1));
    assert_eq!(requests.len(), 1);
    let id = engine.timeline().expect("timeline").segments()[0].id;

    let t0 = start + Duration::from_secs(5);
    engine
        .handle_command(
            Command::BeginDrag {
                target: DragTarget::Edge {
                    segment_id: id,
                    edge: Edge::End,
                },
            },
            t0,
        )
        .expect("drag start");
    for (step, to_s) in [12, 14, 18].into_iter().enumerate() {
        engine
            .handle_command(
                Command::DragTo { t_tl: to_s * SECOND },
                t0 + Duration::from_millis(step as u64 * 40),
            )
            .expect("drag move");
    }
    let released_at = t0 + Duration::from_millis(200);
    let events = engine
        .handle_command(Command::EndDrag, released_at)
        .expect("drag end");
    assert!(matches!(
        events.as_slice(),
        [Event::TimelineChanged { record: true, .. }]
    ));

    let click = engine.handle_command(
        Command::Click { at_tl: 5 * SECOND },
        released_at + Duration::from_millis(20),
    );
    assert!(matches!(click, Err(EngineError::InputLocked)));

    let events = engine.poll(released_at + Duration::from_secs(1));
    let [Event::SaveRequested(request)] = events.as_slice() else {
        panic!("exactly one save expected, got {events:?}");
    };
    assert_eq!(request.payload.chapters[0].end_time, "00:00:18.000");
    assert_eq!(request.payload.chapters[0].chapter_title, "Intro");
}

#[test]
fn random_edit_sequences_keep_timeline_valid() {
    let mut rng = StdRng::seed_from_u64(0x5eed_c4a7);
    let start = Instant::now();
    let duration_s = 120;

    for round in 0..20u64 {
        let mut engine = loaded_engine(duration_s, start);
        let mut now = start;

        for _ in 0..200 {
            now += Duration::from_millis(rng.gen_range(0..400));
            let duration_tl = duration_s * SECOND;
            let ids: Vec<_> = engine
                .timeline()
                .expect("timeline")
                .segments()
                .iter()
                .map(|segment| segment.id)
                .collect();
            let random_id = if ids.is_empty() {
                rng.gen_range(1..5)
            } else {
                ids[rng.gen_range(0..ids.len())]
            };
            let edge = if rng.gen_bool(0.5) {
                Edge::Start
            } else {
                Edge::End
            };

            let command = match rng.gen_range(0..7) {
                0 => Command::CreateInGap {
                    at_tl: rng.gen_range(-SECOND..duration_tl + SECOND),
                    length_tl: rng.gen_range(0..30 * SECOND),
                    label: None,
                },
                1 => Command::Click {
                    at_tl: rng.gen_range(0..duration_tl),
                },
                2 => Command::Split {
                    segment_id: random_id,
                    at_tl: rng.gen_range(0..duration_tl),
                },
                3 => Command::ResizeEdge {
                    segment_id: random_id,
                    edge,
                    to_tl: rng.gen_range(-5 * SECOND..duration_tl + 5 * SECOND),
                },
                4 => Command::Delete {
                    segment_id: random_id,
                },
                5 => Command::PlayGap {
                    at_tl: rng.gen_range(0..duration_tl),
                },
                _ => Command::PositionChanged {
                    t_tl: rng.gen_range(0..duration_tl),
                },
            };

            // Rejections are expected; the timeline must stay valid either way.
            let _ = engine.handle_command(command, now);
            let _ = engine.poll(now);
            assert_timeline_invariants(engine.timeline().expect("timeline"));
        }

        let timeline = engine.timeline().expect("timeline");
        let probe = rng.gen_range(0..timeline.duration_tl());
        if timeline.find_segment_index(probe).is_none() {
            let bounds = gap_containing(probe, timeline.segments(), timeline.duration_tl(), 0);
            assert!(
                bounds.lower_bound_tl <= probe && probe <= bounds.upper_bound_tl,
                "round {round}: {bounds:?} does not enclose {probe}"
            );
        }
    }
}

#[test]
fn repeated_snap_is_idempotent() {
    let now = Instant::now();
    let mut engine = loaded_engine(100, now);
    for (at_s, length_s) in [(0, 25), (30, 10)] {
        engine
            .handle_command(
                Command::CreateInGap {
                    at_tl: at_s * SECOND,
                    length_tl: length_s * SECOND,
                    label: None,
                },
                now,
            )
            .expect("create must succeed");
    }
    let id = engine.timeline().expect("timeline").segments()[1].id;
    let resize = Command::ResizeEdge {
        segment_id: id,
        edge: Edge::Start,
        to_tl: 24_900_000,
    };

    engine
        .handle_command(resize.clone(), now)
        .expect("first resize");
    let first = engine.timeline().expect("timeline").clone();
    let events = engine.handle_command(resize, now).expect("second resize");

    assert_eq!(first.segments()[1].start_tl, 25 * SECOND);
    assert!(events.is_empty());
    assert_eq!(engine.timeline(), Some(&first));
}
