//! Controller integration tests
//!
//! Exercise the controller against the scripted engine: lifecycle ordering,
//! seek/pause/stop interplay, looping, and event delivery.

mod helpers;

use helpers::{assert_no_event, next_event, rig};
use pipewright_player::engine::scripted::TransitionMode;
use pipewright_player::engine::{EngineState, NANOS_PER_MSEC};
use pipewright_player::source::PullData;
use pipewright_player::{Error, PlayerEvent};
use std::io::Write;
use std::os::fd::OwnedFd;

#[test]
fn prepare_then_start_reports_playing() {
    let (controller, engine, rx) = rig(TransitionMode::Announced);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    assert_eq!(engine.uri().as_deref(), Some("file:///media/test-clip.mp4"));

    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    assert!(!controller.is_playing());

    controller.start().unwrap();
    assert!(controller.is_playing());
    assert_eq!(engine.current_state(), EngineState::Playing);
}

#[test]
fn async_prepare_completes_via_bus() {
    let (controller, _engine, rx) = rig(TransitionMode::Announced);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare_async().unwrap();

    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    assert_no_event(&rx);
}

#[test]
fn exact_end_seek_is_decremented() {
    let (controller, engine, _rx) = rig(TransitionMode::Immediate);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    engine.set_duration_ms(60_000);
    controller.prepare().unwrap();

    controller.seek_to(60_000).unwrap();
    controller.seek_to(59_999).unwrap();

    // Both land on the same engine-unit position
    assert_eq!(
        engine.seeks(),
        vec![59_999 * NANOS_PER_MSEC, 59_999 * NANOS_PER_MSEC]
    );
}

#[test]
fn seek_while_playing_still_reports_playing() {
    let (controller, engine, rx) = rig(TransitionMode::Manual);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    controller.start().unwrap();

    controller.seek_to(5_000).unwrap();
    // Mid-flush the pipeline dips out of Playing; the in-flight seek's
    // restore target keeps the answer truthful for the client.
    engine.force_state(EngineState::Paused);
    assert!(controller.is_playing());
}

#[test]
fn pause_during_seek_retargets_completion() {
    let (controller, engine, rx) = rig(TransitionMode::Manual);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    controller.start().unwrap();

    controller.seek_to(5_000).unwrap();
    controller.pause().unwrap();

    // The engine settles at Paused once the flush finishes; only then does
    // the seek resolve — and exactly once.
    engine.post_state_changed(EngineState::Playing, EngineState::Paused, None);
    assert_eq!(next_event(&rx), PlayerEvent::SeekComplete);
    assert_no_event(&rx);
    assert!(!controller.is_playing());
}

#[test]
fn stop_during_seek_emits_single_completion() {
    let (controller, engine, rx) = rig(TransitionMode::Manual);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    controller.start().unwrap();

    controller.seek_to(2_000).unwrap();
    controller.stop().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::SeekComplete);

    // The underlying completion message from the flushing seek arrives late
    // and must not produce a second notification.
    engine.post_state_changed(EngineState::Playing, EngineState::Playing, None);
    assert_no_event(&rx);
}

#[test]
fn stop_clears_outstanding_async_prepare() {
    let (controller, engine, rx) = rig(TransitionMode::Manual);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare_async().unwrap();
    controller.stop().unwrap();

    // The Paused report that would have resolved the prepare arrives late.
    engine.post_state_changed(EngineState::Null, EngineState::Paused, None);
    assert_no_event(&rx);
}

#[test]
fn looping_eos_restarts_without_completion_event() {
    let (controller, engine, rx) = rig(TransitionMode::Immediate);

    controller.set_data_source("/media/loop.ogg").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    controller.start().unwrap();
    controller.set_looping(true).unwrap();

    engine.post_eos();
    // The buffering marker is queued behind EOS, so once it surfaces the EOS
    // handler has run.
    engine.post_buffering(50);
    assert_eq!(next_event(&rx), PlayerEvent::BufferingUpdate { percent: 50 });

    assert_no_event(&rx);
    assert_eq!(engine.current_state(), EngineState::Playing);
}

#[test]
fn eos_without_looping_completes_exactly_once() {
    let (controller, engine, rx) = rig(TransitionMode::Immediate);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    controller.start().unwrap();

    engine.post_eos();
    assert_eq!(next_event(&rx), PlayerEvent::PlaybackComplete);
    assert_no_event(&rx);
}

#[test]
fn engine_errors_surface_as_events() {
    let (controller, engine, rx) = rig(TransitionMode::Immediate);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);

    engine.post_error(228, "internal data stream error");
    assert_eq!(next_event(&rx), PlayerEvent::Error { code: 228 });

    // The error does not stop the pipeline on the client's behalf
    assert_eq!(engine.current_state(), EngineState::Paused);
}

#[test]
fn buffering_updates_forwarded() {
    let (controller, engine, rx) = rig(TransitionMode::Immediate);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);

    engine.post_buffering(25);
    engine.post_buffering(100);
    assert_eq!(next_event(&rx), PlayerEvent::BufferingUpdate { percent: 25 });
    assert_eq!(next_event(&rx), PlayerEvent::BufferingUpdate { percent: 100 });
}

#[test]
fn transition_failure_is_synchronous_and_survivable() {
    let (controller, engine, rx) = rig(TransitionMode::Immediate);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    engine.fail_next_transition("missing sink element");

    let err = controller.prepare().unwrap_err();
    assert!(matches!(err, Error::Transition(_)));
    assert_no_event(&rx);

    // The controller survives the failed operation; a retry works.
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
}

#[test]
fn rejected_seek_leaves_no_context_behind() {
    let (controller, engine, rx) = rig(TransitionMode::Manual);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    controller.start().unwrap();

    engine.fail_next_seek("seek not possible in this format");
    assert!(controller.seek_to(3_000).is_err());
    assert!(engine.seeks().is_empty());

    // No dangling seek context: the next settle report resolves nothing.
    engine.post_state_changed(EngineState::Playing, EngineState::Playing, None);
    assert_no_event(&rx);
}

#[test]
fn queries_report_failure_when_unsupported() {
    let (controller, engine, _rx) = rig(TransitionMode::Immediate);

    assert!(matches!(controller.position_ms(), Err(Error::Query(_))));
    assert!(matches!(controller.duration_ms(), Err(Error::Query(_))));

    engine.set_position_ms(1_234);
    engine.set_duration_ms(60_000);
    assert_eq!(controller.position_ms().unwrap(), 1_234);
    assert_eq!(controller.duration_ms().unwrap(), 60_000);
}

#[test]
fn non_local_sources_rejected() {
    let (controller, engine, _rx) = rig(TransitionMode::Immediate);

    for url in ["http://host/clip.mp4", "relative/path.mp4"] {
        assert!(
            matches!(
                controller.set_data_source(url),
                Err(Error::InvalidArgument(_))
            ),
            "{url} should be rejected"
        );
    }
    assert_eq!(engine.uri(), None);
}

#[test]
fn mapped_source_feeds_engine_pulls() {
    let (controller, engine, _rx) = rig(TransitionMode::Immediate);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"stream-payload-bytes").unwrap();
    file.flush().unwrap();
    let fd = OwnedFd::from(file.reopen().unwrap());

    controller.set_data_source_fd(fd, 0, 0).unwrap();
    assert_eq!(engine.uri().as_deref(), Some("mapped://"));

    let source = engine.pull_source().expect("engine should hold the source");
    assert_eq!(source.size(), 20);

    match source.need_data(6) {
        PullData::Buffer(buf) => assert_eq!(buf.as_slice(), b"stream"),
        PullData::Eos => panic!("unexpected EOS"),
    }
    assert!(source.seek_data(7));
    match source.need_data(64) {
        PullData::Buffer(buf) => assert_eq!(buf.as_slice(), b"payload-bytes"),
        PullData::Eos => panic!("unexpected EOS"),
    }
    assert!(matches!(source.need_data(1), PullData::Eos));
}

#[test]
fn reset_behaves_like_stop() {
    let (controller, engine, rx) = rig(TransitionMode::Immediate);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    controller.start().unwrap();

    controller.reset().unwrap();
    assert_eq!(engine.current_state(), EngineState::Ready);
    assert!(!controller.is_playing());
}
