//! Teardown-handshake tests
//!
//! The shutdown path must release the controller lock before posting the
//! quit-loop message and joining the bus thread — these tests pin the
//! no-deadlock property and the post-teardown behavior.

mod helpers;

use helpers::{assert_no_event, next_event, rig};
use pipewright_player::engine::scripted::TransitionMode;
use pipewright_player::engine::EngineState;
use pipewright_player::{Error, PlayerEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn teardown_completes_with_bus_thread_running() {
    let (mut controller, engine, rx) = rig(TransitionMode::Announced);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);

    // Run teardown off-thread so a deadlock fails the test instead of
    // hanging it.
    let done = Arc::new(AtomicBool::new(false));
    let done_flag = Arc::clone(&done);
    let handle = thread::spawn(move || {
        controller.teardown();
        done_flag.store(true, Ordering::SeqCst);
        controller
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while !done.load(Ordering::SeqCst) {
        assert!(Instant::now() < deadline, "teardown deadlocked");
        thread::sleep(Duration::from_millis(10));
    }
    let controller = handle.join().unwrap();

    assert_eq!(engine.current_state(), EngineState::Null);
    assert!(!controller.is_playing());
    assert!(matches!(controller.prepare(), Err(Error::NotInitialized)));
    assert!(matches!(
        controller.set_data_source("/media/other.mp4"),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn teardown_is_idempotent_and_drop_safe() {
    let (mut controller, engine, _rx) = rig(TransitionMode::Immediate);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();

    controller.teardown();
    controller.teardown();
    drop(controller);

    assert_eq!(engine.current_state(), EngineState::Null);
}

#[test]
fn drop_runs_the_handshake() {
    let (controller, engine, _rx) = rig(TransitionMode::Announced);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    drop(controller);

    assert_eq!(engine.current_state(), EngineState::Null);
}

#[test]
fn teardown_resets_in_flight_contexts_silently() {
    let (mut controller, engine, rx) = rig(TransitionMode::Manual);

    controller.set_data_source("/media/test-clip.mp4").unwrap();
    controller.prepare().unwrap();
    assert_eq!(next_event(&rx), PlayerEvent::Prepared);
    controller.start().unwrap();
    controller.seek_to(1_000).unwrap();

    // Unlike stop(), teardown owes the client nothing: contexts are reset,
    // not completed.
    controller.teardown();
    assert_no_event(&rx);

    // Messages injected after the loop exited go nowhere.
    engine.post_eos();
    assert_no_event(&rx);
}
