//! Shared fixtures for controller integration tests
#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use pipewright_player::engine::scripted::{ScriptedEngine, TransitionMode};
use pipewright_player::engine::{Engine, EngineInit};
use pipewright_player::{EventSink, PipelineController, PlayerEvent};
use std::sync::Arc;
use std::time::Duration;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Event sink that forwards every event into a channel for assertions
pub struct RecordingSink {
    tx: Sender<PlayerEvent>,
}

impl EventSink for RecordingSink {
    fn send_event(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }
}

/// Controller wired to a scripted engine, plus the recorded event stream
pub fn rig(
    mode: TransitionMode,
) -> (
    PipelineController,
    Arc<ScriptedEngine>,
    Receiver<PlayerEvent>,
) {
    let (tx, rx) = unbounded();
    let engine = ScriptedEngine::new(mode);
    let init = EngineInit::acquire();
    let controller = PipelineController::new(
        &init,
        Arc::clone(&engine) as Arc<dyn Engine>,
        Arc::new(RecordingSink { tx }),
    );
    (controller, engine, rx)
}

/// Wait for the next outbound event, failing the test on timeout
pub fn next_event(rx: &Receiver<PlayerEvent>) -> PlayerEvent {
    rx.recv_timeout(EVENT_TIMEOUT)
        .expect("timed out waiting for player event")
}

/// Assert no further event arrives within a short settling window
pub fn assert_no_event(rx: &Receiver<PlayerEvent>) {
    match rx.recv_timeout(Duration::from_millis(100)) {
        Err(RecvTimeoutError::Timeout) => {}
        Ok(event) => panic!("unexpected event: {event:?}"),
        Err(RecvTimeoutError::Disconnected) => panic!("event sink channel disconnected"),
    }
}
