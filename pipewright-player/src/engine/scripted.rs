//! Scripted engine
//!
//! A deterministic, in-process implementation of the [`Engine`] contract for
//! the integration tests and the smoke harness. State transitions succeed
//! instantly; what varies is how they are *reported*:
//!
//! - [`TransitionMode::Immediate`] — `set_state` returns `Complete` and
//!   mirrors the transition onto the bus, like a simple pipeline that never
//!   needs to preroll.
//! - [`TransitionMode::Announced`] — `set_state` returns `Async` (the settled
//!   result is still immediately available to `await_state`), exercising the
//!   blocking paths and the bus-side completion logic.
//! - [`TransitionMode::Manual`] — nothing is mirrored onto the bus; the test
//!   injects every message itself with the `post_*` helpers.
//!
//! Seeks are recorded verbatim so tests can assert on the exact engine-unit
//! positions issued.

use super::{BusMessage, Engine, EngineState, StateChange, StateSnapshot, NANOS_PER_MSEC};
use crate::error::{Error, Result};
use crate::source::{SharedSource, MAPPED_URI_SCHEME};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// How the scripted engine reports state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMode {
    Immediate,
    Announced,
    Manual,
}

#[derive(Debug)]
struct ScriptState {
    mode: TransitionMode,
    current: EngineState,
    pending: Option<EngineState>,
    uri: Option<String>,
    source: Option<SharedSource>,
    duration_ns: Option<i64>,
    position_ns: Option<i64>,
    seeks: Vec<i64>,
    fail_next_transition: Option<String>,
    fail_next_seek: Option<String>,
}

/// Deterministic in-process engine
pub struct ScriptedEngine {
    state: Mutex<ScriptState>,
    bus_tx: Sender<BusMessage>,
    bus_rx: Receiver<BusMessage>,
}

impl ScriptedEngine {
    pub fn new(mode: TransitionMode) -> Arc<Self> {
        let (bus_tx, bus_rx) = unbounded();
        Arc::new(Self {
            state: Mutex::new(ScriptState {
                mode,
                current: EngineState::Null,
                pending: None,
                uri: None,
                source: None,
                duration_ns: None,
                position_ns: None,
                seeks: Vec::new(),
                fail_next_transition: None,
                fail_next_seek: None,
            }),
            bus_tx,
            bus_rx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn post(&self, msg: BusMessage) {
        // The receiver only disappears once the engine itself is dropped.
        let _ = self.bus_tx.send(msg);
    }

    // --- scripting controls ---

    /// Make the next `set_state` call fail hard with `message`.
    pub fn fail_next_transition(&self, message: &str) {
        self.lock().fail_next_transition = Some(message.to_string());
    }

    /// Make the next `seek` call be rejected with `message`.
    pub fn fail_next_seek(&self, message: &str) {
        self.lock().fail_next_seek = Some(message.to_string());
    }

    pub fn set_duration_ms(&self, ms: i64) {
        self.lock().duration_ns = Some(ms * NANOS_PER_MSEC);
    }

    pub fn clear_duration(&self) {
        self.lock().duration_ns = None;
    }

    pub fn set_position_ms(&self, ms: i64) {
        self.lock().position_ns = Some(ms * NANOS_PER_MSEC);
    }

    pub fn clear_position(&self) {
        self.lock().position_ns = None;
    }

    /// Mark a transition as still in flight in the snapshot (Manual mode
    /// scripting; cleared by the next `set_state`).
    pub fn set_pending(&self, pending: Option<EngineState>) {
        self.lock().pending = pending;
    }

    /// Overwrite the current state without posting anything — scripts a
    /// pipeline that moved on its own (e.g. dipped through Paused during a
    /// flushing seek).
    pub fn force_state(&self, state: EngineState) {
        self.lock().current = state;
    }

    // --- bus injection helpers ---

    pub fn post_state_changed(
        &self,
        old: EngineState,
        current: EngineState,
        pending: Option<EngineState>,
    ) {
        self.post(BusMessage::StateChanged {
            old,
            current,
            pending,
        });
    }

    pub fn post_eos(&self) {
        self.post(BusMessage::Eos);
    }

    pub fn post_error(&self, code: i32, message: &str) {
        self.post(BusMessage::Error {
            code,
            message: message.to_string(),
            debug: None,
        });
    }

    pub fn post_buffering(&self, percent: i32) {
        self.post(BusMessage::Buffering { percent });
    }

    pub fn post_tag(&self, tag: &str, value: &str) {
        self.post(BusMessage::Tag {
            tags: vec![(tag.to_string(), value.to_string())],
        });
    }

    // --- inspection ---

    pub fn uri(&self) -> Option<String> {
        self.lock().uri.clone()
    }

    pub fn pull_source(&self) -> Option<SharedSource> {
        self.lock().source.clone()
    }

    pub fn current_state(&self) -> EngineState {
        self.lock().current
    }

    /// Every accepted seek position, in engine units (nanoseconds).
    pub fn seeks(&self) -> Vec<i64> {
        self.lock().seeks.clone()
    }
}

impl Engine for ScriptedEngine {
    fn set_uri(&self, uri: &str) -> Result<()> {
        trace!("scripted engine uri: {uri}");
        self.lock().uri = Some(uri.to_string());
        Ok(())
    }

    fn set_pull_source(&self, source: SharedSource) -> Result<()> {
        trace!(
            "scripted engine pull source: {} bytes via {MAPPED_URI_SCHEME}",
            source.size()
        );
        let mut state = self.lock();
        state.uri = Some(MAPPED_URI_SCHEME.to_string());
        state.source = Some(source);
        Ok(())
    }

    fn set_state(&self, target: EngineState) -> Result<StateChange> {
        let (mode, old) = {
            let mut state = self.lock();
            if let Some(message) = state.fail_next_transition.take() {
                return Err(Error::Transition(message));
            }
            let old = state.current;
            state.current = target;
            state.pending = None;
            (state.mode, old)
        };
        match mode {
            TransitionMode::Immediate => {
                self.post_state_changed(old, target, None);
                Ok(StateChange::Complete)
            }
            TransitionMode::Announced => {
                self.post_state_changed(old, target, None);
                Ok(StateChange::Async)
            }
            TransitionMode::Manual => Ok(StateChange::Complete),
        }
    }

    fn await_state(&self) -> Result<EngineState> {
        // Transitions settle instantly here, so the blocking wait returns at
        // once with the settled state.
        Ok(self.lock().current)
    }

    fn state_snapshot(&self) -> StateSnapshot {
        let state = self.lock();
        StateSnapshot {
            current: state.current,
            pending: state.pending,
        }
    }

    fn seek(&self, position_ns: i64) -> Result<()> {
        let (mode, current) = {
            let mut state = self.lock();
            if let Some(message) = state.fail_next_seek.take() {
                return Err(Error::Transition(message));
            }
            state.seeks.push(position_ns);
            state.position_ns = Some(position_ns);
            (state.mode, state.current)
        };
        // A flushing seek settles back at the state it was issued in.
        match mode {
            TransitionMode::Immediate | TransitionMode::Announced => {
                self.post_state_changed(current, current, None);
            }
            TransitionMode::Manual => {}
        }
        Ok(())
    }

    fn position_ns(&self) -> Option<i64> {
        self.lock().position_ns
    }

    fn duration_ns(&self) -> Option<i64> {
        self.lock().duration_ns
    }

    fn post_application_message(&self, name: &str) -> Result<()> {
        self.post(BusMessage::Application {
            name: name.to_string(),
        });
        Ok(())
    }

    fn bus_receiver(&self) -> Receiver<BusMessage> {
        self.bus_rx.clone()
    }
}
