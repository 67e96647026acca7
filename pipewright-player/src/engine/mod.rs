//! Engine contract
//!
//! The streaming-pipeline engine is an external collaborator: it decodes and
//! renders on its own, exposes a four-state machine, and reports progress
//! through an asynchronous message bus. This module pins down that boundary —
//! the [`Engine`] trait, its state and transition types, and the bus message
//! set — so the controller never touches engine internals.
//!
//! [`scripted`] provides a deterministic in-process engine used by the
//! integration tests and the smoke harness.

pub mod scripted;

use crate::config::PlayerConfig;
use crate::error::Result;
use crate::source::SharedSource;
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Nanoseconds per millisecond: the engine's native time unit is nanoseconds,
/// the player API speaks milliseconds.
pub const NANOS_PER_MSEC: i64 = 1_000_000;

/// The engine's pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Null,
    Ready,
    Paused,
    Playing,
}

/// How the engine reported a state-change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// The transition completed before the call returned
    Complete,
    /// The transition is in flight; completion arrives via the bus and can be
    /// awaited with [`Engine::await_state`]
    Async,
    /// The transition succeeded but the pipeline cannot preroll (live source)
    NoPreroll,
}

/// Non-blocking view of the engine's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Last stable state
    pub current: EngineState,
    /// Transition target still in flight, if any
    pub pending: Option<EngineState>,
}

/// Messages drained from the engine's bus
#[derive(Debug, Clone)]
pub enum BusMessage {
    /// The pipeline moved between states; `pending` carries any further
    /// transition still in flight
    StateChanged {
        old: EngineState,
        current: EngineState,
        pending: Option<EngineState>,
    },
    /// End of stream
    Eos,
    /// Asynchronous engine error; does not stop the pipeline by itself
    Error {
        code: i32,
        message: String,
        debug: Option<String>,
    },
    /// Buffering progress
    Buffering { percent: i32 },
    /// Stream metadata; informational
    Tag { tags: Vec<(String, String)> },
    /// The engine re-estimated the stream duration; informational
    DurationChanged,
    /// A playback segment finished; informational
    SegmentDone { position_ns: i64 },
    /// Application/control message injected via
    /// [`Engine::post_application_message`]
    Application { name: String },
}

/// The streaming-pipeline engine, seen from the controller
///
/// One instance backs one pipeline; the controller creates it at construction
/// and drives it to `Null` on teardown. Implementations must deliver every
/// bus message through the receiver handed out by [`Engine::bus_receiver`],
/// including application messages posted by the engine's own client.
pub trait Engine: Send + Sync {
    /// Configure a URL data source (already qualified, e.g. `file:///…`).
    fn set_uri(&self, uri: &str) -> Result<()>;

    /// Configure a pull-mode data source. The engine pulls byte ranges from
    /// `source` on demand instead of resolving a URL itself.
    fn set_pull_source(&self, source: SharedSource) -> Result<()>;

    /// Request a transition to `target`. Hard failures are `Err`.
    fn set_state(&self, target: EngineState) -> Result<StateChange>;

    /// Block until the state machine is stable and return the settled state.
    ///
    /// This is the engine's own blocking wait and has no timeout; a stuck
    /// engine stalls the caller indefinitely.
    fn await_state(&self) -> Result<EngineState>;

    /// Current and pending state, without blocking.
    fn state_snapshot(&self) -> StateSnapshot;

    /// Issue a flushing, key-frame-aligned seek to `position_ns` in stream
    /// time. `Ok` means the engine accepted the request; completion is
    /// reported asynchronously through state-changed messages.
    fn seek(&self, position_ns: i64) -> Result<()>;

    /// Current playback position, if the query is supported right now.
    fn position_ns(&self) -> Option<i64>;

    /// Total stream duration, if known.
    fn duration_ns(&self) -> Option<i64>;

    /// Inject an application message into the bus stream.
    fn post_application_message(&self, name: &str) -> Result<()>;

    /// The engine's message bus. The controller hands this to the bus loop.
    fn bus_receiver(&self) -> Receiver<BusMessage>;
}

// Process-wide engine initialization flag.
static ENGINE_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Proof of process-wide engine initialization
///
/// The engine framework must be initialized exactly once per process, before
/// the first pipeline exists; configuration environment entries are exported
/// at that point. Acquiring the token again is cheap and changes nothing.
/// Controllers take the token by reference so the requirement is visible in
/// their constructor signature.
#[derive(Debug, Clone)]
pub struct EngineInit {
    exported: usize,
}

impl EngineInit {
    /// Initialize with defaults (the default config file if present).
    pub fn acquire() -> Self {
        Self::with_config(&PlayerConfig::load_default())
    }

    /// Initialize, exporting the configuration's `[environment]` table.
    pub fn with_config(config: &PlayerConfig) -> Self {
        if ENGINE_INITIALIZED.swap(true, Ordering::SeqCst) {
            debug!("engine runtime already initialized");
            return Self { exported: 0 };
        }

        for (key, value) in &config.environment {
            debug!("export {key}={value}");
            std::env::set_var(key, value);
        }
        info!(
            "engine runtime initialized ({} environment entries)",
            config.environment.len()
        );
        Self {
            exported: config.environment.len(),
        }
    }

    /// Number of environment entries exported by this acquisition.
    pub fn exported(&self) -> usize {
        self.exported
    }
}
