//! Pipeline controller
//!
//! Owns the engine instance and bridges the blocking imperative player API
//! (prepare / start / stop / pause / seek / queries) onto the engine's
//! asynchronous state machine. One non-reentrant mutex serializes every API
//! entry point and every bus-message handler, so engine state and the
//! in-flight operation contexts have a single writer at any instant.
//!
//! Blocking discipline: `prepare`, `start`, `stop` and `pause` block in the
//! engine's own wait-for-state query when a transition is asynchronous. The
//! wait has no timeout — a genuinely stuck engine stalls the caller, matching
//! the engine's blocking contract. `prepare_async` and `seek_to` return after
//! issuing the request; their completions are resolved by the bus loop.

use crate::bus::{self, QUIT_LOOP};
use crate::engine::{Engine, EngineInit, EngineState, StateChange, NANOS_PER_MSEC};
use crate::error::{Error, Result};
use crate::events::{EventSink, PlayerEvent};
use crate::pending::{PendingPrepare, PendingSeek};
use crate::source::{MappedSource, SharedSource, MAPPED_URI_SCHEME};
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Qualify a client-supplied data-source url.
///
/// Accepted forms: an absolute local filesystem path (prefixed to a
/// `file://` url) or an already-qualified local-file url. Anything else is an
/// invalid argument.
fn qualify_local_url(url: &str) -> Result<String> {
    if url.starts_with('/') {
        Ok(format!("file://{url}"))
    } else if url.starts_with("file:///") {
        Ok(url.to_string())
    } else {
        Err(Error::InvalidArgument(format!(
            "unsupported data source url: {url}"
        )))
    }
}

/// Controller state guarded by the single pipeline lock
pub(crate) struct Inner {
    /// The engine instance; `None` after teardown
    engine: Option<Arc<dyn Engine>>,
    sink: Arc<dyn EventSink>,
    /// Controller's handle on the current mapped source, if any
    source: Option<SharedSource>,
    pending_prepare: PendingPrepare,
    pending_seek: PendingSeek,
    looping: bool,
}

impl Inner {
    fn engine(&self) -> Result<&Arc<dyn Engine>> {
        self.engine.as_ref().ok_or(Error::NotInitialized)
    }

    /// Request a transition and, if the engine reports it asynchronous, block
    /// in the engine's wait until it settles. A settled state other than the
    /// target is a transition failure.
    fn transition_and_wait(&self, target: EngineState) -> Result<()> {
        let engine = Arc::clone(self.engine()?);
        match engine.set_state(target)? {
            StateChange::Async => {
                debug!("waiting for pipeline to reach {target:?}");
                let settled = engine.await_state()?;
                debug!("pipeline settled at {settled:?}");
                if settled == target {
                    Ok(())
                } else {
                    Err(Error::Transition(format!(
                        "pipeline settled at {settled:?} while moving to {target:?}"
                    )))
                }
            }
            StateChange::Complete | StateChange::NoPreroll => Ok(()),
        }
    }

    // --- bus-message handlers, called by the bus loop under the lock ---

    pub(crate) fn handle_state_changed(
        &mut self,
        old: EngineState,
        current: EngineState,
        pending: Option<EngineState>,
    ) {
        debug!("state changed: {old:?} -> {current:?} (pending {pending:?})");

        if self.pending_prepare.resolve(current, pending) {
            debug!("async prepare complete");
            self.sink.send_event(PlayerEvent::Prepared);
        }

        if self.pending_seek.resolve(current, pending) {
            debug!("seek complete at {current:?}");
            self.sink.send_event(PlayerEvent::SeekComplete);
        }
    }

    pub(crate) fn handle_eos(&mut self) {
        if self.looping {
            debug!("end of stream with looping enabled, restarting playback");
            if let Err(e) = self.transition_and_wait(EngineState::Playing) {
                warn!("loop restart failed: {e}");
            }
        } else {
            debug!("end of stream, notifying playback complete");
            self.sink.send_event(PlayerEvent::PlaybackComplete);
        }
    }

    pub(crate) fn handle_error(&mut self, code: i32, message: &str, debug_info: Option<&str>) {
        warn!(
            "engine error {code}: {message} (debug: {})",
            debug_info.unwrap_or("none")
        );
        self.sink.send_event(PlayerEvent::Error { code });
    }

    pub(crate) fn handle_buffering(&mut self, percent: i32) {
        debug!("buffering: {percent}%");
        self.sink.send_event(PlayerEvent::BufferingUpdate { percent });
    }
}

/// The media-pipeline controller
///
/// Created once per playback session with a live engine instance; destroyed
/// (or explicitly [`teardown`](PipelineController::teardown)) when the
/// session ends. The bus loop thread it spawns lives exactly as long as the
/// pipeline.
pub struct PipelineController {
    inner: Arc<Mutex<Inner>>,
    bus_thread: Option<JoinHandle<()>>,
}

impl PipelineController {
    /// Wire a controller to an engine instance and an event sink.
    ///
    /// `init` is the proof that process-wide engine initialization already
    /// ran (configuration environment exported, framework set up).
    pub fn new(init: &EngineInit, engine: Arc<dyn Engine>, sink: Arc<dyn EventSink>) -> Self {
        debug!(
            "creating pipeline controller ({} environment entries exported at init)",
            init.exported()
        );
        let bus_rx = engine.bus_receiver();
        let inner = Arc::new(Mutex::new(Inner {
            engine: Some(engine),
            sink,
            source: None,
            pending_prepare: PendingPrepare::default(),
            pending_seek: PendingSeek::default(),
            looping: false,
        }));
        let bus_thread = bus::spawn(bus_rx, Arc::clone(&inner));
        Self {
            inner,
            bus_thread: Some(bus_thread),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point the pipeline at a local file by path or `file:///` url.
    pub fn set_data_source(&self, url: &str) -> Result<()> {
        let inner = self.lock();
        let engine = inner.engine()?;
        let full_url = qualify_local_url(url)?;
        debug!("pipeline uri: {full_url}");
        engine.set_uri(&full_url)
    }

    /// Take ownership of a byte range of an open file descriptor and feed it
    /// to the engine through the pull-mode source adapter.
    ///
    /// `offset`/`length` of 0 mean "whole file". Replaces (and unmaps, once
    /// the engine lets go of it) any previously assigned source.
    pub fn set_data_source_fd(&self, fd: OwnedFd, offset: i64, length: i64) -> Result<()> {
        let mut inner = self.lock();
        let engine = Arc::clone(inner.engine()?);

        let raw = fd.as_raw_fd();
        let source = SharedSource::new(MappedSource::new(fd, offset, length)?);
        debug!(
            "pipeline uri: {MAPPED_URI_SCHEME}, fd: {raw}, length: {}",
            source.size()
        );
        engine.set_pull_source(source.clone())?;

        if inner.source.replace(source).is_some() {
            debug!("previous mapped source released");
        }
        Ok(())
    }

    /// Drive the pipeline to Paused, blocking until the engine settles.
    ///
    /// Emits exactly one `Prepared` event on success.
    pub fn prepare(&self) -> Result<()> {
        let inner = self.lock();
        inner.transition_and_wait(EngineState::Paused)?;
        debug!("prepared, notifying client");
        inner.sink.send_event(PlayerEvent::Prepared);
        Ok(())
    }

    /// Request the transition to Paused and return immediately; the
    /// `Prepared` event is delivered from the bus loop once the engine
    /// reports Paused with no further transition pending.
    pub fn prepare_async(&self) -> Result<()> {
        let mut inner = self.lock();
        let engine = Arc::clone(inner.engine()?);
        engine.set_state(EngineState::Paused)?;
        inner.pending_prepare.request();
        debug!("async prepare issued, completion via bus");
        Ok(())
    }

    /// Start (or resume) playback, blocking on an asynchronous transition.
    pub fn start(&self) -> Result<()> {
        let inner = self.lock();
        inner.transition_and_wait(EngineState::Playing)
    }

    /// Pause playback, blocking on an asynchronous transition.
    ///
    /// A seek in flight keeps resolving correctly: its restore target moves
    /// to Paused so the completion is detected at the state the pipeline will
    /// actually settle in.
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.pending_seek.retarget(EngineState::Paused) {
            debug!("pause during seek, restore target moved to Paused");
        }
        inner.transition_and_wait(EngineState::Paused)
    }

    /// Stop playback (pipeline to Ready), blocking on an asynchronous
    /// transition.
    ///
    /// A seek in flight cannot complete once stopped, so its completion is
    /// notified immediately and the context cleared — the underlying
    /// completion message arriving later finds nothing to resolve. An
    /// outstanding async prepare at this point is a client protocol anomaly:
    /// logged, then force-cleared.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.transition_and_wait(EngineState::Ready)?;

        if inner.pending_seek.cancel() {
            debug!("stop during in-flight seek, notifying seek complete immediately");
            inner.sink.send_event(PlayerEvent::SeekComplete);
        }
        if inner.pending_prepare.clear() {
            warn!("stop issued while an async prepare was outstanding");
        }
        Ok(())
    }

    /// Seek to `msec`, flushing and key-frame aligned.
    ///
    /// Success means the engine accepted the request; the `SeekComplete`
    /// event arrives once the pipeline is observed back at the captured
    /// restore state with no transition pending. A target equal to the known
    /// duration is decremented by one unit first — engines commonly reject
    /// exact-end seeks.
    pub fn seek_to(&self, msec: i64) -> Result<()> {
        let mut inner = self.lock();
        let engine = Arc::clone(inner.engine()?);

        let mut target_ms = msec;
        if let Some(duration_ns) = engine.duration_ns() {
            if target_ms == duration_ns / NANOS_PER_MSEC {
                target_ms -= 1;
            }
        }

        // Capture the stable state the pipeline should come back to.
        let restore = engine.await_state()?;
        engine.seek(target_ms * NANOS_PER_MSEC)?;
        inner.pending_seek.request(restore);
        debug!("seeking to {target_ms} ms, restore target {restore:?}");
        Ok(())
    }

    /// Current playback position in milliseconds.
    pub fn position_ms(&self) -> Result<i64> {
        let inner = self.lock();
        let engine = inner.engine()?;
        match engine.position_ns() {
            Some(ns) => {
                let ms = ns / NANOS_PER_MSEC;
                debug!("current position: {ms} ms");
                Ok(ms)
            }
            None => Err(Error::Query("position query unsupported".into())),
        }
    }

    /// Total stream duration in milliseconds.
    pub fn duration_ms(&self) -> Result<i64> {
        let inner = self.lock();
        let engine = inner.engine()?;
        match engine.duration_ns() {
            Some(ns) => {
                let ms = ns / NANOS_PER_MSEC;
                debug!("duration: {ms} ms");
                Ok(ms)
            }
            None => Err(Error::Query("duration query unsupported".into())),
        }
    }

    /// Whether playback is in progress.
    ///
    /// True when the pipeline is Playing, or when a seek is in flight whose
    /// restore target is Playing — seeking while playing still counts as
    /// playing. Queries the snapshot only; never blocks on a transition.
    pub fn is_playing(&self) -> bool {
        let inner = self.lock();
        let Some(engine) = inner.engine.as_ref() else {
            debug!("is_playing with no pipeline");
            return false;
        };
        let snapshot = engine.state_snapshot();
        let playing = snapshot.current == EngineState::Playing
            || inner.pending_seek.restore_target() == Some(EngineState::Playing);
        debug!(
            "state: {:?}, pending: {:?}, seeking: {}, playing: {playing}",
            snapshot.current,
            snapshot.pending,
            inner.pending_seek.is_requested()
        );
        playing
    }

    /// Distinct lifecycle verb with `stop()` semantics.
    pub fn reset(&self) -> Result<()> {
        debug!("reset");
        self.stop()
    }

    /// Toggle looping; consulted only by the end-of-stream handler.
    pub fn set_looping(&self, enabled: bool) -> Result<()> {
        let mut inner = self.lock();
        debug!("looping {}", if enabled { "enabled" } else { "disabled" });
        inner.looping = enabled;
        Ok(())
    }

    /// Shut the pipeline down and release its resources.
    ///
    /// Handshake ordering is a hard invariant: the bus loop needs this same
    /// lock to process the quit message, so the lock is released before the
    /// message is posted and the thread joined, then reacquired to finish
    /// releasing engine resources. Posting or joining while locked deadlocks.
    /// The unlocked window is the one place controller state is reachable
    /// outside the lock; handlers that run in it still see a live engine.
    pub fn teardown(&mut self) {
        let engine = {
            let inner = self.lock();
            match inner.engine.as_ref() {
                Some(engine) => Arc::clone(engine),
                None => return,
            }
        };

        if let Some(handle) = self.bus_thread.take() {
            debug!("posting quit-loop to the bus");
            if let Err(e) = engine.post_application_message(QUIT_LOOP) {
                warn!("failed to post quit-loop message: {e}");
            }
            debug!("waiting for bus loop to exit");
            if handle.join().is_err() {
                warn!("bus loop thread panicked");
            }
            debug!("bus loop joined");
        }

        let mut inner = self.lock();
        if let Err(e) = engine.set_state(EngineState::Null) {
            warn!("failed to drive pipeline to Null: {e}");
        }
        inner.engine = None;
        if inner.source.take().is_some() {
            debug!("mapped source released");
        }
        inner.pending_seek = PendingSeek::default();
        inner.pending_prepare = PendingPrepare::default();
        debug!("pipeline released");
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_gets_file_scheme() {
        assert_eq!(
            qualify_local_url("/media/clip.mp4").unwrap(),
            "file:///media/clip.mp4"
        );
    }

    #[test]
    fn qualified_file_url_passes_through() {
        assert_eq!(
            qualify_local_url("file:///media/clip.mp4").unwrap(),
            "file:///media/clip.mp4"
        );
    }

    #[test]
    fn other_schemes_rejected() {
        for url in ["http://host/clip.mp4", "rtsp://host/stream", "clip.mp4", ""] {
            assert!(
                matches!(qualify_local_url(url), Err(Error::InvalidArgument(_))),
                "{url} should be rejected"
            );
        }
    }
}
