//! Event-bus loop
//!
//! One dedicated thread per pipeline drains the engine's message bus for the
//! pipeline's lifetime. Every message is handled with the controller lock
//! held, which totally orders bus dispatch with client-initiated operations.
//!
//! The loop exits on the quit-loop application message (posted by the
//! teardown handshake) or when the engine drops its side of the bus.

use crate::controller::Inner;
use crate::engine::{BusMessage, NANOS_PER_MSEC};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// Application message that terminates the bus loop (teardown handshake)
pub(crate) const QUIT_LOOP: &str = "application/x-quit-loop";

pub(crate) fn spawn(bus_rx: Receiver<BusMessage>, inner: Arc<Mutex<Inner>>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("pipewright-bus".into())
        .spawn(move || run(bus_rx, inner))
        .expect("failed to spawn bus loop thread")
}

fn run(bus_rx: Receiver<BusMessage>, inner: Arc<Mutex<Inner>>) {
    debug!("bus loop running");
    // recv() fails only when the engine dropped the bus; treated like quit.
    while let Ok(msg) = bus_rx.recv() {
        let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
        match msg {
            BusMessage::StateChanged {
                old,
                current,
                pending,
            } => inner.handle_state_changed(old, current, pending),
            BusMessage::Eos => inner.handle_eos(),
            BusMessage::Error {
                code,
                message,
                debug,
            } => inner.handle_error(code, &message, debug.as_deref()),
            BusMessage::Buffering { percent } => inner.handle_buffering(percent),
            BusMessage::Tag { tags } => {
                for (tag, value) in &tags {
                    trace!("tag {tag}: {value}");
                }
            }
            BusMessage::DurationChanged => debug!("duration changed"),
            BusMessage::SegmentDone { position_ns } => {
                debug!("segment done at {} ms", position_ns / NANOS_PER_MSEC)
            }
            BusMessage::Application { name } if name == QUIT_LOOP => {
                debug!("received quit-loop message");
                break;
            }
            BusMessage::Application { name } => debug!("unhandled application message: {name}"),
        }
    }
    debug!("bus loop exited");
}
