//! Outbound player events
//!
//! Events delivered to the client (the host-service facade) by the controller
//! and the bus loop. Each occurrence is delivered at most once. Handlers run
//! while the controller lock is held, so an [`EventSink`] implementation must
//! hand the event off (queue, channel, notification) rather than call back
//! into the controller.

/// Events emitted to the external event sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The pipeline reached Paused after a prepare request
    Prepared,

    /// End of stream with looping disabled
    PlaybackComplete,

    /// An in-flight seek resolved (or was cut short by stop)
    SeekComplete,

    /// Asynchronous engine error; `code` is the engine's error code
    Error { code: i32 },

    /// Buffering progress report
    BufferingUpdate { percent: i32 },
}

/// Destination for outbound player events
///
/// The strongly-typed replacement for a raw context pointer handed through
/// callback registration: the controller owns the sink, the bus loop borrows
/// it for dispatch.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block and must not re-enter the controller.
    fn send_event(&self, event: PlayerEvent);
}

impl<F> EventSink for F
where
    F: Fn(PlayerEvent) + Send + Sync,
{
    fn send_event(&self, event: PlayerEvent) {
        self(event)
    }
}
