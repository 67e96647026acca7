//! In-flight operation tracking
//!
//! Prepare and seek complete asynchronously: the request is issued on the
//! caller's thread, the completion is observed by the bus loop in a
//! state-changed message. Each in-flight operation is a small state machine
//! (`Idle` → `Requested` → resolved) so the resolution rules can be tested
//! without a pipeline.
//!
//! At most one seek is in flight at a time; a new request overwrites the
//! outstanding context rather than queueing behind it.

use crate::engine::EngineState;

/// Asynchronous prepare tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingPrepare {
    #[default]
    Idle,
    Requested,
}

impl PendingPrepare {
    pub fn request(&mut self) {
        *self = PendingPrepare::Requested;
    }

    pub fn is_requested(&self) -> bool {
        matches!(self, PendingPrepare::Requested)
    }

    /// Apply a state-changed observation; returns true when the prepare just
    /// resolved (emit `Prepared`).
    ///
    /// Prepare resolves once the pipeline reports Paused with nothing further
    /// pending — or with Playing pending, which happens when the client
    /// started playback on the heels of an async prepare.
    pub fn resolve(&mut self, current: EngineState, pending: Option<EngineState>) -> bool {
        if self.is_requested()
            && current == EngineState::Paused
            && matches!(pending, None | Some(EngineState::Playing))
        {
            *self = PendingPrepare::Idle;
            return true;
        }
        false
    }

    /// Drop any outstanding request; returns true if one was outstanding.
    pub fn clear(&mut self) -> bool {
        std::mem::take(self) == PendingPrepare::Requested
    }
}

/// In-flight seek tracking
///
/// `restore_target` is the stable state captured when the seek was issued:
/// the seek is complete once the pipeline is back at that state with no
/// transition pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingSeek {
    #[default]
    Idle,
    Requested { restore_target: EngineState },
}

impl PendingSeek {
    /// Record a newly issued seek, overwriting any outstanding one.
    pub fn request(&mut self, restore_target: EngineState) {
        *self = PendingSeek::Requested { restore_target };
    }

    pub fn is_requested(&self) -> bool {
        matches!(self, PendingSeek::Requested { .. })
    }

    pub fn restore_target(&self) -> Option<EngineState> {
        match self {
            PendingSeek::Requested { restore_target } => Some(*restore_target),
            PendingSeek::Idle => None,
        }
    }

    /// Move the restore target of an in-flight seek (the client paused or
    /// resumed mid-seek). Returns true if a seek was actually in flight.
    pub fn retarget(&mut self, new_target: EngineState) -> bool {
        match self {
            PendingSeek::Requested { restore_target } => {
                *restore_target = new_target;
                true
            }
            PendingSeek::Idle => false,
        }
    }

    /// Apply a state-changed observation; returns true when the seek just
    /// resolved (emit `SeekComplete`).
    pub fn resolve(&mut self, current: EngineState, pending: Option<EngineState>) -> bool {
        match self {
            PendingSeek::Requested { restore_target }
                if current == *restore_target && pending.is_none() =>
            {
                *self = PendingSeek::Idle;
                true
            }
            _ => false,
        }
    }

    /// Cancel an in-flight seek (stop path); returns true if one was in
    /// flight, in which case the caller owes the client an immediate
    /// `SeekComplete`.
    pub fn cancel(&mut self) -> bool {
        std::mem::take(self).is_requested()
    }
}
