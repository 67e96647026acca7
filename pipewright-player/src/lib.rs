//! # Pipewright Player (pipewright-player)
//!
//! Media-pipeline playback controller.
//!
//! **Purpose:** Bridge a blocking imperative playback API (prepare / start /
//! stop / pause / seek / query-position) onto a streaming-pipeline engine
//! whose operations complete asynchronously via state-change messages on a
//! bus.
//!
//! **Architecture:** Two OS threads per pipeline — the caller's thread and a
//! dedicated bus-loop thread — serialized by a single controller lock. The
//! engine itself is an external collaborator behind the [`engine::Engine`]
//! trait; data reaches it either by local-file url or through the
//! memory-mapped pull-mode source adapter in [`source`].

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod pending;
pub mod source;

mod bus;

pub use controller::PipelineController;
pub use engine::{BusMessage, Engine, EngineInit, EngineState, StateChange, StateSnapshot};
pub use error::{Error, Result};
pub use events::{EventSink, PlayerEvent};
