//! Pull-mode source adapter
//!
//! Bridges an owned file descriptor plus a byte range into the engine's
//! pull-mode data-source contract: the engine asks for byte ranges on demand
//! (`need_data`) and repositions the cursor for random access (`seek_data`).
//! The range is memory-mapped read-only once at assignment; buffers handed to
//! the engine are views over the mapping, never copies.
//!
//! The adapter implements no readahead backpressure: the pull-mode contract
//! only ever requests more data, and each request is clamped to the remaining
//! window, so in-flight bytes are bounded by the engine's own request sizes.

use crate::error::{Error, Result};
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Internal URI scheme under which mapped sources are exposed to the engine
pub const MAPPED_URI_SCHEME: &str = "mapped://";

/// Result of a `need_data` request
#[derive(Debug, Clone)]
pub enum PullData {
    /// A view over the mapped region
    Buffer(SourceBuffer),
    /// The cursor is at or past the end of the window
    Eos,
}

/// A zero-copy view over the memory-mapped source
///
/// Holds a reference on the mapping, so the view stays valid even if the
/// source is re-assigned while the engine still owns the buffer.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    map: Arc<Mmap>,
    start: usize,
    len: usize,
    stream_offset: u64,
}

impl SourceBuffer {
    /// The bytes of this view
    pub fn as_slice(&self) -> &[u8] {
        &self.map[self.start..self.start + self.len]
    }

    /// Offset of the first byte, in stream (window-relative) terms
    pub fn stream_offset(&self) -> u64 {
        self.stream_offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A memory-mapped byte range of an open file descriptor
///
/// Lifecycle is tied to a single data-source assignment: the mapping is
/// released when the last handle (controller's and engine's) is dropped, on
/// teardown or re-assignment.
#[derive(Debug)]
pub struct MappedSource {
    // Keeps the descriptor alive alongside the mapping
    _file: File,
    fd: RawFd,
    map: Arc<Mmap>,
    window_start: u64,
    window_len: u64,
    cursor: u64,
}

impl MappedSource {
    /// Take ownership of `fd` and map `length` bytes starting at `offset`.
    ///
    /// `offset`/`length` of 0 mean "whole file" (size determined from the
    /// descriptor); a `length` running past the end of the file is clamped.
    /// Any mapping failure is a fatal setup error.
    pub fn new(fd: OwnedFd, offset: i64, length: i64) -> Result<Self> {
        let raw = fd.as_raw_fd();
        if raw <= 0 {
            return Err(Error::InvalidArgument(format!("invalid file descriptor: {raw}")));
        }
        if offset < 0 || length < 0 {
            return Err(Error::InvalidArgument(format!(
                "negative source range: offset={offset}, length={length}"
            )));
        }

        let file = File::from(fd);
        let file_len = file.metadata()?.len();
        if file_len == 0 {
            return Err(Error::InvalidArgument("source file is empty".into()));
        }

        let window_start = offset as u64;
        if window_start >= file_len {
            return Err(Error::InvalidArgument(format!(
                "offset {window_start} past end of {file_len}-byte file"
            )));
        }
        let available = file_len - window_start;
        let window_len = if length == 0 {
            available
        } else {
            let requested = length as u64;
            if requested > available {
                warn!("source range {requested} bytes clamped to {available} remaining in file");
            }
            requested.min(available)
        };

        // The descriptor stays owned for the life of the mapping; nothing else
        // writes through it.
        let map = unsafe { MmapOptions::new().map(&file) }
            .map_err(|e| Error::InvalidArgument(format!("mmap of fd {raw} failed: {e}")))?;

        debug!(
            "mapped source: fd={raw}, window={window_start}+{window_len} of {file_len} bytes"
        );

        Ok(Self {
            _file: file,
            fd: raw,
            map: Arc::new(map),
            window_start,
            window_len,
            cursor: 0,
        })
    }

    /// Total length of the window, for the engine's duration estimation
    pub fn size(&self) -> u64 {
        self.window_len
    }

    /// Descriptor number, for diagnostics only
    pub fn descriptor(&self) -> RawFd {
        self.fd
    }

    /// Produce up to `length` bytes at the cursor and advance it.
    ///
    /// The request is clamped to the remaining window; a cursor at or past the
    /// end signals end-of-stream instead.
    pub fn need_data(&mut self, length: usize) -> PullData {
        if self.cursor >= self.window_len {
            debug!(
                "pull request at offset {} past window of {} bytes, signalling EOS",
                self.cursor, self.window_len
            );
            return PullData::Eos;
        }

        let remaining = self.window_len - self.cursor;
        let len = remaining.min(length as u64) as usize;
        let buffer = SourceBuffer {
            map: Arc::clone(&self.map),
            start: (self.window_start + self.cursor) as usize,
            len,
            stream_offset: self.cursor,
        };
        self.cursor += len as u64;
        PullData::Buffer(buffer)
    }

    /// Reposition the cursor. Always accepted (random-access contract).
    pub fn seek_data(&mut self, offset: u64) -> bool {
        self.cursor = offset;
        true
    }
}

/// Shared handle over a [`MappedSource`]
///
/// The controller keeps one clone (for teardown and re-assignment), the
/// engine the other; the mapping is released when both are gone.
#[derive(Debug, Clone)]
pub struct SharedSource {
    inner: Arc<Mutex<MappedSource>>,
}

impl SharedSource {
    pub fn new(source: MappedSource) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MappedSource> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn size(&self) -> u64 {
        self.lock().size()
    }

    pub fn descriptor(&self) -> RawFd {
        self.lock().descriptor()
    }

    pub fn need_data(&self, length: usize) -> PullData {
        self.lock().need_data(length)
    }

    pub fn seek_data(&self, offset: u64) -> bool {
        self.lock().seek_data(offset)
    }
}
