// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words FIONREAD epoll

//! The seam between the registry and the operating system.
//!
//! Everything the registry and its reader threads do to a device goes through these two
//! traits, so the same session logic runs against a real evdev node
//! ([`OsRecordSource`]) or against memory ([`InMemoryRecordSource`]).
//!
//! | Trait            | Lives on         | Called from                          |
//! | :--------------- | :--------------- | :----------------------------------- |
//! | [`RecordSource`] | the registry     | first attach, under the registry lock |
//! | [`RecordHandle`] | the session      | reader thread, teardown              |
//!
//! [`InMemoryRecordSource`]: crate::InMemoryRecordSource
//! [`OsRecordSource`]: crate::OsRecordSource

use crate::DeviceId;
use mio::{Registry, Token};
use std::io;

/// Opens devices.
pub trait RecordSource: Send + Sync + 'static {
    type Handle: RecordHandle;

    /// Opens `device` for non blocking reads. Must not grab it.
    ///
    /// # Errors
    ///
    /// Whatever `open(2)` (or its stand-in) reports.
    fn open(&self, device: &DeviceId) -> io::Result<Self::Handle>;
}

/// How the reader thread learns that new bytes may be available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The handle was registered with [`mio`], the poll wakes up when it is readable.
    Evented,
    /// The handle can't be registered, the reader checks it on a fixed interval.
    Polled,
}

/// One open device. Shared between the reader thread (reads) and the session (teardown)
/// so every method takes `&self`.
pub trait RecordHandle: Send + Sync + 'static {
    /// How many bytes can be read without blocking. [`None`] if the handle can't say
    /// (evdev nodes don't implement `FIONREAD`), in which case the reader asks for a
    /// fixed number of records.
    ///
    /// # Errors
    ///
    /// Any failure other than "not supported".
    fn bytes_ready(&self) -> io::Result<Option<usize>>;

    /// Non blocking read. `Ok(0)` or [`io::ErrorKind::WouldBlock`] mean nothing is there.
    ///
    /// # Errors
    ///
    /// The `read(2)` error.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Moves the read position back by `count` bytes, so that a partial record is read
    /// again, whole, next time.
    ///
    /// # Errors
    ///
    /// Character devices generally can't seek, callers drop the bytes in that case.
    fn seek_back(&self, count: usize) -> io::Result<()>;

    /// # Errors
    ///
    /// See [`GrabController::acquire`](crate::GrabController::acquire).
    fn acquire_grab(&self) -> io::Result<()>;

    /// # Errors
    ///
    /// See [`GrabController::release`](crate::GrabController::release).
    fn release_grab(&self) -> io::Result<()>;

    /// Registers the handle for read readiness with `registry` under `token`.
    ///
    /// The default is [`Readiness::Polled`], for handles that have nothing to register.
    ///
    /// # Errors
    ///
    /// An unexpected registration failure. The caller falls back to polling.
    fn register_readiness(&self, registry: &Registry, token: Token) -> io::Result<Readiness> {
        let _unused = (registry, token);
        Ok(Readiness::Polled)
    }

    /// Closes the handle. Called exactly once per successful [`RecordSource::open`].
    ///
    /// # Errors
    ///
    /// The `close(2)` error. The handle is gone either way.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}
