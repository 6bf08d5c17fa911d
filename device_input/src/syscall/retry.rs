// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINTR errno

//! Turn sentinel returning syscalls into [`Result`]s, retrying on [`EINTR`].
//!
//! POSIX syscalls report failure by returning `-1` and leaving the actual error in the
//! thread local `errno`. [`value_or_errno`] reads both and produces a typed [`Errno`].
//!
//! A syscall that blocks can be interrupted by a signal before it completes, in which
//! case it fails with [`EINTR`] without having done anything. That failure is transient,
//! so the `*_retrying` variants simply call the primitive again. There is no backoff and
//! no retry limit: the loop ends when the primitive succeeds or fails with anything else.
//!
//! Never ask for a retry around `close(2)`. On Linux the descriptor is released even when
//! `close` reports [`EINTR`], so a retry could close a descriptor that another thread
//! just received.
//!
//! [`EINTR`]: https://man7.org/linux/man-pages/man7/signal.7.html

use rustix::io::Errno;
use std::{ffi::c_int, io};

/// The return value that syscalls use to say "look at `errno`".
pub const SENTINEL_FAILURE: c_int = -1;

/// Converts the return value of a raw syscall into a [`Result`].
///
/// # Errors
///
/// Returns the current `errno` when `ret` is [`SENTINEL_FAILURE`].
pub fn value_or_errno(ret: c_int) -> Result<c_int, Errno> {
    if ret == SENTINEL_FAILURE {
        Err(last_errno())
    } else {
        Ok(ret)
    }
}

/// Calls `f` and converts its return value with [`value_or_errno`]. When
/// `retry_on_interrupt` is set, `f` is called again for as long as it fails with
/// [`Errno::INTR`].
///
/// # Errors
///
/// Returns the first error that isn't a retried [`Errno::INTR`].
pub fn value_or_errno_retrying(
    retry_on_interrupt: bool,
    mut f: impl FnMut() -> c_int,
) -> Result<c_int, Errno> {
    loop {
        match value_or_errno(f()) {
            Err(err) if retry_on_interrupt && err == Errno::INTR => {}
            result => return result,
        }
    }
}

/// Same retry policy as [`value_or_errno_retrying`], for [`rustix`] primitives which
/// already return a [`Result`].
///
/// # Errors
///
/// Returns the first error that isn't [`Errno::INTR`].
pub fn retry_on_interrupt<T>(mut f: impl FnMut() -> rustix::io::Result<T>) -> rustix::io::Result<T> {
    loop {
        match f() {
            Err(err) if err == Errno::INTR => {}
            result => return result,
        }
    }
}

fn last_errno() -> Errno {
    let os_error = io::Error::last_os_error();
    Errno::from_io_error(&os_error).unwrap_or(Errno::IO)
}
