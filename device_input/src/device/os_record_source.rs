// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words FIONREAD NOTTY NOSYS CLOEXEC RDONLY NONBLOCK EPERM epoll

//! [`RecordSource`] backed by real file descriptors.
//!
//! | Operation            | Syscall                              | `EINTR`        |
//! | :------------------- | :----------------------------------- | :------------- |
//! | open                 | `open(O_RDONLY│O_NONBLOCK│O_CLOEXEC)` | retried        |
//! | bytes ready          | `ioctl(FIONREAD)`                    | retried        |
//! | read                 | `read`                               | retried        |
//! | seek back            | `lseek(SEEK_CUR, -n)`                | retried        |
//! | grab / release       | `ioctl(EVIOCGRAB)`                   | retried        |
//! | close                | `close`                              | **not** retried |
//!
//! Evdev nodes are registered with [`mio`]. Regular files can't be registered with
//! epoll (`EPERM`), so they are polled instead, which is what lets tests drive this
//! source with a plain file.

use crate::{DeviceId, GrabController, Readiness, RecordHandle, RecordSource,
            retry_on_interrupt, value_or_errno_retrying};
use mio::{Interest, Registry, Token, unix::SourceFd};
use rustix::{fd::{AsFd as _, AsRawFd as _, IntoRawFd as _, OwnedFd},
             fs::{Mode, OFlags, SeekFrom},
             io::Errno};
use std::io;

/// Opens device nodes with [`rustix`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRecordSource;

impl RecordSource for OsRecordSource {
    type Handle = OsRecordHandle;

    fn open(&self, device: &DeviceId) -> io::Result<Self::Handle> {
        let fd = retry_on_interrupt(|| {
            rustix::fs::open(
                device.path(),
                OFlags::RDONLY | OFlags::NONBLOCK | OFlags::CLOEXEC,
                Mode::empty(),
            )
        })?;
        Ok(OsRecordHandle { fd })
    }
}

#[derive(Debug)]
pub struct OsRecordHandle {
    fd: OwnedFd,
}

impl RecordHandle for OsRecordHandle {
    fn bytes_ready(&self) -> io::Result<Option<usize>> {
        match retry_on_interrupt(|| rustix::io::ioctl_fionread(&self.fd)) {
            Ok(count) => Ok(Some(usize::try_from(count).unwrap_or(usize::MAX))),
            Err(Errno::NOTTY | Errno::INVAL | Errno::NOSYS) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(retry_on_interrupt(|| rustix::io::read(&self.fd, &mut *buf))?)
    }

    fn seek_back(&self, count: usize) -> io::Result<()> {
        let offset = i64::try_from(count).map_err(|_| io::Error::from(Errno::INVAL))?;
        retry_on_interrupt(|| rustix::fs::seek(&self.fd, SeekFrom::Current(-offset)))?;
        Ok(())
    }

    fn acquire_grab(&self) -> io::Result<()> {
        GrabController::acquire(self.fd.as_fd()).map_err(io::Error::from)
    }

    fn release_grab(&self) -> io::Result<()> {
        GrabController::release(self.fd.as_fd()).map_err(io::Error::from)
    }

    fn register_readiness(&self, registry: &Registry, token: Token) -> io::Result<Readiness> {
        let raw_fd = self.fd.as_raw_fd();
        match registry.register(&mut SourceFd(&raw_fd), token, Interest::READABLE) {
            Ok(()) => Ok(Readiness::Evented),
            Err(err) if err.raw_os_error() == Some(Errno::PERM.raw_os_error()) => {
                Ok(Readiness::Polled)
            }
            Err(err) => Err(err),
        }
    }

    fn close(self) -> io::Result<()> {
        let raw_fd = self.fd.into_raw_fd();
        // Linux releases the descriptor even when close reports EINTR, never retry.
        value_or_errno_retrying(false, || {
            // SAFETY: `raw_fd` was just released from its `OwnedFd`, nothing else owns it.
            unsafe { libc::close(raw_fd) }
        })?;
        Ok(())
    }
}
