// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EVIOCGRAB ioctl evdev ENOTTY

//! Exclusive access ("grab") for evdev devices, and the open / teardown policies built
//! on it.
//!
//! | Step      | On failure                                                          |
//! | :-------- | :------------------------------------------------------------------ |
//! | open      | return [`DeviceInputError::Open`]                                   |
//! | grab      | close the new descriptor, log a close failure, return the grab error |
//! | release   | still close, then return [`DeviceInputError::Teardown`] (release)   |
//! | close     | return [`DeviceInputError::Teardown`] (close)                       |
//!
//! A grab is only ever attempted when [`DeviceId::grabs_device`] is set.

use crate::{DeviceId, DeviceInputError, RecordHandle, RecordSource, TeardownStage};
use rustix::{fd::BorrowedFd, io::Errno};

/// `_IOW('E', 0x90, int)` from `linux/input.h`.
#[cfg(target_os = "linux")]
const EVIOCGRAB: u32 = ioctl_write_request(b'E', 0x90, size_of::<std::ffi::c_int>());

#[cfg(any(
    target_arch = "powerpc",
    target_arch = "powerpc64",
    target_arch = "mips",
    target_arch = "mips64",
    target_arch = "sparc64"
))]
const IOC_WRITE: u32 = 4 << 29;

#[cfg(not(any(
    target_arch = "powerpc",
    target_arch = "powerpc64",
    target_arch = "mips",
    target_arch = "mips64",
    target_arch = "sparc64"
)))]
const IOC_WRITE: u32 = 1 << 30;

#[allow(clippy::cast_possible_truncation)]
const fn ioctl_write_request(group: u8, number: u8, size: usize) -> u32 {
    IOC_WRITE | ((size as u32) << 16) | ((group as u32) << 8) | number as u32
}

/// Issues `EVIOCGRAB` on an open evdev descriptor. Interrupted calls are retried.
#[derive(Debug, Clone, Copy)]
pub struct GrabController;

impl GrabController {
    /// Acquires exclusive access to the device behind `fd`.
    ///
    /// # Errors
    ///
    /// `EBUSY` if someone else holds the grab, `ENOTTY` if `fd` isn't an evdev device.
    pub fn acquire(fd: BorrowedFd<'_>) -> Result<(), Errno> { set_grab(fd, true) }

    /// Releases a grab acquired with [`Self::acquire`].
    ///
    /// # Errors
    ///
    /// `EINVAL` if `fd` doesn't hold the grab.
    pub fn release(fd: BorrowedFd<'_>) -> Result<(), Errno> { set_grab(fd, false) }
}

#[cfg(target_os = "linux")]
fn set_grab(fd: BorrowedFd<'_>, grab: bool) -> Result<(), Errno> {
    use crate::value_or_errno_retrying;
    use rustix::fd::AsRawFd as _;

    let raw_fd = fd.as_raw_fd();
    let arg = std::ffi::c_int::from(grab);
    value_or_errno_retrying(true, || {
        // SAFETY: `raw_fd` is borrowed for the duration of the call and EVIOCGRAB takes
        // its argument by value, no memory is shared with the kernel.
        unsafe { libc::ioctl(raw_fd, EVIOCGRAB as _, arg) }
    })
    .map(|_| ())
}

/// Other platforms have no evdev and no `EVIOCGRAB`, grabbing always succeeds there.
#[cfg(not(target_os = "linux"))]
fn set_grab(_fd: BorrowedFd<'_>, _grab: bool) -> Result<(), Errno> { Ok(()) }

/// Opens `device` and, if requested, grabs it.
///
/// When the grab fails the freshly opened handle is closed before the grab error is
/// returned. A failure of that cleanup close is logged and never replaces the grab error.
///
/// # Errors
///
/// [`DeviceInputError::Open`] or [`DeviceInputError::Grab`].
pub fn open_and_grab<S: RecordSource>(
    source: &S,
    device: &DeviceId,
) -> Result<S::Handle, DeviceInputError> {
    let handle = source.open(device).map_err(|source| DeviceInputError::Open {
        path: device.path().to_path_buf(),
        source,
    })?;

    if !device.grabs_device() {
        return Ok(handle);
    }

    if let Err(grab_error) = handle.acquire_grab() {
        if let Err(close_error) = handle.close() {
            tracing::warn!(
                message = "Grabbing the device failed, and closing its descriptor failed too",
                device = %device,
                grab_error = %grab_error,
                close_error = %close_error
            );
        }
        return Err(DeviceInputError::Grab {
            path: device.path().to_path_buf(),
            source: grab_error,
        });
    }

    Ok(handle)
}

/// Releases the grab (if `device` asked for one) and closes `handle`.
///
/// The close always happens, even when the release fails. The release error wins when
/// both fail, the close error is then only logged.
///
/// # Errors
///
/// [`DeviceInputError::Teardown`] naming the [`TeardownStage`] that failed.
pub fn release_and_close<H: RecordHandle>(
    handle: H,
    device: &DeviceId,
) -> Result<(), DeviceInputError> {
    let release_result = if device.grabs_device() {
        handle.release_grab()
    } else {
        Ok(())
    };
    let close_result = handle.close();

    let teardown_error = |stage, source| DeviceInputError::Teardown {
        path: device.path().to_path_buf(),
        stage,
        source,
    };

    match (release_result, close_result) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(close_error)) => Err(teardown_error(TeardownStage::Close, close_error)),
        (Err(release_error), close_result) => {
            if let Err(close_error) = close_result {
                tracing::warn!(
                    message = "Closing the device failed after releasing its grab failed",
                    device = %device,
                    release_error = %release_error,
                    close_error = %close_error
                );
            }
            Err(teardown_error(TeardownStage::ReleaseGrab, release_error))
        }
    }
}
