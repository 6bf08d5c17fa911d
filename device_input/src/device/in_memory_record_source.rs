// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words ENOENT EBUSY EINVAL

//! [`RecordSource`] that keeps every device in memory.
//!
//! Bytes appended with [`InMemoryRecordSource::write`] become readable by every open
//! handle of that device, each handle keeping its own read position (like a regular
//! file opened twice). Every call is counted in [`CallCounts`], and any call can be
//! made to fail with a [`FailurePlan`]. Grabs behave like `EVIOCGRAB`: a second grab
//! fails with `EBUSY`, releasing without holding the grab fails with `EINVAL`.

use crate::{DeviceId, RawEventRecord, RecordHandle, RecordSource};
use rustix::io::Errno;
use std::{collections::HashMap,
          io,
          path::{Path, PathBuf},
          sync::{Arc, Mutex, MutexGuard, PoisonError,
                 atomic::{AtomicU64, Ordering}},
          time::Duration};

/// How many times each operation succeeded (or, for seeks, failed) on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    /// Calls to [`RecordSource::open`], counted on entry, before any delay or failure.
    pub open_attempts: usize,
    pub opens: usize,
    pub grabs: usize,
    pub releases: usize,
    pub closes: usize,
    pub seeks: usize,
    pub failed_seeks: usize,
    /// Handles opened and not yet closed.
    pub open_handles: usize,
    /// High water mark of [`Self::open_handles`].
    pub max_concurrent_open: usize,
}

/// Errors to inject. Each one fails every call of that operation until it is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailurePlan {
    pub open: Option<Errno>,
    pub grab: Option<Errno>,
    pub release: Option<Errno>,
    pub close: Option<Errno>,
    pub seek: Option<Errno>,
    pub read: Option<Errno>,
}

#[derive(Debug)]
struct MemoryDevice {
    bytes: Vec<u8>,
    counts: CallCounts,
    failures: FailurePlan,
    grabbed_by: Option<u64>,
    reports_bytes_ready: bool,
    open_delay: Duration,
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self {
            bytes: vec![],
            counts: CallCounts::default(),
            failures: FailurePlan::default(),
            grabbed_by: None,
            reports_bytes_ready: true,
            open_delay: Duration::ZERO,
        }
    }
}

type SharedDevice = Arc<Mutex<MemoryDevice>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cheap to clone, clones share the same devices.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    devices: Arc<Mutex<HashMap<PathBuf, SharedDevice>>>,
    next_handle_id: Arc<AtomicU64>,
}

impl InMemoryRecordSource {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Creates an empty device at `path`. Opening a path that was never added fails
    /// with `ENOENT`.
    pub fn add_device(&self, path: impl AsRef<Path>) {
        lock(&self.devices)
            .entry(path.as_ref().to_path_buf())
            .or_default();
    }

    /// Appends raw bytes to the device, creating it if needed.
    pub fn write(&self, path: impl AsRef<Path>, bytes: &[u8]) {
        lock(&self.device(path)).bytes.extend_from_slice(bytes);
    }

    pub fn write_records(&self, path: impl AsRef<Path>, records: &[RawEventRecord]) {
        let device = self.device(path);
        let mut device = lock(&device);
        for record in records {
            device.bytes.extend_from_slice(&record.to_bytes());
        }
    }

    pub fn set_failures(&self, path: impl AsRef<Path>, failures: FailurePlan) {
        lock(&self.device(path)).failures = failures;
    }

    /// When `false`, [`RecordHandle::bytes_ready`] returns [`None`] like an evdev node.
    pub fn set_reports_bytes_ready(&self, path: impl AsRef<Path>, reports: bool) {
        lock(&self.device(path)).reports_bytes_ready = reports;
    }

    /// Makes every open of the device sleep for `delay` first, like a slow device node.
    pub fn set_open_delay(&self, path: impl AsRef<Path>, delay: Duration) {
        lock(&self.device(path)).open_delay = delay;
    }

    #[must_use]
    pub fn counts(&self, path: impl AsRef<Path>) -> CallCounts {
        self.existing_device(path)
            .map(|device| lock(&device).counts)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn open_handle_count(&self, path: impl AsRef<Path>) -> usize {
        self.counts(path).open_handles
    }

    #[must_use]
    pub fn is_grabbed(&self, path: impl AsRef<Path>) -> bool {
        self.existing_device(path)
            .is_some_and(|device| lock(&device).grabbed_by.is_some())
    }

    fn device(&self, path: impl AsRef<Path>) -> SharedDevice {
        Arc::clone(
            lock(&self.devices)
                .entry(path.as_ref().to_path_buf())
                .or_default(),
        )
    }

    fn existing_device(&self, path: impl AsRef<Path>) -> Option<SharedDevice> {
        lock(&self.devices).get(path.as_ref()).map(Arc::clone)
    }
}

impl RecordSource for InMemoryRecordSource {
    type Handle = InMemoryRecordHandle;

    fn open(&self, device_id: &DeviceId) -> io::Result<Self::Handle> {
        let device = self
            .existing_device(device_id.path())
            .ok_or_else(|| io::Error::from(Errno::NOENT))?;
        let delay = {
            let mut it = lock(&device);
            it.counts.open_attempts += 1;
            it.open_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        {
            let mut it = lock(&device);
            if let Some(errno) = it.failures.open {
                return Err(errno.into());
            }
            it.counts.opens += 1;
            it.counts.open_handles += 1;
            it.counts.max_concurrent_open =
                it.counts.max_concurrent_open.max(it.counts.open_handles);
        }
        Ok(InMemoryRecordHandle {
            device,
            handle_id: self.next_handle_id.fetch_add(1, Ordering::Relaxed),
            position: Mutex::new(0),
        })
    }
}

#[derive(Debug)]
pub struct InMemoryRecordHandle {
    device: SharedDevice,
    handle_id: u64,
    position: Mutex<usize>,
}

impl RecordHandle for InMemoryRecordHandle {
    fn bytes_ready(&self) -> io::Result<Option<usize>> {
        let device = lock(&self.device);
        if !device.reports_bytes_ready {
            return Ok(None);
        }
        let position = *lock(&self.position);
        Ok(Some(device.bytes.len().saturating_sub(position)))
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let device = lock(&self.device);
        if let Some(errno) = device.failures.read {
            return Err(errno.into());
        }
        let mut position = lock(&self.position);
        let available = device.bytes.get(*position..).unwrap_or_default();
        if available.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        *position += count;
        Ok(count)
    }

    fn seek_back(&self, count: usize) -> io::Result<()> {
        let mut device = lock(&self.device);
        if let Some(errno) = device.failures.seek {
            device.counts.failed_seeks += 1;
            return Err(errno.into());
        }
        let mut position = lock(&self.position);
        *position = position
            .checked_sub(count)
            .ok_or_else(|| io::Error::from(Errno::INVAL))?;
        device.counts.seeks += 1;
        Ok(())
    }

    fn acquire_grab(&self) -> io::Result<()> {
        let mut device = lock(&self.device);
        if let Some(errno) = device.failures.grab {
            return Err(errno.into());
        }
        if device.grabbed_by.is_some() {
            return Err(Errno::BUSY.into());
        }
        device.grabbed_by = Some(self.handle_id);
        device.counts.grabs += 1;
        Ok(())
    }

    fn release_grab(&self) -> io::Result<()> {
        let mut device = lock(&self.device);
        if device.grabbed_by != Some(self.handle_id) {
            return Err(Errno::INVAL.into());
        }
        // The kernel drops the grab even if the caller sees an error.
        device.grabbed_by = None;
        if let Some(errno) = device.failures.release {
            return Err(errno.into());
        }
        device.counts.releases += 1;
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        let mut device = lock(&self.device);
        // Closing drops a grab still held by this handle, as it does for evdev.
        if device.grabbed_by == Some(self.handle_id) {
            device.grabbed_by = None;
        }
        device.counts.open_handles = device.counts.open_handles.saturating_sub(1);
        if let Some(errno) = device.failures.close {
            return Err(errno.into());
        }
        device.counts.closes += 1;
        Ok(())
    }
}
