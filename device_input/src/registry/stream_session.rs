// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! One open device, its attachments, and the reader thread feeding them.
//!
//! # Construction
//!
//! ```text
//! mio::Poll::new() → Waker::new(registry) → open (+ grab) → register fd → spawn reader
//! ```
//!
//! The poll and waker are created first so that running out of descriptors never leaves
//! a grabbed device behind. If the reader can't be spawned the device is released and
//! closed again before the error is returned.
//!
//! # Teardown
//!
//! ```text
//! stop flag → waker.wake() → join reader → release grab (if any) → close
//! ```
//!
//! Joining first guarantees that the reader has dropped its reference to the handle, so
//! the session is the sole owner when it closes it.

use super::reader_thread;
use crate::{AttachmentId, DeviceId, DeviceInputError, EventConsumer, InputEvent,
            RecordHandle, RecordSource, StreamConfig, open_and_grab, release_and_close};
use mio::{Poll, Waker};
use std::{collections::HashMap,
          sync::{Arc, Mutex, MutexGuard, PoisonError,
                 atomic::{AtomicBool, Ordering}},
          thread::JoinHandle};
use tokio::sync::mpsc::UnboundedSender;

/// What an iterator attachment receives from the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PullItem {
    Event(InputEvent),
    /// The reader stopped, nothing else will arrive.
    End,
}

/// Something attached to a session. Both kinds share one reference count, which is
/// simply the number of attachments.
#[derive(Debug, Clone)]
pub(crate) enum Attachment {
    Consumer(EventConsumer),
    Iterator(UnboundedSender<PullItem>),
}

/// State shared between a session and its reader thread.
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) device_id: DeviceId,
    attachments: Mutex<HashMap<AttachmentId, Attachment>>,
    stop_requested: AtomicBool,
    reader_finished: AtomicBool,
}

impl SessionShared {
    #[must_use]
    pub(crate) fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            attachments: Mutex::new(HashMap::new()),
            stop_requested: AtomicBool::new(false),
            reader_finished: AtomicBool::new(false),
        }
    }

    /// Readers must keep running even if a consumer panicked while this was held.
    fn lock_attachments(&self) -> MutexGuard<'_, HashMap<AttachmentId, Attachment>> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds (or replaces) an attachment. An iterator that attaches after the reader has
    /// already stopped is told so right away.
    pub(crate) fn attach(&self, id: AttachmentId, attachment: Attachment) {
        let mut attachments = self.lock_attachments();
        if let Attachment::Iterator(sender) = &attachment
            && self.reader_finished.load(Ordering::SeqCst)
        {
            drop(sender.send(PullItem::End));
        }
        attachments.insert(id, attachment);
    }

    /// Removes an attachment. Returns the number left, or [`None`] if `id` wasn't
    /// attached.
    pub(crate) fn detach(&self, id: AttachmentId) -> Option<usize> {
        let mut attachments = self.lock_attachments();
        attachments.remove(&id)?;
        Some(attachments.len())
    }

    #[must_use]
    pub(crate) fn attachment_count(&self) -> usize { self.lock_attachments().len() }

    /// Copy of the current attachments, so that dispatch never holds the lock.
    #[must_use]
    pub(crate) fn snapshot(&self) -> Vec<Attachment> {
        self.lock_attachments().values().cloned().collect()
    }

    #[must_use]
    pub(crate) fn is_stop_requested(&self) -> bool { self.stop_requested.load(Ordering::SeqCst) }

    #[must_use]
    pub(crate) fn is_reader_running(&self) -> bool { !self.reader_finished.load(Ordering::SeqCst) }

    /// Called by the reader thread on its way out. Every attached iterator gets
    /// [`PullItem::End`].
    pub(crate) fn mark_reader_finished(&self) {
        self.reader_finished.store(true, Ordering::SeqCst);
        for attachment in self.snapshot() {
            if let Attachment::Iterator(sender) = attachment {
                drop(sender.send(PullItem::End));
            }
        }
    }

    pub(crate) fn request_stop(&self) { self.stop_requested.store(true, Ordering::SeqCst); }
}

/// Exactly one of these exists per device in the registry.
pub(crate) struct StreamSession<H: RecordHandle> {
    shared: Arc<SessionShared>,
    handle: Option<Arc<H>>,
    waker: Waker,
    reader: Option<JoinHandle<()>>,
    session_id: u64,
}

impl<H: RecordHandle> StreamSession<H> {
    /// Opens (and maybe grabs) `device` and starts its reader thread.
    ///
    /// # Errors
    ///
    /// [`DeviceInputError::Open`], [`DeviceInputError::Grab`] or
    /// [`DeviceInputError::ReaderSpawn`]. Nothing stays open on error.
    pub(crate) fn start<S>(
        source: &S,
        device: &DeviceId,
        config: &StreamConfig,
        session_id: u64,
    ) -> Result<Self, DeviceInputError>
    where
        S: RecordSource<Handle = H>,
    {
        let reader_spawn_error = |source| DeviceInputError::ReaderSpawn {
            path: device.path().to_path_buf(),
            source,
        };

        let poll = Poll::new().map_err(reader_spawn_error)?;
        let waker = Waker::new(poll.registry(), reader_thread::STOP_WAKER_TOKEN)
            .map_err(reader_spawn_error)?;

        let handle = Arc::new(open_and_grab(source, device)?);
        let shared = Arc::new(SessionShared::new(device.clone()));

        let worker = reader_thread::ReaderWorker::new(
            Arc::clone(&shared),
            Arc::clone(&handle),
            poll,
            config,
        );

        let spawn_result = std::thread::Builder::new()
            .name(format!("{}-{session_id}", config.reader_thread_name_prefix))
            .spawn(move || reader_thread::run_reader_loop(worker));

        match spawn_result {
            Ok(reader) => Ok(Self {
                shared,
                handle: Some(handle),
                waker,
                reader: Some(reader),
                session_id,
            }),
            Err(spawn_error) => {
                // The closure (and the worker's clone of the handle) is gone.
                if let Some(handle) = Arc::into_inner(handle)
                    && let Err(teardown_error) = release_and_close(handle, device)
                {
                    tracing::warn!(
                        message = "Cleaning up after a failed reader spawn failed",
                        device = %device,
                        error = %teardown_error
                    );
                }
                Err(reader_spawn_error(spawn_error))
            }
        }
    }

    #[must_use]
    pub(crate) fn shared(&self) -> &Arc<SessionShared> { &self.shared }

    #[must_use]
    pub(crate) fn session_id(&self) -> u64 { self.session_id }

    /// Stops the reader, then releases and closes the device, using the grab flag this
    /// session was created with.
    ///
    /// # Errors
    ///
    /// [`DeviceInputError::Teardown`].
    pub(crate) fn teardown(mut self) -> Result<(), DeviceInputError> { self.shutdown() }

    fn shutdown(&mut self) -> Result<(), DeviceInputError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.shared.request_stop();
        // Fails only if the poll is already gone, i.e. the reader has exited.
        drop(self.waker.wake());

        if let Some(reader) = self.reader.take()
            && reader.join().is_err()
        {
            tracing::error!(
                message = "Reader thread panicked",
                device = %self.shared.device_id
            );
        }

        match Arc::into_inner(handle) {
            Some(handle) => release_and_close(handle, &self.shared.device_id),
            None => {
                tracing::error!(
                    message = "Device handle still shared after the reader exited, leaking it",
                    device = %self.shared.device_id
                );
                Ok(())
            }
        }
    }
}

/// A session dropped without an explicit teardown (e.g. its registry was dropped) still
/// stops its reader and closes the device.
impl<H: RecordHandle> Drop for StreamSession<H> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(
                message = "Teardown of dropped session failed",
                device = %self.shared.device_id,
                error = %err
            );
        }
    }
}
