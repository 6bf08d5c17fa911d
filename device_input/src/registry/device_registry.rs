// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The reference counted map from [`DeviceId`] to its one stream session.
//!
//! # Locking
//!
//! One [`Mutex`] guards the map. Building a session (open, grab, spawn the reader) happens
//! while it is held, so two racing first attaches for one device produce exactly one
//! session and the loser simply joins it. Tearing a session down (stop the reader,
//! release, close) happens *after* the lock is dropped, and the device is parked in a
//! "tearing down" set meanwhile. A first attach that finds its device parked there waits
//! on a [`Condvar`] until the close is done, so a device never has two open descriptors.
//!
//! ```text
//! attach ──▶ lock ──▶ wait while tearing down ──▶ get or start session ──▶ add attachment
//! detach ──▶ lock ──▶ remove attachment ──▶ count == 0? ──▶ remove entry, park device
//!                                                               │ unlock
//!                                                               ▼
//!                                            teardown ──▶ unpark device, notify waiters
//! ```

use super::{Attachment, EventIterator, PullItem, StreamSession};
use crate::{AttachmentId, DeviceId, DeviceInputError, EventConsumer, OsRecordSource,
            RecordSource, StreamConfig};
use std::{collections::{HashMap, HashSet, hash_map::Entry},
          fmt::{Debug, Formatter},
          sync::{Arc, Condvar, LazyLock, Mutex, MutexGuard, PoisonError,
                 atomic::{AtomicU64, Ordering}}};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

/// Result of a detach that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachOutcome {
    /// Nothing was attached under that identity (e.g. it was already detached).
    NotAttached,
    /// Detached, other attachments keep the session alive.
    Detached { remaining: usize },
    /// That was the last attachment. The reader was stopped and the device released and
    /// closed.
    TornDown,
}

/// Read only snapshot of a live session, returned by [`DeviceRegistry::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// The identifier the session was created with (its grab flag is the one in effect).
    pub device_id: DeviceId,
    pub attachment_count: usize,
    pub grabbed: bool,
    pub session_id: u64,
    /// `false` once the reader stopped on its own, e.g. because the device was unplugged.
    pub reader_running: bool,
}

struct RegistryMap<S: RecordSource> {
    sessions: HashMap<DeviceId, StreamSession<S::Handle>>,
    tearing_down: HashSet<DeviceId>,
}

/// Shares one stream session per device between every push consumer and pull iterator
/// attached to it.
///
/// A registry is an ordinary value: create as many as needed (tests create one per test
/// with an [`InMemoryRecordSource`]). [`DeviceRegistry::global`] offers a process wide one
/// for real devices.
///
/// Dropping a registry tears down whatever sessions it still holds.
///
/// [`InMemoryRecordSource`]: crate::InMemoryRecordSource
pub struct DeviceRegistry<S: RecordSource> {
    source: S,
    config: StreamConfig,
    inner: Mutex<RegistryMap<S>>,
    teardown_finished: Condvar,
    next_session_id: AtomicU64,
}

impl<S: RecordSource> Debug for DeviceRegistry<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("config", &self.config)
            .field("active_devices", &self.active_devices())
            .finish_non_exhaustive()
    }
}

static GLOBAL_REGISTRY: LazyLock<Arc<DeviceRegistry<OsRecordSource>>> =
    LazyLock::new(|| DeviceRegistry::new(OsRecordSource));

impl DeviceRegistry<OsRecordSource> {
    /// The process wide registry for real devices. Nothing in this crate uses it
    /// implicitly.
    #[must_use]
    pub fn global() -> Arc<Self> { Arc::clone(&GLOBAL_REGISTRY) }
}

impl<S: RecordSource> DeviceRegistry<S> {
    #[must_use]
    pub fn new(source: S) -> Arc<Self> { Self::with_config(source, StreamConfig::default()) }

    #[must_use]
    pub fn with_config(source: S, config: StreamConfig) -> Arc<Self> {
        Arc::new(Self {
            source,
            config,
            inner: Mutex::new(RegistryMap {
                sessions: HashMap::new(),
                tearing_down: HashSet::new(),
            }),
            teardown_finished: Condvar::new(),
            next_session_id: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn source(&self) -> &S { &self.source }

    #[must_use]
    pub fn config(&self) -> &StreamConfig { &self.config }

    /// Attaches `consumer` to `device`, opening (and grabbing, if `device` asks for it)
    /// the device if this is its first attachment. Every batch of events read afterwards
    /// is posted to the consumer's queue.
    ///
    /// Attaching a consumer that is already attached is a no-op. If a session for the
    /// same path already exists, its grab flag wins over the one in `device`.
    ///
    /// # Errors
    ///
    /// Session construction failures ([`DeviceInputError::Open`],
    /// [`DeviceInputError::Grab`], [`DeviceInputError::ReaderSpawn`]) when this is the
    /// first attachment, or [`DeviceInputError::MutexPoisoned`].
    pub fn attach(
        self: &Arc<Self>,
        device: &DeviceId,
        consumer: EventConsumer,
    ) -> Result<SessionHandle<S>, DeviceInputError> {
        let attachment_id = consumer.id();
        let session_id =
            self.attach_attachment(device, attachment_id, Attachment::Consumer(consumer))?;
        Ok(SessionHandle {
            registry: Arc::clone(self),
            device: device.clone(),
            attachment_id,
            session_id,
        })
    }

    /// Detaches `consumer` from `device`. The last detach tears the session down, and
    /// any failure to release or close is returned to this caller.
    ///
    /// # Errors
    ///
    /// [`DeviceInputError::Teardown`] or [`DeviceInputError::MutexPoisoned`].
    pub fn detach(
        &self,
        device: &DeviceId,
        consumer: &EventConsumer,
    ) -> Result<DetachOutcome, DeviceInputError> {
        self.detach_attachment(device, consumer.id(), None)
    }

    /// Peeks at the session for `device`, without side effects.
    #[must_use]
    pub fn lookup(&self, device: &DeviceId) -> Option<ActiveSession> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.sessions.get(device).map(|session| {
            let shared = session.shared();
            ActiveSession {
                device_id: shared.device_id.clone(),
                attachment_count: shared.attachment_count(),
                grabbed: shared.device_id.grabs_device(),
                session_id: session.session_id(),
                reader_running: shared.is_reader_running(),
            }
        })
    }

    /// Every device that currently has a session.
    #[must_use]
    pub fn active_devices(&self) -> Vec<DeviceId> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.sessions.keys().cloned().collect()
    }

    /// A pull mode iterator over the events of `device`. Nothing is opened until the
    /// first call to [`EventIterator::next`].
    #[must_use]
    pub fn events(self: &Arc<Self>, device: DeviceId) -> EventIterator<S> {
        EventIterator::new(Arc::clone(self), device)
    }

    /// Attaches a new iterator. Returns its identity, the session id, and the receiving
    /// end of its channel.
    pub(crate) fn attach_iterator(
        &self,
        device: &DeviceId,
    ) -> Result<(AttachmentId, u64, UnboundedReceiver<PullItem>), DeviceInputError> {
        let attachment_id = AttachmentId::new();
        let (sender, receiver) = unbounded_channel();
        let session_id =
            self.attach_attachment(device, attachment_id, Attachment::Iterator(sender))?;
        Ok((attachment_id, session_id, receiver))
    }

    fn lock_map(&self) -> Result<MutexGuard<'_, RegistryMap<S>>, DeviceInputError> {
        self.inner
            .lock()
            .map_err(|_| DeviceInputError::MutexPoisoned { which: "device registry" })
    }

    fn attach_attachment(
        &self,
        device: &DeviceId,
        attachment_id: AttachmentId,
        attachment: Attachment,
    ) -> Result<u64, DeviceInputError> {
        let map = self.lock_map()?;
        let mut map = self
            .teardown_finished
            .wait_while(map, |map| map.tearing_down.contains(device))
            .map_err(|_| DeviceInputError::MutexPoisoned { which: "device registry" })?;

        let session = match map.sessions.entry(device.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                let session =
                    StreamSession::start(&self.source, device, &self.config, session_id)?;
                tracing::debug!(
                    message = "Started input device session",
                    device = %device,
                    session_id,
                    grab = device.grabs_device()
                );
                entry.insert(session)
            }
        };

        session.shared().attach(attachment_id, attachment);
        Ok(session.session_id())
    }

    /// Removes one attachment. When `session_id` is given, only the session with that id
    /// is touched, so a stale handle can't detach from a newer session.
    pub(crate) fn detach_attachment(
        &self,
        device: &DeviceId,
        attachment_id: AttachmentId,
        session_id: Option<u64>,
    ) -> Result<DetachOutcome, DeviceInputError> {
        let mut map = self.lock_map()?;

        let Some(session) = map.sessions.get(device) else {
            return Ok(DetachOutcome::NotAttached);
        };
        if session_id.is_some_and(|it| it != session.session_id()) {
            return Ok(DetachOutcome::NotAttached);
        }
        match session.shared().detach(attachment_id) {
            None => return Ok(DetachOutcome::NotAttached),
            Some(remaining) if remaining > 0 => {
                return Ok(DetachOutcome::Detached { remaining });
            }
            Some(_) => {}
        }

        let Some(session) = map.sessions.remove(device) else {
            return Ok(DetachOutcome::NotAttached);
        };
        map.tearing_down.insert(device.clone());
        drop(map);

        let _parked = TeardownInProgress {
            registry: self,
            device,
        };
        let session_id = session.session_id();
        session.teardown()?;
        tracing::debug!(
            message = "Tore down input device session",
            device = %device,
            session_id
        );
        Ok(DetachOutcome::TornDown)
    }
}

/// Unparks a device once its teardown is over, however it ended.
struct TeardownInProgress<'a, S: RecordSource> {
    registry: &'a DeviceRegistry<S>,
    device: &'a DeviceId,
}

impl<S: RecordSource> Drop for TeardownInProgress<'_, S> {
    fn drop(&mut self) {
        let mut map = self
            .registry
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.tearing_down.remove(self.device);
        drop(map);
        self.registry.teardown_finished.notify_all();
    }
}

/// Returned by [`DeviceRegistry::attach`]. Identifies one push consumer attachment to one
/// session.
///
/// Dropping the handle does *not* detach, a consumer stays attached until
/// [`SessionHandle::detach`] or [`DeviceRegistry::detach`] is called. Two handles are
/// equal when they refer to the same session.
pub struct SessionHandle<S: RecordSource> {
    registry: Arc<DeviceRegistry<S>>,
    device: DeviceId,
    attachment_id: AttachmentId,
    session_id: u64,
}

impl<S: RecordSource> SessionHandle<S> {
    #[must_use]
    pub fn device(&self) -> &DeviceId { &self.device }

    #[must_use]
    pub fn session_id(&self) -> u64 { self.session_id }

    #[must_use]
    pub fn attachment_id(&self) -> AttachmentId { self.attachment_id }

    /// Whether the session this handle was issued for is still in the registry.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .lookup(&self.device)
            .is_some_and(|it| it.session_id == self.session_id)
    }

    /// Attachments of the session this handle was issued for, if it is still active.
    #[must_use]
    pub fn attachment_count(&self) -> Option<usize> {
        self.registry
            .lookup(&self.device)
            .filter(|it| it.session_id == self.session_id)
            .map(|it| it.attachment_count)
    }

    /// Detaches the consumer this handle was issued for.
    ///
    /// # Errors
    ///
    /// Same as [`DeviceRegistry::detach`].
    pub fn detach(self) -> Result<DetachOutcome, DeviceInputError> {
        self.registry.detach_attachment(
            &self.device,
            self.attachment_id,
            Some(self.session_id),
        )
    }
}

impl<S: RecordSource> PartialEq for SessionHandle<S> {
    fn eq(&self, other: &Self) -> bool {
        self.device == other.device && self.session_id == other.session_id
    }
}

impl<S: RecordSource> Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("device", &self.device)
            .field("attachment_id", &self.attachment_id)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
