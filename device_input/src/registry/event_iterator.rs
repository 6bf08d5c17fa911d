// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Pull mode access to a device.
//!
//! An [`EventIterator`] attaches itself lazily, on the first call to
//! [`EventIterator::next`]. From then on it is an attachment of the device's session just
//! like a push consumer, and the reader thread hands it every event it parses. Many
//! iterators can pull from the same device at once, each one sees every event.
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted ──first next()──▶ Streaming ──cancel / reader ended / finish()──▶ Finished
//!      │                           │
//!      └── open/grab error ◀───────┘ (error returned, state stays NotStarted)
//! ```
//!
//! The attachment is owned by an [`AttachGuard`], whose [`Drop`] detaches. Whichever of
//! cancellation, the end of the stream, [`EventIterator::finish`] or dropping the
//! iterator happens first performs the one and only detach, the rest find nothing left
//! to release.
//!
//! Attaching and detaching both take the registry lock, and the last detach joins the
//! reader thread and closes the device. Neither ever runs on an async worker thread:
//! [`EventIterator::next`] and [`EventIterator::finish`] await them on Tokio's blocking
//! pool, and a guard dropped inside a runtime hands its release to that pool too.

use super::{CancellationToken, DetachOutcome, DeviceRegistry, PullItem};
use crate::{AttachmentId, DeviceId, DeviceInputError, InputEvent, RecordSource};
use futures_core::Stream;
use std::{fmt::{Debug, Formatter},
          sync::Arc};
use tokio::{runtime::Handle, sync::mpsc::UnboundedReceiver};

/// A cancellable async iterator over the events of one device. Created by
/// [`DeviceRegistry::events`].
///
/// ```no_run
/// use r3bl_device_input::{DeviceId, DeviceRegistry};
///
/// # async fn run() -> miette::Result<()> {
/// let mut events = DeviceRegistry::global().events(DeviceId::new("/dev/input/event3"));
/// let token = events.cancellation_token();
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     token.cancel();
/// });
/// while let Some(event) = events.next().await? {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventIterator<S: RecordSource> {
    registry: Arc<DeviceRegistry<S>>,
    device: DeviceId,
    cancellation: CancellationToken,
    state: IteratorState<S>,
}

enum IteratorState<S: RecordSource> {
    NotStarted,
    Streaming {
        guard: AttachGuard<S>,
        receiver: UnboundedReceiver<PullItem>,
    },
    Finished,
}

impl<S: RecordSource> EventIterator<S> {
    pub(crate) fn new(registry: Arc<DeviceRegistry<S>>, device: DeviceId) -> Self {
        Self {
            registry,
            device,
            cancellation: CancellationToken::new(),
            state: IteratorState::NotStarted,
        }
    }

    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the iterator was cancelled (before or during the wait), the
    /// reader stopped (e.g. the device was unplugged), or [`Self::finish`] was called.
    /// Each of these detaches the iterator from the device.
    ///
    /// # Errors
    ///
    /// Only on the call that attaches, i.e. the first one: the device couldn't be opened,
    /// grabbed or read from ([`DeviceInputError::Open`], [`DeviceInputError::Grab`],
    /// [`DeviceInputError::ReaderSpawn`]), or the attaching task failed
    /// ([`DeviceInputError::BlockingTask`]). The next call tries to attach again.
    pub async fn next(&mut self) -> Result<Option<InputEvent>, DeviceInputError> {
        if self.cancellation.is_cancelled() {
            self.finalize_and_log().await;
            return Ok(None);
        }

        if matches!(self.state, IteratorState::NotStarted) {
            let (guard, receiver) = self.attach().await?;
            self.state = IteratorState::Streaming { guard, receiver };
        }

        let cancellation = &self.cancellation;
        let IteratorState::Streaming { receiver, .. } = &mut self.state else {
            return Ok(None);
        };

        let item = tokio::select! {
            biased;
            () = cancellation.cancelled() => None,
            item = receiver.recv() => item,
        };

        match item {
            Some(PullItem::Event(event)) => Ok(Some(event)),
            Some(PullItem::End) | None => {
                self.finalize_and_log().await;
                Ok(None)
            }
        }
    }

    /// Detaches now, instead of on the next call or on drop. Any teardown failure is
    /// returned here (when this was the last attachment of the device).
    ///
    /// # Errors
    ///
    /// [`DeviceInputError::Teardown`], [`DeviceInputError::MutexPoisoned`] or
    /// [`DeviceInputError::BlockingTask`].
    pub async fn finish(&mut self) -> Result<DetachOutcome, DeviceInputError> {
        self.finalize().await
    }

    /// Requests cancellation. The iterator detaches on its next (or current) wait, or when
    /// dropped. Returns `false` if it was already cancelled.
    pub fn cancel(&self) -> bool { self.cancellation.cancel() }

    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.cancellation.is_cancelled() }

    /// A handle that cancels this iterator from elsewhere.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken { self.cancellation.clone() }

    #[must_use]
    pub fn device(&self) -> &DeviceId { &self.device }

    /// Whether the iterator currently holds an attachment.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        matches!(self.state, IteratorState::Streaming { .. })
    }

    /// Adapts the iterator into a [`Stream`]. The stream ends where [`Self::next`] would
    /// return `Ok(None)`, and ends right after yielding an error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<InputEvent, DeviceInputError>> {
        async_stream::stream! {
            loop {
                match self.next().await {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }

    /// Attaches on a blocking thread: opening and grabbing happen under the registry lock,
    /// and a device still being torn down is waited for. The guard is built on that thread
    /// too, so if this future is dropped midway the finished attachment is still released.
    async fn attach(
        &self,
    ) -> Result<(AttachGuard<S>, UnboundedReceiver<PullItem>), DeviceInputError> {
        let registry = Arc::clone(&self.registry);
        let device = self.device.clone();
        tokio::task::spawn_blocking(move || {
            let (attachment_id, session_id, receiver) = registry.attach_iterator(&device)?;
            let guard = AttachGuard::new(registry, device, attachment_id, session_id);
            Ok::<_, DeviceInputError>((guard, receiver))
        })
        .await
        .map_err(DeviceInputError::BlockingTask)?
    }

    /// The state is `Finished` before the first await, so a future dropped midway still
    /// leaves the detach to the blocking task it already handed the guard to.
    async fn finalize(&mut self) -> Result<DetachOutcome, DeviceInputError> {
        match std::mem::replace(&mut self.state, IteratorState::Finished) {
            IteratorState::Streaming { mut guard, .. } => {
                tokio::task::spawn_blocking(move || guard.release())
                    .await
                    .map_err(DeviceInputError::BlockingTask)?
            }
            IteratorState::NotStarted | IteratorState::Finished => {
                Ok(DetachOutcome::NotAttached)
            }
        }
    }

    async fn finalize_and_log(&mut self) {
        if let Err(err) = self.finalize().await {
            tracing::warn!(
                message = "Detaching event iterator failed",
                device = %self.device,
                error = %err
            );
        }
    }
}

impl<S: RecordSource> Debug for EventIterator<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIterator")
            .field("device", &self.device)
            .field("cancelled", &self.is_cancelled())
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

/// Owns one iterator attachment and detaches it exactly once, either through
/// [`AttachGuard::release`] or on drop.
///
/// Dropped inside a Tokio runtime, the guard detaches on the runtime's blocking pool and
/// returns right away. Dropped anywhere else, it detaches on the spot.
#[allow(missing_debug_implementations)]
pub struct AttachGuard<S: RecordSource> {
    attachment: Option<IteratorAttachment<S>>,
}

struct IteratorAttachment<S: RecordSource> {
    registry: Arc<DeviceRegistry<S>>,
    device: DeviceId,
    attachment_id: AttachmentId,
    session_id: u64,
}

impl<S: RecordSource> AttachGuard<S> {
    fn new(
        registry: Arc<DeviceRegistry<S>>,
        device: DeviceId,
        attachment_id: AttachmentId,
        session_id: u64,
    ) -> Self {
        Self {
            attachment: Some(IteratorAttachment {
                registry,
                device,
                attachment_id,
                session_id,
            }),
        }
    }

    /// Detaches, the first time only.
    ///
    /// # Errors
    ///
    /// [`DeviceInputError::Teardown`] or [`DeviceInputError::MutexPoisoned`].
    pub fn release(&mut self) -> Result<DetachOutcome, DeviceInputError> {
        match self.attachment.take() {
            Some(attachment) => attachment.detach(),
            None => Ok(DetachOutcome::NotAttached),
        }
    }
}

impl<S: RecordSource> IteratorAttachment<S> {
    fn detach(self) -> Result<DetachOutcome, DeviceInputError> {
        self.registry.detach_attachment(
            &self.device,
            self.attachment_id,
            Some(self.session_id),
        )
    }

    fn detach_and_log(self) {
        let device = self.device.clone();
        if let Err(err) = self.detach() {
            tracing::warn!(
                message = "Detaching dropped event iterator failed",
                device = %device,
                error = %err
            );
        }
    }
}

impl<S: RecordSource> Drop for AttachGuard<S> {
    fn drop(&mut self) {
        let Some(attachment) = self.attachment.take() else {
            return;
        };
        match Handle::try_current() {
            // A runtime that is shutting down drops this task unrun. The registry then
            // closes the device when its last reference goes away.
            Ok(runtime) => drop(runtime.spawn_blocking(move || attachment.detach_and_log())),
            Err(_) => attachment.detach_and_log(),
        }
    }
}
