// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use crate::{AttachmentId, DeviceId, DispatchQueue, InputEvent};
use std::{fmt::{Debug, Formatter},
          hash::{Hash, Hasher},
          sync::Arc};

/// Handler called with each batch of events read from a device.
pub type EventHandler = dyn Fn(&DeviceId, &[InputEvent]) + Send + Sync + 'static;

/// A push mode registration.
///
/// Equality and hashing use the [`AttachmentId`] only. Two consumers built from the same
/// handler and queue are different registrations. A clone is the *same* registration,
/// which is how it can be handed to [`DeviceRegistry::detach`] later.
///
/// The handler always runs on [`Self::queue`], never on the thread that read the events.
///
/// [`DeviceRegistry::detach`]: crate::DeviceRegistry::detach
#[derive(Clone)]
pub struct EventConsumer {
    id: AttachmentId,
    queue: DispatchQueue,
    handler: Arc<EventHandler>,
}

impl EventConsumer {
    pub fn new(
        queue: DispatchQueue,
        handler: impl Fn(&DeviceId, &[InputEvent]) + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: AttachmentId::new(),
            queue,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn id(&self) -> AttachmentId { self.id }

    #[must_use]
    pub fn queue(&self) -> &DispatchQueue { &self.queue }

    /// Posts the batch to the consumer's queue. Returns `false` if the queue is gone.
    pub fn notify(&self, device: &DeviceId, events: Arc<[InputEvent]>) -> bool {
        let handler = Arc::clone(&self.handler);
        let device = device.clone();
        self.queue.post(move || handler(&device, &events))
    }
}

impl PartialEq for EventConsumer {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for EventConsumer {}

impl Hash for EventConsumer {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

impl Debug for EventConsumer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventConsumer")
            .field("id", &self.id)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
