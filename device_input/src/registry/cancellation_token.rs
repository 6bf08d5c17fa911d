// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::sync::{Arc,
                atomic::{AtomicBool, Ordering}};
use tokio::sync::Notify;

/// Cooperative cancellation for an [`EventIterator`]. Clones share the same state, so a
/// clone can be handed to another task (or a Ctrl+C handler) to stop the iteration.
///
/// Cancelling is sticky: once cancelled, a token stays cancelled.
///
/// [`EventIterator`]: crate::EventIterator
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Debug, Default)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Returns `true` only for the call that actually cancelled the token.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.inner.cancelled.load(Ordering::SeqCst) }

    /// Resolves once the token is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag, so a cancel racing with this
            // check can't be missed.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
