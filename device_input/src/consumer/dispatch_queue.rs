// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A serial execution context that jobs are posted to.
//!
//! Jobs posted to one queue run one at a time, in the order they were posted, on the
//! queue's own task or thread. Posting never blocks and never runs the job inline, so
//! the reader thread can hand a batch to a slow consumer without waiting for it.
//!
//! | Constructor                           | Jobs run on                         |
//! | :------------------------------------ | :---------------------------------- |
//! | [`DispatchQueue::on_runtime`]         | a task spawned on a Tokio runtime    |
//! | [`DispatchQueue::on_dedicated_thread`] | a named OS thread owned by the queue |
//!
//! The task or thread exits once every clone of the queue has been dropped and the
//! pending jobs have run.

use std::{fmt::{Debug, Formatter},
          io,
          panic::{AssertUnwindSafe, catch_unwind},
          sync::Arc};
use tokio::{runtime::Handle, sync::mpsc};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
pub struct DispatchQueue {
    label: Arc<str>,
    sender: mpsc::UnboundedSender<Job>,
}

impl Debug for DispatchQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("label", &self.label)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl DispatchQueue {
    /// Runs jobs on a task spawned on `runtime`.
    #[must_use]
    pub fn on_runtime(label: impl Into<Arc<str>>, runtime: &Handle) -> Self {
        let label = label.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let task_label = Arc::clone(&label);
        runtime.spawn(async move {
            while let Some(job) = receiver.recv().await {
                run_job(&task_label, job);
            }
        });
        Self { label, sender }
    }

    /// Runs jobs on the Tokio runtime the caller is running on, if any.
    #[must_use]
    pub fn try_current(label: impl Into<Arc<str>>) -> Option<Self> {
        Handle::try_current()
            .ok()
            .map(|runtime| Self::on_runtime(label, &runtime))
    }

    /// Runs jobs on a new OS thread named `label`.
    ///
    /// # Errors
    ///
    /// The thread could not be spawned.
    pub fn on_dedicated_thread(label: impl Into<Arc<str>>) -> io::Result<Self> {
        let label = label.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let thread_label = Arc::clone(&label);
        std::thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    run_job(&thread_label, job);
                }
            })?;
        Ok(Self { label, sender })
    }

    /// Queues `job`. Returns `false` if the queue's task or thread is gone, in which case
    /// the job is dropped without running.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.sender.send(Box::new(job)).is_ok()
    }

    #[must_use]
    pub fn label(&self) -> &str { &self.label }
}

/// A panicking job must not take the rest of the queue down with it.
fn run_job(label: &str, job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!(
            message = "Job posted to dispatch queue panicked",
            queue = label
        );
    }
}
