// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EINTR ENODEV epoll realign

//! The per session reader thread.
//!
//! Each iteration of [`ReaderWorker::poll_once`] blocks in [`mio::Poll::poll`] until the
//! device is readable, the session asks it to stop, or the timeout expires, and then
//! drains every byte that is ready:
//!
//! ```text
//! bytes ready ──▶ read into reusable buffer ──▶ split whole records │ leftover
//!                                                      │                │
//!                                                      ▼                ▼
//!                                         parse, snapshot, dispatch   seek back
//! ```
//!
//! # Realignment
//!
//! A read can end in the middle of a record (this never happens with evdev, which only
//! hands out whole records, but it does with regular files). The leftover bytes are
//! pushed back with a relative seek, so the next read starts on a record boundary. If the
//! seek fails, the leftover bytes are dropped and a warning is logged.
//!
//! # Errors
//!
//! | Error                | Reaction                                            |
//! | :------------------- | :-------------------------------------------------- |
//! | `EINTR` from poll    | poll again                                          |
//! | other poll error     | log, stop the thread                                |
//! | `ENODEV` from read   | log, stop the thread (device was unplugged)         |
//! | other read error     | log, skip this cycle                                |
//! | unknown record kind  | silently dropped                                    |
//!
//! When the thread stops on its own, attached iterators receive [`PullItem::End`]. The
//! session itself stays in the registry until its last attachment detaches.
//!
//! [`PullItem::End`]: super::PullItem::End

use super::{Attachment, SessionShared};
use crate::{Continuation, DEBUG_DEVICE_INPUT_SHOW_READER, RECORD_SIZE, Readiness,
            RecordHandle, StreamConfig, parse_records};
use mio::{Events, Poll, Token};
use rustix::io::Errno;
use std::{io::{self, ErrorKind},
          sync::Arc,
          time::Duration};

/// Token the device descriptor is registered under.
pub(crate) const DEVICE_TOKEN: Token = Token(0);

/// Token of the [`mio::Waker`] used to interrupt the poll on teardown.
pub(crate) const STOP_WAKER_TOKEN: Token = Token(1);

/// Capacity for the [`mio::Events`] buffer. Only two sources are ever registered.
const EVENTS_CAPACITY: usize = 4;

/// Identifies which source woke the poll up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReaderToken {
    Device,
    StopWaker,
    Unknown,
}

impl ReaderToken {
    #[must_use]
    pub(crate) const fn from_token(token: Token) -> Self {
        match token.0 {
            0 => Self::Device,
            1 => Self::StopWaker,
            _ => Self::Unknown,
        }
    }
}

/// Everything the reader thread owns.
pub(crate) struct ReaderWorker<H: RecordHandle> {
    shared: Arc<SessionShared>,
    handle: Arc<H>,
    poll: Poll,
    ready_events_buffer: Events,
    readiness: Readiness,
    timeout: Duration,
    fallback_read_bytes: usize,
    read_buffer: Vec<u8>,
}

impl<H: RecordHandle> ReaderWorker<H> {
    /// Registers `handle` with `poll`. A handle that can't be registered is polled at
    /// [`StreamConfig::poll_interval`] instead.
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        handle: Arc<H>,
        poll: Poll,
        config: &StreamConfig,
    ) -> Self {
        let readiness = handle
            .register_readiness(poll.registry(), DEVICE_TOKEN)
            .unwrap_or_else(|err| {
                tracing::warn!(
                    message = "Registering device for readiness failed, polling it instead",
                    device = %shared.device_id,
                    error = %err
                );
                Readiness::Polled
            });

        let timeout = match readiness {
            Readiness::Evented => config.evented_backstop,
            Readiness::Polled => config.poll_interval,
        };

        Self {
            shared,
            handle,
            poll,
            ready_events_buffer: Events::with_capacity(EVENTS_CAPACITY),
            readiness,
            timeout,
            fallback_read_bytes: config.fallback_read_records.max(1) * RECORD_SIZE,
            read_buffer: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn readiness(&self) -> Readiness { self.readiness }

    /// One wait plus one drain.
    pub(crate) fn poll_once(&mut self) -> Continuation {
        if self.shared.is_stop_requested() {
            return Continuation::Stop;
        }

        if let Err(err) = self
            .poll
            .poll(&mut self.ready_events_buffer, Some(self.timeout))
        {
            if err.kind() == ErrorKind::Interrupted {
                return Continuation::Continue;
            }
            tracing::error!(
                message = "Polling the device failed, stopping its reader",
                device = %self.shared.device_id,
                error = %err
            );
            return Continuation::Stop;
        }

        if self.shared.is_stop_requested() {
            return Continuation::Stop;
        }

        for event in &self.ready_events_buffer {
            if ReaderToken::from_token(event.token()) == ReaderToken::Unknown {
                tracing::warn!(
                    message = "Poll returned an unknown token",
                    token = event.token().0
                );
            }
        }

        // Polled handles have nothing registered, so a timeout is their wake up too.
        self.drain_available()
    }

    /// Reads until the handle has nothing left (or reports an error).
    fn drain_available(&mut self) -> Continuation {
        loop {
            let wanted = match self.handle.bytes_ready() {
                Ok(Some(0)) => return Continuation::Continue,
                Ok(Some(count)) => count,
                Ok(None) => self.fallback_read_bytes,
                Err(err) => return self.on_read_error(&err),
            };

            self.read_buffer.resize(wanted, 0);
            let read = match self.handle.read(&mut self.read_buffer) {
                Ok(0) => return Continuation::Continue,
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    return Continuation::Continue;
                }
                Err(err) => return self.on_read_error(&err),
            };

            let leftover = read % RECORD_SIZE;
            let whole = read - leftover;

            if leftover > 0 {
                self.realign(leftover);
            }

            if whole == 0 {
                return Continuation::Continue;
            }

            self.dispatch(&self.read_buffer[..whole]);

            if read < wanted {
                return Continuation::Continue;
            }
        }
    }

    fn realign(&self, leftover: usize) {
        match self.handle.seek_back(leftover) {
            Ok(()) => {
                DEBUG_DEVICE_INPUT_SHOW_READER.then(|| {
                    tracing::trace!(
                        message = "Pushed back partial record",
                        device = %self.shared.device_id,
                        leftover
                    );
                });
            }
            Err(err) => {
                tracing::warn!(
                    message = "Seeking back over a partial record failed, dropping its bytes",
                    device = %self.shared.device_id,
                    dropped_bytes = leftover,
                    error = %err
                );
            }
        }
    }

    fn on_read_error(&self, err: &io::Error) -> Continuation {
        if err.raw_os_error() == Some(Errno::NODEV.raw_os_error()) {
            tracing::error!(
                message = "Device went away, stopping its reader",
                device = %self.shared.device_id,
                error = %err
            );
            return Continuation::Stop;
        }
        tracing::warn!(
            message = "Reading from device failed",
            device = %self.shared.device_id,
            error = %err
        );
        Continuation::Continue
    }

    fn dispatch(&self, bytes: &[u8]) {
        let events: Arc<[_]> = parse_records(bytes).collect();

        DEBUG_DEVICE_INPUT_SHOW_READER.then(|| {
            tracing::trace!(
                message = "Read records",
                device = %self.shared.device_id,
                records = bytes.len() / RECORD_SIZE,
                events = events.len()
            );
        });

        if events.is_empty() {
            return;
        }

        for attachment in self.shared.snapshot() {
            match attachment {
                Attachment::Consumer(consumer) => {
                    if !consumer.notify(&self.shared.device_id, Arc::clone(&events)) {
                        tracing::warn!(
                            message = "Consumer queue is gone, batch dropped",
                            device = %self.shared.device_id,
                            queue = consumer.queue().label()
                        );
                    }
                }
                Attachment::Iterator(sender) => {
                    for event in events.iter() {
                        if sender.send(super::PullItem::Event(*event)).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Marks the reader as finished when its loop exits, even by unwinding.
struct TerminationGuard {
    shared: Arc<SessionShared>,
}

impl Drop for TerminationGuard {
    fn drop(&mut self) { self.shared.mark_reader_finished(); }
}

/// Body of the reader thread.
pub(crate) fn run_reader_loop<H: RecordHandle>(mut worker: ReaderWorker<H>) {
    let _guard = TerminationGuard {
        shared: Arc::clone(&worker.shared),
    };
    tracing::debug!(
        message = "Reader started",
        device = %worker.shared.device_id,
        readiness = ?worker.readiness()
    );
    while worker.poll_once() == Continuation::Continue {}
    tracing::debug!(message = "Reader stopped", device = %worker.shared.device_id);
}
