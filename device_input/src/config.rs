// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words epoll FIONREAD

//! Tuning knobs for the reader threads spawned by [`DeviceRegistry`].
//!
//! [`DeviceRegistry`]: crate::DeviceRegistry

use std::time::Duration;

/// Default interval at which sources that can't be registered with [`mio`] (regular
/// files, in-memory sources) are polled for new bytes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default upper bound on how long the reader blocks on an [`mio`] registered device
/// before re-checking it. Epoll is edge triggered, so this is a safety net.
pub const DEFAULT_EVENTED_BACKSTOP: Duration = Duration::from_millis(250);

/// Default number of records read at once when the source can't report how many bytes
/// are ready (evdev devices don't support `FIONREAD`).
pub const DEFAULT_FALLBACK_READ_RECORDS: usize = 64;

/// Default thread name prefix. The session id is appended.
pub const DEFAULT_READER_THREAD_NAME_PREFIX: &str = "device-input-reader";

/// Configuration for the per-session reader thread.
///
/// ```
/// use r3bl_device_input::StreamConfig;
/// use std::time::Duration;
///
/// let config = StreamConfig::default().with_poll_interval(Duration::from_millis(5));
/// assert_eq!(config.poll_interval, Duration::from_millis(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// How often to check sources that don't support readiness notifications.
    pub poll_interval: Duration,
    /// Maximum time to block on a source that does support readiness notifications.
    pub evented_backstop: Duration,
    /// Records per read when the number of ready bytes is unknown.
    pub fallback_read_records: usize,
    /// Reader thread names are `{prefix}-{session_id}`.
    pub reader_thread_name_prefix: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            evented_backstop: DEFAULT_EVENTED_BACKSTOP,
            fallback_read_records: DEFAULT_FALLBACK_READ_RECORDS,
            reader_thread_name_prefix: DEFAULT_READER_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl StreamConfig {
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_evented_backstop(mut self, evented_backstop: Duration) -> Self {
        self.evented_backstop = evented_backstop;
        self
    }

    /// Zero is bumped to one, a read must be able to return at least one record.
    #[must_use]
    pub fn with_fallback_read_records(mut self, records: usize) -> Self {
        self.fallback_read_records = records.max(1);
        self
    }

    #[must_use]
    pub fn with_reader_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reader_thread_name_prefix = prefix.into();
        self
    }
}
