// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EBUSY

//! Typed failures returned to callers.
//!
//! Only two kinds of failure ever reach a caller:
//!
//! 1. Session construction failures (open, grab, reader thread spawn). These are returned
//!    to the first attacher and no session is left behind.
//! 2. Teardown failures (release grab, close). These are returned to whoever triggered
//!    the teardown, i.e. the detach that dropped the attachment count to zero.
//!
//! Mid-stream read errors and malformed records are logged by the reader thread and are
//! never surfaced here.

use std::{io, path::PathBuf};

/// The step of a teardown that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TeardownStage {
    #[strum(serialize = "release grab")]
    ReleaseGrab,
    #[strum(serialize = "close")]
    Close,
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DeviceInputError {
    #[error("Failed to open input device {}", path.display())]
    #[diagnostic(
        code(r3bl_device_input::open),
        help(
            "Check that the device exists and that the current user can read it \
             (usually by being a member of the `input` group)"
        )
    )]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to grab input device {}", path.display())]
    #[diagnostic(
        code(r3bl_device_input::grab),
        help(
            "EBUSY means another process already grabbed the device. \
             Use a non grabbing DeviceId if exclusive access isn't needed"
        )
    )]
    Grab {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start the reader for input device {}", path.display())]
    #[diagnostic(
        code(r3bl_device_input::reader_spawn),
        help(
            "The system may have reached its thread or file descriptor limit - \
             check `ulimit -u` and `ulimit -n`"
        )
    )]
    ReaderSpawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to {stage} while tearing down input device {}", path.display())]
    #[diagnostic(code(r3bl_device_input::teardown))]
    Teardown {
        path: PathBuf,
        stage: TeardownStage,
        #[source]
        source: io::Error,
    },

    #[error("Device registry mutex poisoned ({which})")]
    #[diagnostic(
        code(r3bl_device_input::mutex_poisoned),
        help(
            "A prior thread panicked while holding a registry lock. \
             Consider restarting the application."
        )
    )]
    MutexPoisoned { which: &'static str },

    #[error("The blocking task attaching or detaching the iterator failed")]
    #[diagnostic(code(r3bl_device_input::blocking_task))]
    BlockingTask(#[source] tokio::task::JoinError),
}

impl DeviceInputError {
    /// The raw OS error of the underlying syscall, if there is one.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Open { source, .. }
            | Self::Grab { source, .. }
            | Self::ReaderSpawn { source, .. }
            | Self::Teardown { source, .. } => source.raw_os_error(),
            Self::MutexPoisoned { .. } | Self::BlockingTask(_) => None,
        }
    }
}
