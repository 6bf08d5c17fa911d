// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Small shared types used by the reader thread and the registry.

/// Set to `true` to trace every read, realignment and dispatch performed by the reader
/// threads. Very noisy, meant for debugging a misbehaving device.
pub const DEBUG_DEVICE_INPUT_SHOW_READER: bool = false;

/// Tells a loop whether to keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Continuation {
    /// Continue to the next iteration.
    #[default]
    Continue,

    /// Stop processing and exit the loop/thread.
    Stop,
}
