// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Thin layer over the raw syscalls: `errno` handling, `EINTR` retries, and the
//! exclusive access ("grab") policy.

// Attach sources.
pub mod grab;
pub mod retry;

// Re-export.
pub use grab::*;
pub use retry::*;
