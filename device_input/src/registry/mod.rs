// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The reference counted [`DeviceRegistry`] and the pull mode [`EventIterator`].
//!
//! Sessions and their reader threads are internal. Only the registry opens, grabs,
//! releases and closes devices, so nothing outside this crate can start a second session
//! for a device that already has one:
//!
//! ```compile_fail
//! use r3bl_device_input::registry::stream_session::StreamSession;
//! ```
//!
//! ```compile_fail
//! use r3bl_device_input::StreamSession;
//! ```

// Attach sources.
pub mod cancellation_token;
pub mod device_registry;
pub mod event_iterator;
mod reader_thread;
mod stream_session;

// Re-export.
pub use cancellation_token::*;
pub use device_registry::*;
pub use event_iterator::*;
pub(crate) use reader_thread::*;
pub(crate) use stream_session::*;

#[cfg(test)]
mod integration_tests;
