// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Push mode consumers: an opaque identity, a serial [`DispatchQueue`] and a handler.

// Attach sources.
pub mod attachment_id;
pub mod dispatch_queue;
pub mod event_consumer;

// Re-export.
pub use attachment_id::*;
pub use dispatch_queue::*;
pub use event_consumer::*;
