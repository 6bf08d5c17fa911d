// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Kernel input records and the typed events parsed from them.

// Attach sources.
pub mod input_event;
pub mod input_event_code;
pub mod input_event_kind;
pub mod input_event_value;
pub mod raw_record;

// Re-export.
pub use input_event::*;
pub use input_event_code::*;
pub use input_event_kind::*;
pub use input_event_value::*;
pub use raw_record::*;
