// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Device identity and the byte sources that the reader threads pull records from.

// Attach sources.
pub mod device_id;
pub mod in_memory_record_source;
pub mod os_record_source;
pub mod record_source;

// Re-export.
pub use device_id::*;
pub use in_memory_record_source::*;
pub use os_record_source::*;
pub use record_source::*;
