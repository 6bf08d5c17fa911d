// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Helpers shared by the unit and integration tests of this crate.

// Attach sources.
pub mod record_builders;
pub mod temp_dir;

// Re-export.
pub use record_builders::*;
pub use temp_dir::*;
