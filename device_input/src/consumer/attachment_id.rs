// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::fmt::{Display, Formatter, Result};
use uuid::Uuid;

/// Names one attachment (a consumer or an iterator) of a session. Every call to
/// [`AttachmentId::new`] returns a distinct id, so two attachments are never equal by
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentId(Uuid);

impl AttachmentId {
    #[must_use]
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for AttachmentId {
    fn default() -> Self { Self::new() }
}

impl Display for AttachmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result { write!(f, "{}", self.0) }
}
