// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::fmt::{Display, Formatter, Result};

/// The `value` field of a record. Its meaning depends on the kind: for
/// [`KeyStateChange`](crate::InputEventKind::KeyStateChange) it is one of the constants
/// below, for axes it is a position or a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InputEventValue(pub i32);

impl InputEventValue {
    pub const KEY_UP: Self = Self(0);
    pub const KEY_DOWN: Self = Self(1);
    pub const AUTO_REPEAT: Self = Self(2);
}

impl From<i32> for InputEventValue {
    fn from(value: i32) -> Self { Self(value) }
}

impl Display for InputEventValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match *self {
            Self::KEY_UP => write!(f, "up"),
            Self::KEY_DOWN => write!(f, "down"),
            Self::AUTO_REPEAT => write!(f, "repeat"),
            Self(other) => write!(f, "{other}"),
        }
    }
}
