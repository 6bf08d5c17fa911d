// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::{fmt::{Display, Formatter, Result},
          hash::{Hash, Hasher},
          path::{Path, PathBuf}};

/// Identifies an input device by its path (e.g. `/dev/input/event3`), plus whether the
/// session opened for it should grab the device.
///
/// Two ids with the same path are **equal**, whatever their grab flag. They map to the
/// same session, and that session uses the grab flag of whichever id created it.
///
/// ```
/// use r3bl_device_input::DeviceId;
///
/// let grabbing = DeviceId::new("/dev/input/event3");
/// let sharing = DeviceId::new("/dev/input/event3").with_grab(false);
/// assert!(grabbing.grabs_device());
/// assert_eq!(grabbing, sharing);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceId {
    path: PathBuf,
    grabs_device: bool,
}

impl DeviceId {
    /// Grabbing is on by default.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            grabs_device: true,
        }
    }

    #[must_use]
    pub fn with_grab(mut self, grabs_device: bool) -> Self {
        self.grabs_device = grabs_device;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    #[must_use]
    pub fn grabs_device(&self) -> bool { self.grabs_device }
}

impl PartialEq for DeviceId {
    fn eq(&self, other: &Self) -> bool { self.path == other.path }
}

impl Eq for DeviceId {}

impl Hash for DeviceId {
    fn hash<H: Hasher>(&self, state: &mut H) { self.path.hash(state); }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result { write!(f, "{}", self.path.display()) }
}
