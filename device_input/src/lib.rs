// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words evdev EVIOCGRAB epoll FIONREAD

// Enforce strict error handling in production library code. Tests may use `unwrap()`.
#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

//! # Shared input device streams
//!
//! Linux exposes every input device (keyboard, mouse, barcode scanner, game pad) as an
//! [evdev] character device under `/dev/input/eventN`. Reading it yields a stream of
//! fixed size kernel records (`struct input_event`). Optionally a reader can "grab" the
//! device with [`EVIOCGRAB`], which stops every other reader (including the X server or
//! the console) from seeing those records.
//!
//! Reading the bytes is the easy part. The hard part is letting many independent parts
//! of one process observe the same device without knowing about each other:
//!
//! - At most one open descriptor and at most one grab may exist per device, no matter how
//!   many consumers are attached.
//! - The first attach opens (and maybe grabs) the device, the last detach releases the
//!   grab and closes the descriptor, exactly once, even when attach, detach and
//!   cancellation race each other.
//! - A slow consumer must never stall the reader or other consumers.
//!
//! # How it works
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ DeviceRegistry (one Mutex guarding DeviceId → StreamSession)         │
//! └──────────────┬───────────────────────────────────────────────────────┘
//!                │ first attach: open → grab → spawn reader thread
//!                ▼
//! ┌──────────────────────────────┐   whole records   ┌──────────────────┐
//! │ reader thread (mio::Poll)    │ ────────────────▶ │ parse → filter   │
//! │ bytes ready → read → realign │                   └────────┬─────────┘
//! └──────────────────────────────┘                            │ snapshot
//!                                          ┌──────────────────┴─────────┐
//!                                          ▼                            ▼
//!                             EventConsumer (push)          EventIterator (pull)
//!                             posted to its DispatchQueue   async next(), cancellable
//! ```
//!
//! Push consumers and pull iterators are both just *attachments* of the same session, so
//! there is a single reference count, a single `attach` and a single `detach` path.
//!
//! # Example
//!
//! <!-- It is ok to use no_run here - needs a real input device and permissions -->
//!
//! ```no_run
//! use r3bl_device_input::{DeviceId, DeviceRegistry};
//!
//! # async fn run() -> miette::Result<()> {
//! let registry = DeviceRegistry::global();
//! let device = DeviceId::new("/dev/input/event3").with_grab(false);
//!
//! let mut events = registry.events(device);
//! while let Some(event) = events.next().await? {
//!     println!("{:?} {:?} {:?}", event.kind, event.code.character(), event.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing without a device
//!
//! Every syscall goes through the [`RecordSource`] / [`RecordHandle`] traits.
//! [`InMemoryRecordSource`] implements them in memory and counts open / grab / release /
//! close calls, which is how the "exactly once" guarantees are tested.
//!
//! [evdev]: https://www.kernel.org/doc/html/latest/input/input.html#event-interface
//! [`EVIOCGRAB`]: https://www.kernel.org/doc/html/latest/input/input-programming.html

// Attach sources.
pub mod common;
pub mod config;
pub mod consumer;
pub mod device;
pub mod error;
pub mod event;
pub mod log;
pub mod registry;
pub mod syscall;
pub mod test_fixtures;

// Re-export.
pub use common::*;
pub use config::*;
pub use consumer::*;
pub use device::*;
pub use error::*;
pub use event::*;
pub use log::*;
pub use registry::*;
pub use syscall::*;
