// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words timeval usec

//! The fixed layout of a kernel `struct input_event`.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────┬──────┬────────┐
//! │ tv_sec       │ tv_usec      │ type │ code │ value  │
//! │ c_long       │ c_long       │ u16  │ u16  │ i32    │
//! └──────────────┴──────────────┴──────┴──────┴────────┘
//!   64-bit: 8 + 8 + 2 + 2 + 4 = 24 bytes
//!   32-bit: 4 + 4 + 2 + 2 + 4 = 16 bytes
//! ```
//!
//! All fields are in native byte order. There is no padding on either layout.

use std::ffi::c_long;

/// Size of each `timeval` field.
pub const TIME_FIELD_SIZE: usize = size_of::<c_long>();

/// Size of one record, as returned by `read(2)` on an evdev device.
pub const RECORD_SIZE: usize = 2 * TIME_FIELD_SIZE + 2 + 2 + 4;

const SEC_OFFSET: usize = 0;
const USEC_OFFSET: usize = TIME_FIELD_SIZE;
const KIND_OFFSET: usize = 2 * TIME_FIELD_SIZE;
const CODE_OFFSET: usize = KIND_OFFSET + 2;
const VALUE_OFFSET: usize = CODE_OFFSET + 2;

/// One record exactly as the kernel wrote it. The kind isn't validated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawEventRecord {
    pub tv_sec: i64,
    pub tv_usec: i64,
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEventRecord {
    /// Parses the first [`RECORD_SIZE`] bytes of `bytes`. Returns [`None`] if there
    /// aren't that many.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..RECORD_SIZE)?;
        Some(Self {
            tv_sec: read_time_field(bytes, SEC_OFFSET)?,
            tv_usec: read_time_field(bytes, USEC_OFFSET)?,
            kind: u16::from_ne_bytes(array_at(bytes, KIND_OFFSET)?),
            code: u16::from_ne_bytes(array_at(bytes, CODE_OFFSET)?),
            value: i32::from_ne_bytes(array_at(bytes, VALUE_OFFSET)?),
        })
    }

    /// Serializes into the kernel layout. Time fields that don't fit in a `c_long` are
    /// truncated, which only matters on 32-bit targets.
    #[must_use]
    #[allow(trivial_numeric_casts, clippy::cast_possible_truncation)]
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut acc = [0_u8; RECORD_SIZE];
        acc[SEC_OFFSET..USEC_OFFSET].copy_from_slice(&(self.tv_sec as c_long).to_ne_bytes());
        acc[USEC_OFFSET..KIND_OFFSET]
            .copy_from_slice(&(self.tv_usec as c_long).to_ne_bytes());
        acc[KIND_OFFSET..CODE_OFFSET].copy_from_slice(&self.kind.to_ne_bytes());
        acc[CODE_OFFSET..VALUE_OFFSET].copy_from_slice(&self.code.to_ne_bytes());
        acc[VALUE_OFFSET..RECORD_SIZE].copy_from_slice(&self.value.to_ne_bytes());
        acc
    }
}

fn array_at<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    bytes.get(offset..offset + N)?.try_into().ok()
}

/// `c_long` is `i64` on 64-bit targets, widen it everywhere else.
#[allow(clippy::useless_conversion)]
fn read_time_field(bytes: &[u8], offset: usize) -> Option<i64> {
    let field = c_long::from_ne_bytes(array_at(bytes, offset)?);
    Some(i64::from(field))
}
