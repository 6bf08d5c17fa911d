// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words usec

use crate::{InputEventCode, InputEventKind, InputEventValue, RECORD_SIZE, RawEventRecord};
use chrono::{DateTime, Utc};

/// A record whose kind is known, with its `timeval` converted to a wall clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: InputEventKind,
    pub code: InputEventCode,
    pub value: InputEventValue,
}

impl InputEvent {
    /// Returns [`None`] only for kinds outside [`InputEventKind`]. A timestamp outside
    /// what [`DateTime`] can hold is clamped to its earliest or latest value.
    #[must_use]
    pub fn from_raw(record: &RawEventRecord) -> Option<Self> {
        let kind = InputEventKind::from_raw(record.kind)?;
        let timestamp = timestamp_from_timeval(record.tv_sec, record.tv_usec)
            .unwrap_or(if record.tv_sec < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        Some(Self {
            timestamp,
            kind,
            code: InputEventCode(record.code),
            value: InputEventValue(record.value),
        })
    }

    /// The record this event was parsed from.
    #[must_use]
    pub fn to_raw(&self) -> RawEventRecord {
        let micros = self.timestamp.timestamp_micros();
        RawEventRecord {
            tv_sec: micros.div_euclid(1_000_000),
            tv_usec: micros.rem_euclid(1_000_000),
            kind: self.kind.as_raw(),
            code: self.code.0,
            value: self.value.0,
        }
    }
}

/// `seconds + micros / 10^6`, as one microsecond count.
#[must_use]
pub fn timestamp_from_timeval(tv_sec: i64, tv_usec: i64) -> Option<DateTime<Utc>> {
    let micros = tv_sec.checked_mul(1_000_000)?.checked_add(tv_usec)?;
    DateTime::<Utc>::from_timestamp_micros(micros)
}

/// Parses every whole record in `bytes`, in order, skipping unknown kinds. A trailing
/// partial record is ignored, the caller is expected to have split it off already.
pub fn parse_records(bytes: &[u8]) -> impl Iterator<Item = InputEvent> + '_ {
    bytes
        .chunks_exact(RECORD_SIZE)
        .filter_map(RawEventRecord::parse)
        .filter_map(|record| InputEvent::from_raw(&record))
}
