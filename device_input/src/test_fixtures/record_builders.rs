// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use crate::{InputEventKind, RawEventRecord};
use std::time::Duration;

/// Seconds part of the timestamp of every record built here.
pub const FIXTURE_TV_SEC: i64 = 1_700_000_000;

/// A key record (`EV_KEY`) with a fixed timestamp. The microseconds field is the code,
/// so records built from different codes have different timestamps.
#[must_use]
pub fn key_record(code: u16, value: i32) -> RawEventRecord {
    record(InputEventKind::KeyStateChange.as_raw(), code, value)
}

/// A record with an arbitrary kind, e.g. one that isn't a known [`InputEventKind`].
#[must_use]
pub fn record(kind: u16, code: u16, value: i32) -> RawEventRecord {
    RawEventRecord {
        tv_sec: FIXTURE_TV_SEC,
        tv_usec: i64::from(code),
        kind,
        code,
        value,
    }
}

/// Concatenates the wire bytes of `records`.
#[must_use]
pub fn records_to_bytes(records: &[RawEventRecord]) -> Vec<u8> {
    records.iter().flat_map(RawEventRecord::to_bytes).collect()
}

/// Polls `predicate` until it holds or `timeout` expires. Returns the last result.
pub async fn wait_for(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
