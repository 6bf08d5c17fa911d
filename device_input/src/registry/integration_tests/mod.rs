// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Scenarios that run a whole [`DeviceRegistry`] (registry, sessions, reader threads,
//! consumers and iterators) against an [`InMemoryRecordSource`] or real files.
//!
//! [`DeviceRegistry`]: crate::DeviceRegistry
//! [`InMemoryRecordSource`]: crate::InMemoryRecordSource

use crate::{DeviceId, DispatchQueue, EventConsumer, InputEvent, RawEventRecord,
            StreamConfig};
use std::{sync::{Arc, Mutex},
          time::Duration};

mod test_lifecycle;
mod test_os_record_source;
mod test_push_mode;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Poll the sources often so the tests stay fast.
pub fn fast_config() -> StreamConfig {
    StreamConfig::default().with_poll_interval(Duration::from_millis(1))
}

/// Everything a [`collecting_consumer`] received, in order.
pub type Received = Arc<Mutex<Vec<(DeviceId, InputEvent)>>>;

/// A consumer running on its own thread that records every event it is handed.
pub fn collecting_consumer(label: &str) -> (EventConsumer, Received) {
    let received: Received = Arc::default();
    let queue = DispatchQueue::on_dedicated_thread(label).unwrap();
    let consumer = EventConsumer::new(queue, {
        let received = Arc::clone(&received);
        move |device, events| {
            let mut received = received.lock().unwrap();
            received.extend(events.iter().map(|event| (device.clone(), *event)));
        }
    });
    (consumer, received)
}

pub fn received_len(received: &Received) -> usize { received.lock().unwrap().len() }

pub fn received_events(received: &Received) -> Vec<InputEvent> {
    received
        .lock()
        .unwrap()
        .iter()
        .map(|(_, event)| *event)
        .collect()
}

/// What the reader should produce for `records`, assuming all kinds are known.
pub fn expected_events(records: &[RawEventRecord]) -> Vec<InputEvent> {
    records
        .iter()
        .map(|record| InputEvent::from_raw(record).unwrap())
        .collect()
}
