// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{WAIT, collecting_consumer, expected_events, fast_config, received_events,
            received_len};
use crate::{DetachOutcome, DeviceId, DeviceRegistry, FailurePlan, InMemoryRecordSource,
            RECORD_SIZE,
            test_fixtures::{key_record, record, records_to_bytes, wait_for}};
use pretty_assertions::assert_eq;
use rustix::io::Errno;
use std::time::Duration;

const PATH: &str = "/dev/input/event-push";

fn setup() -> (InMemoryRecordSource, std::sync::Arc<DeviceRegistry<InMemoryRecordSource>>) {
    let source = InMemoryRecordSource::new();
    source.add_device(PATH);
    let registry = DeviceRegistry::with_config(source.clone(), fast_config());
    (source, registry)
}

#[tokio::test]
async fn test_seven_records_in_two_writes_arrive_in_order() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, received) = collecting_consumer("push-order");
    let records: Vec<_> = (30..37).map(|code| key_record(code, 1)).collect();

    let handle = registry.attach(&device, consumer).unwrap();

    source.write_records(PATH, &records[..4]);
    assert!(wait_for(WAIT, || received_len(&received) == 4).await);
    source.write_records(PATH, &records[4..]);
    assert!(wait_for(WAIT, || received_len(&received) == 7).await);

    assert_eq!(received_events(&received), expected_events(&records));
    assert!(
        received
            .lock()
            .unwrap()
            .iter()
            .all(|(it, _)| it.path() == device.path())
    );
    assert_eq!(handle.detach().unwrap(), DetachOutcome::TornDown);
}

#[tokio::test]
async fn test_every_consumer_gets_every_event_from_one_open() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (first, first_received) = collecting_consumer("push-first");
    let (second, second_received) = collecting_consumer("push-second");
    let records: Vec<_> = (2..5).map(|code| key_record(code, 1)).collect();

    registry.attach(&device, first.clone()).unwrap();
    registry.attach(&device, second.clone()).unwrap();
    source.write_records(PATH, &records);

    assert!(wait_for(WAIT, || received_len(&first_received) == 3).await);
    assert!(wait_for(WAIT, || received_len(&second_received) == 3).await);
    assert_eq!(received_events(&first_received), expected_events(&records));
    assert_eq!(received_events(&second_received), expected_events(&records));
    assert_eq!(source.counts(PATH).opens, 1);

    assert_eq!(
        registry.detach(&device, &first).unwrap(),
        DetachOutcome::Detached { remaining: 1 }
    );
    assert_eq!(source.counts(PATH).closes, 0);
    assert_eq!(
        registry.detach(&device, &second).unwrap(),
        DetachOutcome::TornDown
    );
    assert_eq!(source.counts(PATH).closes, 1);
}

#[tokio::test]
async fn test_consumers_with_identical_handlers_are_distinct() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let queue = crate::DispatchQueue::try_current("push-identical").unwrap();
    let handler = |_: &DeviceId, _: &[crate::InputEvent]| {};
    let first = crate::EventConsumer::new(queue.clone(), handler);
    let second = crate::EventConsumer::new(queue, handler);

    registry.attach(&device, first.clone()).unwrap();
    let handle = registry.attach(&device, second).unwrap();
    assert_eq!(handle.attachment_count(), Some(2));

    registry.detach(&device, &first).unwrap();
    assert_eq!(handle.attachment_count(), Some(1));
    assert_eq!(source.counts(PATH).closes, 0);

    assert_eq!(handle.detach().unwrap(), DetachOutcome::TornDown);
}

#[tokio::test]
async fn test_unknown_kinds_are_dropped_silently() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, received) = collecting_consumer("push-unknown");
    let known = key_record(30, 1);

    registry.attach(&device, consumer.clone()).unwrap();
    source.write_records(
        PATH,
        &[record(0x06, 1, 1), record(0x20, 2, 2), known, record(0xffff, 3, 3)],
    );

    assert!(wait_for(WAIT, || received_len(&received) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(received_events(&received), expected_events(&[known]));

    registry.detach(&device, &consumer).unwrap();
}

#[tokio::test]
async fn test_partial_record_is_completed_not_corrupted() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, received) = collecting_consumer("push-partial");
    let records: Vec<_> = (40..44).map(|code| key_record(code, 0)).collect();
    let last = records_to_bytes(&records[3..]);
    let half = RECORD_SIZE / 2;

    registry.attach(&device, consumer.clone()).unwrap();

    let mut first_write = records_to_bytes(&records[..3]);
    first_write.extend_from_slice(&last[..half]);
    source.write(PATH, &first_write);
    assert!(wait_for(WAIT, || received_len(&received) == 3).await);
    assert!(wait_for(WAIT, || source.counts(PATH).seeks > 0).await);

    source.write(PATH, &last[half..]);
    assert!(wait_for(WAIT, || received_len(&received) == 4).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(received_events(&received), expected_events(&records));
    registry.detach(&device, &consumer).unwrap();
}

#[tokio::test]
async fn test_failed_seek_drops_the_partial_bytes_and_keeps_reading() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, received) = collecting_consumer("push-failed-seek");
    source.set_failures(
        PATH,
        FailurePlan {
            seek: Some(Errno::SPIPE),
            ..FailurePlan::default()
        },
    );
    let first = key_record(1, 1);
    let lost = records_to_bytes(&[key_record(2, 1)]);
    let after = key_record(3, 1);

    registry.attach(&device, consumer.clone()).unwrap();

    let mut bytes = records_to_bytes(&[first]);
    bytes.extend_from_slice(&lost[..RECORD_SIZE / 2]);
    source.write(PATH, &bytes);
    assert!(wait_for(WAIT, || received_len(&received) == 1).await);
    assert!(wait_for(WAIT, || source.counts(PATH).failed_seeks == 1).await);

    // The rest of the broken record is short of a record too, and is dropped as well.
    source.write(PATH, &lost[RECORD_SIZE / 2..]);
    assert!(wait_for(WAIT, || source.counts(PATH).failed_seeks == 2).await);

    source.write_records(PATH, &[after]);
    assert!(wait_for(WAIT, || received_len(&received) == 2).await);

    assert_eq!(received_events(&received), expected_events(&[first, after]));
    registry.detach(&device, &consumer).unwrap();
}

#[tokio::test]
async fn test_read_errors_are_not_fatal() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, received) = collecting_consumer("push-read-error");
    source.set_failures(
        PATH,
        FailurePlan {
            read: Some(Errno::IO),
            ..FailurePlan::default()
        },
    );

    registry.attach(&device, consumer.clone()).unwrap();
    source.write_records(PATH, &[key_record(5, 1)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(received_len(&received), 0);

    source.set_failures(PATH, FailurePlan::default());
    assert!(wait_for(WAIT, || received_len(&received) == 1).await);
    assert!(registry.lookup(&device).unwrap().reader_running);

    registry.detach(&device, &consumer).unwrap();
}
