// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The same scenarios against [`OsRecordSource`], with regular files standing in for
//! devices. Regular files can't be registered with epoll, so these also cover the polled
//! reader path.

use super::{WAIT, collecting_consumer, expected_events, fast_config, received_events,
            received_len};
use crate::{DetachOutcome, DeviceId, DeviceInputError, DeviceRegistry, OsRecordSource,
            test_fixtures::{key_record, records_to_bytes, try_create_temp_dir, wait_for}};
use pretty_assertions::assert_eq;
use std::io::Write;

fn append(path: &std::path::Path, bytes: &[u8]) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(bytes).unwrap();
}

#[tokio::test]
async fn test_push_mode_reads_appended_records() {
    let temp_dir = try_create_temp_dir().unwrap();
    let path = temp_dir.join("event-file");
    std::fs::write(&path, b"").unwrap();
    let registry = DeviceRegistry::with_config(OsRecordSource, fast_config());
    let device = DeviceId::new(&path).with_grab(false);
    let (consumer, received) = collecting_consumer("os-push");
    let records: Vec<_> = (30..37).map(|code| key_record(code, 1)).collect();

    registry.attach(&device, consumer.clone()).unwrap();
    append(&path, &records_to_bytes(&records[..4]));
    assert!(wait_for(WAIT, || received_len(&received) == 4).await);
    append(&path, &records_to_bytes(&records[4..]));
    assert!(wait_for(WAIT, || received_len(&received) == 7).await);

    assert_eq!(received_events(&received), expected_events(&records));
    assert_eq!(
        registry.detach(&device, &consumer).unwrap(),
        DetachOutcome::TornDown
    );
}

#[tokio::test]
async fn test_pull_mode_completes_a_split_record() {
    let temp_dir = try_create_temp_dir().unwrap();
    let path = temp_dir.join("event-file");
    let records = [key_record(2, 1), key_record(3, 1)];
    let bytes = records_to_bytes(&records);
    let split = bytes.len() - 5;
    std::fs::write(&path, &bytes[..split]).unwrap();
    let registry = DeviceRegistry::with_config(OsRecordSource, fast_config());
    let mut events = registry.events(DeviceId::new(&path).with_grab(false));

    let first = tokio::time::timeout(WAIT, events.next()).await.unwrap().unwrap();
    append(&path, &bytes[split..]);
    let second = tokio::time::timeout(WAIT, events.next()).await.unwrap().unwrap();

    assert_eq!(vec![first.unwrap(), second.unwrap()], expected_events(&records));
    assert_eq!(events.finish().await.unwrap(), DetachOutcome::TornDown);
}

#[test]
fn test_missing_file_is_an_open_error() {
    let temp_dir = try_create_temp_dir().unwrap();
    let registry = DeviceRegistry::new(OsRecordSource);
    let (consumer, _) = collecting_consumer("os-missing");

    let err = registry
        .attach(&DeviceId::new(temp_dir.join("missing")), consumer)
        .unwrap_err();

    assert!(matches!(err, DeviceInputError::Open { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    assert!(registry.active_devices().is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn test_grabbing_a_regular_file_is_a_grab_error() {
    let temp_dir = try_create_temp_dir().unwrap();
    let path = temp_dir.join("not-a-device");
    std::fs::write(&path, b"").unwrap();
    let registry = DeviceRegistry::new(OsRecordSource);
    let (consumer, _) = collecting_consumer("os-grab");

    let err = registry.attach(&DeviceId::new(&path), consumer).unwrap_err();

    assert!(matches!(err, DeviceInputError::Grab { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
    assert_eq!(registry.lookup(&DeviceId::new(&path)), None);
}
