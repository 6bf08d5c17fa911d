// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{WAIT, collecting_consumer, fast_config};
use crate::{DetachOutcome, DeviceId, DeviceInputError, DeviceRegistry, FailurePlan,
            InMemoryRecordSource, TeardownStage, test_fixtures::wait_for};
use pretty_assertions::assert_eq;
use rustix::io::Errno;
use std::{sync::{Arc, Barrier},
          thread};
use test_case::test_case;

const PATH: &str = "/dev/input/event-lifecycle";

fn setup() -> (InMemoryRecordSource, Arc<DeviceRegistry<InMemoryRecordSource>>) {
    let source = InMemoryRecordSource::new();
    source.add_device(PATH);
    let registry = DeviceRegistry::with_config(source.clone(), fast_config());
    (source, registry)
}

#[test_case(2)]
#[test_case(8)]
#[test_case(32)]
fn test_concurrent_first_attaches_build_one_session(attachers: usize) {
    let (source, registry) = setup();
    let barrier = Arc::new(Barrier::new(attachers));

    let results: Vec<_> = (0..attachers)
        .map(|it| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let (consumer, _) = collecting_consumer(&format!("race-{it}"));
                barrier.wait();
                let handle = registry.attach(&DeviceId::new(PATH), consumer).unwrap();
                handle.session_id()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|it| it.join().unwrap())
        .collect();

    assert!(results.iter().all(|it| *it == results[0]));
    let counts = source.counts(PATH);
    assert_eq!((counts.opens, counts.grabs), (1, 1));
    assert_eq!(counts.max_concurrent_open, 1);
    assert_eq!(
        registry.lookup(&DeviceId::new(PATH)).unwrap().attachment_count,
        attachers
    );
}

#[test]
fn test_handles_of_one_session_are_equal() {
    let (_source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (first, _) = collecting_consumer("equal-first");
    let (second, _) = collecting_consumer("equal-second");

    let first = registry.attach(&device, first).unwrap();
    let second = registry.attach(&device, second).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.detach().unwrap(), DetachOutcome::Detached { remaining: 1 });
    assert_eq!(second.detach().unwrap(), DetachOutcome::TornDown);
}

#[test]
fn test_detaching_more_than_attached_is_harmless() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, _) = collecting_consumer("double-detach");

    registry.attach(&device, consumer.clone()).unwrap();
    assert_eq!(
        registry.detach(&device, &consumer).unwrap(),
        DetachOutcome::TornDown
    );
    assert_eq!(
        registry.detach(&device, &consumer).unwrap(),
        DetachOutcome::NotAttached
    );
    assert_eq!(
        registry
            .detach(&DeviceId::new("/dev/input/never-attached"), &consumer)
            .unwrap(),
        DetachOutcome::NotAttached
    );

    let counts = source.counts(PATH);
    assert_eq!((counts.releases, counts.closes), (1, 1));
}

#[test]
fn test_open_failure_leaves_no_session() {
    let (source, registry) = setup();
    source.set_failures(
        PATH,
        FailurePlan {
            open: Some(Errno::ACCESS),
            ..FailurePlan::default()
        },
    );
    let (consumer, _) = collecting_consumer("open-failure");

    let err = registry.attach(&DeviceId::new(PATH), consumer).unwrap_err();

    assert!(matches!(err, DeviceInputError::Open { .. }));
    assert_eq!(err.raw_os_error(), Some(Errno::ACCESS.raw_os_error()));
    assert_eq!(registry.lookup(&DeviceId::new(PATH)), None);
    assert_eq!(source.open_handle_count(PATH), 0);
}

#[test]
fn test_missing_device_fails_to_open() {
    let (_source, registry) = setup();
    let (consumer, _) = collecting_consumer("missing-device");

    let err = registry
        .attach(&DeviceId::new("/dev/input/event-missing"), consumer)
        .unwrap_err();

    assert_eq!(err.raw_os_error(), Some(Errno::NOENT.raw_os_error()));
    assert!(registry.active_devices().is_empty());
}

#[test]
fn test_grab_failure_closes_the_new_handle() {
    let (source, registry) = setup();
    source.set_failures(
        PATH,
        FailurePlan {
            grab: Some(Errno::BUSY),
            ..FailurePlan::default()
        },
    );
    let (consumer, _) = collecting_consumer("grab-failure");

    let err = registry.attach(&DeviceId::new(PATH), consumer).unwrap_err();

    assert!(matches!(err, DeviceInputError::Grab { .. }));
    assert_eq!(err.raw_os_error(), Some(Errno::BUSY.raw_os_error()));
    let counts = source.counts(PATH);
    assert_eq!((counts.opens, counts.closes), (1, 1));
    assert_eq!(source.open_handle_count(PATH), 0);
    assert_eq!(registry.lookup(&DeviceId::new(PATH)), None);
}

#[test]
fn test_failed_cleanup_close_does_not_hide_the_grab_error() {
    let (source, registry) = setup();
    source.set_failures(
        PATH,
        FailurePlan {
            grab: Some(Errno::BUSY),
            close: Some(Errno::IO),
            ..FailurePlan::default()
        },
    );
    let (consumer, _) = collecting_consumer("grab-and-close-failure");

    let err = registry.attach(&DeviceId::new(PATH), consumer).unwrap_err();

    assert!(matches!(err, DeviceInputError::Grab { .. }));
    assert_eq!(err.raw_os_error(), Some(Errno::BUSY.raw_os_error()));
    assert_eq!(source.open_handle_count(PATH), 0);
}

#[test]
fn test_release_failure_is_returned_and_the_device_still_closes() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, _) = collecting_consumer("release-failure");
    registry.attach(&device, consumer.clone()).unwrap();
    source.set_failures(
        PATH,
        FailurePlan {
            release: Some(Errno::INVAL),
            ..FailurePlan::default()
        },
    );

    let err = registry.detach(&device, &consumer).unwrap_err();

    assert!(matches!(
        err,
        DeviceInputError::Teardown {
            stage: TeardownStage::ReleaseGrab,
            ..
        }
    ));
    assert_eq!(source.counts(PATH).closes, 1);
    assert_eq!(source.open_handle_count(PATH), 0);
    assert_eq!(registry.lookup(&device), None);
    assert_eq!(
        registry.detach(&device, &consumer).unwrap(),
        DetachOutcome::NotAttached
    );
}

#[test]
fn test_close_failure_is_returned_to_the_last_detach() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH).with_grab(false);
    let (consumer, _) = collecting_consumer("close-failure");
    registry.attach(&device, consumer.clone()).unwrap();
    source.set_failures(
        PATH,
        FailurePlan {
            close: Some(Errno::IO),
            ..FailurePlan::default()
        },
    );

    let err = registry.detach(&device, &consumer).unwrap_err();

    assert!(matches!(
        err,
        DeviceInputError::Teardown {
            stage: TeardownStage::Close,
            ..
        }
    ));
    assert_eq!(registry.lookup(&device), None);
}

#[test]
fn test_non_grabbing_device_is_never_grabbed() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH).with_grab(false);
    let (consumer, _) = collecting_consumer("no-grab");

    registry.attach(&device, consumer.clone()).unwrap();
    assert!(!source.is_grabbed(PATH));
    assert!(!registry.lookup(&device).unwrap().grabbed);
    registry.detach(&device, &consumer).unwrap();

    let counts = source.counts(PATH);
    assert_eq!((counts.grabs, counts.releases, counts.closes), (0, 0, 1));
}

#[test]
fn test_grab_flag_of_the_first_attach_wins() {
    let (source, registry) = setup();
    let (grabbing, _) = collecting_consumer("flag-grabbing");
    let (sharing, _) = collecting_consumer("flag-sharing");

    registry.attach(&DeviceId::new(PATH), grabbing.clone()).unwrap();
    let handle = registry
        .attach(&DeviceId::new(PATH).with_grab(false), sharing)
        .unwrap();

    let active = registry.lookup(&DeviceId::new(PATH)).unwrap();
    assert_eq!(active.attachment_count, 2);
    assert!(active.grabbed);
    assert_eq!(source.counts(PATH).opens, 1);

    registry.detach(&DeviceId::new(PATH), &grabbing).unwrap();
    assert_eq!(handle.detach().unwrap(), DetachOutcome::TornDown);
    assert_eq!(source.counts(PATH).releases, 1);
}

#[test]
fn test_reattach_after_teardown_builds_a_new_session() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, _) = collecting_consumer("reattach");

    let first = registry.attach(&device, consumer.clone()).unwrap();
    let first_id = first.session_id();
    first.detach().unwrap();
    let second = registry.attach(&device, consumer).unwrap();

    assert_ne!(second.session_id(), first_id);
    let counts = source.counts(PATH);
    assert_eq!((counts.opens, counts.closes), (2, 1));
    assert_eq!(counts.max_concurrent_open, 1);
    second.detach().unwrap();
}

#[test]
fn test_attach_and_detach_racing_never_open_twice() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);

    let workers: Vec<_> = (0..4)
        .map(|it| {
            let registry = Arc::clone(&registry);
            let device = device.clone();
            thread::spawn(move || {
                let (consumer, _) = collecting_consumer(&format!("churn-{it}"));
                for _ in 0..25 {
                    registry.attach(&device, consumer.clone()).unwrap();
                    registry.detach(&device, &consumer).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let counts = source.counts(PATH);
    assert_eq!(counts.max_concurrent_open, 1);
    assert_eq!(counts.opens, counts.closes);
    assert_eq!(counts.grabs, counts.releases);
    assert_eq!(source.open_handle_count(PATH), 0);
    assert_eq!(registry.lookup(&device), None);
}

#[tokio::test]
async fn test_unplugged_device_keeps_its_session_until_detached() {
    let (source, registry) = setup();
    let device = DeviceId::new(PATH);
    let (consumer, _) = collecting_consumer("unplugged");
    registry.attach(&device, consumer.clone()).unwrap();

    source.set_failures(
        PATH,
        FailurePlan {
            read: Some(Errno::NODEV),
            ..FailurePlan::default()
        },
    );
    source.write_records(PATH, &[crate::test_fixtures::key_record(1, 1)]);

    assert!(
        wait_for(WAIT, || {
            registry
                .lookup(&device)
                .is_some_and(|it| !it.reader_running)
        })
        .await
    );
    assert_eq!(
        registry.detach(&device, &consumer).unwrap(),
        DetachOutcome::TornDown
    );
    assert_eq!(source.counts(PATH).closes, 1);
}
