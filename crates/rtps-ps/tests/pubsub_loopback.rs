// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher to subscriber delivery between two participants sharing an
//! in-process loopback transport.

use rtps_ps::config::ParticipantAttributes;
use rtps_ps::domain::Domain;
use rtps_ps::endpoint::MatchingStatus;
use rtps_ps::pubsub::{
    BytesType, Participant, PublisherAttributes, SubscriberAttributes, TopicDataType,
};
use rtps_ps::qos::{ReliabilityKind, TopicAttributes};
use rtps_ps::transport::{LoopbackTransport, Transport};
use rtps_ps::{ChangeKind, Locator, Time, TopicKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    cond()
}

fn domain() -> (LoopbackTransport, Domain) {
    let transport = LoopbackTransport::new();
    let shared: Arc<dyn Transport> = Arc::new(transport.clone());
    (transport, Domain::with_transport(shared))
}

fn participant(domain: &Domain, name: &str) -> Arc<Participant> {
    let p = domain
        .create_participant(ParticipantAttributes::with_name(name))
        .expect("participant");
    let ty: Arc<dyn TopicDataType<Vec<u8>>> = Arc::new(BytesType::keyed("Sample", 64));
    p.register_type(ty).expect("register");
    p
}

fn keyed_topic() -> TopicAttributes {
    TopicAttributes::new("T", "Sample", TopicKind::WithKey)
}

#[test]
fn test_keyed_sample_reaches_remote_reader_once() {
    let (_transport, domain) = domain();
    let a = participant(&domain, "A");
    let b = participant(&domain, "B");

    let mut pattrs = PublisherAttributes::default();
    pattrs.topic = keyed_topic();
    let publisher = a.create_publisher::<Vec<u8>>(pattrs).expect("publisher");

    let mut sattrs = SubscriberAttributes::default();
    sattrs.topic = keyed_topic();
    sattrs.qos.reliability.kind = ReliabilityKind::Reliable;
    let subscriber = b.create_subscriber::<Vec<u8>>(sattrs).expect("subscriber");

    assert!(
        wait_until(DISCOVERY_TIMEOUT, || {
            publisher.matched_reader_count() == 1 && subscriber.matched_writer_count() == 1
        }),
        "endpoints never matched"
    );

    let sample: Vec<u8> = (0..24).collect();
    publisher.write(&sample).expect("write");
    assert!(subscriber.wait_for_unread_message(Duration::from_secs(5)));
    thread::sleep(Duration::from_millis(300));
    assert_eq!(subscriber.reader().history().len(), 1);

    let received = subscriber.take_next_data().expect("take").expect("sample");
    assert_eq!(received.data.as_deref(), Some(&sample[..]));
    assert_eq!(received.info.kind, ChangeKind::Alive);
    assert_eq!(received.info.writer_guid, publisher.guid());
    let key = BytesType::keyed("Sample", 64).get_key(&sample).expect("key");
    assert_eq!(received.info.instance_handle, key);

    publisher.dispose(&sample).expect("dispose");
    assert!(subscriber.wait_for_unread_message(Duration::from_secs(5)));
    let disposed = subscriber.take_next_data().expect("take").expect("sample");
    assert_eq!(disposed.info.kind, ChangeKind::NotAliveDisposed);
    assert_eq!(disposed.info.instance_handle, key);
    assert!(disposed.data.is_none());

    assert!(publisher
        .match_events()
        .try_iter()
        .any(|e| e.status == MatchingStatus::Matched && e.remote == subscriber.guid()));
    domain.stop_all();
}

#[test]
fn test_reliable_writer_repairs_dropped_data() {
    let (transport, domain) = domain();
    let a = participant(&domain, "A");
    let b = participant(&domain, "B");

    let mut pattrs = PublisherAttributes::default();
    pattrs.topic = keyed_topic();
    pattrs.topic.history_qos.depth = 10;
    pattrs.times.heartbeat_period = Time::from_millis(100);
    let publisher = a.create_publisher::<Vec<u8>>(pattrs).expect("publisher");

    let mut sattrs = SubscriberAttributes::default();
    sattrs.topic = keyed_topic();
    sattrs.topic.history_qos.depth = 10;
    sattrs.qos.reliability.kind = ReliabilityKind::Reliable;
    let subscriber = b.create_subscriber::<Vec<u8>>(sattrs).expect("subscriber");

    assert!(wait_until(DISCOVERY_TIMEOUT, || {
        publisher.matched_reader_count() == 1 && subscriber.matched_writer_count() == 1
    }));

    // Lose the first transmission of the first sample only.
    let marker: [u8; 5] = [0xde, 0xad, 0xbe, 0xef, 1];
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = dropped.clone();
    transport.set_drop_filter(Some(Box::new(move |data: &[u8], _: &Locator| {
        let hit = data.windows(marker.len()).any(|w| w == marker);
        hit && !flag.swap(true, Ordering::SeqCst)
    })));

    for i in 1..=3u8 {
        publisher.write(&vec![0xde, 0xad, 0xbe, 0xef, i]).expect("write");
    }

    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    while received.len() < 3 && Instant::now() < deadline {
        if subscriber.wait_for_unread_message(Duration::from_millis(200)) {
            while let Some(sample) = subscriber.take_next_data().expect("take") {
                received.push(sample.data.expect("alive")[4]);
            }
        }
    }
    assert!(dropped.load(Ordering::SeqCst), "filter never fired");
    assert!(transport.dropped_count() >= 1);
    assert_eq!(received, vec![1, 2, 3]);
    assert!(publisher.wait_for_all_acked(Duration::from_secs(5)));
    domain.stop_all();
}

#[test]
fn test_best_effort_reader_ignores_unmatched_topic() {
    let (_transport, domain) = domain();
    let a = participant(&domain, "A");
    let b = participant(&domain, "B");

    let mut pattrs = PublisherAttributes::default();
    pattrs.topic = keyed_topic();
    let publisher = a.create_publisher::<Vec<u8>>(pattrs).expect("publisher");

    let mut sattrs = SubscriberAttributes::default();
    sattrs.topic = TopicAttributes::new("Other", "Sample", TopicKind::WithKey);
    let subscriber = b.create_subscriber::<Vec<u8>>(sattrs).expect("subscriber");

    assert!(wait_until(DISCOVERY_TIMEOUT, || {
        a.remote_participant_count() == 1 && b.remote_participant_count() == 1
    }));
    thread::sleep(Duration::from_millis(500));
    assert_eq!(publisher.matched_reader_count(), 0);
    assert_eq!(subscriber.matched_writer_count(), 0);

    publisher.write(&vec![1, 2, 3]).expect("write");
    assert!(!subscriber.wait_for_unread_message(Duration::from_millis(300)));
    domain.stop_all();
}
