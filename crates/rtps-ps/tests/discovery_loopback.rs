// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant lease expiry and static endpoint discovery over loopback.

use rtps_ps::config::{ParticipantAttributes, StaticXmlSource};
use rtps_ps::domain::Domain;
use rtps_ps::endpoint::MatchingStatus;
use rtps_ps::pubsub::{
    BytesType, DiscoveryStatus, Participant, PublisherAttributes, SubscriberAttributes,
    TopicDataType,
};
use rtps_ps::qos::{ReliabilityKind, TopicAttributes};
use rtps_ps::transport::{LoopbackTransport, Transport};
use rtps_ps::{Locator, Time, TopicKind};
use std::io::Write;
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

fn register_bytes(p: &Participant) {
    let ty: Arc<dyn TopicDataType<Vec<u8>>> = Arc::new(BytesType::new("Bytes", 32));
    p.register_type(ty).expect("register");
}

#[test]
fn test_lease_expiry_removes_remote_endpoints() {
    let transport = LoopbackTransport::new();
    let shared: Arc<dyn Transport> = Arc::new(transport.clone());
    let domain = Domain::with_transport(shared);

    let mut a_attrs = ParticipantAttributes::with_name("watcher");
    a_attrs.builtin.lease_check_period = Time::from_millis(100);
    let a = domain.create_participant(a_attrs).expect("participant a");

    let mut b_attrs = ParticipantAttributes::with_name("fading");
    b_attrs.builtin.lease_duration = Time::from_millis(1_000);
    b_attrs.builtin.lease_duration_announcement_period = Time::from_millis(300);
    let b = domain.create_participant(b_attrs).expect("participant b");

    register_bytes(&a);
    register_bytes(&b);
    let topic = TopicAttributes::new("Fade", "Bytes", TopicKind::NoKey);

    let mut sattrs = SubscriberAttributes::default();
    sattrs.topic = topic.clone();
    sattrs.qos.reliability.kind = ReliabilityKind::Reliable;
    let subscriber = a.create_subscriber::<Vec<u8>>(sattrs).expect("subscriber");

    let mut pattrs = PublisherAttributes::default();
    pattrs.topic = topic;
    let publisher = b.create_publisher::<Vec<u8>>(pattrs).expect("publisher");

    assert!(wait_until(DISCOVERY_TIMEOUT, || {
        subscriber.matched_writer_count() == 1 && publisher.matched_reader_count() == 1
    }));
    let pdp = a.rtps().pdp().expect("pdp");
    assert_eq!(pdp.remote_writers().len(), 1);
    assert!(pdp.lookup_participant(&b.guid()).is_some());

    // Silence B: every datagram carrying its prefix is lost from now on.
    let silenced = b.guid().prefix;
    transport.set_drop_filter(Some(Box::new(move |data: &[u8], _: &Locator| {
        data.len() >= 20 && data[8..20] == silenced.0
    })));

    assert!(
        wait_until(Duration::from_secs(5), || a.remote_participant_count() == 0),
        "lease never expired"
    );
    assert!(pdp.remote_writers().is_empty());
    assert!(pdp.remote_readers().is_empty());
    assert!(pdp.lookup_participant(&b.guid()).is_none());
    assert_eq!(subscriber.matched_writer_count(), 0);

    let events: Vec<_> = a.events().try_iter().collect();
    assert!(events
        .iter()
        .any(|e| e.status == DiscoveryStatus::Discovered && e.guid == b.guid()));
    assert!(events
        .iter()
        .any(|e| e.status == DiscoveryStatus::Removed && e.guid == b.guid()));
    assert!(subscriber
        .match_events()
        .try_iter()
        .any(|e| e.status == MatchingStatus::Removed && e.remote == publisher.guid()));

    transport.set_drop_filter(None);
    domain.stop_all();
}

const STATIC_XML: &str = r#"<?xml version="1.0"?>
<staticdiscovery>
  <participant>
    <name>static-pub</name>
    <writer>
      <userId>1</userId>
      <topicName>Fixed</topicName>
      <topicDataType>Bytes</topicDataType>
      <topicKind>NO_KEY</topicKind>
      <reliabilityQos>RELIABLE_RELIABILITY_QOS</reliabilityQos>
      <durabilityQos>VOLATILE_DURABILITY_QOS</durabilityQos>
    </writer>
  </participant>
  <participant>
    <name>static-sub</name>
    <reader>
      <userId>3</userId>
      <topic name="Fixed" dataType="Bytes" kind="NO_KEY"/>
      <reliabilityQos>RELIABLE_RELIABILITY_QOS</reliabilityQos>
    </reader>
  </participant>
</staticdiscovery>"#;

fn static_attributes(name: &str, xml: &std::path::Path) -> ParticipantAttributes {
    let mut attrs = ParticipantAttributes::with_name(name);
    attrs.builtin.use_static_edp = true;
    attrs.builtin.static_endpoint_xml = Some(StaticXmlSource::File(xml.to_path_buf()));
    attrs
}

#[test]
fn test_static_discovery_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(STATIC_XML.as_bytes()).expect("write xml");

    let domain = Domain::with_transport(Arc::new(LoopbackTransport::new()));
    let publishing = domain
        .create_participant(static_attributes("static-pub", file.path()))
        .expect("publishing participant");
    let subscribing = domain
        .create_participant(static_attributes("static-sub", file.path()))
        .expect("subscribing participant");
    register_bytes(&publishing);
    register_bytes(&subscribing);

    let topic = TopicAttributes::new("Fixed", "Bytes", TopicKind::NoKey);

    // Static discovery refuses endpoints without a user id.
    let mut pattrs = PublisherAttributes::default();
    pattrs.topic = topic.clone();
    assert!(publishing.create_publisher::<Vec<u8>>(pattrs.clone()).is_err());

    pattrs.user_defined_id = 1;
    let publisher = publishing.create_publisher::<Vec<u8>>(pattrs).expect("publisher");

    let mut sattrs = SubscriberAttributes::default();
    sattrs.topic = topic;
    sattrs.user_defined_id = 3;
    sattrs.qos.reliability.kind = ReliabilityKind::Reliable;
    let subscriber = subscribing.create_subscriber::<Vec<u8>>(sattrs).expect("subscriber");

    assert!(
        wait_until(DISCOVERY_TIMEOUT, || {
            publisher.matched_reader_count() == 1 && subscriber.matched_writer_count() == 1
        }),
        "static endpoints never matched"
    );

    publisher.write(&b"fixed".to_vec()).expect("write");
    assert!(subscriber.wait_for_unread_message(Duration::from_secs(5)));
    let sample = subscriber.read_next_data().expect("read").expect("sample");
    assert_eq!(sample.data.as_deref(), Some(&b"fixed"[..]));
    assert_eq!(sample.info.writer_guid, publisher.guid());
    // Read samples stay in the history until taken.
    assert_eq!(subscriber.unread_count(), 0);
    assert_eq!(subscriber.reader().history().len(), 1);

    // Removing the publisher announces it ENDED and unmatches the reader.
    assert!(publishing.remove_publisher(&publisher));
    assert!(wait_until(DISCOVERY_TIMEOUT, || subscriber.matched_writer_count() == 0));
    domain.stop_all();
}
