// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint behavior observable without any remote peer.

use rtps_ps::config::ParticipantAttributes;
use rtps_ps::endpoint::{
    EndpointAttributes, EndpointKind, ReaderAttributes, RemoteWriterAttributes,
};
use rtps_ps::history::{HistoryAttributes, ReaderHistory};
use rtps_ps::participant::RtpsParticipant;
use rtps_ps::pubsub::{BytesType, Participant, PublisherAttributes, TopicDataType};
use rtps_ps::qos::{HistoryQosPolicy, ReliabilityKind, ResourceLimitsQosPolicy, TopicAttributes};
use rtps_ps::transport::{LoopbackTransport, Transport};
use rtps_ps::{EntityId, GuidPrefix, SequenceNumber, TopicKind, GUID};
use std::net::Ipv4Addr;
use std::sync::Arc;

fn quiet_attributes(name: &str) -> ParticipantAttributes {
    let mut attrs = ParticipantAttributes::with_name(name);
    attrs.builtin.use_simple_pdp = false;
    attrs
}

#[test]
fn test_publisher_with_single_sample_keeps_newest() {
    let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
    let participant =
        Participant::new(quiet_attributes("single"), transport, None).expect("participant");
    let ty: Arc<dyn TopicDataType<Vec<u8>>> = Arc::new(BytesType::new("Bytes", 16));
    participant.register_type(ty).expect("register");

    let mut attrs = PublisherAttributes::default();
    attrs.topic = TopicAttributes::new("One", "Bytes", TopicKind::NoKey);
    attrs.topic.history_qos = HistoryQosPolicy::keep_last(1);
    attrs.topic.resource_limits_qos = ResourceLimitsQosPolicy {
        max_samples: 1,
        max_instances: 1,
        max_samples_per_instance: 1,
        allocated_samples: 1,
    };
    let publisher = participant
        .create_publisher::<Vec<u8>>(attrs)
        .expect("publisher");

    publisher.write(&vec![1]).expect("first write");
    publisher.write(&vec![2]).expect("second write");

    let history = publisher.writer().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history.min_seq(), Some(SequenceNumber::new(2)));
    let kept = history
        .get_change(SequenceNumber::new(2))
        .expect("newest change");
    assert_eq!(kept.serialized_payload.data, vec![2]);
    participant.destroy();
}

#[test]
fn test_reader_admission() {
    let participant = RtpsParticipant::new(
        quiet_attributes("admission"),
        Arc::new(LoopbackTransport::new()),
        None,
    )
    .expect("participant");
    let history = Arc::new(ReaderHistory::new(
        HistoryAttributes::new(64, 8, 0),
        HistoryQosPolicy::keep_last(4),
        ResourceLimitsQosPolicy::default(),
        TopicKind::NoKey,
    ));
    let reader = participant
        .create_reader(
            ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::Reliable),
            history,
            None,
            None,
            false,
        )
        .expect("reader");

    let known = GUID::new(GuidPrefix::generate(), EntityId::from_key(1, 0x03));
    let stranger = GUID::new(GuidPrefix::generate(), EntityId::from_key(2, 0x03));

    let mut endpoint = EndpointAttributes::default();
    endpoint.endpoint_kind = EndpointKind::Writer;
    endpoint.reliability_kind = ReliabilityKind::Reliable;
    endpoint
        .unicast_locator_list
        .push(rtps_ps::Locator::udpv4(Ipv4Addr::LOCALHOST, 7998));
    assert!(reader.matched_writer_add(RemoteWriterAttributes::new(known, endpoint)));

    assert!(reader.accept_msg_from(&known));
    assert!(!reader.accept_msg_from(&stranger));

    reader.set_accept_messages_from_unknown_writers(true);
    assert!(reader.accept_msg_from(&stranger));
    reader.set_accept_messages_from_unknown_writers(false);

    // A trusted entity id admits any writer carrying it.
    reader.set_trusted_writer(Some(stranger.entity_id));
    assert!(reader.accept_msg_from(&stranger));

    assert!(reader.matched_writer_remove(&known));
    assert!(!reader.accept_msg_from(&GUID::new(known.prefix, EntityId::from_key(7, 0x03))));
    participant.destroy();
}
