// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Randomized mutation sequences over writer and reader histories.

use rtps_ps::config::ParticipantAttributes;
use rtps_ps::endpoint::{
    EndpointAttributes, EndpointKind, RemoteReaderAttributes, WriterAttributes,
};
use rtps_ps::history::{HistoryAttributes, ReaderHistory, WriterHistory};
use rtps_ps::participant::RtpsParticipant;
use rtps_ps::qos::{HistoryQosPolicy, ReliabilityKind, ResourceLimitsQosPolicy};
use rtps_ps::transport::LoopbackTransport;
use rtps_ps::writer::Writer;
use rtps_ps::{
    ChangeKind, EntityId, Error, GuidPrefix, InstanceHandle, Locator, SequenceNumber, TopicKind,
    GUID,
};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

const STEPS: usize = 2_000;

fn limits(max_samples: i32) -> ResourceLimitsQosPolicy {
    ResourceLimitsQosPolicy {
        max_samples,
        max_instances: 10,
        max_samples_per_instance: max_samples,
        allocated_samples: 16,
    }
}

fn quiet_participant() -> Arc<RtpsParticipant> {
    let mut attrs = ParticipantAttributes::with_name("history-props");
    attrs.builtin.use_simple_pdp = false;
    RtpsParticipant::new(attrs, Arc::new(LoopbackTransport::new()), None)
        .expect("participant")
}

fn keep_all_writer(participant: &RtpsParticipant) -> Writer {
    let history = Arc::new(WriterHistory::new(
        HistoryAttributes::new(64, 16, 0),
        HistoryQosPolicy::keep_all(),
        limits(1_000),
        TopicKind::NoKey,
    ));
    participant
        .create_writer(
            WriterAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort),
            history,
            None,
            None,
            false,
        )
        .expect("writer")
}

fn assert_bounds(
    seqs: &[SequenceNumber],
    min: Option<SequenceNumber>,
    max: Option<SequenceNumber>,
) {
    assert_eq!(min, seqs.iter().copied().min());
    assert_eq!(max, seqs.iter().copied().max());
}

#[test]
fn test_writer_sequence_numbers_are_dense_and_never_reused() {
    let participant = quiet_participant();
    let writer = keep_all_writer(&participant);
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let mut last = SequenceNumber::ZERO;
    let mut ever_assigned = HashSet::new();

    for _ in 0..STEPS {
        match rng.u8(0..10) {
            0..=5 => {
                let mut change = writer
                    .new_change(ChangeKind::Alive, InstanceHandle::NIL)
                    .expect("reserve");
                change.serialized_payload.data = vec![rng.u8(..); rng.usize(1..64)];
                let seq = writer.add_change(change).expect("add");
                assert_eq!(seq, last.next(), "sequence numbers must grow by one");
                assert!(ever_assigned.insert(seq), "sequence number {} reused", seq);
                last = seq;
            }
            6..=7 => {
                let seqs = writer.history().sequence_numbers();
                if !seqs.is_empty() {
                    let victim = seqs[rng.usize(..seqs.len())];
                    assert!(writer.remove_change(victim));
                    assert!(!writer.history().contains(victim));
                }
            }
            _ => {
                let expected = writer.history().min_seq();
                assert_eq!(writer.remove_min_change(), expected);
            }
        }

        let seqs = writer.history().sequence_numbers();
        let unique: HashSet<_> = seqs.iter().collect();
        assert_eq!(unique.len(), seqs.len());
        assert_bounds(&seqs, writer.history().min_seq(), writer.history().max_seq());
        assert_eq!(writer.history().last_sequence(), last);
    }
    participant.destroy();
}

#[test]
fn test_reader_history_never_holds_duplicates() {
    let history = ReaderHistory::new(
        HistoryAttributes::new(64, 16, 0),
        HistoryQosPolicy::keep_all(),
        limits(10_000),
        TopicKind::NoKey,
    );
    let writers = [
        GUID::new(GuidPrefix::generate(), EntityId::from_key(1, 0x03)),
        GUID::new(GuidPrefix::generate(), EntityId::from_key(2, 0x03)),
    ];
    let mut rng = fastrand::Rng::with_seed(42);
    let mut present: HashSet<(GUID, SequenceNumber)> = HashSet::new();

    for _ in 0..STEPS {
        let writer = writers[rng.usize(..writers.len())];
        let seq = SequenceNumber::new(rng.i64(1..60));
        if rng.u8(0..4) == 0 {
            let removed = history.remove_change(&writer, seq);
            assert_eq!(removed, present.remove(&(writer, seq)));
        } else {
            let mut change = history.reserve_cache().expect("reserve");
            change.writer_guid = writer;
            change.sequence_number = seq;
            change.serialized_payload.data = vec![1, 2, 3];
            let inserted = history.received_change(change).expect("insert");
            assert_eq!(inserted, present.insert((writer, seq)));
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), present.len());
        let keys: HashSet<_> = snapshot
            .iter()
            .map(|c| (c.writer_guid, c.sequence_number))
            .collect();
        assert_eq!(keys, present);
        let seqs: Vec<_> = snapshot.iter().map(|c| c.sequence_number).collect();
        assert_bounds(&seqs, history.min_seq(), history.max_seq());
    }
}

#[test]
fn test_keep_all_rejects_beyond_max_samples() {
    let participant = quiet_participant();
    let history = Arc::new(WriterHistory::new(
        HistoryAttributes::new(64, 1, 0),
        HistoryQosPolicy::keep_all(),
        limits(1),
        TopicKind::NoKey,
    ));
    let writer = participant
        .create_writer(
            WriterAttributes::new(TopicKind::NoKey, ReliabilityKind::Reliable),
            history,
            None,
            None,
            false,
        )
        .expect("writer");

    // A reliable reader that never acknowledges pins every change.
    let mut endpoint = EndpointAttributes::default();
    endpoint.endpoint_kind = EndpointKind::Reader;
    endpoint.reliability_kind = ReliabilityKind::Reliable;
    endpoint
        .unicast_locator_list
        .push(Locator::udpv4(Ipv4Addr::LOCALHOST, 7999));
    let reader = GUID::new(GuidPrefix::generate(), EntityId::from_key(9, 0x04));
    assert!(writer.matched_reader_add(RemoteReaderAttributes::new(reader, endpoint)));

    let mut first = writer
        .new_change(ChangeKind::Alive, InstanceHandle::NIL)
        .expect("reserve");
    first.serialized_payload.data = vec![1];
    writer.add_change(first).expect("first change fits");

    let mut second = writer
        .new_change(ChangeKind::Alive, InstanceHandle::NIL)
        .expect("reserve");
    second.serialized_payload.data = vec![2];
    assert!(matches!(writer.add_change(second), Err(Error::HistoryFull)));
    assert_eq!(writer.history().len(), 1);
    assert_eq!(writer.history().min_seq(), Some(SequenceNumber::new(1)));

    // Once the reader is gone nothing is outstanding and room is reclaimed.
    assert!(writer.matched_reader_remove(&reader));
    let mut third = writer
        .new_change(ChangeKind::Alive, InstanceHandle::NIL)
        .expect("reserve");
    third.serialized_payload.data = vec![3];
    assert_eq!(writer.add_change(third).expect("reclaimed"), SequenceNumber::new(2));
    participant.destroy();
}

#[test]
fn test_keep_last_evicts_oldest_at_max_samples() {
    let participant = quiet_participant();
    let history = Arc::new(WriterHistory::new(
        HistoryAttributes::new(64, 1, 0),
        HistoryQosPolicy::keep_last(1),
        limits(1),
        TopicKind::NoKey,
    ));
    let writer = participant
        .create_writer(
            WriterAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort),
            history,
            None,
            None,
            false,
        )
        .expect("writer");

    for value in 1..=3u8 {
        let mut change = writer
            .new_change(ChangeKind::Alive, InstanceHandle::NIL)
            .expect("reserve");
        change.serialized_payload.data = vec![value];
        writer.add_change(change).expect("keep-last always accepts");
        assert_eq!(writer.history().len(), 1);
    }
    let kept = writer
        .history()
        .get_change(SequenceNumber::new(3))
        .expect("newest change kept");
    assert_eq!(kept.serialized_payload.data, vec![3]);
    participant.destroy();
}
