// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! History cache benchmark
//!
//! Measures the cost of the two hot paths of the change caches:
//! - writer side: reserve, add and remove a change (sequence assignment)
//! - reader side: reserve and store a received change, then take it

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rtps_ps::config::ParticipantAttributes;
use rtps_ps::endpoint::WriterAttributes;
use rtps_ps::history::{HistoryAttributes, ReaderHistory, WriterHistory};
use rtps_ps::participant::RtpsParticipant;
use rtps_ps::qos::{HistoryQosPolicy, ReliabilityKind, ResourceLimitsQosPolicy};
use rtps_ps::transport::LoopbackTransport;
use rtps_ps::{ChangeKind, EntityId, GuidPrefix, InstanceHandle, SequenceNumber, TopicKind, GUID};
use std::sync::Arc;

const PAYLOAD_SIZES: [usize; 3] = [16, 256, 4096];

fn quiet_participant() -> Arc<RtpsParticipant> {
    let mut attrs = ParticipantAttributes::with_name("bench");
    attrs.builtin.use_simple_pdp = false;
    RtpsParticipant::new(attrs, Arc::new(LoopbackTransport::new()), None)
        .expect("participant")
}

fn bench_writer_add_remove(c: &mut Criterion) {
    let participant = quiet_participant();
    let mut group = c.benchmark_group("writer_history_add_remove");
    for size in PAYLOAD_SIZES {
        let history = Arc::new(WriterHistory::new(
            HistoryAttributes::new(size, 64, 0),
            HistoryQosPolicy::keep_all(),
            ResourceLimitsQosPolicy::default(),
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
        let payload = vec![0xa5u8; size];

        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let mut change = writer
                    .new_change(ChangeKind::Alive, InstanceHandle::NIL)
                    .expect("reserve");
                change.serialized_payload.data.extend_from_slice(payload);
                let seq = writer.add_change(change).expect("add");
                black_box(writer.remove_change(seq));
            });
        });
    }
    group.finish();
    participant.destroy();
}

fn bench_reader_receive_take(c: &mut Criterion) {
    let writer = GUID::new(GuidPrefix::generate(), EntityId::from_key(1, 0x03));
    let mut group = c.benchmark_group("reader_history_receive_take");
    for size in PAYLOAD_SIZES {
        let history = ReaderHistory::new(
            HistoryAttributes::new(size, 64, 0),
            HistoryQosPolicy::keep_all(),
            ResourceLimitsQosPolicy::default(),
            TopicKind::NoKey,
        );
        let payload = vec![0x5au8; size];
        let mut next = 0i64;

        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                next += 1;
                let mut change = history.reserve_cache().expect("reserve");
                change.writer_guid = writer;
                change.sequence_number = SequenceNumber::new(next);
                change.serialized_payload.data.extend_from_slice(payload);
                black_box(history.received_change(change).expect("store"));
                black_box(history.next_untaken());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_writer_add_remove, bench_reader_receive_take);
criterion_main!(benches);
