// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer engines.
//!
//! A writer owns its [`WriterHistory`], stamps new changes and pushes them
//! to matched readers:
//!
//! - [`StatelessWriter`] keeps only a set of reader locators and sends
//!   fire-and-forget (participant announcements).
//! - [`StatefulWriter`] keeps a [`ReaderProxy`] per matched reader and
//!   drives retransmission from ACKNACKs and periodic heartbeats.
//!
//! [`Writer`] dispatches between the two and applies the history policy
//! (keep-last eviction, keep-all reclamation) before a change is stored.

mod stateful;
mod stateless;

pub use stateful::{ChangeForReaderStatus, ReaderProxy, StatefulWriter};
pub use stateless::{ReaderLocator, StatelessWriter};

use crate::endpoint::{
    MatchedEndpoint, MatchingInfo, RemoteReaderAttributes, WriterAttributes, WriterTimes,
};
use crate::error::{Error, Result};
use crate::history::{CacheChange, WriterHistory};
use crate::protocol::guid::{EntityId, InstanceHandle, GUID};
use crate::protocol::locator::Locator;
use crate::protocol::message::{AckNack, Data, RtpsMessage, Submessage};
use crate::protocol::parameter::{Parameter, ParameterList};
use crate::protocol::types::{ChangeKind, SequenceNumber, Time, TopicKind};
use crate::transport::{send_to_all, Transport};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Match notifications for a writer.
pub trait WriterListener: Send + Sync {
    fn on_writer_matched(&self, writer: GUID, info: MatchingInfo);
}

/// State shared by both writer flavours.
pub struct WriterCore {
    guid: GUID,
    attributes: RwLock<WriterAttributes>,
    history: Arc<WriterHistory>,
    transport: Arc<dyn Transport>,
    listener: RwLock<Option<Arc<dyn WriterListener>>>,
    liveliness_asserted: AtomicBool,
}

impl WriterCore {
    pub(crate) fn new(
        guid: GUID,
        attributes: WriterAttributes,
        history: Arc<WriterHistory>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        history.attach(guid);
        Self {
            guid,
            attributes: RwLock::new(attributes),
            history,
            transport,
            listener: RwLock::new(None),
            liveliness_asserted: AtomicBool::new(false),
        }
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    pub fn attributes(&self) -> WriterAttributes {
        self.attributes.read().clone()
    }

    pub fn times(&self) -> WriterTimes {
        self.attributes.read().times
    }

    pub(crate) fn set_times(&self, times: WriterTimes) {
        self.attributes.write().times = times;
    }

    pub fn history(&self) -> &Arc<WriterHistory> {
        &self.history
    }

    pub fn topic_kind(&self) -> TopicKind {
        self.history.topic_kind()
    }

    pub fn push_mode(&self) -> bool {
        self.attributes.read().push_mode
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn WriterListener>>) {
        *self.listener.write() = listener;
    }

    pub(crate) fn notify_matched(&self, info: MatchingInfo) {
        let listener = self.listener.read().clone();
        if let Some(l) = listener {
            l.on_writer_matched(self.guid, info);
        }
    }

    /// Reserve a change stamped with this writer's identity.
    ///
    /// Keyed topics expect a defined instance handle; a nil one is logged and
    /// the change is still produced.
    pub fn new_change(&self, kind: ChangeKind, handle: InstanceHandle) -> Result<CacheChange> {
        if self.topic_kind() == TopicKind::WithKey && !handle.is_defined() {
            log::warn!(
                "[Writer::new_change] {} keyed change without instance handle",
                self.guid
            );
        }
        let mut change = self.history.reserve_cache()?;
        change.kind = kind;
        change.writer_guid = self.guid;
        change.instance_handle = handle;
        change.source_timestamp = Time::now();
        Ok(change)
    }

    pub fn assert_liveliness(&self) {
        self.liveliness_asserted.store(true, Ordering::Relaxed);
    }

    pub fn liveliness_asserted(&self) -> bool {
        self.liveliness_asserted.load(Ordering::Relaxed)
    }

    /// Read and clear the liveliness flag.
    pub(crate) fn take_liveliness(&self) -> bool {
        self.liveliness_asserted.swap(false, Ordering::Relaxed)
    }

    pub(crate) fn send<'a>(
        &self,
        message: &RtpsMessage,
        destinations: impl IntoIterator<Item = &'a Locator>,
    ) -> usize {
        let bytes = message.encode();
        send_to_all(self.transport.as_ref(), &bytes, destinations)
    }

    /// DATA submessage for `change`, addressed to `reader_id`.
    ///
    /// Inline QoS carries the key hash on keyed topics and the status info
    /// for anything but a plain write.
    pub(crate) fn data_submessage(
        &self,
        change: &CacheChange,
        reader_id: EntityId,
        expects_inline_qos: bool,
    ) -> Submessage {
        let mut qos = ParameterList::new();
        if change.instance_handle.is_defined()
            && (self.topic_kind() == TopicKind::WithKey || expects_inline_qos)
        {
            qos.push(Parameter::KeyHash(change.instance_handle));
        }
        if !change.kind.is_alive() {
            qos.push(Parameter::StatusInfo(change.kind));
        }
        let payload = if change.serialized_payload.is_empty() {
            None
        } else {
            Some(change.serialized_payload.clone())
        };
        Submessage::Data(Data {
            reader_id,
            writer_id: self.guid.entity_id,
            writer_sn: change.sequence_number,
            inline_qos: if qos.is_empty() { None } else { Some(qos) },
            payload,
            key_flag: false,
        })
    }
}

/// A local writer of either flavour.
#[derive(Clone)]
pub enum Writer {
    Stateless(Arc<StatelessWriter>),
    Stateful(Arc<StatefulWriter>),
}

impl Writer {
    pub fn core(&self) -> &WriterCore {
        match self {
            Writer::Stateless(w) => w.core(),
            Writer::Stateful(w) => w.core(),
        }
    }

    pub fn guid(&self) -> GUID {
        self.core().guid()
    }

    pub fn history(&self) -> &Arc<WriterHistory> {
        self.core().history()
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self, Writer::Stateful(_))
    }

    pub fn new_change(&self, kind: ChangeKind, handle: InstanceHandle) -> Result<CacheChange> {
        self.core().new_change(kind, handle)
    }

    /// Store a change and hand it to the send path.
    ///
    /// Keep-last evicts the oldest change (of the same instance on keyed
    /// topics); keep-all first reclaims changes every reader acknowledged
    /// and otherwise fails with `HistoryFull`. Eviction and insertion happen
    /// under one history lock. On failure the change is released and nothing
    /// is sent.
    pub fn add_change(&self, change: CacheChange) -> Result<SequenceNumber> {
        let mut evicted = Vec::new();
        let result = self
            .history()
            .add_change_with(change, |seq| self.is_acked_by_all(seq), &mut evicted);
        for seq in evicted {
            self.change_removed_by_history(seq);
        }
        let seq = match result {
            Ok(seq) => seq,
            Err(e) => {
                if matches!(e, Error::HistoryFull) {
                    log::debug!(
                        "[Writer::add_change] {} history full ({} changes)",
                        self.guid(),
                        self.history().len()
                    );
                }
                return Err(e);
            }
        };
        match self {
            Writer::Stateless(w) => w.unsent_change_added(seq),
            Writer::Stateful(w) => w.unsent_change_added(seq),
        }
        Ok(seq)
    }

    pub fn remove_change(&self, seq: SequenceNumber) -> bool {
        if !self.history().remove_change(seq) {
            return false;
        }
        self.change_removed_by_history(seq);
        true
    }

    pub fn remove_min_change(&self) -> Option<SequenceNumber> {
        let seq = self.history().remove_min_change()?;
        self.change_removed_by_history(seq);
        Some(seq)
    }

    pub fn remove_all_changes(&self) -> usize {
        let removed = self.history().remove_all_changes();
        for seq in &removed {
            self.change_removed_by_history(*seq);
        }
        removed.len()
    }

    fn change_removed_by_history(&self, seq: SequenceNumber) {
        if let Writer::Stateful(w) = self {
            w.change_removed_by_history(seq);
        }
    }

    /// Mark every stored change unsent and send again.
    pub fn unsent_changes_reset(&self) {
        match self {
            Writer::Stateless(w) => w.unsent_changes_reset(),
            Writer::Stateful(w) => w.unsent_changes_reset(),
        }
    }

    pub fn matched_reader_add(&self, reader: RemoteReaderAttributes) -> bool {
        match self {
            Writer::Stateless(w) => w.matched_add(reader),
            Writer::Stateful(w) => w.matched_add(reader),
        }
    }

    pub fn matched_reader_remove(&self, reader: &GUID) -> bool {
        match self {
            Writer::Stateless(w) => w.matched_remove(reader),
            Writer::Stateful(w) => w.matched_remove(reader),
        }
    }

    pub fn matched_reader_update(&self, reader: RemoteReaderAttributes) -> bool {
        match self {
            Writer::Stateless(w) => w.matched_update(reader),
            Writer::Stateful(w) => w.matched_update(reader),
        }
    }

    pub fn matched_reader_is_matched(&self, reader: &GUID) -> bool {
        match self {
            Writer::Stateless(w) => w.is_matched(reader),
            Writer::Stateful(w) => w.is_matched(reader),
        }
    }

    pub fn matched_reader_count(&self) -> usize {
        match self {
            Writer::Stateless(w) => w.matched_reader_count(),
            Writer::Stateful(w) => w.matched_reader_count(),
        }
    }

    /// Stateless writers never wait for acknowledgements.
    pub fn is_acked_by_all(&self, seq: SequenceNumber) -> bool {
        match self {
            Writer::Stateless(_) => true,
            Writer::Stateful(w) => w.is_acked_by_all(seq),
        }
    }

    pub fn wait_for_all_acked(&self, timeout: Duration) -> bool {
        match self {
            Writer::Stateless(_) => true,
            Writer::Stateful(w) => w.wait_for_all_acked(timeout),
        }
    }

    pub(crate) fn process_acknack(&self, reader: GUID, acknack: &AckNack) {
        match self {
            Writer::Stateless(_) => {
                log::trace!("[Writer] {} ignoring ACKNACK (stateless)", self.guid());
            }
            Writer::Stateful(w) => w.process_acknack(reader, acknack),
        }
    }

    pub fn send_heartbeat(&self) {
        if let Writer::Stateful(w) = self {
            w.send_heartbeat();
        }
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn WriterListener>>) {
        self.core().set_listener(listener);
    }

    pub fn update_times(&self, times: WriterTimes) {
        self.core().set_times(times);
    }

    pub fn assert_liveliness(&self) {
        self.core().assert_liveliness();
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_stateful() {
            "Stateful"
        } else {
            "Stateless"
        };
        write!(f, "Writer::{}({})", kind, self.guid())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::qos::{HistoryQosPolicy, ReliabilityKind};
    use crate::transport::LoopbackTransport;

    fn stateless(qos: HistoryQosPolicy, max_samples: i32, topic_kind: TopicKind) -> Writer {
        let guid = writer_guid(1, topic_kind);
        let core = WriterCore::new(
            guid,
            attributes(ReliabilityKind::BestEffort, topic_kind),
            history(qos, max_samples, topic_kind),
            Arc::new(LoopbackTransport::new()),
        );
        Writer::Stateless(Arc::new(StatelessWriter::new(core)))
    }

    fn write(w: &Writer, handle: InstanceHandle, byte: u8) -> Result<SequenceNumber> {
        let mut c = w.new_change(ChangeKind::Alive, handle)?;
        c.serialized_payload.data.push(byte);
        w.add_change(c)
    }

    #[test]
    fn test_keep_last_evicts_oldest() {
        let w = stateless(HistoryQosPolicy::keep_last(2), 100, TopicKind::NoKey);
        for i in 0..5 {
            write(&w, InstanceHandle::NIL, i).expect("keep-last never rejects");
        }
        assert_eq!(
            w.history().sequence_numbers(),
            vec![SequenceNumber(4), SequenceNumber(5)]
        );
    }

    #[test]
    fn test_keep_last_never_rejects_concurrent_writers() {
        use std::sync::Barrier;
        use std::thread;

        const THREADS: usize = 8;
        const WRITES: usize = 5_000;
        let w = stateless(HistoryQosPolicy::keep_last(1), 1, TopicKind::NoKey);
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let w = w.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    (0..WRITES)
                        .filter(|i| write(&w, InstanceHandle::NIL, (t + i) as u8).is_err())
                        .count()
                })
            })
            .collect();
        let failures: usize = handles
            .into_iter()
            .map(|h| h.join().expect("writer thread"))
            .sum();
        assert_eq!(failures, 0, "keep-last add_change rejected a write");
        assert_eq!(w.history().len(), 1);
        assert_eq!(
            w.history().last_sequence(),
            SequenceNumber((THREADS * WRITES) as i64)
        );
        assert_eq!(w.history().reserved_count(), 1);
    }

    #[test]
    fn test_keep_last_is_per_instance_on_keyed_topics() {
        let w = stateless(HistoryQosPolicy::keep_last(1), 100, TopicKind::WithKey);
        let a = InstanceHandle([1; 16]);
        let b = InstanceHandle([2; 16]);
        write(&w, a, 1).expect("a1");
        write(&w, b, 1).expect("b1");
        write(&w, a, 2).expect("a2");
        assert_eq!(w.history().len(), 2);
        assert_eq!(w.history().instance_len(&a), 1);
        assert_eq!(
            w.history().oldest_change_of_instance(&a),
            Some(SequenceNumber(3))
        );
    }

    #[test]
    fn test_max_samples_one_keep_all_rejects_second_write() {
        // Stateless writers treat every change as acknowledged, so use a
        // stateful writer with an unacknowledging reliable reader.
        let topic_kind = TopicKind::NoKey;
        let guid = writer_guid(2, topic_kind);
        let core = WriterCore::new(
            guid,
            attributes(ReliabilityKind::Reliable, topic_kind),
            history(HistoryQosPolicy::keep_all(), 1, topic_kind),
            Arc::new(LoopbackTransport::new()),
        );
        let w = Writer::Stateful(Arc::new(StatefulWriter::new(core)));
        let reader = RemoteReaderAttributes::new(
            GUID::new(
                crate::protocol::guid::GuidPrefix::generate(),
                EntityId::from_key(1, 0x04),
            ),
            crate::endpoint::EndpointAttributes {
                reliability_kind: ReliabilityKind::Reliable,
                ..Default::default()
            },
        );
        assert!(w.matched_reader_add(reader));
        write(&w, InstanceHandle::NIL, 1).expect("first write");
        let err = write(&w, InstanceHandle::NIL, 2).expect_err("second write must fail");
        assert!(matches!(err, Error::HistoryFull));
        assert_eq!(w.history().len(), 1);
        assert_eq!(w.history().reserved_count(), 1);
    }

    #[test]
    fn test_keep_all_stateless_reclaims() {
        let w = stateless(HistoryQosPolicy::keep_all(), 1, TopicKind::NoKey);
        write(&w, InstanceHandle::NIL, 1).expect("first");
        write(&w, InstanceHandle::NIL, 2).expect("second reclaims the first");
        assert_eq!(w.history().sequence_numbers(), vec![SequenceNumber(2)]);
    }

    #[test]
    fn test_new_change_stamps_identity() {
        let w = stateless(HistoryQosPolicy::keep_last(1), 10, TopicKind::NoKey);
        let c = w
            .new_change(ChangeKind::NotAliveDisposed, InstanceHandle::NIL)
            .expect("reserve");
        assert_eq!(c.writer_guid, w.guid());
        assert_eq!(c.kind, ChangeKind::NotAliveDisposed);
        w.history().release_cache(c);
    }

    #[test]
    fn test_data_submessage_inline_qos() {
        let w = stateless(HistoryQosPolicy::keep_last(1), 10, TopicKind::WithKey);
        let mut c = w
            .new_change(ChangeKind::NotAliveDisposed, InstanceHandle([7; 16]))
            .expect("reserve");
        c.sequence_number = SequenceNumber(3);
        match w.core().data_submessage(&c, EntityId::UNKNOWN, false) {
            Submessage::Data(d) => {
                let qos = d.inline_qos.expect("inline qos");
                assert_eq!(qos.key_hash(), Some(InstanceHandle([7; 16])));
                assert_eq!(qos.status_info(), Some(ChangeKind::NotAliveDisposed));
                assert!(d.payload.is_none());
                assert_eq!(d.writer_sn, SequenceNumber(3));
            }
            other => panic!("unexpected submessage {:?}", other),
        }
    }
}
