// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable writer with per-reader acknowledgement state.
//!
//! # Change lifecycle per reader
//!
//! ```text
//! Unsent --send--> Underway --sent--> Unacknowledged --ACKNACK base--> Acknowledged
//!                                         |    ^
//!                                  NACK   v    | resend
//!                                       Requested
//! ```
//!
//! Best-effort readers skip straight to `Acknowledged` once sent.
//!
//! Lock order: the history lock is never taken while the proxy lock is
//! held. Sends gather a plan under the proxy lock, read the history, send,
//! then re-lock to record the outcome.

use super::WriterCore;
use crate::endpoint::{MatchedEndpoint, MatchingInfo, MatchingStatus, RemoteReaderAttributes};
use crate::history::lock_state;
use crate::protocol::guid::{EntityId, GuidPrefix, GUID};
use crate::protocol::locator::Locator;
use crate::protocol::message::{AckNack, Gap, Heartbeat, RtpsMessage, Submessage};
use crate::protocol::types::{Count, SequenceNumber, SequenceNumberSet};
use crate::qos::{DurabilityKind, ReliabilityKind};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Flush a message once its DATA payloads reach this size.
const MESSAGE_FLUSH_BYTES: usize = 32 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeForReaderStatus {
    Unsent,
    Unacknowledged,
    Requested,
    Acknowledged,
    Underway,
}

/// What the writer knows about one matched reader.
#[derive(Clone, Debug)]
pub struct ReaderProxy {
    attributes: RemoteReaderAttributes,
    changes: BTreeMap<SequenceNumber, ChangeForReaderStatus>,
    /// Changes up to here predate the match and are irrelevant to the reader.
    low_mark: SequenceNumber,
    last_acknack_count: Count,
}

impl ReaderProxy {
    fn new(attributes: RemoteReaderAttributes, low_mark: SequenceNumber) -> Self {
        Self {
            attributes,
            changes: BTreeMap::new(),
            low_mark,
            last_acknack_count: 0,
        }
    }

    pub fn guid(&self) -> GUID {
        self.attributes.guid
    }

    pub fn attributes(&self) -> &RemoteReaderAttributes {
        &self.attributes
    }

    pub fn is_reliable(&self) -> bool {
        self.attributes.endpoint.reliability_kind == ReliabilityKind::Reliable
    }

    pub fn status(&self, seq: SequenceNumber) -> Option<ChangeForReaderStatus> {
        self.changes.get(&seq).copied()
    }

    /// Untracked changes are either irrelevant or already dropped, so they
    /// count as acknowledged.
    pub fn is_acked(&self, seq: SequenceNumber) -> bool {
        !matches!(
            self.changes.get(&seq),
            Some(s) if *s != ChangeForReaderStatus::Acknowledged
        )
    }

    pub fn unacked_count(&self) -> usize {
        self.changes
            .values()
            .filter(|s| **s != ChangeForReaderStatus::Acknowledged)
            .count()
    }

    fn destinations(&self) -> Vec<Locator> {
        self.attributes
            .endpoint
            .unicast_locator_list
            .iter()
            .chain(self.attributes.endpoint.multicast_locator_list.iter())
            .copied()
            .collect()
    }
}

/// One batch of work for one reader, built under the proxy lock.
struct SendPlan {
    reader: GUID,
    reliable: bool,
    expects_inline_qos: bool,
    destinations: Vec<Locator>,
    low_mark: SequenceNumber,
    seqs: Vec<SequenceNumber>,
}

pub struct StatefulWriter {
    core: WriterCore,
    proxies: Mutex<Vec<ReaderProxy>>,
    acked: Condvar,
    heartbeat_count: AtomicI32,
}

impl StatefulWriter {
    pub(crate) fn new(core: WriterCore) -> Self {
        Self {
            core,
            proxies: Mutex::new(Vec::new()),
            acked: Condvar::new(),
            heartbeat_count: AtomicI32::new(0),
        }
    }

    pub fn core(&self) -> &WriterCore {
        &self.core
    }

    pub fn matched_reader_count(&self) -> usize {
        lock_state(&self.proxies, "StatefulWriter::matched_reader_count").len()
    }

    /// Snapshot of the proxy for `reader`.
    pub fn reader_proxy(&self, reader: &GUID) -> Option<ReaderProxy> {
        lock_state(&self.proxies, "StatefulWriter::reader_proxy")
            .iter()
            .find(|p| p.guid() == *reader)
            .cloned()
    }

    pub fn reader_proxies(&self) -> Vec<ReaderProxy> {
        lock_state(&self.proxies, "StatefulWriter::reader_proxies").clone()
    }

    pub(crate) fn unsent_change_added(&self, seq: SequenceNumber) {
        {
            let mut proxies = lock_state(&self.proxies, "StatefulWriter::unsent_change_added");
            for proxy in proxies.iter_mut() {
                proxy.changes.insert(seq, ChangeForReaderStatus::Unsent);
            }
        }
        if self.core.push_mode() {
            self.send_pending();
        }
    }

    pub(crate) fn unsent_changes_reset(&self) {
        let seqs = self.core.history().sequence_numbers();
        {
            let mut proxies = lock_state(&self.proxies, "StatefulWriter::unsent_changes_reset");
            for proxy in proxies.iter_mut() {
                for seq in seqs.iter().filter(|s| **s > proxy.low_mark) {
                    proxy.changes.insert(*seq, ChangeForReaderStatus::Unsent);
                }
            }
        }
        self.send_pending();
    }

    pub(crate) fn change_removed_by_history(&self, seq: SequenceNumber) {
        let mut proxies = lock_state(&self.proxies, "StatefulWriter::change_removed_by_history");
        for proxy in proxies.iter_mut() {
            proxy.changes.remove(&seq);
        }
        self.acked.notify_all();
    }

    /// Send every change that is unsent or requested by some reader.
    fn send_pending(&self) {
        let plans = {
            let mut proxies = lock_state(&self.proxies, "StatefulWriter::send_pending");
            let mut plans = Vec::new();
            for proxy in proxies.iter_mut() {
                let mut seqs = Vec::new();
                for (seq, status) in proxy.changes.iter_mut() {
                    if matches!(
                        status,
                        ChangeForReaderStatus::Unsent | ChangeForReaderStatus::Requested
                    ) {
                        *status = ChangeForReaderStatus::Underway;
                        seqs.push(*seq);
                    }
                }
                if !seqs.is_empty() {
                    plans.push(SendPlan {
                        reader: proxy.guid(),
                        reliable: proxy.is_reliable(),
                        expects_inline_qos: proxy.attributes.expects_inline_qos,
                        destinations: proxy.destinations(),
                        low_mark: proxy.low_mark,
                        seqs,
                    });
                }
            }
            plans
        };

        for plan in &plans {
            self.execute(plan);
        }

        if plans.is_empty() {
            return;
        }
        let mut proxies = lock_state(&self.proxies, "StatefulWriter::send_pending");
        let mut any_acked = false;
        for plan in &plans {
            let Some(proxy) = proxies.iter_mut().find(|p| p.guid() == plan.reader) else {
                continue;
            };
            let next = if plan.reliable {
                ChangeForReaderStatus::Unacknowledged
            } else {
                any_acked = true;
                ChangeForReaderStatus::Acknowledged
            };
            for seq in &plan.seqs {
                if let Some(status) = proxy.changes.get_mut(seq) {
                    if *status == ChangeForReaderStatus::Underway {
                        *status = next;
                    }
                }
            }
        }
        if any_acked {
            self.acked.notify_all();
        }
    }

    /// Send the DATA (or GAP for vanished changes) of one plan.
    fn execute(&self, plan: &SendPlan) {
        let guid = self.core.guid();
        if plan.destinations.is_empty() {
            log::debug!(
                "[StatefulWriter] {} reader {} has no locators",
                guid,
                plan.reader
            );
            return;
        }
        let history = self.core.history();
        let mut msg = self.message_to(plan.reader.prefix);
        let mut pending_bytes = 0usize;
        let mut missing = Vec::new();
        for seq in &plan.seqs {
            match history.get_change(*seq) {
                Some(change) => {
                    pending_bytes += change.serialized_payload.len();
                    msg.push(Submessage::InfoTimestamp(Some(change.source_timestamp)));
                    msg.push(self.core.data_submessage(
                        &change,
                        plan.reader.entity_id,
                        plan.expects_inline_qos,
                    ));
                    if pending_bytes >= MESSAGE_FLUSH_BYTES {
                        self.core.send(&msg, &plan.destinations);
                        msg = self.message_to(plan.reader.prefix);
                        pending_bytes = 0;
                    }
                }
                None => missing.push(*seq),
            }
        }
        if let Some(gap) = gap_for(&missing, plan.reader.entity_id, guid.entity_id) {
            msg.push(Submessage::Gap(gap));
        }
        if plan.reliable {
            if let Some(hb) = self.heartbeat_for(plan.reader.entity_id, Some(plan.low_mark)) {
                msg.push(Submessage::Heartbeat(hb));
            }
        }
        if msg.submessages.len() > 1 {
            self.core.send(&msg, &plan.destinations);
        }
        log::trace!(
            "[StatefulWriter] {} sent {} change(s) to {}",
            guid,
            plan.seqs.len(),
            plan.reader
        );
    }

    fn message_to(&self, prefix: GuidPrefix) -> RtpsMessage {
        let mut msg = RtpsMessage::new(self.core.guid().prefix);
        msg.push(Submessage::InfoDestination(prefix));
        msg
    }

    /// Heartbeat announcing the stored range, clipped to changes relevant to
    /// a reader matched after `low_mark`.
    fn heartbeat_for(
        &self,
        reader_id: EntityId,
        low_mark: Option<SequenceNumber>,
    ) -> Option<Heartbeat> {
        let history = self.core.history();
        let last_written = history.last_sequence();
        let mut first = history.min_seq().unwrap_or_else(|| last_written.next());
        let last = history.max_seq().unwrap_or(last_written);
        if let Some(low) = low_mark {
            if first <= low {
                first = low.next();
            }
        }
        if first > last.next() {
            return None;
        }
        let count = self.heartbeat_count.fetch_add(1, Ordering::Relaxed) + 1;
        Some(Heartbeat {
            reader_id,
            writer_id: self.core.guid().entity_id,
            first_sn: first,
            last_sn: last,
            count,
            final_flag: false,
            liveliness_flag: self.core.take_liveliness(),
        })
    }

    /// Periodic heartbeat to every reliable reader with unacknowledged changes.
    pub fn send_heartbeat(&self) {
        let targets: Vec<(GUID, SequenceNumber, Vec<Locator>)> = {
            let proxies = lock_state(&self.proxies, "StatefulWriter::send_heartbeat");
            proxies
                .iter()
                .filter(|p| p.is_reliable() && p.unacked_count() > 0)
                .map(|p| (p.guid(), p.low_mark, p.destinations()))
                .collect()
        };
        for (reader, low_mark, destinations) in targets {
            let Some(hb) = self.heartbeat_for(reader.entity_id, Some(low_mark)) else {
                continue;
            };
            log::trace!(
                "[StatefulWriter] {} HEARTBEAT {}..{} count={} -> {}",
                self.core.guid(),
                hb.first_sn,
                hb.last_sn,
                hb.count,
                reader
            );
            let mut msg = self.message_to(reader.prefix);
            msg.push(Submessage::Heartbeat(hb));
            self.core.send(&msg, &destinations);
        }
    }

    /// Apply an ACKNACK from `reader`: acknowledge everything below the base,
    /// mark the listed changes requested, then resend or GAP them.
    pub(crate) fn process_acknack(&self, reader: GUID, acknack: &AckNack) {
        let guid = self.core.guid();
        let mut gaps = Vec::new();
        let destinations;
        {
            let mut proxies = lock_state(&self.proxies, "StatefulWriter::process_acknack");
            let Some(proxy) = proxies.iter_mut().find(|p| p.guid() == reader) else {
                log::debug!("[StatefulWriter] {} ACKNACK from unmatched {}", guid, reader);
                return;
            };
            if acknack.count <= proxy.last_acknack_count {
                log::trace!(
                    "[StatefulWriter] {} stale ACKNACK count={} from {}",
                    guid,
                    acknack.count,
                    reader
                );
                return;
            }
            proxy.last_acknack_count = acknack.count;

            let base = acknack.reader_sn_state.base();
            for (_, status) in proxy.changes.range_mut(..base) {
                *status = ChangeForReaderStatus::Acknowledged;
            }
            for seq in acknack.reader_sn_state.iter() {
                match proxy.changes.get_mut(&seq) {
                    Some(status) if seq > proxy.low_mark => {
                        *status = ChangeForReaderStatus::Requested;
                    }
                    _ => gaps.push(seq),
                }
            }
            destinations = proxy.destinations();
        }
        self.acked.notify_all();

        if !acknack.reader_sn_state.is_empty() {
            log::debug!(
                "[StatefulWriter] {} NACK from {}: {} requested, {} irrelevant",
                guid,
                reader,
                acknack.reader_sn_state.len() - gaps.len(),
                gaps.len()
            );
        }
        if let Some(gap) = gap_for(&gaps, reader.entity_id, guid.entity_id) {
            let mut msg = self.message_to(reader.prefix);
            msg.push(Submessage::Gap(gap));
            self.core.send(&msg, &destinations);
        }
        self.send_pending();
    }

    /// True when every reliable reader acknowledged `seq`.
    pub fn is_acked_by_all(&self, seq: SequenceNumber) -> bool {
        lock_state(&self.proxies, "StatefulWriter::is_acked_by_all")
            .iter()
            .filter(|p| p.is_reliable())
            .all(|p| p.is_acked(seq))
    }

    fn all_acked(proxies: &[ReaderProxy]) -> bool {
        proxies
            .iter()
            .filter(|p| p.is_reliable())
            .all(|p| p.unacked_count() == 0)
    }

    /// Block until every reliable reader acknowledged every stored change.
    pub fn wait_for_all_acked(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut proxies = lock_state(&self.proxies, "StatefulWriter::wait_for_all_acked");
        loop {
            if Self::all_acked(&proxies) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            proxies = match self.acked.wait_timeout(proxies, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => {
                    log::debug!("[StatefulWriter::wait_for_all_acked] Lock poisoned, recovering");
                    e.into_inner().0
                }
            };
        }
    }
}

impl MatchedEndpoint for StatefulWriter {
    type Remote = RemoteReaderAttributes;

    /// Transient-local writers replay their history to the new reader;
    /// volatile writers only send what is written after the match.
    fn matched_add(&self, remote: RemoteReaderAttributes) -> bool {
        let guid = remote.guid;
        let history = self.core.history();
        let seqs = history.sequence_numbers();
        let last_written = history.last_sequence();
        let replay = self.core.attributes().endpoint.durability_kind >= DurabilityKind::TransientLocal;
        let reliable = remote.endpoint.reliability_kind == ReliabilityKind::Reliable;
        {
            let mut proxies = lock_state(&self.proxies, "StatefulWriter::matched_add");
            if proxies.iter().any(|p| p.guid() == guid) {
                return false;
            }
            let mut proxy = if replay {
                ReaderProxy::new(remote, SequenceNumber::ZERO)
            } else {
                ReaderProxy::new(remote, last_written)
            };
            if replay {
                for seq in seqs {
                    proxy.changes.insert(seq, ChangeForReaderStatus::Unsent);
                }
            }
            proxies.push(proxy);
        }
        log::debug!(
            "[StatefulWriter] {} matched reader {} (replay={})",
            self.core.guid(),
            guid,
            replay
        );
        self.core.notify_matched(MatchingInfo {
            status: MatchingStatus::Matched,
            remote_endpoint_guid: guid,
        });
        if replay {
            self.send_pending();
        }
        if reliable {
            // Let the reader learn the current range right away.
            let target = self
                .reader_proxy(&guid)
                .map(|p| (p.low_mark, p.destinations()));
            if let Some((low_mark, destinations)) = target {
                if let Some(hb) = self.heartbeat_for(guid.entity_id, Some(low_mark)) {
                    let mut msg = self.message_to(guid.prefix);
                    msg.push(Submessage::Heartbeat(hb));
                    self.core.send(&msg, &destinations);
                }
            }
        }
        true
    }

    fn matched_remove(&self, guid: &GUID) -> bool {
        {
            let mut proxies = lock_state(&self.proxies, "StatefulWriter::matched_remove");
            let before = proxies.len();
            proxies.retain(|p| p.guid() != *guid);
            if proxies.len() == before {
                return false;
            }
        }
        self.acked.notify_all();
        log::debug!("[StatefulWriter] {} unmatched reader {}", self.core.guid(), guid);
        self.core.notify_matched(MatchingInfo {
            status: MatchingStatus::Removed,
            remote_endpoint_guid: *guid,
        });
        true
    }

    fn matched_update(&self, remote: RemoteReaderAttributes) -> bool {
        let guid = remote.guid;
        {
            let mut proxies = lock_state(&self.proxies, "StatefulWriter::matched_update");
            let Some(proxy) = proxies.iter_mut().find(|p| p.guid() == guid) else {
                return false;
            };
            if proxy.attributes == remote {
                return false;
            }
            proxy.attributes = remote;
        }
        log::debug!("[StatefulWriter] {} updated reader {}", self.core.guid(), guid);
        true
    }

    fn is_matched(&self, guid: &GUID) -> bool {
        lock_state(&self.proxies, "StatefulWriter::is_matched")
            .iter()
            .any(|p| p.guid() == *guid)
    }
}

/// GAP covering exactly the sequence numbers in `seqs`.
fn gap_for(seqs: &[SequenceNumber], reader_id: EntityId, writer_id: EntityId) -> Option<Gap> {
    let (&first, rest) = seqs.split_first()?;
    let mut gap_list = SequenceNumberSet::new(first.next());
    for seq in rest {
        if !gap_list.add(*seq) {
            log::debug!("[StatefulWriter] GAP entry {} outside bitmap window", seq);
        }
    }
    Some(Gap {
        reader_id,
        writer_id,
        gap_start: first,
        gap_list,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::endpoint::EndpointAttributes;
    use crate::protocol::guid::InstanceHandle;
    use crate::protocol::types::{ChangeKind, TopicKind};
    use crate::qos::HistoryQosPolicy;
    use crate::transport::{InputChannel, LoopbackTransport, Transport};
    use crate::writer::Writer;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    struct Fixture {
        writer: Writer,
        stateful: Arc<StatefulWriter>,
        input: Box<dyn InputChannel>,
        reader: GUID,
    }

    fn fixture(durability: DurabilityKind, port: u32) -> Fixture {
        let t = LoopbackTransport::new();
        let loc = Locator::udpv4(Ipv4Addr::LOCALHOST, port);
        let input = t.open_input(&loc, 0).expect("bind");
        let mut attrs = attributes(ReliabilityKind::Reliable, TopicKind::NoKey);
        attrs.endpoint.durability_kind = durability;
        let core = WriterCore::new(
            writer_guid(5, TopicKind::NoKey),
            attrs,
            history(HistoryQosPolicy::keep_last(10), 10, TopicKind::NoKey),
            Arc::new(t),
        );
        let stateful = Arc::new(StatefulWriter::new(core));
        let reader = GUID::new(GuidPrefix::generate(), EntityId::from_key(3, 0x04));
        Fixture {
            writer: Writer::Stateful(stateful.clone()),
            stateful,
            input,
            reader,
        }
    }

    fn remote(reader: GUID, port: u32) -> RemoteReaderAttributes {
        let mut endpoint = EndpointAttributes {
            reliability_kind: ReliabilityKind::Reliable,
            ..Default::default()
        };
        endpoint
            .unicast_locator_list
            .push(Locator::udpv4(Ipv4Addr::LOCALHOST, port));
        RemoteReaderAttributes::new(reader, endpoint)
    }

    fn write(w: &Writer, byte: u8) -> SequenceNumber {
        let mut c = w
            .new_change(ChangeKind::Alive, InstanceHandle::NIL)
            .expect("reserve");
        c.serialized_payload.data.push(byte);
        w.add_change(c).expect("add")
    }

    fn drain(input: &mut Box<dyn InputChannel>) -> Vec<Submessage> {
        let mut subs = Vec::new();
        while let Some(bytes) = input
            .receive(Duration::from_millis(30))
            .expect("receive")
        {
            subs.extend(RtpsMessage::decode(&bytes).expect("decode").submessages);
        }
        subs
    }

    fn acknack(reader: GUID, writer: GUID, base: i64, missing: &[i64], count: Count) -> AckNack {
        let mut set = SequenceNumberSet::new(SequenceNumber(base));
        for m in missing {
            set.add(SequenceNumber(*m));
        }
        AckNack {
            reader_id: reader.entity_id,
            writer_id: writer.entity_id,
            reader_sn_state: set,
            count,
            final_flag: false,
        }
    }

    #[test]
    fn test_sent_changes_wait_for_ack() {
        let mut f = fixture(DurabilityKind::Volatile, 7800);
        assert!(f.writer.matched_reader_add(remote(f.reader, 7800)));
        let seq = write(&f.writer, 1);
        let subs = drain(&mut f.input);
        assert!(subs.iter().any(|s| matches!(s, Submessage::Data(_))));
        assert!(subs.iter().any(|s| matches!(s, Submessage::Heartbeat(_))));
        assert_eq!(
            f.stateful.reader_proxy(&f.reader).and_then(|p| p.status(seq)),
            Some(ChangeForReaderStatus::Unacknowledged)
        );
        assert!(!f.writer.is_acked_by_all(seq));

        f.writer
            .process_acknack(f.reader, &acknack(f.reader, f.writer.guid(), 2, &[], 1));
        assert!(f.writer.is_acked_by_all(seq));
        assert!(f.writer.wait_for_all_acked(Duration::from_millis(10)));
    }

    #[test]
    fn test_nack_resends_and_gaps() {
        let mut f = fixture(DurabilityKind::Volatile, 7801);
        assert!(f.writer.matched_reader_add(remote(f.reader, 7801)));
        write(&f.writer, 1);
        write(&f.writer, 2);
        assert!(f.writer.remove_change(SequenceNumber(1)));
        drain(&mut f.input);

        f.writer
            .process_acknack(f.reader, &acknack(f.reader, f.writer.guid(), 1, &[1, 2], 1));
        let subs = drain(&mut f.input);
        assert!(subs.iter().any(|s| matches!(
            s,
            Submessage::Gap(g) if g.gap_start == SequenceNumber(1)
        )));
        assert!(subs.iter().any(|s| matches!(
            s,
            Submessage::Data(d) if d.writer_sn == SequenceNumber(2)
        )));

        // Same count again is ignored.
        f.writer
            .process_acknack(f.reader, &acknack(f.reader, f.writer.guid(), 1, &[2], 1));
        assert!(drain(&mut f.input)
            .iter()
            .all(|s| !matches!(s, Submessage::Data(_))));
    }

    #[test]
    fn test_transient_local_replays_history() {
        let mut f = fixture(DurabilityKind::TransientLocal, 7802);
        write(&f.writer, 1);
        write(&f.writer, 2);
        assert!(f.writer.matched_reader_add(remote(f.reader, 7802)));
        let data = drain(&mut f.input)
            .into_iter()
            .filter(|s| matches!(s, Submessage::Data(_)))
            .count();
        assert_eq!(data, 2);
    }

    #[test]
    fn test_volatile_does_not_replay() {
        let mut f = fixture(DurabilityKind::Volatile, 7803);
        write(&f.writer, 1);
        assert!(f.writer.matched_reader_add(remote(f.reader, 7803)));
        let subs = drain(&mut f.input);
        assert!(subs.iter().all(|s| !matches!(s, Submessage::Data(_))));
        // The pre-match change does not hold back acknowledgement.
        assert!(f.writer.is_acked_by_all(SequenceNumber(1)));
    }

    #[test]
    fn test_matched_remove_releases_waiters() {
        let f = fixture(DurabilityKind::Volatile, 7804);
        assert!(f.writer.matched_reader_add(remote(f.reader, 7804)));
        write(&f.writer, 1);
        assert!(!f.writer.wait_for_all_acked(Duration::from_millis(10)));
        assert!(f.writer.matched_reader_remove(&f.reader));
        assert!(!f.writer.matched_reader_is_matched(&f.reader));
        assert!(f.writer.wait_for_all_acked(Duration::from_millis(10)));
    }

    #[test]
    fn test_removed_changes_leave_proxy_state() {
        let f = fixture(DurabilityKind::Volatile, 7805);
        assert!(f.writer.matched_reader_add(remote(f.reader, 7805)));
        let seq = write(&f.writer, 1);
        assert!(!f.writer.is_acked_by_all(seq));

        assert!(f.writer.remove_change(seq));
        assert!(!f.writer.history().contains(seq));
        assert_eq!(
            f.stateful.reader_proxy(&f.reader).and_then(|p| p.status(seq)),
            None
        );
        assert!(f.writer.is_acked_by_all(seq));
        assert!(f.writer.wait_for_all_acked(Duration::from_millis(10)));

        // Keep-last eviction of the oldest change drops its tracking too.
        let first = write(&f.writer, 2);
        for byte in 3..13 {
            write(&f.writer, byte);
        }
        assert!(!f.writer.history().contains(first));
        assert_eq!(
            f.stateful.reader_proxy(&f.reader).and_then(|p| p.status(first)),
            None
        );
    }
}
