// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable reader with one [`WriterProxy`] per matched writer.
//!
//! Changes from a reliable writer are buffered until every lower sequence
//! number is either received or declared irrelevant (GAP, or below the
//! first sequence of a HEARTBEAT), then stored in order. A change the
//! history cannot take is dropped without advancing the proxy, so the next
//! HEARTBEAT reports it missing and the writer resends it.
//!
//! Lock order: the proxies lock is taken before the history lock. Listener
//! callbacks run after both are released.

use super::{log_insert_failure, ReaderCore};
use crate::endpoint::{MatchedEndpoint, MatchingInfo, MatchingStatus, RemoteWriterAttributes};
use crate::history::{lock_state, CacheChange};
use crate::protocol::guid::GUID;
use crate::protocol::locator::Locator;
use crate::protocol::message::{AckNack, Gap, Heartbeat, RtpsMessage, Submessage};
use crate::protocol::types::{Count, SequenceNumber, SequenceNumberSet};
use crate::qos::ReliabilityKind;
use crate::transport::send_to_all;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

/// Upper bound on sequence numbers a single GAP range may mark one by one.
const MAX_GAP_RANGE: i64 = 4096;

/// What the reader knows about one matched writer.
#[derive(Clone, Debug)]
pub struct WriterProxy {
    attributes: RemoteWriterAttributes,
    reliable: bool,
    /// Every sequence number up to here was stored or is irrelevant.
    delivered_up_to: SequenceNumber,
    /// Out-of-order arrivals; `None` marks an irrelevant sequence number.
    pending: BTreeMap<SequenceNumber, Option<CacheChange>>,
    highest_known: SequenceNumber,
    last_heartbeat_count: Count,
    acknack_count: Count,
    last_activity: Instant,
}

impl WriterProxy {
    fn new(attributes: RemoteWriterAttributes, reliable: bool) -> Self {
        Self {
            attributes,
            reliable,
            delivered_up_to: SequenceNumber::ZERO,
            pending: BTreeMap::new(),
            highest_known: SequenceNumber::ZERO,
            last_heartbeat_count: 0,
            acknack_count: 0,
            last_activity: Instant::now(),
        }
    }

    pub fn guid(&self) -> GUID {
        self.attributes.guid
    }

    pub fn attributes(&self) -> &RemoteWriterAttributes {
        &self.attributes
    }

    pub fn is_reliable(&self) -> bool {
        self.reliable
    }

    /// Highest sequence number below which nothing is missing.
    pub fn available_changes_max(&self) -> SequenceNumber {
        self.delivered_up_to
    }

    pub fn highest_known(&self) -> SequenceNumber {
        self.highest_known
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn last_heartbeat_count(&self) -> Count {
        self.last_heartbeat_count
    }

    pub fn acknack_count(&self) -> Count {
        self.acknack_count
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    fn is_duplicate(&self, seq: SequenceNumber) -> bool {
        seq <= self.delivered_up_to || self.pending.contains_key(&seq)
    }

    /// Announced but neither received nor irrelevant, within one bitmap window.
    pub fn missing_changes(&self) -> Vec<SequenceNumber> {
        let first = self.delivered_up_to.next();
        let mut out = Vec::new();
        let mut seq = first;
        while seq <= self.highest_known && seq.0 - first.0 < SequenceNumberSet::MAX_BITS {
            if !self.pending.contains_key(&seq) {
                out.push(seq);
            }
            seq = seq.next();
        }
        out
    }

    fn destinations(&self) -> Vec<Locator> {
        let endpoint = &self.attributes.endpoint;
        if endpoint.unicast_locator_list.is_empty() {
            endpoint.multicast_locator_list.iter().copied().collect()
        } else {
            endpoint.unicast_locator_list.iter().copied().collect()
        }
    }

    fn take_pending(&mut self) -> Vec<CacheChange> {
        std::mem::take(&mut self.pending)
            .into_values()
            .flatten()
            .collect()
    }
}

/// ACKNACK to send once the proxies lock is released.
struct AckNackPlan {
    writer: GUID,
    acknack: AckNack,
    destinations: Vec<Locator>,
}

pub struct StatefulReader {
    core: ReaderCore,
    proxies: Mutex<Vec<WriterProxy>>,
}

impl StatefulReader {
    pub(crate) fn new(core: ReaderCore) -> Self {
        Self {
            core,
            proxies: Mutex::new(Vec::new()),
        }
    }

    pub fn core(&self) -> &ReaderCore {
        &self.core
    }

    pub fn matched_writer_count(&self) -> usize {
        lock_state(&self.proxies, "StatefulReader::matched_writer_count").len()
    }

    /// Snapshot of the proxy for `writer`.
    pub fn matched_writer_proxy(&self, writer: &GUID) -> Option<WriterProxy> {
        lock_state(&self.proxies, "StatefulReader::matched_writer_proxy")
            .iter()
            .find(|p| p.guid() == *writer)
            .cloned()
    }

    pub fn accept_msg_from(&self, writer: &GUID) -> bool {
        self.is_matched(writer) || self.core.admits_unmatched(writer)
    }

    /// Refresh the activity time of a matched writer.
    pub fn assert_writer_liveliness(&self, writer: &GUID) -> bool {
        let mut proxies = lock_state(&self.proxies, "StatefulReader::assert_writer_liveliness");
        match proxies.iter_mut().find(|p| p.guid() == *writer) {
            Some(proxy) => {
                proxy.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    fn is_reliable(&self) -> bool {
        self.core.attributes().endpoint.reliability_kind == ReliabilityKind::Reliable
    }

    /// Deliver every pending change that is next in sequence; returns how
    /// many were stored.
    fn drain(&self, proxy: &mut WriterProxy, notify: &mut Vec<CacheChange>) -> usize {
        let mut stored = 0;
        loop {
            let next = proxy.delivered_up_to.next();
            let Some(entry) = proxy.pending.remove(&next) else {
                break;
            };
            match entry {
                None => proxy.delivered_up_to = next,
                Some(change) => match self.core.insert(change, notify) {
                    Ok(inserted) => {
                        proxy.delivered_up_to = next;
                        stored += usize::from(inserted);
                    }
                    Err(e) => {
                        log_insert_failure(self.core.guid(), &e);
                        break;
                    }
                },
            }
        }
        stored
    }

    /// Store `change` in sequence order. Returns whether something new was
    /// stored as a result.
    pub fn process_data(&self, change: CacheChange) -> bool {
        let writer = change.writer_guid;
        let seq = change.sequence_number;
        self.core.notify_activity(writer);

        let mut notify = Vec::new();
        let stored = {
            let mut proxies = lock_state(&self.proxies, "StatefulReader::process_data");
            match proxies.iter_mut().find(|p| p.guid() == writer) {
                Some(proxy) => {
                    proxy.last_activity = Instant::now();
                    if proxy.is_duplicate(seq) {
                        log::trace!(
                            "[StatefulReader] {} duplicate {} seq={}",
                            self.core.guid(),
                            writer,
                            seq
                        );
                        self.core.history().release_cache(change);
                        return false;
                    }
                    if seq > proxy.highest_known {
                        proxy.highest_known = seq;
                    }
                    if proxy.reliable {
                        proxy.pending.insert(seq, Some(change));
                        self.drain(proxy, &mut notify) > 0
                    } else {
                        // Best effort: take what arrives, never look back.
                        match self.core.insert(change, &mut notify) {
                            Ok(inserted) => {
                                proxy.delivered_up_to = seq;
                                inserted
                            }
                            Err(e) => {
                                log_insert_failure(self.core.guid(), &e);
                                false
                            }
                        }
                    }
                }
                None if self.core.admits_unmatched(&writer) => {
                    match self.core.insert(change, &mut notify) {
                        Ok(inserted) => inserted,
                        Err(e) => {
                            log_insert_failure(self.core.guid(), &e);
                            false
                        }
                    }
                }
                None => {
                    log::trace!(
                        "[StatefulReader] {} ignoring DATA from {}",
                        self.core.guid(),
                        writer
                    );
                    self.core.history().release_cache(change);
                    return false;
                }
            }
        };
        self.core.notify_changes(&notify);
        stored
    }

    /// Skip what the writer no longer has, then acknowledge and request
    /// anything still missing.
    pub fn process_heartbeat(&self, writer: GUID, hb: &Heartbeat) {
        if hb.liveliness_flag {
            self.core.notify_activity(writer);
        }
        let mut notify = Vec::new();
        let plan = {
            let mut proxies = lock_state(&self.proxies, "StatefulReader::process_heartbeat");
            let Some(proxy) = proxies.iter_mut().find(|p| p.guid() == writer) else {
                log::trace!(
                    "[StatefulReader] {} HEARTBEAT from unmatched {}",
                    self.core.guid(),
                    writer
                );
                return;
            };
            if hb.count <= proxy.last_heartbeat_count {
                log::trace!(
                    "[StatefulReader] {} stale HEARTBEAT count={} from {}",
                    self.core.guid(),
                    hb.count,
                    writer
                );
                return;
            }
            proxy.last_heartbeat_count = hb.count;
            proxy.last_activity = Instant::now();
            if !proxy.reliable {
                return;
            }
            if hb.last_sn > proxy.highest_known {
                proxy.highest_known = hb.last_sn;
            }

            if hb.first_sn > proxy.delivered_up_to.next() {
                // Everything below first_sn is gone at the writer; keep what
                // already arrived and skip the rest.
                let keep = proxy.pending.split_off(&hb.first_sn);
                let below = std::mem::replace(&mut proxy.pending, keep);
                for change in below.into_values().flatten() {
                    if let Err(e) = self.core.insert(change, &mut notify) {
                        log_insert_failure(self.core.guid(), &e);
                    }
                }
                proxy.delivered_up_to = hb.first_sn.prev();
            }
            self.drain(proxy, &mut notify);

            let missing = proxy.missing_changes();
            if missing.is_empty() && hb.final_flag {
                None
            } else {
                let mut set = SequenceNumberSet::new(proxy.delivered_up_to.next());
                for seq in &missing {
                    set.add(*seq);
                }
                proxy.acknack_count += 1;
                Some(AckNackPlan {
                    writer,
                    acknack: AckNack {
                        reader_id: self.core.guid().entity_id,
                        writer_id: writer.entity_id,
                        reader_sn_state: set,
                        count: proxy.acknack_count,
                        final_flag: missing.is_empty(),
                    },
                    destinations: proxy.destinations(),
                })
            }
        };
        self.core.notify_changes(&notify);
        if let Some(plan) = plan {
            self.send_acknack(plan);
        }
    }

    fn send_acknack(&self, plan: AckNackPlan) {
        if plan.destinations.is_empty() {
            log::debug!(
                "[StatefulReader] {} writer {} has no locators for ACKNACK",
                self.core.guid(),
                plan.writer
            );
            return;
        }
        log::trace!(
            "[StatefulReader] {} ACKNACK base={} missing={} count={} -> {}",
            self.core.guid(),
            plan.acknack.reader_sn_state.base(),
            plan.acknack.reader_sn_state.len(),
            plan.acknack.count,
            plan.writer
        );
        let mut msg = RtpsMessage::new(self.core.guid().prefix);
        msg.push(Submessage::InfoDestination(plan.writer.prefix))
            .push(Submessage::AckNack(plan.acknack));
        send_to_all(self.core.transport(), &msg.encode(), &plan.destinations);
    }

    /// Mark the GAP's sequence numbers irrelevant and deliver what that
    /// unblocks.
    pub fn process_gap(&self, writer: GUID, gap: &Gap) {
        let mut notify = Vec::new();
        {
            let mut proxies = lock_state(&self.proxies, "StatefulReader::process_gap");
            let Some(proxy) = proxies.iter_mut().find(|p| p.guid() == writer) else {
                return;
            };
            proxy.last_activity = Instant::now();
            let range_end = gap.gap_list.base();
            let next = proxy.delivered_up_to.next();

            if gap.gap_start <= next && range_end > next {
                let keep = proxy.pending.split_off(&range_end);
                let dropped = std::mem::replace(&mut proxy.pending, keep);
                for change in dropped.into_values().flatten() {
                    self.core.history().release_cache(change);
                }
                proxy.delivered_up_to = range_end.prev();
            } else {
                let start = gap.gap_start.max(next);
                let end = range_end.min(SequenceNumber(start.0 + MAX_GAP_RANGE));
                let mut seq = start;
                while seq < end {
                    proxy.pending.entry(seq).or_insert(None);
                    seq = seq.next();
                }
            }
            for seq in gap.gap_list.iter() {
                if seq > proxy.delivered_up_to {
                    proxy.pending.entry(seq).or_insert(None);
                }
            }
            log::trace!(
                "[StatefulReader] {} GAP {}..{} from {}",
                self.core.guid(),
                gap.gap_start,
                range_end,
                writer
            );
            self.drain(proxy, &mut notify);
        }
        self.core.notify_changes(&notify);
    }
}

impl MatchedEndpoint for StatefulReader {
    type Remote = RemoteWriterAttributes;

    fn matched_add(&self, remote: RemoteWriterAttributes) -> bool {
        let guid = remote.guid;
        let reliable = self.is_reliable() && remote.endpoint.reliability_kind == ReliabilityKind::Reliable;
        {
            let mut proxies = lock_state(&self.proxies, "StatefulReader::matched_add");
            if proxies.iter().any(|p| p.guid() == guid) {
                return false;
            }
            proxies.push(WriterProxy::new(remote, reliable));
        }
        log::debug!(
            "[StatefulReader] {} matched writer {} (reliable={})",
            self.core.guid(),
            guid,
            reliable
        );
        self.core.notify_matched(MatchingInfo {
            status: MatchingStatus::Matched,
            remote_endpoint_guid: guid,
        });
        true
    }

    fn matched_remove(&self, guid: &GUID) -> bool {
        let released = {
            let mut proxies = lock_state(&self.proxies, "StatefulReader::matched_remove");
            let Some(pos) = proxies.iter().position(|p| p.guid() == *guid) else {
                return false;
            };
            proxies.remove(pos).take_pending()
        };
        for change in released {
            self.core.history().release_cache(change);
        }
        log::debug!("[StatefulReader] {} unmatched writer {}", self.core.guid(), guid);
        self.core.notify_matched(MatchingInfo {
            status: MatchingStatus::Removed,
            remote_endpoint_guid: *guid,
        });
        true
    }

    fn matched_update(&self, remote: RemoteWriterAttributes) -> bool {
        let guid = remote.guid;
        let reliable = self.is_reliable() && remote.endpoint.reliability_kind == ReliabilityKind::Reliable;
        {
            let mut proxies = lock_state(&self.proxies, "StatefulReader::matched_update");
            let Some(proxy) = proxies.iter_mut().find(|p| p.guid() == guid) else {
                return false;
            };
            if proxy.attributes == remote {
                return false;
            }
            proxy.attributes = remote;
            proxy.reliable = reliable;
        }
        log::debug!("[StatefulReader] {} updated writer {}", self.core.guid(), guid);
        true
    }

    fn is_matched(&self, guid: &GUID) -> bool {
        lock_state(&self.proxies, "StatefulReader::is_matched")
            .iter()
            .any(|p| p.guid() == *guid)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Reader;
    use super::*;
    use crate::endpoint::{EndpointAttributes, ReaderAttributes};
    use crate::protocol::guid::{EntityId, GuidPrefix};
    use crate::protocol::types::TopicKind;
    use crate::qos::HistoryQosPolicy;
    use crate::transport::{InputChannel, LoopbackTransport, Transport};
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        reader: Reader,
        stateful: Arc<StatefulReader>,
        writer: GUID,
        input: Box<dyn InputChannel>,
    }

    fn fixture(port: u32, history_qos: HistoryQosPolicy, max_samples: i32) -> Fixture {
        let transport = LoopbackTransport::new();
        let loc = Locator::udpv4(Ipv4Addr::LOCALHOST, port);
        let input = transport.open_input(&loc, 0).expect("bind");
        let core = ReaderCore::new(
            GUID::new(GuidPrefix::generate(), EntityId::from_key(1, 0x04)),
            ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::Reliable),
            history(history_qos, max_samples),
            Arc::new(transport),
        );
        let stateful = Arc::new(StatefulReader::new(core));
        let reader = Reader::Stateful(stateful.clone());
        let writer = remote_writer();
        let mut endpoint = EndpointAttributes {
            reliability_kind: ReliabilityKind::Reliable,
            ..Default::default()
        };
        endpoint.unicast_locator_list.push(loc);
        assert!(reader.matched_writer_add(RemoteWriterAttributes::new(writer, endpoint)));
        Fixture {
            reader,
            stateful,
            writer,
            input,
        }
    }

    fn heartbeat(f: &Fixture, first: i64, last: i64, count: Count, final_flag: bool) -> Heartbeat {
        Heartbeat {
            reader_id: EntityId::UNKNOWN,
            writer_id: f.writer.entity_id,
            first_sn: SequenceNumber(first),
            last_sn: SequenceNumber(last),
            count,
            final_flag,
            liveliness_flag: false,
        }
    }

    fn acknacks(input: &mut Box<dyn InputChannel>) -> Vec<AckNack> {
        let mut out = Vec::new();
        while let Some(bytes) = input.receive(Duration::from_millis(30)).expect("receive") {
            for sub in RtpsMessage::decode(&bytes).expect("decode").submessages {
                if let Submessage::AckNack(an) = sub {
                    out.push(an);
                }
            }
        }
        out
    }

    fn stored_seqs(r: &Reader) -> Vec<i64> {
        r.history()
            .snapshot()
            .iter()
            .map(|c| c.sequence_number.0)
            .collect()
    }

    #[test]
    fn test_out_of_order_delivered_in_order() {
        let f = fixture(7900, HistoryQosPolicy::keep_all(), 10);
        f.reader.process_data(change(f.writer, 2, 2));
        assert!(f.reader.history().is_empty());
        f.reader.process_data(change(f.writer, 1, 1));
        assert_eq!(stored_seqs(&f.reader), vec![1, 2]);
        let proxy = f.stateful.matched_writer_proxy(&f.writer).expect("proxy");
        assert_eq!(proxy.available_changes_max(), SequenceNumber(2));
        assert_eq!(proxy.pending_count(), 0);
        assert!(!f.reader.process_data(change(f.writer, 1, 1)));
    }

    #[test]
    fn test_heartbeat_requests_missing() {
        let mut f = fixture(7901, HistoryQosPolicy::keep_all(), 10);
        f.reader.process_data(change(f.writer, 1, 1));
        f.reader.process_data(change(f.writer, 3, 3));
        f.reader
            .process_heartbeat(f.writer, &heartbeat(&f, 1, 3, 1, false));
        let sent = acknacks(&mut f.input);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reader_sn_state.base(), SequenceNumber(2));
        assert_eq!(
            sent[0].reader_sn_state.iter().collect::<Vec<_>>(),
            vec![SequenceNumber(2)]
        );
        assert!(!sent[0].final_flag);

        // Stale count is ignored.
        f.reader
            .process_heartbeat(f.writer, &heartbeat(&f, 1, 3, 1, false));
        assert!(acknacks(&mut f.input).is_empty());
    }

    #[test]
    fn test_final_heartbeat_with_nothing_missing_is_silent() {
        let mut f = fixture(7902, HistoryQosPolicy::keep_all(), 10);
        f.reader.process_data(change(f.writer, 1, 1));
        f.reader
            .process_heartbeat(f.writer, &heartbeat(&f, 1, 1, 1, true));
        assert!(acknacks(&mut f.input).is_empty());
        f.reader
            .process_heartbeat(f.writer, &heartbeat(&f, 1, 1, 2, false));
        let sent = acknacks(&mut f.input);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].final_flag);
        assert_eq!(sent[0].reader_sn_state.base(), SequenceNumber(2));
    }

    #[test]
    fn test_heartbeat_skips_vanished_changes() {
        let mut f = fixture(7903, HistoryQosPolicy::keep_all(), 10);
        f.reader.process_data(change(f.writer, 6, 6));
        f.reader
            .process_heartbeat(f.writer, &heartbeat(&f, 5, 7, 1, false));
        assert!(f.reader.history().is_empty());
        let sent = acknacks(&mut f.input);
        assert_eq!(sent[0].reader_sn_state.base(), SequenceNumber(5));
        assert_eq!(
            sent[0].reader_sn_state.iter().collect::<Vec<_>>(),
            vec![SequenceNumber(5), SequenceNumber(7)]
        );
    }

    #[test]
    fn test_gap_unblocks_delivery() {
        let f = fixture(7904, HistoryQosPolicy::keep_all(), 10);
        f.reader.process_data(change(f.writer, 1, 1));
        f.reader.process_data(change(f.writer, 4, 4));
        let gap = Gap {
            reader_id: EntityId::UNKNOWN,
            writer_id: f.writer.entity_id,
            gap_start: SequenceNumber(2),
            gap_list: SequenceNumberSet::new(SequenceNumber(4)),
        };
        f.reader.process_gap(f.writer, &gap);
        assert_eq!(stored_seqs(&f.reader), vec![1, 4]);

        let mut list = SequenceNumberSet::new(SequenceNumber(7));
        list.add(SequenceNumber(7));
        let gap = Gap {
            gap_start: SequenceNumber(6),
            gap_list: list,
            ..gap
        };
        f.reader.process_gap(f.writer, &gap);
        f.reader.process_data(change(f.writer, 5, 5));
        f.reader.process_data(change(f.writer, 8, 8));
        assert_eq!(stored_seqs(&f.reader), vec![1, 4, 5, 8]);
    }

    #[test]
    fn test_full_history_change_is_requested_again() {
        let mut f = fixture(7905, HistoryQosPolicy::keep_all(), 1);
        f.reader.process_data(change(f.writer, 1, 1));
        f.reader.process_data(change(f.writer, 2, 2));
        assert_eq!(stored_seqs(&f.reader), vec![1]);
        let proxy = f.stateful.matched_writer_proxy(&f.writer).expect("proxy");
        assert_eq!(proxy.available_changes_max(), SequenceNumber(1));

        f.reader.next_untaken().expect("take frees room");
        f.reader
            .process_heartbeat(f.writer, &heartbeat(&f, 1, 2, 1, true));
        let sent = acknacks(&mut f.input);
        assert_eq!(
            sent[0].reader_sn_state.iter().collect::<Vec<_>>(),
            vec![SequenceNumber(2)]
        );
        f.reader.process_data(change(f.writer, 2, 2));
        assert_eq!(stored_seqs(&f.reader), vec![2]);
    }

    #[test]
    fn test_best_effort_writer_not_reordered() {
        let f = fixture(7906, HistoryQosPolicy::keep_all(), 10);
        let writer = remote_writer();
        assert!(f
            .reader
            .matched_writer_add(RemoteWriterAttributes::new(writer, EndpointAttributes::default())));
        f.reader.process_data(change(writer, 2, 2));
        f.reader.process_data(change(writer, 1, 1));
        assert_eq!(stored_seqs(&f.reader), vec![2]);
    }

    #[test]
    fn test_unmatch_drops_pending() {
        let f = fixture(7907, HistoryQosPolicy::keep_all(), 10);
        f.reader.process_data(change(f.writer, 3, 3));
        assert!(f.reader.matched_writer_remove(&f.writer));
        assert!(!f.reader.matched_writer_is_matched(&f.writer));
        assert!(!f.reader.process_data(change(f.writer, 1, 1)));
        assert!(f.reader.history().is_empty());
    }
}
