// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Best-effort writer without per-reader state.

use super::WriterCore;
use crate::endpoint::{MatchedEndpoint, MatchingInfo, MatchingStatus, RemoteReaderAttributes};
use crate::history::{lock_state, CacheChange};
use crate::protocol::guid::{EntityId, GUID};
use crate::protocol::locator::Locator;
use crate::protocol::message::{RtpsMessage, Submessage};
use crate::protocol::types::SequenceNumber;
use crate::qos::ReliabilityKind;
use std::sync::Mutex;

/// A destination of a stateless writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderLocator {
    pub locator: Locator,
    pub expects_inline_qos: bool,
    /// Matched readers (plus explicit additions) using this locator.
    users: usize,
}

impl ReaderLocator {
    pub fn users(&self) -> usize {
        self.users
    }
}

#[derive(Default)]
struct StatelessState {
    locators: Vec<ReaderLocator>,
    matched: Vec<RemoteReaderAttributes>,
}

impl StatelessState {
    fn add_locator(&mut self, locator: Locator, expects_inline_qos: bool) -> bool {
        if let Some(rl) = self.locators.iter_mut().find(|rl| rl.locator == locator) {
            rl.users += 1;
            rl.expects_inline_qos |= expects_inline_qos;
            return false;
        }
        self.locators.push(ReaderLocator {
            locator,
            expects_inline_qos,
            users: 1,
        });
        true
    }

    fn remove_locator(&mut self, locator: &Locator) -> bool {
        let Some(pos) = self.locators.iter().position(|rl| rl.locator == *locator) else {
            return false;
        };
        self.locators[pos].users -= 1;
        if self.locators[pos].users == 0 {
            self.locators.remove(pos);
        }
        true
    }
}

fn destinations(remote: &RemoteReaderAttributes) -> Vec<Locator> {
    remote
        .endpoint
        .unicast_locator_list
        .iter()
        .chain(remote.endpoint.multicast_locator_list.iter())
        .copied()
        .collect()
}

/// Fire-and-forget writer; every change goes to every reader locator.
pub struct StatelessWriter {
    core: WriterCore,
    state: Mutex<StatelessState>,
}

impl StatelessWriter {
    pub(crate) fn new(core: WriterCore) -> Self {
        Self {
            core,
            state: Mutex::new(StatelessState::default()),
        }
    }

    pub fn core(&self) -> &WriterCore {
        &self.core
    }

    /// Add a destination; false if it was already present.
    pub fn reader_locator_add(&self, locator: Locator, expects_inline_qos: bool) -> bool {
        let added = lock_state(&self.state, "StatelessWriter::reader_locator_add")
            .add_locator(locator, expects_inline_qos);
        if added {
            log::debug!("[StatelessWriter] {} + locator {}", self.core.guid(), locator);
        }
        added
    }

    pub fn reader_locator_remove(&self, locator: &Locator) -> bool {
        lock_state(&self.state, "StatelessWriter::reader_locator_remove").remove_locator(locator)
    }

    pub fn reader_locators(&self) -> Vec<ReaderLocator> {
        lock_state(&self.state, "StatelessWriter::reader_locators")
            .locators
            .clone()
    }

    pub fn matched_reader_count(&self) -> usize {
        lock_state(&self.state, "StatelessWriter::matched_reader_count")
            .matched
            .len()
    }

    pub(crate) fn unsent_change_added(&self, seq: SequenceNumber) {
        if !self.core.push_mode() {
            return;
        }
        if let Some(change) = self.core.history().get_change(seq) {
            self.send_changes(&[change]);
        }
    }

    pub(crate) fn unsent_changes_reset(&self) {
        let changes = self.core.history().changes_snapshot();
        if !changes.is_empty() {
            self.send_changes(&changes);
        }
    }

    fn send_changes(&self, changes: &[CacheChange]) {
        let locators = self.reader_locators();
        if locators.is_empty() {
            log::trace!("[StatelessWriter] {} has no reader locators", self.core.guid());
            return;
        }
        let inline = locators.iter().any(|rl| rl.expects_inline_qos);
        for change in changes {
            let mut msg = RtpsMessage::new(self.core.guid().prefix);
            msg.push(Submessage::InfoTimestamp(Some(change.source_timestamp)))
                .push(self.core.data_submessage(change, EntityId::UNKNOWN, inline));
            let sent = self.core.send(&msg, locators.iter().map(|rl| &rl.locator));
            log::trace!(
                "[StatelessWriter] {} seq={} sent to {} locator(s)",
                self.core.guid(),
                change.sequence_number,
                sent
            );
        }
    }
}

impl MatchedEndpoint for StatelessWriter {
    type Remote = RemoteReaderAttributes;

    /// Reliable readers need per-reader state and are refused.
    fn matched_add(&self, remote: RemoteReaderAttributes) -> bool {
        if remote.endpoint.reliability_kind == ReliabilityKind::Reliable {
            log::warn!(
                "[StatelessWriter] {} cannot match reliable reader {}",
                self.core.guid(),
                remote.guid
            );
            return false;
        }
        let guid = remote.guid;
        {
            let mut state = lock_state(&self.state, "StatelessWriter::matched_add");
            if state.matched.iter().any(|r| r.guid == guid) {
                return false;
            }
            for loc in destinations(&remote) {
                state.add_locator(loc, remote.expects_inline_qos);
            }
            state.matched.push(remote);
        }
        log::debug!("[StatelessWriter] {} matched reader {}", self.core.guid(), guid);
        self.core.notify_matched(MatchingInfo {
            status: MatchingStatus::Matched,
            remote_endpoint_guid: guid,
        });
        true
    }

    fn matched_remove(&self, guid: &GUID) -> bool {
        {
            let mut state = lock_state(&self.state, "StatelessWriter::matched_remove");
            let Some(pos) = state.matched.iter().position(|r| r.guid == *guid) else {
                return false;
            };
            let remote = state.matched.remove(pos);
            for loc in destinations(&remote) {
                state.remove_locator(&loc);
            }
        }
        self.core.notify_matched(MatchingInfo {
            status: MatchingStatus::Removed,
            remote_endpoint_guid: *guid,
        });
        true
    }

    fn matched_update(&self, remote: RemoteReaderAttributes) -> bool {
        if remote.endpoint.reliability_kind == ReliabilityKind::Reliable {
            return false;
        }
        let guid = remote.guid;
        {
            let mut state = lock_state(&self.state, "StatelessWriter::matched_update");
            let Some(pos) = state.matched.iter().position(|r| r.guid == guid) else {
                return false;
            };
            if state.matched[pos] == remote {
                return false;
            }
            let old = std::mem::replace(&mut state.matched[pos], remote.clone());
            for loc in destinations(&old) {
                state.remove_locator(&loc);
            }
            for loc in destinations(&remote) {
                state.add_locator(loc, remote.expects_inline_qos);
            }
        }
        log::debug!("[StatelessWriter] {} updated reader {}", self.core.guid(), guid);
        true
    }

    fn is_matched(&self, guid: &GUID) -> bool {
        lock_state(&self.state, "StatelessWriter::is_matched")
            .matched
            .iter()
            .any(|r| r.guid == *guid)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::endpoint::EndpointAttributes;
    use crate::protocol::guid::{GuidPrefix, InstanceHandle};
    use crate::protocol::types::{ChangeKind, TopicKind};
    use crate::qos::HistoryQosPolicy;
    use crate::transport::{LoopbackTransport, Transport};
    use crate::writer::Writer;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;

    fn writer(transport: &LoopbackTransport) -> Arc<StatelessWriter> {
        let core = WriterCore::new(
            writer_guid(9, TopicKind::NoKey),
            attributes(ReliabilityKind::BestEffort, TopicKind::NoKey),
            history(HistoryQosPolicy::keep_last(4), 10, TopicKind::NoKey),
            Arc::new(transport.clone()),
        );
        Arc::new(StatelessWriter::new(core))
    }

    fn remote(reliability: ReliabilityKind, port: u32) -> RemoteReaderAttributes {
        let mut endpoint = EndpointAttributes {
            reliability_kind: reliability,
            ..Default::default()
        };
        endpoint
            .unicast_locator_list
            .push(Locator::udpv4(Ipv4Addr::LOCALHOST, port));
        RemoteReaderAttributes::new(
            GUID::new(GuidPrefix::generate(), EntityId::from_key(1, 0x04)),
            endpoint,
        )
    }

    #[test]
    fn test_refuses_reliable_reader() {
        let t = LoopbackTransport::new();
        let w = writer(&t);
        assert!(!w.matched_add(remote(ReliabilityKind::Reliable, 7700)));
        assert_eq!(w.matched_reader_count(), 0);
    }

    #[test]
    fn test_locator_refcount() {
        let t = LoopbackTransport::new();
        let w = writer(&t);
        let a = remote(ReliabilityKind::BestEffort, 7701);
        let mut b = remote(ReliabilityKind::BestEffort, 7701);
        b.guid.entity_id = EntityId::from_key(2, 0x04);
        assert!(w.matched_add(a.clone()));
        assert!(w.matched_add(b));
        assert!(!w.matched_add(a.clone()));
        assert_eq!(w.reader_locators().len(), 1);
        assert_eq!(w.reader_locators()[0].users(), 2);
        assert!(w.matched_remove(&a.guid));
        assert_eq!(w.reader_locators().len(), 1);
    }

    #[test]
    fn test_new_change_is_sent_to_locators() {
        let t = LoopbackTransport::new();
        let loc = Locator::udpv4(Ipv4Addr::LOCALHOST, 7702);
        let mut input = t.open_input(&loc, 0).expect("bind");
        let w = writer(&t);
        assert!(w.reader_locator_add(loc, false));
        let w = Writer::Stateless(w);
        let mut c = w
            .new_change(ChangeKind::Alive, InstanceHandle::NIL)
            .expect("reserve");
        c.serialized_payload.data.extend_from_slice(&[1, 2, 3, 4]);
        w.add_change(c).expect("add");
        let bytes = input
            .receive(Duration::from_millis(200))
            .expect("receive")
            .expect("datagram");
        let msg = RtpsMessage::decode(&bytes).expect("decode");
        assert!(msg.submessages.iter().any(|s| matches!(
            s,
            Submessage::Data(d) if d.writer_sn == SequenceNumber(1)
                && d.payload.as_ref().map(|p| p.data.clone()) == Some(vec![1, 2, 3, 4])
        )));
    }
}
