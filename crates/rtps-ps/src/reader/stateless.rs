// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Best-effort reader without per-writer proxies.

use super::{log_insert_failure, ReaderCore};
use crate::endpoint::{MatchedEndpoint, MatchingInfo, MatchingStatus, RemoteWriterAttributes};
use crate::history::{lock_state, CacheChange};
use crate::protocol::guid::GUID;
use crate::protocol::types::SequenceNumber;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct StatelessState {
    matched: Vec<RemoteWriterAttributes>,
    /// Highest sequence number delivered per writer.
    last_seq: HashMap<GUID, SequenceNumber>,
}

pub struct StatelessReader {
    core: ReaderCore,
    state: Mutex<StatelessState>,
}

impl StatelessReader {
    pub(crate) fn new(core: ReaderCore) -> Self {
        Self {
            core,
            state: Mutex::new(StatelessState::default()),
        }
    }

    pub fn core(&self) -> &ReaderCore {
        &self.core
    }

    pub fn matched_writer_count(&self) -> usize {
        lock_state(&self.state, "StatelessReader::matched_writer_count")
            .matched
            .len()
    }

    pub fn accept_msg_from(&self, writer: &GUID) -> bool {
        self.is_matched(writer) || self.core.admits_unmatched(writer)
    }

    /// Highest sequence number seen from `writer`.
    pub fn last_sequence_from(&self, writer: &GUID) -> Option<SequenceNumber> {
        lock_state(&self.state, "StatelessReader::last_sequence_from")
            .last_seq
            .get(writer)
            .copied()
    }

    /// Store `change` unless it is not newer than the last one from its
    /// writer. Returns whether it was stored.
    pub fn process_data(&self, change: CacheChange) -> bool {
        let writer = change.writer_guid;
        let seq = change.sequence_number;
        self.core.notify_activity(writer);
        if !self.accept_msg_from(&writer) {
            log::trace!(
                "[StatelessReader] {} ignoring DATA from {}",
                self.core.guid(),
                writer
            );
            self.core.history().release_cache(change);
            return false;
        }

        let mut notify = Vec::new();
        let stored = {
            let mut state = lock_state(&self.state, "StatelessReader::process_data");
            if state.last_seq.get(&writer).is_some_and(|last| seq <= *last) {
                self.core.history().release_cache(change);
                return false;
            }
            match self.core.insert(change, &mut notify) {
                Ok(stored) => {
                    state.last_seq.insert(writer, seq);
                    stored
                }
                Err(e) => {
                    log_insert_failure(self.core.guid(), &e);
                    false
                }
            }
        };
        self.core.notify_changes(&notify);
        stored
    }

    pub(crate) fn forget_writer(&self, writer: &GUID) {
        lock_state(&self.state, "StatelessReader::forget_writer")
            .last_seq
            .remove(writer);
    }
}

impl MatchedEndpoint for StatelessReader {
    type Remote = RemoteWriterAttributes;

    fn matched_add(&self, remote: RemoteWriterAttributes) -> bool {
        let guid = remote.guid;
        {
            let mut state = lock_state(&self.state, "StatelessReader::matched_add");
            if state.matched.iter().any(|w| w.guid == guid) {
                return false;
            }
            state.matched.push(remote);
        }
        log::debug!("[StatelessReader] {} matched writer {}", self.core.guid(), guid);
        self.core.notify_matched(MatchingInfo {
            status: MatchingStatus::Matched,
            remote_endpoint_guid: guid,
        });
        true
    }

    fn matched_remove(&self, guid: &GUID) -> bool {
        {
            let mut state = lock_state(&self.state, "StatelessReader::matched_remove");
            let before = state.matched.len();
            state.matched.retain(|w| w.guid != *guid);
            if state.matched.len() == before {
                return false;
            }
            state.last_seq.remove(guid);
        }
        log::debug!("[StatelessReader] {} unmatched writer {}", self.core.guid(), guid);
        self.core.notify_matched(MatchingInfo {
            status: MatchingStatus::Removed,
            remote_endpoint_guid: *guid,
        });
        true
    }

    fn matched_update(&self, remote: RemoteWriterAttributes) -> bool {
        let mut state = lock_state(&self.state, "StatelessReader::matched_update");
        match state.matched.iter_mut().find(|w| w.guid == remote.guid) {
            Some(w) if *w != remote => {
                *w = remote;
                true
            }
            _ => false,
        }
    }

    fn is_matched(&self, guid: &GUID) -> bool {
        lock_state(&self.state, "StatelessReader::is_matched")
            .matched
            .iter()
            .any(|w| w.guid == *guid)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{Reader, ReaderListener};
    use super::*;
    use crate::endpoint::{EndpointAttributes, ReaderAttributes};
    use crate::protocol::guid::EntityId;
    use crate::protocol::types::TopicKind;
    use crate::qos::{HistoryQosPolicy, ReliabilityKind};
    use crate::transport::LoopbackTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn reader(max_samples: i32) -> Reader {
        let guid = GUID::new(
            crate::protocol::guid::GuidPrefix::generate(),
            EntityId::from_key(1, 0x04),
        );
        let core = ReaderCore::new(
            guid,
            ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort),
            history(HistoryQosPolicy::keep_all(), max_samples),
            Arc::new(LoopbackTransport::new()),
        );
        Reader::Stateless(Arc::new(StatelessReader::new(core)))
    }

    fn matched(r: &Reader) -> GUID {
        let w = remote_writer();
        assert!(r.matched_writer_add(RemoteWriterAttributes::new(w, EndpointAttributes::default())));
        w
    }

    #[derive(Default)]
    struct Counter {
        added: AtomicUsize,
        activity: AtomicUsize,
    }

    impl ReaderListener for Counter {
        fn on_new_cache_change_added(&self, _reader: GUID, _change: &CacheChange) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }

        fn on_writer_activity(&self, _reader: GUID, _writer: GUID) {
            self.activity.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_unmatched_writer_rejected() {
        let r = reader(10);
        let w = remote_writer();
        assert!(!r.accept_msg_from(&w));
        assert!(!r.process_data(change(w, 1, 1)));
        assert_eq!(r.history().len(), 0);
    }

    #[test]
    fn test_trusted_and_unknown_writers_accepted() {
        let r = reader(10);
        let w = remote_writer();
        r.set_trusted_writer(Some(w.entity_id));
        assert!(r.accept_msg_from(&w));
        r.set_trusted_writer(None);
        r.set_accept_messages_from_unknown_writers(true);
        assert!(r.accept_msg_from(&w));
        assert!(r.process_data(change(w, 1, 1)));
    }

    #[test]
    fn test_old_sequence_dropped() {
        let r = reader(10);
        let w = matched(&r);
        assert!(r.process_data(change(w, 2, 2)));
        assert!(!r.process_data(change(w, 1, 1)));
        assert!(!r.process_data(change(w, 2, 2)));
        assert!(r.process_data(change(w, 5, 5)));
        assert_eq!(r.history().len(), 2);
    }

    #[test]
    fn test_forget_writer_resets_tracking() {
        let r = reader(10);
        let w = matched(&r);
        assert!(r.process_data(change(w, 3, 3)));
        assert_eq!(r.forget_writer(&w), 1);
        assert!(r.process_data(change(w, 1, 1)));
    }

    #[test]
    fn test_listener_sees_activity_and_new_changes() {
        let r = reader(1);
        let counter = Arc::new(Counter::default());
        r.set_listener(Some(counter.clone()));
        let w = matched(&r);
        assert!(r.process_data(change(w, 1, 1)));
        assert!(!r.process_data(change(w, 1, 1)));
        // Keep-all with max_samples 1: the next change does not fit.
        assert!(!r.process_data(change(w, 2, 2)));
        assert_eq!(counter.added.load(Ordering::SeqCst), 1);
        assert_eq!(counter.activity.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_directed_to() {
        let r = reader(10);
        assert!(r.accept_msg_directed_to(r.guid().entity_id));
        assert!(r.accept_msg_directed_to(EntityId::UNKNOWN));
        assert!(!r.accept_msg_directed_to(EntityId::from_key(99, 0x04)));
    }
}
