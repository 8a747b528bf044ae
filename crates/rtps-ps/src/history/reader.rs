// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read-side history cache.
//!
//! Changes are kept in arrival order. Readers deliver each writer's changes
//! in sequence order, so per-writer order holds; cross-writer order does not.

use super::{history_capacity, lock_state, positive, CacheChange, ChangePool, HistoryAttributes};
use crate::error::{Error, Result};
use crate::protocol::guid::{InstanceHandle, GUID};
use crate::protocol::types::{SequenceNumber, TopicKind};
use crate::qos::{HistoryKind, HistoryQosPolicy, ResourceLimitsQosPolicy};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct ReaderHistoryState {
    changes: VecDeque<CacheChange>,
    keys: HashSet<(GUID, SequenceNumber)>,
    /// Multiset of stored sequence numbers, for min/max.
    seq_counts: BTreeMap<SequenceNumber, usize>,
    instances: HashMap<InstanceHandle, usize>,
    unread: usize,
}

impl ReaderHistoryState {
    fn index(&mut self, change: &CacheChange) {
        self.keys
            .insert((change.writer_guid, change.sequence_number));
        *self.seq_counts.entry(change.sequence_number).or_insert(0) += 1;
        *self.instances.entry(change.instance_handle).or_insert(0) += 1;
        if !change.is_read {
            self.unread += 1;
        }
    }

    fn unindex(&mut self, change: &CacheChange) {
        self.keys
            .remove(&(change.writer_guid, change.sequence_number));
        if let Some(count) = self.seq_counts.get_mut(&change.sequence_number) {
            *count -= 1;
            if *count == 0 {
                self.seq_counts.remove(&change.sequence_number);
            }
        }
        if let Some(count) = self.instances.get_mut(&change.instance_handle) {
            *count -= 1;
            if *count == 0 {
                self.instances.remove(&change.instance_handle);
            }
        }
        if !change.is_read {
            self.unread = self.unread.saturating_sub(1);
        }
    }

    fn remove_at(&mut self, index: usize) -> Option<CacheChange> {
        let change = self.changes.remove(index)?;
        self.unindex(&change);
        Some(change)
    }
}

struct Inner {
    state: ReaderHistoryState,
    pool: ChangePool,
}

/// History owned by exactly one reader.
pub struct ReaderHistory {
    attributes: HistoryAttributes,
    history_qos: HistoryQosPolicy,
    resource_limits: ResourceLimitsQosPolicy,
    topic_kind: TopicKind,
    capacity: usize,
    inner: Mutex<Inner>,
    unread_cond: Condvar,
}

impl ReaderHistory {
    pub fn new(
        attributes: HistoryAttributes,
        history_qos: HistoryQosPolicy,
        resource_limits: ResourceLimitsQosPolicy,
        topic_kind: TopicKind,
    ) -> Self {
        let capacity = history_capacity(&history_qos, &resource_limits, topic_kind);
        Self {
            inner: Mutex::new(Inner {
                state: ReaderHistoryState::default(),
                pool: ChangePool::new(&attributes),
            }),
            attributes,
            history_qos,
            resource_limits,
            topic_kind,
            capacity,
            unread_cond: Condvar::new(),
        }
    }

    pub fn attributes(&self) -> &HistoryAttributes {
        &self.attributes
    }

    pub fn topic_kind(&self) -> TopicKind {
        self.topic_kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reserve_cache(&self) -> Result<CacheChange> {
        lock_state(&self.inner, "ReaderHistory::reserve_cache")
            .pool
            .reserve()
    }

    pub fn release_cache(&self, change: CacheChange) {
        lock_state(&self.inner, "ReaderHistory::release_cache")
            .pool
            .release(change);
    }

    /// Insert a change received from a writer.
    ///
    /// Returns `Ok(false)` for a duplicate `(writer, sequence)`, which is
    /// released back to the pool. KEEP_LAST evicts the oldest change (of the
    /// same instance for keyed topics) when full; KEEP_ALL rejects.
    pub fn received_change(&self, change: CacheChange) -> Result<bool> {
        let mut inner = lock_state(&self.inner, "ReaderHistory::received_change");
        let Inner { state, pool } = &mut *inner;

        if state
            .keys
            .contains(&(change.writer_guid, change.sequence_number))
        {
            log::trace!(
                "[ReaderHistory::received_change] duplicate {} seq={}",
                change.writer_guid,
                change.sequence_number
            );
            pool.release(change);
            return Ok(false);
        }

        let size = change.serialized_payload.len();
        if size > self.attributes.payload_max_size {
            pool.release(change);
            return Err(Error::PayloadTooLarge {
                size,
                max: self.attributes.payload_max_size,
            });
        }

        if let Err(e) = self.make_room(state, pool, &change) {
            pool.release(change);
            return Err(e);
        }

        state.index(&change);
        state.changes.push_back(change);
        drop(inner);
        self.unread_cond.notify_all();
        Ok(true)
    }

    fn make_room(
        &self,
        state: &mut ReaderHistoryState,
        pool: &mut ChangePool,
        change: &CacheChange,
    ) -> Result<()> {
        let keyed = self.topic_kind == TopicKind::WithKey;
        let keep_last = self.history_qos.kind == HistoryKind::KeepLast;

        if keyed {
            let per_instance = state
                .instances
                .get(&change.instance_handle)
                .copied()
                .unwrap_or(0);
            if per_instance == 0 && state.instances.len() >= positive(self.resource_limits.max_instances)
            {
                return Err(Error::ResourceExhausted(format!(
                    "max_instances {} reached",
                    self.resource_limits.max_instances
                )));
            }
            let instance_limit = if keep_last {
                positive(self.history_qos.depth)
            } else {
                positive(self.resource_limits.max_samples_per_instance)
            };
            if per_instance >= instance_limit {
                if !keep_last {
                    return Err(Error::HistoryFull);
                }
                let handle = change.instance_handle;
                if let Some(idx) = state.changes.iter().position(|c| c.instance_handle == handle) {
                    if let Some(old) = state.remove_at(idx) {
                        pool.release(old);
                    }
                }
            }
        }

        if state.changes.len() >= self.capacity {
            if !keep_last {
                return Err(Error::HistoryFull);
            }
            if let Some(old) = state.remove_at(0) {
                log::trace!(
                    "[ReaderHistory] KEEP_LAST evicted {} seq={}",
                    old.writer_guid,
                    old.sequence_number
                );
                pool.release(old);
            }
        }
        Ok(())
    }

    /// Remove one change; returns whether it was present.
    pub fn remove_change(&self, writer: &GUID, seq: SequenceNumber) -> bool {
        let mut inner = lock_state(&self.inner, "ReaderHistory::remove_change");
        let Inner { state, pool } = &mut *inner;
        let Some(idx) = state
            .changes
            .iter()
            .position(|c| c.writer_guid == *writer && c.sequence_number == seq)
        else {
            return false;
        };
        if let Some(change) = state.remove_at(idx) {
            pool.release(change);
        }
        true
    }

    /// Remove all changes matching `pred`, returning how many were removed.
    pub fn remove_if(&self, mut pred: impl FnMut(&CacheChange) -> bool) -> usize {
        let mut inner = lock_state(&self.inner, "ReaderHistory::remove_if");
        let Inner { state, pool } = &mut *inner;
        let mut removed = 0;
        let mut idx = 0;
        while idx < state.changes.len() {
            if pred(&state.changes[idx]) {
                if let Some(change) = state.remove_at(idx) {
                    pool.release(change);
                    removed += 1;
                }
            } else {
                idx += 1;
            }
        }
        removed
    }

    pub fn remove_changes_from_writer(&self, writer: &GUID) -> usize {
        let writer = *writer;
        self.remove_if(|c| c.writer_guid == writer)
    }

    /// Oldest unread change, marked read.
    pub fn next_unread(&self) -> Option<CacheChange> {
        self.next_unread_matching(|_| true)
    }

    /// Oldest unread change of one writer, marked read.
    pub fn next_unread_from(&self, writer: &GUID) -> Option<CacheChange> {
        let writer = *writer;
        self.next_unread_matching(|c| c.writer_guid == writer)
    }

    fn next_unread_matching(&self, pred: impl Fn(&CacheChange) -> bool) -> Option<CacheChange> {
        let mut inner = lock_state(&self.inner, "ReaderHistory::next_unread");
        let state = &mut inner.state;
        let change = state
            .changes
            .iter_mut()
            .find(|c| !c.is_read && pred(c))?;
        change.is_read = true;
        let out = change.clone();
        state.unread = state.unread.saturating_sub(1);
        Some(out)
    }

    /// Remove and return the oldest change (read or not).
    pub fn next_untaken(&self) -> Option<CacheChange> {
        let mut inner = lock_state(&self.inner, "ReaderHistory::next_untaken");
        let Inner { state, pool } = &mut *inner;
        let change = state.remove_at(0)?;
        pool.forget();
        Some(change)
    }

    /// Remove and return the oldest change of one writer.
    pub fn next_untaken_from(&self, writer: &GUID) -> Option<CacheChange> {
        let mut inner = lock_state(&self.inner, "ReaderHistory::next_untaken_from");
        let Inner { state, pool } = &mut *inner;
        let idx = state.changes.iter().position(|c| c.writer_guid == *writer)?;
        let change = state.remove_at(idx)?;
        pool.forget();
        Some(change)
    }

    /// Block until an unread change exists or `timeout` elapses.
    pub fn wait_for_unread(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = lock_state(&self.inner, "ReaderHistory::wait_for_unread");
        while inner.state.unread == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            inner = match self.unread_cond.wait_timeout(inner, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => {
                    log::debug!("[ReaderHistory::wait_for_unread] Lock poisoned, recovering");
                    e.into_inner().0
                }
            };
        }
        true
    }

    pub fn unread_count(&self) -> usize {
        lock_state(&self.inner, "ReaderHistory::unread_count")
            .state
            .unread
    }

    pub fn contains(&self, writer: &GUID, seq: SequenceNumber) -> bool {
        lock_state(&self.inner, "ReaderHistory::contains")
            .state
            .keys
            .contains(&(*writer, seq))
    }

    pub fn get_change(&self, writer: &GUID, seq: SequenceNumber) -> Option<CacheChange> {
        lock_state(&self.inner, "ReaderHistory::get_change")
            .state
            .changes
            .iter()
            .find(|c| c.writer_guid == *writer && c.sequence_number == seq)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<CacheChange> {
        lock_state(&self.inner, "ReaderHistory::snapshot")
            .state
            .changes
            .iter()
            .cloned()
            .collect()
    }

    pub fn min_seq(&self) -> Option<SequenceNumber> {
        lock_state(&self.inner, "ReaderHistory::min_seq")
            .state
            .seq_counts
            .first_key_value()
            .map(|(seq, _)| *seq)
    }

    pub fn max_seq(&self) -> Option<SequenceNumber> {
        lock_state(&self.inner, "ReaderHistory::max_seq")
            .state
            .seq_counts
            .last_key_value()
            .map(|(seq, _)| *seq)
    }

    pub fn len(&self) -> usize {
        lock_state(&self.inner, "ReaderHistory::len")
            .state
            .changes
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn instance_count(&self) -> usize {
        lock_state(&self.inner, "ReaderHistory::instance_count")
            .state
            .instances
            .len()
    }
}
