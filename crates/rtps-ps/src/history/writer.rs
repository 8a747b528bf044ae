// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write-side history cache.
//!
//! Sequence numbers are assigned here, under the history lock, so they are
//! strictly increasing by one from 1 and never recycled.

use super::{history_capacity, lock_state, positive, CacheChange, ChangePool, HistoryAttributes};
use crate::error::{Error, Result};
use crate::protocol::guid::{InstanceHandle, GUID};
use crate::protocol::types::{SequenceNumber, TopicKind};
use crate::qos::{HistoryKind, HistoryQosPolicy, ResourceLimitsQosPolicy};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

struct WriterHistoryState {
    changes: BTreeMap<SequenceNumber, CacheChange>,
    last_sequence: SequenceNumber,
    writer_guid: Option<GUID>,
    pool: ChangePool,
    instances: HashMap<InstanceHandle, BTreeSet<SequenceNumber>>,
}

impl WriterHistoryState {
    fn unindex(&mut self, change: &CacheChange) {
        if let Some(seqs) = self.instances.get_mut(&change.instance_handle) {
            seqs.remove(&change.sequence_number);
            if seqs.is_empty() {
                self.instances.remove(&change.instance_handle);
            }
        }
    }
}

/// History owned by exactly one writer.
pub struct WriterHistory {
    attributes: HistoryAttributes,
    history_qos: HistoryQosPolicy,
    resource_limits: ResourceLimitsQosPolicy,
    topic_kind: TopicKind,
    capacity: usize,
    state: Mutex<WriterHistoryState>,
}

impl WriterHistory {
    pub fn new(
        attributes: HistoryAttributes,
        history_qos: HistoryQosPolicy,
        resource_limits: ResourceLimitsQosPolicy,
        topic_kind: TopicKind,
    ) -> Self {
        let capacity = history_capacity(&history_qos, &resource_limits, topic_kind);
        Self {
            state: Mutex::new(WriterHistoryState {
                changes: BTreeMap::new(),
                last_sequence: SequenceNumber::ZERO,
                writer_guid: None,
                pool: ChangePool::new(&attributes),
                instances: HashMap::new(),
            }),
            attributes,
            history_qos,
            resource_limits,
            topic_kind,
            capacity,
        }
    }

    /// Bind the history to its writer; done once at writer construction.
    pub(crate) fn attach(&self, writer_guid: GUID) {
        lock_state(&self.state, "WriterHistory::attach").writer_guid = Some(writer_guid);
    }

    pub fn writer_guid(&self) -> Option<GUID> {
        lock_state(&self.state, "WriterHistory::writer_guid").writer_guid
    }

    pub fn attributes(&self) -> &HistoryAttributes {
        &self.attributes
    }

    pub fn history_qos(&self) -> &HistoryQosPolicy {
        &self.history_qos
    }

    pub fn resource_limits(&self) -> &ResourceLimitsQosPolicy {
        &self.resource_limits
    }

    pub fn topic_kind(&self) -> TopicKind {
        self.topic_kind
    }

    /// Maximum number of changes held at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take a zeroed change from the pool.
    pub fn reserve_cache(&self) -> Result<CacheChange> {
        lock_state(&self.state, "WriterHistory::reserve_cache")
            .pool
            .reserve()
    }

    /// Return an unused change to the pool.
    pub fn release_cache(&self, change: CacheChange) {
        lock_state(&self.state, "WriterHistory::release_cache")
            .pool
            .release(change);
    }

    /// Store a change and assign it the next sequence number, without
    /// applying the history policy.
    ///
    /// On failure the change goes back to the pool.
    pub(crate) fn add_change(&self, change: CacheChange) -> Result<SequenceNumber> {
        let mut state = lock_state(&self.state, "WriterHistory::add_change");
        self.insert_locked(&mut state, change)
    }

    /// Apply the history policy and store `change` in one critical section.
    ///
    /// Keep-last evicts the oldest change (of the same instance on keyed
    /// topics). Keep-all first drops the leading changes for which
    /// `reclaimable` holds and otherwise rejects with `HistoryFull`. Every
    /// sequence number removed to make room is pushed to `evicted`, whether
    /// or not the insert succeeds.
    pub(crate) fn add_change_with(
        &self,
        change: CacheChange,
        mut reclaimable: impl FnMut(SequenceNumber) -> bool,
        evicted: &mut Vec<SequenceNumber>,
    ) -> Result<SequenceNumber> {
        let mut state = lock_state(&self.state, "WriterHistory::add_change_with");
        if let Err(e) = self.check_payload(&state, &change) {
            state.pool.release(change);
            return Err(e);
        }
        match self.history_qos.kind {
            HistoryKind::KeepLast => {
                if self.topic_kind == TopicKind::WithKey {
                    let depth = positive(self.history_qos.depth)
                        .min(positive(self.resource_limits.max_samples_per_instance));
                    loop {
                        let oldest = match state.instances.get(&change.instance_handle) {
                            Some(seqs) if seqs.len() >= depth => seqs.first().copied(),
                            _ => None,
                        };
                        let Some(seq) = oldest else { break };
                        Self::evict_locked(&mut state, seq);
                        evicted.push(seq);
                    }
                }
                while state.changes.len() >= self.capacity {
                    let Some(seq) = state.changes.first_key_value().map(|(seq, _)| *seq) else {
                        break;
                    };
                    Self::evict_locked(&mut state, seq);
                    evicted.push(seq);
                }
            }
            HistoryKind::KeepAll => {
                while state.changes.len() >= self.capacity {
                    let Some(seq) = state.changes.first_key_value().map(|(seq, _)| *seq) else {
                        break;
                    };
                    if !reclaimable(seq) {
                        break;
                    }
                    Self::evict_locked(&mut state, seq);
                    evicted.push(seq);
                }
                if !evicted.is_empty() {
                    log::debug!(
                        "[WriterHistory::add_change_with] reclaimed {} acknowledged change(s)",
                        evicted.len()
                    );
                }
            }
        }
        self.insert_locked(&mut state, change)
    }

    fn evict_locked(state: &mut WriterHistoryState, seq: SequenceNumber) {
        if let Some(change) = state.changes.remove(&seq) {
            state.unindex(&change);
            state.pool.release(change);
        }
    }

    fn insert_locked(
        &self,
        state: &mut WriterHistoryState,
        mut change: CacheChange,
    ) -> Result<SequenceNumber> {
        let check = self.check_insert(state, &change);
        if let Err(e) = check {
            log::debug!("[WriterHistory::add_change] rejected: {}", e);
            state.pool.release(change);
            return Err(e);
        }

        let seq = state.last_sequence.next();
        state.last_sequence = seq;
        change.sequence_number = seq;
        if self.topic_kind == TopicKind::WithKey {
            state
                .instances
                .entry(change.instance_handle)
                .or_default()
                .insert(seq);
        }
        log::trace!(
            "[WriterHistory::add_change] {} seq={} kind={:?} len={}",
            change.writer_guid,
            seq,
            change.kind,
            change.serialized_payload.len()
        );
        state.changes.insert(seq, change);
        Ok(seq)
    }

    /// Ownership and size checks that do not depend on occupancy.
    fn check_payload(&self, state: &WriterHistoryState, change: &CacheChange) -> Result<()> {
        let owner = state.writer_guid.ok_or_else(|| {
            Error::InvalidState("history not attached to a writer".into())
        })?;
        if change.writer_guid != owner {
            return Err(Error::InvalidAttributes(format!(
                "change writer {} does not own this history ({})",
                change.writer_guid, owner
            )));
        }
        let size = change.serialized_payload.len();
        if size > self.attributes.payload_max_size {
            return Err(Error::PayloadTooLarge {
                size,
                max: self.attributes.payload_max_size,
            });
        }
        Ok(())
    }

    fn check_insert(&self, state: &WriterHistoryState, change: &CacheChange) -> Result<()> {
        self.check_payload(state, change)?;
        if state.changes.len() >= self.capacity {
            return Err(Error::HistoryFull);
        }
        if self.topic_kind == TopicKind::WithKey {
            match state.instances.get(&change.instance_handle) {
                Some(seqs) => {
                    if seqs.len() >= positive(self.resource_limits.max_samples_per_instance) {
                        return Err(Error::HistoryFull);
                    }
                }
                None => {
                    if state.instances.len() >= positive(self.resource_limits.max_instances) {
                        return Err(Error::ResourceExhausted(format!(
                            "max_instances {} reached",
                            self.resource_limits.max_instances
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Remove by sequence number; the change returns to the pool.
    pub(crate) fn remove_change(&self, seq: SequenceNumber) -> bool {
        let mut state = lock_state(&self.state, "WriterHistory::remove_change");
        match state.changes.remove(&seq) {
            Some(change) => {
                state.unindex(&change);
                state.pool.release(change);
                true
            }
            None => false,
        }
    }

    /// Evict the oldest change, returning its sequence number.
    pub(crate) fn remove_min_change(&self) -> Option<SequenceNumber> {
        let mut state = lock_state(&self.state, "WriterHistory::remove_min_change");
        let (seq, change) = state.changes.pop_first()?;
        state.unindex(&change);
        state.pool.release(change);
        Some(seq)
    }

    /// Remove everything, returning the removed sequence numbers in order.
    pub(crate) fn remove_all_changes(&self) -> Vec<SequenceNumber> {
        let mut state = lock_state(&self.state, "WriterHistory::remove_all_changes");
        let drained = std::mem::take(&mut state.changes);
        state.instances.clear();
        let mut removed = Vec::with_capacity(drained.len());
        for (seq, change) in drained {
            removed.push(seq);
            state.pool.release(change);
        }
        removed
    }

    pub fn get_change(&self, seq: SequenceNumber) -> Option<CacheChange> {
        lock_state(&self.state, "WriterHistory::get_change")
            .changes
            .get(&seq)
            .cloned()
    }

    pub fn contains(&self, seq: SequenceNumber) -> bool {
        lock_state(&self.state, "WriterHistory::contains")
            .changes
            .contains_key(&seq)
    }

    pub fn changes_snapshot(&self) -> Vec<CacheChange> {
        lock_state(&self.state, "WriterHistory::changes_snapshot")
            .changes
            .values()
            .cloned()
            .collect()
    }

    pub fn sequence_numbers(&self) -> Vec<SequenceNumber> {
        lock_state(&self.state, "WriterHistory::sequence_numbers")
            .changes
            .keys()
            .copied()
            .collect()
    }

    pub fn min_seq(&self) -> Option<SequenceNumber> {
        lock_state(&self.state, "WriterHistory::min_seq")
            .changes
            .first_key_value()
            .map(|(seq, _)| *seq)
    }

    pub fn max_seq(&self) -> Option<SequenceNumber> {
        lock_state(&self.state, "WriterHistory::max_seq")
            .changes
            .last_key_value()
            .map(|(seq, _)| *seq)
    }

    /// Last sequence number ever assigned (0 before the first change).
    pub fn last_sequence(&self) -> SequenceNumber {
        lock_state(&self.state, "WriterHistory::last_sequence").last_sequence
    }

    pub fn len(&self) -> usize {
        lock_state(&self.state, "WriterHistory::len").changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn instance_count(&self) -> usize {
        lock_state(&self.state, "WriterHistory::instance_count")
            .instances
            .len()
    }

    pub fn instance_len(&self, handle: &InstanceHandle) -> usize {
        lock_state(&self.state, "WriterHistory::instance_len")
            .instances
            .get(handle)
            .map_or(0, BTreeSet::len)
    }

    pub fn oldest_change_of_instance(&self, handle: &InstanceHandle) -> Option<SequenceNumber> {
        lock_state(&self.state, "WriterHistory::oldest_change_of_instance")
            .instances
            .get(handle)
            .and_then(|seqs| seqs.first().copied())
    }

    /// Changes currently taken from the pool (stored or in flight).
    pub fn reserved_count(&self) -> usize {
        lock_state(&self.state, "WriterHistory::reserved_count")
            .pool
            .outstanding()
    }
}
