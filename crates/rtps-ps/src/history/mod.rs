// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! History caches: ordered, bounded stores of cache changes per endpoint.
//!
//! Each cache keeps its whole state behind one `Mutex`, so the ordering and
//! uniqueness invariants are only ever observed or mutated under that lock:
//!
//! - changes are unique per `(writer_guid, sequence_number)`;
//! - min/max sequence numbers are maintained on every insert/remove;
//! - a reserved change counts against the pool until it is stored and
//!   later removed, or explicitly released.

mod reader;
mod writer;

pub use reader::ReaderHistory;
pub use writer::WriterHistory;

use crate::error::{Error, Result};
use crate::protocol::constants::PAYLOAD_MAX_SIZE;
use crate::protocol::guid::{InstanceHandle, GUID};
use crate::protocol::types::{ChangeKind, SequenceNumber, SerializedPayload, Time, TopicKind};
use crate::qos::{HistoryKind, HistoryQosPolicy, ResourceLimitsQosPolicy};
use std::sync::{Mutex, MutexGuard};

/// One versioned sample (write, dispose or unregister) of topic data.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheChange {
    pub kind: ChangeKind,
    pub writer_guid: GUID,
    pub instance_handle: InstanceHandle,
    pub sequence_number: SequenceNumber,
    pub serialized_payload: SerializedPayload,
    /// Set once a subscriber has read the change.
    pub is_read: bool,
    pub source_timestamp: Time,
}

impl Default for CacheChange {
    fn default() -> Self {
        Self {
            kind: ChangeKind::Alive,
            writer_guid: GUID::UNKNOWN,
            instance_handle: InstanceHandle::NIL,
            sequence_number: SequenceNumber::UNKNOWN,
            serialized_payload: SerializedPayload::default(),
            is_read: false,
            source_timestamp: Time::ZERO,
        }
    }
}

impl CacheChange {
    /// Reset to the zeroed state, keeping the payload allocation.
    fn reset(&mut self) {
        self.kind = ChangeKind::Alive;
        self.writer_guid = GUID::UNKNOWN;
        self.instance_handle = InstanceHandle::NIL;
        self.sequence_number = SequenceNumber::UNKNOWN;
        self.serialized_payload.clear();
        self.is_read = false;
        self.source_timestamp = Time::ZERO;
    }
}

/// Sizing of a history's change pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryAttributes {
    pub payload_max_size: usize,
    pub initial_reserved_caches: usize,
    /// 0 means unbounded.
    pub maximum_reserved_caches: usize,
}

impl Default for HistoryAttributes {
    fn default() -> Self {
        Self {
            payload_max_size: PAYLOAD_MAX_SIZE,
            initial_reserved_caches: 500,
            maximum_reserved_caches: 0,
        }
    }
}

impl HistoryAttributes {
    pub fn new(
        payload_max_size: usize,
        initial_reserved_caches: usize,
        maximum_reserved_caches: usize,
    ) -> Self {
        Self {
            payload_max_size,
            initial_reserved_caches,
            maximum_reserved_caches,
        }
    }
}

/// Free list of zeroed changes plus a count of outstanding ones.
#[derive(Debug)]
pub(crate) struct ChangePool {
    free: Vec<CacheChange>,
    outstanding: usize,
    maximum: usize,
    payload_capacity: usize,
}

impl ChangePool {
    pub(crate) fn new(attributes: &HistoryAttributes) -> Self {
        // Free buffers start small and grow on first use.
        let initial = if attributes.maximum_reserved_caches > 0 {
            attributes
                .initial_reserved_caches
                .min(attributes.maximum_reserved_caches)
        } else {
            attributes.initial_reserved_caches
        };
        Self {
            free: (0..initial.min(64)).map(|_| CacheChange::default()).collect(),
            outstanding: 0,
            maximum: attributes.maximum_reserved_caches,
            payload_capacity: attributes.payload_max_size.min(1024),
        }
    }

    pub(crate) fn reserve(&mut self) -> Result<CacheChange> {
        if self.maximum != 0 && self.outstanding >= self.maximum {
            return Err(Error::ResourceExhausted(format!(
                "change pool saturated ({} caches)",
                self.maximum
            )));
        }
        self.outstanding += 1;
        Ok(self.free.pop().unwrap_or_else(|| CacheChange {
            serialized_payload: SerializedPayload::with_capacity(self.payload_capacity),
            ..CacheChange::default()
        }))
    }

    pub(crate) fn release(&mut self, mut change: CacheChange) {
        self.outstanding = self.outstanding.saturating_sub(1);
        change.reset();
        if self.free.len() < 256 {
            self.free.push(change);
        }
    }

    /// Drop the accounting for a change whose ownership left the history.
    pub(crate) fn forget(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding
    }
}

/// Effective sample capacity of a history under its QoS.
pub(crate) fn history_capacity(
    history_qos: &HistoryQosPolicy,
    limits: &ResourceLimitsQosPolicy,
    topic_kind: TopicKind,
) -> usize {
    let max_samples = positive(limits.max_samples);
    match history_qos.kind {
        HistoryKind::KeepAll => max_samples,
        HistoryKind::KeepLast => {
            let depth = positive(history_qos.depth);
            match topic_kind {
                TopicKind::NoKey => depth.min(max_samples),
                TopicKind::WithKey => depth
                    .saturating_mul(positive(limits.max_instances))
                    .min(max_samples),
            }
        }
    }
}

/// Non-positive limits mean "unlimited".
pub(crate) fn positive(v: i32) -> usize {
    if v <= 0 {
        usize::MAX
    } else {
        v as usize
    }
}

pub(crate) fn lock_state<'a, T>(m: &'a Mutex<T>, ctx: &str) -> MutexGuard<'a, T> {
    match m.lock() {
        Ok(lock) => lock,
        Err(e) => {
            log::debug!("[{}] Lock poisoned, recovering", ctx);
            e.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_saturation() {
        let mut pool = ChangePool::new(&HistoryAttributes::new(100, 1, 2));
        let a = pool.reserve().expect("first reserve");
        let _b = pool.reserve().expect("second reserve");
        assert!(matches!(pool.reserve(), Err(Error::ResourceExhausted(_))));
        pool.release(a);
        assert_eq!(pool.outstanding(), 1);
        pool.reserve().expect("slot freed by release");
    }

    #[test]
    fn test_released_change_is_zeroed() {
        let mut pool = ChangePool::new(&HistoryAttributes::new(100, 0, 0));
        let mut c = pool.reserve().expect("reserve");
        c.kind = ChangeKind::NotAliveDisposed;
        c.serialized_payload.data.extend_from_slice(&[1, 2, 3]);
        c.sequence_number = SequenceNumber(4);
        pool.release(c);
        let c = pool.reserve().expect("reserve again");
        assert_eq!(c, CacheChange::default());
    }

    #[test]
    fn test_capacity_by_policy() {
        let limits = ResourceLimitsQosPolicy {
            max_samples: 50,
            max_instances: 4,
            max_samples_per_instance: 10,
            allocated_samples: 10,
        };
        assert_eq!(
            history_capacity(&HistoryQosPolicy::keep_last(3), &limits, TopicKind::NoKey),
            3
        );
        assert_eq!(
            history_capacity(&HistoryQosPolicy::keep_last(3), &limits, TopicKind::WithKey),
            12
        );
        assert_eq!(
            history_capacity(&HistoryQosPolicy::keep_all(), &limits, TopicKind::NoKey),
            50
        );
    }
}
