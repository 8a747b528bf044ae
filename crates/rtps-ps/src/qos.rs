// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS policy value types consumed by the engine.
//!
//! The engine only reads these; the consistency checks live here so that
//! creation calls can reject a configuration before any entity exists.

use crate::error::{Error, Result};
use crate::protocol::types::{Time, TopicKind};

#[cfg(feature = "config-loaders")]
use serde::{Deserialize, Serialize};

// =======================================================================
// Policy kinds
// =======================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub enum ReliabilityKind {
    #[default]
    BestEffort,
    Reliable,
}

impl ReliabilityKind {
    /// Wire value (BEST_EFFORT = 1, RELIABLE = 2).
    pub fn to_wire(self) -> u32 {
        match self {
            ReliabilityKind::BestEffort => 1,
            ReliabilityKind::Reliable => 2,
        }
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            1 => Some(ReliabilityKind::BestEffort),
            2 => Some(ReliabilityKind::Reliable),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub enum DurabilityKind {
    #[default]
    Volatile,
    TransientLocal,
    Transient,
    Persistent,
}

impl DurabilityKind {
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(DurabilityKind::Volatile),
            1 => Some(DurabilityKind::TransientLocal),
            2 => Some(DurabilityKind::Transient),
            3 => Some(DurabilityKind::Persistent),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub enum LivelinessKind {
    #[default]
    Automatic,
    ManualByParticipant,
    ManualByTopic,
}

impl LivelinessKind {
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(LivelinessKind::Automatic),
            1 => Some(LivelinessKind::ManualByParticipant),
            2 => Some(LivelinessKind::ManualByTopic),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub enum OwnershipKind {
    #[default]
    Shared,
    Exclusive,
}

impl OwnershipKind {
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(OwnershipKind::Shared),
            1 => Some(OwnershipKind::Exclusive),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub enum DestinationOrderKind {
    #[default]
    ByReceptionTimestamp,
    BySourceTimestamp,
}

impl DestinationOrderKind {
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(DestinationOrderKind::ByReceptionTimestamp),
            1 => Some(DestinationOrderKind::BySourceTimestamp),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub enum HistoryKind {
    #[default]
    KeepLast,
    KeepAll,
}

impl HistoryKind {
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(HistoryKind::KeepLast),
            1 => Some(HistoryKind::KeepAll),
            _ => None,
        }
    }
}

// =======================================================================
// Policies
// =======================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct ReliabilityQosPolicy {
    pub kind: ReliabilityKind,
    pub max_blocking_time: Time,
}

impl ReliabilityQosPolicy {
    pub fn best_effort() -> Self {
        Self {
            kind: ReliabilityKind::BestEffort,
            max_blocking_time: Time::from_millis(100),
        }
    }

    pub fn reliable() -> Self {
        Self {
            kind: ReliabilityKind::Reliable,
            max_blocking_time: Time::from_millis(100),
        }
    }
}

impl Default for ReliabilityQosPolicy {
    fn default() -> Self {
        Self::best_effort()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct DurabilityQosPolicy {
    pub kind: DurabilityKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct LivelinessQosPolicy {
    pub kind: LivelinessKind,
    pub lease_duration: Time,
    pub announcement_period: Time,
}

impl Default for LivelinessQosPolicy {
    fn default() -> Self {
        Self {
            kind: LivelinessKind::Automatic,
            lease_duration: Time::INFINITE,
            announcement_period: Time::INFINITE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct OwnershipQosPolicy {
    pub kind: OwnershipKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct OwnershipStrengthQosPolicy {
    pub value: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct DestinationOrderQosPolicy {
    pub kind: DestinationOrderKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct DeadlineQosPolicy {
    pub period: Time,
}

impl Default for DeadlineQosPolicy {
    fn default() -> Self {
        Self {
            period: Time::INFINITE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct HistoryQosPolicy {
    pub kind: HistoryKind,
    pub depth: i32,
}

impl Default for HistoryQosPolicy {
    fn default() -> Self {
        Self {
            kind: HistoryKind::KeepLast,
            depth: 1,
        }
    }
}

impl HistoryQosPolicy {
    pub fn keep_last(depth: i32) -> Self {
        Self {
            kind: HistoryKind::KeepLast,
            depth,
        }
    }

    pub fn keep_all() -> Self {
        Self {
            kind: HistoryKind::KeepAll,
            depth: 1,
        }
    }
}

/// Bounds on samples and instances held by a history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct ResourceLimitsQosPolicy {
    pub max_samples: i32,
    pub max_instances: i32,
    pub max_samples_per_instance: i32,
    pub allocated_samples: i32,
}

impl Default for ResourceLimitsQosPolicy {
    fn default() -> Self {
        Self {
            max_samples: 5000,
            max_instances: 10,
            max_samples_per_instance: 400,
            allocated_samples: 3000,
        }
    }
}

// =======================================================================
// Writer QoS
// =======================================================================

/// QoS of a publisher's writer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct WriterQos {
    pub durability: DurabilityQosPolicy,
    pub deadline: DeadlineQosPolicy,
    pub liveliness: LivelinessQosPolicy,
    pub reliability: ReliabilityQosPolicy,
    pub ownership: OwnershipQosPolicy,
    pub ownership_strength: OwnershipStrengthQosPolicy,
    pub destination_order: DestinationOrderQosPolicy,
    pub user_data: Vec<u8>,
}

impl Default for WriterQos {
    fn default() -> Self {
        Self {
            durability: DurabilityQosPolicy {
                kind: DurabilityKind::Volatile,
            },
            deadline: DeadlineQosPolicy::default(),
            liveliness: LivelinessQosPolicy::default(),
            reliability: ReliabilityQosPolicy::reliable(),
            ownership: OwnershipQosPolicy::default(),
            ownership_strength: OwnershipStrengthQosPolicy::default(),
            destination_order: DestinationOrderQosPolicy::default(),
            user_data: Vec::new(),
        }
    }
}

impl WriterQos {
    /// Reject unsupported or inconsistent combinations.
    pub fn check_qos(&self) -> Result<()> {
        if matches!(
            self.durability.kind,
            DurabilityKind::Transient | DurabilityKind::Persistent
        ) {
            return Err(Error::InvalidQos(
                "TRANSIENT and PERSISTENT durability not supported".into(),
            ));
        }
        if self.destination_order.kind == DestinationOrderKind::BySourceTimestamp {
            return Err(Error::InvalidQos(
                "BY_SOURCE_TIMESTAMP destination order not supported".into(),
            ));
        }
        if self.reliability.kind == ReliabilityKind::BestEffort
            && self.ownership.kind == OwnershipKind::Exclusive
        {
            return Err(Error::InvalidQos(
                "BEST_EFFORT incompatible with EXCLUSIVE ownership".into(),
            ));
        }
        check_liveliness(&self.liveliness)
    }

    /// Whether `other` may replace this QoS on a live writer.
    pub fn can_qos_be_updated(&self, other: &WriterQos) -> bool {
        let mut ok = true;
        if self.durability.kind != other.durability.kind {
            log::warn!("[WriterQos] durability kind cannot be changed after creation");
            ok = false;
        }
        if self.liveliness.kind != other.liveliness.kind {
            log::warn!("[WriterQos] liveliness kind cannot be changed after creation");
            ok = false;
        }
        if self.reliability.kind != other.reliability.kind {
            log::warn!("[WriterQos] reliability kind cannot be changed after creation");
            ok = false;
        }
        if self.ownership.kind != other.ownership.kind {
            log::warn!("[WriterQos] ownership kind cannot be changed after creation");
            ok = false;
        }
        if self.destination_order.kind != other.destination_order.kind {
            log::warn!("[WriterQos] destination order kind cannot be changed after creation");
            ok = false;
        }
        ok
    }

    /// Copy updatable policies from `other`; all of them on first set.
    pub fn set_qos(&mut self, other: &WriterQos, first_time: bool) {
        if first_time {
            self.durability = other.durability;
            self.liveliness = other.liveliness;
            self.reliability = other.reliability;
            self.ownership = other.ownership;
            self.destination_order = other.destination_order;
        } else {
            self.liveliness.lease_duration = other.liveliness.lease_duration;
            self.liveliness.announcement_period = other.liveliness.announcement_period;
            self.reliability.max_blocking_time = other.reliability.max_blocking_time;
        }
        self.deadline = other.deadline;
        self.ownership_strength = other.ownership_strength;
        self.user_data = other.user_data.clone();
    }
}

// =======================================================================
// Reader QoS
// =======================================================================

/// QoS of a subscriber's reader.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct ReaderQos {
    pub durability: DurabilityQosPolicy,
    pub deadline: DeadlineQosPolicy,
    pub liveliness: LivelinessQosPolicy,
    pub reliability: ReliabilityQosPolicy,
    pub ownership: OwnershipQosPolicy,
    pub destination_order: DestinationOrderQosPolicy,
    pub user_data: Vec<u8>,
}

impl ReaderQos {
    pub fn check_qos(&self) -> Result<()> {
        if matches!(
            self.durability.kind,
            DurabilityKind::Transient | DurabilityKind::Persistent
        ) {
            return Err(Error::InvalidQos(
                "TRANSIENT and PERSISTENT durability not supported".into(),
            ));
        }
        if self.destination_order.kind == DestinationOrderKind::BySourceTimestamp {
            return Err(Error::InvalidQos(
                "BY_SOURCE_TIMESTAMP destination order not supported".into(),
            ));
        }
        if self.reliability.kind == ReliabilityKind::BestEffort
            && self.ownership.kind == OwnershipKind::Exclusive
        {
            return Err(Error::InvalidQos(
                "BEST_EFFORT incompatible with EXCLUSIVE ownership".into(),
            ));
        }
        check_liveliness(&self.liveliness)
    }

    pub fn can_qos_be_updated(&self, other: &ReaderQos) -> bool {
        let mut ok = true;
        if self.durability.kind != other.durability.kind {
            log::warn!("[ReaderQos] durability kind cannot be changed after creation");
            ok = false;
        }
        if self.liveliness.kind != other.liveliness.kind {
            log::warn!("[ReaderQos] liveliness kind cannot be changed after creation");
            ok = false;
        }
        if self.reliability.kind != other.reliability.kind {
            log::warn!("[ReaderQos] reliability kind cannot be changed after creation");
            ok = false;
        }
        if self.ownership.kind != other.ownership.kind {
            log::warn!("[ReaderQos] ownership kind cannot be changed after creation");
            ok = false;
        }
        if self.destination_order.kind != other.destination_order.kind {
            log::warn!("[ReaderQos] destination order kind cannot be changed after creation");
            ok = false;
        }
        ok
    }

    pub fn set_qos(&mut self, other: &ReaderQos, first_time: bool) {
        if first_time {
            self.durability = other.durability;
            self.liveliness = other.liveliness;
            self.reliability = other.reliability;
            self.ownership = other.ownership;
            self.destination_order = other.destination_order;
        } else {
            self.liveliness.lease_duration = other.liveliness.lease_duration;
            self.liveliness.announcement_period = other.liveliness.announcement_period;
            self.reliability.max_blocking_time = other.reliability.max_blocking_time;
        }
        self.deadline = other.deadline;
        self.user_data = other.user_data.clone();
    }
}

fn check_liveliness(liveliness: &LivelinessQosPolicy) -> Result<()> {
    if matches!(
        liveliness.kind,
        LivelinessKind::Automatic | LivelinessKind::ManualByParticipant
    ) && !liveliness.lease_duration.is_infinite()
        && liveliness.lease_duration <= liveliness.announcement_period
    {
        return Err(Error::InvalidQos(
            "liveliness lease duration must exceed the announcement period".into(),
        ));
    }
    Ok(())
}

// =======================================================================
// Topic attributes
// =======================================================================

/// Topic identity plus the history-shaping policies of an endpoint.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub struct TopicAttributes {
    pub topic_kind: TopicKind,
    pub topic_name: String,
    pub topic_data_type: String,
    pub history_qos: HistoryQosPolicy,
    pub resource_limits_qos: ResourceLimitsQosPolicy,
}

impl Default for TopicAttributes {
    fn default() -> Self {
        Self {
            topic_kind: TopicKind::NoKey,
            topic_name: "UNDEF".into(),
            topic_data_type: "UNDEF".into(),
            history_qos: HistoryQosPolicy::default(),
            resource_limits_qos: ResourceLimitsQosPolicy::default(),
        }
    }
}

impl TopicAttributes {
    pub fn new(topic_name: &str, topic_data_type: &str, topic_kind: TopicKind) -> Self {
        Self {
            topic_kind,
            topic_name: topic_name.to_string(),
            topic_data_type: topic_data_type.to_string(),
            ..Default::default()
        }
    }

    pub fn check_qos(&self) -> Result<()> {
        let limits = &self.resource_limits_qos;
        let keyed = self.topic_kind == TopicKind::WithKey;

        if keyed && limits.max_samples_per_instance > limits.max_samples {
            return Err(Error::InvalidQos(
                "max_samples_per_instance greater than max_samples".into(),
            ));
        }
        if self.history_qos.kind == HistoryKind::KeepLast {
            if self.history_qos.depth <= 0 {
                return Err(Error::InvalidQos("KEEP_LAST depth must be positive".into()));
            }
            if self.history_qos.depth > limits.max_samples {
                return Err(Error::InvalidQos(
                    "KEEP_LAST depth greater than max_samples".into(),
                ));
            }
            if keyed && self.history_qos.depth > limits.max_samples_per_instance {
                return Err(Error::InvalidQos(
                    "KEEP_LAST depth greater than max_samples_per_instance".into(),
                ));
            }
        }
        if keyed
            && i64::from(limits.max_samples)
                < i64::from(limits.max_samples_per_instance) * i64::from(limits.max_instances)
        {
            log::warn!(
                "[TopicAttributes] max_samples {} below max_samples_per_instance * max_instances on topic {}",
                limits.max_samples,
                self.topic_name
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_qos_default_is_valid() {
        let qos = WriterQos::default();
        assert_eq!(qos.reliability.kind, ReliabilityKind::Reliable);
        assert_eq!(qos.durability.kind, DurabilityKind::Volatile);
        qos.check_qos().expect("Default writer QoS should be valid");
    }

    #[test]
    fn test_writer_qos_rejects_unsupported() {
        let mut qos = WriterQos::default();
        qos.durability.kind = DurabilityKind::Persistent;
        assert!(matches!(qos.check_qos(), Err(Error::InvalidQos(_))));

        let mut qos = WriterQos::default();
        qos.reliability.kind = ReliabilityKind::BestEffort;
        qos.ownership.kind = OwnershipKind::Exclusive;
        assert!(qos.check_qos().is_err());

        let mut qos = WriterQos::default();
        qos.liveliness.lease_duration = Time::from_secs(5);
        qos.liveliness.announcement_period = Time::from_secs(5);
        assert!(qos.check_qos().is_err());
    }

    #[test]
    fn test_writer_qos_update_rules() {
        let base = WriterQos::default();
        let mut other = base.clone();
        other.ownership_strength.value = 7;
        assert!(base.can_qos_be_updated(&other));
        other.reliability.kind = ReliabilityKind::BestEffort;
        assert!(!base.can_qos_be_updated(&other));

        let mut current = base.clone();
        current.set_qos(&other, false);
        assert_eq!(current.reliability.kind, ReliabilityKind::Reliable);
        assert_eq!(current.ownership_strength.value, 7);
    }

    #[test]
    fn test_topic_attributes_check() {
        let mut topic = TopicAttributes::new("T", "Type", TopicKind::WithKey);
        topic.check_qos().expect("Default topic should be valid");

        topic.history_qos.depth = 0;
        assert!(topic.check_qos().is_err());

        topic.history_qos.depth = 401;
        assert!(topic.check_qos().is_err());

        topic.history_qos.depth = 1;
        topic.resource_limits_qos.max_samples_per_instance = 6000;
        assert!(topic.check_qos().is_err());
    }

    #[test]
    fn test_wire_kinds() {
        assert_eq!(ReliabilityKind::Reliable.to_wire(), 2);
        assert_eq!(ReliabilityKind::from_wire(1), Some(ReliabilityKind::BestEffort));
        assert_eq!(DurabilityKind::from_wire(1), Some(DurabilityKind::TransientLocal));
        assert_eq!(LivelinessKind::from_wire(9), None);
    }
}
