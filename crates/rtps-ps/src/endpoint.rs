// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint attributes and the closed set of endpoint variants.
//!
//! Writers and readers come in stateless (best-effort, no per-peer state)
//! and stateful (per-peer acknowledgement state) flavours. Instead of a
//! class hierarchy they are the four variants of [`Endpoint`], and matching
//! goes through the [`MatchedEndpoint`] capability trait.

use crate::protocol::guid::GUID;
use crate::protocol::locator::LocatorList;
use crate::protocol::types::{Time, TopicKind};
use crate::qos::{DurabilityKind, ReliabilityKind};
use crate::reader::{Reader, StatefulReader, StatelessReader};
use crate::writer::{StatefulWriter, StatelessWriter, Writer};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EndpointKind {
    #[default]
    Writer,
    Reader,
}

/// Attributes shared by writers and readers.
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointAttributes {
    pub endpoint_kind: EndpointKind,
    pub topic_kind: TopicKind,
    pub reliability_kind: ReliabilityKind,
    pub durability_kind: DurabilityKind,
    pub unicast_locator_list: LocatorList,
    pub multicast_locator_list: LocatorList,
    /// Application id used by static discovery; negative when unset.
    pub user_defined_id: i16,
    /// Requested entity key; values `<= 0` let the participant allocate one.
    pub entity_id: i32,
}

impl Default for EndpointAttributes {
    fn default() -> Self {
        Self {
            endpoint_kind: EndpointKind::Writer,
            topic_kind: TopicKind::NoKey,
            reliability_kind: ReliabilityKind::BestEffort,
            durability_kind: DurabilityKind::Volatile,
            unicast_locator_list: LocatorList::new(),
            multicast_locator_list: LocatorList::new(),
            user_defined_id: -1,
            entity_id: -1,
        }
    }
}

impl EndpointAttributes {
    pub fn is_reliable(&self) -> bool {
        self.reliability_kind == ReliabilityKind::Reliable
    }
}

/// Timing of a reliable writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterTimes {
    pub heartbeat_period: Time,
    pub nack_response_delay: Time,
    pub nack_supression_duration: Time,
}

impl Default for WriterTimes {
    fn default() -> Self {
        Self {
            heartbeat_period: Time::from_secs(3),
            nack_response_delay: Time::from_millis(200),
            nack_supression_duration: Time::ZERO,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct WriterAttributes {
    pub endpoint: EndpointAttributes,
    pub times: WriterTimes,
    /// Send new changes immediately (true) or only on request.
    pub push_mode: bool,
}

impl WriterAttributes {
    pub fn new(topic_kind: TopicKind, reliability_kind: ReliabilityKind) -> Self {
        Self {
            endpoint: EndpointAttributes {
                endpoint_kind: EndpointKind::Writer,
                topic_kind,
                reliability_kind,
                ..Default::default()
            },
            times: WriterTimes::default(),
            push_mode: true,
        }
    }
}

/// Timing of a reliable reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaderTimes {
    pub heartbeat_response_delay: Time,
}

impl Default for ReaderTimes {
    fn default() -> Self {
        Self {
            heartbeat_response_delay: Time::from_millis(500),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ReaderAttributes {
    pub endpoint: EndpointAttributes,
    pub times: ReaderTimes,
    pub expects_inline_qos: bool,
}

impl ReaderAttributes {
    pub fn new(topic_kind: TopicKind, reliability_kind: ReliabilityKind) -> Self {
        Self {
            endpoint: EndpointAttributes {
                endpoint_kind: EndpointKind::Reader,
                topic_kind,
                reliability_kind,
                ..Default::default()
            },
            times: ReaderTimes::default(),
            expects_inline_qos: false,
        }
    }
}

/// What a writer knows about a matched remote reader.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteReaderAttributes {
    pub guid: GUID,
    pub endpoint: EndpointAttributes,
    pub expects_inline_qos: bool,
}

impl RemoteReaderAttributes {
    pub fn new(guid: GUID, endpoint: EndpointAttributes) -> Self {
        Self {
            guid,
            endpoint,
            expects_inline_qos: false,
        }
    }
}

/// What a reader knows about a matched remote writer.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteWriterAttributes {
    pub guid: GUID,
    pub endpoint: EndpointAttributes,
    pub liveliness_lease_duration: Time,
    pub ownership_strength: i32,
}

impl RemoteWriterAttributes {
    pub fn new(guid: GUID, endpoint: EndpointAttributes) -> Self {
        Self {
            guid,
            endpoint,
            liveliness_lease_duration: Time::INFINITE,
            ownership_strength: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchingStatus {
    Matched,
    Removed,
}

/// Match notification delivered to writer/reader listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchingInfo {
    pub status: MatchingStatus,
    pub remote_endpoint_guid: GUID,
}

/// Capability shared by all endpoints: maintain the matched-peer set.
pub trait MatchedEndpoint {
    type Remote;

    /// Add a peer; false if it was already matched or is incompatible.
    fn matched_add(&self, remote: Self::Remote) -> bool;
    fn matched_remove(&self, guid: &GUID) -> bool;
    /// Replace the attributes of a matched peer, keeping its protocol
    /// state; false if the peer is unknown or nothing changed.
    fn matched_update(&self, remote: Self::Remote) -> bool;
    fn is_matched(&self, guid: &GUID) -> bool;
}

/// Any endpoint owned by a participant.
#[derive(Clone)]
pub enum Endpoint {
    StatelessWriter(Arc<StatelessWriter>),
    StatefulWriter(Arc<StatefulWriter>),
    StatelessReader(Arc<StatelessReader>),
    StatefulReader(Arc<StatefulReader>),
}

impl Endpoint {
    pub fn guid(&self) -> GUID {
        match self {
            Endpoint::StatelessWriter(w) => w.core().guid(),
            Endpoint::StatefulWriter(w) => w.core().guid(),
            Endpoint::StatelessReader(r) => r.core().guid(),
            Endpoint::StatefulReader(r) => r.core().guid(),
        }
    }

    pub fn as_writer(&self) -> Option<Writer> {
        match self {
            Endpoint::StatelessWriter(w) => Some(Writer::Stateless(w.clone())),
            Endpoint::StatefulWriter(w) => Some(Writer::Stateful(w.clone())),
            _ => None,
        }
    }

    pub fn as_reader(&self) -> Option<Reader> {
        match self {
            Endpoint::StatelessReader(r) => Some(Reader::Stateless(r.clone())),
            Endpoint::StatefulReader(r) => Some(Reader::Stateful(r.clone())),
            _ => None,
        }
    }

    pub fn is_writer(&self) -> bool {
        matches!(
            self,
            Endpoint::StatelessWriter(_) | Endpoint::StatefulWriter(_)
        )
    }
}

impl From<Writer> for Endpoint {
    fn from(w: Writer) -> Self {
        match w {
            Writer::Stateless(w) => Endpoint::StatelessWriter(w),
            Writer::Stateful(w) => Endpoint::StatefulWriter(w),
        }
    }
}

impl From<Reader> for Endpoint {
    fn from(r: Reader) -> Self {
        match r {
            Reader::Stateless(r) => Endpoint::StatelessReader(r),
            Reader::Stateful(r) => Endpoint::StatefulReader(r),
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Endpoint::StatelessWriter(_) => "StatelessWriter",
            Endpoint::StatefulWriter(_) => "StatefulWriter",
            Endpoint::StatelessReader(_) => "StatelessReader",
            Endpoint::StatefulReader(_) => "StatefulReader",
        };
        write!(f, "{}({})", kind, self.guid())
    }
}
