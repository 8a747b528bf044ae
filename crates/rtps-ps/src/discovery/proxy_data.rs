// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Local mirrors of remote participants, readers and writers, and their
//! parameter-list encoding.
//!
//! Endpoints refer to their participant by GUID; a participant owns the
//! proxy data of its endpoints. There are no back-pointers.

use crate::endpoint::{
    EndpointAttributes, EndpointKind, RemoteReaderAttributes, RemoteWriterAttributes,
};
use crate::error::{Error, Result};
use crate::protocol::guid::{InstanceHandle, GUID};
use crate::protocol::locator::LocatorList;
use crate::protocol::parameter::{Parameter, ParameterList, Property};
use crate::protocol::types::{ProtocolVersion, Time, TopicKind, VendorId};
use crate::qos::{
    DeadlineQosPolicy, DestinationOrderQosPolicy, DurabilityQosPolicy, LivelinessQosPolicy,
    OwnershipQosPolicy, OwnershipStrengthQosPolicy, ReaderQos, ReliabilityQosPolicy, WriterQos,
};

/// What we know about one participant, local or remote.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantProxyData {
    pub protocol_version: ProtocolVersion,
    pub vendor_id: VendorId,
    pub guid: GUID,
    pub expects_inline_qos: bool,
    /// `DISC_BUILTIN_ENDPOINT_*` bits.
    pub available_builtin_endpoints: u32,
    pub metatraffic_unicast_locator_list: LocatorList,
    pub metatraffic_multicast_locator_list: LocatorList,
    pub default_unicast_locator_list: LocatorList,
    pub default_multicast_locator_list: LocatorList,
    pub manual_liveliness_count: i32,
    pub participant_name: String,
    pub lease_duration: Time,
    pub domain_id: u32,
    pub properties: Vec<Property>,
    pub user_data: Vec<u8>,
    /// Endpoints owned by this participant. Never serialized.
    pub readers: Vec<ReaderProxyData>,
    pub writers: Vec<WriterProxyData>,
}

impl Default for ParticipantProxyData {
    fn default() -> Self {
        Self {
            protocol_version: ProtocolVersion::V2_1,
            vendor_id: VendorId::LOCAL,
            guid: GUID::UNKNOWN,
            expects_inline_qos: false,
            available_builtin_endpoints: 0,
            metatraffic_unicast_locator_list: LocatorList::new(),
            metatraffic_multicast_locator_list: LocatorList::new(),
            default_unicast_locator_list: LocatorList::new(),
            default_multicast_locator_list: LocatorList::new(),
            manual_liveliness_count: 0,
            participant_name: String::new(),
            lease_duration: Time::from_secs(130),
            domain_id: 0,
            properties: Vec::new(),
            user_data: Vec::new(),
            readers: Vec::new(),
            writers: Vec::new(),
        }
    }
}

impl ParticipantProxyData {
    pub fn key(&self) -> InstanceHandle {
        InstanceHandle::from(self.guid)
    }

    pub fn to_parameter_list(&self) -> ParameterList {
        let mut pl = ParameterList::new();
        pl.push(Parameter::ProtocolVersion(self.protocol_version));
        pl.push(Parameter::VendorId(self.vendor_id));
        pl.push(Parameter::ParticipantGuid(self.guid));
        if self.expects_inline_qos {
            pl.push(Parameter::ExpectsInlineQos(true));
        }
        for l in self.metatraffic_unicast_locator_list.iter() {
            pl.push(Parameter::MetatrafficUnicastLocator(*l));
        }
        for l in self.metatraffic_multicast_locator_list.iter() {
            pl.push(Parameter::MetatrafficMulticastLocator(*l));
        }
        for l in self.default_unicast_locator_list.iter() {
            pl.push(Parameter::DefaultUnicastLocator(*l));
        }
        for l in self.default_multicast_locator_list.iter() {
            pl.push(Parameter::DefaultMulticastLocator(*l));
        }
        pl.push(Parameter::ParticipantLeaseDuration(self.lease_duration));
        pl.push(Parameter::BuiltinEndpointSet(self.available_builtin_endpoints));
        pl.push(Parameter::ManualLivelinessCount(self.manual_liveliness_count));
        pl.push(Parameter::DomainId(self.domain_id));
        if !self.participant_name.is_empty() {
            pl.push(Parameter::EntityName(self.participant_name.clone()));
        }
        if !self.properties.is_empty() {
            pl.push(Parameter::PropertyList(self.properties.clone()));
        }
        if !self.user_data.is_empty() {
            pl.push(Parameter::UserData(self.user_data.clone()));
        }
        pl
    }

    pub fn from_parameter_list(pl: &ParameterList) -> Result<Self> {
        let mut data = Self::default();
        let mut has_guid = false;
        for p in pl.iter() {
            match p {
                Parameter::ProtocolVersion(v) => data.protocol_version = *v,
                Parameter::VendorId(v) => data.vendor_id = *v,
                Parameter::ParticipantGuid(g) => {
                    data.guid = *g;
                    has_guid = true;
                }
                Parameter::ExpectsInlineQos(b) => data.expects_inline_qos = *b,
                Parameter::MetatrafficUnicastLocator(l) => {
                    data.metatraffic_unicast_locator_list.push(*l)
                }
                Parameter::MetatrafficMulticastLocator(l) => {
                    data.metatraffic_multicast_locator_list.push(*l)
                }
                Parameter::DefaultUnicastLocator(l) => data.default_unicast_locator_list.push(*l),
                Parameter::DefaultMulticastLocator(l) => {
                    data.default_multicast_locator_list.push(*l)
                }
                Parameter::ParticipantLeaseDuration(t) => data.lease_duration = *t,
                Parameter::BuiltinEndpointSet(mask) => data.available_builtin_endpoints = *mask,
                Parameter::ManualLivelinessCount(c) => data.manual_liveliness_count = *c,
                Parameter::DomainId(d) => data.domain_id = *d,
                Parameter::EntityName(n) => data.participant_name = n.clone(),
                Parameter::PropertyList(props) => data.properties = props.clone(),
                Parameter::UserData(u) => data.user_data = u.clone(),
                _ => {}
            }
        }
        if !has_guid {
            return Err(Error::ProtocolViolation(
                "participant data without PID_PARTICIPANT_GUID".into(),
            ));
        }
        Ok(data)
    }

    /// Take the announced fields of `other`, keeping the endpoint lists.
    /// Returns whether anything but the liveliness count changed.
    pub fn update_from(&mut self, other: &ParticipantProxyData) -> bool {
        let changed = self.metatraffic_unicast_locator_list != other.metatraffic_unicast_locator_list
            || self.metatraffic_multicast_locator_list != other.metatraffic_multicast_locator_list
            || self.default_unicast_locator_list != other.default_unicast_locator_list
            || self.default_multicast_locator_list != other.default_multicast_locator_list
            || self.lease_duration != other.lease_duration
            || self.available_builtin_endpoints != other.available_builtin_endpoints
            || self.participant_name != other.participant_name
            || self.properties != other.properties
            || self.user_data != other.user_data;
        self.protocol_version = other.protocol_version;
        self.vendor_id = other.vendor_id;
        self.expects_inline_qos = other.expects_inline_qos;
        self.available_builtin_endpoints = other.available_builtin_endpoints;
        self.metatraffic_unicast_locator_list = other.metatraffic_unicast_locator_list.clone();
        self.metatraffic_multicast_locator_list = other.metatraffic_multicast_locator_list.clone();
        self.default_unicast_locator_list = other.default_unicast_locator_list.clone();
        self.default_multicast_locator_list = other.default_multicast_locator_list.clone();
        self.manual_liveliness_count = other.manual_liveliness_count;
        self.participant_name = other.participant_name.clone();
        self.lease_duration = other.lease_duration;
        self.domain_id = other.domain_id;
        self.properties = other.properties.clone();
        self.user_data = other.user_data.clone();
        changed
    }
}

/// What we know about one reader.
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderProxyData {
    pub guid: GUID,
    pub participant_guid: GUID,
    pub unicast_locator_list: LocatorList,
    pub multicast_locator_list: LocatorList,
    pub expects_inline_qos: bool,
    pub topic_name: String,
    pub type_name: String,
    pub topic_kind: TopicKind,
    pub qos: ReaderQos,
    pub user_defined_id: i16,
    pub is_alive: bool,
}

impl Default for ReaderProxyData {
    fn default() -> Self {
        Self {
            guid: GUID::UNKNOWN,
            participant_guid: GUID::UNKNOWN,
            unicast_locator_list: LocatorList::new(),
            multicast_locator_list: LocatorList::new(),
            expects_inline_qos: false,
            topic_name: String::new(),
            type_name: String::new(),
            topic_kind: TopicKind::NoKey,
            qos: ReaderQos::default(),
            user_defined_id: -1,
            is_alive: true,
        }
    }
}

impl ReaderProxyData {
    pub fn to_parameter_list(&self) -> ParameterList {
        let mut pl = ParameterList::new();
        pl.push(Parameter::ParticipantGuid(self.participant_guid));
        pl.push(Parameter::EndpointGuid(self.guid));
        pl.push(Parameter::TopicName(self.topic_name.clone()));
        pl.push(Parameter::TypeName(self.type_name.clone()));
        push_locators(&mut pl, &self.unicast_locator_list, &self.multicast_locator_list);
        if self.expects_inline_qos {
            pl.push(Parameter::ExpectsInlineQos(true));
        }
        let q = &self.qos;
        pl.push(Parameter::Reliability {
            kind: q.reliability.kind,
            max_blocking_time: q.reliability.max_blocking_time,
        });
        pl.push(Parameter::Durability(q.durability.kind));
        pl.push(Parameter::Liveliness {
            kind: q.liveliness.kind,
            lease_duration: q.liveliness.lease_duration,
        });
        pl.push(Parameter::Ownership(q.ownership.kind));
        pl.push(Parameter::DestinationOrder(q.destination_order.kind));
        pl.push(Parameter::Deadline(q.deadline.period));
        if !q.user_data.is_empty() {
            pl.push(Parameter::UserData(q.user_data.clone()));
        }
        pl
    }

    pub fn from_parameter_list(pl: &ParameterList) -> Result<Self> {
        let mut data = Self::default();
        let mut has_guid = false;
        for p in pl.iter() {
            match p {
                Parameter::ParticipantGuid(g) => data.participant_guid = *g,
                Parameter::EndpointGuid(g) => {
                    data.guid = *g;
                    has_guid = true;
                }
                Parameter::TopicName(s) => data.topic_name = s.clone(),
                Parameter::TypeName(s) => data.type_name = s.clone(),
                Parameter::UnicastLocator(l) => data.unicast_locator_list.push(*l),
                Parameter::MulticastLocator(l) => data.multicast_locator_list.push(*l),
                Parameter::ExpectsInlineQos(b) => data.expects_inline_qos = *b,
                Parameter::Reliability {
                    kind,
                    max_blocking_time,
                } => {
                    data.qos.reliability = ReliabilityQosPolicy {
                        kind: *kind,
                        max_blocking_time: *max_blocking_time,
                    }
                }
                Parameter::Durability(kind) => {
                    data.qos.durability = DurabilityQosPolicy { kind: *kind }
                }
                Parameter::Liveliness {
                    kind,
                    lease_duration,
                } => {
                    data.qos.liveliness = LivelinessQosPolicy {
                        kind: *kind,
                        lease_duration: *lease_duration,
                        ..Default::default()
                    }
                }
                Parameter::Ownership(kind) => data.qos.ownership = OwnershipQosPolicy { kind: *kind },
                Parameter::DestinationOrder(kind) => {
                    data.qos.destination_order = DestinationOrderQosPolicy { kind: *kind }
                }
                Parameter::Deadline(t) => data.qos.deadline = DeadlineQosPolicy { period: *t },
                Parameter::UserData(u) => data.qos.user_data = u.clone(),
                _ => {}
            }
        }
        if !has_guid {
            return Err(Error::ProtocolViolation(
                "reader data without PID_ENDPOINT_GUID".into(),
            ));
        }
        if data.participant_guid.is_unknown() {
            data.participant_guid = data.guid.participant_guid();
        }
        data.topic_kind = topic_kind_of(&data.guid);
        Ok(data)
    }

    pub fn key(&self) -> InstanceHandle {
        InstanceHandle::from(self.guid)
    }

    /// How a local writer sees this reader.
    pub fn to_remote_reader_attributes(&self) -> RemoteReaderAttributes {
        let mut remote = RemoteReaderAttributes::new(
            self.guid,
            EndpointAttributes {
                endpoint_kind: EndpointKind::Reader,
                topic_kind: self.topic_kind,
                reliability_kind: self.qos.reliability.kind,
                durability_kind: self.qos.durability.kind,
                unicast_locator_list: self.unicast_locator_list.clone(),
                multicast_locator_list: self.multicast_locator_list.clone(),
                user_defined_id: self.user_defined_id,
                entity_id: -1,
            },
        );
        remote.expects_inline_qos = self.expects_inline_qos;
        remote
    }
}

/// What we know about one writer.
#[derive(Clone, Debug, PartialEq)]
pub struct WriterProxyData {
    pub guid: GUID,
    pub participant_guid: GUID,
    pub unicast_locator_list: LocatorList,
    pub multicast_locator_list: LocatorList,
    pub topic_name: String,
    pub type_name: String,
    pub topic_kind: TopicKind,
    pub qos: WriterQos,
    pub user_defined_id: i16,
    pub is_alive: bool,
}

impl Default for WriterProxyData {
    fn default() -> Self {
        Self {
            guid: GUID::UNKNOWN,
            participant_guid: GUID::UNKNOWN,
            unicast_locator_list: LocatorList::new(),
            multicast_locator_list: LocatorList::new(),
            topic_name: String::new(),
            type_name: String::new(),
            topic_kind: TopicKind::NoKey,
            qos: WriterQos::default(),
            user_defined_id: -1,
            is_alive: true,
        }
    }
}

impl WriterProxyData {
    pub fn to_parameter_list(&self) -> ParameterList {
        let mut pl = ParameterList::new();
        pl.push(Parameter::ParticipantGuid(self.participant_guid));
        pl.push(Parameter::EndpointGuid(self.guid));
        pl.push(Parameter::TopicName(self.topic_name.clone()));
        pl.push(Parameter::TypeName(self.type_name.clone()));
        push_locators(&mut pl, &self.unicast_locator_list, &self.multicast_locator_list);
        let q = &self.qos;
        pl.push(Parameter::Reliability {
            kind: q.reliability.kind,
            max_blocking_time: q.reliability.max_blocking_time,
        });
        pl.push(Parameter::Durability(q.durability.kind));
        pl.push(Parameter::Liveliness {
            kind: q.liveliness.kind,
            lease_duration: q.liveliness.lease_duration,
        });
        pl.push(Parameter::Ownership(q.ownership.kind));
        pl.push(Parameter::OwnershipStrength(q.ownership_strength.value));
        pl.push(Parameter::DestinationOrder(q.destination_order.kind));
        pl.push(Parameter::Deadline(q.deadline.period));
        if !q.user_data.is_empty() {
            pl.push(Parameter::UserData(q.user_data.clone()));
        }
        pl
    }

    pub fn from_parameter_list(pl: &ParameterList) -> Result<Self> {
        let mut data = Self::default();
        let mut has_guid = false;
        for p in pl.iter() {
            match p {
                Parameter::ParticipantGuid(g) => data.participant_guid = *g,
                Parameter::EndpointGuid(g) => {
                    data.guid = *g;
                    has_guid = true;
                }
                Parameter::TopicName(s) => data.topic_name = s.clone(),
                Parameter::TypeName(s) => data.type_name = s.clone(),
                Parameter::UnicastLocator(l) => data.unicast_locator_list.push(*l),
                Parameter::MulticastLocator(l) => data.multicast_locator_list.push(*l),
                Parameter::Reliability {
                    kind,
                    max_blocking_time,
                } => {
                    data.qos.reliability = ReliabilityQosPolicy {
                        kind: *kind,
                        max_blocking_time: *max_blocking_time,
                    }
                }
                Parameter::Durability(kind) => {
                    data.qos.durability = DurabilityQosPolicy { kind: *kind }
                }
                Parameter::Liveliness {
                    kind,
                    lease_duration,
                } => {
                    data.qos.liveliness = LivelinessQosPolicy {
                        kind: *kind,
                        lease_duration: *lease_duration,
                        ..Default::default()
                    }
                }
                Parameter::Ownership(kind) => data.qos.ownership = OwnershipQosPolicy { kind: *kind },
                Parameter::OwnershipStrength(v) => {
                    data.qos.ownership_strength = OwnershipStrengthQosPolicy { value: *v }
                }
                Parameter::DestinationOrder(kind) => {
                    data.qos.destination_order = DestinationOrderQosPolicy { kind: *kind }
                }
                Parameter::Deadline(t) => data.qos.deadline = DeadlineQosPolicy { period: *t },
                Parameter::UserData(u) => data.qos.user_data = u.clone(),
                _ => {}
            }
        }
        if !has_guid {
            return Err(Error::ProtocolViolation(
                "writer data without PID_ENDPOINT_GUID".into(),
            ));
        }
        if data.participant_guid.is_unknown() {
            data.participant_guid = data.guid.participant_guid();
        }
        data.topic_kind = topic_kind_of(&data.guid);
        Ok(data)
    }

    pub fn key(&self) -> InstanceHandle {
        InstanceHandle::from(self.guid)
    }

    /// How a local reader sees this writer.
    pub fn to_remote_writer_attributes(&self) -> RemoteWriterAttributes {
        let mut remote = RemoteWriterAttributes::new(
            self.guid,
            EndpointAttributes {
                endpoint_kind: EndpointKind::Writer,
                topic_kind: self.topic_kind,
                reliability_kind: self.qos.reliability.kind,
                durability_kind: self.qos.durability.kind,
                unicast_locator_list: self.unicast_locator_list.clone(),
                multicast_locator_list: self.multicast_locator_list.clone(),
                user_defined_id: self.user_defined_id,
                entity_id: -1,
            },
        );
        remote.liveliness_lease_duration = self.qos.liveliness.lease_duration;
        remote.ownership_strength = self.qos.ownership_strength.value;
        remote
    }
}

fn push_locators(pl: &mut ParameterList, unicast: &LocatorList, multicast: &LocatorList) {
    for l in unicast.iter() {
        pl.push(Parameter::UnicastLocator(*l));
    }
    for l in multicast.iter() {
        pl.push(Parameter::MulticastLocator(*l));
    }
}

/// Topic kind is carried by the entity kind of the endpoint GUID.
fn topic_kind_of(guid: &GUID) -> TopicKind {
    if guid.entity_id.is_keyed() {
        TopicKind::WithKey
    } else {
        TopicKind::NoKey
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::cdr::Endianness;
    use crate::protocol::guid::{EntityId, GuidPrefix};
    use crate::protocol::locator::Locator;
    use crate::qos::{DurabilityKind, ReliabilityKind};
    use std::net::Ipv4Addr;

    #[test]
    fn test_participant_data_through_payload() {
        let mut data = ParticipantProxyData {
            guid: GUID::new(GuidPrefix::generate(), EntityId::PARTICIPANT),
            participant_name: "alpha".into(),
            available_builtin_endpoints: 0x3f,
            lease_duration: Time::from_secs(20),
            domain_id: 3,
            ..Default::default()
        };
        data.metatraffic_unicast_locator_list
            .push(Locator::udpv4(Ipv4Addr::LOCALHOST, 7410));
        data.default_unicast_locator_list
            .push(Locator::udpv4(Ipv4Addr::LOCALHOST, 7411));
        data.properties
            .push(Property::new("eProsimaEDPStatic_Writer_ALIVE_ID_1", "0.0.1.3"));

        let payload = data.to_parameter_list().to_payload(Endianness::Big);
        let pl = ParameterList::from_payload(&payload).expect("decode");
        let back = ParticipantProxyData::from_parameter_list(&pl).expect("participant");
        assert_eq!(back, data);
    }

    #[test]
    fn test_participant_data_requires_guid() {
        let mut pl = ParameterList::new();
        pl.push(Parameter::EntityName("nameless".into()));
        assert!(matches!(
            ParticipantProxyData::from_parameter_list(&pl),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_update_from_keeps_endpoints() {
        let guid = GUID::new(GuidPrefix::generate(), EntityId::PARTICIPANT);
        let mut known = ParticipantProxyData {
            guid,
            ..Default::default()
        };
        known.writers.push(WriterProxyData::default());
        let mut announced = known.clone();
        announced.writers.clear();
        announced.manual_liveliness_count = 4;
        assert!(!known.update_from(&announced));
        assert_eq!(known.writers.len(), 1);
        assert_eq!(known.manual_liveliness_count, 4);

        announced.properties.push(Property::new("k", "v"));
        assert!(known.update_from(&announced));
    }

    #[test]
    fn test_writer_data_derives_topic_kind_and_participant() {
        let prefix = GuidPrefix::generate();
        let mut w = WriterProxyData {
            guid: GUID::new(prefix, EntityId::from_key(5, 0x02)),
            topic_name: "T".into(),
            type_name: "Type".into(),
            ..Default::default()
        };
        w.qos.durability.kind = DurabilityKind::TransientLocal;
        w.qos.ownership_strength.value = 7;
        let mut pl = w.to_parameter_list();
        // Drop the participant GUID to exercise the fallback.
        pl = pl
            .iter()
            .filter(|p| !matches!(p, Parameter::ParticipantGuid(_)))
            .cloned()
            .collect();
        let back = WriterProxyData::from_parameter_list(&pl).expect("writer");
        assert_eq!(back.topic_kind, TopicKind::WithKey);
        assert_eq!(back.participant_guid, GUID::new(prefix, EntityId::PARTICIPANT));
        assert_eq!(back.qos.durability.kind, DurabilityKind::TransientLocal);
        assert_eq!(back.to_remote_writer_attributes().ownership_strength, 7);
    }

    #[test]
    fn test_reader_data_to_remote_attributes() {
        let mut r = ReaderProxyData {
            guid: GUID::new(GuidPrefix::generate(), EntityId::from_key(2, 0x04)),
            expects_inline_qos: true,
            ..Default::default()
        };
        r.qos.reliability.kind = ReliabilityKind::Reliable;
        r.unicast_locator_list
            .push(Locator::udpv4(Ipv4Addr::LOCALHOST, 9000));
        let back = ReaderProxyData::from_parameter_list(&r.to_parameter_list()).expect("reader");
        assert_eq!(back.topic_kind, TopicKind::NoKey);
        let remote = back.to_remote_reader_attributes();
        assert!(remote.expects_inline_qos);
        assert!(remote.endpoint.is_reliable());
        assert_eq!(remote.endpoint.unicast_locator_list.len(), 1);
    }
}
