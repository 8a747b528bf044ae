// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parameter list codec (PL_CDR).
//!
//! A list is a sequence of `(pid: u16, length: u16, value)` tuples, each
//! value padded to 4 bytes, terminated by `PID_SENTINEL` with length 0.
//! The byte order of pid/length and of every value follows the list's
//! encapsulation (PL_CDR_LE or PL_CDR_BE).
//!
//! Unknown parameter ids are skipped, except those carrying the
//! must-understand bit, which make the whole list invalid.

use super::cdr::{CdrReader, CdrWriter, Endianness};
use super::constants::*;
use super::guid::{InstanceHandle, GUID};
use super::locator::{decode_locator_value, Locator};
use super::types::{ChangeKind, ProtocolVersion, SerializedPayload, Time, VendorId};
use super::{CodecError, CodecResult};
use crate::qos::{
    DestinationOrderKind, DurabilityKind, HistoryKind, LivelinessKind, OwnershipKind,
    ReliabilityKind,
};

/// Name/value entry of PID_PROPERTY_LIST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One decoded parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    ParticipantGuid(GUID),
    EndpointGuid(GUID),
    TopicName(String),
    TypeName(String),
    EntityName(String),
    UnicastLocator(Locator),
    MulticastLocator(Locator),
    DefaultUnicastLocator(Locator),
    DefaultMulticastLocator(Locator),
    MetatrafficUnicastLocator(Locator),
    MetatrafficMulticastLocator(Locator),
    ProtocolVersion(ProtocolVersion),
    VendorId(VendorId),
    ExpectsInlineQos(bool),
    ParticipantLeaseDuration(Time),
    BuiltinEndpointSet(u32),
    ManualLivelinessCount(i32),
    DomainId(u32),
    KeyHash(InstanceHandle),
    StatusInfo(ChangeKind),
    Reliability {
        kind: ReliabilityKind,
        max_blocking_time: Time,
    },
    Durability(DurabilityKind),
    Liveliness {
        kind: LivelinessKind,
        lease_duration: Time,
    },
    Ownership(OwnershipKind),
    OwnershipStrength(i32),
    DestinationOrder(DestinationOrderKind),
    Deadline(Time),
    History {
        kind: HistoryKind,
        depth: i32,
    },
    ResourceLimits {
        max_samples: i32,
        max_instances: i32,
        max_samples_per_instance: i32,
    },
    PropertyList(Vec<Property>),
    UserData(Vec<u8>),
}

impl Parameter {
    pub fn pid(&self) -> u16 {
        match self {
            Parameter::ParticipantGuid(_) => PID_PARTICIPANT_GUID,
            Parameter::EndpointGuid(_) => PID_ENDPOINT_GUID,
            Parameter::TopicName(_) => PID_TOPIC_NAME,
            Parameter::TypeName(_) => PID_TYPE_NAME,
            Parameter::EntityName(_) => PID_ENTITY_NAME,
            Parameter::UnicastLocator(_) => PID_UNICAST_LOCATOR,
            Parameter::MulticastLocator(_) => PID_MULTICAST_LOCATOR,
            Parameter::DefaultUnicastLocator(_) => PID_DEFAULT_UNICAST_LOCATOR,
            Parameter::DefaultMulticastLocator(_) => PID_DEFAULT_MULTICAST_LOCATOR,
            Parameter::MetatrafficUnicastLocator(_) => PID_METATRAFFIC_UNICAST_LOCATOR,
            Parameter::MetatrafficMulticastLocator(_) => PID_METATRAFFIC_MULTICAST_LOCATOR,
            Parameter::ProtocolVersion(_) => PID_PROTOCOL_VERSION,
            Parameter::VendorId(_) => PID_VENDORID,
            Parameter::ExpectsInlineQos(_) => PID_EXPECTS_INLINE_QOS,
            Parameter::ParticipantLeaseDuration(_) => PID_PARTICIPANT_LEASE_DURATION,
            Parameter::BuiltinEndpointSet(_) => PID_BUILTIN_ENDPOINT_SET,
            Parameter::ManualLivelinessCount(_) => PID_PARTICIPANT_MANUAL_LIVELINESS_COUNT,
            Parameter::DomainId(_) => PID_DOMAIN_ID,
            Parameter::KeyHash(_) => PID_KEY_HASH,
            Parameter::StatusInfo(_) => PID_STATUS_INFO,
            Parameter::Reliability { .. } => PID_RELIABILITY,
            Parameter::Durability(_) => PID_DURABILITY,
            Parameter::Liveliness { .. } => PID_LIVELINESS,
            Parameter::Ownership(_) => PID_OWNERSHIP,
            Parameter::OwnershipStrength(_) => PID_OWNERSHIP_STRENGTH,
            Parameter::DestinationOrder(_) => PID_DESTINATION_ORDER,
            Parameter::Deadline(_) => PID_DEADLINE,
            Parameter::History { .. } => PID_HISTORY,
            Parameter::ResourceLimits { .. } => PID_RESOURCE_LIMITS,
            Parameter::PropertyList(_) => PID_PROPERTY_LIST,
            Parameter::UserData(_) => PID_USER_DATA,
        }
    }

    fn encode_value(&self, w: &mut CdrWriter) {
        match self {
            Parameter::ParticipantGuid(g) | Parameter::EndpointGuid(g) => {
                w.write_bytes(&g.as_bytes())
            }
            Parameter::TopicName(s) | Parameter::TypeName(s) | Parameter::EntityName(s) => {
                w.write_string(s)
            }
            Parameter::UnicastLocator(l)
            | Parameter::MulticastLocator(l)
            | Parameter::DefaultUnicastLocator(l)
            | Parameter::DefaultMulticastLocator(l)
            | Parameter::MetatrafficUnicastLocator(l)
            | Parameter::MetatrafficMulticastLocator(l) => l.encode(w),
            Parameter::ProtocolVersion(v) => {
                w.write_u8(v.major);
                w.write_u8(v.minor);
            }
            Parameter::VendorId(v) => w.write_bytes(&v.0),
            Parameter::ExpectsInlineQos(b) => w.write_bool(*b),
            Parameter::ParticipantLeaseDuration(t) | Parameter::Deadline(t) => t.encode(w),
            Parameter::BuiltinEndpointSet(v) | Parameter::DomainId(v) => w.write_u32(*v),
            Parameter::ManualLivelinessCount(v) | Parameter::OwnershipStrength(v) => {
                w.write_i32(*v)
            }
            Parameter::KeyHash(h) => w.write_bytes(&h.0),
            Parameter::StatusInfo(kind) => w.write_bytes(&[0, 0, 0, kind.to_status_info()]),
            Parameter::Reliability {
                kind,
                max_blocking_time,
            } => {
                w.write_u32(kind.to_wire());
                max_blocking_time.encode(w);
            }
            Parameter::Durability(kind) => w.write_u32(kind.to_wire()),
            Parameter::Liveliness {
                kind,
                lease_duration,
            } => {
                w.write_u32(kind.to_wire());
                lease_duration.encode(w);
            }
            Parameter::Ownership(kind) => w.write_u32(kind.to_wire()),
            Parameter::DestinationOrder(kind) => w.write_u32(kind.to_wire()),
            Parameter::History { kind, depth } => {
                w.write_u32(kind.to_wire());
                w.write_i32(*depth);
            }
            Parameter::ResourceLimits {
                max_samples,
                max_instances,
                max_samples_per_instance,
            } => {
                w.write_i32(*max_samples);
                w.write_i32(*max_instances);
                w.write_i32(*max_samples_per_instance);
            }
            Parameter::PropertyList(props) => {
                w.write_u32(props.len() as u32);
                for p in props {
                    w.write_string(&p.name);
                    w.align(4);
                    w.write_string(&p.value);
                    w.align(4);
                }
            }
            Parameter::UserData(data) => {
                w.write_u32(data.len() as u32);
                w.write_bytes(data);
            }
        }
    }

    /// Decode a known pid; `Ok(None)` for ids this codec does not model.
    fn decode_value(pid: u16, value: &[u8], endianness: Endianness) -> CodecResult<Option<Self>> {
        let mut r = CdrReader::new(value, endianness);
        let p = match pid {
            PID_PARTICIPANT_GUID => Parameter::ParticipantGuid(GUID::decode(&mut r)?),
            PID_ENDPOINT_GUID => Parameter::EndpointGuid(GUID::decode(&mut r)?),
            PID_TOPIC_NAME => Parameter::TopicName(r.read_string()?),
            PID_TYPE_NAME => Parameter::TypeName(r.read_string()?),
            PID_ENTITY_NAME => Parameter::EntityName(r.read_string()?),
            PID_UNICAST_LOCATOR => Parameter::UnicastLocator(decode_locator_value(pid, value, &r)?),
            PID_MULTICAST_LOCATOR => {
                Parameter::MulticastLocator(decode_locator_value(pid, value, &r)?)
            }
            PID_DEFAULT_UNICAST_LOCATOR => {
                Parameter::DefaultUnicastLocator(decode_locator_value(pid, value, &r)?)
            }
            PID_DEFAULT_MULTICAST_LOCATOR => {
                Parameter::DefaultMulticastLocator(decode_locator_value(pid, value, &r)?)
            }
            PID_METATRAFFIC_UNICAST_LOCATOR => {
                Parameter::MetatrafficUnicastLocator(decode_locator_value(pid, value, &r)?)
            }
            PID_METATRAFFIC_MULTICAST_LOCATOR => {
                Parameter::MetatrafficMulticastLocator(decode_locator_value(pid, value, &r)?)
            }
            PID_PROTOCOL_VERSION => Parameter::ProtocolVersion(ProtocolVersion {
                major: r.read_u8()?,
                minor: r.read_u8()?,
            }),
            PID_VENDORID => Parameter::VendorId(VendorId(r.read_array::<2>()?)),
            PID_EXPECTS_INLINE_QOS => Parameter::ExpectsInlineQos(r.read_bool()?),
            PID_PARTICIPANT_LEASE_DURATION => {
                Parameter::ParticipantLeaseDuration(Time::decode(&mut r)?)
            }
            PID_BUILTIN_ENDPOINT_SET => Parameter::BuiltinEndpointSet(r.read_u32()?),
            PID_PARTICIPANT_MANUAL_LIVELINESS_COUNT => {
                Parameter::ManualLivelinessCount(r.read_i32()?)
            }
            PID_DOMAIN_ID => Parameter::DomainId(r.read_u32()?),
            PID_KEY_HASH => Parameter::KeyHash(InstanceHandle(r.read_array::<16>()?)),
            PID_STATUS_INFO => {
                let flags = r.read_array::<4>()?;
                if flags[0..3] != [0, 0, 0] {
                    return Err(CodecError::UnknownStatus(flags[3]));
                }
                Parameter::StatusInfo(ChangeKind::from_status_info(flags[3])?)
            }
            PID_RELIABILITY => {
                let raw = r.read_u32()?;
                let kind = ReliabilityKind::from_wire(raw).ok_or(CodecError::InvalidParameter {
                    pid,
                    reason: "unknown reliability kind",
                })?;
                // Some stacks omit max_blocking_time
                let max_blocking_time = if r.remaining() >= 8 {
                    Time::decode(&mut r)?
                } else {
                    Time::from_millis(100)
                };
                Parameter::Reliability {
                    kind,
                    max_blocking_time,
                }
            }
            PID_DURABILITY => Parameter::Durability(
                DurabilityKind::from_wire(r.read_u32()?).ok_or(CodecError::InvalidParameter {
                    pid,
                    reason: "unknown durability kind",
                })?,
            ),
            PID_LIVELINESS => {
                let kind = LivelinessKind::from_wire(r.read_u32()?).ok_or(
                    CodecError::InvalidParameter {
                        pid,
                        reason: "unknown liveliness kind",
                    },
                )?;
                Parameter::Liveliness {
                    kind,
                    lease_duration: Time::decode(&mut r)?,
                }
            }
            PID_OWNERSHIP => Parameter::Ownership(
                OwnershipKind::from_wire(r.read_u32()?).ok_or(CodecError::InvalidParameter {
                    pid,
                    reason: "unknown ownership kind",
                })?,
            ),
            PID_OWNERSHIP_STRENGTH => Parameter::OwnershipStrength(r.read_i32()?),
            PID_DESTINATION_ORDER => Parameter::DestinationOrder(
                DestinationOrderKind::from_wire(r.read_u32()?).ok_or(
                    CodecError::InvalidParameter {
                        pid,
                        reason: "unknown destination order kind",
                    },
                )?,
            ),
            PID_DEADLINE => Parameter::Deadline(Time::decode(&mut r)?),
            PID_HISTORY => {
                let kind = HistoryKind::from_wire(r.read_u32()?).ok_or(
                    CodecError::InvalidParameter {
                        pid,
                        reason: "unknown history kind",
                    },
                )?;
                Parameter::History {
                    kind,
                    depth: r.read_i32()?,
                }
            }
            PID_RESOURCE_LIMITS => Parameter::ResourceLimits {
                max_samples: r.read_i32()?,
                max_instances: r.read_i32()?,
                max_samples_per_instance: r.read_i32()?,
            },
            PID_PROPERTY_LIST => {
                let count = r.read_u32()? as usize;
                // Each property needs at least two 4-byte string lengths
                if count > r.remaining() / 8 {
                    return Err(CodecError::InvalidParameter {
                        pid,
                        reason: "property count exceeds parameter length",
                    });
                }
                let mut props = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = r.read_string()?;
                    r.align(4)?;
                    let value = r.read_string()?;
                    r.align(4)?;
                    props.push(Property { name, value });
                }
                Parameter::PropertyList(props)
            }
            PID_USER_DATA => {
                let len = r.read_u32()? as usize;
                Parameter::UserData(r.read_bytes(len)?.to_vec())
            }
            _ => return Ok(None),
        };
        Ok(Some(p))
    }
}

/// Ordered list of parameters.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ParameterList {
    params: Vec<Parameter>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, p: Parameter) {
        self.params.push(p);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// First parameter matching `f`.
    pub fn find_map<T>(&self, f: impl FnMut(&Parameter) -> Option<T>) -> Option<T> {
        self.params.iter().find_map(f)
    }

    pub fn key_hash(&self) -> Option<InstanceHandle> {
        self.find_map(|p| match p {
            Parameter::KeyHash(h) => Some(*h),
            _ => None,
        })
    }

    pub fn status_info(&self) -> Option<ChangeKind> {
        self.find_map(|p| match p {
            Parameter::StatusInfo(k) => Some(*k),
            _ => None,
        })
    }

    /// Append the encoded list (sentinel included) to `w`.
    ///
    /// Alignment is relative to the writer origin, which callers set at the
    /// start of the list.
    pub fn encode_into(&self, w: &mut CdrWriter) {
        for p in &self.params {
            w.write_u16(p.pid());
            let len_at = w.len();
            w.write_u16(0);
            let start = w.len();
            p.encode_value(w);
            w.align(4);
            let len = w.len() - start;
            w.patch_u16(len_at, len as u16);
        }
        w.write_u16(PID_SENTINEL);
        w.write_u16(0);
    }

    pub fn encode(&self, endianness: Endianness) -> Vec<u8> {
        let mut w = CdrWriter::with_capacity(endianness, 256);
        self.encode_into(&mut w);
        w.into_inner()
    }

    /// Encode as a serialized payload with PL_CDR_LE/BE encapsulation.
    pub fn to_payload(&self, endianness: Endianness) -> SerializedPayload {
        SerializedPayload::new(
            endianness.parameter_list_encapsulation(),
            self.encode(endianness),
        )
    }

    /// Decode a list from `r`, consuming through the sentinel.
    pub fn decode_from(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        let mut list = ParameterList::new();
        loop {
            if r.remaining() < 4 {
                return Err(CodecError::MissingSentinel);
            }
            let pid = r.read_u16()?;
            let len = r.read_u16()? as usize;
            if pid == PID_SENTINEL {
                return Ok(list);
            }
            let value = r.read_bytes(len).map_err(|_| CodecError::InvalidParameter {
                pid,
                reason: "length exceeds remaining bytes",
            })?;
            if pid == PID_PAD {
                continue;
            }
            match Parameter::decode_value(pid, value, r.endianness())? {
                Some(p) => list.push(p),
                None if pid & PID_VENDOR_SPECIFIC_FLAG != 0 => {
                    log::trace!("[ParameterList] skipping vendor pid 0x{:04x}", pid);
                }
                None if pid & PID_MUST_UNDERSTAND_FLAG != 0 => {
                    return Err(CodecError::InvalidParameter {
                        pid,
                        reason: "unsupported must-understand parameter",
                    });
                }
                None => {
                    log::trace!("[ParameterList] skipping unknown pid 0x{:04x}", pid);
                }
            }
        }
    }

    pub fn decode(bytes: &[u8], endianness: Endianness) -> CodecResult<Self> {
        let mut r = CdrReader::new(bytes, endianness);
        Self::decode_from(&mut r)
    }

    /// Decode a payload whose encapsulation must be PL_CDR_LE or PL_CDR_BE.
    pub fn from_payload(payload: &SerializedPayload) -> CodecResult<Self> {
        let endianness = match payload.encapsulation {
            PL_CDR_LE => Endianness::Little,
            PL_CDR_BE => Endianness::Big,
            other => return Err(CodecError::InvalidEncapsulation(other)),
        };
        Self::decode(&payload.data, endianness)
    }
}

impl FromIterator<Parameter> for ParameterList {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ParameterList {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::guid::{EntityId, GuidPrefix};
    use std::net::Ipv4Addr;

    fn sample_list() -> ParameterList {
        let guid = GUID::new(GuidPrefix([3; 12]), EntityId::PARTICIPANT);
        vec![
            Parameter::ParticipantGuid(guid),
            Parameter::TopicName("Square".into()),
            Parameter::UnicastLocator(Locator::udpv4(Ipv4Addr::new(10, 0, 0, 1), 7411)),
            Parameter::StatusInfo(ChangeKind::NotAliveDisposed),
            Parameter::ResourceLimits {
                max_samples: 1,
                max_instances: 2,
                max_samples_per_instance: 3,
            },
            Parameter::PropertyList(vec![Property::new("a", "bcd"), Property::new("key", "")]),
            Parameter::Reliability {
                kind: ReliabilityKind::Reliable,
                max_blocking_time: Time::from_millis(100),
            },
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_parameter_list_both_endianness() {
        let list = sample_list();
        for e in [Endianness::Little, Endianness::Big] {
            let bytes = list.encode(e);
            assert_eq!(bytes.len() % 4, 0);
            let decoded = ParameterList::decode(&bytes, e).expect("Decode should succeed");
            assert_eq!(decoded, list);
        }
    }

    #[test]
    fn test_sentinel_and_alignment() {
        let list: ParameterList = vec![Parameter::TopicName("T".into())].into_iter().collect();
        let bytes = list.encode(Endianness::Little);
        // pid, len=8 (4 length + "T\0" + 2 pad), value, sentinel
        assert_eq!(&bytes[0..2], &PID_TOPIC_NAME.to_le_bytes());
        assert_eq!(&bytes[2..4], &8u16.to_le_bytes());
        assert_eq!(&bytes[12..16], &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_status_info_layout() {
        let list: ParameterList = vec![Parameter::StatusInfo(ChangeKind::NotAliveUnregistered)]
            .into_iter()
            .collect();
        let bytes = list.encode(Endianness::Big);
        assert_eq!(&bytes[0..8], &[0x00, 0x71, 0x00, 0x04, 0, 0, 0, 2]);
    }

    #[test]
    fn test_unknown_pids() {
        let mut w = CdrWriter::new(Endianness::Little);
        // vendor pid, skipped
        w.write_u16(0x8001);
        w.write_u16(4);
        w.write_u32(0xdead_beef);
        // plain unknown pid, skipped
        w.write_u16(0x0fff);
        w.write_u16(0);
        w.write_u16(PID_SENTINEL);
        w.write_u16(0);
        let decoded = ParameterList::decode(w.as_slice(), Endianness::Little)
            .expect("Unknown pids should be skipped");
        assert!(decoded.is_empty());

        let mut w = CdrWriter::new(Endianness::Little);
        w.write_u16(0x4fff);
        w.write_u16(0);
        w.write_u16(PID_SENTINEL);
        w.write_u16(0);
        assert!(ParameterList::decode(w.as_slice(), Endianness::Little).is_err());
    }

    #[test]
    fn test_invalid_status_rejected() {
        let mut w = CdrWriter::new(Endianness::Little);
        w.write_u16(PID_STATUS_INFO);
        w.write_u16(4);
        w.write_bytes(&[0, 0, 0, 9]);
        w.write_u16(PID_SENTINEL);
        w.write_u16(0);
        assert_eq!(
            ParameterList::decode(w.as_slice(), Endianness::Little),
            Err(CodecError::UnknownStatus(9))
        );
    }

    #[test]
    fn test_missing_sentinel() {
        let mut w = CdrWriter::new(Endianness::Little);
        w.write_u16(PID_DOMAIN_ID);
        w.write_u16(4);
        w.write_u32(0);
        assert_eq!(
            ParameterList::decode(w.as_slice(), Endianness::Little),
            Err(CodecError::MissingSentinel)
        );
    }

    #[test]
    fn test_payload_encapsulation() {
        let list = sample_list();
        let payload = list.to_payload(Endianness::Big);
        assert_eq!(payload.encapsulation, PL_CDR_BE);
        assert_eq!(ParameterList::from_payload(&payload).expect("decode"), list);
        let bad = SerializedPayload::new(CDR_LE, payload.data.clone());
        assert!(ParameterList::from_payload(&bad).is_err());
    }
}
