// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// RTPS wire constants (DDS-RTPS v2.3 Sec.9).

// =======================================================================
// Message header
// =======================================================================

pub const RTPS_MAGIC: &[u8; 4] = b"RTPS";
pub const RTPS_HEADER_SIZE: usize = 20;
pub const SUBMESSAGE_HEADER_SIZE: usize = 4;

// =======================================================================
// Submessage ids
// =======================================================================

pub const SUBMSG_PAD: u8 = 0x01;
pub const SUBMSG_ACKNACK: u8 = 0x06;
pub const SUBMSG_HEARTBEAT: u8 = 0x07;
pub const SUBMSG_GAP: u8 = 0x08;
pub const SUBMSG_INFO_TS: u8 = 0x09;
pub const SUBMSG_INFO_SRC: u8 = 0x0c;
pub const SUBMSG_INFO_DST: u8 = 0x0e;
pub const SUBMSG_DATA: u8 = 0x15;

// Submessage flags (bit 0 is always endianness)
pub const FLAG_ENDIANNESS: u8 = 0x01;
pub const FLAG_INLINE_QOS: u8 = 0x02;
pub const FLAG_DATA: u8 = 0x04;
pub const FLAG_KEY: u8 = 0x08;
pub const FLAG_FINAL: u8 = 0x02;
pub const FLAG_LIVELINESS: u8 = 0x04;
pub const FLAG_INVALIDATE: u8 = 0x02;

/// DATA octetsToInlineQos when the extra header fields are the standard 16 bytes.
pub const DATA_OCTETS_TO_INLINE_QOS: u16 = 16;

// =======================================================================
// Encapsulation identifiers
// =======================================================================

pub const CDR_BE: u16 = 0x0000;
pub const CDR_LE: u16 = 0x0001;
pub const PL_CDR_BE: u16 = 0x0002;
pub const PL_CDR_LE: u16 = 0x0003;

// =======================================================================
// Parameter ids
// =======================================================================

pub const PID_PAD: u16 = 0x0000;
pub const PID_SENTINEL: u16 = 0x0001;
pub const PID_PARTICIPANT_LEASE_DURATION: u16 = 0x0002;
pub const PID_TOPIC_NAME: u16 = 0x0005;
pub const PID_OWNERSHIP_STRENGTH: u16 = 0x0006;
pub const PID_TYPE_NAME: u16 = 0x0007;
pub const PID_METATRAFFIC_MULTICAST_PORT: u16 = 0x000b;
pub const PID_METATRAFFIC_UNICAST_PORT: u16 = 0x000d;
pub const PID_DOMAIN_ID: u16 = 0x000f;
pub const PID_PROTOCOL_VERSION: u16 = 0x0015;
pub const PID_VENDORID: u16 = 0x0016;
pub const PID_RELIABILITY: u16 = 0x001a;
pub const PID_LIVELINESS: u16 = 0x001b;
pub const PID_DURABILITY: u16 = 0x001d;
pub const PID_OWNERSHIP: u16 = 0x001f;
pub const PID_DEADLINE: u16 = 0x0023;
pub const PID_DESTINATION_ORDER: u16 = 0x0025;
pub const PID_USER_DATA: u16 = 0x002c;
pub const PID_UNICAST_LOCATOR: u16 = 0x002f;
pub const PID_MULTICAST_LOCATOR: u16 = 0x0030;
pub const PID_DEFAULT_UNICAST_LOCATOR: u16 = 0x0031;
pub const PID_METATRAFFIC_UNICAST_LOCATOR: u16 = 0x0032;
pub const PID_METATRAFFIC_MULTICAST_LOCATOR: u16 = 0x0033;
pub const PID_PARTICIPANT_MANUAL_LIVELINESS_COUNT: u16 = 0x0034;
pub const PID_HISTORY: u16 = 0x0040;
pub const PID_RESOURCE_LIMITS: u16 = 0x0041;
pub const PID_EXPECTS_INLINE_QOS: u16 = 0x0043;
pub const PID_DEFAULT_MULTICAST_LOCATOR: u16 = 0x0048;
pub const PID_PARTICIPANT_GUID: u16 = 0x0050;
pub const PID_BUILTIN_ENDPOINT_SET: u16 = 0x0058;
pub const PID_PROPERTY_LIST: u16 = 0x0059;
pub const PID_ENDPOINT_GUID: u16 = 0x005a;
pub const PID_ENTITY_NAME: u16 = 0x0062;
pub const PID_KEY_HASH: u16 = 0x0070;
pub const PID_STATUS_INFO: u16 = 0x0071;

/// Vendor-specific parameter range (high bit set), always skippable.
pub const PID_VENDOR_SPECIFIC_FLAG: u16 = 0x8000;
/// Receivers that do not understand a parameter with this bit must drop the message.
pub const PID_MUST_UNDERSTAND_FLAG: u16 = 0x4000;

// =======================================================================
// Entity kinds (last byte of EntityId)
// =======================================================================

pub const ENTITY_KIND_USER_WRITER_WITH_KEY: u8 = 0x02;
pub const ENTITY_KIND_USER_WRITER_NO_KEY: u8 = 0x03;
pub const ENTITY_KIND_USER_READER_NO_KEY: u8 = 0x04;
pub const ENTITY_KIND_USER_READER_WITH_KEY: u8 = 0x07;
pub const ENTITY_KIND_BUILTIN_PARTICIPANT: u8 = 0xc1;
pub const ENTITY_KIND_BUILTIN_WRITER_WITH_KEY: u8 = 0xc2;
pub const ENTITY_KIND_BUILTIN_WRITER_NO_KEY: u8 = 0xc3;
pub const ENTITY_KIND_BUILTIN_READER_NO_KEY: u8 = 0xc4;
pub const ENTITY_KIND_BUILTIN_READER_WITH_KEY: u8 = 0xc7;

// =======================================================================
// Builtin endpoint set bits (PID_BUILTIN_ENDPOINT_SET)
// =======================================================================

pub const DISC_BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER: u32 = 1 << 0;
pub const DISC_BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR: u32 = 1 << 1;
pub const DISC_BUILTIN_ENDPOINT_PUBLICATION_ANNOUNCER: u32 = 1 << 2;
pub const DISC_BUILTIN_ENDPOINT_PUBLICATION_DETECTOR: u32 = 1 << 3;
pub const DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_ANNOUNCER: u32 = 1 << 4;
pub const DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_DETECTOR: u32 = 1 << 5;
pub const BUILTIN_ENDPOINT_PARTICIPANT_MESSAGE_DATA_WRITER: u32 = 1 << 10;
pub const BUILTIN_ENDPOINT_PARTICIPANT_MESSAGE_DATA_READER: u32 = 1 << 11;

// =======================================================================
// Sizes
// =======================================================================

/// Maximum serialized size of a participant announcement.
pub const DISCOVERY_PARTICIPANT_DATA_MAX_SIZE: usize = 5000;
/// Maximum serialized size of a publication/subscription announcement.
pub const DISCOVERY_TOPIC_DATA_MAX_SIZE: usize = 5000;
/// Largest user payload accepted by a writer history.
pub const PAYLOAD_MAX_SIZE: usize = 64_000;
/// Receive buffer per datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;
