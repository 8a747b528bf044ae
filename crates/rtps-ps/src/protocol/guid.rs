// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS GUID (Globally Unique Identifier) and its parts.

use super::cdr::CdrReader;
use super::constants::*;
use super::CodecResult;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static PREFIX_COUNTER: AtomicU32 = AtomicU32::new(0);

/// 12-byte participant identity shared by all its endpoints.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct GuidPrefix(pub [u8; 12]);

impl GuidPrefix {
    pub const UNKNOWN: GuidPrefix = GuidPrefix([0; 12]);

    /// Generate a prefix unique to this process and call.
    ///
    /// # Layout
    /// - bytes 0-1: vendor id
    /// - bytes 2-5: process id
    /// - bytes 6-9: wall-clock nanoseconds (low 32 bits)
    /// - bytes 10-11: per-process counter
    pub fn generate() -> Self {
        let counter = PREFIX_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
            .unwrap_or(0);
        let pid = std::process::id();

        let mut bytes = [0u8; 12];
        bytes[0..2].copy_from_slice(&super::types::VendorId::LOCAL.0);
        bytes[2..6].copy_from_slice(&pid.to_be_bytes());
        bytes[6..10].copy_from_slice(&nanos.to_be_bytes());
        bytes[10..12].copy_from_slice(&(counter as u16).to_be_bytes());
        Self(bytes)
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        Ok(Self(r.read_array::<12>()?))
    }
}

impl fmt::Display for GuidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for GuidPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuidPrefix({})", self)
    }
}

/// 4-byte entity id: 3-byte key followed by a kind octet.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(pub [u8; 4]);

impl EntityId {
    pub const UNKNOWN: EntityId = EntityId([0, 0, 0, 0]);
    pub const PARTICIPANT: EntityId = EntityId([0x00, 0x00, 0x01, 0xc1]);
    pub const SPDP_WRITER: EntityId = EntityId([0x00, 0x01, 0x00, 0xc2]);
    pub const SPDP_READER: EntityId = EntityId([0x00, 0x01, 0x00, 0xc7]);
    pub const SEDP_PUBLICATIONS_WRITER: EntityId = EntityId([0x00, 0x00, 0x03, 0xc2]);
    pub const SEDP_PUBLICATIONS_READER: EntityId = EntityId([0x00, 0x00, 0x03, 0xc7]);
    pub const SEDP_SUBSCRIPTIONS_WRITER: EntityId = EntityId([0x00, 0x00, 0x04, 0xc2]);
    pub const SEDP_SUBSCRIPTIONS_READER: EntityId = EntityId([0x00, 0x00, 0x04, 0xc7]);
    pub const PARTICIPANT_MESSAGE_WRITER: EntityId = EntityId([0x00, 0x02, 0x00, 0xc2]);
    pub const PARTICIPANT_MESSAGE_READER: EntityId = EntityId([0x00, 0x02, 0x00, 0xc7]);

    pub fn new(key: [u8; 3], kind: u8) -> Self {
        Self([key[0], key[1], key[2], kind])
    }

    /// Build from the low 24 bits of `key` (big-endian) and a kind octet.
    pub fn from_key(key: u32, kind: u8) -> Self {
        let b = key.to_be_bytes();
        Self([b[1], b[2], b[3], kind])
    }

    pub fn kind(&self) -> u8 {
        self.0[3]
    }

    pub fn key(&self) -> u32 {
        u32::from_be_bytes([0, self.0[0], self.0[1], self.0[2]])
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    /// Builtin entities have the two high bits of the kind set to 11.
    pub fn is_builtin(&self) -> bool {
        self.kind() & 0xc0 == 0xc0
    }

    pub fn is_writer(&self) -> bool {
        matches!(
            self.kind(),
            ENTITY_KIND_USER_WRITER_WITH_KEY
                | ENTITY_KIND_USER_WRITER_NO_KEY
                | ENTITY_KIND_BUILTIN_WRITER_WITH_KEY
                | ENTITY_KIND_BUILTIN_WRITER_NO_KEY
        )
    }

    pub fn is_reader(&self) -> bool {
        matches!(
            self.kind(),
            ENTITY_KIND_USER_READER_WITH_KEY
                | ENTITY_KIND_USER_READER_NO_KEY
                | ENTITY_KIND_BUILTIN_READER_WITH_KEY
                | ENTITY_KIND_BUILTIN_READER_NO_KEY
        )
    }

    /// Keyed endpoint kinds (writer 0x02/0xc2, reader 0x07/0xc7).
    pub fn is_keyed(&self) -> bool {
        matches!(
            self.kind(),
            ENTITY_KIND_USER_WRITER_WITH_KEY
                | ENTITY_KIND_USER_READER_WITH_KEY
                | ENTITY_KIND_BUILTIN_WRITER_WITH_KEY
                | ENTITY_KIND_BUILTIN_READER_WITH_KEY
        )
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        Ok(Self(r.read_array::<4>()?))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}.{:02x}.{:02x}.{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self)
    }
}

/// RTPS GUID: participant prefix plus entity id.
///
/// # Display Format
/// Hex with dots: "01.0f.ac.10.00.00.00.00.00.00.00.01|00.00.01.c1"
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct GUID {
    pub prefix: GuidPrefix,
    pub entity_id: EntityId,
}

impl GUID {
    pub const UNKNOWN: GUID = GUID {
        prefix: GuidPrefix::UNKNOWN,
        entity_id: EntityId::UNKNOWN,
    };

    pub fn new(prefix: GuidPrefix, entity_id: EntityId) -> Self {
        Self { prefix, entity_id }
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; 12];
        let mut entity_id = [0u8; 4];
        prefix.copy_from_slice(&bytes[0..12]);
        entity_id.copy_from_slice(&bytes[12..16]);
        Self {
            prefix: GuidPrefix(prefix),
            entity_id: EntityId(entity_id),
        }
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix.0);
        bytes[12..16].copy_from_slice(&self.entity_id.0);
        bytes
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    /// GUID of the participant owning this entity.
    pub fn participant_guid(&self) -> GUID {
        GUID::new(self.prefix, EntityId::PARTICIPANT)
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        Ok(Self::from_bytes(r.read_array::<16>()?))
    }
}

impl fmt::Display for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.prefix, self.entity_id)
    }
}

impl fmt::Debug for GUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GUID({})", self)
    }
}

/// 16-byte instance key (KeyHash on the wire).
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct InstanceHandle(pub [u8; 16]);

impl InstanceHandle {
    pub const NIL: InstanceHandle = InstanceHandle([0; 16]);

    pub fn is_defined(&self) -> bool {
        *self != Self::NIL
    }

    /// Interpret the handle as a GUID (discovery keys are GUIDs).
    pub fn to_guid(&self) -> GUID {
        GUID::from_bytes(self.0)
    }
}

impl From<GUID> for InstanceHandle {
    fn from(guid: GUID) -> Self {
        InstanceHandle(guid.as_bytes())
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceHandle(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}
