// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scalar RTPS value types: sequence numbers, time, versions, change kinds.

use super::cdr::{CdrReader, CdrWriter};
use super::{CodecError, CodecResult};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// =======================================================================
// SequenceNumber
// =======================================================================

/// Per-writer 64-bit sequence number (wire form: high i32 + low u32).
///
/// The first change a writer emits carries 1. Numbers are never recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(pub i64);

impl SequenceNumber {
    /// SEQUENCENUMBER_UNKNOWN = {high: -1, low: 0}.
    pub const UNKNOWN: SequenceNumber = SequenceNumber(-(1i64 << 32));
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn from_parts(high: i32, low: u32) -> Self {
        Self((i64::from(high) << 32) | i64::from(low))
    }

    pub fn high(self) -> i32 {
        (self.0 >> 32) as i32
    }

    pub fn low(self) -> u32 {
        self.0 as u32
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn prev(self) -> Self {
        Self(self.0 - 1)
    }

    pub fn encode(self, w: &mut CdrWriter) {
        w.write_i32(self.high());
        w.write_u32(self.low());
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        let high = r.read_i32()?;
        let low = r.read_u32()?;
        Ok(Self::from_parts(high, low))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitmap window of sequence numbers (ACKNACK / GAP).
///
/// Holds at most 256 numbers in `[base, base + 255]`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SequenceNumberSet {
    base: SequenceNumber,
    set: BTreeSet<SequenceNumber>,
}

impl SequenceNumberSet {
    pub const MAX_BITS: i64 = 256;

    pub fn new(base: SequenceNumber) -> Self {
        Self {
            base,
            set: BTreeSet::new(),
        }
    }

    pub fn base(&self) -> SequenceNumber {
        self.base
    }

    /// Add a number; returns false if it falls outside the bitmap window.
    pub fn add(&mut self, seq: SequenceNumber) -> bool {
        if seq < self.base || seq.0 - self.base.0 >= Self::MAX_BITS {
            return false;
        }
        self.set.insert(seq);
        true
    }

    pub fn contains(&self, seq: SequenceNumber) -> bool {
        self.set.contains(&seq)
    }

    pub fn iter(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
        self.set.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    fn num_bits(&self) -> u32 {
        self.set
            .iter()
            .next_back()
            .map(|last| (last.0 - self.base.0 + 1) as u32)
            .unwrap_or(0)
    }

    pub fn encode(&self, w: &mut CdrWriter) {
        self.base.encode(w);
        let num_bits = self.num_bits();
        w.write_u32(num_bits);
        let words = num_bits.div_ceil(32) as usize;
        let mut bitmap = vec![0u32; words];
        for seq in &self.set {
            let bit = (seq.0 - self.base.0) as usize;
            // MSB-first within each 32-bit word (RTPS Sec.9.4.2.6)
            bitmap[bit / 32] |= 1 << (31 - (bit % 32));
        }
        for word in bitmap {
            w.write_u32(word);
        }
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        let base = SequenceNumber::decode(r)?;
        let num_bits = r.read_u32()?;
        if i64::from(num_bits) > Self::MAX_BITS {
            return Err(CodecError::InvalidSubmessage {
                id: 0,
                reason: "sequence number set larger than 256 bits",
            });
        }
        let mut out = Self::new(base);
        let words = num_bits.div_ceil(32);
        for word_idx in 0..words {
            let word = r.read_u32()?;
            for bit in 0..32u32 {
                let index = word_idx * 32 + bit;
                if index >= num_bits {
                    break;
                }
                if word & (1 << (31 - bit)) != 0 {
                    out.set.insert(SequenceNumber(base.0 + i64::from(index)));
                }
            }
        }
        Ok(out)
    }
}

/// Heartbeat / acknack counter.
pub type Count = i32;

// =======================================================================
// Time
// =======================================================================

/// RTPS Time_t / Duration_t: seconds plus 1/2^32 fractions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    pub seconds: i32,
    pub fraction: u32,
}

impl Time {
    pub const ZERO: Time = Time {
        seconds: 0,
        fraction: 0,
    };
    pub const INFINITE: Time = Time {
        seconds: 0x7fff_ffff,
        fraction: 0xffff_ffff,
    };

    pub fn new(seconds: i32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    pub fn from_secs(seconds: i32) -> Self {
        Self {
            seconds,
            fraction: 0,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::from_std(Duration::from_millis(millis))
    }

    pub fn from_std(d: Duration) -> Self {
        if d.as_secs() >= 0x7fff_ffff {
            return Self::INFINITE;
        }
        let fraction = ((u64::from(d.subsec_nanos()) << 32) / 1_000_000_000) as u32;
        Self {
            seconds: d.as_secs() as i32,
            fraction,
        }
    }

    /// Convert to a std duration; `None` for infinite or negative values.
    pub fn to_std(self) -> Option<Duration> {
        if self.is_infinite() || self.seconds < 0 {
            return None;
        }
        let nanos = (u64::from(self.fraction) * 1_000_000_000) >> 32;
        Some(Duration::new(self.seconds as u64, nanos as u32))
    }

    pub fn is_infinite(self) -> bool {
        self == Self::INFINITE
    }

    /// Wall-clock time since the Unix epoch.
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(Self::from_std)
            .unwrap_or(Self::ZERO)
    }

    pub fn encode(self, w: &mut CdrWriter) {
        w.write_i32(self.seconds);
        w.write_u32(self.fraction);
    }

    pub fn decode(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            seconds: r.read_i32()?,
            fraction: r.read_u32()?,
        })
    }
}

// =======================================================================
// Protocol version / vendor id
// =======================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const V2_1: ProtocolVersion = ProtocolVersion { major: 2, minor: 1 };
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::V2_1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VendorId(pub [u8; 2]);

impl VendorId {
    pub const UNKNOWN: VendorId = VendorId([0, 0]);
    /// Vendor id written in every header this stack emits (0x010f).
    pub const LOCAL: VendorId = VendorId([0x01, 0x0f]);
}

impl Default for VendorId {
    fn default() -> Self {
        Self::LOCAL
    }
}

// =======================================================================
// Change / topic kinds
// =======================================================================

/// Lifecycle kind of a cache change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ChangeKind {
    #[default]
    Alive,
    NotAliveDisposed,
    NotAliveUnregistered,
    NotAliveDisposedUnregistered,
}

impl ChangeKind {
    /// PID_STATUS_INFO flags: bit 0 disposed, bit 1 unregistered.
    pub fn to_status_info(self) -> u8 {
        match self {
            ChangeKind::Alive => 0,
            ChangeKind::NotAliveDisposed => 1,
            ChangeKind::NotAliveUnregistered => 2,
            ChangeKind::NotAliveDisposedUnregistered => 3,
        }
    }

    pub fn from_status_info(value: u8) -> CodecResult<Self> {
        match value {
            0 => Ok(ChangeKind::Alive),
            1 => Ok(ChangeKind::NotAliveDisposed),
            2 => Ok(ChangeKind::NotAliveUnregistered),
            3 => Ok(ChangeKind::NotAliveDisposedUnregistered),
            other => Err(CodecError::UnknownStatus(other)),
        }
    }

    pub fn is_alive(self) -> bool {
        self == ChangeKind::Alive
    }
}

/// Whether samples of a topic carry a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-loaders", derive(serde::Serialize, serde::Deserialize))]
pub enum TopicKind {
    #[default]
    NoKey,
    WithKey,
}

// =======================================================================
// Serialized payload
// =======================================================================

/// Encapsulated sample bytes as carried by DATA.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedPayload {
    /// Encapsulation identifier (CDR_LE, PL_CDR_LE, ...).
    pub encapsulation: u16,
    pub data: Vec<u8>,
}

impl Default for SerializedPayload {
    fn default() -> Self {
        Self {
            encapsulation: super::constants::CDR_LE,
            data: Vec::new(),
        }
    }
}

impl SerializedPayload {
    pub fn new(encapsulation: u16, data: Vec<u8>) -> Self {
        Self {
            encapsulation,
            data,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            encapsulation: super::constants::CDR_LE,
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.encapsulation = super::constants::CDR_LE;
        self.data.clear();
    }

    /// Wire form: 2-byte big-endian identifier, 2 option bytes, data,
    /// zero padding to 4 bytes. The padding count goes in the two low bits
    /// of the options.
    pub fn to_wire(&self) -> Vec<u8> {
        let pad = (4 - self.data.len() % 4) % 4;
        let mut out = Vec::with_capacity(4 + self.data.len() + pad);
        out.extend_from_slice(&self.encapsulation.to_be_bytes());
        out.extend_from_slice(&(pad as u16).to_be_bytes());
        out.extend_from_slice(&self.data);
        out.resize(out.len() + pad, 0);
        out
    }

    pub fn from_wire(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < 4 {
            return Err(CodecError::Truncated {
                offset: 0,
                needed: 4,
            });
        }
        let options = u16::from_be_bytes([bytes[2], bytes[3]]);
        let body = &bytes[4..];
        let pad = (options & 0x3) as usize;
        let end = body.len().saturating_sub(pad);
        Ok(Self {
            encapsulation: u16::from_be_bytes([bytes[0], bytes[1]]),
            data: body[..end].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::cdr::Endianness;

    #[test]
    fn test_sequence_number_split() {
        let sn = SequenceNumber::from_parts(1, 5);
        assert_eq!(sn.value(), (1i64 << 32) + 5);
        assert_eq!(sn.high(), 1);
        assert_eq!(sn.low(), 5);
        assert_eq!(SequenceNumber::UNKNOWN.high(), -1);
        assert_eq!(SequenceNumber::UNKNOWN.low(), 0);
    }

    #[test]
    fn test_sequence_number_set_window() {
        let mut set = SequenceNumberSet::new(SequenceNumber(10));
        assert!(set.add(SequenceNumber(10)));
        assert!(set.add(SequenceNumber(265)));
        assert!(!set.add(SequenceNumber(266)));
        assert!(!set.add(SequenceNumber(9)));
    }

    #[test]
    fn test_sequence_number_set_bitmap_layout() {
        let mut set = SequenceNumberSet::new(SequenceNumber(1));
        set.add(SequenceNumber(1));
        set.add(SequenceNumber(3));
        let mut w = CdrWriter::new(Endianness::Little);
        set.encode(&mut w);
        let bytes = w.into_inner();
        // base(8) + numBits(4) + one word
        assert_eq!(bytes.len(), 16);
        assert_eq!(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 3);
        let word = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        assert_eq!(word, 0b101 << 29);

        let mut r = CdrReader::new(&bytes, Endianness::Little);
        let decoded = SequenceNumberSet::decode(&mut r).expect("Set decode should succeed");
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_time_std_conversion() {
        let t = Time::from_millis(1500);
        assert_eq!(t.seconds, 1);
        let back = t.to_std().expect("Finite time converts");
        assert!(back >= Duration::from_millis(1499) && back <= Duration::from_millis(1500));
        assert_eq!(Time::INFINITE.to_std(), None);
    }

    #[test]
    fn test_status_info_mapping() {
        for kind in [
            ChangeKind::Alive,
            ChangeKind::NotAliveDisposed,
            ChangeKind::NotAliveUnregistered,
            ChangeKind::NotAliveDisposedUnregistered,
        ] {
            let v = kind.to_status_info();
            assert_eq!(ChangeKind::from_status_info(v).expect("Known status"), kind);
        }
        assert_eq!(
            ChangeKind::from_status_info(7),
            Err(CodecError::UnknownStatus(7))
        );
    }

    #[test]
    fn test_payload_wire_form() {
        let payload = SerializedPayload::new(0x0001, vec![9, 8, 7]);
        let wire = payload.to_wire();
        assert_eq!(wire, vec![0x00, 0x01, 0, 1, 9, 8, 7, 0]);
        assert_eq!(
            SerializedPayload::from_wire(&wire).expect("Payload decode should succeed"),
            payload
        );
    }
}
