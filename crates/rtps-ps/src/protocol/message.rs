// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS message codec: header plus the submessages the engine exchanges.
//!
//! Encoding is always little-endian. Decoding honours the endianness flag
//! of every submessage and skips submessage ids it does not know.

use super::cdr::{CdrReader, CdrWriter, Endianness};
use super::constants::*;
use super::guid::{EntityId, GuidPrefix};
use super::parameter::ParameterList;
use super::types::{
    Count, ProtocolVersion, SequenceNumber, SequenceNumberSet, SerializedPayload, Time, VendorId,
};
use super::{CodecError, CodecResult};

/// 20-byte message header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: ProtocolVersion,
    pub vendor_id: VendorId,
    pub guid_prefix: GuidPrefix,
}

impl Header {
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self {
            version: ProtocolVersion::V2_1,
            vendor_id: VendorId::LOCAL,
            guid_prefix,
        }
    }

    fn encode(&self, w: &mut CdrWriter) {
        w.write_bytes(RTPS_MAGIC);
        w.write_u8(self.version.major);
        w.write_u8(self.version.minor);
        w.write_bytes(&self.vendor_id.0);
        w.write_bytes(&self.guid_prefix.0);
    }

    fn decode(r: &mut CdrReader<'_>) -> CodecResult<Self> {
        let magic = r.read_array::<4>().map_err(|_| CodecError::InvalidHeader)?;
        if &magic != RTPS_MAGIC {
            return Err(CodecError::InvalidHeader);
        }
        let major = r.read_u8()?;
        let minor = r.read_u8()?;
        let vendor_id = VendorId(r.read_array::<2>()?);
        let guid_prefix = GuidPrefix::decode(r)?;
        Ok(Self {
            version: ProtocolVersion { major, minor },
            vendor_id,
            guid_prefix,
        })
    }
}

/// DATA submessage.
#[derive(Clone, Debug, PartialEq)]
pub struct Data {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub writer_sn: SequenceNumber,
    pub inline_qos: Option<ParameterList>,
    pub payload: Option<SerializedPayload>,
    /// Payload holds the serialized key rather than the sample.
    pub key_flag: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub first_sn: SequenceNumber,
    pub last_sn: SequenceNumber,
    pub count: Count,
    pub final_flag: bool,
    pub liveliness_flag: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AckNack {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub reader_sn_state: SequenceNumberSet,
    pub count: Count,
    pub final_flag: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gap {
    pub reader_id: EntityId,
    pub writer_id: EntityId,
    pub gap_start: SequenceNumber,
    pub gap_list: SequenceNumberSet,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Submessage {
    /// `None` encodes the invalidate flag.
    InfoTimestamp(Option<Time>),
    InfoDestination(GuidPrefix),
    InfoSource(GuidPrefix),
    Data(Data),
    Heartbeat(Heartbeat),
    AckNack(AckNack),
    Gap(Gap),
}

impl Submessage {
    fn id(&self) -> u8 {
        match self {
            Submessage::InfoTimestamp(_) => SUBMSG_INFO_TS,
            Submessage::InfoDestination(_) => SUBMSG_INFO_DST,
            Submessage::InfoSource(_) => SUBMSG_INFO_SRC,
            Submessage::Data(_) => SUBMSG_DATA,
            Submessage::Heartbeat(_) => SUBMSG_HEARTBEAT,
            Submessage::AckNack(_) => SUBMSG_ACKNACK,
            Submessage::Gap(_) => SUBMSG_GAP,
        }
    }

    /// Encode the body, returning the flags (endianness bit excluded).
    fn encode_body(&self, w: &mut CdrWriter) -> u8 {
        match self {
            Submessage::InfoTimestamp(Some(t)) => {
                t.encode(w);
                0
            }
            Submessage::InfoTimestamp(None) => FLAG_INVALIDATE,
            Submessage::InfoDestination(prefix) => {
                w.write_bytes(&prefix.0);
                0
            }
            Submessage::InfoSource(prefix) => {
                w.write_u32(0);
                w.write_u8(ProtocolVersion::V2_1.major);
                w.write_u8(ProtocolVersion::V2_1.minor);
                w.write_bytes(&VendorId::LOCAL.0);
                w.write_bytes(&prefix.0);
                0
            }
            Submessage::Data(d) => {
                let mut flags = 0;
                w.write_u16(0);
                w.write_u16(DATA_OCTETS_TO_INLINE_QOS);
                w.write_bytes(&d.reader_id.0);
                w.write_bytes(&d.writer_id.0);
                d.writer_sn.encode(w);
                if let Some(qos) = &d.inline_qos {
                    flags |= FLAG_INLINE_QOS;
                    qos.encode_into(w);
                }
                if let Some(payload) = &d.payload {
                    flags |= if d.key_flag { FLAG_KEY } else { FLAG_DATA };
                    w.write_bytes(&payload.to_wire());
                }
                flags
            }
            Submessage::Heartbeat(hb) => {
                w.write_bytes(&hb.reader_id.0);
                w.write_bytes(&hb.writer_id.0);
                hb.first_sn.encode(w);
                hb.last_sn.encode(w);
                w.write_i32(hb.count);
                let mut flags = 0;
                if hb.final_flag {
                    flags |= FLAG_FINAL;
                }
                if hb.liveliness_flag {
                    flags |= FLAG_LIVELINESS;
                }
                flags
            }
            Submessage::AckNack(an) => {
                w.write_bytes(&an.reader_id.0);
                w.write_bytes(&an.writer_id.0);
                an.reader_sn_state.encode(w);
                w.write_i32(an.count);
                if an.final_flag {
                    FLAG_FINAL
                } else {
                    0
                }
            }
            Submessage::Gap(gap) => {
                w.write_bytes(&gap.reader_id.0);
                w.write_bytes(&gap.writer_id.0);
                gap.gap_start.encode(w);
                gap.gap_list.encode(w);
                0
            }
        }
    }

    fn decode_body(id: u8, flags: u8, r: &mut CdrReader<'_>) -> CodecResult<Option<Self>> {
        let sub = match id {
            SUBMSG_INFO_TS => {
                if flags & FLAG_INVALIDATE != 0 {
                    Submessage::InfoTimestamp(None)
                } else {
                    Submessage::InfoTimestamp(Some(Time::decode(r)?))
                }
            }
            SUBMSG_INFO_DST => Submessage::InfoDestination(GuidPrefix::decode(r)?),
            SUBMSG_INFO_SRC => {
                r.skip(8)?;
                Submessage::InfoSource(GuidPrefix::decode(r)?)
            }
            SUBMSG_DATA => Submessage::Data(decode_data(flags, r)?),
            SUBMSG_HEARTBEAT => Submessage::Heartbeat(Heartbeat {
                reader_id: EntityId::decode(r)?,
                writer_id: EntityId::decode(r)?,
                first_sn: SequenceNumber::decode(r)?,
                last_sn: SequenceNumber::decode(r)?,
                count: r.read_i32()?,
                final_flag: flags & FLAG_FINAL != 0,
                liveliness_flag: flags & FLAG_LIVELINESS != 0,
            }),
            SUBMSG_ACKNACK => Submessage::AckNack(AckNack {
                reader_id: EntityId::decode(r)?,
                writer_id: EntityId::decode(r)?,
                reader_sn_state: SequenceNumberSet::decode(r)?,
                count: r.read_i32()?,
                final_flag: flags & FLAG_FINAL != 0,
            }),
            SUBMSG_GAP => Submessage::Gap(Gap {
                reader_id: EntityId::decode(r)?,
                writer_id: EntityId::decode(r)?,
                gap_start: SequenceNumber::decode(r)?,
                gap_list: SequenceNumberSet::decode(r)?,
            }),
            _ => return Ok(None),
        };
        Ok(Some(sub))
    }
}

fn decode_data(flags: u8, r: &mut CdrReader<'_>) -> CodecResult<Data> {
    let _extra_flags = r.read_u16()?;
    let octets_to_inline_qos = r.read_u16()? as usize;
    let after_field = r.offset();
    let reader_id = EntityId::decode(r)?;
    let writer_id = EntityId::decode(r)?;
    let writer_sn = SequenceNumber::decode(r)?;

    let consumed = r.offset() - after_field;
    if octets_to_inline_qos < consumed {
        return Err(CodecError::InvalidSubmessage {
            id: SUBMSG_DATA,
            reason: "octetsToInlineQos shorter than fixed fields",
        });
    }
    r.skip(octets_to_inline_qos - consumed)?;

    let inline_qos = if flags & FLAG_INLINE_QOS != 0 {
        r.set_origin_here();
        Some(ParameterList::decode_from(r)?)
    } else {
        None
    };

    let key_flag = flags & FLAG_KEY != 0;
    let payload = if flags & (FLAG_DATA | FLAG_KEY) != 0 {
        Some(SerializedPayload::from_wire(r.rest())?)
    } else {
        None
    };

    Ok(Data {
        reader_id,
        writer_id,
        writer_sn,
        inline_qos,
        payload,
        key_flag,
    })
}

/// A complete RTPS message.
#[derive(Clone, Debug, PartialEq)]
pub struct RtpsMessage {
    pub header: Header,
    pub submessages: Vec<Submessage>,
}

impl RtpsMessage {
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self {
            header: Header::new(guid_prefix),
            submessages: Vec::new(),
        }
    }

    pub fn push(&mut self, sub: Submessage) -> &mut Self {
        self.submessages.push(sub);
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = CdrWriter::with_capacity(Endianness::Little, 256);
        self.header.encode(&mut w);
        for sub in &self.submessages {
            let mut body = CdrWriter::new(Endianness::Little);
            let flags = sub.encode_body(&mut body) | FLAG_ENDIANNESS;
            body.align(4);
            w.write_u8(sub.id());
            w.write_u8(flags);
            w.write_u16(body.len() as u16);
            w.write_bytes(body.as_slice());
        }
        w.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = CdrReader::new(bytes, Endianness::Big);
        let header = Header::decode(&mut r)?;
        let mut submessages = Vec::new();

        while r.remaining() >= SUBMESSAGE_HEADER_SIZE {
            let id = r.read_u8()?;
            let flags = r.read_u8()?;
            r.set_endianness(Endianness::from_flags(flags));
            let declared = r.read_u16()? as usize;
            // Zero length means "until the end of the message" except for
            // submessages that legitimately have an empty body.
            let len = if declared == 0 && !matches!(id, SUBMSG_PAD | SUBMSG_INFO_TS) {
                r.remaining()
            } else {
                declared
            };
            if len > r.remaining() {
                return Err(CodecError::InvalidSubmessage {
                    id,
                    reason: "octetsToNextHeader exceeds message",
                });
            }
            let mut body = r.sub_reader(len)?;
            match Submessage::decode_body(id, flags, &mut body)? {
                Some(sub) => submessages.push(sub),
                None => log::trace!("[RtpsMessage::decode] skipping submessage 0x{:02x}", id),
            }
        }

        Ok(Self {
            header,
            submessages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parameter::Parameter;
    use crate::protocol::types::ChangeKind;

    fn prefix() -> GuidPrefix {
        GuidPrefix([0xab; 12])
    }

    #[test]
    fn test_header_layout() {
        let bytes = RtpsMessage::new(prefix()).encode();
        assert_eq!(bytes.len(), RTPS_HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"RTPS");
        assert_eq!(&bytes[4..6], &[2, 1]);
        assert_eq!(&bytes[6..8], &[0x01, 0x0f]);
    }

    #[test]
    fn test_reject_bad_magic() {
        let mut bytes = RtpsMessage::new(prefix()).encode();
        bytes[0] = b'X';
        assert_eq!(RtpsMessage::decode(&bytes), Err(CodecError::InvalidHeader));
    }

    #[test]
    fn test_data_with_inline_qos() {
        let qos: ParameterList = vec![Parameter::StatusInfo(ChangeKind::NotAliveDisposed)]
            .into_iter()
            .collect();
        let mut msg = RtpsMessage::new(prefix());
        msg.push(Submessage::InfoTimestamp(Some(Time::from_secs(3))))
            .push(Submessage::Data(Data {
                reader_id: EntityId::UNKNOWN,
                writer_id: EntityId::SPDP_WRITER,
                writer_sn: SequenceNumber(7),
                inline_qos: Some(qos),
                payload: Some(SerializedPayload::new(CDR_LE, vec![1, 2, 3, 4, 5])),
                key_flag: false,
            }));
        let bytes = msg.encode();
        let decoded = RtpsMessage::decode(&bytes).expect("Decode should succeed");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_heartbeat_and_acknack() {
        let mut set = SequenceNumberSet::new(SequenceNumber(4));
        set.add(SequenceNumber(4));
        set.add(SequenceNumber(6));
        let mut msg = RtpsMessage::new(prefix());
        msg.push(Submessage::InfoDestination(GuidPrefix([1; 12])))
            .push(Submessage::Heartbeat(Heartbeat {
                reader_id: EntityId::UNKNOWN,
                writer_id: EntityId::SEDP_PUBLICATIONS_WRITER,
                first_sn: SequenceNumber(1),
                last_sn: SequenceNumber(9),
                count: 3,
                final_flag: true,
                liveliness_flag: false,
            }))
            .push(Submessage::AckNack(AckNack {
                reader_id: EntityId::SEDP_PUBLICATIONS_READER,
                writer_id: EntityId::SEDP_PUBLICATIONS_WRITER,
                reader_sn_state: set,
                count: 2,
                final_flag: false,
            }));
        let decoded = RtpsMessage::decode(&msg.encode()).expect("Decode should succeed");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_big_endian_heartbeat_decodes() {
        let mut bytes = RtpsMessage::new(prefix()).encode();
        bytes.extend_from_slice(&[SUBMSG_HEARTBEAT, FLAG_FINAL, 0, 28]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&EntityId::SPDP_WRITER.0);
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 5]);
        bytes.extend_from_slice(&[0, 0, 0, 2]);
        let decoded = RtpsMessage::decode(&bytes).expect("Decode should succeed");
        match &decoded.submessages[0] {
            Submessage::Heartbeat(hb) => {
                assert_eq!(hb.last_sn, SequenceNumber(5));
                assert_eq!(hb.count, 2);
                assert!(hb.final_flag);
            }
            other => panic!("unexpected submessage {:?}", other),
        }
    }

    #[test]
    fn test_unknown_submessage_skipped() {
        let mut bytes = RtpsMessage::new(prefix()).encode();
        bytes.extend_from_slice(&[0x80, FLAG_ENDIANNESS, 4, 0, 9, 9, 9, 9]);
        bytes.extend_from_slice(&[SUBMSG_INFO_DST, FLAG_ENDIANNESS, 12, 0]);
        bytes.extend_from_slice(&[5; 12]);
        let decoded = RtpsMessage::decode(&bytes).expect("Decode should succeed");
        assert_eq!(
            decoded.submessages,
            vec![Submessage::InfoDestination(GuidPrefix([5; 12]))]
        );
    }
}
