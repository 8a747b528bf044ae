// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endianness-aware read/write cursors for CDR encoded buffers.
//!
//! RTPS lets each submessage and each parameter list pick its own byte
//! order, so both cursors carry an [`Endianness`] chosen at construction.
//! Alignment is computed relative to an origin offset (the start of the
//! submessage body or of the serialized payload).

use super::constants::{CDR_BE, CDR_LE, PL_CDR_BE, PL_CDR_LE};
use super::{CodecError, CodecResult};

/// Byte order of an encoded region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Byte order announced by bit 0 of a submessage flags byte.
    pub fn from_flags(flags: u8) -> Self {
        if flags & 0x01 != 0 {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    /// Value of the endianness flag bit for this byte order.
    pub fn flag(self) -> u8 {
        match self {
            Endianness::Little => 0x01,
            Endianness::Big => 0x00,
        }
    }

    /// Byte order implied by a CDR or PL_CDR encapsulation identifier.
    pub fn from_encapsulation(kind: u16) -> CodecResult<Self> {
        match kind {
            CDR_LE | PL_CDR_LE => Ok(Endianness::Little),
            CDR_BE | PL_CDR_BE => Ok(Endianness::Big),
            other => Err(CodecError::InvalidEncapsulation(other)),
        }
    }

    /// PL_CDR encapsulation identifier for this byte order.
    pub fn parameter_list_encapsulation(self) -> u16 {
        match self {
            Endianness::Little => PL_CDR_LE,
            Endianness::Big => PL_CDR_BE,
        }
    }
}

macro_rules! impl_write {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            match self.endianness {
                Endianness::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
                Endianness::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
            }
        }
    };
}

macro_rules! impl_read {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> CodecResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(match self.endianness {
                Endianness::Little => <$type>::from_le_bytes(bytes),
                Endianness::Big => <$type>::from_be_bytes(bytes),
            })
        }
    };
}

/// Growable writer.
#[derive(Debug, Clone)]
pub struct CdrWriter {
    buf: Vec<u8>,
    endianness: Endianness,
    origin: usize,
}

impl CdrWriter {
    pub fn new(endianness: Endianness) -> Self {
        Self::with_capacity(endianness, 64)
    }

    pub fn with_capacity(endianness: Endianness, capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            endianness,
            origin: 0,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Make subsequent alignment relative to the current position.
    pub fn set_origin_here(&mut self) {
        self.origin = self.buf.len();
    }

    impl_write!(write_u16, u16);
    impl_write!(write_i16, i16);
    impl_write!(write_u32, u32);
    impl_write!(write_i32, i32);

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write a CDR string: length (including NUL), bytes, NUL.
    pub fn write_string(&mut self, value: &str) {
        self.write_u32((value.len() + 1) as u32);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    /// Pad with zeros up to `alignment` relative to the origin.
    pub fn align(&mut self, alignment: usize) {
        if alignment <= 1 {
            return;
        }
        let rel = self.buf.len() - self.origin;
        let pad = (alignment - rel % alignment) % alignment;
        self.buf.resize(self.buf.len() + pad, 0);
    }

    /// Overwrite a previously written u16 (length back-patching).
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        let bytes = match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        if offset + 2 <= self.buf.len() {
            self.buf[offset..offset + 2].copy_from_slice(&bytes);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked reader over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct CdrReader<'a> {
    buf: &'a [u8],
    offset: usize,
    endianness: Endianness,
    origin: usize,
}

impl<'a> CdrReader<'a> {
    pub fn new(buf: &'a [u8], endianness: Endianness) -> Self {
        Self {
            buf,
            offset: 0,
            endianness,
            origin: 0,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    pub fn set_origin_here(&mut self) {
        self.origin = self.offset;
    }

    impl_read!(read_u16, u16, 2);
    impl_read!(read_i16, i16, 2);
    impl_read!(read_u32, u32, 4);
    impl_read!(read_i32, i32, 4);

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.offset + len > self.buf.len() {
            return Err(CodecError::Truncated {
                offset: self.offset,
                needed: len,
            });
        }
        let slice = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a CDR string. A missing terminating NUL is tolerated.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_u32()? as usize;
        let raw = self.read_bytes(len)?;
        let text = match raw.split_last() {
            Some((&0, body)) => body,
            _ => raw,
        };
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    pub fn skip(&mut self, len: usize) -> CodecResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn align(&mut self, alignment: usize) -> CodecResult<()> {
        if alignment <= 1 {
            return Ok(());
        }
        let rel = self.offset - self.origin;
        let pad = (alignment - rel % alignment) % alignment;
        // Trailing padding may be omitted by the sender at the end of a buffer.
        self.offset = (self.offset + pad).min(self.buf.len());
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Split off the next `len` bytes as an independent reader.
    pub fn sub_reader(&mut self, len: usize) -> CodecResult<CdrReader<'a>> {
        let slice = self.read_bytes(len)?;
        Ok(CdrReader::new(slice, self.endianness))
    }

    /// Bytes not consumed yet.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.offset.min(self.buf.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_endianness() {
        let mut le = CdrWriter::new(Endianness::Little);
        le.write_u32(0x0102_0304);
        assert_eq!(le.as_slice(), &[0x04, 0x03, 0x02, 0x01]);

        let mut be = CdrWriter::new(Endianness::Big);
        be.write_u32(0x0102_0304);
        assert_eq!(be.as_slice(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_writer_align_relative_to_origin() {
        let mut w = CdrWriter::new(Endianness::Little);
        w.write_u8(0xaa);
        w.set_origin_here();
        w.write_u8(1);
        w.align(4);
        assert_eq!(w.len(), 5);
    }

    #[test]
    fn test_reader_truncated_reports_offset() {
        let data = [1u8, 2, 3];
        let mut r = CdrReader::new(&data, Endianness::Little);
        r.read_u16().expect("Read u16 should succeed");
        let err = r.read_u32().expect_err("Read past end should fail");
        assert_eq!(err, CodecError::Truncated { offset: 2, needed: 4 });
    }

    #[test]
    fn test_string_cdr_layout() {
        let mut w = CdrWriter::new(Endianness::Big);
        w.write_string("abc");
        assert_eq!(w.as_slice(), &[0, 0, 0, 4, b'a', b'b', b'c', 0]);
        let mut r = CdrReader::new(w.as_slice(), Endianness::Big);
        assert_eq!(r.read_string().expect("Read string should succeed"), "abc");
    }

    #[test]
    fn test_encapsulation_endianness() {
        assert_eq!(
            Endianness::from_encapsulation(PL_CDR_LE).expect("PL_CDR_LE is valid"),
            Endianness::Little
        );
        assert_eq!(
            Endianness::from_encapsulation(PL_CDR_BE).expect("PL_CDR_BE is valid"),
            Endianness::Big
        );
        assert!(Endianness::from_encapsulation(0x1234).is_err());
    }
}
