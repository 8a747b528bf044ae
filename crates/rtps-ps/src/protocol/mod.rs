// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS wire primitives.
//!
//! Fixed-layout encode/decode for identities (GUID, entity ids), sequence
//! numbers, timestamps, locators, parameter lists and whole RTPS messages.
//! Everything here must interoperate bit-exactly with other RTPS stacks.

pub mod cdr;
pub mod constants;
pub mod guid;
pub mod locator;
pub mod message;
pub mod parameter;
pub mod types;

use std::fmt;

/// Wire codec failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ended before the value was complete.
    Truncated { offset: usize, needed: usize },
    /// Message header is missing or does not start with `RTPS`.
    InvalidHeader,
    /// Unknown encapsulation identifier.
    InvalidEncapsulation(u16),
    /// Parameter value malformed for its id.
    InvalidParameter { pid: u16, reason: &'static str },
    /// Parameter list not terminated by a sentinel.
    MissingSentinel,
    /// Status info value outside the four change kinds.
    UnknownStatus(u8),
    /// Submessage body inconsistent with its header.
    InvalidSubmessage { id: u8, reason: &'static str },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Truncated { offset, needed } => {
                write!(f, "truncated at offset {} ({} bytes needed)", offset, needed)
            }
            CodecError::InvalidHeader => write!(f, "invalid RTPS header"),
            CodecError::InvalidEncapsulation(kind) => {
                write!(f, "invalid encapsulation 0x{:04x}", kind)
            }
            CodecError::InvalidParameter { pid, reason } => {
                write!(f, "invalid parameter 0x{:04x}: {}", pid, reason)
            }
            CodecError::MissingSentinel => write!(f, "parameter list without sentinel"),
            CodecError::UnknownStatus(v) => write!(f, "unknown status info {}", v),
            CodecError::InvalidSubmessage { id, reason } => {
                write!(f, "invalid submessage 0x{:02x}: {}", id, reason)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Result alias for codec operations.
pub type CodecResult<T> = core::result::Result<T, CodecError>;
