// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Errors fall into four families:
//!
//! | Family | Variants | Handling |
//! |--------|----------|----------|
//! | Configuration | `InvalidAttributes`, `InvalidLocatorList`, `DuplicateEntityId`, `InvalidQos`, `Type*` | returned synchronously by the creating call |
//! | Resource | `ResourceExhausted`, `PayloadTooLarge`, `HistoryFull` | operation fails locally, reserved caches are released |
//! | Protocol | `ProtocolViolation`, `Codec` | logged by receive paths, the message is dropped |
//! | I/O | `Io`, `Serialization` | terminal failure for that message only |
//!
//! Lease expiry is not an error: it is a normal participant removal.

use crate::protocol::CodecError;

/// Errors produced by the middleware.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Attribute struct is inconsistent or incomplete.
    InvalidAttributes(String),
    /// A unicast or multicast locator list contains an invalid locator.
    InvalidLocatorList(String),
    /// Entity id already used by another endpoint of the participant.
    DuplicateEntityId(String),
    /// QoS combination is not supported or cannot be updated.
    InvalidQos(String),
    /// A type with this name is already registered.
    TypeAlreadyRegistered(String),
    /// No registered type with this name.
    TypeNotRegistered(String),
    /// Operation not allowed in the current state.
    InvalidState(String),
    /// Referenced entity does not exist.
    NotFound(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Change pool or resource limits saturated.
    ResourceExhausted(String),
    /// Serialized payload larger than the configured maximum.
    PayloadTooLarge { size: usize, max: usize },
    /// History cannot accept more changes under its policy.
    HistoryFull,

    // ========================================================================
    // Protocol / Data Errors
    // ========================================================================
    /// Incoming data breaks a protocol rule.
    ProtocolViolation(String),
    /// Wire encoding or decoding failed.
    Codec(CodecError),
    /// Type support failed to serialize or deserialize a sample.
    Serialization(String),
    /// Static endpoint description is unreadable or inconsistent.
    StaticDiscovery(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error with underlying cause.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidAttributes(msg) => write!(f, "Invalid attributes: {}", msg),
            Error::InvalidLocatorList(msg) => write!(f, "Invalid locator list: {}", msg),
            Error::DuplicateEntityId(id) => write!(f, "Duplicate entity id: {}", id),
            Error::InvalidQos(msg) => write!(f, "Invalid QoS: {}", msg),
            Error::TypeAlreadyRegistered(name) => write!(f, "Type already registered: {}", name),
            Error::TypeNotRegistered(name) => write!(f, "Type not registered: {}", name),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::NotFound(what) => write!(f, "Not found: {}", what),
            Error::ResourceExhausted(msg) => write!(f, "Resource exhausted: {}", msg),
            Error::PayloadTooLarge { size, max } => {
                write!(f, "Payload too large: {} bytes (max {})", size, max)
            }
            Error::HistoryFull => write!(f, "History full"),
            Error::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            Error::Codec(e) => write!(f, "Codec error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
            Error::StaticDiscovery(msg) => write!(f, "Static discovery: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PayloadTooLarge { size: 70, max: 64 };
        assert_eq!(err.to_string(), "Payload too large: 70 bytes (max 64)");
        assert_eq!(Error::HistoryFull.to_string(), "History full");
    }

    #[test]
    fn test_error_from_codec() {
        let err: Error = CodecError::InvalidHeader.into();
        assert!(matches!(err, Error::Codec(CodecError::InvalidHeader)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
