// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant and endpoint discovery.
//!
//! - [`Pdp`] announces the local participant over SPDP, tracks remote
//!   participants and expires them when their lease runs out.
//! - [`Edp`] learns the endpoints of those participants, either from the
//!   SEDP builtin topics ([`SimpleEdp`]) or from a pre-shared XML table
//!   ([`StaticEdp`]), and pairs them with local writers and readers.
//!
//! Proxy data is owned by the PDP participant list and referenced by GUID.

pub mod edp;
mod pdp;
mod proxy_data;

pub use edp::{Edp, SimpleEdp, StaticEdp, StaticEndpoint, StaticEndpointTable, StaticProperty};
pub use pdp::Pdp;
pub use proxy_data::{ParticipantProxyData, ReaderProxyData, WriterProxyData};

use crate::qos::ResourceLimitsQosPolicy;

/// Limits of builtin reader histories: bounded sample count, any number of
/// instances.
pub(crate) fn builtin_reader_limits() -> ResourceLimitsQosPolicy {
    ResourceLimitsQosPolicy {
        max_samples: 5000,
        max_instances: 0,
        max_samples_per_instance: 0,
        allocated_samples: 100,
    }
}
