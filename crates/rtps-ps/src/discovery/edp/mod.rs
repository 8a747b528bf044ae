// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint discovery.
//!
//! Both variants feed the same proxy data tables in the PDP and use the
//! same pairing rules; they differ only in how remote endpoint data
//! arrives:
//!
//! - [`SimpleEdp`]: SEDP publication and subscription builtin topics.
//! - [`StaticEdp`]: a pre-shared XML table, activated by property list
//!   entries carried in SPDP announcements.

mod simple;
mod static_edp;

pub use simple::SimpleEdp;
pub use static_edp::{
    check_entity_id, EndpointStatus, StaticEdp, StaticEndpoint, StaticEndpointTable,
    StaticParticipant, StaticProperty,
};

use super::pdp::Pdp;
use super::proxy_data::{ParticipantProxyData, ReaderProxyData, WriterProxyData};
use crate::endpoint::EndpointKind;
use crate::error::Result;
use crate::protocol::guid::GUID;
use crate::qos::ReliabilityKind;
use crate::reader::Reader;
use crate::writer::Writer;
use std::sync::Weak;

pub enum Edp {
    Simple(SimpleEdp),
    Static(StaticEdp),
}

impl Edp {
    /// Builtin endpoint bits advertised in SPDP.
    pub fn builtin_endpoint_mask(&self) -> u32 {
        match self {
            Edp::Simple(edp) => edp.builtin_endpoint_mask(),
            Edp::Static(_) => 0,
        }
    }

    pub(crate) fn set_listeners(&self, pdp: &Weak<Pdp>) {
        if let Edp::Simple(edp) = self {
            edp.set_listeners(pdp);
        }
    }

    pub(crate) fn new_local_writer(&self, pdp: &Pdp, data: &WriterProxyData) -> Result<()> {
        match self {
            Edp::Simple(edp) => edp.publish_writer(data)?,
            Edp::Static(edp) => edp.local_endpoint_alive(
                pdp,
                EndpointKind::Writer,
                data.user_defined_id,
                data.guid.entity_id,
            )?,
        }
        pair_local_writer(pdp, data);
        Ok(())
    }

    pub(crate) fn new_local_reader(&self, pdp: &Pdp, data: &ReaderProxyData) -> Result<()> {
        match self {
            Edp::Simple(edp) => edp.publish_reader(data)?,
            Edp::Static(edp) => edp.local_endpoint_alive(
                pdp,
                EndpointKind::Reader,
                data.user_defined_id,
                data.guid.entity_id,
            )?,
        }
        pair_local_reader(pdp, data);
        Ok(())
    }

    /// QoS of a local writer changed: republish and re-evaluate its matches.
    pub(crate) fn update_local_writer(&self, pdp: &Pdp, data: &WriterProxyData) -> Result<()> {
        if let Edp::Simple(edp) = self {
            edp.publish_writer(data)?;
        }
        pair_local_writer(pdp, data);
        Ok(())
    }

    pub(crate) fn update_local_reader(&self, pdp: &Pdp, data: &ReaderProxyData) -> Result<()> {
        if let Edp::Simple(edp) = self {
            edp.publish_reader(data)?;
        }
        pair_local_reader(pdp, data);
        Ok(())
    }

    pub(crate) fn remove_local_writer(&self, pdp: &Pdp, data: &WriterProxyData) {
        let result = match self {
            Edp::Simple(edp) => edp.dispose_writer(data),
            Edp::Static(edp) => edp.local_endpoint_ended(
                pdp,
                EndpointKind::Writer,
                data.user_defined_id,
                data.guid.entity_id,
            ),
        };
        if let Err(e) = result {
            log::warn!("[EDP] announcing removal of writer {} failed: {}", data.guid, e);
        }
    }

    pub(crate) fn remove_local_reader(&self, pdp: &Pdp, data: &ReaderProxyData) {
        let result = match self {
            Edp::Simple(edp) => edp.dispose_reader(data),
            Edp::Static(edp) => edp.local_endpoint_ended(
                pdp,
                EndpointKind::Reader,
                data.user_defined_id,
                data.guid.entity_id,
            ),
        };
        if let Err(e) = result {
            log::warn!("[EDP] announcing removal of reader {} failed: {}", data.guid, e);
        }
    }

    /// A remote participant was discovered or changed.
    pub(crate) fn assign_remote_endpoints(&self, pdp: &Pdp, pdata: &ParticipantProxyData) {
        match self {
            Edp::Simple(edp) => edp.assign_builtin(pdata),
            Edp::Static(edp) => edp.assign_remote(pdp, pdata),
        }
    }

    /// A remote participant is gone. Static EDP keeps no per-participant
    /// builtin state; its proxies are purged by PDP.
    pub(crate) fn remove_remote_endpoints(&self, pdata: &ParticipantProxyData) {
        if let Edp::Simple(edp) = self {
            edp.remove_builtin(pdata);
        }
    }

    pub fn unpair_reader_proxy(&self, pdp: &Pdp, reader: &GUID) {
        unpair_reader_proxy(pdp, reader);
    }

    pub fn unpair_writer_proxy(&self, pdp: &Pdp, writer: &GUID) {
        unpair_writer_proxy(pdp, writer);
    }
}

impl std::fmt::Debug for Edp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edp::Simple(_) => f.write_str("Edp::Simple"),
            Edp::Static(_) => f.write_str("Edp::Static"),
        }
    }
}

/// Whether `writer` and `reader` can communicate.
///
/// Topic name, type name and topic kind must be equal. A reliable reader
/// needs a reliable writer, and the writer must offer at least the
/// durability the reader requests.
pub fn valid_matching(writer: &WriterProxyData, reader: &ReaderProxyData) -> bool {
    if writer.topic_name != reader.topic_name {
        return false;
    }
    if writer.type_name != reader.type_name {
        log::debug!(
            "[EDP] {} / {}: type mismatch on '{}' ({} vs {})",
            writer.guid,
            reader.guid,
            writer.topic_name,
            writer.type_name,
            reader.type_name
        );
        return false;
    }
    if writer.topic_kind != reader.topic_kind {
        log::debug!(
            "[EDP] {} / {}: topic kind mismatch on '{}'",
            writer.guid,
            reader.guid,
            writer.topic_name
        );
        return false;
    }
    if reader.qos.reliability.kind == ReliabilityKind::Reliable
        && writer.qos.reliability.kind == ReliabilityKind::BestEffort
    {
        log::debug!(
            "[EDP] {} / {}: reliable reader, best-effort writer on '{}'",
            writer.guid,
            reader.guid,
            writer.topic_name
        );
        return false;
    }
    if reader.qos.durability.kind > writer.qos.durability.kind {
        log::debug!(
            "[EDP] {} / {}: writer durability {:?} below requested {:?}",
            writer.guid,
            reader.guid,
            writer.qos.durability.kind,
            reader.qos.durability.kind
        );
        return false;
    }
    true
}

/// Match a local writer against every known remote reader.
pub(crate) fn pair_local_writer(pdp: &Pdp, data: &WriterProxyData) {
    let Some(participant) = pdp.participant() else {
        return;
    };
    let Some(writer) = participant.lookup_writer(&data.guid) else {
        return;
    };
    for remote in pdp.remote_readers() {
        let compatible = valid_matching(data, &remote);
        match_remote_reader(&writer, data.guid, &remote, compatible);
    }
}

/// Match a local reader against every known remote writer.
pub(crate) fn pair_local_reader(pdp: &Pdp, data: &ReaderProxyData) {
    let Some(participant) = pdp.participant() else {
        return;
    };
    let Some(reader) = participant.lookup_reader(&data.guid) else {
        return;
    };
    for remote in pdp.remote_writers() {
        let compatible = valid_matching(&remote, data);
        match_remote_writer(&reader, data.guid, &remote, compatible);
    }
}

/// Match a remote reader against every local writer.
pub(crate) fn pair_remote_reader(pdp: &Pdp, remote: &ReaderProxyData) {
    let Some(participant) = pdp.participant() else {
        return;
    };
    for local in pdp.local_writers() {
        let Some(writer) = participant.lookup_writer(&local.guid) else {
            continue;
        };
        let compatible = valid_matching(&local, remote);
        match_remote_reader(&writer, local.guid, remote, compatible);
    }
}

/// Match a remote writer against every local reader.
pub(crate) fn pair_remote_writer(pdp: &Pdp, remote: &WriterProxyData) {
    let Some(participant) = pdp.participant() else {
        return;
    };
    for local in pdp.local_readers() {
        let Some(reader) = participant.lookup_reader(&local.guid) else {
            continue;
        };
        let compatible = valid_matching(remote, &local);
        match_remote_writer(&reader, local.guid, remote, compatible);
    }
}

/// Add, refresh or drop `remote` on a local writer. A matched reader whose
/// announcement changed keeps its proxy and gets the new attributes.
fn match_remote_reader(writer: &Writer, local: GUID, remote: &ReaderProxyData, compatible: bool) {
    if !(remote.is_alive && compatible) {
        if writer.matched_reader_remove(&remote.guid) {
            log::info!("[EDP] unmatched local writer {} from reader {}", local, remote.guid);
        }
        return;
    }
    let attributes = remote.to_remote_reader_attributes();
    if writer.matched_reader_is_matched(&remote.guid) {
        if writer.matched_reader_update(attributes) {
            log::info!("[EDP] updated reader {} on local writer {}", remote.guid, local);
        }
    } else if writer.matched_reader_add(attributes) {
        log::info!("[EDP] matched local writer {} with reader {}", local, remote.guid);
    }
}

/// Add, refresh or drop `remote` on a local reader.
fn match_remote_writer(reader: &Reader, local: GUID, remote: &WriterProxyData, compatible: bool) {
    if !(remote.is_alive && compatible) {
        if reader.matched_writer_remove(&remote.guid) {
            log::info!("[EDP] unmatched local reader {} from writer {}", local, remote.guid);
        }
        return;
    }
    let attributes = remote.to_remote_writer_attributes();
    if reader.matched_writer_is_matched(&remote.guid) {
        if reader.matched_writer_update(attributes) {
            log::info!("[EDP] updated writer {} on local reader {}", remote.guid, local);
        }
    } else if reader.matched_writer_add(attributes) {
        log::info!("[EDP] matched local reader {} with writer {}", local, remote.guid);
    }
}

/// Remove a remote reader from every local user writer.
pub(crate) fn unpair_reader_proxy(pdp: &Pdp, reader: &GUID) {
    let Some(participant) = pdp.participant() else {
        return;
    };
    for writer in participant.user_writers() {
        if writer.matched_reader_remove(reader) {
            log::debug!("[EDP] unpaired reader {} from writer {}", reader, writer.guid());
        }
    }
}

/// Remove a remote writer from every local user reader.
pub(crate) fn unpair_writer_proxy(pdp: &Pdp, writer: &GUID) {
    let Some(participant) = pdp.participant() else {
        return;
    };
    for reader in participant.user_readers() {
        if reader.matched_writer_remove(writer) {
            log::debug!("[EDP] unpaired writer {} from reader {}", writer, reader.guid());
        }
    }
}
