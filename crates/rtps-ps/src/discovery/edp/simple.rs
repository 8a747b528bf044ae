// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simple endpoint discovery over the SEDP builtin topics.
//!
//! Each local writer is published as a [`WriterProxyData`] sample on the
//! publications topic and each local reader as a [`ReaderProxyData`]
//! sample on the subscriptions topic. The SEDP endpoints are reliable and
//! transient-local, so a participant discovered late still receives every
//! endpoint announced before. Removal is a dispose of the instance keyed
//! by the endpoint GUID.

use super::{pair_remote_reader, pair_remote_writer, unpair_reader_proxy, unpair_writer_proxy};
use crate::config::BuiltinAttributes;
use crate::discovery::builtin_reader_limits;
use crate::discovery::pdp::Pdp;
use crate::discovery::proxy_data::{ParticipantProxyData, ReaderProxyData, WriterProxyData};
use crate::endpoint::{
    EndpointAttributes, EndpointKind, ReaderAttributes, RemoteReaderAttributes,
    RemoteWriterAttributes, WriterAttributes,
};
use crate::error::{Error, Result};
use crate::history::{CacheChange, HistoryAttributes, ReaderHistory, WriterHistory};
use crate::participant::RtpsParticipant;
use crate::protocol::cdr::Endianness;
use crate::protocol::constants::{
    DISCOVERY_TOPIC_DATA_MAX_SIZE, DISC_BUILTIN_ENDPOINT_PUBLICATION_ANNOUNCER,
    DISC_BUILTIN_ENDPOINT_PUBLICATION_DETECTOR, DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_ANNOUNCER,
    DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_DETECTOR,
};
use crate::protocol::guid::{EntityId, InstanceHandle, GUID};
use crate::protocol::locator::LocatorList;
use crate::protocol::parameter::ParameterList;
use crate::protocol::types::{ChangeKind, Time, TopicKind};
use crate::qos::{
    DurabilityKind, HistoryQosPolicy, ReliabilityKind, ResourceLimitsQosPolicy,
};
use crate::reader::{Reader, ReaderListener};
use crate::writer::Writer;
use std::sync::{Arc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SedpTopic {
    Publications,
    Subscriptions,
}

pub struct SimpleEdp {
    publications_writer: Option<Writer>,
    publications_reader: Option<Reader>,
    subscriptions_writer: Option<Writer>,
    subscriptions_reader: Option<Reader>,
}

impl SimpleEdp {
    pub(crate) fn create(
        participant: &Arc<RtpsParticipant>,
        builtin: &BuiltinAttributes,
    ) -> Result<Self> {
        let mut edp = SimpleEdp {
            publications_writer: None,
            publications_reader: None,
            subscriptions_writer: None,
            subscriptions_reader: None,
        };
        if builtin.simple_edp.use_publication_writer_and_subscription_reader {
            edp.publications_writer = Some(sedp_writer(
                participant,
                EntityId::SEDP_PUBLICATIONS_WRITER,
            )?);
            edp.subscriptions_reader = Some(sedp_reader(
                participant,
                EntityId::SEDP_SUBSCRIPTIONS_READER,
            )?);
        }
        if builtin.simple_edp.use_publication_reader_and_subscription_writer {
            edp.publications_reader = Some(sedp_reader(
                participant,
                EntityId::SEDP_PUBLICATIONS_READER,
            )?);
            edp.subscriptions_writer = Some(sedp_writer(
                participant,
                EntityId::SEDP_SUBSCRIPTIONS_WRITER,
            )?);
        }
        log::debug!("[SEDP] builtin endpoints created for {}", participant.guid());
        Ok(edp)
    }

    pub fn builtin_endpoint_mask(&self) -> u32 {
        let mut mask = 0;
        if self.publications_writer.is_some() {
            mask |= DISC_BUILTIN_ENDPOINT_PUBLICATION_ANNOUNCER;
        }
        if self.publications_reader.is_some() {
            mask |= DISC_BUILTIN_ENDPOINT_PUBLICATION_DETECTOR;
        }
        if self.subscriptions_writer.is_some() {
            mask |= DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_ANNOUNCER;
        }
        if self.subscriptions_reader.is_some() {
            mask |= DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_DETECTOR;
        }
        mask
    }

    pub(crate) fn set_listeners(&self, pdp: &Weak<Pdp>) {
        if let Some(reader) = &self.publications_reader {
            reader.set_listener(Some(Arc::new(SedpListener {
                pdp: pdp.clone(),
                topic: SedpTopic::Publications,
            })));
        }
        if let Some(reader) = &self.subscriptions_reader {
            reader.set_listener(Some(Arc::new(SedpListener {
                pdp: pdp.clone(),
                topic: SedpTopic::Subscriptions,
            })));
        }
    }

    pub fn publications_writer(&self) -> Option<&Writer> {
        self.publications_writer.as_ref()
    }

    pub fn subscriptions_writer(&self) -> Option<&Writer> {
        self.subscriptions_writer.as_ref()
    }

    // ------------------------------------------------------------------
    // Local endpoints
    // ------------------------------------------------------------------

    pub(crate) fn publish_writer(&self, data: &WriterProxyData) -> Result<()> {
        match &self.publications_writer {
            Some(writer) => publish(writer, data.key(), data.to_parameter_list()),
            None => Ok(()),
        }
    }

    pub(crate) fn publish_reader(&self, data: &ReaderProxyData) -> Result<()> {
        match &self.subscriptions_writer {
            Some(writer) => publish(writer, data.key(), data.to_parameter_list()),
            None => Ok(()),
        }
    }

    pub(crate) fn dispose_writer(&self, data: &WriterProxyData) -> Result<()> {
        match &self.publications_writer {
            Some(writer) => dispose(writer, data.key()),
            None => Ok(()),
        }
    }

    pub(crate) fn dispose_reader(&self, data: &ReaderProxyData) -> Result<()> {
        match &self.subscriptions_writer {
            Some(writer) => dispose(writer, data.key()),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Remote participants
    // ------------------------------------------------------------------

    /// Match our SEDP endpoints with those `pdata` advertises.
    pub(crate) fn assign_builtin(&self, pdata: &ParticipantProxyData) {
        let mask = pdata.available_builtin_endpoints;
        let prefix = pdata.guid.prefix;
        let (unicast, multicast) = metatraffic_locators(pdata);

        let remote_reader = |entity_id| {
            RemoteReaderAttributes::new(
                GUID::new(prefix, entity_id),
                sedp_remote_endpoint(EndpointKind::Reader, &unicast, &multicast),
            )
        };
        let remote_writer = |entity_id| {
            RemoteWriterAttributes::new(
                GUID::new(prefix, entity_id),
                sedp_remote_endpoint(EndpointKind::Writer, &unicast, &multicast),
            )
        };

        if let Some(w) = &self.publications_writer {
            if mask & DISC_BUILTIN_ENDPOINT_PUBLICATION_DETECTOR != 0 {
                w.matched_reader_add(remote_reader(EntityId::SEDP_PUBLICATIONS_READER));
            }
        }
        if let Some(r) = &self.publications_reader {
            if mask & DISC_BUILTIN_ENDPOINT_PUBLICATION_ANNOUNCER != 0 {
                r.matched_writer_add(remote_writer(EntityId::SEDP_PUBLICATIONS_WRITER));
            }
        }
        if let Some(w) = &self.subscriptions_writer {
            if mask & DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_DETECTOR != 0 {
                w.matched_reader_add(remote_reader(EntityId::SEDP_SUBSCRIPTIONS_READER));
            }
        }
        if let Some(r) = &self.subscriptions_reader {
            if mask & DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_ANNOUNCER != 0 {
                r.matched_writer_add(remote_writer(EntityId::SEDP_SUBSCRIPTIONS_WRITER));
            }
        }
        log::debug!("[SEDP] assigned builtin endpoints of {}", pdata.guid);
    }

    /// Drop the SEDP matches of a removed participant and purge its samples.
    pub(crate) fn remove_builtin(&self, pdata: &ParticipantProxyData) {
        let prefix = pdata.guid.prefix;
        if let Some(w) = &self.publications_writer {
            w.matched_reader_remove(&GUID::new(prefix, EntityId::SEDP_PUBLICATIONS_READER));
        }
        if let Some(w) = &self.subscriptions_writer {
            w.matched_reader_remove(&GUID::new(prefix, EntityId::SEDP_SUBSCRIPTIONS_READER));
        }
        if let Some(r) = &self.publications_reader {
            r.forget_writer(&GUID::new(prefix, EntityId::SEDP_PUBLICATIONS_WRITER));
        }
        if let Some(r) = &self.subscriptions_reader {
            r.forget_writer(&GUID::new(prefix, EntityId::SEDP_SUBSCRIPTIONS_WRITER));
        }
    }
}

fn sedp_writer(participant: &Arc<RtpsParticipant>, entity_id: EntityId) -> Result<Writer> {
    let mut attributes = WriterAttributes::new(TopicKind::WithKey, ReliabilityKind::Reliable);
    attributes.endpoint.durability_kind = DurabilityKind::TransientLocal;
    attributes.endpoint.unicast_locator_list = participant
        .attributes()
        .builtin
        .metatraffic_unicast_locator_list
        .clone();
    attributes.times.heartbeat_period = Time::from_secs(1);
    let history = WriterHistory::new(
        HistoryAttributes::new(DISCOVERY_TOPIC_DATA_MAX_SIZE, 10, 0),
        HistoryQosPolicy::keep_last(1),
        ResourceLimitsQosPolicy {
            max_samples: 5000,
            max_instances: 5000,
            max_samples_per_instance: 1,
            allocated_samples: 100,
        },
        TopicKind::WithKey,
    );
    participant.create_writer(attributes, Arc::new(history), None, Some(entity_id), true)
}

fn sedp_reader(participant: &Arc<RtpsParticipant>, entity_id: EntityId) -> Result<Reader> {
    let mut attributes = ReaderAttributes::new(TopicKind::WithKey, ReliabilityKind::Reliable);
    attributes.endpoint.durability_kind = DurabilityKind::TransientLocal;
    attributes.endpoint.unicast_locator_list = participant
        .attributes()
        .builtin
        .metatraffic_unicast_locator_list
        .clone();
    let history = ReaderHistory::new(
        HistoryAttributes::new(DISCOVERY_TOPIC_DATA_MAX_SIZE, 10, 0),
        HistoryQosPolicy::keep_all(),
        builtin_reader_limits(),
        TopicKind::WithKey,
    );
    participant.create_reader(attributes, Arc::new(history), None, Some(entity_id), true)
}

fn sedp_remote_endpoint(
    kind: EndpointKind,
    unicast: &LocatorList,
    multicast: &LocatorList,
) -> EndpointAttributes {
    EndpointAttributes {
        endpoint_kind: kind,
        topic_kind: TopicKind::WithKey,
        reliability_kind: ReliabilityKind::Reliable,
        durability_kind: DurabilityKind::TransientLocal,
        unicast_locator_list: unicast.clone(),
        multicast_locator_list: multicast.clone(),
        ..Default::default()
    }
}

/// Unicast metatraffic locators when advertised, multicast otherwise.
fn metatraffic_locators(pdata: &ParticipantProxyData) -> (LocatorList, LocatorList) {
    if pdata.metatraffic_unicast_locator_list.is_empty() {
        (
            LocatorList::new(),
            pdata.metatraffic_multicast_locator_list.clone(),
        )
    } else {
        (pdata.metatraffic_unicast_locator_list.clone(), LocatorList::new())
    }
}

fn publish(writer: &Writer, key: InstanceHandle, pl: ParameterList) -> Result<()> {
    let mut change = writer.new_change(ChangeKind::Alive, key)?;
    change.serialized_payload = pl.to_payload(Endianness::Little);
    if change.serialized_payload.len() > DISCOVERY_TOPIC_DATA_MAX_SIZE {
        let size = change.serialized_payload.len();
        writer.history().release_cache(change);
        return Err(Error::PayloadTooLarge {
            size,
            max: DISCOVERY_TOPIC_DATA_MAX_SIZE,
        });
    }
    let seq = writer.add_change(change)?;
    log::trace!("[SEDP] {} published {:?} seq={}", writer.guid(), key, seq);
    Ok(())
}

fn dispose(writer: &Writer, key: InstanceHandle) -> Result<()> {
    let change = writer.new_change(ChangeKind::NotAliveDisposedUnregistered, key)?;
    writer.add_change(change)?;
    Ok(())
}

/// Receives remote endpoint data on one SEDP reader.
struct SedpListener {
    pdp: Weak<Pdp>,
    topic: SedpTopic,
}

impl ReaderListener for SedpListener {
    fn on_new_cache_change_added(&self, reader: GUID, change: &CacheChange) {
        let Some(pdp) = self.pdp.upgrade() else {
            return;
        };
        let Some(participant) = pdp.participant() else {
            return;
        };
        let Some(reader) = participant.lookup_reader(&reader) else {
            return;
        };
        let history = reader.history();
        let handle = change.instance_handle;
        let writer = change.writer_guid;
        let seq = change.sequence_number;
        history.remove_if(|c| {
            c.instance_handle == handle && c.writer_guid == writer && c.sequence_number < seq
        });

        if !change.kind.is_alive() {
            history.remove_if(|c| c.instance_handle == handle);
            let guid = handle.to_guid();
            match self.topic {
                SedpTopic::Publications => {
                    if pdp.remove_writer_proxy_data(&guid).is_some() {
                        log::info!("[SEDP] remote writer {} disposed", guid);
                    }
                    unpair_writer_proxy(&pdp, &guid);
                }
                SedpTopic::Subscriptions => {
                    if pdp.remove_reader_proxy_data(&guid).is_some() {
                        log::info!("[SEDP] remote reader {} disposed", guid);
                    }
                    unpair_reader_proxy(&pdp, &guid);
                }
            }
            return;
        }

        let pl = match ParameterList::from_payload(&change.serialized_payload) {
            Ok(pl) => pl,
            Err(e) => {
                log::warn!("[SEDP] undecodable sample from {}: {}", writer, e);
                history.remove_change(&writer, seq);
                return;
            }
        };
        let result = match self.topic {
            SedpTopic::Publications => on_publication(&pdp, &pl),
            SedpTopic::Subscriptions => on_subscription(&pdp, &pl),
        };
        if let Err(e) = result {
            log::warn!("[SEDP] dropping sample from {}: {}", writer, e);
            history.remove_change(&writer, seq);
        }
    }
}

fn on_publication(pdp: &Pdp, pl: &ParameterList) -> Result<()> {
    let mut data = WriterProxyData::from_parameter_list(pl)?;
    if data.guid.prefix == pdp.local_guid().prefix {
        return Ok(());
    }
    let Some(owner) = pdp.lookup_participant(&data.guid) else {
        log::debug!("[SEDP] writer {} of unknown participant ignored", data.guid);
        return Ok(());
    };
    if data.unicast_locator_list.is_empty() && data.multicast_locator_list.is_empty() {
        data.unicast_locator_list = owner.default_unicast_locator_list.clone();
        data.multicast_locator_list = owner.default_multicast_locator_list.clone();
    }
    data.is_alive = true;
    log::debug!(
        "[SEDP] remote writer {} on '{}' ({})",
        data.guid,
        data.topic_name,
        data.type_name
    );
    if pdp.add_writer_proxy_data(data.clone()) {
        pair_remote_writer(pdp, &data);
    }
    Ok(())
}

fn on_subscription(pdp: &Pdp, pl: &ParameterList) -> Result<()> {
    let mut data = ReaderProxyData::from_parameter_list(pl)?;
    if data.guid.prefix == pdp.local_guid().prefix {
        return Ok(());
    }
    let Some(owner) = pdp.lookup_participant(&data.guid) else {
        log::debug!("[SEDP] reader {} of unknown participant ignored", data.guid);
        return Ok(());
    };
    if data.unicast_locator_list.is_empty() && data.multicast_locator_list.is_empty() {
        data.unicast_locator_list = owner.default_unicast_locator_list.clone();
        data.multicast_locator_list = owner.default_multicast_locator_list.clone();
    }
    data.is_alive = true;
    log::debug!(
        "[SEDP] remote reader {} on '{}' ({})",
        data.guid,
        data.topic_name,
        data.type_name
    );
    if pdp.add_reader_proxy_data(data.clone()) {
        pair_remote_reader(pdp, &data);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParticipantAttributes;
    use crate::transport::{LoopbackTransport, Transport};

    fn participant(domain: u32, simple: crate::config::SimpleEdpAttributes) -> Arc<RtpsParticipant> {
        let mut a = ParticipantAttributes::with_name("sedp-unit");
        a.builtin.domain_id = domain;
        a.builtin.simple_edp = simple;
        let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
        RtpsParticipant::new(a, transport, None).expect("participant")
    }

    #[test]
    fn test_mask_follows_enabled_endpoints() {
        let full = participant(30, Default::default());
        let pdp = full.pdp().expect("pdp");
        let edp = pdp.edp().expect("edp");
        assert_eq!(
            edp.builtin_endpoint_mask(),
            DISC_BUILTIN_ENDPOINT_PUBLICATION_ANNOUNCER
                | DISC_BUILTIN_ENDPOINT_PUBLICATION_DETECTOR
                | DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_ANNOUNCER
                | DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_DETECTOR
        );

        let half = participant(
            31,
            crate::config::SimpleEdpAttributes {
                use_publication_writer_and_subscription_reader: true,
                use_publication_reader_and_subscription_writer: false,
            },
        );
        let pdp = half.pdp().expect("pdp");
        assert_eq!(
            pdp.edp().expect("edp").builtin_endpoint_mask(),
            DISC_BUILTIN_ENDPOINT_PUBLICATION_ANNOUNCER
                | DISC_BUILTIN_ENDPOINT_SUBSCRIPTION_DETECTOR
        );
    }

    #[test]
    fn test_sedp_endpoints_are_reliable_transient_local() {
        let p = participant(32, Default::default());
        let w = p
            .lookup_writer(&GUID::new(p.guid().prefix, EntityId::SEDP_PUBLICATIONS_WRITER))
            .expect("publications writer");
        assert!(w.is_stateful());
        let attrs = w.core().attributes();
        assert_eq!(attrs.endpoint.durability_kind, DurabilityKind::TransientLocal);
        assert_eq!(
            attrs.endpoint.unicast_locator_list,
            p.attributes().builtin.metatraffic_unicast_locator_list
        );
        let r = p
            .lookup_reader(&GUID::new(p.guid().prefix, EntityId::SEDP_SUBSCRIPTIONS_READER))
            .expect("subscriptions reader");
        assert!(r.is_stateful());
    }

    #[test]
    fn test_metatraffic_locators_prefer_unicast() {
        let mut pdata = ParticipantProxyData::default();
        pdata
            .metatraffic_multicast_locator_list
            .push(crate::protocol::locator::Locator::udpv4(
                std::net::Ipv4Addr::new(239, 255, 0, 1),
                7400,
            ));
        let (u, m) = metatraffic_locators(&pdata);
        assert!(u.is_empty());
        assert_eq!(m.len(), 1);

        pdata
            .metatraffic_unicast_locator_list
            .push(crate::protocol::locator::Locator::udpv4(std::net::Ipv4Addr::LOCALHOST, 7410));
        let (u, m) = metatraffic_locators(&pdata);
        assert_eq!(u.len(), 1);
        assert!(m.is_empty());
    }
}
