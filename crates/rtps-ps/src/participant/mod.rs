// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS participant: endpoint factory and owner of the shared resources.
//!
//! An [`RtpsParticipant`] owns
//!
//! - every local writer and reader, user and builtin,
//! - one [`ListenResource`] per bound locator,
//! - the timer thread running heartbeats, announcements and lease checks,
//! - the participant discovery protocol ([`Pdp`]) when enabled.
//!
//! Teardown order is fixed: discovery first, then endpoints, then listen
//! resources, then the timer thread. Endpoints go before transport so no
//! datagram reaches a half-destroyed endpoint.

pub mod event;
pub mod receiver;

use crate::config::{ParticipantAttributes, DEFAULT_MULTICAST_ADDRESS, MAX_AUTO_PARTICIPANT_ID};
use crate::discovery::Pdp;
use crate::endpoint::{
    Endpoint, EndpointAttributes, EndpointKind, ReaderAttributes, WriterAttributes,
};
use crate::error::{Error, Result};
use crate::history::{ReaderHistory, WriterHistory};
use crate::protocol::constants::{
    ENTITY_KIND_USER_READER_NO_KEY, ENTITY_KIND_USER_READER_WITH_KEY,
    ENTITY_KIND_USER_WRITER_NO_KEY, ENTITY_KIND_USER_WRITER_WITH_KEY,
};
use crate::protocol::guid::{EntityId, GuidPrefix, GUID};
use crate::protocol::locator::{Locator, LocatorList};
use crate::protocol::types::TopicKind;
use crate::qos::{LivelinessKind, ReaderQos, TopicAttributes, WriterQos};
use crate::reader::{Reader, ReaderCore, ReaderListener, StatefulReader, StatelessReader};
use crate::transport::{unicast_locators_for, ListenResource, Transport};
use crate::writer::{StatefulWriter, StatelessWriter, Writer, WriterCore, WriterListener};
use event::{EventThread, HeartbeatEvent, TimedEvent};
use parking_lot::{Mutex, RwLock};
use receiver::MessageReceiver;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Lifecycle change of a remote participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryStatus {
    Discovered,
    ChangedQos,
    Removed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantDiscoveryInfo {
    pub status: DiscoveryStatus,
    pub guid: GUID,
    pub name: String,
    pub user_data: Vec<u8>,
}

/// Discovery notifications of a participant.
pub trait ParticipantListener: Send + Sync {
    fn on_participant_discovery(&self, _info: ParticipantDiscoveryInfo) {}
}

pub struct RtpsParticipant {
    guid: GUID,
    participant_id: u32,
    /// Attributes with every default locator filled in.
    attributes: ParticipantAttributes,
    transport: Arc<dyn Transport>,
    receiver: Arc<MessageReceiver>,
    user_endpoints: RwLock<Vec<Endpoint>>,
    builtin_endpoints: RwLock<Vec<Endpoint>>,
    /// Serializes entity id checks with endpoint registration.
    creation: Mutex<()>,
    listen_resources: Mutex<Vec<ListenResource>>,
    /// Participant ports opened at creation; kept even without endpoints.
    reserved_locators: Vec<Locator>,
    events: Mutex<Option<EventThread>>,
    /// Timed events owned by the participant, keyed by endpoint.
    timed: Mutex<Vec<(GUID, Arc<dyn TimedEvent>)>>,
    next_entity_key: AtomicU32,
    pdp: RwLock<Option<Arc<Pdp>>>,
    listener: RwLock<Option<Arc<dyn ParticipantListener>>>,
    destroyed: AtomicBool,
}

impl RtpsParticipant {
    /// Create a participant, bind its ports and start discovery.
    ///
    /// With `participant_id < 0` the first id whose unicast ports are free
    /// is taken.
    pub fn new(
        attributes: ParticipantAttributes,
        transport: Arc<dyn Transport>,
        listener: Option<Arc<dyn ParticipantListener>>,
    ) -> Result<Arc<Self>> {
        attributes.validate()?;
        let prefix = GuidPrefix::generate();
        let receiver = Arc::new(MessageReceiver::new(prefix));
        let (participant_id, attributes, resources) =
            bind_participant_ports(attributes, transport.as_ref(), &receiver)?;
        let events = EventThread::start(&attributes.name)?;

        let reserved_locators = resources.iter().map(ListenResource::locator).collect();
        let guid = GUID::new(prefix, EntityId::PARTICIPANT);
        let participant = Arc::new(Self {
            guid,
            participant_id,
            attributes,
            transport,
            receiver,
            user_endpoints: RwLock::new(Vec::new()),
            builtin_endpoints: RwLock::new(Vec::new()),
            creation: Mutex::new(()),
            listen_resources: Mutex::new(resources),
            reserved_locators,
            events: Mutex::new(Some(events)),
            timed: Mutex::new(Vec::new()),
            next_entity_key: AtomicU32::new(1),
            pdp: RwLock::new(None),
            listener: RwLock::new(listener),
            destroyed: AtomicBool::new(false),
        });

        if participant.attributes.builtin.use_simple_pdp {
            let started = Pdp::create(&participant).and_then(|pdp| {
                *participant.pdp.write() = Some(pdp.clone());
                pdp.start()
            });
            if let Err(e) = started {
                log::warn!("[RtpsParticipant] {} discovery failed to start: {}", guid, e);
                participant.destroy();
                return Err(e);
            }
        }

        log::info!(
            "[RtpsParticipant] created {} '{}' (domain {}, id {})",
            guid,
            participant.attributes.name,
            participant.attributes.domain_id(),
            participant_id
        );
        Ok(participant)
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    pub fn participant_id(&self) -> u32 {
        self.participant_id
    }

    pub fn attributes(&self) -> &ParticipantAttributes {
        &self.attributes
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn pdp(&self) -> Option<Arc<Pdp>> {
        self.pdp.read().clone()
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn ParticipantListener>>) {
        *self.listener.write() = listener;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::InvalidState(format!(
                "participant {} is destroyed",
                self.guid
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Endpoint factory
    // ------------------------------------------------------------------

    /// Create a writer. Reliable writers are stateful and get a periodic
    /// heartbeat; best-effort writers are stateless.
    ///
    /// `entity_id` overrides the allocation from `attributes.endpoint`.
    pub fn create_writer(
        &self,
        mut attributes: WriterAttributes,
        history: Arc<WriterHistory>,
        listener: Option<Arc<dyn WriterListener>>,
        entity_id: Option<EntityId>,
        builtin: bool,
    ) -> Result<Writer> {
        self.ensure_alive()?;
        attributes.endpoint.endpoint_kind = EndpointKind::Writer;
        if history.topic_kind() != attributes.endpoint.topic_kind {
            return Err(Error::InvalidAttributes(
                "writer history and attributes disagree on topic kind".into(),
            ));
        }
        check_endpoint_locators(&attributes.endpoint)?;

        let _creating = self.creation.lock();
        let kind = match attributes.endpoint.topic_kind {
            TopicKind::WithKey => ENTITY_KIND_USER_WRITER_WITH_KEY,
            TopicKind::NoKey => ENTITY_KIND_USER_WRITER_NO_KEY,
        };
        let entity_id = self.resolve_entity_id(entity_id, attributes.endpoint.entity_id, kind)?;
        self.fill_default_locators(&mut attributes.endpoint, builtin);

        let guid = GUID::new(self.guid.prefix, entity_id);
        let reliable = attributes.endpoint.is_reliable();
        let core = WriterCore::new(
            guid,
            attributes.clone(),
            history,
            self.transport.clone(),
        );
        core.set_listener(listener);
        let writer = if reliable {
            Writer::Stateful(Arc::new(StatefulWriter::new(core)))
        } else {
            Writer::Stateless(Arc::new(StatelessWriter::new(core)))
        };

        let endpoint = Endpoint::from(writer.clone());
        self.bind_endpoint(&endpoint, &attributes.endpoint)?;
        if let Writer::Stateful(w) = &writer {
            let heartbeat: Arc<dyn TimedEvent> = Arc::new(HeartbeatEvent::new(w));
            self.schedule_event(&heartbeat);
            self.timed.lock().push((guid, heartbeat));
        }
        self.endpoint_list(builtin).write().push(endpoint);
        log::debug!(
            "[RtpsParticipant] created {} writer {}",
            if reliable { "stateful" } else { "stateless" },
            guid
        );
        Ok(writer)
    }

    /// Create a reader. Reliable readers are stateful, best-effort readers
    /// stateless.
    pub fn create_reader(
        &self,
        mut attributes: ReaderAttributes,
        history: Arc<ReaderHistory>,
        listener: Option<Arc<dyn ReaderListener>>,
        entity_id: Option<EntityId>,
        builtin: bool,
    ) -> Result<Reader> {
        self.ensure_alive()?;
        attributes.endpoint.endpoint_kind = EndpointKind::Reader;
        if history.topic_kind() != attributes.endpoint.topic_kind {
            return Err(Error::InvalidAttributes(
                "reader history and attributes disagree on topic kind".into(),
            ));
        }
        check_endpoint_locators(&attributes.endpoint)?;

        let _creating = self.creation.lock();
        let kind = match attributes.endpoint.topic_kind {
            TopicKind::WithKey => ENTITY_KIND_USER_READER_WITH_KEY,
            TopicKind::NoKey => ENTITY_KIND_USER_READER_NO_KEY,
        };
        let entity_id = self.resolve_entity_id(entity_id, attributes.endpoint.entity_id, kind)?;
        self.fill_default_locators(&mut attributes.endpoint, builtin);

        let guid = GUID::new(self.guid.prefix, entity_id);
        let reliable = attributes.endpoint.is_reliable();
        let core = ReaderCore::new(
            guid,
            attributes.clone(),
            history,
            self.transport.clone(),
        );
        core.set_listener(listener);
        let reader = if reliable {
            Reader::Stateful(Arc::new(StatefulReader::new(core)))
        } else {
            Reader::Stateless(Arc::new(StatelessReader::new(core)))
        };

        let endpoint = Endpoint::from(reader.clone());
        self.bind_endpoint(&endpoint, &attributes.endpoint)?;
        self.endpoint_list(builtin).write().push(endpoint);
        log::debug!(
            "[RtpsParticipant] created {} reader {}",
            if reliable { "stateful" } else { "stateless" },
            guid
        );
        Ok(reader)
    }

    fn endpoint_list(&self, builtin: bool) -> &RwLock<Vec<Endpoint>> {
        if builtin {
            &self.builtin_endpoints
        } else {
            &self.user_endpoints
        }
    }

    fn entity_id_in_use(&self, entity_id: EntityId) -> bool {
        let used = |list: &RwLock<Vec<Endpoint>>| {
            list.read().iter().any(|e| e.guid().entity_id == entity_id)
        };
        used(&self.user_endpoints) || used(&self.builtin_endpoints)
    }

    /// Explicit id, else the requested key when `> 0`, else the next free
    /// key of the counter.
    fn resolve_entity_id(
        &self,
        explicit: Option<EntityId>,
        requested_key: i32,
        kind: u8,
    ) -> Result<EntityId> {
        let requested = explicit.or_else(|| {
            u32::try_from(requested_key)
                .ok()
                .filter(|key| *key > 0)
                .map(|key| EntityId::from_key(key, kind))
        });
        if let Some(id) = requested {
            if self.entity_id_in_use(id) {
                return Err(Error::DuplicateEntityId(id.to_string()));
            }
            return Ok(id);
        }
        loop {
            let key = self.next_entity_key.fetch_add(1, Ordering::Relaxed);
            let id = EntityId::from_key(key, kind);
            if !self.entity_id_in_use(id) {
                return Ok(id);
            }
        }
    }

    /// Empty lists take the participant defaults: user endpoints the default
    /// locators, builtin endpoints the metatraffic locators.
    fn fill_default_locators(&self, endpoint: &mut EndpointAttributes, builtin: bool) {
        if !endpoint.unicast_locator_list.is_empty() || !endpoint.multicast_locator_list.is_empty()
        {
            return;
        }
        if builtin {
            endpoint.unicast_locator_list = self.attributes.builtin.metatraffic_unicast_locator_list.clone();
            endpoint.multicast_locator_list =
                self.attributes.builtin.metatraffic_multicast_locator_list.clone();
        } else {
            endpoint.unicast_locator_list = self.attributes.default_unicast_locator_list.clone();
            endpoint.multicast_locator_list = self.attributes.default_multicast_locator_list.clone();
        }
    }

    /// Associate `endpoint` with a listen resource per locator, reusing
    /// resources already bound to the same locator.
    ///
    /// A multicast locator that cannot be bound is skipped with a warning.
    fn bind_endpoint(&self, endpoint: &Endpoint, attrs: &EndpointAttributes) -> Result<()> {
        let guid = endpoint.guid();
        let mut resources = self.listen_resources.lock();
        let locators = attrs
            .unicast_locator_list
            .iter()
            .chain(attrs.multicast_locator_list.iter());
        for locator in locators {
            if let Some(existing) = resources.iter().find(|r| r.is_listening_to(locator)) {
                existing.add_endpoint(endpoint.clone());
                continue;
            }
            match open_resource(
                self.transport.as_ref(),
                locator,
                self.attributes.listen_socket_buffer_size,
                &self.receiver,
            ) {
                Ok(resource) => {
                    resource.add_endpoint(endpoint.clone());
                    resources.push(resource);
                }
                Err(e) if locator.is_multicast() => {
                    log::warn!(
                        "[RtpsParticipant] {} cannot listen on {}: {}",
                        guid,
                        locator,
                        e
                    );
                }
                Err(e) => {
                    for r in resources.iter() {
                        r.remove_endpoint(&guid);
                    }
                    let idle = self.take_idle_resources(&mut resources);
                    drop(resources);
                    drop(idle);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Detach resources left without endpoints, except the participant's
    /// own ports. Dropping the returned resources stops their threads.
    fn take_idle_resources(&self, resources: &mut Vec<ListenResource>) -> Vec<ListenResource> {
        let mut idle = Vec::new();
        let mut i = 0;
        while i < resources.len() {
            let resource = &resources[i];
            if resource.endpoint_count() == 0
                && !self.reserved_locators.contains(&resource.locator())
            {
                idle.push(resources.swap_remove(i));
            } else {
                i += 1;
            }
        }
        if !idle.is_empty() {
            log::debug!(
                "[RtpsParticipant] {} closing {} idle listen resource(s)",
                self.guid,
                idle.len()
            );
        }
        idle
    }

    // ------------------------------------------------------------------
    // Lookup and removal
    // ------------------------------------------------------------------

    pub fn lookup_writer(&self, guid: &GUID) -> Option<Writer> {
        self.lookup(guid).and_then(|e| e.as_writer())
    }

    pub fn lookup_reader(&self, guid: &GUID) -> Option<Reader> {
        self.lookup(guid).and_then(|e| e.as_reader())
    }

    fn lookup(&self, guid: &GUID) -> Option<Endpoint> {
        if guid.prefix != self.guid.prefix {
            return None;
        }
        let find = |list: &RwLock<Vec<Endpoint>>| {
            list.read().iter().find(|e| e.guid() == *guid).cloned()
        };
        find(&self.user_endpoints).or_else(|| find(&self.builtin_endpoints))
    }

    pub fn user_writers(&self) -> Vec<Writer> {
        self.user_endpoints
            .read()
            .iter()
            .filter_map(Endpoint::as_writer)
            .collect()
    }

    pub fn user_readers(&self) -> Vec<Reader> {
        self.user_endpoints
            .read()
            .iter()
            .filter_map(Endpoint::as_reader)
            .collect()
    }

    /// Remove a user endpoint, its discovery announcement and its timers.
    pub fn delete_user_endpoint(&self, guid: &GUID) -> bool {
        let removed = {
            let mut list = self.user_endpoints.write();
            match list.iter().position(|e| e.guid() == *guid) {
                Some(pos) => list.remove(pos),
                None => return false,
            }
        };
        let idle = {
            let mut resources = self.listen_resources.lock();
            for resource in resources.iter() {
                resource.remove_endpoint(guid);
            }
            self.take_idle_resources(&mut resources)
        };
        drop(idle);
        self.timed.lock().retain(|(owner, _)| owner != guid);
        if let Some(pdp) = self.pdp() {
            if removed.is_writer() {
                pdp.unregister_local_writer(guid);
            } else {
                pdp.unregister_local_reader(guid);
            }
        }
        log::debug!("[RtpsParticipant] deleted endpoint {}", guid);
        true
    }

    // ------------------------------------------------------------------
    // Discovery glue
    // ------------------------------------------------------------------

    /// Announce a local writer through EDP and pair it with known readers.
    pub fn register_writer(
        &self,
        writer: &Writer,
        topic: &TopicAttributes,
        qos: &WriterQos,
    ) -> Result<()> {
        self.ensure_alive()?;
        match self.pdp() {
            Some(pdp) => pdp.register_local_writer(writer, topic, qos),
            None => {
                log::debug!("[RtpsParticipant] no discovery; {} not announced", writer.guid());
                Ok(())
            }
        }
    }

    pub fn register_reader(
        &self,
        reader: &Reader,
        topic: &TopicAttributes,
        qos: &ReaderQos,
    ) -> Result<()> {
        self.ensure_alive()?;
        match self.pdp() {
            Some(pdp) => pdp.register_local_reader(reader, topic, qos),
            None => {
                log::debug!("[RtpsParticipant] no discovery; {} not announced", reader.guid());
                Ok(())
            }
        }
    }

    pub fn update_local_writer(&self, writer: &Writer, qos: &WriterQos) -> Result<()> {
        match self.pdp() {
            Some(pdp) => pdp.update_local_writer(writer, qos),
            None => Ok(()),
        }
    }

    pub fn update_local_reader(&self, reader: &Reader, qos: &ReaderQos) -> Result<()> {
        match self.pdp() {
            Some(pdp) => pdp.update_local_reader(reader, qos),
            None => Ok(()),
        }
    }

    /// Announce this participant now. `new_change` forces a fresh sample.
    pub fn announce_participant_state(&self, new_change: bool) -> Result<()> {
        match self.pdp() {
            Some(pdp) => pdp.announce_participant_state(new_change),
            None => Ok(()),
        }
    }

    pub fn stop_participant_announcement(&self) {
        if let Some(pdp) = self.pdp() {
            pdp.stop_participant_announcement();
        }
    }

    pub fn reset_participant_announcement(&self) {
        if let Some(pdp) = self.pdp() {
            pdp.reset_participant_announcement();
        }
    }

    /// Assert liveliness of every local writer with the given kind.
    pub fn assert_liveliness(&self, kind: LivelinessKind) {
        if let Some(pdp) = self.pdp() {
            pdp.assert_local_writers_liveliness(kind);
        }
    }

    /// A remote endpoint named by static discovery. Only meaningful with
    /// static EDP; returns false otherwise.
    pub fn new_remote_endpoint_discovered(
        &self,
        participant: GUID,
        user_id: i16,
        kind: EndpointKind,
    ) -> bool {
        match self.pdp() {
            Some(pdp) => pdp.new_remote_endpoint_statically_discovered(participant, user_id, kind),
            None => false,
        }
    }

    pub(crate) fn schedule_event(&self, event: &Arc<dyn TimedEvent>) {
        if let Some(events) = self.events.lock().as_ref() {
            events.schedule(event);
        }
    }

    pub(crate) fn restart_event(&self, event: &Arc<dyn TimedEvent>) {
        if let Some(events) = self.events.lock().as_ref() {
            events.restart(event);
        }
    }

    pub(crate) fn notify_discovery(&self, info: ParticipantDiscoveryInfo) {
        let listener = self.listener.read().clone();
        if let Some(l) = listener {
            l.on_participant_discovery(info);
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Stop discovery, drop every endpoint, then close the listen resources
    /// and the timer thread. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pdp) = self.pdp.write().take() {
            pdp.shutdown();
        }
        self.user_endpoints.write().clear();
        self.builtin_endpoints.write().clear();
        self.timed.lock().clear();

        let resources = std::mem::take(&mut *self.listen_resources.lock());
        for mut resource in resources {
            resource.stop();
        }
        if let Some(mut events) = self.events.lock().take() {
            events.stop();
        }
        log::info!("[RtpsParticipant] destroyed {}", self.guid);
    }
}

impl Drop for RtpsParticipant {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for RtpsParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtpsParticipant")
            .field("guid", &self.guid)
            .field("participant_id", &self.participant_id)
            .field("name", &self.attributes.name)
            .finish()
    }
}

fn check_endpoint_locators(endpoint: &EndpointAttributes) -> Result<()> {
    for list in [&endpoint.unicast_locator_list, &endpoint.multicast_locator_list] {
        if let Some(bad) = list.first_invalid() {
            return Err(Error::InvalidLocatorList(format!("endpoint list contains {}", bad)));
        }
    }
    Ok(())
}

fn open_resource(
    transport: &dyn Transport,
    locator: &Locator,
    buffer_size: u32,
    receiver: &Arc<MessageReceiver>,
) -> io::Result<ListenResource> {
    let channel = transport.open_input(locator, buffer_size)?;
    ListenResource::start(channel, receiver.clone())
}

/// Pick the participant id and bind the synthesized unicast locators.
///
/// Unicast inputs are exclusive, so `AddrInUse` on an automatically chosen
/// id means another participant holds it and the next id is tried.
fn bind_participant_ports(
    mut attrs: ParticipantAttributes,
    transport: &dyn Transport,
    receiver: &Arc<MessageReceiver>,
) -> Result<(u32, ParticipantAttributes, Vec<ListenResource>)> {
    let domain = attrs.domain_id();
    let synth_meta = attrs.builtin.metatraffic_unicast_locator_list.is_empty();
    let synth_user = attrs.default_unicast_locator_list.is_empty();
    let automatic = attrs.participant_id < 0;
    let candidates: Vec<u32> = match u32::try_from(attrs.participant_id) {
        Ok(id) => vec![id],
        Err(_) => (0..MAX_AUTO_PARTICIPANT_ID.unsigned_abs()).collect(),
    };

    for id in candidates {
        let meta = if synth_meta {
            unicast_locators_for(
                transport,
                attrs.port.metatraffic_unicast_port(domain, id),
                attrs.use_ip_loopback,
            )
        } else {
            attrs.builtin.metatraffic_unicast_locator_list.clone()
        };
        let user = if synth_user {
            unicast_locators_for(
                transport,
                attrs.port.user_unicast_port(domain, id),
                attrs.use_ip_loopback,
            )
        } else {
            attrs.default_unicast_locator_list.clone()
        };

        let mut to_bind = LocatorList::new();
        if synth_meta {
            to_bind.extend(&meta);
        }
        if synth_user {
            to_bind.extend(&user);
        }

        let mut resources = Vec::new();
        let mut in_use = false;
        for locator in to_bind.iter() {
            match open_resource(transport, locator, attrs.listen_socket_buffer_size, receiver) {
                Ok(r) => resources.push(r),
                Err(e) if e.kind() == io::ErrorKind::AddrInUse && automatic => {
                    log::debug!("[RtpsParticipant] participant id {} taken ({})", id, locator);
                    in_use = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        if in_use {
            // Dropping stops the resources opened for this id.
            drop(resources);
            continue;
        }

        attrs.participant_id = id as i32;
        attrs.builtin.metatraffic_unicast_locator_list = meta;
        attrs.default_unicast_locator_list = user;
        if attrs.builtin.use_simple_pdp && attrs.builtin.metatraffic_multicast_locator_list.is_empty()
        {
            attrs.builtin.metatraffic_multicast_locator_list.push(Locator::udpv4(
                DEFAULT_MULTICAST_ADDRESS,
                attrs.port.metatraffic_multicast_port(domain),
            ));
        }
        return Ok((id, attrs, resources));
    }
    Err(Error::ResourceExhausted(format!(
        "no free participant id in domain {}",
        domain
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryAttributes;
    use crate::qos::{HistoryQosPolicy, ReliabilityKind, ResourceLimitsQosPolicy};
    use crate::transport::LoopbackTransport;
    use std::net::Ipv4Addr;

    fn attrs(domain: u32) -> ParticipantAttributes {
        let mut a = ParticipantAttributes::with_name("unit");
        a.builtin.domain_id = domain;
        a.builtin.use_simple_pdp = false;
        a
    }

    fn writer_history(kind: TopicKind) -> Arc<WriterHistory> {
        Arc::new(WriterHistory::new(
            HistoryAttributes::new(256, 4, 0),
            HistoryQosPolicy::keep_last(1),
            ResourceLimitsQosPolicy::default(),
            kind,
        ))
    }

    fn reader_history(kind: TopicKind) -> Arc<ReaderHistory> {
        Arc::new(ReaderHistory::new(
            HistoryAttributes::new(256, 4, 0),
            HistoryQosPolicy::keep_all(),
            ResourceLimitsQosPolicy::default(),
            kind,
        ))
    }

    #[test]
    fn test_participant_ids_are_probed() {
        let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
        let a = RtpsParticipant::new(attrs(5), transport.clone(), None).expect("a");
        let b = RtpsParticipant::new(attrs(5), transport.clone(), None).expect("b");
        assert_eq!(a.participant_id(), 0);
        assert_eq!(b.participant_id(), 1);
        let port = b.attributes().port.user_unicast_port(5, 1);
        assert!(b
            .attributes()
            .default_unicast_locator_list
            .contains(&Locator::udpv4(Ipv4Addr::LOCALHOST, port)));
    }

    #[test]
    fn test_explicit_participant_id_collision_fails() {
        let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
        let mut fixed = attrs(6);
        fixed.participant_id = 3;
        let _a = RtpsParticipant::new(fixed.clone(), transport.clone(), None).expect("a");
        let err = RtpsParticipant::new(fixed, transport, None).expect_err("port in use");
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_entity_ids_by_topic_kind() {
        let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
        let p = RtpsParticipant::new(attrs(7), transport, None).expect("participant");
        let w = p
            .create_writer(
                WriterAttributes::new(TopicKind::WithKey, ReliabilityKind::BestEffort),
                writer_history(TopicKind::WithKey),
                None,
                None,
                false,
            )
            .expect("writer");
        let r = p
            .create_reader(
                ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::Reliable),
                reader_history(TopicKind::NoKey),
                None,
                None,
                false,
            )
            .expect("reader");
        assert_eq!(w.guid().entity_id.kind(), ENTITY_KIND_USER_WRITER_WITH_KEY);
        assert_eq!(r.guid().entity_id.kind(), ENTITY_KIND_USER_READER_NO_KEY);
        assert!(!w.is_stateful());
        assert!(r.is_stateful());
        assert_ne!(w.guid().entity_id.key(), r.guid().entity_id.key());
        assert!(p.lookup_writer(&w.guid()).is_some());
        assert!(p.lookup_reader(&r.guid()).is_some());
    }

    #[test]
    fn test_duplicate_entity_id_rejected() {
        let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
        let p = RtpsParticipant::new(attrs(8), transport, None).expect("participant");
        let mut wa = WriterAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort);
        wa.endpoint.entity_id = 42;
        p.create_writer(wa.clone(), writer_history(TopicKind::NoKey), None, None, false)
            .expect("first");
        let err = p
            .create_writer(wa, writer_history(TopicKind::NoKey), None, None, false)
            .expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateEntityId(_)));
    }

    #[test]
    fn test_invalid_locator_rejected() {
        let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
        let p = RtpsParticipant::new(attrs(9), transport, None).expect("participant");
        let mut ra = ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort);
        ra.endpoint.unicast_locator_list.push(Locator::INVALID);
        let err = p
            .create_reader(ra, reader_history(TopicKind::NoKey), None, None, false)
            .expect_err("invalid locator");
        assert!(matches!(err, Error::InvalidLocatorList(_)));
    }

    #[test]
    fn test_endpoints_share_listen_resources() {
        let transport = LoopbackTransport::new();
        let dyn_transport: Arc<dyn Transport> = Arc::new(transport.clone());
        let p = RtpsParticipant::new(attrs(10), dyn_transport, None).expect("participant");
        let bound_before = transport.bound_locator_count();
        for _ in 0..3 {
            p.create_reader(
                ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort),
                reader_history(TopicKind::NoKey),
                None,
                None,
                false,
            )
            .expect("reader");
        }
        assert_eq!(transport.bound_locator_count(), bound_before);
        assert_eq!(p.user_readers().len(), 3);
    }

    #[test]
    fn test_deleted_endpoint_releases_its_locator() {
        let transport = LoopbackTransport::new();
        let dyn_transport: Arc<dyn Transport> = Arc::new(transport.clone());
        let p = RtpsParticipant::new(attrs(12), dyn_transport, None).expect("participant");
        let bound_before = transport.bound_locator_count();

        let mut ra = ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort);
        ra.endpoint
            .unicast_locator_list
            .push(Locator::udpv4(Ipv4Addr::LOCALHOST, 7870));
        let reader = p
            .create_reader(ra, reader_history(TopicKind::NoKey), None, None, false)
            .expect("reader");
        assert_eq!(transport.bound_locator_count(), bound_before + 1);

        assert!(p.delete_user_endpoint(&reader.guid()));
        assert_eq!(transport.bound_locator_count(), bound_before);

        // The participant's own ports survive endpoint churn.
        let r = p
            .create_reader(
                ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort),
                reader_history(TopicKind::NoKey),
                None,
                None,
                false,
            )
            .expect("default reader");
        assert!(p.delete_user_endpoint(&r.guid()));
        assert_eq!(transport.bound_locator_count(), bound_before);
        assert_eq!(p.listen_resources.lock().len(), p.reserved_locators.len());
    }

    #[test]
    fn test_failed_bind_closes_opened_resources() {
        let transport = LoopbackTransport::new();
        let dyn_transport: Arc<dyn Transport> = Arc::new(transport.clone());
        let p = RtpsParticipant::new(attrs(13), dyn_transport, None).expect("participant");
        let taken = Locator::udpv4(Ipv4Addr::LOCALHOST, 7872);
        let _holder = transport.open_input(&taken, 0).expect("occupy port");
        let bound_before = transport.bound_locator_count();

        let mut ra = ReaderAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort);
        ra.endpoint
            .unicast_locator_list
            .push(Locator::udpv4(Ipv4Addr::LOCALHOST, 7871));
        ra.endpoint.unicast_locator_list.push(taken);
        let err = p
            .create_reader(ra, reader_history(TopicKind::NoKey), None, None, false)
            .expect_err("second locator is taken");
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(transport.bound_locator_count(), bound_before);
        assert!(p.user_readers().is_empty());
    }

    #[test]
    fn test_delete_and_destroy() {
        let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());
        let p = RtpsParticipant::new(attrs(11), transport, None).expect("participant");
        let w = p
            .create_writer(
                WriterAttributes::new(TopicKind::NoKey, ReliabilityKind::Reliable),
                writer_history(TopicKind::NoKey),
                None,
                None,
                false,
            )
            .expect("writer");
        assert_eq!(p.timed.lock().len(), 1);
        assert!(p.delete_user_endpoint(&w.guid()));
        assert!(!p.delete_user_endpoint(&w.guid()));
        assert!(p.timed.lock().is_empty());

        p.destroy();
        assert!(p.is_destroyed());
        let err = p
            .create_writer(
                WriterAttributes::new(TopicKind::NoKey, ReliabilityKind::BestEffort),
                writer_history(TopicKind::NoKey),
                None,
                None,
                false,
            )
            .expect_err("destroyed");
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
