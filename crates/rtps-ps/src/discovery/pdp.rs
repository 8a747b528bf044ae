// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simple participant discovery (SPDP).
//!
//! The local participant is announced periodically by a best-effort
//! stateless writer on the metatraffic multicast locators and initial
//! peers. Announcements of other participants arrive on a stateless reader
//! that trusts the SPDP writer entity id.
//!
//! Remote participant lifecycle:
//!
//! ```text
//! UNDISCOVERED --(valid SPDP data, not self)--> DISCOVERED
//! DISCOVERED   --(announcement)---------------> DISCOVERED (lease renewed)
//! DISCOVERED   --(lease expiry | dispose)-----> REMOVED
//! ```
//!
//! Removal unpairs every endpoint of the participant, drops its builtin
//! endpoints from EDP and purges its SPDP samples.
//!
//! Locking: the participant list lock is never held while calling into
//! endpoints or EDP.

use super::edp::{self, Edp, SimpleEdp, StaticEdp};
use super::proxy_data::{ParticipantProxyData, ReaderProxyData, WriterProxyData};
use super::builtin_reader_limits;
use crate::config::BuiltinAttributes;
use crate::endpoint::{EndpointKind, ReaderAttributes, WriterAttributes};
use crate::error::{Error, Result};
use crate::history::{CacheChange, HistoryAttributes, ReaderHistory, WriterHistory};
use crate::participant::event::{EventOutcome, TimedEvent};
use crate::participant::{DiscoveryStatus, ParticipantDiscoveryInfo, RtpsParticipant};
use crate::protocol::cdr::Endianness;
use crate::protocol::constants::{
    DISCOVERY_PARTICIPANT_DATA_MAX_SIZE, DISC_BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER,
    DISC_BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR,
};
use crate::protocol::guid::{EntityId, GuidPrefix, InstanceHandle, GUID};
use crate::protocol::parameter::ParameterList;
use crate::protocol::types::{ChangeKind, TopicKind};
use crate::qos::{
    HistoryQosPolicy, LivelinessKind, ReaderQos, ReliabilityKind, ResourceLimitsQosPolicy,
    TopicAttributes, WriterQos,
};
use crate::reader::{Reader, ReaderListener};
use crate::writer::Writer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

struct ParticipantEntry {
    data: ParticipantProxyData,
    last_seen: Instant,
}

impl ParticipantEntry {
    fn new(data: ParticipantProxyData) -> Self {
        Self {
            data,
            last_seen: Instant::now(),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.data
            .lease_duration
            .to_std()
            .is_some_and(|lease| now.saturating_duration_since(self.last_seen) > lease)
    }
}

enum Sighting {
    New,
    Changed,
    Unchanged,
}

pub struct Pdp {
    participant: Weak<RtpsParticipant>,
    local_guid: GUID,
    attributes: BuiltinAttributes,
    /// Slot 0 is the local participant.
    proxies: Mutex<Vec<ParticipantEntry>>,
    spdp_writer: Writer,
    spdp_reader: Reader,
    edp: Option<Edp>,
    announcement: Arc<dyn TimedEvent>,
    lease_check: Arc<dyn TimedEvent>,
    announcing: AtomicBool,
    local_changed: AtomicBool,
}

impl Pdp {
    /// Create the SPDP endpoints and the configured EDP on `participant`.
    pub(crate) fn create(participant: &Arc<RtpsParticipant>) -> Result<Arc<Self>> {
        let attributes = participant.attributes().clone();
        let builtin = attributes.builtin.clone();

        let spdp_writer = participant.create_writer(
            WriterAttributes::new(TopicKind::WithKey, ReliabilityKind::BestEffort),
            Arc::new(WriterHistory::new(
                HistoryAttributes::new(DISCOVERY_PARTICIPANT_DATA_MAX_SIZE, 2, 0),
                HistoryQosPolicy::keep_last(1),
                ResourceLimitsQosPolicy::default(),
                TopicKind::WithKey,
            )),
            None,
            Some(EntityId::SPDP_WRITER),
            true,
        )?;
        if let Writer::Stateless(w) = &spdp_writer {
            let destinations = builtin
                .metatraffic_multicast_locator_list
                .iter()
                .chain(builtin.initial_peers_list.iter());
            for locator in destinations {
                w.reader_locator_add(*locator, false);
            }
        }

        let spdp_reader = participant.create_reader(
            ReaderAttributes::new(TopicKind::WithKey, ReliabilityKind::BestEffort),
            Arc::new(ReaderHistory::new(
                HistoryAttributes::new(DISCOVERY_PARTICIPANT_DATA_MAX_SIZE, 10, 0),
                HistoryQosPolicy::keep_all(),
                builtin_reader_limits(),
                TopicKind::WithKey,
            )),
            None,
            Some(EntityId::SPDP_READER),
            true,
        )?;
        spdp_reader.set_trusted_writer(Some(EntityId::SPDP_WRITER));

        let edp = if builtin.use_static_edp {
            Some(Edp::Static(StaticEdp::create(&builtin)?))
        } else if builtin.use_simple_edp {
            Some(Edp::Simple(SimpleEdp::create(participant, &builtin)?))
        } else {
            None
        };

        let local = ParticipantProxyData {
            guid: participant.guid(),
            available_builtin_endpoints: DISC_BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER
                | DISC_BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR
                | edp.as_ref().map_or(0, Edp::builtin_endpoint_mask),
            metatraffic_unicast_locator_list: builtin.metatraffic_unicast_locator_list.clone(),
            metatraffic_multicast_locator_list: builtin.metatraffic_multicast_locator_list.clone(),
            default_unicast_locator_list: attributes.default_unicast_locator_list.clone(),
            default_multicast_locator_list: attributes.default_multicast_locator_list.clone(),
            participant_name: attributes.name.clone(),
            lease_duration: builtin.lease_duration,
            domain_id: builtin.domain_id,
            user_data: attributes.user_data.clone(),
            ..Default::default()
        };

        let announce_period = builtin
            .lease_duration_announcement_period
            .to_std()
            .unwrap_or(Duration::from_secs(40));
        let lease_check_period = builtin
            .lease_check_period
            .to_std()
            .unwrap_or(Duration::from_secs(1));
        let pdp = Arc::new_cyclic(|weak: &Weak<Pdp>| Pdp {
            participant: Arc::downgrade(participant),
            local_guid: participant.guid(),
            attributes: builtin,
            proxies: Mutex::new(vec![ParticipantEntry::new(local)]),
            spdp_writer,
            spdp_reader,
            edp,
            announcement: Arc::new(AnnouncementEvent {
                pdp: weak.clone(),
                period: announce_period,
            }),
            lease_check: Arc::new(LeaseCheckEvent {
                pdp: weak.clone(),
                period: lease_check_period,
            }),
            announcing: AtomicBool::new(true),
            local_changed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&pdp);
        pdp.spdp_reader
            .set_listener(Some(Arc::new(SpdpListener { pdp: weak.clone() })));
        if let Some(edp) = &pdp.edp {
            edp.set_listeners(&weak);
        }
        Ok(pdp)
    }

    /// First announcement, then the periodic announcement and lease check.
    pub(crate) fn start(&self) -> Result<()> {
        self.announce_participant_state(true)?;
        if let Some(participant) = self.participant() {
            participant.schedule_event(&self.announcement);
            participant.schedule_event(&self.lease_check);
        }
        log::debug!("[PDP] started for {}", self.local_guid);
        Ok(())
    }

    /// Announce that the local participant is gone.
    pub(crate) fn shutdown(&self) {
        self.announcing.store(false, Ordering::Relaxed);
        self.spdp_writer.remove_all_changes();
        let handle = InstanceHandle::from(self.local_guid);
        let disposed = self
            .spdp_writer
            .new_change(ChangeKind::NotAliveDisposedUnregistered, handle)
            .and_then(|change| self.spdp_writer.add_change(change));
        if let Err(e) = disposed {
            log::debug!("[PDP] dispose announcement of {} failed: {}", self.local_guid, e);
        }
    }

    pub(crate) fn participant(&self) -> Option<Arc<RtpsParticipant>> {
        self.participant.upgrade()
    }

    pub fn local_guid(&self) -> GUID {
        self.local_guid
    }

    pub fn attributes(&self) -> &BuiltinAttributes {
        &self.attributes
    }

    pub fn edp(&self) -> Option<&Edp> {
        self.edp.as_ref()
    }

    pub fn spdp_writer(&self) -> &Writer {
        &self.spdp_writer
    }

    pub fn spdp_reader(&self) -> &Reader {
        &self.spdp_reader
    }

    // ------------------------------------------------------------------
    // Announcement
    // ------------------------------------------------------------------

    /// Send the local participant data.
    ///
    /// A fresh sample is built when forced, when the local data changed or
    /// when none exists yet; otherwise the stored sample is sent again with
    /// its sequence number unchanged.
    pub fn announce_participant_state(&self, new_change: bool) -> Result<()> {
        let changed = self.local_changed.swap(false, Ordering::AcqRel);
        if !(new_change || changed || self.spdp_writer.history().is_empty()) {
            self.spdp_writer.unsent_changes_reset();
            return Ok(());
        }
        let local = self.local_participant_proxy_data();
        let payload = local.to_parameter_list().to_payload(Endianness::Little);
        self.spdp_writer.remove_all_changes();
        let mut change = self
            .spdp_writer
            .new_change(ChangeKind::Alive, local.key())?;
        change.serialized_payload = payload;
        let seq = self.spdp_writer.add_change(change)?;
        log::trace!("[PDP] announced {} seq={}", self.local_guid, seq);
        Ok(())
    }

    pub fn stop_participant_announcement(&self) {
        self.announcing.store(false, Ordering::Relaxed);
    }

    /// Resume announcing and announce on the next timer tick.
    pub fn reset_participant_announcement(&self) {
        self.announcing.store(true, Ordering::Relaxed);
        if let Some(participant) = self.participant() {
            participant.restart_event(&self.announcement);
        }
    }

    pub fn is_announcing(&self) -> bool {
        self.announcing.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // Remote participants
    // ------------------------------------------------------------------

    fn on_spdp_change(&self, change: &CacheChange) {
        let history = self.spdp_reader.history();
        let handle = change.instance_handle;
        let writer = change.writer_guid;
        let seq = change.sequence_number;
        history.remove_if(|c| {
            c.instance_handle == handle && c.writer_guid == writer && c.sequence_number < seq
        });

        if !change.kind.is_alive() {
            history.remove_if(|c| c.instance_handle == handle);
            let guid = if handle.is_defined() {
                handle.to_guid()
            } else {
                GUID::new(writer.prefix, EntityId::PARTICIPANT)
            };
            if self.remove_remote_participant(&guid) {
                log::info!("[PDP] remote participant {} disposed", guid);
            }
            return;
        }

        let decoded = ParameterList::from_payload(&change.serialized_payload)
            .map_err(Error::from)
            .and_then(|pl| ParticipantProxyData::from_parameter_list(&pl));
        let data = match decoded {
            Ok(data) => data,
            Err(e) => {
                log::warn!("[PDP] dropping participant data from {}: {}", writer, e);
                history.remove_change(&writer, seq);
                return;
            }
        };
        if data.guid.prefix == self.local_guid.prefix {
            return;
        }
        self.on_remote_participant_data(data);
    }

    fn on_remote_participant_data(&self, data: ParticipantProxyData) {
        let (sighting, snapshot) = {
            let mut proxies = self.proxies.lock();
            match proxies
                .iter_mut()
                .skip(1)
                .find(|e| e.data.guid.prefix == data.guid.prefix)
            {
                Some(entry) => {
                    entry.last_seen = Instant::now();
                    let changed = entry.data.update_from(&data);
                    let sighting = if changed {
                        Sighting::Changed
                    } else {
                        Sighting::Unchanged
                    };
                    (sighting, entry.data.clone())
                }
                None => {
                    proxies.push(ParticipantEntry::new(data.clone()));
                    (Sighting::New, data)
                }
            }
        };

        match sighting {
            Sighting::New => {
                log::info!(
                    "[PDP] new remote participant {} '{}'",
                    snapshot.guid,
                    snapshot.participant_name
                );
                self.assign_remote_endpoints(&snapshot);
                self.notify(DiscoveryStatus::Discovered, &snapshot);
                self.reset_participant_announcement();
            }
            Sighting::Changed => {
                log::debug!("[PDP] remote participant {} changed", snapshot.guid);
                self.assign_remote_endpoints(&snapshot);
                self.notify(DiscoveryStatus::ChangedQos, &snapshot);
            }
            Sighting::Unchanged => {}
        }
    }

    fn assign_remote_endpoints(&self, data: &ParticipantProxyData) {
        if let Some(edp) = &self.edp {
            edp.assign_remote_endpoints(self, data);
        }
    }

    /// Forget a remote participant and everything it owns. Returns false if
    /// it was not known.
    pub fn remove_remote_participant(&self, guid: &GUID) -> bool {
        if guid.prefix == self.local_guid.prefix {
            return false;
        }
        let removed = {
            let mut proxies = self.proxies.lock();
            proxies
                .iter()
                .skip(1)
                .position(|e| e.data.guid.prefix == guid.prefix)
                .map(|pos| proxies.remove(pos + 1).data)
        };
        let Some(data) = removed else {
            return false;
        };

        for reader in &data.readers {
            edp::unpair_reader_proxy(self, &reader.guid);
        }
        for writer in &data.writers {
            edp::unpair_writer_proxy(self, &writer.guid);
        }
        if let Some(edp) = &self.edp {
            edp.remove_remote_endpoints(&data);
        }
        self.spdp_reader
            .forget_writer(&GUID::new(data.guid.prefix, EntityId::SPDP_WRITER));
        log::info!(
            "[PDP] removed remote participant {} ({} reader(s), {} writer(s))",
            data.guid,
            data.readers.len(),
            data.writers.len()
        );
        self.notify(DiscoveryStatus::Removed, &data);
        true
    }

    /// Remove every remote participant whose lease expired.
    pub fn check_leases(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<GUID> = self
            .proxies
            .lock()
            .iter()
            .skip(1)
            .filter(|e| e.is_expired(now))
            .map(|e| e.data.guid)
            .collect();
        let mut removed = 0;
        for guid in expired {
            log::info!("[PDP] lease of {} expired", guid);
            if self.remove_remote_participant(&guid) {
                removed += 1;
            }
        }
        removed
    }

    fn notify(&self, status: DiscoveryStatus, data: &ParticipantProxyData) {
        if let Some(participant) = self.participant() {
            participant.notify_discovery(ParticipantDiscoveryInfo {
                status,
                guid: data.guid,
                name: data.participant_name.clone(),
                user_data: data.user_data.clone(),
            });
        }
    }

    // ------------------------------------------------------------------
    // Liveliness
    // ------------------------------------------------------------------

    /// Renew the lease of the participant with `prefix`.
    pub fn assert_remote_participant_liveliness(&self, prefix: GuidPrefix) -> bool {
        let mut proxies = self.proxies.lock();
        match proxies
            .iter_mut()
            .skip(1)
            .find(|e| e.data.guid.prefix == prefix)
        {
            Some(entry) => {
                entry.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Assert liveliness of local writers whose liveliness kind is `kind`.
    pub fn assert_local_writers_liveliness(&self, kind: LivelinessKind) {
        let Some(participant) = self.participant() else {
            return;
        };
        for data in self.local_writers() {
            if data.qos.liveliness.kind != kind {
                continue;
            }
            if let Some(writer) = participant.lookup_writer(&data.guid) {
                writer.assert_liveliness();
            }
        }
    }

    /// Refresh automatic-liveliness writers of participant `prefix` in every
    /// local reader matched with them.
    pub fn assert_remote_writers_liveliness(&self, prefix: GuidPrefix) {
        let writers: Vec<GUID> = {
            let proxies = self.proxies.lock();
            match proxies
                .iter()
                .skip(1)
                .find(|e| e.data.guid.prefix == prefix)
            {
                Some(entry) => entry
                    .data
                    .writers
                    .iter()
                    .filter(|w| w.qos.liveliness.kind == LivelinessKind::Automatic)
                    .map(|w| w.guid)
                    .collect(),
                None => return,
            }
        };
        if writers.is_empty() {
            return;
        }
        let Some(participant) = self.participant() else {
            return;
        };
        for reader in participant.user_readers() {
            for writer in &writers {
                reader.assert_writer_liveliness(writer);
            }
        }
    }

    // ------------------------------------------------------------------
    // Proxy data access
    // ------------------------------------------------------------------

    pub fn local_participant_proxy_data(&self) -> ParticipantProxyData {
        self.proxies.lock()[0].data.clone()
    }

    /// Mutate the local participant data; the next announcement carries a
    /// fresh sample.
    pub(crate) fn update_local<R>(&self, f: impl FnOnce(&mut ParticipantProxyData) -> R) -> R {
        let result = f(&mut self.proxies.lock()[0].data);
        self.local_changed.store(true, Ordering::Release);
        result
    }

    pub fn lookup_participant(&self, guid: &GUID) -> Option<ParticipantProxyData> {
        self.proxies
            .lock()
            .iter()
            .find(|e| e.data.guid.prefix == guid.prefix)
            .map(|e| e.data.clone())
    }

    pub fn remote_participants(&self) -> Vec<ParticipantProxyData> {
        self.proxies
            .lock()
            .iter()
            .skip(1)
            .map(|e| e.data.clone())
            .collect()
    }

    pub fn remote_participant_count(&self) -> usize {
        self.proxies.lock().len() - 1
    }

    pub fn lookup_reader_proxy_data(&self, guid: &GUID) -> Option<ReaderProxyData> {
        self.proxies
            .lock()
            .iter()
            .find(|e| e.data.guid.prefix == guid.prefix)
            .and_then(|e| e.data.readers.iter().find(|r| r.guid == *guid).cloned())
    }

    pub fn lookup_writer_proxy_data(&self, guid: &GUID) -> Option<WriterProxyData> {
        self.proxies
            .lock()
            .iter()
            .find(|e| e.data.guid.prefix == guid.prefix)
            .and_then(|e| e.data.writers.iter().find(|w| w.guid == *guid).cloned())
    }

    /// Store reader proxy data under its participant, replacing an older
    /// copy. False if the participant is unknown.
    pub fn add_reader_proxy_data(&self, data: ReaderProxyData) -> bool {
        let mut proxies = self.proxies.lock();
        let Some(entry) = proxies
            .iter_mut()
            .find(|e| e.data.guid.prefix == data.guid.prefix)
        else {
            return false;
        };
        let readers = &mut entry.data.readers;
        match readers.iter_mut().find(|r| r.guid == data.guid) {
            Some(existing) => *existing = data,
            None => readers.push(data),
        }
        true
    }

    pub fn add_writer_proxy_data(&self, data: WriterProxyData) -> bool {
        let mut proxies = self.proxies.lock();
        let Some(entry) = proxies
            .iter_mut()
            .find(|e| e.data.guid.prefix == data.guid.prefix)
        else {
            return false;
        };
        let writers = &mut entry.data.writers;
        match writers.iter_mut().find(|w| w.guid == data.guid) {
            Some(existing) => *existing = data,
            None => writers.push(data),
        }
        true
    }

    pub fn remove_reader_proxy_data(&self, guid: &GUID) -> Option<ReaderProxyData> {
        let mut proxies = self.proxies.lock();
        let entry = proxies
            .iter_mut()
            .find(|e| e.data.guid.prefix == guid.prefix)?;
        let pos = entry.data.readers.iter().position(|r| r.guid == *guid)?;
        Some(entry.data.readers.remove(pos))
    }

    pub fn remove_writer_proxy_data(&self, guid: &GUID) -> Option<WriterProxyData> {
        let mut proxies = self.proxies.lock();
        let entry = proxies
            .iter_mut()
            .find(|e| e.data.guid.prefix == guid.prefix)?;
        let pos = entry.data.writers.iter().position(|w| w.guid == *guid)?;
        Some(entry.data.writers.remove(pos))
    }

    pub fn remote_readers(&self) -> Vec<ReaderProxyData> {
        self.proxies
            .lock()
            .iter()
            .skip(1)
            .flat_map(|e| e.data.readers.iter().cloned())
            .collect()
    }

    pub fn remote_writers(&self) -> Vec<WriterProxyData> {
        self.proxies
            .lock()
            .iter()
            .skip(1)
            .flat_map(|e| e.data.writers.iter().cloned())
            .collect()
    }

    pub fn local_readers(&self) -> Vec<ReaderProxyData> {
        self.proxies.lock()[0].data.readers.clone()
    }

    pub fn local_writers(&self) -> Vec<WriterProxyData> {
        self.proxies.lock()[0].data.writers.clone()
    }

    // ------------------------------------------------------------------
    // Local endpoints
    // ------------------------------------------------------------------

    pub(crate) fn register_local_writer(
        &self,
        writer: &Writer,
        topic: &TopicAttributes,
        qos: &WriterQos,
    ) -> Result<()> {
        let attrs = writer.core().attributes();
        let data = WriterProxyData {
            guid: writer.guid(),
            participant_guid: self.local_guid,
            unicast_locator_list: attrs.endpoint.unicast_locator_list,
            multicast_locator_list: attrs.endpoint.multicast_locator_list,
            topic_name: topic.topic_name.clone(),
            type_name: topic.topic_data_type.clone(),
            topic_kind: topic.topic_kind,
            qos: qos.clone(),
            user_defined_id: attrs.endpoint.user_defined_id,
            is_alive: true,
        };
        self.add_writer_proxy_data(data.clone());
        match &self.edp {
            Some(edp) => edp.new_local_writer(self, &data),
            None => Ok(()),
        }
    }

    pub(crate) fn register_local_reader(
        &self,
        reader: &Reader,
        topic: &TopicAttributes,
        qos: &ReaderQos,
    ) -> Result<()> {
        let attrs = reader.core().attributes();
        let data = ReaderProxyData {
            guid: reader.guid(),
            participant_guid: self.local_guid,
            unicast_locator_list: attrs.endpoint.unicast_locator_list,
            multicast_locator_list: attrs.endpoint.multicast_locator_list,
            expects_inline_qos: attrs.expects_inline_qos,
            topic_name: topic.topic_name.clone(),
            type_name: topic.topic_data_type.clone(),
            topic_kind: topic.topic_kind,
            qos: qos.clone(),
            user_defined_id: attrs.endpoint.user_defined_id,
            is_alive: true,
        };
        self.add_reader_proxy_data(data.clone());
        match &self.edp {
            Some(edp) => edp.new_local_reader(self, &data),
            None => Ok(()),
        }
    }

    pub(crate) fn update_local_writer(&self, writer: &Writer, qos: &WriterQos) -> Result<()> {
        let mut data = self
            .lookup_writer_proxy_data(&writer.guid())
            .ok_or_else(|| Error::NotFound(format!("writer {} not registered", writer.guid())))?;
        data.qos = qos.clone();
        self.add_writer_proxy_data(data.clone());
        match &self.edp {
            Some(edp) => edp.update_local_writer(self, &data),
            None => Ok(()),
        }
    }

    pub(crate) fn update_local_reader(&self, reader: &Reader, qos: &ReaderQos) -> Result<()> {
        let mut data = self
            .lookup_reader_proxy_data(&reader.guid())
            .ok_or_else(|| Error::NotFound(format!("reader {} not registered", reader.guid())))?;
        data.qos = qos.clone();
        self.add_reader_proxy_data(data.clone());
        match &self.edp {
            Some(edp) => edp.update_local_reader(self, &data),
            None => Ok(()),
        }
    }

    pub(crate) fn unregister_local_writer(&self, guid: &GUID) {
        if let Some(data) = self.remove_writer_proxy_data(guid) {
            if let Some(edp) = &self.edp {
                edp.remove_local_writer(self, &data);
            }
        }
    }

    pub(crate) fn unregister_local_reader(&self, guid: &GUID) {
        if let Some(data) = self.remove_reader_proxy_data(guid) {
            if let Some(edp) = &self.edp {
                edp.remove_local_reader(self, &data);
            }
        }
    }

    /// Activate a remote endpoint from the static table. Only static EDP
    /// knows remote endpoints by user id.
    pub fn new_remote_endpoint_statically_discovered(
        &self,
        participant: GUID,
        user_id: i16,
        kind: EndpointKind,
    ) -> bool {
        let Some(Edp::Static(edp)) = &self.edp else {
            return false;
        };
        let Some(pdata) = self.lookup_participant(&participant) else {
            return false;
        };
        if pdata.guid.prefix == self.local_guid.prefix {
            return false;
        }
        edp.new_remote_endpoint(self, &pdata, user_id, None, kind)
    }
}

impl std::fmt::Debug for Pdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdp")
            .field("local_guid", &self.local_guid)
            .field("remote_participants", &self.remote_participant_count())
            .finish()
    }
}

/// Feeds SPDP samples and writer activity into the PDP.
struct SpdpListener {
    pdp: Weak<Pdp>,
}

impl ReaderListener for SpdpListener {
    fn on_new_cache_change_added(&self, _reader: GUID, change: &CacheChange) {
        if let Some(pdp) = self.pdp.upgrade() {
            pdp.on_spdp_change(change);
        }
    }

    /// Repeated announcements are dropped as duplicates but still prove the
    /// participant alive.
    fn on_writer_activity(&self, _reader: GUID, writer: GUID) {
        if let Some(pdp) = self.pdp.upgrade() {
            if pdp.assert_remote_participant_liveliness(writer.prefix) {
                pdp.assert_remote_writers_liveliness(writer.prefix);
            }
        }
    }
}

struct AnnouncementEvent {
    pdp: Weak<Pdp>,
    period: Duration,
}

impl TimedEvent for AnnouncementEvent {
    fn name(&self) -> &str {
        "spdp-announcement"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn on_event(&self) -> EventOutcome {
        let Some(pdp) = self.pdp.upgrade() else {
            return EventOutcome::Cancel;
        };
        if pdp.is_announcing() {
            if let Err(e) = pdp.announce_participant_state(false) {
                log::warn!("[PDP] announcement of {} failed: {}", pdp.local_guid, e);
            }
        }
        EventOutcome::Continue
    }
}

struct LeaseCheckEvent {
    pdp: Weak<Pdp>,
    period: Duration,
}

impl TimedEvent for LeaseCheckEvent {
    fn name(&self) -> &str {
        "spdp-lease-check"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn on_event(&self) -> EventOutcome {
        match self.pdp.upgrade() {
            Some(pdp) => {
                pdp.check_leases();
                EventOutcome::Continue
            }
            None => EventOutcome::Cancel,
        }
    }
}
