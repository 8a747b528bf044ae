// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed participant: type registry plus publisher and subscriber factory.

use super::publisher::{Publisher, PublisherAttributes, PublisherListener, PublisherWriterListener};
use super::subscriber::{
    Subscriber, SubscriberAttributes, SubscriberListener, SubscriberReaderListener,
};
use super::topic::TopicDataType;
use super::{push_event, ParticipantEvent, EVENT_QUEUE_DEPTH};
use crate::config::ParticipantAttributes;
use crate::endpoint::{EndpointKind, ReaderAttributes, WriterAttributes};
use crate::error::{Error, Result};
use crate::history::{HistoryAttributes, ReaderHistory, WriterHistory};
use crate::participant::{ParticipantDiscoveryInfo, ParticipantListener, RtpsParticipant};
use crate::protocol::constants::PAYLOAD_MAX_SIZE;
use crate::protocol::guid::GUID;
use crate::protocol::locator::LocatorList;
use crate::protocol::types::TopicKind;
use crate::qos::TopicAttributes;
use crate::reader::ReaderListener;
use crate::transport::Transport;
use crate::writer::WriterListener;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;

struct RegisteredType {
    name: String,
    /// `Arc<dyn TopicDataType<T>>` for the `T` it was registered with.
    erased: Arc<dyn Any + Send + Sync>,
}

/// Forwards discovery callbacks to the event queue and the user listener.
struct DiscoveryForwarder {
    events: Sender<ParticipantEvent>,
    user: Option<Arc<dyn ParticipantListener>>,
}

impl ParticipantListener for DiscoveryForwarder {
    fn on_participant_discovery(&self, info: ParticipantDiscoveryInfo) {
        if let Some(l) = &self.user {
            l.on_participant_discovery(info.clone());
        }
        push_event(&self.events, info);
    }
}

/// Entry point of the typed API.
pub struct Participant {
    rtps: Arc<RtpsParticipant>,
    types: RwLock<Vec<RegisteredType>>,
    events: Receiver<ParticipantEvent>,
}

impl Participant {
    /// Create a participant on `transport` and start discovery.
    pub fn new(
        attributes: ParticipantAttributes,
        transport: Arc<dyn Transport>,
        listener: Option<Arc<dyn ParticipantListener>>,
    ) -> Result<Arc<Self>> {
        let (tx, rx) = channel::bounded(EVENT_QUEUE_DEPTH);
        let forwarder: Arc<dyn ParticipantListener> = Arc::new(DiscoveryForwarder {
            events: tx,
            user: listener,
        });
        let rtps = RtpsParticipant::new(attributes, transport, Some(forwarder))?;
        Ok(Arc::new(Self {
            rtps,
            types: RwLock::new(Vec::new()),
            events: rx,
        }))
    }

    pub fn guid(&self) -> GUID {
        self.rtps.guid()
    }

    pub fn attributes(&self) -> &ParticipantAttributes {
        self.rtps.attributes()
    }

    pub fn rtps(&self) -> &Arc<RtpsParticipant> {
        &self.rtps
    }

    /// Participant discovery events, oldest first.
    pub fn events(&self) -> &Receiver<ParticipantEvent> {
        &self.events
    }

    /// Number of remote participants currently alive.
    pub fn remote_participant_count(&self) -> usize {
        self.rtps
            .pdp()
            .map(|pdp| pdp.remote_participant_count())
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Register a data type under its name.
    pub fn register_type<T: 'static>(&self, data_type: Arc<dyn TopicDataType<T>>) -> Result<()> {
        let name = data_type.name().to_string();
        if name.is_empty() {
            return Err(Error::InvalidAttributes("type name is empty".into()));
        }
        let size = data_type.type_size();
        if size == 0 || size > PAYLOAD_MAX_SIZE {
            return Err(Error::InvalidAttributes(format!(
                "type {} size {} outside 1..={}",
                name, size, PAYLOAD_MAX_SIZE
            )));
        }

        let mut types = self.types.write();
        if types.iter().any(|t| t.name == name) {
            return Err(Error::TypeAlreadyRegistered(name));
        }
        log::info!("[Participant] {} registered type {} ({} bytes)", self.guid(), name, size);
        types.push(RegisteredType {
            name,
            erased: Arc::new(data_type),
        });
        Ok(())
    }

    pub fn is_type_registered(&self, name: &str) -> bool {
        self.types.read().iter().any(|t| t.name == name)
    }

    fn registered_type<T: 'static>(&self, name: &str) -> Result<Arc<dyn TopicDataType<T>>> {
        let types = self.types.read();
        let entry = types
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::TypeNotRegistered(name.to_string()))?;
        entry
            .erased
            .downcast_ref::<Arc<dyn TopicDataType<T>>>()
            .cloned()
            .ok_or_else(|| {
                Error::TypeNotRegistered(format!("{} (registered for another sample type)", name))
            })
    }

    // ------------------------------------------------------------------
    // Publishers
    // ------------------------------------------------------------------

    pub fn create_publisher<T: 'static>(
        &self,
        attributes: PublisherAttributes,
    ) -> Result<Publisher<T>> {
        self.create_publisher_with_listener(attributes, None)
    }

    /// Create a publisher; its writer is announced through endpoint
    /// discovery before this returns.
    pub fn create_publisher_with_listener<T: 'static>(
        &self,
        attributes: PublisherAttributes,
        listener: Option<Arc<dyn PublisherListener>>,
    ) -> Result<Publisher<T>> {
        let data_type = self.registered_type::<T>(&attributes.topic.topic_data_type)?;
        self.check_endpoint(
            "publisher",
            &attributes.topic,
            data_type.is_keyed(),
            attributes.user_defined_id,
            [&attributes.unicast_locator_list, &attributes.multicast_locator_list],
        )?;
        attributes.qos.check_qos()?;

        let topic = &attributes.topic;
        let mut writer_attributes =
            WriterAttributes::new(topic.topic_kind, attributes.qos.reliability.kind);
        writer_attributes.endpoint.durability_kind = attributes.qos.durability.kind;
        writer_attributes.endpoint.unicast_locator_list = attributes.unicast_locator_list.clone();
        writer_attributes.endpoint.multicast_locator_list =
            attributes.multicast_locator_list.clone();
        writer_attributes.endpoint.user_defined_id = attributes.user_defined_id;
        writer_attributes.endpoint.entity_id = attributes.entity_id;
        writer_attributes.times = attributes.times;

        let history = Arc::new(WriterHistory::new(
            history_attributes(data_type.type_size(), topic),
            topic.history_qos,
            topic.resource_limits_qos,
            topic.topic_kind,
        ));
        let (tx, rx) = Publisher::<T>::event_channel();
        let writer_listener: Arc<dyn WriterListener> =
            Arc::new(PublisherWriterListener::new(tx, listener));
        let writer =
            self.rtps
                .create_writer(writer_attributes, history, Some(writer_listener), None, false)?;

        if let Err(e) = self.rtps.register_writer(&writer, topic, &attributes.qos) {
            log::warn!("[Participant] cannot announce writer {}: {}", writer.guid(), e);
            self.rtps.delete_user_endpoint(&writer.guid());
            return Err(e);
        }
        log::info!(
            "[Participant] publisher {} on topic {} ({})",
            writer.guid(),
            topic.topic_name,
            topic.topic_data_type
        );
        Ok(Publisher::new(self.rtps.clone(), writer, data_type, attributes, rx))
    }

    /// Delete the publisher's writer and withdraw its announcement.
    pub fn remove_publisher<T>(&self, publisher: &Publisher<T>) -> bool {
        self.rtps.delete_user_endpoint(&publisher.guid())
    }

    // ------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------

    pub fn create_subscriber<T: 'static>(
        &self,
        attributes: SubscriberAttributes,
    ) -> Result<Subscriber<T>> {
        self.create_subscriber_with_listener(attributes, None)
    }

    pub fn create_subscriber_with_listener<T: 'static>(
        &self,
        attributes: SubscriberAttributes,
        listener: Option<Arc<dyn SubscriberListener>>,
    ) -> Result<Subscriber<T>> {
        let data_type = self.registered_type::<T>(&attributes.topic.topic_data_type)?;
        self.check_endpoint(
            "subscriber",
            &attributes.topic,
            data_type.is_keyed(),
            attributes.user_defined_id,
            [&attributes.unicast_locator_list, &attributes.multicast_locator_list],
        )?;
        attributes.qos.check_qos()?;

        let topic = &attributes.topic;
        let mut reader_attributes =
            ReaderAttributes::new(topic.topic_kind, attributes.qos.reliability.kind);
        reader_attributes.endpoint.durability_kind = attributes.qos.durability.kind;
        reader_attributes.endpoint.unicast_locator_list = attributes.unicast_locator_list.clone();
        reader_attributes.endpoint.multicast_locator_list =
            attributes.multicast_locator_list.clone();
        reader_attributes.endpoint.user_defined_id = attributes.user_defined_id;
        reader_attributes.endpoint.entity_id = attributes.entity_id;
        reader_attributes.expects_inline_qos = attributes.expects_inline_qos;
        reader_attributes.times = attributes.times;

        let history = Arc::new(ReaderHistory::new(
            history_attributes(data_type.type_size(), topic),
            topic.history_qos,
            topic.resource_limits_qos,
            topic.topic_kind,
        ));
        let (tx, rx) = Subscriber::<T>::event_channel();
        let reader_listener: Arc<dyn ReaderListener> =
            Arc::new(SubscriberReaderListener::new(tx, listener));
        let reader =
            self.rtps
                .create_reader(reader_attributes, history, Some(reader_listener), None, false)?;

        if let Err(e) = self.rtps.register_reader(&reader, topic, &attributes.qos) {
            log::warn!("[Participant] cannot announce reader {}: {}", reader.guid(), e);
            self.rtps.delete_user_endpoint(&reader.guid());
            return Err(e);
        }
        log::info!(
            "[Participant] subscriber {} on topic {} ({})",
            reader.guid(),
            topic.topic_name,
            topic.topic_data_type
        );
        Ok(Subscriber::new(self.rtps.clone(), reader, data_type, attributes, rx))
    }

    pub fn remove_subscriber<T>(&self, subscriber: &Subscriber<T>) -> bool {
        self.rtps.delete_user_endpoint(&subscriber.guid())
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Activate a remote endpoint named in the static endpoint description.
    pub fn new_remote_endpoint_discovered(
        &self,
        participant: GUID,
        user_id: i16,
        kind: EndpointKind,
    ) -> bool {
        self.rtps.new_remote_endpoint_discovered(participant, user_id, kind)
    }

    /// Stop discovery and delete every endpoint. Idempotent.
    pub fn destroy(&self) {
        self.rtps.destroy();
    }

    fn check_endpoint(
        &self,
        what: &str,
        topic: &TopicAttributes,
        keyed_type: bool,
        user_defined_id: i16,
        locators: [&LocatorList; 2],
    ) -> Result<()> {
        if topic.topic_kind == TopicKind::WithKey && !keyed_type {
            return Err(Error::InvalidAttributes(format!(
                "{} on keyed topic {} needs a keyed type",
                what, topic.topic_name
            )));
        }
        if self.rtps.attributes().builtin.use_static_edp && user_defined_id <= 0 {
            return Err(Error::InvalidAttributes(format!(
                "static discovery needs a positive user id for the {}",
                what
            )));
        }
        for list in locators {
            if let Some(bad) = list.first_invalid() {
                return Err(Error::InvalidLocatorList(format!(
                    "{} list contains {}",
                    what, bad
                )));
            }
        }
        topic.check_qos()
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.rtps.destroy();
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("guid", &self.guid())
            .field("name", &self.attributes().name)
            .field("types", &self.types.read().len())
            .finish()
    }
}

/// Pool sizing from the topic's resource limits; the pool itself is
/// unbounded, the history enforces the limits.
fn history_attributes(type_size: usize, topic: &TopicAttributes) -> HistoryAttributes {
    let initial = topic.resource_limits_qos.allocated_samples.max(0) as usize;
    HistoryAttributes::new(type_size, initial, 0)
}
