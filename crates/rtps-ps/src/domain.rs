// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Explicit registry of the participants created by an application.
//!
//! A [`Domain`] owns one transport shared by all its participants. Dropping
//! the domain destroys every participant it still holds.

use crate::config::ParticipantAttributes;
use crate::error::{Error, Result};
use crate::participant::ParticipantListener;
use crate::pubsub::{
    Participant, Publisher, PublisherAttributes, Subscriber, SubscriberAttributes, TopicDataType,
};
use crate::transport::{Transport, UdpTransport};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Domain {
    transport: Arc<dyn Transport>,
    participants: Mutex<Vec<Arc<Participant>>>,
}

impl Domain {
    /// Domain over a UDPv4 transport.
    pub fn new() -> Result<Self> {
        let buffer = ParticipantAttributes::default().send_socket_buffer_size;
        let transport: Arc<dyn Transport> = Arc::new(UdpTransport::new(buffer)?);
        Ok(Self::with_transport(transport))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            participants: Mutex::new(Vec::new()),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn create_participant(&self, attributes: ParticipantAttributes) -> Result<Arc<Participant>> {
        self.create_participant_with_listener(attributes, None)
    }

    /// With `participant_id < 0` the first free id of the domain is taken.
    pub fn create_participant_with_listener(
        &self,
        attributes: ParticipantAttributes,
        listener: Option<Arc<dyn ParticipantListener>>,
    ) -> Result<Arc<Participant>> {
        let participant = Participant::new(attributes, self.transport.clone(), listener)?;
        self.participants.lock().push(participant.clone());
        Ok(participant)
    }

    /// Destroy a participant of this domain. False if it is not ours.
    pub fn remove_participant(&self, participant: &Arc<Participant>) -> bool {
        let removed = {
            let mut list = self.participants.lock();
            let guid = participant.guid();
            match list.iter().position(|p| p.guid() == guid) {
                Some(pos) => list.remove(pos),
                None => return false,
            }
        };
        removed.destroy();
        true
    }

    pub fn participants(&self) -> Vec<Arc<Participant>> {
        self.participants.lock().clone()
    }

    pub fn register_type<T: 'static>(
        &self,
        participant: &Arc<Participant>,
        data_type: Arc<dyn TopicDataType<T>>,
    ) -> Result<()> {
        self.ensure_member(participant)?;
        participant.register_type(data_type)
    }

    pub fn create_publisher<T: 'static>(
        &self,
        participant: &Arc<Participant>,
        attributes: PublisherAttributes,
    ) -> Result<Publisher<T>> {
        self.ensure_member(participant)?;
        participant.create_publisher(attributes)
    }

    pub fn create_subscriber<T: 'static>(
        &self,
        participant: &Arc<Participant>,
        attributes: SubscriberAttributes,
    ) -> Result<Subscriber<T>> {
        self.ensure_member(participant)?;
        participant.create_subscriber(attributes)
    }

    /// Remove a publisher from whichever participant of the domain owns it.
    pub fn remove_publisher<T>(&self, publisher: &Publisher<T>) -> bool {
        let prefix = publisher.guid().prefix;
        self.owner(prefix)
            .map(|p| p.remove_publisher(publisher))
            .unwrap_or(false)
    }

    pub fn remove_subscriber<T>(&self, subscriber: &Subscriber<T>) -> bool {
        let prefix = subscriber.guid().prefix;
        self.owner(prefix)
            .map(|p| p.remove_subscriber(subscriber))
            .unwrap_or(false)
    }

    /// Destroy every participant of the domain.
    pub fn stop_all(&self) {
        let participants = std::mem::take(&mut *self.participants.lock());
        if !participants.is_empty() {
            log::info!("[Domain] stopping {} participant(s)", participants.len());
        }
        for participant in participants {
            participant.destroy();
        }
    }

    fn owner(&self, prefix: crate::protocol::guid::GuidPrefix) -> Option<Arc<Participant>> {
        self.participants
            .lock()
            .iter()
            .find(|p| p.guid().prefix == prefix)
            .cloned()
    }

    fn ensure_member(&self, participant: &Arc<Participant>) -> Result<()> {
        let guid = participant.guid();
        if self.participants.lock().iter().any(|p| p.guid() == guid) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("participant {} in this domain", guid)))
        }
    }
}

impl Drop for Domain {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("participants", &self.participants.lock().len())
            .finish()
    }
}
