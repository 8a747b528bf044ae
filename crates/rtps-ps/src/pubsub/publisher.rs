// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed publisher over one RTPS writer.

use super::topic::TopicDataType;
use super::{push_event, MatchEvent, EVENT_QUEUE_DEPTH};
use crate::endpoint::{MatchingInfo, WriterTimes};
use crate::error::{Error, Result};
use crate::participant::RtpsParticipant;
use crate::protocol::guid::{InstanceHandle, GUID};
use crate::protocol::locator::LocatorList;
use crate::protocol::types::{ChangeKind, TopicKind};
use crate::qos::{TopicAttributes, WriterQos};
use crate::writer::{Writer, WriterListener};
use arc_swap::ArcSwap;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to create a [`Publisher`].
#[derive(Clone, Debug, PartialEq)]
pub struct PublisherAttributes {
    pub topic: TopicAttributes,
    pub qos: WriterQos,
    pub times: WriterTimes,
    /// Empty lists take the participant defaults.
    pub unicast_locator_list: LocatorList,
    pub multicast_locator_list: LocatorList,
    /// Application id used by static discovery; must be positive there.
    pub user_defined_id: i16,
    /// Requested entity key; `<= 0` lets the participant allocate one.
    pub entity_id: i32,
}

impl Default for PublisherAttributes {
    fn default() -> Self {
        Self {
            topic: TopicAttributes::default(),
            qos: WriterQos::default(),
            times: WriterTimes::default(),
            unicast_locator_list: LocatorList::new(),
            multicast_locator_list: LocatorList::new(),
            user_defined_id: -1,
            entity_id: -1,
        }
    }
}

/// Callbacks of a publisher. Runs on the thread that processed the match.
pub trait PublisherListener: Send + Sync {
    fn on_publication_matched(&self, _publisher: GUID, _info: MatchingInfo) {}
}

pub(crate) struct PublisherWriterListener {
    events: Sender<MatchEvent>,
    user: Option<Arc<dyn PublisherListener>>,
}

impl PublisherWriterListener {
    pub(crate) fn new(
        events: Sender<MatchEvent>,
        user: Option<Arc<dyn PublisherListener>>,
    ) -> Self {
        Self { events, user }
    }
}

impl WriterListener for PublisherWriterListener {
    fn on_writer_matched(&self, writer: GUID, info: MatchingInfo) {
        push_event(
            &self.events,
            MatchEvent {
                local: writer,
                status: info.status,
                remote: info.remote_endpoint_guid,
            },
        );
        if let Some(l) = &self.user {
            l.on_publication_matched(writer, info);
        }
    }
}

/// Writes samples of type `T` on one topic.
///
/// Created by [`Participant::create_publisher`](super::Participant::create_publisher).
/// Dropping a publisher does not delete its writer; use
/// [`Participant::remove_publisher`](super::Participant::remove_publisher).
pub struct Publisher<T> {
    participant: Arc<RtpsParticipant>,
    writer: Writer,
    data_type: Arc<dyn TopicDataType<T>>,
    attributes: ArcSwap<PublisherAttributes>,
    matches: Receiver<MatchEvent>,
}

impl<T> Publisher<T> {
    pub(crate) fn new(
        participant: Arc<RtpsParticipant>,
        writer: Writer,
        data_type: Arc<dyn TopicDataType<T>>,
        attributes: PublisherAttributes,
        matches: Receiver<MatchEvent>,
    ) -> Self {
        Self {
            participant,
            writer,
            data_type,
            attributes: ArcSwap::from_pointee(attributes),
            matches,
        }
    }

    /// Channel pair handed to the writer listener at creation.
    pub(crate) fn event_channel() -> (Sender<MatchEvent>, Receiver<MatchEvent>) {
        channel::bounded(EVENT_QUEUE_DEPTH)
    }

    pub fn guid(&self) -> GUID {
        self.writer.guid()
    }

    pub fn attributes(&self) -> Arc<PublisherAttributes> {
        self.attributes.load_full()
    }

    pub fn writer(&self) -> &Writer {
        &self.writer
    }

    pub fn matched_reader_count(&self) -> usize {
        self.writer.matched_reader_count()
    }

    /// Match and unmatch notifications, oldest first.
    pub fn match_events(&self) -> &Receiver<MatchEvent> {
        &self.matches
    }

    /// Publish a new sample.
    pub fn write(&self, data: &T) -> Result<()> {
        self.create_new_change(ChangeKind::Alive, data)
    }

    /// Dispose the instance `data` belongs to. Keyed topics only.
    pub fn dispose(&self, data: &T) -> Result<()> {
        self.create_new_change(ChangeKind::NotAliveDisposed, data)
    }

    pub fn unregister(&self, data: &T) -> Result<()> {
        self.create_new_change(ChangeKind::NotAliveUnregistered, data)
    }

    pub fn dispose_and_unregister(&self, data: &T) -> Result<()> {
        self.create_new_change(ChangeKind::NotAliveDisposedUnregistered, data)
    }

    /// Drop every change from the writer history.
    pub fn remove_all_changes(&self) -> usize {
        self.writer.remove_all_changes()
    }

    /// Block until every matched reader acknowledged everything written so
    /// far. Best-effort publishers return true at once.
    pub fn wait_for_all_acked(&self, timeout: Duration) -> bool {
        self.writer.wait_for_all_acked(timeout)
    }

    /// Replace the QoS and timing of a live publisher.
    ///
    /// Topic and locator lists are fixed at creation. QoS kinds that cannot
    /// change are rejected with `InvalidQos`.
    pub fn update_attributes(&self, attributes: PublisherAttributes) -> Result<()> {
        let current = self.attributes.load_full();
        if attributes.topic != current.topic {
            return Err(Error::InvalidAttributes(
                "publisher topic cannot change".into(),
            ));
        }
        if attributes.unicast_locator_list != current.unicast_locator_list
            || attributes.multicast_locator_list != current.multicast_locator_list
        {
            return Err(Error::InvalidAttributes(
                "publisher locator lists cannot change".into(),
            ));
        }
        if attributes.user_defined_id != current.user_defined_id
            || attributes.entity_id != current.entity_id
        {
            return Err(Error::InvalidAttributes(
                "publisher identity cannot change".into(),
            ));
        }
        attributes.qos.check_qos()?;
        if !current.qos.can_qos_be_updated(&attributes.qos) {
            return Err(Error::InvalidQos(
                "publisher QoS change not allowed".into(),
            ));
        }

        let mut qos = current.qos.clone();
        qos.set_qos(&attributes.qos, false);
        self.writer.update_times(attributes.times);
        self.participant.update_local_writer(&self.writer, &qos)?;
        self.attributes.store(Arc::new(PublisherAttributes {
            qos,
            ..attributes
        }));
        log::debug!("[Publisher] {} attributes updated", self.guid());
        Ok(())
    }

    fn create_new_change(&self, kind: ChangeKind, data: &T) -> Result<()> {
        let keyed = self.writer.history().topic_kind() == TopicKind::WithKey;
        if !kind.is_alive() && !keyed {
            return Err(Error::InvalidState(format!(
                "{:?} needs a keyed topic",
                kind
            )));
        }
        let handle = if keyed {
            self.data_type.get_key(data).unwrap_or_default()
        } else {
            InstanceHandle::default()
        };

        let mut change = self.writer.new_change(kind, handle)?;
        if let Err(e) = self.data_type.serialize(data, &mut change.serialized_payload) {
            self.writer.history().release_cache(change);
            return Err(e);
        }
        let size = change.serialized_payload.len();
        let max = self.data_type.type_size();
        if size > max {
            self.writer.history().release_cache(change);
            return Err(Error::PayloadTooLarge { size, max });
        }
        if kind.is_alive() && change.serialized_payload.is_empty() {
            self.writer.history().release_cache(change);
            return Err(Error::Serialization("empty serialized sample".into()));
        }

        let seq = self.writer.add_change(change)?;
        log::trace!("[Publisher] {} wrote {:?} seq {}", self.guid(), kind, seq);
        Ok(())
    }
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attributes = self.attributes.load();
        f.debug_struct("Publisher")
            .field("guid", &self.guid())
            .field("topic", &attributes.topic.topic_name)
            .field("type", &self.data_type.name())
            .finish()
    }
}
