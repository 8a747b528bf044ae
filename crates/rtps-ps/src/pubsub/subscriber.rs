// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed subscriber over one RTPS reader.

use super::topic::TopicDataType;
use super::{push_event, MatchEvent, EVENT_QUEUE_DEPTH};
use crate::endpoint::{MatchingInfo, ReaderTimes};
use crate::error::{Error, Result};
use crate::history::CacheChange;
use crate::participant::RtpsParticipant;
use crate::protocol::guid::{InstanceHandle, GUID};
use crate::protocol::locator::LocatorList;
use crate::protocol::types::{ChangeKind, SequenceNumber, Time};
use crate::qos::{ReaderQos, TopicAttributes};
use crate::reader::{Reader, ReaderListener};
use arc_swap::ArcSwap;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to create a [`Subscriber`].
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriberAttributes {
    pub topic: TopicAttributes,
    pub qos: ReaderQos,
    pub times: ReaderTimes,
    pub unicast_locator_list: LocatorList,
    pub multicast_locator_list: LocatorList,
    pub expects_inline_qos: bool,
    pub user_defined_id: i16,
    pub entity_id: i32,
}

impl Default for SubscriberAttributes {
    fn default() -> Self {
        Self {
            topic: TopicAttributes::default(),
            qos: ReaderQos::default(),
            times: ReaderTimes::default(),
            unicast_locator_list: LocatorList::new(),
            multicast_locator_list: LocatorList::new(),
            expects_inline_qos: false,
            user_defined_id: -1,
            entity_id: -1,
        }
    }
}

/// Callbacks of a subscriber, run on the listen thread that delivered the
/// data. Reading from inside `on_new_data_message` is allowed.
pub trait SubscriberListener: Send + Sync {
    fn on_new_data_message(&self, _subscriber: GUID) {}
    fn on_subscription_matched(&self, _subscriber: GUID, _info: MatchingInfo) {}
}

/// Metadata of a received sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleInfo {
    pub kind: ChangeKind,
    pub writer_guid: GUID,
    pub instance_handle: InstanceHandle,
    pub sequence_number: SequenceNumber,
    pub source_timestamp: Time,
}

/// One sample; `data` is `None` for dispose and unregister notifications.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample<T> {
    pub data: Option<T>,
    pub info: SampleInfo,
}

pub(crate) struct SubscriberReaderListener {
    events: Sender<MatchEvent>,
    user: Option<Arc<dyn SubscriberListener>>,
}

impl SubscriberReaderListener {
    pub(crate) fn new(
        events: Sender<MatchEvent>,
        user: Option<Arc<dyn SubscriberListener>>,
    ) -> Self {
        Self { events, user }
    }
}

impl ReaderListener for SubscriberReaderListener {
    fn on_new_cache_change_added(&self, reader: GUID, _change: &CacheChange) {
        if let Some(l) = &self.user {
            l.on_new_data_message(reader);
        }
    }

    fn on_reader_matched(&self, reader: GUID, info: MatchingInfo) {
        push_event(
            &self.events,
            MatchEvent {
                local: reader,
                status: info.status,
                remote: info.remote_endpoint_guid,
            },
        );
        if let Some(l) = &self.user {
            l.on_subscription_matched(reader, info);
        }
    }
}

/// Receives samples of type `T` from one topic.
pub struct Subscriber<T> {
    participant: Arc<RtpsParticipant>,
    reader: Reader,
    data_type: Arc<dyn TopicDataType<T>>,
    attributes: ArcSwap<SubscriberAttributes>,
    matches: Receiver<MatchEvent>,
}

impl<T> Subscriber<T> {
    pub(crate) fn new(
        participant: Arc<RtpsParticipant>,
        reader: Reader,
        data_type: Arc<dyn TopicDataType<T>>,
        attributes: SubscriberAttributes,
        matches: Receiver<MatchEvent>,
    ) -> Self {
        Self {
            participant,
            reader,
            data_type,
            attributes: ArcSwap::from_pointee(attributes),
            matches,
        }
    }

    pub(crate) fn event_channel() -> (Sender<MatchEvent>, Receiver<MatchEvent>) {
        channel::bounded(EVENT_QUEUE_DEPTH)
    }

    pub fn guid(&self) -> GUID {
        self.reader.guid()
    }

    pub fn attributes(&self) -> Arc<SubscriberAttributes> {
        self.attributes.load_full()
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    pub fn matched_writer_count(&self) -> usize {
        self.reader.matched_writer_count()
    }

    pub fn match_events(&self) -> &Receiver<MatchEvent> {
        &self.matches
    }

    /// Oldest unread sample, marked read but kept in the history.
    pub fn read_next_data(&self) -> Result<Option<Sample<T>>> {
        match self.reader.next_unread() {
            Some(change) => self.to_sample(&change).map(Some),
            None => Ok(None),
        }
    }

    /// Oldest sample, removed from the history.
    pub fn take_next_data(&self) -> Result<Option<Sample<T>>> {
        match self.reader.next_untaken() {
            Some(change) => self.to_sample(&change).map(Some),
            None => Ok(None),
        }
    }

    /// Block until an unread sample exists or `timeout` elapses.
    pub fn wait_for_unread_message(&self, timeout: Duration) -> bool {
        self.reader.history().wait_for_unread(timeout)
    }

    pub fn unread_count(&self) -> usize {
        self.reader.history().unread_count()
    }

    /// Replace the QoS and timing of a live subscriber. Topic, locators and
    /// identity are fixed at creation.
    pub fn update_attributes(&self, attributes: SubscriberAttributes) -> Result<()> {
        let current = self.attributes.load_full();
        if attributes.topic != current.topic {
            return Err(Error::InvalidAttributes(
                "subscriber topic cannot change".into(),
            ));
        }
        if attributes.unicast_locator_list != current.unicast_locator_list
            || attributes.multicast_locator_list != current.multicast_locator_list
        {
            return Err(Error::InvalidAttributes(
                "subscriber locator lists cannot change".into(),
            ));
        }
        if attributes.user_defined_id != current.user_defined_id
            || attributes.entity_id != current.entity_id
            || attributes.expects_inline_qos != current.expects_inline_qos
        {
            return Err(Error::InvalidAttributes(
                "subscriber identity cannot change".into(),
            ));
        }
        attributes.qos.check_qos()?;
        if !current.qos.can_qos_be_updated(&attributes.qos) {
            return Err(Error::InvalidQos(
                "subscriber QoS change not allowed".into(),
            ));
        }

        let mut qos = current.qos.clone();
        qos.set_qos(&attributes.qos, false);
        self.reader.update_times(attributes.times);
        self.participant.update_local_reader(&self.reader, &qos)?;
        self.attributes.store(Arc::new(SubscriberAttributes {
            qos,
            ..attributes
        }));
        log::debug!("[Subscriber] {} attributes updated", self.guid());
        Ok(())
    }

    fn to_sample(&self, change: &CacheChange) -> Result<Sample<T>> {
        let info = SampleInfo {
            kind: change.kind,
            writer_guid: change.writer_guid,
            instance_handle: change.instance_handle,
            sequence_number: change.sequence_number,
            source_timestamp: change.source_timestamp,
        };
        let data = if change.kind.is_alive() {
            Some(self.data_type.deserialize(&change.serialized_payload)?)
        } else {
            None
        };
        Ok(Sample { data, info })
    }
}

impl<T> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attributes = self.attributes.load();
        f.debug_struct("Subscriber")
            .field("guid", &self.guid())
            .field("topic", &attributes.topic.topic_name)
            .field("type", &self.data_type.name())
            .finish()
    }
}
