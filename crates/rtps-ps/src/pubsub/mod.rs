// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed publish/subscribe API.
//!
//! A [`Participant`] wraps one [`RtpsParticipant`](crate::participant::RtpsParticipant),
//! keeps the registry of [`TopicDataType`]s and creates [`Publisher`]s and
//! [`Subscriber`]s. Discovery and matching notifications are available
//! both as listener callbacks and as `crossbeam` event queues.

mod participant;
mod publisher;
mod subscriber;
mod topic;

pub use participant::Participant;
pub use publisher::{Publisher, PublisherAttributes, PublisherListener};
pub use subscriber::{Sample, SampleInfo, Subscriber, SubscriberAttributes, SubscriberListener};
pub use topic::{BytesType, TopicDataType};

pub use crate::participant::{DiscoveryStatus, ParticipantListener};

use crate::endpoint::MatchingStatus;
use crate::protocol::guid::GUID;
use crossbeam::channel::{Sender, TrySendError};

/// Remote participant discovered, changed or removed.
pub type ParticipantEvent = crate::participant::ParticipantDiscoveryInfo;

/// Queue depth of every event channel. Older events are kept; new ones are
/// dropped while the queue is full.
pub(crate) const EVENT_QUEUE_DEPTH: usize = 256;

/// A local endpoint got matched with, or unmatched from, a remote one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchEvent {
    pub local: GUID,
    pub status: MatchingStatus,
    pub remote: GUID,
}

pub(crate) fn push_event<E: std::fmt::Debug>(tx: &Sender<E>, event: E) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(e)) => {
            log::debug!("[pubsub] event queue full, dropping {:?}", e);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}
