// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # rtps-ps - RTPS publish-subscribe middleware
//!
//! Participants discover each other, exchange typed topic data through
//! publishers and subscribers, and keep reliable or best-effort delivery
//! over an unreliable datagram transport.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rtps_ps::config::ParticipantAttributes;
//! use rtps_ps::domain::Domain;
//! use rtps_ps::pubsub::PublisherAttributes;
//! # use rtps_ps::pubsub::TopicDataType;
//! # use std::sync::Arc;
//! # fn ty() -> Arc<dyn TopicDataType<Vec<u8>>> { unimplemented!() }
//!
//! fn main() -> rtps_ps::Result<()> {
//!     let domain = Domain::new()?;
//!     let participant = domain.create_participant(ParticipantAttributes::default())?;
//!     participant.register_type(ty())?;
//!
//!     let mut attrs = PublisherAttributes::default();
//!     attrs.topic.topic_name = "Telemetry".into();
//!     attrs.topic.topic_data_type = "Bytes".into();
//!     let publisher = participant.create_publisher::<Vec<u8>>(attrs)?;
//!     publisher.write(&vec![1, 2, 3])?;
//!
//!     domain.stop_all();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  pubsub: Participant -> Publisher / Subscriber (typed)         |
//! +---------------------------------------------------------------+
//! |  participant: RtpsParticipant, message receiver, timed events |
//! |  discovery:   PDP (SPDP) + EDP (simple / static)              |
//! +---------------------------------------------------------------+
//! |  writer / reader engines (stateless, stateful)                |
//! |  history: WriterHistory / ReaderHistory                       |
//! +---------------------------------------------------------------+
//! |  protocol: GUID, sequence numbers, locators, parameter lists, |
//! |            RTPS message codec                                 |
//! +---------------------------------------------------------------+
//! |  transport: UDPv4 (socket2 + mio), in-process loopback         |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`pubsub`] - typed publish/subscribe API (start here)
//! - [`domain`] - explicit participant registry
//! - [`participant`] - RTPS participant and endpoint factory
//! - [`discovery`] - participant and endpoint discovery
//! - [`history`] - history caches
//! - [`protocol`] - wire primitives

pub mod config;
pub mod discovery;
pub mod domain;
pub mod endpoint;
pub mod error;
pub mod history;
pub mod participant;
pub mod protocol;
pub mod pubsub;
pub mod qos;
pub mod reader;
pub mod transport;
pub mod writer;

pub use error::{Error, Result};
pub use protocol::guid::{EntityId, GuidPrefix, InstanceHandle, GUID};
pub use protocol::locator::{Locator, LocatorKind, LocatorList};
pub use protocol::types::{ChangeKind, SequenceNumber, Time, TopicKind};
