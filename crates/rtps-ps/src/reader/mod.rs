// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader engines.
//!
//! - [`StatelessReader`] accepts changes from any admitted writer and drops
//!   anything not newer than the last sequence seen from that writer.
//! - [`StatefulReader`] keeps a [`WriterProxy`] per matched writer, delivers
//!   in sequence order, answers heartbeats with ACKNACKs and honours GAPs.
//!
//! Admission (`accept_msg_from`): a matched writer, the trusted builtin
//! writer entity id, or anyone when unknown writers are accepted.

mod stateful;
mod stateless;

pub use stateful::{StatefulReader, WriterProxy};
pub use stateless::StatelessReader;

use crate::endpoint::{
    MatchedEndpoint, MatchingInfo, ReaderAttributes, ReaderTimes, RemoteWriterAttributes,
};
use crate::error::{Error, Result};
use crate::history::{CacheChange, ReaderHistory};
use crate::protocol::guid::{EntityId, GUID};
use crate::protocol::message::{Gap, Heartbeat};
use crate::protocol::types::TopicKind;
use crate::transport::Transport;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callbacks from a reader. Every method has an empty default.
pub trait ReaderListener: Send + Sync {
    /// A change was stored in the reader history.
    fn on_new_cache_change_added(&self, _reader: GUID, _change: &CacheChange) {}

    fn on_reader_matched(&self, _reader: GUID, _info: MatchingInfo) {}

    /// Any DATA from `writer` reached the reader, duplicates included.
    fn on_writer_activity(&self, _reader: GUID, _writer: GUID) {}
}

/// State shared by both reader flavours.
pub struct ReaderCore {
    guid: GUID,
    attributes: RwLock<ReaderAttributes>,
    history: Arc<ReaderHistory>,
    transport: Arc<dyn Transport>,
    listener: RwLock<Option<Arc<dyn ReaderListener>>>,
    accept_unknown_writers: AtomicBool,
    accept_unknown_readers: AtomicBool,
    trusted_writer: RwLock<Option<EntityId>>,
}

impl ReaderCore {
    pub(crate) fn new(
        guid: GUID,
        attributes: ReaderAttributes,
        history: Arc<ReaderHistory>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            guid,
            attributes: RwLock::new(attributes),
            history,
            transport,
            listener: RwLock::new(None),
            accept_unknown_writers: AtomicBool::new(false),
            accept_unknown_readers: AtomicBool::new(true),
            trusted_writer: RwLock::new(None),
        }
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    pub fn attributes(&self) -> ReaderAttributes {
        self.attributes.read().clone()
    }

    pub(crate) fn set_times(&self, times: ReaderTimes) {
        self.attributes.write().times = times;
    }

    pub fn history(&self) -> &Arc<ReaderHistory> {
        &self.history
    }

    pub fn topic_kind(&self) -> TopicKind {
        self.history.topic_kind()
    }

    pub fn expects_inline_qos(&self) -> bool {
        self.attributes.read().expects_inline_qos
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn ReaderListener>>) {
        *self.listener.write() = listener;
    }

    pub(crate) fn listener(&self) -> Option<Arc<dyn ReaderListener>> {
        self.listener.read().clone()
    }

    pub(crate) fn notify_matched(&self, info: MatchingInfo) {
        if let Some(l) = self.listener() {
            l.on_reader_matched(self.guid, info);
        }
    }

    pub(crate) fn notify_activity(&self, writer: GUID) {
        if let Some(l) = self.listener() {
            l.on_writer_activity(self.guid, writer);
        }
    }

    /// Accept DATA from writers with this entity id even when unmatched.
    pub fn set_trusted_writer(&self, entity_id: Option<EntityId>) {
        *self.trusted_writer.write() = entity_id;
    }

    pub fn trusted_writer(&self) -> Option<EntityId> {
        *self.trusted_writer.read()
    }

    pub fn set_accept_messages_from_unknown_writers(&self, accept: bool) {
        self.accept_unknown_writers.store(accept, Ordering::Relaxed);
    }

    pub fn accept_messages_from_unknown_writers(&self) -> bool {
        self.accept_unknown_writers.load(Ordering::Relaxed)
    }

    /// Whether submessages with reader id `UNKNOWN` are for this reader.
    pub fn set_accept_messages_to_unknown_readers(&self, accept: bool) {
        self.accept_unknown_readers.store(accept, Ordering::Relaxed);
    }

    /// A submessage addressed to `reader_id` concerns this reader.
    pub fn accept_msg_directed_to(&self, reader_id: EntityId) -> bool {
        if reader_id == self.guid.entity_id {
            return true;
        }
        reader_id.is_unknown() && self.accept_unknown_readers.load(Ordering::Relaxed)
    }

    /// Admission of unmatched writers.
    pub(crate) fn admits_unmatched(&self, writer: &GUID) -> bool {
        if self.accept_messages_from_unknown_writers() {
            return true;
        }
        self.trusted_writer() == Some(writer.entity_id)
    }

    /// Store a change. When a listener is set, a copy of every stored change
    /// is pushed to `notify`; callers deliver those after releasing their
    /// own locks.
    pub(crate) fn insert(&self, change: CacheChange, notify: &mut Vec<CacheChange>) -> Result<bool> {
        let copy = self.listener.read().is_some().then(|| change.clone());
        let writer = change.writer_guid;
        let seq = change.sequence_number;
        let stored = self.history.received_change(change)?;
        if stored {
            log::trace!("[Reader] {} stored {} seq={}", self.guid, writer, seq);
            notify.extend(copy);
        }
        Ok(stored)
    }

    pub(crate) fn notify_changes(&self, changes: &[CacheChange]) {
        if changes.is_empty() {
            return;
        }
        if let Some(l) = self.listener() {
            for change in changes {
                l.on_new_cache_change_added(self.guid, change);
            }
        }
    }
}

/// A local reader of either flavour.
#[derive(Clone)]
pub enum Reader {
    Stateless(Arc<StatelessReader>),
    Stateful(Arc<StatefulReader>),
}

impl Reader {
    pub fn core(&self) -> &ReaderCore {
        match self {
            Reader::Stateless(r) => r.core(),
            Reader::Stateful(r) => r.core(),
        }
    }

    pub fn guid(&self) -> GUID {
        self.core().guid()
    }

    pub fn history(&self) -> &Arc<ReaderHistory> {
        self.core().history()
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self, Reader::Stateful(_))
    }

    pub fn accept_msg_from(&self, writer: &GUID) -> bool {
        match self {
            Reader::Stateless(r) => r.accept_msg_from(writer),
            Reader::Stateful(r) => r.accept_msg_from(writer),
        }
    }

    pub fn accept_msg_directed_to(&self, reader_id: EntityId) -> bool {
        self.core().accept_msg_directed_to(reader_id)
    }

    pub fn set_trusted_writer(&self, entity_id: Option<EntityId>) {
        self.core().set_trusted_writer(entity_id);
    }

    pub fn set_accept_messages_from_unknown_writers(&self, accept: bool) {
        self.core().set_accept_messages_from_unknown_writers(accept);
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn ReaderListener>>) {
        self.core().set_listener(listener);
    }

    pub fn update_times(&self, times: ReaderTimes) {
        self.core().set_times(times);
    }

    pub fn matched_writer_add(&self, writer: RemoteWriterAttributes) -> bool {
        match self {
            Reader::Stateless(r) => r.matched_add(writer),
            Reader::Stateful(r) => r.matched_add(writer),
        }
    }

    pub fn matched_writer_remove(&self, writer: &GUID) -> bool {
        match self {
            Reader::Stateless(r) => r.matched_remove(writer),
            Reader::Stateful(r) => r.matched_remove(writer),
        }
    }

    pub fn matched_writer_update(&self, writer: RemoteWriterAttributes) -> bool {
        match self {
            Reader::Stateless(r) => r.matched_update(writer),
            Reader::Stateful(r) => r.matched_update(writer),
        }
    }

    pub fn matched_writer_is_matched(&self, writer: &GUID) -> bool {
        match self {
            Reader::Stateless(r) => r.is_matched(writer),
            Reader::Stateful(r) => r.is_matched(writer),
        }
    }

    pub fn matched_writer_count(&self) -> usize {
        match self {
            Reader::Stateless(r) => r.matched_writer_count(),
            Reader::Stateful(r) => r.matched_writer_count(),
        }
    }

    /// Hand a received change to the reader. Returns true if it was stored.
    pub fn process_data(&self, change: CacheChange) -> bool {
        match self {
            Reader::Stateless(r) => r.process_data(change),
            Reader::Stateful(r) => r.process_data(change),
        }
    }

    pub fn process_heartbeat(&self, writer: GUID, heartbeat: &Heartbeat) {
        if let Reader::Stateful(r) = self {
            r.process_heartbeat(writer, heartbeat);
        }
    }

    pub fn process_gap(&self, writer: GUID, gap: &Gap) {
        if let Reader::Stateful(r) = self {
            r.process_gap(writer, gap);
        }
    }

    /// Refresh liveliness of a matched writer; stateless readers keep none.
    pub fn assert_writer_liveliness(&self, writer: &GUID) -> bool {
        match self {
            Reader::Stateless(r) => r.is_matched(writer),
            Reader::Stateful(r) => r.assert_writer_liveliness(writer),
        }
    }

    /// Forget sequence tracking for `writer` and drop its stored changes.
    pub fn forget_writer(&self, writer: &GUID) -> usize {
        if let Reader::Stateless(r) = self {
            r.forget_writer(writer);
        }
        self.history().remove_changes_from_writer(writer)
    }

    pub fn next_unread(&self) -> Option<CacheChange> {
        self.history().next_unread()
    }

    pub fn next_untaken(&self) -> Option<CacheChange> {
        self.history().next_untaken()
    }

    /// Reserve a change in this reader's history for an incoming DATA.
    pub(crate) fn reserve_cache(&self) -> Result<CacheChange> {
        self.history().reserve_cache().map_err(|e| {
            log::debug!("[Reader] {} cannot reserve cache: {}", self.guid(), e);
            e
        })
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_stateful() {
            "Stateful"
        } else {
            "Stateless"
        };
        write!(f, "Reader::{}({})", kind, self.guid())
    }
}

/// Resource failures leave the change undelivered; anything else is a bug
/// in the caller and is logged louder.
pub(crate) fn log_insert_failure(reader: GUID, err: &Error) {
    match err {
        Error::HistoryFull | Error::ResourceExhausted(_) | Error::PayloadTooLarge { .. } => {
            log::debug!("[Reader] {} change not stored: {}", reader, err);
        }
        other => log::warn!("[Reader] {} change rejected: {}", reader, other),
    }
}
