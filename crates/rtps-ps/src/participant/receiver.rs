// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram to endpoint dispatch.
//!
//! A [`MessageReceiver`] decodes one RTPS message and walks its
//! submessages, keeping the interpreter state (source prefix, destination
//! prefix, timestamp) that INFO_* submessages modify. DATA, HEARTBEAT and
//! GAP go to the readers bound on the receiving locator, ACKNACK to the
//! addressed local writer.

use crate::endpoint::Endpoint;
use crate::history::CacheChange;
use crate::protocol::guid::{GuidPrefix, InstanceHandle, GUID};
use crate::protocol::message::{AckNack, Data, Gap, Heartbeat, RtpsMessage, Submessage};
use crate::protocol::types::{ChangeKind, Time, TopicKind};
use crate::reader::Reader;

/// Per-message interpreter state.
struct ReceiveState {
    source: GuidPrefix,
    destination: GuidPrefix,
    timestamp: Option<Time>,
}

pub struct MessageReceiver {
    local_prefix: GuidPrefix,
}

impl MessageReceiver {
    pub fn new(local_prefix: GuidPrefix) -> Self {
        Self { local_prefix }
    }

    pub fn local_prefix(&self) -> GuidPrefix {
        self.local_prefix
    }

    /// Decode `data` and hand each submessage to `endpoints`.
    ///
    /// Malformed messages and messages sent by this participant are dropped.
    pub fn process_message(&self, data: &[u8], endpoints: &[Endpoint]) {
        let message = match RtpsMessage::decode(data) {
            Ok(m) => m,
            Err(e) => {
                log::debug!("[MessageReceiver] dropping malformed message: {}", e);
                return;
            }
        };
        if message.header.guid_prefix == self.local_prefix {
            return;
        }

        let mut state = ReceiveState {
            source: message.header.guid_prefix,
            destination: self.local_prefix,
            timestamp: None,
        };
        for sub in &message.submessages {
            match sub {
                Submessage::InfoTimestamp(t) => state.timestamp = *t,
                Submessage::InfoSource(prefix) => state.source = *prefix,
                Submessage::InfoDestination(prefix) => {
                    state.destination = if prefix.is_unknown() {
                        self.local_prefix
                    } else {
                        *prefix
                    };
                }
                _ if state.destination != self.local_prefix => {
                    log::trace!(
                        "[MessageReceiver] submessage for {:?} skipped",
                        state.destination
                    );
                }
                Submessage::Data(d) => self.on_data(&state, d, endpoints),
                Submessage::Heartbeat(hb) => self.on_heartbeat(&state, hb, endpoints),
                Submessage::Gap(gap) => self.on_gap(&state, gap, endpoints),
                Submessage::AckNack(an) => self.on_acknack(&state, an, endpoints),
            }
        }
    }

    fn on_data(&self, state: &ReceiveState, data: &Data, endpoints: &[Endpoint]) {
        let writer = GUID::new(state.source, data.writer_id);
        let kind = match data.inline_qos.as_ref().map(|q| q.status_info()) {
            Some(Some(kind)) => kind,
            _ => ChangeKind::Alive,
        };
        let key_hash = data.inline_qos.as_ref().and_then(|q| q.key_hash());

        for reader in readers(endpoints) {
            if !reader.accept_msg_directed_to(data.reader_id) {
                continue;
            }
            let handle = match key_hash {
                Some(h) => h,
                None if reader.core().topic_kind() == TopicKind::WithKey => {
                    match key_from_payload(data) {
                        Some(h) => h,
                        None => {
                            log::warn!(
                                "[MessageReceiver] keyed DATA from {} seq={} without key hash",
                                writer,
                                data.writer_sn
                            );
                            continue;
                        }
                    }
                }
                None => InstanceHandle::NIL,
            };
            let mut change = match reader.reserve_cache() {
                Ok(c) => c,
                Err(_) => continue,
            };
            fill_change(&mut change, writer, kind, handle, data, state.timestamp);
            reader.process_data(change);
        }
    }

    fn on_heartbeat(&self, state: &ReceiveState, hb: &Heartbeat, endpoints: &[Endpoint]) {
        let writer = GUID::new(state.source, hb.writer_id);
        for reader in readers(endpoints) {
            if reader.is_stateful() && reader.accept_msg_directed_to(hb.reader_id) {
                reader.process_heartbeat(writer, hb);
            }
        }
    }

    fn on_gap(&self, state: &ReceiveState, gap: &Gap, endpoints: &[Endpoint]) {
        let writer = GUID::new(state.source, gap.writer_id);
        for reader in readers(endpoints) {
            if reader.is_stateful() && reader.accept_msg_directed_to(gap.reader_id) {
                reader.process_gap(writer, gap);
            }
        }
    }

    fn on_acknack(&self, state: &ReceiveState, an: &AckNack, endpoints: &[Endpoint]) {
        let target = GUID::new(self.local_prefix, an.writer_id);
        let reader = GUID::new(state.source, an.reader_id);
        if let Some(writer) = endpoints
            .iter()
            .filter(|e| e.guid() == target)
            .find_map(Endpoint::as_writer)
        {
            writer.process_acknack(reader, an);
        }
    }
}

fn readers(endpoints: &[Endpoint]) -> impl Iterator<Item = Reader> + '_ {
    endpoints.iter().filter_map(Endpoint::as_reader)
}

fn fill_change(
    change: &mut CacheChange,
    writer: GUID,
    kind: ChangeKind,
    handle: InstanceHandle,
    data: &Data,
    timestamp: Option<Time>,
) {
    change.kind = kind;
    change.writer_guid = writer;
    change.instance_handle = handle;
    change.sequence_number = data.writer_sn;
    change.source_timestamp = timestamp.unwrap_or(Time::ZERO);
    if let Some(payload) = &data.payload {
        change.serialized_payload.encapsulation = payload.encapsulation;
        change.serialized_payload.data.clear();
        change.serialized_payload.data.extend_from_slice(&payload.data);
    }
}

/// Key-only DATA carries the 16-byte key in place of the sample.
fn key_from_payload(data: &Data) -> Option<InstanceHandle> {
    if !data.key_flag {
        return None;
    }
    let bytes = data.payload.as_ref()?.data.get(..16)?;
    let mut key = [0u8; 16];
    key.copy_from_slice(bytes);
    Some(InstanceHandle(key))
}
