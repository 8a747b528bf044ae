// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! Every bound locator is a `crossbeam` channel registered in a shared
//! `DashMap` hub. Unicast bindings are exclusive like UDP ports; multicast
//! bindings fan out to every subscriber. Clones share the same hub, so all
//! participants of one process talk through one `LoopbackTransport`.

use super::{InputChannel, Transport};
use crate::protocol::locator::{Locator, LocatorKind};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Datagrams queued per input channel before new ones are dropped.
const CHANNEL_DEPTH: usize = 4096;

/// Return `true` to drop a datagram about to be delivered to a locator.
pub type DropFilter = Box<dyn Fn(&[u8], &Locator) -> bool + Send + Sync>;

type BindingKey = ([u8; 16], u32);

struct Binding {
    id: u64,
    tx: Sender<Vec<u8>>,
}

struct Hub {
    bindings: DashMap<BindingKey, Vec<Binding>>,
    next_id: AtomicU64,
    drop_filter: RwLock<Option<DropFilter>>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Hub {
    fn unbind(&self, key: &BindingKey, id: u64) {
        let emptied = match self.bindings.get_mut(key) {
            Some(mut list) => {
                list.retain(|b| b.id != id);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            self.bindings.remove_if(key, |_, list| list.is_empty());
        }
    }

    fn deliver(&self, key: &BindingKey, data: &[u8]) -> bool {
        let Some(list) = self.bindings.get(key) else {
            return false;
        };
        for binding in list.iter() {
            match binding.tx.try_send(data.to_vec()) {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[loopback] queue full, datagram dropped");
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
        true
    }
}

/// Shared in-process datagram hub.
#[derive(Clone)]
pub struct LoopbackTransport {
    hub: Arc<Hub>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            hub: Arc::new(Hub {
                bindings: DashMap::new(),
                next_id: AtomicU64::new(1),
                drop_filter: RwLock::new(None),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Install (or clear with `None`) a filter that can drop datagrams.
    pub fn set_drop_filter(&self, filter: Option<DropFilter>) {
        *self.hub.drop_filter.write() = filter;
    }

    /// Datagrams handed to input channels so far.
    pub fn delivered_count(&self) -> u64 {
        self.hub.delivered.load(Ordering::Relaxed)
    }

    /// Datagrams dropped by the filter or by full queues.
    pub fn dropped_count(&self) -> u64 {
        self.hub.dropped.load(Ordering::Relaxed)
    }

    pub fn bound_locator_count(&self) -> usize {
        self.hub.bindings.len()
    }
}

impl Transport for LoopbackTransport {
    fn open_input(&self, locator: &Locator, _buffer_size: u32) -> io::Result<Box<dyn InputChannel>> {
        if !self.is_locator_supported(locator) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported locator {}", locator),
            ));
        }
        let key = (locator.address, locator.port);
        let id = self.hub.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::bounded(CHANNEL_DEPTH);

        let mut entry = self.hub.bindings.entry(key).or_default();
        if !locator.is_multicast() && !entry.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{} already bound", locator),
            ));
        }
        entry.push(Binding { id, tx });
        drop(entry);

        log::debug!("[loopback] bound {} (id={})", locator, id);
        Ok(Box::new(LoopbackInput {
            hub: self.hub.clone(),
            locator: *locator,
            key,
            id,
            rx,
        }))
    }

    fn send_sync(&self, data: &[u8], destination: &Locator) -> io::Result<()> {
        if !self.is_locator_supported(destination) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported locator {}", destination),
            ));
        }
        if let Some(filter) = self.hub.drop_filter.read().as_ref() {
            if filter(data, destination) {
                self.hub.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("[loopback] filter dropped datagram to {}", destination);
                return Ok(());
            }
        }
        let exact = (destination.address, destination.port);
        if !self.hub.deliver(&exact, data) && !destination.is_multicast() {
            // Inputs bound to the unspecified address accept any unicast address.
            self.hub.deliver(&([0; 16], destination.port), data);
        }
        Ok(())
    }

    fn is_locator_supported(&self, locator: &Locator) -> bool {
        locator.kind == LocatorKind::UdpV4 && locator.is_valid()
    }

    fn local_addresses(&self, _include_loopback: bool) -> Vec<Ipv4Addr> {
        vec![Ipv4Addr::LOCALHOST]
    }
}

struct LoopbackInput {
    hub: Arc<Hub>,
    locator: Locator,
    key: BindingKey,
    id: u64,
    rx: Receiver<Vec<u8>>,
}

impl InputChannel for LoopbackInput {
    fn locator(&self) -> Locator {
        self.locator
    }

    fn receive(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(data) => Ok(Some(data)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "loopback binding removed",
            )),
        }
    }
}

impl Drop for LoopbackInput {
    fn drop(&mut self) {
        self.hub.unbind(&self.key, self.id);
        log::debug!("[loopback] unbound {} (id={})", self.locator, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recv(ch: &mut Box<dyn InputChannel>) -> Option<Vec<u8>> {
        ch.receive(Duration::from_millis(50)).expect("receive")
    }

    #[test]
    fn test_unicast_is_exclusive() {
        let t = LoopbackTransport::new();
        let loc = Locator::udpv4(Ipv4Addr::LOCALHOST, 7410);
        let _a = t.open_input(&loc, 0).expect("first bind");
        let err = t.open_input(&loc, 0).err().expect("second bind must fail");
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }

    #[test]
    fn test_unbind_on_drop() {
        let t = LoopbackTransport::new();
        let loc = Locator::udpv4(Ipv4Addr::LOCALHOST, 7412);
        let a = t.open_input(&loc, 0).expect("bind");
        assert_eq!(t.bound_locator_count(), 1);
        drop(a);
        assert_eq!(t.bound_locator_count(), 0);
        t.open_input(&loc, 0).expect("rebind after drop");
    }

    #[test]
    fn test_multicast_fans_out() {
        let t = LoopbackTransport::new();
        let group = Locator::udpv4(Ipv4Addr::new(239, 255, 0, 1), 7400);
        let mut a = t.open_input(&group, 0).expect("bind a");
        let mut b = t.open_input(&group, 0).expect("bind b");
        t.send_sync(b"spdp", &group).expect("send");
        assert_eq!(recv(&mut a).as_deref(), Some(&b"spdp"[..]));
        assert_eq!(recv(&mut b).as_deref(), Some(&b"spdp"[..]));
    }

    #[test]
    fn test_wildcard_binding_receives_unicast() {
        let t = LoopbackTransport::new();
        let mut any = t
            .open_input(&Locator::udpv4(Ipv4Addr::UNSPECIFIED, 7420), 0)
            .expect("bind any");
        t.send_sync(b"x", &Locator::udpv4(Ipv4Addr::LOCALHOST, 7420))
            .expect("send");
        assert_eq!(recv(&mut any).as_deref(), Some(&b"x"[..]));
    }

    #[test]
    fn test_drop_filter() {
        let t = LoopbackTransport::new();
        let loc = Locator::udpv4(Ipv4Addr::LOCALHOST, 7430);
        let mut ch = t.open_input(&loc, 0).expect("bind");
        t.set_drop_filter(Some(Box::new(|data: &[u8], _: &Locator| data == b"drop")));
        t.send_sync(b"drop", &loc).expect("send");
        t.send_sync(b"keep", &loc).expect("send");
        assert_eq!(recv(&mut ch).as_deref(), Some(&b"keep"[..]));
        assert_eq!(t.dropped_count(), 1);
        t.set_drop_filter(None);
        t.send_sync(b"drop", &loc).expect("send");
        assert_eq!(recv(&mut ch).as_deref(), Some(&b"drop"[..]));
    }
}
