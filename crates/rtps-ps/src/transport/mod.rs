// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram transports and listen resources.
//!
//! The protocol engine only needs two things from a transport: send a
//! datagram to a locator, and open an input channel bound to a locator.
//! [`UdpTransport`] does this over real sockets, [`LoopbackTransport`] over
//! an in-process hub (tests, single-process deployments).
//!
//! A [`ListenResource`] owns one input channel and one receive thread, and
//! hands every datagram to the participant's message receiver together with
//! the endpoints associated to that locator.

mod listen;
mod loopback;
mod udp;

pub use listen::ListenResource;
pub use loopback::{DropFilter, LoopbackTransport};
pub use udp::UdpTransport;

use crate::protocol::locator::{Locator, LocatorList};
use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Receiving side of a bound locator.
pub trait InputChannel: Send {
    /// Locator this channel is bound to.
    fn locator(&self) -> Locator;

    /// Wait up to `timeout` for one datagram. `Ok(None)` on timeout.
    fn receive(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>>;
}

/// Datagram transport consumed by the protocol engine.
pub trait Transport: Send + Sync {
    /// Bind an input channel.
    ///
    /// Unicast locators are exclusive: a second bind of the same address
    /// and port fails with `AddrInUse`. Multicast locators can be shared.
    fn open_input(&self, locator: &Locator, buffer_size: u32) -> io::Result<Box<dyn InputChannel>>;

    /// Send one datagram, blocking until it is handed to the medium.
    fn send_sync(&self, data: &[u8], destination: &Locator) -> io::Result<()>;

    fn is_locator_supported(&self, locator: &Locator) -> bool;

    /// Local addresses used to synthesize default unicast locators.
    fn local_addresses(&self, include_loopback: bool) -> Vec<Ipv4Addr>;
}

/// Send to every locator of `destinations`; returns how many sends succeeded.
pub fn send_to_all<'a>(
    transport: &dyn Transport,
    data: &[u8],
    destinations: impl IntoIterator<Item = &'a Locator>,
) -> usize {
    let mut sent = 0;
    for loc in destinations {
        if !transport.is_locator_supported(loc) {
            log::trace!("[transport] skipping unsupported locator {}", loc);
            continue;
        }
        match transport.send_sync(data, loc) {
            Ok(()) => sent += 1,
            Err(e) => log::debug!("[transport] send to {} failed: {}", loc, e),
        }
    }
    sent
}

/// Unicast locators for `port` on every local address.
pub fn unicast_locators_for(
    transport: &dyn Transport,
    port: u32,
    include_loopback: bool,
) -> LocatorList {
    transport
        .local_addresses(include_loopback)
        .into_iter()
        .map(|ip| Locator::udpv4(ip, port))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_all_counts_delivered() {
        let transport = LoopbackTransport::new();
        let a = Locator::udpv4(Ipv4Addr::LOCALHOST, 7600);
        let b = Locator::udpv4(Ipv4Addr::LOCALHOST, 7601);
        let mut ch = transport.open_input(&a, 0).expect("bind a");
        let dests = vec![a, b, Locator::INVALID];
        assert_eq!(send_to_all(&transport, b"ping", &dests), 2);
        let got = ch
            .receive(Duration::from_millis(100))
            .expect("receive")
            .expect("datagram");
        assert_eq!(got, b"ping");
    }

    #[test]
    fn test_unicast_locators_for_port() {
        let transport = LoopbackTransport::new();
        let list = unicast_locators_for(&transport, 7411, true);
        assert!(list.contains(&Locator::udpv4(Ipv4Addr::LOCALHOST, 7411)));
    }
}
