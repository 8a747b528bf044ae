// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDPv4 transport.
//!
//! One unbound send socket (multicast loop enabled, TTL 1) shared by all
//! writers; one `mio`-polled socket per input channel.
//!
//! Unicast inputs are bound without address reuse so a taken port fails to
//! bind, which is how participant ids are probed. Multicast inputs set
//! `SO_REUSEADDR` (and `SO_REUSEPORT` on unix) so every participant of the
//! host can join the discovery group.

use super::{InputChannel, Transport};
use crate::protocol::constants::MAX_DATAGRAM_SIZE;
use crate::protocol::locator::{Locator, LocatorKind};
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

const SOCKET_TOKEN: Token = Token(0);

pub struct UdpTransport {
    send_socket: UdpSocket,
    interfaces: Vec<Ipv4Addr>,
}

impl UdpTransport {
    /// Create the shared send socket.
    pub fn new(send_buffer_size: u32) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        if send_buffer_size > 0 {
            if let Err(e) = socket.set_send_buffer_size(send_buffer_size as usize) {
                log::debug!("[UDP] set_send_buffer_size({}) failed: {}", send_buffer_size, e);
            }
        }
        let bind: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
        socket.bind(&bind.into())?;
        socket.set_multicast_loop_v4(true)?;
        if let Err(e) = socket.set_multicast_ttl_v4(1) {
            log::debug!("[UDP] set_multicast_ttl_v4 failed: {}", e);
        }
        let interfaces = interface_addresses();
        log::debug!(
            "[UDP] transport ready, {} non-loopback interface(s)",
            interfaces.len()
        );
        Ok(Self {
            send_socket: socket.into(),
            interfaces,
        })
    }

    fn bind_input(&self, locator: &Locator, buffer_size: u32) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        if buffer_size > 0 {
            if let Err(e) = socket.set_recv_buffer_size(buffer_size as usize) {
                log::debug!("[UDP] set_recv_buffer_size({}) failed: {}", buffer_size, e);
            }
        }
        let port = u16::try_from(locator.port)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "port out of range"))?;

        if locator.is_multicast() {
            socket.set_reuse_address(true)?;
            #[cfg(unix)]
            set_reuseport(&socket)?;
            let bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
            socket.bind(&bind.into())?;
            let socket: UdpSocket = socket.into();
            self.join_group(&socket, locator.ipv4())?;
            Ok(socket)
        } else {
            let bind = SocketAddr::new(IpAddr::V4(locator.ipv4()), port);
            socket.bind(&bind.into())?;
            Ok(socket.into())
        }
    }

    fn join_group(&self, socket: &UdpSocket, group: Ipv4Addr) -> io::Result<()> {
        if self.interfaces.is_empty() {
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
            log::debug!("[UDP] join_multicast_v4({}) on UNSPECIFIED", group);
        } else {
            for iface in &self.interfaces {
                match socket.join_multicast_v4(&group, iface) {
                    Ok(()) => log::debug!("[UDP] join_multicast_v4({}) on {}", group, iface),
                    Err(e) => log::debug!(
                        "[UDP] join_multicast_v4({}) on {} failed (non-fatal): {}",
                        group,
                        iface,
                        e
                    ),
                }
            }
        }
        socket.set_multicast_loop_v4(true)?;
        Ok(())
    }
}

impl Transport for UdpTransport {
    fn open_input(&self, locator: &Locator, buffer_size: u32) -> io::Result<Box<dyn InputChannel>> {
        if !self.is_locator_supported(locator) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported locator {}", locator),
            ));
        }
        let std_socket = self.bind_input(locator, buffer_size)?;
        std_socket.set_nonblocking(true)?;
        let mut socket = mio::net::UdpSocket::from_std(std_socket);
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut socket, SOCKET_TOKEN, Interest::READABLE)?;
        log::debug!("[UDP] input bound {}", locator);
        Ok(Box::new(UdpInput {
            locator: *locator,
            socket,
            poll,
            events: Events::with_capacity(16),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }))
    }

    fn send_sync(&self, data: &[u8], destination: &Locator) -> io::Result<()> {
        let addr = destination.to_socket_addr().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no socket address for {}", destination),
            )
        })?;
        let sent = self.send_socket.send_to(data, addr)?;
        log::trace!("[UDP] send {} bytes -> {}", sent, addr);
        Ok(())
    }

    fn is_locator_supported(&self, locator: &Locator) -> bool {
        locator.kind == LocatorKind::UdpV4 && locator.is_valid()
    }

    fn local_addresses(&self, include_loopback: bool) -> Vec<Ipv4Addr> {
        let mut addrs = self.interfaces.clone();
        if include_loopback || addrs.is_empty() {
            addrs.push(Ipv4Addr::LOCALHOST);
        }
        addrs
    }
}

struct UdpInput {
    locator: Locator,
    socket: mio::net::UdpSocket,
    poll: Poll,
    events: Events,
    buf: Vec<u8>,
}

impl UdpInput {
    fn try_recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, src)) => {
                log::trace!("[UDP] recv len={} src={} on {}", len, src, self.locator);
                Ok(Some(self.buf[..len].to_vec()))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl InputChannel for UdpInput {
    fn locator(&self) -> Locator {
        self.locator
    }

    fn receive(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        // Readiness is edge-triggered: drain before waiting again.
        if let Some(data) = self.try_recv()? {
            return Ok(Some(data));
        }
        if let Err(e) = self.poll.poll(&mut self.events, Some(timeout)) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(e);
        }
        if self.events.is_empty() {
            return Ok(None);
        }
        self.try_recv()
    }
}

/// Non-loopback IPv4 interface addresses.
fn interface_addresses() -> Vec<Ipv4Addr> {
    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(ifs) => ifs,
        Err(e) => {
            log::debug!("[UDP] Failed to list network interfaces: {}", e);
            return Vec::new();
        }
    };
    let mut addrs = Vec::new();
    for (_name, ip) in interfaces {
        if let IpAddr::V4(ipv4) = ip {
            if !ipv4.is_loopback() && !addrs.contains(&ipv4) {
                addrs.push(ipv4);
            }
        }
    }
    addrs
}

#[cfg(unix)]
fn set_reuseport(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    let optval: libc::c_int = 1;
    // SAFETY: setsockopt FFI with valid fd, standard socket option, and correctly sized optval pointer
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_roundtrip_on_localhost() {
        let transport = UdpTransport::new(0).expect("send socket");
        let loc = Locator::udpv4(Ipv4Addr::LOCALHOST, 0);
        // Port 0 lets the OS choose; read the real port back from the socket.
        let socket = transport.bind_input(&loc, 0).expect("bind");
        let port = socket.local_addr().expect("local addr").port();
        let dest = Locator::udpv4(Ipv4Addr::LOCALHOST, u32::from(port));
        transport.send_sync(b"RTPS", &dest).expect("send");
        socket
            .set_read_timeout(Some(Duration::from_secs(1)))
            .expect("timeout");
        let mut buf = [0u8; 16];
        let (len, _) = socket.recv_from(&mut buf).expect("recv");
        assert_eq!(&buf[..len], b"RTPS");
    }

    #[test]
    fn test_unsupported_locator() {
        let transport = UdpTransport::new(0).expect("send socket");
        assert!(!transport.is_locator_supported(&Locator::INVALID));
        assert!(transport
            .send_sync(b"x", &Locator::INVALID)
            .is_err());
    }
}
