//! Thin adapter over a UDP socket: open, send, receive-with-timeout, close.
//!
//! Owns the currently pinned server address and whether the server's TID has
//! been latched onto that address yet.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Result, TftpClientError};
use crate::MAX_PACKET_SIZE;

pub struct Transport {
    socket: UdpSocket,
    pinned_addr: SocketAddr,
    tid_latched: bool,
}

impl Transport {
    /// Binds an ephemeral UDP socket of the same family as `server_addr` and
    /// pins `server_addr` as the initial destination.
    pub async fn open(server_addr: SocketAddr) -> Result<Self> {
        let domain = if server_addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };

        let raw = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TftpClientError::NoSock(e.to_string()))?;
        raw.set_nonblocking(true)
            .map_err(|e| TftpClientError::NoSock(e.to_string()))?;
        let bind_addr: SocketAddr = if server_addr.is_ipv6() {
            "[::]:0".parse().map_err(|_| TftpClientError::InvalidState)?
        } else {
            "0.0.0.0:0".parse().map_err(|_| TftpClientError::InvalidState)?
        };
        raw.bind(&bind_addr.into())
            .map_err(|e| TftpClientError::NoSock(e.to_string()))?;

        let std_socket: std::net::UdpSocket = raw.into();
        let socket =
            UdpSocket::from_std(std_socket).map_err(|e| TftpClientError::NoSock(e.to_string()))?;

        debug!(local = ?socket.local_addr().ok(), remote = %server_addr, "transport opened");

        Ok(Self {
            socket,
            pinned_addr: server_addr,
            tid_latched: false,
        })
    }

    pub fn pinned_addr(&self) -> SocketAddr {
        self.pinned_addr
    }

    pub fn tid_latched(&self) -> bool {
        self.tid_latched
    }

    /// Sends `bytes` to the currently pinned address.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.socket
            .send_to(bytes, self.pinned_addr)
            .await
            .map_err(|e| TftpClientError::Tx(e.to_string()))?;
        Ok(())
    }

    /// Sends `bytes` to an explicit address, bypassing the pinned destination.
    /// Used only to answer a mismatched-TID sender with `ERR(UNKNOWN_ID)`.
    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<()> {
        self.socket
            .send_to(bytes, dest)
            .await
            .map_err(|e| TftpClientError::Tx(e.to_string()))?;
        Ok(())
    }

    /// Waits up to `inactivity_timeout` for one datagram. Does not latch the
    /// TID itself; the Transfer Engine verifies the source IP before calling
    /// [`Transport::latch_port`], since a mismatched source must never latch.
    pub async fn recv(&self, buf: &mut [u8], inactivity_timeout: Duration) -> Result<(usize, SocketAddr)> {
        match timeout(inactivity_timeout, self.socket.recv_from(buf)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(TftpClientError::Rx(e.to_string())),
            Err(_) => Err(TftpClientError::RxTimeout),
        }
    }

    /// Rewrites the pinned address's port to the server's ephemeral TID. The
    /// pinned IP is never rewritten. A no-op after the first call.
    pub fn latch_port(&mut self, port: u16) {
        if self.tid_latched {
            return;
        }
        self.pinned_addr.set_port(port);
        self.tid_latched = true;
        debug!(tid = port, "server tid latched");
    }

    /// `close` is idempotent: dropping the socket handle is sufficient and
    /// safe to invoke more than once since the value is consumed.
    pub fn close(self) {
        drop(self);
    }
}

pub fn new_recv_buffer() -> Vec<u8> {
    vec![0u8; MAX_PACKET_SIZE]
}
