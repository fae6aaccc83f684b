//! Fire-and-forget UDP transport for frame packets.
//!
//! The sender writes each packet as exactly one datagram; there is no
//! chunking, acknowledgement or retransmission. The receiver half exists for
//! monitor mode and tests.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::cam::packet::{self, HEADER_SIZE, MAX_JPEG_SIZE};
use crate::error::LinkError;

/// Receive buffer: the largest possible UDP payload.
const RECV_BUFFER_SIZE: usize = 65_536;

/// Destination for finished packets.
#[async_trait]
pub trait FrameSink {
    /// Send one datagram; returns the number of bytes written.
    async fn send_datagram(&mut self, datagram: &[u8]) -> Result<usize, LinkError>;
}

// ── UdpFrameSender ───────────────────────────────────────────────

/// Unconnected UDP socket that sends every datagram to `remote_addr`.
pub struct UdpFrameSender {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    datagrams_sent: u64,
    bytes_sent: u64,
}

impl UdpFrameSender {
    /// Bind an ephemeral local port suitable for reaching `remote_addr`.
    pub async fn bind(remote_addr: SocketAddr) -> Result<Self, LinkError> {
        let local: SocketAddr = if remote_addr.is_ipv4() {
            "0.0.0.0:0".parse().map_err(|_| LinkError::Other("bad bind address".into()))?
        } else {
            "[::]:0".parse().map_err(|_| LinkError::Other("bad bind address".into()))?
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self::new(socket, remote_addr))
    }

    /// Wrap an already-bound socket targeting `remote_addr`.
    pub fn new(socket: UdpSocket, remote_addr: SocketAddr) -> Self {
        Self {
            socket,
            remote_addr,
            datagrams_sent: 0,
            bytes_sent: 0,
        }
    }

    /// The remote address this sender targets.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.socket.local_addr()?)
    }

    /// Datagrams handed to the OS so far.
    pub fn datagrams_sent(&self) -> u64 {
        self.datagrams_sent
    }

    /// Total bytes sent across all datagrams.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

#[async_trait]
impl FrameSink for UdpFrameSender {
    async fn send_datagram(&mut self, datagram: &[u8]) -> Result<usize, LinkError> {
        let n = self.socket.send_to(datagram, self.remote_addr).await?;
        self.datagrams_sent += 1;
        self.bytes_sent += n as u64;
        Ok(n)
    }
}

// ── FrameReceiver ────────────────────────────────────────────────

/// A datagram received and split into counter + JPEG.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub counter: u32,
    pub jpeg: Vec<u8>,
    pub from: SocketAddr,
}

/// Receiving end of the stream.
pub struct FrameReceiver {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl FrameReceiver {
    pub async fn bind(addr: SocketAddr) -> Result<Self, LinkError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::new(socket))
    }

    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the next datagram and parse it.
    ///
    /// Socket errors are returned as [`LinkError::Io`]; a datagram that does
    /// not parse yields [`LinkError::InvalidPacket`] so the caller can log
    /// it and keep receiving.
    pub async fn recv_frame(&mut self) -> Result<ReceivedFrame, LinkError> {
        let (len, from) = self.socket.recv_from(&mut self.buf).await?;
        if len > HEADER_SIZE + MAX_JPEG_SIZE {
            debug!("{len}-byte datagram from {from} exceeds the stream budget");
        }

        let parsed = packet::decode(&self.buf[..len])?;
        Ok(ReceivedFrame {
            counter: parsed.counter,
            jpeg: parsed.jpeg.to_vec(),
            from,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn pair() -> (UdpFrameSender, FrameReceiver) {
        let receiver = FrameReceiver::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let target = receiver.local_addr().unwrap();
        let sender = UdpFrameSender::bind(target).await.unwrap();
        (sender, receiver)
    }

    #[tokio::test]
    async fn one_packet_is_one_datagram() {
        let (mut sender, mut receiver) = pair().await;

        let pkt = packet::encode(77, &[0xFF, 0xD8, 0x01, 0x02]);
        let n = sender.send_datagram(&pkt).await.unwrap();
        assert_eq!(n, pkt.len());

        let frame = tokio::time::timeout(Duration::from_secs(5), receiver.recv_frame())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(frame.counter, 77);
        assert_eq!(frame.jpeg, vec![0xFF, 0xD8, 0x01, 0x02]);
        assert_eq!(frame.from.port(), sender.local_addr().unwrap().port());

        assert_eq!(sender.datagrams_sent(), 1);
        assert_eq!(sender.bytes_sent(), pkt.len() as u64);
    }

    #[tokio::test]
    async fn malformed_datagram_is_reported() {
        let (mut sender, mut receiver) = pair().await;
        sender.send_datagram(&[1, 2, 3]).await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), receiver.recv_frame())
            .await
            .expect("timeout")
            .unwrap_err();
        assert!(matches!(err, LinkError::InvalidPacket(_)));
    }
}
