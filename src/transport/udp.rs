//! UDP transport.

use super::Transport;
use crate::error::{Error, Result};
use crate::message::MSG_MAX_SIZE;
use crate::util::{RECV_BUFFER_SIZE, bind_ephemeral_udp_socket};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};

/// Connected UDP socket to one target.
///
/// Connecting filters datagrams from other sources in the kernel. Closing
/// happens on drop.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
    buf: Vec<u8>,
}

impl UdpTransport {
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let io_err = |source| Error::Io {
            target: Some(target),
            source,
        };

        let socket = bind_ephemeral_udp_socket(target, Some(RECV_BUFFER_SIZE)).map_err(io_err)?;
        socket.connect(target).await.map_err(io_err)?;

        tracing::debug!(
            target: "syno_snmp::transport",
            { snmp.target = %target, snmp.local_addr = ?socket.local_addr().ok() },
            "UDP transport connected"
        );

        Ok(Self {
            socket,
            target,
            // one spare byte detects datagrams over the limit
            buf: vec![0u8; MSG_MAX_SIZE + 1],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|source| Error::Io {
            target: Some(self.target),
            source,
        })
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        tracing::trace!(target: "syno_snmp::transport", { snmp.bytes = data.len() }, "UDP send");
        self.socket.send(data).await.map_err(|source| Error::Io {
            target: Some(self.target),
            source,
        })?;
        Ok(())
    }

    async fn recv(&mut self, deadline: Instant) -> Result<Option<Bytes>> {
        loop {
            let len = match timeout_at(deadline, self.socket.recv(&mut self.buf)).await {
                Err(_elapsed) => return Ok(None),
                Ok(Err(source)) => {
                    return Err(Error::Io {
                        target: Some(self.target),
                        source,
                    });
                }
                Ok(Ok(len)) => len,
            };

            if len > MSG_MAX_SIZE {
                tracing::debug!(
                    target: "syno_snmp::transport",
                    { snmp.bytes = len },
                    "dropping oversized datagram"
                );
                continue;
            }
            tracing::trace!(target: "syno_snmp::transport", { snmp.bytes = len }, "UDP recv");
            return Ok(Some(Bytes::copy_from_slice(&self.buf[..len])));
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.target
    }
}
