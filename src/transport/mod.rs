//! Transport layer.
//!
//! A [`Transport`] moves whole datagrams to and from one target. Correlation,
//! retries and deadlines live in the client; the transport only has to
//! honour the receive deadline it is handed.

mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::UdpTransport;

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockResponse, MockTransport, RecordedRequest, ResponseBuilder};

use crate::error::Result;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use tokio::time::Instant;

/// Datagram transport to a single target.
///
/// Methods take `&mut self`: a client owns its transport and has at most
/// one request outstanding.
pub trait Transport: Send {
    /// Send one request datagram.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next datagram from the target.
    ///
    /// Returns `Ok(None)` once `deadline` passes without a datagram.
    fn recv(&mut self, deadline: Instant) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// The target address.
    fn peer_addr(&self) -> SocketAddr;
}
