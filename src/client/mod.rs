//! SNMP client.
//!
//! A [`Client`] owns one transport to one target and runs one request at a
//! time: every operation takes `&mut self`.
//!
//! Each logical request is an explicit retry loop. The total budget is the
//! configured timeout; it is split evenly over `retries + 1` attempts, and
//! every attempt sends a fresh request id. A reply is accepted when its id
//! is any of the ids sent so far for this request (a late answer to an
//! earlier attempt is as good as any), or zero.
//!
//! ```rust,no_run
//! # use syno_snmp::{Client, oid};
//! # async fn example() -> syno_snmp::Result<()> {
//! let mut client = Client::v2c("192.168.1.10").community(b"public").connect().await?;
//! let uptime = client.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)]).await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod v3;
mod walk;

pub use builder::{CommunityClientBuilder, V3AuthClientBuilder, V3AuthPrivClientBuilder, V3ClientBuilder};
pub use v3::{V3Keys, V3SecurityConfig};
pub use walk::Walk;

use crate::error::{Error, Result};
use crate::message::{CommunityMessage, MSG_MAX_SIZE, Message};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::{Transport, UdpTransport};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Span, instrument};

/// Well-known SNMP agent port.
pub const DEFAULT_PORT: u16 = 161;

/// Client configuration.
///
/// Usually filled in by the builders on [`Client`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Default: v1, as the exporter ships
    pub version: Version,
    /// Default: "public"
    pub community: Bytes,
    /// Total budget per request, across all attempts. Default: 2 s.
    /// Requests fail with [`Error::Config`] when this is zero.
    pub timeout: Duration,
    /// Attempts after the first. Default: 3
    pub retries: u32,
    /// GETBULK max-repetitions for walks. Default: 10
    pub max_repetitions: u8,
    /// GETs with more OIDs are split. Default: 10
    pub max_oids_per_request: usize,
    pub v3_security: Option<V3SecurityConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: Version::V1,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(2),
            retries: 3,
            max_repetitions: 10,
            max_oids_per_request: 10,
            v3_security: None,
        }
    }
}

/// Per-session request id source.
///
/// Starts at a random positive value and wraps from `i32::MAX` to 1, so it
/// never yields zero or a negative id.
#[derive(Debug)]
struct RequestIds(i32);

impl RequestIds {
    fn new() -> Self {
        let seed = getrandom::u32().unwrap_or_else(|_| {
            tracing::warn!(target: "syno_snmp::client", "OS RNG unavailable; request ids start at 1");
            0
        });
        Self::starting_at((seed >> 1) as i32)
    }

    fn starting_at(first: i32) -> Self {
        Self(first.max(1))
    }

    fn next(&mut self) -> i32 {
        let id = self.0;
        self.0 = if id == i32::MAX { 1 } else { id + 1 };
        id
    }
}

/// Verdict on one received datagram.
enum Received {
    Accept(Pdu),
    /// Not for us or unreadable; keep waiting within the attempt.
    Discard,
    /// End this attempt early and retry with a fresh message.
    Retry(Error),
}

fn matches_attempt(request_id: i32, attempt_ids: &[i32]) -> bool {
    request_id == 0 || attempt_ids.contains(&request_id)
}

/// SNMP client for one target.
pub struct Client<T: Transport = UdpTransport> {
    transport: T,
    config: ClientConfig,
    request_ids: RequestIds,
    usm: v3::UsmState,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            request_ids: RequestIds::new(),
            usm: v3::UsmState::default(),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.transport.peer_addr()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn version(&self) -> Version {
        self.config.version
    }

    /// Send a request PDU and return the matching response PDU.
    ///
    /// The request id in `pdu` is replaced per attempt. Error status is
    /// left for the caller to interpret.
    pub async fn request(&mut self, pdu: Pdu) -> Result<Pdu> {
        if self.config.version == Version::V3 {
            self.ensure_engine().await?;
        }
        self.round_trip(pdu).await
    }

    #[instrument(
        level = "debug",
        target = "syno_snmp::client",
        skip(self, pdu),
        fields(
            snmp.target = %self.peer_addr(),
            snmp.pdu_type = %pdu.pdu_type,
            snmp.request_id = tracing::field::Empty,
            snmp.attempt = tracing::field::Empty,
            snmp.elapsed_ms = tracing::field::Empty,
        )
    )]
    pub(crate) async fn round_trip(&mut self, mut pdu: Pdu) -> Result<Pdu> {
        if self.config.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        let start = Instant::now();
        let total_deadline = start + self.config.timeout;
        let max_attempts = self.config.retries.saturating_add(1);
        let per_attempt = self.config.timeout / max_attempts;

        let mut attempt_ids: Vec<i32> = Vec::with_capacity(max_attempts.min(8) as usize);
        let mut attempts = 0u32;
        let mut last_failure: Option<Error> = None;

        while attempts < max_attempts && Instant::now() < total_deadline {
            attempts += 1;
            let request_id = self.request_ids.next();
            attempt_ids.push(request_id);
            pdu.request_id = request_id;

            let span = Span::current();
            span.record("snmp.request_id", request_id);
            span.record("snmp.attempt", attempts);
            if attempts > 1 {
                tracing::debug!(target: "syno_snmp::client", "retrying request");
            }

            let data = self.encode_request(&pdu)?;
            let attempt_deadline = (Instant::now() + per_attempt).min(total_deadline);

            tracing::trace!(target: "syno_snmp::client", { snmp.bytes = data.len() }, "sending request");
            if let Err(e) = self.transport.send(&data).await {
                tracing::debug!(target: "syno_snmp::client", error = %e, "send failed");
                last_failure = Some(e);
                continue;
            }
            last_failure = None;

            loop {
                let datagram = match self.transport.recv(attempt_deadline).await {
                    Ok(Some(datagram)) => datagram,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(target: "syno_snmp::client", error = %e, "receive failed");
                        last_failure = Some(e);
                        break;
                    }
                };

                match self.accept(datagram, &attempt_ids)? {
                    Received::Accept(response) => {
                        span.record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                        tracing::debug!(
                            target: "syno_snmp::client",
                            {
                                snmp.varbind_count = response.varbinds.len(),
                                snmp.error_status = response.error_status
                            },
                            "received {}",
                            response.pdu_type
                        );
                        return Ok(response);
                    }
                    Received::Discard => continue,
                    Received::Retry(e) => {
                        last_failure = Some(e);
                        break;
                    }
                }
            }
        }

        let elapsed = start.elapsed();
        Span::current().record("snmp.elapsed_ms", elapsed.as_millis() as u64);
        if let Some(e) = last_failure {
            return Err(e);
        }
        let request_id = attempt_ids.last().copied().unwrap_or(0);
        tracing::debug!(target: "syno_snmp::client", { request_id, attempts, ?elapsed }, "request timed out");
        Err(Error::Timeout {
            target: Some(self.peer_addr()),
            elapsed,
            request_id,
            attempts,
        })
    }

    fn encode_request(&mut self, pdu: &Pdu) -> Result<Bytes> {
        let data = match self.config.version {
            Version::V3 => self.encode_v3(pdu)?,
            version => {
                CommunityMessage::new(version, self.config.community.clone(), pdu.clone()).encode()
            }
        };
        if data.len() > MSG_MAX_SIZE {
            return Err(Error::MessageTooLarge {
                size: data.len(),
                max: MSG_MAX_SIZE,
            });
        }
        Ok(data)
    }

    fn accept(&mut self, datagram: Bytes, attempt_ids: &[i32]) -> Result<Received> {
        let message = match Message::decode(datagram.clone()) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(target: "syno_snmp::client", error = %e, "discarding undecodable datagram");
                return Ok(Received::Discard);
            }
        };

        let expected = self.config.version;
        if message.version() != expected {
            tracing::warn!(
                target: "syno_snmp::client",
                { ?expected, actual = ?message.version() },
                "discarding reply with wrong SNMP version"
            );
            return Ok(Received::Discard);
        }

        match message {
            Message::Community(msg) => {
                let pdu = msg.into_pdu();
                if !matches_attempt(pdu.request_id, attempt_ids) {
                    tracing::debug!(
                        target: "syno_snmp::client",
                        { request_id = pdu.request_id, ?attempt_ids },
                        "discarding reply to another request"
                    );
                    return Ok(Received::Discard);
                }
                self.expect_response(pdu).map(Received::Accept)
            }
            Message::V3(msg) => self.accept_v3(msg, &datagram, attempt_ids),
        }
    }

    fn expect_response(&self, pdu: Pdu) -> Result<Pdu> {
        if pdu.pdu_type != PduType::Response {
            tracing::warn!(target: "syno_snmp::client", pdu_type = %pdu.pdu_type, "matching reply is not a Response");
            return Err(Error::UnexpectedPdu {
                target: Some(self.peer_addr()),
                actual: pdu.pdu_type.tag(),
            });
        }
        Ok(pdu)
    }

    fn check_status(&self, pdu: Pdu) -> Result<Pdu> {
        if pdu.is_error() {
            return Err(Error::Snmp {
                target: Some(self.peer_addr()),
                status: pdu.error_status_enum(),
                index: u32::try_from(pdu.error_index).unwrap_or(0),
                oid: pdu.error_oid(),
            });
        }
        Ok(pdu)
    }

    /// GET the given OIDs, in order.
    ///
    /// Lists longer than `max_oids_per_request` go out as several requests.
    #[instrument(skip(self, oids), err, fields(snmp.target = %self.peer_addr(), snmp.oid_count = oids.len()))]
    pub async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let batch = self.config.max_oids_per_request.max(1);
        let mut results = Vec::with_capacity(oids.len());
        if oids.len() > batch {
            tracing::debug!(
                target: "syno_snmp::client",
                { snmp.batch_count = oids.len().div_ceil(batch) },
                "splitting GET into batches"
            );
        }
        for chunk in oids.chunks(batch) {
            let response = self.request(Pdu::get_request(0, chunk)).await?;
            results.extend(self.check_status(response)?.varbinds);
        }
        Ok(results)
    }

    /// GETNEXT for each OID.
    #[instrument(skip(self, oids), err, fields(snmp.target = %self.peer_addr(), snmp.oid_count = oids.len()))]
    pub async fn get_next(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        let response = self.request(Pdu::get_next_request(0, oids)).await?;
        Ok(self.check_status(response)?.varbinds)
    }

    /// GETBULK (v2c and v3 only).
    #[instrument(skip(self, oids), err, fields(snmp.target = %self.peer_addr(), snmp.oid_count = oids.len()))]
    pub async fn get_bulk(
        &mut self,
        oids: &[Oid],
        non_repeaters: u8,
        max_repetitions: u8,
    ) -> Result<Vec<VarBind>> {
        if !self.config.version.supports_bulk() {
            return Err(Error::Config("GETBULK requires SNMPv2c or SNMPv3".into()));
        }
        let response = self
            .request(Pdu::get_bulk(0, non_repeaters, max_repetitions, oids))
            .await?;
        Ok(self.check_status(response)?.varbinds)
    }

    /// Walk the subtree under `root`, one request per exhausted batch.
    pub fn walk(&mut self, root: Oid) -> Walk<'_, T> {
        Walk::new(self, root)
    }

    /// GET by dotted identifier, keyed by the identifiers as given.
    pub async fn get_map(&mut self, identifiers: &[&str]) -> Result<BTreeMap<String, Value>> {
        let oids = identifiers
            .iter()
            .map(|s| Oid::parse(s))
            .collect::<Result<Vec<_>>>()?;
        let varbinds = self.get(&oids).await?;
        if varbinds.len() != oids.len() {
            return Err(Error::Snmp {
                target: Some(self.peer_addr()),
                status: crate::error::ErrorStatus::GenErr,
                index: 0,
                oid: None,
            });
        }
        Ok(identifiers
            .iter()
            .map(|s| (*s).to_owned())
            .zip(varbinds.into_iter().map(|vb| vb.value))
            .collect())
    }

    /// Walk by dotted identifier; entries come back keyed by dotted OID.
    pub fn walk_entries(&mut self, root: &str) -> Result<Walk<'_, T>> {
        let root = Oid::parse(root)?;
        Ok(self.walk(root))
    }
}
