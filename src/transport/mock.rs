//! Scripted transport for tests.
//!
//! Responses are consumed in order, one per `recv` call. A client that
//! discards a datagram calls `recv` again within the same attempt, so a
//! stale reply followed by a good one can be scripted as two entries.

use super::Transport;
use crate::error::{Error, Result};
use crate::message::{CommunityMessage, Message};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;
use bytes::Bytes;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

type Responder = Box<dyn FnMut(&[u8]) -> Option<Bytes> + Send>;

/// One scripted reaction to a `recv` call.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Community message whose request id is rewritten to the last request's.
    Data(Bytes),
    /// Delivered exactly as given.
    RawData(Bytes),
    /// Nothing arrives before the deadline.
    Timeout,
    /// The socket reports an error.
    IoError(String),
}

/// A datagram the client sent.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub data: Bytes,
    /// Request id of the PDU, when the message is readable in clear.
    pub request_id: Option<i32>,
}

struct MockState {
    target: SocketAddr,
    responses: VecDeque<MockResponse>,
    requests: Vec<RecordedRequest>,
    last_request_id: Option<i32>,
    /// Consulted when the queue is empty.
    responder: Option<Responder>,
}

/// Clones share state, so a test keeps one handle to inspect what the
/// client sent.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                target,
                responses: VecDeque::new(),
                requests: Vec::new(),
                last_request_id: None,
                responder: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn queue_response(&self, data: impl Into<Bytes>) {
        self.state().responses.push_back(MockResponse::Data(data.into()));
    }

    pub fn queue_raw_response(&self, data: impl Into<Bytes>) {
        self.state().responses.push_back(MockResponse::RawData(data.into()));
    }

    pub fn queue_timeout(&self) {
        self.state().responses.push_back(MockResponse::Timeout);
    }

    pub fn queue_io_error(&self, msg: impl Into<String>) {
        self.state().responses.push_back(MockResponse::IoError(msg.into()));
    }

    /// Answer requests from a closure once the queue runs dry. The closure
    /// sees the most recent request; `None` means no reply.
    pub fn set_responder(&self, responder: impl FnMut(&[u8]) -> Option<Bytes> + Send + 'static) {
        self.state().responder = Some(Box::new(responder));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    pub fn queued_response_count(&self) -> usize {
        self.state().responses.len()
    }

    fn request_id_of(data: &Bytes) -> Option<i32> {
        Message::decode(data.clone())
            .ok()
            .and_then(|msg| msg.pdu().map(|pdu| pdu.request_id))
    }

    fn patch_request_id(data: Bytes, request_id: i32) -> Bytes {
        match Message::decode(data.clone()) {
            Ok(Message::Community(mut msg)) => {
                msg.pdu.request_id = request_id;
                msg.encode()
            }
            // v3 replies carry authentication over the ids; build them
            // with the right ids instead
            _ => data,
        }
    }
}

impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let data = Bytes::copy_from_slice(data);
        let request_id = Self::request_id_of(&data);
        let mut state = self.state();
        state.last_request_id = request_id;
        state.requests.push(RecordedRequest { data, request_id });
        Ok(())
    }

    async fn recv(&mut self, deadline: Instant) -> Result<Option<Bytes>> {
        let (response, target, last_id) = {
            let mut state = self.state();
            let response = match state.responses.pop_front() {
                Some(response) => Some(response),
                None => {
                    let last = state.requests.last().map(|r| r.data.clone());
                    match (state.responder.as_mut(), last) {
                        (Some(responder), Some(request)) => {
                            Some(responder(&request).map_or(MockResponse::Timeout, MockResponse::RawData))
                        }
                        _ => None,
                    }
                }
            };
            (response, state.target, state.last_request_id)
        };

        match response {
            Some(MockResponse::Data(data)) => Ok(Some(match last_id {
                Some(id) => Self::patch_request_id(data, id),
                None => data,
            })),
            Some(MockResponse::RawData(data)) => Ok(Some(data)),
            Some(MockResponse::IoError(msg)) => Err(Error::Io {
                target: Some(target),
                source: std::io::Error::other(msg),
            }),
            Some(MockResponse::Timeout) | None => {
                tokio::time::sleep_until(deadline).await;
                Ok(None)
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.state().target
    }
}

/// Builds community Response messages for scripting.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    pdu: Pdu,
}

impl ResponseBuilder {
    pub fn new(request_id: i32) -> Self {
        Self {
            pdu: Pdu {
                pdu_type: PduType::Response,
                request_id,
                error_status: 0,
                error_index: 0,
                varbinds: Vec::new(),
            },
        }
    }

    pub fn varbind(mut self, oid: Oid, value: impl Into<Value>) -> Self {
        self.pdu.varbinds.push(VarBind::new(oid, value.into()));
        self
    }

    pub fn error(mut self, status: i32, index: i32) -> Self {
        self.pdu.error_status = status;
        self.pdu.error_index = index;
        self
    }

    pub fn pdu_type(mut self, pdu_type: PduType) -> Self {
        self.pdu.pdu_type = pdu_type;
        self
    }

    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }

    pub fn build(self, version: Version, community: &[u8]) -> Bytes {
        CommunityMessage::new(version, Bytes::copy_from_slice(community), self.pdu).encode()
    }

    pub fn build_v1(self, community: &[u8]) -> Bytes {
        self.build(Version::V1, community)
    }

    pub fn build_v2c(self, community: &[u8]) -> Bytes {
        self.build(Version::V2c, community)
    }
}
