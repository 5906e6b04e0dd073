//! Scripted SNMP agent on loopback.
//!
//! Serves GET, GETNEXT and GETBULK from a `BTreeMap<Oid, Value>` over a
//! tokio `UdpSocket`. Community and USM requests are both understood; USM
//! replies are signed and encrypted with the crate's own key localization.
//! Faults (dropped requests, delays, time-window reports) are scripted on
//! the builder.

use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use syno_snmp::message::{
    CommunityMessage, Message, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message,
    V3MessageData,
};
use syno_snmp::v3::{LocalizedKey, PrivKey, UsmSecurityParams, find_auth_params_offset};
use syno_snmp::{AuthProtocol, Oid, Pdu, PduType, PrivProtocol, Value, VarBind, Version, oid};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// usmStats counters used in Reports.
const UNKNOWN_ENGINE_IDS: u32 = 4;
const NOT_IN_TIME_WINDOWS: u32 = 2;
const WRONG_DIGESTS: u32 = 5;

pub const ENGINE_ID: &[u8] = b"\x80\x00\x19\xc9\x03\x00\x11\x32\x8a\xbc\xde";

/// USM user known to the agent.
#[derive(Clone)]
pub struct V3User {
    pub name: &'static str,
    pub auth: Option<(AuthProtocol, &'static str)>,
    pub privacy: Option<(PrivProtocol, &'static str)>,
}

impl V3User {
    fn level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            _ => SecurityLevel::NoAuthNoPriv,
        }
    }

    fn auth_key(&self) -> Option<LocalizedKey> {
        self.auth
            .map(|(proto, pass)| LocalizedKey::from_password(proto, pass.as_bytes(), ENGINE_ID))
    }

    fn priv_key(&self) -> Option<PrivKey> {
        let (auth, _) = self.auth?;
        let (privacy, pass) = self.privacy?;
        Some(PrivKey::from_password(auth, privacy, pass.as_bytes(), ENGINE_ID))
    }
}

pub struct TestAgentBuilder {
    community: Bytes,
    table: BTreeMap<Oid, Value>,
    user: Option<V3User>,
    drop_first: usize,
    delay: Duration,
    time_window_reports: usize,
    engine_boots: u32,
    engine_time: u32,
}

impl TestAgentBuilder {
    pub fn community(mut self, community: &[u8]) -> Self {
        self.community = Bytes::copy_from_slice(community);
        self
    }

    pub fn table(mut self, table: BTreeMap<Oid, Value>) -> Self {
        self.table = table;
        self
    }

    pub fn user(mut self, user: V3User) -> Self {
        self.user = Some(user);
        self
    }

    /// Ignore the first `n` datagrams.
    pub fn drop_first(mut self, n: usize) -> Self {
        self.drop_first = n;
        self
    }

    /// Wait this long before each reply.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer the first `n` authenticated requests with notInTimeWindow.
    pub fn time_window_reports(mut self, n: usize) -> Self {
        self.time_window_reports = n;
        self
    }

    pub async fn start(self) -> TestAgent {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("bind test agent");
        let addr = socket.local_addr().expect("agent address");
        let received = Arc::new(Mutex::new(Vec::new()));
        let auth_key = self.user.as_ref().and_then(V3User::auth_key);
        let priv_key = self.user.as_ref().and_then(V3User::priv_key);
        let state = AgentState {
            config: self,
            auth_key,
            priv_key,
            received: received.clone(),
            answered: Arc::new(AtomicUsize::new(0)),
        };
        let answered = state.answered.clone();
        let task = tokio::spawn(state.run(socket));
        TestAgent {
            addr,
            received,
            answered,
            task,
        }
    }
}

pub struct TestAgent {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Bytes>>>,
    answered: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestAgent {
    pub fn builder() -> TestAgentBuilder {
        TestAgentBuilder {
            community: Bytes::from_static(b"public"),
            table: super::fixtures::diskstation_table(),
            user: None,
            drop_first: 0,
            delay: Duration::ZERO,
            time_window_reports: 0,
            engine_boots: 3,
            engine_time: 12_345,
        }
    }

    /// Agent serving the DiskStation fixture table to community "public".
    pub async fn new() -> Self {
        Self::builder().start().await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Every datagram received, dropped ones included.
    pub fn received(&self) -> Vec<Bytes> {
        self.received.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn answered(&self) -> usize {
        self.answered.load(Ordering::SeqCst)
    }

    /// Received requests decoded as community messages.
    pub fn community_requests(&self) -> Vec<CommunityMessage> {
        self.received()
            .into_iter()
            .filter_map(|data| match Message::decode(data) {
                Ok(Message::Community(msg)) => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct AgentState {
    config: TestAgentBuilder,
    // localized once; derivation hashes a megabyte per key
    auth_key: Option<LocalizedKey>,
    priv_key: Option<PrivKey>,
    received: Arc<Mutex<Vec<Bytes>>>,
    answered: Arc<AtomicUsize>,
}

impl AgentState {
    async fn run(mut self, socket: UdpSocket) {
        let mut buf = vec![0u8; 65535];
        let mut count = 0usize;
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let data = Bytes::copy_from_slice(&buf[..len]);
            self.received.lock().unwrap().push(data.clone());
            count += 1;
            if count <= self.config.drop_first {
                continue;
            }
            let Some(reply) = self.respond(data) else {
                continue;
            };
            if !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
            if socket.send_to(&reply, peer).await.is_ok() {
                self.answered.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn respond(&mut self, data: Bytes) -> Option<Bytes> {
        match Message::decode(data.clone()).ok()? {
            Message::Community(msg) => {
                if msg.community != self.config.community {
                    return None;
                }
                let response = self.answer(msg.version, &msg.pdu);
                Some(CommunityMessage::new(msg.version, msg.community, response).encode())
            }
            Message::V3(msg) => self.respond_v3(&data, msg),
        }
    }

    fn respond_v3(&mut self, raw: &[u8], msg: V3Message) -> Option<Bytes> {
        let user = self.config.user.clone()?;
        let usm = UsmSecurityParams::decode(msg.security_params.clone()).ok()?;
        let msg_id = msg.msg_id();

        if usm.engine_id.is_empty() {
            return Some(self.report(msg_id, msg_id, UNKNOWN_ENGINE_IDS, SecurityLevel::NoAuthNoPriv, &user));
        }

        let level = msg.security_level();
        if level.requires_auth() {
            let key = self.auth_key.as_ref()?;
            let verified = find_auth_params_offset(raw)
                .ok()
                .is_some_and(|(offset, len)| key.verify(raw, offset, len).is_ok());
            if !verified {
                return Some(self.report(msg_id, 0, WRONG_DIGESTS, SecurityLevel::NoAuthNoPriv, &user));
            }
            if self.config.time_window_reports > 0 {
                self.config.time_window_reports -= 1;
                self.config.engine_time += 100;
                return Some(self.report(msg_id, 0, NOT_IN_TIME_WINDOWS, SecurityLevel::AuthNoPriv, &user));
            }
        }

        let scoped = match msg.data {
            V3MessageData::Plaintext(scoped) => scoped,
            V3MessageData::Encrypted(ciphertext) => {
                let plaintext = self
                    .priv_key
                    .as_ref()?
                    .decrypt(&ciphertext, usm.engine_boots, usm.engine_time, &usm.priv_params)
                    .ok()?;
                ScopedPdu::decode_decrypted(plaintext).ok()?
            }
        };

        let response = self.answer(Version::V3, &scoped.pdu);
        Some(self.encode_v3(msg_id, user.level().min(level), response, &user))
    }

    fn report(
        &self,
        msg_id: i32,
        request_id: i32,
        counter: u32,
        level: SecurityLevel,
        user: &V3User,
    ) -> Bytes {
        let pdu = Pdu {
            pdu_type: PduType::Report,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(
                oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, counter, 0),
                Value::Counter32(1),
            )],
        };
        self.encode_v3(msg_id, level, pdu, user)
    }

    fn encode_v3(&self, msg_id: i32, level: SecurityLevel, pdu: Pdu, user: &V3User) -> Bytes {
        let boots = self.config.engine_boots;
        let time = self.config.engine_time;
        let scoped = ScopedPdu::new(Bytes::from_static(ENGINE_ID), pdu);
        let global = MsgGlobalData::new(msg_id, MsgFlags::new(level, false));
        let mut usm = UsmSecurityParams::new(
            Bytes::from_static(ENGINE_ID),
            boots,
            time,
            Bytes::copy_from_slice(user.name.as_bytes()),
        );
        let auth_key = self.auth_key.as_ref().filter(|_| level.requires_auth());
        if let Some(key) = auth_key {
            usm = usm.with_auth_placeholder(key.mac_len());
        }

        let msg = match (level.requires_priv(), &self.priv_key) {
            (true, Some(key)) => {
                let (ciphertext, salt) = key
                    .encrypt(&scoped.encode_to_bytes(), boots, time, 0x5a5a_0000_0000_0001)
                    .expect("agent encryption");
                V3Message::new_encrypted(global, usm.with_priv_params(salt).encode(), ciphertext)
            }
            _ => V3Message::new(global, usm.encode(), scoped),
        };

        let encoded = msg.encode();
        let Some(key) = auth_key else {
            return encoded;
        };
        let mut signed = BytesMut::from(&encoded[..]);
        let (offset, len) = find_auth_params_offset(&signed).expect("auth field");
        key.sign(&mut signed, offset, len).expect("agent signing");
        signed.freeze()
    }

    fn answer(&self, version: Version, request: &Pdu) -> Pdu {
        let mut response = Pdu {
            pdu_type: PduType::Response,
            request_id: request.request_id,
            error_status: 0,
            error_index: 0,
            varbinds: Vec::new(),
        };
        let v1 = version == Version::V1;

        match request.pdu_type {
            PduType::GetRequest => {
                for (i, vb) in request.varbinds.iter().enumerate() {
                    match self.config.table.get(&vb.oid) {
                        Some(value) => response.varbinds.push(VarBind::new(vb.oid.clone(), value.clone())),
                        None if v1 => return no_such_name(response, request, i),
                        None => response.varbinds.push(VarBind::new(vb.oid.clone(), Value::NoSuchObject)),
                    }
                }
            }
            PduType::GetNextRequest => {
                for (i, vb) in request.varbinds.iter().enumerate() {
                    match self.next_after(&vb.oid) {
                        Some(next) => response.varbinds.push(next),
                        None if v1 => return no_such_name(response, request, i),
                        None => response.varbinds.push(VarBind::new(vb.oid.clone(), Value::EndOfMibView)),
                    }
                }
            }
            PduType::GetBulkRequest => {
                let non_repeaters = usize::try_from(request.error_status).unwrap_or(0);
                let max_repetitions = usize::try_from(request.error_index).unwrap_or(0);
                let split = non_repeaters.min(request.varbinds.len());
                let (singles, repeaters) = request.varbinds.split_at(split);
                for vb in singles {
                    response.varbinds.push(self.next_or_end(&vb.oid));
                }
                let mut cursors: Vec<Oid> = repeaters.iter().map(|vb| vb.oid.clone()).collect();
                for _ in 0..max_repetitions {
                    let mut advanced = false;
                    for cursor in cursors.iter_mut() {
                        let vb = self.next_or_end(cursor);
                        if !vb.value.is_exception() {
                            advanced = true;
                            *cursor = vb.oid.clone();
                        }
                        response.varbinds.push(vb);
                    }
                    if !advanced {
                        break;
                    }
                }
            }
            _ => {
                response.error_status = 5;
                response.varbinds = request.varbinds.clone();
            }
        }
        response
    }

    fn next_after(&self, oid: &Oid) -> Option<VarBind> {
        self.config
            .table
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .next()
            .map(|(oid, value)| VarBind::new(oid.clone(), value.clone()))
    }

    fn next_or_end(&self, oid: &Oid) -> VarBind {
        self.next_after(oid)
            .unwrap_or_else(|| VarBind::new(oid.clone(), Value::EndOfMibView))
    }
}

fn no_such_name(mut response: Pdu, request: &Pdu, index: usize) -> Pdu {
    response.error_status = 2;
    response.error_index = i32::try_from(index + 1).unwrap_or(i32::MAX);
    response.varbinds = request.varbinds.clone();
    response
}
