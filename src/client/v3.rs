//! SNMPv3 side of the client: engine discovery, key localization, and
//! building and checking USM-secured messages.

use bytes::Bytes;

use crate::error::{AuthErrorKind, CryptoErrorKind, EncodeErrorKind, Error, ErrorStatus, Result};
use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::v3::{
    AuthProtocol, EngineState, LocalizedKey, PrivKey, PrivProtocol, ReportKind, SaltCounter,
    UsmSecurityParams, classify_report, find_auth_params_offset,
};

use super::{Client, Received, matches_attempt};

/// USM credentials. Passphrases never leave the process; only keys
/// localized to the discovered engine are used on the wire.
#[derive(Clone)]
pub struct V3SecurityConfig {
    pub username: Bytes,
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    /// Ignored without `auth`.
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
}

impl V3SecurityConfig {
    pub fn new(username: impl Into<Bytes>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }

    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Localize both keys to `engine_id`.
    pub fn derive_keys(&self, engine_id: &[u8]) -> V3Keys {
        let auth_key = self
            .auth
            .as_ref()
            .map(|(protocol, password)| LocalizedKey::from_password(*protocol, password, engine_id));
        let priv_key = match (&self.auth, &self.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, password))) => Some(
                PrivKey::from_password(*auth_protocol, *priv_protocol, password, engine_id),
            ),
            _ => None,
        };
        tracing::trace!(target: "syno_snmp::usm", has_auth = auth_key.is_some(), has_priv = priv_key.is_some(), "localized keys");
        V3Keys { auth_key, priv_key }
    }
}

impl std::fmt::Debug for V3SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3SecurityConfig")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .finish()
    }
}

/// Keys localized to one engine.
#[derive(Default)]
pub struct V3Keys {
    pub auth_key: Option<LocalizedKey>,
    pub priv_key: Option<PrivKey>,
}

/// Per-session USM state: cached after discovery, kept for the life of
/// the client.
#[derive(Default)]
pub(super) struct UsmState {
    pub(super) engine: Option<EngineState>,
    pub(super) keys: V3Keys,
    pub(super) salt: SaltCounter,
}

struct HexBytes<'a>(&'a [u8]);

impl std::fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

impl<T: Transport> Client<T> {
    fn security(&self) -> Result<&V3SecurityConfig> {
        self.config
            .v3_security
            .as_ref()
            .ok_or_else(|| Error::encode(EncodeErrorKind::NoSecurityConfig))
    }

    /// Discover the authoritative engine once per session.
    ///
    /// Runs through the normal retry loop: while no engine is cached the
    /// encoder emits the discovery request and the receiver takes the first
    /// Report carrying an engine id.
    pub(super) async fn ensure_engine(&mut self) -> Result<()> {
        if self.usm.engine.is_some() {
            return Ok(());
        }
        self.security()?;
        tracing::debug!(target: "syno_snmp::usm", { snmp.target = %self.peer_addr() }, "discovering engine");
        self.round_trip(Pdu::get_request(0, &[])).await?;
        if self.usm.engine.is_none() {
            return Err(Error::UnknownEngineId {
                target: Some(self.peer_addr()),
            });
        }
        Ok(())
    }

    /// Serialize one attempt of a v3 request: fresh time estimate, fresh
    /// salt, then sign over the finished bytes.
    pub(super) fn encode_v3(&mut self, pdu: &Pdu) -> Result<Bytes> {
        let target = Some(self.peer_addr());
        let security = self
            .config
            .v3_security
            .as_ref()
            .ok_or_else(|| Error::encode(EncodeErrorKind::NoSecurityConfig))?;
        let Some(engine) = &self.usm.engine else {
            return Ok(V3Message::discovery_request(pdu.request_id).encode());
        };

        let level = security.security_level();
        let boots = engine.engine_boots;
        let time = engine.estimated_time();
        let scoped = ScopedPdu::new(engine.engine_id.clone(), pdu.clone());
        let mut usm = UsmSecurityParams::new(
            engine.engine_id.clone(),
            boots,
            time,
            security.username.clone(),
        );

        let data = if level.requires_priv() {
            let priv_key = self
                .usm
                .keys
                .priv_key
                .as_ref()
                .ok_or_else(|| Error::encode(EncodeErrorKind::KeysNotDerived))?;
            let salt = self.usm.salt.next();
            let (ciphertext, priv_params) = priv_key
                .encrypt(&scoped.encode_to_bytes(), boots, time, salt)
                .map_err(|e| match e {
                    Error::EncryptionFailed { kind, .. } => Error::encrypt(target, kind),
                    other => other,
                })?;
            usm = usm.with_priv_params(priv_params);
            V3MessageData::Encrypted(ciphertext)
        } else {
            V3MessageData::Plaintext(scoped)
        };

        let auth_key = if level.requires_auth() {
            let key = self
                .usm
                .keys
                .auth_key
                .as_ref()
                .ok_or_else(|| Error::encode(EncodeErrorKind::KeysNotDerived))?;
            usm = usm.with_auth_placeholder(key.mac_len());
            Some(key)
        } else {
            None
        };

        let message = V3Message {
            global_data: MsgGlobalData::new(pdu.request_id, MsgFlags::new(level, true)),
            security_params: usm.encode(),
            data,
        };
        let encoded = message.encode();

        let Some(key) = auth_key else {
            return Ok(encoded);
        };
        let mut signed = encoded.to_vec();
        let (offset, len) = find_auth_params_offset(&signed)
            .map_err(|_| Error::encode(EncodeErrorKind::MissingAuthParams))?;
        key.sign(&mut signed, offset, len)?;
        Ok(Bytes::from(signed))
    }

    pub(super) fn accept_v3(
        &mut self,
        message: V3Message,
        datagram: &[u8],
        attempt_ids: &[i32],
    ) -> Result<Received> {
        let target = Some(self.peer_addr());

        if !matches_attempt(message.msg_id(), attempt_ids) {
            tracing::debug!(
                target: "syno_snmp::usm",
                { msg_id = message.msg_id(), ?attempt_ids },
                "discarding reply to another request"
            );
            return Ok(Received::Discard);
        }
        let usm = match UsmSecurityParams::decode(message.security_params.clone()) {
            Ok(usm) => usm,
            Err(e) => {
                tracing::debug!(target: "syno_snmp::usm", error = %e, "discarding reply with bad USM parameters");
                return Ok(Received::Discard);
            }
        };

        if self.usm.engine.is_none() {
            return self.accept_discovery(message, usm);
        }

        let requested = self.security()?.security_level();
        let authenticated = message.security_level().requires_auth();
        if authenticated {
            let key = self
                .usm
                .keys
                .auth_key
                .as_ref()
                .ok_or_else(|| Error::auth(target, AuthErrorKind::UnsupportedSecurityLevel))?;
            let (offset, len) = find_auth_params_offset(datagram)
                .map_err(|_| Error::auth(target, AuthErrorKind::AuthParamsNotFound))?;
            key.verify(datagram, offset, len).map_err(|e| match e {
                Error::AuthenticationFailed { kind, .. } => Error::auth(target, kind),
                other => other,
            })?;
            tracing::trace!(target: "syno_snmp::usm", "reply authenticated");
            if let Some(engine) = self.usm.engine.as_mut() {
                engine.resync(usm.engine_boots, usm.engine_time);
            }
        }

        let scoped = match message.data {
            V3MessageData::Plaintext(scoped) => scoped,
            V3MessageData::Encrypted(ciphertext) => {
                let priv_key = self
                    .usm
                    .keys
                    .priv_key
                    .as_ref()
                    .ok_or_else(|| Error::decrypt(target, CryptoErrorKind::NoPrivKey))?;
                let with_target = |e: Error| match e {
                    Error::DecryptionFailed { kind, .. } => Error::decrypt(target, kind),
                    other => other,
                };
                let plaintext = priv_key
                    .decrypt(&ciphertext, usm.engine_boots, usm.engine_time, &usm.priv_params)
                    .map_err(with_target)?;
                ScopedPdu::decode_decrypted(plaintext).map_err(|e| {
                    tracing::debug!(target: "syno_snmp::usm", error = %e, "decrypted payload does not decode");
                    Error::decrypt(target, CryptoErrorKind::AgentDecryptionError)
                })?
            }
        };

        if scoped.pdu.pdu_type == PduType::Report {
            return self.handle_report(&scoped.pdu, &usm);
        }
        if requested.requires_auth() && !authenticated {
            return Err(Error::auth(target, AuthErrorKind::SecurityLevelDowngrade));
        }
        if !matches_attempt(scoped.pdu.request_id, attempt_ids) {
            tracing::debug!(
                target: "syno_snmp::usm",
                request_id = scoped.pdu.request_id,
                "discarding scoped PDU for another request"
            );
            return Ok(Received::Discard);
        }
        self.expect_response(scoped.pdu).map(Received::Accept)
    }

    fn accept_discovery(&mut self, message: V3Message, usm: UsmSecurityParams) -> Result<Received> {
        let Some(scoped) = message.scoped_pdu() else {
            tracing::debug!(target: "syno_snmp::usm", "discarding encrypted reply to discovery");
            return Ok(Received::Discard);
        };
        if usm.engine_id.is_empty() {
            tracing::debug!(target: "syno_snmp::usm", "discarding discovery reply without engine id");
            return Ok(Received::Discard);
        }

        tracing::debug!(
            target: "syno_snmp::usm",
            {
                snmp.engine_id = %HexBytes(&usm.engine_id),
                snmp.engine_boots = usm.engine_boots,
                snmp.engine_time = usm.engine_time
            },
            "discovered engine"
        );
        let pdu = scoped.pdu.clone();
        self.usm.keys = self.security()?.derive_keys(&usm.engine_id);
        self.usm.engine = Some(EngineState::new(usm.engine_id, usm.engine_boots, usm.engine_time));
        Ok(Received::Accept(pdu))
    }

    fn handle_report(&mut self, pdu: &Pdu, usm: &UsmSecurityParams) -> Result<Received> {
        let target = Some(self.peer_addr());
        let kind = classify_report(pdu).unwrap_or(ReportKind::Other(None));
        tracing::debug!(target: "syno_snmp::usm", report = ?kind, "agent sent Report");

        match kind {
            ReportKind::NotInTimeWindow => {
                if let Some(engine) = self.usm.engine.as_mut() {
                    engine.reset_time(usm.engine_boots, usm.engine_time);
                }
                Ok(Received::Retry(Error::NotInTimeWindow { target }))
            }
            ReportKind::UnknownEngineId => Err(Error::UnknownEngineId { target }),
            ReportKind::WrongDigest => Err(Error::auth(target, AuthErrorKind::WrongDigest)),
            ReportKind::UnknownUserName => Err(Error::auth(target, AuthErrorKind::UnknownUser)),
            ReportKind::UnsupportedSecLevel => {
                Err(Error::auth(target, AuthErrorKind::UnsupportedSecurityLevel))
            }
            ReportKind::DecryptionError => {
                Err(Error::decrypt(target, CryptoErrorKind::AgentDecryptionError))
            }
            ReportKind::Other(oid) => Err(Error::Snmp {
                target,
                status: ErrorStatus::GenErr,
                index: 0,
                oid,
            }),
        }
    }
}
