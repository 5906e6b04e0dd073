//! Key localization and message authentication (RFC 3414 §6, appendix A.2).

use digest::{Digest, KeyInit, Mac};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;
use crate::error::{AuthErrorKind, CryptoErrorKind, Error, Result};

/// Passphrase length below which net-snmp refuses to derive keys.
pub const MIN_PASSWORD_LENGTH: usize = 8;

const EXPANSION_SIZE: usize = 1_048_576;

/// A key derived from a passphrase and bound to one engine ID.
///
/// Used directly as the HMAC key, and as raw material for the privacy key.
/// Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// `Kul = H(Ku || engineID || Ku)`, where `Ku` hashes the passphrase
    /// repeated out to one megabyte.
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        if password.len() < MIN_PASSWORD_LENGTH {
            tracing::warn!(target: "syno_snmp::usm", { password_len = password.len(), min_len = MIN_PASSWORD_LENGTH }, "SNMPv3 passphrase shorter than recommended minimum");
        }
        let mut master = match protocol {
            AuthProtocol::Md5 => password_to_key::<md5::Md5>(password),
            AuthProtocol::Sha1 => password_to_key::<sha1::Sha1>(password),
            AuthProtocol::Sha256 => password_to_key::<sha2::Sha256>(password),
        };
        let key = match protocol {
            AuthProtocol::Md5 => localize::<md5::Md5>(&master, engine_id),
            AuthProtocol::Sha1 => localize::<sha1::Sha1>(&master, engine_id),
            AuthProtocol::Sha256 => localize::<sha2::Sha256>(&master, engine_id),
        };
        master.zeroize();
        Self { key, protocol }
    }

    /// Wrap an already-localized key.
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// HMAC of `data`, truncated to [`mac_len`](Self::mac_len).
    pub fn compute_hmac(&self, data: &[u8]) -> Result<Vec<u8>> {
        macro_rules! hmac {
            ($digest:ty) => {{
                let mut mac = <hmac::Hmac<$digest> as KeyInit>::new_from_slice(&self.key)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?;
                Mac::update(&mut mac, data);
                mac.finalize().into_bytes().to_vec()
            }};
        }

        let mut full = match self.protocol {
            AuthProtocol::Md5 => hmac!(md5::Md5),
            AuthProtocol::Sha1 => hmac!(sha1::Sha1),
            AuthProtocol::Sha256 => hmac!(sha2::Sha256),
        };
        full.truncate(self.mac_len());
        Ok(full)
    }

    /// Sign a serialized message in place.
    ///
    /// `auth_offset` and `auth_len` locate the zero-filled
    /// msgAuthenticationParameters, as returned by
    /// [`find_auth_params_offset`](super::find_auth_params_offset); the HMAC
    /// is computed over the whole message and spliced in there.
    pub fn sign(&self, message: &mut [u8], auth_offset: usize, auth_len: usize) -> Result<()> {
        let field = self.auth_field(message.len(), auth_offset, auth_len)?;
        message[field.clone()].fill(0);
        let mac = self.compute_hmac(message)?;
        message[field].copy_from_slice(&mac);
        Ok(())
    }

    /// Verify a received message's HMAC in constant time.
    ///
    /// A field whose length is not this protocol's MAC length is rejected
    /// before anything is hashed.
    pub fn verify(&self, message: &[u8], auth_offset: usize, auth_len: usize) -> Result<()> {
        let field = self.auth_field(message.len(), auth_offset, auth_len)?;
        let mut zeroed = message.to_vec();
        zeroed[field.clone()].fill(0);
        let expected = self.compute_hmac(&zeroed)?;

        if bool::from(expected.ct_eq(&message[field])) {
            Ok(())
        } else {
            tracing::debug!(target: "syno_snmp::usm", "HMAC verification failed");
            Err(Error::auth(None, AuthErrorKind::HmacMismatch))
        }
    }

    fn auth_field(
        &self,
        message_len: usize,
        offset: usize,
        len: usize,
    ) -> Result<std::ops::Range<usize>> {
        if len != self.mac_len() {
            return Err(Error::auth(
                None,
                AuthErrorKind::WrongMacLength {
                    expected: self.mac_len(),
                    actual: len,
                },
            ));
        }
        let end = offset + len;
        if end > message_len {
            return Err(Error::auth(None, AuthErrorKind::AuthParamsNotFound));
        }
        Ok(offset..end)
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// RFC 3414 A.2.1: hash the passphrase repeated to 1 MiB, 64 octets at a time.
fn password_to_key<D: Digest>(password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![0u8; <D as Digest>::output_size()];
    }

    let mut hasher = D::new();
    let mut source = password.iter().cycle();
    let mut chunk = [0u8; 64];
    for _ in 0..EXPANSION_SIZE / chunk.len() {
        for (slot, byte) in chunk.iter_mut().zip(&mut source) {
            *slot = *byte;
        }
        hasher.update(chunk);
    }
    chunk.zeroize();
    hasher.finalize().to_vec()
}

/// RFC 3414 A.2.2.
fn localize<D: Digest>(master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(master);
    hasher.update(engine_id);
    hasher.update(master);
    hasher.finalize().to_vec()
}
