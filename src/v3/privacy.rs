//! Privacy (encryption) for SNMPv3: DES-CBC (RFC 3414 §8) and AES-128-CFB
//! (RFC 3826).
//!
//! DES: privParameters = engineBoots || counter (4+4 octets), and the IV
//! is the pre-IV (key octets 8..16) XOR that salt.
//!
//! AES: privParameters = a 64-bit counter, and the IV is the concatenation
//! engineBoots || engineTime || salt.

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthProtocol, LocalizedKey, PrivProtocol};
use crate::error::{CryptoErrorKind, Error, Result};

const DES_BLOCK: usize = 8;

/// Per-session salt source, seeded from the OS RNG. Never yields zero.
#[derive(Debug)]
pub struct SaltCounter(u64);

impl SaltCounter {
    pub fn new() -> Self {
        let mut buf = [0u8; 8];
        // A failed RNG read leaves the seed at zero. The salt only has to be
        // unique per key, which the counter still guarantees.
        if getrandom::fill(&mut buf).is_err() {
            tracing::warn!(target: "syno_snmp::usm", "OS RNG unavailable; salt counter starts at 1");
        }
        Self(u64::from_ne_bytes(buf))
    }

    pub fn from_value(value: u64) -> Self {
        Self(value)
    }

    /// Next salt, skipping zero on wraparound.
    pub fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(1);
        if self.0 == 0 {
            self.0 = 1;
        }
        self.0
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Localized privacy key. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Localize the privacy passphrase with the authentication hash.
    pub fn from_password(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Self {
        let localized = LocalizedKey::from_password(auth_protocol, password, engine_id);
        Self::from_bytes(priv_protocol, localized.as_bytes())
    }

    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    fn material(&self) -> Result<&[u8]> {
        self.key
            .get(..self.protocol.key_len())
            .ok_or_else(|| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))
    }

    /// Encrypt a serialized ScopedPDU.
    ///
    /// Returns `(ciphertext, privParameters)`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        let key = self.material()?;
        match self.protocol {
            PrivProtocol::Des => {
                use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

                let mut params = [0u8; 8];
                params[..4].copy_from_slice(&engine_boots.to_be_bytes());
                params[4..].copy_from_slice(&(salt as u32).to_be_bytes());
                let iv = des_iv(key, &params);

                let padded_len = plaintext.len().div_ceil(DES_BLOCK) * DES_BLOCK;
                let mut buffer = vec![0u8; padded_len];
                buffer[..plaintext.len()].copy_from_slice(plaintext);

                let ciphertext = cbc::Encryptor::<des::Des>::new_from_slices(&key[..8], &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?
                    .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
                    .map_err(|_| {
                        Error::encrypt(
                            None,
                            CryptoErrorKind::InvalidCiphertextLength {
                                length: padded_len,
                                block_size: DES_BLOCK,
                            },
                        )
                    })?;
                Ok((
                    Bytes::copy_from_slice(ciphertext),
                    Bytes::copy_from_slice(&params),
                ))
            }
            PrivProtocol::Aes128 => {
                use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

                let params = salt.to_be_bytes();
                let iv = aes_iv(engine_boots, engine_time, &params);
                let mut buffer = plaintext.to_vec();
                cfb_mode::Encryptor::<aes::Aes128>::new_from_slices(key, &iv)
                    .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidKeyLength))?
                    .encrypt(&mut buffer);
                Ok((Bytes::from(buffer), Bytes::copy_from_slice(&params)))
            }
        }
    }

    /// Decrypt an encrypted ScopedPDU using the received privParameters.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        let params: [u8; 8] = priv_params.try_into().map_err(|_| {
            Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: 8,
                    actual: priv_params.len(),
                },
            )
        })?;
        let key = self
            .material()
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?;

        match self.protocol {
            PrivProtocol::Des => {
                use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};

                if ciphertext.len() % DES_BLOCK != 0 {
                    return Err(Error::decrypt(
                        None,
                        CryptoErrorKind::InvalidCiphertextLength {
                            length: ciphertext.len(),
                            block_size: DES_BLOCK,
                        },
                    ));
                }
                let iv = des_iv(key, &params);
                let mut buffer = ciphertext.to_vec();
                let len = cbc::Decryptor::<des::Des>::new_from_slices(&key[..8], &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?
                    .decrypt_padded_mut::<NoPadding>(&mut buffer)
                    .map_err(|_| {
                        Error::decrypt(
                            None,
                            CryptoErrorKind::InvalidCiphertextLength {
                                length: ciphertext.len(),
                                block_size: DES_BLOCK,
                            },
                        )
                    })?
                    .len();
                buffer.truncate(len);
                Ok(Bytes::from(buffer))
            }
            PrivProtocol::Aes128 => {
                use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

                let iv = aes_iv(engine_boots, engine_time, &params);
                let mut buffer = ciphertext.to_vec();
                cfb_mode::Decryptor::<aes::Aes128>::new_from_slices(key, &iv)
                    .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidKeyLength))?
                    .decrypt(&mut buffer);
                Ok(Bytes::from(buffer))
            }
        }
    }
}

fn des_iv(key: &[u8], salt: &[u8; 8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for (i, out) in iv.iter_mut().enumerate() {
        *out = key[8 + i] ^ salt[i];
    }
    iv
}

fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(salt);
    iv
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
