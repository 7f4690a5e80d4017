//! This is the implementation of aes-gcm barrier, which uses aes-gcm block cipher to encrypt or
//! decrypt data before writing or reading data to or from specific storage backend.
//!
//! Every value is stored as `term (4 bytes, big endian) | version (1 byte) | nonce (12 bytes) |
//! ciphertext | tag (16 bytes)`. Version 1 entries carry no associated data, version 2 entries
//! bind the storage path as associated data.

use std::{ops::DerefMut, sync::Arc};

use openssl::symm::{decrypt_aead, encrypt_aead, Cipher};
use rand::{thread_rng, Rng};
use thiserror::Error;
use zeroize::Zeroizing;

use super::{
    barrier::SecurityBarrier,
    keyring::{Key, Keyring, INITIAL_KEY_TERM, KEYRING_PATH},
    Backend, BackendEntry, Storage, StorageEntry,
};
use crate::errors::RvError;

const TERM_SIZE: usize = 4;
const AES_GCM_VERSION1: u8 = 0x1;
const AES_GCM_VERSION2: u8 = 0x2;
const AES_BLOCK_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const HEADER_SIZE: usize = TERM_SIZE + 1 + NONCE_SIZE;

#[derive(Error, Debug, PartialEq)]
enum EnvelopeError {
    #[error("ciphertext too short")]
    TooShort,
    #[error("no decryption key available for term {0}")]
    UnknownTerm(u32),
    #[error("version bytes mis-match: {0}")]
    VersionMismatch(u8),
    #[error("unsupported key length {0}")]
    KeyLength(usize),
    #[error("message authentication failed")]
    Authentication,
}

/// The sealed barrier. It owns nothing but the backend handle.
pub struct AESGCMBarrier {
    backend: Arc<dyn Backend>,
}

/// The barrier after a successful unseal. The keyring is fixed for the lifetime of the value and
/// zeroized when it is dropped.
pub struct UnsealedBarrier {
    backend: Arc<dyn Backend>,
    keyring: Keyring,
}

impl SecurityBarrier for AESGCMBarrier {
    type Unsealed = UnsealedBarrier;

    fn inited(&self) -> Result<bool, RvError> {
        let res = self.backend.get(KEYRING_PATH)?;
        Ok(res.is_some())
    }

    // kek stands for key encryption key, it's used to encrypt the keyring holding the actual
    // encryption key, which is generated here.
    fn init(&self, kek: &[u8]) -> Result<(), RvError> {
        let (min, max) = self.key_length_range();
        if kek.len() < min || kek.len() > max || cipher_for_key(kek).is_err() {
            return Err(RvError::ErrBarrierKeyInvalid);
        }

        if self.inited()? {
            return Err(RvError::ErrBarrierAlreadyInit);
        }

        let encrypt_key = self.generate_key()?;

        let mut keyring = Keyring::new(kek);
        keyring.add_key(Key::new(INITIAL_KEY_TERM, encrypt_key.as_slice()))?;

        self.persist_keyring(kek, &keyring)
    }

    fn generate_key(&self) -> Result<Zeroizing<Vec<u8>>, RvError> {
        let key_size = 2 * AES_BLOCK_SIZE;
        let mut buf = Zeroizing::new(vec![0u8; key_size]);

        thread_rng().fill(buf.deref_mut().as_mut_slice());
        Ok(buf)
    }

    fn key_length_range(&self) -> (usize, usize) {
        (AES_BLOCK_SIZE, 2 * AES_BLOCK_SIZE)
    }

    fn unseal(&self, key: &[u8]) -> Result<UnsealedBarrier, RvError> {
        let entry = self
            .backend
            .get(KEYRING_PATH)
            .map_err(|e| RvError::ErrBackendRead { path: KEYRING_PATH.to_string(), source: Box::new(e) })?;
        let entry = match entry {
            Some(entry) => entry,
            None => return Err(RvError::ErrBarrierNotInit),
        };

        // the keyring is always written with the initial term
        let plain = match term_of(&entry.value) {
            Ok(INITIAL_KEY_TERM) => open(KEYRING_PATH, key, &entry.value),
            Ok(term) => Err(EnvelopeError::UnknownTerm(term)),
            Err(e) => Err(e),
        };
        let plain = Zeroizing::new(plain.map_err(|e| {
            log::debug!("keyring decryption failed: {}", e);
            RvError::ErrBarrierUnsealFailed
        })?);

        let keyring = Keyring::deserialize(&plain)
            .map_err(|e| RvError::ErrBarrierIntegrity { path: KEYRING_PATH.to_string(), reason: e.to_string() })?;
        if keyring.active_key().is_none() {
            return Err(RvError::ErrBarrierIntegrity {
                path: KEYRING_PATH.to_string(),
                reason: "keyring holds no keys".into(),
            });
        }

        log::info!("barrier unsealed, key terms: {:?}", keyring.terms());

        Ok(UnsealedBarrier { backend: Arc::clone(&self.backend), keyring })
    }
}

impl AESGCMBarrier {
    pub fn new(physical: Arc<dyn Backend>) -> Self {
        Self { backend: physical }
    }

    fn persist_keyring(&self, kek: &[u8], keyring: &Keyring) -> Result<(), RvError> {
        let serialized_keyring = Zeroizing::new(keyring.serialize()?);
        let value = seal(KEYRING_PATH, INITIAL_KEY_TERM, AES_GCM_VERSION2, kek, &serialized_keyring)?;
        self.backend.put(&BackendEntry { key: KEYRING_PATH.to_string(), value })
    }
}

impl Storage for UnsealedBarrier {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RvError> {
        let mut ret = self
            .backend
            .list(prefix)
            .map_err(|e| RvError::ErrBackendRead { path: prefix.to_string(), source: Box::new(e) })?;
        ret.sort();

        Ok(ret)
    }

    fn get(&self, key: &str) -> Result<Option<StorageEntry>, RvError> {
        // Read the key from the backend
        let pe = self
            .backend
            .get(key)
            .map_err(|e| RvError::ErrBackendRead { path: key.to_string(), source: Box::new(e) })?;
        let pe = match pe {
            Some(pe) => pe,
            None => return Ok(None),
        };

        // Decrypt the ciphertext
        let plain = self
            .decrypt(key, &pe.value)
            .map_err(|e| RvError::ErrBarrierIntegrity { path: key.to_string(), reason: e.to_string() })?;

        Ok(Some(StorageEntry { key: key.to_string(), value: plain }))
    }

    fn put(&self, entry: &StorageEntry) -> Result<(), RvError> {
        let active = self.keyring.active_key().ok_or(RvError::ErrBarrierNotInit)?;
        let value = seal(&entry.key, active.term, AES_GCM_VERSION2, &active.value, &entry.value)?;

        self.backend.put(&BackendEntry { key: entry.key.clone(), value })
    }
}

impl UnsealedBarrier {
    pub fn terms(&self) -> Vec<u32> {
        self.keyring.terms()
    }

    fn decrypt(&self, path: &str, ciphertext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let term = term_of(ciphertext)?;
        let key = self.keyring.term_key(term).ok_or(EnvelopeError::UnknownTerm(term))?;
        open(path, &key.value, ciphertext)
    }
}

fn cipher_for_key(key: &[u8]) -> Result<Cipher, EnvelopeError> {
    match key.len() {
        16 => Ok(Cipher::aes_128_gcm()),
        24 => Ok(Cipher::aes_192_gcm()),
        32 => Ok(Cipher::aes_256_gcm()),
        n => Err(EnvelopeError::KeyLength(n)),
    }
}

fn term_of(ciphertext: &[u8]) -> Result<u32, EnvelopeError> {
    if ciphertext.len() < HEADER_SIZE + TAG_SIZE {
        return Err(EnvelopeError::TooShort);
    }

    let mut term = [0u8; TERM_SIZE];
    term.copy_from_slice(&ciphertext[..TERM_SIZE]);
    Ok(u32::from_be_bytes(term))
}

fn seal(path: &str, term: u32, version: u8, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, RvError> {
    let cipher = cipher_for_key(key).map_err(|_| RvError::ErrBarrierKeyInvalid)?;

    let mut nonce = [0u8; NONCE_SIZE];
    thread_rng().fill(&mut nonce);

    let aad: &[u8] = if version == AES_GCM_VERSION2 { path.as_bytes() } else { &[] };
    let mut tag = [0u8; TAG_SIZE];
    let body = encrypt_aead(cipher, key, Some(&nonce[..]), aad, plaintext, &mut tag)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len() + TAG_SIZE);
    out.extend_from_slice(&term.to_be_bytes());
    out.push(version);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&body);
    out.extend_from_slice(&tag);

    Ok(out)
}

fn open(path: &str, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    if ciphertext.len() < HEADER_SIZE + TAG_SIZE {
        return Err(EnvelopeError::TooShort);
    }

    let cipher = cipher_for_key(key)?;

    let aad: &[u8] = match ciphertext[TERM_SIZE] {
        AES_GCM_VERSION1 => &[],
        AES_GCM_VERSION2 => path.as_bytes(),
        v => return Err(EnvelopeError::VersionMismatch(v)),
    };

    let nonce = &ciphertext[TERM_SIZE + 1..HEADER_SIZE];
    let body = &ciphertext[HEADER_SIZE..ciphertext.len() - TAG_SIZE];
    let tag = &ciphertext[ciphertext.len() - TAG_SIZE..];

    decrypt_aead(cipher, key, Some(nonce), aad, body, tag).map_err(|_| EnvelopeError::Authentication)
}
