//! Storage layers: the raw [`physical`] backends, and the encryption barrier that turns
//! ciphertext stored there into plaintext [`StorageEntry`] values.

use serde::{Deserialize, Serialize};

use crate::errors::RvError;

pub mod barrier;
pub mod barrier_aes_gcm;
pub mod keyring;
pub mod physical;

pub use physical::{new_backend, Backend, BackendEntry};

/// Plaintext access to storage. Only an unsealed barrier implements it.
pub trait Storage: Send + Sync {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RvError>;
    fn get(&self, key: &str) -> Result<Option<StorageEntry>, RvError>;
    fn put(&self, entry: &StorageEntry) -> Result<(), RvError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageEntry {
    pub key: String,
    pub value: Vec<u8>,
}

impl StorageEntry {
    pub fn new(key: &str, value: &[u8]) -> Self {
        Self { key: key.to_string(), value: value.to_vec() }
    }
}
