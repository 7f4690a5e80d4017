//! The keyring is the bootstrap entry of the barrier. It is encrypted with the master key and
//! holds one data encryption key per term; entries name the term they were encrypted with.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    errors::RvError,
    utils::{deserialize_base64, serialize_base64},
};

pub const KEYRING_PATH: &str = "core/keyring";
pub const INITIAL_KEY_TERM: u32 = 1;

#[derive(Clone, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct Key {
    #[serde(rename = "Term")]
    pub term: u32,
    #[serde(rename = "Version", default)]
    pub version: i32,
    #[serde(rename = "Value", serialize_with = "serialize_base64", deserialize_with = "deserialize_base64")]
    pub value: Vec<u8>,
    #[serde(rename = "InstallTime", default)]
    pub install_time: String,
}

#[derive(Clone, Default, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct Keyring {
    #[serde(rename = "MasterKey", serialize_with = "serialize_base64", deserialize_with = "deserialize_base64")]
    master_key: Vec<u8>,
    #[serde(rename = "Keys", default)]
    keys: Vec<Key>,
}

impl Key {
    pub fn new(term: u32, value: &[u8]) -> Self {
        Self {
            term,
            version: 1,
            value: value.to_vec(),
            install_time: humantime::format_rfc3339(std::time::SystemTime::now()).to_string(),
        }
    }
}

impl Keyring {
    pub fn new(master_key: &[u8]) -> Self {
        Self { master_key: master_key.to_vec(), keys: Vec::new() }
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, RvError> {
        let keyring: Keyring = serde_json::from_slice(buf)?;
        Ok(keyring)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, RvError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn add_key(&mut self, key: Key) -> Result<(), RvError> {
        if self.term_key(key.term).is_some() {
            return Err(RvError::ErrConfigInvalid(format!("key term {} already in use", key.term)));
        }
        self.keys.push(key);
        Ok(())
    }

    pub fn term_key(&self, term: u32) -> Option<&Key> {
        self.keys.iter().find(|k| k.term == term)
    }

    /// The key new entries are encrypted with: the one with the highest term.
    pub fn active_key(&self) -> Option<&Key> {
        self.keys.iter().max_by_key(|k| k.term)
    }

    pub fn terms(&self) -> Vec<u32> {
        let mut terms: Vec<u32> = self.keys.iter().map(|k| k.term).collect();
        terms.sort_unstable();
        terms
    }

    pub fn master_key(&self) -> &[u8] {
        &self.master_key
    }
}
