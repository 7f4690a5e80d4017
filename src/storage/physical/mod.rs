//! The `rusty_vault_migrate::storage::physical` module holds the raw key/value backends the
//! barrier is layered on. Values stored here are ciphertext; the backends never see plaintext.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::RvError,
    utils::{deserialize_base64, serialize_base64},
};

pub mod etcd;
pub mod file;
pub mod inmem;

pub trait Backend: Send + Sync {
    //! This trait decsribes the general methods that a storage backend needs to implement.
    //! Only `get` is needed to extract secrets; the others exist so fixtures can be written.
    fn list(&self, prefix: &str) -> Result<Vec<String>, RvError>;
    fn get(&self, key: &str) -> Result<Option<BackendEntry>, RvError>;
    fn put(&self, entry: &BackendEntry) -> Result<(), RvError>;
    fn delete(&self, key: &str) -> Result<(), RvError>;
}

/// A physical entry. Its JSON form is the origin's file entry, which only carries the value; the
/// key is the file's location and is filled in by the backend on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEntry {
    #[serde(rename = "Key", default, skip_serializing)]
    pub key: String,
    #[serde(rename = "Value", serialize_with = "serialize_base64", deserialize_with = "deserialize_base64")]
    pub value: Vec<u8>,
}

pub fn new_backend(t: &str, conf: &HashMap<String, Value>) -> Result<Arc<dyn Backend>, RvError> {
    match t {
        "file" => {
            let backend = file::FileBackend::new(conf)?;
            Ok(Arc::new(backend))
        }
        "etcd" => {
            let backend = etcd::EtcdBackend::new(conf)?;
            Ok(Arc::new(backend))
        }
        "inmem" => Ok(Arc::new(inmem::InmemBackend::new())),
        _ => Err(RvError::ErrPhysicalTypeInvalid),
    }
}
