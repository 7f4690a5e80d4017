//! Where extracted secrets go. A migration decodes every secret as a JSON object and writes it
//! through a [`SecretSink`], in path order.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
    api::Client,
    errors::RvError,
    utils::path::{normalize_backend_name, qualify_key_path},
};

pub trait SecretSink {
    fn write(&self, path: &str, data: Map<String, Value>) -> Result<(), RvError>;
}

/// Writes secrets into a running Vault through its logical HTTP API.
pub struct VaultSink {
    client: Client,
    backend_name: String,
}

impl VaultSink {
    pub fn new(address: &str, backend_name: &str, token: &str) -> Result<Self, RvError> {
        if address.is_empty() {
            return Err(RvError::ErrConfigInvalid("no destination Vault address set".into()));
        }
        if token.is_empty() {
            return Err(RvError::ErrConfigInvalid("no destination Vault token set".into()));
        }

        let backend_name = normalize_backend_name(backend_name);
        if backend_name.is_empty() {
            return Err(RvError::ErrConfigInvalid("no destination Vault backend name set".into()));
        }

        let client = Client::new().with_addr(address).with_token(token).build();

        Ok(Self { client, backend_name })
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }
}

impl SecretSink for VaultSink {
    fn write(&self, path: &str, data: Map<String, Value>) -> Result<(), RvError> {
        let key = qualify_key_path(&self.backend_name, path);
        let resp = self.client.logical().write(&key, Some(data))?;
        if !resp.is_success() {
            log::error!(
                "write {} failed with status {}: {}",
                key,
                resp.response_status,
                resp.error_message().unwrap_or_default()
            );
            return Err(RvError::ErrSinkWriteFailed { path: path.to_string(), status: resp.response_status });
        }

        Ok(())
    }
}

/// Decodes every secret before anything is written, so a malformed value aborts the migration
/// without touching the destination.
pub fn decode_secrets(secrets: &BTreeMap<String, Vec<u8>>) -> Result<Vec<(&str, Map<String, Value>)>, RvError> {
    secrets
        .iter()
        .map(|(path, value)| {
            let data: Map<String, Value> = serde_json::from_slice(value)
                .map_err(|e| RvError::ErrSinkDecode { path: path.clone(), source: e })?;
            Ok((path.as_str(), data))
        })
        .collect()
}

pub fn migrate(secrets: &BTreeMap<String, Vec<u8>>, sink: &dyn SecretSink) -> Result<usize, RvError> {
    let decoded = decode_secrets(secrets)?;

    for (path, data) in decoded {
        sink.write(path, data)?;
        log::info!("wrote key {}", path);
    }

    Ok(secrets.len())
}
