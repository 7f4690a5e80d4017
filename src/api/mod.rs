//! The `rusty_vault_migrate::api` module holds a small client for the HTTP API of the
//! destination Vault server.

use serde_json::Value;

pub mod client;
pub mod logical;

pub use client::Client;

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub method: String,
    pub url: String,
    pub response_status: u16,
    pub response_data: Option<Value>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.response_status)
    }

    /// The `errors` list Vault puts in the body of a failed request, joined into one line.
    pub fn error_message(&self) -> Option<String> {
        let errors = self.response_data.as_ref()?.get("errors")?.as_array()?;
        let msgs: Vec<&str> = errors.iter().filter_map(|e| e.as_str()).collect();
        if msgs.is_empty() {
            return None;
        }
        Some(msgs.join(", "))
    }
}
