//! This crate is the 'library' part of `rvault-migrate`, a tool that moves secrets out of the
//! encrypted storage of a sealed Vault and into a running Vault.
//!
//! A migration works directly on the physical storage of the origin Vault, without the origin
//! server running:
//!
//! 1. the master key is reconstructed from a quorum of its Shamir key shares ([`shamir`]);
//! 2. the AES-GCM barrier layered over the physical backend is unsealed with it ([`storage`]);
//! 3. an explicit list of secrets is read and decrypted through the barrier ([`extract`]);
//! 4. the secrets are written into the destination Vault through its HTTP API ([`sink`]).
//!
//! Steps 1 to 3 are all-or-nothing: any missing share, wrong key, missing path or corrupted entry
//! stops the run before anything reaches the destination.
//!
//! ```no_run
//! use std::{collections::HashMap, sync::Arc};
//!
//! use rusty_vault_migrate::{extract::ExtractionRequest, shamir::ShareSet, storage};
//!
//! let mut conf = HashMap::new();
//! conf.insert("path".to_string(), serde_json::Value::from("/var/lib/vault"));
//! let backend = storage::new_backend("file", &conf)?;
//!
//! let shares = ShareSet::decode("k1 k2 k3")?;
//! let request = ExtractionRequest::from_raw("logical/0a1b", "app/db app/api")?;
//! let secrets = rusty_vault_migrate::unseal_and_extract(backend, &shares, request)?;
//! # Ok::<(), rusty_vault_migrate::errors::RvError>(())
//! ```

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    errors::RvError,
    extract::{ExtractionRequest, Extractor},
    shamir::ShareSet,
    storage::{
        barrier::SecurityBarrier,
        barrier_aes_gcm::{AESGCMBarrier, UnsealedBarrier},
        Backend,
    },
};

pub mod api;
pub mod cli;
pub mod errors;
pub mod extract;
pub mod shamir;
pub mod sink;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

/// Exit ok
pub const EXIT_CODE_OK: sysexits::ExitCode = sysexits::ExitCode::Ok;
/// Exit code when insufficient params are passed via CLI
pub const EXIT_CODE_INSUFFICIENT_PARAMS: sysexits::ExitCode = sysexits::ExitCode::Usage;

/// Build timestamp in UTC
pub const BUILD_TIME: &str = build_time::build_time_utc!();

/// rusty_vault_migrate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reconstructs the master key from `shares` and unseals the barrier over `backend` with it. The
/// key only lives for the duration of the call.
pub fn unseal_origin(backend: Arc<dyn Backend>, shares: &ShareSet) -> Result<UnsealedBarrier, RvError> {
    let master_key = shares.combine()?;
    log::debug!("master key reconstructed from {} shares, {} bytes", shares.len(), master_key.len());

    let barrier = AESGCMBarrier::new(backend);
    let unsealed = barrier.unseal(&master_key)?;
    log::debug!("origin keyring holds {} terms", unsealed.terms().len());

    Ok(unsealed)
}

pub fn unseal_and_extract(
    backend: Arc<dyn Backend>,
    shares: &ShareSet,
    request: ExtractionRequest,
) -> Result<BTreeMap<String, Vec<u8>>, RvError> {
    let unsealed = unseal_origin(backend, shares)?;
    Extractor::new(request).extract(&unsealed)
}
