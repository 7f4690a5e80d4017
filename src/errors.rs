use std::io;

use thiserror::Error;

/// Coarse classification of an [`RvError`], used to pick the process exit code and to let
/// callers tell a naming mistake apart from corrupted data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Config,
    Unseal,
    NotFound,
    Integrity,
    Io,
    Sink,
}

#[derive(Error, Debug)]
pub enum RvError {
    #[error("Failed to decode key share #{index}: {source}")]
    ErrShareDecode {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error("Key share #{index} is invalid: {reason}")]
    ErrShareInvalid { index: usize, reason: String },
    #[error("Shamir share count invalid.")]
    ErrShamirShareCountInvalid,
    #[error("Configuration is invalid: {0}")]
    ErrConfigInvalid(String),
    #[error("Config path is invalid.")]
    ErrConfigPathInvalid,
    #[error("Config load failed.")]
    ErrConfigLoadFailed,
    #[error("Config storage not found.")]
    ErrConfigStorageNotFound,
    #[error("Physical configuration item is missing.")]
    ErrPhysicalConfigItemMissing,
    #[error("Physical type is invalid.")]
    ErrPhysicalTypeInvalid,
    #[error("Physical backend prefix is invalid.")]
    ErrPhysicalBackendPrefixInvalid,
    #[error("Physical backend key is invalid.")]
    ErrPhysicalBackendKeyInvalid,
    #[error("Barrier has been initialized.")]
    ErrBarrierAlreadyInit,
    #[error("Barrier key is invalid.")]
    ErrBarrierKeyInvalid,
    #[error("Barrier is not initialized.")]
    ErrBarrierNotInit,
    #[error("Barrier unseal failed, the master key is incorrect.")]
    ErrBarrierUnsealFailed,
    #[error("Failed to decrypt entry at {path}: {reason}")]
    ErrBarrierIntegrity { path: String, reason: String },
    #[error("Failed to read {path} from the physical backend: {source}")]
    ErrBackendRead {
        path: String,
        #[source]
        source: Box<RvError>,
    },
    #[error("No entry found for key {path}")]
    ErrSecretNotFound { path: String },
    #[error("Secret at {path} is not a JSON object: {source}")]
    ErrSinkDecode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Writing secret {path} failed with status {status}")]
    ErrSinkWriteFailed { path: String, status: u16 },
    #[error("Some IO error happened, {:?}", .source)]
    IO {
        #[from]
        source: io::Error,
    },
    #[error("Some serde error happened, {:?}", .source)]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("Some hcl error happened, {:?}", .source)]
    Hcl {
        #[from]
        source: hcl::Error,
    },
    #[error("Some openssl error happened, {:?}", .source)]
    OpenSSL {
        #[from]
        source: openssl::error::ErrorStack,
    },
    #[error("Some ureq error happened, {:?}", .source)]
    UreqError {
        #[from]
        source: Box<ureq::Error>,
    },
    #[error("Some etcd error happened, {:?}", .source)]
    Etcd {
        #[from]
        source: etcd_client::Error,
    },
    #[error("RwLock was poisoned")]
    ErrRwLockPoison,
}

impl RvError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RvError::ErrShareDecode { .. } | RvError::ErrShareInvalid { .. } => ErrorKind::Decode,
            RvError::ErrShamirShareCountInvalid
            | RvError::ErrConfigInvalid(_)
            | RvError::ErrConfigPathInvalid
            | RvError::ErrConfigLoadFailed
            | RvError::ErrConfigStorageNotFound
            | RvError::ErrPhysicalConfigItemMissing
            | RvError::ErrPhysicalTypeInvalid
            | RvError::ErrBarrierAlreadyInit
            | RvError::ErrBarrierKeyInvalid
            | RvError::Hcl { .. } => ErrorKind::Config,
            RvError::ErrBarrierNotInit | RvError::ErrBarrierUnsealFailed => ErrorKind::Unseal,
            RvError::ErrSecretNotFound { .. } => ErrorKind::NotFound,
            RvError::ErrBarrierIntegrity { .. } => ErrorKind::Integrity,
            RvError::ErrSinkDecode { .. } | RvError::ErrSinkWriteFailed { .. } | RvError::UreqError { .. } => {
                ErrorKind::Sink
            }
            RvError::ErrBackendRead { .. }
            | RvError::ErrPhysicalBackendPrefixInvalid
            | RvError::ErrPhysicalBackendKeyInvalid
            | RvError::IO { .. }
            | RvError::Serde { .. }
            | RvError::OpenSSL { .. }
            | RvError::Etcd { .. }
            | RvError::ErrRwLockPoison => ErrorKind::Io,
        }
    }
}

impl PartialEq for RvError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RvError::ErrShareDecode { index: a, .. }, RvError::ErrShareDecode { index: b, .. }) => a == b,
            (RvError::ErrShareInvalid { index: a, .. }, RvError::ErrShareInvalid { index: b, .. }) => a == b,
            (RvError::ErrConfigInvalid(a), RvError::ErrConfigInvalid(b)) => a == b,
            (RvError::ErrBarrierIntegrity { path: a, .. }, RvError::ErrBarrierIntegrity { path: b, .. }) => a == b,
            (RvError::ErrBackendRead { path: a, .. }, RvError::ErrBackendRead { path: b, .. }) => a == b,
            (RvError::ErrSecretNotFound { path: a }, RvError::ErrSecretNotFound { path: b }) => a == b,
            (RvError::ErrSinkDecode { path: a, .. }, RvError::ErrSinkDecode { path: b, .. }) => a == b,
            (
                RvError::ErrSinkWriteFailed { path: a, status: s1 },
                RvError::ErrSinkWriteFailed { path: b, status: s2 },
            ) => a == b && s1 == s2,
            (RvError::ErrShamirShareCountInvalid, RvError::ErrShamirShareCountInvalid)
            | (RvError::ErrConfigPathInvalid, RvError::ErrConfigPathInvalid)
            | (RvError::ErrConfigLoadFailed, RvError::ErrConfigLoadFailed)
            | (RvError::ErrConfigStorageNotFound, RvError::ErrConfigStorageNotFound)
            | (RvError::ErrPhysicalConfigItemMissing, RvError::ErrPhysicalConfigItemMissing)
            | (RvError::ErrPhysicalTypeInvalid, RvError::ErrPhysicalTypeInvalid)
            | (RvError::ErrPhysicalBackendPrefixInvalid, RvError::ErrPhysicalBackendPrefixInvalid)
            | (RvError::ErrPhysicalBackendKeyInvalid, RvError::ErrPhysicalBackendKeyInvalid)
            | (RvError::ErrBarrierAlreadyInit, RvError::ErrBarrierAlreadyInit)
            | (RvError::ErrBarrierKeyInvalid, RvError::ErrBarrierKeyInvalid)
            | (RvError::ErrBarrierNotInit, RvError::ErrBarrierNotInit)
            | (RvError::ErrBarrierUnsealFailed, RvError::ErrBarrierUnsealFailed)
            | (RvError::ErrRwLockPoison, RvError::ErrRwLockPoison) => true,
            _ => false,
        }
    }
}

impl From<ureq::Error> for RvError {
    fn from(err: ureq::Error) -> Self {
        RvError::UreqError { source: Box::new(err) }
    }
}
