//! This module provides the commands of the migrator. `migrate` moves secrets into a destination
//! Vault and `extract` is its dry run, reporting what would be moved.

use std::path::PathBuf;

use clap::{Args, ValueEnum, ValueHint};
use sysexits::ExitCode;

use crate::{
    cli::config::{self, Config},
    errors::{ErrorKind, RvError},
    extract::ExtractionRequest,
    shamir::ShareSet,
    storage::{self, barrier_aes_gcm::UnsealedBarrier},
    EXIT_CODE_OK,
};

pub mod extract;
pub mod migrate;

pub const LOG_LEVEL_DEFAULT: &str = "info";

pub trait CommandExecutor {
    fn main(&self) -> Result<(), RvError>;

    #[inline]
    fn execute(&mut self) -> ExitCode {
        match self.main() {
            Ok(_) => EXIT_CODE_OK,
            Err(e) => {
                eprintln!("Error: {}", e);
                exit_code(&e)
            }
        }
    }
}

/// Maps a failure onto the exit code an operator script can branch on.
pub fn exit_code(err: &RvError) -> ExitCode {
    match err.kind() {
        ErrorKind::Decode | ErrorKind::Integrity => ExitCode::DataErr,
        ErrorKind::Config => ExitCode::Config,
        ErrorKind::Unseal => ExitCode::NoPerm,
        ErrorKind::NotFound => ExitCode::NoInput,
        ErrorKind::Io => ExitCode::IoErr,
        ErrorKind::Sink => ExitCode::Unavailable,
    }
}

/// Installs the global logger. `RUST_LOG`, when set, takes precedence over `level`.
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).format_timestamp_millis().try_init();
}

#[derive(Args, Default)]
#[group(required = false, multiple = true)]
pub struct OriginOptions {
    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        value_hint = ValueHint::AnyPath,
        env = "RVAULT_MIGRATE_CONFIG",
        long_help = r#"Path to a configuration file or directory of configuration files describing
the physical storage of the origin Vault. If the path is a directory, all files
which end in .hcl or .json are loaded and merged."#
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        default_value = "",
        env = "ORIGIN_VAULT_KEYS_PATHS",
        long_help = r#"Space-delimited paths of the secrets to migrate, relative to the origin
backend name, e.g. 'app/db app/api'."#
    )]
    origin_vault_keys_paths: String,

    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        default_value = "",
        env = "ORIGIN_VAULT_BACKEND_NAME",
        long_help = r#"Name of the backend in the origin Vault in which the data to migrate is
stored, relative to the storage path, e.g. logical/<uuid>. The etcd key
/vault/logical/<uuid>/app/db is logical/<uuid>/app/db under the default
etcd path /vault/."#
    )]
    origin_vault_backend_name: String,

    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        default_value = "",
        env = "ORIGIN_VAULT_MASTER_KEY_SHARES",
        hide_env_values = true,
        long_help = r#"Space-delimited base64 shares, at least the minimum number of shares necessary
to reconstruct the Vault master key, e.g. 'k1 k2 k3'. Prefer the
ORIGIN_VAULT_MASTER_KEY_SHARES environment variable over the flag."#
    )]
    origin_vault_master_key_shares: String,

    #[arg(
        long,
        next_line_help = true,
        value_name = "level",
        env = "VAULT_LOG_LEVEL",
        long_help = r#"Log verbosity level. Overrides log_level from the configuration file. The
default is info. This can also be specified via the VAULT_LOG_LEVEL
environment variable."#,
        value_enum
    )]
    log_level: Option<LogLevel>,
}

#[derive(Args, Default)]
#[group(required = false, multiple = true)]
pub struct DestinationOptions {
    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        default_value = "",
        env = "VAULT_ADDR",
        long_help = "The address of the Vault to migrate data to, e.g. https://127.0.0.1:8200"
    )]
    destination_vault_address: String,

    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        default_value = "",
        long_help = r#"Name of the backend in the destination Vault in which to place migrated data,
e.g. secret/"#
    )]
    destination_vault_backend_name: String,

    #[arg(
        long,
        next_line_help = true,
        value_name = "string",
        default_value = "",
        env = "VAULT_TOKEN",
        hide_env_values = true,
        long_help = "A token with write permission on the destination backend"
    )]
    destination_vault_token: String,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl OriginOptions {
    pub fn load_config(&self) -> Result<Config, RvError> {
        match &self.config {
            Some(path) => config::load_config(&path.to_string_lossy()),
            None => Err(RvError::ErrConfigInvalid("no origin storage configured, use --config".into())),
        }
    }

    /// The flag wins over the configuration file.
    pub fn log_level(&self, config: &Config) -> String {
        if let Some(level) = self.log_level {
            return level.as_str().to_string();
        }

        if !config.log_level.is_empty() {
            return config.log_level.clone();
        }

        LOG_LEVEL_DEFAULT.to_string()
    }

    pub fn request(&self) -> Result<ExtractionRequest, RvError> {
        ExtractionRequest::from_raw(&self.origin_vault_backend_name, &self.origin_vault_keys_paths)
    }

    pub fn backend_name(&self) -> &str {
        &self.origin_vault_backend_name
    }

    /// Opens the configured physical storage and unseals it with the supplied shares.
    pub fn unseal(&self, config: &Config) -> Result<UnsealedBarrier, RvError> {
        let storage = config.origin_storage()?;
        log::info!("opening origin storage, type: {}", storage.stype);
        let backend = storage::new_backend(&storage.stype, &storage.config)?;

        let shares = ShareSet::decode(&self.origin_vault_master_key_shares)?;
        crate::unseal_origin(backend, &shares)
    }
}

impl DestinationOptions {
    pub fn sink(&self) -> Result<crate::sink::VaultSink, RvError> {
        crate::sink::VaultSink::new(
            &self.destination_vault_address,
            &self.destination_vault_backend_name,
            &self.destination_vault_token,
        )
    }
}
