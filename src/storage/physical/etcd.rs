//! The etcd v3 backend. Entries live under a path prefix (`/vault/` unless configured), one etcd
//! key per entry holding the raw stored bytes.

use std::{collections::HashMap, env, fs, sync::Mutex, time::Duration};

use etcd_client::{Certificate, Client, ConnectOptions, GetOptions, Identity, TlsOptions};
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use super::{Backend, BackendEntry};
use crate::errors::RvError;

pub const ETCD_BACKEND_PATH: &str = "/vault/";
pub const ETCD_DEFAULT_ADDRESS: &str = "http://127.0.0.1:2379";
const ETCD_DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct EtcdBackend {
    path: String,
    endpoints: Vec<String>,
    options: ConnectOptions,
    runtime: Runtime,
    client: Mutex<Option<Client>>,
}

impl Backend for EtcdBackend {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RvError> {
        let dir = self.dir_path(prefix);
        let mut client = self.client()?;
        let resp =
            self.runtime.block_on(client.get(dir.as_str(), Some(GetOptions::new().with_prefix().with_keys_only())))?;

        let keys: Vec<String> = resp.kvs().iter().map(|kv| String::from_utf8_lossy(kv.key()).into_owned()).collect();
        Ok(child_names(&dir, keys.iter().map(String::as_str)))
    }

    fn get(&self, key: &str) -> Result<Option<BackendEntry>, RvError> {
        let mut client = self.client()?;
        let resp = self.runtime.block_on(client.get(self.key_path(key), None))?;

        Ok(resp.kvs().first().map(|kv| BackendEntry { key: key.to_string(), value: kv.value().to_vec() }))
    }

    fn put(&self, entry: &BackendEntry) -> Result<(), RvError> {
        let mut client = self.client()?;
        self.runtime.block_on(client.put(self.key_path(&entry.key), entry.value.clone(), None))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), RvError> {
        let mut client = self.client()?;
        self.runtime.block_on(client.delete(self.key_path(key), None))?;
        Ok(())
    }
}

impl EtcdBackend {
    /// Builds the backend from its storage config. `ETCD_ADDR`, `ETCD_USERNAME` and
    /// `ETCD_PASSWORD` override the matching config items. No connection is made until the first
    /// request.
    pub fn new(conf: &HashMap<String, Value>) -> Result<Self, RvError> {
        if let Some(api) = conf_str(conf, "etcd_api")? {
            if api != "3" && api != "v3" {
                return Err(RvError::ErrConfigInvalid(format!("etcd_api {} is not supported, only v3 is", api)));
            }
        }

        let mut path = conf_str(conf, "path")?.unwrap_or(ETCD_BACKEND_PATH).to_string();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        let address = match env::var("ETCD_ADDR") {
            Ok(address) => address,
            Err(_) => conf_str(conf, "address")?.unwrap_or(ETCD_DEFAULT_ADDRESS).to_string(),
        };
        let endpoints: Vec<String> =
            address.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        if endpoints.is_empty() {
            return Err(RvError::ErrConfigInvalid("etcd address is empty".into()));
        }

        let timeout = match conf.get("request_timeout") {
            None => ETCD_DEFAULT_TIMEOUT,
            Some(Value::Number(n)) => n.as_u64().map(Duration::from_secs).ok_or_else(|| {
                RvError::ErrConfigInvalid(format!("etcd request_timeout {} is not a number of seconds", n))
            })?,
            Some(Value::String(s)) => humantime::parse_duration(s)
                .map_err(|e| RvError::ErrConfigInvalid(format!("etcd request_timeout {}: {}", s, e)))?,
            Some(_) => return Err(RvError::ErrConfigInvalid("etcd request_timeout must be a duration".into())),
        };
        let mut options = ConnectOptions::new().with_timeout(timeout).with_connect_timeout(timeout);

        let username = match env::var("ETCD_USERNAME") {
            Ok(username) => Some(username),
            Err(_) => conf_str(conf, "username")?.map(String::from),
        };
        let password = match env::var("ETCD_PASSWORD") {
            Ok(password) => Some(password),
            Err(_) => conf_str(conf, "password")?.map(String::from),
        };
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            options = options.with_user(username, password.unwrap_or_default());
        }

        let ca_file = conf_str(conf, "tls_ca_file")?;
        let identity = match (conf_str(conf, "tls_cert_file")?, conf_str(conf, "tls_key_file")?) {
            (Some(cert), Some(key)) => Some(Identity::from_pem(fs::read(cert)?, fs::read(key)?)),
            (None, None) => None,
            _ => {
                return Err(RvError::ErrConfigInvalid("etcd tls_cert_file and tls_key_file go together".into()));
            }
        };
        if ca_file.is_some() || identity.is_some() {
            let mut tls = TlsOptions::new();
            if let Some(ca_file) = ca_file {
                tls = tls.ca_certificate(Certificate::from_pem(fs::read(ca_file)?));
            }
            if let Some(identity) = identity {
                tls = tls.identity(identity);
            }
            options = options.with_tls(tls);
        }

        let runtime = Builder::new_current_thread().enable_all().build()?;

        log::debug!("etcd backend endpoints: {:?}, path: {}", endpoints, path);

        Ok(EtcdBackend { path, endpoints, options, runtime, client: Mutex::new(None) })
    }

    fn client(&self) -> Result<Client, RvError> {
        let mut cached = self.client.lock().map_err(|_| RvError::ErrRwLockPoison)?;
        if let Some(client) = cached.as_ref() {
            return Ok(client.clone());
        }

        log::info!("connecting to etcd at {}", self.endpoints.join(","));
        let client = self.runtime.block_on(Client::connect(self.endpoints.clone(), Some(self.options.clone())))?;
        *cached = Some(client.clone());
        Ok(client)
    }

    fn key_path(&self, key: &str) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), key.trim_start_matches('/'))
    }

    fn dir_path(&self, prefix: &str) -> String {
        format!("{}/", self.key_path(prefix).trim_end_matches('/'))
    }
}

fn conf_str<'a>(conf: &'a HashMap<String, Value>, name: &str) -> Result<Option<&'a str>, RvError> {
    match conf.get(name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(RvError::ErrConfigInvalid(format!("etcd {} must be a string", name))),
    }
}

/// The direct children of `dir` among `keys`, deeper keys folded into their `name/` directory.
fn child_names<'a>(dir: &str, keys: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for key in keys {
        let rest = match key.strip_prefix(dir) {
            Some(rest) if !rest.is_empty() => rest,
            _ => continue,
        };

        let name = match rest.find('/') {
            Some(i) => &rest[..=i],
            None => rest,
        };
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
