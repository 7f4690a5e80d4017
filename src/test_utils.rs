use std::{
    collections::{HashMap, VecDeque},
    env, fs,
    sync::{mpsc, Arc, Mutex},
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use actix_web::{dev::ServerHandle, http::StatusCode, web, App, HttpRequest, HttpResponse, HttpServer};
use base64::{engine::general_purpose::STANDARD, Engine};
use lazy_static::lazy_static;
use serde_json::{json, Value};

use crate::{
    shamir::ShamirSecret,
    storage::{
        self,
        barrier::SecurityBarrier,
        barrier_aes_gcm::AESGCMBarrier,
        Backend, Storage, StorageEntry,
    },
};

lazy_static! {
    pub static ref TEST_DIR: &'static str = "rusty_vault_migrate_test";
}

mod tests {
    use super::*;

    #[ctor::ctor]
    fn init() {
        let dir = env::temp_dir().join(*TEST_DIR);
        let _ = fs::remove_dir_all(&dir);
        println!("create rusty_vault_migrate_test dir: {}", dir.to_string_lossy().into_owned());
        assert!(fs::create_dir(&dir).is_ok());
    }

    #[ctor::dtor]
    fn cleanup() {
        let dir = env::temp_dir().join(*TEST_DIR);
        let _ = fs::remove_dir_all(&dir);
    }
}

/// Creates a fresh directory for a file backend under the test dir.
pub fn test_backend_dir(name: &str) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let test_dir = env::temp_dir().join(format!("{}/{}-{}", *TEST_DIR, name, now).as_str());
    assert!(fs::create_dir(&test_dir).is_ok());

    test_dir.to_string_lossy().into_owned()
}

pub fn test_file_backend(dir: &str) -> Arc<dyn Backend> {
    println!("test backend init, dir: {}", dir);

    let mut conf: HashMap<String, Value> = HashMap::new();
    conf.insert("path".to_string(), Value::String(dir.to_string()));

    let backend = storage::new_backend("file", &conf);
    assert!(backend.is_ok());

    backend.unwrap()
}

/// Writes an HCL config next to `backend_dir` pointing at it and returns its path.
pub fn test_write_config(backend_dir: &str) -> String {
    let path = format!("{}.hcl", backend_dir);
    let config = format!("storage \"file\" {{\n  path = \"{}\"\n}}\n\nlog_level = \"debug\"\n", backend_dir);
    assert!(fs::write(&path, config).is_ok());
    path
}

/// Initializes a barrier on `backend`, writes `entries` through it and returns the base64
/// shares of a 3-of-5 split of the master key.
pub fn test_seed_barrier(backend: Arc<dyn Backend>, entries: &[(&str, &str)]) -> Vec<String> {
    let barrier = AESGCMBarrier::new(backend);
    let master_key = barrier.generate_key().unwrap();
    assert!(barrier.init(&master_key).is_ok());

    let unsealed = barrier.unseal(&master_key).unwrap();
    for (key, value) in entries.iter() {
        assert!(unsealed.put(&StorageEntry::new(key, value.as_bytes())).is_ok());
    }

    let shares = ShamirSecret::split(&master_key, 5, 3).unwrap();
    shares.iter().map(|s| STANDARD.encode(s)).collect()
}

#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }
}

struct MockVaultState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    statuses: Mutex<VecDeque<u16>>,
}

async fn mock_vault_handler(req: HttpRequest, body: web::Bytes, state: web::Data<MockVaultState>) -> HttpResponse {
    let headers = req
        .headers()
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: req.method().to_string(),
        path: req.path().to_string(),
        headers,
        body: body.to_vec(),
    });

    let status = state.statuses.lock().unwrap().pop_front().unwrap_or(500);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::NO_CONTENT {
        HttpResponse::build(status).finish()
    } else if status.is_success() {
        HttpResponse::build(status).json(json!({}))
    } else {
        HttpResponse::build(status).json(json!({ "errors": ["permission denied"] }))
    }
}

/// An actix-web server standing in for a destination Vault. It records every request and answers
/// the n-th one with the n-th status, 500 once the statuses run out. Stopped on drop.
pub struct MockVaultServer {
    address: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: ServerHandle,
}

impl MockVaultServer {
    pub fn start(statuses: Vec<u16>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state =
            web::Data::new(MockVaultState { requests: Arc::clone(&requests), statuses: Mutex::new(statuses.into()) });

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let server = actix_rt::System::new();
            let ret = server.block_on(async move {
                let http_server = HttpServer::new(move || {
                    App::new().app_data(state.clone()).default_service(web::to(mock_vault_handler))
                })
                .workers(1)
                .bind(("127.0.0.1", 0))?;

                let addr = http_server.addrs()[0];
                let running = http_server.run();
                let _ = tx.send((addr, running.handle()));
                running.await
            });
            if let Err(e) = ret {
                println!("mock vault server error: {}", e);
            }
        });

        // a server that failed to bind drops the sender, failing the test here
        let (addr, handle) = rx.recv_timeout(Duration::from_secs(10)).expect("mock vault server did not start");

        Self { address: format!("http://{}", addr), requests, handle }
    }

    pub fn address(&self) -> String {
        self.address.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockVaultServer {
    fn drop(&mut self) {
        let _ = self.handle.stop(false);
    }
}
