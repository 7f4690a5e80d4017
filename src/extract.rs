//! The extraction step of a migration: read an explicit list of secrets through an unsealed
//! barrier and hand back their plaintext, keyed by the path the operator asked for.
//!
//! Extraction is all-or-nothing. The first path that is missing, fails to decrypt or fails to
//! read aborts the whole run and nothing read so far is returned.

use std::collections::BTreeMap;

use crate::{
    errors::RvError,
    storage::Storage,
    utils::path::{normalize_backend_name, qualify_key_path, strip_backend_name, trim_key_path},
};

/// What to extract. Built once from the resolved configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    backend_name: String,
    paths: Vec<String>,
}

impl ExtractionRequest {
    pub fn new<S: AsRef<str>>(backend_name: &str, paths: &[S]) -> Result<Self, RvError> {
        if paths.is_empty() {
            return Err(RvError::ErrConfigInvalid("no paths specified".into()));
        }

        let normalized = normalize_backend_name(backend_name);
        if normalized.is_empty() {
            return Err(RvError::ErrConfigInvalid(format!("backend name {:?} is empty", backend_name)));
        }

        let mut trimmed = Vec::with_capacity(paths.len());
        for path in paths.iter() {
            let path = trim_key_path(path.as_ref());
            if path.is_empty() {
                return Err(RvError::ErrConfigInvalid("empty secret path specified".into()));
            }
            trimmed.push(path.to_string());
        }

        Ok(Self { backend_name: normalized, paths: trimmed })
    }

    /// Builds a request from a whitespace delimited list of paths, as given on the command line.
    pub fn from_raw(backend_name: &str, raw_paths: &str) -> Result<Self, RvError> {
        let paths: Vec<&str> = raw_paths.split_whitespace().collect();
        Self::new(backend_name, &paths)
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn qualified_keys(&self) -> Vec<String> {
        self.paths.iter().map(|p| qualify_key_path(&self.backend_name, p)).collect()
    }
}

pub struct Extractor {
    request: ExtractionRequest,
}

impl Extractor {
    pub fn new(request: ExtractionRequest) -> Self {
        Self { request }
    }

    pub fn extract(&self, storage: &dyn Storage) -> Result<BTreeMap<String, Vec<u8>>, RvError> {
        let total = self.request.paths.len();
        let mut secrets = BTreeMap::new();

        for (i, (path, key)) in self.request.paths.iter().zip(self.request.qualified_keys()).enumerate() {
            log::info!("extracting secret {}/{}: {}", i + 1, total, key);

            let entry = match storage.get(&key)? {
                Some(entry) => entry,
                None => {
                    log::error!("secret {} not found under {}", path, self.request.backend_name);
                    return Err(RvError::ErrSecretNotFound { path: path.clone() });
                }
            };

            let relative = strip_backend_name(&self.request.backend_name, &entry.key).to_string();
            log::debug!("extracted {}, {} bytes", relative, entry.value.len());
            secrets.insert(relative, entry.value);
        }

        log::info!("extracted {} secrets from {}", secrets.len(), self.request.backend_name);

        Ok(secrets)
    }
}

/// Lists the decrypted barrier under `backend_name`, `prefix` being relative to it.
pub fn list_secrets(storage: &dyn Storage, backend_name: &str, prefix: &str) -> Result<Vec<String>, RvError> {
    let backend_name = normalize_backend_name(backend_name);
    if backend_name.is_empty() {
        return Err(RvError::ErrConfigInvalid("no backend name specified".into()));
    }

    storage.list(&qualify_key_path(&backend_name, prefix))
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::{errors::ErrorKind, storage::StorageEntry};

    #[derive(Default)]
    struct MapStorage {
        entries: BTreeMap<String, Vec<u8>>,
        corrupted: Vec<String>,
        reads: Mutex<Vec<String>>,
    }

    impl MapStorage {
        fn with(entries: &[(&str, &str)]) -> Self {
            let entries = entries.iter().map(|(k, v)| (k.to_string(), v.as_bytes().to_vec())).collect();
            Self { entries, ..Default::default() }
        }

        fn reads(&self) -> Vec<String> {
            self.reads.lock().unwrap().clone()
        }
    }

    impl Storage for MapStorage {
        fn list(&self, prefix: &str) -> Result<Vec<String>, RvError> {
            Ok(self.entries.keys().filter_map(|k| k.strip_prefix(prefix)).map(|k| k.to_string()).collect())
        }

        fn get(&self, key: &str) -> Result<Option<StorageEntry>, RvError> {
            self.reads.lock().unwrap().push(key.to_string());
            if self.corrupted.iter().any(|k| k == key) {
                return Err(RvError::ErrBarrierIntegrity { path: key.to_string(), reason: "corrupted".into() });
            }
            Ok(self.entries.get(key).map(|v| StorageEntry::new(key, v)))
        }

        fn put(&self, _entry: &StorageEntry) -> Result<(), RvError> {
            Ok(())
        }
    }

    #[test]
    fn test_extraction_request_normalizes() {
        let req = ExtractionRequest::new("logical", &["app/db", "/app/db"]).unwrap();
        assert_eq!(req.backend_name(), "logical/");
        assert_eq!(req.qualified_keys(), vec!["logical/app/db", "logical/app/db"]);

        let req = ExtractionRequest::from_raw("/vault/logical/0a1b/", " app/db\t/app/api \n").unwrap();
        assert_eq!(req.backend_name(), "vault/logical/0a1b/");
        assert_eq!(req.paths(), &["app/db".to_string(), "app/api".to_string()]);
    }

    #[test]
    fn test_extraction_request_invalid() {
        let empty: [&str; 0] = [];
        let err = ExtractionRequest::new("logical", &empty).unwrap_err();
        assert_eq!(err, RvError::ErrConfigInvalid("no paths specified".into()));
        assert_eq!(err.kind(), ErrorKind::Config);

        assert_eq!(ExtractionRequest::from_raw("logical", "   ").unwrap_err().kind(), ErrorKind::Config);
        assert_eq!(ExtractionRequest::new("//", &["app/db"]).unwrap_err().kind(), ErrorKind::Config);
        assert_eq!(ExtractionRequest::new("logical", &["app/db", "/"]).unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_extract() {
        let storage = MapStorage::with(&[("logical/app/db", "{\"password\":\"s3cret\"}"), ("logical/app/api", "{}")]);
        let req = ExtractionRequest::new("/logical/", &["/app/db", "app/api"]).unwrap();

        let secrets = Extractor::new(req).extract(&storage).unwrap();
        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets["app/db"], b"{\"password\":\"s3cret\"}");
        assert_eq!(secrets["app/api"], b"{}");

        // read in request order
        assert_eq!(storage.reads(), vec!["logical/app/db", "logical/app/api"]);
    }

    #[test]
    fn test_extract_not_found_is_all_or_nothing() {
        let storage = MapStorage::with(&[("logical/a", "1"), ("logical/b", "2"), ("logical/c", "3")]);
        let req = ExtractionRequest::new("logical", &["a", "b", "c", "app/missing", "d"]).unwrap();

        let err = Extractor::new(req).extract(&storage).unwrap_err();
        assert_eq!(err, RvError::ErrSecretNotFound { path: "app/missing".into() });
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // nothing after the miss is read
        assert_eq!(storage.reads().len(), 4);
    }

    #[test]
    fn test_extract_integrity_error() {
        let mut storage = MapStorage::with(&[("logical/a", "1"), ("logical/b", "2")]);
        storage.corrupted.push("logical/a".into());
        let req = ExtractionRequest::new("logical", &["a", "b"]).unwrap();

        let err = Extractor::new(req).extract(&storage).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_ne!(err.kind(), ErrorKind::NotFound);
        assert_eq!(storage.reads(), vec!["logical/a"]);
    }

    #[test]
    fn test_list_secrets() {
        let storage = MapStorage::with(&[("logical/app/db", "1"), ("logical/app/api", "2"), ("other/x", "3")]);

        assert_eq!(list_secrets(&storage, "/logical", "app/").unwrap(), vec!["api", "db"]);
        assert_eq!(list_secrets(&storage, "logical/", "").unwrap().len(), 2);
        assert_eq!(list_secrets(&storage, "/", "").unwrap_err().kind(), ErrorKind::Config);
    }
}
