use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::RwLock,
};

use serde_json::Value;

use super::{Backend, BackendEntry};
use crate::errors::RvError;

/// Reads and writes the on-disk layout of the origin's file storage: the key `a/b/c` is the file
/// `<path>/a/b/_c` holding `{"Value": "<base64>"}`.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: RwLock<()>,
}

impl Backend for FileBackend {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RvError> {
        if prefix.starts_with('/') || has_parent_reference(prefix) {
            return Err(RvError::ErrPhysicalBackendPrefixInvalid);
        }

        let mut path = self.path.clone();
        if !prefix.is_empty() {
            path.push(prefix);
        }

        let _lock = self.lock.read().map_err(|_| RvError::ErrRwLockPoison)?;

        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = vec![];
        let entries = fs::read_dir(path)?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stripped) = name.strip_prefix('_') {
                names.push(stripped.to_owned());
            } else {
                names.push(name + "/");
            }
        }
        Ok(names)
    }

    fn get(&self, k: &str) -> Result<Option<BackendEntry>, RvError> {
        check_key(k)?;

        let (path, key) = self.path_key(k);
        let path = path.join(key);

        let _lock = self.lock.read().map_err(|_| RvError::ErrRwLockPoison)?;

        match File::open(&path) {
            Ok(mut file) => {
                let mut buffer = String::new();
                file.read_to_string(&mut buffer)?;
                let mut entry: BackendEntry = serde_json::from_str(&buffer)?;
                entry.key = k.to_string();
                Ok(Some(entry))
            }
            Err(err) => {
                if err.kind() == io::ErrorKind::NotFound {
                    Ok(None)
                } else {
                    Err(RvError::from(err))
                }
            }
        }
    }

    fn put(&self, entry: &BackendEntry) -> Result<(), RvError> {
        let k = entry.key.as_str();
        check_key(k)?;

        let _lock = self.lock.write().map_err(|_| RvError::ErrRwLockPoison)?;
        let (path, key) = self.path_key(k);
        fs::create_dir_all(&path)?;
        let file_path = path.join(&key);
        let mut file = File::create(&file_path)?;
        let serialized_entry = serde_json::to_string(entry)?;
        file.write_all(serialized_entry.as_bytes())?;
        Ok(())
    }

    fn delete(&self, k: &str) -> Result<(), RvError> {
        check_key(k)?;

        let _lock = self.lock.write().map_err(|_| RvError::ErrRwLockPoison)?;
        let (path, key) = self.path_key(k);
        let file_path = path.join(key);
        if let Err(err) = fs::remove_file(&file_path) {
            if err.kind() == io::ErrorKind::NotFound {
                return Ok(());
            } else {
                return Err(RvError::from(err));
            }
        }
        Ok(())
    }
}

impl FileBackend {
    pub fn new(conf: &HashMap<String, Value>) -> Result<Self, RvError> {
        match conf.get("path").and_then(|path| path.as_str()) {
            Some(path) => {
                log::debug!("file backend path: {}", path);
                Ok(FileBackend { path: PathBuf::from(path), lock: RwLock::new(()) })
            }
            None => Err(RvError::ErrPhysicalConfigItemMissing),
        }
    }

    fn path_key(&self, k: &str) -> (PathBuf, String) {
        let path = self.path.join(k);
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_else(|| self.path.clone());
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        (parent, format!("_{}", name))
    }
}

fn has_parent_reference(k: &str) -> bool {
    k.split('/').any(|component| component == "..")
}

fn check_key(k: &str) -> Result<(), RvError> {
    if k.starts_with('/') || has_parent_reference(k) {
        return Err(RvError::ErrPhysicalBackendKeyInvalid);
    }
    Ok(())
}
