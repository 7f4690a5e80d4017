use std::{collections::BTreeMap, sync::RwLock};

use crate::{
    errors::RvError,
    storage::{Backend, BackendEntry},
};

/// A process local backend, handy for tests and for staging data in memory.
#[derive(Default)]
pub struct InmemBackend {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl Backend for InmemBackend {
    fn list(&self, prefix: &str) -> Result<Vec<String>, RvError> {
        let entries = self.entries.read().map_err(|_| RvError::ErrRwLockPoison)?;

        let mut names: Vec<String> = vec![];
        for key in entries.keys().filter(|k| k.starts_with(prefix)) {
            let rest = &key[prefix.len()..];
            let name = match rest.find('/') {
                Some(i) => rest[..=i].to_string(),
                None => rest.to_string(),
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn get(&self, k: &str) -> Result<Option<BackendEntry>, RvError> {
        let entries = self.entries.read().map_err(|_| RvError::ErrRwLockPoison)?;
        Ok(entries.get(k).map(|value| BackendEntry { key: k.to_string(), value: value.clone() }))
    }

    fn put(&self, entry: &BackendEntry) -> Result<(), RvError> {
        let mut entries = self.entries.write().map_err(|_| RvError::ErrRwLockPoison)?;
        entries.insert(entry.key.clone(), entry.value.clone());
        Ok(())
    }

    fn delete(&self, k: &str) -> Result<(), RvError> {
        let mut entries = self.entries.write().map_err(|_| RvError::ErrRwLockPoison)?;
        entries.remove(k);
        Ok(())
    }
}

impl InmemBackend {
    pub fn new() -> Self {
        InmemBackend::default()
    }
}
