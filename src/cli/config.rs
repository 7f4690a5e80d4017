//! This module defines and handles the config file options for the migrator. The config file
//! describes the physical storage of the origin Vault, which the command line cannot express.

use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RvError;

/// A struct that contains the configurable options of a migration run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, deserialize_with = "validate_storage")]
    pub storage: HashMap<String, Storage>,
    #[serde(default)]
    pub log_level: String,
}

/// A struct that contains several configurable options for storage stuffs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    #[serde(default)]
    pub stype: String,
    #[serde(flatten)]
    pub config: HashMap<String, Value>,
}

static STORAGE_TYPE_KEYWORDS: &[&str] = &["etcd", "file", "inmem"];

fn validate_storage<'de, D>(deserializer: D) -> Result<HashMap<String, Storage>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let storage: HashMap<String, Storage> = Deserialize::deserialize(deserializer)?;

    for key in storage.keys() {
        if !STORAGE_TYPE_KEYWORDS.contains(&key.as_str()) {
            return Err(serde::de::Error::custom(format!("Invalid storage key: {}", key)));
        }
    }

    Ok(storage)
}

impl Config {
    pub fn merge(&mut self, other: Config) {
        self.storage.extend(other.storage);

        if !other.log_level.is_empty() {
            self.log_level = other.log_level;
        }
    }

    /// The single origin storage block.
    pub fn origin_storage(&self) -> Result<&Storage, RvError> {
        if self.storage.len() != 1 {
            return Err(RvError::ErrConfigStorageNotFound);
        }

        self.storage.values().next().ok_or(RvError::ErrConfigStorageNotFound)
    }
}

pub fn load_config(path: &str) -> Result<Config, RvError> {
    let f = Path::new(path);
    let config = if f.is_dir() {
        load_config_dir(path)?
    } else if f.is_file() {
        load_config_file(path)?
    } else {
        return Err(RvError::ErrConfigPathInvalid);
    };

    check_config(&config)?;
    Ok(config)
}

fn load_config_dir(dir: &str) -> Result<Config, RvError> {
    log::debug!("load_config_dir: {}", dir);
    let mut paths: Vec<String> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            if ext == "hcl" || ext == "json" {
                let filename = path.to_string_lossy().into_owned();
                paths.push(filename);
            }
        }
    }

    // merge in a stable order, later files win
    paths.sort();

    let mut result: Option<Config> = None;

    for path in paths {
        log::debug!("load_config_dir path: {}", path);
        let config = load_config_file(&path)?;
        match result.as_mut() {
            Some(result) => result.merge(config),
            None => result = Some(config),
        }
    }

    result.ok_or(RvError::ErrConfigLoadFailed)
}

fn load_config_file(path: &str) -> Result<Config, RvError> {
    log::debug!("load_config_file: {}", path);
    let file = fs::File::open(path)?;

    let mut config: Config = if path.ends_with(".hcl") {
        hcl::from_reader(file)?
    } else if path.ends_with(".json") {
        serde_json::from_reader(file).map_err(|e| RvError::ErrConfigInvalid(format!("{}: {}", path, e)))?
    } else {
        return Err(RvError::ErrConfigPathInvalid);
    };

    set_config_type_field(&mut config);
    Ok(config)
}

fn set_config_type_field(config: &mut Config) {
    config.storage.iter_mut().for_each(|(key, value)| value.stype = key.clone());
}

fn check_config(config: &Config) -> Result<(), RvError> {
    if config.storage.len() != 1 {
        return Err(RvError::ErrConfigStorageNotFound);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::{env, fs, io::prelude::*};

    use super::*;
    use crate::test_utils::TEST_DIR;

    fn write_file(path: &str, config: &str) -> Result<(), RvError> {
        let mut file = fs::File::create(path)?;

        file.write_all(config.as_bytes())?;

        file.flush()?;

        Ok(())
    }

    #[test]
    fn test_load_config() {
        let dir = env::temp_dir().join(*TEST_DIR).join("test_load_config");
        assert!(fs::create_dir(&dir).is_ok());

        let file_path = dir.join("config.hcl");
        let path = file_path.to_str().unwrap_or("config.hcl");

        let hcl_config_str = r#"
            storage "file" {
              path    = "./vault/data"
            }

            log_level = "debug"
        "#;

        assert!(write_file(path, hcl_config_str).is_ok());

        let config = load_config(path);
        assert!(config.is_ok());
        let hcl_config = config.unwrap();
        println!("hcl config: {:?}", hcl_config);

        let json_config_str = r#"{
            "storage": {
                "file": {
                    "path": "./vault/data"
                }
            },
            "log_level": "debug"
        }"#;

        let file_path = dir.join("config.json");
        let path = file_path.to_str().unwrap_or("config.json");
        assert!(write_file(path, json_config_str).is_ok());

        let config = load_config(path);
        assert!(config.is_ok());
        let json_config = config.unwrap();
        println!("json config: {:?}", json_config);

        let hcl_config_value: Value = serde_json::to_value(&hcl_config).unwrap();
        let json_config_value: Value = serde_json::to_value(&json_config).unwrap();
        assert_eq!(hcl_config_value, json_config_value);

        assert_eq!(json_config.storage.len(), 1);
        assert_eq!(json_config.log_level.as_str(), "debug");

        let storage = json_config.origin_storage().unwrap();
        assert_eq!(storage.stype.as_str(), "file");
        assert_eq!(storage.config.len(), 1);
        let (_, path) = storage.config.iter().next().unwrap();
        assert_eq!(path.as_str(), Some("./vault/data"));
    }

    #[test]
    fn test_load_config_dir() {
        let dir = env::temp_dir().join(*TEST_DIR).join("test_load_config_dir");
        assert!(fs::create_dir(&dir).is_ok());

        let file_path = dir.join("config1.hcl");
        let path = file_path.to_str().unwrap_or("config1.hcl");

        let hcl_config_str = r#"
            storage "file" {
              path    = "./vault/data"
            }

            log_level = "debug"
        "#;

        assert!(write_file(path, hcl_config_str).is_ok());

        let file_path = dir.join("config2.json");
        let path = file_path.to_str().unwrap_or("config2.json");
        assert!(write_file(path, r#"{"log_level": "info"}"#).is_ok());

        // ignored
        let file_path = dir.join("notes.txt");
        assert!(write_file(file_path.to_str().unwrap(), "log_level = \"trace\"").is_ok());

        let config = load_config(dir.to_str().unwrap());
        println!("config: {:?}", config);
        assert!(config.is_ok());
        let hcl_config = config.unwrap();
        assert_eq!(hcl_config.log_level.as_str(), "info");
        assert_eq!(hcl_config.origin_storage().unwrap().stype.as_str(), "file");
    }

    #[test]
    fn test_load_config_etcd() {
        let dir = env::temp_dir().join(*TEST_DIR).join("test_load_config_etcd");
        assert!(fs::create_dir(&dir).is_ok());

        let file_path = dir.join("etcd.hcl");
        let path = file_path.to_str().unwrap_or("etcd.hcl");
        let hcl_config_str = r#"
            storage "etcd" {
              address         = "http://127.0.0.1:2379"
              etcd_api        = "v3"
              path            = "/vault/"
              request_timeout = "5s"
            }
        "#;
        assert!(write_file(path, hcl_config_str).is_ok());

        let config = load_config(path).unwrap();
        let storage = config.origin_storage().unwrap();
        assert_eq!(storage.stype.as_str(), "etcd");
        assert_eq!(storage.config["etcd_api"].as_str(), Some("v3"));
        assert!(crate::storage::new_backend(&storage.stype, &storage.config).is_ok());
    }

    #[test]
    fn test_load_config_invalid() {
        let dir = env::temp_dir().join(*TEST_DIR).join("test_load_config_invalid");
        assert!(fs::create_dir(&dir).is_ok());

        let file_path = dir.join("consul.hcl");
        let path = file_path.to_str().unwrap_or("consul.hcl");
        let hcl_config_str = r#"
            storage "consul" {
              address = "127.0.0.1:8500"
            }
        "#;
        assert!(write_file(path, hcl_config_str).is_ok());
        assert!(load_config(path).is_err());

        let file_path = dir.join("empty.json");
        let path = file_path.to_str().unwrap_or("empty.json");
        assert!(write_file(path, r#"{"log_level": "info"}"#).is_ok());
        assert_eq!(load_config(path).unwrap_err(), RvError::ErrConfigStorageNotFound);

        let file_path = dir.join("broken.json");
        let path = file_path.to_str().unwrap_or("broken.json");
        assert!(write_file(path, "{").is_ok());
        assert_eq!(load_config(path).unwrap_err().kind(), crate::errors::ErrorKind::Config);

        let missing = dir.join("missing.hcl");
        assert_eq!(load_config(missing.to_str().unwrap()).unwrap_err(), RvError::ErrConfigPathInvalid);

        let empty_dir = dir.join("empty");
        assert!(fs::create_dir(&empty_dir).is_ok());
        assert_eq!(load_config(empty_dir.to_str().unwrap()).unwrap_err(), RvError::ErrConfigLoadFailed);
    }
}
