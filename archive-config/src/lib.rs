//! Typed configuration for `archivesvc`.
//!
//! Loading follows the same shape as the teacher's `pmoconfig`: start from
//! an embedded default YAML document, merge an external `config.yaml` over
//! it, then apply `ARCHIVESVC_CONFIG__*` environment overrides. Unlike
//! `pmoconfig`, the result is a single immutable [`Config`] value returned
//! to the caller rather than a `lazy_static` singleton — configuration is
//! loaded once at startup in `archivesvc::main` and threaded explicitly
//! into every constructor that needs it.

use archive_model::ConfigError;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("default.yaml");
const ENV_CONFIG_PATH: &str = "ARCHIVESVC_CONFIG";
const ENV_PREFIX: &str = "ARCHIVESVC_CONFIG__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub archiver: ArchiverConfig,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub tools: ToolsConfig,
    pub db: DbConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiverConfig {
    pub threads: usize,
    pub poll_seconds: u64,
    pub retry_seconds: u64,
    pub timestamp_filenames: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub local: LocalStorageConfig,
    pub public: ContainerConfig,
    pub private: ContainerConfig,
    pub pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub container: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub credentials: ProviderCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub account: String,
    pub auth_token: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub ffmpeg_path: String,
    pub sox_path: String,
    pub working_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub connection: String,
}

impl Config {
    /// Loads configuration from `path` if given, else from the
    /// `ARCHIVESVC_CONFIG` environment variable, else from the embedded
    /// defaults alone. Environment variables of the form
    /// `ARCHIVESVC_CONFIG__archiver__threads=8` always take precedence.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut default_value: serde_yaml::Value = serde_yaml::from_str(DEFAULT_CONFIG)
            .map_err(|e| ConfigError::Fatal(format!("embedded default config: {e}")))?;

        if let Some(external) = Self::read_external(path) {
            let external_value: serde_yaml::Value = serde_yaml::from_str(&external)
                .map_err(|e| ConfigError::Fatal(format!("external config: {e}")))?;
            merge_yaml(&mut default_value, &external_value);
        }

        apply_env_overrides(&mut default_value);

        serde_yaml::from_value(default_value)
            .map_err(|e| ConfigError::Fatal(format!("config does not match schema: {e}")))
    }

    fn read_external(path: Option<&Path>) -> Option<String> {
        if let Some(path) = path {
            return fs::read_to_string(path).ok();
        }
        if let Ok(env_path) = env::var(ENV_CONFIG_PATH) {
            info!(path = %env_path, "loading config from ARCHIVESVC_CONFIG");
            return fs::read_to_string(&env_path).ok();
        }
        None
    }
}

fn merge_yaml(base: &mut serde_yaml::Value, overlay: &serde_yaml::Value) {
    use serde_yaml::Value;
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(k) {
                    Some(existing) => merge_yaml(existing, v),
                    None => {
                        base_map.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn apply_env_overrides(config: &mut serde_yaml::Value) {
    for (key, value) in env::vars() {
        if let Some(path) = key.strip_prefix(ENV_PREFIX) {
            let segments: Vec<&str> = path.split("__").collect();
            let yaml_value = serde_yaml::from_str(&value)
                .unwrap_or_else(|_| serde_yaml::Value::String(value.clone()));
            set_path(config, &segments, yaml_value);
        }
    }
}

fn set_path(value: &mut serde_yaml::Value, path: &[&str], new_value: serde_yaml::Value) {
    use serde_yaml::{Mapping, Value};
    if path.is_empty() {
        *value = new_value;
        return;
    }
    if !matches!(value, Value::Mapping(_)) {
        *value = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = value {
        let key = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key, new_value);
        } else {
            let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
            set_path(entry, &path[1..], new_value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_embedded_defaults() {
        let config = Config::load(None).expect("default config must be valid");
        assert_eq!(config.archiver.poll_seconds, 60);
        assert_eq!(config.storage.public.container, "archive-public");
    }

    #[test]
    fn external_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "archiver:\n  threads: 9").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.archiver.threads, 9);
        // unspecified keys still come from the embedded default
        assert_eq!(config.archiver.retry_seconds, 300);
    }
}
