use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use super::documents::{DEFAULT_MAX_UPLOAD_BYTES, UploadPolicy};

const DEFAULT_DATABASE_URL: &str = "sqlite://documents.db";
const DEFAULT_STORAGE_ROOT: &str = "./storage";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the process environment
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub storage_root: PathBuf,
    pub bind_addr: SocketAddr,
    pub upload_max_bytes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let bind_addr = read("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr: SocketAddr = bind_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        let upload_max_bytes = match lookup("UPLOAD_MAX_BYTES").filter(|v| !v.trim().is_empty()) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(bytes) if bytes > 0 => bytes,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "UPLOAD_MAX_BYTES",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url: read("DATABASE_URL", DEFAULT_DATABASE_URL),
            storage_root: PathBuf::from(read("STORAGE_ROOT", DEFAULT_STORAGE_ROOT)),
            bind_addr,
            upload_max_bytes,
        })
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::default().with_max_bytes(self.upload_max_bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.storage_root, PathBuf::from("./storage"));
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.upload_max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = load(&[("UPLOAD_MAX_BYTES", "2048"), ("BIND_ADDR", "0.0.0.0:8080")]).unwrap();
        assert_eq!(config.upload_max_bytes, 2048);
        assert_eq!(config.upload_policy().max_bytes, 2048);
        assert_eq!(config.bind_addr.port(), 8080);

        assert!(matches!(
            load(&[("UPLOAD_MAX_BYTES", "lots")]),
            Err(ConfigError::Invalid { name: "UPLOAD_MAX_BYTES", .. })
        ));
        assert!(matches!(
            load(&[("BIND_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { name: "BIND_ADDR", .. })
        ));
    }
}
