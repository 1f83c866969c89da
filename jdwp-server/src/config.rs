// Server configuration
//
// JSON file, usually named by SA_JDWP_CONFIG; every field has a default so
// an absent file or an empty object is a valid configuration.

use crate::adapter::JvmGeneration;
use crate::protocol::{DEFAULT_MAX_PACKET_SIZE, HEADER_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5005";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the single debugger connects to
    pub listen: String,
    /// Generation tag (`jdk6`, `jdk8`, `jdk10`, `jdk13`) overriding detection
    pub jvm_version: Option<String>,
    pub max_packet_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            jvm_version: None,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_json(&json)
    }

    /// Keep the configured host, listen on `port`
    pub fn with_port(mut self, port: u16) -> Self {
        let host = match self.listen.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.listen.clone(),
        };
        self.listen = format!("{}:{}", host, port);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_packet_size < HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_packet_size {} is smaller than a packet header",
                self.max_packet_size
            )));
        }
        if let Some(tag) = &self.jvm_version {
            tag.parse::<JvmGeneration>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_json("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.max_packet_size, DEFAULT_MAX_PACKET_SIZE);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"listen": "0.0.0.0:8000", "jvm_version": "jdk10", "max_packet_size": 4096}}"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8000");
        assert_eq!(config.jvm_version.as_deref(), Some("jdk10"));
        assert_eq!(config.max_packet_size, 4096);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ServerConfig::from_json(r#"{"jvm_version": "jdk21"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_json(r#"{"max_packet_size": 4}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_json(r#"{"listen": 5005}"#),
            Err(ConfigError::Parse(_))
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ServerConfig::from_file(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_with_port() {
        let config = ServerConfig::default().with_port(9000);
        assert_eq!(config.listen, "127.0.0.1:9000");
    }
}
