//! Gateway configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use entigate_core::{
    AttributeMetadata, EntityTypeConfig, EntityTypeConfigs, InMemoryAttributeCatalog, InteractionConfig,
};

/// Entigate HTTP/JSON gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "entigate-gateway")]
#[command(about = "HTTP/JSON entity gateway over the analytic and entity stores")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// JSON file with entity types, interactions and attribute metadata.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// NNG address of the analytic query engine.
    #[arg(long, default_value = "tcp://127.0.0.1:9400")]
    pub qs: String,

    /// NNG address of the entity store engine. Entity store attributes are
    /// unavailable when unset.
    #[arg(long)]
    pub eds: Option<String>,

    /// Deadline (ms) for one backend call, including all of its chunks.
    #[arg(long, default_value_t = 5_000)]
    pub backend_timeout_ms: u64,

    /// NNG send/recv timeout (ms).
    #[arg(long, default_value_t = 30_000)]
    pub client_timeout_ms: u64,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Path of the JSON configuration file.
    pub config_path: Option<PathBuf>,
    /// Address of the analytic query engine.
    pub qs_addr: String,
    /// Address of the entity store engine.
    pub eds_addr: Option<String>,
    /// Deadline for one backend call.
    pub backend_timeout: Duration,
    /// NNG send/recv timeout.
    pub client_timeout: Duration,
    /// Log output format.
    pub log_format: LogFormat,
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        Self {
            listen_addr: args.listen.clone(),
            config_path: args.config.clone(),
            qs_addr: args.qs.clone(),
            eds_addr: args.eds.clone(),
            backend_timeout: Duration::from_millis(args.backend_timeout_ms),
            client_timeout: Duration::from_millis(args.client_timeout_ms),
            log_format: args.log_format,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            config_path: None,
            qs_addr: "tcp://127.0.0.1:9400".to_string(),
            eds_addr: None,
            backend_timeout: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
            log_format: LogFormat::Text,
        }
    }
}

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] entigate_core::Error),
}

/// Contents of the JSON configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayFile {
    #[serde(default)]
    pub entity_types: HashMap<String, EntityTypeConfig>,
    #[serde(default)]
    pub interactions: HashMap<String, InteractionConfig>,
    #[serde(default)]
    pub interaction_timestamp_attribute: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeMetadata>,
}

impl GatewayFile {
    /// Read and parse `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Entity type configuration.
    pub fn entity_type_configs(&self) -> EntityTypeConfigs {
        let mut configs = EntityTypeConfigs {
            entity_types: self.entity_types.clone(),
            interactions: self.interactions.clone(),
            ..Default::default()
        };
        if let Some(attribute) = &self.interaction_timestamp_attribute {
            configs.interaction_timestamp_attribute = attribute.clone();
        }
        configs
    }

    /// Attribute catalog with every listed attribute.
    pub fn catalog(&self) -> Result<InMemoryAttributeCatalog, ConfigError> {
        Ok(InMemoryAttributeCatalog::from_attributes(self.attributes.iter().cloned())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigate_proto::{AttributeSource, ValueType};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_args_to_config() {
        let args = Args::parse_from([
            "entigate-gateway",
            "--listen",
            "127.0.0.1:9090",
            "--eds",
            "ipc:///tmp/eds.sock",
            "--backend-timeout-ms",
            "250",
            "--log-format",
            "json",
        ]);
        let config = GatewayConfig::from(&args);

        assert_eq!(config.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.qs_addr, "tcp://127.0.0.1:9400");
        assert_eq!(config.eds_addr.as_deref(), Some("ipc:///tmp/eds.sock"));
        assert_eq!(config.backend_timeout, Duration::from_millis(250));
        assert_eq!(config.client_timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "entity_types": {{
                    "SERVICE": {{"id_attributes": ["SERVICE.id"], "timestamp_attribute": "SERVICE.startTime"}}
                }},
                "interactions": {{
                    "SERVICE": {{
                        "caller_side_attributes": ["INTERACTION.fromServiceId"],
                        "callee_side_attributes": ["INTERACTION.toServiceId"]
                    }}
                }},
                "attributes": [
                    {{"id": "SERVICE.id", "scope": "SERVICE", "key": "id", "value_kind": "STRING", "sources": ["QS", "EDS"]}},
                    {{"id": "SERVICE.duration", "scope": "SERVICE", "key": "duration", "value_kind": "LONG", "sources": ["QS"]}}
                ]
            }}"#
        )
        .unwrap();

        let loaded = GatewayFile::load(file.path()).unwrap();
        let configs = loaded.entity_type_configs();
        assert_eq!(configs.id_attributes("SERVICE").unwrap(), ["SERVICE.id"]);
        assert_eq!(configs.interaction_timestamp_attribute, "INTERACTION.startTime");

        let catalog = loaded.catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            loaded.attributes[1],
            AttributeMetadata::new("SERVICE", "duration", ValueType::Long, vec![AttributeSource::Qs])
        );
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = GatewayFile::load(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();
        assert!(matches!(GatewayFile::load(&broken), Err(ConfigError::Parse { .. })));

        let sourceless = GatewayFile {
            attributes: vec![AttributeMetadata::new("SERVICE", "id", ValueType::String, vec![])],
            ..Default::default()
        };
        assert!(matches!(sourceless.catalog(), Err(ConfigError::Invalid(_))));
    }
}
