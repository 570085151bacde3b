use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default time allowed for a freshly spawned server to accept connections.
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;
/// Default time allowed for a stopped server to exit and release its port.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
/// Default number of consecutive ports tried from the preferred one.
pub const DEFAULT_PORT_SEARCH_LIMIT: u16 = 100;
/// Interpreter used when none is configured.
pub const DEFAULT_PHP_BINARY: &str = "php";

/// Configuration for launching a single development server.
///
/// `host` and `preferred_port` are required; everything else has a default.
/// When `bootstrap_file` is `None` the factory searches the project for the
/// bootstrap script (see [`BootstrapLocator`](crate::config::BootstrapLocator)).
///
/// # Examples
///
/// ```
/// use ss_serve::config::ServerConfig;
/// use std::path::PathBuf;
///
/// let config = ServerConfig {
///     bootstrap_file: Some(PathBuf::from("tests/behat/serve-bootstrap.php")),
///     ..ServerConfig::new("localhost", 3000)
/// };
/// assert_eq!(config.preferred_port, 3000);
/// ```
///
/// # JSON Schema
///
/// ```json
/// {
///   "host": "localhost",
///   "preferredPort": "3000",
///   "bootstrapFile": "vendor/silverstripe/framework/tests/behat/serve-bootstrap.php",
///   "env": { "SS_ENVIRONMENT_TYPE": "dev" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Entry script every request is routed through, relative to the base path.
    #[serde(default)]
    pub bootstrap_file: Option<PathBuf>,

    /// Address the server binds to.
    pub host: String,

    /// First port to try. `0` lets the operating system pick one.
    #[serde(deserialize_with = "deserialize_port")]
    pub preferred_port: u16,

    /// Directory served for static files, relative to the base path.
    /// Defaults to the base path itself.
    #[serde(default)]
    pub document_root: Option<PathBuf>,

    /// PHP interpreter to run.
    #[serde(default = "default_php_binary")]
    pub php_binary: PathBuf,

    /// Extra environment variables for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Milliseconds to wait for the server to accept connections.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Milliseconds to wait for the server to exit and release its port.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// How many consecutive ports to try, starting at `preferred_port`.
    #[serde(default = "default_port_search_limit")]
    pub port_search_limit: u16,
}

fn default_php_binary() -> PathBuf {
    PathBuf::from(DEFAULT_PHP_BINARY)
}

fn default_startup_timeout_ms() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_MS
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

fn default_port_search_limit() -> u16 {
    DEFAULT_PORT_SEARCH_LIMIT
}

// Ports show up both as numbers and as numeric strings in existing configs.
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => Ok(port),
        PortRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid port '{}': {}", text, e))),
    }
}

impl ServerConfig {
    /// Creates a configuration with the given host and preferred port and
    /// defaults for everything else.
    pub fn new(host: impl Into<String>, preferred_port: u16) -> Self {
        Self {
            bootstrap_file: None,
            host: host.into(),
            preferred_port,
            document_root: None,
            php_binary: default_php_binary(),
            env: HashMap::new(),
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            port_search_limit: DEFAULT_PORT_SEARCH_LIMIT,
        }
    }

    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yml` or `.yaml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the file cannot be read or does not
    /// match the expected schema.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => Self::parse_from_yaml_str(&content),
            _ => Self::parse_from_str(&content),
        }
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }

    /// Startup timeout as a [`Duration`].
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
