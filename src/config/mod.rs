//! Configuration module for ss-serve.
//!
//! This module handles parsing, validation, and bootstrap-file discovery for
//! development servers. Configurations can be built in code or loaded from
//! JSON or YAML files.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use ss_serve::config::ServerConfig;
//!
//! let config = ServerConfig::from_file("serve.json").unwrap();
//! println!("Serving on {} from port {}", config.host, config.preferred_port);
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use ss_serve::config::{validate_config, ServerConfig};
//!
//! let config = ServerConfig::new("localhost", 3000);
//! validate_config(&config).unwrap();
//! ```
mod bootstrap;
mod parser;
pub mod validator;

pub use bootstrap::{BootstrapLocator, DEFAULT_BOOTSTRAP_PARENTS, DEFAULT_BOOTSTRAP_SCRIPT};
pub use parser::{
    DEFAULT_PHP_BINARY, DEFAULT_PORT_SEARCH_LIMIT, DEFAULT_SHUTDOWN_TIMEOUT_MS,
    DEFAULT_STARTUP_TIMEOUT_MS, ServerConfig,
};
pub use validator::validate_config;
