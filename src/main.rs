//! ss-serve - run a development server for the current project until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use ss_serve::{ServerConfig, ServerFactory};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

/// Serve a PHP project through its bootstrap script on a free local port
#[derive(Parser, Debug)]
#[command(name = "ss-serve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", env = "SS_SERVE_BASE_PATH")]
    base_path: PathBuf,

    /// JSON or YAML config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Preferred port; the next free one is used if it is busy
    #[arg(short, long)]
    port: Option<u16>,

    /// Bootstrap script, relative to the project root
    #[arg(long)]
    bootstrap_file: Option<PathBuf>,

    /// Directory served for static files
    #[arg(long)]
    document_root: Option<PathBuf>,

    /// PHP interpreter
    #[arg(long, env = "SS_SERVE_PHP")]
    php: Option<PathBuf>,
}

impl Cli {
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::new("localhost", 8080),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.preferred_port = port;
        }
        if let Some(bootstrap_file) = &self.bootstrap_file {
            config.bootstrap_file = Some(bootstrap_file.clone());
        }
        if let Some(document_root) = &self.document_root {
            config.document_root = Some(document_root.clone());
        }
        if let Some(php) = &self.php {
            config.php_binary = php.clone();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = cli.server_config()?;

    let factory = ServerFactory::new(&cli.base_path);
    let mut server = factory
        .launch_server(&config)
        .await
        .context("launching server")?;

    println!("Serving {} at {}", cli.base_path.display(), server.url()?);
    println!("Press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    tracing::info!("Shutting down");
    server.stop().await.context("stopping server")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "ss-serve",
            "--host",
            "127.0.0.1",
            "--port",
            "3000",
            "--bootstrap-file",
            "framework/tests/behat/serve-bootstrap.php",
        ]);

        let config = cli.server_config().unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.preferred_port, 3000);
        assert_eq!(
            config.bootstrap_file,
            Some(PathBuf::from("framework/tests/behat/serve-bootstrap.php"))
        );
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
