/*!
 # ss-serve

 A Rust library for launching local development web servers for a PHP
 content-management project.

 ## Overview

 ss-serve provides functionality to:
 - Locate the project's bootstrap script
 - Pick a free port, starting from a preferred one, without racing other
   launches in the same process
 - Start PHP's built-in web server on that port and wait until it accepts
   connections
 - Stop the server again and wait until the port is released

 ## Basic Usage

 ```no_run
 use ss_serve::{PortChecker, Result, ServerConfig, ServerFactory};

 #[tokio::main]
 async fn main() -> Result<()> {
     let factory = ServerFactory::new("/path/to/project");

     // Bootstrap file is discovered when not configured
     let mut server = factory
         .launch_server(&ServerConfig::new("localhost", 3000))
         .await?;

     println!("Serving at {}", server.url()?);
     assert!(PortChecker::is_port_open("localhost", server.port()).await?);

     server.stop().await?;
     Ok(())
 }
 ```

 ## Features

 - **Port selection**: consecutive search from the preferred port, or an
   OS-assigned port when the preferred port is `0`
 - **Lifecycle**: explicit start/stop with timeouts and distinct errors for
   misuse, startup failures and timeouts
 - **Configuration**: typed config loadable from JSON or YAML
 - **Logging**: `tracing` spans on every lifecycle operation, child output
   forwarded at debug level

 ## License

 This project is licensed under the terms in the LICENSE file.
*/

pub mod config;
pub mod error;
pub mod port;
pub mod server;

pub use config::{BootstrapLocator, ServerConfig};
pub use error::{Error, Result};
pub use port::{PortChecker, PortReservation};
pub use server::{LaunchPlan, Launcher, PhpBuiltinServer, Server, ServerId, ServerStatus};

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds and launches development servers for one project.
///
/// The factory resolves bootstrap files against its base path and owns the
/// port-selection policy. Servers it returns are already started.
pub struct ServerFactory {
    /// Project root; working directory of every launched server
    base_path: PathBuf,
    /// Launcher override; defaults to PHP's built-in server per config
    launcher: Option<Arc<dyn Launcher>>,
    /// Bootstrap search order
    bootstrap: BootstrapLocator,
}

impl ServerFactory {
    /// Create a factory for the project at `base_path`
    #[tracing::instrument(skip(base_path), fields(project = ?base_path.as_ref()))]
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        tracing::debug!("Creating ServerFactory");
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            launcher: None,
            bootstrap: BootstrapLocator::default(),
        }
    }

    /// Use `launcher` instead of the PHP built-in server
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Replace the bootstrap search order
    pub fn with_bootstrap_locator(mut self, locator: BootstrapLocator) -> Self {
        self.bootstrap = locator;
        self
    }

    /// Project root
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Bootstrap search order in use
    pub fn bootstrap_locator(&self) -> &BootstrapLocator {
        &self.bootstrap
    }

    /// Resolves the bootstrap file for `config`, relative to the base path.
    pub fn resolve_bootstrap(&self, config: &ServerConfig) -> Result<PathBuf> {
        self.bootstrap
            .resolve(&self.base_path, config.bootstrap_file.as_deref())
    }

    /// Launch a server and wait until it accepts connections.
    ///
    /// The configuration is validated and the bootstrap file resolved before
    /// anything is spawned. The returned server holds the claim on its port,
    /// so a concurrent or later launch with the same preferred port gets a
    /// different one.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self, config), fields(host = %config.host, preferred_port = config.preferred_port))]
    pub async fn launch_server(&self, config: &ServerConfig) -> Result<Server> {
        tracing::info!("Launching server");
        crate::config::validate_config(config).inspect_err(|e| {
            tracing::error!(error = %e, "Invalid server configuration");
        })?;

        let bootstrap_file = self.resolve_bootstrap(config).inspect_err(|e| {
            tracing::error!(error = %e, "Could not resolve bootstrap file");
        })?;
        tracing::debug!(bootstrap_file = %bootstrap_file.display(), "Resolved bootstrap file");

        let reservation = PortReservation::acquire_from(
            &config.host,
            config.preferred_port,
            config.port_search_limit,
        )
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "Could not claim a port");
        })?;

        let plan = LaunchPlan {
            host: config.host.clone(),
            port: reservation.port(),
            bootstrap_file,
            document_root: config
                .document_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            working_dir: self.base_path.clone(),
            env: config.env.clone(),
            startup_timeout: config.startup_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
        };

        let launcher = self
            .launcher
            .clone()
            .unwrap_or_else(|| Arc::new(PhpBuiltinServer::new(config.php_binary.clone())));

        let mut server = Server::with_reservation(plan, launcher, reservation);
        server.start().await?;

        tracing::info!(server_id = %server.id(), port = server.port(), "Server launched");
        Ok(server)
    }
}
