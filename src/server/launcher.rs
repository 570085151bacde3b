use crate::config::{DEFAULT_PHP_BINARY, DEFAULT_SHUTDOWN_TIMEOUT_MS, DEFAULT_STARTUP_TIMEOUT_MS};
use async_process::Command;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Everything needed to spawn one server process.
///
/// Relative paths are interpreted against `working_dir`, which becomes the
/// child's current directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Address the server binds to
    pub host: String,
    /// Port to bind. `0` asks the operating system for one at start time.
    pub port: u16,
    /// Script every request is routed through
    pub bootstrap_file: PathBuf,
    /// Directory served for static files
    pub document_root: PathBuf,
    /// Current directory of the child process
    pub working_dir: PathBuf,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// How long to wait for the server to accept connections
    pub startup_timeout: Duration,
    /// How long to wait for the server to exit and release its port
    pub shutdown_timeout: Duration,
}

impl LaunchPlan {
    /// Plan with default directories and timeouts
    pub fn new(host: impl Into<String>, port: u16, bootstrap_file: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port,
            bootstrap_file: bootstrap_file.into(),
            document_root: PathBuf::from("."),
            working_dir: PathBuf::from("."),
            env: HashMap::new(),
            startup_timeout: Duration::from_millis(DEFAULT_STARTUP_TIMEOUT_MS),
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        }
    }
}

/// Formats `host:port`, bracketing IPv6 literals.
pub fn authority(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Builds the command that runs a server for a plan.
///
/// Implementations only choose the program and its arguments; the caller
/// sets up the working directory, environment and stdio.
#[cfg_attr(test, mockall::automock)]
pub trait Launcher: Send + Sync {
    /// Command serving `plan` on `port`
    fn command(&self, plan: &LaunchPlan, port: u16) -> Command;
}

/// Runs PHP's built-in web server: `php -S host:port -t root bootstrap`.
#[derive(Debug, Clone)]
pub struct PhpBuiltinServer {
    binary: PathBuf,
}

impl PhpBuiltinServer {
    /// Use the given interpreter binary
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Interpreter binary
    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    /// Arguments passed to the interpreter
    pub fn args(plan: &LaunchPlan, port: u16) -> Vec<String> {
        vec![
            "-S".to_string(),
            authority(&plan.host, port),
            "-t".to_string(),
            plan.document_root.display().to_string(),
            plan.bootstrap_file.display().to_string(),
        ]
    }
}

impl Default for PhpBuiltinServer {
    fn default() -> Self {
        Self::new(DEFAULT_PHP_BINARY)
    }
}

impl Launcher for PhpBuiltinServer {
    fn command(&self, plan: &LaunchPlan, port: u16) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(Self::args(plan, port));
        command
    }
}
