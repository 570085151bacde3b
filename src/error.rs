/// Error handling module for ss-serve.
///
/// This module defines the error types used throughout the library.
/// Errors fall into a few groups: configuration problems that are caught
/// before anything is spawned, lifecycle misuse (starting a running server,
/// stopping a stopped one), timeouts while waiting for a child to come up or
/// go away, and port allocation failures.
///
/// # Example
///
/// ```
/// use ss_serve::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::AlreadyRunning) => println!("Server was already started"),
///         Err(Error::BootstrapNotFound(msg)) => println!("No bootstrap script: {}", msg),
///         Err(Error::Timeout(msg)) => println!("Operation timed out: {}", msg),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use thiserror::Error;

/// Errors that can occur in the ss-serve library.
///
/// Each variant carries enough context to tell a caller whether the problem
/// is in their configuration, in the order of lifecycle calls, or in the
/// environment the child process runs in.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse configuration from a file or string.
    ///
    /// This error occurs when:
    /// - The configuration file cannot be read
    /// - The JSON or YAML is malformed
    /// - Required fields are missing or have the wrong type
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains values that cannot be used.
    ///
    /// This error occurs when:
    /// - The host is empty or cannot be resolved
    /// - A port of 0 is checked directly
    /// - A timeout or search limit is zero
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// None of the bootstrap candidates exist under the base path, or an
    /// explicitly configured bootstrap file is missing.
    #[error("Bootstrap file not found: {0}")]
    BootstrapNotFound(String),

    /// Error when spawning or supervising the server process.
    ///
    /// This error occurs when:
    /// - The interpreter binary cannot be executed
    /// - The process exits before it accepts connections
    /// - The process cannot be signalled or reaped
    #[error("Server process error: {0}")]
    Process(String),

    /// Operation timed out.
    ///
    /// This error occurs when:
    /// - A server does not accept connections within the startup timeout
    /// - A stopped server's port is still accepting connections after the
    ///   shutdown timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The server is already running.
    #[error("Already running")]
    AlreadyRunning,

    /// The server is not running.
    ///
    /// This error occurs when:
    /// - Attempting to stop a server that's not running
    /// - Asking a stopped server for its URL
    #[error("Not running")]
    NotRunning,

    /// No free port was found in the searched range.
    #[error("No free port in {start}..={end}")]
    PortExhausted {
        /// First port that was tried
        start: u16,
        /// Last port that was tried
        end: u16,
    },

    /// A server with a fixed port could not claim it.
    #[error("Port unavailable: {0}")]
    PortUnavailable(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for ss-serve operations.
///
/// This is a convenience type alias for `std::result::Result` with the `Error` type
/// from this module.
pub type Result<T> = std::result::Result<T, Error>;
