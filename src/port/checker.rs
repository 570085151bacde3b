use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::time::Duration;
use tokio::net::{TcpStream, lookup_host};
use tokio::time;

/// Per-address connect timeout used by [`PortChecker::is_port_open`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// Stateless checks of TCP port state.
///
/// # Example
///
/// ```no_run
/// use ss_serve::PortChecker;
///
/// #[tokio::main]
/// async fn main() -> ss_serve::Result<()> {
///     if PortChecker::is_port_open("localhost", 3000).await? {
///         println!("something is listening on 3000");
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PortChecker;

impl PortChecker {
    /// Returns `true` if a connection to `host:port` succeeds.
    ///
    /// Every address `host` resolves to is tried; refusal and timeouts are
    /// reported as `false`. Only an unresolvable host or port `0` is an error.
    pub async fn is_port_open(host: &str, port: u16) -> Result<bool> {
        Self::is_port_open_within(host, port, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Like [`is_port_open`](Self::is_port_open) with a custom connect timeout.
    pub async fn is_port_open_within(
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<bool> {
        ensure_checkable(host, port)?;

        let addrs: Vec<SocketAddr> = lookup_host((host, port))
            .await
            .map_err(|e| unresolvable(host, e))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::ConfigInvalid(format!(
                "Host '{}' resolved to no addresses",
                host
            )));
        }

        for addr in addrs {
            match time::timeout(connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    drop(stream);
                    tracing::trace!(%addr, "Port is open");
                    return Ok(true);
                }
                Ok(Err(e)) => tracing::trace!(%addr, error = %e, "Connection failed"),
                Err(_) => tracing::trace!(%addr, "Connection attempt timed out"),
            }
        }

        Ok(false)
    }

    /// Returns `true` if `host:port` can be bound right now.
    ///
    /// The port counts as taken as soon as one resolved address reports it
    /// in use. Addresses that cannot be bound for other reasons (for example
    /// IPv6 disabled on the machine) are skipped, but at least one address
    /// must bind.
    pub fn is_port_free(host: &str, port: u16) -> Result<bool> {
        ensure_checkable(host, port)?;

        let mut bound_any = false;
        for addr in resolve_blocking(host, port)? {
            match TcpListener::bind(addr) {
                Ok(listener) => {
                    drop(listener);
                    bound_any = true;
                }
                Err(e) if e.kind() == ErrorKind::AddrInUse => {
                    tracing::trace!(%addr, "Port in use");
                    return Ok(false);
                }
                Err(e) => tracing::debug!(%addr, error = %e, "Skipping unbindable address"),
            }
        }

        Ok(bound_any)
    }
}

fn ensure_checkable(host: &str, port: u16) -> Result<()> {
    if host.trim().is_empty() {
        return Err(Error::ConfigInvalid("Host must not be empty".to_string()));
    }
    if port == 0 {
        return Err(Error::ConfigInvalid("Port 0 cannot be checked".to_string()));
    }
    Ok(())
}

fn unresolvable(host: &str, e: std::io::Error) -> Error {
    Error::ConfigInvalid(format!("Cannot resolve host '{}': {}", host, e))
}

/// Resolves `host:port` with the blocking resolver.
pub(crate) fn resolve_blocking(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| unresolvable(host, e))?
        .collect();

    if addrs.is_empty() {
        return Err(Error::ConfigInvalid(format!(
            "Host '{}' resolved to no addresses",
            host
        )));
    }

    Ok(addrs)
}
