use crate::error::{Error, Result};
use crate::port::PortChecker;
use crate::port::checker::resolve_blocking;
use std::collections::HashSet;
use std::net::{SocketAddr, TcpListener};
use std::sync::{LazyLock, Mutex, MutexGuard};

/// Ports currently claimed by servers in this process.
///
/// Claims are keyed by port only: `localhost` and `127.0.0.1` may name the
/// same socket, so two hosts never share a claimed port.
static CLAIMED_PORTS: LazyLock<Mutex<HashSet<u16>>> = LazyLock::new(Default::default);

// How often to ask the OS for a fresh ephemeral port before giving up.
const EPHEMERAL_ATTEMPTS: u16 = 16;

fn claimed_ports() -> Result<MutexGuard<'static, HashSet<u16>>> {
    CLAIMED_PORTS
        .lock()
        .map_err(|_| Error::Other("Failed to lock claimed ports".to_string()))
}

/// Exclusive claim on a port for the lifetime of this value.
///
/// Checking the ledger, probing the socket and recording the claim happen
/// under one lock, so concurrent callers asking for the same port cannot
/// both get it. Dropping the reservation releases the claim.
#[derive(Debug)]
pub struct PortReservation {
    port: u16,
}

impl PortReservation {
    /// Claims `port` if no other reservation holds it and it can be bound
    /// on every address of `host`. Returns `Ok(None)` when it is taken.
    pub fn claim(host: &str, port: u16) -> Result<Option<Self>> {
        let mut claimed = claimed_ports()?;
        if claimed.contains(&port) {
            tracing::trace!(port, "Port already claimed in this process");
            return Ok(None);
        }

        if !PortChecker::is_port_free(host, port)? {
            return Ok(None);
        }

        claimed.insert(port);
        tracing::debug!(host, port, "Claimed port");
        Ok(Some(Self { port }))
    }

    /// Claims a port chosen by the operating system.
    pub fn claim_ephemeral(host: &str) -> Result<Self> {
        let addrs = resolve_blocking(host, 0)?;

        let mut claimed = claimed_ports()?;
        for _ in 0..EPHEMERAL_ATTEMPTS {
            let port = first_ephemeral_port(host, &addrs)?;

            // The OS only vouched for one address family.
            if claimed.contains(&port) || !PortChecker::is_port_free(host, port)? {
                continue;
            }

            claimed.insert(port);
            tracing::debug!(host, port, "Claimed ephemeral port");
            return Ok(Self { port });
        }

        Err(Error::PortUnavailable(format!(
            "no usable ephemeral port on '{}' after {} attempts",
            host, EPHEMERAL_ATTEMPTS
        )))
    }

    /// Claims the first usable port in `preferred..preferred + limit`.
    ///
    /// A preferred port of `0` delegates to [`claim_ephemeral`](Self::claim_ephemeral).
    ///
    /// # Errors
    ///
    /// [`Error::PortExhausted`] when every port in the range is taken.
    pub fn claim_from(host: &str, preferred: u16, limit: u16) -> Result<Self> {
        if preferred == 0 {
            return Self::claim_ephemeral(host);
        }

        let end = preferred.saturating_add(limit.saturating_sub(1));
        for port in preferred..=end {
            if let Some(reservation) = Self::claim(host, port)? {
                if port != preferred {
                    tracing::info!(preferred, port, "Preferred port busy, using next free port");
                }
                return Ok(reservation);
            }
        }

        tracing::warn!(start = preferred, end, "No free port in range");
        Err(Error::PortExhausted {
            start: preferred,
            end,
        })
    }

    /// [`claim_from`](Self::claim_from) on the blocking thread pool.
    ///
    /// Name resolution and bind checks block, and concurrent callers wait on
    /// the ledger lock, so async callers go through here.
    pub async fn acquire_from(host: &str, preferred: u16, limit: u16) -> Result<Self> {
        let host = host.to_string();
        tokio::task::spawn_blocking(move || Self::claim_from(&host, preferred, limit))
            .await
            .map_err(|e| Error::Other(format!("Port allocation task failed: {}", e)))?
    }

    /// [`claim`](Self::claim) on the blocking thread pool.
    pub async fn acquire(host: &str, port: u16) -> Result<Option<Self>> {
        let host = host.to_string();
        tokio::task::spawn_blocking(move || Self::claim(&host, port))
            .await
            .map_err(|e| Error::Other(format!("Port allocation task failed: {}", e)))?
    }

    /// Whether `port` is claimed by any reservation in this process.
    pub fn is_claimed(port: u16) -> bool {
        claimed_ports()
            .map(|claimed| claimed.contains(&port))
            .unwrap_or(false)
    }

    /// The claimed port
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Asks the OS for a port on the first address of `addrs` that can bind.
fn first_ephemeral_port(host: &str, addrs: &[SocketAddr]) -> Result<u16> {
    let mut last_error = None;
    for addr in addrs {
        match TcpListener::bind(addr).and_then(|listener| listener.local_addr()) {
            Ok(local) => return Ok(local.port()),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "Skipping unbindable address");
                last_error = Some(e);
            }
        }
    }

    Err(Error::PortUnavailable(match last_error {
        Some(e) => format!("cannot bind any address of '{}': {}", host, e),
        None => format!("'{}' has no address", host),
    }))
}

impl Drop for PortReservation {
    fn drop(&mut self) {
        let mut claimed = CLAIMED_PORTS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        claimed.remove(&self.port);
        tracing::trace!(port = self.port, "Released port claim");
    }
}
