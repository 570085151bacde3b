use crate::error::{Error, Result};
use crate::port::PortChecker;
use async_process::Child;
use std::time::Duration;
use tokio::time::{self, Instant};

const INITIAL_POLL_DELAY: Duration = Duration::from_millis(25);
const MAX_POLL_DELAY: Duration = Duration::from_millis(250);

/// Exponential backoff bounded by an overall deadline.
struct Backoff {
    deadline: Instant,
    delay: Duration,
}

impl Backoff {
    fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            delay: INITIAL_POLL_DELAY,
        }
    }

    /// Sleeps before the next attempt; `false` once the deadline has passed.
    async fn wait(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        time::sleep(self.delay.min(self.deadline - now)).await;
        self.delay = (self.delay * 2).min(MAX_POLL_DELAY);
        true
    }
}

/// Polls until `host:port` accepts connections.
///
/// Fails with [`Error::Process`] if the child exits first and with
/// [`Error::Timeout`] if the deadline passes.
pub(crate) async fn wait_until_listening(
    child: &mut Child,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<()> {
    let mut backoff = Backoff::new(timeout);
    loop {
        if let Some(status) = child.try_status()? {
            return Err(Error::Process(format!(
                "Server exited with {} before accepting connections on port {}",
                status, port
            )));
        }

        if PortChecker::is_port_open(host, port).await? {
            return Ok(());
        }

        if !backoff.wait().await {
            return Err(Error::Timeout(format!(
                "Server did not accept connections on {}:{} within {:?}",
                host, port, timeout
            )));
        }
    }
}

/// Polls until `host:port` stops accepting connections.
pub(crate) async fn wait_until_closed(host: &str, port: u16, timeout: Duration) -> Result<()> {
    let mut backoff = Backoff::new(timeout);
    loop {
        if !PortChecker::is_port_open(host, port).await? {
            return Ok(());
        }

        if !backoff.wait().await {
            return Err(Error::Timeout(format!(
                "Port {}:{} still accepting connections after {:?}",
                host, port, timeout
            )));
        }
    }
}
