// src/server/process.rs
use crate::error::{Error, Result};
use crate::port::PortReservation;
use crate::server::launcher::{LaunchPlan, Launcher, authority};
use crate::server::readiness::{wait_until_closed, wait_until_listening};
use async_process::{Child, Stdio};
use futures_lite::io::{AsyncBufReadExt, AsyncRead, BufReader};
use futures_lite::StreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Unique identifier for a server, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerId(Uuid);

impl ServerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// No process is running and no port is held
    Stopped,
    /// The process is running and accepting connections
    Started,
}

/// A development web server backed by a child process.
///
/// The server exclusively owns its child process and its port claim.
/// [`stop`](Self::stop) releases both and waits for the port to close;
/// dropping a started server kills the child and releases the claim without
/// waiting.
///
/// # Example
///
/// ```no_run
/// use ss_serve::server::{LaunchPlan, PhpBuiltinServer, Server};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> ss_serve::Result<()> {
///     let plan = LaunchPlan::new("localhost", 8080, "tests/behat/serve-bootstrap.php");
///     let mut server = Server::new(plan, Arc::new(PhpBuiltinServer::default()));
///
///     server.start().await?;
///     println!("Serving at {}", server.url()?);
///     server.stop().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    id: ServerId,
    plan: LaunchPlan,
    launcher: Arc<dyn Launcher>,
    child: Option<Child>,
    reservation: Option<PortReservation>,
    port: u16,
    status: ServerStatus,
    output_tasks: Vec<JoinHandle<()>>,
}

impl Server {
    /// Create an unstarted server for a plan
    pub fn new(plan: LaunchPlan, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            id: ServerId::new(),
            plan,
            launcher,
            child: None,
            reservation: None,
            port: 0,
            status: ServerStatus::Stopped,
            output_tasks: Vec::new(),
        }
    }

    /// Create an unstarted server that already holds the claim for its port
    pub(crate) fn with_reservation(
        mut plan: LaunchPlan,
        launcher: Arc<dyn Launcher>,
        reservation: PortReservation,
    ) -> Self {
        plan.port = reservation.port();
        let mut server = Self::new(plan, launcher);
        server.reservation = Some(reservation);
        server
    }

    /// Get the server ID
    pub fn id(&self) -> ServerId {
        self.id
    }

    /// Get the bind host
    pub fn host(&self) -> &str {
        &self.plan.host
    }

    /// Get the server status
    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Last bound port, `0` if the server was never started
    pub fn port(&self) -> u16 {
        self.port
    }

    /// OS process id of the running child
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Launch plan this server was built from
    pub fn plan(&self) -> &LaunchPlan {
        &self.plan
    }

    /// Base URL, `http://{host}:{port}/`.
    ///
    /// # Errors
    ///
    /// [`Error::NotRunning`] when the server is stopped.
    pub fn url(&self) -> Result<String> {
        match self.status {
            ServerStatus::Started => Ok(format!("http://{}/", authority(&self.plan.host, self.port))),
            ServerStatus::Stopped => Err(Error::NotRunning),
        }
    }

    /// Start the server process and wait until it accepts connections.
    ///
    /// Must be called from within a tokio runtime. On failure the child is
    /// killed, the port claim released and the server stays stopped.
    #[tracing::instrument(skip(self), fields(server_id = %self.id, host = %self.plan.host))]
    pub async fn start(&mut self) -> Result<()> {
        if self.status == ServerStatus::Started {
            tracing::warn!("Start requested for a server that is already running");
            return Err(Error::AlreadyRunning);
        }

        let reservation = match self.reservation.take() {
            Some(reservation) => reservation,
            None => self.claim_port().await?,
        };
        let port = reservation.port();

        let mut command = self.launcher.command(&self.plan, port);
        command
            .current_dir(&self.plan.working_dir)
            .envs(&self.plan.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(port, "Starting server process");
        let mut child = command.spawn().map_err(|e| {
            tracing::error!(error = %e, "Failed to spawn server process");
            Error::Process(format!("Failed to start process: {}", e))
        })?;

        let mut output_tasks = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            output_tasks.push(forward_output(self.id, "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            output_tasks.push(forward_output(self.id, "stderr", stderr));
        }

        if let Err(e) =
            wait_until_listening(&mut child, &self.plan.host, port, self.plan.startup_timeout).await
        {
            tracing::error!(error = %e, "Server did not become ready");
            let _ = child.kill();
            let _ = child.status().await;
            output_tasks.iter().for_each(JoinHandle::abort);
            return Err(e);
        }

        self.child = Some(child);
        self.reservation = Some(reservation);
        self.output_tasks = output_tasks;
        self.port = port;
        self.status = ServerStatus::Started;

        tracing::info!(port, "Server started");
        Ok(())
    }

    /// Stop the server process and wait until its port is closed.
    ///
    /// The process gets `shutdown_timeout` to exit after SIGTERM before it
    /// is killed. The server is stopped even if the port is still open once
    /// the timeout expires; that case is reported as [`Error::Timeout`].
    #[tracing::instrument(skip(self), fields(server_id = %self.id, port = self.port))]
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            tracing::warn!("Stop requested for a server that is not running");
            return Err(Error::NotRunning);
        };

        tracing::info!("Stopping server process");
        self.status = ServerStatus::Stopped;
        let result = match terminate(&mut child, self.plan.shutdown_timeout).await {
            Ok(()) => {
                wait_until_closed(&self.plan.host, self.port, self.plan.shutdown_timeout).await
            }
            Err(e) => Err(e),
        };

        for task in self.output_tasks.drain(..) {
            task.abort();
        }
        self.reservation = None;
        if let Err(e) = result {
            tracing::error!(error = %e, "Server did not shut down cleanly");
            return Err(e);
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn claim_port(&self) -> Result<PortReservation> {
        if self.plan.port == 0 {
            return PortReservation::acquire_from(&self.plan.host, 0, 1).await;
        }

        PortReservation::acquire(&self.plan.host, self.plan.port).await?.ok_or_else(|| {
            Error::PortUnavailable(format!(
                "{} is in use",
                authority(&self.plan.host, self.plan.port)
            ))
        })
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("id", &self.id)
            .field("host", &self.plan.host)
            .field("port", &self.port)
            .field("status", &self.status)
            .field("pid", &self.pid())
            .finish()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::debug!(server_id = %self.id, "Killing server process on drop");
            let _ = child.kill();
        }
        for task in self.output_tasks.drain(..) {
            task.abort();
        }
    }
}

/// Ask the child to exit, escalating to a kill after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(child.id() as i32);
        if kill(pid, Signal::SIGTERM).is_ok() {
            if let Ok(status) = tokio::time::timeout(grace, child.status()).await {
                let status = status?;
                tracing::debug!(%status, "Server exited after SIGTERM");
                return Ok(());
            }
            tracing::warn!(?grace, "Server ignored SIGTERM, killing");
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    child
        .kill()
        .map_err(|e| Error::Process(format!("Failed to kill process: {}", e)))?;
    let status = child.status().await?;
    tracing::debug!(%status, "Server killed");
    Ok(())
}

/// Forward each line the child writes to `tracing`.
fn forward_output<R>(id: ServerId, stream: &'static str, reader: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => tracing::debug!(server_id = %id, stream, "{}", line),
                Err(_) => break,
            }
        }
    })
}
