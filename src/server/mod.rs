/// Server management module for ss-serve.
///
/// This module owns the lifecycle of a single development server process:
/// spawning it through a [`Launcher`], waiting for it to accept connections,
/// and shutting it down again. All public lifecycle methods are instrumented
/// with `tracing` spans.
///
/// # Components
///
/// * `launcher` - Launch plans and the commands that serve them
/// * `process` - The [`Server`] state machine
/// * `readiness` - Bounded polling for a port to open or close
///
/// # Examples
///
/// Supplying a custom launcher:
///
/// ```no_run
/// use ss_serve::server::{LaunchPlan, Launcher, Server};
/// use async_process::Command;
/// use std::sync::Arc;
///
/// struct Python;
///
/// impl Launcher for Python {
///     fn command(&self, plan: &LaunchPlan, port: u16) -> Command {
///         let mut command = Command::new("python3");
///         command.args(["-m", "http.server", "--bind", &plan.host, &port.to_string()]);
///         command
///     }
/// }
///
/// let server = Server::new(LaunchPlan::new("127.0.0.1", 0, "unused"), Arc::new(Python));
/// ```
pub mod launcher;
mod process;
mod readiness;

pub use launcher::{LaunchPlan, Launcher, PhpBuiltinServer, authority};
pub use process::{Server, ServerId, ServerStatus};
