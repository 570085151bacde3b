mod common;

use common::{BOOTSTRAP_SCRIPT, LOGIN_FORM_MARKER, StubLauncher};
use serial_test::serial;
use ss_serve::error::{Error, Result};
use ss_serve::server::{LaunchPlan, Server, ServerStatus};
use ss_serve::{PortChecker, PortReservation, ServerConfig, ServerFactory};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn stub_http_server() {
    common::serve_stub_if_requested();
}

fn stub_factory(project: &TempDir) -> ServerFactory {
    ServerFactory::new(project.path()).with_launcher(Arc::new(StubLauncher))
}

fn localhost_3000() -> ServerConfig {
    ServerConfig::new("localhost", 3000)
}

#[tokio::test]
#[serial]
async fn test_start_stop() -> Result<()> {
    let project = common::project_with_bootstrap("");
    let config = ServerConfig {
        bootstrap_file: Some(PathBuf::from(BOOTSTRAP_SCRIPT)),
        ..localhost_3000()
    };

    let mut server = stub_factory(&project).launch_server(&config).await?;

    // Server is immediately started
    assert_eq!(server.status(), ServerStatus::Started);
    assert!(server.pid().is_some());
    assert!(PortChecker::is_port_open("localhost", server.port()).await?);

    let url = server.url()?;
    assert_eq!(url, format!("http://localhost:{}/", server.port()));

    let content = common::http_get(&format!("{}Security/login", url)).await;
    assert!(content.contains(LOGIN_FORM_MARKER));

    // When it stops, it stops listening
    let port = server.port();
    server.stop().await?;

    assert_eq!(server.status(), ServerStatus::Stopped);
    assert_eq!(server.port(), port);
    assert!(!PortChecker::is_port_open("localhost", port).await?);
    assert!(!PortReservation::is_claimed(port));
    assert!(matches!(server.url(), Err(Error::NotRunning)));

    Ok(())
}

#[tokio::test]
#[serial]
async fn test_start_twice_fails() -> Result<()> {
    let project = common::project_with_bootstrap("framework/");
    let mut server = stub_factory(&project)
        .launch_server(&localhost_3000())
        .await?;

    // Start fails because the server is already started
    let pid = server.pid();
    assert!(matches!(server.start().await, Err(Error::AlreadyRunning)));

    assert_eq!(server.status(), ServerStatus::Started);
    assert_eq!(server.pid(), pid);
    assert!(PortChecker::is_port_open("localhost", server.port()).await?);

    server.stop().await
}

#[tokio::test]
#[serial]
async fn test_stop_twice_fails() -> Result<()> {
    let project = common::project_with_bootstrap("");
    let mut server = stub_factory(&project)
        .launch_server(&localhost_3000())
        .await?;

    server.stop().await?;

    // Stop a 2nd time fails because the server is already stopped
    assert!(matches!(server.stop().await, Err(Error::NotRunning)));
    assert_eq!(server.status(), ServerStatus::Stopped);

    Ok(())
}

#[tokio::test]
#[serial]
async fn test_preferred_port_finds_an_open_port() -> Result<()> {
    let project = common::project_with_bootstrap("");
    let factory = stub_factory(&project);

    let mut server1 = factory.launch_server(&localhost_3000()).await?;
    let mut server2 = factory.launch_server(&localhost_3000()).await?;

    assert_ne!(server1.port(), server2.port());
    assert!(PortChecker::is_port_open("localhost", server1.port()).await?);
    assert!(PortChecker::is_port_open("localhost", server2.port()).await?);

    server2.stop().await?;
    server1.stop().await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_launches_get_distinct_ports() -> Result<()> {
    let project = common::project_with_bootstrap("");
    let factory = Arc::new(stub_factory(&project));

    let launches: Vec<_> = (0..4)
        .map(|_| {
            let factory = Arc::clone(&factory);
            tokio::spawn(async move { factory.launch_server(&localhost_3000()).await })
        })
        .collect();

    let mut servers = Vec::new();
    for launch in launches {
        servers.push(launch.await.expect("launch task panicked")?);
    }

    let mut ports: Vec<u16> = servers.iter().map(Server::port).collect();
    ports.sort_unstable();
    ports.dedup();
    assert_eq!(ports.len(), servers.len());

    for server in &servers {
        assert!(PortChecker::is_port_open("localhost", server.port()).await?);
    }
    for server in &mut servers {
        server.stop().await?;
    }

    Ok(())
}

#[tokio::test]
#[serial]
async fn test_bare_server_starts_unstarted_and_restarts() -> Result<()> {
    let plan = LaunchPlan::new("127.0.0.1", 0, BOOTSTRAP_SCRIPT);
    let mut server = Server::new(plan, Arc::new(StubLauncher));

    assert_eq!(server.status(), ServerStatus::Stopped);
    assert_eq!(server.port(), 0);

    server.start().await?;
    let first_port = server.port();
    assert_ne!(first_port, 0);
    assert!(PortChecker::is_port_open("127.0.0.1", first_port).await?);

    server.stop().await?;
    assert!(!PortChecker::is_port_open("127.0.0.1", first_port).await?);

    server.start().await?;
    assert_eq!(server.status(), ServerStatus::Started);
    assert!(PortChecker::is_port_open("127.0.0.1", server.port()).await?);

    server.stop().await
}

#[tokio::test]
#[serial]
async fn test_fixed_port_in_use_is_unavailable() -> Result<()> {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = occupied.local_addr()?.port();

    let plan = LaunchPlan::new("127.0.0.1", port, BOOTSTRAP_SCRIPT);
    let mut server = Server::new(plan, Arc::new(StubLauncher));

    assert!(matches!(
        server.start().await,
        Err(Error::PortUnavailable(_))
    ));
    assert_eq!(server.status(), ServerStatus::Stopped);
    assert!(server.pid().is_none());

    Ok(())
}

#[tokio::test]
#[serial]
async fn test_drop_releases_process_and_port() -> Result<()> {
    let project = common::project_with_bootstrap("");
    let server = stub_factory(&project)
        .launch_server(&localhost_3000())
        .await?;
    let port = server.port();

    drop(server);
    assert!(!PortReservation::is_claimed(port));

    let mut closed = false;
    for _ in 0..50 {
        if !PortChecker::is_port_open("localhost", port).await? {
            closed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(closed, "port {} still open after drop", port);

    Ok(())
}

#[tokio::test]
async fn test_missing_bootstrap_spawns_nothing() {
    let project = tempfile::tempdir().unwrap();

    let result = stub_factory(&project)
        .launch_server(&localhost_3000())
        .await;

    assert!(matches!(result, Err(Error::BootstrapNotFound(_))));
}
