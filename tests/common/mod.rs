#![allow(dead_code)]

use async_process::Command;
use ss_serve::server::{LaunchPlan, Launcher};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Set in the child to make the test binary act as an HTTP server.
pub const STUB_ADDR_ENV: &str = "SS_SERVE_STUB_ADDR";

/// Marker the framework's login page contains.
pub const LOGIN_FORM_MARKER: &str = "MemberLoginForm_LoginForm";

pub const BOOTSTRAP_SCRIPT: &str = "tests/behat/serve-bootstrap.php";

/// Launches the current test binary filtered to its `stub_http_server`
/// test, which serves HTTP on the planned address.
///
/// Every test file using this launcher must define:
///
/// ```ignore
/// #[test]
/// fn stub_http_server() {
///     common::serve_stub_if_requested();
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StubLauncher;

impl Launcher for StubLauncher {
    fn command(&self, plan: &LaunchPlan, port: u16) -> Command {
        let exe = std::env::current_exe().expect("test binary path");
        let mut command = Command::new(exe);
        command
            .args(["stub_http_server", "--exact", "--nocapture", "--test-threads=1"])
            .env(STUB_ADDR_ENV, format!("{}:{}", plan.host, port));
        command
    }
}

/// Serves forever when running as a stub child; returns otherwise.
pub fn serve_stub_if_requested() {
    let Ok(addr) = std::env::var(STUB_ADDR_ENV) else {
        return;
    };
    let (host, port) = addr.rsplit_once(':').expect("host:port");
    let port: u16 = port.parse().expect("numeric port");

    let listener = TcpListener::bind((host, port)).expect("stub bind");
    for stream in listener.incoming() {
        let Ok(stream) = stream else { continue };
        std::thread::spawn(move || respond(stream));
    }
}

fn respond(mut stream: TcpStream) {
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) => break,
            Ok(_) if header.trim().is_empty() => break,
            Ok(_) => continue,
            Err(_) => return,
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let body = if path == "/Security/login" {
        format!("<form id=\"{}\"></form>", LOGIN_FORM_MARKER)
    } else {
        "<html><body>home</body></html>".to_string()
    };

    let _ = write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
}

/// Project directory with the bootstrap script under `parent`.
pub fn project_with_bootstrap(parent: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    write_bootstrap(dir.path(), parent, "<?php echo 'home';\n");
    dir
}

pub fn write_bootstrap(base: &Path, parent: &str, contents: &str) {
    let path = base.join(format!("{}{}", parent, BOOTSTRAP_SCRIPT));
    std::fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
    std::fs::write(path, contents).expect("write bootstrap");
}

/// Plain HTTP/1.1 GET returning the raw response.
pub async fn http_get(url: &str) -> String {
    let rest = url.strip_prefix("http://").expect("http url");
    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, format!("/{}", path)),
        None => (rest, "/".to_string()),
    };

    let mut stream = tokio::net::TcpStream::connect(authority)
        .await
        .expect("connect");
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, authority
    );
    stream.write_all(request.as_bytes()).await.expect("send request");

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    response
}
