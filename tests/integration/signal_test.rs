// tests/integration/signal_test.rs

//! Runs the `watergate` binary and checks that termination signals stop it cleanly.

#![cfg(unix)]

use super::test_helpers::{IO_TIMEOUT, TestClient};
use std::io::Write;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

/// A running server process with a memory backend on a free local port.
struct ServerProcess {
    child: Child,
    addr: SocketAddr,
    _config: NamedTempFile,
}

impl ServerProcess {
    async fn start() -> Self {
        let port = {
            let probe = StdTcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let mut config = NamedTempFile::new().unwrap();
        write!(
            config,
            r#"
log_level = "warn"

[app]
host = "127.0.0.1"
port = {port}

[database]
backend = "memory"

[pool]
min_size = 0
max_size = 2
timeout = "1s"
"#
        )
        .unwrap();

        let child = Command::new(env!("CARGO_BIN_EXE_watergate"))
            .arg("--config")
            .arg(config.path())
            .env_remove("RUST_LOG")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("Failed to start the watergate binary");

        let server = Self {
            child,
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            _config: config,
        };
        server.wait_until_accepting().await;
        server
    }

    async fn wait_until_accepting(&self) {
        tokio::time::timeout(IO_TIMEOUT, async {
            while TcpStream::connect(self.addr).await.is_err() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("Server never started accepting connections");
    }

    fn signal(&self, name: &str) {
        let pid = self.child.id().expect("Server already exited");
        let status = std::process::Command::new("kill")
            .arg(format!("-{name}"))
            .arg(pid.to_string())
            .status()
            .expect("Failed to run kill");
        assert!(status.success(), "kill -{name} {pid} failed");
    }

    async fn wait(mut self) -> ExitStatus {
        tokio::time::timeout(IO_TIMEOUT, self.child.wait())
            .await
            .expect("Server did not exit after the signal")
            .expect("Failed to wait for the server")
    }
}

async fn assert_clean_exit_on(signal: &str) {
    let server = ServerProcess::start().await;
    let addr = server.addr;

    let mut client = TestClient::connect(addr).await;
    assert_eq!(
        client.request(r#"{"event_type":"click","user_id":"u1"}"#).await,
        "OK"
    );

    server.signal(signal);
    let status = server.wait().await;
    assert!(status.success(), "exit status after {signal}: {status:?}");
    assert!(
        TcpStream::connect(addr).await.is_err(),
        "port still accepting after {signal}"
    );
}

#[tokio::test]
async fn test_sigterm_stops_server_with_zero_exit() {
    assert_clean_exit_on("TERM").await;
}

#[tokio::test]
async fn test_sigint_stops_server_with_zero_exit() {
    assert_clean_exit_on("INT").await;
}
