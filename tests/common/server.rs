//! Test server management.
//!
//! Spawns and manages customformsd instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    // Held so the config and database outlive the process.
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a test server on a free port with `admin` as bootstrap admin.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with("").await
    }

    /// Spawn a test server, appending `extra` to the generated config.
    pub async fn spawn_with(extra: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let port = free_port()?;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "test.forms"
listen = "127.0.0.1:{}"
metrics = true

[database]
path = "{}"

[auth]
user_header = "x-user-id"
bootstrap_admins = ["admin"]

[limits]
default_page_size = 5
max_page_size = 10
max_comment_length = 50

[retry]
attempts = 2
backoff_ms = 10
{}
"#,
            port,
            data_dir.path().join("test.db").display(),
            extra
        );

        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_customformsd"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let server = Self {
            child,
            port,
            _data_dir: data_dir,
        };

        // Wait for server to start listening
        server.wait_until_ready().await?;

        Ok(server)
    }

    /// Wait until the server is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    /// Base URL of the server.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// A client acting as `user_id`, synced on creation.
    pub async fn login(&self, user_id: &str) -> anyhow::Result<super::client::TestClient> {
        let client = super::client::TestClient::new(&self.url(), Some(user_id));
        client.sync_profile().await?;
        Ok(client)
    }

    /// A client without an identity header.
    pub fn anonymous(&self) -> super::client::TestClient {
        super::client::TestClient::new(&self.url(), None)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
