use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::gesture::GestureGenerator;
use crate::network::{ServerContext, ServerSupervisor};
use crate::session_management::ActivityLog;
use crate::storage::Ledger;

/// Process-level orchestration: owns the configuration and the supervisor
/// and ties the server lifetime to a shutdown signal.
pub struct Controller {
    pub config: Config,
    supervisor: ServerSupervisor,
}

impl Controller {
    /// How long open sessions get to run their sweep on shutdown.
    pub const SESSION_GRACE: Duration = Duration::from_secs(5);

    /// Opens the configured ledger and prepares a supervisor for it.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        let generator = GestureGenerator::new(config.distance_range())?;

        info!("[+] Opening ledger at {}", config.database_path.display());
        let ledger = Ledger::open(&config.database_path).await.map_err(|e| {
            error!("[!] Unable to open the ledger: {}", e);
            ControllerError::StorageError(e)
        })?;

        let ctx = ServerContext::new(ledger, ActivityLog::new(), generator, config.ack_delay());
        Ok(Self::with_context(config, ctx))
    }

    pub fn with_context(config: Config, ctx: Arc<ServerContext>) -> Self {
        Self {
            config,
            supervisor: ServerSupervisor::new(ctx),
        }
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.supervisor.context().activity_log
    }

    pub fn start(&mut self) -> Result<SocketAddr, ControllerError> {
        let addr = self
            .supervisor
            .start(&self.config.bind_address, &self.config.bind_port)
            .map_err(|e| {
                error!("[!] Server startup failed: {}", e);
                ControllerError::NetworkError(e)
            })?;
        Ok(addr)
    }

    /// Serves until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("[!] Unable to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Starts the server, waits for `signal`, then stops it.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<(), ControllerError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.start()?;
        info!("[+] Serving on {}", addr);
        signal.await;
        info!("[+] Shutdown requested");
        self.shutdown().await
    }

    /// Stops accepting connections, then closes open sessions so each one
    /// sweeps its pending requests before the process exits.
    pub async fn shutdown(&mut self) -> Result<(), ControllerError> {
        if self.supervisor.is_running() {
            self.supervisor.stop().await?;
        }
        let closed = self
            .supervisor
            .context()
            .sessions
            .close_all(Self::SESSION_GRACE)
            .await;
        if closed > 0 {
            info!("[+] {} session(s) closed", closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn controller(port: &str) -> Controller {
        let config = Config::new("127.0.0.1", port).unwrap();
        let ctx = ServerContext::new(
            Ledger::in_memory().await.unwrap(),
            ActivityLog::new(),
            GestureGenerator::new(config.distance_range()).unwrap(),
            config.ack_delay(),
        );
        Controller::with_context(config, ctx)
    }

    #[tokio::test]
    async fn test_run_until_starts_and_stops() {
        let mut controller = controller("0").await;
        controller
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(controller.activity_log().is_empty());
        // Shutting down twice is harmless
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_startup_failure_is_reported() {
        let mut holder = controller("0").await;
        let addr = holder.start().unwrap();

        let mut controller = controller(&addr.port().to_string()).await;
        let err = controller.run_until(async {}).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::NetworkError(NetworkError::BindFail(_))
        ));

        holder.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_new_opens_file_ledger() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::new("127.0.0.1", "0").unwrap();
        config.database_path = dir.path().join("gestured.sqlite3");

        let controller = Controller::new(config).await.unwrap();
        assert!(controller.activity_log().is_empty());
        assert!(dir.path().join("gestured.sqlite3").exists());
    }

    #[tokio::test]
    async fn test_new_rejects_inverted_distance_range() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::new("127.0.0.1", "0").unwrap();
        config.database_path = dir.path().join("gestured.sqlite3");
        config.min_distance = 400;

        let err = Controller::new(config).await.err().unwrap();
        assert!(matches!(
            err,
            ControllerError::ConfigurationError(ConfigError::NotInRange(_))
        ));
        assert!(!dir.path().join("gestured.sqlite3").exists());
    }

    #[tokio::test]
    async fn test_shutdown_sweeps_open_sessions() {
        let mut controller = controller("0").await;
        let addr = controller.start().unwrap();
        let url = format!("ws://{}/ws", addr);
        let (mut client, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        let first = client.next().await.unwrap().unwrap();
        assert!(first.is_text());

        controller.shutdown().await.unwrap();

        assert_eq!(controller.supervisor.context().sessions.active(), 0);
        let log = controller.activity_log().snapshot();
        assert_eq!(log.len(), 1);
        assert!(log[0].text.starts_with("Request ID: 1:"));

        // The server closed its side of the socket
        match client.next().await {
            Some(Ok(message)) => assert!(message.is_close()),
            Some(Err(_)) | None => {}
        }
    }
}
