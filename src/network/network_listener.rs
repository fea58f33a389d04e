//! # Server Supervisor
//!
//! Owns the lifecycle of the listening socket. Every accepted WebSocket
//! connection gets its own [`Session`](crate::session_management::Session)
//! task; the supervisor never touches session state.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ Incoming        │───▶│ ServerSupervisor │───▶│ Session (task)  │
//! │ Connections     │    │                  │    │ per connection  │
//! └─────────────────┘    │ - bind / stop    │    └────────┬────────┘
//!                        │ - GET /ws        │             │
//!                        │ - GET /logs      │    ┌────────▼────────┐
//!                        └──────────────────┘    │ Ledger +        │
//!                                                │ ActivityLog     │
//!                                                └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use gestured::configuration::Config;
//! use gestured::gesture::GestureGenerator;
//! use gestured::network::{ServerContext, ServerSupervisor};
//! use gestured::session_management::ActivityLog;
//! use gestured::storage::Ledger;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("127.0.0.1", "8080")?;
//!     let ctx = ServerContext::new(
//!         Ledger::open(&config.database_path).await?,
//!         ActivityLog::new(),
//!         GestureGenerator::new(config.distance_range())?,
//!         config.ack_delay(),
//!     );
//!
//!     let mut supervisor = ServerSupervisor::new(ctx);
//!     supervisor.start(&config.bind_address, &config.bind_port)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     supervisor.stop().await?;
//!     // Sessions outlive the listener until told to close
//!     supervisor
//!         .context()
//!         .sessions
//!         .close_all(Duration::from_secs(5))
//!         .await;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::configuration::config::{parse_bind_address, parse_bind_port};
use crate::error_handling::types::{NetworkError, StartupError};
use crate::network::types::ServerContext;
use crate::web_interface::routes;

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Starts and stops the WebSocket server.
///
/// A supervisor can be started again after it has been stopped. Stopping only
/// closes the listening socket: sessions already running finish on their own,
/// including their pending-request sweep.
pub struct ServerSupervisor {
    ctx: Arc<ServerContext>,
    running: Option<RunningServer>,
}

impl ServerSupervisor {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx, running: None }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address actually bound, useful when the configured port was 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Binds `bind_address:bind_port` and starts accepting connections.
    ///
    /// # Errors
    ///
    /// - `NetworkError::InvalidAddress` if either string fails validation
    /// - `NetworkError::BindFail` if the socket cannot be bound (address in
    ///   use, not a local address, insufficient privileges)
    /// - `NetworkError::AlreadyRunning` if this supervisor is already serving
    ///
    /// A failed attempt is reported once and not retried.
    pub fn start(&mut self, bind_address: &str, bind_port: &str) -> Result<SocketAddr, StartupError> {
        if self.running.is_some() {
            return Err(NetworkError::AlreadyRunning);
        }
        let ip = parse_bind_address(bind_address)
            .map_err(|e| NetworkError::InvalidAddress(e.to_string()))?;
        let port =
            parse_bind_port(bind_port).map_err(|e| NetworkError::InvalidAddress(e.to_string()))?;
        let requested = SocketAddr::new(ip, port);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let filter = routes::routes(self.ctx.clone(), port);
        let (local_addr, server) = warp::serve(filter)
            .try_bind_with_graceful_shutdown(requested, async move {
                let _ = shutdown_rx.await;
            })
            .map_err(|e| {
                error!("[!] Unable to bind {}: {}", requested, e);
                NetworkError::BindFail(format!("{}: {}", requested, e))
            })?;

        let task = tokio::spawn(server);
        info!("Listening for WebSocket clients on ws://{}/ws", local_addr);

        self.running = Some(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            task,
        });
        Ok(local_addr)
    }

    /// Closes the listening socket and waits for the accept loop to finish.
    pub async fn stop(&mut self) -> Result<(), NetworkError> {
        let running = self.running.take().ok_or(NetworkError::NotRunning)?;
        // The receiver only disappears if the server task already ended
        let _ = running.shutdown.send(());
        if let Err(e) = running.task.await {
            error!("[!] Server task on {} ended abnormally: {}", running.local_addr, e);
        }
        info!("Server on {} stopped", running.local_addr);
        Ok(())
    }
}
