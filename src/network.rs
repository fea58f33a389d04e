//! Network subsystem: the wire protocol, the shared server context and the
//! supervisor owning the listening socket.

pub mod network_listener;
pub mod protocol;
#[cfg(test)]
mod tests;
pub mod types;

pub use network_listener::ServerSupervisor;
pub use types::ServerContext;
