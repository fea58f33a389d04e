pub mod configuration;
pub use configuration::Config;

pub mod controller;
pub use controller::Controller;

pub mod error_handling;

pub mod gesture;

pub mod network;
pub use network::{ServerContext, ServerSupervisor};

pub mod session_management;
pub use session_management::{ActivityLog, Session};

pub mod storage;
pub use storage::Ledger;

pub mod web_interface;
