//! Session management core module.
//!
//! One [`Session`] drives one client connection through the
//! instruction/acknowledgment cycle. Sessions share nothing but the ledger
//! and the [`ActivityLog`] they append to.

pub mod activity_log;
pub mod session;

pub use activity_log::{ActivityEntry, ActivityLog};
pub use session::{Session, SessionOutcome};

/// Lifecycle of a session.
///
/// - `Opening`: the client is being registered and sent its first instruction.
/// - `AwaitingAck`: exactly one instruction is outstanding.
/// - `Closing`: the connection is gone or the server is closing; pending
///   requests are being swept.
/// - `Closed`: the sweep is done and the connection released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    AwaitingAck,
    Closing,
    Closed,
}
