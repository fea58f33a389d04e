//! Storage subsystem
//!
//! The ledger is the durable record of every client that ever connected and
//! of every instruction issued to one, together with its outcome.
//!
//! Components:
//! - `database_storage`: the SQLite-backed [`Ledger`] built on `sqlx`.
//! - `types`: the request status enumeration and row-level records.

pub mod database_storage;
pub mod types;

pub use database_storage::Ledger;
pub use types::{RequestRecord, RequestStatus};
