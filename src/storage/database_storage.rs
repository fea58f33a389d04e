use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use futures::TryStreamExt;
use log::{debug, info};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};

use crate::error_handling::types::StorageError;
use crate::storage::types::{RequestRecord, RequestStatus};

const REQUEST_COLUMNS: &str = "SELECT r.id AS id, r.client_address AS client_address, r.port AS port,
        r.direction AS direction, r.magnitude AS magnitude, r.status AS status,
        s.description AS description
     FROM requests r LEFT JOIN status s ON s.status_id = r.status";

// Internal row mapping for requests joined with their status description
#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: i64,
    client_address: String,
    port: i64,
    direction: i64,
    magnitude: i64,
    status: Option<i64>,
    description: Option<String>,
}

impl RequestRow {
    fn status_label(&self) -> String {
        match (self.status, &self.description) {
            (None, _) => RequestRecord::PENDING_LABEL.to_string(),
            (Some(_), Some(desc)) => desc.clone(),
            (Some(_), None) => "Unknown".to_string(),
        }
    }

    fn into_record(self) -> Result<RequestRecord, StorageError> {
        let status = match self.status {
            Some(code) => Some(RequestStatus::from_code(code).ok_or_else(|| {
                StorageError::ReadFailed(format!("request {} has unknown status {}", self.id, code))
            })?),
            None => None,
        };
        Ok(RequestRecord {
            id: self.id,
            client_address: self.client_address,
            port: u16::try_from(self.port)
                .map_err(|_| StorageError::ReadFailed(format!("bad port {}", self.port)))?,
            direction: u8::try_from(self.direction).map_err(|_| {
                StorageError::ReadFailed(format!("bad direction {}", self.direction))
            })?,
            magnitude: self.magnitude,
            status,
        })
    }

    fn into_summary(self) -> Result<String, StorageError> {
        let label = self.status_label();
        Ok(self.into_record()?.summary(&label))
    }
}

/// Durable store of clients and issued requests.
///
/// All state lives in SQLite; the handle only holds a connection pool and is
/// cheap to clone. Writes to a single row are serialized by SQLite itself, so
/// the ledger needs no locking of its own.
#[derive(Clone, Debug)]
pub struct Ledger {
    pool: Pool<Sqlite>,
}

impl Ledger {
    const MAX_CONNECTIONS: u32 = 5;
    const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create or open the ledger stored at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            }
        }
        let opts = SqliteConnectOptions::new()
            .filename(path_ref)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Self::BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(Self::MAX_CONNECTIONS)
            .connect_with(opts)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        info!("Ledger opened at {}", path_ref.display());
        Self::with_pool(pool).await
    }

    /// A private in-memory ledger. Every SQLite memory connection is its own
    /// database, so the pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: Pool<Sqlite>) -> Result<Self, StorageError> {
        let ledger = Self { pool };
        ledger.create_schema().await?;
        ledger.seed_statuses().await?;
        Ok(ledger)
    }

    /// Close every pooled connection, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS clients (address TEXT PRIMARY KEY);")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS status (
                status_id INTEGER PRIMARY KEY,
                description TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_address TEXT NOT NULL,
                port INTEGER NOT NULL,
                direction INTEGER NOT NULL,
                magnitude INTEGER NOT NULL,
                status INTEGER,
                FOREIGN KEY(client_address) REFERENCES clients(address),
                FOREIGN KEY(status) REFERENCES status(status_id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS requests_by_client ON requests (client_address, id);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    // Reference rows are only ever inserted, never updated.
    async fn seed_statuses(&self) -> Result<(), StorageError> {
        for status in RequestStatus::ALL {
            sqlx::query("INSERT OR IGNORE INTO status (status_id, description) VALUES (?1, ?2)")
                .bind(status.code())
                .bind(status.description())
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Record a client address. Registering a known address is a no-op.
    pub async fn register_client(&self, address: &str) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO clients (address) VALUES (?1) ON CONFLICT(address) DO NOTHING")
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    pub async fn is_known_client(&self, address: &str) -> Result<bool, StorageError> {
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE address = ?1)")
                .bind(address)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
        Ok(found != 0)
    }

    pub async fn client_count(&self) -> Result<i64, StorageError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    /// Insert a pending request and return its id.
    ///
    /// The insert is a single statement, so the row is either fully written or
    /// absent. Ids come from `AUTOINCREMENT` and are never reused.
    pub async fn create_request(
        &self,
        address: &str,
        port: u16,
        direction: u8,
        magnitude: i64,
    ) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO requests (client_address, port, direction, magnitude, status)
             VALUES (?1, ?2, ?3, ?4, NULL)",
        )
        .bind(address)
        .bind(i64::from(port))
        .bind(i64::from(direction))
        .bind(magnitude)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        let id = result.last_insert_rowid();
        debug!("Request {} created for {}", id, address);
        Ok(id)
    }

    /// Finalize a pending request.
    ///
    /// Returns `false` when the request is unknown or already terminal; in that
    /// case nothing is written.
    pub async fn set_request_status(
        &self,
        request_id: i64,
        status: RequestStatus,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE requests SET status = ?1 WHERE id = ?2 AND status IS NULL")
            .bind(status.code())
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn request(&self, request_id: i64) -> Result<Option<RequestRecord>, StorageError> {
        let row = self.request_row(request_id).await?;
        row.map(RequestRow::into_record).transpose()
    }

    /// Human readable summary of a request, `None` if the id is unknown.
    pub async fn describe_request(&self, request_id: i64) -> Result<Option<String>, StorageError> {
        let row = self.request_row(request_id).await?;
        row.map(RequestRow::into_summary).transpose()
    }

    async fn request_row(&self, request_id: i64) -> Result<Option<RequestRow>, StorageError> {
        let sql = format!("{} WHERE r.id = ?1", REQUEST_COLUMNS);
        sqlx::query_as::<_, RequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    /// Summaries of the requests issued to `address` after its last finalized
    /// one, oldest first.
    ///
    /// Rows are scanned newest first and the scan stops at the first request
    /// that carries a terminal status, whatever that status is.
    pub async fn pending_requests_for(&self, address: &str) -> Result<Vec<String>, StorageError> {
        let sql = format!("{} WHERE r.client_address = ?1 ORDER BY r.id DESC", REQUEST_COLUMNS);
        let mut rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(address)
            .fetch(&self.pool);

        let mut out = Vec::new();
        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?
        {
            if row.status.is_some() {
                break;
            }
            out.push(row.into_summary()?);
        }
        out.reverse();
        Ok(out)
    }

    pub async fn status_description(&self, code: i64) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar("SELECT description FROM status WHERE status_id = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }
}
