//! `rangelight-store` – the relational store behind the bridge.
//!
//! A single SQLite connection shared by every client task. Queries are plain
//! functions over a [`rusqlite::Connection`] so they can be unit tested
//! synchronously; the async [`Store`] runs them on Tokio's blocking pool,
//! serialized by one mutex and bounded by a timeout.
//!
//! # Modules
//!
//! - [`schema`] – table layout and the sample provisioning script.
//! - [`catalog`] – reference data: sensors, ranges, colours, strips, bindings,
//!   light durations.
//! - [`readings`] – the append-only reading log.
//! - [`status`] – liveness records and singleton switches, written with
//!   atomic upserts.
//!
//! # Example
//!
//! ```rust
//! use rangelight_store::{schema, status, Store};
//! use rangelight_types::SensorStatusUpdate;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let store = Store::open_in_memory().unwrap();
//!     store.execute_batch(schema::DEMO_SEED).await.unwrap();
//!
//!     let update = SensorStatusUpdate { active: None, awake: Some(true) };
//!     let (_, record) = store
//!         .call("update sensor status", move |conn| {
//!             status::upsert_sensor_status(conn, 5, update)
//!         })
//!         .await
//!         .unwrap();
//!     assert!(record.awake && !record.active);
//! }
//! ```

pub mod catalog;
pub mod readings;
pub mod schema;
pub mod status;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rangelight_types::LightError;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Upper bound for a single store call unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// Lifecycle of one `Store::call`, shared with its blocking task.
const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const ABANDONED: u8 = 2;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store connection mutex poisoned")]
    Poisoned,
    #[error("store task failed: {0}")]
    Task(String),
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    /// A lookup miss or rule violation detected inside a query.
    #[error(transparent)]
    Domain(#[from] LightError),
}

impl StoreError {
    /// Convert into the client-facing error for `operation`
    /// (e.g. `"log sensor data"`).
    ///
    /// Driver failures collapse to [`LightError::Store`]; domain errors pass
    /// through unchanged.
    pub fn into_light(self, operation: &str) -> LightError {
        match self {
            StoreError::Domain(e) => e,
            StoreError::Timeout { after, .. } => LightError::Timeout {
                operation: operation.to_string(),
                after_ms: after.as_millis() as u64,
            },
            StoreError::Sqlite(_) | StoreError::Poisoned | StoreError::Task(_) => {
                LightError::Store {
                    operation: operation.to_string(),
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide handle to the database. Clone it cheaply – all clones share
/// the same connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl Store {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        schema::install(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the per-call timeout (builder-style).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `query` against the shared connection on the blocking pool.
    ///
    /// `operation` names the request in client terms and is used for both the
    /// log line and the error text. Calls are serialized: at most one query
    /// runs at a time, so a transaction opened inside `query` is never
    /// interleaved with another writer from this process.
    ///
    /// The timeout bounds the wait for the connection. A query that has not
    /// started when it elapses never runs; one that already holds the
    /// connection is awaited so the reply matches what was committed.
    pub async fn call<T, F>(&self, operation: &'static str, query: F) -> Result<T, LightError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        self.call_raw(operation, query).await.map_err(|e| {
            match &e {
                StoreError::Domain(_) => {}
                StoreError::Timeout { .. } => warn!(operation, error = %e, "store call timed out"),
                _ => error!(operation, error = %e, "store call failed"),
            }
            e.into_light(operation)
        })
    }

    async fn call_raw<T, F>(&self, operation: &'static str, query: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let state = Arc::new(AtomicU8::new(PENDING));
        let claim = Arc::clone(&state);
        let after = self.timeout;
        let mut task = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            if claim
                .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(StoreError::Timeout { operation, after });
            }
            query(&mut guard)
        });
        // Also covers this future being dropped by an outer timeout.
        let abandon = AbandonOnDrop(state);
        let joined = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                if abandon.abandon() {
                    return Err(StoreError::Timeout { operation, after });
                }
                debug!(operation, "query already running at timeout; awaiting its result");
                task.await
            }
        };
        joined.unwrap_or_else(|join| Err(StoreError::Task(join.to_string())))
    }

    /// Run a provisioning script (several `;`-separated statements).
    pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<(), LightError> {
        let sql = sql.into();
        self.call("run provisioning script", move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }
}

/// Marks a call abandoned unless its query has already started.
struct AbandonOnDrop(Arc<AtomicU8>);

impl AbandonOnDrop {
    /// `true` if the query will now never run.
    fn abandon(&self) -> bool {
        match self
            .0
            .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(state) => state == ABANDONED,
        }
    }
}

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.abandon();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
