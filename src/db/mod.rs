//! Database layer: SQLite-backed store for tasks and items.

pub mod items;
pub mod live;
pub mod tasks;

use anyhow::Result;
use live::LiveRegistry;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
///
/// Cloning is cheap; clones share the connection and the live query registry.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    live: Arc<LiveRegistry>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            live: Arc::new(LiveRegistry::default()),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.lock();
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock();
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    ///
    /// Live queries are not refreshed; mutations go through [`Database::write`].
    pub(crate) fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.lock();
        f(&mut conn)
    }

    /// Run a mutation and, once it succeeded, push change sets to live queries.
    ///
    /// A successful mutation advances [`Database::revision`].
    ///
    /// The connection lock is released before observers run, so their
    /// callbacks may read from the database.
    pub fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let result = self.with_conn_mut(|conn| {
            let result = f(conn)?;
            self.live.bump();
            Ok(result)
        })?;
        self.live.refresh(self);
        Ok(result)
    }
}

impl Database {
    /// Number of writes committed through this handle and its clones.
    pub fn revision(&self) -> u64 {
        self.live.revision()
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
