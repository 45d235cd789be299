//! Bounded pool of `tokio-rusqlite` connections.
//!
//! Each store operation leases one connection for its own duration. A
//! `tokio_rusqlite::Connection` runs its statements on a dedicated thread, so
//! the pool size is also the number of storage worker threads.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_rusqlite::Connection;
use tracing::debug;

use super::config::StoreConfig;

struct PoolInner {
    path: PathBuf,
    busy_timeout: Duration,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
}

/// Pool of connections to one `SQLite` file.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create an empty pool; connections are opened on first use.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                path: config.sqlite_path.clone(),
                busy_timeout: config.busy_timeout(),
                permits: Arc::new(Semaphore::new(config.pool_size)),
                idle: Mutex::new(Vec::with_capacity(config.pool_size)),
            }),
        }
    }

    /// Lease a connection, waiting while all of them are in use.
    ///
    /// # Errors
    /// Returns an error if a new connection cannot be opened or configured.
    pub async fn acquire(&self) -> Result<PooledConnection, tokio_rusqlite::Error> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| tokio_rusqlite::Error::ConnectionClosed)?;

        let reused = self.inner.idle.lock().ok().and_then(|mut idle| idle.pop());
        let conn = match reused {
            Some(conn) => conn,
            None => self.open().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Number of connections currently idle in the pool.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().map_or(0, |idle| idle.len())
    }

    async fn open(&self) -> Result<Connection, tokio_rusqlite::Error> {
        let conn = Connection::open(&self.inner.path).await?;
        let busy_timeout = self.inner.busy_timeout;
        conn.call(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await?;
        debug!("Opened connection to {}", self.inner.path.display());
        Ok(conn)
    }
}

/// A connection leased from a [`ConnectionPool`], returned on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Run `function` on the leased connection's worker thread.
    ///
    /// # Errors
    /// Returns whatever `function` returns, or an error if the connection is gone.
    pub async fn call<F, R>(&self, function: F) -> Result<R, tokio_rusqlite::Error>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, tokio_rusqlite::Error>
            + Send
            + 'static,
        R: Send + 'static,
    {
        match &self.conn {
            Some(conn) => conn.call(function).await,
            None => Err(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Ok(mut idle) = self.pool.idle.lock() {
                idle.push(conn);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_leases_are_bounded_and_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StoreConfig::new(dir.path().join("pool.db")).with_pool_size(2);
        let pool = ConnectionPool::new(&config);

        let first = pool.acquire().await;
        let second = pool.acquire().await;
        assert!(first.is_ok() && second.is_ok());

        let third = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(third.is_err(), "third lease must wait for a free slot");

        drop(first);
        drop(second);
        assert_eq!(pool.idle_count(), 2);

        let again = pool.acquire().await;
        assert!(again.is_ok());
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_connections_enforce_foreign_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = ConnectionPool::new(&StoreConfig::new(dir.path().join("fk.db")));
        let lease = pool.acquire().await.expect("lease");
        let enabled = lease
            .call(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get::<_, i64>(0))?))
            .await;
        assert!(matches!(enabled, Ok(1)));
    }
}
