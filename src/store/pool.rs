use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: usize,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

struct PoolState {
    idle: Vec<Connection>,
    open: usize,
}

pub struct ConnectionPool {
    db_path: PathBuf,
    config: PoolConfig,
    state: Mutex<PoolState>,
    released: Condvar,
}

pub struct PooledConnection<'pool> {
    pool: &'pool ConnectionPool,
    connection: Option<Connection>,
}

impl ConnectionPool {
    pub fn new(db_path: &Path, config: PoolConfig) -> Self {
        let max_size = config.max_size.max(1);
        Self {
            db_path: db_path.to_path_buf(),
            config: PoolConfig { max_size, ..config },
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(max_size),
                open: 0,
            }),
            released: Condvar::new(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    pub fn acquire(&self) -> Result<PooledConnection<'_>, StorageError> {
        let started = Instant::now();
        let deadline = started + self.config.acquire_timeout;
        let mut state = self.lock_state()?;

        loop {
            if let Some(connection) = state.idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    connection: Some(connection),
                });
            }

            if state.open < self.config.max_size {
                state.open += 1;
                drop(state);
                return match self.open_connection() {
                    Ok(connection) => Ok(PooledConnection {
                        pool: self,
                        connection: Some(connection),
                    }),
                    Err(err) => {
                        let mut state = self.lock_state()?;
                        state.open -= 1;
                        drop(state);
                        self.released.notify_one();
                        Err(err)
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StorageError::PoolTimeout {
                    waited_ms: started.elapsed().as_millis(),
                });
            }

            let (next, _) = self
                .released
                .wait_timeout(state, deadline - now)
                .map_err(|_| StorageError::PoolPoisoned)?;
            state = next;
        }
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError>,
    {
        let mut connection = self.acquire()?;
        f(&mut connection)
    }

    pub fn open_count(&self) -> usize {
        self.lock_state().map(|state| state.open).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn idle_count(&self) -> usize {
        self.lock_state().map(|state| state.idle.len()).unwrap_or(0)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, PoolState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::PoolPoisoned)
    }

    fn open_connection(&self) -> Result<Connection, StorageError> {
        let connection = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StorageError::Open {
            path: self.db_path.display().to_string(),
            source,
        })?;

        connection.busy_timeout(self.config.busy_timeout)?;
        connection.pragma_update(None, "journal_mode", "WAL")?;
        connection.pragma_update(None, "synchronous", "NORMAL")?;

        debug!(path = %self.db_path.display(), "opened pooled connection");
        Ok(connection)
    }

    fn release(&self, connection: Connection) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.idle.push(connection);
        drop(state);
        self.released.notify_one();
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::store::temp_db_path;

    fn small_pool(label: &str, max_size: usize, timeout_ms: u64) -> ConnectionPool {
        ConnectionPool::new(
            &temp_db_path(label),
            PoolConfig {
                max_size,
                acquire_timeout: Duration::from_millis(timeout_ms),
                busy_timeout: Duration::from_millis(100),
            },
        )
    }

    #[test]
    fn connections_are_reused_after_release() {
        let pool = small_pool("pool-reuse", 2, 100);
        {
            let connection = pool.acquire().expect("first acquire");
            connection.execute_batch("SELECT 1").expect("query");
        }
        {
            let _connection = pool.acquire().expect("second acquire");
            assert_eq!(pool.open_count(), 1);
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn exhausted_pool_times_out() {
        let pool = small_pool("pool-exhausted", 1, 50);
        let _held = pool.acquire().expect("first acquire");
        match pool.acquire() {
            Err(StorageError::PoolTimeout { .. }) => {}
            Err(other) => panic!("expected pool timeout, got {other}"),
            Ok(_) => panic!("expected pool timeout, got a connection"),
        }
    }

    #[test]
    fn with_conn_releases_on_error() {
        let pool = small_pool("pool-error", 1, 50);
        let result: Result<(), StorageError> = pool.with_conn(|connection| {
            connection.execute_batch("SELECT * FROM missing_table")?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(pool.acquire().is_ok(), "connection should be back in the pool");
    }

    #[test]
    fn waiting_caller_receives_released_connection() {
        let pool = Arc::new(small_pool("pool-wait", 1, 2000));
        let held = pool.acquire().expect("first acquire");

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.with_conn(|_| Ok(())).is_ok())
        };

        thread::sleep(Duration::from_millis(50));
        drop(held);
        assert!(waiter.join().expect("waiter thread"));
    }
}
