//! Bounded connection pool, generic over the driver.
//!
//! A semaphore bounds the number of checked-out connections and an idle list
//! holds returned ones. Idle eviction happens lazily on acquire, so the pool
//! never spawns background tasks.

use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::{DbError, Result};

/// Default maximum number of connections.
pub const DEFAULT_MAX_SIZE: usize = 10;
/// Default wait for a connection before `AcquisitionTimeout`.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(2000);
/// Default time the first connection may take before `PoolInit`.
pub const DEFAULT_INIT_FAIL_TIMEOUT: Duration = Duration::from_millis(5000);
/// Default time an idle connection is kept.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(600_000);

/// Pause between connection attempts during pool initialisation.
const INIT_RETRY_INTERVAL: Duration = Duration::from_millis(250);

const DEREF_ERR: &str = "(bug) pooled connection used after release";

// ============================================================================
// Connector
// ============================================================================

/// Opens, probes and closes connections of one driver.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open a new, fully initialised connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection>> + Send;

    /// Round-trip a trivial query; succeeds only if it yields a result set.
    fn ping(&self, conn: &mut Self::Connection) -> impl Future<Output = Result<()>> + Send;

    /// Whether the connection is known to be unusable, including one left
    /// mid-request by a cancelled future.
    fn is_closed(&self, conn: &Self::Connection) -> bool;

    /// Close the connection gracefully. Errors are swallowed.
    fn close(&self, conn: Self::Connection) -> impl Future<Output = ()> + Send;
}

// ============================================================================
// Options and status
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub max_size: usize,
    /// Idle connections kept regardless of `idle_timeout`.
    pub min_idle: usize,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// How long `Pool::new` keeps retrying the first connection.
    pub init_fail_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            min_idle: 1,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            init_fail_timeout: DEFAULT_INIT_FAIL_TIMEOUT,
        }
    }
}

impl PoolOptions {
    pub fn max_size(mut self, max: usize) -> Self {
        self.max_size = max;
        self
    }

    pub fn min_idle(mut self, min: usize) -> Self {
        self.min_idle = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn init_fail_timeout(mut self, timeout: Duration) -> Self {
        self.init_fail_timeout = timeout;
        self
    }
}

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub in_use: usize,
    pub max: usize,
}

impl PoolStatus {
    pub fn is_at_capacity(&self) -> bool {
        self.in_use >= self.max
    }
}

// ============================================================================
// Pool
// ============================================================================

struct IdleConnection<T> {
    conn: T,
    since: Instant,
}

struct PoolInner<C: Connector> {
    connector: C,
    options: PoolOptions,
    /// Oldest at the front, most recently returned at the back.
    idle: Mutex<VecDeque<IdleConnection<C::Connection>>>,
    semaphore: Arc<Semaphore>,
    closed: AtomicBool,
}

pub struct Pool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> Pool<C> {
    /// Create the pool and open its first connection.
    ///
    /// Connection attempts are retried until `init_fail_timeout` has elapsed,
    /// after which the last failure is returned wrapped in `DbError::PoolInit`.
    pub async fn new(connector: C, options: PoolOptions) -> Result<Self> {
        let max_size = if options.max_size == 0 {
            DEFAULT_MAX_SIZE
        } else {
            options.max_size
        };
        let options = PoolOptions { max_size, ..options };

        let started = Instant::now();
        let deadline = started + options.init_fail_timeout;
        let mut attempts = 0u32;

        let first = loop {
            attempts += 1;
            let failure = match tokio::time::timeout_at(deadline, connector.connect()).await {
                Ok(Ok(conn)) => break conn,
                Ok(Err(e)) => e,
                Err(_) => DbError::AcquisitionTimeout(options.init_fail_timeout),
            };

            if Instant::now() + INIT_RETRY_INTERVAL >= deadline {
                warn!(attempts, error = %failure, "pool initialisation failed");
                return Err(DbError::PoolInit {
                    elapsed: started.elapsed(),
                    source: Box::new(failure),
                });
            }
            debug!(attempt = attempts, error = %failure, "initial connection failed, retrying");
            tokio::time::sleep(INIT_RETRY_INTERVAL).await;
        };

        let pool = Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(max_size)),
                connector,
                options,
                idle: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
            }),
        };
        pool.push_idle(first);

        // Best effort: the pool is usable with one connection
        let wanted = pool.inner.options.min_idle.min(max_size);
        for _ in 1..wanted {
            match pool.inner.connector.connect().await {
                Ok(conn) => pool.push_idle(conn),
                Err(e) => {
                    warn!(error = %e, "could not pre-open idle connection");
                    break;
                }
            }
        }

        info!(
            max = max_size,
            idle = pool.inner.idle.lock().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "connection pool created"
        );
        Ok(pool)
    }

    /// Check out a connection, waiting up to `acquire_timeout`.
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        if self.is_closed() {
            return Err(DbError::PoolClosed);
        }

        let timeout = self.inner.options.acquire_timeout;
        match tokio::time::timeout(timeout, self.acquire_inner()).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "connection acquisition timed out");
                Err(DbError::AcquisitionTimeout(timeout))
            }
        }
    }

    async fn acquire_inner(&self) -> Result<PooledConnection<C>> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| DbError::PoolClosed)?;

        let (reused, expired) = self.take_idle();
        for conn in expired {
            self.inner.connector.close(conn).await;
        }

        let conn = match reused {
            Some(conn) => conn,
            None => {
                trace!("opening new pooled connection");
                self.inner.connector.connect().await?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Evict idle connections past `idle_timeout` (keeping `min_idle`) and
    /// pop the most recently returned live one.
    fn take_idle(&self) -> (Option<C::Connection>, Vec<C::Connection>) {
        let options = &self.inner.options;
        let now = Instant::now();
        let mut idle = self.inner.idle.lock();

        let mut expired = Vec::new();
        while idle.len() > options.min_idle
            && idle
                .front()
                .is_some_and(|e| now.duration_since(e.since) >= options.idle_timeout)
        {
            if let Some(entry) = idle.pop_front() {
                expired.push(entry.conn);
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "evicting idle connections");
        }

        let reused = loop {
            match idle.pop_back() {
                Some(entry) if self.inner.connector.is_closed(&entry.conn) => continue,
                Some(entry) => break Some(entry.conn),
                None => break None,
            }
        };
        (reused, expired)
    }

    fn push_idle(&self, conn: C::Connection) {
        self.inner.idle.lock().push_back(IdleConnection {
            conn,
            since: Instant::now(),
        });
    }

    /// Check out a connection, ping it, and return it to the pool.
    pub async fn check_ready(&self) -> Result<()> {
        let mut conn = self.acquire().await?;
        self.inner.connector.ping(&mut *conn).await
    }

    pub fn status(&self) -> PoolStatus {
        let max = self.inner.options.max_size;
        PoolStatus {
            idle: self.inner.idle.lock().len(),
            in_use: max.saturating_sub(self.inner.semaphore.available_permits()),
            max,
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the pool: refuse new checkouts and close every idle connection.
    ///
    /// Connections still checked out are closed when they are released, on a
    /// task spawned onto the current runtime.
    pub async fn close(&self) {
        let drained = {
            let mut idle = self.inner.idle.lock();
            self.inner.closed.store(true, Ordering::Release);
            self.inner.semaphore.close();
            std::mem::take(&mut *idle)
        };

        let count = drained.len();
        for entry in drained {
            self.inner.connector.close(entry.conn).await;
        }
        info!(closed = count, "connection pool closed");
    }
}

// ============================================================================
// Pooled Connection
// ============================================================================

/// A connection checked out from the pool.
///
/// When dropped, the connection goes back to the idle list. An unusable
/// connection is discarded, and one released after the pool closed is closed.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Connection>,
    pool: Arc<PoolInner<C>>,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &C::Connection {
        self.conn.as_ref().expect(DEREF_ERR)
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C::Connection {
        self.conn.as_mut().expect(DEREF_ERR)
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.pool.connector.is_closed(&conn) {
            trace!("discarding unusable connection");
            return;
        }

        {
            let mut idle = self.pool.idle.lock();
            if !self.pool.closed.load(Ordering::Acquire) {
                idle.push_back(IdleConnection {
                    conn,
                    since: Instant::now(),
                });
                return;
            }
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(&self.pool);
                handle.spawn(async move {
                    pool.connector.close(conn).await;
                });
            }
            Err(_) => debug!("no runtime to close connection released after pool close"),
        }
    }
}
