//! Pool lifecycle and readiness polling.
//!
//! Application startup creates one [`PoolManager`], waits for the database
//! with [`PoolManager::await_ready`], then hands [`DataSource`] clones to
//! whatever needs connections.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{redact, Driver, PoolConfig};
use crate::error::{DbError, Result};
use crate::executor::DataSource;

/// Failed probes between two warnings while waiting for readiness.
const WARN_EVERY: u32 = 30;

pub struct PoolManager {
    data_source: DataSource,
    driver: Driver,
    poll_interval: Duration,
}

impl PoolManager {
    /// Create the pool described by `config`.
    ///
    /// Fails with `DriverLoad` for an unknown driver, `ConfigError` for a
    /// URI that does not belong to the driver, and `PoolInit` when no
    /// connection could be opened within the initialisation window.
    pub async fn new(config: PoolConfig) -> Result<Self> {
        let driver = config.validate()?;
        let data_source = DataSource::connect(&config).await?;
        info!(
            driver = %driver,
            uri = %redact(&config.connection_uri),
            max_pool_size = data_source.status().max,
            "pool manager started"
        );

        Ok(Self {
            data_source,
            driver,
            poll_interval: config.ready_poll_interval_duration(),
        })
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// Whether a connection can be acquired and answers `SELECT 1`.
    ///
    /// Never fails; use [`PoolManager::check_ready`] to see why a probe did.
    pub async fn is_ready(&self) -> bool {
        self.check_ready().await.is_ok()
    }

    pub async fn check_ready(&self) -> Result<()> {
        self.data_source.check_ready().await
    }

    /// Wait until the database is ready, probing once per poll interval.
    ///
    /// There is no attempt limit. Wrap the call in `tokio::time::timeout` or
    /// use [`PoolManager::await_ready_bounded`] to give up eventually.
    pub async fn await_ready(&self) {
        // Unbounded polling only returns on success
        let _ = poll_until_ready(move || self.check_ready(), self.poll_interval, None).await;
    }

    /// Like [`PoolManager::await_ready`], but fails with `NotReady` after
    /// `max_attempts` failed probes.
    pub async fn await_ready_bounded(&self, max_attempts: u32) -> Result<()> {
        poll_until_ready(move || self.check_ready(), self.poll_interval, Some(max_attempts))
            .await
            .map(|_| ())
    }

    /// Handle for running statements. Clones share this manager's pool.
    pub fn data_source(&self) -> DataSource {
        self.data_source.clone()
    }

    /// Close every pooled connection.
    pub async fn close(self) {
        self.data_source.close().await;
        info!(driver = %self.driver, "pool manager closed");
    }
}

/// Run `probe` until it succeeds, sleeping `interval` after each failure.
///
/// Returns the number of probes made.
async fn poll_until_ready<F, Fut>(mut probe: F, interval: Duration, max_attempts: Option<u32>) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!(interval_ms = interval.as_millis() as u64, "awaiting database readiness");
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match probe().await {
            Ok(()) => {
                info!(attempts, "database ready");
                return Ok(attempts);
            }
            Err(e) => {
                debug!(attempt = attempts, error = %e, "readiness probe failed");
                if attempts % WARN_EVERY == 0 {
                    warn!(attempts, error = %e, "database still not ready");
                }
                if max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(DbError::NotReady { attempts });
                }
            }
        }
        tokio::time::sleep(interval).await;
    }
}
