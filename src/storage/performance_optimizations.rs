//! SQLite tuning presets for the wallet database
//!
//! The secrets table must survive crashes, so every preset except
//! `ultra_fast` keeps `synchronous` at NORMAL or above.

#[cfg(feature = "storage")]
use tokio_rusqlite::Connection;

#[cfg(feature = "storage")]
use crate::errors::{WalletError, WalletResult};

/// PRAGMA settings applied when a wallet database is opened
#[cfg(feature = "storage")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlitePerformanceConfig {
    /// Write-ahead logging; ignored by in-memory databases
    pub enable_wal_mode: bool,
    /// 0=OFF, 1=NORMAL, 2=FULL
    pub synchronous_mode: u8,
    pub cache_size_kb: i32,
    /// 0=default, 1=file, 2=memory
    pub temp_store: u8,
    pub busy_timeout_ms: u32,
    pub foreign_keys: bool,
}

#[cfg(feature = "storage")]
impl Default for SqlitePerformanceConfig {
    fn default() -> Self {
        Self::production_optimized()
    }
}

#[cfg(feature = "storage")]
impl SqlitePerformanceConfig {
    /// FULL synchronous writes
    pub fn conservative() -> Self {
        Self {
            enable_wal_mode: true,
            synchronous_mode: 2,
            cache_size_kb: 16_000,
            temp_store: 2,
            busy_timeout_ms: 5000,
            foreign_keys: true,
        }
    }

    pub fn production_optimized() -> Self {
        Self {
            enable_wal_mode: true,
            synchronous_mode: 1,
            cache_size_kb: 32_000,
            temp_store: 2,
            busy_timeout_ms: 8000,
            foreign_keys: true,
        }
    }

    /// Testing only: synchronous=OFF loses data on power failure
    pub fn ultra_fast() -> Self {
        Self {
            enable_wal_mode: false,
            synchronous_mode: 0,
            cache_size_kb: 64_000,
            temp_store: 2,
            busy_timeout_ms: 1000,
            foreign_keys: true,
        }
    }

    pub fn is_production_safe(&self) -> bool {
        self.synchronous_mode >= 1
    }

    /// Apply every PRAGMA in one round-trip to the connection thread
    pub async fn apply_to_connection(&self, connection: &Connection) -> WalletResult<()> {
        let config = self.clone();
        connection
            .call(move |conn| {
                if config.enable_wal_mode {
                    // Returns the resulting mode; in-memory databases report "memory"
                    conn.query_row("PRAGMA journal_mode = WAL", [], |row| {
                        row.get::<_, String>(0)
                    })?;
                }
                conn.pragma_update(None, "synchronous", config.synchronous_mode)?;
                conn.pragma_update(None, "cache_size", -config.cache_size_kb)?;
                conn.pragma_update(None, "temp_store", config.temp_store)?;
                conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
                conn.busy_timeout(std::time::Duration::from_millis(
                    config.busy_timeout_ms as u64,
                ))?;
                Ok(())
            })
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to apply PRAGMA settings: {e}")))
    }
}

#[cfg(all(test, feature = "storage"))]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(SqlitePerformanceConfig::conservative().is_production_safe());
        assert!(SqlitePerformanceConfig::production_optimized().is_production_safe());
        assert!(!SqlitePerformanceConfig::ultra_fast().is_production_safe());
        assert_eq!(
            SqlitePerformanceConfig::default(),
            SqlitePerformanceConfig::production_optimized()
        );
    }

    #[tokio::test]
    async fn test_apply_to_in_memory_connection() -> Result<(), Box<dyn std::error::Error>> {
        let connection = Connection::open_in_memory().await?;
        SqlitePerformanceConfig::conservative()
            .apply_to_connection(&connection)
            .await?;

        let synchronous: i64 = connection
            .call(|conn| Ok(conn.query_row("PRAGMA synchronous", [], |row| row.get(0))?))
            .await?;
        assert_eq!(synchronous, 2);
        Ok(())
    }
}
