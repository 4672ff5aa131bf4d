use duckdb::Connection;
use r2d2::{ManageConnection, Pool};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::db::StoreError;

/// Hands out connections that all share one DuckDB instance. Opening the same file twice would
/// create two independent instances fighting over it, so every pooled connection is a clone of
/// the first.
pub struct DuckDBConnectionManager {
    base: Mutex<Connection>,
}

impl DuckDBConnectionManager {
    pub fn file(path: &Path) -> Result<Self, duckdb::Error> {
        Ok(Self {
            base: Mutex::new(Connection::open(path)?),
        })
    }

    pub fn memory() -> Result<Self, duckdb::Error> {
        Ok(Self {
            base: Mutex::new(Connection::open_in_memory()?),
        })
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let base = self.base.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        base.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Builds a pool over `path`, or over a private in-memory database for ":memory:".
pub fn build_pool(path: &Path, pool_size: u32) -> Result<Pool<DuckDBConnectionManager>, StoreError> {
    let manager = if path == Path::new(":memory:") {
        DuckDBConnectionManager::memory()?
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening project database at {}", path.display());
        DuckDBConnectionManager::file(path)?
    };

    let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;
    Ok(pool)
}
