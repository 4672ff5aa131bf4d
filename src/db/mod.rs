pub mod db_pool;
pub mod models;
pub mod project_store;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("project not found: {0}")]
    NotFound(String),

    #[error("background task failed: {0}")]
    Task(String),
}
