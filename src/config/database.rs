//! Database configuration module for the local cache.
//!
//! Opens the `SQLite` database that backs the durable key-value cache and creates
//! its table from the entity definition, so the schema always matches the Rust
//! struct without hand-written SQL.

use std::path::Path;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

use crate::entities::KvEntry;
use crate::errors::Result;

/// Default location of the local cache.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/grocesplit.sqlite?mode=rwc";

/// Gets the database URL from `DATABASE_URL` or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Creates the parent directory of a file-backed `SQLite` URL if it is missing.
fn ensure_parent_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(':') {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Connects to the cache database and makes sure its table exists.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_parent_dir(database_url)?;
    debug!("Connecting to local cache at {}", database_url);
    let db = Database::connect(database_url).await?;
    create_tables(&db).await?;
    info!("Local cache ready");
    Ok(db)
}

/// Creates the key-value table from the entity definition if it is not there yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut kv_table = schema.create_table_from_entity(KvEntry);
    kv_table.if_not_exists();

    db.execute(builder.build(&kv_table)).await?;

    Ok(())
}
