pub mod config;
pub mod sessions;
pub mod timer;

use std::sync::Arc;

use pomotask_core::{CoreError, SessionCache, SqliteStore};

/// The cache every command shares, backed by `pomotask.db`.
fn open_cache() -> Result<Arc<SessionCache>, CoreError> {
    Ok(Arc::new(SessionCache::new(SqliteStore::open()?)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
