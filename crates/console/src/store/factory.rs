use crate::store::{DatabaseConfig, DatabaseType, MemoryStore, SqliteStore, Store};
use std::sync::Arc;

pub async fn create_store(config: &DatabaseConfig) -> crate::Result<Arc<dyn Store>> {
    config.validate().map_err(crate::Error::Config)?;

    match config.db_type {
        DatabaseType::Sqlite => {
            let path = config
                .sqlite_path
                .as_ref()
                .ok_or_else(|| crate::Error::Config("SQLite path not configured".into()))?;
            let path_str = path
                .to_str()
                .ok_or_else(|| crate::Error::Config(format!("SQLite path is not valid UTF-8: {}", path.display())))?;

            if path_str != ":memory:" {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
            }

            Ok(Arc::new(SqliteStore::new(path_str, config.max_connections).await?))
        }
        DatabaseType::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
