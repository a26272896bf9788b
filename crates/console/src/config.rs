use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::store::{DatabaseConfig, DatabaseType};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Config {
            database: DatabaseConfig {
                db_type: parse_database_type(
                    &std::env::var("DATABASE_TYPE").unwrap_or_else(|_| "sqlite".to_string()),
                )?,
                sqlite_path: std::env::var("SQLITE_PATH")
                    .map(PathBuf::from)
                    .ok()
                    .or_else(|| Some(PathBuf::from("data/swim-console.db"))),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            },
        };

        config.database.validate().map_err(crate::Error::Config)?;

        Ok(config)
    }
}

fn parse_database_type(value: &str) -> crate::Result<DatabaseType> {
    match value.trim().to_lowercase().as_str() {
        "sqlite" => Ok(DatabaseType::Sqlite),
        "memory" => Ok(DatabaseType::Memory),
        other => Err(crate::Error::Config(format!(
            "Unsupported DATABASE_TYPE: {} (expected sqlite or memory)",
            other
        ))),
    }
}
