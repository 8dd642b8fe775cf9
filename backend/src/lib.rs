pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod models;
pub mod pagination;
pub mod policy;
pub mod routes;
pub mod serializers;

use crate::config::AppConfig;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: AppConfig,
}

impl FromRef<AppState> for sqlx::SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;

    use crate::config::{AppConfig, DatabaseConfig, JwtConfig, PaginationConfig};

    pub fn config() -> AppConfig {
        AppConfig {
            server_addr: "127.0.0.1:0".into(),
            database: DatabaseConfig {
                url: "sqlite::memory:".into(),
                max_connections: 1,
                run_migrations: true,
            },
            jwt: JwtConfig {
                secret: "test-secret".into(),
                leeway: 0,
            },
            pagination: PaginationConfig {
                default_limit: None,
                page_size: 10,
            },
        }
    }

    pub async fn memory_pool() -> SqlitePool {
        crate::db::setup_database(&config()).await.unwrap()
    }
}
