use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// Signing secret used when none is configured. Anyone can mint tokens for it.
pub const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    /// Limit applied to limit/offset listings when the request has none.
    /// Without one those listings are returned unpaginated.
    pub default_limit: Option<i64>,
    pub page_size: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server_addr: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub pagination: PaginationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Config::builder()
            .set_default("server_addr", "0.0.0.0:8000")?
            .set_default("database.url", "sqlite://blog.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.run_migrations", true)?
            .set_default("jwt.secret", DEV_JWT_SECRET)?
            .set_default("jwt.leeway", 0)?
            .set_default("pagination.page_size", 10)?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("BLOG").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt.secret == DEV_JWT_SECRET
    }
}
