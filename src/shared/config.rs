use anyhow::{Context, Result};

/// Runtime configuration, loaded from the environment (with `.env` support
/// via dotenvy in `main`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let server_host =
            std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("SERVER_PORT must be a valid port number")?;
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let token_ttl_minutes = std::env::var("JWT_TTL_MINUTES")
            .unwrap_or_else(|_| "480".to_string())
            .parse()
            .context("JWT_TTL_MINUTES must be a number of minutes")?;

        Ok(Self {
            server_host,
            server_port,
            database_url,
            jwt_secret,
            token_ttl_minutes,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
