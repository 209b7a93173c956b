use crate::security::audit::{AuditLogger, PgAuditStore};
use crate::shared::config::AppConfig;
use crate::shared::utils::DbPool;

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub audit: AuditLogger<PgAuditStore>,
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig) -> Self {
        let audit = AuditLogger::new(PgAuditStore::new(conn.clone()));
        Self {
            conn,
            config,
            audit,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conn", &"DbPool")
            .field("config", &self.config)
            .finish()
    }
}
