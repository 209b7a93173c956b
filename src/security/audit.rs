use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

use crate::directory::Principal;
use crate::shared::schema::security_logs;
use crate::shared::utils::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityEventKind {
    Login,
    FailedAttempt,
    DataAccess,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::FailedAttempt => "Failed Attempt",
            Self::DataAccess => "Data Access",
        }
    }
}

/// A security-relevant event awaiting persistence. The timestamp is assigned
/// by the store at write time.
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    pub user_id: Option<Uuid>,
    pub kind: SecurityEventKind,
    pub ip_address: Option<String>,
    pub description: String,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind, description: impl Into<String>) -> Self {
        Self {
            user_id: None,
            kind,
            ip_address: None,
            description: description.into(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize)]
#[diesel(table_name = security_logs)]
pub struct SecurityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
}

impl SecurityLog {
    fn from_event(event: SecurityEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            event_type: event.kind.as_str().to_string(),
            ip_address: event.ip_address,
            timestamp: Utc::now(),
            description: Some(event.description),
        }
    }
}

pub trait AuditStore: Send + Sync {
    fn store(
        &self,
        event: SecurityEvent,
    ) -> impl std::future::Future<Output = Result<SecurityLog>> + Send;
}

/// Append-only security log backed by the `security_logs` table.
#[derive(Clone)]
pub struct PgAuditStore {
    pool: DbPool,
}

impl PgAuditStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AuditStore for PgAuditStore {
    async fn store(&self, event: SecurityEvent) -> Result<SecurityLog> {
        let entry = SecurityLog::from_event(event);

        let mut conn = self.pool.get()?;
        diesel::insert_into(security_logs::table)
            .values(&entry)
            .execute(&mut conn)?;

        Ok(entry)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditStore {
    entries: Arc<RwLock<Vec<SecurityLog>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<SecurityLog> {
        self.entries.read().await.clone()
    }
}

impl AuditStore for InMemoryAuditStore {
    async fn store(&self, event: SecurityEvent) -> Result<SecurityLog> {
        let entry = SecurityLog::from_event(event);
        self.entries.write().await.push(entry.clone());
        Ok(entry)
    }
}

/// Emits security events synchronously as part of the triggering operation.
/// A storage failure is logged and swallowed: the read path never fails
/// because the audit log is slow or down, and emission is never skipped.
#[derive(Clone)]
pub struct AuditLogger<S: AuditStore> {
    store: S,
}

impl<S: AuditStore> AuditLogger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn record(&self, event: SecurityEvent) {
        if let Err(e) = self.store.store(event).await {
            error!("failed to persist security log entry: {e}");
        }
    }

    pub async fn log_login_success(&self, user_id: Uuid, username: &str, ip: Option<String>) {
        let event = SecurityEvent::new(
            SecurityEventKind::Login,
            format!("User {username} logged in successfully."),
        )
        .with_user(user_id)
        .with_ip(ip);

        self.record(event).await;
    }

    pub async fn log_login_failure(&self, username: &str, ip: Option<String>) {
        let event = SecurityEvent::new(
            SecurityEventKind::FailedAttempt,
            format!("Login failed for username: {username}"),
        )
        .with_ip(ip);

        self.record(event).await;
    }

    pub async fn log_customer_viewed(
        &self,
        viewer: &Principal,
        customer_id: Uuid,
        customer_name: &str,
        ip: Option<String>,
    ) {
        let event = SecurityEvent::new(
            SecurityEventKind::DataAccess,
            format!("Customer record viewed: {customer_name} ({customer_id})"),
        )
        .with_user(viewer.id)
        .with_ip(ip);

        self.record(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Role;

    #[test]
    fn test_event_kind_labels_match_log_schema() {
        assert_eq!(SecurityEventKind::Login.as_str(), "Login");
        assert_eq!(SecurityEventKind::FailedAttempt.as_str(), "Failed Attempt");
        assert_eq!(SecurityEventKind::DataAccess.as_str(), "Data Access");
    }

    #[tokio::test]
    async fn test_in_memory_store_appends() {
        let store = InMemoryAuditStore::new();
        let event = SecurityEvent::new(SecurityEventKind::Login, "hello")
            .with_ip(Some("198.51.100.7".to_string()));

        store.store(event).await.expect("store failed");

        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "Login");
        assert_eq!(entries[0].ip_address.as_deref(), Some("198.51.100.7"));
    }

    #[tokio::test]
    async fn test_customer_view_emits_exactly_one_data_access_entry() {
        let store = InMemoryAuditStore::new();
        let logger = AuditLogger::new(store.clone());
        let viewer = Principal::new(Uuid::new_v4(), "agent1", Role::Agent);
        let customer_id = Uuid::new_v4();

        logger
            .log_customer_viewed(&viewer, customer_id, "Jane Doe", None)
            .await;

        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "Data Access");
        assert_eq!(entries[0].user_id, Some(viewer.id));
        let description = entries[0].description.clone().unwrap_or_default();
        assert!(description.contains("Jane Doe"));
        assert!(description.contains(&customer_id.to_string()));
    }

    #[tokio::test]
    async fn test_login_failure_has_no_user_reference() {
        let store = InMemoryAuditStore::new();
        let logger = AuditLogger::new(store.clone());

        logger
            .log_login_failure("ghost", Some("192.0.2.1".to_string()))
            .await;

        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "Failed Attempt");
        assert_eq!(entries[0].user_id, None);
        assert!(entries[0]
            .description
            .clone()
            .unwrap_or_default()
            .contains("ghost"));
    }
}
