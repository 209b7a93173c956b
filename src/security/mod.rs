pub mod access;
pub mod audit;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::directory::Principal;
use crate::shared::error::ApiError;
use crate::shared::schema::security_logs;
use crate::shared::state::AppState;

use self::audit::SecurityLog;

#[derive(Debug, Deserialize)]
pub struct SecurityLogQuery {
    pub event_type: Option<String>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Read-only view of the security log, newest entries first.
pub async fn list_security_logs(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<SecurityLogQuery>,
) -> Result<Json<Vec<SecurityLog>>, ApiError> {
    access::require_view_security_logs(&principal)?;

    let mut conn = state.conn.get()?;
    let limit = query.limit.unwrap_or(100);
    let offset = query.offset.unwrap_or(0);

    let mut q = security_logs::table.into_boxed();

    if let Some(event_type) = query.event_type {
        q = q.filter(security_logs::event_type.eq(event_type));
    }

    if let Some(user_id) = query.user_id {
        q = q.filter(security_logs::user_id.eq(user_id));
    }

    let entries: Vec<SecurityLog> = q
        .order(security_logs::timestamp.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    Ok(Json(entries))
}

pub fn configure_security_log_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/security-logs", get(list_security_logs))
}
