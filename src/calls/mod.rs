use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::directory::Principal;
use crate::shared::error::ApiError;
use crate::shared::schema::{calls, customers};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "Inbound",
            Self::Outbound => "Outbound",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ApiError> {
        match s {
            "Inbound" => Ok(Self::Inbound),
            "Outbound" => Ok(Self::Outbound),
            other => Err(ApiError::validation(format!(
                "call_type must be Inbound or Outbound, got {other}"
            ))),
        }
    }
}

/// A logged call. Immutable after creation apart from setting the end time.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = calls)]
pub struct Call {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub call_start_time: DateTime<Utc>,
    pub call_end_time: Option<DateTime<Utc>>,
    pub call_type: String,
    pub recording_path: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    pub customer_id: Uuid,
    pub call_type: String,
    pub call_start_time: Option<DateTime<Utc>>,
    pub recording_path: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EndCallRequest {
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    pub customer_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_calls(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Query(query): Query<ListCallsQuery>,
) -> Result<Json<Vec<Call>>, ApiError> {
    let mut conn = state.conn.get()?;
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let mut q = calls::table.into_boxed();

    if let Some(customer_id) = query.customer_id {
        q = q.filter(calls::customer_id.eq(customer_id));
    }

    if let Some(agent_id) = query.agent_id {
        q = q.filter(calls::agent_id.eq(agent_id));
    }

    let rows: Vec<Call> = q
        .order(calls::call_start_time.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    Ok(Json(rows))
}

pub async fn create_call(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateCallRequest>,
) -> Result<Json<Call>, ApiError> {
    let direction = CallDirection::parse(&req.call_type)?;

    let mut conn = state.conn.get()?;

    let customer_exists: bool = diesel::select(diesel::dsl::exists(
        customers::table.filter(customers::id.eq(req.customer_id)),
    ))
    .get_result(&mut conn)?;
    if !customer_exists {
        return Err(ApiError::not_found("Customer not found"));
    }

    let call = Call {
        id: Uuid::new_v4(),
        customer_id: req.customer_id,
        // A manually logged call belongs to the agent logging it.
        agent_id: Some(principal.id),
        call_start_time: req.call_start_time.unwrap_or_else(Utc::now),
        call_end_time: None,
        call_type: direction.as_str().to_string(),
        recording_path: req.recording_path,
        notes: req.notes,
    };

    diesel::insert_into(calls::table)
        .values(&call)
        .execute(&mut conn)?;

    Ok(Json(call))
}

pub async fn get_call(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Call>, ApiError> {
    let mut conn = state.conn.get()?;

    let call: Call = calls::table
        .filter(calls::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Call not found"))?;

    Ok(Json(call))
}

/// Set the end time on an open call. Calls are otherwise immutable, so a
/// second attempt conflicts instead of silently rewriting history.
pub async fn end_call(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<EndCallRequest>,
) -> Result<Json<Call>, ApiError> {
    let mut conn = state.conn.get()?;

    let call: Call = calls::table
        .filter(calls::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Call not found"))?;

    if call.call_end_time.is_some() {
        return Err(ApiError::Conflict("Call has already ended".to_string()));
    }

    let ended_at = req.ended_at.unwrap_or_else(Utc::now);
    diesel::update(calls::table.filter(calls::id.eq(id)))
        .set(calls::call_end_time.eq(Some(ended_at)))
        .execute(&mut conn)?;

    let updated: Call = calls::table.filter(calls::id.eq(id)).first(&mut conn)?;

    Ok(Json(updated))
}

pub async fn delete_call(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn.get()?;
    let deleted = diesel::delete(calls::table.filter(calls::id.eq(id))).execute(&mut conn)?;

    if deleted == 0 {
        return Err(ApiError::not_found("Call not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_calls_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/calls", get(list_calls).post(create_call))
        .route("/api/calls/:id", get(get_call).delete(delete_call))
        .route("/api/calls/:id/end", put(end_call))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse_round_trip() {
        assert_eq!(
            CallDirection::parse("Inbound").unwrap(),
            CallDirection::Inbound
        );
        assert_eq!(
            CallDirection::parse("Outbound").unwrap(),
            CallDirection::Outbound
        );
        assert!(CallDirection::parse("Sideways").is_err());
    }
}
