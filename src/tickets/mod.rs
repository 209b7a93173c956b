use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::directory::Principal;
use crate::security::access;
use crate::shared::error::ApiError;
use crate::shared::schema::{customers, tickets};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Open,
    Pending,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Pending => "Pending",
            Self::Resolved => "Resolved",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ApiError> {
        match s {
            "Open" => Ok(Self::Open),
            "Pending" => Ok(Self::Pending),
            "Resolved" => Ok(Self::Resolved),
            other => Err(ApiError::validation(format!(
                "status must be Open, Pending or Resolved, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ApiError> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            other => Err(ApiError::validation(format!(
                "priority_level must be Low, Medium or High, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub issue_category: String,
    pub priority_level: String,
    pub status: String,
    pub customer_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub call_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Fresh Open ticket. `created_by` is None for system-originated tickets
    /// (email intake).
    pub fn open(
        title: impl Into<String>,
        description: impl Into<String>,
        customer_id: Uuid,
        agent_id: Option<Uuid>,
        created_by: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            issue_category: "General".to_string(),
            priority_level: TicketPriority::Medium.as_str().to_string(),
            status: TicketStatus::Open.as_str().to_string(),
            customer_id,
            agent_id,
            call_id: None,
            created_by_id: created_by,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub customer_id: Uuid,
    pub issue_category: Option<String>,
    pub priority_level: Option<String>,
    pub call_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub issue_category: Option<String>,
    pub priority_level: Option<String>,
    pub status: Option<String>,
    pub agent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<String>,
    pub priority_level: Option<String>,
    pub customer_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let mut conn = state.conn.get()?;
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let mut q = tickets::table.into_boxed();

    if let Some(status) = query.status {
        q = q.filter(tickets::status.eq(status));
    }

    if let Some(priority) = query.priority_level {
        q = q.filter(tickets::priority_level.eq(priority));
    }

    if let Some(customer_id) = query.customer_id {
        q = q.filter(tickets::customer_id.eq(customer_id));
    }

    if let Some(agent_id) = query.agent_id {
        q = q.filter(tickets::agent_id.eq(agent_id));
    }

    let rows: Vec<Ticket> = q
        .order(tickets::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    Ok(Json(rows))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<Ticket>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }

    let priority = match req.priority_level.as_deref() {
        Some(p) => TicketPriority::parse(p)?,
        None => TicketPriority::Medium,
    };

    let mut conn = state.conn.get()?;

    let customer_exists: bool = diesel::select(diesel::dsl::exists(
        customers::table.filter(customers::id.eq(req.customer_id)),
    ))
    .get_result(&mut conn)?;
    if !customer_exists {
        return Err(ApiError::not_found("Customer not found"));
    }

    let mut ticket = Ticket::open(
        req.title,
        req.description,
        req.customer_id,
        // A ticket raised through the API belongs to the acting agent.
        Some(principal.id),
        Some(principal.id),
    );
    ticket.priority_level = priority.as_str().to_string();
    if let Some(category) = req.issue_category {
        ticket.issue_category = category;
    }
    ticket.call_id = req.call_id;

    diesel::insert_into(tickets::table)
        .values(&ticket)
        .execute(&mut conn)?;

    Ok(Json(ticket))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, ApiError> {
    let mut conn = state.conn.get()?;

    let ticket: Ticket = tickets::table
        .filter(tickets::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;

    access::require_ticket_detail(&principal, ticket.agent_id)?;

    Ok(Json(ticket))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<Ticket>, ApiError> {
    let mut conn = state.conn.get()?;

    let ticket: Ticket = tickets::table
        .filter(tickets::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))?;

    access::require_ticket_detail(&principal, ticket.agent_id)?;

    if req.agent_id.is_some() {
        access::require_reassign_ticket(&principal)?;
    }

    let status = match req.status.as_deref() {
        Some(s) => Some(TicketStatus::parse(s)?),
        None => None,
    };
    let priority = match req.priority_level.as_deref() {
        Some(p) => Some(TicketPriority::parse(p)?),
        None => None,
    };

    let now = Utc::now();

    diesel::update(tickets::table.filter(tickets::id.eq(id)))
        .set(tickets::updated_at.eq(now))
        .execute(&mut conn)?;

    if let Some(title) = req.title {
        diesel::update(tickets::table.filter(tickets::id.eq(id)))
            .set(tickets::title.eq(title))
            .execute(&mut conn)?;
    }

    if let Some(description) = req.description {
        diesel::update(tickets::table.filter(tickets::id.eq(id)))
            .set(tickets::description.eq(description))
            .execute(&mut conn)?;
    }

    if let Some(category) = req.issue_category {
        diesel::update(tickets::table.filter(tickets::id.eq(id)))
            .set(tickets::issue_category.eq(category))
            .execute(&mut conn)?;
    }

    if let Some(priority) = priority {
        diesel::update(tickets::table.filter(tickets::id.eq(id)))
            .set(tickets::priority_level.eq(priority.as_str()))
            .execute(&mut conn)?;
    }

    if let Some(status) = status {
        diesel::update(tickets::table.filter(tickets::id.eq(id)))
            .set(tickets::status.eq(status.as_str()))
            .execute(&mut conn)?;

        if status == TicketStatus::Resolved {
            diesel::update(tickets::table.filter(tickets::id.eq(id)))
                .set(tickets::resolved_at.eq(Some(now)))
                .execute(&mut conn)?;
        }
    }

    if let Some(agent_id) = req.agent_id {
        diesel::update(tickets::table.filter(tickets::id.eq(id)))
            .set(tickets::agent_id.eq(Some(agent_id)))
            .execute(&mut conn)?;
    }

    let updated: Ticket = tickets::table.filter(tickets::id.eq(id)).first(&mut conn)?;

    Ok(Json(updated))
}

pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    access::require_delete_ticket(&principal)?;

    let mut conn = state.conn.get()?;
    let deleted = diesel::delete(tickets::table.filter(tickets::id.eq(id))).execute(&mut conn)?;

    if deleted == 0 {
        return Err(ApiError::not_found("Ticket not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route(
            "/api/tickets/:id",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_round_trip() {
        for status in [TicketStatus::Open, TicketStatus::Pending, TicketStatus::Resolved] {
            assert_eq!(TicketStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TicketStatus::parse("Closed").is_err());
    }

    #[test]
    fn test_priority_parse_round_trip() {
        for priority in [TicketPriority::Low, TicketPriority::Medium, TicketPriority::High] {
            assert_eq!(TicketPriority::parse(priority.as_str()).unwrap(), priority);
        }
        assert!(TicketPriority::parse("Urgent").is_err());
    }

    #[test]
    fn test_open_ticket_defaults() {
        let customer_id = Uuid::new_v4();
        let ticket = Ticket::open("Subject", "Body", customer_id, None, None);

        assert_eq!(ticket.status, "Open");
        assert_eq!(ticket.priority_level, "Medium");
        assert_eq!(ticket.issue_category, "General");
        assert_eq!(ticket.customer_id, customer_id);
        assert_eq!(ticket.created_by_id, None);
        assert_eq!(ticket.resolved_at, None);
    }
}
