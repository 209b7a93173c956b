pub mod assignment;
pub mod resolver;
pub mod store;

pub use resolver::{
    placeholder_email, resolve_customer, Channel, UNKNOWN_CALLER, UNKNOWN_PHONE, UNKNOWN_SENDER,
};

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::directory::{Principal, Role};
use crate::security::access::{self, CustomerVisibility};
use crate::shared::error::ApiError;
use crate::shared::schema::customers;
use crate::shared::state::AppState;
use crate::shared::utils::client_ip_from_headers;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = customers)]
pub struct Customer {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: Option<String>,
    pub account_status: String,
    pub assigned_agent_id: Option<Uuid>,
    pub registration_date: DateTime<Utc>,
}

impl Customer {
    pub fn new(full_name: impl Into<String>, email: String, phone_number: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            email,
            phone_number,
            address: None,
            account_status: "Active".to_string(),
            assigned_agent_id: None,
            registration_date: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: Option<String>,
    pub account_status: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub account_status: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ListCustomersQuery {
    pub search: Option<String>,
    pub account_status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListCustomersQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let mut conn = state.conn.get()?;
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let mut q = customers::table.into_boxed();

    match access::customer_visibility(&principal) {
        CustomerVisibility::All => {}
        CustomerVisibility::AssignedTo(agent_id) => {
            q = q.filter(customers::assigned_agent_id.eq(agent_id));
        }
    }

    if let Some(status) = query.account_status {
        q = q.filter(customers::account_status.eq(status));
    }

    if let Some(search) = query.search {
        let pattern = format!("%{search}%");
        q = q.filter(
            customers::full_name
                .ilike(pattern.clone())
                .or(customers::email.ilike(pattern.clone()))
                .or(customers::phone_number.ilike(pattern)),
        );
    }

    let rows: Vec<Customer> = q
        .order(customers::registration_date.desc())
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    Ok(Json(rows))
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    if req.full_name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(ApiError::validation("full_name and email are required"));
    }

    // Manual creation by an agent self-assigns; handing the record to someone
    // else is reserved for supervisors and admins.
    let assigned_agent_id = match req.assigned_agent_id {
        Some(agent_id) => {
            if agent_id != principal.id {
                access::require_reassign_customer(&principal)?;
            }
            Some(agent_id)
        }
        None if principal.role == Role::Agent => Some(principal.id),
        None => None,
    };

    let customer = Customer {
        id: Uuid::new_v4(),
        full_name: req.full_name,
        email: req.email,
        phone_number: req.phone_number,
        address: req.address,
        account_status: req.account_status.unwrap_or_else(|| "Active".to_string()),
        assigned_agent_id,
        registration_date: Utc::now(),
    };

    let mut conn = state.conn.get()?;
    diesel::insert_into(customers::table)
        .values(&customer)
        .execute(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ApiError::Conflict(
                "a customer with this email or phone number already exists".to_string(),
            ),
            other => ApiError::Database(other),
        })?;

    Ok(Json(customer))
}

pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, ApiError> {
    let mut conn = state.conn.get()?;

    let customer: Customer = customers::table
        .filter(customers::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;

    access::require_view_customer(&principal, customer.assigned_agent_id)?;

    let ip = client_ip_from_headers(&headers)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()));
    state
        .audit
        .log_customer_viewed(&principal, customer.id, &customer.full_name, ip)
        .await;

    Ok(Json(customer))
}

pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    let mut conn = state.conn.get()?;

    let customer: Customer = customers::table
        .filter(customers::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Customer not found"))?;

    access::require_view_customer(&principal, customer.assigned_agent_id)?;

    if req.assigned_agent_id.is_some() {
        access::require_reassign_customer(&principal)?;
    }

    if let Some(full_name) = req.full_name {
        diesel::update(customers::table.filter(customers::id.eq(id)))
            .set(customers::full_name.eq(full_name))
            .execute(&mut conn)?;
    }

    if let Some(email) = req.email {
        diesel::update(customers::table.filter(customers::id.eq(id)))
            .set(customers::email.eq(email))
            .execute(&mut conn)?;
    }

    if let Some(phone_number) = req.phone_number {
        diesel::update(customers::table.filter(customers::id.eq(id)))
            .set(customers::phone_number.eq(phone_number))
            .execute(&mut conn)?;
    }

    if let Some(address) = req.address {
        diesel::update(customers::table.filter(customers::id.eq(id)))
            .set(customers::address.eq(address))
            .execute(&mut conn)?;
    }

    if let Some(account_status) = req.account_status {
        diesel::update(customers::table.filter(customers::id.eq(id)))
            .set(customers::account_status.eq(account_status))
            .execute(&mut conn)?;
    }

    if let Some(agent_id) = req.assigned_agent_id {
        diesel::update(customers::table.filter(customers::id.eq(id)))
            .set(customers::assigned_agent_id.eq(Some(agent_id)))
            .execute(&mut conn)?;
    }

    let updated: Customer = customers::table
        .filter(customers::id.eq(id))
        .first(&mut conn)?;

    Ok(Json(updated))
}

pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    access::require_delete_customer(&principal)?;

    let mut conn = state.conn.get()?;
    let deleted =
        diesel::delete(customers::table.filter(customers::id.eq(id))).execute(&mut conn)?;

    if deleted == 0 {
        return Err(ApiError::not_found("Customer not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_customers_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route(
            "/api/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}
