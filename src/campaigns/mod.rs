use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::crm::Customer;
use crate::directory::Principal;
use crate::security::access;
use crate::shared::error::ApiError;
use crate::shared::schema::{campaign_members, campaigns, customers};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = campaigns)]
pub struct Campaign {
    pub id: Uuid,
    pub campaign_name: String,
    pub campaign_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub target_group: String,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = campaign_members)]
pub struct CampaignMember {
    pub campaign_id: Uuid,
    pub customer_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub campaign_name: String,
    pub campaign_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub target_group: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub campaign_name: Option<String>,
    pub campaign_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub target_group: Option<String>,
}

pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    let mut conn = state.conn.get()?;

    let rows: Vec<Campaign> = campaigns::table
        .order(campaigns::start_date.desc())
        .load(&mut conn)?;

    Ok(Json(rows))
}

pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<Json<Campaign>, ApiError> {
    access::require_manage_campaigns(&principal)?;

    if req.campaign_name.trim().is_empty() {
        return Err(ApiError::validation("campaign_name is required"));
    }
    if req.end_date < req.start_date {
        return Err(ApiError::validation("end_date precedes start_date"));
    }

    let campaign = Campaign {
        id: Uuid::new_v4(),
        campaign_name: req.campaign_name,
        campaign_type: req.campaign_type,
        start_date: req.start_date,
        end_date: req.end_date,
        status: req.status,
        target_group: req.target_group,
    };

    let mut conn = state.conn.get()?;
    diesel::insert_into(campaigns::table)
        .values(&campaign)
        .execute(&mut conn)?;

    Ok(Json(campaign))
}

pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, ApiError> {
    let mut conn = state.conn.get()?;

    let campaign: Campaign = campaigns::table
        .filter(campaigns::id.eq(id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Campaign not found"))?;

    Ok(Json(campaign))
}

pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCampaignRequest>,
) -> Result<Json<Campaign>, ApiError> {
    access::require_manage_campaigns(&principal)?;

    let mut conn = state.conn.get()?;

    let exists: bool = diesel::select(diesel::dsl::exists(
        campaigns::table.filter(campaigns::id.eq(id)),
    ))
    .get_result(&mut conn)?;
    if !exists {
        return Err(ApiError::not_found("Campaign not found"));
    }

    if let Some(name) = req.campaign_name {
        diesel::update(campaigns::table.filter(campaigns::id.eq(id)))
            .set(campaigns::campaign_name.eq(name))
            .execute(&mut conn)?;
    }

    if let Some(campaign_type) = req.campaign_type {
        diesel::update(campaigns::table.filter(campaigns::id.eq(id)))
            .set(campaigns::campaign_type.eq(campaign_type))
            .execute(&mut conn)?;
    }

    if let Some(start_date) = req.start_date {
        diesel::update(campaigns::table.filter(campaigns::id.eq(id)))
            .set(campaigns::start_date.eq(start_date))
            .execute(&mut conn)?;
    }

    if let Some(end_date) = req.end_date {
        diesel::update(campaigns::table.filter(campaigns::id.eq(id)))
            .set(campaigns::end_date.eq(end_date))
            .execute(&mut conn)?;
    }

    if let Some(status) = req.status {
        diesel::update(campaigns::table.filter(campaigns::id.eq(id)))
            .set(campaigns::status.eq(status))
            .execute(&mut conn)?;
    }

    if let Some(target_group) = req.target_group {
        diesel::update(campaigns::table.filter(campaigns::id.eq(id)))
            .set(campaigns::target_group.eq(target_group))
            .execute(&mut conn)?;
    }

    let updated: Campaign = campaigns::table
        .filter(campaigns::id.eq(id))
        .first(&mut conn)?;

    Ok(Json(updated))
}

pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    access::require_manage_campaigns(&principal)?;

    let mut conn = state.conn.get()?;
    let deleted =
        diesel::delete(campaigns::table.filter(campaigns::id.eq(id))).execute(&mut conn)?;

    if deleted == 0 {
        return Err(ApiError::not_found("Campaign not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_campaign_customers(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let mut conn = state.conn.get()?;

    let rows: Vec<Customer> = campaign_members::table
        .filter(campaign_members::campaign_id.eq(id))
        .inner_join(customers::table)
        .select(customers::all_columns)
        .load(&mut conn)?;

    Ok(Json(rows))
}

pub async fn add_campaign_customer(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((id, customer_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    access::require_manage_campaigns(&principal)?;

    let mut conn = state.conn.get()?;

    let member = CampaignMember {
        campaign_id: id,
        customer_id,
    };

    diesel::insert_into(campaign_members::table)
        .values(&member)
        .on_conflict_do_nothing()
        .execute(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                _,
            ) => ApiError::not_found("Campaign or customer not found"),
            other => ApiError::Database(other),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_campaign_customer(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((id, customer_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    access::require_manage_campaigns(&principal)?;

    let mut conn = state.conn.get()?;
    diesel::delete(
        campaign_members::table
            .filter(campaign_members::campaign_id.eq(id))
            .filter(campaign_members::customer_id.eq(customer_id)),
    )
    .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_campaigns_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/api/campaigns/:id",
            get(get_campaign).put(update_campaign).delete(delete_campaign),
        )
        .route("/api/campaigns/:id/customers", get(list_campaign_customers))
        .route(
            "/api/campaigns/:id/customers/:customer_id",
            axum::routing::post(add_campaign_customer).delete(remove_campaign_customer),
        )
}
