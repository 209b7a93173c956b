//! Inbound intake from telephony and email providers.
//!
//! These endpoints are unauthenticated at the transport level; delivery
//! integrity (provider signatures) is established upstream. Each delivery
//! runs resolve + assign + record creation in a single transaction so a
//! half-admitted customer is never visible.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::calls::{Call, CallDirection};
use crate::crm::assignment::assign_agent;
use crate::crm::store::PgCustomerStore;
use crate::crm::{resolve_customer, Channel, Customer, UNKNOWN_CALLER, UNKNOWN_SENDER};
use crate::shared::error::ApiError;
use crate::shared::schema::{calls, tickets};
use crate::shared::state::AppState;
use crate::tickets::Ticket;

#[derive(Debug, Deserialize)]
pub struct TelephonyWebhookPayload {
    pub call_sid: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub call_status: Option<String>,
    pub caller_name: Option<String>,
}

impl TelephonyWebhookPayload {
    pub fn validate(&self) -> Result<(&str, &str, &str), ApiError> {
        match (
            self.call_sid.as_deref(),
            self.from_number.as_deref(),
            self.call_status.as_deref(),
        ) {
            (Some(sid), Some(from), Some(status))
                if !sid.is_empty() && !from.is_empty() && !status.is_empty() =>
            {
                Ok((sid, from, status))
            }
            _ => Err(ApiError::validation(
                "Missing call_sid, from_number or call_status",
            )),
        }
    }
}

/// Only a call being set up creates records; terminal and intermediate
/// status callbacks are acknowledged without side effects.
pub fn is_actionable_call_status(status: &str) -> bool {
    status == "ringing" || status == "in-progress"
}

pub async fn telephony_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TelephonyWebhookPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let (call_sid, from_number, call_status) = payload.validate()?;

    if !is_actionable_call_status(call_status) {
        return Ok((
            StatusCode::OK,
            Json(serde_json::json!({"message": "Status ignored"})),
        ));
    }

    let caller_name = payload
        .caller_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string());

    let mut pooled = state.conn.get()?;
    let conn: &mut PgConnection = &mut pooled;
    let call = conn.transaction::<Call, ApiError, _>(|conn| {
        let customer = admit_customer(conn, Channel::Phone, from_number, &caller_name)?;

        let call = Call {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            // System-logged: no agent was on this leg of the call.
            agent_id: None,
            call_start_time: Utc::now(),
            call_end_time: None,
            call_type: CallDirection::Inbound.as_str().to_string(),
            recording_path: None,
            notes: Some(format!("Call SID: {call_sid}")),
        };

        diesel::insert_into(calls::table)
            .values(&call)
            .execute(conn)?;

        Ok(call)
    })?;

    info!("logged inbound call {} from {}", call.id, from_number);

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Call logged", "call_id": call.id})),
    ))
}

#[derive(Debug, Deserialize)]
pub struct EmailWebhookPayload {
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub sender_name: Option<String>,
}

impl EmailWebhookPayload {
    pub fn validate(&self) -> Result<(&str, &str), ApiError> {
        match (self.sender.as_deref(), self.subject.as_deref()) {
            (Some(sender), Some(subject)) if !sender.is_empty() && !subject.is_empty() => {
                Ok((sender, subject))
            }
            _ => Err(ApiError::validation("Missing sender or subject")),
        }
    }
}

pub async fn email_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailWebhookPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let (sender, subject) = payload.validate()?;

    let sender_name = payload
        .sender_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
    let body = payload.body.clone().unwrap_or_default();

    let mut pooled = state.conn.get()?;
    let conn: &mut PgConnection = &mut pooled;
    let ticket = conn.transaction::<Ticket, ApiError, _>(|conn| {
        let customer = admit_customer(conn, Channel::Email, sender, &sender_name)?;

        // System-originated: no acting agent, no creator.
        let ticket = Ticket::open(subject, body.clone(), customer.id, None, None);

        diesel::insert_into(tickets::table)
            .values(&ticket)
            .execute(conn)?;

        Ok(ticket)
    })?;

    info!("created ticket {} from email by {}", ticket.id, sender);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Ticket created from email",
            "ticket_id": ticket.id,
        })),
    ))
}

/// Resolve the customer for an inbound delivery and bind an agent if none is
/// set, inside the caller's transaction.
fn admit_customer(
    conn: &mut PgConnection,
    channel: Channel,
    key: &str,
    display_name: &str,
) -> Result<Customer, ApiError> {
    let mut store = PgCustomerStore::new(conn);
    let (mut customer, _created) = resolve_customer(&mut store, channel, key, display_name)?;
    assign_agent(&mut store, &mut customer)?;
    Ok(customer)
}

pub fn configure_webhook_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhooks/telephony", post(telephony_webhook))
        .route("/webhooks/email", post(email_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_payload_requires_sender_and_subject() {
        let payload = EmailWebhookPayload {
            sender: None,
            subject: Some("Help".to_string()),
            body: None,
            sender_name: None,
        };
        assert!(payload.validate().is_err());

        let payload = EmailWebhookPayload {
            sender: Some("a@example.com".to_string()),
            subject: None,
            body: Some("text".to_string()),
            sender_name: None,
        };
        assert!(payload.validate().is_err());

        let payload = EmailWebhookPayload {
            sender: Some("a@example.com".to_string()),
            subject: Some("Help".to_string()),
            body: None,
            sender_name: None,
        };
        assert_eq!(payload.validate().unwrap(), ("a@example.com", "Help"));
    }

    #[test]
    fn test_telephony_payload_requires_core_fields() {
        let payload = TelephonyWebhookPayload {
            call_sid: Some("CA123".to_string()),
            from_number: None,
            to_number: Some("555-0001".to_string()),
            call_status: Some("ringing".to_string()),
            caller_name: None,
        };
        assert!(payload.validate().is_err());

        let payload = TelephonyWebhookPayload {
            call_sid: Some("CA123".to_string()),
            from_number: Some("555-0100".to_string()),
            to_number: None,
            call_status: Some("ringing".to_string()),
            caller_name: None,
        };
        assert_eq!(
            payload.validate().unwrap(),
            ("CA123", "555-0100", "ringing")
        );
    }

    #[test]
    fn test_only_setup_statuses_are_actionable() {
        assert!(is_actionable_call_status("ringing"));
        assert!(is_actionable_call_status("in-progress"));
        assert!(!is_actionable_call_status("completed"));
        assert!(!is_actionable_call_status("busy"));
        assert!(!is_actionable_call_status(""));
    }
}
