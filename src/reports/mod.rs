use axum::{extract::State, routing::get, Json, Router};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::directory::{Principal, Role};
use crate::security::access;
use crate::shared::error::ApiError;
use crate::shared::schema::{calls, tickets, users};
use crate::shared::state::AppState;
use crate::tickets::TicketStatus;

#[derive(Debug, Serialize)]
pub struct AgentPerformance {
    pub id: Uuid,
    pub username: String,
    pub calls_count: i64,
    pub tickets_assigned: i64,
    pub tickets_resolved: i64,
}

#[derive(Debug, Serialize)]
pub struct OverallStats {
    pub total_calls: i64,
    pub total_tickets: i64,
    pub open_tickets: i64,
    pub resolved_tickets: i64,
}

#[derive(Debug, Serialize)]
pub struct SupervisorStats {
    pub agents: Vec<AgentPerformance>,
    pub stats: OverallStats,
}

fn counts_by_agent(rows: Vec<(Option<Uuid>, i64)>) -> HashMap<Uuid, i64> {
    rows.into_iter()
        .filter_map(|(agent_id, count)| agent_id.map(|id| (id, count)))
        .collect()
}

/// Per-agent workload and overall volume for the supervisor dashboard.
pub async fn supervisor_stats(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<SupervisorStats>, ApiError> {
    access::require_view_reports(&principal)?;

    let mut conn = state.conn.get()?;

    let agents: Vec<(Uuid, String)> = users::table
        .filter(users::role.eq(Role::Agent.as_str()))
        .select((users::id, users::username))
        .order(users::username.asc())
        .load(&mut conn)?;

    let calls_by_agent = counts_by_agent(
        calls::table
            .filter(calls::agent_id.is_not_null())
            .group_by(calls::agent_id)
            .select((calls::agent_id, diesel::dsl::count_star()))
            .load(&mut conn)?,
    );

    let tickets_by_agent = counts_by_agent(
        tickets::table
            .filter(tickets::agent_id.is_not_null())
            .group_by(tickets::agent_id)
            .select((tickets::agent_id, diesel::dsl::count_star()))
            .load(&mut conn)?,
    );

    let resolved_by_agent = counts_by_agent(
        tickets::table
            .filter(tickets::agent_id.is_not_null())
            .filter(tickets::status.eq(TicketStatus::Resolved.as_str()))
            .group_by(tickets::agent_id)
            .select((tickets::agent_id, diesel::dsl::count_star()))
            .load(&mut conn)?,
    );

    let agents = agents
        .into_iter()
        .map(|(id, username)| AgentPerformance {
            id,
            username,
            calls_count: calls_by_agent.get(&id).copied().unwrap_or(0),
            tickets_assigned: tickets_by_agent.get(&id).copied().unwrap_or(0),
            tickets_resolved: resolved_by_agent.get(&id).copied().unwrap_or(0),
        })
        .collect();

    let total_calls: i64 = calls::table.count().get_result(&mut conn)?;
    let total_tickets: i64 = tickets::table.count().get_result(&mut conn)?;
    let open_tickets: i64 = tickets::table
        .filter(tickets::status.eq(TicketStatus::Open.as_str()))
        .count()
        .get_result(&mut conn)?;
    let resolved_tickets: i64 = tickets::table
        .filter(tickets::status.eq(TicketStatus::Resolved.as_str()))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(SupervisorStats {
        agents,
        stats: OverallStats {
            total_calls,
            total_tickets,
            open_tickets,
            resolved_tickets,
        },
    }))
}

pub fn configure_reports_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/supervisor/stats", get(supervisor_stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_agent_drops_unassigned() {
        let a = Uuid::new_v4();
        let rows = vec![(Some(a), 3), (None, 7)];

        let counts = counts_by_agent(rows);
        assert_eq!(counts.get(&a), Some(&3));
        assert_eq!(counts.len(), 1);
    }
}
