use axum::{middleware, routing::get, Router};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crmserver::shared::config::AppConfig;
use crmserver::shared::state::AppState;
use crmserver::shared::utils::{create_conn, run_migrations};
use crmserver::{auth, calls, campaigns, crm, directory, reports, security, tickets, webhooks};

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database_url)?;
    run_migrations(&pool).map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;

    let state = Arc::new(AppState::new(pool, config.clone()));

    // Everything behind the authentication middleware requires a Principal;
    // login and provider webhooks stay outside it.
    let protected = Router::new()
        .merge(crm::configure_customers_routes())
        .merge(calls::configure_calls_routes())
        .merge(tickets::configure_tickets_routes())
        .merge(campaigns::configure_campaigns_routes())
        .merge(directory::configure_users_routes())
        .merge(security::configure_security_log_routes())
        .merge(reports::configure_reports_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authentication_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health))
        .merge(auth::configure_auth_routes())
        .merge(webhooks::configure_webhook_routes())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.bind_addr();
    info!("crmserver listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
