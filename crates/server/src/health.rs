use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use roster_db::{schema::CUSTOMERS_TABLE, Store};
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    store: Store,
}

impl HealthState {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: Store) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState::new(store))
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.store).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "roster-server runtime initialized".to_string(),
        },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(store: &Store) -> HealthCheck {
    if let Err(error) = store.ping().await {
        warn!(
            event_name = "system.health.database_degraded",
            correlation_id = "health",
            error = %error,
            "database ping failed"
        );
        return HealthCheck { status: "degraded", detail: "database unavailable".to_string() };
    }
    match store.table_exists(CUSTOMERS_TABLE).await {
        Ok(true) => HealthCheck { status: "ready", detail: "customers table available".to_string() },
        Ok(false) => HealthCheck {
            status: "degraded",
            detail: "customers table has not been created".to_string(),
        },
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                correlation_id = "health",
                error = %error,
                "schema check failed"
            );
            HealthCheck { status: "degraded", detail: "schema check failed".to_string() }
        }
    }
}
