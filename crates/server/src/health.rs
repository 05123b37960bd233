use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use orderbot_db::DbPool;
use serde::Serialize;

use crate::ServerState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackendNames {
    pub catalog: &'static str,
    pub ledger: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub backends: BackendNames,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub async fn health(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.db_pool {
        Some(pool) => database_check(pool).await,
        None => HealthCheck { status: "ready", detail: "no database configured".to_owned() },
    };
    let ready = database.status == "ready";
    let engine = state.service.engine();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "orderbot-server runtime initialized".to_owned(),
        },
        database,
        backends: BackendNames {
            catalog: engine.catalog_backend(),
            ledger: engine.ledger_backend(),
        },
        active_sessions: state.service.session_count().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_owned() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
