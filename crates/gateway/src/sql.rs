//! SQL helper endpoints: guarded read-only execution and model-driven repair.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use dataclaw_core::warehouse::QueryOutcome;

use crate::{ErrorResponse, SharedState};

#[derive(Debug, Deserialize)]
pub struct RunSqlRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct FixSqlRequest {
    pub query: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct FixSqlResponse {
    pub fixed_query: String,
}

/// POST /run-sql
///
/// Always 200; refusals and backend failures are reported in the body as
/// `{"error": ...}`.
pub async fn run_sql_handler(
    State(state): State<SharedState>,
    Json(req): Json<RunSqlRequest>,
) -> Json<QueryOutcome> {
    let outcome = state
        .orchestrator
        .assembler()
        .schema()
        .run_read_only_query(&req.query)
        .await;
    Json(outcome)
}

/// POST /fix-sql
pub async fn fix_sql_handler(
    State(state): State<SharedState>,
    Json(req): Json<FixSqlRequest>,
) -> Result<Json<FixSqlResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.repair.fix(&req.query, &req.error).await {
        Ok(fixed_query) => Ok(Json(FixSqlResponse { fixed_query })),
        Err(e) => {
            warn!(error = %e, "SQL repair failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
