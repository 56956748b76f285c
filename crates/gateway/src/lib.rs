//! HTTP API gateway for DataClaw.
//!
//! Exposes the chat pipeline, conversation history, and the SQL helpers
//! over plain JSON/text endpoints. Built on Axum.

pub mod chat;
pub mod sql;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get, routing::post};
use serde::Serialize;
use tracing::info;

use dataclaw_agent::{ChatOrchestrator, GenerationSettings, IntentRouter, PromptAssembler, SqlRepair};
use dataclaw_config::AppConfig;
use dataclaw_core::Error;
use dataclaw_memory::{SqliteConversationStore, SqliteKnowledgeBase};
use dataclaw_warehouse::{AnySqlBackend, LineageAdapter, SchemaAdapter};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub repair: Arc<SqlRepair>,
}

pub type SharedState = Arc<GatewayState>;

/// Wire every collaborator from configuration.
///
/// The warehouse pool connects lazily, so an unreachable warehouse degrades
/// the schema text instead of failing startup.
pub async fn build_state(config: &AppConfig) -> Result<SharedState, Error> {
    let providers = dataclaw_providers::build_from_config(config)?;
    let provider = providers.default().ok_or_else(|| Error::Config {
        message: format!("provider '{}' is not configured", config.default_provider),
    })?;

    let knowledge = SqliteKnowledgeBase::new(&config.knowledge.path.to_string_lossy()).await?;
    let store = SqliteConversationStore::new(&config.store.path.to_string_lossy()).await?;
    let backend = AnySqlBackend::connect_lazy(&config.warehouse.url, config.warehouse.max_connections)?;

    let schema = SchemaAdapter::new(Arc::new(backend));
    let lineage = LineageAdapter::new(&config.lineage.manifest_path);
    let settings = GenerationSettings {
        model: config.default_model.clone(),
        temperature: config.default_temperature,
        max_tokens: config.default_max_tokens,
    };

    let orchestrator = ChatOrchestrator::new(
        IntentRouter::from_config(Arc::new(knowledge), &config.router),
        PromptAssembler::new(schema.clone(), lineage),
        provider.clone(),
        Arc::new(store),
        settings.clone(),
    );
    let repair = SqlRepair::new(schema, provider, settings);

    Ok(Arc::new(GatewayState {
        orchestrator: Arc::new(orchestrator),
        repair: Arc::new(repair),
    }))
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat::chat_handler))
        .route(
            "/chats",
            get(chat::list_chats_handler).delete(chat::delete_all_chats_handler),
        )
        .route(
            "/chats/{chat_id}",
            get(chat::get_chat_handler).delete(chat::delete_chat_handler),
        )
        .route("/run-sql", post(sql::run_sql_handler))
        .route("/fix-sql", post(sql::fix_sql_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(&config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        provider = %config.default_provider,
        model = %config.default_model,
        "DataClaw gateway listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Error body shared by handlers.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_support::default_state());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = build_router(test_support::default_state());
        let req = Request::builder()
            .uri("/v1/agents")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
