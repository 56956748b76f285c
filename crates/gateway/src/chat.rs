//! Chat turn and conversation history endpoints.
//!
//! A generated answer is streamed as `text/plain`: the first line is a JSON
//! object `{"chat_id", "scope"}` followed by `\n`, then raw answer fragments.
//! Canned answers come back as a single JSON object.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use dataclaw_agent::{ChatStreamEvent, ChatTurn};
use dataclaw_core::message::Message;
use dataclaw_core::routing::Scope;

use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatAnswer {
    pub chat_id: String,
    pub scope: Scope,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct ChatMessages {
    pub messages: Vec<Message>,
}

/// POST /chat
pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    match state
        .orchestrator
        .handle_turn(req.chat_id.as_deref(), &req.message)
        .await
    {
        ChatTurn::Answered {
            chat_id,
            scope,
            answer,
        } => Json(ChatAnswer {
            chat_id: chat_id.to_string(),
            scope,
            answer,
        })
        .into_response(),
        ChatTurn::Streaming { events, .. } => {
            let body = ReceiverStream::new(events)
                .filter_map(|event| wire_text(event).map(Ok::<_, Infallible>));
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                Body::from_stream(body),
            )
                .into_response()
        }
    }
}

/// Plain-text rendering of one stream event. `Done` writes nothing.
fn wire_text(event: ChatStreamEvent) -> Option<String> {
    match event {
        ChatStreamEvent::Meta { chat_id, scope } => Some(format!(
            "{}\n",
            serde_json::json!({ "chat_id": chat_id, "scope": scope })
        )),
        ChatStreamEvent::Chunk { content } => Some(content),
        ChatStreamEvent::Done { .. } => None,
        ChatStreamEvent::Error { message } => Some(format!("\n\n[generation failed: {message}]")),
    }
}

/// GET /chats
pub async fn list_chats_handler(State(state): State<SharedState>) -> Json<Vec<ChatSummary>> {
    let chats = state
        .orchestrator
        .list_chats()
        .await
        .into_iter()
        .map(|id| ChatSummary {
            title: chat_title(id.as_str()),
            id: id.0,
        })
        .collect();
    Json(chats)
}

/// GET /chats/{chat_id}
pub async fn get_chat_handler(
    State(state): State<SharedState>,
    Path(chat_id): Path<String>,
) -> Json<ChatMessages> {
    Json(ChatMessages {
        messages: state.orchestrator.chat_messages(&chat_id).await,
    })
}

/// DELETE /chats/{chat_id}
pub async fn delete_chat_handler(
    State(state): State<SharedState>,
    Path(chat_id): Path<String>,
) -> StatusCode {
    if state.orchestrator.delete_chat(&chat_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// DELETE /chats
pub async fn delete_all_chats_handler(State(state): State<SharedState>) -> StatusCode {
    state.orchestrator.delete_all_chats().await;
    StatusCode::NO_CONTENT
}

fn chat_title(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("Chat {prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use crate::test_support::{EchoProvider, default_state, test_state};
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn title_uses_first_eight_chars() {
        assert_eq!(
            chat_title("6f9619ff-8b86-4011-b42d-00c04fc964ff"),
            "Chat 6f9619ff..."
        );
    }

    #[test]
    fn done_event_writes_nothing() {
        assert!(wire_text(ChatStreamEvent::Done { usage: None }).is_none());
        assert_eq!(
            wire_text(ChatStreamEvent::Chunk {
                content: "SELECT".into()
            })
            .as_deref(),
            Some("SELECT")
        );
    }

    #[tokio::test]
    async fn greeting_returns_json_answer() {
        let app = build_router(default_state());
        let response = app
            .oneshot(chat_request(serde_json::json!({"message": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["scope"], "welcome");
        assert!(json["answer"].as_str().unwrap().contains("Data Engineering"));
        assert_eq!(json["chat_id"].as_str().unwrap().len(), 36);
    }

    #[tokio::test]
    async fn sql_question_streams_meta_line_then_text() {
        let app = build_router(default_state());
        let response = app
            .oneshot(chat_request(
                serde_json::json!({"message": "write a sql query for the top customers"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );

        let text = body_text(response).await;
        let (meta, answer) = text.split_once('\n').unwrap();
        let meta: serde_json::Value = serde_json::from_str(meta).unwrap();
        assert_eq!(meta["scope"], "sql");
        assert!(meta["chat_id"].is_string());
        assert_eq!(answer, "SELECT 1");
    }

    #[tokio::test]
    async fn generation_failure_is_appended_to_stream() {
        let app = build_router(test_state(EchoProvider {
            fragments: vec![],
            fail: true,
        }));
        let response = app
            .oneshot(chat_request(serde_json::json!({"message": "fix my sql join"})))
            .await
            .unwrap();
        let text = body_text(response).await;
        assert!(text.contains("[generation failed:"));
    }

    #[tokio::test]
    async fn history_lists_and_shows_chat() {
        let state = default_state();
        let app = build_router(state.clone());
        let response = app
            .oneshot(chat_request(serde_json::json!({"message": "hi"})))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let chat_id = json["chat_id"].as_str().unwrap().to_string();

        let app = build_router(state.clone());
        let response = app
            .oneshot(Request::builder().uri("/chats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let chats: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(chats[0]["id"], chat_id.as_str());
        assert_eq!(chats[0]["title"], chat_title(&chat_id).as_str());

        let app = build_router(state.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/chats/{chat_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["scope"], "welcome");
    }

    #[tokio::test]
    async fn unknown_chat_has_no_messages() {
        let app = build_router(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/chats/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["messages"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn delete_chat_then_missing() {
        let state = default_state();
        let app = build_router(state.clone());
        let response = app
            .oneshot(chat_request(serde_json::json!({"message": "hello"})))
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let chat_id = json["chat_id"].as_str().unwrap().to_string();

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/chats/{chat_id}"))
                .body(Body::empty())
                .unwrap()
        };
        let response = build_router(state.clone()).oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = build_router(state).oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_message_is_rejected() {
        let app = build_router(default_state());
        let response = app
            .oneshot(chat_request(serde_json::json!({"chat_id": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
