//! The `/v1` API: the streaming chat endpoint plus usage and model
//! listing.
//!
//! `POST /v1/chat/stream` is the heart of the service. Validation
//! failures are rejected with a 400 before any stream bytes exist; once
//! the request is accepted the response is a committed 200 SSE stream
//! and every later failure travels inside it as an `error` event.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use ironquill_relay::{ChatTurnRequest, Frame, StreamingSession, validate};
use ironquill_telemetry::UsageSnapshot;

use crate::{GatewayError, SharedState};

/// Routes under `/v1`. State is applied by the parent router.
pub fn v1_router() -> Router<SharedState> {
    Router::new()
        .route("/chat/stream", post(chat_stream_handler))
        .route("/usage", get(usage_handler))
        .route("/models", get(models_handler))
}

/// POST /v1/chat/stream — run one chat turn as an SSE stream.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatTurnRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let turn = validate(payload, &state.defaults, &state.registry.snapshot())?;

    info!(
        model = %turn.model,
        session = turn.session_id.as_deref().unwrap_or("-"),
        use_memory = turn.use_memory,
        testing = turn.testing_mode,
        "chat turn accepted"
    );

    let session = StreamingSession::new(state.session_config());
    let rx = session.open().await?;

    // The turn task owns the session; dropping the response body cancels
    // it through the session's disconnect watcher.
    tokio::spawn(async move {
        state.runner.run(turn, &session).await;
    });

    // Heartbeat comments come from the session task, so axum's own
    // keep-alive stays off.
    let stream = ReceiverStream::new(rx).map(|frame| Ok::<_, Infallible>(frame_to_sse(frame)));

    // nginx-style proxies buffer responses unless this header opts out.
    Ok(([("x-accel-buffering", "no")], Sse::new(stream)))
}

fn frame_to_sse(frame: Frame) -> SseEvent {
    match frame {
        Frame::Event { name, data } => SseEvent::default().event(name).data(data),
        Frame::Data(data) => SseEvent::default().data(data),
        Frame::Comment(text) => SseEvent::default().comment(text),
    }
}

/// GET /v1/usage — aggregate usage since startup.
async fn usage_handler(State(state): State<SharedState>) -> Json<UsageSnapshot> {
    Json(state.telemetry.usage_snapshot())
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<String>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    refreshed_at: Option<DateTime<Utc>>,
}

/// GET /v1/models — the registry's current snapshot.
async fn models_handler(State(state): State<SharedState>) -> Json<ModelsResponse> {
    let models = state.registry.snapshot();
    Json(ModelsResponse {
        count: models.len(),
        refreshed_at: state.registry.refreshed_at(),
        models,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppState, build_router};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use ironquill_config::AppConfig;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    fn scripted_state() -> SharedState {
        let mut config = AppConfig::default();
        config.provider.kind = "scripted".into();
        AppState::from_config(config)
    }

    fn memory_state() -> SharedState {
        let mut config = AppConfig::default();
        config.provider.kind = "scripted".into();
        config.memory.enabled = true;
        config.memory.backend = "in_memory".into();
        AppState::from_config(config)
    }

    async fn post_chat(state: SharedState, body: serde_json::Value) -> axum::response::Response {
        build_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/chat/stream")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn get_json(state: SharedState, uri: &str) -> serde_json::Value {
        let response = build_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let response = post_chat(scripted_state(), json!({ "message": "   " })).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["code"], "empty_message");
        assert!(!error["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_model_rejected_once_registry_is_populated() {
        let state = scripted_state();
        state.registry.refresh(state.provider.as_ref()).await.unwrap();

        let response = post_chat(
            state,
            json!({ "message": "hi", "model": "gpt-imaginary" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["code"], "unknown_model");
    }

    #[tokio::test]
    async fn any_model_allowed_while_registry_is_empty() {
        let response = post_chat(
            scripted_state(),
            json!({ "message": "hi", "model": "gpt-imaginary" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/event-stream"));
    }

    #[tokio::test]
    async fn scripted_stream_end_to_end() {
        let response = post_chat(scripted_state(), json!({ "message": "say hello" })).await;

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/event-stream"));
        assert_eq!(
            response.headers()["x-accel-buffering"],
            "no",
            "proxy buffering must be disabled on the stream"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        let first_token = text.find("event: token").unwrap();
        let usage = text.find("event: usage").unwrap();
        let done = text.find("event: done").unwrap();
        let done_marker = text.find("data: [DONE]").unwrap();
        assert!(first_token < usage, "tokens precede usage:\n{text}");
        assert!(usage < done, "usage precedes done:\n{text}");
        assert!(done < done_marker, "marker is last:\n{text}");

        assert!(text.contains(r#"data: {"text":"Hello!"}"#));
        assert!(text.contains(r#""tokens_in":12"#));
        assert!(text.contains(r#""tokens_out":7"#));
        assert!(text.contains(r#""finish_reason":"stop""#));
        assert!(!text.contains("event: memory"));
        assert!(!text.contains("event: error"));
        assert!(text.trim_end().ends_with("data: [DONE]"));
    }

    #[tokio::test]
    async fn memory_event_precedes_tokens_and_echoes_results() {
        let response = post_chat(
            memory_state(),
            json!({
                "message": "building in rust",
                "useMemory": true,
                "returnMemory": true,
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        let memory = text.find("event: memory").unwrap();
        let first_token = text.find("event: token").unwrap();
        assert!(memory < first_token, "memory frame leads:\n{text}");
        assert!(text.contains("memoryMs"));
        assert!(text.contains("streaming chat service in Rust"));
    }

    #[tokio::test]
    async fn usage_endpoint_reflects_completed_turns() {
        let state = scripted_state();

        let response = post_chat(state.clone(), json!({ "message": "count me" })).await;
        let _ = response.into_body().collect().await.unwrap();

        // The turn task records telemetry just after the stream closes.
        for _ in 0..100 {
            if state.telemetry.turn_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let snapshot = get_json(state, "/v1/usage").await;
        assert_eq!(snapshot["total_turns"], 1);
        assert_eq!(snapshot["error_turns"], 0);
        assert_eq!(snapshot["total_tokens_in"], 12);
        assert_eq!(snapshot["total_tokens_out"], 7);
        assert_eq!(snapshot["provider_usage_turns"], 1);
    }

    #[tokio::test]
    async fn models_endpoint_lists_registry_snapshot() {
        let state = scripted_state();

        let empty = get_json(state.clone(), "/v1/models").await;
        assert_eq!(empty["count"], 0);

        state.registry.refresh(state.provider.as_ref()).await.unwrap();
        let listed = get_json(state, "/v1/models").await;
        assert_eq!(listed["count"], 2);
        assert_eq!(listed["models"][0], "gpt-4o-mini");
        assert_eq!(listed["models"][1], "scripted-mini");
    }
}
