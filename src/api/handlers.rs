//! HTTP request handlers

use super::types::*;
use super::AppState;
use crate::chat::{ReplyBody, TurnError, TurnRequest};
use crate::db::DbError;
use crate::drafting::DraftError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Session id of the turn
const X_CHAT_ID: HeaderName = HeaderName::from_static("x-chat-id");
/// Which branch answered the turn
const X_RECALL_BRANCH: HeaderName = HeaderName::from_static("x-recall-branch");
/// Owner supplied by an upstream proxy
const X_USER_ID: &str = "x-user-id";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat turn
        .route("/api/chat", post(chat_turn))
        // One-shot drafts
        .route("/api/draft", post(draft_reply))
        .route("/api/answer", post(answer_question))
        // Chat listing and timelines
        .route("/api/chats", get(list_chats))
        .route("/api/messages/:id", get(chat_timeline))
        // Model info
        .route("/api/models", get(list_models))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat Turn
// ============================================================

async fn chat_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatTurnRequest>,
) -> Result<Response, AppError> {
    let owner = non_empty(req.owner_id)
        .or_else(|| header_owner(&headers))
        .or_else(|| state.default_owner.clone());

    // Checked up front so a bad id is rejected before anything is written
    if let Some(id) = &req.chat_id {
        HeaderValue::from_str(id)
            .map_err(|_| AppError::BadRequest("chatId is not a valid identifier".to_string()))?;
    }

    let messages = req
        .messages
        .into_iter()
        .filter_map(IncomingMessage::into_llm_message)
        .collect();

    let reply = state
        .chat
        .handle_turn(TurnRequest {
            owner,
            chat_id: req.chat_id,
            messages,
            model: req.model,
        })
        .await?;

    let chat_id = HeaderValue::from_str(&reply.chat_id)
        .map_err(|_| AppError::BadRequest("chatId is not a valid identifier".to_string()))?;

    let response = match reply.body {
        ReplyBody::Templated { branch, text } => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
                (X_CHAT_ID, chat_id),
                (X_RECALL_BRANCH, HeaderValue::from_static(branch.as_str())),
            ],
            text,
        )
            .into_response(),
        ReplyBody::Streamed(handle) => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
                (X_CHAT_ID, chat_id),
                (X_RECALL_BRANCH, HeaderValue::from_static("delegate")),
            ],
            // A stream error aborts the body so the client sees a cut-off reply
            Body::from_stream(handle.into_stream()),
        )
            .into_response(),
    };

    Ok(response)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn header_owner(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(X_USER_ID)?.to_str().ok()?;
    non_empty(Some(value.to_string()))
}

// ============================================================
// Drafts
// ============================================================

async fn draft_reply(
    State(state): State<AppState>,
    Json(req): Json<DraftReplyRequest>,
) -> Result<Json<DraftResponse>, AppError> {
    let draft = state
        .drafts
        .draft_reply(&req.subject, req.description.as_deref(), req.model_id)
        .await?;
    Ok(Json(DraftResponse { draft }))
}

async fn answer_question(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<DraftResponse>, AppError> {
    let draft = state
        .drafts
        .answer_question(&req.question, req.instructions.as_deref(), req.model_id)
        .await?;
    Ok(Json(DraftResponse { draft }))
}

// ============================================================
// Chats and Timelines
// ============================================================

async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatSummary>>, AppError> {
    let owner = header_owner(&headers).or_else(|| state.default_owner.clone());
    let chats = state.db.list_chats(owner.as_deref())?;
    Ok(Json(chats.into_iter().map(ChatSummary::from).collect()))
}

async fn chat_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TimelineEntry>>, AppError> {
    let turns = state.db.chat_turns(&id)?;
    Ok(Json(turns.into_iter().map(TimelineEntry::from).collect()))
}

// ============================================================
// Model Info
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("desk-recall ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    /// The store could not be reached
    Unavailable(String),
    /// The model provider failed
    BadGateway(String),
}

impl From<TurnError> for AppError {
    fn from(err: TurnError) -> Self {
        match err {
            e if e.is_input_error() => AppError::BadRequest(e.to_string()),
            TurnError::Store(e) => e.into(),
            e => AppError::BadGateway(e.to_string()),
        }
    }
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::MissingField(_) => AppError::BadRequest(err.to_string()),
            DraftError::Generation(e) => {
                tracing::error!(error = %e, "Draft generation failed");
                AppError::BadGateway(e.to_string())
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        tracing::error!(error = %err, retryable = err.is_retryable(), "Store failure");
        AppError::Unavailable(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::MockDelegate;
    use crate::config::ServerConfig;
    use crate::db::Database;
    use crate::llm::{LlmError, ModelRegistry};
    use axum::body::to_bytes;
    use axum::http::Request;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        db: Database,
        delegate: Arc<MockDelegate>,
    }

    fn app(default_owner: Option<&str>) -> TestApp {
        let db = Database::open_in_memory().unwrap();
        let delegate = Arc::new(MockDelegate::new());
        let registry = Arc::new(ModelRegistry::from_services(HashMap::new(), "chat-model"));
        let config = ServerConfig {
            db_path: PathBuf::from(":memory:"),
            port: 0,
            default_owner: default_owner.map(str::to_string),
            history_limit: 20,
        };
        let state = AppState::new(db.clone(), registry, delegate.clone(), &config);
        TestApp {
            router: create_router(state),
            db,
            delegate,
        }
    }

    fn post_chat(body: serde_json::Value, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/api/chat").header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(X_USER_ID, user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(user) = user {
            builder = builder.header(X_USER_ID, user);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_teach_turn_returns_plain_text_with_chat_id() {
        let app = app(None);
        let response = app
            .router
            .clone()
            .oneshot(post_chat(
                serde_json::json!({
                    "ownerId": "u1",
                    "messages": [{"role": "user", "content": "My favorite color is blue"}]
                }),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let chat_id = response.headers()[X_CHAT_ID.as_str()].to_str().unwrap().to_string();
        assert_eq!(response.headers()[X_RECALL_BRANCH.as_str()], "explicit_teach");
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert_eq!(
            body_text(response).await,
            "Okay, I'll remember that your favorite color is blue."
        );

        let timeline = app
            .router
            .oneshot(get(&format!("/api/messages/{chat_id}"), None))
            .await
            .unwrap();
        let entries = body_json(timeline).await;
        assert_eq!(entries.as_array().unwrap().len(), 2);
        assert_eq!(entries[0]["role"], "user");
        assert_eq!(entries[1]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_missing_owner_is_rejected() {
        let app = app(None);
        let response = app
            .router
            .oneshot(post_chat(
                serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("owner"));
        assert!(app.db.list_chats(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owner_from_header_then_default() {
        let app = app(Some("fallback"));
        let teach = serde_json::json!({
            "messages": [{"role": "user", "content": "my city is Lisbon"}]
        });

        let response = app
            .router
            .clone()
            .oneshot(post_chat(teach.clone(), Some("from-header")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.router.oneshot(post_chat(teach, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(app.db.list_facts("from-header").unwrap().len(), 1);
        assert_eq!(app.db.list_facts("fallback").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delegated_turn_streams_body() {
        let app = app(None);
        app.delegate.queue_text(&["Hello", ", ", "world"]);

        let response = app
            .router
            .oneshot(post_chat(
                serde_json::json!({
                    "messages": [{"role": "user", "content": "say hello"}],
                    "model": "gpt-4.1"
                }),
                Some("u1"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_CHAT_ID.as_str()));
        assert_eq!(response.headers()[X_RECALL_BRANCH.as_str()], "delegate");
        assert_eq!(body_text(response).await, "Hello, world");
        assert_eq!(app.delegate.requests()[0].model.as_deref(), Some("gpt-4.1"));
    }

    #[tokio::test]
    async fn test_generation_open_failure_is_bad_gateway() {
        let app = app(None);
        app.delegate
            .queue_open_failure(LlmError::server_error("provider down"));

        let response = app
            .router
            .oneshot(post_chat(
                serde_json::json!({
                    "chatId": "c1",
                    "messages": [{"role": "user", "content": "tell me a story"}]
                }),
                Some("u1"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(app.db.chat_turns("c1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_last_message_must_be_user() {
        let app = app(None);
        let response = app
            .router
            .oneshot(post_chat(
                serde_json::json!({
                    "messages": [
                        {"role": "user", "content": "hi"},
                        {"role": "assistant", "content": "hello"}
                    ]
                }),
                Some("u1"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let app = app(None);
        let response = app
            .router
            .oneshot(post_chat(
                serde_json::json!({"messages": [{"role": "user", "content": "  "}]}),
                Some("u1"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.db.list_chats(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draft_reply_returns_json() {
        let app = app(None);
        app.delegate.queue_text(&["Sorry about ", "that!"]);

        let response = app
            .router
            .oneshot(post_json(
                "/api/draft",
                serde_json::json!({
                    "subject": "Order late",
                    "description": "Still waiting on #42",
                    "modelId": "claude-4-sonnet"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["draft"], "Sorry about that!");
        let request = &app.delegate.requests()[0];
        assert_eq!(request.model.as_deref(), Some("claude-4-sonnet"));
        assert_eq!(request.max_tokens, Some(400));
        // Drafting leaves no trace in the chat store
        assert!(app.db.list_chats(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_and_its_errors() {
        let app = app(None);
        app.delegate.queue_text(&["Click reset."]);

        let response = app
            .router
            .clone()
            .oneshot(post_json(
                "/api/answer",
                serde_json::json!({"question": "How do I reset?", "instructions": "one line"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["draft"], "Click reset.");
        assert_eq!(app.delegate.requests()[0].max_tokens, Some(300));

        let response = app
            .router
            .clone()
            .oneshot(post_json("/api/answer", serde_json::json!({"question": " "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("question"));

        app.delegate
            .queue_open_failure(LlmError::server_error("provider down"));
        let response = app
            .router
            .oneshot(post_json("/api/answer", serde_json::json!({"question": "Why?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_list_chats_scoped_to_owner() {
        let app = app(None);
        app.db.create_chat("a", "u1", Some("first")).unwrap();
        app.db.create_chat("b", "u2", Some("other")).unwrap();

        let response = app
            .router
            .clone()
            .oneshot(get("/api/chats", Some("u1")))
            .await
            .unwrap();
        let chats = body_json(response).await;
        assert_eq!(chats.as_array().unwrap().len(), 1);
        assert_eq!(chats[0]["id"], "a");
        assert_eq!(chats[0]["title"], "first");
        assert!(chats[0]["created"].is_string());

        let response = app.router.oneshot(get("/api/chats", None)).await.unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_models_and_version() {
        let app = app(None);
        let response = app
            .router
            .clone()
            .oneshot(get("/api/models", None))
            .await
            .unwrap();
        let models = body_json(response).await;
        assert_eq!(models["default"], "chat-model");
        assert!(models["models"].as_array().unwrap().is_empty());

        let response = app.router.oneshot(get("/version", None)).await.unwrap();
        assert!(body_text(response).await.starts_with("desk-recall "));
    }
}
