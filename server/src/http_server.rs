use crate::config::ServerConfig;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
    Json, Router,
};
use genie_core::{DialogueRequest, GenieError, ModelReply, TurnPolicy, TurnProcessor};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    processor: Arc<TurnProcessor>,
}

impl AppState {
    pub fn new(processor: TurnProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }
}

/// Error envelope returned on every failure
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

/// Error type for HTTP server
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dialogue(#[from] GenieError),

    #[error("Malformed request body: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Dialogue(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Dialogue(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Dialogue(e) => e.public_message().to_string(),
            Self::BadRequest(_) => "The request body must be a JSON object with a `history` list.".to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }
        let body = Json(ErrorResponse {
            error: self.public_message(),
        });
        (status, body).into_response()
    }
}

/// Build the full router: dialogue API, static shell and CORS.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/akinator_api", post(handle_turn))
        .route("/undo_api", post(handle_undo))
        .route("/policy_api", get(handle_policy))
        .route("/health", get(health))
        .with_state(state);

    let mut assets = Router::new()
        .route("/", get_service(ServeFile::new(config.index_path())))
        .nest_service("/static", ServeDir::new(&config.static_dir));

    if config.dev_mode {
        assets = assets
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::PRAGMA,
                HeaderValue::from_static("no-cache"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::EXPIRES,
                HeaderValue::from_static("0"),
            ));
    }

    api.merge(assets).layer(cors)
}

/// Start the HTTP server
pub async fn run_server(config: ServerConfig, processor: TurnProcessor) -> anyhow::Result<()> {
    let addr: SocketAddr = config.bind_addr;
    info!("Starting HTTP server on {}", addr);
    info!("Serving static files from {}", config.static_dir.display());

    let app = router(AppState::new(processor), &config);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "Genie is running"
}

/// Dialogue policy the client renders its answer buttons from
async fn handle_policy(State(state): State<AppState>) -> Json<TurnPolicy> {
    Json(state.processor.config().policy.clone())
}

/// Advance the dialogue by one turn
async fn handle_turn(
    State(state): State<AppState>,
    payload: Result<Json<DialogueRequest>, JsonRejection>,
) -> Result<Json<ModelReply>, ApiError> {
    info!("akinator_api: a new request received");
    let Json(request) = payload?;

    let reply = state.processor.next_turn(&request.history).await?;
    info!("akinator_api: request processed successfully");
    Ok(Json(reply))
}

/// Step back one turn and regenerate the previous question
async fn handle_undo(
    State(state): State<AppState>,
    payload: Result<Json<DialogueRequest>, JsonRejection>,
) -> Result<Json<ModelReply>, ApiError> {
    info!("undo_api: a new request received");
    let Json(request) = payload?;

    let reply = state.processor.regenerate_last_turn(&request.history).await?;
    info!("undo_api: request processed successfully");
    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use genie_core::{ChatCompletionRequest, CompletionClient, GenieResult, ServiceConfig};
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct CannedClient {
        reply: GenieResult<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for CannedClient {
        async fn complete(&self, _request: &ChatCompletionRequest) -> GenieResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(raw) => Ok(raw.clone()),
                Err(GenieError::UpstreamFailure(detail)) => Err(GenieError::UpstreamFailure(detail.clone())),
                Err(_) => Err(GenieError::EmptyUpstreamResponse),
            }
        }

        fn provider_name(&self) -> &'static str {
            "canned"
        }

        fn model_name(&self) -> String {
            "canned-model".to_string()
        }
    }

    fn app_with(api_key: Option<&str>, reply: GenieResult<String>) -> (Router, Arc<CannedClient>) {
        let client = Arc::new(CannedClient {
            reply,
            calls: AtomicUsize::new(0),
        });
        let config = ServiceConfig {
            api_key: api_key.map(str::to_string),
            ..ServiceConfig::default()
        };
        let processor = TurnProcessor::new(Arc::new(config), client.clone());
        let server = ServerConfig {
            static_dir: static_fixture(),
            ..ServerConfig::default()
        };
        (router(AppState::new(processor), &server), client)
    }

    fn app(reply: GenieResult<String>) -> (Router, Arc<CannedClient>) {
        app_with(Some("sk-test"), reply)
    }

    fn static_fixture() -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "genie-static-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<html><body>genie</body></html>").unwrap();
        dir
    }

    async fn post(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn turn_returns_model_reply() {
        let (app, client) = app(Ok(r#"{"type": "question", "text": "Is it a person?"}"#.to_string()));
        let (status, body) = post(app, "/akinator_api", r#"{"history": []}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"type": "question", "text": "Is it a person?"}));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn turn_accepts_missing_history() {
        let (app, _) = app(Ok(r#"{"type": "question", "text": "Is it a person?"}"#.to_string()));
        let (status, _) = post(app, "/akinator_api", "{}").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_credential_is_500_without_calls() {
        for uri in ["/akinator_api", "/undo_api"] {
            let (app, client) = app_with(None, Ok(String::new()));
            let (status, body) = post(app, uri, r#"{"history": [{"q": "Is it a person?", "a": "yes"}]}"#).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body["error"].as_str().unwrap().contains("not configured"));
            assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn undo_with_empty_history_is_400() {
        let (app, client) = app(Ok(String::new()));
        let (status, body) = post(app, "/undo_api", r#"{"history": []}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undo_returns_question() {
        let (app, _) = app(Ok(r#"{"type": "question", "text": "Is it a person?"}"#.to_string()));
        let (status, body) = post(
            app,
            "/undo_api",
            r#"{"history": [{"q": "Is it a person?", "a": "yes"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "question");
    }

    #[tokio::test]
    async fn non_json_model_output_is_500_without_raw_text() {
        let (app, _) = app(Ok("Hmm, maybe it's Sherlock Holmes".to_string()));
        let (status, body) = post(
            app,
            "/akinator_api",
            r#"{"history": [{"q": "Is it a person?", "a": "yes"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("expected format"));
        assert!(!message.contains("Sherlock"));
    }

    #[tokio::test]
    async fn upstream_failure_is_500_without_detail() {
        let (app, _) = app(Err(GenieError::UpstreamFailure("dns error for internal-host".to_string())));
        let (status, body) = post(app, "/akinator_api", r#"{"history": []}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().contains("internal-host"));
    }

    #[tokio::test]
    async fn empty_upstream_is_500() {
        let (app, _) = app(Err(GenieError::EmptyUpstreamResponse));
        let (status, body) = post(app, "/akinator_api", r#"{"history": []}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_body_gets_json_envelope() {
        let (app, client) = app(Ok(String::new()));
        let (status, body) = post(app, "/akinator_api", r#"{"history": "yes"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn policy_exposes_configured_choices() {
        let client = Arc::new(CannedClient {
            reply: Ok(String::new()),
            calls: AtomicUsize::new(0),
        });
        let mut config = ServiceConfig::default();
        config.policy.answer_choices = vec!["yes".to_string(), "no".to_string(), "maybe".to_string()];
        config.policy.max_questions = 30;
        let processor = TurnProcessor::new(Arc::new(config), client.clone());
        let server = ServerConfig {
            static_dir: static_fixture(),
            ..ServerConfig::default()
        };
        let app = router(AppState::new(processor), &server);

        let request = Request::builder().uri("/policy_api").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["answer_choices"], json!(["yes", "no", "maybe"]));
        assert_eq!(body["max_questions"], 30);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn index_is_served() {
        let (app, _) = app(Ok(String::new()));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("genie"));
    }

    #[tokio::test]
    async fn dev_mode_disables_static_caching() {
        let processor = TurnProcessor::from_config(ServiceConfig::default()).unwrap();
        let server = ServerConfig {
            static_dir: static_fixture(),
            dev_mode: true,
            ..ServerConfig::default()
        };
        let app = router(AppState::new(processor), &server);
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store, no-cache, must-revalidate, max-age=0"
        );
        assert_eq!(response.headers().get(header::EXPIRES).unwrap(), "0");
    }
}
