// api-gateway-rs/src/lib.rs
// HTTP/REST entry point for the text-to-SQL assistant. Thin handlers over
// the generation, detection, disambiguation and feedback services; all
// request validation that is not service-specific lives here.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};

use feedback::{FeedbackQueue, FeedbackRecord};
use header_kb::HeaderRetriever;
use llm_service::{DetectAiText, Disambiguate, SqlGenerator};

/// Headers retrieved as context for one generation or preprocessing call.
/// The retrieval service applies its own hard cap below this.
pub const TOP_K_HEADERS: usize = 20;

/// Request payload ceiling; every endpoint takes small JSON bodies.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Detection responses echo only a preview of the submitted text.
const PREVIEW_CHARS: usize = 100;

/// Shared application state, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<SqlGenerator>,
    pub detector: Arc<dyn DetectAiText>,
    pub disambiguator: Arc<dyn Disambiguate>,
    pub retriever: Arc<dyn HeaderRetriever>,
    pub queue: Arc<dyn FeedbackQueue>,
    pub static_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct Text2SqlResponse {
    pub result: String,
}

#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub text: String,
    pub ai_generated: bool,
}

#[derive(Debug, Serialize)]
pub struct PreprocessResponse {
    pub result: String,
    pub is_too_vague: bool,
}

/// Feedback submission body. Field-level validation is deferred to
/// [`FeedbackRecord::try_new`] so the queue and the gateway agree on what
/// a well-formed record is.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub prediction: String,
    #[serde(default)]
    pub is_correct: bool,
    pub correct_output: Option<String>,
    pub task: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            code: 400,
        }),
    )
}

fn internal_error(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.into(),
            code: 500,
        }),
    )
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /text2sql - natural-language question to SQL-bearing model output.
async fn text2sql_handler(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> Response {
    if request.question.trim().is_empty() {
        return bad_request("Empty question provided").into_response();
    }

    log::info!("Text2SQL request: {}", request.question);

    match state
        .generator
        .generate_sql(&request.question, TOP_K_HEADERS)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(Text2SqlResponse { result })).into_response(),
        Err(e) => {
            log::error!("Text2SQL generation failed: {}", e);
            internal_error("Text-to-SQL generation failed").into_response()
        }
    }
}

/// POST /is_ai_generated - classify whether the text is AI-generated.
async fn is_ai_generated_handler(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Response {
    let text = request.text.trim();
    if text.is_empty() {
        return bad_request("Empty text input").into_response();
    }

    match state.detector.is_ai_generated(text).await {
        Ok(ai_generated) => {
            let preview: String = text.chars().take(PREVIEW_CHARS).collect();
            (
                StatusCode::OK,
                Json(DetectionResponse {
                    text: format!("{}...", preview),
                    ai_generated,
                }),
            )
                .into_response()
        }
        Err(e) => {
            log::error!("AI text detection failed: {}", e);
            internal_error("AI text detection failed").into_response()
        }
    }
}

/// POST /preprocess_text - disambiguate a question against the header
/// index without generating SQL.
async fn preprocess_text_handler(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Response {
    if request.text.trim().is_empty() {
        return bad_request("Empty text input").into_response();
    }

    let headers = state
        .retriever
        .relevant_headers(&request.text, TOP_K_HEADERS)
        .await;
    let disambiguation = state
        .disambiguator
        .disambiguate(&request.text, &headers)
        .await;

    (
        StatusCode::OK,
        Json(PreprocessResponse {
            result: disambiguation.disambiguated_text,
            is_too_vague: disambiguation.is_too_vague,
        }),
    )
        .into_response()
}

/// POST /feedback - validate and enqueue one correction/confirmation.
async fn feedback_handler(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Response {
    let record = match FeedbackRecord::try_new(
        request.input,
        request.prediction,
        request.is_correct,
        request.correct_output,
        request.task,
        request.model,
    ) {
        Ok(record) => record,
        Err(e) => return bad_request(e.to_string()).into_response(),
    };

    match state.queue.enqueue(&record).await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse {
                status: "Feedback enqueued".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            log::error!("Failed to store feedback: {}", e);
            internal_error("Failed to store feedback").into_response()
        }
    }
}

/// Assemble the full router. Separated from `main` so the HTTP surface can
/// be exercised in-process.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/text2sql", post(text2sql_handler))
        .route("/is_ai_generated", post(is_ai_generated_handler))
        .route("/preprocess_text", post(preprocess_text_handler))
        .route("/feedback", post(feedback_handler))
        .route_service(
            "/favicon.ico",
            ServeFile::new(format!("{}/favicon.ico", state.static_dir)),
        )
        .nest_service("/static", ServeDir::new(state.static_dir.clone()))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}
