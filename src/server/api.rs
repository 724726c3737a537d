use crate::advisor::Advisor;
use crate::llm::LlmError;
use crate::models::api::{
    AdviceRequest,
    AdviceResponse,
    AnalysisRequest,
    AnalysisResponse,
    ErrorResponse,
    HealthResponse,
};
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::State,
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use thiserror::Error;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Clone)]
pub struct AppState {
    advisor: Arc<Advisor>,
}

/// Failures that escape a handler. Rendered as a generic 500; the cause is
/// only logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("model invocation failed: {0}")]
    Model(#[from] LlmError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: "Internal Server Error".into() }),
        ).into_response()
    }
}

pub fn router(advisor: Arc<Advisor>) -> Router {
    let app_state = AppState { advisor };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/get-advice", post(get_advice_handler))
        .route("/analyze", post(analyze_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(app_state)
}

async fn get_advice_handler(
    State(state): State<AppState>,
    Json(req): Json<AdviceRequest>
) -> Result<Json<AdviceResponse>, AppError> {
    info!("Advice requested ({} bytes of spending data)", req.spending_data.len());
    let advice = state.advisor.advise(&req.spending_data).await?;
    Ok(Json(AdviceResponse { advice }))
}

// Model failures come back as a 200 with the error text in `response`.
async fn analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>
) -> Json<AnalysisResponse> {
    let response = state.advisor.analyze(&req.query, &req.data_context).await;
    Json(AnalysisResponse { response })
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
        model: state.advisor.model(),
    })
}
