use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateIntent {
    pub amount: Decimal,
}

async fn create_intent(
    State(state): State<AppState>,
    Json(body): Json<CreateIntent>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("creating payment intent for {}", body.amount);
    let created = state.gateway.create_intent(body.amount).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_intent(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.gateway.get_intent_details(&intent_id).await?;
    Ok(Json(details))
}

// never an error; lookup failures report the `error` sentinel
async fn get_intent_status(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> impl IntoResponse {
    let status = state.gateway.get_intent_status(&intent_id).await;
    Json(json!({ "status": status }))
}

async fn cancel_intent(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let status = state.gateway.cancel_intent(&intent_id).await?;
    Ok(Json(json!({ "status": status })))
}

pub fn intent_routes(state: AppState) -> Router {
    Router::new()
        .route("/intents", post(create_intent))
        .route("/intents/:id", get(get_intent))
        .route("/intents/:id/status", get(get_intent_status))
        .route("/intents/:id/cancel", post(cancel_intent))
        .with_state(state)
}
