use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;

use super::AppState;
use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisRequest {
    pub customer_description: Option<String>,
}

async fn list_transactions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.repo.list_transactions().await)
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.repo.get_transaction(&transaction_id).await?))
}

async fn analyze_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    body: Option<Json<AnalysisRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let tx = state.repo.get_transaction(&transaction_id).await?;
    tracing::info!("analyzing failed transaction {transaction_id}");

    let reply = state
        .assistant
        .analyze_or_fallback(&tx, request.customer_description)
        .await?;
    Ok(Json(reply))
}

// history as server-sent events, newest first
async fn stream_transactions(State(state): State<AppState>) -> impl IntoResponse {
    let transactions = state.repo.list_transactions().await;
    let stream = futures::stream::iter(transactions)
        .map(|transaction| Event::default().event("transaction").json_data(transaction));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

pub fn transaction_routes(state: AppState) -> Router {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/:id", get(get_transaction))
        .route("/transactions/:id/analysis", post(analyze_transaction))
        .with_state(state)
}

pub fn stream_routes(state: AppState) -> Router {
    Router::new()
        .route("/transactions/stream", get(stream_transactions))
        .with_state(state)
}
