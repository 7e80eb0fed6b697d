use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use super::AppState;
use crate::dashboard::DashboardSummary;

async fn summary(State(state): State<AppState>) -> impl IntoResponse {
    let transactions = state.repo.list_transactions().await;
    Json(DashboardSummary::from_transactions(&transactions))
}

pub fn dashboard_routes(state: AppState) -> Router {
    Router::new()
        .route("/dashboard/summary", get(summary))
        .with_state(state)
}
