use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::AppState;
use crate::{error::AppError, terminal::Key};

#[derive(Debug, Deserialize)]
pub struct KeyPress {
    pub key: String,
}

async fn get_terminal(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.terminal.snapshot())
}

async fn press_key(
    State(state): State<AppState>,
    Json(body): Json<KeyPress>,
) -> Result<impl IntoResponse, AppError> {
    let key: Key = body.key.parse()?;
    Ok(Json(state.terminal.press(key)?))
}

async fn charge(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.terminal.charge().await?;
    Ok(Json(snapshot))
}

async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.terminal.cancel())
}

pub fn terminal_routes(state: AppState) -> Router {
    Router::new()
        .route("/terminal", get(get_terminal))
        .route("/terminal/keys", post(press_key))
        .route("/terminal/charge", post(charge))
        .route("/terminal/cancel", post(cancel))
        .with_state(state)
}
