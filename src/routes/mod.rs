use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{
    compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    validate_request::ValidateRequestHeaderLayer,
};

use parking_lot::Mutex;

use crate::{
    assistant::Assistant, cart::Cart, db::Repository, gateway::PaymentGateway, terminal::Terminal,
};

pub mod catalog;
pub mod checkout;
pub mod dashboard;
pub mod intents;
pub mod pay;
pub mod terminal;
pub mod transactions;

const BODY_LIMIT: usize = 64 * 1024;

/// Everything the handlers share. Cloned per request, so all fields are handles.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<PaymentGateway>,
    pub terminal: Arc<Terminal>,
    pub repo: Arc<dyn Repository>,
    pub assistant: Arc<Assistant>,
    /// Counter cart shared by every register session.
    pub cart: Arc<Mutex<Cart>>,
    pub publishable_key: Option<String>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(intents::intent_routes(state.clone()))
        .merge(terminal::terminal_routes(state.clone()))
        .merge(pay::pay_routes(state.clone()))
        .merge(catalog::catalog_routes(state.clone()))
        .merge(transactions::transaction_routes(state.clone()))
        .merge(checkout::checkout_routes(state.clone()))
        .merge(dashboard::dashboard_routes(state.clone()))
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"))
        .route_layer(CompressionLayer::new().gzip(true))
        // event streams negotiate text/event-stream
        .merge(transactions::stream_routes(state));

    Router::new()
        .route("/health", get(health))
        .nest("/v1", api)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}


#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use super::{test_support::*, *};

    #[tokio::test]
    async fn health_is_public() {
        let router = app(state());
        let (status, body) = call(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let router = app(state());
        let (status, _) = call(&router, Method::GET, "/v1/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
