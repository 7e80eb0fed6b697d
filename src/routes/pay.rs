use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    error::AppError,
    pay::{confirm_wallet_payment, ConfirmationOutcome, GatewayConfirmer, WalletPaymentRequest},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBootstrap {
    pub intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub client_secret: String,
    pub publishable_key: String,
    pub wallet_request: WalletPaymentRequest,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPayment {
    pub payment_method: String,
}

fn publishable_key(state: &AppState) -> Result<String, AppError> {
    state.publishable_key.clone().ok_or_else(|| {
        AppError::Config("Payment system not configured. Missing STRIPE_PUBLISHABLE_KEY.".into())
    })
}

async fn bootstrap(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let publishable_key = publishable_key(&state)?;
    let details = state.gateway.get_intent_details(&intent_id).await?;
    let wallet_request = WalletPaymentRequest::for_amount(details.amount, &details.currency)?;

    Ok(Json(PageBootstrap {
        intent_id: details.intent_id,
        amount: details.amount,
        currency: details.currency,
        client_secret: details.client_secret,
        publishable_key,
        wallet_request,
    }))
}

async fn confirm(
    State(state): State<AppState>,
    Path(intent_id): Path<String>,
    Json(body): Json<ConfirmPayment>,
) -> Result<impl IntoResponse, AppError> {
    if body.payment_method.trim().is_empty() {
        return Err(AppError::InvalidRequest("payment_method is required".into()));
    }
    let details = state.gateway.get_intent_details(&intent_id).await?;

    let confirmer = GatewayConfirmer::new(state.gateway.clone());
    let outcome =
        confirm_wallet_payment(&confirmer, &details.client_secret, &body.payment_method).await;
    let status = match outcome {
        ConfirmationOutcome::Approved { .. } => StatusCode::OK,
        ConfirmationOutcome::Declined { .. } => StatusCode::PAYMENT_REQUIRED,
    };
    Ok((status, Json(outcome)))
}

pub fn pay_routes(state: AppState) -> Router {
    Router::new()
        .route("/pay/:id", get(bootstrap))
        .route("/pay/:id/confirm", post(confirm))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use super::super::{app, test_support::*};
    use super::*;
    use crate::gateway::sandbox;

    async fn new_intent(router: &Router, amount: &str) -> String {
        let (_, created) =
            call(router, Method::POST, "/v1/intents", Some(json!({ "amount": amount }))).await;
        created["intentId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn bootstrap_carries_the_wallet_request() {
        let router = app(state());
        let id = new_intent(&router, "15.50").await;

        let (status, page) = call(&router, Method::GET, &format!("/v1/pay/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["publishableKey"], "pk_test_123");
        assert_eq!(page["walletRequest"]["amount"], 1550);
        assert_eq!(page["walletRequest"]["country"], "US");
        assert_eq!(page["walletRequest"]["label"], "PristinePay Terminal Charge");
        assert_eq!(page["walletRequest"]["requestPayerEmail"], true);
    }

    #[tokio::test]
    async fn missing_publishable_key_is_a_config_error() {
        let mut state = state();
        state.publishable_key = None;
        let router = app(state);
        let id = new_intent(&router, "1").await;

        let (status, body) = call(&router, Method::GET, &format!("/v1/pay/{id}"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "config_error");
    }

    #[tokio::test]
    async fn confirm_approves_after_authentication() {
        let router = app(state());
        let id = new_intent(&router, "4.50").await;

        let (status, outcome) = call(
            &router,
            Method::POST,
            &format!("/v1/pay/{id}/confirm"),
            Some(json!({ "payment_method": sandbox::PM_AUTHENTICATION_REQUIRED })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["outcome"], "approved");
        assert_eq!(outcome["status"], "succeeded");
    }

    #[tokio::test]
    async fn confirm_reports_declines() {
        let router = app(state());
        let id = new_intent(&router, "4.50").await;

        let (status, outcome) = call(
            &router,
            Method::POST,
            &format!("/v1/pay/{id}/confirm"),
            Some(json!({ "payment_method": sandbox::PM_DECLINED })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(outcome["outcome"], "declined");
        assert_eq!(outcome["decline_code"], "generic_decline");
    }
}
