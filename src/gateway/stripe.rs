use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::{IntentStatus, NewIntent, PaymentProcessor, ProcessorIntent};
use crate::error::{AppError, AppResult};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const STRIPE_API_VERSION: &str = "2024-12-18.acacia";

const MISSING_KEY: &str = "Payment system misconfigured. Missing API Key.";

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    amount: i64,
    currency: String,
    status: IntentStatus,
    #[serde(default)]
    client_secret: Option<String>,
}

impl From<StripeIntent> for ProcessorIntent {
    fn from(intent: StripeIntent) -> Self {
        ProcessorIntent {
            id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
            status: intent.status,
            client_secret: intent.client_secret,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
}

/// Stripe REST processor. The HTTP client is built on first use, and only
/// after the secret key has been checked.
pub struct StripeProcessor {
    secret_key: Option<String>,
    base_url: String,
    client: OnceCell<reqwest::Client>,
}

impl StripeProcessor {
    pub fn new(secret_key: Option<String>) -> Self {
        Self::with_base_url(secret_key, STRIPE_API_BASE)
    }

    pub fn with_base_url(secret_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> AppResult<(&reqwest::Client, &str)> {
        let Some(secret_key) = self.secret_key.as_deref() else {
            tracing::error!("STRIPE_SECRET_KEY is not set");
            return Err(AppError::gateway(MISSING_KEY));
        };

        let client = self
            .client
            .get_or_try_init(|| async {
                tracing::info!("initializing stripe client");
                reqwest::Client::builder()
                    .connect_timeout(Duration::from_secs(10))
                    .build()
                    .map_err(|err| AppError::gateway(format!("Failed to build HTTP client: {err}")))
            })
            .await?;

        Ok((client, secret_key))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/payment_intents{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, secret_key: &str) -> AppResult<ProcessorIntent> {
        let response = request
            .basic_auth(secret_key, Some(""))
            .header("Stripe-Version", STRIPE_API_VERSION)
            .send()
            .await
            .map_err(|err| AppError::gateway(format!("Stripe API error: {err}")))?;

        parse_response(response).await
    }
}

async fn parse_response(response: Response) -> AppResult<ProcessorIntent> {
    let status = response.status();
    if status.is_success() {
        let intent: StripeIntent = response
            .json()
            .await
            .map_err(|err| AppError::gateway(format!("Failed to parse Stripe response: {err}")))?;
        return Ok(intent.into());
    }

    let body = response.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<StripeErrorEnvelope>(&body).ok().map(|env| env.error);
    tracing::warn!("stripe returned {status}: {body}");

    let code = parsed.as_ref().and_then(|err| err.code.clone());
    let message = parsed
        .as_ref()
        .and_then(|err| err.message.clone())
        .unwrap_or_else(|| format!("Stripe API Error ({status})"));

    if status == StatusCode::NOT_FOUND || code.as_deref() == Some("resource_missing") {
        return Err(AppError::NotFound(message));
    }

    let decline_code = parsed.and_then(|err| err.decline_code).or(code);
    Err(AppError::declined(message, decline_code))
}

fn create_params(request: &NewIntent) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), request.amount.to_string()),
        ("currency".to_string(), request.currency.clone()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        (
            "automatic_payment_methods[allow_redirects]".to_string(),
            "never".to_string(),
        ),
        ("description".to_string(), request.description.clone()),
        (
            "statement_descriptor_suffix".to_string(),
            request.statement_descriptor_suffix.clone(),
        ),
    ];
    for (key, value) in &request.metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }
    params
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_intent(&self, request: &NewIntent) -> AppResult<ProcessorIntent> {
        let (client, secret_key) = self.client().await?;
        let builder = client.post(self.url("")).form(&create_params(request));
        self.send(builder, secret_key).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<ProcessorIntent> {
        let (client, secret_key) = self.client().await?;
        let builder = client.get(self.url(&format!("/{}", urlencoding::encode(intent_id))));
        self.send(builder, secret_key).await
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: Option<&str>,
    ) -> AppResult<ProcessorIntent> {
        let (client, secret_key) = self.client().await?;
        let params: Vec<(&str, &str)> = payment_method
            .map(|pm| vec![("payment_method", pm)])
            .unwrap_or_default();
        let builder = client
            .post(self.url(&format!("/{}/confirm", urlencoding::encode(intent_id))))
            .form(&params);
        self.send(builder, secret_key).await
    }

    async fn cancel_intent(&self, intent_id: &str) -> AppResult<ProcessorIntent> {
        let (client, secret_key) = self.client().await?;
        let builder = client.post(self.url(&format!("/{}/cancel", urlencoding::encode(intent_id))));
        self.send(builder, secret_key).await
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Form, Json, Router,
    };
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use super::*;

    type Seen = Arc<Mutex<Vec<(HeaderMap, HashMap<String, String>)>>>;

    async fn create(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> Json<Value> {
        let amount: i64 = form["amount"].parse().unwrap();
        seen.lock().push((headers, form));
        Json(json!({
            "id": "pi_123",
            "object": "payment_intent",
            "amount": amount,
            "currency": "usd",
            "status": "requires_payment_method",
            "client_secret": "pi_123_secret_456"
        }))
    }

    async fn retrieve(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
        if id == "pi_123" {
            return (
                StatusCode::OK,
                Json(json!({"id": "pi_123", "amount": 450, "currency": "usd", "status": "succeeded"})),
            );
        }
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"type": "invalid_request_error", "code": "resource_missing", "message": "No such payment_intent"}})),
        )
    }

    async fn confirm(Path(_id): Path<String>) -> (StatusCode, Json<Value>) {
        (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({"error": {"type": "card_error", "code": "card_declined", "decline_code": "insufficient_funds", "message": "Your card has insufficient funds."}})),
        )
    }

    async fn fake_stripe() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/v1/payment_intents", post(create))
            .route("/v1/payment_intents/:id", get(retrieve))
            .route("/v1/payment_intents/:id/confirm", post(confirm))
            .with_state(seen.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    fn new_intent() -> NewIntent {
        NewIntent {
            amount: 450,
            currency: "usd".into(),
            description: "Terminal Sale: $4.50".into(),
            statement_descriptor_suffix: "PRISTINEPAY".into(),
            metadata: vec![("terminal_flow".into(), "verified_in_person".into())],
        }
    }

    #[tokio::test]
    async fn missing_secret_key_is_a_gateway_error_without_network() {
        let processor = StripeProcessor::with_base_url(Some("   ".into()), "http://127.0.0.1:9");
        let err = processor.create_intent(&new_intent()).await.unwrap_err();
        assert_eq!(err, AppError::gateway(MISSING_KEY));
        assert!(processor.client.get().is_none());
    }

    #[tokio::test]
    async fn create_sends_form_encoded_request() {
        let (base, seen) = fake_stripe().await;
        let processor = StripeProcessor::with_base_url(Some("sk_test_abc".into()), base);

        let intent = processor.create_intent(&new_intent()).await.unwrap();
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.amount, 450);
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_456"));

        let seen = seen.lock();
        let (headers, form) = &seen[0];
        assert_eq!(form["currency"], "usd");
        assert_eq!(form["automatic_payment_methods[allow_redirects]"], "never");
        assert_eq!(form["metadata[terminal_flow]"], "verified_in_person");
        assert_eq!(headers["stripe-version"], STRIPE_API_VERSION);
        assert!(headers["authorization"].to_str().unwrap().starts_with("Basic "));
    }

    #[tokio::test]
    async fn unknown_intent_maps_to_not_found() {
        let (base, _) = fake_stripe().await;
        let processor = StripeProcessor::with_base_url(Some("sk_test_abc".into()), base);

        assert_eq!(
            processor.retrieve_intent("pi_123").await.unwrap().status,
            IntentStatus::Succeeded
        );
        assert!(matches!(
            processor.retrieve_intent("pi_nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn declines_carry_the_decline_code() {
        let (base, _) = fake_stripe().await;
        let processor = StripeProcessor::with_base_url(Some("sk_test_abc".into()), base);

        let err = processor
            .confirm_intent("pi_123", Some("pm_card_visa"))
            .await
            .unwrap_err();
        assert_eq!(err.decline_code(), Some("insufficient_funds"));
        assert_eq!(err.to_string(), "Your card has insufficient funds.");
    }
}
