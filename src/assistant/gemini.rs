use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::GenerativeModel;
use crate::error::{AppError, AppResult};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiModel {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: OnceCell<reqwest::Client>,
}

impl GeminiModel {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, GEMINI_API_BASE)
    }

    pub fn with_base_url(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> AppResult<&reqwest::Client> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .connect_timeout(Duration::from_secs(10))
                    .build()
                    .map_err(|_| AppError::AIAssistantUnavailable)
            })
            .await
    }
}

fn answer_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content
        .parts
        .into_iter()
        .next()?
        .text
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate_json(&self, prompt: &str, schema: &Value) -> AppResult<Value> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::error!("GEMINI_API_KEY is not set");
            return Err(AppError::AIAssistantUnavailable);
        };

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            }
        });

        let response = self
            .client()
            .await?
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!("gemini request failed: {err}");
                AppError::AIAssistantUnavailable
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("gemini returned {status}: {text}");
            return Err(AppError::AIAssistantUnavailable);
        }

        let parsed: GenerateResponse = response.json().await.map_err(|err| {
            tracing::warn!("unreadable gemini response: {err}");
            AppError::AIAssistantUnavailable
        })?;
        let text = answer_text(parsed).ok_or(AppError::AIAssistantUnavailable)?;

        serde_json::from_str(&text).map_err(|err| {
            tracing::warn!("gemini answer is not JSON: {err}");
            AppError::AIAssistantUnavailable
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::Path, http::HeaderMap, routing::post, Json, Router};
    use parking_lot::Mutex;
    use tokio::net::TcpListener;

    use super::*;

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    async fn fake_gemini(answer: &'static str) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let log = seen.clone();
        let router = Router::new().route(
            "/v1beta/models/:call",
            post(move |Path(call): Path<String>, headers: HeaderMap, Json(body): Json<Value>| {
                let log = log.clone();
                async move {
                    let key = headers
                        .get("x-goog-api-key")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    log.lock().push((call, key, body));
                    Json(json!({
                        "candidates": [{ "content": { "parts": [{ "text": answer }] } }]
                    }))
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let model = GeminiModel::new(None, "gemini-2.0-flash");
        assert_eq!(
            model.generate_json("hi", &json!({})).await,
            Err(AppError::AIAssistantUnavailable)
        );
    }

    #[tokio::test]
    async fn requests_structured_json_output() {
        let (base, seen) = fake_gemini(r#"{"explanation":"x"}"#).await;
        let model = GeminiModel::with_base_url(Some("g-key".into()), "gemini-2.0-flash", base);

        let answer = model
            .generate_json("explain", &json!({ "type": "OBJECT" }))
            .await
            .unwrap();
        assert_eq!(answer, json!({ "explanation": "x" }));

        let seen = seen.lock();
        let (call, key, body) = &seen[0];
        assert_eq!(call, "gemini-2.0-flash:generateContent");
        assert_eq!(key.as_deref(), Some("g-key"));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "explain");
    }

    #[tokio::test]
    async fn non_json_answer_is_unavailable() {
        let (base, _) = fake_gemini("I cannot help with that").await;
        let model = GeminiModel::with_base_url(Some("g-key".into()), "gemini-2.0-flash", base);
        assert_eq!(
            model.generate_json("explain", &json!({})).await,
            Err(AppError::AIAssistantUnavailable)
        );
    }
}
