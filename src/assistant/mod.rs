use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    db::Transaction,
    error::{AppError, AppResult},
};

pub mod gemini;

pub use gemini::GeminiModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantInput {
    pub transaction_id: String,
    pub payment_gateway: String,
    pub failure_code: String,
    pub failure_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_description: Option<String>,
}

impl AssistantInput {
    /// Only failed transactions that carry failure details can be analyzed.
    pub fn from_transaction(tx: &Transaction, customer_description: Option<String>) -> AppResult<Self> {
        let details = match (&tx.failure_details, tx.is_failed()) {
            (Some(details), true) => details,
            _ => {
                return Err(AppError::InvalidRequest(format!(
                    "transaction {} has no failure to analyze",
                    tx.id
                )))
            }
        };

        Ok(Self {
            transaction_id: tx.id.clone(),
            payment_gateway: details.gateway.clone(),
            failure_code: details.code.clone(),
            failure_message: details.message.clone(),
            customer_description: customer_description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
        })
    }

    pub fn render_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are an expert payment assistant for a tap and pay web application named PristinePay.\n\
             Your task is to analyze failed transaction details, explain the reason for failure, and provide clear, actionable resolution steps for the merchant. \
             If the customer needs to take action, also provide a polite, customer-facing message.\n\n\
             Transaction Details:\n",
        );
        prompt.push_str(&format!("- Transaction ID: {}\n", self.transaction_id));
        prompt.push_str(&format!("- Payment Gateway: {}\n", self.payment_gateway));
        prompt.push_str(&format!("- Failure Code: {}\n", self.failure_code));
        prompt.push_str(&format!("- Failure Message: {}\n", self.failure_message));
        if let Some(description) = &self.customer_description {
            prompt.push_str(&format!("- Customer Description: {description}\n"));
        }
        prompt.push_str(
            "\nBased on the above information, provide:\n\
             1. A simple explanation of why the transaction failed.\n\
             2. A list of specific steps the merchant can take to resolve this issue.\n\
             3. A boolean indicating if customer action is required.\n\
             4. If customer action is required, a polite message to relay to the customer.\n\n\
             Please provide your response in a JSON format matching the output schema.",
        );
        prompt
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAnalysis {
    pub explanation: String,
    pub resolution_steps: Vec<String>,
    pub is_customer_actionable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_facing_message: Option<String>,
}

impl TransactionAnalysis {
    /// JSON schema handed to the model for structured output.
    pub fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "explanation": {
                    "type": "STRING",
                    "description": "A clear and concise explanation of why the transaction failed."
                },
                "resolutionSteps": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "A list of actionable steps the merchant can take to resolve the issue."
                },
                "isCustomerActionable": {
                    "type": "BOOLEAN",
                    "description": "Indicates whether the customer needs to take action to resolve the issue."
                },
                "customerFacingMessage": {
                    "type": "STRING",
                    "description": "A polite, customer-friendly message that can be relayed to the customer if they need to take action."
                }
            },
            "required": ["explanation", "resolutionSteps", "isCustomerActionable"]
        })
    }

    fn validated(mut self) -> AppResult<Self> {
        self.explanation = self.explanation.trim().to_string();
        self.resolution_steps = self
            .resolution_steps
            .into_iter()
            .map(|step| step.trim().to_string())
            .filter(|step| !step.is_empty())
            .collect();
        self.customer_facing_message = self
            .customer_facing_message
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        if self.explanation.is_empty() || self.resolution_steps.is_empty() {
            return Err(AppError::AIAssistantUnavailable);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisReply {
    Analysis(TransactionAnalysis),
    Unavailable { message: String },
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Runs `prompt` and returns the model's JSON answer shaped by `schema`.
    async fn generate_json(&self, prompt: &str, schema: &Value) -> AppResult<Value>;
}

pub struct Assistant {
    model: Arc<dyn GenerativeModel>,
}

impl Assistant {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    pub async fn analyze(
        &self,
        tx: &Transaction,
        customer_description: Option<String>,
    ) -> AppResult<TransactionAnalysis> {
        let input = AssistantInput::from_transaction(tx, customer_description)?;
        let raw = self
            .model
            .generate_json(&input.render_prompt(), &TransactionAnalysis::schema())
            .await?;

        let analysis: TransactionAnalysis = serde_json::from_value(raw).map_err(|err| {
            tracing::warn!("assistant answer did not match the schema: {err}");
            AppError::AIAssistantUnavailable
        })?;
        analysis.validated()
    }

    /// Like [`Assistant::analyze`], but model failures become the static
    /// unavailable reply. Ineligible transactions are still an error.
    pub async fn analyze_or_fallback(
        &self,
        tx: &Transaction,
        customer_description: Option<String>,
    ) -> AppResult<AnalysisReply> {
        match self.analyze(tx, customer_description).await {
            Ok(analysis) => Ok(AnalysisReply::Analysis(analysis)),
            Err(err @ AppError::InvalidRequest(_)) => Err(err),
            Err(err) => {
                tracing::error!("transaction analysis for {} failed: {err}", tx.id);
                Ok(AnalysisReply::Unavailable {
                    message: AppError::AIAssistantUnavailable.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::{FailureDetails, LineItem};

    struct FakeModel {
        answer: AppResult<Value>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeModel {
        fn answering(answer: AppResult<Value>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerativeModel for FakeModel {
        async fn generate_json(&self, prompt: &str, _schema: &Value) -> AppResult<Value> {
            self.prompts.lock().push(prompt.to_string());
            self.answer.clone()
        }
    }

    fn insufficient_funds() -> Transaction {
        Transaction::failed(
            "tx_123456",
            dec!(15.50),
            Utc::now(),
            vec![LineItem {
                name: "Bulk Coffee Beans".into(),
                quantity: 1,
                price: dec!(15.50),
            }],
            FailureDetails::new(
                "Stripe",
                "insufficient_funds",
                "The customer card has insufficient funds for this transaction.",
            ),
        )
    }

    fn good_answer() -> Value {
        json!({
            "explanation": "The card did not have enough available balance.",
            "resolutionSteps": ["Ask for another card", "Retry with a smaller amount"],
            "isCustomerActionable": true,
            "customerFacingMessage": "Your card was declined for insufficient funds."
        })
    }

    #[tokio::test]
    async fn analyzes_an_insufficient_funds_failure() {
        let model = FakeModel::answering(Ok(good_answer()));
        let assistant = Assistant::new(model.clone());

        let analysis = assistant.analyze(&insufficient_funds(), None).await.unwrap();
        assert!(analysis.is_customer_actionable);
        assert_eq!(analysis.resolution_steps.len(), 2);

        let prompts = model.prompts.lock();
        assert!(prompts[0].contains("- Transaction ID: tx_123456"));
        assert!(prompts[0].contains("- Payment Gateway: Stripe"));
        assert!(prompts[0].contains("- Failure Code: insufficient_funds"));
        assert!(!prompts[0].contains("Customer Description"));
    }

    #[tokio::test]
    async fn customer_description_is_included_when_present() {
        let model = FakeModel::answering(Ok(good_answer()));
        let assistant = Assistant::new(model.clone());

        assistant
            .analyze(&insufficient_funds(), Some("  Card works elsewhere ".into()))
            .await
            .unwrap();
        assert!(model.prompts.lock()[0].contains("- Customer Description: Card works elsewhere\n"));
    }

    #[tokio::test]
    async fn completed_transactions_are_not_eligible() {
        let model = FakeModel::answering(Ok(good_answer()));
        let assistant = Assistant::new(model.clone());
        let tx = Transaction::completed("tx_1", dec!(4.00), Utc::now(), vec![]);

        let err = assistant.analyze_or_fallback(&tx, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert!(model.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_static_text() {
        let assistant = Assistant::new(FakeModel::answering(Err(AppError::gateway("timeout"))));
        let reply = assistant
            .analyze_or_fallback(&insufficient_funds(), None)
            .await
            .unwrap();
        assert_eq!(
            reply,
            AnalysisReply::Unavailable {
                message: "Unable to generate automated analysis at this time.".into()
            }
        );
    }

    #[tokio::test]
    async fn answers_without_steps_are_rejected() {
        let answer = json!({
            "explanation": "Declined.",
            "resolutionSteps": ["   "],
            "isCustomerActionable": false
        });
        let assistant = Assistant::new(FakeModel::answering(Ok(answer)));
        assert_eq!(
            assistant.analyze(&insufficient_funds(), None).await,
            Err(AppError::AIAssistantUnavailable)
        );
    }

    #[tokio::test]
    async fn blank_customer_message_is_dropped() {
        let mut answer = good_answer();
        answer["customerFacingMessage"] = json!("  ");
        let assistant = Assistant::new(FakeModel::answering(Ok(answer)));

        let analysis = assistant.analyze(&insufficient_funds(), None).await.unwrap();
        assert_eq!(analysis.customer_facing_message, None);
    }

    #[tokio::test]
    async fn malformed_answers_fall_back() {
        let assistant = Assistant::new(FakeModel::answering(Ok(json!({ "explanation": 3 }))));
        let reply = assistant
            .analyze_or_fallback(&insufficient_funds(), None)
            .await
            .unwrap();
        assert!(matches!(reply, AnalysisReply::Unavailable { .. }));
    }
}
