use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub mod sandbox;
pub mod stripe;

pub use sandbox::SandboxProcessor;
pub use stripe::StripeProcessor;

pub const CURRENCY: &str = "usd";
pub const STATEMENT_DESCRIPTOR_SUFFIX: &str = "PRISTINEPAY";

/// Processor-side lifecycle of a payment intent. `Error` is the local
/// sentinel returned by status checks that could not reach the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    #[serde(other)]
    Error,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresCapture => "requires_capture",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Error => "error",
        }
    }
}

/// Intent as the processor reports it; amounts in minor units.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewIntent {
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub statement_descriptor_suffix: String,
    pub metadata: Vec<(String, String)>,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_intent(&self, request: &NewIntent) -> AppResult<ProcessorIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<ProcessorIntent>;

    /// Confirms without automatic action handling; a `None` payment method
    /// re-confirms with the one already attached.
    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: Option<&str>,
    ) -> AppResult<ProcessorIntent>;

    async fn cancel_intent(&self, intent_id: &str) -> AppResult<ProcessorIntent>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedIntent {
    pub intent_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    /// Raw processor status. Stripe reports `requires_payment_method` for a
    /// fresh intent, the sandbox `requires_confirmation`.
    pub status: IntentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentDetails {
    pub intent_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: IntentStatus,
}

pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(AppError::InvalidAmount)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(AppError::InvalidAmount)
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Bridge to the external payment processor. No caching: every call is a
/// live round trip.
pub struct PaymentGateway {
    processor: Arc<dyn PaymentProcessor>,
}

impl PaymentGateway {
    pub fn new(processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { processor }
    }

    pub fn processor_name(&self) -> &'static str {
        self.processor.name()
    }

    pub async fn create_intent(&self, amount: Decimal) -> AppResult<CreatedIntent> {
        if amount <= Decimal::ZERO {
            tracing::warn!("refusing to create intent for amount {amount}");
            return Err(AppError::InvalidAmount);
        }
        // sub-cent amounts would be charged differently from what was keyed
        if amount.normalize().scale() > 2 {
            tracing::warn!("refusing to create intent for sub-cent amount {amount}");
            return Err(AppError::InvalidAmount);
        }
        let minor = to_minor_units(amount)?;
        if minor <= 0 {
            return Err(AppError::InvalidAmount);
        }

        let request = NewIntent {
            amount: minor,
            currency: CURRENCY.to_string(),
            description: format!("Terminal Sale: ${amount}"),
            statement_descriptor_suffix: STATEMENT_DESCRIPTOR_SUFFIX.to_string(),
            metadata: vec![
                ("terminal_flow".into(), "verified_in_person".into()),
                ("transaction_type".into(), "contactless_qr".into()),
                ("authorized_source".into(), "PristinePay_Secure_Terminal".into()),
            ],
        };

        let intent = self.processor.create_intent(&request).await.map_err(|err| {
            tracing::error!("{} failed to create intent: {err}", self.processor.name());
            err
        })?;

        let client_secret = match intent.client_secret {
            Some(secret) if !secret.is_empty() => secret,
            _ => return Err(AppError::gateway("Processor returned an intent without a client secret")),
        };
        if intent.id.is_empty() {
            return Err(AppError::gateway("Processor returned an intent without an id"));
        }

        tracing::info!("created payment intent {} for {amount}", intent.id);
        Ok(CreatedIntent {
            intent_id: intent.id,
            client_secret,
            amount,
            status: intent.status,
        })
    }

    /// Never fails: processor errors collapse into `IntentStatus::Error`.
    pub async fn get_intent_status(&self, intent_id: &str) -> IntentStatus {
        match self.processor.retrieve_intent(intent_id).await {
            Ok(intent) => intent.status,
            Err(err) => {
                tracing::warn!("status check for {intent_id} failed: {err}");
                IntentStatus::Error
            }
        }
    }

    pub async fn get_intent_details(&self, intent_id: &str) -> AppResult<IntentDetails> {
        let intent = self.processor.retrieve_intent(intent_id).await?;
        let client_secret = intent
            .client_secret
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| AppError::gateway("Processor returned an intent without a client secret"))?;

        Ok(IntentDetails {
            intent_id: intent.id,
            client_secret,
            amount: from_minor_units(intent.amount),
            currency: intent.currency,
            status: intent.status,
        })
    }

    pub async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: Option<&str>,
    ) -> AppResult<IntentStatus> {
        let intent = self
            .processor
            .confirm_intent(intent_id, payment_method)
            .await?;
        tracing::info!("intent {intent_id} confirmed, status {}", intent.status.as_str());
        Ok(intent.status)
    }

    pub async fn cancel_intent(&self, intent_id: &str) -> AppResult<IntentStatus> {
        let intent = self.processor.cancel_intent(intent_id).await?;
        tracing::info!("intent {intent_id} canceled");
        Ok(intent.status)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal_macros::dec;

    use super::*;

    #[derive(Default)]
    struct CountingProcessor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PaymentProcessor for CountingProcessor {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn create_intent(&self, request: &NewIntent) -> AppResult<ProcessorIntent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::declined("Your card was declined.", Some("generic_decline".into())));
            }
            Ok(ProcessorIntent {
                id: "pi_test".into(),
                amount: request.amount,
                currency: request.currency.clone(),
                status: IntentStatus::RequiresConfirmation,
                client_secret: Some("pi_test_secret_abc".into()),
            })
        }

        async fn retrieve_intent(&self, _intent_id: &str) -> AppResult<ProcessorIntent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::gateway("connection reset"))
        }

        async fn confirm_intent(&self, _: &str, _: Option<&str>) -> AppResult<ProcessorIntent> {
            unreachable!()
        }

        async fn cancel_intent(&self, _: &str) -> AppResult<ProcessorIntent> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn non_positive_amounts_never_reach_the_processor() {
        let processor = Arc::new(CountingProcessor::default());
        let gateway = PaymentGateway::new(processor.clone());

        for amount in [dec!(0), dec!(-1), dec!(-0.01), dec!(0.004)] {
            assert_eq!(gateway.create_intent(amount).await, Err(AppError::InvalidAmount));
        }
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn created_intent_echoes_requested_amount() {
        let gateway = PaymentGateway::new(Arc::new(CountingProcessor::default()));
        let created = gateway.create_intent(dec!(4.50)).await.unwrap();
        assert_eq!(created.amount, dec!(4.50));
        assert!(!created.intent_id.is_empty());
        assert!(!created.client_secret.is_empty());
    }

    #[tokio::test]
    async fn processor_rejection_keeps_decline_code() {
        let gateway = PaymentGateway::new(Arc::new(CountingProcessor {
            fail: true,
            ..Default::default()
        }));
        let err = gateway.create_intent(dec!(10)).await.unwrap_err();
        assert_eq!(err.decline_code(), Some("generic_decline"));
    }

    #[tokio::test]
    async fn status_check_swallows_errors() {
        let gateway = PaymentGateway::new(Arc::new(CountingProcessor::default()));
        assert_eq!(gateway.get_intent_status("pi_missing").await, IntentStatus::Error);
    }

    #[tokio::test]
    async fn overflowing_amounts_are_invalid() {
        let processor = Arc::new(CountingProcessor::default());
        let gateway = PaymentGateway::new(processor.clone());

        assert_eq!(gateway.create_intent(Decimal::MAX).await, Err(AppError::InvalidAmount));
        assert_eq!(to_minor_units(Decimal::MAX), Err(AppError::InvalidAmount));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sub_cent_amounts_are_rejected() {
        let processor = Arc::new(CountingProcessor::default());
        let gateway = PaymentGateway::new(processor.clone());

        assert_eq!(gateway.create_intent(dec!(0.12345)).await, Err(AppError::InvalidAmount));
        assert_eq!(gateway.create_intent(dec!(4.505)).await, Err(AppError::InvalidAmount));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);

        // trailing zeros are still whole cents
        let created = gateway.create_intent(dec!(4.5000)).await.unwrap();
        assert_eq!(created.amount, dec!(4.50));
    }

    #[tokio::test]
    async fn created_amount_matches_the_stored_intent() {
        let gateway = PaymentGateway::new(Arc::new(SandboxProcessor::new()));
        let created = gateway.create_intent(dec!(12.34)).await.unwrap();
        let details = gateway.get_intent_details(&created.intent_id).await.unwrap();
        assert_eq!(created.amount, details.amount);
    }

    #[test]
    fn minor_unit_conversion_rounds_half_away_from_zero() {
        assert_eq!(to_minor_units(dec!(4.50)).unwrap(), 450);
        assert_eq!(to_minor_units(dec!(0.005)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(15.5)).unwrap(), 1550);
        assert_eq!(from_minor_units(775), dec!(7.75));
    }

    #[test]
    fn unknown_processor_status_maps_to_error() {
        let status: IntentStatus = serde_json::from_str("\"partially_funded\"").unwrap();
        assert_eq!(status, IntentStatus::Error);
        let status: IntentStatus = serde_json::from_str("\"requires_action\"").unwrap();
        assert_eq!(status, IntentStatus::RequiresAction);
    }
}
