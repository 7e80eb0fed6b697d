use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    gateway::{to_minor_units, IntentStatus, PaymentGateway},
};

pub mod session;

pub use session::{PageEvent, PaymentPage, PaymentPageSession};

pub const WALLET_COUNTRY: &str = "US";
pub const WALLET_LABEL: &str = "PristinePay Terminal Charge";

/// Native wallet sheet request for the exact intent amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPaymentRequest {
    pub country: String,
    pub currency: String,
    pub label: String,
    pub amount: i64,
    pub request_payer_name: bool,
    pub request_payer_email: bool,
}

impl WalletPaymentRequest {
    pub fn for_amount(amount: Decimal, currency: &str) -> AppResult<Self> {
        Ok(Self {
            country: WALLET_COUNTRY.to_string(),
            currency: currency.to_lowercase(),
            label: WALLET_LABEL.to_string(),
            amount: to_minor_units(amount)?,
            request_payer_name: true,
            request_payer_email: true,
        })
    }
}

/// Confirmation half of the processor's client library.
#[async_trait]
pub trait IntentConfirmer: Send + Sync {
    /// Confirms without handling next actions; `None` re-confirms with the
    /// method already attached (second round after `requires_action`).
    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        payment_method: Option<&str>,
    ) -> AppResult<IntentStatus>;
}

/// Device wallet (Apple Pay / Google Pay style sheet).
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn can_make_payment(&self, request: &WalletPaymentRequest) -> bool;

    /// Shows the sheet and returns the payment method id the user picked.
    async fn present(&self, request: &WalletPaymentRequest) -> AppResult<String>;
}

#[async_trait]
pub trait ClientLibraryLoader: Send + Sync {
    async fn load(&self, publishable_key: &str) -> AppResult<Arc<dyn IntentConfirmer>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Approved {
        status: IntentStatus,
    },
    Declined {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        decline_code: Option<String>,
    },
}

fn declined(err: AppError, fallback: &str) -> ConfirmationOutcome {
    let message = err.to_string();
    ConfirmationOutcome::Declined {
        message: if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        },
        decline_code: err.decline_code().map(str::to_string),
    }
}

/// Confirms the wallet's payment method against the intent. A
/// `requires_action` answer gets one more confirmation round before the
/// payment counts as approved.
pub async fn confirm_wallet_payment(
    confirmer: &dyn IntentConfirmer,
    client_secret: &str,
    payment_method: &str,
) -> ConfirmationOutcome {
    match confirmer
        .confirm_card_payment(client_secret, Some(payment_method))
        .await
    {
        Err(err) => {
            tracing::warn!("wallet payment declined: {err}");
            declined(err, "Payment Declined")
        }
        Ok(IntentStatus::RequiresAction) => {
            tracing::info!("intent requires action, confirming again");
            match confirmer.confirm_card_payment(client_secret, None).await {
                Ok(status) => ConfirmationOutcome::Approved { status },
                Err(err) => {
                    tracing::warn!("final confirmation failed: {err}");
                    declined(err, "Final confirmation failed")
                }
            }
        }
        Ok(status) => ConfirmationOutcome::Approved { status },
    }
}

/// Intent id embedded in a client secret (`<id>_secret_<token>`).
pub fn intent_id_from_secret(client_secret: &str) -> AppResult<&str> {
    match client_secret.split_once("_secret_") {
        Some((id, token)) if !id.is_empty() && !token.is_empty() => Ok(id),
        _ => Err(AppError::InvalidRequest("malformed client secret".into())),
    }
}

/// Confirms through the server-side gateway.
pub struct GatewayConfirmer {
    gateway: Arc<PaymentGateway>,
}

impl GatewayConfirmer {
    pub fn new(gateway: Arc<PaymentGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl IntentConfirmer for GatewayConfirmer {
    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        payment_method: Option<&str>,
    ) -> AppResult<IntentStatus> {
        let intent_id = intent_id_from_secret(client_secret)?;
        self.gateway.confirm_intent(intent_id, payment_method).await
    }
}
