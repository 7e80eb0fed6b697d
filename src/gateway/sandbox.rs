use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{distributions::Alphanumeric, Rng};

use super::{IntentStatus, NewIntent, PaymentProcessor, ProcessorIntent};
use crate::error::{AppError, AppResult};

// Stripe test payment methods understood by the sandbox.
pub const PM_AUTHENTICATION_REQUIRED: &str = "pm_card_authenticationRequired";
pub const PM_THREE_D_SECURE_REQUIRED: &str = "pm_card_threeDSecure2Required";
pub const PM_INSUFFICIENT_FUNDS: &str = "pm_card_chargeDeclinedInsufficientFunds";
pub const PM_VISA_INSUFFICIENT_FUNDS: &str = "pm_card_visa_chargeDeclinedInsufficientFunds";
pub const PM_DECLINED: &str = "pm_card_chargeDeclined";

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

struct SandboxIntent {
    intent: ProcessorIntent,
    payment_method: Option<String>,
}

/// In-memory processor with Stripe-shaped ids and test-card behaviour.
#[derive(Default)]
pub struct SandboxProcessor {
    intents: Mutex<HashMap<String, SandboxIntent>>,
}

impl SandboxProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves an intent to `status` as if the processor had done it out of band.
    pub fn set_status(&self, intent_id: &str, status: IntentStatus) -> AppResult<()> {
        let mut intents = self.intents.lock();
        let entry = intents
            .get_mut(intent_id)
            .ok_or_else(|| not_found(intent_id))?;
        entry.intent.status = status;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.intents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn not_found(intent_id: &str) -> AppError {
    AppError::NotFound(format!("No such payment_intent: '{intent_id}'"))
}

fn decline(message: &str, decline_code: &str) -> AppError {
    AppError::declined(message, Some(decline_code.to_string()))
}

#[async_trait]
impl PaymentProcessor for SandboxProcessor {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn create_intent(&self, request: &NewIntent) -> AppResult<ProcessorIntent> {
        if request.amount <= 0 {
            return Err(AppError::declined(
                "Amount must be at least 1 cent",
                Some("amount_too_small".into()),
            ));
        }

        let id = format!("pi_{}", random_token());
        let client_secret = format!("{id}_secret_{}", random_token());
        let intent = ProcessorIntent {
            id: id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            status: IntentStatus::RequiresConfirmation,
            client_secret: Some(client_secret),
        };

        self.intents.lock().insert(
            id.clone(),
            SandboxIntent {
                intent: intent.clone(),
                payment_method: None,
            },
        );
        tracing::debug!("sandbox intent {id} created for {} minor units", request.amount);
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<ProcessorIntent> {
        self.intents
            .lock()
            .get(intent_id)
            .map(|entry| entry.intent.clone())
            .ok_or_else(|| not_found(intent_id))
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: Option<&str>,
    ) -> AppResult<ProcessorIntent> {
        let mut intents = self.intents.lock();
        let entry = intents
            .get_mut(intent_id)
            .ok_or_else(|| not_found(intent_id))?;

        match entry.intent.status {
            IntentStatus::Succeeded | IntentStatus::Canceled => {
                return Err(AppError::declined(
                    format!(
                        "This PaymentIntent's status is {}; it cannot be confirmed.",
                        entry.intent.status.as_str()
                    ),
                    Some("payment_intent_unexpected_state".into()),
                ));
            }
            _ => {}
        }

        let second_round = payment_method.is_none();
        if let Some(pm) = payment_method {
            entry.payment_method = Some(pm.to_string());
        }
        let Some(pm) = entry.payment_method.clone() else {
            return Err(AppError::declined(
                "You must provide a payment method to confirm this PaymentIntent.",
                Some("payment_intent_unexpected_state".into()),
            ));
        };

        let next = match pm.as_str() {
            PM_INSUFFICIENT_FUNDS | PM_VISA_INSUFFICIENT_FUNDS => {
                entry.intent.status = IntentStatus::RequiresPaymentMethod;
                return Err(decline("Your card has insufficient funds.", "insufficient_funds"));
            }
            PM_DECLINED => {
                entry.intent.status = IntentStatus::RequiresPaymentMethod;
                return Err(decline("Your card was declined.", "generic_decline"));
            }
            PM_AUTHENTICATION_REQUIRED | PM_THREE_D_SECURE_REQUIRED
                if !(second_round && entry.intent.status == IntentStatus::RequiresAction) =>
            {
                IntentStatus::RequiresAction
            }
            _ => IntentStatus::Succeeded,
        };

        entry.intent.status = next;
        Ok(entry.intent.clone())
    }

    async fn cancel_intent(&self, intent_id: &str) -> AppResult<ProcessorIntent> {
        let mut intents = self.intents.lock();
        let entry = intents
            .get_mut(intent_id)
            .ok_or_else(|| not_found(intent_id))?;
        if entry.intent.status == IntentStatus::Succeeded {
            return Err(AppError::declined(
                "You cannot cancel this PaymentIntent because it has a status of succeeded.",
                Some("payment_intent_unexpected_state".into()),
            ));
        }
        entry.intent.status = IntentStatus::Canceled;
        Ok(entry.intent.clone())
    }
}
