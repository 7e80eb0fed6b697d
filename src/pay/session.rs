use std::{sync::Arc, time::Duration};

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::{
    confirm_wallet_payment, ClientLibraryLoader, ConfirmationOutcome, IntentConfirmer, Wallet,
    WalletPaymentRequest,
};
use crate::{
    error::{AppError, AppResult},
    gateway::{IntentDetails, PaymentGateway},
};

pub const LIBRARY_LOAD_GUARD: Duration = Duration::from_secs(8);

const NOT_CONFIGURED: &str =
    "Payment system not configured. Missing STRIPE_PUBLISHABLE_KEY in server settings.";
const INVALID_LINK: &str = "Invalid or expired link.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEvent {
    NetworkBlocked,
    LibraryReady,
    DetailsLoaded { amount: Decimal },
    WalletSupport { supported: bool },
    Failed { message: String },
    Processing,
    Approved,
    Declined { message: String },
}

/// Customer payment page wiring: where intent details, the client library
/// and the device wallet come from.
pub struct PaymentPage {
    gateway: Arc<PaymentGateway>,
    loader: Arc<dyn ClientLibraryLoader>,
    wallet: Arc<dyn Wallet>,
    publishable_key: Option<String>,
    load_guard: Duration,
}

impl PaymentPage {
    pub fn new(
        gateway: Arc<PaymentGateway>,
        loader: Arc<dyn ClientLibraryLoader>,
        wallet: Arc<dyn Wallet>,
        publishable_key: Option<String>,
    ) -> Self {
        Self {
            gateway,
            loader,
            wallet,
            publishable_key: publishable_key.filter(|key| !key.trim().is_empty()),
            load_guard: LIBRARY_LOAD_GUARD,
        }
    }

    /// Loads everything the page needs. Failures end in a terminal error
    /// state on the returned session; nothing is retried.
    pub async fn open(&self, intent_id: &str, events: UnboundedSender<PageEvent>) -> PaymentPageSession {
        let mut session = PaymentPageSession {
            intent_id: intent_id.to_string(),
            wallet: self.wallet.clone(),
            events,
            details: None,
            confirmer: None,
            request: None,
            can_pay_native: false,
            network_blocked: false,
            error: None,
            approved: false,
        };

        let Some(key) = self.publishable_key.as_deref() else {
            tracing::error!("publishable key missing, payment page disabled");
            session.fail(NOT_CONFIGURED.to_string());
            return session;
        };

        let mut blocked = false;
        let (library, details) = tokio::join!(
            self.load_library(key, &mut blocked, &session.events),
            self.gateway.get_intent_details(intent_id),
        );
        session.network_blocked = blocked;
        session.confirmer = library;

        match details {
            Ok(details) => {
                session.emit(PageEvent::DetailsLoaded {
                    amount: details.amount,
                });
                session.details = Some(details);
            }
            Err(err) => {
                tracing::warn!("could not load intent {intent_id}: {err}");
                let message = match err {
                    AppError::NotFound(_) => INVALID_LINK.to_string(),
                    other => other.to_string(),
                };
                session.fail(message);
                return session;
            }
        }

        session.check_wallet().await;
        session
    }

    async fn load_library(
        &self,
        key: &str,
        blocked: &mut bool,
        events: &UnboundedSender<PageEvent>,
    ) -> Option<Arc<dyn IntentConfirmer>> {
        let flag_blocked = |blocked: &mut bool| {
            if !*blocked {
                *blocked = true;
                let _ = events.send(PageEvent::NetworkBlocked);
            }
        };

        let load = self.loader.load(key);
        let guard = tokio::time::sleep(self.load_guard);
        tokio::pin!(load, guard);

        let result = loop {
            tokio::select! {
                result = &mut load => break result,
                _ = &mut guard, if !*blocked => {
                    tracing::warn!("client library not loaded after {:?}", self.load_guard);
                    flag_blocked(&mut *blocked);
                }
            }
        };

        match result {
            Ok(confirmer) => {
                *blocked = false;
                let _ = events.send(PageEvent::LibraryReady);
                Some(confirmer)
            }
            Err(err) => {
                tracing::warn!("client library failed to load: {err}");
                flag_blocked(&mut *blocked);
                None
            }
        }
    }
}

pub struct PaymentPageSession {
    intent_id: String,
    wallet: Arc<dyn Wallet>,
    events: UnboundedSender<PageEvent>,
    details: Option<IntentDetails>,
    confirmer: Option<Arc<dyn IntentConfirmer>>,
    request: Option<WalletPaymentRequest>,
    can_pay_native: bool,
    network_blocked: bool,
    error: Option<String>,
    approved: bool,
}

impl PaymentPageSession {
    pub fn intent_id(&self) -> &str {
        &self.intent_id
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.details.as_ref().map(|details| details.amount)
    }

    pub fn can_pay_native(&self) -> bool {
        self.can_pay_native
    }

    pub fn network_blocked(&self) -> bool {
        self.network_blocked
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub fn wallet_request(&self) -> Option<&WalletPaymentRequest> {
        self.request.as_ref()
    }

    /// "Tap to Pay": show the wallet sheet and confirm what it returns.
    pub async fn tap_to_pay(&mut self) -> AppResult<ConfirmationOutcome> {
        if self.approved {
            return Err(AppError::InvalidRequest("payment already approved".into()));
        }
        let (Some(details), Some(confirmer), Some(request)) =
            (&self.details, &self.confirmer, &self.request)
        else {
            if self.network_blocked {
                return Err(AppError::NetworkBlocked);
            }
            return Err(AppError::InvalidRequest(
                self.error
                    .clone()
                    .unwrap_or_else(|| "payment page is not ready".into()),
            ));
        };
        if !self.can_pay_native {
            return Err(AppError::WalletUnsupported);
        }

        let client_secret = details.client_secret.clone();
        let confirmer = confirmer.clone();
        let request = request.clone();

        self.error = None;
        self.emit(PageEvent::Processing);

        let payment_method = match self.wallet.present(&request).await {
            Ok(payment_method) => payment_method,
            Err(err) => {
                self.fail(err.to_string());
                return Err(err);
            }
        };

        let outcome = confirm_wallet_payment(confirmer.as_ref(), &client_secret, &payment_method).await;
        match &outcome {
            ConfirmationOutcome::Approved { .. } => {
                tracing::info!("payment for {} approved", self.intent_id);
                self.approved = true;
                self.emit(PageEvent::Approved);
            }
            ConfirmationOutcome::Declined { message, .. } => {
                self.error = Some(message.clone());
                self.emit(PageEvent::Declined {
                    message: message.clone(),
                });
            }
        }
        Ok(outcome)
    }

    async fn check_wallet(&mut self) {
        let (Some(details), Some(_)) = (&self.details, &self.confirmer) else {
            return;
        };

        let request = match WalletPaymentRequest::for_amount(details.amount, &details.currency) {
            Ok(request) => request,
            Err(err) => {
                self.fail(err.to_string());
                return;
            }
        };

        self.can_pay_native = self.wallet.can_make_payment(&request).await;
        if !self.can_pay_native {
            tracing::info!("wallet payments unsupported on this device");
        }
        self.emit(PageEvent::WalletSupport {
            supported: self.can_pay_native,
        });
        self.request = Some(request);
    }

    fn fail(&mut self, message: String) {
        self.error = Some(message.clone());
        self.emit(PageEvent::Failed { message });
    }

    fn emit(&self, event: PageEvent) {
        // the page may have been closed; events are advisory
        let _ = self.events.send(event);
    }
}
