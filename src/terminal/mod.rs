use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{
    db::{LineItem, Repository, Transaction},
    error::{AppError, AppResult},
    gateway::{IntentStatus, PaymentGateway},
};

pub mod keypad;
pub mod poller;
pub mod qr;

pub use keypad::{AmountEntry, Key};
pub use poller::{PollControl, PollHandle, StatusPoller};
pub use qr::CheckoutLinks;

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const SUCCESS_BANNER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Idle,
    AmountEntry,
    CreatingIntent,
    AwaitingScan,
    Polling,
    Success,
}

#[derive(Debug, Clone, Copy)]
pub struct TerminalTimings {
    pub poll_interval: Duration,
    pub success_banner: Duration,
}

impl Default for TerminalTimings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            success_banner: SUCCESS_BANNER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSnapshot {
    pub state: TerminalState,
    pub amount: String,
    pub intent_id: Option<String>,
    pub checkout_url: Option<String>,
    pub qr_image_url: Option<String>,
    pub show_qr: bool,
    pub payment_success: bool,
    pub last_error: Option<String>,
}

struct ActiveIntent {
    id: String,
    amount: Decimal,
    checkout_url: String,
    qr_image_url: String,
}

struct Inner {
    state: TerminalState,
    entry: AmountEntry,
    intent: Option<ActiveIntent>,
    // bumped on every charge and cancel; late poll results and timers from
    // an older generation are discarded
    generation: u64,
    poller: Option<PollHandle>,
    banner: Option<JoinHandle<()>>,
    last_error: Option<String>,
}

impl Inner {
    fn stop_background(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        if let Some(banner) = self.banner.take() {
            banner.abort();
        }
    }

    fn snapshot(&self) -> TerminalSnapshot {
        let show_qr = self.intent.is_some()
            && matches!(self.state, TerminalState::AwaitingScan | TerminalState::Polling);
        TerminalSnapshot {
            state: self.state,
            amount: self.entry.display().to_string(),
            intent_id: self.intent.as_ref().map(|intent| intent.id.clone()),
            checkout_url: self.intent.as_ref().map(|intent| intent.checkout_url.clone()),
            qr_image_url: self.intent.as_ref().map(|intent| intent.qr_image_url.clone()),
            show_qr,
            payment_success: self.state == TerminalState::Success,
            last_error: self.last_error.clone(),
        }
    }
}

/// Merchant terminal: keypad entry, charge, QR hand-off and status polling.
pub struct Terminal {
    gateway: Arc<PaymentGateway>,
    repo: Arc<dyn Repository>,
    links: CheckoutLinks,
    timings: TerminalTimings,
    inner: Mutex<Inner>,
}

impl Terminal {
    pub fn new(
        gateway: Arc<PaymentGateway>,
        repo: Arc<dyn Repository>,
        links: CheckoutLinks,
        timings: TerminalTimings,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            repo,
            links,
            timings,
            inner: Mutex::new(Inner {
                state: TerminalState::Idle,
                entry: AmountEntry::default(),
                intent: None,
                generation: 0,
                poller: None,
                banner: None,
                last_error: None,
            }),
        })
    }

    pub fn snapshot(&self) -> TerminalSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn links(&self) -> &CheckoutLinks {
        &self.links
    }

    pub fn press(&self, key: Key) -> AppResult<TerminalSnapshot> {
        let mut inner = self.inner.lock();
        match inner.state {
            TerminalState::CreatingIntent | TerminalState::AwaitingScan | TerminalState::Polling => {
                return Err(AppError::InvalidRequest(
                    "keypad is locked while a payment is in progress".into(),
                ));
            }
            TerminalState::Success => {
                if let Some(banner) = inner.banner.take() {
                    banner.abort();
                }
            }
            TerminalState::Idle | TerminalState::AmountEntry => {}
        }

        inner.entry.press(key);
        inner.state = TerminalState::AmountEntry;
        inner.last_error = None;
        Ok(inner.snapshot())
    }

    /// Creates an intent for the keyed amount and opens the QR hand-off.
    pub async fn charge(self: &Arc<Self>) -> AppResult<TerminalSnapshot> {
        let (amount, generation) = {
            let mut inner = self.inner.lock();
            if matches!(
                inner.state,
                TerminalState::CreatingIntent | TerminalState::AwaitingScan | TerminalState::Polling
            ) {
                return Err(AppError::InvalidRequest("a charge is already in progress".into()));
            }

            let amount = inner.entry.value();
            if amount <= Decimal::ZERO {
                inner.last_error = Some("Please enter an amount to charge.".into());
                return Err(AppError::InvalidAmount);
            }

            inner.stop_background();
            inner.generation += 1;
            inner.state = TerminalState::CreatingIntent;
            inner.last_error = None;
            (amount, inner.generation)
        };

        let created = self.gateway.create_intent(amount).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            // canceled while the intent was being created
            return match created {
                Ok(_) => Ok(inner.snapshot()),
                Err(err) => Err(err),
            };
        }

        match created {
            Ok(created) => {
                let checkout_url = self.links.checkout_url(&created.intent_id);
                let qr_image_url = self.links.qr_image_url(&checkout_url);
                tracing::info!("awaiting customer scan for {}", created.intent_id);

                inner.poller = Some(self.start_poller(generation, created.intent_id.clone()));
                inner.intent = Some(ActiveIntent {
                    id: created.intent_id,
                    amount: created.amount,
                    checkout_url,
                    qr_image_url,
                });
                inner.state = TerminalState::AwaitingScan;
                Ok(inner.snapshot())
            }
            Err(err) => {
                tracing::warn!("charge failed: {err}");
                inner.state = TerminalState::AmountEntry;
                inner.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Closes the QR dialog. The intent stays open at the processor.
    pub fn cancel(&self) -> TerminalSnapshot {
        let mut inner = self.inner.lock();
        inner.stop_background();
        inner.generation += 1;
        if let Some(intent) = inner.intent.take() {
            tracing::info!("terminal canceled while waiting on {}", intent.id);
        }
        inner.state = TerminalState::AmountEntry;
        inner.snapshot()
    }

    fn start_poller(self: &Arc<Self>, generation: u64, intent_id: String) -> PollHandle {
        let terminal = Arc::downgrade(self);
        StatusPoller::start(
            self.gateway.clone(),
            intent_id,
            self.timings.poll_interval,
            move |status| match terminal.upgrade() {
                Some(terminal) => terminal.observe_status(generation, status),
                None => PollControl::Stop,
            },
        )
    }

    fn observe_status(self: &Arc<Self>, generation: u64, status: IntentStatus) -> PollControl {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return PollControl::Stop;
        }
        if inner.state == TerminalState::AwaitingScan {
            inner.state = TerminalState::Polling;
        }
        if status != IntentStatus::Succeeded {
            return PollControl::Continue;
        }

        let intent = inner.intent.take();
        inner.entry.clear();
        inner.state = TerminalState::Success;
        // the poll task is the caller; it exits on Stop
        inner.poller.take();
        inner.banner = Some(self.start_banner(generation));

        if let Some(intent) = intent {
            tracing::info!("payment {} succeeded", intent.id);
            self.record_sale(intent);
        }
        PollControl::Stop
    }

    fn start_banner(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let terminal: Weak<Self> = Arc::downgrade(self);
        let banner = self.timings.success_banner;
        tokio::spawn(async move {
            tokio::time::sleep(banner).await;
            if let Some(terminal) = terminal.upgrade() {
                let mut inner = terminal.inner.lock();
                if inner.generation == generation && inner.state == TerminalState::Success {
                    inner.state = TerminalState::Idle;
                    inner.banner = None;
                }
            }
        })
    }

    fn record_sale(&self, intent: ActiveIntent) {
        let repo = self.repo.clone();
        tokio::spawn(async move {
            let sale = Transaction::completed(
                intent.id,
                intent.amount,
                Utc::now(),
                vec![LineItem {
                    name: "Terminal Sale".into(),
                    quantity: 1,
                    price: intent.amount,
                }],
            );
            if let Err(err) = repo.insert_transaction(sale).await {
                tracing::error!("failed to record terminal sale: {err}");
            }
        });
    }
}
