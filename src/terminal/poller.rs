use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::gateway::{IntentStatus, PaymentGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Owns a running status poll. Stopping is idempotent and dropping the
/// handle stops the task too, so closing a dialog can never leak a timer.
pub struct PollHandle {
    intent_id: String,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn intent_id(&self) -> &str {
        &self.intent_id
    }

    pub fn stop(&self) {
        if !self.task.is_finished() {
            tracing::debug!("stopping status poll for {}", self.intent_id);
        }
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct StatusPoller;

impl StatusPoller {
    /// Checks the intent every `period`, first one period after start, until
    /// `on_status` returns `Stop` or the handle is stopped.
    pub fn start<F>(
        gateway: Arc<PaymentGateway>,
        intent_id: String,
        period: Duration,
        mut on_status: F,
    ) -> PollHandle
    where
        F: FnMut(IntentStatus) -> PollControl + Send + 'static,
    {
        let id = intent_id.clone();
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let status = gateway.get_intent_status(&id).await;
                tracing::debug!("intent {id} status: {}", status.as_str());
                if on_status(status) == PollControl::Stop {
                    break;
                }
            }
        });

        PollHandle { intent_id, task }
    }
}
