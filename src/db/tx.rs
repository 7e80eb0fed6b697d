use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub status: TransactionStatus,
    pub items: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_details: Option<FailureDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Failed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetails {
    pub gateway: String,
    pub code: String,
    pub message: String,
}

impl Transaction {
    pub fn completed(
        id: impl Into<String>,
        amount: Decimal,
        date: DateTime<Utc>,
        items: Vec<LineItem>,
    ) -> Self {
        Self {
            id: id.into(),
            amount,
            date,
            status: TransactionStatus::Completed,
            items,
            failure_details: None,
        }
    }

    pub fn pending(
        id: impl Into<String>,
        amount: Decimal,
        date: DateTime<Utc>,
        items: Vec<LineItem>,
    ) -> Self {
        Self {
            status: TransactionStatus::Pending,
            ..Self::completed(id, amount, date, items)
        }
    }

    pub fn failed(
        id: impl Into<String>,
        amount: Decimal,
        date: DateTime<Utc>,
        items: Vec<LineItem>,
        details: FailureDetails,
    ) -> Self {
        Self {
            status: TransactionStatus::Failed,
            failure_details: Some(details),
            ..Self::completed(id, amount, date, items)
        }
    }

    /// Failure details are present iff the status is `failed`, and when present
    /// none of their fields are blank.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::InvalidRequest("transaction id is empty".into()));
        }

        match (self.status, &self.failure_details) {
            (TransactionStatus::Failed, None) => Err(AppError::InvalidRequest(format!(
                "failed transaction {} has no failure details",
                self.id
            ))),
            (TransactionStatus::Failed, Some(details)) if !details.is_complete() => {
                Err(AppError::InvalidRequest(format!(
                    "failed transaction {} has incomplete failure details",
                    self.id
                )))
            }
            (TransactionStatus::Completed | TransactionStatus::Pending, Some(_)) => {
                Err(AppError::InvalidRequest(format!(
                    "transaction {} is not failed but carries failure details",
                    self.id
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransactionStatus::Failed
    }
}

impl FailureDetails {
    pub fn new(
        gateway: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            gateway: gateway.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    fn is_complete(&self) -> bool {
        ![&self.gateway, &self.code, &self.message]
            .iter()
            .any(|field| field.trim().is_empty())
    }
}
