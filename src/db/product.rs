use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    pub image_url: String,
}

impl Product {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidRequest("product name is empty".into()));
        }
        if self.price <= Decimal::ZERO {
            return Err(AppError::InvalidRequest(format!(
                "product price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }

    // case-insensitive, over name or category
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.name.to_lowercase().contains(&term)
            || self.category.to_lowercase().contains(&term)
    }
}
