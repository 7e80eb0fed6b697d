use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::db::{Transaction, TransactionStatus};

pub const WEEKLY_REVENUE: [(&str, u32); 7] = [
    ("Mon", 1200),
    ("Tue", 1800),
    ("Wed", 1500),
    ("Thu", 2100),
    ("Fri", 2400),
    ("Sat", 3200),
    ("Sun", 2800),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub name: &'static str,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_revenue: Decimal,
    pub transaction_count: usize,
    pub average_ticket: Decimal,
    pub failed_count: usize,
    pub weekly_revenue: Vec<ChartPoint>,
}

impl DashboardSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let completed: Vec<&Transaction> = transactions
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
            .collect();
        let total_revenue: Decimal = completed.iter().map(|tx| tx.amount).sum();
        let average_ticket = if completed.is_empty() {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(completed.len()))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        Self {
            total_revenue,
            transaction_count: transactions.len(),
            average_ticket,
            failed_count: transactions.iter().filter(|tx| tx.is_failed()).count(),
            weekly_revenue: WEEKLY_REVENUE
                .iter()
                .map(|&(name, total)| ChartPoint { name, total })
                .collect(),
        }
    }
}
