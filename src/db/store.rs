use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{fixtures, product::Product, tx::Transaction};
use crate::error::{AppError, AppResult};

/// Storage seam for catalog and history data. Handlers only ever see
/// `Arc<dyn Repository>`, so tests can hand in their own fixtures.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_products(&self) -> Vec<Product>;
    async fn get_product(&self, id: &str) -> AppResult<Product>;
    async fn insert_product(&self, product: Product) -> AppResult<Product>;
    async fn update_product(&self, product: Product) -> AppResult<Product>;
    async fn delete_product(&self, id: &str) -> AppResult<()>;

    async fn list_transactions(&self) -> Vec<Transaction>;
    async fn get_transaction(&self, id: &str) -> AppResult<Transaction>;
    async fn insert_transaction(&self, transaction: Transaction) -> AppResult<Transaction>;
}

// In-memory repository
#[derive(Default)]
pub struct InMemoryRepository {
    products: RwLock<Vec<Product>>,
    transactions: RwLock<Vec<Transaction>>,
}

impl InMemoryRepository {
    pub fn new(products: Vec<Product>, transactions: Vec<Transaction>) -> AppResult<Self> {
        for product in &products {
            product.validate()?;
        }
        for transaction in &transactions {
            transaction.validate()?;
        }
        Ok(Self {
            products: RwLock::new(products),
            transactions: RwLock::new(transactions),
        })
    }

    pub fn seeded() -> AppResult<Self> {
        Self::new(fixtures::products(), fixtures::transactions(Utc::now()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_products(&self) -> Vec<Product> {
        self.products.read().clone()
    }

    async fn get_product(&self, id: &str) -> AppResult<Product> {
        self.products
            .read()
            .iter()
            .find(|product| product.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))
    }

    async fn insert_product(&self, product: Product) -> AppResult<Product> {
        product.validate()?;

        let mut products = self.products.write();
        if products.iter().any(|existing| existing.id == product.id) {
            return Err(AppError::InvalidRequest(format!(
                "product {} already exists",
                product.id
            )));
        }
        products.push(product.clone());
        tracing::info!("product created with id: {}", product.id);
        Ok(product)
    }

    async fn update_product(&self, product: Product) -> AppResult<Product> {
        product.validate()?;

        let mut products = self.products.write();
        let slot = products
            .iter_mut()
            .find(|existing| existing.id == product.id)
            .ok_or_else(|| AppError::NotFound(format!("product {}", product.id)))?;
        *slot = product.clone();
        tracing::info!("product updated: {}", product.id);
        Ok(product)
    }

    async fn delete_product(&self, id: &str) -> AppResult<()> {
        let mut products = self.products.write();
        let before = products.len();
        products.retain(|product| product.id != id);
        if products.len() == before {
            return Err(AppError::NotFound(format!("product {id}")));
        }
        tracing::info!("product deleted: {id}");
        Ok(())
    }

    /// Newest first.
    async fn list_transactions(&self) -> Vec<Transaction> {
        let mut transactions = self.transactions.read().clone();
        transactions.sort_by(|a, b| b.date.cmp(&a.date));
        transactions
    }

    async fn get_transaction(&self, id: &str) -> AppResult<Transaction> {
        self.transactions
            .read()
            .iter()
            .find(|tx| tx.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("transaction {id}")))
    }

    async fn insert_transaction(&self, transaction: Transaction) -> AppResult<Transaction> {
        transaction.validate()?;

        let mut transactions = self.transactions.write();
        if transactions.iter().any(|existing| existing.id == transaction.id) {
            return Err(AppError::InvalidRequest(format!(
                "transaction {} already exists",
                transaction.id
            )));
        }
        transactions.push(transaction.clone());
        tracing::info!("transaction recorded with id: {}", transaction.id);
        Ok(transaction)
    }
}
