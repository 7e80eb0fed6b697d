pub mod fixtures;
pub mod product;
pub mod store;
pub mod tx;

pub use product::Product;
pub use store::{InMemoryRepository, Repository};
pub use tx::{FailureDetails, LineItem, Transaction, TransactionStatus};
