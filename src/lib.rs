pub mod assistant;
pub mod cart;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod gateway;
pub mod pay;
pub mod routes;
pub mod terminal;

pub use error::{AppError, AppResult};
