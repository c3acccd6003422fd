pub mod config;
pub mod crypto_pay;
pub mod database;
pub mod entity;
pub mod error;
pub mod market;
pub mod models;
pub mod retry;

pub use config::Config;
pub use crypto_pay::{CryptoPayClient, Invoice, InvoiceStatus};
pub use database::get_db_connection;
pub use error::GatewayError;
pub use market::{Kline, MarketClient, MarketSnapshot};
pub use models::*;
