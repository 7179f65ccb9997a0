pub mod actions;
pub mod activation;
pub mod auth_store;
pub mod client;
pub mod config;
pub mod error;
pub mod error_messages;
pub mod guards;
pub mod http_client;
pub mod listing_state;
pub mod media;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use client::MarketplaceClient;
pub use config::Config;
pub use error::{AppError, AppResult};
