// Xero Gateway - Library root for testing

pub mod adapter;
pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;
pub mod middleware;
pub mod models;
pub mod routes;

pub use adapter::XeroAdapter;
pub use error::XeroError;
