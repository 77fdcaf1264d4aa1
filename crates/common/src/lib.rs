pub mod config;
pub mod error;
pub mod etherscan;
pub mod http;
pub mod observability;
pub mod solscan;
pub mod types;
