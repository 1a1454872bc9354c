// src/lib.rs
//! Simulated cloud-mining subscriptions: accounts, plan contracts and
//! earnings that accrue from elapsed time, persisted in a key-value store.

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod earnings;
pub mod error;
pub mod mining;
pub mod models;
pub mod notify;
pub mod plans;
pub mod pricing;
pub mod scheduler;
pub mod session;
pub mod store;

pub use auth::AccountStore;
pub use error::AppError;
pub use mining::MiningLedger;
