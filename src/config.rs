// src/config.rs
use crate::earnings::EarningsMode;
use crate::pricing::{DEFAULT_WALK_STEP, INITIAL_UNIT_PRICE};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    /// File-backed store when set, in-memory otherwise.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_accrual_tick_ms")]
    pub accrual_tick_ms: u64,
    #[serde(default = "default_price_walk_ms")]
    pub price_walk_ms: u64,
    #[serde(default = "default_price_walk_step")]
    pub price_walk_step: f64,
    #[serde(default = "default_initial_unit_price")]
    pub initial_unit_price: f64,
    #[serde(default = "default_payment_delay_ms")]
    pub payment_delay_ms: u64,
    #[serde(default)]
    pub earnings_mode: EarningsMode,
    #[serde(default = "default_verify_passwords")]
    pub verify_passwords: bool,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_dashboard_cache_ttl_ms")]
    pub dashboard_cache_ttl_ms: u64,
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8080
}

fn default_accrual_tick_ms() -> u64 {
    3_000
}

fn default_price_walk_ms() -> u64 {
    5_000
}

fn default_price_walk_step() -> f64 {
    DEFAULT_WALK_STEP
}

fn default_initial_unit_price() -> f64 {
    INITIAL_UNIT_PRICE
}

fn default_payment_delay_ms() -> u64 {
    2_000
}

fn default_verify_passwords() -> bool {
    true
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_dashboard_cache_ttl_ms() -> u64 {
    1_000
}

/// Knobs for the account store.
#[derive(Clone, Copy, Debug)]
pub struct AuthSettings {
    pub verify_passwords: bool,
    pub bcrypt_cost: u32,
}

/// Knobs for the mining ledger.
#[derive(Clone, Copy, Debug)]
pub struct LedgerSettings {
    pub mode: EarningsMode,
    pub payment_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            verify_passwords: self.verify_passwords,
            bcrypt_cost: self.bcrypt_cost,
        }
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            mode: self.earnings_mode,
            payment_delay: Duration::from_millis(self.payment_delay_ms),
        }
    }

    pub fn accrual_period(&self) -> Duration {
        Duration::from_millis(self.accrual_tick_ms)
    }

    pub fn price_walk_period(&self) -> Duration {
        Duration::from_millis(self.price_walk_ms)
    }

    pub fn dashboard_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.dashboard_cache_ttl_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            bind_port: default_bind_port(),
            data_dir: None,
            accrual_tick_ms: default_accrual_tick_ms(),
            price_walk_ms: default_price_walk_ms(),
            price_walk_step: default_price_walk_step(),
            initial_unit_price: default_initial_unit_price(),
            payment_delay_ms: default_payment_delay_ms(),
            earnings_mode: EarningsMode::default(),
            verify_passwords: default_verify_passwords(),
            bcrypt_cost: default_bcrypt_cost(),
            dashboard_cache_ttl_ms: default_dashboard_cache_ttl_ms(),
        }
    }
}
