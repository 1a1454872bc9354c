// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A mining tier from the fixed catalog.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    pub price: f64,
    pub daily_earnings: f64,
    pub hash_rate: &'static str,
    /// Contract length in days.
    pub duration: u32,
    pub features: &'static [&'static str],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub popular: bool,
}

impl Plan {
    pub fn is_free(&self) -> bool {
        self.price == 0.0
    }

    /// Full value of the contract when run to the end.
    pub fn total_return(&self) -> f64 {
        self.daily_earnings * f64::from(self.duration)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user's running instance of a plan.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub total_earned: f64,
    pub is_active: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentCurrency {
    #[default]
    Btc,
    Eth,
    Usdt,
    Ltc,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default)]
    pub currency: PaymentCurrency,
    pub wallet_address: String,
    /// Defaults to the plan price when omitted.
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email or username.
    #[serde(alias = "email", alias = "username")]
    pub identifier: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub plan_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan_id: String,
    #[serde(flatten)]
    pub payment: PaymentDetails,
}

/// What `start_contract` did: either a running contract or a pending checkout.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    Activated { contract: Contract },
    CheckoutRequired { plan: Plan, amount: f64 },
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContractView {
    #[serde(flatten)]
    pub contract: Contract,
    pub plan_name: &'static str,
    pub days_elapsed: i64,
    pub duration: u32,
    pub progress_percent: f64,
    pub earnings: f64,
    pub base_unit_earnings: f64,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub unit_price: f64,
    pub total_daily_rate: f64,
    pub monthly_projection: f64,
    pub total_earnings: f64,
    pub total_base_unit_earnings: f64,
    pub base_unit_per_second: f64,
    pub base_unit_per_day: f64,
    pub active_contracts: usize,
    pub total_contracts: usize,
    /// Contracts whose plan is no longer in the catalog.
    pub hidden_contracts: usize,
    pub contracts: Vec<ContractView>,
}
