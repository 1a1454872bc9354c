// src/earnings.rs
//! Closed-form earnings for a contract.
//!
//! The base term grows by one `daily_earnings` per whole elapsed day and is
//! clamped at the plan's full value. In [`EarningsMode::Compat`] the accrual
//! tick counter (`total_earned`) is added on top without a clamp.

use crate::models::{Contract, Plan};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Accrual ticks in one synthetic day.
pub const TICKS_PER_DAY: f64 = 24.0 * 60.0 * 20.0;

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EarningsMode {
    /// Tick counter stacks on the elapsed-time term; contracts never expire.
    #[default]
    Compat,
    /// Only the clamped elapsed-time term counts; contracts expire at `end_date`.
    Corrected,
}

/// Whole days since `start`, never negative.
pub fn days_elapsed(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed = now - start;
    if elapsed < Duration::zero() {
        return 0;
    }
    elapsed.num_days()
}

/// The elapsed-time term, clamped at the plan's full value.
pub fn base_earnings(contract: &Contract, plan: &Plan, now: DateTime<Utc>) -> f64 {
    let days = days_elapsed(contract.start_date, now) as f64;
    (days * plan.daily_earnings).min(plan.total_return())
}

pub fn compute_earnings(
    contract: &Contract,
    plan: &Plan,
    now: DateTime<Utc>,
    mode: EarningsMode,
) -> f64 {
    let base = base_earnings(contract, plan, now);
    match mode {
        EarningsMode::Compat => base + contract.total_earned,
        EarningsMode::Corrected => base,
    }
}

pub fn tick_increment(plan: &Plan) -> f64 {
    plan.daily_earnings / TICKS_PER_DAY
}

pub fn progress_percent(contract: &Contract, plan: &Plan, now: DateTime<Utc>) -> f64 {
    if plan.duration == 0 {
        return 100.0;
    }
    let days = days_elapsed(contract.start_date, now) as f64;
    (days / f64::from(plan.duration) * 100.0).min(100.0)
}
