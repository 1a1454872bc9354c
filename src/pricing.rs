// src/pricing.rs
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

pub const INITIAL_UNIT_PRICE: f64 = 67_500.0;
pub const DEFAULT_WALK_STEP: f64 = 50.0;

/// Simulated price of one base unit, moved by a random walk.
///
/// There is no floor: over a long enough run the price can reach zero or go
/// negative, and conversions then return infinite or negative amounts.
pub struct UnitPrice {
    bits: AtomicU64,
    step: f64,
}

impl UnitPrice {
    pub fn new(initial: f64, step: f64) -> Self {
        Self {
            bits: AtomicU64::new(initial.to_bits()),
            step,
        }
    }

    pub fn current(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }

    /// Move the price by a uniform amount in `[-step, step)` and return the new price.
    pub fn step_with<R: Rng>(&self, rng: &mut R) -> f64 {
        let delta = rng.gen_range(-1.0_f64..1.0) * self.step;
        self.apply(delta)
    }

    pub fn step_random(&self) -> f64 {
        self.step_with(&mut rand::thread_rng())
    }

    fn apply(&self, delta: f64) -> f64 {
        let previous = match self.bits.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| {
            Some((f64::from_bits(b) + delta).to_bits())
        }) {
            Ok(b) | Err(b) => b,
        };
        f64::from_bits(previous) + delta
    }
}

impl Default for UnitPrice {
    fn default() -> Self {
        Self::new(INITIAL_UNIT_PRICE, DEFAULT_WALK_STEP)
    }
}

pub fn convert_to_base_unit(amount: f64, unit_price: f64) -> f64 {
    amount / unit_price
}
