// src/scheduler.rs
//! Periodic background tasks. Each task owns one concern and is stopped
//! through the [`TaskHandle`] returned when it was spawned.

use crate::mining::{DashboardCache, MiningLedger, dashboard_cache_key};
use crate::pricing::UnitPrice;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info};
use uuid::Uuid;

pub struct TaskHandle {
    name: String,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {
        self.handle.abort();
        info!("Stopped background task {}", self.name);
    }
}

/// The first tick fires one full period after spawning.
fn periodic(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

pub fn spawn_price_walk(price: Arc<UnitPrice>, period: Duration) -> TaskHandle {
    let handle = tokio::spawn(async move {
        let mut interval = periodic(period);
        loop {
            interval.tick().await;
            let value = price.step_random();
            debug!("Unit price moved to {:.2}", value);
        }
    });
    info!("Started unit price walk every {:?}", period);
    TaskHandle {
        name: "price-walk".to_string(),
        handle,
    }
}

/// Ticks that update a contract also drop the user's cached dashboard.
pub fn spawn_accrual(
    ledger: Arc<MiningLedger>,
    cache: DashboardCache,
    user_id: Uuid,
    period: Duration,
) -> TaskHandle {
    let handle = tokio::spawn(async move {
        let cache_key = dashboard_cache_key(&user_id);
        let mut interval = periodic(period);
        loop {
            interval.tick().await;
            match ledger.accrue_tick(&user_id) {
                Ok(0) => {}
                Ok(updated) => {
                    cache.invalidate(&cache_key).await;
                    debug!("Accrued {} contract(s) for user {}", updated, user_id);
                }
                Err(e) => error!("Error running accrual tick for {}: {}", user_id, e),
            }
        }
    });
    info!("Started accrual for user {} every {:?}", user_id, period);
    TaskHandle {
        name: format!("accrual-{}", user_id),
        handle,
    }
}

/// The accrual task for whoever holds the session. At most one runs.
pub struct AccrualTasks {
    period: Duration,
    cache: DashboardCache,
    current: Mutex<Option<(Uuid, TaskHandle)>>,
}

impl AccrualTasks {
    pub fn new(period: Duration, cache: DashboardCache) -> Self {
        Self {
            period,
            cache,
            current: Mutex::new(None),
        }
    }

    /// Run accrual for `user_id`, replacing any task for another user.
    pub fn follow(&self, ledger: Arc<MiningLedger>, user_id: Uuid) {
        let mut current = self.lock();
        if let Some((running, handle)) = current.as_ref() {
            if *running == user_id && !handle.is_finished() {
                return;
            }
        }
        if let Some((_, previous)) = current.take() {
            previous.stop();
        }
        let handle = spawn_accrual(ledger, self.cache.clone(), user_id, self.period);
        *current = Some((user_id, handle));
    }

    pub fn stop(&self) {
        if let Some((_, handle)) = self.lock().take() {
            handle.stop();
        }
    }

    pub fn running_for(&self) -> Option<Uuid> {
        self.lock().as_ref().map(|(user_id, _)| *user_id)
    }

    fn lock(&self) -> MutexGuard<'_, Option<(Uuid, TaskHandle)>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
