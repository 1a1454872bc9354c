#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use cloudmine::clock::ManualClock;
use cloudmine::config::{AuthSettings, LedgerSettings};
use cloudmine::earnings::EarningsMode;
use cloudmine::notify::QueueNotifier;
use cloudmine::plans::PlanCatalog;
use cloudmine::session::Session;
use cloudmine::store::{KeyValueStore, MemoryStore, StoreError};
use cloudmine::{AccountStore, MiningLedger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Memory store whose writes can be switched off, for every key or for one.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    fail_key: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes_to(&self, key: Option<&str>) {
        *self.fail_key.lock().unwrap() = key.map(str::to_string);
    }

    fn check_write(&self, key: &str) -> Result<(), StoreError> {
        let key_blocked = self.fail_key.lock().unwrap().as_deref() == Some(key);
        if key_blocked || self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("writes to {} disabled", key)));
        }
        Ok(())
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.check_write(key)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_write(key)?;
        self.inner.remove(key)
    }
}

pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<QueueNotifier>,
    pub session: Arc<Session>,
    pub accounts: Arc<AccountStore>,
    pub ledger: Arc<MiningLedger>,
}

pub fn harness(mode: EarningsMode, verify_passwords: bool) -> Harness {
    harness_with_catalog(mode, verify_passwords, PlanCatalog::builtin())
}

pub fn harness_with_catalog(
    mode: EarningsMode,
    verify_passwords: bool,
    catalog: PlanCatalog,
) -> Harness {
    let store = Arc::new(FlakyStore::default());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap(),
    ));
    let notifier = Arc::new(QueueNotifier::new(64));
    let session = Arc::new(Session::new(store.clone()));
    let accounts = Arc::new(AccountStore::new(
        store.clone(),
        session.clone(),
        clock.clone(),
        notifier.clone(),
        AuthSettings {
            verify_passwords,
            bcrypt_cost: 4,
        },
    ));
    let ledger = Arc::new(MiningLedger::new(
        store.clone(),
        catalog,
        clock.clone(),
        notifier.clone(),
        LedgerSettings {
            mode,
            payment_delay: Duration::from_secs(2),
        },
    ));
    Harness {
        store,
        clock,
        notifier,
        session,
        accounts,
        ledger,
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
