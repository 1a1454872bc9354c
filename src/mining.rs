// src/mining.rs
use crate::clock::Clock;
use crate::config::LedgerSettings;
use crate::db;
use crate::earnings::{self, EarningsMode};
use crate::error::AppError;
use crate::models::{
    CheckoutRequest, Contract, ContractView, DashboardStats, PaymentDetails, Plan, StartOutcome,
    StartRequest, User,
};
use crate::notify::{NotificationKind, Notifier, QueueNotifier, report};
use crate::plans::PlanCatalog;
use crate::pricing::{UnitPrice, convert_to_base_unit};
use crate::session::Session;
use crate::store::KeyValueStore;
use actix_web::{HttpResponse, get, post, web};
use chrono::Duration;
use moka::future::Cache;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub type DashboardCache = Cache<String, serde_json::Value>;

pub fn dashboard_cache(ttl: std::time::Duration) -> DashboardCache {
    Cache::builder()
        .max_capacity(1_000)
        .time_to_live(ttl)
        .build()
}

pub(crate) fn dashboard_cache_key(user_id: &Uuid) -> String {
    format!("dashboard_user_{}", user_id)
}

/// Contract creation, earnings accrual and per-user aggregates.
///
/// Every write is a read-modify-write of the user's whole contract list under
/// `write_lock`, so a tick never interleaves with a contract being opened.
pub struct MiningLedger {
    store: Arc<dyn KeyValueStore>,
    catalog: PlanCatalog,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    settings: LedgerSettings,
    write_lock: Mutex<()>,
}

impl MiningLedger {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        catalog: PlanCatalog,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            notifier,
            settings,
            write_lock: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn mode(&self) -> EarningsMode {
        self.settings.mode
    }

    pub fn plan(&self, plan_id: &str) -> Result<&Plan, AppError> {
        self.catalog
            .find(plan_id)
            .ok_or_else(|| AppError::NotFound(format!("Plan {} is not available", plan_id)))
    }

    /// Free plans open a contract immediately. Paid plans only report the
    /// checkout that `confirm_payment` has to complete.
    pub fn start_contract(&self, user: &User, plan_id: &str) -> Result<StartOutcome, AppError> {
        let result = self.try_start(user, plan_id);
        if let Ok(StartOutcome::Activated { contract }) = &result {
            let name = self.plan(&contract.plan_id).map(|p| p.name).unwrap_or("Mining");
            self.notifier.notify(
                &format!("{} contract activated successfully!", name),
                NotificationKind::Success,
            );
        }
        if result.is_err() {
            return report(
                self.notifier.as_ref(),
                result,
                |_| String::new(),
                "Failed to start mining contract",
            );
        }
        result
    }

    fn try_start(&self, user: &User, plan_id: &str) -> Result<StartOutcome, AppError> {
        let plan = self.plan(plan_id)?;
        if plan.is_free() {
            let contract = self.open_contract(&user.id, plan)?;
            return Ok(StartOutcome::Activated { contract });
        }
        tracing::info!("User {} selected paid plan {}", user.id, plan.id);
        Ok(StartOutcome::CheckoutRequired {
            plan: plan.clone(),
            amount: plan.price,
        })
    }

    /// Simulated checkout: nothing is verified, the contract opens after the
    /// configured delay. On failure no contract is written.
    pub async fn confirm_payment(
        &self,
        user: &User,
        plan_id: &str,
        payment: &PaymentDetails,
    ) -> Result<Contract, AppError> {
        let plan = match self.checkout_plan(plan_id, payment) {
            Ok(plan) => plan,
            Err(e) => {
                return report(
                    self.notifier.as_ref(),
                    Err(e),
                    |_| String::new(),
                    "Payment processing failed",
                );
            }
        };
        let amount = payment.amount.unwrap_or(plan.price);

        self.notifier
            .notify("Processing crypto payment...", NotificationKind::Success);
        let result = process_payment(payment, amount, self.settings.payment_delay)
            .await
            .and_then(|()| self.open_contract(&user.id, &plan));

        report(
            self.notifier.as_ref(),
            result,
            |_| format!("{} contract activated successfully!", plan.name),
            "Payment processing failed",
        )
    }

    fn checkout_plan(&self, plan_id: &str, payment: &PaymentDetails) -> Result<Plan, AppError> {
        let plan = self.plan(plan_id)?;
        if plan.is_free() {
            return Err(AppError::Validation(format!(
                "{} does not require payment",
                plan.name
            )));
        }
        if payment.wallet_address.trim().is_empty() {
            return Err(AppError::Validation(
                "Wallet address is required".to_string(),
            ));
        }
        Ok(plan.clone())
    }

    fn open_contract(&self, user_id: &Uuid, plan: &Plan) -> Result<Contract, AppError> {
        let now = self.clock.now();
        let contract = Contract {
            id: Uuid::new_v4(),
            user_id: *user_id,
            plan_id: plan.id.to_string(),
            start_date: now,
            end_date: now + Duration::days(i64::from(plan.duration)),
            total_earned: 0.0,
            is_active: true,
        };

        let _guard = self.lock();
        let store = self.store.as_ref();
        let mut contracts = db::get_contracts(store, user_id)?;
        contracts.push(contract.clone());
        db::save_contracts(store, user_id, &contracts)?;

        tracing::info!(
            "Opened contract {} on plan {} for user {}",
            contract.id,
            plan.id,
            user_id
        );
        Ok(contract)
    }

    /// One accrual step over the user's active contracts. Returns how many
    /// contracts were updated.
    pub fn accrue_tick(&self, user_id: &Uuid) -> Result<usize, AppError> {
        let _guard = self.lock();
        let store = self.store.as_ref();
        let mut contracts = db::get_contracts(store, user_id)?;
        let now = self.clock.now();

        let mut updated = 0;
        for contract in contracts.iter_mut().filter(|c| c.is_active) {
            let Some(plan) = self.catalog.find(&contract.plan_id) else {
                continue;
            };
            match self.settings.mode {
                EarningsMode::Compat => {
                    contract.total_earned += earnings::tick_increment(plan);
                }
                EarningsMode::Corrected => {
                    let earned = earnings::base_earnings(contract, plan, now);
                    contract.total_earned = earned;
                    if now >= contract.end_date {
                        contract.is_active = false;
                        tracing::info!("Contract {} reached its end date", contract.id);
                    }
                }
            }
            updated += 1;
        }

        if updated > 0 {
            db::save_contracts(store, user_id, &contracts)?;
        }
        Ok(updated)
    }

    pub fn has_active_contracts(&self, user_id: &Uuid) -> Result<bool, AppError> {
        Ok(db::get_contracts(self.store.as_ref(), user_id)?
            .iter()
            .any(|c| c.is_active))
    }

    pub fn contracts(&self, user_id: &Uuid) -> Result<Vec<Contract>, AppError> {
        Ok(db::get_contracts(self.store.as_ref(), user_id)?)
    }

    pub fn compute_earnings(&self, contract: &Contract) -> Result<f64, AppError> {
        let plan = self.plan(&contract.plan_id)?;
        Ok(earnings::compute_earnings(
            contract,
            plan,
            self.clock.now(),
            self.settings.mode,
        ))
    }

    /// Contracts whose plan left the catalog contribute nothing.
    pub fn total_earnings_across_contracts(&self, user_id: &Uuid) -> Result<f64, AppError> {
        let now = self.clock.now();
        Ok(self
            .contracts(user_id)?
            .iter()
            .filter_map(|c| {
                self.catalog
                    .find(&c.plan_id)
                    .map(|plan| earnings::compute_earnings(c, plan, now, self.settings.mode))
            })
            .sum())
    }

    pub fn total_daily_rate(&self, user_id: &Uuid) -> Result<f64, AppError> {
        Ok(self
            .contracts(user_id)?
            .iter()
            .filter(|c| c.is_active)
            .filter_map(|c| self.catalog.find(&c.plan_id))
            .map(|plan| plan.daily_earnings)
            .sum())
    }

    /// Renderable contracts plus the number hidden for lack of a plan.
    pub fn contract_views(
        &self,
        user_id: &Uuid,
        unit_price: f64,
    ) -> Result<(Vec<ContractView>, usize), AppError> {
        let now = self.clock.now();
        let contracts = self.contracts(user_id)?;
        let total = contracts.len();

        let views: Vec<ContractView> = contracts
            .into_iter()
            .filter_map(|contract| {
                let plan = self.catalog.find(&contract.plan_id)?;
                let earned = earnings::compute_earnings(&contract, plan, now, self.settings.mode);
                let days = earnings::days_elapsed(contract.start_date, now)
                    .min(i64::from(plan.duration));
                Some(ContractView {
                    plan_name: plan.name,
                    days_elapsed: days,
                    duration: plan.duration,
                    progress_percent: earnings::progress_percent(&contract, plan, now),
                    earnings: earned,
                    base_unit_earnings: convert_to_base_unit(earned, unit_price),
                    contract,
                })
            })
            .collect();

        let hidden = total - views.len();
        if hidden > 0 {
            tracing::warn!(
                "{} contract(s) for user {} reference plans missing from the catalog",
                hidden,
                user_id
            );
        }
        Ok((views, hidden))
    }

    pub fn dashboard(&self, user_id: &Uuid, unit_price: f64) -> Result<DashboardStats, AppError> {
        let (contracts, hidden) = self.contract_views(user_id, unit_price)?;

        let total_daily_rate: f64 = contracts
            .iter()
            .filter(|v| v.contract.is_active)
            .filter_map(|v| self.catalog.find(&v.contract.plan_id))
            .map(|plan| plan.daily_earnings)
            .sum();
        let total_earnings: f64 = contracts.iter().map(|v| v.earnings).sum();
        let total_base_unit_earnings: f64 = contracts.iter().map(|v| v.base_unit_earnings).sum();
        let base_unit_per_day = convert_to_base_unit(total_daily_rate, unit_price);

        Ok(DashboardStats {
            unit_price,
            total_daily_rate,
            monthly_projection: total_daily_rate * 30.0,
            total_earnings,
            total_base_unit_earnings,
            base_unit_per_second: base_unit_per_day / 86_400.0,
            base_unit_per_day,
            active_contracts: contracts.iter().filter(|v| v.contract.is_active).count(),
            total_contracts: contracts.len() + hidden,
            hidden_contracts: hidden,
            contracts,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// Fake payment processor: accepts everything after the delay.
async fn process_payment(
    payment: &PaymentDetails,
    amount: f64,
    delay: std::time::Duration,
) -> Result<(), AppError> {
    tracing::info!(
        "Processing payment: wallet={}, amount={}, currency={:?}",
        payment.wallet_address,
        amount,
        payment.currency
    );
    tokio::time::sleep(delay).await;
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanSummary<'a> {
    #[serde(flatten)]
    plan: &'a Plan,
    total_return: f64,
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_plans);
    cfg.service(start_mining);
    cfg.service(checkout);
    cfg.service(list_contracts);
    cfg.service(dashboard);
    cfg.service(get_unit_price);
    cfg.service(notifications);
}

#[get("/plans")]
pub async fn list_plans(ledger: web::Data<MiningLedger>) -> Result<HttpResponse, actix_web::Error> {
    let plans: Vec<PlanSummary> = ledger
        .catalog()
        .plans()
        .iter()
        .map(|plan| PlanSummary {
            plan,
            total_return: plan.total_return(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "plans": plans })))
}

#[post("/mining/start")]
pub async fn start_mining(
    ledger: web::Data<MiningLedger>,
    session: web::Data<Session>,
    cache: web::Data<DashboardCache>,
    req: web::Json<StartRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    let user = match session.require() {
        Ok(user) => user,
        Err(e) => return Ok(e.to_response()),
    };

    match ledger.start_contract(&user, &req.plan_id) {
        Ok(outcome @ StartOutcome::Activated { .. }) => {
            cache.invalidate(&dashboard_cache_key(&user.id)).await;
            Ok(HttpResponse::Created().json(outcome))
        }
        Ok(outcome) => Ok(HttpResponse::Ok().json(outcome)),
        Err(e) => Ok(e.to_response()),
    }
}

#[post("/mining/checkout")]
pub async fn checkout(
    ledger: web::Data<MiningLedger>,
    session: web::Data<Session>,
    cache: web::Data<DashboardCache>,
    req: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    let user = match session.require() {
        Ok(user) => user,
        Err(e) => return Ok(e.to_response()),
    };

    match ledger.confirm_payment(&user, &req.plan_id, &req.payment).await {
        Ok(contract) => {
            cache.invalidate(&dashboard_cache_key(&user.id)).await;
            Ok(HttpResponse::Created().json(json!({
                "message": "Contract activated",
                "contract": contract,
            })))
        }
        Err(e) => Ok(e.to_response()),
    }
}

#[get("/mining/contracts")]
pub async fn list_contracts(
    ledger: web::Data<MiningLedger>,
    session: web::Data<Session>,
    price: web::Data<UnitPrice>,
) -> Result<HttpResponse, actix_web::Error> {
    let user = match session.require() {
        Ok(user) => user,
        Err(e) => return Ok(e.to_response()),
    };

    match ledger.contract_views(&user.id, price.current()) {
        Ok((contracts, hidden)) => Ok(HttpResponse::Ok().json(json!({
            "contracts": contracts,
            "hidden": hidden,
        }))),
        Err(e) => Ok(e.to_response()),
    }
}

#[get("/mining/dashboard")]
pub async fn dashboard(
    ledger: web::Data<MiningLedger>,
    session: web::Data<Session>,
    price: web::Data<UnitPrice>,
    cache: web::Data<DashboardCache>,
) -> Result<HttpResponse, actix_web::Error> {
    let user = match session.require() {
        Ok(user) => user,
        Err(e) => return Ok(e.to_response()),
    };

    let cache_key = dashboard_cache_key(&user.id);
    if let Some(cached) = cache.get(&cache_key).await {
        tracing::debug!("Cache hit for key: {}", cache_key);
        return Ok(HttpResponse::Ok().json(cached));
    }

    let stats = match ledger.dashboard(&user.id, price.current()) {
        Ok(stats) => stats,
        Err(e) => return Ok(e.to_response()),
    };
    let response = match serde_json::to_value(&stats) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Failed to serialize dashboard: {}", e);
            return Ok(
                HttpResponse::InternalServerError().json(json!({"error": "Internal server error"}))
            );
        }
    };

    cache.insert(cache_key, response.clone()).await;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/price")]
pub async fn get_unit_price(
    price: web::Data<UnitPrice>,
) -> Result<HttpResponse, actix_web::Error> {
    Ok(HttpResponse::Ok().json(json!({ "unitPrice": price.current() })))
}

#[get("/notifications")]
pub async fn notifications(
    queue: web::Data<QueueNotifier>,
) -> Result<HttpResponse, actix_web::Error> {
    Ok(HttpResponse::Ok().json(json!({ "notifications": queue.drain() })))
}
