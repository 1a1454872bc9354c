// src/main.rs
use actix_web::{App, HttpServer, middleware::Logger, web};
use cloudmine::clock::{Clock, SystemClock};
use cloudmine::config::Config;
use cloudmine::mining::{self, MiningLedger};
use cloudmine::notify::QueueNotifier;
use cloudmine::plans::PlanCatalog;
use cloudmine::pricing::UnitPrice;
use cloudmine::scheduler::{self, AccrualTasks};
use cloudmine::session::Session;
use cloudmine::store::{FileStore, KeyValueStore, MemoryStore};
use cloudmine::{AccountStore, auth};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    tracing::info!("Starting cloud mining simulator");

    dotenv::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");

    let store: Arc<dyn KeyValueStore> = match &config.data_dir {
        Some(dir) => Arc::new(FileStore::open(dir).expect("Failed to open data directory")),
        None => {
            tracing::warn!("DATA_DIR not set, state will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier = Arc::new(QueueNotifier::new(100));
    let session = Arc::new(Session::new(store.clone()));

    let accounts = Arc::new(AccountStore::new(
        store.clone(),
        session.clone(),
        clock.clone(),
        notifier.clone(),
        config.auth_settings(),
    ));
    let ledger = Arc::new(MiningLedger::new(
        store,
        PlanCatalog::builtin(),
        clock,
        notifier.clone(),
        config.ledger_settings(),
    ));
    tracing::info!("Earnings mode: {:?}", ledger.mode());

    let price = Arc::new(UnitPrice::new(
        config.initial_unit_price,
        config.price_walk_step,
    ));
    let price_walk = scheduler::spawn_price_walk(price.clone(), config.price_walk_period());
    let cache = mining::dashboard_cache(config.dashboard_cache_ttl());
    let accrual = Arc::new(AccrualTasks::new(config.accrual_period(), cache.clone()));

    match accounts.restore_session() {
        Ok(Some(user)) => accrual.follow(ledger.clone(), user.id),
        Ok(None) => tracing::info!("No saved session"),
        Err(e) => tracing::error!("Failed to restore session: {}", e),
    }

    let server = {
        let accrual = accrual.clone();
        HttpServer::new(move || {
            App::new()
                .app_data(web::Data::from(accounts.clone()))
                .app_data(web::Data::from(ledger.clone()))
                .app_data(web::Data::from(session.clone()))
                .app_data(web::Data::from(price.clone()))
                .app_data(web::Data::from(accrual.clone()))
                .app_data(web::Data::from(notifier.clone()))
                .app_data(web::Data::new(cache.clone()))
                .wrap(Logger::default())
                .configure(auth::init_routes)
                .configure(mining::init_routes)
        })
        .bind((config.bind_host.as_str(), config.bind_port))?
        .run()
    };

    let result = server.await;
    price_walk.stop();
    accrual.stop();
    result
}
