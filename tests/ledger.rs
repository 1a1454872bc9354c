mod common;

use chrono::Duration;
use cloudmine::AppError;
use cloudmine::clock::Clock;
use cloudmine::db;
use cloudmine::earnings::EarningsMode;
use cloudmine::models::{
    Contract, PaymentCurrency, PaymentDetails, RegisterRequest, StartOutcome, User,
};
use cloudmine::plans::PlanCatalog;
use common::{Harness, approx, harness, harness_with_catalog};
use uuid::Uuid;

fn signed_up(h: &Harness) -> User {
    h.accounts
        .register(&RegisterRequest {
            username: "miner".to_string(),
            email: "miner@example.com".to_string(),
            password: "pw".to_string(),
            confirm_password: "pw".to_string(),
        })
        .unwrap()
}

fn payment() -> PaymentDetails {
    PaymentDetails {
        currency: PaymentCurrency::Btc,
        wallet_address: "bc1qexampleaddress".to_string(),
        amount: None,
    }
}

#[test]
fn test_free_plan_creates_exactly_one_contract() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);

    let outcome = h.ledger.start_contract(&user, "free").unwrap();
    assert!(matches!(outcome, StartOutcome::Activated { .. }));

    let contracts = h.ledger.contracts(&user.id).unwrap();
    assert_eq!(contracts.len(), 1);
    assert!(contracts[0].is_active);
    assert_eq!(contracts[0].user_id, user.id);
}

#[test]
fn test_paid_plan_waits_for_checkout() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);

    let outcome = h.ledger.start_contract(&user, "basic").unwrap();
    match outcome {
        StartOutcome::CheckoutRequired { plan, amount } => {
            assert_eq!(plan.id, "basic");
            assert_eq!(amount, 45.0);
        }
        other => panic!("expected checkout, got {:?}", other),
    }
    assert!(h.ledger.contracts(&user.id).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_basic_plan_earnings_over_time() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    h.ledger.start_contract(&user, "basic").unwrap();

    let contract = h
        .ledger
        .confirm_payment(&user, "basic", &payment())
        .await
        .unwrap();
    assert_eq!(h.ledger.contracts(&user.id).unwrap(), vec![contract.clone()]);
    assert_eq!(contract.end_date - contract.start_date, Duration::days(90));

    assert!(approx(h.ledger.compute_earnings(&contract).unwrap(), 0.0));

    h.clock.advance(Duration::days(10));
    assert!(approx(h.ledger.compute_earnings(&contract).unwrap(), 172.0));

    h.clock.advance(Duration::days(190));
    assert!(approx(h.ledger.compute_earnings(&contract).unwrap(), 1548.0));

    let messages: Vec<_> = h.notifier.drain().into_iter().map(|n| n.message).collect();
    assert!(messages.contains(&"Processing crypto payment...".to_string()));
    assert!(messages.contains(&"Basic Miner contract activated successfully!".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_checkout_requires_wallet_address() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    let mut details = payment();
    details.wallet_address = "   ".to_string();

    let err = h
        .ledger
        .confirm_payment(&user, "pro", &details)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(h.ledger.contracts(&user.id).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_checkout_of_free_plan_is_rejected() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    let err = h
        .ledger
        .confirm_payment(&user, "free", &payment())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test(start_paused = true)]
async fn test_failed_checkout_commits_nothing() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    h.store.fail_writes(true);

    let err = h
        .ledger
        .confirm_payment(&user, "enterprise", &payment())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Store(_)));

    h.store.fail_writes(false);
    assert!(h.ledger.contracts(&user.id).unwrap().is_empty());
    assert_eq!(
        h.notifier.drain().pop().unwrap().message,
        "Payment processing failed"
    );
}

fn fixture(user_id: Uuid, plan_id: &str, h: &Harness, is_active: bool) -> Contract {
    let now = h.clock.now();
    Contract {
        id: Uuid::new_v4(),
        user_id,
        plan_id: plan_id.to_string(),
        start_date: now,
        end_date: now + Duration::days(90),
        total_earned: 0.0,
        is_active,
    }
}

#[test]
fn test_earnings_at_start_equal_tick_counter() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    h.ledger.start_contract(&user, "free").unwrap();
    for _ in 0..5 {
        h.ledger.accrue_tick(&user.id).unwrap();
    }

    let contract = h.ledger.contracts(&user.id).unwrap().remove(0);
    assert!(contract.total_earned > 0.0);
    assert!(approx(
        h.ledger.compute_earnings(&contract).unwrap(),
        contract.total_earned
    ));
}

#[test]
fn test_compat_earnings_can_exceed_contract_value() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    h.ledger.start_contract(&user, "free").unwrap();

    h.clock.advance(Duration::days(31));
    h.ledger.accrue_tick(&user.id).unwrap();
    let contract = h.ledger.contracts(&user.id).unwrap().remove(0);

    let earned = h.ledger.compute_earnings(&contract).unwrap();
    assert!(approx(earned, 3.0 + contract.total_earned));
    assert!(earned > 3.0);
}

#[test]
fn test_corrected_earnings_never_exceed_contract_value() {
    let h = harness(EarningsMode::Corrected, true);
    let user = signed_up(&h);
    h.ledger.start_contract(&user, "free").unwrap();

    for _ in 0..50 {
        h.clock.advance(Duration::days(1));
        h.ledger.accrue_tick(&user.id).unwrap();
    }
    assert!(approx(
        h.ledger.total_earnings_across_contracts(&user.id).unwrap(),
        3.0
    ));
    assert!(!h.ledger.has_active_contracts(&user.id).unwrap());
}

#[test]
fn test_earnings_monotonic_without_ticks() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    let contract = fixture(user.id, "enterprise", &h, true);

    let mut previous = h.ledger.compute_earnings(&contract).unwrap();
    for _ in 0..400 {
        h.clock.advance(Duration::hours(23));
        let earned = h.ledger.compute_earnings(&contract).unwrap();
        assert!(earned >= previous);
        previous = earned;
    }
    assert!(approx(previous, 115.4 * 365.0));
}

#[test]
fn test_daily_rate_skips_inactive_contracts() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    let contracts = vec![
        fixture(user.id, "basic", &h, true),
        fixture(user.id, "pro", &h, false),
        fixture(user.id, "free", &h, true),
    ];
    db::save_contracts(h.store.as_ref(), &user.id, &contracts).unwrap();

    assert!(approx(h.ledger.total_daily_rate(&user.id).unwrap(), 17.3));

    let stats = h.ledger.dashboard(&user.id, 67_500.0).unwrap();
    assert_eq!(stats.active_contracts, 2);
    assert_eq!(stats.total_contracts, 3);
    assert!(approx(stats.monthly_projection, 17.3 * 30.0));
}

#[test]
fn test_inactive_contract_is_not_ticked() {
    let h = harness(EarningsMode::Compat, true);
    let user = signed_up(&h);
    db::save_contracts(
        h.store.as_ref(),
        &user.id,
        &[fixture(user.id, "basic", &h, false)],
    )
    .unwrap();

    assert_eq!(h.ledger.accrue_tick(&user.id).unwrap(), 0);
    assert_eq!(h.ledger.contracts(&user.id).unwrap()[0].total_earned, 0.0);
}

#[test]
fn test_contract_with_missing_plan_is_hidden() {
    let h = harness_with_catalog(
        EarningsMode::Compat,
        true,
        PlanCatalog::new(
            PlanCatalog::builtin()
                .plans()
                .iter()
                .filter(|p| p.id != "pro")
                .cloned()
                .collect(),
        ),
    );
    let user = signed_up(&h);
    let orphan = fixture(user.id, "pro", &h, true);
    db::save_contracts(
        h.store.as_ref(),
        &user.id,
        &[orphan.clone(), fixture(user.id, "basic", &h, true)],
    )
    .unwrap();
    h.clock.advance(Duration::days(2));

    let err = h.ledger.compute_earnings(&orphan).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(approx(
        h.ledger.total_earnings_across_contracts(&user.id).unwrap(),
        34.4
    ));
    assert!(approx(h.ledger.total_daily_rate(&user.id).unwrap(), 17.2));

    let (views, hidden) = h.ledger.contract_views(&user.id, 67_500.0).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(hidden, 1);

    // Ticks leave the orphan untouched.
    h.ledger.accrue_tick(&user.id).unwrap();
    let stored = h.ledger.contracts(&user.id).unwrap();
    assert_eq!(stored[0].total_earned, 0.0);
    assert!(stored[1].total_earned > 0.0);
}

#[test]
fn test_dashboard_conversions() {
    let h = harness(EarningsMode::Corrected, true);
    let user = signed_up(&h);
    db::save_contracts(
        h.store.as_ref(),
        &user.id,
        &[fixture(user.id, "basic", &h, true)],
    )
    .unwrap();
    h.clock.advance(Duration::days(45));

    let stats = h.ledger.dashboard(&user.id, 86_000.0).unwrap();
    let view = &stats.contracts[0];
    assert_eq!(view.days_elapsed, 45);
    assert!(approx(view.progress_percent, 50.0));
    assert!(approx(view.earnings, 17.2 * 45.0));
    assert!(approx(view.base_unit_earnings, 17.2 * 45.0 / 86_000.0));
    assert!(approx(stats.base_unit_per_day, 17.2 / 86_000.0));
    assert!(approx(stats.base_unit_per_second, 17.2 / 86_000.0 / 86_400.0));
    assert_eq!(stats.hidden_contracts, 0);
}
