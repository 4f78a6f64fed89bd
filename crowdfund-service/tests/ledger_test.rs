//! Ledger-level tests for the finalization compare-and-swap and status
//! transition invariants. Skips without `TEST_DATABASE_URL`.

mod common;

use common::TestApp;
use crowdfund_service::models::{DonationStatus, Gateway, NewDonation};
use crowdfund_service::services::FinalizeOutcome;
use rust_decimal::Decimal;
use uuid::Uuid;
use wiremock::MockServer;

fn new_donation(campaign_id: Uuid, amount: i64) -> NewDonation {
    NewDonation {
        campaign_id,
        reward_id: None,
        first_name: "Ada".to_string(),
        last_name: "Obi".to_string(),
        email: "ada@example.com".to_string(),
        phone_number: "+2348012345678".to_string(),
        amount: Decimal::from(amount),
        gateway: Gateway::Paystack,
        anonymous: false,
        requires_shipping: false,
        shipping_country: None,
        shipping_state: None,
        shipping_city: None,
        shipping_address: None,
        shipping_postal_code: None,
    }
}

#[tokio::test]
async fn finalize_applies_once_and_replays_report_the_prior_result() {
    let provider = MockServer::start().await;
    let Some(app) = TestApp::try_spawn(&provider.uri()).await else {
        return;
    };

    let user = app.seed_user().await;
    let (campaign, _) = app.seed_campaign(user, 50_000).await;

    let donation = app
        .ledger
        .create_donation(&new_donation(campaign, 5000))
        .await
        .unwrap();
    assert_eq!(donation.status, "pending");

    let reference = format!("ref_{}", Uuid::new_v4().simple());
    let first = app
        .ledger
        .finalize_donation(donation.id, &reference, "card", None)
        .await
        .unwrap();
    assert!(matches!(first, FinalizeOutcome::Applied { .. }));
    assert_eq!(app.campaign_funds(campaign).await, Decimal::from(5000));

    let second = app
        .ledger
        .finalize_donation(donation.id, &reference, "card", None)
        .await
        .unwrap();
    match second {
        FinalizeOutcome::AlreadyFinalized { status, .. } => {
            assert_eq!(status, DonationStatus::Approved)
        }
        other => panic!("expected AlreadyFinalized, got {:?}", other),
    }

    // Exactly one credit.
    assert_eq!(app.campaign_funds(campaign).await, Decimal::from(5000));
    assert_eq!(app.user_balance(user).await, Decimal::from(5000));
}

#[tokio::test]
async fn concurrent_duplicate_callbacks_credit_exactly_once() {
    let provider = MockServer::start().await;
    let Some(app) = TestApp::try_spawn(&provider.uri()).await else {
        return;
    };

    let user = app.seed_user().await;
    let (campaign, _) = app.seed_campaign(user, 50_000).await;

    let donation = app
        .ledger
        .create_donation(&new_donation(campaign, 700))
        .await
        .unwrap();

    let reference = format!("ref_{}", Uuid::new_v4().simple());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = app.ledger.clone();
        let donation_id = donation.id;
        let reference = reference.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .finalize_donation(donation_id, &reference, "card", None)
                .await
        }));
    }

    let mut applied = 0;
    let mut replayed = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            FinalizeOutcome::Applied { .. } => applied += 1,
            FinalizeOutcome::AlreadyFinalized { .. } => replayed += 1,
        }
    }

    assert_eq!(applied, 1, "exactly one callback may win the swap");
    assert_eq!(replayed, 7);
    assert_eq!(app.campaign_funds(campaign).await, Decimal::from(700));
    assert_eq!(app.user_balance(user).await, Decimal::from(700));
}

#[tokio::test]
async fn status_never_leaves_a_terminal_state() {
    let provider = MockServer::start().await;
    let Some(app) = TestApp::try_spawn(&provider.uri()).await else {
        return;
    };

    let user = app.seed_user().await;
    let (campaign, _) = app.seed_campaign(user, 50_000).await;

    // pending -> rejected, then a late callback must not approve it.
    let donation = app
        .ledger
        .create_donation(&new_donation(campaign, 900))
        .await
        .unwrap();
    app.ledger.reject_donation(donation.id).await.unwrap();

    let outcome = app
        .ledger
        .finalize_donation(donation.id, "ref_late_1", "card", None)
        .await
        .unwrap();
    match outcome {
        FinalizeOutcome::AlreadyFinalized { status, .. } => {
            assert_eq!(status, DonationStatus::Rejected)
        }
        other => panic!("expected AlreadyFinalized, got {:?}", other),
    }
    assert_eq!(app.campaign_funds(campaign).await, Decimal::ZERO);

    // Approved donations cannot be rejected.
    let donation = app
        .ledger
        .create_donation(&new_donation(campaign, 400))
        .await
        .unwrap();
    app.ledger
        .finalize_donation(donation.id, &format!("ref_{}", Uuid::new_v4().simple()), "card", None)
        .await
        .unwrap();
    let err = app.ledger.reject_donation(donation.id).await.unwrap_err();
    assert!(err.to_string().contains("Only pending donations"), "{}", err);
}

#[tokio::test]
async fn funds_raised_equals_the_sum_of_approved_amounts() {
    let provider = MockServer::start().await;
    let Some(app) = TestApp::try_spawn(&provider.uri()).await else {
        return;
    };

    let user = app.seed_user().await;
    let (campaign, _) = app.seed_campaign(user, 1_000_000).await;

    let mut expected = Decimal::ZERO;
    for amount in [250i64, 1200, 700] {
        let donation = app
            .ledger
            .create_donation(&new_donation(campaign, amount))
            .await
            .unwrap();
        app.ledger
            .finalize_donation(
                donation.id,
                &format!("ref_{}", Uuid::new_v4().simple()),
                "card",
                None,
            )
            .await
            .unwrap();
        expected += Decimal::from(amount);
    }

    // One pending donation that never completes.
    app.ledger
        .create_donation(&new_donation(campaign, 9999))
        .await
        .unwrap();

    let approved_sum: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM donations WHERE campaign_id = $1 AND status = 'approved'",
    )
    .bind(campaign)
    .fetch_one(&app.pool)
    .await
    .unwrap();

    assert_eq!(app.campaign_funds(campaign).await, expected);
    assert_eq!(approved_sum, expected);
    assert_eq!(app.user_balance(user).await, expected);
}
