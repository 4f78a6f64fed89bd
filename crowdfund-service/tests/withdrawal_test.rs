//! Withdrawal lifecycle tests: request debits the balance, rejection
//! refunds it, approval settles it. Skips without `TEST_DATABASE_URL`.

mod common;

use common::TestApp;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;
use wiremock::MockServer;

async fn seed_user_with_balance(app: &TestApp, balance: i64) -> Uuid {
    let user = app.seed_user().await;
    sqlx::query("UPDATE users SET balance = $2 WHERE id = $1")
        .bind(user)
        .bind(Decimal::from(balance))
        .execute(&app.pool)
        .await
        .expect("Failed to set balance");
    user
}

async fn request(app: &TestApp, user: Uuid, amount: i64) -> reqwest::Response {
    app.api
        .post(format!("{}/withdrawals", app.address))
        .json(&json!({ "user_id": user, "amount": amount }))
        .send()
        .await
        .expect("Failed to request withdrawal")
}

#[tokio::test]
async fn request_debits_and_rejection_refunds() {
    let provider = MockServer::start().await;
    let Some(app) = TestApp::try_spawn(&provider.uri()).await else {
        return;
    };

    let user = seed_user_with_balance(&app, 5000).await;

    let response = request(&app, user, 3000).await;
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let withdrawal_id = body["withdrawal"]["id"].as_str().unwrap().to_string();

    // Debited up front.
    assert_eq!(app.user_balance(user).await, Decimal::from(2000));

    let response = app
        .api
        .post(format!("{}/withdrawals/{}/reject", app.address, withdrawal_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Refunded on rejection.
    assert_eq!(app.user_balance(user).await, Decimal::from(5000));

    // A second rejection finds nothing pending.
    let response = app
        .api
        .post(format!("{}/withdrawals/{}/reject", app.address, withdrawal_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    assert_eq!(app.user_balance(user).await, Decimal::from(5000));
}

#[tokio::test]
async fn approval_settles_without_further_balance_changes() {
    let provider = MockServer::start().await;
    let Some(app) = TestApp::try_spawn(&provider.uri()).await else {
        return;
    };

    let user = seed_user_with_balance(&app, 5000).await;

    let response = request(&app, user, 1000).await;
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    let withdrawal_id = body["withdrawal"]["id"].as_str().unwrap().to_string();

    assert_eq!(app.user_balance(user).await, Decimal::from(4000));

    let response = app
        .api
        .post(format!("{}/withdrawals/{}/approve", app.address, withdrawal_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["withdrawal"]["status"], "approved");

    // Approval does not move money again.
    assert_eq!(app.user_balance(user).await, Decimal::from(4000));

    // Approved withdrawals cannot be rejected back.
    let response = app
        .api
        .post(format!("{}/withdrawals/{}/reject", app.address, withdrawal_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    assert_eq!(app.user_balance(user).await, Decimal::from(4000));
}

#[tokio::test]
async fn requests_beyond_the_balance_are_rejected() {
    let provider = MockServer::start().await;
    let Some(app) = TestApp::try_spawn(&provider.uri()).await else {
        return;
    };

    let user = seed_user_with_balance(&app, 500).await;

    let response = request(&app, user, 800).await;
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    let message = body["errors"]["amount"][0].as_str().unwrap();
    assert!(message.contains("exceeds your available balance"), "{}", message);

    // Nothing was debited.
    assert_eq!(app.user_balance(user).await, Decimal::from(500));

    // Below the floor.
    let response = request(&app, user, 50).await;
    assert_eq!(response.status(), 400);
}
