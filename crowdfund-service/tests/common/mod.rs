//! Common test utilities for crowdfund-service integration tests.

#![allow(dead_code)]

use crowdfund_service::config::{
    AppConfig, Config, CurrencyConfig, DatabaseConfig, DonationConfig, FlutterwaveConfig,
    MonnifyConfig, PaystackConfig, ServerConfig, StripeConfig,
};
use crowdfund_service::services::{Database, DonationLedger};
use crowdfund_service::Application;
use rust_decimal::Decimal;
use secrecy::Secret;
use sqlx::postgres::PgPool;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,crowdfund_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    /// HTTP client that does not follow redirects, so callback responses
    /// can be asserted on directly.
    pub api: reqwest::Client,
    pub pool: PgPool,
    pub db: Database,
    pub ledger: DonationLedger,
}

/// Test configuration pointing every provider at `gateway_base` (a
/// wiremock server).
pub fn test_config(database_url: &str, gateway_base: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // random port
        },
        database: DatabaseConfig {
            url: Secret::new(database_url.to_string()),
            max_connections: 2,
            min_connections: 1,
        },
        app: AppConfig {
            name: "Crowdfund Test".to_string(),
            base_url: "http://testserver".to_string(),
        },
        donation: DonationConfig {
            min_amount: Decimal::from(100),
            max_amount: Decimal::from(1_000_000),
            fixed_fee: Decimal::from(50),
        },
        currency: CurrencyConfig {
            code: "NGN".to_string(),
            symbol: "₦".to_string(),
            precision: 2,
        },
        paystack: PaystackConfig {
            secret_key: Secret::new("sk_test_paystack".to_string()),
            api_base_url: gateway_base.to_string(),
        },
        flutterwave: FlutterwaveConfig {
            secret_key: Secret::new("sk_test_flutterwave".to_string()),
            api_base_url: gateway_base.to_string(),
        },
        monnify: MonnifyConfig {
            api_key: "mk_test_monnify".to_string(),
            secret_key: Secret::new("sk_test_monnify".to_string()),
            contract_code: "1234567890".to_string(),
            api_base_url: gateway_base.to_string(),
        },
        stripe: StripeConfig {
            secret_key: Secret::new("sk_test_stripe".to_string()),
            api_base_url: gateway_base.to_string(),
        },
        service_name: "crowdfund-service-test".to_string(),
    }
}

impl TestApp {
    /// Spawn the application against the database named by
    /// `TEST_DATABASE_URL`. Returns `None` (and the caller should skip)
    /// when no test database is configured.
    pub async fn try_spawn(gateway_base: &str) -> Option<Self> {
        init_tracing();

        let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return None;
        };

        let config = test_config(&database_url, gateway_base);
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let api = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build test client");

        // Wait for the server to come up.
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if api.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        let db = Database::new(&database_url, 2, 1)
            .await
            .expect("Failed to connect test database");
        let pool = db.pool().clone();
        let ledger = DonationLedger::new(&db);

        Some(TestApp {
            address,
            port,
            api,
            pool,
            db,
            ledger,
        })
    }

    // -------------------------------------------------------------------------
    // Seed helpers: every test works against rows it created itself.
    // -------------------------------------------------------------------------

    pub async fn seed_user(&self) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind("Chidi")
        .bind("Okafor")
        .bind(format!("owner-{}@example.com", id.simple()))
        .execute(&self.pool)
        .await
        .expect("Failed to seed user");
        id
    }

    pub async fn seed_campaign(&self, user_id: Uuid, goal: i64) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let slug = format!("campaign-{}", id.simple());
        sqlx::query(
            "INSERT INTO campaigns (id, user_id, title, slug, goal) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(user_id)
        .bind("Clean water for Umuofia")
        .bind(&slug)
        .bind(Decimal::from(goal))
        .execute(&self.pool)
        .await
        .expect("Failed to seed campaign");
        (id, slug)
    }

    pub async fn seed_reward(
        &self,
        campaign_id: Uuid,
        amount: i64,
        requires_shipping: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO rewards (id, campaign_id, title, amount, requires_shipping) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(campaign_id)
        .bind("Thank-you postcard")
        .bind(Decimal::from(amount))
        .bind(requires_shipping)
        .execute(&self.pool)
        .await
        .expect("Failed to seed reward");
        id
    }

    // -------------------------------------------------------------------------
    // State probes
    // -------------------------------------------------------------------------

    pub async fn campaign_funds(&self, campaign_id: Uuid) -> Decimal {
        sqlx::query_scalar("SELECT funds_raised FROM campaigns WHERE id = $1")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to fetch campaign funds")
    }

    pub async fn user_balance(&self, user_id: Uuid) -> Decimal {
        sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to fetch user balance")
    }

    pub async fn donation_row(
        &self,
        donation_id: Uuid,
    ) -> (String, Option<String>, Option<String>) {
        sqlx::query_as(
            "SELECT status, transaction_reference, channel FROM donations WHERE id = $1",
        )
        .bind(donation_id)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to fetch donation")
    }

    pub async fn comment_statuses(&self, campaign_id: Uuid) -> Vec<String> {
        sqlx::query_scalar("SELECT status FROM comments WHERE campaign_id = $1")
            .bind(campaign_id)
            .fetch_all(&self.pool)
            .await
            .expect("Failed to fetch comments")
    }
}
