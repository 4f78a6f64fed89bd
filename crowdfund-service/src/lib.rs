pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use platform_core::middleware::request_id_middleware;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{
    init_metrics, CallbackReconciler, Database, DonationHandler, DonationLedger, GatewayRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub ledger: DonationLedger,
    pub registry: Arc<GatewayRegistry>,
    pub donation_handler: Arc<DonationHandler>,
    pub reconciler: Arc<CallbackReconciler>,
    pub config: Config,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let ledger = DonationLedger::new(&db);
        let registry = Arc::new(GatewayRegistry::new(&config));
        let donation_handler = Arc::new(DonationHandler::new(
            registry.clone(),
            config.app.clone(),
            config.donation.clone(),
            config.currency.clone(),
        ));
        let reconciler = Arc::new(CallbackReconciler::new(registry.clone(), ledger.clone()));

        let state = AppState {
            db,
            ledger,
            registry,
            donation_handler,
            reconciler,
            config: config.clone(),
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics))
            // Campaign browsing
            .route("/campaigns", get(handlers::campaigns::list_campaigns))
            .route("/campaigns/:slug", get(handlers::campaigns::show_campaign))
            .route("/campaigns/:slug/donate", get(handlers::donations::donate_page))
            // Donations
            .route("/donations", post(handlers::donations::make_payment))
            .route("/donations/status", get(handlers::donations::receipt))
            .route(
                "/payments/:donation_id/failed",
                get(handlers::donations::payment_failed),
            )
            .route(
                "/payments/:donation_id/cancelled",
                get(handlers::donations::payment_cancelled),
            )
            .route(
                "/payments/:donation_id/error",
                get(handlers::donations::payment_error),
            )
            // Gateway callbacks
            .route("/callbacks/paystack", get(handlers::callbacks::paystack))
            .route("/callbacks/flutterwave", get(handlers::callbacks::flutterwave))
            .route("/callbacks/monnify", get(handlers::callbacks::monnify))
            .route("/callbacks/stripe", get(handlers::callbacks::stripe))
            // Withdrawals
            .route("/withdrawals", post(handlers::withdrawals::request_withdrawal))
            .route(
                "/withdrawals/:id/approve",
                post(handlers::withdrawals::approve_withdrawal),
            )
            .route(
                "/withdrawals/:id/reject",
                post(handlers::withdrawals::reject_withdrawal),
            )
            .layer(TraceLayer::new_for_http())
            .layer(from_fn(request_id_middleware))
            .layer(CorsLayer::permissive())
            .with_state(state);

        // Bind here so tests can ask for port 0 and read the real port back.
        let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on port {}", self.port);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
