pub mod database;
pub mod donation_handler;
pub mod donation_policy;
pub mod gateways;
pub mod ledger;
pub mod metrics;
pub mod reconciler;

pub use database::Database;
pub use donation_handler::DonationHandler;
pub use gateways::GatewayRegistry;
pub use ledger::{DonationLedger, FinalizeOutcome};
pub use metrics::{get_metrics, init_metrics};
pub use reconciler::{CallbackReconciler, Reconciliation};
