//! Payment gateway clients.
//!
//! One client per provider behind the [`PaymentGateway`] trait. Each client
//! owns its own payload shapes, auth scheme, amount-unit conversion and
//! success predicate; the rest of the system only sees major currency units
//! and the provider-neutral [`VerifiedTransaction`].

pub mod flutterwave;
pub mod monnify;
pub mod paystack;
pub mod stripe;

pub use flutterwave::FlutterwaveClient;
pub use monnify::MonnifyClient;
pub use paystack::PaystackClient;
pub use stripe::StripeClient;

use crate::config::Config;
use crate::models::Gateway;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Blocking provider calls get an explicit deadline; a timeout surfaces as
/// [`GatewayError::Unavailable`].
pub(crate) const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(GATEWAY_TIMEOUT)
        .build()
        .expect("failed to build gateway HTTP client")
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required provider credentials are absent. Checked before any
    /// network call.
    #[error("{0} credentials are not configured")]
    Configuration(&'static str),

    #[error("Amount must be greater than zero.")]
    InvalidAmount,

    /// Network failure, timeout, or a non-2xx provider response. Carries
    /// the raw provider error body for diagnostics.
    #[error("provider request failed: {detail}")]
    Unavailable { detail: String },

    /// A 2xx provider response that does not match the integration
    /// contract.
    #[error("unexpected provider response: {0}")]
    Protocol(String),

    /// The provider accepted the request but declined it, with a
    /// provider-supplied message.
    #[error("{0}")]
    Declined(String),
}

impl GatewayError {
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::Unavailable {
            detail: format!("{}: {}", status, body),
        }
    }
}

/// A charge to hand to a provider. `amount` is the charged total (donation
/// amount plus the fixed fee) in major currency units.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub donation_id: Uuid,
    pub comment_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    /// Where the provider sends the donor after checkout.
    pub callback_url: String,
    /// Where the provider sends the donor on explicit cancellation.
    pub cancel_url: String,
    /// Payment description shown on the provider's checkout page.
    pub description: String,
}

impl ChargeRequest {
    pub fn customer_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A successfully created provider checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub authorization_url: String,
}

/// Authoritative transaction state, fetched server-to-server. The
/// provider-specific success predicate has already been applied.
#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    pub outcome: PaymentOutcome,
    pub reference: String,
    pub channel: String,
    /// Settled amount in major currency units.
    pub amount: Decimal,
    pub donation_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved,
    /// The donor abandoned or cancelled checkout.
    Cancelled,
    /// The provider reports a failed/negative state.
    Declined(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the provider credentials are present.
    fn is_configured(&self) -> bool;

    /// Build the provider-specific payload (embedding donation and comment
    /// ids as opaque metadata) and create a checkout the donor is
    /// redirected to.
    async fn initialize(&self, charge: &ChargeRequest) -> Result<CheckoutSession, GatewayError>;

    /// Server-to-server lookup of the authoritative transaction state.
    /// Client-supplied success flags are never trusted on their own.
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError>;
}

/// All four provider clients, selected by [`Gateway`].
pub struct GatewayRegistry {
    paystack: PaystackClient,
    flutterwave: FlutterwaveClient,
    monnify: MonnifyClient,
    stripe: StripeClient,
}

impl GatewayRegistry {
    pub fn new(config: &Config) -> Self {
        let registry = Self {
            paystack: PaystackClient::new(config.paystack.clone()),
            flutterwave: FlutterwaveClient::new(config.flutterwave.clone()),
            monnify: MonnifyClient::new(config.monnify.clone()),
            stripe: StripeClient::new(config.stripe.clone()),
        };

        for gateway in [
            Gateway::Paystack,
            Gateway::Flutterwave,
            Gateway::Monnify,
            Gateway::Stripe,
        ] {
            if registry.get(gateway).is_configured() {
                tracing::info!(gateway = %gateway, "payment gateway configured");
            } else {
                tracing::warn!(
                    gateway = %gateway,
                    "payment gateway credentials not configured - donations through it will fail"
                );
            }
        }

        registry
    }

    pub fn get(&self, gateway: Gateway) -> &dyn PaymentGateway {
        match gateway {
            Gateway::Paystack => &self.paystack,
            Gateway::Flutterwave => &self.flutterwave,
            Gateway::Monnify => &self.monnify,
            Gateway::Stripe => &self.stripe,
        }
    }
}
