//! Donation orchestration: hand a pending donation to its gateway.

use crate::config::{AppConfig, CurrencyConfig, DonationConfig};
use crate::models::{Donation, Gateway};
use crate::services::gateways::{ChargeRequest, CheckoutSession, GatewayError, GatewayRegistry};
use crate::services::metrics::{DONATIONS_INITIATED, ERRORS_TOTAL};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The value charged at the gateway: the donation amount plus the fixed
/// platform fee. The stored donation amount (and therefore what the
/// campaign is credited) never includes the fee.
pub fn charged_total(amount: Decimal, fixed_fee: Decimal) -> Decimal {
    amount + fixed_fee
}

pub struct DonationHandler {
    registry: Arc<GatewayRegistry>,
    app: AppConfig,
    donation: DonationConfig,
    currency: CurrencyConfig,
}

impl DonationHandler {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        app: AppConfig,
        donation: DonationConfig,
        currency: CurrencyConfig,
    ) -> Self {
        Self {
            registry,
            app,
            donation,
            currency,
        }
    }

    /// Dispatch a pending donation to its selected gateway and return the
    /// checkout the donor should be redirected to.
    ///
    /// On gateway failure the donation row is left pending on purpose: the
    /// donor can resubmit without orphaning references already sent out.
    pub async fn process_donation(
        &self,
        donation: &Donation,
        comment_id: Option<Uuid>,
    ) -> Result<CheckoutSession, AppError> {
        let gateway = donation
            .parsed_gateway()
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unsupported payment gateway.")))?;

        let charge = ChargeRequest {
            donation_id: donation.id,
            comment_id,
            amount: charged_total(donation.amount, self.donation.fixed_fee),
            currency: self.currency.code.clone(),
            email: donation.email.clone(),
            first_name: donation.first_name.clone(),
            last_name: donation.last_name.clone(),
            phone_number: donation.phone_number.clone(),
            callback_url: self.app.callback_url(gateway.as_str(), donation.id),
            cancel_url: self.app.cancel_url(donation.id),
            description: self.app.name.clone(),
        };

        DONATIONS_INITIATED
            .with_label_values(&[gateway.as_str()])
            .inc();

        let session = self
            .registry
            .get(gateway)
            .initialize(&charge)
            .await
            .map_err(|e| map_gateway_error(gateway, e))?;

        info!(
            donation_id = %donation.id,
            gateway = %gateway,
            charged = %charge.amount,
            "Donation dispatched to gateway"
        );

        Ok(session)
    }
}

/// Translate a gateway failure into the application taxonomy.
pub(crate) fn map_gateway_error(gateway: Gateway, err: GatewayError) -> AppError {
    match err {
        GatewayError::Configuration(provider) => {
            ERRORS_TOTAL.with_label_values(&["gateway_config"]).inc();
            AppError::Configuration(anyhow::anyhow!(
                "{} credentials are not configured",
                provider
            ))
        }
        GatewayError::InvalidAmount => AppError::Field {
            field: "amount",
            message: "Amount must be greater than zero.".to_string(),
        },
        GatewayError::Unavailable { detail } => {
            ERRORS_TOTAL.with_label_values(&["gateway_error"]).inc();
            tracing::error!(gateway = %gateway, detail = %detail, "gateway request failed");
            AppError::GatewayUnavailable { detail }
        }
        GatewayError::Protocol(detail) => {
            ERRORS_TOTAL.with_label_values(&["gateway_protocol"]).inc();
            tracing::error!(gateway = %gateway, detail = %detail, "unexpected gateway response");
            AppError::GatewayUnavailable { detail }
        }
        GatewayError::Declined(message) => AppError::BadRequest(anyhow::anyhow!(message)),
    }
}
