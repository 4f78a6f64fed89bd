//! Stripe gateway client (Checkout Sessions API).
//!
//! Stripe takes form-encoded requests with bracketed keys and works in
//! minor currency units: `unit_amount` is the charge ×100 and the settled
//! `amount_total` is divided back down on verification. Approval needs the
//! dual check `payment_status == "paid"` and `status == "complete"`.

use super::{
    build_http_client, ChargeRequest, CheckoutSession, GatewayError, PaymentGateway,
    PaymentOutcome, VerifiedTransaction,
};
use crate::config::StripeConfig;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct Session {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    payment_method_types: Vec<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    payment_status: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            http: build_http_client(),
            config,
        }
    }

    fn check_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::Configuration("Stripe"))
        }
    }

    fn evaluate(session: Session) -> VerifiedTransaction {
        let approved = session.payment_status == "paid" && session.status == "complete";

        let outcome = if approved {
            PaymentOutcome::Approved
        } else {
            PaymentOutcome::Declined(format!(
                "checkout session is {} with payment status {}",
                session.status, session.payment_status
            ))
        };

        let metadata = session.metadata.unwrap_or_default();
        let donation_id = metadata
            .get("donation_id")
            .and_then(|v| Uuid::parse_str(v).ok());
        let comment_id = metadata
            .get("comment_id")
            .and_then(|v| Uuid::parse_str(v).ok());

        VerifiedTransaction {
            outcome,
            reference: session.payment_intent.unwrap_or(session.id),
            channel: session.payment_method_types.join(","),
            amount: Decimal::from(session.amount_total.unwrap_or_default())
                / Decimal::ONE_HUNDRED,
            donation_id,
            comment_id,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    fn name(&self) -> &'static str {
        "stripe"
    }

    fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    async fn initialize(&self, charge: &ChargeRequest) -> Result<CheckoutSession, GatewayError> {
        self.check_configured()?;

        if charge.amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount);
        }

        let unit_amount = (charge.amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or(GatewayError::InvalidAmount)?;

        let success_url = format!("{}&session_id={{CHECKOUT_SESSION_ID}}", charge.callback_url);
        let mut form: Vec<(&str, String)> = vec![
            ("payment_method_types[0]", "card".to_string()),
            ("customer_email", charge.email.clone()),
            (
                "line_items[0][price_data][currency]",
                charge.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                charge.description.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                unit_amount.to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("mode", "payment".to_string()),
            ("success_url", success_url),
            ("cancel_url", charge.cancel_url.clone()),
            ("metadata[donation_id]", charge.donation_id.to_string()),
        ];
        if let Some(comment_id) = charge.comment_id {
            form.push(("metadata[comment_id]", comment_id.to_string()));
        }

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::from_response(response).await);
        }

        let session: Session = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        let authorization_url = session
            .url
            .ok_or_else(|| GatewayError::Protocol("checkout session has no url".to_string()))?;

        Ok(CheckoutSession { authorization_url })
    }

    async fn verify(&self, session_id: &str) -> Result<VerifiedTransaction, GatewayError> {
        self.check_configured()?;

        let url = format!("{}/v1/checkout/sessions/{}", self.config.api_base_url, session_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::from_response(response).await);
        }

        let session: Session = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        Ok(Self::evaluate(session))
    }
}
