//! Flutterwave gateway client.
//!
//! Flutterwave works in major currency units. Verification is keyed by the
//! numeric transaction id the provider hands back in its redirect, not by
//! our own `tx_ref`.

use super::{
    build_http_client, ChargeRequest, CheckoutSession, GatewayError, PaymentGateway,
    PaymentOutcome, VerifiedTransaction,
};
use crate::config::FlutterwaveConfig;
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct FlutterwaveClient {
    http: reqwest::Client,
    config: FlutterwaveConfig,
}

#[derive(Debug, Serialize)]
struct PaymentRequest<'a> {
    tx_ref: String,
    /// Major units, as a plain JSON number.
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    redirect_url: &'a str,
    payment_options: &'static str,
    customer: Customer<'a>,
    customizations: Customizations<'a>,
    meta: Meta,
}

#[derive(Debug, Serialize)]
struct Customer<'a> {
    email: &'a str,
    phone_number: &'a str,
    name: String,
}

#[derive(Debug, Serialize)]
struct Customizations<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct Meta {
    donation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    status: String,
    #[serde(default)]
    message: String,
    data: Option<PaymentData>,
}

#[derive(Debug, Deserialize)]
struct PaymentData {
    link: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: String,
    #[serde(default)]
    message: String,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    tx_ref: String,
    #[serde(default)]
    payment_type: Option<String>,
    amount: Decimal,
    #[serde(default)]
    meta: Option<EchoedMeta>,
}

#[derive(Debug, Deserialize)]
struct EchoedMeta {
    donation_id: Option<Uuid>,
    comment_id: Option<Uuid>,
}

impl FlutterwaveClient {
    pub fn new(config: FlutterwaveConfig) -> Self {
        Self {
            http: build_http_client(),
            config,
        }
    }

    fn check_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::Configuration("Flutterwave"))
        }
    }

    fn evaluate(response: VerifyResponse) -> Result<VerifiedTransaction, GatewayError> {
        let approved = response.status == "success";
        let message = response.message;
        let data = response
            .data
            .ok_or_else(|| GatewayError::Protocol("verify response has no data".to_string()))?;

        let outcome = if approved {
            PaymentOutcome::Approved
        } else {
            PaymentOutcome::Declined(message)
        };

        let (donation_id, comment_id) = data
            .meta
            .map(|m| (m.donation_id, m.comment_id))
            .unwrap_or((None, None));

        Ok(VerifiedTransaction {
            outcome,
            reference: data.tx_ref,
            channel: data.payment_type.unwrap_or_default(),
            amount: data.amount,
            donation_id,
            comment_id,
        })
    }
}

#[async_trait]
impl PaymentGateway for FlutterwaveClient {
    fn name(&self) -> &'static str {
        "flutterwave"
    }

    fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    async fn initialize(&self, charge: &ChargeRequest) -> Result<CheckoutSession, GatewayError> {
        self.check_configured()?;

        if charge.amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount);
        }

        let request = PaymentRequest {
            tx_ref: format!("txn_{}", Uuid::new_v4().simple()),
            amount: charge.amount,
            currency: &charge.currency,
            redirect_url: &charge.callback_url,
            payment_options: "card, banktransfer, ussd",
            customer: Customer {
                email: &charge.email,
                phone_number: &charge.phone_number,
                name: charge.customer_name(),
            },
            customizations: Customizations {
                title: &charge.description,
            },
            meta: Meta {
                donation_id: charge.donation_id,
                comment_id: charge.comment_id,
            },
        };

        let url = format!("{}/payments", self.config.api_base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::from_response(response).await);
        }

        let body: PaymentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        if body.status != "success" {
            tracing::warn!(message = %body.message, "Flutterwave rejected the charge");
            return Err(GatewayError::Declined(body.message));
        }

        let data = body
            .data
            .ok_or_else(|| GatewayError::Protocol("payment response has no data".to_string()))?;

        Ok(CheckoutSession {
            authorization_url: data.link,
        })
    }

    async fn verify(&self, transaction_id: &str) -> Result<VerifiedTransaction, GatewayError> {
        self.check_configured()?;

        let url = format!(
            "{}/transactions/{}/verify",
            self.config.api_base_url, transaction_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::from_response(response).await);
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        Self::evaluate(body)
    }
}
