//! Paystack gateway client.
//!
//! Paystack works in minor currency units (kobo): amounts are multiplied by
//! 100 on the way out and divided by 100 on the way back, for both the
//! charge and the verify lookup.

use super::{
    build_http_client, ChargeRequest, CheckoutSession, GatewayError, PaymentGateway,
    PaymentOutcome, VerifiedTransaction,
};
use crate::config::PaystackConfig;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    config: PaystackConfig,
}

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    /// Amount in kobo.
    amount: i64,
    callback_url: &'a str,
    metadata: InitializeMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct InitializeMetadata<'a> {
    cancel_action: &'a str,
    donation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    reference: String,
    status: String,
    #[serde(default)]
    channel: Option<String>,
    /// Settled amount in kobo.
    amount: i64,
    #[serde(default)]
    metadata: Option<EchoedMetadata>,
}

#[derive(Debug, Deserialize)]
struct EchoedMetadata {
    donation_id: Option<Uuid>,
    comment_id: Option<Uuid>,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Self {
        Self {
            http: build_http_client(),
            config,
        }
    }

    fn check_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::Configuration("Paystack"))
        }
    }

    fn evaluate(response: VerifyResponse) -> Result<VerifiedTransaction, GatewayError> {
        let message = response.message.clone();
        let data = response
            .data
            .ok_or_else(|| GatewayError::Protocol("verify response has no data".to_string()))?;

        let outcome = if response.status && data.status == "success" {
            PaymentOutcome::Approved
        } else if message.is_empty() {
            PaymentOutcome::Declined(format!("transaction status: {}", data.status))
        } else {
            PaymentOutcome::Declined(message)
        };

        let (donation_id, comment_id) = data
            .metadata
            .map(|m| (m.donation_id, m.comment_id))
            .unwrap_or((None, None));

        Ok(VerifiedTransaction {
            outcome,
            reference: data.reference,
            channel: data.channel.unwrap_or_default(),
            amount: Decimal::from(data.amount) / Decimal::ONE_HUNDRED,
            donation_id,
            comment_id,
        })
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    fn name(&self) -> &'static str {
        "paystack"
    }

    fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    async fn initialize(&self, charge: &ChargeRequest) -> Result<CheckoutSession, GatewayError> {
        self.check_configured()?;

        if charge.amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount);
        }

        let kobo = (charge.amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or(GatewayError::InvalidAmount)?;

        let request = InitializeRequest {
            email: &charge.email,
            amount: kobo,
            callback_url: &charge.callback_url,
            metadata: InitializeMetadata {
                cancel_action: &charge.cancel_url,
                donation_id: charge.donation_id,
                comment_id: charge.comment_id,
            },
        };

        let url = format!("{}/transaction/initialize", self.config.api_base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .header("Cache-Control", "no-cache")
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::from_response(response).await);
        }

        let body: InitializeResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        if !body.status {
            tracing::warn!(message = %body.message, "Paystack rejected the charge");
            return Err(GatewayError::Declined(body.message));
        }

        let data = body
            .data
            .ok_or_else(|| GatewayError::Protocol("initialize response has no data".to_string()))?;

        Ok(CheckoutSession {
            authorization_url: data.authorization_url,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        self.check_configured()?;

        let url = format!("{}/transaction/verify/{}", self.config.api_base_url, reference);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn verify_body(top_status: bool, tx_status: &str) -> VerifyResponse {
        serde_json::from_value(serde_json::json!({
            "status": top_status,
            "message": "Verification successful",
            "data": {
                "reference": "ps_ref_1",
                "status": tx_status,
                "channel": "card",
                "amount": 505000,
                "metadata": {
                    "donation_id": "6f2b1f0e-27a1-4a4b-9d3e-1c2a3b4c5d6e",
                    "comment_id": null
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn approved_requires_both_status_flags() {
        let tx = PaystackClient::evaluate(verify_body(true, "success")).unwrap();
        assert_eq!(tx.outcome, PaymentOutcome::Approved);

        let tx = PaystackClient::evaluate(verify_body(true, "abandoned")).unwrap();
        assert!(matches!(tx.outcome, PaymentOutcome::Declined(_)));

        let tx = PaystackClient::evaluate(verify_body(false, "success")).unwrap();
        assert!(matches!(tx.outcome, PaymentOutcome::Declined(_)));
    }

    #[test]
    fn amount_converts_from_kobo() {
        let tx = PaystackClient::evaluate(verify_body(true, "success")).unwrap();
        assert_eq!(tx.amount, Decimal::from(5050));
    }

    #[test]
    fn metadata_ids_are_extracted() {
        let tx = PaystackClient::evaluate(verify_body(true, "success")).unwrap();
        assert_eq!(
            tx.donation_id,
            Some(Uuid::parse_str("6f2b1f0e-27a1-4a4b-9d3e-1c2a3b4c5d6e").unwrap())
        );
        assert_eq!(tx.comment_id, None);
    }
}
