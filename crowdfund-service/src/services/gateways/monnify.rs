//! Monnify gateway client.
//!
//! Monnify works in major currency units and authenticates per call: a
//! basic-auth login exchanges the api key/secret pair for a short-lived
//! bearer token. A `PENDING` payment status on verification means the
//! donor walked away from checkout.

use super::{
    build_http_client, ChargeRequest, CheckoutSession, GatewayError, PaymentGateway,
    PaymentOutcome, VerifiedTransaction,
};
use crate::config::MonnifyConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct MonnifyClient {
    http: reqwest::Client,
    config: MonnifyConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse<T> {
    request_successful: bool,
    #[serde(default)]
    response_message: Option<String>,
    response_body: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthBody {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitTransactionRequest<'a> {
    /// Major units, as a plain JSON number.
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    customer_name: String,
    customer_email: &'a str,
    payment_reference: String,
    payment_description: &'a str,
    currency_code: &'a str,
    contract_code: &'a str,
    redirect_url: &'a str,
    meta_data: MetaData,
}

#[derive(Debug, Serialize)]
struct MetaData {
    donation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitTransactionBody {
    checkout_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    payment_reference: String,
    #[serde(default)]
    payment_method: Option<String>,
    amount: Decimal,
    payment_status: String,
    #[serde(default)]
    meta_data: Option<EchoedMetaData>,
}

#[derive(Debug, Deserialize)]
struct EchoedMetaData {
    donation_id: Option<Uuid>,
    comment_id: Option<Uuid>,
}

impl MonnifyClient {
    pub fn new(config: MonnifyConfig) -> Self {
        Self {
            http: build_http_client(),
            config,
        }
    }

    fn check_configured(&self) -> Result<(), GatewayError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::Configuration("Monnify"))
        }
    }

    /// Exchange the api key/secret pair for a bearer token.
    async fn auth_token(&self) -> Result<String, GatewayError> {
        let auth_string = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.config.api_key,
            self.config.secret_key.expose_secret()
        ));

        let url = format!("{}/api/v1/auth/login", self.config.api_base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Basic {}", auth_string))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::from_response(response).await);
        }

        let body: ApiResponse<AuthBody> = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        if !body.request_successful {
            return Err(GatewayError::Unavailable {
                detail: format!(
                    "Monnify authentication failed: {}",
                    body.response_message.unwrap_or_else(|| "No message".to_string())
                ),
            });
        }

        body.response_body
            .map(|b| b.access_token)
            .ok_or_else(|| GatewayError::Protocol("access token missing in auth response".to_string()))
    }

    fn evaluate(body: ApiResponse<QueryBody>) -> Result<VerifiedTransaction, GatewayError> {
        let message = body.response_message.unwrap_or_default();
        let data = body
            .response_body
            .ok_or_else(|| GatewayError::Protocol("query response has no body".to_string()))?;

        let outcome = match data.payment_status.as_str() {
            "PAID" => PaymentOutcome::Approved,
            // The donor abandoned the hosted checkout page.
            "PENDING" => PaymentOutcome::Cancelled,
            other => {
                if message.is_empty() {
                    PaymentOutcome::Declined(format!("payment status: {}", other))
                } else {
                    PaymentOutcome::Declined(message)
                }
            }
        };

        let (donation_id, comment_id) = data
            .meta_data
            .map(|m| (m.donation_id, m.comment_id))
            .unwrap_or((None, None));

        Ok(VerifiedTransaction {
            outcome,
            reference: data.payment_reference,
            channel: data.payment_method.unwrap_or_default(),
            amount: data.amount,
            donation_id,
            comment_id,
        })
    }
}

#[async_trait]
impl PaymentGateway for MonnifyClient {
    fn name(&self) -> &'static str {
        "monnify"
    }

    fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
            && !self.config.secret_key.expose_secret().is_empty()
            && !self.config.contract_code.is_empty()
    }

    async fn initialize(&self, charge: &ChargeRequest) -> Result<CheckoutSession, GatewayError> {
        self.check_configured()?;

        if charge.amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount);
        }

        let access_token = self.auth_token().await?;

        let request = InitTransactionRequest {
            amount: charge.amount,
            customer_name: charge.customer_name(),
            customer_email: &charge.email,
            payment_reference: format!("MONNIFY_{}", Uuid::new_v4().simple()),
            payment_description: &charge.description,
            currency_code: &charge.currency,
            contract_code: &self.config.contract_code,
            redirect_url: &charge.callback_url,
            meta_data: MetaData {
                donation_id: charge.donation_id,
                comment_id: charge.comment_id,
            },
        };

        let url = format!(
            "{}/api/v1/merchant/transactions/init-transaction",
            self.config.api_base_url
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::from_response(response).await);
        }

        let body: ApiResponse<InitTransactionBody> = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        if !body.request_successful {
            let message = body.response_message.unwrap_or_default();
            tracing::warn!(message = %message, "Monnify rejected the charge");
            return Err(GatewayError::Declined(message));
        }

        let data = body
            .response_body
            .ok_or_else(|| GatewayError::Protocol("init response has no body".to_string()))?;

        Ok(CheckoutSession {
            authorization_url: data.checkout_url,
        })
    }

    async fn verify(&self, payment_reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        self.check_configured()?;

        let access_token = self.auth_token().await?;

        let url = format!(
            "{}/api/v1/merchant/transactions/query",
            self.config.api_base_url
        );
        let response = self
            .http
            .get(&url)
            .query(&[("paymentReference", payment_reference)])
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GatewayError::from_response(response).await);
        }

        let body: ApiResponse<QueryBody> = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        Self::evaluate(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_body(payment_status: &str) -> ApiResponse<QueryBody> {
        serde_json::from_value(serde_json::json!({
            "requestSuccessful": true,
            "responseMessage": "success",
            "responseBody": {
                "paymentReference": "MONNIFY_abc",
                "paymentMethod": "ACCOUNT_TRANSFER",
                "amount": 5050,
                "paymentStatus": payment_status,
                "metaData": {
                    "donation_id": "6f2b1f0e-27a1-4a4b-9d3e-1c2a3b4c5d6e",
                    "comment_id": null
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn paid_is_approved() {
        let tx = MonnifyClient::evaluate(query_body("PAID")).unwrap();
        assert_eq!(tx.outcome, PaymentOutcome::Approved);
        assert_eq!(tx.amount, Decimal::from(5050));
        assert_eq!(tx.channel, "ACCOUNT_TRANSFER");
    }

    #[test]
    fn pending_means_the_donor_cancelled() {
        let tx = MonnifyClient::evaluate(query_body("PENDING")).unwrap();
        assert_eq!(tx.outcome, PaymentOutcome::Cancelled);
    }

    #[test]
    fn other_statuses_are_declined() {
        let tx = MonnifyClient::evaluate(query_body("FAILED")).unwrap();
        assert!(matches!(tx.outcome, PaymentOutcome::Declined(_)));
    }
}
