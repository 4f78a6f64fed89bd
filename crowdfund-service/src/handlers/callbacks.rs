//! Gateway callback endpoints, one per provider.
//!
//! Each handler only knows how to pull the reference (and the cancellation
//! signal, where the provider puts one in the redirect) out of its
//! provider's query string; verification and finalization are shared. The
//! `donation` parameter rides on every callback URL we hand out, so a
//! cancelled or failed payment can still be routed to its status view.

use crate::models::Gateway;
use crate::services::Reconciliation;
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PaystackCallback {
    pub trxref: Option<String>,
    pub reference: Option<String>,
    pub donation: Option<Uuid>,
}

pub async fn paystack(
    State(state): State<AppState>,
    Query(query): Query<PaystackCallback>,
) -> Response {
    let Some(reference) = query.reference.clone().filter(|r| !r.is_empty()) else {
        tracing::error!(payload = ?query, "Paystack callback missing reference");
        return error_redirect(query.donation);
    };

    complete(&state, Gateway::Paystack, &reference, query.donation).await
}

#[derive(Debug, Deserialize)]
pub struct FlutterwaveCallback {
    pub status: Option<String>,
    pub tx_ref: Option<String>,
    pub transaction_id: Option<String>,
    pub donation: Option<Uuid>,
}

pub async fn flutterwave(
    State(state): State<AppState>,
    Query(query): Query<FlutterwaveCallback>,
) -> Response {
    if query.status.as_deref() == Some("cancelled") {
        tracing::info!(tx_ref = ?query.tx_ref, "Payment cancelled by user");
        return cancelled_redirect(query.donation);
    }

    // Verification runs against the provider-assigned transaction id, not
    // our tx_ref.
    let Some(transaction_id) = query.transaction_id.clone().filter(|t| !t.is_empty()) else {
        tracing::error!(payload = ?query, "Flutterwave callback missing transaction id");
        return error_redirect(query.donation);
    };

    complete(&state, Gateway::Flutterwave, &transaction_id, query.donation).await
}

#[derive(Debug, Deserialize)]
pub struct MonnifyCallback {
    #[serde(rename = "paymentReference")]
    pub payment_reference: Option<String>,
    pub donation: Option<Uuid>,
}

pub async fn monnify(
    State(state): State<AppState>,
    Query(query): Query<MonnifyCallback>,
) -> Response {
    let Some(reference) = query.payment_reference.clone().filter(|r| !r.is_empty()) else {
        tracing::error!(payload = ?query, "Monnify callback missing payment reference");
        return error_redirect(query.donation);
    };

    complete(&state, Gateway::Monnify, &reference, query.donation).await
}

#[derive(Debug, Deserialize)]
pub struct StripeCallback {
    pub session_id: Option<String>,
    pub donation: Option<Uuid>,
}

pub async fn stripe(
    State(state): State<AppState>,
    Query(query): Query<StripeCallback>,
) -> Response {
    let Some(session_id) = query.session_id.clone().filter(|s| !s.is_empty()) else {
        tracing::error!(payload = ?query, "Stripe callback missing session id");
        return error_redirect(query.donation);
    };

    complete(&state, Gateway::Stripe, &session_id, query.donation).await
}

/// Shared tail of every callback: reconcile, then route the donor.
async fn complete(
    state: &AppState,
    gateway: Gateway,
    reference: &str,
    fallback_donation: Option<Uuid>,
) -> Response {
    match state.reconciler.reconcile(gateway, reference).await {
        Ok(Reconciliation::Completed {
            donation_id,
            campaign_id,
        }) => Redirect::to(&format!(
            "/donations/status?donationId={}&campaignId={}",
            donation_id, campaign_id
        ))
        .into_response(),
        Ok(Reconciliation::Cancelled { donation_id }) => {
            cancelled_redirect(donation_id.or(fallback_donation))
        }
        Ok(Reconciliation::Failed { donation_id, .. }) => {
            failed_redirect(donation_id.or(fallback_donation))
        }
        Err(e) => {
            tracing::error!(
                gateway = %gateway,
                reference = reference,
                error = %e,
                "Callback reconciliation error"
            );
            error_redirect(fallback_donation)
        }
    }
}

fn cancelled_redirect(donation_id: Option<Uuid>) -> Response {
    status_redirect(donation_id, "cancelled", "Payment was cancelled.")
}

fn failed_redirect(donation_id: Option<Uuid>) -> Response {
    status_redirect(donation_id, "failed", "Payment failed. Please try again.")
}

fn error_redirect(donation_id: Option<Uuid>) -> Response {
    status_redirect(
        donation_id,
        "error",
        "An error occurred while confirming your payment.",
    )
}

fn status_redirect(donation_id: Option<Uuid>, status: &str, fallback_message: &str) -> Response {
    match donation_id {
        Some(id) => Redirect::to(&format!("/payments/{}/{}", id, status)).into_response(),
        None => {
            let encoded = fallback_message.replace(' ', "+");
            Redirect::to(&format!("/campaigns?error={}", encoded)).into_response()
        }
    }
}
