//! Donation submission, receipt, and payment status handlers.

use crate::handlers::campaigns::CampaignView;
use crate::models::{Campaign, Donation, Gateway, NewComment, NewDonation, Reward};
use crate::services::donation_policy;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct DonationRequest {
    #[validate(length(min = 1, max = 255, message = "The first name field is required."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255, message = "The last name field is required."))]
    pub last_name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "The phone number field is required."))]
    pub phone_number: String,
    pub amount: Decimal,
    #[serde(default)]
    pub anonymous: bool,
    pub gateway: Gateway,
    pub slug: String,
    #[serde(default)]
    pub accept_terms: bool,
    pub comments: Option<String>,
    pub reward_id: Option<Uuid>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    #[serde(default)]
    pub requires_shipping: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: &'static str,
    /// The gateway checkout the donor should be sent to.
    pub redirect_url: String,
    /// Correlation id for the cancel/failed/error views.
    pub donation_id: Uuid,
}

/// Process a donation submission: validate, create the pending donation
/// and inactive comment, then hand off to the selected gateway.
pub async fn make_payment(
    State(state): State<AppState>,
    Json(payload): Json<DonationRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    payload.validate()?;

    if !payload.accept_terms {
        return Err(AppError::Field {
            field: "accept_terms",
            message: "You must accept the terms and conditions.".to_string(),
        });
    }

    let campaign = state
        .db
        .find_campaign_by_slug(&payload.slug)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found.")))?;

    // Reward minimum comes first, then the global bounds; both reject
    // before any gateway is contacted.
    let reward = match payload.reward_id {
        Some(reward_id) => {
            let reward = state.db.find_reward(reward_id).await?.ok_or_else(|| {
                AppError::Field {
                    field: "reward_id",
                    message: "The selected reward is invalid.".to_string(),
                }
            })?;
            donation_policy::validate_reward_minimum(
                payload.amount,
                &reward,
                &state.config.currency,
            )?;
            Some(reward)
        }
        None => None,
    };

    donation_policy::validate_amount(payload.amount, &state.config.donation, &state.config.currency)?;

    let requires_shipping = reward
        .as_ref()
        .map(|r| r.requires_shipping)
        .unwrap_or(payload.requires_shipping);
    if requires_shipping {
        validate_shipping_fields(&payload)?;
    }

    let donation = state
        .ledger
        .create_donation(&NewDonation {
            campaign_id: campaign.id,
            reward_id: reward.as_ref().map(|r| r.id),
            first_name: payload.first_name.clone(),
            last_name: payload.last_name.clone(),
            email: payload.email.clone(),
            phone_number: payload.phone_number.clone(),
            amount: payload.amount,
            gateway: payload.gateway,
            anonymous: payload.anonymous,
            requires_shipping,
            shipping_country: payload.country.clone(),
            shipping_state: payload.state.clone(),
            shipping_city: payload.city.clone(),
            shipping_address: payload.address.clone(),
            shipping_postal_code: payload.postal_code.clone(),
        })
        .await?;

    let comment_id = match payload.comments.as_deref().map(str::trim) {
        Some(body) if !body.is_empty() => {
            let comment = state
                .db
                .create_comment(&NewComment {
                    campaign_id: campaign.id,
                    first_name: payload.first_name.clone(),
                    last_name: payload.last_name.clone(),
                    email: payload.email.clone(),
                    body: body.to_string(),
                    anonymous: payload.anonymous,
                })
                .await?;
            Some(comment.id)
        }
        _ => None,
    };

    // On gateway failure the pending donation row stays behind on purpose;
    // the error propagates to the donor as a structured response.
    let session = state
        .donation_handler
        .process_donation(&donation, comment_id)
        .await?;

    Ok(Json(SubmitResponse {
        status: "success",
        redirect_url: session.authorization_url,
        donation_id: donation.id,
    }))
}

fn validate_shipping_fields(payload: &DonationRequest) -> Result<(), AppError> {
    let fields: [(&'static str, &Option<String>); 5] = [
        ("country", &payload.country),
        ("state", &payload.state),
        ("city", &payload.city),
        ("address", &payload.address),
        ("postal_code", &payload.postal_code),
    ];

    for (name, value) in fields {
        if value.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(AppError::Field {
                field: name,
                message: format!("The {} field is required for rewards that ship.", name),
            });
        }
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// Donate page prefill
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DonateQuery {
    #[serde(rename = "selected-amount")]
    pub selected_amount: Option<Decimal>,
    pub rewards_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DonatePage {
    pub campaign: CampaignView,
    pub selected_amount: Decimal,
    pub reward: Option<Reward>,
    /// Gateways with usable credentials.
    pub gateways: Vec<&'static str>,
}

/// Data for the donation form. Without a selected amount the donor is sent
/// back to the campaign page to pick one.
pub async fn donate_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<DonateQuery>,
) -> Result<Response, AppError> {
    let Some(selected_amount) = query.selected_amount else {
        return Ok(Redirect::to(&format!(
            "/campaigns/{}?error=Please+enter+your+donation+amount+first",
            slug
        ))
        .into_response());
    };

    let campaign = state
        .db
        .find_campaign_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found.")))?;

    let reward = match query.rewards_id {
        Some(id) => state.db.find_reward(id).await?,
        None => None,
    };

    let gateways = [
        Gateway::Paystack,
        Gateway::Flutterwave,
        Gateway::Monnify,
        Gateway::Stripe,
    ]
    .into_iter()
    .filter(|g| state.registry.get(*g).is_configured())
    .map(|g| g.as_str())
    .collect();

    Ok(Json(DonatePage {
        campaign: campaign.into(),
        selected_amount,
        reward,
        gateways,
    })
    .into_response())
}

// -----------------------------------------------------------------------------
// Receipt
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReceiptQuery {
    /// Kept as strings so malformed ids can redirect instead of 400ing.
    #[serde(rename = "donationId")]
    pub donation_id: Option<String>,
    #[serde(rename = "campaignId")]
    pub campaign_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Receipt {
    pub campaign: CampaignView,
    pub donation: Donation,
}

/// Donation receipt. Broken or unknown references bounce back to the
/// campaign listing with an error message instead of surfacing a 500.
pub async fn receipt(
    State(state): State<AppState>,
    Query(query): Query<ReceiptQuery>,
) -> Response {
    let ids = query
        .donation_id
        .as_deref()
        .and_then(|d| Uuid::parse_str(d).ok())
        .zip(
            query
                .campaign_id
                .as_deref()
                .and_then(|c| Uuid::parse_str(c).ok()),
        );
    let Some((donation_id, campaign_id)) = ids else {
        return campaigns_redirect("Invalid donation reference. Please check your URL.");
    };

    match load_receipt(&state, donation_id, campaign_id).await {
        Ok(Some(receipt)) => Json(receipt).into_response(),
        Ok(None) => campaigns_redirect("Donation or campaign not found. Please contact support."),
        Err(e) => {
            tracing::error!(
                donation_id = %donation_id,
                campaign_id = %campaign_id,
                error = %e,
                "Failed to render donation receipt"
            );
            campaigns_redirect("We encountered an error processing your donation receipt.")
        }
    }
}

async fn load_receipt(
    state: &AppState,
    donation_id: Uuid,
    campaign_id: Uuid,
) -> Result<Option<Receipt>, AppError> {
    let Some(donation) = state.ledger.find_donation(donation_id).await? else {
        return Ok(None);
    };
    let Some(campaign) = state.db.find_campaign(campaign_id).await? else {
        return Ok(None);
    };

    Ok(Some(Receipt {
        campaign: campaign.into(),
        donation,
    }))
}

fn campaigns_redirect(message: &str) -> Response {
    let encoded = message.replace(' ', "+");
    Redirect::to(&format!("/campaigns?error={}", encoded)).into_response()
}

// -----------------------------------------------------------------------------
// Payment status views
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PaymentStatusView {
    pub title: &'static str,
    pub message: &'static str,
    pub retry: bool,
    pub retry_url: String,
    pub donation: Donation,
    pub campaign: CampaignView,
}

pub async fn payment_failed(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
) -> Result<Json<PaymentStatusView>, AppError> {
    payment_status_view(
        &state,
        donation_id,
        "Payment Failed",
        "We couldn't process your payment. This might be due to insufficient funds, incorrect \
         card details, or bank restrictions. Please try again with a different payment method \
         or contact your bank for more information.",
    )
    .await
}

pub async fn payment_cancelled(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
) -> Result<Json<PaymentStatusView>, AppError> {
    payment_status_view(
        &state,
        donation_id,
        "Payment Cancelled",
        "You interrupted the payment process before it was completed. If this was accidental, \
         you can restart your donation from the campaign page.",
    )
    .await
}

pub async fn payment_error(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
) -> Result<Json<PaymentStatusView>, AppError> {
    payment_status_view(
        &state,
        donation_id,
        "Payment Processing Error",
        "We encountered an unexpected problem while handling your payment. Our team has been \
         notified. Please try again later or contact support if the problem persists.",
    )
    .await
}

/// Shared renderer for the failed/cancelled/error views, with a retry URL
/// prefilled from the original donation.
async fn payment_status_view(
    state: &AppState,
    donation_id: Uuid,
    title: &'static str,
    message: &'static str,
) -> Result<Json<PaymentStatusView>, AppError> {
    let donation = state
        .ledger
        .find_donation(donation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Donation not found.")))?;

    let campaign = state
        .db
        .find_campaign(donation.campaign_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found.")))?;

    Ok(Json(PaymentStatusView {
        title,
        message,
        retry: true,
        retry_url: retry_url(&campaign, &donation),
        donation: donation.clone(),
        campaign: campaign.into(),
    }))
}

fn retry_url(campaign: &Campaign, donation: &Donation) -> String {
    let mut url = format!(
        "/campaigns/{}/donate?selected-amount={}",
        campaign.slug, donation.amount
    );
    if let Some(reward_id) = donation.reward_id {
        url.push_str(&format!("&rewards_id={}", reward_id));
    }
    url
}
