//! Donation model: one attempted contribution to a campaign.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Donation lifecycle. Transitions only pending→approved or
/// pending→rejected; a donation never re-enters pending and is never
/// deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Approved,
    Rejected,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The fixed set of supported payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Paystack,
    Flutterwave,
    Monnify,
    Stripe,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paystack => "paystack",
            Self::Flutterwave => "flutterwave",
            Self::Monnify => "monnify",
            Self::Stripe => "stripe",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "paystack" => Some(Self::Paystack),
            "flutterwave" => Some(Self::Flutterwave),
            "monnify" => Some(Self::Monnify),
            "stripe" => Some(Self::Stripe),
            _ => None,
        }
    }
}

impl std::fmt::Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Donation {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub reward_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    /// The amount credited to the campaign on approval. Immutable after
    /// creation; the gateway fee is never part of it.
    pub amount: Decimal,
    pub gateway: String,
    /// Settlement method reported by the gateway (card, banktransfer, ...).
    pub channel: Option<String>,
    /// External id, unique once set. Written exactly once, at approval.
    pub transaction_reference: Option<String>,
    pub status: String,
    pub anonymous: bool,
    pub requires_shipping: bool,
    pub shipping_country: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    pub fn parsed_status(&self) -> Option<DonationStatus> {
        DonationStatus::from_str(&self.status)
    }

    pub fn parsed_gateway(&self) -> Option<Gateway> {
        Gateway::from_str(&self.gateway)
    }

    pub fn donor_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Input for creating a pending donation row.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub campaign_id: Uuid,
    pub reward_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub amount: Decimal,
    pub gateway: Gateway,
    pub anonymous: bool,
    pub requires_shipping: bool,
    pub shipping_country: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_postal_code: Option<String>,
}
