//! Callback reconciliation: confirm a gateway's authoritative outcome and
//! apply its financial effect exactly once.
//!
//! The per-provider payload extraction lives in the callback handlers;
//! everything after that (verify, success predicate, finalization) is
//! identical across gateways and funnels through here.

use crate::models::{DonationStatus, Gateway};
use crate::services::donation_handler::map_gateway_error;
use crate::services::gateways::{GatewayRegistry, PaymentOutcome};
use crate::services::ledger::{DonationLedger, FinalizeOutcome};
use crate::services::metrics::DONATIONS_RECONCILED;
use platform_core::error::AppError;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Donor-visible result of a callback.
#[derive(Debug, Clone)]
pub enum Reconciliation {
    /// The donation is approved and credited; route to the receipt page.
    Completed { donation_id: Uuid, campaign_id: Uuid },
    /// The donor backed out; nothing was verified or credited.
    Cancelled { donation_id: Option<Uuid> },
    /// The provider reported a failed transaction; the donation stays
    /// pending so the donor can retry.
    Failed {
        donation_id: Option<Uuid>,
        message: String,
    },
}

pub struct CallbackReconciler {
    registry: Arc<GatewayRegistry>,
    ledger: DonationLedger,
}

impl CallbackReconciler {
    pub fn new(registry: Arc<GatewayRegistry>, ledger: DonationLedger) -> Self {
        Self { registry, ledger }
    }

    /// Verify `reference` with the provider and finalize the donation it
    /// belongs to. Replayed callbacks converge on the same result without
    /// crediting anything twice.
    pub async fn reconcile(
        &self,
        gateway: Gateway,
        reference: &str,
    ) -> Result<Reconciliation, AppError> {
        let verified = self
            .registry
            .get(gateway)
            .verify(reference)
            .await
            .map_err(|e| map_gateway_error(gateway, e))?;

        match verified.outcome {
            PaymentOutcome::Cancelled => {
                info!(gateway = %gateway, reference = reference, "Payment cancelled by user");
                DONATIONS_RECONCILED
                    .with_label_values(&[gateway.as_str(), "cancelled"])
                    .inc();
                Ok(Reconciliation::Cancelled {
                    donation_id: verified.donation_id,
                })
            }
            PaymentOutcome::Declined(message) => {
                warn!(
                    gateway = %gateway,
                    reference = reference,
                    message = %message,
                    "Payment verification reported failure"
                );
                DONATIONS_RECONCILED
                    .with_label_values(&[gateway.as_str(), "failed"])
                    .inc();
                Ok(Reconciliation::Failed {
                    donation_id: verified.donation_id,
                    message,
                })
            }
            PaymentOutcome::Approved => {
                let donation_id = verified.donation_id.ok_or_else(|| {
                    AppError::MalformedCallback(anyhow::anyhow!(
                        "verified {} transaction {} carries no donation id",
                        gateway,
                        reference
                    ))
                })?;

                let outcome = self
                    .ledger
                    .finalize_donation(
                        donation_id,
                        &verified.reference,
                        &verified.channel,
                        verified.comment_id,
                    )
                    .await?;

                match outcome {
                    FinalizeOutcome::Applied {
                        donation_id,
                        campaign_id,
                    } => {
                        DONATIONS_RECONCILED
                            .with_label_values(&[gateway.as_str(), "approved"])
                            .inc();
                        Ok(Reconciliation::Completed {
                            donation_id,
                            campaign_id,
                        })
                    }
                    FinalizeOutcome::AlreadyFinalized {
                        donation_id,
                        campaign_id,
                        status,
                    } => {
                        DONATIONS_RECONCILED
                            .with_label_values(&[gateway.as_str(), "replayed"])
                            .inc();
                        if status == DonationStatus::Approved {
                            Ok(Reconciliation::Completed {
                                donation_id,
                                campaign_id,
                            })
                        } else {
                            Ok(Reconciliation::Failed {
                                donation_id: Some(donation_id),
                                message: "This donation could not be completed.".to_string(),
                            })
                        }
                    }
                }
            }
        }
    }
}
