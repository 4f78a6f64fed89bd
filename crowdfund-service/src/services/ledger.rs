//! Donation ledger: donation lifecycle and every mutation that moves money.
//!
//! Campaign `funds_raised` and beneficiary `balance` are only ever changed
//! here, through atomic `SET x = x + $n` updates inside a transaction,
//! never read-modify-write in application memory. Donation finalization is
//! serialized by a compare-and-swap on the row status, which makes replayed
//! gateway callbacks harmless.

use crate::models::{
    Donation, DonationStatus, NewDonation, Withdrawal, WithdrawalStatus,
};
use crate::services::database::{Database, DONATION_COLUMNS};
use crate::services::metrics::DB_QUERY_DURATION;
use platform_core::error::AppError;
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing::{error, info, instrument};
use uuid::Uuid;

const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount, status, created_at, updated_at";

/// Result of a finalization attempt.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// The donation was approved and the funds credited, exactly once.
    Applied { donation_id: Uuid, campaign_id: Uuid },
    /// A replayed callback: the donation had already left the pending
    /// state, so nothing was credited again.
    AlreadyFinalized {
        donation_id: Uuid,
        campaign_id: Uuid,
        status: DonationStatus,
    },
}

#[derive(Clone)]
pub struct DonationLedger {
    pool: PgPool,
}

impl DonationLedger {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Create a donation in the pending state, before any gateway call.
    /// The stored amount is the donor's amount; the gateway fee is added
    /// only to the value charged at the provider.
    #[instrument(skip(self, input), fields(campaign_id = %input.campaign_id, gateway = %input.gateway))]
    pub async fn create_donation(&self, input: &NewDonation) -> Result<Donation, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_donation"])
            .start_timer();

        let donation = sqlx::query_as::<_, Donation>(&format!(
            "INSERT INTO donations (id, campaign_id, reward_id, first_name, last_name, email, \
             phone_number, amount, gateway, status, anonymous, requires_shipping, \
             shipping_country, shipping_state, shipping_city, shipping_address, shipping_postal_code) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {}",
            DONATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.campaign_id)
        .bind(input.reward_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone_number)
        .bind(input.amount)
        .bind(input.gateway.as_str())
        .bind(DonationStatus::Pending.as_str())
        .bind(input.anonymous)
        .bind(input.requires_shipping)
        .bind(&input.shipping_country)
        .bind(&input.shipping_state)
        .bind(&input.shipping_city)
        .bind(&input.shipping_address)
        .bind(&input.shipping_postal_code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to create donation: {}", e)))?;

        timer.observe_duration();

        info!(
            donation_id = %donation.id,
            campaign_id = %donation.campaign_id,
            gateway = %donation.gateway,
            "Donation created"
        );

        Ok(donation)
    }

    #[instrument(skip(self))]
    pub async fn find_donation(&self, id: Uuid) -> Result<Option<Donation>, AppError> {
        let donation = sqlx::query_as::<_, Donation>(&format!(
            "SELECT {} FROM donations WHERE id = $1",
            DONATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to fetch donation: {}", e)))?;

        Ok(donation)
    }

    /// Finalize a verified donation: approve the row, promote the donor's
    /// comment, credit the campaign and the beneficiary, in one transaction.
    ///
    /// The first statement is a compare-and-swap on the pending status, so
    /// a duplicate callback (gateways are known to replay them) finds zero
    /// rows to claim and takes the `AlreadyFinalized` path without touching
    /// any balance. The campaign is credited the stored donation amount,
    /// not the gateway-charged total.
    #[instrument(skip(self, reference, channel), fields(donation_id = %donation_id))]
    pub async fn finalize_donation(
        &self,
        donation_id: Uuid,
        reference: &str,
        channel: &str,
        comment_id: Option<Uuid>,
    ) -> Result<FinalizeOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["finalize_donation"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let claimed = sqlx::query_as::<_, Donation>(&format!(
            "UPDATE donations \
             SET status = $2, channel = $3, transaction_reference = $4, updated_at = now() \
             WHERE id = $1 AND status = $5 \
             RETURNING {}",
            DONATION_COLUMNS
        ))
        .bind(donation_id)
        .bind(DonationStatus::Approved.as_str())
        .bind(channel)
        .bind(reference)
        .bind(DonationStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!(donation_id = %donation_id, error = %e, "Failed to claim donation");
            AppError::Database(anyhow::anyhow!("Failed to claim donation: {}", e))
        })?;

        let Some(donation) = claimed else {
            tx.rollback().await.ok();

            let existing = self
                .find_donation(donation_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Donation not found.")))?;

            info!(
                donation_id = %donation_id,
                status = %existing.status,
                "Replayed callback for an already finalized donation"
            );

            return Ok(FinalizeOutcome::AlreadyFinalized {
                donation_id,
                campaign_id: existing.campaign_id,
                status: existing
                    .parsed_status()
                    .unwrap_or(DonationStatus::Approved),
            });
        };

        if let Some(comment_id) = comment_id {
            sqlx::query("UPDATE comments SET status = 'active' WHERE id = $1")
                .bind(comment_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!(donation_id = %donation_id, comment_id = %comment_id, error = %e, "Failed to promote comment");
                    AppError::Database(anyhow::anyhow!("Failed to promote comment: {}", e))
                })?;
        }

        let beneficiary: Option<Uuid> = sqlx::query_scalar(
            "UPDATE campaigns SET funds_raised = funds_raised + $2, updated_at = now() \
             WHERE id = $1 RETURNING user_id",
        )
        .bind(donation.campaign_id)
        .bind(donation.amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!(
                donation_id = %donation_id,
                campaign_id = %donation.campaign_id,
                error = %e,
                "Failed to credit campaign"
            );
            AppError::Database(anyhow::anyhow!("Failed to credit campaign: {}", e))
        })?;

        let Some(user_id) = beneficiary else {
            tx.rollback().await.ok();
            error!(
                donation_id = %donation_id,
                campaign_id = %donation.campaign_id,
                "Campaign missing while finalizing donation"
            );
            return Err(AppError::NotFound(anyhow::anyhow!("Campaign not found.")));
        };

        let credited = sqlx::query(
            "UPDATE users SET balance = balance + $2, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(donation.amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(
                donation_id = %donation_id,
                campaign_id = %donation.campaign_id,
                user_id = %user_id,
                error = %e,
                "Failed to credit beneficiary"
            );
            AppError::Database(anyhow::anyhow!("Failed to credit beneficiary: {}", e))
        })?
        .rows_affected();

        if credited != 1 {
            tx.rollback().await.ok();
            error!(
                donation_id = %donation_id,
                campaign_id = %donation.campaign_id,
                user_id = %user_id,
                "Beneficiary missing while finalizing donation"
            );
            return Err(AppError::NotFound(anyhow::anyhow!("Beneficiary not found.")));
        }

        tx.commit().await.map_err(|e| {
            error!(donation_id = %donation_id, error = %e, "Failed to commit finalization");
            AppError::Database(anyhow::anyhow!("Failed to commit finalization: {}", e))
        })?;

        timer.observe_duration();

        info!(
            donation_id = %donation_id,
            campaign_id = %donation.campaign_id,
            amount = %donation.amount,
            reference = reference,
            "Donation approved and funds credited"
        );

        Ok(FinalizeOutcome::Applied {
            donation_id,
            campaign_id: donation.campaign_id,
        })
    }

    /// Mark a pending donation rejected. Approved donations are immutable;
    /// the swap only matches pending rows.
    #[instrument(skip(self))]
    pub async fn reject_donation(&self, donation_id: Uuid) -> Result<Donation, AppError> {
        let rejected = sqlx::query_as::<_, Donation>(&format!(
            "UPDATE donations SET status = $2, updated_at = now() \
             WHERE id = $1 AND status = $3 RETURNING {}",
            DONATION_COLUMNS
        ))
        .bind(donation_id)
        .bind(DonationStatus::Rejected.as_str())
        .bind(DonationStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to reject donation: {}", e)))?;

        rejected.ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Only pending donations can be rejected."))
        })
    }

    // -------------------------------------------------------------------------
    // Withdrawals
    // -------------------------------------------------------------------------

    /// Create a withdrawal request, debiting the beneficiary balance up
    /// front. The debit and the insert share a transaction, and the debit
    /// only matches when the balance covers the amount.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Withdrawal, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let debited = sqlx::query(
            "UPDATE users SET balance = balance - $2, updated_at = now() \
             WHERE id = $1 AND balance >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to debit balance: {}", e)))?
        .rows_affected();

        if debited == 0 {
            tx.rollback().await.ok();

            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to fetch user: {}", e)))?;

            return Err(if exists {
                AppError::Field {
                    field: "amount",
                    message: "The requested amount exceeds your available balance.".to_string(),
                }
            } else {
                AppError::NotFound(anyhow::anyhow!("User not found."))
            });
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            "INSERT INTO withdrawals (id, user_id, amount, status) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            WITHDRAWAL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(amount)
        .bind(WithdrawalStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to create withdrawal: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to commit withdrawal: {}", e))
        })?;

        info!(withdrawal_id = %withdrawal.id, user_id = %user_id, amount = %amount, "Withdrawal requested");

        Ok(withdrawal)
    }

    /// Approve a pending withdrawal. The balance was already debited at
    /// request time, so approval only settles the status.
    #[instrument(skip(self))]
    pub async fn approve_withdrawal(&self, id: Uuid) -> Result<Withdrawal, AppError> {
        let approved = sqlx::query_as::<_, Withdrawal>(&format!(
            "UPDATE withdrawals SET status = $2, updated_at = now() \
             WHERE id = $1 AND status = $3 RETURNING {}",
            WITHDRAWAL_COLUMNS
        ))
        .bind(id)
        .bind(WithdrawalStatus::Approved.as_str())
        .bind(WithdrawalStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to approve withdrawal: {}", e)))?;

        match approved {
            Some(withdrawal) => {
                info!(withdrawal_id = %id, "Withdrawal approved");
                Ok(withdrawal)
            }
            None => match self.find_withdrawal(id).await? {
                Some(_) => Err(AppError::Conflict(anyhow::anyhow!(
                    "This withdrawal has already been processed."
                ))),
                None => Err(AppError::NotFound(anyhow::anyhow!("Withdrawal not found."))),
            },
        }
    }

    /// Reject a pending withdrawal and return the funds to the
    /// beneficiary balance, atomically.
    #[instrument(skip(self))]
    pub async fn reject_withdrawal(&self, id: Uuid) -> Result<Withdrawal, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let rejected = sqlx::query_as::<_, Withdrawal>(&format!(
            "UPDATE withdrawals SET status = $2, updated_at = now() \
             WHERE id = $1 AND status = $3 RETURNING {}",
            WITHDRAWAL_COLUMNS
        ))
        .bind(id)
        .bind(WithdrawalStatus::Rejected.as_str())
        .bind(WithdrawalStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to reject withdrawal: {}", e)))?;

        let Some(withdrawal) = rejected else {
            tx.rollback().await.ok();
            return match self.find_withdrawal(id).await? {
                Some(_) => Err(AppError::Conflict(anyhow::anyhow!(
                    "This withdrawal has already been processed."
                ))),
                None => Err(AppError::NotFound(anyhow::anyhow!("Withdrawal not found."))),
            };
        };

        sqlx::query("UPDATE users SET balance = balance + $2, updated_at = now() WHERE id = $1")
            .bind(withdrawal.user_id)
            .bind(withdrawal.amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(withdrawal_id = %id, user_id = %withdrawal.user_id, error = %e, "Failed to refund balance");
                AppError::Database(anyhow::anyhow!("Failed to refund balance: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to commit rejection: {}", e))
        })?;

        info!(
            withdrawal_id = %id,
            user_id = %withdrawal.user_id,
            amount = %withdrawal.amount,
            "Withdrawal rejected and funds returned"
        );

        Ok(withdrawal)
    }

    #[instrument(skip(self))]
    pub async fn find_withdrawal(&self, id: Uuid) -> Result<Option<Withdrawal>, AppError> {
        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {} FROM withdrawals WHERE id = $1",
            WITHDRAWAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to fetch withdrawal: {}", e)))?;

        Ok(withdrawal)
    }
}
