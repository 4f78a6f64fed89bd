//! Database service: connection pool and plain read/write queries.
//!
//! Financial mutations live in [`crate::services::ledger`]; this module
//! carries everything that does not move money.

use crate::models::{Campaign, Comment, CommentStatus, Donation, DonationStatus, NewComment, Reward, User};
use crate::services::metrics::DB_QUERY_DURATION;
use platform_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

pub(crate) const DONATION_COLUMNS: &str = "id, campaign_id, reward_id, first_name, last_name, email, \
     phone_number, amount, gateway, channel, transaction_reference, status, anonymous, \
     requires_shipping, shipping_country, shipping_state, shipping_city, shipping_address, \
     shipping_postal_code, created_at, updated_at";

const CAMPAIGN_COLUMNS: &str = "id, user_id, title, slug, summary, goal, funds_raised, status, \
     is_complete, expires_at, created_at, updated_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "crowdfund-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Campaigns
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn find_campaign_by_slug(&self, slug: &str) -> Result<Option<Campaign>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_campaign_by_slug"])
            .start_timer();

        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {} FROM campaigns WHERE slug = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to fetch campaign: {}", e)))?;

        timer.observe_duration();
        Ok(campaign)
    }

    #[instrument(skip(self))]
    pub async fn find_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to fetch campaign: {}", e)))?;

        Ok(campaign)
    }

    /// Active campaigns, newest first.
    #[instrument(skip(self))]
    pub async fn list_campaigns(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Campaign>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_campaigns"])
            .start_timer();

        let per_page = per_page.clamp(1, 100);
        let offset = (page.max(1) - 1) * per_page;

        let campaigns = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {} FROM campaigns WHERE status = 'active' \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            CAMPAIGN_COLUMNS
        ))
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list campaigns: {}", e)))?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE status = 'active'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::Database(anyhow::anyhow!("Failed to count campaigns: {}", e))
                })?;

        timer.observe_duration();
        Ok((campaigns, total))
    }

    // -------------------------------------------------------------------------
    // Rewards
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn find_reward(&self, id: Uuid) -> Result<Option<Reward>, AppError> {
        let reward = sqlx::query_as::<_, Reward>(
            "SELECT id, campaign_id, title, description, amount, requires_shipping, status, created_at \
             FROM rewards WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to fetch reward: {}", e)))?;

        Ok(reward)
    }

    #[instrument(skip(self))]
    pub async fn rewards_for_campaign(&self, campaign_id: Uuid) -> Result<Vec<Reward>, AppError> {
        let rewards = sqlx::query_as::<_, Reward>(
            "SELECT id, campaign_id, title, description, amount, requires_shipping, status, created_at \
             FROM rewards WHERE campaign_id = $1 AND status = 'active' ORDER BY created_at DESC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list rewards: {}", e)))?;

        Ok(rewards)
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    /// Create a donor comment in the inactive state; it is promoted only
    /// when the donation it belongs to is approved.
    #[instrument(skip(self, input), fields(campaign_id = %input.campaign_id))]
    pub async fn create_comment(&self, input: &NewComment) -> Result<Comment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_comment"])
            .start_timer();

        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (id, campaign_id, first_name, last_name, email, body, anonymous, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, campaign_id, first_name, last_name, email, body, anonymous, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(input.campaign_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.body)
        .bind(input.anonymous)
        .bind(CommentStatus::Inactive.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to create comment: {}", e)))?;

        timer.observe_duration();
        Ok(comment)
    }

    #[instrument(skip(self))]
    pub async fn active_comments_for_campaign(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT id, campaign_id, first_name, last_name, email, body, anonymous, status, created_at \
             FROM comments WHERE campaign_id = $1 AND status = 'active' \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list comments: {}", e)))?;

        Ok(comments)
    }

    // -------------------------------------------------------------------------
    // Donations (reads; writes go through the ledger)
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn approved_donations_for_campaign(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Donation>, AppError> {
        let donations = sqlx::query_as::<_, Donation>(&format!(
            "SELECT {} FROM donations WHERE campaign_id = $1 AND status = $2 \
             ORDER BY created_at DESC LIMIT $3",
            DONATION_COLUMNS
        ))
        .bind(campaign_id)
        .bind(DonationStatus::Approved.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list donations: {}", e)))?;

        Ok(donations)
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, first_name, last_name, email, balance, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to fetch user: {}", e)))?;

        Ok(user)
    }
}
