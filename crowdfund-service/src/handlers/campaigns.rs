//! Campaign browsing handlers.

use crate::models::Campaign;
use crate::services::donation_policy;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Campaign with its derived funding progress.
#[derive(Debug, Serialize)]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub progress: Decimal,
}

impl From<Campaign> for CampaignView {
    fn from(campaign: Campaign) -> Self {
        let progress = campaign.progress();
        Self { campaign, progress }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Error message carried over from a redirect (the flashed-message
    /// stand-in for the JSON surface).
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<CampaignView>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(12).clamp(1, 100);

    let (campaigns, total) = state.db.list_campaigns(page, per_page).await?;

    Ok(Json(ListResponse {
        data: campaigns.into_iter().map(CampaignView::from).collect(),
        total,
        page,
        per_page,
        error: query.error,
    }))
}

#[derive(Debug, Serialize)]
pub struct ShowResponse {
    pub campaign: CampaignView,
    /// Suggested donation amounts derived from the goal.
    pub amounts: Vec<Decimal>,
    pub rewards: Vec<crate::models::Reward>,
    pub donations: Vec<crate::models::Donation>,
    pub comments: Vec<crate::models::Comment>,
}

pub async fn show_campaign(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ShowResponse>, AppError> {
    let campaign = state
        .db
        .find_campaign_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found.")))?;

    let amounts = donation_policy::suggested_amounts(campaign.goal);
    let rewards = state.db.rewards_for_campaign(campaign.id).await?;
    let donations = state
        .db
        .approved_donations_for_campaign(campaign.id, 8)
        .await?;
    let comments = state.db.active_comments_for_campaign(campaign.id, 4).await?;

    Ok(Json(ShowResponse {
        campaign: campaign.into(),
        amounts,
        rewards,
        donations,
        comments,
    }))
}
