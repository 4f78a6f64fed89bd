//! Campaign model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Campaign {
    pub id: Uuid,
    /// Beneficiary: the campaign owner whose balance is credited.
    pub user_id: Uuid,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub goal: Decimal,
    /// Monotonically non-decreasing; mutated only by callback
    /// reconciliation, by exactly the approved donation amount.
    pub funds_raised: Decimal,
    pub status: String,
    pub is_complete: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Funding progress percentage, rounded to two decimals and capped
    /// at 100. Zero when the goal is unset or non-positive.
    pub fn progress(&self) -> Decimal {
        if self.goal <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let progress = (self.funds_raised / self.goal) * Decimal::ONE_HUNDRED;
        progress.round_dp(2).min(Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(goal: Decimal, funds_raised: Decimal) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Clean water".to_string(),
            slug: "clean-water".to_string(),
            summary: None,
            goal,
            funds_raised,
            status: "active".to_string(),
            is_complete: false,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn progress_is_capped_at_one_hundred() {
        let c = campaign(Decimal::from(1000), Decimal::from(2500));
        assert_eq!(c.progress(), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn progress_is_zero_for_zero_goal() {
        let c = campaign(Decimal::ZERO, Decimal::from(500));
        assert_eq!(c.progress(), Decimal::ZERO);
    }

    #[test]
    fn progress_rounds_to_two_decimals() {
        let c = campaign(Decimal::from(3000), Decimal::from(1000));
        assert_eq!(c.progress().to_string(), "33.33");
    }
}
