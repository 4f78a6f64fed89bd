//! Donation amount policy.
//!
//! Pure, deterministic helpers: the suggested-amount sequence shown on a
//! campaign page and the amount checks that must reject a submission
//! before any gateway is contacted.

use crate::config::{CurrencyConfig, DonationConfig};
use crate::models::Reward;
use platform_core::error::AppError;
use rust_decimal::Decimal;

/// Suggested donation amounts for a campaign goal: an ascending,
/// deduplicated sequence from roughly 10% of the goal up to just past it,
/// every value rounded up to the nearest 100.
pub fn suggested_amounts(goal: Decimal) -> Vec<Decimal> {
    let minimum = if goal > Decimal::TEN {
        round_up_to_hundred(goal / Decimal::TEN)
    } else {
        Decimal::ONE
    };

    let range = goal - minimum;
    let step = if range > Decimal::from(3) {
        round_up_to_hundred(range / Decimal::from(3))
    } else {
        Decimal::ONE_HUNDRED
    };

    let mut amounts = Vec::new();
    let mut amount = minimum;
    while amount <= goal + Decimal::ONE {
        let rounded = round_up_to_hundred(amount);
        if rounded > Decimal::ZERO && !amounts.contains(&rounded) {
            amounts.push(rounded);
        }
        amount += step;
    }

    amounts
}

fn round_up_to_hundred(value: Decimal) -> Decimal {
    (value / Decimal::ONE_HUNDRED).ceil() * Decimal::ONE_HUNDRED
}

/// Reject amounts outside the configured global bounds, naming the
/// violated bound.
pub fn validate_amount(
    amount: Decimal,
    config: &DonationConfig,
    currency: &CurrencyConfig,
) -> Result<(), AppError> {
    if amount < config.min_amount {
        return Err(AppError::Field {
            field: "amount",
            message: format!(
                "The minimum donation amount must be at least {}",
                format_money(currency, config.min_amount)
            ),
        });
    }

    if amount > config.max_amount {
        return Err(AppError::Field {
            field: "amount",
            message: format!(
                "The donation amount cannot exceed {}",
                format_money(currency, config.max_amount)
            ),
        });
    }

    Ok(())
}

/// A donation claiming a reward must at least meet the reward's minimum.
pub fn validate_reward_minimum(
    amount: Decimal,
    reward: &Reward,
    currency: &CurrencyConfig,
) -> Result<(), AppError> {
    if amount < reward.amount {
        return Err(AppError::Field {
            field: "amount",
            message: format!(
                "The donation amount cannot be less than {}",
                format_money(currency, reward.amount)
            ),
        });
    }

    Ok(())
}

fn format_money(currency: &CurrencyConfig, value: Decimal) -> String {
    let mut value = value;
    value.rescale(currency.precision);
    format!("{}{}", currency.symbol, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn naira() -> CurrencyConfig {
        CurrencyConfig {
            code: "NGN".to_string(),
            symbol: "₦".to_string(),
            precision: 2,
        }
    }

    fn bounds(min: i64, max: i64) -> DonationConfig {
        DonationConfig {
            min_amount: Decimal::from(min),
            max_amount: Decimal::from(max),
            fixed_fee: Decimal::from(50),
        }
    }

    #[test]
    fn goal_of_one_thousand_gives_ascending_hundreds() {
        let amounts = suggested_amounts(Decimal::from(1000));

        assert_eq!(
            amounts,
            vec![
                Decimal::from(100),
                Decimal::from(400),
                Decimal::from(700),
                Decimal::from(1000)
            ]
        );
    }

    #[test]
    fn sequence_is_strictly_ascending_and_bounded() {
        for goal in [5i64, 10, 250, 1000, 33_333, 1_000_000] {
            let goal = Decimal::from(goal);
            let amounts = suggested_amounts(goal);

            assert!(!amounts.is_empty(), "no amounts for goal {}", goal);
            assert!(amounts[0] >= Decimal::ONE_HUNDRED);
            assert!(*amounts.last().unwrap() <= goal + Decimal::ONE_HUNDRED);
            for pair in amounts.windows(2) {
                assert!(pair[0] < pair[1], "not ascending for goal {}", goal);
            }
        }
    }

    #[test]
    fn tiny_goals_fall_back_to_a_single_hundred() {
        assert_eq!(suggested_amounts(Decimal::from(5)), vec![Decimal::ONE_HUNDRED]);
    }

    #[test]
    fn bounds_violations_name_the_bound() {
        let config = bounds(100, 1_000_000);

        let err = validate_amount(Decimal::from(50), &config, &naira()).unwrap_err();
        assert!(err.to_string().contains("at least ₦100.00"), "{}", err);

        let err = validate_amount(Decimal::from(2_000_000), &config, &naira()).unwrap_err();
        assert!(err.to_string().contains("cannot exceed ₦1000000.00"), "{}", err);

        assert!(validate_amount(Decimal::from(500), &config, &naira()).is_ok());
    }

    #[test]
    fn reward_minimum_is_enforced() {
        let reward = Reward {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            title: "Sticker pack".to_string(),
            description: None,
            amount: Decimal::from(3000),
            requires_shipping: false,
            status: "active".to_string(),
            created_at: Utc::now(),
        };

        let err = validate_reward_minimum(Decimal::from(2000), &reward, &naira()).unwrap_err();
        assert!(err.to_string().contains("cannot be less than ₦3000.00"), "{}", err);

        assert!(validate_reward_minimum(Decimal::from(5000), &reward, &naira()).is_ok());
        assert!(validate_reward_minimum(Decimal::from(3000), &reward, &naira()).is_ok());
    }
}
