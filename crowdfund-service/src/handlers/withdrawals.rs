//! Beneficiary withdrawal handlers.

use crate::models::Withdrawal;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use platform_core::error::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MIN_WITHDRAWAL: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub withdrawal: Withdrawal,
}

/// Request a withdrawal. The balance is debited immediately; staff
/// approval settles it, rejection refunds it.
pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(payload): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalResponse>), AppError> {
    if payload.amount < MIN_WITHDRAWAL {
        return Err(AppError::Field {
            field: "amount",
            message: format!("The withdrawal amount must be at least {}.", MIN_WITHDRAWAL),
        });
    }

    let withdrawal = state
        .ledger
        .request_withdrawal(payload.user_id, payload.amount)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(WithdrawalResponse {
            status: "success",
            message: "Your withdrawal request has been submitted successfully.",
            withdrawal,
        }),
    ))
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let withdrawal = state.ledger.approve_withdrawal(id).await?;

    Ok(Json(WithdrawalResponse {
        status: "success",
        message: "Withdrawal approved successfully.",
        withdrawal,
    }))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let withdrawal = state.ledger.reject_withdrawal(id).await?;

    Ok(Json(WithdrawalResponse {
        status: "success",
        message: "Withdrawal rejected and funds returned to user balance.",
        withdrawal,
    }))
}
