use thiserror::Error;

use crate::domain::{Amount, Currency, UserId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid currency '{0}'. Use one of: {codes}", codes = Currency::valid_codes())]
    InvalidCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient {currency} for user {user_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        currency: Currency,
        balance: Amount,
        required: Amount,
    },

    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("No pending transaction with id {0}")]
    NoSuchPendingTransaction(String),

    #[error("Got {currencies} currencies but {amounts} amounts")]
    MismatchedBatchLengths { currencies: usize, amounts: usize },

    #[error("User {0} is not allowed to perform this operation")]
    PermissionDenied(UserId),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Stable identifier for rendering failures.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidCurrency(_) => "invalid_currency",
            AppError::InvalidAmount(_) => "invalid_amount",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::SelfTransfer => "self_transfer",
            AppError::NoSuchPendingTransaction(_) => "no_such_pending_transaction",
            AppError::MismatchedBatchLengths { .. } => "mismatched_batch_lengths",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::Database(_) => "database",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AppError::SelfTransfer.kind(), "self_transfer");
        assert_eq!(
            AppError::MismatchedBatchLengths {
                currencies: 2,
                amounts: 1
            }
            .kind(),
            "mismatched_batch_lengths"
        );
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = AppError::InsufficientFunds {
            user_id: 9,
            currency: Currency::Ap,
            balance: 100,
            required: 150,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient AP for user 9: balance 100, required 150"
        );
    }

    #[test]
    fn test_invalid_currency_lists_valid_codes() {
        let err = AppError::InvalidCurrency("gold".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid currency 'gold'. Use one of: AP, SP, YEN, REPUTATION"
        );
    }
}
