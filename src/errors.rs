use thiserror::Error;

use crate::decimal::Money;
use crate::types::{LoanId, LoanStatus, PaymentId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("loan not found: {id}")]
    LoanNotFound {
        id: LoanId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    #[error("loan not active: current status is {status:?}")]
    LoanNotActive {
        status: LoanStatus,
    },

    #[error("payment exceeds remaining debt: remaining {remaining}, requested {requested}")]
    PaymentExceedsDebt {
        remaining: Money,
        requested: Money,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("daily rate must be positive, got {rate}")]
    NonPositiveDailyRate {
        rate: Money,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("skipped date resolution failed: {message}")]
    SkipResolution {
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },
}

impl LedgerError {
    /// errors the caller can fix by changing the request
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            LedgerError::LoanNotActive { .. }
                | LedgerError::PaymentExceedsDebt { .. }
                | LedgerError::InvalidPaymentAmount { .. }
                | LedgerError::InvalidDate { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::LoanNotFound { .. } | LedgerError::PaymentNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
