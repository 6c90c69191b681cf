pub mod listing;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coverage::{Coverage, DebtSnapshot};
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::state::LoanState;
use crate::types::{LoanId, PaymentId, PaymentMethod, StoreId, UserId};

pub use listing::{AccessScope, Page, PaymentFilter, PaymentWithStatus};

/// payment submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub loan_id: LoanId,
    /// base amount, counted against the financed debt
    pub amount: Money,
    /// add-on portion (e.g. gps fee), zero if none
    pub addon_amount: Money,
    /// defaults to the recording day
    pub payment_date: Option<NaiveDate>,
    pub store_id: StoreId,
    pub created_by: UserId,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub attachment: Option<String>,
}

impl RecordPayment {
    pub fn new(loan_id: LoanId, amount: Money, store_id: StoreId, created_by: UserId) -> Self {
        Self {
            loan_id,
            amount,
            addon_amount: Money::ZERO,
            payment_date: None,
            store_id,
            created_by,
            payment_method: PaymentMethod::Cash,
            notes: None,
            attachment: None,
        }
    }

    pub fn addon(mut self, addon_amount: Money) -> Self {
        self.addon_amount = addon_amount;
        self
    }

    pub fn paid_on(mut self, payment_date: NaiveDate) -> Self {
        self.payment_date = Some(payment_date);
        self
    }

    pub fn method(mut self, payment_method: PaymentMethod) -> Self {
        self.payment_method = payment_method;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn total_amount(&self) -> Money {
        self.amount + self.addon_amount
    }

    /// check the submission against the loan it targets
    pub fn validate_against(&self, loan: &LoanState) -> Result<()> {
        if !loan.can_accept_payment() {
            return Err(LedgerError::LoanNotActive {
                status: loan.status,
            });
        }

        if !self.amount.is_positive() {
            return Err(LedgerError::InvalidPaymentAmount {
                amount: self.amount,
            });
        }

        // an add-on beyond the loan's whole add-on obligation is a keying error
        if self.addon_amount.is_negative() || self.addon_amount > loan.terms.total_addon() {
            return Err(LedgerError::InvalidPaymentAmount {
                amount: self.addon_amount,
            });
        }

        if self.amount > loan.debt_remaining {
            return Err(LedgerError::PaymentExceedsDebt {
                remaining: loan.debt_remaining,
                requested: self.amount,
            });
        }

        Ok(())
    }
}

/// installment payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub store_id: StoreId,
    pub created_by: UserId,
    pub amount: Money,
    pub addon_amount: Money,
    pub payment_date: NaiveDate,
    /// ledger replay order, with `sequence` breaking ties
    pub created_at: DateTime<Utc>,
    /// assigned by the store on commit
    pub sequence: u64,

    // administrative, editable
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub attachment: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,

    // frozen at creation
    #[serde(flatten)]
    pub coverage: Coverage,
    #[serde(flatten)]
    pub snapshot: DebtSnapshot,
    /// the snapshot was computed without calendar exceptions
    pub skip_resolution_degraded: bool,
}

impl Payment {
    pub fn new(
        request: RecordPayment,
        payment_date: NaiveDate,
        coverage: Coverage,
        snapshot: DebtSnapshot,
        skip_resolution_degraded: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id: request.loan_id,
            store_id: request.store_id,
            created_by: request.created_by,
            amount: request.amount,
            addon_amount: request.addon_amount,
            payment_date,
            created_at,
            sequence: 0,
            payment_method: request.payment_method,
            notes: request.notes,
            attachment: request.attachment,
            updated_at: None,
            coverage,
            snapshot,
            skip_resolution_degraded,
        }
    }

    /// base plus add-on
    pub fn total_amount(&self) -> Money {
        self.amount + self.addon_amount
    }

    pub fn is_late(&self) -> bool {
        self.coverage.is_late
    }

    pub fn is_advance(&self) -> bool {
        self.coverage.is_advance
    }

    /// ordering key for ledger replay
    pub fn replay_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }
}

/// edit of a recorded payment.
///
/// only administrative fields and the payment date can change; coverage and
/// the debt snapshot stay as recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub attachment: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

impl PaymentUpdate {
    pub fn is_empty(&self) -> bool {
        self.payment_method.is_none()
            && self.notes.is_none()
            && self.attachment.is_none()
            && self.payment_date.is_none()
    }

    /// apply the edit, returning whether anything changed
    pub fn apply_to(&self, payment: &mut Payment, timestamp: DateTime<Utc>) -> bool {
        let before = payment.clone();

        if let Some(method) = self.payment_method {
            payment.payment_method = method;
        }
        if let Some(notes) = &self.notes {
            payment.notes = Some(notes.clone());
        }
        if let Some(attachment) = &self.attachment {
            payment.attachment = Some(attachment.clone());
        }
        if let Some(date) = self.payment_date {
            payment.payment_date = date;
        }

        let changed = *payment != before;
        if changed {
            payment.updated_at = Some(timestamp);
        }
        changed
    }
}
