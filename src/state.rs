use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LoanTerms;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{LoanId, LoanStatus, StoreId, VehicleType};

/// tolerance for the paid + remaining == total invariant
pub const INSTALLMENT_TOLERANCE: Decimal = dec!(0.000001);

/// loan aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanState {
    // identification
    pub id: LoanId,
    pub store_id: StoreId,
    pub vehicle_type: VehicleType,
    pub customer_name: String,

    // terms
    pub start_date: NaiveDate,
    pub terms: LoanTerms,

    // installment tracking
    pub total_installments: Decimal,
    pub paid_installments: Decimal,
    pub remaining_installments: Decimal,

    // balances
    pub total_debt: Money,
    pub total_paid: Money,
    pub total_addon_paid: Money,
    pub debt_remaining: Money,

    // payment tracking
    pub payment_count: u32,
    pub last_payment_date: Option<NaiveDate>,

    /// cached ledger position, recomputed on every payment create/delete
    pub last_covered_date: NaiveDate,

    // status
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub last_status_change: DateTime<Utc>,
}

/// registration request for a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLoan {
    pub store_id: StoreId,
    pub vehicle_type: VehicleType,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub terms: LoanTerms,
}

impl NewLoan {
    pub fn new(store_id: StoreId, start_date: NaiveDate, terms: LoanTerms) -> Self {
        Self {
            store_id,
            vehicle_type: VehicleType::Motorcycle,
            customer_name: String::new(),
            start_date,
            terms,
        }
    }

    pub fn vehicle_type(mut self, vehicle_type: VehicleType) -> Self {
        self.vehicle_type = vehicle_type;
        self
    }

    pub fn customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = name.into();
        self
    }
}

impl LoanState {
    /// create a new active loan; nothing is covered past the start date yet
    pub fn new(request: NewLoan, created_at: DateTime<Utc>) -> Result<Self> {
        request.terms.validate()?;

        let total_installments = Decimal::from(request.terms.total_installments);
        let total_debt = request.terms.total_debt();

        Ok(Self {
            id: Uuid::new_v4(),
            store_id: request.store_id,
            vehicle_type: request.vehicle_type,
            customer_name: request.customer_name,
            start_date: request.start_date,
            terms: request.terms,
            total_installments,
            paid_installments: Decimal::ZERO,
            remaining_installments: total_installments,
            total_debt,
            total_paid: Money::ZERO,
            total_addon_paid: Money::ZERO,
            debt_remaining: total_debt,
            payment_count: 0,
            last_payment_date: None,
            last_covered_date: request.start_date,
            status: LoanStatus::Active,
            created_at,
            last_status_change: created_at,
        })
    }

    pub fn daily_rate(&self) -> Result<Money> {
        self.terms.daily_rate()
    }

    /// check if loan can accept payments
    pub fn can_accept_payment(&self) -> bool {
        self.status.accepts_payments()
    }

    /// paid + remaining == total within tolerance
    pub fn is_balanced(&self) -> bool {
        (self.paid_installments + self.remaining_installments - self.total_installments).abs()
            <= INSTALLMENT_TOLERANCE
    }

    /// update status, returning the transition when it changed
    pub fn update_status(
        &mut self,
        new_status: LoanStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<(LoanStatus, LoanStatus)> {
        if self.status == new_status {
            return None;
        }
        let old_status = self.status;
        self.status = new_status;
        self.last_status_change = timestamp;
        Some((old_status, new_status))
    }

    /// fold a payment into the running totals
    pub fn apply_payment(
        &mut self,
        base_amount: Money,
        addon_amount: Money,
        payment_date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<(LoanStatus, LoanStatus)>> {
        if !self.can_accept_payment() {
            return Err(LedgerError::LoanNotActive {
                status: self.status,
            });
        }

        let installments = self.terms.installments_for(base_amount)?;

        self.paid_installments += installments;
        self.remaining_installments =
            (self.total_installments - self.paid_installments).max(Decimal::ZERO);
        self.total_paid += base_amount;
        self.total_addon_paid += addon_amount;
        self.debt_remaining = (self.debt_remaining - base_amount).max(Money::ZERO);
        self.payment_count += 1;
        self.last_payment_date = Some(payment_date);

        if self.debt_remaining.is_zero() || self.remaining_installments <= Decimal::ZERO {
            return Ok(self.update_status(LoanStatus::Completed, timestamp));
        }
        Ok(None)
    }

    /// undo a payment's effect on the running totals.
    ///
    /// a completed loan returns to active when debt is owed again;
    /// a defaulted loan stays defaulted.
    pub fn reverse_payment(
        &mut self,
        base_amount: Money,
        addon_amount: Money,
        last_payment_date: Option<NaiveDate>,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<(LoanStatus, LoanStatus)>> {
        let installments = self.terms.installments_for(base_amount)?;

        self.paid_installments = (self.paid_installments - installments).max(Decimal::ZERO);
        self.remaining_installments =
            (self.total_installments - self.paid_installments).max(Decimal::ZERO);
        self.total_paid = (self.total_paid - base_amount).max(Money::ZERO);
        self.total_addon_paid = (self.total_addon_paid - addon_amount).max(Money::ZERO);
        self.debt_remaining = (self.debt_remaining + base_amount).min(self.total_debt);
        self.payment_count = self.payment_count.saturating_sub(1);
        self.last_payment_date = last_payment_date;

        let owes_again =
            self.debt_remaining.is_positive() && self.remaining_installments > Decimal::ZERO;
        if self.status == LoanStatus::Completed && owes_again {
            return Ok(self.update_status(LoanStatus::Active, timestamp));
        }
        Ok(None)
    }

    /// external collections hook; the ledger never defaults a loan itself
    pub fn mark_defaulted(&mut self, timestamp: DateTime<Utc>) -> Option<(LoanStatus, LoanStatus)> {
        self.update_status(LoanStatus::Defaulted, timestamp)
    }
}
