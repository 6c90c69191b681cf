use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::logical::{logical_days_between, previous_logical_day};
use crate::calendar::skipped::SkippedDates;
use crate::decimal::{Days, Money};
use crate::errors::Result;
use crate::state::LoanState;

/// debt state frozen onto a payment when it is recorded.
///
/// never recomputed after creation; deletions of other payments leave it as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtSnapshot {
    /// day the payment was recorded
    pub recorded_on: NaiveDate,
    /// obligation accrued from the start date through the day before recording
    pub days_owed_through_yesterday: Days,
    pub days_covered_before: Days,
    pub exact_installments_owed_before: Decimal,
    pub remaining_amount_owed_before: Money,
    pub days_covered_by_this_payment: Days,
    pub days_covered_after: Days,
    pub days_behind_after: Days,
    pub days_ahead_after: Days,
    pub is_up_to_date_after: bool,
    pub remaining_amount_owed_after: Money,
}

impl DebtSnapshot {
    /// capture the before/after debt state of a payment of `amount_total`
    /// recorded on `today`, given the amount the ledger had applied before it.
    ///
    /// today's own obligation has not accrued at submission time.
    pub fn capture(
        loan: &LoanState,
        amount_applied_before: Money,
        amount_total: Money,
        today: NaiveDate,
        skipped: &SkippedDates,
        up_to_date_tolerance: Decimal,
    ) -> Result<Self> {
        let period_days = loan.terms.period_days();
        let days_owed = Self::days_owed_through(loan, previous_logical_day(today), skipped);

        let days_covered_before = loan.terms.days_covered_by(amount_applied_before)?;
        let owed_before = (days_owed - days_covered_before).non_negative();
        let days_covered_by_this_payment = loan.terms.days_covered_by(amount_total)?;
        let days_covered_after = loan.terms.days_covered_by(amount_applied_before + amount_total)?;

        let net_position = days_covered_after - days_owed;
        let days_behind_after = (-net_position).non_negative();
        let days_ahead_after = net_position.non_negative();
        let is_up_to_date_after = net_position.abs().as_decimal() < up_to_date_tolerance;

        Ok(Self {
            recorded_on: today,
            days_owed_through_yesterday: days_owed,
            days_covered_before,
            exact_installments_owed_before: owed_before.in_installments(period_days),
            remaining_amount_owed_before: loan.terms.cost_of(owed_before),
            days_covered_by_this_payment,
            days_covered_after,
            days_behind_after,
            days_ahead_after,
            is_up_to_date_after,
            remaining_amount_owed_after: loan.terms.cost_of(days_behind_after),
        })
    }

    /// obligating logical days in `(start_date, through]`, zero before the loan starts
    pub fn days_owed_through(loan: &LoanState, through: NaiveDate, skipped: &SkippedDates) -> Days {
        if through <= loan.start_date {
            return Days::ZERO;
        }
        let elapsed = logical_days_between(loan.start_date, through);
        let skipped_days = skipped.count_after_through(loan.start_date, through) as i64;

        Days::from_whole((elapsed - skipped_days).max(0))
    }

    pub fn installments_behind_after(&self, loan: &LoanState) -> Decimal {
        self.days_behind_after.in_installments(loan.terms.period_days())
    }

    pub fn installments_ahead_after(&self, loan: &LoanState) -> Decimal {
        self.days_ahead_after.in_installments(loan.terms.period_days())
    }
}
