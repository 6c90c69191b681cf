use chrono::NaiveDate;

use crate::calendar::logical::add_logical_days;
use crate::calendar::skipped::SkippedDates;
use crate::coverage::CoveragePosition;
use crate::decimal::{Days, Money};
use crate::errors::Result;
use crate::payments::Payment;
use crate::state::LoanState;
use crate::types::PaymentId;

/// replays a loan's payment history into a coverage position
pub struct CoverageLedger;

impl CoverageLedger {
    /// compute the ledger position from the down payment and every payment of
    /// the loan, optionally leaving one payment out (edit and delete flows).
    ///
    /// payments are applied in creation order, not payment-date order.
    pub fn position(
        loan: &LoanState,
        payments: &[Payment],
        exclude: Option<PaymentId>,
        skipped: &SkippedDates,
    ) -> Result<CoveragePosition> {
        let mut ordered: Vec<&Payment> = payments
            .iter()
            .filter(|p| p.loan_id == loan.id && Some(p.id) != exclude)
            .collect();
        ordered.sort_by_key(|p| (p.created_at, p.sequence));

        // amounts are summed before converting so thirds of an installment
        // add up to a whole day
        let amount_applied = ordered
            .iter()
            .fold(loan.terms.down_payment, |acc, p| acc + p.total_amount());
        let down_payment_days = loan.terms.down_payment_days()?;
        let total_days_covered = loan.terms.days_covered_by(amount_applied)?;

        let last_covered_date = Self::locate(loan.start_date, total_days_covered, skipped);

        tracing::trace!(
            loan_id = %loan.id,
            payments = ordered.len(),
            total_days = %total_days_covered,
            last_covered = %last_covered_date,
            "ledger position"
        );

        Ok(CoveragePosition {
            last_covered_date,
            amount_applied,
            total_days_covered,
            down_payment_days,
            payments_applied: ordered.len(),
        })
    }

    /// last covered date once a further `amount_total` is applied on top of `position`
    pub fn locate_after(
        loan: &LoanState,
        position: &CoveragePosition,
        amount_total: Money,
        skipped: &SkippedDates,
    ) -> Result<NaiveDate> {
        let total_days = loan.terms.days_covered_by(position.amount_applied + amount_total)?;
        Ok(Self::locate(loan.start_date, total_days, skipped))
    }

    /// last covered calendar date for a fractional day total.
    ///
    /// skipped dates inside the covered span push the date further out in a
    /// single pass; the extension itself is not re-checked for skipped dates.
    pub fn locate(start_date: NaiveDate, total_days_covered: Days, skipped: &SkippedDates) -> NaiveDate {
        if !total_days_covered.is_positive() {
            return start_date;
        }

        let full_days = total_days_covered.whole_days();
        let provisional = add_logical_days(start_date, full_days);
        let skipped_in_span = skipped.count_after_through(start_date, provisional);

        add_logical_days(provisional, skipped_in_span)
    }
}
