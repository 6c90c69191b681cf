use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::logical::{add_logical_days, logical_days_between, next_logical_day};
use crate::calendar::skipped::SkippedDates;
use crate::coverage::CoveragePosition;
use crate::decimal::{Days, Money};
use crate::errors::{LedgerError, Result};
use crate::state::LoanState;
use crate::types::PaymentTiming;

/// date range a payment pays for, and how it landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// this payment's own contribution, independent of history
    pub days_covered: Days,
    pub coverage_start: NaiveDate,
    pub coverage_end: NaiveDate,
    pub timing: PaymentTiming,
    pub is_late: bool,
    pub late_payment_date: Option<NaiveDate>,
    pub is_advance: bool,
    pub advance_payment_date: Option<NaiveDate>,
}

/// live arrears/advance for dashboards and listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStatus {
    pub as_of: NaiveDate,
    pub last_covered_date: NaiveDate,
    pub days_behind: u32,
    pub days_ahead: u32,
    pub installments_behind: Decimal,
    pub installments_ahead: Decimal,
    pub amount_needed_to_catch_up: Money,
}

impl CoverageStatus {
    /// neither behind nor ahead
    pub fn is_current(&self) -> bool {
        self.days_behind == 0 && self.days_ahead == 0
    }

    /// status for a loan with nothing left to pay
    pub fn settled(last_covered_date: NaiveDate, as_of: NaiveDate) -> Self {
        Self {
            as_of,
            last_covered_date,
            days_behind: 0,
            days_ahead: 0,
            installments_behind: Decimal::ZERO,
            installments_ahead: Decimal::ZERO,
            amount_needed_to_catch_up: Money::ZERO,
        }
    }
}

/// turns payment amounts and ledger positions into coverage and status
pub struct CoverageCalculator;

impl CoverageCalculator {
    /// coverage of a new payment on top of `position`, classified against `as_of`
    pub fn calculate(
        loan: &LoanState,
        amount_total: Money,
        position: &CoveragePosition,
        as_of: NaiveDate,
        skipped: &SkippedDates,
    ) -> Result<Coverage> {
        let days_covered = loan.terms.days_covered_by(amount_total)?;

        let coverage_start = Self::first_obligating_day_after(position.last_covered_date, skipped);

        // sub-day and non-positive payments still touch exactly one day
        let whole_days = days_covered.whole_days();
        let coverage_end = if whole_days >= 1 {
            let provisional = add_logical_days(coverage_start, whole_days - 1);
            let skipped_inside = skipped.count_within(coverage_start, provisional);
            add_logical_days(provisional, skipped_inside)
        } else {
            coverage_start
        };

        let is_late = coverage_start <= as_of;
        let timing = if is_late {
            PaymentTiming::Late
        } else if coverage_start == Self::first_obligating_day_after(as_of, skipped) {
            PaymentTiming::OnTime
        } else {
            PaymentTiming::Advance
        };
        let is_advance = timing == PaymentTiming::Advance;

        tracing::debug!(
            loan_id = %loan.id,
            amount = %amount_total,
            days = %days_covered,
            start = %coverage_start,
            end = %coverage_end,
            ?timing,
            "payment coverage"
        );

        Ok(Coverage {
            days_covered,
            coverage_start,
            coverage_end,
            timing,
            is_late,
            late_payment_date: is_late.then_some(coverage_start),
            is_advance,
            advance_payment_date: is_advance.then_some(coverage_start),
        })
    }

    /// days behind or ahead of `today` for a loan covered through `last_covered_date`.
    ///
    /// skipped dates between the two are not owed when behind and are not
    /// credited when ahead.
    pub fn status(
        loan: &LoanState,
        last_covered_date: NaiveDate,
        today: NaiveDate,
        skipped: &SkippedDates,
    ) -> Result<CoverageStatus> {
        let period_days = loan.terms.period_days();
        if !loan.terms.installment_total().is_positive() {
            return Err(LedgerError::NonPositiveDailyRate {
                rate: loan.terms.installment_total(),
            });
        }

        let raw = logical_days_between(last_covered_date, today);
        let signed = if raw >= 0 {
            raw - skipped.count_after_through(last_covered_date, today) as i64
        } else {
            raw + skipped.count_after_through(today, last_covered_date) as i64
        };

        let days_behind = signed.max(0) as u32;
        let days_ahead = (-signed).max(0) as u32;
        let behind = Days::from_whole(days_behind as i64);
        let ahead = Days::from_whole(days_ahead as i64);

        Ok(CoverageStatus {
            as_of: today,
            last_covered_date,
            days_behind,
            days_ahead,
            installments_behind: behind.in_installments(period_days),
            installments_ahead: ahead.in_installments(period_days),
            amount_needed_to_catch_up: loan.terms.cost_of(behind),
        })
    }

    /// the next logical day after `date` that is not skipped
    pub fn first_obligating_day_after(date: NaiveDate, skipped: &SkippedDates) -> NaiveDate {
        let mut day = next_logical_day(date);
        while skipped.contains(day) {
            day = next_logical_day(day);
        }
        day
    }
}
