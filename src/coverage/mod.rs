pub mod calculator;
pub mod ledger;
pub mod snapshot;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Days, Money};

pub use calculator::{Coverage, CoverageCalculator, CoverageStatus};
pub use ledger::CoverageLedger;
pub use snapshot::DebtSnapshot;

/// where a loan's ledger stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveragePosition {
    /// last calendar day paid for, skipped days included
    pub last_covered_date: NaiveDate,
    /// down payment plus payment totals, base and add-on
    pub amount_applied: Money,
    /// `amount_applied` in fractional logical days
    pub total_days_covered: Days,
    pub down_payment_days: Days,
    pub payments_applied: usize,
}

impl CoveragePosition {
    /// whether anything beyond the start date is paid for
    pub fn has_coverage(&self) -> bool {
        self.total_days_covered.is_positive()
    }
}
