use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::logical::LOGICAL_MONTH_DAYS;
use crate::errors::Result;
use crate::state::LoanState;

/// sorted, deduplicated set of non-obligating calendar dates for one loan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDates {
    dates: BTreeSet<NaiveDate>,
}

impl SkippedDates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn insert(&mut self, date: NaiveDate) -> bool {
        self.dates.insert(date)
    }

    pub fn extend<I: IntoIterator<Item = NaiveDate>>(&mut self, dates: I) {
        self.dates.extend(dates);
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// ascending iteration
    pub fn iter(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.iter()
    }

    pub fn to_vec(&self) -> Vec<NaiveDate> {
        self.dates.iter().copied().collect()
    }

    /// skipped dates in `(after, through]`.
    ///
    /// dates on a 31st are not logical days and never count.
    pub fn count_after_through(&self, after: NaiveDate, through: NaiveDate) -> u32 {
        if through <= after {
            return 0;
        }
        self.dates
            .range(after.succ_opt().unwrap_or(after)..=through)
            .filter(|date| date.day() <= LOGICAL_MONTH_DAYS)
            .count() as u32
    }

    /// skipped dates in `[start, end]`
    pub fn count_within(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        if end < start {
            return 0;
        }
        self.dates
            .range(start..=end)
            .filter(|date| date.day() <= LOGICAL_MONTH_DAYS)
            .count() as u32
    }
}

impl FromIterator<NaiveDate> for SkippedDates {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

/// resolver output: the merged date set and where it came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSkips {
    pub dates: SkippedDates,
    pub source_descriptions: Vec<String>,
}

impl ResolvedSkips {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// source of holidays and closures for a loan.
///
/// implementations may fail; the ledger degrades to an empty set.
pub trait SkippedDateProvider: Send + Sync {
    fn resolve(&self, loan: &LoanState) -> Result<ResolvedSkips>;
}

/// provider for loans with no calendar exceptions at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSkippedDates;

impl SkippedDateProvider for NoSkippedDates {
    fn resolve(&self, _loan: &LoanState) -> Result<ResolvedSkips> {
        Ok(ResolvedSkips::empty())
    }
}

/// skipped dates together with whether the provider failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkipResolution {
    pub skips: ResolvedSkips,
    pub degraded: bool,
    pub failure: Option<String>,
}

impl SkipResolution {
    pub fn dates(&self) -> &SkippedDates {
        &self.skips.dates
    }
}

/// resolve skipped dates, treating any provider failure as an empty set
pub fn resolve_or_empty(provider: &dyn SkippedDateProvider, loan: &LoanState) -> SkipResolution {
    match provider.resolve(loan) {
        Ok(skips) => {
            tracing::debug!(
                loan_id = %loan.id,
                skipped = skips.dates.len(),
                "resolved skipped dates"
            );
            SkipResolution {
                skips,
                degraded: false,
                failure: None,
            }
        }
        Err(err) => {
            tracing::warn!(
                loan_id = %loan.id,
                error = %err,
                "skipped date resolution failed, treating every day as obligating"
            );
            SkipResolution {
                skips: ResolvedSkips::empty(),
                degraded: true,
                failure: Some(err.to_string()),
            }
        }
    }
}
