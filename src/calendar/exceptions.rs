use chrono::{Datelike, Months, NaiveDate};
use hourglass_rs::SafeTimeProvider;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::skipped::{ResolvedSkips, SkippedDateProvider, SkippedDates};
use crate::config::LedgerConfig;
use crate::errors::{LedgerError, Result};
use crate::state::LoanState;
use crate::types::{LoanId, StoreId, VehicleType};

/// who a calendar exception applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionScope {
    /// every loan of a store, optionally only one vehicle type
    Store {
        store_id: StoreId,
        vehicle_type: Option<VehicleType>,
    },
    /// a single loan
    Loan {
        loan_id: LoanId,
    },
}

impl ExceptionScope {
    pub fn applies_to(&self, loan: &LoanState) -> bool {
        match self {
            ExceptionScope::Store {
                store_id,
                vehicle_type,
            } => {
                *store_id == loan.store_id
                    && vehicle_type.map_or(true, |vehicle| vehicle == loan.vehicle_type)
            }
            ExceptionScope::Loan { loan_id } => *loan_id == loan.id,
        }
    }
}

/// which dates an exception removes from the obligation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionRule {
    Dates(Vec<NaiveDate>),
    /// inclusive
    Range {
        start: NaiveDate,
        end: NaiveDate,
    },
    /// the same day every listed month; no months means every month
    Recurring {
        day_of_month: u32,
        months: Vec<u32>,
    },
}

/// holiday or closure record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarException {
    pub id: Uuid,
    pub scope: ExceptionScope,
    pub rule: ExceptionRule,
    pub description: String,
    pub active: bool,
}

impl CalendarException {
    pub fn new(scope: ExceptionScope, rule: ExceptionRule, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            rule,
            description: description.into(),
            active: true,
        }
    }

    pub fn for_store(store_id: StoreId, rule: ExceptionRule, description: impl Into<String>) -> Self {
        Self::new(
            ExceptionScope::Store {
                store_id,
                vehicle_type: None,
            },
            rule,
            description,
        )
    }

    pub fn for_loan(loan_id: LoanId, rule: ExceptionRule, description: impl Into<String>) -> Self {
        Self::new(ExceptionScope::Loan { loan_id }, rule, description)
    }

    /// restrict a store-wide exception to one vehicle type
    pub fn only_for(mut self, vehicle: VehicleType) -> Self {
        if let ExceptionScope::Store { vehicle_type, .. } = &mut self.scope {
            *vehicle_type = Some(vehicle);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        match &self.rule {
            ExceptionRule::Dates(dates) if dates.is_empty() => Err(LedgerError::InvalidDate {
                message: format!("exception '{}' lists no dates", self.description),
            }),
            ExceptionRule::Range { start, end } if end < start => Err(LedgerError::InvalidDate {
                message: format!("exception '{}' ends {} before it starts {}", self.description, end, start),
            }),
            ExceptionRule::Recurring { day_of_month, months } => {
                if !(1..=31).contains(day_of_month) {
                    return Err(LedgerError::InvalidDate {
                        message: format!("day of month out of range: {}", day_of_month),
                    });
                }
                if let Some(month) = months.iter().find(|m| !(1..=12).contains(*m)) {
                    return Err(LedgerError::InvalidDate {
                        message: format!("month out of range: {}", month),
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// concrete dates of this exception; recurring rules are bounded to `[from, until]`
    pub fn expand(&self, from: NaiveDate, until: NaiveDate) -> Vec<NaiveDate> {
        if until < from {
            return Vec::new();
        }

        match &self.rule {
            ExceptionRule::Dates(dates) => dates.clone(),
            ExceptionRule::Range { start, end } => start
                .iter_days()
                .take_while(|day| day <= end)
                .collect(),
            ExceptionRule::Recurring { day_of_month, months } => {
                let mut dates = Vec::new();
                let mut cursor = from.with_day(1);
                while let Some(month_start) = cursor {
                    if month_start > until {
                        break;
                    }
                    let applies = months.is_empty() || months.contains(&month_start.month());
                    if applies {
                        // months without this day (feb 30) are passed over
                        if let Some(date) = month_start.with_day(*day_of_month) {
                            if date >= from && date <= until {
                                dates.push(date);
                            }
                        }
                    }
                    cursor = month_start.checked_add_months(Months::new(1));
                }
                dates
            }
        }
    }
}

/// in-memory registry of holidays and closures
pub struct ExceptionCalendar {
    exceptions: RwLock<Vec<CalendarException>>,
    time: SafeTimeProvider,
    config: LedgerConfig,
}

impl ExceptionCalendar {
    pub fn new(time: SafeTimeProvider, config: LedgerConfig) -> Self {
        Self {
            exceptions: RwLock::new(Vec::new()),
            time,
            config,
        }
    }

    pub fn add(&self, exception: CalendarException) -> Result<Uuid> {
        exception.validate()?;
        let id = exception.id;

        tracing::info!(
            exception_id = %id,
            description = %exception.description,
            "calendar exception added"
        );
        self.exceptions.write().push(exception);
        Ok(id)
    }

    /// stop applying an exception; returns false when unknown
    pub fn deactivate(&self, id: Uuid) -> bool {
        let mut exceptions = self.exceptions.write();
        match exceptions.iter_mut().find(|e| e.id == id) {
            Some(exception) => {
                exception.active = false;
                true
            }
            None => false,
        }
    }

    pub fn exceptions(&self) -> Vec<CalendarException> {
        self.exceptions.read().clone()
    }

    /// last day recurring rules are expanded to
    pub fn horizon(&self) -> Result<NaiveDate> {
        let today = self.config.local_date(self.time.now());
        today
            .checked_add_months(Months::new(self.config.skip_horizon_months))
            .ok_or_else(|| LedgerError::InvalidDate {
                message: format!(
                    "skip horizon of {} months overflows from {}",
                    self.config.skip_horizon_months, today
                ),
            })
    }
}

impl SkippedDateProvider for ExceptionCalendar {
    fn resolve(&self, loan: &LoanState) -> Result<ResolvedSkips> {
        let horizon = self.horizon()?;
        let exceptions = self.exceptions.read();

        let mut dates = SkippedDates::new();
        let mut source_descriptions = Vec::new();
        for exception in exceptions
            .iter()
            .filter(|e| e.active && e.scope.applies_to(loan))
        {
            dates.extend(exception.expand(loan.start_date, horizon));
            source_descriptions.push(exception.description.clone());
        }

        Ok(ResolvedSkips {
            dates,
            source_descriptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{daily_loan, start};
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn calendar() -> ExceptionCalendar {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
        ));
        ExceptionCalendar::new(time, LedgerConfig::default())
    }

    #[test]
    fn test_store_and_loan_exceptions_merge() {
        let loan = daily_loan();
        let calendar = calendar();

        calendar
            .add(CalendarException::for_store(
                loan.store_id,
                ExceptionRule::Dates(vec![d(2024, 1, 6), d(2024, 1, 1)]),
                "new year closure",
            ))
            .unwrap();
        calendar
            .add(CalendarException::for_loan(
                loan.id,
                ExceptionRule::Dates(vec![d(2024, 1, 6), d(2024, 1, 12)]),
                "borrower hospitalised",
            ))
            .unwrap();
        calendar
            .add(CalendarException::for_store(
                uuid::Uuid::new_v4(),
                ExceptionRule::Dates(vec![d(2024, 1, 3)]),
                "other store",
            ))
            .unwrap();

        let resolved = calendar.resolve(&loan).unwrap();

        assert_eq!(
            resolved.dates.to_vec(),
            vec![d(2024, 1, 1), d(2024, 1, 6), d(2024, 1, 12)]
        );
        assert_eq!(resolved.source_descriptions.len(), 2);
    }

    #[test]
    fn test_vehicle_type_filter() {
        let loan = daily_loan();
        let calendar = calendar();

        calendar
            .add(
                CalendarException::for_store(
                    loan.store_id,
                    ExceptionRule::Dates(vec![d(2024, 2, 1)]),
                    "car inspection day",
                )
                .only_for(VehicleType::Car),
            )
            .unwrap();

        assert!(calendar.resolve(&loan).unwrap().dates.is_empty());
    }

    #[test]
    fn test_range_is_inclusive() {
        let exception = CalendarException::for_loan(
            Uuid::new_v4(),
            ExceptionRule::Range {
                start: d(2024, 3, 29),
                end: d(2024, 4, 2),
            },
            "easter",
        );

        let dates = exception.expand(start(), d(2025, 1, 1));

        assert_eq!(dates.len(), 5);
        assert_eq!(dates.first(), Some(&d(2024, 3, 29)));
        assert_eq!(dates.last(), Some(&d(2024, 4, 2)));
    }

    #[test]
    fn test_recurring_expands_to_horizon() {
        let loan = daily_loan();
        let calendar = calendar();

        calendar
            .add(CalendarException::for_store(
                loan.store_id,
                ExceptionRule::Recurring {
                    day_of_month: 15,
                    months: vec![],
                },
                "monthly stock take",
            ))
            .unwrap();

        let resolved = calendar.resolve(&loan).unwrap();

        // jan 15 2024 through jan 10 2025
        assert_eq!(resolved.dates.len(), 12);
        assert!(resolved.dates.contains(d(2024, 1, 15)));
        assert!(resolved.dates.contains(d(2024, 12, 15)));
        assert!(!resolved.dates.contains(d(2025, 1, 15)));
    }

    #[test]
    fn test_recurring_skips_missing_days() {
        let exception = CalendarException::for_loan(
            Uuid::new_v4(),
            ExceptionRule::Recurring {
                day_of_month: 30,
                months: vec![1, 2, 3],
            },
            "quarter close",
        );

        let dates = exception.expand(start(), d(2024, 12, 31));

        assert_eq!(dates, vec![d(2024, 1, 30), d(2024, 3, 30)]);
    }

    #[test]
    fn test_resolving_twice_is_stable() {
        let loan = daily_loan();
        let calendar = calendar();

        calendar
            .add(CalendarException::for_store(
                loan.store_id,
                ExceptionRule::Recurring {
                    day_of_month: 1,
                    months: vec![1, 5],
                },
                "public holidays",
            ))
            .unwrap();

        let first = calendar.resolve(&loan).unwrap();
        let second = calendar.resolve(&loan).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_deactivated_exception_stops_applying() {
        let loan = daily_loan();
        let calendar = calendar();

        let id = calendar
            .add(CalendarException::for_loan(
                loan.id,
                ExceptionRule::Dates(vec![d(2024, 1, 5)]),
                "one-off",
            ))
            .unwrap();

        assert!(calendar.deactivate(id));
        assert!(!calendar.deactivate(Uuid::new_v4()));
        assert!(calendar.resolve(&loan).unwrap().dates.is_empty());
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let calendar = calendar();
        let loan_id = Uuid::new_v4();

        let backwards = CalendarException::for_loan(
            loan_id,
            ExceptionRule::Range {
                start: d(2024, 2, 1),
                end: d(2024, 1, 1),
            },
            "backwards",
        );
        assert!(matches!(calendar.add(backwards), Err(LedgerError::InvalidDate { .. })));

        let bad_month = CalendarException::for_loan(
            loan_id,
            ExceptionRule::Recurring {
                day_of_month: 1,
                months: vec![13],
            },
            "bad month",
        );
        assert!(calendar.add(bad_month).is_err());

        let empty = CalendarException::for_loan(loan_id, ExceptionRule::Dates(vec![]), "nothing");
        assert!(calendar.add(empty).is_err());

        assert!(calendar.exceptions().is_empty());
    }
}
