pub mod exceptions;
pub mod logical;
pub mod skipped;

pub use exceptions::{CalendarException, ExceptionCalendar, ExceptionRule, ExceptionScope};
pub use logical::{add_logical_days, logical_days_between, next_logical_day, previous_logical_day};
pub use skipped::{
    resolve_or_empty, NoSkippedDates, ResolvedSkips, SkipResolution, SkippedDateProvider,
    SkippedDates,
};
