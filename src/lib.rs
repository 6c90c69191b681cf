pub mod calendar;
pub mod config;
pub mod coverage;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod payments;
pub mod service;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod types;

// re-export key types
pub use calendar::{
    add_logical_days, logical_days_between, CalendarException, ExceptionCalendar, ExceptionRule,
    ExceptionScope, NoSkippedDates, ResolvedSkips, SkippedDateProvider, SkippedDates,
};
pub use config::{LedgerConfig, LoanTerms};
pub use coverage::{
    Coverage, CoverageCalculator, CoverageLedger, CoveragePosition, CoverageStatus, DebtSnapshot,
};
pub use decimal::{Days, Money};
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use payments::{
    AccessScope, Page, Payment, PaymentFilter, PaymentUpdate, PaymentWithStatus, RecordPayment,
};
pub use service::{CoveragePreview, InstallmentService, LoanLocks, LoanSummary};
pub use state::{LoanState, NewLoan};
pub use store::{InMemoryStore, LedgerStore};
pub use types::{
    LoanId, LoanStatus, PaymentFrequency, PaymentId, PaymentMethod, PaymentTiming, StoreId,
    UserId, VehicleType,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
