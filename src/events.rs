use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Days, Money};
use crate::types::{LoanId, LoanStatus, PaymentId, PaymentTiming};

/// all events that can be emitted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    LoanRegistered {
        loan_id: LoanId,
        total_debt: Money,
        start_date: NaiveDate,
        down_payment_days: Days,
        timestamp: DateTime<Utc>,
    },
    LoanCompleted {
        loan_id: LoanId,
        final_payment_id: PaymentId,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        addon_amount: Money,
        days_covered: Days,
        timing: PaymentTiming,
        timestamp: DateTime<Utc>,
    },
    PaymentAmended {
        loan_id: LoanId,
        payment_id: PaymentId,
        timestamp: DateTime<Utc>,
    },
    PaymentDeleted {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // coverage events
    LastCoveredDateChanged {
        loan_id: LoanId,
        old_date: NaiveDate,
        new_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    SkipResolutionDegraded {
        loan_id: LoanId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn loan_id(&self) -> LoanId {
        match self {
            Event::LoanRegistered { loan_id, .. }
            | Event::LoanCompleted { loan_id, .. }
            | Event::PaymentRecorded { loan_id, .. }
            | Event::PaymentAmended { loan_id, .. }
            | Event::PaymentDeleted { loan_id, .. }
            | Event::LastCoveredDateChanged { loan_id, .. }
            | Event::SkipResolutionDegraded { loan_id, .. }
            | Event::StatusChanged { loan_id, .. } => *loan_id,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
