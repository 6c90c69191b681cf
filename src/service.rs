use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::calendar::skipped::{resolve_or_empty, NoSkippedDates, SkipResolution, SkippedDateProvider};
use crate::config::LedgerConfig;
use crate::coverage::{
    Coverage, CoverageCalculator, CoverageLedger, CoveragePosition, CoverageStatus, DebtSnapshot,
};
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::payments::listing::latest_per_loan;
use crate::payments::{
    Page, Payment, PaymentFilter, PaymentUpdate, PaymentWithStatus, RecordPayment,
};
use crate::state::{LoanState, NewLoan};
use crate::store::{InMemoryStore, LedgerStore};
use crate::types::{LoanId, LoanStatus, PaymentId};

/// per-loan mutation locks
#[derive(Debug, Default)]
pub struct LoanLocks {
    locks: Mutex<HashMap<LoanId, Arc<Mutex<()>>>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// the lock serializing mutations of one loan
    pub fn lock_for(&self, loan_id: LoanId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(loan_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// run `f` holding the loan's lock, dropping the entry once nobody else holds it
    pub fn with_lock<T>(&self, loan_id: LoanId, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(loan_id);
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        self.release(loan_id);
        result
    }

    /// loans with a live lock entry
    pub fn tracked(&self) -> usize {
        self.locks.lock().len()
    }

    fn release(&self, loan_id: LoanId) {
        let mut locks = self.locks.lock();
        // the map's own handle is the last one; handles are only cloned under this lock
        if locks.get(&loan_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&loan_id);
        }
    }
}

/// read-only answer to "what would this payment do"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveragePreview {
    pub loan_id: LoanId,
    pub as_of: NaiveDate,
    pub position: CoveragePosition,
    pub coverage: Coverage,
    pub snapshot: DebtSnapshot,
    /// last covered date if the payment were recorded
    pub last_covered_date_after: NaiveDate,
    pub skipped_dates: Vec<NaiveDate>,
    pub skip_sources: Vec<String>,
    pub skip_resolution_degraded: bool,
}

/// dashboard view of a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub loan: LoanState,
    pub position: CoveragePosition,
    pub status: CoverageStatus,
    pub skip_resolution_degraded: bool,
}

/// entry point for loan registration, payment recording and status queries
pub struct InstallmentService {
    store: Arc<dyn LedgerStore>,
    skips: Arc<dyn SkippedDateProvider>,
    time: SafeTimeProvider,
    config: LedgerConfig,
    locks: LoanLocks,
    events: Mutex<EventStore>,
}

impl InstallmentService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        skips: Arc<dyn SkippedDateProvider>,
        time: SafeTimeProvider,
        config: LedgerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            skips,
            time,
            config,
            locks: LoanLocks::new(),
            events: Mutex::new(EventStore::new()),
        })
    }

    /// in-memory store, no calendar exceptions, default config
    pub fn in_memory(time: SafeTimeProvider) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            skips: Arc::new(NoSkippedDates),
            time,
            config: LedgerConfig::default(),
            locks: LoanLocks::new(),
            events: Mutex::new(EventStore::new()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn time(&self) -> &SafeTimeProvider {
        &self.time
    }

    /// the business's current calendar day
    pub fn today(&self) -> NaiveDate {
        self.config.local_date(self.time.now())
    }

    #[instrument(skip(self, request), fields(store_id = %request.store_id))]
    pub fn register_loan(&self, request: NewLoan) -> Result<LoanState> {
        let now = self.time.now();
        let mut loan = LoanState::new(request, now)?;

        let resolution = self.resolve_skips(&loan, now);
        let position = CoverageLedger::position(&loan, &[], None, resolution.dates())?;
        loan.last_covered_date = position.last_covered_date;

        self.store.insert_loan(&loan)?;

        tracing::info!(
            loan_id = %loan.id,
            total_debt = %loan.total_debt,
            start = %loan.start_date,
            last_covered = %loan.last_covered_date,
            "loan registered"
        );
        self.emit(Event::LoanRegistered {
            loan_id: loan.id,
            total_debt: loan.total_debt,
            start_date: loan.start_date,
            down_payment_days: position.down_payment_days,
            timestamp: now,
        });

        Ok(loan)
    }

    pub fn loan(&self, loan_id: LoanId) -> Result<LoanState> {
        self.store.loan(loan_id)
    }

    pub fn payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.store.payment(payment_id)
    }

    /// coverage and debt snapshot a payment of `amount_total` would get now,
    /// optionally as if one existing payment were not there
    #[instrument(skip(self), fields(amount = %amount_total))]
    pub fn preview_coverage(
        &self,
        loan_id: LoanId,
        amount_total: Money,
        exclude_payment_id: Option<PaymentId>,
    ) -> Result<CoveragePreview> {
        let now = self.time.now();
        let today = self.config.local_date(now);
        let loan = self.store.loan(loan_id)?;
        let payments = self.store.payments_for_loan(loan_id)?;

        let resolution = self.resolve_skips(&loan, now);
        let skipped = resolution.dates();
        let position = CoverageLedger::position(&loan, &payments, exclude_payment_id, skipped)?;
        let coverage = CoverageCalculator::calculate(&loan, amount_total, &position, today, skipped)?;
        let snapshot = DebtSnapshot::capture(
            &loan,
            position.amount_applied,
            amount_total,
            today,
            skipped,
            self.config.up_to_date_tolerance,
        )?;
        let last_covered_date_after =
            CoverageLedger::locate_after(&loan, &position, amount_total, skipped)?;

        Ok(CoveragePreview {
            loan_id,
            as_of: today,
            position,
            coverage,
            snapshot,
            last_covered_date_after,
            skipped_dates: skipped.to_vec(),
            skip_sources: resolution.skips.source_descriptions.clone(),
            skip_resolution_degraded: resolution.degraded,
        })
    }

    #[instrument(skip(self, request), fields(loan_id = %request.loan_id, amount = %request.amount))]
    pub fn record_payment(&self, request: RecordPayment) -> Result<Payment> {
        self.locks
            .with_lock(request.loan_id, || self.record_payment_locked(request))
    }

    fn record_payment_locked(&self, request: RecordPayment) -> Result<Payment> {
        let loan = self.store.loan(request.loan_id)?;
        request.validate_against(&loan)?;

        let now = self.time.now();
        let today = self.config.local_date(now);
        let payment_date = request.payment_date.unwrap_or(today);
        let payments = self.store.payments_for_loan(loan.id)?;

        let resolution = self.resolve_skips(&loan, now);
        let skipped = resolution.dates();
        let position = CoverageLedger::position(&loan, &payments, None, skipped)?;

        let amount_total = request.total_amount();
        let coverage = CoverageCalculator::calculate(&loan, amount_total, &position, today, skipped)?;
        let snapshot = DebtSnapshot::capture(
            &loan,
            position.amount_applied,
            amount_total,
            today,
            skipped,
            self.config.up_to_date_tolerance,
        )?;

        let mut updated = loan.clone();
        let transition =
            updated.apply_payment(request.amount, request.addon_amount, payment_date, now)?;
        updated.last_covered_date =
            CoverageLedger::locate_after(&loan, &position, amount_total, skipped)?;

        let payment = Payment::new(request, payment_date, coverage, snapshot, resolution.degraded, now);
        let payment = self.store.commit_payment(&updated, payment)?;

        tracing::info!(
            payment_id = %payment.id,
            days = %payment.coverage.days_covered,
            timing = ?payment.coverage.timing,
            last_covered = %updated.last_covered_date,
            debt_remaining = %updated.debt_remaining,
            "payment recorded"
        );

        self.emit(Event::PaymentRecorded {
            loan_id: loan.id,
            payment_id: payment.id,
            amount: payment.amount,
            addon_amount: payment.addon_amount,
            days_covered: payment.coverage.days_covered,
            timing: payment.coverage.timing,
            timestamp: now,
        });
        self.emit_coverage_change(&loan, &updated, now);
        if let Some((old_status, new_status)) = transition {
            self.emit_status_change(loan.id, old_status, new_status, "final installment paid", now);
            if new_status == LoanStatus::Completed {
                self.emit(Event::LoanCompleted {
                    loan_id: loan.id,
                    final_payment_id: payment.id,
                    total_paid: updated.total_paid,
                    timestamp: now,
                });
            }
        }

        Ok(payment)
    }

    /// edit administrative fields or the payment date; coverage and the debt
    /// snapshot stay as recorded
    #[instrument(skip(self, update))]
    pub fn update_payment(&self, payment_id: PaymentId, update: PaymentUpdate) -> Result<Payment> {
        let loan_id = self.store.payment(payment_id)?.loan_id;
        self.locks
            .with_lock(loan_id, || self.update_payment_locked(loan_id, payment_id, update))
    }

    fn update_payment_locked(
        &self,
        loan_id: LoanId,
        payment_id: PaymentId,
        update: PaymentUpdate,
    ) -> Result<Payment> {
        let mut payment = self.store.payment(payment_id)?;
        let now = self.time.now();
        if !update.apply_to(&mut payment, now) {
            return Ok(payment);
        }

        self.store.update_payment(&payment)?;

        tracing::info!(payment_id = %payment.id, loan_id = %loan_id, "payment amended");
        self.emit(Event::PaymentAmended {
            loan_id,
            payment_id,
            timestamp: now,
        });

        Ok(payment)
    }

    /// remove a payment, reversing its effect on the loan.
    ///
    /// snapshots of the remaining payments are left as recorded.
    #[instrument(skip(self))]
    pub fn delete_payment(&self, payment_id: PaymentId) -> Result<Payment> {
        let loan_id = self.store.payment(payment_id)?.loan_id;
        self.locks
            .with_lock(loan_id, || self.delete_payment_locked(loan_id, payment_id))
    }

    fn delete_payment_locked(&self, loan_id: LoanId, payment_id: PaymentId) -> Result<Payment> {
        let payment = self.store.payment(payment_id)?;
        let loan = self.store.loan(loan_id)?;
        let payments = self.store.payments_for_loan(loan_id)?;

        let now = self.time.now();
        let resolution = self.resolve_skips(&loan, now);
        let position = CoverageLedger::position(&loan, &payments, Some(payment_id), resolution.dates())?;

        let last_payment_date = payments
            .iter()
            .filter(|p| p.id != payment_id)
            .max_by_key(|p| p.replay_key())
            .map(|p| p.payment_date);

        let mut updated = loan.clone();
        let transition =
            updated.reverse_payment(payment.amount, payment.addon_amount, last_payment_date, now)?;
        updated.last_covered_date = position.last_covered_date;

        let removed = self.store.commit_deletion(&updated, payment_id)?;

        tracing::info!(
            payment_id = %removed.id,
            loan_id = %loan_id,
            last_covered = %updated.last_covered_date,
            debt_remaining = %updated.debt_remaining,
            "payment deleted"
        );

        self.emit(Event::PaymentDeleted {
            loan_id,
            payment_id,
            amount: removed.amount,
            timestamp: now,
        });
        self.emit_coverage_change(&loan, &updated, now);
        if let Some((old_status, new_status)) = transition {
            self.emit_status_change(loan_id, old_status, new_status, "payment deleted", now);
        }

        Ok(removed)
    }

    /// payments newest first; each loan's latest payment carries its live status
    #[instrument(skip(self, filter))]
    pub fn list_payments_with_status(&self, filter: &PaymentFilter) -> Result<Page<PaymentWithStatus>> {
        let all = self.store.all_payments()?;
        let latest = latest_per_loan(&all);

        let mut matching: Vec<Payment> = all.into_iter().filter(|p| filter.matches(p)).collect();
        matching.sort_by_key(|p| std::cmp::Reverse(p.replay_key()));

        let page_size = self.config.page_size(filter.page_size);
        let page = Page::paginate(matching, filter.page.unwrap_or(1), page_size);

        let now = self.time.now();
        let mut live: HashMap<LoanId, CoverageStatus> = HashMap::new();
        let mut items = Vec::with_capacity(page.items.len());
        for payment in page.items {
            let is_latest_for_loan = latest.get(&payment.loan_id) == Some(&payment.id);
            let live_status = if is_latest_for_loan {
                let cached = live.get(&payment.loan_id).cloned();
                let status = match cached {
                    Some(status) => status,
                    None => {
                        let loan = self.store.loan(payment.loan_id)?;
                        let (_, status, _) = self.current_position(&loan, now)?;
                        live.insert(loan.id, status.clone());
                        status
                    }
                };
                Some(status)
            } else {
                None
            };

            items.push(PaymentWithStatus {
                payment,
                is_latest_for_loan,
                live_status,
            });
        }

        Ok(Page {
            items,
            page: page.page,
            page_size: page.page_size,
            total_items: page.total_items,
            total_pages: page.total_pages,
        })
    }

    /// aggregate and live arrears/advance of one loan
    #[instrument(skip(self))]
    pub fn loan_status(&self, loan_id: LoanId) -> Result<LoanSummary> {
        let loan = self.store.loan(loan_id)?;
        let (position, status, skip_resolution_degraded) =
            self.current_position(&loan, self.time.now())?;

        Ok(LoanSummary {
            loan,
            position,
            status,
            skip_resolution_degraded,
        })
    }

    /// hook for collections; the ledger itself never defaults a loan
    #[instrument(skip(self))]
    pub fn mark_defaulted(&self, loan_id: LoanId) -> Result<LoanState> {
        self.locks.with_lock(loan_id, || self.mark_defaulted_locked(loan_id))
    }

    fn mark_defaulted_locked(&self, loan_id: LoanId) -> Result<LoanState> {
        let mut loan = self.store.loan(loan_id)?;
        if loan.status == LoanStatus::Completed {
            return Err(LedgerError::LoanNotActive {
                status: loan.status,
            });
        }

        let now = self.time.now();
        if let Some((old_status, new_status)) = loan.mark_defaulted(now) {
            self.store.save_loan(&loan)?;
            tracing::warn!(loan_id = %loan_id, "loan marked defaulted");
            self.emit_status_change(loan_id, old_status, new_status, "marked defaulted", now);
        }

        Ok(loan)
    }

    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().take_events()
    }

    /// ledger position and live status replayed against the current skip set
    fn current_position(
        &self,
        loan: &LoanState,
        now: DateTime<Utc>,
    ) -> Result<(CoveragePosition, CoverageStatus, bool)> {
        let payments = self.store.payments_for_loan(loan.id)?;
        let resolution = self.resolve_skips(loan, now);
        let position = CoverageLedger::position(loan, &payments, None, resolution.dates())?;
        let status = self.live_status(loan, position.last_covered_date, &resolution)?;
        Ok((position, status, resolution.degraded))
    }

    fn live_status(
        &self,
        loan: &LoanState,
        last_covered_date: NaiveDate,
        resolution: &SkipResolution,
    ) -> Result<CoverageStatus> {
        let today = self.today();
        if loan.status == LoanStatus::Completed {
            return Ok(CoverageStatus::settled(last_covered_date, today));
        }
        CoverageCalculator::status(loan, last_covered_date, today, resolution.dates())
    }

    fn resolve_skips(&self, loan: &LoanState, now: DateTime<Utc>) -> SkipResolution {
        let resolution = resolve_or_empty(self.skips.as_ref(), loan);
        if resolution.degraded {
            self.emit(Event::SkipResolutionDegraded {
                loan_id: loan.id,
                reason: resolution.failure.clone().unwrap_or_default(),
                timestamp: now,
            });
        }
        resolution
    }

    fn emit_coverage_change(&self, before: &LoanState, after: &LoanState, now: DateTime<Utc>) {
        if before.last_covered_date != after.last_covered_date {
            self.emit(Event::LastCoveredDateChanged {
                loan_id: after.id,
                old_date: before.last_covered_date,
                new_date: after.last_covered_date,
                timestamp: now,
            });
        }
    }

    fn emit_status_change(
        &self,
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        tracing::info!(loan_id = %loan_id, ?old_status, ?new_status, "loan status changed");
        self.emit(Event::StatusChanged {
            loan_id,
            old_status,
            new_status,
            reason: reason.to_string(),
            timestamp: now,
        });
    }

    fn emit(&self, event: Event) {
        self.events.lock().emit(event);
    }
}
