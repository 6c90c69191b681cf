use std::sync::Arc;
use std::thread;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use installment_ledger::{
    logical_days_between, AccessScope, CalendarException, Event, ExceptionCalendar, ExceptionRule,
    InMemoryStore, InstallmentService, LedgerConfig, LoanState, LoanStatus, LoanTerms, Money,
    NewLoan, PaymentFilter, PaymentTiming, RecordPayment, SafeTimeProvider, TimeSource, Uuid,
};
use rust_decimal_macros::dec;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn clock_at(y: i32, m: u32, day: u32) -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(y, m, day, 10, 0, 0).unwrap(),
    ))
}

fn daily_terms() -> LoanTerms {
    LoanTerms::daily(Money::from_major(10_000), Money::ZERO, 100)
}

fn register(service: &InstallmentService, terms: LoanTerms) -> LoanState {
    service
        .register_loan(NewLoan::new(Uuid::new_v4(), d(2024, 1, 1), terms).customer_name("r. mendez"))
        .unwrap()
}

fn pay(loan: &LoanState, amount: i64) -> RecordPayment {
    RecordPayment::new(loan.id, Money::from_major(amount), loan.store_id, Uuid::new_v4())
}

#[test]
fn test_three_day_payment_is_late_from_day_two() {
    let service = InstallmentService::in_memory(clock_at(2024, 1, 2));
    let loan = register(&service, daily_terms());

    let payment = service.record_payment(pay(&loan, 30_000)).unwrap();

    assert_eq!(payment.coverage.days_covered.whole_days(), 3);
    assert_eq!(payment.coverage.coverage_start, d(2024, 1, 2));
    assert_eq!(payment.coverage.coverage_end, d(2024, 1, 4));
    assert!(payment.is_late());
    assert_eq!(payment.coverage.late_payment_date, Some(d(2024, 1, 2)));
    assert_eq!(service.loan(loan.id).unwrap().last_covered_date, d(2024, 1, 4));
}

#[test]
fn test_down_payment_pre_covers_days() {
    let service = InstallmentService::in_memory(clock_at(2024, 1, 1));
    let loan = register(&service, daily_terms().with_down_payment(Money::from_major(20_000)));

    assert_eq!(loan.last_covered_date, d(2024, 1, 3));
    // the down payment is outside the financed debt
    assert_eq!(loan.debt_remaining, Money::from_major(1_000_000));

    let summary = service.loan_status(loan.id).unwrap();
    assert_eq!(summary.position.down_payment_days.whole_days(), 2);
    assert_eq!(summary.status.days_ahead, 2);
}

#[test]
fn test_skipped_coverage_start_moves_forward() {
    let time = clock_at(2024, 1, 2);
    let calendar = Arc::new(ExceptionCalendar::new(time.clone(), LedgerConfig::default()));
    let service = InstallmentService::new(
        Arc::new(InMemoryStore::new()),
        calendar.clone(),
        time,
        LedgerConfig::default(),
    )
    .unwrap();
    let loan = register(&service, daily_terms());
    calendar
        .add(CalendarException::for_store(
            loan.store_id,
            ExceptionRule::Dates(vec![d(2024, 1, 2)]),
            "store closed for inventory",
        ))
        .unwrap();

    let payment = service.record_payment(pay(&loan, 30_000)).unwrap();

    assert_eq!(payment.coverage.coverage_start, d(2024, 1, 3));
    assert_eq!(payment.coverage.coverage_end, d(2024, 1, 5));
    assert_eq!(service.loan(loan.id).unwrap().last_covered_date, d(2024, 1, 5));
    assert!(!payment.skip_resolution_degraded);
}

#[test]
fn test_deleting_only_payment_reopens_completed_loan() {
    let service = InstallmentService::in_memory(clock_at(2024, 1, 2));
    let loan = register(&service, LoanTerms::daily(Money::from_major(10_000), Money::ZERO, 10));

    let payment = service.record_payment(pay(&loan, 100_000)).unwrap();
    let completed = service.loan(loan.id).unwrap();
    assert_eq!(completed.status, LoanStatus::Completed);
    assert!(completed.debt_remaining.is_zero());

    // completed loans take no further payments
    assert!(service.record_payment(pay(&loan, 10_000)).is_err());

    service.delete_payment(payment.id).unwrap();

    let reopened = service.loan(loan.id).unwrap();
    assert_eq!(reopened.status, LoanStatus::Active);
    assert_eq!(reopened.last_covered_date, d(2024, 1, 1));
    assert_eq!(reopened.debt_remaining, Money::from_major(100_000));
    assert_eq!(reopened.payment_count, 0);
    assert_eq!(reopened.last_payment_date, None);

    let events = service.take_events();
    assert!(events.iter().any(|e| matches!(e, Event::LoanCompleted { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::StatusChanged {
            old_status: LoanStatus::Completed,
            new_status: LoanStatus::Active,
            ..
        }
    )));
}

#[test]
fn test_logical_month_end_span() {
    assert_eq!(logical_days_between(d(2024, 1, 31), d(2024, 3, 1)), 30);
}

#[test]
fn test_fractional_arrears_snapshot() {
    let time = clock_at(2024, 1, 2);
    let service = InstallmentService::in_memory(time.clone());
    let loan = register(&service, daily_terms());

    service.record_payment(pay(&loan, 78_700)).unwrap();

    time.test_control().unwrap().advance(Duration::days(9));
    let payment = service.record_payment(pay(&loan, 11_300)).unwrap();

    assert_eq!(payment.snapshot.exact_installments_owed_before, dec!(1.13));
    assert_eq!(payment.snapshot.remaining_amount_owed_before, Money::from_major(11_300));
    assert!(payment.snapshot.is_up_to_date_after);
    assert!(payment.snapshot.remaining_amount_owed_after.is_zero());
}

#[test]
fn test_installments_conserved_across_mutations() {
    let time = clock_at(2024, 1, 2);
    let service = InstallmentService::in_memory(time.clone());
    let terms = LoanTerms::daily(Money::from_major(9_000), Money::from_major(1_000), 50);
    let loan = register(&service, terms);

    let mut recorded = Vec::new();
    for amount in [9_000, 4_500, 27_000, 13_333] {
        let request = pay(&loan, amount).addon(Money::from_major(1_000));
        recorded.push(service.record_payment(request).unwrap());
        time.test_control().unwrap().advance(Duration::days(1));

        let state = service.loan(loan.id).unwrap();
        assert!(state.is_balanced());
    }

    service.delete_payment(recorded[1].id).unwrap();
    let state = service.loan(loan.id).unwrap();

    assert!(state.is_balanced());
    assert_eq!(state.total_paid, Money::from_major(49_333));
    assert_eq!(state.total_addon_paid, Money::from_major(3_000));
    assert_eq!(state.payment_count, 3);
    assert_eq!(state.last_payment_date, Some(recorded[3].payment_date));
}

#[test]
fn test_historical_snapshots_survive_deletion() {
    let time = clock_at(2024, 1, 5);
    let service = InstallmentService::in_memory(time.clone());
    let loan = register(&service, daily_terms());

    let first = service.record_payment(pay(&loan, 20_000)).unwrap();
    time.test_control().unwrap().advance(Duration::days(3));
    let second = service.record_payment(pay(&loan, 50_000)).unwrap();

    service.delete_payment(first.id).unwrap();

    let kept = service.payment(second.id).unwrap();
    assert_eq!(kept.snapshot, second.snapshot);
    assert_eq!(kept.coverage, second.coverage);
    // the ledger itself no longer counts the deleted payment
    assert_eq!(service.loan(loan.id).unwrap().last_covered_date, d(2024, 1, 6));
}

#[test]
fn test_last_covered_date_never_moves_back_on_payment() {
    let time = clock_at(2024, 1, 3);
    let calendar = Arc::new(ExceptionCalendar::new(time.clone(), LedgerConfig::default()));
    let service = InstallmentService::new(
        Arc::new(InMemoryStore::new()),
        calendar.clone(),
        time.clone(),
        LedgerConfig::default(),
    )
    .unwrap();
    let loan = register(&service, daily_terms());
    calendar
        .add(CalendarException::for_loan(
            loan.id,
            ExceptionRule::Recurring {
                day_of_month: 10,
                months: vec![],
            },
            "monthly maintenance day",
        ))
        .unwrap();

    let mut previous = loan.last_covered_date;
    for amount in [3_000, 45_000, 10_000, 2_500, 120_000, 7_000] {
        service.record_payment(pay(&loan, amount)).unwrap();
        let current = service.loan(loan.id).unwrap().last_covered_date;
        assert!(current >= previous, "{} moved back to {}", previous, current);
        previous = current;
        time.test_control().unwrap().advance(Duration::days(2));
    }
}

#[test]
fn test_timing_classification() {
    let time = clock_at(2024, 1, 5);
    let service = InstallmentService::in_memory(time.clone());
    let loan = register(&service, daily_terms());

    // catch up through jan 5 (late), then pay exactly the next day (on time)
    let late = service.record_payment(pay(&loan, 40_000)).unwrap();
    assert_eq!(late.coverage.timing, PaymentTiming::Late);

    let on_time = service.record_payment(pay(&loan, 10_000)).unwrap();
    assert_eq!(on_time.coverage.timing, PaymentTiming::OnTime);
    assert!(!on_time.is_late() && !on_time.is_advance());

    let advance = service.record_payment(pay(&loan, 10_000)).unwrap();
    assert_eq!(advance.coverage.timing, PaymentTiming::Advance);
    assert_eq!(advance.coverage.advance_payment_date, Some(d(2024, 1, 7)));
}

#[test]
fn test_live_status_after_falling_behind() {
    let time = clock_at(2024, 1, 2);
    let service = InstallmentService::in_memory(time.clone());
    let loan = register(&service, daily_terms());
    service.record_payment(pay(&loan, 30_000)).unwrap();

    time.test_control().unwrap().advance(Duration::days(8));
    let summary = service.loan_status(loan.id).unwrap();

    assert_eq!(summary.status.as_of, d(2024, 1, 10));
    assert_eq!(summary.status.days_behind, 6);
    assert_eq!(summary.status.days_ahead, 0);
    assert_eq!(summary.status.amount_needed_to_catch_up, Money::from_major(60_000));
}

#[test]
fn test_listing_marks_latest_payment_per_loan() {
    let time = clock_at(2024, 1, 3);
    let service = InstallmentService::in_memory(time.clone());
    let first_loan = register(&service, daily_terms());
    let second_loan = register(&service, daily_terms());

    service.record_payment(pay(&first_loan, 10_000)).unwrap();
    time.test_control().unwrap().advance(Duration::hours(1));
    service.record_payment(pay(&second_loan, 20_000)).unwrap();
    time.test_control().unwrap().advance(Duration::hours(1));
    let newest = service.record_payment(pay(&first_loan, 10_000)).unwrap();

    let page = service
        .list_payments_with_status(&PaymentFilter::default())
        .unwrap();

    assert_eq!(page.total_items, 3);
    assert_eq!(page.items[0].payment.id, newest.id);
    let with_status: Vec<_> = page.items.iter().filter(|p| p.live_status.is_some()).collect();
    assert_eq!(with_status.len(), 2);
    assert!(page.items[0].is_latest_for_loan);
    assert!(!page.items[2].is_latest_for_loan);
    assert!(page.items[2].live_status.is_none());

    let scoped = service
        .list_payments_with_status(&PaymentFilter {
            scope: AccessScope::Stores(vec![second_loan.store_id]),
            ..PaymentFilter::default()
        })
        .unwrap();
    assert_eq!(scoped.total_items, 1);
    assert_eq!(scoped.items[0].payment.loan_id, second_loan.id);

    let paged = service
        .list_payments_with_status(&PaymentFilter {
            page: Some(2),
            page_size: Some(2),
            ..PaymentFilter::default()
        })
        .unwrap();
    assert_eq!(paged.items.len(), 1);
    assert_eq!(paged.total_pages, 2);
}

#[test]
fn test_payment_above_remaining_debt_rejected() {
    let service = InstallmentService::in_memory(clock_at(2024, 1, 2));
    let loan = register(&service, LoanTerms::daily(Money::from_major(10_000), Money::ZERO, 3));

    let err = service.record_payment(pay(&loan, 40_000)).unwrap_err();

    assert!(err.to_string().contains("payment exceeds remaining debt"));
    assert_eq!(service.loan(loan.id).unwrap().payment_count, 0);
}

#[test]
fn test_concurrent_payments_on_one_loan() {
    let service = Arc::new(InstallmentService::in_memory(clock_at(2024, 1, 2)));
    let loan = register(&service, daily_terms());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let loan = loan.clone();
            thread::spawn(move || service.record_payment(pay(&loan, 10_000)).unwrap())
        })
        .collect();
    let mut payments: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    payments.sort_by_key(|p| p.sequence);

    let state = service.loan(loan.id).unwrap();
    assert_eq!(state.payment_count, 8);
    assert_eq!(state.last_covered_date, d(2024, 1, 9));
    assert!(state.is_balanced());

    // each payment starts where the previous one ended
    for pair in payments.windows(2) {
        assert!(pair[1].coverage.coverage_start > pair[0].coverage.coverage_end);
    }
}

#[test]
fn test_installment_paid_in_thirds_is_current() {
    let service = InstallmentService::in_memory(clock_at(2024, 1, 2));
    let loan = register(&service, LoanTerms::daily(Money::from_major(30_000), Money::ZERO, 30));

    for _ in 0..3 {
        service.record_payment(pay(&loan, 10_000)).unwrap();
    }

    let summary = service.loan_status(loan.id).unwrap();
    assert_eq!(summary.loan.last_covered_date, d(2024, 1, 2));
    assert_eq!(summary.position.last_covered_date, d(2024, 1, 2));
    assert_eq!(summary.status.days_behind, 0);
    assert!(summary.status.amount_needed_to_catch_up.is_zero());
}

#[test]
fn test_earlier_snapshot_unchanged_by_later_payment() {
    let time = clock_at(2024, 1, 6);
    let service = InstallmentService::in_memory(time.clone());
    let loan = register(&service, daily_terms());

    let first = service.record_payment(pay(&loan, 20_000)).unwrap();
    time.test_control().unwrap().advance(Duration::days(4));
    service.record_payment(pay(&loan, 60_000)).unwrap();

    let refetched = service.payment(first.id).unwrap();
    assert_eq!(refetched.snapshot, first.snapshot);
    assert_eq!(
        refetched.snapshot.exact_installments_owed_before,
        first.snapshot.exact_installments_owed_before
    );
    assert_eq!(
        refetched.snapshot.remaining_amount_owed_after,
        first.snapshot.remaining_amount_owed_after
    );
    // jan 2..=jan 5 owed, two days paid
    assert_eq!(refetched.snapshot.remaining_amount_owed_after, Money::from_major(20_000));
}

#[test]
fn test_oversized_addon_rejected() {
    let service = InstallmentService::in_memory(clock_at(2024, 1, 2));
    let loan = register(&service, LoanTerms::daily(Money::from_major(9_000), Money::from_major(1_000), 10));

    let request = pay(&loan, 9_000).addon(Money::from_major(1_000_000_000));
    let err = service.record_payment(request).unwrap_err();

    assert!(err.to_string().contains("invalid payment amount"));
    assert_eq!(service.loan(loan.id).unwrap().payment_count, 0);
}

#[test]
fn test_listing_status_matches_loan_status_after_new_exception() {
    let time = clock_at(2024, 1, 2);
    let calendar = Arc::new(ExceptionCalendar::new(time.clone(), LedgerConfig::default()));
    let service = InstallmentService::new(
        Arc::new(InMemoryStore::new()),
        calendar.clone(),
        time.clone(),
        LedgerConfig::default(),
    )
    .unwrap();
    let loan = register(&service, daily_terms());
    service.record_payment(pay(&loan, 30_000)).unwrap();

    time.test_control().unwrap().advance(Duration::days(8));
    calendar
        .add(CalendarException::for_loan(
            loan.id,
            ExceptionRule::Dates(vec![d(2024, 1, 3)]),
            "vehicle in the shop",
        ))
        .unwrap();

    let summary = service.loan_status(loan.id).unwrap();
    let page = service.list_payments_with_status(&PaymentFilter::default()).unwrap();
    let listed = page.items[0].live_status.clone().unwrap();

    assert_eq!(summary.status.last_covered_date, d(2024, 1, 5));
    assert_eq!(listed, summary.status);
}
