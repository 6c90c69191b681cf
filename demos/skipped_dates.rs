/// skipped dates - holidays and closures push coverage forward
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use installment_ledger::{
    CalendarException, ExceptionCalendar, ExceptionRule, InMemoryStore, InstallmentService,
    LedgerConfig, LoanTerms, Money, NewLoan, PaymentFilter, RecordPayment, SafeTimeProvider,
    TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== skipped dates example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 25, 9, 0, 0).unwrap()
    ));
    let config = LedgerConfig::from_json(r#"{ "skip_horizon_months": 6 }"#)?;
    let calendar = Arc::new(ExceptionCalendar::new(time.clone(), config.clone()));
    let service = InstallmentService::new(
        Arc::new(InMemoryStore::new()),
        calendar.clone(),
        time,
        config,
    )?;

    let store_id = Uuid::new_v4();
    let start = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
    let loan = service.register_loan(NewLoan::new(
        store_id,
        start,
        LoanTerms::daily(Money::from_major(10_000), Money::ZERO, 200),
    ))?;

    // store closes for holy week and every 1st of may
    calendar.add(CalendarException::for_store(
        store_id,
        ExceptionRule::Range {
            start: NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
        },
        "holy week",
    ))?;
    calendar.add(CalendarException::for_store(
        store_id,
        ExceptionRule::Recurring {
            day_of_month: 1,
            months: vec![5],
        },
        "labour day",
    ))?;

    let preview = service.preview_coverage(loan.id, Money::from_major(100_000), None)?;
    println!("skipped dates in effect: {:?}", preview.skipped_dates);
    println!("sources: {}", preview.skip_sources.join(", "));
    println!(
        "10 days would cover {} .. {}",
        preview.coverage.coverage_start, preview.coverage.coverage_end
    );

    let payment = service.record_payment(RecordPayment::new(
        loan.id,
        Money::from_major(100_000),
        store_id,
        Uuid::new_v4(),
    ))?;
    println!(
        "\nrecorded: covers {} .. {}, late: {}",
        payment.coverage.coverage_start, payment.coverage.coverage_end, payment.is_late()
    );

    let page = service.list_payments_with_status(&PaymentFilter::for_loan(loan.id))?;
    for row in page.items {
        if let Some(status) = row.live_status {
            println!(
                "live: covered through {}, {} days ahead, {} days behind",
                status.last_covered_date, status.days_ahead, status.days_behind
            );
        }
    }

    Ok(())
}
