/// daily loan - record irregular payments and watch arrears move
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use installment_ledger::telemetry::init_tracing;
use installment_ledger::{
    InstallmentService, LoanTerms, Money, NewLoan, RecordPayment, SafeTimeProvider, TimeSource,
    Uuid, VehicleType,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    println!("=== daily loan example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();
    let service = InstallmentService::in_memory(time.clone());

    // motorcycle at 9,000 a day plus a 1,000 gps fee, 20,000 down
    let terms = LoanTerms::daily(Money::from_major(9_000), Money::from_major(1_000), 300)
        .with_down_payment(Money::from_major(20_000));
    let loan = service.register_loan(
        NewLoan::new(Uuid::new_v4(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), terms)
            .vehicle_type(VehicleType::Motorcycle)
            .customer_name("d. quispe"),
    )?;
    println!("loan registered, covered through {}", loan.last_covered_date);

    // borrower pays irregularly
    for (days_later, amount) in [(3, 18_000), (4, 9_000), (5, 45_000), (10, 4_500)] {
        controller.advance(Duration::days(days_later));
        let payment = service.record_payment(
            RecordPayment::new(loan.id, Money::from_major(amount), loan.store_id, Uuid::new_v4())
                .addon(Money::from_major(1_000)),
        )?;

        println!(
            "\n{}: paid {} -> covers {} .. {} ({:?})",
            payment.payment_date,
            payment.total_amount(),
            payment.coverage.coverage_start,
            payment.coverage.coverage_end,
            payment.coverage.timing,
        );
        println!(
            "  owed before: {} installments ({}), behind after: {} days, ahead after: {} days",
            payment.snapshot.exact_installments_owed_before.round_dp(2),
            payment.snapshot.remaining_amount_owed_before.round_dp(0),
            payment.snapshot.days_behind_after.round_dp(2),
            payment.snapshot.days_ahead_after.round_dp(2),
        );
    }

    let summary = service.loan_status(loan.id)?;
    println!("\n=== status on {} ===", summary.status.as_of);
    println!("last covered:   {}", summary.status.last_covered_date);
    println!("days behind:    {}", summary.status.days_behind);
    println!("days ahead:     {}", summary.status.days_ahead);
    println!("to catch up:    {}", summary.status.amount_needed_to_catch_up.round_dp(0));
    println!("paid:           {} installments", summary.loan.paid_installments.round_dp(2));
    println!("debt remaining: {}", summary.loan.debt_remaining.round_dp(0));

    println!("\nevents emitted: {}", service.take_events().len());

    Ok(())
}
