use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a payment record
pub type PaymentId = Uuid;

/// store (branch) a loan or payment belongs to
pub type StoreId = Uuid;

/// user who registered a payment
pub type UserId = Uuid;

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    /// loan accepting payments
    Active,
    /// debt fully paid
    Completed,
    /// set by collections outside this crate, never by the ledger
    Defaulted,
}

impl LoanStatus {
    pub fn accepts_payments(&self) -> bool {
        matches!(self, LoanStatus::Active)
    }
}

/// payment cadence of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentFrequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl PaymentFrequency {
    /// logical days covered by one installment
    pub fn logical_days(&self) -> u32 {
        match self {
            PaymentFrequency::Daily => 1,
            PaymentFrequency::Weekly => 7,
            PaymentFrequency::Biweekly => 14,
            PaymentFrequency::Monthly => 30,
        }
    }
}

/// vehicle financed by the loan, used to match store-wide calendar exceptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    Motorcycle,
    Car,
    Tricycle,
    Other,
}

/// how the borrower paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    #[default]
    Cash,
    Transfer,
    Card,
    Other,
}

/// how a payment lands relative to the obligation on the day it is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentTiming {
    /// coverage starts on or before the recording day
    Late,
    /// borrower was exactly current, coverage starts on the next obligating day
    OnTime,
    /// coverage starts beyond the next obligating day
    Advance,
}
