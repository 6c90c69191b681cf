use std::collections::HashMap;

use parking_lot::RwLock;

use crate::errors::{LedgerError, Result};
use crate::payments::Payment;
use crate::state::LoanState;
use crate::types::{LoanId, PaymentId};

/// persistence for loans and their payments.
///
/// the commit methods write the loan aggregate and the payment change as one
/// unit: either both are visible afterwards or neither is.
pub trait LedgerStore: Send + Sync {
    fn insert_loan(&self, loan: &LoanState) -> Result<()>;
    fn save_loan(&self, loan: &LoanState) -> Result<()>;
    fn loan(&self, id: LoanId) -> Result<LoanState>;

    fn payment(&self, id: PaymentId) -> Result<Payment>;
    fn payments_for_loan(&self, loan_id: LoanId) -> Result<Vec<Payment>>;
    fn all_payments(&self) -> Result<Vec<Payment>>;

    /// store a new payment with the updated loan, returning the payment with
    /// its store-assigned sequence
    fn commit_payment(&self, loan: &LoanState, payment: Payment) -> Result<Payment>;
    /// remove a payment together with the reversed loan, returning the removed record
    fn commit_deletion(&self, loan: &LoanState, payment_id: PaymentId) -> Result<Payment>;
    fn update_payment(&self, payment: &Payment) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tables {
    loans: HashMap<LoanId, LoanState>,
    payments: HashMap<PaymentId, Payment>,
    last_sequence: u64,
}

/// process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loan_count(&self) -> usize {
        self.tables.read().loans.len()
    }

    pub fn payment_count(&self) -> usize {
        self.tables.read().payments.len()
    }
}

impl LedgerStore for InMemoryStore {
    fn insert_loan(&self, loan: &LoanState) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.loans.contains_key(&loan.id) {
            return Err(LedgerError::Storage {
                message: format!("loan {} already exists", loan.id),
            });
        }
        tables.loans.insert(loan.id, loan.clone());
        Ok(())
    }

    fn save_loan(&self, loan: &LoanState) -> Result<()> {
        let mut tables = self.tables.write();
        match tables.loans.get_mut(&loan.id) {
            Some(stored) => {
                *stored = loan.clone();
                Ok(())
            }
            None => Err(LedgerError::LoanNotFound { id: loan.id }),
        }
    }

    fn loan(&self, id: LoanId) -> Result<LoanState> {
        self.tables
            .read()
            .loans
            .get(&id)
            .cloned()
            .ok_or(LedgerError::LoanNotFound { id })
    }

    fn payment(&self, id: PaymentId) -> Result<Payment> {
        self.tables
            .read()
            .payments
            .get(&id)
            .cloned()
            .ok_or(LedgerError::PaymentNotFound { id })
    }

    fn payments_for_loan(&self, loan_id: LoanId) -> Result<Vec<Payment>> {
        let tables = self.tables.read();
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.replay_key());
        Ok(payments)
    }

    fn all_payments(&self) -> Result<Vec<Payment>> {
        let tables = self.tables.read();
        let mut payments: Vec<Payment> = tables.payments.values().cloned().collect();
        payments.sort_by_key(|p| p.replay_key());
        Ok(payments)
    }

    fn commit_payment(&self, loan: &LoanState, mut payment: Payment) -> Result<Payment> {
        let mut tables = self.tables.write();
        if payment.loan_id != loan.id {
            return Err(LedgerError::Storage {
                message: format!("payment {} does not belong to loan {}", payment.id, loan.id),
            });
        }
        if !tables.loans.contains_key(&loan.id) {
            return Err(LedgerError::LoanNotFound { id: loan.id });
        }
        if tables.payments.contains_key(&payment.id) {
            return Err(LedgerError::Storage {
                message: format!("payment {} already exists", payment.id),
            });
        }

        tables.last_sequence += 1;
        payment.sequence = tables.last_sequence;
        tables.loans.insert(loan.id, loan.clone());
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    fn commit_deletion(&self, loan: &LoanState, payment_id: PaymentId) -> Result<Payment> {
        let mut tables = self.tables.write();
        match tables.payments.get(&payment_id) {
            Some(existing) if existing.loan_id == loan.id => {}
            Some(existing) => {
                return Err(LedgerError::Storage {
                    message: format!(
                        "payment {} belongs to loan {}, not {}",
                        payment_id, existing.loan_id, loan.id
                    ),
                })
            }
            None => return Err(LedgerError::PaymentNotFound { id: payment_id }),
        }
        if !tables.loans.contains_key(&loan.id) {
            return Err(LedgerError::LoanNotFound { id: loan.id });
        }

        tables.loans.insert(loan.id, loan.clone());
        tables
            .payments
            .remove(&payment_id)
            .ok_or(LedgerError::PaymentNotFound { id: payment_id })
    }

    fn update_payment(&self, payment: &Payment) -> Result<()> {
        let mut tables = self.tables.write();
        match tables.payments.get_mut(&payment.id) {
            Some(stored) => {
                *stored = payment.clone();
                Ok(())
            }
            None => Err(LedgerError::PaymentNotFound { id: payment.id }),
        }
    }
}
