use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::coverage::CoverageStatus;
use crate::payments::Payment;
use crate::types::{LoanId, PaymentId, StoreId};

/// stores the caller may see, resolved by the caller's auth layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessScope {
    #[default]
    All,
    Stores(Vec<StoreId>),
}

impl AccessScope {
    pub fn permits(&self, store_id: StoreId) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Stores(stores) => stores.contains(&store_id),
        }
    }
}

/// listing filter; `page` is 1-based
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub scope: AccessScope,
    pub loan_id: Option<LoanId>,
    /// inclusive bounds on payment date
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub late_only: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PaymentFilter {
    pub fn for_loan(loan_id: LoanId) -> Self {
        Self {
            loan_id: Some(loan_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        if !self.scope.permits(payment.store_id) {
            return false;
        }
        if self.loan_id.is_some_and(|id| id != payment.loan_id) {
            return false;
        }
        if self.from.is_some_and(|from| payment.payment_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| payment.payment_date > to) {
            return false;
        }
        !self.late_only || payment.is_late()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: usize,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// slice one page out of an already ordered list
    pub fn paginate(all: Vec<T>, page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total_items = all.len();
        let total_pages = total_items.div_ceil(page_size as usize) as u32;

        let skip = (page as usize - 1).saturating_mul(page_size as usize);
        let items = all.into_iter().skip(skip).take(page_size as usize).collect();

        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// payment row as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentWithStatus {
    #[serde(flatten)]
    pub payment: Payment,
    pub is_latest_for_loan: bool,
    /// current arrears/advance, only on each loan's latest payment
    pub live_status: Option<CoverageStatus>,
}

/// most recently created payment of each loan
pub fn latest_per_loan<'a, I>(payments: I) -> HashMap<LoanId, PaymentId>
where
    I: IntoIterator<Item = &'a Payment>,
{
    let mut latest: HashMap<LoanId, &Payment> = HashMap::new();
    for payment in payments {
        latest
            .entry(payment.loan_id)
            .and_modify(|current| {
                if payment.replay_key() > current.replay_key() {
                    *current = payment;
                }
            })
            .or_insert(payment);
    }
    latest.into_iter().map(|(loan_id, p)| (loan_id, p.id)).collect()
}
