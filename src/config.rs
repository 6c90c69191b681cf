use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Days, Money};
use crate::errors::{LedgerError, Result};
use crate::types::PaymentFrequency;

/// ledger-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// how far past "now" recurring calendar exceptions are expanded
    pub skip_horizon_months: u32,
    /// net position band treated as exactly up to date, in logical days
    pub up_to_date_tolerance: Decimal,
    /// offset of the business's local day from UTC
    pub utc_offset_seconds: i32,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            skip_horizon_months: 12,
            up_to_date_tolerance: dec!(0.01),
            utc_offset_seconds: 0,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl LedgerConfig {
    /// parse from json; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| LedgerError::InvalidConfiguration {
                message: format!("unreadable ledger config: {}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// read overrides from the environment
    /// - LEDGER_SKIP_HORIZON_MONTHS
    /// - LEDGER_UTC_OFFSET_SECONDS
    /// - LEDGER_UP_TO_DATE_TOLERANCE
    ///
    /// unparsable values keep the default
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(months) = env_override("LEDGER_SKIP_HORIZON_MONTHS") {
            config.skip_horizon_months = months;
        }
        if let Some(offset) = env_override("LEDGER_UTC_OFFSET_SECONDS") {
            config.utc_offset_seconds = offset;
        }
        if let Some(tolerance) = env_override("LEDGER_UP_TO_DATE_TOLERANCE") {
            config.up_to_date_tolerance = tolerance;
        }

        if let Err(err) = config.validate() {
            tracing::warn!(error = %err, "invalid ledger config from environment, using defaults");
            return Self::default();
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.timezone().is_none() {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("utc offset out of range: {}s", self.utc_offset_seconds),
            });
        }
        if self.up_to_date_tolerance < Decimal::ZERO {
            return Err(LedgerError::InvalidConfiguration {
                message: "up to date tolerance cannot be negative".to_string(),
            });
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(LedgerError::InvalidConfiguration {
                message: format!(
                    "default page size {} must be between 1 and {}",
                    self.default_page_size, self.max_page_size
                ),
            });
        }
        Ok(())
    }

    pub fn timezone(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_seconds)
    }

    /// the business's calendar day at `instant`
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self.timezone() {
            Some(offset) => instant.with_timezone(&offset).date_naive(),
            None => instant.date_naive(),
        }
    }

    /// clamp a requested page size into the configured bounds
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

fn env_override<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable ledger setting");
            None
        }
    }
}

/// repayment terms of a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    /// base amount due per installment
    pub installment_amount: Money,
    /// fixed add-on per installment (e.g. gps tracking fee)
    pub addon_amount: Money,
    pub frequency: PaymentFrequency,
    pub total_installments: u32,
    /// upfront amount converted to prepaid days from the start date
    pub down_payment: Money,
}

impl LoanTerms {
    /// daily-cadence terms
    pub fn daily(installment_amount: Money, addon_amount: Money, total_installments: u32) -> Self {
        Self {
            installment_amount,
            addon_amount,
            frequency: PaymentFrequency::Daily,
            total_installments,
            down_payment: Money::ZERO,
        }
    }

    /// weekly-cadence terms
    pub fn weekly(installment_amount: Money, addon_amount: Money, total_installments: u32) -> Self {
        Self {
            frequency: PaymentFrequency::Weekly,
            ..Self::daily(installment_amount, addon_amount, total_installments)
        }
    }

    /// biweekly-cadence terms
    pub fn biweekly(installment_amount: Money, addon_amount: Money, total_installments: u32) -> Self {
        Self {
            frequency: PaymentFrequency::Biweekly,
            ..Self::daily(installment_amount, addon_amount, total_installments)
        }
    }

    /// monthly-cadence terms
    pub fn monthly(installment_amount: Money, addon_amount: Money, total_installments: u32) -> Self {
        Self {
            frequency: PaymentFrequency::Monthly,
            ..Self::daily(installment_amount, addon_amount, total_installments)
        }
    }

    pub fn with_down_payment(mut self, down_payment: Money) -> Self {
        self.down_payment = down_payment;
        self
    }

    /// logical days per installment
    pub fn period_days(&self) -> u32 {
        self.frequency.logical_days()
    }

    /// base plus add-on for one installment
    pub fn installment_total(&self) -> Money {
        self.installment_amount + self.addon_amount
    }

    /// base plus add-on per logical day
    pub fn daily_rate(&self) -> Result<Money> {
        let per_installment = self.installment_total();
        if !per_installment.is_positive() {
            return Err(LedgerError::NonPositiveDailyRate {
                rate: per_installment,
            });
        }
        Ok(per_installment / Decimal::from(self.period_days()))
    }

    /// financed debt, excluding add-ons and the down payment
    pub fn total_debt(&self) -> Money {
        self.installment_amount * Decimal::from(self.total_installments)
    }

    /// logical days an amount pays for.
    ///
    /// computed as `amount * period / installment_total` so exact
    /// multiples of the rate never lose a day to rounding.
    pub fn days_covered_by(&self, amount: Money) -> Result<Days> {
        let per_installment = self.installment_total();
        if !per_installment.is_positive() {
            return Err(LedgerError::NonPositiveDailyRate {
                rate: per_installment,
            });
        }
        amount
            .as_decimal()
            .checked_mul(Decimal::from(self.period_days()))
            .and_then(|scaled| scaled.checked_div(per_installment.as_decimal()))
            .map(Days::from_decimal)
            .ok_or(LedgerError::InvalidPaymentAmount { amount })
    }

    /// add-on owed over the whole loan
    pub fn total_addon(&self) -> Money {
        self.addon_amount * Decimal::from(self.total_installments)
    }

    /// currency value of a number of logical days
    pub fn cost_of(&self, days: Days) -> Money {
        Money::from_decimal(
            days.as_decimal() * self.installment_total().as_decimal()
                / Decimal::from(self.period_days()),
        )
    }

    /// installments paid off by a base amount
    pub fn installments_for(&self, base_amount: Money) -> Result<Decimal> {
        if !self.installment_amount.is_positive() {
            return Err(LedgerError::InvalidConfiguration {
                message: "installment amount must be positive".to_string(),
            });
        }
        Ok(base_amount.as_decimal() / self.installment_amount.as_decimal())
    }

    pub fn down_payment_days(&self) -> Result<Days> {
        self.days_covered_by(self.down_payment)
    }

    /// reject configurations the coverage math cannot run on
    pub fn validate(&self) -> Result<()> {
        self.daily_rate()?;
        if !self.installment_amount.is_positive() {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("installment amount must be positive, got {}", self.installment_amount),
            });
        }
        if self.addon_amount.is_negative() {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("add-on amount cannot be negative, got {}", self.addon_amount),
            });
        }
        if self.down_payment.is_negative() {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("down payment cannot be negative, got {}", self.down_payment),
            });
        }
        if self.total_installments == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "loan needs at least one installment".to_string(),
            });
        }
        Ok(())
    }
}
