//! Loan product catalog.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ubuntu_lend_core::LoanTypeId;

/// A loan product customers can apply for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanType {
    pub id: LoanTypeId,
    pub name: String,
    pub description: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub min_term_months: i32,
    pub max_term_months: i32,
    /// Annual percentage rate copied onto each new application.
    pub base_interest_rate: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanType {
    /// Check an amount and term against this product's bounds.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message naming the violated bound.
    pub fn check_bounds(&self, amount: Decimal, term_months: i32) -> Result<(), String> {
        if amount < self.min_amount || amount > self.max_amount {
            return Err(format!(
                "amount must be between {} and {} for {}",
                self.min_amount, self.max_amount, self.name
            ));
        }
        if term_months < self.min_term_months || term_months > self.max_term_months {
            return Err(format!(
                "termMonths must be between {} and {} for {}",
                self.min_term_months, self.max_term_months, self.name
            ));
        }
        Ok(())
    }
}

/// Input for creating a loan type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewLoanType {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub min_term_months: i32,
    pub max_term_months: i32,
    pub base_interest_rate: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Partial update of a loan type. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoanTypeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub min_term_months: Option<i32>,
    pub max_term_months: Option<i32>,
    pub base_interest_rate: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Validate the bounds a loan type would end up with.
///
/// # Errors
///
/// Returns a message naming the first inconsistent bound.
pub fn validate_bounds(
    min_amount: Decimal,
    max_amount: Decimal,
    min_term_months: i32,
    max_term_months: i32,
    rate: Decimal,
) -> Result<(), String> {
    if min_amount <= Decimal::ZERO {
        return Err("minAmount must be greater than zero".to_string());
    }
    if min_amount > max_amount {
        return Err("minAmount cannot exceed maxAmount".to_string());
    }
    if min_term_months < 1 {
        return Err("minTermMonths must be at least 1".to_string());
    }
    if min_term_months > max_term_months {
        return Err("minTermMonths cannot exceed maxTermMonths".to_string());
    }
    if max_term_months > ubuntu_lend_core::loan::MAX_TERM_MONTHS {
        return Err(format!(
            "maxTermMonths cannot exceed {}",
            ubuntu_lend_core::loan::MAX_TERM_MONTHS
        ));
    }
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err("baseInterestRate must be between 0 and 100".to_string());
    }
    Ok(())
}
