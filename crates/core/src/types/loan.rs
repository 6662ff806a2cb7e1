//! Loan repayment math.
//!
//! Loans are amortized monthly on an annual percentage rate. All results are
//! rounded to cents with midpoint-away-from-zero rounding, the same rule the
//! ledger applies to every stored amount.

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Longest term the calculator will amortize.
pub const MAX_TERM_MONTHS: i32 = 600;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoanMathError {
    #[error("principal must be greater than zero")]
    NonPositivePrincipal,
    #[error("term must be between 1 and {MAX_TERM_MONTHS} months")]
    InvalidTerm,
    #[error("interest rate must be between 0 and 100 percent")]
    InvalidRate,
    #[error("repayment calculation overflowed")]
    Overflow,
}

/// Repayment schedule summary for a principal, rate and term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentQuote {
    pub principal: Decimal,
    pub annual_rate: Decimal,
    pub term_months: i32,
    pub monthly_payment: Decimal,
    pub total_repayable: Decimal,
    pub total_interest: Decimal,
}

fn to_cents(value: Decimal) -> Decimal {
    let mut cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    cents.rescale(2);
    cents
}

/// Fixed monthly installment for an amortized loan.
///
/// `annual_rate` is a percentage (`12.5` means 12.5% a year). A zero rate
/// splits the principal evenly across the term.
///
/// # Errors
///
/// Returns [`LoanMathError`] for a non-positive principal, a term outside
/// `1..=MAX_TERM_MONTHS`, a rate outside `0..=100`, or on decimal overflow.
pub fn monthly_payment(
    principal: Decimal,
    annual_rate: Decimal,
    term_months: i32,
) -> Result<Decimal, LoanMathError> {
    if principal <= Decimal::ZERO {
        return Err(LoanMathError::NonPositivePrincipal);
    }
    if !(1..=MAX_TERM_MONTHS).contains(&term_months) {
        return Err(LoanMathError::InvalidTerm);
    }
    if annual_rate < Decimal::ZERO || annual_rate > Decimal::ONE_HUNDRED {
        return Err(LoanMathError::InvalidRate);
    }

    let n = Decimal::from(term_months);
    if annual_rate.is_zero() {
        return Ok(to_cents(principal / n));
    }

    let r = annual_rate / Decimal::from(1200);
    let base = Decimal::ONE + r;
    let mut growth = Decimal::ONE;
    for _ in 0..term_months {
        growth = growth.checked_mul(base).ok_or(LoanMathError::Overflow)?;
    }

    // P * r / (1 - g^-1); the P * r * g form overflows for large P over long terms
    let discount = Decimal::ONE
        .checked_div(growth)
        .ok_or(LoanMathError::Overflow)?;
    let payment = principal
        .checked_mul(r)
        .and_then(|v| v.checked_div(Decimal::ONE - discount))
        .ok_or(LoanMathError::Overflow)?;

    Ok(to_cents(payment))
}

/// Full repayment quote for a loan.
///
/// # Errors
///
/// Same conditions as [`monthly_payment`].
pub fn quote(
    principal: Decimal,
    annual_rate: Decimal,
    term_months: i32,
) -> Result<RepaymentQuote, LoanMathError> {
    let payment = monthly_payment(principal, annual_rate, term_months)?;
    let total = payment
        .checked_mul(Decimal::from(term_months))
        .ok_or(LoanMathError::Overflow)?;

    Ok(RepaymentQuote {
        principal: to_cents(principal),
        annual_rate,
        term_months,
        monthly_payment: payment,
        total_repayable: to_cents(total),
        total_interest: to_cents(total - principal),
    })
}

/// Due date of the next installment.
///
/// The first installment falls one month after disbursement; each recorded
/// repayment moves the due date forward by a month. Returns `None` only if
/// the date would overflow the calendar.
#[must_use]
pub fn next_due_date(disbursed_on: NaiveDate, payments_made: u32) -> Option<NaiveDate> {
    disbursed_on.checked_add_months(Months::new(payments_made.saturating_add(1)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_monthly_payment_extreme_product_bounds() {
        // A trillion at 100% over 50 years is close to interest-only
        let payment = monthly_payment(dec("1000000000000"), dec("100"), MAX_TERM_MONTHS).unwrap();
        assert_eq!(payment, dec("83333333333.33"));

        let summary = quote(dec("1000000000000"), dec("100"), MAX_TERM_MONTHS).unwrap();
        assert_eq!(summary.total_repayable, dec("49999999999998.00"));
    }

    #[test]
    fn test_monthly_payment_standard_amortization() {
        let payment = monthly_payment(dec("10000"), dec("12"), 12).unwrap();
        assert_eq!(payment, dec("888.49"));
    }

    #[test]
    fn test_monthly_payment_zero_rate_splits_evenly() {
        assert_eq!(monthly_payment(dec("1200"), Decimal::ZERO, 12).unwrap(), dec("100.00"));
        assert_eq!(monthly_payment(dec("1000"), Decimal::ZERO, 3).unwrap(), dec("333.33"));
    }

    #[test]
    fn test_single_month_term_repays_principal_plus_one_month_interest() {
        let payment = monthly_payment(dec("5000"), dec("24"), 1).unwrap();
        assert_eq!(payment, dec("5100.00"));
    }

    #[test]
    fn test_quote_totals() {
        let q = quote(dec("10000"), dec("12"), 12).unwrap();
        assert_eq!(q.total_repayable, dec("10661.88"));
        assert_eq!(q.total_interest, dec("661.88"));
        assert_eq!(q.term_months, 12);
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        assert_eq!(
            monthly_payment(Decimal::ZERO, dec("10"), 12),
            Err(LoanMathError::NonPositivePrincipal)
        );
        assert_eq!(monthly_payment(dec("100"), dec("10"), 0), Err(LoanMathError::InvalidTerm));
        assert_eq!(
            monthly_payment(dec("100"), dec("10"), MAX_TERM_MONTHS + 1),
            Err(LoanMathError::InvalidTerm)
        );
        assert_eq!(monthly_payment(dec("100"), dec("-1"), 12), Err(LoanMathError::InvalidRate));
        assert_eq!(monthly_payment(dec("100"), dec("101"), 12), Err(LoanMathError::InvalidRate));
    }

    #[test]
    fn test_next_due_date_advances_per_payment() {
        let disbursed = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(next_due_date(disbursed, 0), NaiveDate::from_ymd_opt(2026, 2, 28));
        assert_eq!(next_due_date(disbursed, 2), NaiveDate::from_ymd_opt(2026, 4, 30));
    }

    #[test]
    fn test_quote_serializes_camel_case() {
        let q = quote(dec("1200"), Decimal::ZERO, 12).unwrap();
        let json = serde_json::to_value(q).unwrap();
        assert_eq!(json["monthlyPayment"], "100.00");
        assert_eq!(json["totalInterest"], "0.00");
    }
}
