//! Core types for Ubuntu Lend.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod loan;
pub mod pagination;
pub mod phone;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use loan::{LoanMathError, RepaymentQuote, monthly_payment, next_due_date, quote};
pub use pagination::{PageRequest, Pagination};
pub use phone::{PhoneError, PhoneNumber};
pub use status::*;
