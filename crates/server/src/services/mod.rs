//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Phone/OTP, password and OAuth authentication
//! - `catalog` - Cached loan product catalog
//! - `dashboard` - Admin dashboard aggregates
//! - `lending` - Application submission, review and the repayment ledger
//! - `notify` - SMS (stub) and email notifications

pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod lending;
pub mod notify;

pub use auth::{AuthError, AuthService, OAuthClient, OAuthOutcome, OAuthProfile, Registration};
pub use catalog::LoanCatalog;
pub use dashboard::DashboardService;
pub use lending::{LendingError, LendingService, LoanOverview, SubmitApplication};
pub use notify::{Notifier, NotifyError};
