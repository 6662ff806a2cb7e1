//! Query-string parameters shared by the list endpoints.
//!
//! Empty values (`?status=`) are treated as absent. Values that are present
//! but malformed are rejected with 400. Unknown `sortBy`/`sortOrder` values
//! fall back to the endpoint's default ordering.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de};

use ubuntu_lend_core::{
    ApplicationId, ApplicationStatus, LoanTypeId, PageRequest, TransactionKind, UserId, UserStatus,
};

use crate::models::SortOrder;
use crate::models::application::ApplicationFilter;
use crate::models::transaction::TransactionFilter;
use crate::models::user::CustomerFilter;

/// Deserialize an optional query value, mapping `""` to `None`.
///
/// # Errors
///
/// Fails if the value is present but does not parse as `T`.
pub fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

fn parse_or_default<T: FromStr + Default>(value: Option<&str>) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

/// `?page=&limit=` on their own.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub limit: Option<u32>,
}

impl PageParams {
    #[must_use]
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<UserStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub is_admin: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub min_loans: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub max_loans: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub min_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub max_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sort_by: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sort_order: Option<String>,
}

impl CustomerQuery {
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }

    #[must_use]
    pub fn filter(&self) -> CustomerFilter {
        CustomerFilter {
            search: self.search.clone(),
            status: self.status,
            is_admin: self.is_admin,
            min_loans: self.min_loans,
            max_loans: self.max_loans,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            date_from: self.date_from,
            date_to: self.date_to,
            sort_by: parse_or_default(self.sort_by.as_deref()),
            sort_order: parse_or_default::<SortOrder>(self.sort_order.as_deref()),
        }
    }
}

// =============================================================================
// Applications
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub loan_type_id: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub user_id: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub min_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub max_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sort_by: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sort_order: Option<String>,
}

impl ApplicationQuery {
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }

    #[must_use]
    pub fn filter(&self) -> ApplicationFilter {
        ApplicationFilter {
            search: self.search.clone(),
            status: self.status,
            loan_type_id: self.loan_type_id.map(LoanTypeId::new),
            user_id: self.user_id.map(UserId::new),
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            date_from: self.date_from,
            date_to: self.date_to,
            sort_by: parse_or_default(self.sort_by.as_deref()),
            sort_order: parse_or_default::<SortOrder>(self.sort_order.as_deref()),
        }
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub kind: Option<TransactionKind>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub application_id: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub user_id: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub min_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub max_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sort_by: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sort_order: Option<String>,
}

impl TransactionQuery {
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }

    #[must_use]
    pub fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            search: self.search.clone(),
            kind: self.kind,
            application_id: self.application_id.map(ApplicationId::new),
            user_id: self.user_id.map(UserId::new),
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            date_from: self.date_from,
            date_to: self.date_to,
            sort_by: parse_or_default(self.sort_by.as_deref()),
            sort_order: parse_or_default::<SortOrder>(self.sort_order.as_deref()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::extract::Query;
    use axum::http::Uri;

    use crate::models::application::ApplicationSort;
    use crate::models::user::CustomerSort;

    use super::*;

    fn parse<T: de::DeserializeOwned>(query: &str) -> Result<T, String> {
        let uri: Uri = format!("/x?{query}").parse().unwrap();
        Query::<T>::try_from_uri(&uri)
            .map(|Query(q)| q)
            .map_err(|e| e.body_text())
    }

    #[test]
    fn test_empty_values_are_absent() {
        let q: CustomerQuery = parse("search=&status=&isAdmin=&page=&dateFrom=").unwrap();
        assert!(q.search.is_none());
        assert!(q.status.is_none());
        assert!(q.is_admin.is_none());
        assert_eq!(q.page_request(), PageRequest::default());
    }

    #[test]
    fn test_customer_filter() {
        let q: CustomerQuery = parse(
            "search=wanjiru&status=active&isAdmin=false&minLoans=1&maxAmount=50000.50\
             &dateFrom=2025-01-01&dateTo=2025-01-31&sortBy=totalBorrowed&sortOrder=asc\
             &page=2&limit=500",
        )
        .unwrap();
        let filter = q.filter();
        assert_eq!(filter.search.as_deref(), Some("wanjiru"));
        assert_eq!(filter.status, Some(UserStatus::Active));
        assert_eq!(filter.is_admin, Some(false));
        assert_eq!(filter.min_loans, Some(1));
        assert_eq!(filter.max_amount, Some(Decimal::new(5_000_050, 2)));
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(filter.sort_by, CustomerSort::TotalBorrowed);
        assert_eq!(filter.sort_order, SortOrder::Asc);

        let page = q.page_request();
        assert_eq!(page.page(), 2);
        assert_eq!(page.limit(), PageRequest::MAX_LIMIT);
    }

    #[test]
    fn test_unknown_sort_falls_back_to_default() {
        let q: ApplicationQuery = parse("sortBy=password&sortOrder=sideways").unwrap();
        let filter = q.filter();
        assert_eq!(filter.sort_by, ApplicationSort::CreatedAt);
        assert_eq!(filter.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        assert!(parse::<ApplicationQuery>("minAmount=lots").is_err());
        assert!(parse::<ApplicationQuery>("dateFrom=01/02/2025").is_err());
        assert!(parse::<ApplicationQuery>("status=approvedish").is_err());
        assert!(parse::<TransactionQuery>("page=-1").is_err());
        assert!(parse::<TransactionQuery>("kind=refund").is_err());
    }

    #[test]
    fn test_transaction_filter_ids() {
        let q: TransactionQuery = parse("applicationId=12&userId=3&kind=repayment").unwrap();
        let filter = q.filter();
        assert_eq!(filter.application_id, Some(ApplicationId::new(12)));
        assert_eq!(filter.user_id, Some(UserId::new(3)));
        assert_eq!(filter.kind, Some(TransactionKind::Repayment));
    }
}
