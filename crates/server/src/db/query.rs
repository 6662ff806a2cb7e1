//! Helpers for building filtered list queries.
//!
//! List endpoints assemble one SQL statement for the page and one for the
//! total count from the same predicate, so filtering always happens in the
//! database. Column names and sort directions only ever come from static
//! strings; user input is always bound.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use ubuntu_lend_core::PageRequest;

/// One page of rows plus the size of the full result set.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }
}

/// Turn a search term into a case-insensitive `ILIKE` substring pattern.
///
/// LIKE metacharacters in the term are escaped so `50%` matches literally.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Appends `WHERE`/`AND` conjunctions to a query under construction.
pub struct Conditions<'q, 'args> {
    qb: &'q mut QueryBuilder<'args, Postgres>,
    empty: bool,
}

impl<'q, 'args> Conditions<'q, 'args> {
    pub fn new(qb: &'q mut QueryBuilder<'args, Postgres>) -> Self {
        Self { qb, empty: true }
    }

    /// Start a new condition and return the builder to push it onto.
    pub fn and(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        self.qb.push(if self.empty { " WHERE " } else { " AND " });
        self.empty = false;
        self.qb
    }

    /// `column >= value` when `value` is set.
    pub fn min_decimal(&mut self, column: &str, value: Option<Decimal>) {
        if let Some(value) = value {
            self.and().push(column).push(" >= ").push_bind(value);
        }
    }

    /// `column <= value` when `value` is set.
    pub fn max_decimal(&mut self, column: &str, value: Option<Decimal>) {
        if let Some(value) = value {
            self.and().push(column).push(" <= ").push_bind(value);
        }
    }

    /// Inclusive calendar-date range on a timestamp column.
    pub fn date_range(&mut self, column: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        if let Some(from) = from {
            self.and().push(column).push(" >= ").push_bind(from).push("::date");
        }
        if let Some(to) = to {
            self.and()
                .push(column)
                .push(" < ")
                .push_bind(to)
                .push("::date + 1");
        }
    }

    /// Case-insensitive substring match against any of `columns`.
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        let pattern = like_pattern(term);
        let qb = self.and();
        qb.push("(");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        qb.push(")");
    }
}

/// Append `ORDER BY` with a stable tiebreaker, then `LIMIT`/`OFFSET`.
pub fn push_order_and_page(
    qb: &mut QueryBuilder<'_, Postgres>,
    sort_expr: &'static str,
    direction: &'static str,
    tiebreak: &'static str,
    page: PageRequest,
) {
    qb.push(" ORDER BY ")
        .push(sort_expr)
        .push(" ")
        .push(direction)
        .push(" NULLS LAST, ")
        .push(tiebreak)
        .push(" ")
        .push(direction)
        .push(" LIMIT ")
        .push_bind(i64::from(page.limit()))
        .push(" OFFSET ")
        .push_bind(page.offset());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("amara"), "%amara%");
        assert_eq!(like_pattern(" 50%_off\\ "), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_conditions_join_with_and() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM applications a");
        {
            let mut conds = Conditions::new(&mut qb);
            conds.min_decimal("a.amount", Some(Decimal::from(100)));
            conds.max_decimal("a.amount", None);
            conds.search(&["a.purpose", "a.bank_name"], Some("school"));
        }
        assert_eq!(
            qb.sql(),
            "SELECT * FROM applications a WHERE a.amount >= $1 AND (a.purpose ILIKE $2 OR a.bank_name ILIKE $3)"
        );
    }

    #[test]
    fn test_blank_search_adds_nothing() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        Conditions::new(&mut qb).search(&["x"], Some("   "));
        assert_eq!(qb.sql(), "SELECT 1");
    }

    #[test]
    fn test_date_range_is_inclusive_of_end_day() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM users u");
        let from = NaiveDate::from_ymd_opt(2026, 3, 1);
        let to = NaiveDate::from_ymd_opt(2026, 3, 31);
        Conditions::new(&mut qb).date_range("u.created_at", from, to);
        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM users u WHERE u.created_at >= $1::date AND u.created_at < $2::date + 1"
        );
    }

    #[test]
    fn test_order_and_page() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        push_order_and_page(&mut qb, "a.amount", "DESC", "a.id", PageRequest::new(Some(3), Some(20)));
        assert_eq!(
            qb.sql(),
            "SELECT 1 ORDER BY a.amount DESC NULLS LAST, a.id DESC LIMIT $1 OFFSET $2"
        );
    }
}
