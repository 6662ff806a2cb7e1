//! Integer primary keys wrapped per table.
//!
//! Every table keys rows by a Postgres `SERIAL`, so each id is an `i32`
//! newtype. Handlers and repositories can't pass an application id where a
//! user id is expected.

/// Declare an `i32` id newtype.
///
/// The type serializes as a bare number, displays as one, parses from one,
/// and (with the `postgres` feature) binds and decodes as `INTEGER`.
///
/// ```rust
/// # use ubuntu_lend_core::define_id;
/// define_id!(BorrowerId);
/// define_id!(LoanId);
///
/// let borrower_id: BorrowerId = "12".parse().unwrap();
/// assert_eq!(borrower_id.as_i32(), 12);
/// // let _: LoanId = borrower_id; // mismatched types
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(LoanTypeId);
define_id!(ApplicationId);
define_id!(TransactionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_as_bare_integer() {
        let id = ApplicationId::new(42);
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("42"));
        let back: ApplicationId = serde_json::from_str("42").unwrap_or(ApplicationId::new(0));
        assert_eq!(back, id);
    }

    #[test]
    fn test_id_display_and_conversions() {
        let id = UserId::from(7);
        assert_eq!(id.to_string(), "7");
        assert_eq!(i32::from(id), 7);
        assert_eq!(id.as_i32(), 7);
    }

    #[test]
    fn test_id_parses_from_path_segment() {
        assert_eq!(" 15 ".parse::<LoanTypeId>(), Ok(LoanTypeId::new(15)));
        assert!("abc".parse::<LoanTypeId>().is_err());
    }
}
