//! Domain models.
//!
//! Validated domain types returned by the repositories and serialized by the
//! route handlers. Database row types live next to their queries in `db`.

pub mod application;
pub mod loan_type;
pub mod metrics;
pub mod session;
pub mod transaction;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("invalid sort order: {s}")),
        }
    }
}
