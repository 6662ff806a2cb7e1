//! Phone numbers in E.164 form.
//!
//! Sign-in forms collect a country calling code and a national number
//! separately. Both are folded into a single `+<cc><number>` string here,
//! which is the only form stored in or looked up from the database.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number cannot be empty")]
    Empty,
    #[error("country code must be 1-3 digits")]
    InvalidCountryCode,
    #[error("phone number may only contain digits and separators")]
    InvalidCharacter,
    #[error("phone number must be between {min} and {max} digits")]
    InvalidLength { min: usize, max: usize },
}

/// A phone number normalized to E.164 (`+254712345678`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum digit count (country code included).
    pub const MIN_DIGITS: usize = 8;
    /// Maximum digit count allowed by E.164.
    pub const MAX_DIGITS: usize = 15;

    /// Build an E.164 number from a country calling code and a national number.
    ///
    /// The country code may be written with or without a leading `+`. Spaces,
    /// dashes, dots and parentheses are stripped from the national part and a
    /// single trunk prefix `0` is dropped (`0712 345 678` becomes `712345678`).
    /// If the national part already starts with `+` it is treated as a full
    /// international number and the country code is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] if either part is malformed or the combined
    /// number falls outside the E.164 length bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use ubuntu_lend_core::PhoneNumber;
    ///
    /// let phone = PhoneNumber::parse("+254", "0712 345-678").unwrap();
    /// assert_eq!(phone.as_str(), "+254712345678");
    /// ```
    pub fn parse(country_code: &str, national: &str) -> Result<Self, PhoneError> {
        let national = national.trim();
        if national.is_empty() {
            return Err(PhoneError::Empty);
        }
        if national.starts_with('+') {
            return Self::parse_international(national);
        }

        let cc = country_code.trim().trim_start_matches('+');
        if cc.is_empty()
            || cc.len() > 3
            || cc.starts_with('0')
            || !cc.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(PhoneError::InvalidCountryCode);
        }

        let digits = strip_separators(national)?;
        let digits = digits.strip_prefix('0').unwrap_or(&digits);
        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        Self::from_digits(&format!("{cc}{digits}"))
    }

    /// Parse an already international number such as `+254 712 345 678`.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] if the input lacks the leading `+`, contains
    /// anything other than digits and separators, or has the wrong length.
    pub fn parse_international(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        let rest = s.strip_prefix('+').ok_or(PhoneError::InvalidCountryCode)?;
        let digits = strip_separators(rest)?;
        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }
        if digits.starts_with('0') {
            return Err(PhoneError::InvalidCountryCode);
        }
        Self::from_digits(&digits)
    }

    fn from_digits(digits: &str) -> Result<Self, PhoneError> {
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }
        Ok(Self(format!("+{digits}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four digits, for log lines and masked display.
    #[must_use]
    pub fn last_four(&self) -> &str {
        let start = self.0.len().saturating_sub(4);
        self.0.get(start..).unwrap_or("")
    }
}

fn strip_separators(s: &str) -> Result<String, PhoneError> {
    let mut digits = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(PhoneError::InvalidCharacter),
        }
    }
    Ok(digits)
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_international(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_trunk_zero_and_separators() {
        let phone = PhoneNumber::parse("254", "(0712) 345-678").unwrap();
        assert_eq!(phone.as_str(), "+254712345678");
    }

    #[test]
    fn test_parse_same_number_different_spellings() {
        let a = PhoneNumber::parse("+234", "0803 123 4567").unwrap();
        let b = PhoneNumber::parse("234", "803.123.4567").unwrap();
        let c = PhoneNumber::parse("", "+234 803 123 4567").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_parse_international_ignores_country_code() {
        let phone = PhoneNumber::parse("1", "+27 82 555 0199").unwrap();
        assert_eq!(phone.as_str(), "+27825550199");
    }

    #[test]
    fn test_parse_rejects_bad_country_codes() {
        assert_eq!(PhoneNumber::parse("", "0712345678"), Err(PhoneError::InvalidCountryCode));
        assert_eq!(PhoneNumber::parse("2544", "712345678"), Err(PhoneError::InvalidCountryCode));
        assert_eq!(PhoneNumber::parse("0", "712345678"), Err(PhoneError::InvalidCountryCode));
        assert_eq!(PhoneNumber::parse("2a", "712345678"), Err(PhoneError::InvalidCountryCode));
    }

    #[test]
    fn test_parse_rejects_letters_and_bad_lengths() {
        assert_eq!(PhoneNumber::parse("254", "0712-ABC"), Err(PhoneError::InvalidCharacter));
        assert_eq!(PhoneNumber::parse("254", " "), Err(PhoneError::Empty));
        assert_eq!(PhoneNumber::parse("254", "0"), Err(PhoneError::Empty));
        assert!(matches!(
            PhoneNumber::parse("254", "123"),
            Err(PhoneError::InvalidLength { .. })
        ));
        assert!(matches!(
            PhoneNumber::parse("254", "1234567890123"),
            Err(PhoneError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_last_four() {
        let phone = PhoneNumber::parse_international("+254712345678").unwrap();
        assert_eq!(phone.last_four(), "5678");
    }

    #[test]
    fn test_deserialize_requires_international_form() {
        let phone: PhoneNumber = serde_json::from_str("\"+254712345678\"").unwrap();
        assert_eq!(phone.as_str(), "+254712345678");
        assert!(serde_json::from_str::<PhoneNumber>("\"0712345678\"").is_err());
    }
}
