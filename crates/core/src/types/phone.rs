//! Kenyan mobile numbers for M-Pesa payments.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static MPESA_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:254[17][0-9]{8}|0[17][0-9]{8})$").expect("phone pattern is valid")
});

/// Error returned when a phone number is not a Kenyan mobile number.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Please enter a valid Kenyan phone number (e.g., 0712345678 or 254712345678)")]
pub struct PhoneError;

/// A Safaricom/Airtel mobile number normalized to the `2547XXXXXXXX` form
/// the payment gateway expects.
///
/// ```
/// use duka_core::MpesaPhone;
///
/// assert_eq!(MpesaPhone::parse("0712345678").unwrap().as_str(), "254712345678");
/// assert_eq!(MpesaPhone::parse(" 254112345678 ").unwrap().as_str(), "254112345678");
/// assert!(MpesaPhone::parse("+254712345678").is_err());
/// assert!(MpesaPhone::parse("0812345678").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MpesaPhone(String);

impl MpesaPhone {
    /// Parse user input, accepting the local `07.../01...` and the
    /// international `2547.../2541...` forms.
    ///
    /// # Errors
    ///
    /// Returns [`PhoneError`] for anything else.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if !MPESA_PHONE.is_match(s) {
            return Err(PhoneError);
        }
        match s.strip_prefix('0') {
            Some(rest) => Ok(Self(format!("254{rest}"))),
            None => Ok(Self(s.to_owned())),
        }
    }

    /// The normalized number, always 12 digits starting with `254`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local display form, e.g. `0712 345 678`.
    #[must_use]
    pub fn local_display(&self) -> String {
        let local: Vec<char> = self.0.chars().skip(3).collect();
        let group = |range: std::ops::Range<usize>| -> String {
            local.get(range).map(|c| c.iter().collect()).unwrap_or_default()
        };
        format!("0{} {} {}", group(0..3), group(3..6), group(6..local.len()))
    }
}

impl fmt::Display for MpesaPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MpesaPhone {
    type Error = PhoneError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MpesaPhone> for String {
    fn from(phone: MpesaPhone) -> Self {
        phone.0
    }
}

impl std::str::FromStr for MpesaPhone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
