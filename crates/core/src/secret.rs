//! Strength rules for cookie signing secrets.
//!
//! Both web apps refuse to start with a secret that is short, looks like a
//! value copied from a sample `.env`, or repeats too few distinct characters.

use std::collections::HashMap;

use thiserror::Error;

/// Shortest accepted secret.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Shannon entropy floor, in bits per character.
pub const MIN_ENTROPY_BITS: f64 = 3.3;

/// Fragments that mark a sample value, matched case-insensitively.
const PLACEHOLDERS: &[&str] = &[
    "your-", "changeme", "replace", "placeholder", "example", "secret", "password", "xxx", "todo",
    "fixme", "insert", "enter-", "put-your", "add-your",
];

/// Why a secret was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SecretError {
    #[error("must be at least 32 characters (got {0})")]
    TooShort(usize),

    #[error("appears to be a placeholder (contains '{0}')")]
    Placeholder(&'static str),

    #[error("entropy too low ({0:.2} bits/char, need >= 3.3); use a randomly generated secret")]
    LowEntropy(f64),
}

/// Check a signing secret against the rules above.
///
/// # Errors
///
/// Returns the first rule the secret breaks.
pub fn check_secret(secret: &str) -> Result<(), SecretError> {
    let length = secret.chars().count();
    if length < MIN_SECRET_LENGTH {
        return Err(SecretError::TooShort(length));
    }

    let lower = secret.to_lowercase();
    if let Some(fragment) = PLACEHOLDERS.iter().copied().find(|p| lower.contains(p)) {
        return Err(SecretError::Placeholder(fragment));
    }

    let bits = entropy_bits(secret);
    if bits < MIN_ENTROPY_BITS {
        return Err(SecretError::LowEntropy(bits));
    }
    Ok(())
}

/// Shannon entropy in bits per character.
#[must_use]
pub fn entropy_bits(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }

    let total = f64::from(total);
    counts
        .values()
        .map(|&count| {
            let p = f64::from(count) / total;
            -p * p.log2()
        })
        .sum()
}
