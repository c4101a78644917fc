//! Secret string wrapper for sensitive configuration values.
//!
//! Used for the id-encoding secret and the bootstrap admin API key so neither
//! ever shows up in `Debug` output or logs.

use std::fmt;

/// A wrapper for sensitive strings that redacts the value in Debug/Display output.
///
/// # Example
///
/// ```
/// use flowhub::config::SecretString;
///
/// let secret = SecretString::new("bootstrap-admin-key");
/// assert_eq!(format!("{:?}", secret), "<REDACTED>");
/// assert!(secret.matches("bootstrap-admin-key"));
/// ```
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Creates a new `SecretString` from any string-like value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the underlying secret value.
    ///
    /// Only the id encoder needs the raw bytes; everything else should
    /// go through [`SecretString::matches`].
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Compares a candidate against the secret without short-circuiting on
    /// the first differing byte.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let a = self.0.as_bytes();
        let b = candidate.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }

    /// Returns true if the secret is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the length of the secret.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
