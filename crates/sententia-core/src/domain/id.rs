use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    num::NonZeroUsize,
    str::FromStr,
};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A validated identifier prefix made of one or more dash-separated uppercase
/// segments (`R`, `REQ`, `AUTH-SYS`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prefix(NonEmptyString);

impl Prefix {
    /// Creates a new `Prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPrefixError`] if the string is empty, has an empty
    /// segment, or contains characters other than `A-Z` and `-`.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidPrefixError> {
        let s = s.into();
        let valid = s
            .split('-')
            .all(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_uppercase()));
        if !valid {
            return Err(InvalidPrefixError(s));
        }
        NonEmptyString::new(s)
            .map(Self)
            .map_err(InvalidPrefixError)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prefix {
    type Err = InvalidPrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error returned when a prefix is not made of uppercase segments.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid id prefix '{0}': expected uppercase letters (A-Z), optionally dash-separated")]
pub struct InvalidPrefixError(String);

/// The stable identifier of a requirement.
///
/// Format: `{PREFIX}-{NUMBER}`, e.g. `R-001`, `REQ-00000042`, `AUTH-SYS-7`.
///
/// Identity is the prefix and the numeric value: `R-001` and `R-1` name the
/// same requirement. The zero-padding width is kept only as a display hint, so
/// an id prints the way it was allocated or written.
#[derive(Debug, Clone)]
pub struct RequirementId {
    prefix: Prefix,
    number: NonZeroUsize,
    width: usize,
}

impl RequirementId {
    /// Create an id, padding the number to `width` digits when displayed.
    #[must_use]
    pub const fn new(prefix: Prefix, number: NonZeroUsize, width: usize) -> Self {
        Self {
            prefix,
            number,
            width,
        }
    }

    /// The prefix (everything before the final dash).
    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// The numeric component.
    #[must_use]
    pub const fn number(&self) -> NonZeroUsize {
        self.number
    }
}

impl PartialEq for RequirementId {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.number == other.number
    }
}

impl Eq for RequirementId {}

impl Hash for RequirementId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.prefix.hash(state);
        self.number.hash(state);
    }
}

impl PartialOrd for RequirementId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RequirementId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix
            .cmp(&other.prefix)
            .then(self.number.cmp(&other.number))
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.prefix,
            self.number,
            width = self.width
        )
    }
}

/// Errors that can occur while parsing a [`RequirementId`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Malformed structure (no dash, empty segment, ...).
    #[error("invalid requirement id format: {0}")]
    Syntax(String),

    /// The numeric component is not a positive integer.
    #[error("invalid number in requirement id '{0}': expected a non-zero integer, got {1}")]
    Number(String, String),

    /// The prefix is not uppercase alphabetic.
    #[error(transparent)]
    Prefix(#[from] InvalidPrefixError),
}

impl FromStr for RequirementId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((prefix, number)) = s.rsplit_once('-') else {
            return Err(Error::Syntax(s.to_string()));
        };
        if prefix.is_empty() || number.is_empty() {
            return Err(Error::Syntax(s.to_string()));
        }

        if !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Number(s.to_string(), number.to_string()));
        }
        let value = number
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| Error::Number(s.to_string(), number.to_string()))?;

        let prefix = Prefix::new(prefix)?;

        Ok(Self::new(prefix, value, number.len()))
    }
}

impl TryFrom<&str> for RequirementId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl Serialize for RequirementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequirementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
