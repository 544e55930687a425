//! Strongly typed identifiers for rendering authorization.
//!
//! # Purpose
//! Wraps raw identifiers so rendering, user, and collection values cannot be
//! swapped by accident when they flow through the cache and decision engine.
//!
//! # Key invariants
//! - A [`RenderingId`] is numeric. `42` and `"42"` normalize to the same key.
//! - [`UserId`] and [`CollectionName`] preserve their inner string exactly.
//!
//! # Examples
//! ```rust
//! use rendering_authz::RenderingId;
//!
//! let from_int = RenderingId::new(42);
//! let from_str: RenderingId = " 42 ".parse().expect("numeric rendering id");
//! assert_eq!(from_int, from_str);
//! ```
//!
//! # Common pitfalls
//! - Keying a map by the raw rendering string splits one rendering into two
//!   cache entries; always go through [`RenderingId`].
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Deserializer, Serialize};

/// Rendering identifier.
///
/// # Summary
/// Newtype around the numeric id of a rendering (a configured admin view).
///
/// # Invariants
/// - Integer and numeric-string forms compare and hash identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RenderingId(u64);

impl RenderingId {
    /// Construct a rendering id from its integer form.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Parse a rendering id from its string form.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidRenderingId`] if the trimmed input is not an
    ///   unsigned integer.
    pub fn parse(value: &str) -> AuthzResult<Self> {
        value.parse()
    }

    /// Access the integer form.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RenderingId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for RenderingId {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| AuthzError::InvalidRenderingId(value.to_string()))
    }
}

impl std::fmt::Display for RenderingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RenderingId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(Self(value)),
            Raw::Str(value) => value.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// User identifier wrapper.
///
/// # Example
/// ```rust
/// use rendering_authz::UserId;
///
/// let user = UserId::new("17");
/// assert_eq!(user.as_str(), "17");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collection name wrapper.
///
/// # Summary
/// Newtype around the name of a collection (a model exposed in the admin).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for CollectionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
