//! Immutable content paired with a trust bit.
//!
//! Trust is never inferred from content. It is carried along with the text
//! or set explicitly by whoever produced it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A piece of text together with a caller-asserted trust bit.
///
/// All mutators consume `self` and return a new value. Equality is
/// structural: two values are equal only if both content and trust match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaintedValue {
    content: String,
    trusted: bool,
}

impl TaintedValue {
    /// Create a value with an explicit trust bit.
    pub fn new(content: impl Into<String>, trusted: bool) -> Self {
        Self {
            content: content.into(),
            trusted,
        }
    }

    /// Create a trusted value.
    pub fn trusted(content: impl Into<String>) -> Self {
        Self::new(content, true)
    }

    /// Create an untrusted value.
    pub fn untrusted(content: impl Into<String>) -> Self {
        Self::new(content, false)
    }

    /// Empty trusted value. Also the sentinel returned for missing variables:
    /// no data cannot leak anything.
    pub fn empty() -> Self {
        Self::trusted(String::new())
    }

    /// The text content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the content is trusted.
    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Consume the value, returning its content.
    pub fn into_content(self) -> String {
        self.content
    }

    /// Same trust bit, new content.
    #[must_use]
    pub fn with_content(self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            trusted: self.trusted,
        }
    }

    /// Same content, new trust bit.
    #[must_use]
    pub fn with_trust(self, trusted: bool) -> Self {
        Self {
            content: self.content,
            trusted,
        }
    }

    /// Same content, marked trusted.
    #[must_use]
    pub fn to_trusted(self) -> Self {
        self.with_trust(true)
    }

    /// Same content, marked untrusted.
    #[must_use]
    pub fn to_untrusted(self) -> Self {
        self.with_trust(false)
    }
}

impl Default for TaintedValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for TaintedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl From<&str> for TaintedValue {
    fn from(content: &str) -> Self {
        Self::trusted(content)
    }
}

impl From<String> for TaintedValue {
    fn from(content: String) -> Self {
        Self::trusted(content)
    }
}
