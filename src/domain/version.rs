//! Dotted numeric version strings reported by tools and probe programs
//!
//! Versions are tuples of non-negative integers compared lexicographically,
//! with the shorter tuple padded with zeros: `3.24 == 3.24.0`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

// First dotted numeric token, optionally prefixed with `v`
static DOTTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w.])v?(\d+(?:\.\d+)+)").unwrap());

// `version X.Y.Z` as printed by cmake, git, gcc and friends
static VERSION_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bversion\s+v?(\d+(?:\.\d+)*)").unwrap());

/// Error returned when a string is not a dotted numeric version
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version '{input}': {message}")]
pub struct VersionParseError {
    pub input: String,
    pub message: String,
}

/// Ordered tuple of version components (major, minor, patch, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionString {
    parts: Vec<u64>,
}

impl VersionString {
    /// Create a version from its numeric components
    pub fn new(parts: impl Into<Vec<u64>>) -> Self {
        Self {
            parts: parts.into(),
        }
    }

    /// Parse a strict dotted version such as `1.14.0` or `v3.4.7`
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(VersionParseError {
                input: input.to_string(),
                message: "empty version".to_string(),
            });
        }

        let parts = body
            .split('.')
            .map(|p| {
                p.parse::<u64>().map_err(|_| VersionParseError {
                    input: input.to_string(),
                    message: format!("component '{}' is not a non-negative integer", p),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }

    /// Extract the first dotted version token from free-form output
    ///
    /// A bare number on its own is accepted only when it is the whole
    /// (trimmed) output, so that a stray digit in a banner is not mistaken
    /// for a version.
    pub fn extract(text: &str) -> Option<Self> {
        if let Some(caps) = DOTTED_RE.captures(text) {
            return Self::parse(&caps[1]).ok();
        }
        Self::parse(text.trim()).ok()
    }

    /// Extract the token following the word `version` (e.g. `cmake version 3.20.1`)
    pub fn extract_after_keyword(text: &str) -> Option<Self> {
        VERSION_WORD_RE
            .captures(text)
            .and_then(|caps| Self::parse(&caps[1]).ok())
    }

    /// The numeric components
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Major component (0 when absent)
    pub fn major(&self) -> u64 {
        self.component(0)
    }

    /// Minor component (0 when absent)
    pub fn minor(&self) -> u64 {
        self.component(1)
    }

    /// Whether this version is at least `minimum`
    pub fn satisfies(&self, minimum: &VersionString) -> bool {
        self >= minimum
    }

    fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }
}

impl Ord for VersionString {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for VersionString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionString {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionString {}

impl FromStr for VersionString {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionString {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionString> for String {
    fn from(value: VersionString) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}
