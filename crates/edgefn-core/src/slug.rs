use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::Error;

static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid slug pattern")
});

static PROJECT_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{20}$").expect("valid project ref pattern")
});

/// Name of a function within a project.
///
/// Construction validates the slug, so every `FunctionSlug` in circulation
/// is safe to use in paths and URLs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionSlug(String);

impl FunctionSlug {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(Error::InvalidSlug(raw.to_owned()))
        }
    }

    pub fn is_valid(raw: &str) -> bool {
        SLUG_PATTERN.is_match(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FunctionSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of the remote project functions are deployed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef(String);

impl ProjectRef {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let trimmed = raw.trim();
        if PROJECT_REF_PATTERN.is_match(trimmed) {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(Error::InvalidProjectRef(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
