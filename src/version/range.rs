//! Bracketed version range constraints.

use std::fmt;
use std::str::FromStr;

use super::{MalformedVersionError, Version};

/// A version constraint with an inclusive or exclusive lower bound and an
/// optional upper bound.
///
/// Accepted forms:
/// - `1.2.0` — bare token, matches exactly that version
/// - `[1.0,2.0]` / `(1.0,2.0)` / `[1.0,2.0)` — bounded, per-bracket inclusivity
/// - `(1.2.0,)` — half-open, "strictly newer than 1.2.0, no maximum"
/// - `[1.0]` — exact match in bracket form
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRange {
    min: Version,
    min_inclusive: bool,
    max: Option<Version>,
    max_inclusive: bool,
    raw: String,
}

impl VersionRange {
    /// Build the half-open range `(version,)` — strictly newer, unbounded.
    pub fn newer_than(version: &Version) -> Self {
        VersionRange {
            min: version.clone(),
            min_inclusive: false,
            max: None,
            max_inclusive: false,
            raw: format!("({},)", version.raw()),
        }
    }

    /// The lower bound. Every range has one.
    pub fn lower_bound(&self) -> &Version {
        &self.min
    }

    /// True iff `version` satisfies both bounds honoring inclusivity.
    /// An absent upper bound means "no maximum".
    pub fn contains(&self, version: &Version) -> bool {
        let above_min = if self.min_inclusive {
            *version >= self.min
        } else {
            *version > self.min
        };
        if !above_min {
            return false;
        }

        match &self.max {
            None => true,
            Some(max) => {
                if self.max_inclusive {
                    *version <= *max
                } else {
                    *version < *max
                }
            }
        }
    }

    /// The exact version this range pins, if it pins one (`1.2.0`, `[1.2.0]`
    /// or `[1.2.0,1.2.0]`).
    pub fn as_exact(&self) -> Option<&Version> {
        if self.min_inclusive && self.max_inclusive && self.max.as_ref() == Some(&self.min) {
            Some(&self.min)
        } else {
            None
        }
    }

    /// The original constraint token as parsed.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl FromStr for VersionRange {
    type Err = MalformedVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() {
            return Err(MalformedVersionError(s.to_string()));
        }

        let open = token.starts_with('[') || token.starts_with('(');
        let close = token.ends_with(']') || token.ends_with(')');

        if !open && !close {
            // Bare token parses as an exact-match range.
            let version: Version = token.parse()?;
            return Ok(VersionRange {
                min: version.clone(),
                min_inclusive: true,
                max: Some(version),
                max_inclusive: true,
                raw: token.to_string(),
            });
        }
        if !open || !close {
            return Err(MalformedVersionError(s.to_string()));
        }

        let min_inclusive = token.starts_with('[');
        let max_inclusive = token.ends_with(']');
        let inner = &token[1..token.len() - 1];

        let (min_token, max_token) = match inner.split_once(',') {
            Some((min, max)) => (min.trim(), Some(max.trim())),
            None => (inner.trim(), None),
        };

        // Every range has a lower bound.
        if min_token.is_empty() {
            return Err(MalformedVersionError(s.to_string()));
        }
        let min: Version = min_token.parse()?;

        let max = match max_token {
            // "[1.0]" pins exactly 1.0
            None => Some(min.clone()),
            // "(1.0,)" leaves the maximum open
            Some("") => None,
            Some(max_token) => Some(max_token.parse()?),
        };

        Ok(VersionRange {
            min,
            min_inclusive,
            max,
            max_inclusive,
            raw: token.to_string(),
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
