//! Package version tokens and range constraints.
//!
//! Versions decompose into up to four numeric components plus an optional
//! pre-release tag. Comparison is always numeric per component ("10" sorts
//! after "9"), never lexicographic on the whole token.

mod range;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub use range::VersionRange;

/// Error for a version or range token that cannot be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedVersionError(pub String);

impl fmt::Display for MalformedVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed version token: '{}'", self.0)
    }
}

impl std::error::Error for MalformedVersionError {}

/// A parsed package version.
///
/// Holds the four numeric components (missing trailing components are zero)
/// and the optional pre-release tag. The raw token is kept for display and
/// for consumers that need the original spelling.
#[derive(Debug, Clone)]
pub struct Version {
    parts: [u64; 4],
    release: Option<String>,
    raw: String,
}

impl Version {
    /// The numeric components, zero-filled to four.
    pub fn parts(&self) -> &[u64; 4] {
        &self.parts
    }

    /// The pre-release tag, if any (e.g. "beta2" in "1.0.0-beta2").
    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    /// Whether this version carries a pre-release tag.
    pub fn is_prerelease(&self) -> bool {
        self.release.is_some()
    }

    /// The original token as parsed.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Version {
    type Err = MalformedVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() {
            return Err(MalformedVersionError(s.to_string()));
        }

        let (numeric, release) = match token.split_once('-') {
            Some((n, r)) if !r.is_empty() => (n, Some(r.to_string())),
            Some(_) => return Err(MalformedVersionError(s.to_string())),
            None => (token, None),
        };

        let components: Vec<&str> = numeric.split('.').collect();
        if components.is_empty() || components.len() > 4 {
            return Err(MalformedVersionError(s.to_string()));
        }

        let mut parts = [0u64; 4];
        for (i, component) in components.iter().enumerate() {
            parts[i] = component
                .parse::<u64>()
                .map_err(|_| MalformedVersionError(s.to_string()))?;
        }

        Ok(Version {
            parts,
            release,
            raw: token.to_string(),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.parts.cmp(&other.parts) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        // A pre-release orders before the same numeric version without one.
        match (&self.release, &other.release) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
