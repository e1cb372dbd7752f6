//! Package records and identifiers.
//!
//! A [`PackageIdentifier`] names a package and a version constraint; a
//! [`Package`] is the immutable-once-built record a source hands back for
//! one resolved version.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::version::{MalformedVersionError, Version, VersionRange};

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.raw())
    }
}

/// A package id plus a version constraint.
#[derive(Debug, Clone, Serialize)]
pub struct PackageIdentifier {
    pub id: String,
    /// Either an exact version or a bracketed range token.
    pub version_spec: String,
}

impl PackageIdentifier {
    pub fn new(id: impl Into<String>, version_spec: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version_spec: version_spec.into(),
        }
    }

    /// Parse the constraint token. Fails with [`MalformedVersionError`] for
    /// unbalanced brackets or bad bound tokens.
    pub fn range(&self) -> Result<VersionRange, MalformedVersionError> {
        self.version_spec.parse()
    }

    /// Ids compare case-insensitively.
    pub fn matches_id(&self, other: &str) -> bool {
        self.id.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version_spec)
    }
}

impl FromStr for PackageIdentifier {
    type Err = anyhow::Error;

    /// Parses the `id:versionSpec[:framework]` wire form used in dependency
    /// lists. The trailing framework field is accepted and discarded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.splitn(3, ':');
        let id = fields.next().unwrap_or_default().trim();
        let version_spec = fields.next().unwrap_or_default().trim();
        if id.is_empty() || version_spec.is_empty() {
            anyhow::bail!("Invalid dependency entry '{}'. Expected 'id:version'.", s);
        }
        Ok(PackageIdentifier::new(id, version_spec))
    }
}

/// Parse a feed's dependency sub-field into identifiers, preserving order.
///
/// Entries are separated by `|` (some feeds emit `;`); each entry is
/// `id:versionSpec[:framework]`. Entries without a version (bare framework
/// group markers) are skipped.
pub fn parse_dependencies(field: &str) -> Vec<PackageIdentifier> {
    field
        .split(['|', ';'])
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| entry.parse().ok())
        .collect()
}

/// Serialize identifiers back into the pipe-delimited wire form.
pub fn serialize_dependencies(dependencies: &[PackageIdentifier]) -> String {
    dependencies
        .iter()
        .map(|d| format!("{}:{}", d.id, d.version_spec))
        .collect::<Vec<_>>()
        .join("|")
}

/// One resolved package at one exact version.
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    pub id: String,
    pub version: Version,
    pub title: Option<String>,
    pub description: Option<String>,
    pub dependencies: Vec<PackageIdentifier>,
    pub release_notes: Option<String>,
    pub project_url: Option<String>,
    pub license_url: Option<String>,
    pub repository_url: Option<String>,
    pub repository_type: Option<String>,
    pub repository_commit: Option<String>,
    pub download_count: u64,
    /// Name of the source that resolved this package. Assigned once by that
    /// source after construction; never reassigned.
    pub source: Option<String>,
}

impl Package {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            title: None,
            description: None,
            dependencies: Vec::new(),
            release_notes: None,
            project_url: None,
            license_url: None,
            repository_url: None,
            repository_type: None,
            repository_commit: None,
            download_count: 0,
            source: None,
        }
    }

    /// Derived from the version token's pre-release suffix.
    pub fn is_prerelease(&self) -> bool {
        self.version.is_prerelease()
    }

    /// Record the resolving source. First assignment wins.
    pub fn assign_source(&mut self, name: &str) {
        if self.source.is_none() {
            self.source = Some(name.to_string());
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id) && self.version == other.version
    }
}

impl Eq for Package {}

impl Ord for Package {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .to_ascii_lowercase()
            .cmp(&other.id.to_ascii_lowercase())
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for Package {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
