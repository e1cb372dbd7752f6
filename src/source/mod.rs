//! Package sources.
//!
//! A [`Source`] is one configured origin of packages: a directory of
//! `.nupkg` archives on disk, or a remote catalog endpoint. Every public
//! operation dispatches on the backend variant; locality is decided once,
//! at construction, from the expanded path's scheme.

mod local;
pub(crate) mod remote;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::{NupkgReader, ZipNupkgReader};
use crate::config::{Credentials, SourceDescriptor, expand_env_placeholders};
use crate::http::{HttpClient, Transport};
use crate::package::{Package, PackageIdentifier};
use crate::updates::{self, UpdateOptions};
use crate::version::VersionRange;

/// Where a source's packages live.
pub(crate) enum Backend {
    Local {
        dir: PathBuf,
        reader: Arc<dyn NupkgReader>,
    },
    Remote {
        endpoint: String,
        credentials: Option<Credentials>,
        http: Arc<dyn Transport>,
    },
}

/// One configured package origin.
///
/// Immutable after construction; concurrent read-only queries are safe. A
/// configuration reload replaces sources wholesale instead of mutating them.
pub struct Source {
    name: String,
    enabled: bool,
    backend: Backend,
}

impl Source {
    /// Build a source from a configuration descriptor. The path has its
    /// environment placeholders expanded; an HTTP scheme selects the remote
    /// backend, anything else is a local directory.
    pub fn from_descriptor(descriptor: &SourceDescriptor) -> Result<Self> {
        let expanded = expand_env_placeholders(&descriptor.path);
        let backend = if expanded.starts_with("http://") || expanded.starts_with("https://") {
            Backend::Remote {
                endpoint: expanded.trim_end_matches('/').to_string(),
                credentials: descriptor.credentials(),
                http: Arc::new(HttpClient::new()?),
            }
        } else {
            Backend::Local {
                dir: PathBuf::from(expanded),
                reader: Arc::new(ZipNupkgReader),
            }
        };
        Ok(Self {
            name: descriptor.name.clone(),
            enabled: descriptor.enabled,
            backend,
        })
    }

    /// A local source over a package directory.
    pub fn local(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self::local_with_reader(name, dir, Arc::new(ZipNupkgReader))
    }

    /// A local source with a custom archive reader. Used primarily for
    /// testing.
    pub fn local_with_reader(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        reader: Arc<dyn NupkgReader>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            backend: Backend::Local {
                dir: dir.into(),
                reader,
            },
        }
    }

    /// A remote source over a catalog endpoint.
    pub fn remote(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        Ok(Self::remote_with_transport(
            name,
            endpoint,
            credentials,
            Arc::new(HttpClient::new()?),
        ))
    }

    /// A remote source over a custom transport. Used primarily for testing.
    pub fn remote_with_transport(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        credentials: Option<Credentials>,
        http: Arc<dyn Transport>,
    ) -> Self {
        let endpoint = endpoint.into();
        Self {
            name: name.into(),
            enabled: true,
            backend: Backend::Remote {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                credentials,
                http,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_local(&self) -> bool {
        matches!(self.backend, Backend::Local { .. })
    }

    pub(crate) fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Every package at this source whose id matches and whose version
    /// satisfies the identifier's range, ascending by version.
    ///
    /// If nothing lies inside the range, falls back to the single smallest
    /// version strictly newer than the range's lower bound, so a feed that
    /// lacks the exact pinned version still resolves to something usable.
    /// A malformed range token is escalated; it is a caller bug, not an
    /// environment condition.
    #[tracing::instrument(skip(self))]
    pub async fn find_packages_by_id(
        &self,
        identifier: &PackageIdentifier,
    ) -> Result<Vec<Package>> {
        let range = identifier.range()?;
        let mut packages = match &self.backend {
            Backend::Local { dir, reader } => {
                local::find_packages_by_id(dir, reader.as_ref(), identifier, &range)
            }
            Backend::Remote {
                endpoint,
                credentials,
                http,
            } => {
                remote::find_packages_by_id(
                    http.as_ref(),
                    endpoint,
                    credentials.as_ref(),
                    identifier,
                    &range,
                )
                .await
            }
        };
        for package in &mut packages {
            package.assign_source(&self.name);
        }
        Ok(packages)
    }

    /// The newest match of [`find_packages_by_id`](Self::find_packages_by_id),
    /// or None.
    #[tracing::instrument(skip(self))]
    pub async fn get_specific_package(
        &self,
        identifier: &PackageIdentifier,
    ) -> Result<Option<Package>> {
        Ok(self.find_packages_by_id(identifier).await?.pop())
    }

    /// Search this source. An empty term matches everything. When
    /// `include_all_versions` is false only the latest version per id is
    /// retained (latest-including-prerelease when `include_prerelease`).
    #[tracing::instrument(skip(self))]
    pub async fn search(
        &self,
        term: &str,
        include_all_versions: bool,
        include_prerelease: bool,
        take: usize,
        skip: usize,
    ) -> Result<Vec<Package>> {
        let mut packages = match &self.backend {
            Backend::Local { dir, reader } => local::search(
                dir,
                reader.as_ref(),
                term,
                include_all_versions,
                include_prerelease,
                take,
                skip,
            ),
            Backend::Remote {
                endpoint,
                credentials,
                http,
            } => {
                remote::search(
                    http.as_ref(),
                    endpoint,
                    credentials.as_ref(),
                    term,
                    include_all_versions,
                    include_prerelease,
                    take,
                    skip,
                )
                .await
            }
        };
        for package in &mut packages {
            package.assign_source(&self.name);
        }
        Ok(packages)
    }

    /// Available upgrades for a set of installed packages. See
    /// [`updates`](crate::updates) for the batch strategy and its fallback.
    #[tracing::instrument(skip(self, installed))]
    pub async fn get_updates(
        &self,
        installed: &[PackageIdentifier],
        options: &UpdateOptions,
    ) -> Result<Vec<Package>> {
        let mut packages = updates::get_updates(self, installed, options).await?;
        for package in &mut packages {
            package.assign_source(&self.name);
        }
        Ok(packages)
    }
}

/// Range-selection policy shared by both strategies: in-range matches win,
/// ordered ascending by version; otherwise the closest-newer fallback.
pub(crate) fn select_by_range(candidates: Vec<Package>, range: &VersionRange) -> Vec<Package> {
    let mut in_range: Vec<Package> = Vec::new();
    let mut newer: Vec<Package> = Vec::new();

    for candidate in candidates {
        if range.contains(&candidate.version) {
            in_range.push(candidate);
        } else if candidate.version > *range.lower_bound() {
            newer.push(candidate);
        }
    }

    if !in_range.is_empty() {
        in_range.sort_by(|a, b| a.version.cmp(&b.version));
        return in_range;
    }

    // Closest-newer fallback: the smallest version above the lower bound
    newer.sort_by(|a, b| a.version.cmp(&b.version));
    newer.truncate(1);
    newer
}
