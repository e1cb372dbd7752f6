//! Update discovery.
//!
//! For a remote source, installed packages go out in batched `GetUpdates()`
//! queries. A 404 from that endpoint means the server does not implement the
//! batch API at all; discovery then falls back to one `FindPackagesById()`
//! probe per installed package with an open-ended "newer than installed"
//! range. Batches run sequentially and a failed batch never discards the
//! batches already accumulated.

use anyhow::Result;
use log::{error, info};
use std::cmp::Ordering;

use crate::http::NetworkError;
use crate::package::{Package, PackageIdentifier};
use crate::source::{Backend, Source, remote};
use crate::version::{Version, VersionRange};

/// Servers reject oversized queries, so installed packages are grouped.
pub const UPDATE_BATCH_SIZE: usize = 10;

/// Flags forwarded to the update query.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub include_prerelease: bool,
    pub include_all_versions: bool,
    pub target_frameworks: Vec<String>,
    pub version_constraints: Vec<String>,
}

pub(crate) async fn get_updates(
    source: &Source,
    installed: &[PackageIdentifier],
    options: &UpdateOptions,
) -> Result<Vec<Package>> {
    let mut updates = match source.backend() {
        Backend::Local { .. } => local_updates(source, installed).await?,
        Backend::Remote {
            endpoint,
            credentials,
            http,
        } => {
            let mut accumulated = Vec::new();

            'groups: for group in installed.chunks(UPDATE_BATCH_SIZE) {
                let url = remote::build_get_updates_url(endpoint, group, options);
                match remote::fetch_feed(http.as_ref(), credentials.as_ref(), &url).await {
                    Ok(packages) => accumulated.extend(packages),
                    Err(e) => {
                        if e.downcast_ref::<NetworkError>()
                            .is_some_and(NetworkError::is_not_found)
                        {
                            // Server has no batch API; switch wholesale to
                            // per-package discovery.
                            info!(
                                "Batch update endpoint unsupported at {}; \
                                 falling back to per-package discovery",
                                endpoint
                            );
                            accumulated = fallback_updates(source, installed, options).await?;
                            break 'groups;
                        }
                        // This group is lost; earlier groups stand
                        error!("Update query failed: {}", e);
                    }
                }
            }

            accumulated
        }
    };

    updates.sort_by(compare_for_update);
    Ok(updates)
}

/// Linear scan for a local source: everything strictly newer than each
/// installed package.
async fn local_updates(
    source: &Source,
    installed: &[PackageIdentifier],
) -> Result<Vec<Package>> {
    let mut updates = Vec::new();
    for identifier in installed {
        updates.extend(source.find_packages_by_id(&newer_than(identifier)?).await?);
    }
    Ok(updates)
}

/// Per-package discovery used when the batch endpoint is unsupported.
///
/// Each installed package is probed with the half-open range
/// `(installedVersion,)`. At most one prerelease match survives (the most
/// recent one) and only when prereleases were requested; without
/// `include_all_versions` only the single newest remaining match per package
/// is kept.
pub(crate) async fn fallback_updates(
    source: &Source,
    installed: &[PackageIdentifier],
    options: &UpdateOptions,
) -> Result<Vec<Package>> {
    let mut updates = Vec::new();

    for identifier in installed {
        let mut candidates = source.find_packages_by_id(&newer_than(identifier)?).await?;

        if options.include_prerelease {
            let newest_prerelease = candidates
                .iter()
                .filter(|package| package.is_prerelease())
                .map(|package| package.version.clone())
                .max();
            if let Some(newest_prerelease) = newest_prerelease {
                let mut kept_one = false;
                candidates.retain(|package| {
                    if !package.is_prerelease() {
                        return true;
                    }
                    let keep = !kept_one && package.version == newest_prerelease;
                    kept_one |= keep;
                    keep
                });
            }
        } else {
            candidates.retain(|package| !package.is_prerelease());
        }

        if !options.include_all_versions {
            if let Some(newest) = candidates
                .iter()
                .map(|package| package.version.clone())
                .max()
            {
                candidates.retain(|package| package.version == newest);
                candidates.truncate(1);
            }
        }

        updates.extend(candidates);
    }

    Ok(updates)
}

/// Half-open "newer than what is installed" probe for one package.
/// The installed version token must parse; a malformed one is a caller bug.
fn newer_than(identifier: &PackageIdentifier) -> Result<PackageIdentifier> {
    let installed: Version = identifier.version_spec.parse()?;
    Ok(PackageIdentifier::new(
        identifier.id.clone(),
        VersionRange::newer_than(&installed).raw().to_string(),
    ))
}

/// Update-result ordering: id first (ordinal, absent id sorts before any
/// present id), then the RAW version token ordinally.
///
/// The ordinal version comparison here intentionally differs from the
/// numeric comparator used for ranges and equality; downstream consumers
/// depend on this order.
pub fn compare_update_keys(
    a: (Option<&str>, &str),
    b: (Option<&str>, &str),
) -> Ordering {
    match (a.0, b.0) {
        (None, None) => a.1.cmp(b.1),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_id), Some(b_id)) => a_id.cmp(b_id).then_with(|| a.1.cmp(b.1)),
    }
}

fn compare_for_update(a: &Package, b: &Package) -> Ordering {
    compare_update_keys(
        (Some(a.id.as_str()), a.version.raw()),
        (Some(b.id.as_str()), b.version.raw()),
    )
}
