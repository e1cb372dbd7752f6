//! Remote strategy: OData-style catalog queries.
//!
//! Query URLs are built by plain string concatenation of the endpoint, the
//! operation name and `&`-joined `key=value` clauses. Values are interpolated
//! as-is, not URL-encoded; callers must pass ids and terms that are already
//! URL-safe. That is a documented limitation of the wire protocol, not
//! something this layer silently fixes.

use anyhow::Result;
use log::error;

use super::select_by_range;
use crate::config::Credentials;
use crate::feed::parse_feed;
use crate::http::Transport;
use crate::package::{Package, PackageIdentifier};
use crate::updates::UpdateOptions;
use crate::version::VersionRange;

/// Fetch a query URL and decode the response feed. Network and decode
/// failures propagate; callers decide whether to swallow them.
pub(crate) async fn fetch_feed(
    http: &dyn Transport,
    credentials: Option<&Credentials>,
    url: &str,
) -> Result<Vec<Package>> {
    let body = http.get_text(url, credentials).await?;
    parse_feed(&body)
}

/// `FindPackagesById()` — server returns every version of one id; range
/// selection is the client-side tie-break.
pub(crate) async fn find_packages_by_id(
    http: &dyn Transport,
    endpoint: &str,
    credentials: Option<&Credentials>,
    identifier: &PackageIdentifier,
    range: &VersionRange,
) -> Vec<Package> {
    let url = format!("{}/FindPackagesById()?id='{}'", endpoint, identifier.id);

    match fetch_feed(http, credentials, &url).await {
        Ok(candidates) => {
            let candidates = candidates
                .into_iter()
                .filter(|package| identifier.matches_id(&package.id))
                .collect();
            select_by_range(candidates, range)
        }
        Err(e) => {
            // Zero results from this source; others can still contribute
            error!("FindPackagesById('{}') failed: {}", identifier.id, e);
            Vec::new()
        }
    }
}

/// `Search()` — version filtering is delegated to server-side `$filter`
/// clauses; results come back ordered by descending popularity.
pub(crate) async fn search(
    http: &dyn Transport,
    endpoint: &str,
    credentials: Option<&Credentials>,
    term: &str,
    include_all_versions: bool,
    include_prerelease: bool,
    take: usize,
    skip: usize,
) -> Vec<Package> {
    let mut url = format!(
        "{}/Search()?searchTerm='{}'&targetFramework=''&includePrerelease={}",
        endpoint, term, include_prerelease
    );
    if !include_all_versions {
        let filter = if include_prerelease {
            "IsAbsoluteLatestVersion"
        } else {
            "IsLatestVersion"
        };
        url.push_str(&format!("&$filter={}", filter));
    }
    url.push_str(&format!(
        "&$orderby=DownloadCount desc&$skip={}&$top={}",
        skip, take
    ));

    match fetch_feed(http, credentials, &url).await {
        Ok(packages) => packages,
        Err(e) => {
            error!("Search('{}') failed: {}", term, e);
            Vec::new()
        }
    }
}

/// Build one batched `GetUpdates()` query for a group of installed packages:
/// pipe-delimited ids and versions plus the prerelease/all-versions/
/// framework/constraint clauses.
pub(crate) fn build_get_updates_url(
    endpoint: &str,
    installed: &[PackageIdentifier],
    options: &UpdateOptions,
) -> String {
    let ids = installed
        .iter()
        .map(|identifier| identifier.id.as_str())
        .collect::<Vec<_>>()
        .join("|");
    let versions = installed
        .iter()
        .map(|identifier| identifier.version_spec.as_str())
        .collect::<Vec<_>>()
        .join("|");

    format!(
        "{}/GetUpdates()?packageIds='{}'&versions='{}'&includePrerelease={}&includeAllVersions={}&targetFrameworks='{}'&versionConstraints='{}'",
        endpoint,
        ids,
        versions,
        options.include_prerelease,
        options.include_all_versions,
        options.target_frameworks.join("|"),
        options.version_constraints.join("|")
    )
}
