//! Local strategy: scanning a directory of `.nupkg` archives.

use log::{debug, error, warn};
use std::path::Path;

use super::select_by_range;
use crate::archive::NupkgReader;
use crate::package::{Package, PackageIdentifier};
use crate::version::VersionRange;

/// Enumerate archives matching `pattern` under `dir` and read each one.
///
/// A missing directory and unreadable archives are environment conditions:
/// both are logged and the scan continues (or returns empty), never aborts.
fn scan(dir: &Path, reader: &dyn NupkgReader, pattern: &str) -> Vec<Package> {
    if !dir.is_dir() {
        error!("Package directory {} not found", dir.display());
        return Vec::new();
    }

    // Ids and search terms match case-insensitively, so the file glob must too
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };
    let full_pattern = dir.join(pattern).to_string_lossy().into_owned();
    let paths = match glob::glob_with(&full_pattern, options) {
        Ok(paths) => paths,
        Err(e) => {
            error!("Bad scan pattern '{}': {}", full_pattern, e);
            return Vec::new();
        }
    };

    let mut packages = Vec::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };
        match reader.read(&path) {
            Ok(package) => packages.push(package),
            Err(e) => warn!("Skipping archive: {}", e),
        }
    }
    packages
}

pub(crate) fn find_packages_by_id(
    dir: &Path,
    reader: &dyn NupkgReader,
    identifier: &PackageIdentifier,
    range: &VersionRange,
) -> Vec<Package> {
    // A literal `<id>.<version>.nupkg` file resolves without scanning
    if let Some(exact) = range.as_exact() {
        let literal = dir.join(format!("{}.{}.nupkg", identifier.id, exact.raw()));
        if literal.is_file() {
            match reader.read(&literal) {
                Ok(package) => {
                    debug!("Resolved {} from literal archive name", identifier);
                    return vec![package];
                }
                Err(e) => warn!("Skipping archive: {}", e),
            }
        }
    }

    let candidates = scan(dir, reader, &format!("{}.*.nupkg", identifier.id))
        .into_iter()
        .filter(|package| identifier.matches_id(&package.id))
        .collect();
    select_by_range(candidates, range)
}

pub(crate) fn search(
    dir: &Path,
    reader: &dyn NupkgReader,
    term: &str,
    include_all_versions: bool,
    include_prerelease: bool,
    take: usize,
    skip: usize,
) -> Vec<Package> {
    let pattern = if term.is_empty() {
        "*.nupkg".to_string()
    } else {
        format!("*{}*.nupkg", term)
    };

    let term_lower = term.to_lowercase();
    let mut packages: Vec<Package> = scan(dir, reader, &pattern)
        .into_iter()
        .filter(|package| term.is_empty() || package.id.to_lowercase().contains(&term_lower))
        .filter(|package| include_prerelease || !package.is_prerelease())
        .collect();

    if !include_all_versions {
        // Highest version per id wins, replacing earlier candidates
        let mut latest: Vec<Package> = Vec::new();
        for package in packages {
            match latest
                .iter_mut()
                .find(|kept| kept.id.eq_ignore_ascii_case(&package.id))
            {
                Some(kept) => {
                    if package.version > kept.version {
                        *kept = package;
                    }
                }
                None => latest.push(package),
            }
        }
        packages = latest;
    }

    packages.sort();
    packages.into_iter().skip(skip).take(take).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MockNupkgReader;
    use std::fs::File;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_nupkg(dir: &Path, id: &str, version: &str) {
        let nuspec = format!(
            "<package><metadata><id>{}</id><version>{}</version></metadata></package>",
            id, version
        );
        let path = dir.join(format!("{}.{}.nupkg", id, version));
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(format!("{}.nuspec", id), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(nuspec.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    fn real_reader() -> crate::archive::ZipNupkgReader {
        crate::archive::ZipNupkgReader
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let reader = MockNupkgReader::new();
        let packages = scan(Path::new("/definitely/not/here"), &reader, "*.nupkg");
        assert!(packages.is_empty());
    }

    #[test]
    fn test_find_packages_by_id_in_range() {
        let dir = tempfile::tempdir().unwrap();
        write_nupkg(dir.path(), "foo", "1.0.0");
        write_nupkg(dir.path(), "foo", "1.5.0");
        write_nupkg(dir.path(), "foo", "3.0.0");

        let identifier = PackageIdentifier::new("foo", "[1.0,2.0]");
        let range = identifier.range().unwrap();
        let packages = find_packages_by_id(dir.path(), &real_reader(), &identifier, &range);

        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].version, "1.0.0".parse().unwrap());
        assert_eq!(packages[1].version, "1.5.0".parse().unwrap());
    }

    #[test]
    fn test_find_packages_by_id_closest_newer_fallback() {
        let dir = tempfile::tempdir().unwrap();
        for version in ["1.0.0", "2.0.0", "3.0.0"] {
            write_nupkg(dir.path(), "foo", version);
        }

        let identifier = PackageIdentifier::new("foo", "1.5.0");
        let range = identifier.range().unwrap();
        let packages = find_packages_by_id(dir.path(), &real_reader(), &identifier, &range);

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version, "2.0.0".parse().unwrap());
    }

    #[test]
    fn test_find_packages_by_id_literal_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        write_nupkg(dir.path(), "foo", "1.5.0");

        // The reader must only ever see the literal path, never a scan
        let mut reader = MockNupkgReader::new();
        let literal = dir.path().join("foo.1.5.0.nupkg");
        reader
            .expect_read()
            .withf(move |path| path == literal)
            .times(1)
            .returning(|_| Ok(Package::new("foo", "1.5.0".parse().unwrap())));

        let identifier = PackageIdentifier::new("foo", "1.5.0");
        let range = identifier.range().unwrap();
        let packages = find_packages_by_id(dir.path(), &reader, &identifier, &range);

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version, "1.5.0".parse().unwrap());
    }

    #[test]
    fn test_corrupt_archive_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_nupkg(dir.path(), "foo", "1.0.0");
        std::fs::write(dir.path().join("foo.2.0.0.nupkg"), b"not a zip").unwrap();

        let identifier = PackageIdentifier::new("foo", "[1.0,)");
        let range = identifier.range().unwrap();
        let packages = find_packages_by_id(dir.path(), &real_reader(), &identifier, &range);

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version, "1.0.0".parse().unwrap());
    }

    #[test]
    fn test_search_dedup_keeps_highest_version() {
        let dir = tempfile::tempdir().unwrap();
        write_nupkg(dir.path(), "foo", "1.0.0");
        write_nupkg(dir.path(), "foo", "2.0.0");

        let packages = search(dir.path(), &real_reader(), "foo", false, false, 30, 0);
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].version, "2.0.0".parse().unwrap());
    }

    #[test]
    fn test_search_all_versions() {
        let dir = tempfile::tempdir().unwrap();
        write_nupkg(dir.path(), "foo", "1.0.0");
        write_nupkg(dir.path(), "foo", "2.0.0");

        let packages = search(dir.path(), &real_reader(), "foo", true, false, 30, 0);
        assert_eq!(packages.len(), 2);
    }

    #[test]
    fn test_search_empty_term_matches_everything() {
        let dir = tempfile::tempdir().unwrap();
        write_nupkg(dir.path(), "foo", "1.0.0");
        write_nupkg(dir.path(), "bar", "1.0.0");

        let packages = search(dir.path(), &real_reader(), "", false, false, 30, 0);
        assert_eq!(packages.len(), 2);
    }

    #[test]
    fn test_search_term_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_nupkg(dir.path(), "FooBar", "1.0.0");

        let packages = search(dir.path(), &real_reader(), "foobar", false, false, 30, 0);
        assert_eq!(packages.len(), 1);
    }

    #[test]
    fn test_search_excludes_prerelease_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        write_nupkg(dir.path(), "foo", "1.0.0");
        write_nupkg(dir.path(), "foo", "2.0.0-beta");

        let stable = search(dir.path(), &real_reader(), "foo", false, false, 30, 0);
        assert_eq!(stable[0].version, "1.0.0".parse().unwrap());

        let with_pre = search(dir.path(), &real_reader(), "foo", false, true, 30, 0);
        assert_eq!(with_pre[0].version, "2.0.0-beta".parse().unwrap());
    }

    #[test]
    fn test_search_take_and_skip() {
        let dir = tempfile::tempdir().unwrap();
        for id in ["a", "b", "c"] {
            write_nupkg(dir.path(), id, "1.0.0");
        }

        let page = search(dir.path(), &real_reader(), "", false, false, 1, 1);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "b");
    }
}
