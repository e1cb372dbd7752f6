//! `.nupkg` archive metadata reading.
//!
//! A package archive is a zip with an embedded `.nuspec` manifest at its
//! root. The local strategy depends only on the [`NupkgReader`] trait; the
//! zip-backed implementation lives here.

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt;
use std::fs::File;
use std::path::Path;
use zip::ZipArchive;

use crate::package::{Package, PackageIdentifier};

/// Error for a corrupt or unreadable package archive.
#[derive(Debug)]
pub struct ArchiveReadError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ArchiveReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot read package archive {}: {}", self.path, self.message)
    }
}

impl std::error::Error for ArchiveReadError {}

fn read_error(path: &Path, message: impl fmt::Display) -> anyhow::Error {
    ArchiveReadError {
        path: path.display().to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Extracts a [`Package`] from an archive on disk.
#[cfg_attr(test, mockall::automock)]
pub trait NupkgReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Package>;
}

/// Reader for zip-format `.nupkg` archives.
pub struct ZipNupkgReader;

impl NupkgReader for ZipNupkgReader {
    #[tracing::instrument(skip(self))]
    fn read(&self, path: &Path) -> Result<Package> {
        let file = File::open(path).map_err(|e| read_error(path, e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| read_error(path, e))?;

        // The manifest sits at the archive root
        let manifest_name = archive
            .file_names()
            .find(|name| name.ends_with(".nuspec") && !name.contains('/'))
            .map(String::from)
            .ok_or_else(|| read_error(path, "no .nuspec manifest found"))?;

        let mut manifest = String::new();
        {
            use std::io::Read;
            let mut entry = archive
                .by_name(&manifest_name)
                .map_err(|e| read_error(path, e))?;
            entry
                .read_to_string(&mut manifest)
                .map_err(|e| read_error(path, e))?;
        }

        parse_nuspec(&manifest).map_err(|e| read_error(path, e))
    }
}

/// Parse a `.nuspec` manifest into a Package.
pub fn parse_nuspec(xml: &str) -> Result<Package> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut id = String::new();
    let mut version = String::new();
    let mut title = String::new();
    let mut description = String::new();
    let mut release_notes = String::new();
    let mut project_url = String::new();
    let mut license_url = String::new();
    let mut repository_url = None;
    let mut repository_type = None;
    let mut repository_commit = None;
    let mut dependencies = Vec::new();
    let mut current_element: Option<String> = None;

    loop {
        match reader.read_event().context("Failed to parse nuspec XML")? {
            Event::Start(element) | Event::Empty(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "dependency" => {
                        let dep_id = attribute(&element, "id")?;
                        let dep_version = attribute(&element, "version")?;
                        if let (Some(dep_id), Some(dep_version)) = (dep_id, dep_version) {
                            dependencies.push(PackageIdentifier::new(dep_id, dep_version));
                        }
                    }
                    "repository" => {
                        repository_url = attribute(&element, "url")?;
                        repository_type = attribute(&element, "type")?;
                        repository_commit = attribute(&element, "commit")?;
                    }
                    _ => current_element = Some(name),
                }
            }
            Event::Text(text) => {
                let decoded = text.unescape().context("Failed to decode nuspec text")?;
                let target = match current_element.as_deref() {
                    Some("id") => Some(&mut id),
                    Some("version") => Some(&mut version),
                    Some("title") => Some(&mut title),
                    Some("description") => Some(&mut description),
                    Some("releaseNotes") => Some(&mut release_notes),
                    Some("projectUrl") => Some(&mut project_url),
                    Some("licenseUrl") => Some(&mut license_url),
                    _ => None,
                };
                if let Some(target) = target {
                    target.push_str(&decoded);
                }
            }
            Event::End(_) => current_element = None,
            Event::Eof => break,
            _ => {}
        }
    }

    if id.is_empty() {
        anyhow::bail!("Manifest has no package id");
    }
    let version = version
        .parse()
        .with_context(|| format!("Manifest for '{}' has a bad version token", id))?;

    let mut package = Package::new(id, version);
    package.title = some_if_filled(title);
    package.description = some_if_filled(description);
    package.release_notes = some_if_filled(release_notes);
    package.project_url = some_if_filled(project_url);
    package.license_url = some_if_filled(license_url);
    package.repository_url = repository_url;
    package.repository_type = repository_type;
    package.repository_commit = repository_commit;
    package.dependencies = dependencies;
    Ok(package)
}

fn some_if_filled(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

fn attribute(element: &quick_xml::events::BytesStart<'_>, name: &str) -> Result<Option<String>> {
    Ok(element
        .try_get_attribute(name)
        .context("Bad nuspec attribute")?
        .map(|attr| {
            attr.unescape_value()
                .map(|value| value.into_owned())
                .context("Bad nuspec attribute value")
        })
        .transpose()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const NUSPEC: &str = r#"<?xml version="1.0"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>Foo.Lib</id>
    <version>1.2.0</version>
    <title>Foo Library</title>
    <description>A sample library.</description>
    <releaseNotes>Initial.</releaseNotes>
    <projectUrl>https://example.com/foo</projectUrl>
    <licenseUrl>https://example.com/license</licenseUrl>
    <repository url="https://github.com/example/foo" type="git" commit="abc123" />
    <dependencies>
      <group targetFramework="net6.0">
        <dependency id="Bar" version="[1.0,2.0)" />
        <dependency id="Baz" version="0.9.1" />
      </group>
    </dependencies>
  </metadata>
</package>"#;

    fn write_nupkg(dir: &Path, file_name: &str, nuspec: &str) -> std::path::PathBuf {
        let path = dir.join(file_name);
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("Foo.Lib.nuspec", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(nuspec.as_bytes()).unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_parse_nuspec() {
        let package = parse_nuspec(NUSPEC).unwrap();
        assert_eq!(package.id, "Foo.Lib");
        assert_eq!(package.version, "1.2.0".parse().unwrap());
        assert_eq!(package.title.as_deref(), Some("Foo Library"));
        assert_eq!(package.repository_type.as_deref(), Some("git"));
        assert_eq!(package.repository_commit.as_deref(), Some("abc123"));
        assert_eq!(package.dependencies.len(), 2);
        assert_eq!(package.dependencies[0].id, "Bar");
        assert_eq!(package.dependencies[0].version_spec, "[1.0,2.0)");
    }

    #[test]
    fn test_parse_nuspec_missing_id() {
        assert!(parse_nuspec("<package><metadata><version>1.0</version></metadata></package>").is_err());
    }

    #[test]
    fn test_read_nupkg_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_nupkg(dir.path(), "Foo.Lib.1.2.0.nupkg", NUSPEC);

        let package = ZipNupkgReader.read(&path).unwrap();
        assert_eq!(package.id, "Foo.Lib");
        assert_eq!(package.dependencies.len(), 2);
    }

    #[test]
    fn test_read_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.nupkg");
        std::fs::write(&path, b"not a zip").unwrap();

        let err = ZipNupkgReader.read(&path).unwrap_err();
        assert!(err.downcast_ref::<ArchiveReadError>().is_some());
    }

    #[test]
    fn test_read_rejects_zip_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.nupkg");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("readme.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();

        let err = ZipNupkgReader.read(&path).unwrap_err();
        assert!(err.downcast_ref::<ArchiveReadError>().is_some());
    }
}
