//! Atom/OData catalog feed parsing.
//!
//! A remote query answers with an XML syndication feed; each `entry` element
//! carries one package, with most metadata under `m:properties`. Entries that
//! fail to decode are skipped with a warning so one bad record never sinks
//! the rest of the feed.

use anyhow::{Context, Result};
use log::warn;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::package::{Package, parse_dependencies};

#[derive(Default)]
struct EntryFields {
    atom_title: String,
    id: String,
    version: String,
    title: String,
    description: String,
    dependencies: String,
    release_notes: String,
    project_url: String,
    license_url: String,
    repository_url: String,
    repository_type: String,
    repository_commit: String,
    download_count: String,
}

impl EntryFields {
    fn target(&mut self, element: &str, in_properties: bool) -> Option<&mut String> {
        if !in_properties {
            return match element {
                "title" => Some(&mut self.atom_title),
                _ => None,
            };
        }
        match element {
            "Id" => Some(&mut self.id),
            "Version" => Some(&mut self.version),
            "Title" => Some(&mut self.title),
            "Description" => Some(&mut self.description),
            "Dependencies" => Some(&mut self.dependencies),
            "ReleaseNotes" => Some(&mut self.release_notes),
            "ProjectUrl" => Some(&mut self.project_url),
            "LicenseUrl" => Some(&mut self.license_url),
            "RepositoryUrl" => Some(&mut self.repository_url),
            "RepositoryType" => Some(&mut self.repository_type),
            "RepositoryCommit" => Some(&mut self.repository_commit),
            "DownloadCount" => Some(&mut self.download_count),
            _ => None,
        }
    }

    fn into_package(self) -> Result<Package> {
        // Some feeds only carry the id in the entry's atom title
        let id = if self.id.is_empty() {
            self.atom_title
        } else {
            self.id
        };
        if id.is_empty() {
            anyhow::bail!("Feed entry has no package id");
        }

        let version = self
            .version
            .parse()
            .with_context(|| format!("Feed entry '{}' has a bad version token", id))?;

        let mut package = Package::new(id, version);
        package.title = non_empty(self.title);
        package.description = non_empty(self.description);
        package.dependencies = parse_dependencies(&self.dependencies);
        package.release_notes = non_empty(self.release_notes);
        package.project_url = non_empty(self.project_url);
        package.license_url = non_empty(self.license_url);
        package.repository_url = non_empty(self.repository_url);
        package.repository_type = non_empty(self.repository_type);
        package.repository_commit = non_empty(self.repository_commit);
        package.download_count = self.download_count.parse().unwrap_or(0);
        Ok(package)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

/// Parse a syndication feed into one Package per entry.
///
/// Fails only on malformed XML; individually undecodable entries are logged
/// and skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<Package>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut packages = Vec::new();
    let mut entry: Option<EntryFields> = None;
    let mut in_properties = false;
    let mut current_element: Option<String> = None;

    loop {
        match reader.read_event().context("Failed to parse feed XML")? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "entry" => {
                        entry = Some(EntryFields::default());
                        in_properties = false;
                        current_element = None;
                    }
                    "properties" if entry.is_some() => {
                        in_properties = true;
                        current_element = None;
                    }
                    _ if entry.is_some() => current_element = Some(name),
                    _ => {}
                }
            }
            Event::Text(text) => {
                if let (Some(fields), Some(element)) = (entry.as_mut(), current_element.as_deref())
                {
                    let decoded = text.unescape().context("Failed to decode feed text")?;
                    if let Some(target) = fields.target(element, in_properties) {
                        target.push_str(&decoded);
                    }
                }
            }
            Event::CData(cdata) => {
                if let (Some(fields), Some(element)) = (entry.as_mut(), current_element.as_deref())
                {
                    let decoded = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    if let Some(target) = fields.target(element, in_properties) {
                        target.push_str(&decoded);
                    }
                }
            }
            Event::End(end) => match end.local_name().as_ref() {
                b"entry" => {
                    if let Some(fields) = entry.take() {
                        match fields.into_package() {
                            Ok(package) => packages.push(package),
                            Err(e) => warn!("Skipping feed entry: {}", e),
                        }
                    }
                    in_properties = false;
                }
                b"properties" => in_properties = false,
                _ => current_element = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(packages)
}
