#![allow(non_snake_case)]

//! The `maven-metadata.xml` file format described at
//!  https://maven.apache.org/ref/3.9.5/maven-repository-metadata/repository-metadata.html

use std::cmp::Ordering;
use std::fmt::Write;

use serde::Deserialize;

use crate::maven::version::{MavenVersion, Quality, VersionComparator, SNAPSHOT_SUFFIX};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub groupId: Option<String>,
    #[serde(default)]
    pub artifactId: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub versioning: Option<Versioning>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Versioning {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub versions: Option<Versions>,
    #[serde(default)]
    pub lastUpdated: Option<String>,
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
    #[serde(default)]
    pub snapshotVersions: Option<SnapshotVersions>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Versions {
    #[serde(default)]
    pub version: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub buildNumber: Option<u32>,
    #[serde(default)]
    pub localCopy: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SnapshotVersions {
    #[serde(default)]
    pub snapshotVersion: Vec<SnapshotVersion>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SnapshotVersion {
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    pub value: String,
    #[serde(default)]
    pub updated: Option<String>,
}

impl Metadata {
    pub fn parse(xml: &[u8]) -> anyhow::Result<Metadata> {
        Ok(serde_xml_rs::from_reader(xml)?)
    }

    pub fn for_artifact(group_id: &str, artifact_id: &str) -> Metadata {
        Metadata {
            groupId: Some(group_id.to_string()),
            artifactId: Some(artifact_id.to_string()),
            version: None,
            versioning: Some(Versioning::default()),
        }
    }

    /// the versions listed in a GA level file
    pub fn versions(&self) -> Vec<String> {
        self.versioning.as_ref()
            .and_then(|v| v.versions.as_ref())
            .map(|v| v.version.iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect())
            .unwrap_or_default()
    }

    /// the deployed builds listed in a snapshot's GAV level file, e.g. `1.0-20240101.120000-3`
    pub fn snapshot_builds(&self) -> Vec<String> {
        let mut result: Vec<String> = Vec::new();
        let versioning = match &self.versioning {
            Some(v) => v,
            None => return result,
        };

        if let Some(snapshot_versions) = &versioning.snapshotVersions {
            for sv in &snapshot_versions.snapshotVersion {
                let value = sv.value.trim();
                if MavenVersion::parse(value).quality() == Quality::TimestampedSnapshot && !result.iter().any(|v| v == value) {
                    result.push(value.to_string());
                }
            }
        }

        if let (Some(version), Some(Snapshot { timestamp: Some(timestamp), buildNumber: Some(build_number), .. })) = (&self.version, &versioning.snapshot) {
            if let Some(base) = version.trim().strip_suffix(SNAPSHOT_SUFFIX) {
                let value = format!("{}-{}-{}", base, timestamp.trim(), build_number);
                if !result.contains(&value) {
                    result.push(value);
                }
            }
        }
        result
    }

    /// Adds a version to a GA level file, keeping `latest` and `release` up to date. Returns
    ///  `false` if the version was listed already.
    pub fn add_version(&mut self, version: &str, comparator: &VersionComparator, last_updated: &str) -> bool {
        let versioning = self.versioning.get_or_insert_with(Default::default);
        let versions = versioning.versions.get_or_insert_with(Default::default);
        if versions.version.iter().any(|v| v == version) {
            return false;
        }
        versions.version.push(version.to_string());
        versions.version.sort_by(|a, b| comparator.compare(a, b));

        if is_newer(version, versioning.latest.as_deref(), comparator) {
            versioning.latest = Some(version.to_string());
        }
        if MavenVersion::parse(version).quality() == Quality::Release && is_newer(version, versioning.release.as_deref(), comparator) {
            versioning.release = Some(version.to_string());
        }
        versioning.lastUpdated = Some(last_updated.to_string());
        true
    }

    /// Registers a deployed snapshot build in a GAV level file
    pub fn add_snapshot_build(&mut self, build_version: &str, extension: &str, classifier: Option<&str>, last_updated: &str) {
        if let MavenVersion::Snapshot { version, build: Some(build) } = MavenVersion::parse(build_version) {
            self.version = Some(version);
            let versioning = self.versioning.get_or_insert_with(Default::default);

            let is_newer_build = match &versioning.snapshot {
                Some(Snapshot { timestamp: Some(t), buildNumber: Some(n), .. }) => (build.timestamp.as_str(), build.build_number) > (t.as_str(), *n),
                _ => true,
            };
            if is_newer_build {
                versioning.snapshot = Some(Snapshot {
                    timestamp: Some(build.timestamp.clone()),
                    buildNumber: Some(build.build_number),
                    localCopy: None,
                });
            }

            let snapshot_versions = versioning.snapshotVersions.get_or_insert_with(Default::default);
            snapshot_versions.snapshotVersion.retain(|sv| !(sv.value == build_version && sv.extension.as_deref() == Some(extension) && sv.classifier.as_deref() == classifier));
            snapshot_versions.snapshotVersion.push(SnapshotVersion {
                classifier: classifier.map(|c| c.to_string()),
                extension: Some(extension.to_string()),
                value: build_version.to_string(),
                updated: Some(last_updated.to_string()),
            });
            versioning.lastUpdated = Some(last_updated.to_string());
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");
        write_element(&mut xml, 1, "groupId", self.groupId.as_deref());
        write_element(&mut xml, 1, "artifactId", self.artifactId.as_deref());
        write_element(&mut xml, 1, "version", self.version.as_deref());

        if let Some(versioning) = &self.versioning {
            xml.push_str("  <versioning>\n");
            write_element(&mut xml, 2, "latest", versioning.latest.as_deref());
            write_element(&mut xml, 2, "release", versioning.release.as_deref());
            if let Some(snapshot) = &versioning.snapshot {
                xml.push_str("    <snapshot>\n");
                write_element(&mut xml, 3, "timestamp", snapshot.timestamp.as_deref());
                write_element(&mut xml, 3, "buildNumber", snapshot.buildNumber.map(|n| n.to_string()).as_deref());
                write_element(&mut xml, 3, "localCopy", snapshot.localCopy.map(|b| b.to_string()).as_deref());
                xml.push_str("    </snapshot>\n");
            }
            if let Some(versions) = &versioning.versions {
                xml.push_str("    <versions>\n");
                for v in &versions.version {
                    write_element(&mut xml, 3, "version", Some(v));
                }
                xml.push_str("    </versions>\n");
            }
            write_element(&mut xml, 2, "lastUpdated", versioning.lastUpdated.as_deref());
            if let Some(snapshot_versions) = &versioning.snapshotVersions {
                xml.push_str("    <snapshotVersions>\n");
                for sv in &snapshot_versions.snapshotVersion {
                    xml.push_str("      <snapshotVersion>\n");
                    write_element(&mut xml, 4, "classifier", sv.classifier.as_deref());
                    write_element(&mut xml, 4, "extension", sv.extension.as_deref());
                    write_element(&mut xml, 4, "value", Some(&sv.value));
                    write_element(&mut xml, 4, "updated", sv.updated.as_deref());
                    xml.push_str("      </snapshotVersion>\n");
                }
                xml.push_str("    </snapshotVersions>\n");
            }
            xml.push_str("  </versioning>\n");
        }
        xml.push_str("</metadata>\n");
        xml
    }
}

fn is_newer(candidate: &str, current: Option<&str>, comparator: &VersionComparator) -> bool {
    match current {
        None => true,
        Some(current) => comparator.compare(candidate, current) == Ordering::Greater,
    }
}

fn write_element(xml: &mut String, indent: usize, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        // writing to a String does not fail
        let _ = writeln!(xml, "{}<{}>{}</{}>", "  ".repeat(indent), name, escape(value), name);
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
