use anyhow::anyhow;
use lazy_static::lazy_static;
use regex::Regex;

use crate::maven::coordinates::*;
use crate::maven::version::{MavenVersion, SnapshotBuild, SNAPSHOT_SUFFIX};

lazy_static! {
    static ref TIMESTAMP_AND_BUILD_REGEX: Regex = Regex::new(r"^(\d{8}\.\d{6})-(\d+)").unwrap();
}

pub const MAVEN_METADATA_FILE: &str = "maven-metadata.xml";


/// maps a dependency type to the file extension it is stored with
pub fn extension_for_type(artifact_type: &str) -> &str {
    match artifact_type {
        "" | "jar" | "bundle" | "maven-plugin" | "ejb" | "ejb-client" | "test-jar" | "java-source" | "javadoc" => "jar",
        other => other,
    }
}

/// `org/example/lib` for `org.example:lib`
pub fn ga_directory(coordinate: &ArtifactCoordinate) -> String {
    format!("{}/{}", coordinate.group_id.0.replace('.', "/"), coordinate.artifact_id.0)
}

/// the directory a version's files live in; timestamped snapshots share their `-SNAPSHOT` directory
pub fn gav_directory(coordinate: &ArtifactCoordinate) -> String {
    format!("{}/{}", ga_directory(coordinate), coordinate.parsed_version().base_version())
}

pub fn artifact_file_name(coordinate: &ArtifactCoordinate, classifier: Option<&str>, extension: &str) -> String {
    let classifier_string = match classifier {
        None => "".to_string(),
        Some(c) => format!("-{}", c),
    };

    format!("{}-{}{}.{}",
            coordinate.artifact_id.0,
            coordinate.parsed_version(),
            classifier_string,
            extension,
    )
}

/// relative path of one of an artifact's files inside a maven repository, i.e. it starts with
///  something like "org/..." or "com/..."
pub fn artifact_path(coordinate: &ArtifactCoordinate, classifier: Option<&str>, extension: &str) -> String {
    format!("{}/{}", gav_directory(coordinate), artifact_file_name(coordinate, classifier, extension))
}

/// relative path of the file a coordinate's classifier and type point to
pub fn as_maven_path(coordinate: &ArtifactCoordinate) -> String {
    artifact_path(coordinate, coordinate.classifier.as_deref(), extension_for_type(&coordinate.artifact_type))
}

pub fn pom_path(coordinate: &ArtifactCoordinate) -> String {
    artifact_path(coordinate, None, "pom")
}

pub fn ga_metadata_path(coordinate: &ArtifactCoordinate) -> String {
    format!("{}/{}", ga_directory(coordinate), MAVEN_METADATA_FILE)
}

pub fn gav_metadata_path(coordinate: &ArtifactCoordinate) -> String {
    format!("{}/{}", gav_directory(coordinate), MAVEN_METADATA_FILE)
}


#[derive(Debug, Eq, PartialEq)]
pub struct ParsedFilename<'a> {
    pub version: MavenVersion,
    pub classifier: Option<&'a str>,
    pub extension: &'a str, // without leading '.', e.g. "jar"
}

/// Parses the name of a file inside a version directory. `version_dir` is the directory's name,
///  i.e. the release version or the `-SNAPSHOT` base version.
///
/// Release: `<artifactId>-<version>[-<classifier>].<extension>`
///
/// Snapshot: `<artifactId>-<base>-SNAPSHOT[-<classifier>].<extension>` for a bare snapshot, and
///  `<artifactId>-<base>-<yyyyMMdd.HHmmss>-<buildNumber>[-<classifier>].<extension>` for a
///  deployed build
pub fn parse_maven_filename<'a>(file_name: &'a str, artifact_id: &str, version_dir: &str) -> anyhow::Result<ParsedFilename<'a>> {
    let full_file_name = file_name;

    let file_name = file_name.strip_prefix(artifact_id)
        .and_then(|s| s.strip_prefix('-'))
        .ok_or_else(|| anyhow!("{} is not a valid maven file name: expected to start with artifact id {}", full_file_name, artifact_id))?;

    let (file_name, extension) = match file_name.rfind('.') {
        Some(last_dot) if last_dot + 1 < file_name.len() => (&file_name[..last_dot], &file_name[last_dot + 1..]),
        _ => return Err(anyhow!("not a valid maven file name - no extension: {}", full_file_name)),
    };

    if let Some(snapshot_base) = version_dir.strip_suffix(SNAPSHOT_SUFFIX) {
        if let Some(rest) = file_name.strip_prefix(version_dir) {
            return Ok(ParsedFilename {
                version: MavenVersion::Snapshot { version: version_dir.to_string(), build: None },
                classifier: parse_classifier(rest, full_file_name)?,
                extension,
            });
        }

        let rest = file_name.strip_prefix(snapshot_base)
            .and_then(|s| s.strip_prefix('-'))
            .ok_or_else(|| anyhow!("{} is not a valid maven file name: expected version {}", full_file_name, version_dir))?;

        let captures = TIMESTAMP_AND_BUILD_REGEX.captures(rest)
            .ok_or_else(|| anyhow!("snapshot file name without timestamp and build number: {}", full_file_name))?;
        let matched_len = captures[0].len();
        let build = SnapshotBuild {
            timestamp: captures[1].to_string(),
            build_number: captures[2].parse()?,
        };

        Ok(ParsedFilename {
            version: MavenVersion::Snapshot { version: version_dir.to_string(), build: Some(build) },
            classifier: parse_classifier(&rest[matched_len..], full_file_name)?,
            extension,
        })
    }
    else {
        let rest = file_name.strip_prefix(version_dir)
            .ok_or_else(|| anyhow!("{} is not a valid maven file name: expected version {}", full_file_name, version_dir))?;

        Ok(ParsedFilename {
            version: MavenVersion::Release(version_dir.to_string()),
            classifier: parse_classifier(rest, full_file_name)?,
            extension,
        })
    }
}

fn parse_classifier<'a>(rest: &'a str, full_file_name: &str) -> anyhow::Result<Option<&'a str>> {
    if rest.is_empty() {
        Ok(None)
    }
    else if let Some(classifier) = rest.strip_prefix('-').filter(|c| !c.is_empty()) {
        Ok(Some(classifier))
    }
    else {
        Err(anyhow!("not a valid maven file name - invalid classifier format: {}", full_file_name))
    }
}


#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    fn release(v: &str) -> MavenVersion {
        MavenVersion::Release(v.to_string())
    }

    fn snapshot(v: &str, build: Option<(&str, u32)>) -> MavenVersion {
        MavenVersion::Snapshot {
            version: v.to_string(),
            build: build.map(|(timestamp, build_number)| SnapshotBuild { timestamp: timestamp.to_string(), build_number }),
        }
    }

    #[rstest]
    #[case::release("a-1.0.0.jar", "a", "1.0.0", Some((release("1.0.0"), None, "jar")))]
    #[case::release_with_dash("x-y-1.0.0.jar", "x-y", "1.0.0", Some((release("1.0.0"), None, "jar")))]
    #[case::release_version_with_dash_prefix("x-y-1.0.0.jar", "x", "y-1.0.0", Some((release("y-1.0.0"), None, "jar")))]
    #[case::release_extension("q-1.0.0.pom", "q", "1.0.0", Some((release("1.0.0"), None, "pom")))]
    #[case::release_classifier("a-1.0.0-sources.jar", "a", "1.0.0", Some((release("1.0.0"), Some("sources"), "jar")))]
    #[case::release_classifier_with_dash("a-1.0.0-cla-rst.jar", "a", "1.0.0", Some((release("1.0.0"), Some("cla-rst"), "jar")))]
    #[case::release_classifier_with_dash_suffix("a-1.0.0-cla-rst.jar", "a", "1.0.0-cla", Some((release("1.0.0-cla"), Some("rst"), "jar")))]
    #[case::release_sha1_side_file("a-1.0.0.jar.sha1", "a", "1.0.0", None)]
    #[case::release_invalid_wrong_artifact("a-1.0.0.jar", "b", "1.0.0", None)]
    #[case::release_invalid_no_dash_after_artifact("a1.0.0.jar", "a", "1.0.0", None)]
    #[case::release_invalid_wrong_version("a-1.0.0.jar", "a", "1.0.1", None)]
    #[case::release_invalid_no_version("a.jar", "a", "1.0.0", None)]
    #[case::release_invalid_no_dash_before_classifier("a-1.0.0xyz.jar", "a", "1.0.0", None)]
    #[case::release_invalid_no_extension("a-1.0.0", "a", "1.0.0", None)]
    #[case::empty("", "a", "1.0.0", None)]

    #[case::bare_snapshot("a-1.0-SNAPSHOT.jar", "a", "1.0-SNAPSHOT", Some((snapshot("1.0-SNAPSHOT", None), None, "jar")))]
    #[case::bare_snapshot_classifier("a-1.0-SNAPSHOT-tests.jar", "a", "1.0-SNAPSHOT", Some((snapshot("1.0-SNAPSHOT", None), Some("tests"), "jar")))]
    #[case::timestamped("a-1.0-20240101.120000-3.jar", "a", "1.0-SNAPSHOT", Some((snapshot("1.0-SNAPSHOT", Some(("20240101.120000", 3))), None, "jar")))]
    #[case::timestamped_pom("a-1.0-20240101.120000-3.pom", "a", "1.0-SNAPSHOT", Some((snapshot("1.0-SNAPSHOT", Some(("20240101.120000", 3))), None, "pom")))]
    #[case::timestamped_classifier("a-1.0-20240101.120000-12-a-b-c.jar", "a", "1.0-SNAPSHOT", Some((snapshot("1.0-SNAPSHOT", Some(("20240101.120000", 12))), Some("a-b-c"), "jar")))]
    #[case::timestamped_classifier_like_timestamp("a-1.0-20240101.120000-1-11111111.111111.jar", "a", "1.0-SNAPSHOT", Some((snapshot("1.0-SNAPSHOT", Some(("20240101.120000", 1))), Some("11111111.111111"), "jar")))]
    #[case::snapshot_missing_build_number("a-1.0-20240101.120000.jar", "a", "1.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_build_number("a-1.0-20240101.120000-x.jar", "a", "1.0-SNAPSHOT", None)]
    #[case::snapshot_wrong_base("a-1.1-20240101.120000-1.jar", "a", "1.0-SNAPSHOT", None)]
    #[case::snapshot_wrong_artifact("a-1.0-SNAPSHOT.jar", "b", "1.0-SNAPSHOT", None)]
    #[case::lowercase_snapshot_is_release("a-1.0-snapshot-x.jar", "a", "1.0-snapshot", Some((release("1.0-snapshot"), Some("x"), "jar")))]
    fn test_parse_filename(#[case] file_name: &str, #[case] artifact_id: &str, #[case] version_dir: &str, #[case] expected: Option<(MavenVersion, Option<&str>, &str)>) {
        let actual = parse_maven_filename(file_name, artifact_id, version_dir);

        if let Some((version, classifier, extension)) = expected {
            let actual = actual.unwrap();
            assert_eq!(actual, ParsedFilename { version, classifier, extension });
        }
        else {
            assert!(actual.is_err());
        }
    }

    #[rstest]
    #[case::jar("org.example:lib:1.0", "org/example/lib/1.0/lib-1.0.jar")]
    #[case::classifier("org.example:lib:1.0:sources", "org/example/lib/1.0/lib-1.0-sources.jar")]
    #[case::typed("org.example:lib:1.0::pom", "org/example/lib/1.0/lib-1.0.pom")]
    #[case::bundle_type("org.example:lib:1.0::bundle", "org/example/lib/1.0/lib-1.0.jar")]
    #[case::bare_snapshot("g:a:1.0-SNAPSHOT", "g/a/1.0-SNAPSHOT/a-1.0-SNAPSHOT.jar")]
    #[case::timestamped("g:a:1.0-20240101.120000-3:tests", "g/a/1.0-SNAPSHOT/a-1.0-20240101.120000-3-tests.jar")]
    fn test_as_maven_path(#[case] coordinate: &str, #[case] expected: &str) {
        let coordinate: ArtifactCoordinate = coordinate.parse().unwrap();
        assert_eq!(as_maven_path(&coordinate), expected);
    }

    #[test]
    fn test_metadata_paths() {
        let coordinate: ArtifactCoordinate = "org.example:lib:1.0-20240101.120000-3".parse().unwrap();
        assert_eq!(ga_metadata_path(&coordinate), "org/example/lib/maven-metadata.xml");
        assert_eq!(gav_metadata_path(&coordinate), "org/example/lib/1.0-SNAPSHOT/maven-metadata.xml");
        assert_eq!(pom_path(&coordinate), "org/example/lib/1.0-SNAPSHOT/lib-1.0-20240101.120000-3.pom");
    }
}
