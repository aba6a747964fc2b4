use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::maven::version::{MavenVersion, VersionComparator, VersionSpec};
use crate::repository::RepositoryId;

pub const DEFAULT_TYPE: &str = "jar";

#[derive(PartialEq, Eq, Clone, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MavenGroupId(pub String);

#[derive(PartialEq, Eq, Clone, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MavenArtifactId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Provided,
    Runtime,
    Test,
    System,
}
impl Scope {
    /// Whether a dependency declared with scope `other` belongs to a resolution requested
    ///  for `self`, e.g. a `compile` resolution does not contain `test` dependencies.
    pub fn encloses(&self, other: Scope) -> bool {
        use Scope::*;
        match self {
            Compile => matches!(other, Compile | Provided | System),
            Provided => matches!(other, Compile | Provided | System),
            Runtime => matches!(other, Compile | Runtime | System),
            Test => true,
            System => matches!(other, Compile | System),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
        }
    }
}
impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compile" => Ok(Scope::Compile),
            "provided" => Ok(Scope::Provided),
            "runtime" => Ok(Scope::Runtime),
            "test" => Ok(Scope::Test),
            "system" => Ok(Scope::System),
            other => Err(anyhow!("unknown dependency scope: {:?}", other)),
        }
    }
}
impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}


/// An inclusion or exclusion pattern. Group and artifact may be `*`; a missing version
///  matches every version of the GA.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactFilter {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
}
impl ArtifactFilter {
    pub fn ga(group_id: impl Into<String>, artifact_id: impl Into<String>) -> ArtifactFilter {
        ArtifactFilter {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> ArtifactFilter {
        self.version = Some(version.into());
        self
    }

    pub fn is_ga_only(&self) -> bool {
        self.version.is_none()
    }

    pub fn matches_ga(&self, coordinate: &ArtifactCoordinate) -> bool {
        wildcard_match(&self.group_id, &coordinate.group_id.0)
            && wildcard_match(&self.artifact_id, &coordinate.artifact_id.0)
    }

    pub fn matches(&self, coordinate: &ArtifactCoordinate, comparator: &VersionComparator) -> bool {
        if !self.matches_ga(coordinate) {
            return false;
        }

        match &self.version {
            None => true,
            Some(spec) => match VersionSpec::parse(spec) {
                Ok(VersionSpec::Exact(v)) => comparator.compare(&v, &coordinate.version) == Ordering::Equal,
                Ok(VersionSpec::Range(range)) => range.contains(&coordinate.version, comparator),
                Ok(VersionSpec::Virtual(_)) => spec == &coordinate.version,
                // NB: an unparseable filter version never matches rather than matching everything
                Err(_) => false,
            },
        }
    }
}
impl FromStr for ArtifactFilter {
    type Err = anyhow::Error;

    /// `group:artifact` or `group:artifact:version-spec`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, ':').collect();
        match parts.as_slice() {
            [g, a] if !g.is_empty() && !a.is_empty() => Ok(ArtifactFilter::ga(*g, *a)),
            [g, a, v] if !g.is_empty() && !a.is_empty() => Ok(ArtifactFilter::ga(*g, *a).with_version(*v)),
            _ => Err(anyhow!("not a valid artifact filter: {:?}", s)),
        }
    }
}
impl Display for ArtifactFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            None => write!(f, "{}:{}", self.group_id, self.artifact_id),
            Some(v) => write!(f, "{}:{}:{}", self.group_id, self.artifact_id, v),
        }
    }
}

fn wildcard_match(pattern: &str, value: &str) -> bool {
    pattern == "*" || pattern == value
}


/// Identifies an artifact together with the resolution metadata of its declaration.
///
/// Equality and hashing are defined by the canonical form `group:artifact:version:classifier:type`
///  only. Scope, optionality, filters and attributes do not take part.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group_id: MavenGroupId,
    pub artifact_id: MavenArtifactId,
    pub version: String,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default = "default_type")]
    pub artifact_type: String,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub inclusions: Vec<ArtifactFilter>,
    #[serde(default)]
    pub exclusions: Vec<ArtifactFilter>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn default_type() -> String {
    DEFAULT_TYPE.to_string()
}

impl ArtifactCoordinate {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>, version: impl Into<String>) -> ArtifactCoordinate {
        ArtifactCoordinate {
            group_id: MavenGroupId(group_id.into()),
            artifact_id: MavenArtifactId(artifact_id.into()),
            version: version.into(),
            classifier: None,
            artifact_type: default_type(),
            scope: None,
            optional: false,
            inclusions: Vec::new(),
            exclusions: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> ArtifactCoordinate {
        let classifier = classifier.into();
        self.classifier = if classifier.is_empty() { None } else { Some(classifier) };
        self
    }

    pub fn with_type(mut self, artifact_type: impl Into<String>) -> ArtifactCoordinate {
        self.artifact_type = artifact_type.into();
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> ArtifactCoordinate {
        self.scope = Some(scope);
        self
    }

    pub fn with_optional(mut self, optional: bool) -> ArtifactCoordinate {
        self.optional = optional;
        self
    }

    pub fn with_exclusion(mut self, exclusion: ArtifactFilter) -> ArtifactCoordinate {
        self.exclusions.push(exclusion);
        self
    }

    pub fn with_inclusion(mut self, inclusion: ArtifactFilter) -> ArtifactCoordinate {
        self.inclusions.push(inclusion);
        self
    }

    /// same declaration, different version
    pub fn with_version(&self, version: impl Into<String>) -> ArtifactCoordinate {
        let mut result = self.clone();
        result.version = version.into();
        result
    }

    pub fn canonical(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.group_id.0,
            self.artifact_id.0,
            self.version,
            self.classifier.as_deref().unwrap_or(""),
            self.artifact_type,
        )
    }

    pub fn ga(&self) -> String {
        format!("{}:{}", self.group_id.0, self.artifact_id.0)
    }

    pub fn gav(&self) -> String {
        format!("{}:{}:{}", self.group_id.0, self.artifact_id.0, self.version)
    }

    pub fn same_ga(&self, other: &ArtifactCoordinate) -> bool {
        self.group_id == other.group_id && self.artifact_id == other.artifact_id
    }

    pub fn effective_scope(&self) -> Scope {
        self.scope.unwrap_or(Scope::Compile)
    }

    pub fn parsed_version(&self) -> MavenVersion {
        MavenVersion::parse(&self.version)
    }

    fn canonical_key(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.group_id.0,
            &self.artifact_id.0,
            &self.version,
            self.classifier.as_deref().unwrap_or(""),
            &self.artifact_type,
        )
    }
}

impl PartialEq for ArtifactCoordinate {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}
impl Eq for ArtifactCoordinate {}

impl Hash for ArtifactCoordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state)
    }
}

impl Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for ArtifactCoordinate {
    type Err = anyhow::Error;

    /// `group:artifact:version[:classifier[:type]]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 3 || parts.len() > 5 || parts[..3].iter().any(|p| p.is_empty()) {
            return Err(anyhow!("not a valid artifact coordinate: {:?}", s));
        }

        let mut result = ArtifactCoordinate::new(parts[0], parts[1], parts[2]);
        if let Some(classifier) = parts.get(3) {
            result = result.with_classifier(*classifier);
        }
        if let Some(artifact_type) = parts.get(4) {
            if !artifact_type.is_empty() {
                result = result.with_type(*artifact_type);
            }
        }
        Ok(result)
    }
}


/// Resolved metadata for an artifact: the coordinate plus what resolution learned about it.
#[derive(Clone, Debug)]
pub struct ArtifactMetadata {
    pub coordinate: ArtifactCoordinate,
    pub dependencies: Vec<ArtifactCoordinate>,
    pub resolved: bool,
    pub artifact_exists: bool,
    pub why: Option<String>,
    pub error: Option<String>,
    /// the repository that produced this metadata, used to route follow-up reads
    pub tracker: Option<RepositoryId>,
}
impl ArtifactMetadata {
    pub fn new(coordinate: ArtifactCoordinate) -> ArtifactMetadata {
        ArtifactMetadata {
            coordinate,
            dependencies: Vec::new(),
            resolved: false,
            artifact_exists: false,
            why: None,
            error: None,
            tracker: None,
        }
    }

    pub fn tracked_by(mut self, tracker: RepositoryId) -> ArtifactMetadata {
        self.tracker = Some(tracker);
        self
    }

    pub fn version(&self) -> &str {
        &self.coordinate.version
    }

    pub fn canonical(&self) -> String {
        self.coordinate.canonical()
    }
}
impl PartialEq for ArtifactMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.coordinate == other.coordinate
    }
}
impl Eq for ArtifactMetadata {}

impl Hash for ArtifactMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.coordinate.hash(state)
    }
}

impl Display for ArtifactMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.coordinate.fmt(f)
    }
}

impl From<ArtifactCoordinate> for ArtifactMetadata {
    fn from(coordinate: ArtifactCoordinate) -> Self {
        ArtifactMetadata::new(coordinate)
    }
}
