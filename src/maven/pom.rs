use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactFilter, Scope};
use crate::repository::{DependencyProcessor, MetadataReader};

lazy_static! {
    static ref PROPERTY_REGEX: Regex = Regex::new(r"\$\{([^}]+)}").unwrap();
}

/// parent POMs are followed at most this deep, guarding against cyclic parent declarations
const MAX_PARENT_DEPTH: usize = 16;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pom {
    #[serde(default)]
    group_id: Option<String>,
    #[serde(default)]
    artifact_id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    parent: Option<PomParent>,
    #[serde(default)]
    properties: Option<HashMap<String, String>>,
    #[serde(default)]
    dependency_management: Option<DependencyManagement>,
    #[serde(default)]
    dependencies: Option<Dependencies>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomParent {
    group_id: String,
    artifact_id: String,
    version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DependencyManagement {
    #[serde(default)]
    dependencies: Option<Dependencies>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Dependencies {
    #[serde(default)]
    dependency: Vec<PomDependency>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PomDependency {
    group_id: String,
    artifact_id: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, rename = "type")]
    dependency_type: Option<String>,
    #[serde(default)]
    classifier: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    optional: Option<String>,
    #[serde(default)]
    exclusions: Option<Exclusions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Exclusions {
    #[serde(default)]
    exclusion: Vec<Exclusion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Exclusion {
    group_id: String,
    #[serde(default)]
    artifact_id: Option<String>,
}

/// POM and its ancestors' contributions, merged child-first
#[derive(Default)]
struct EffectiveModel {
    properties: HashMap<String, String>,
    /// "group:artifact" -> (version, scope)
    managed: HashMap<String, (Option<String>, Option<String>)>,
}

/// Reads an artifact's POM and turns its `<dependencies>` into coordinates. Properties
///  (including `project.*` and those of parent POMs) are substituted, and missing versions and
///  scopes are filled in from `<dependencyManagement>`.
#[derive(Default)]
pub struct PomProcessor {
}
impl PomProcessor {
    pub fn new() -> PomProcessor {
        PomProcessor {}
    }

    async fn effective_model(&self, pom: &Pom, reader: &dyn MetadataReader) -> anyhow::Result<EffectiveModel> {
        let mut chain = vec![pom.clone()];
        let mut current_parent = pom.parent.clone();
        while let Some(parent) = current_parent {
            if chain.len() > MAX_PARENT_DEPTH {
                warn!("parent chain of {:?} is too deep - ignoring ancestors beyond {}", pom.artifact_id, MAX_PARENT_DEPTH);
                break;
            }
            let parent_coordinate = ArtifactCoordinate::new(&parent.group_id, &parent.artifact_id, &parent.version)
                .with_type("pom");
            match reader.read_raw_data(&parent_coordinate, None, "pom").await? {
                Some(data) => {
                    let parent_pom: Pom = serde_xml_rs::from_reader(data.as_ref())?;
                    current_parent = parent_pom.parent.clone();
                    chain.push(parent_pom);
                }
                None => {
                    debug!("parent POM {} not found", parent_coordinate);
                    current_parent = None;
                }
            }
        }

        let mut result = EffectiveModel::default();
        // ancestors first so that descendants override
        for p in chain.iter().rev() {
            let group_id = p.group_id.clone().or_else(|| p.parent.as_ref().map(|x| x.group_id.clone()));
            let version = p.version.clone().or_else(|| p.parent.as_ref().map(|x| x.version.clone()));
            for (key, value) in [("project.groupId", group_id), ("project.artifactId", p.artifact_id.clone()), ("project.version", version)] {
                if let Some(value) = value {
                    result.properties.insert(key.to_string(), value.clone());
                    result.properties.insert(key.replacen("project.", "pom.", 1), value);
                }
            }
            if let Some(parent) = &p.parent {
                result.properties.insert("project.parent.version".to_string(), parent.version.clone());
                result.properties.insert("project.parent.groupId".to_string(), parent.group_id.clone());
            }
            if let Some(properties) = &p.properties {
                for (key, value) in properties {
                    result.properties.insert(key.clone(), value.trim().to_string());
                }
            }
        }
        for p in chain.iter().rev() {
            let managed = p.dependency_management.as_ref()
                .and_then(|dm| dm.dependencies.as_ref())
                .map(|d| d.dependency.as_slice())
                .unwrap_or_default();
            for dep in managed {
                let ga = format!("{}:{}", substitute(&dep.group_id, &result.properties), substitute(&dep.artifact_id, &result.properties));
                result.managed.insert(ga, (dep.version.clone(), dep.scope.clone()));
            }
        }
        Ok(result)
    }

    fn to_coordinate(&self, dep: &PomDependency, model: &EffectiveModel, owner: &ArtifactCoordinate) -> anyhow::Result<Option<ArtifactCoordinate>> {
        let group_id = substitute(&dep.group_id, &model.properties);
        let artifact_id = substitute(&dep.artifact_id, &model.properties);
        let ga = format!("{}:{}", group_id, artifact_id);
        let (managed_version, managed_scope) = model.managed.get(&ga).cloned().unwrap_or_default();

        let version = match dep.version.as_ref().or(managed_version.as_ref()) {
            Some(v) => substitute(v, &model.properties),
            None => {
                warn!("dependency {} of {} has no version - skipping", ga, owner);
                return Ok(None);
            }
        };
        if version.contains("${") {
            warn!("dependency {} of {} has unresolvable version {:?} - skipping", ga, owner, version);
            return Ok(None);
        }

        let mut result = ArtifactCoordinate::new(group_id, artifact_id, version);
        if let Some(classifier) = &dep.classifier {
            result = result.with_classifier(substitute(classifier, &model.properties));
        }
        if let Some(t) = &dep.dependency_type {
            result = result.with_type(substitute(t, &model.properties));
        }
        if let Some(scope) = dep.scope.as_ref().or(managed_scope.as_ref()) {
            match substitute(scope, &model.properties).parse::<Scope>() {
                Ok(scope) => result = result.with_scope(scope),
                Err(e) => warn!("dependency {} of {}: {} - using the default scope", ga, owner, e),
            }
        }
        if let Some(optional) = &dep.optional {
            result = result.with_optional(substitute(optional, &model.properties).trim() == "true");
        }
        for exclusion in dep.exclusions.iter().flat_map(|e| e.exclusion.iter()) {
            result = result.with_exclusion(ArtifactFilter::ga(
                substitute(&exclusion.group_id, &model.properties),
                exclusion.artifact_id.as_deref().map(|a| substitute(a, &model.properties)).unwrap_or_else(|| "*".to_string()),
            ));
        }
        Ok(Some(result))
    }
}

#[async_trait]
impl DependencyProcessor for PomProcessor {
    async fn dependencies(&self, coordinate: &ArtifactCoordinate, reader: &dyn MetadataReader) -> anyhow::Result<Option<Vec<ArtifactCoordinate>>> {
        let data = match reader.read_raw_data(coordinate, None, "pom").await? {
            Some(data) => data,
            None => return Ok(None),
        };
        let pom: Pom = serde_xml_rs::from_reader(data.as_ref())?;
        let model = self.effective_model(&pom, reader).await?;

        let mut result = Vec::new();
        for dep in pom.dependencies.iter().flat_map(|d| d.dependency.iter()) {
            if let Some(c) = self.to_coordinate(dep, &model, coordinate)? {
                result.push(c);
            }
        }
        Ok(Some(result))
    }
}

/// replaces `${name}` with known property values, leaving unknown references in place
fn substitute(s: &str, properties: &HashMap<String, String>) -> String {
    let mut result = s.trim().to_string();
    // properties can refer to other properties
    for _ in 0..8 {
        if !result.contains("${") {
            break;
        }
        let replaced = PROPERTY_REGEX.replace_all(&result, |c: &Captures| {
            properties.get(&c[1]).cloned().unwrap_or_else(|| c[0].to_string())
        }).to_string();
        if replaced == result {
            break;
        }
        result = replaced;
    }
    result
}

/// the dependencies a POM declares directly, without consulting parent POMs
pub async fn parse_pom_dependencies(coordinate: &ArtifactCoordinate, pom: &[u8]) -> anyhow::Result<Vec<ArtifactCoordinate>> {
    let parsed: Pom = serde_xml_rs::from_reader(pom)?;
    let processor = PomProcessor::new();
    let model = processor.effective_model(&parsed, &NoDocuments {}).await?;

    let mut result = Vec::new();
    for dep in parsed.dependencies.iter().flat_map(|d| d.dependency.iter()) {
        if let Some(c) = processor.to_coordinate(dep, &model, coordinate)? {
            result.push(c);
        }
    }
    Ok(result)
}

struct NoDocuments {}
#[async_trait]
impl MetadataReader for NoDocuments {
    async fn read_raw_data(&self, _coordinate: &ArtifactCoordinate, _classifier: Option<&str>, _artifact_type: &str) -> anyhow::Result<Option<bytes::Bytes>> {
        Ok(None)
    }
}


#[cfg(test)]
mod test {
    use bytes::Bytes;
    use super::*;
    use crate::repository::memory_repo::MemoryRepository;
    use crate::repository::RepositoryId;
    use crate::test_support::coord;

    const PARENT_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.example</groupId>
  <artifactId>parent</artifactId>
  <version>3</version>
  <packaging>pom</packaging>
  <properties>
    <guava.version>32.1.0</guava.version>
  </properties>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>com.google.guava</groupId>
        <artifactId>guava</artifactId>
        <version>${guava.version}</version>
      </dependency>
      <dependency>
        <groupId>junit</groupId>
        <artifactId>junit</artifactId>
        <version>4.13</version>
        <scope>test</scope>
      </dependency>
    </dependencies>
  </dependencyManagement>
</project>
"#;

    const CHILD_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <parent>
    <groupId>org.example</groupId>
    <artifactId>parent</artifactId>
    <version>3</version>
  </parent>
  <artifactId>lib</artifactId>
  <version>1.0</version>
  <properties>
    <slf4j.version>2.0.9</slf4j.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
      <version>${slf4j.version}</version>
    </dependency>
    <dependency>
      <groupId>com.google.guava</groupId>
      <artifactId>guava</artifactId>
      <exclusions>
        <exclusion>
          <groupId>com.google.code.findbugs</groupId>
          <artifactId>jsr305</artifactId>
        </exclusion>
      </exclusions>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
    </dependency>
    <dependency>
      <groupId>${project.groupId}</groupId>
      <artifactId>lib-native</artifactId>
      <version>${project.version}</version>
      <classifier>linux</classifier>
      <optional>true</optional>
    </dependency>
    <dependency>
      <groupId>org.unknown</groupId>
      <artifactId>no-version</artifactId>
    </dependency>
  </dependencies>
</project>
"#;

    fn repo() -> MemoryRepository {
        let repo = MemoryRepository::new(RepositoryId("mem".to_string()));
        repo.add_file(&coord("org.example:parent:3"), None, "pom", Bytes::from_static(PARENT_POM.as_bytes()));
        repo.add_file(&coord("org.example:lib:1.0"), None, "pom", Bytes::from_static(CHILD_POM.as_bytes()));
        repo
    }

    #[tokio::test]
    async fn test_dependencies_with_parent() {
        let repo = repo();
        let deps = PomProcessor::new().dependencies(&coord("org.example:lib:1.0"), &repo).await.unwrap().unwrap();

        let canonical: Vec<String> = deps.iter().map(|d| d.canonical()).collect();
        assert_eq!(canonical, vec![
            "org.slf4j:slf4j-api:2.0.9::jar",
            "com.google.guava:guava:32.1.0::jar",
            "junit:junit:4.13::jar",
            "org.example:lib-native:1.0:linux:jar",
        ]);

        assert_eq!(deps[1].exclusions, vec![ArtifactFilter::ga("com.google.code.findbugs", "jsr305")]);
        assert_eq!(deps[2].scope, Some(Scope::Test));
        assert!(deps[3].optional);
        assert!(!deps[0].optional);
    }

    #[tokio::test]
    async fn test_missing_pom() {
        let repo = repo();
        let deps = PomProcessor::new().dependencies(&coord("org.example:other:1.0"), &repo).await.unwrap();
        assert!(deps.is_none());
    }

    #[tokio::test]
    async fn test_parse_direct_dependencies() {
        let deps = parse_pom_dependencies(&coord("org.example:lib:1.0"), CHILD_POM.as_bytes()).await.unwrap();
        let gas: Vec<String> = deps.iter().map(|d| d.gav()).collect();
        // without the parent POM's content, managed versions are unknown
        assert_eq!(gas, vec!["org.slf4j:slf4j-api:2.0.9", "org.example:lib-native:1.0"]);
    }

    #[test]
    fn test_substitute() {
        let mut properties = HashMap::new();
        properties.insert("a".to_string(), "${b}.0".to_string());
        properties.insert("b".to_string(), "1".to_string());
        assert_eq!(substitute("${a}", &properties), "1.0");
        assert_eq!(substitute(" ${unknown}-x ", &properties), "${unknown}-x");
    }
}
