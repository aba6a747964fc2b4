use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use hex::FromHex;
use tokio::fs::{read_dir, try_exists};
use tracing::{debug, trace, warn};

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactMetadata};
use crate::maven::metadata_xml::Metadata;
use crate::maven::paths::*;
use crate::maven::pom::PomProcessor;
use crate::maven::version::{MavenVersion, Quality, VersionComparator};
use crate::repository::*;
use crate::util::atomic_fs::{write_atomically, FileLock};
use crate::util::validating_http_body::sha1_of;

const LOCK_FILE: &str = "maven-metadata.xml.lock";
const STALE_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// A repository in Maven layout on the local file system
pub struct LocalRepository {
    id: RepositoryId,
    root: PathBuf,
    policy: RepositoryPolicy,
    processor: Arc<dyn DependencyProcessor>,
    comparator: VersionComparator,
}
impl LocalRepository {
    pub fn new(id: RepositoryId, root: PathBuf) -> LocalRepository {
        LocalRepository {
            id,
            root,
            policy: RepositoryPolicy::default(),
            processor: Arc::new(PomProcessor::new()),
            comparator: VersionComparator::default(),
        }
    }

    pub fn with_policy(mut self, policy: RepositoryPolicy) -> LocalRepository {
        self.policy = policy;
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn DependencyProcessor>) -> LocalRepository {
        self.processor = processor;
        self
    }

    pub fn id(&self) -> &RepositoryId {
        &self.id
    }

    pub fn policy(&self) -> &RepositoryPolicy {
        &self.policy
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The versions present for the query's GA. `maven-metadata.xml` is authoritative if it
    ///  exists, otherwise the version directories are listed. Deployed snapshot builds are
    ///  discovered in the snapshot directories' metadata and file names.
    async fn list_versions(&self, coordinate: &ArtifactCoordinate) -> anyhow::Result<Option<Vec<String>>> {
        let ga_dir = self.root.join(ga_directory(coordinate));
        if !try_exists(&ga_dir).await? {
            return Ok(None);
        }

        let metadata_path = self.root.join(ga_metadata_path(coordinate));
        let mut versions = if try_exists(&metadata_path).await? {
            Metadata::parse(&tokio::fs::read(&metadata_path).await?)?.versions()
        }
        else {
            let mut result = Vec::new();
            let mut entries = read_dir(&ga_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    result.push(entry.file_name().to_string_lossy().to_string());
                }
            }
            result
        };

        let mut builds = Vec::new();
        for v in &versions {
            if MavenVersion::parse(v).quality() == Quality::Snapshot {
                builds.extend(self.snapshot_builds(coordinate, v).await?);
            }
        }
        versions.extend(builds);
        versions.sort_by(|a, b| self.comparator.compare(a, b));
        versions.dedup();

        trace!("{}: versions of {}: {:?}", self.id, coordinate.ga(), versions);
        Ok(if versions.is_empty() { None } else { Some(versions) })
    }

    async fn snapshot_builds(&self, coordinate: &ArtifactCoordinate, snapshot_version: &str) -> anyhow::Result<Vec<String>> {
        let gav = coordinate.with_version(snapshot_version);
        let dir = self.root.join(gav_directory(&gav));
        let mut result = Vec::new();
        if !try_exists(&dir).await? {
            return Ok(result);
        }

        let metadata_path = self.root.join(gav_metadata_path(&gav));
        if try_exists(&metadata_path).await? {
            match Metadata::parse(&tokio::fs::read(&metadata_path).await?) {
                Ok(metadata) => result.extend(metadata.snapshot_builds()),
                Err(e) => warn!("{}: ignoring unreadable {}: {}", self.id, metadata_path.display(), e),
            }
        }

        let mut entries = read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Ok(parsed) = parse_maven_filename(&file_name, &coordinate.artifact_id.0, snapshot_version) {
                if parsed.version.quality() == Quality::TimestampedSnapshot {
                    let version = parsed.version.to_string();
                    if !result.contains(&version) {
                        result.push(version);
                    }
                }
            }
        }
        Ok(result)
    }

    /// reads a file, verifying it against its `.sha1` side file if there is one
    async fn read_verified(&self, relative_path: &str) -> anyhow::Result<Option<Bytes>> {
        let path = self.root.join(relative_path);
        if !try_exists(&path).await? {
            return Ok(None);
        }
        let data = Bytes::from(tokio::fs::read(&path).await?);

        let sha1_path = self.root.join(format!("{}.sha1", relative_path));
        if try_exists(&sha1_path).await? {
            let sha1_string = tokio::fs::read_to_string(&sha1_path).await?;
            // some tools append the file name after the hash
            let hex_string = sha1_string.split_whitespace().next().unwrap_or("");
            let expected = <[u8;20]>::from_hex(hex_string)
                .map_err(|e| anyhow!("invalid SHA1 side file {}: {}", sha1_path.display(), e))?;
            if sha1_of(&data) != expected {
                bail!("SHA1 mismatch for {}", path.display());
            }
        }
        Ok(Some(data))
    }

    async fn write_verified(&self, relative_path: &str, data: &[u8]) -> anyhow::Result<()> {
        let path = self.root.join(relative_path);
        write_atomically(&path, data).await?;
        write_atomically(&self.root.join(format!("{}.sha1", relative_path)), hex::encode(sha1_of(data)).as_bytes()).await?;
        Ok(())
    }

    /// read-merge-write of the GA (and for deployed snapshot builds, the GAV) metadata, under an
    ///  exclusive lock so that concurrent writers of different versions keep each other's entries
    async fn register_version(&self, coordinate: &ArtifactCoordinate) -> anyhow::Result<()> {
        let lock = FileLock::acquire(self.root.join(ga_directory(coordinate)).join(LOCK_FILE), STALE_LOCK_TIMEOUT).await?;
        let result = self.do_register_version(coordinate).await;
        lock.release().await?;
        result
    }

    async fn do_register_version(&self, coordinate: &ArtifactCoordinate) -> anyhow::Result<()> {
        let last_updated = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
        let version = coordinate.parsed_version();

        let ga_path = self.root.join(ga_metadata_path(coordinate));
        let mut metadata = self.read_metadata(&ga_path, coordinate).await?;
        if metadata.add_version(&version.base_version(), &self.comparator, &last_updated) {
            write_atomically(&ga_path, metadata.to_xml().as_bytes()).await?;
        }

        if version.quality() == Quality::TimestampedSnapshot {
            let gav_path = self.root.join(gav_metadata_path(coordinate));
            let mut metadata = self.read_metadata(&gav_path, coordinate).await?;
            metadata.add_snapshot_build(
                &coordinate.version,
                extension_for_type(&coordinate.artifact_type),
                coordinate.classifier.as_deref(),
                &last_updated,
            );
            write_atomically(&gav_path, metadata.to_xml().as_bytes()).await?;
        }
        Ok(())
    }

    async fn read_metadata(&self, path: &Path, coordinate: &ArtifactCoordinate) -> anyhow::Result<Metadata> {
        if try_exists(path).await? {
            match Metadata::parse(&tokio::fs::read(path).await?) {
                Ok(m) => return Ok(m),
                Err(e) => warn!("{}: replacing unreadable {}: {}", self.id, path.display(), e),
            }
        }
        Ok(Metadata::for_artifact(&coordinate.group_id.0, &coordinate.artifact_id.0))
    }

    async fn artifact_exists(&self, coordinate: &ArtifactCoordinate) -> anyhow::Result<bool> {
        Ok(try_exists(self.root.join(as_maven_path(coordinate))).await?)
    }

    async fn dependencies_of(&self, query: &ArtifactCoordinate) -> anyhow::Result<Option<Vec<ArtifactCoordinate>>> {
        match self.processor.dependencies(query, self).await? {
            Some(deps) => Ok(Some(deps)),
            None => {
                if self.artifact_exists(query).await? {
                    // an artifact without POM declares no dependencies
                    Ok(Some(Vec::new()))
                }
                else {
                    Ok(None)
                }
            }
        }
    }

    async fn read_artifact(&self, query: &ArtifactCoordinate) -> anyhow::Result<Option<Artifact>> {
        let data = match self.read_verified(&as_maven_path(query)).await? {
            Some(data) => data,
            None => return Ok(None),
        };

        let mut metadata = ArtifactMetadata::new(query.clone());
        metadata.artifact_exists = true;
        match self.dependencies_of(query).await {
            Ok(Some(deps)) => {
                metadata.dependencies = deps;
                metadata.resolved = true;
            }
            Ok(None) => {}
            Err(e) => metadata.error = Some(e.to_string()),
        }

        let mut artifact = Artifact::new(metadata, data);
        artifact.pom = self.read_verified(&pom_path(query)).await?;
        Ok(Some(artifact))
    }
}

#[async_trait]
impl MetadataReader for LocalRepository {
    async fn read_raw_data(&self, coordinate: &ArtifactCoordinate, classifier: Option<&str>, artifact_type: &str) -> anyhow::Result<Option<Bytes>> {
        self.read_verified(&artifact_path(coordinate, classifier, extension_for_type(artifact_type))).await
    }
}

#[async_trait]
impl RepositoryReader for LocalRepository {
    async fn read_versions(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Vec<ArtifactMetadata>> {
        let mut result = ReadResults::new();
        for query in queries {
            let listing = self.list_versions(query).await;
            result.insert(query.clone(), versions_outcome(query, listing, &self.policy, &self.comparator));
        }
        result
    }

    async fn read_dependencies(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Vec<ArtifactCoordinate>> {
        let mut result = ReadResults::new();
        for query in queries {
            trace!("{}: reading dependencies of {}", self.id, query);
            result.insert(query.clone(), QueryOutcome::from_result(self.dependencies_of(query).await));
        }
        result
    }

    async fn read_artifacts(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Artifact> {
        let mut result = ReadResults::new();
        for query in queries {
            result.insert(query.clone(), QueryOutcome::from_result(self.read_artifact(query).await));
        }
        result
    }
}

#[async_trait]
impl RepositoryWriter for LocalRepository {
    async fn write_artifacts(&self, artifacts: &[Artifact]) -> anyhow::Result<()> {
        for artifact in artifacts {
            let coordinate = &artifact.metadata.coordinate;
            if coordinate.parsed_version().quality() != Quality::Release && !coordinate.parsed_version().quality().is_snapshot() {
                bail!("cannot write {} - not a concrete version", coordinate);
            }
            debug!("{}: writing {}", self.id, coordinate);

            self.write_verified(&as_maven_path(coordinate), &artifact.data).await?;
            if let Some(pom) = &artifact.pom {
                self.write_verified(&pom_path(coordinate), pom).await?;
            }
            self.register_version(coordinate).await?;
        }
        Ok(())
    }
}
