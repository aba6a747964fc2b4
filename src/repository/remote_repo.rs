use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use hex::FromHex;
use tracing::{debug, trace, warn};

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactMetadata};
use crate::maven::metadata_xml::Metadata;
use crate::maven::paths::*;
use crate::maven::pom::PomProcessor;
use crate::maven::version::{MavenVersion, Quality, VersionComparator};
use crate::repository::*;
use crate::util::validating_http_body::StreamVerifierFactory;
use crate::util::validating_http_downloader::ValidatingHttpDownloader;

/// How `.sha1` side files of a remote repository are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sha1Handling {
    /// every file must have a side file, and it must match
    Require,
    #[default]
    VerifyIfPresent,
    Ignore,
}

/// A read-only Maven repository accessed via HTTP(S)
pub struct RemoteRepository {
    id: RepositoryId,
    policy: RepositoryPolicy,
    sha1_handling: Sha1Handling,
    downloader: ValidatingHttpDownloader,
    processor: Arc<dyn DependencyProcessor>,
    comparator: VersionComparator,
}
impl RemoteRepository {
    pub fn new(id: RepositoryId, base_uri: String) -> anyhow::Result<RemoteRepository> {
        Ok(RemoteRepository {
            id,
            policy: RepositoryPolicy::default(),
            sha1_handling: Sha1Handling::default(),
            downloader: ValidatingHttpDownloader::new(base_uri)?,
            processor: Arc::new(PomProcessor::new()),
            comparator: VersionComparator::default(),
        })
    }

    pub fn with_policy(mut self, policy: RepositoryPolicy) -> RemoteRepository {
        self.policy = policy;
        self
    }

    pub fn with_sha1_handling(mut self, sha1_handling: Sha1Handling) -> RemoteRepository {
        self.sha1_handling = sha1_handling;
        self
    }

    pub fn with_verifier_factory(mut self, factory: Arc<dyn StreamVerifierFactory>) -> RemoteRepository {
        self.downloader = self.downloader.with_verifier_factory(factory);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn DependencyProcessor>) -> RemoteRepository {
        self.processor = processor;
        self
    }

    pub fn id(&self) -> &RepositoryId {
        &self.id
    }

    pub fn policy(&self) -> &RepositoryPolicy {
        &self.policy
    }

    pub fn base_uri(&self) -> &str {
        self.downloader.base_uri()
    }

    async fn expected_sha1(&self, path: &str) -> anyhow::Result<Option<[u8;20]>> {
        if self.sha1_handling == Sha1Handling::Ignore {
            return Ok(None);
        }

        match self.downloader.get(&format!("{}.sha1", path), None).await? {
            Some(blob) => {
                let raw = blob.collect().await?;
                let s = String::from_utf8_lossy(&raw);
                // some repositories append the file name after the hash
                let hex_string = s.split_whitespace().next().unwrap_or("");
                match <[u8;20]>::from_hex(hex_string) {
                    Ok(sha1) => Ok(Some(sha1)),
                    Err(e) if self.sha1_handling == Sha1Handling::Require => bail!("invalid SHA1 side file for {}: {}", path, e),
                    Err(e) => {
                        warn!("{}: ignoring invalid SHA1 side file for {}: {}", self.id, path, e);
                        Ok(None)
                    }
                }
            }
            None => Ok(None),
        }
    }

    /// downloads a file into memory, `None` if the server does not have it
    async fn download(&self, path: &str) -> anyhow::Result<Option<Bytes>> {
        let expected_sha1 = self.expected_sha1(path).await?;
        trace!("{}: downloading {} (expected SHA1 {:?})", self.id, path, expected_sha1.map(hex::encode));

        match self.downloader.get(path, expected_sha1).await? {
            Some(blob) => {
                if expected_sha1.is_none() && self.sha1_handling == Sha1Handling::Require {
                    bail!("{}: no SHA1 side file for {}", self.id, path);
                }
                Ok(Some(blob.collect().await?))
            }
            None => Ok(None),
        }
    }

    async fn list_versions(&self, coordinate: &ArtifactCoordinate) -> anyhow::Result<Option<Vec<String>>> {
        let metadata = match self.download(&ga_metadata_path(coordinate)).await? {
            Some(data) => Metadata::parse(&data)?,
            None => return Ok(None),
        };

        let mut result = Vec::new();
        for v in metadata.versions() {
            if MavenVersion::parse(&v).quality() == Quality::Snapshot && self.policy.snapshots {
                let builds = match self.download(&gav_metadata_path(&coordinate.with_version(v.as_str()))).await? {
                    Some(data) => Metadata::parse(&data)?.snapshot_builds(),
                    None => Vec::new(),
                };
                // deployed snapshots have no files under the bare version
                if builds.is_empty() {
                    result.push(v);
                }
                else {
                    result.extend(builds);
                }
            }
            else {
                result.push(v);
            }
        }
        debug!("{}: versions of {}: {:?}", self.id, coordinate.ga(), result);
        Ok(Some(result))
    }

    async fn read_artifact(&self, query: &ArtifactCoordinate) -> anyhow::Result<Option<Artifact>> {
        let data = match self.download(&as_maven_path(query)).await? {
            Some(data) => data,
            None => return Ok(None),
        };
        let mut metadata = ArtifactMetadata::new(query.clone());
        metadata.artifact_exists = true;

        let pom = self.download(&pom_path(query)).await?;
        if pom.is_some() {
            match self.processor.dependencies(query, self).await {
                Ok(Some(deps)) => {
                    metadata.dependencies = deps;
                    metadata.resolved = true;
                }
                Ok(None) => {}
                Err(e) => metadata.error = Some(e.to_string()),
            }
        }
        Ok(Some(Artifact { metadata, data, pom }))
    }
}

#[async_trait]
impl MetadataReader for RemoteRepository {
    async fn read_raw_data(&self, coordinate: &ArtifactCoordinate, classifier: Option<&str>, artifact_type: &str) -> anyhow::Result<Option<Bytes>> {
        self.download(&artifact_path(coordinate, classifier, extension_for_type(artifact_type))).await
    }
}

#[async_trait]
impl RepositoryReader for RemoteRepository {
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
            let outcome = QueryOutcome::from_result(self.processor.dependencies(query, self).await);
            result.insert(query.clone(), outcome);
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
