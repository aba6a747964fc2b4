use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactMetadata};
use crate::maven::paths::extension_for_type;
use crate::maven::version::VersionComparator;
use crate::repository::*;

#[derive(Default)]
struct MemoryEntry {
    /// `None` means: derive them from the stored documents via the dependency processor
    dependencies: Option<Vec<ArtifactCoordinate>>,
    /// keyed by (classifier, extension)
    files: BTreeMap<(Option<String>, String), Bytes>,
}

/// Number of queries a repository was asked, per operation
#[derive(Default, Debug)]
pub struct ReadStats {
    versions: AtomicUsize,
    dependencies: AtomicUsize,
    artifacts: AtomicUsize,
    raw_data: AtomicUsize,
}
impl ReadStats {
    pub fn versions(&self) -> usize {
        self.versions.load(Ordering::Relaxed)
    }
    pub fn dependencies(&self) -> usize {
        self.dependencies.load(Ordering::Relaxed)
    }
    pub fn artifacts(&self) -> usize {
        self.artifacts.load(Ordering::Relaxed)
    }
    pub fn raw_data(&self) -> usize {
        self.raw_data.load(Ordering::Relaxed)
    }
    pub fn total(&self) -> usize {
        self.versions() + self.dependencies() + self.artifacts() + self.raw_data()
    }
}

/// A repository held in memory, with injected dependency lists, documents and binaries. It can
///  pose as a local or a remote repository, and counts the queries it answers.
pub struct MemoryRepository {
    id: RepositoryId,
    policy: RepositoryPolicy,
    local: bool,
    writeable: bool,
    processor: Option<Arc<dyn DependencyProcessor>>,
    comparator: VersionComparator,
    /// GA -> version -> entry
    entries: RwLock<BTreeMap<String, BTreeMap<String, MemoryEntry>>>,
    stats: ReadStats,
    fail_reads: std::sync::atomic::AtomicBool,
}
impl MemoryRepository {
    pub fn new(id: RepositoryId) -> MemoryRepository {
        MemoryRepository {
            id,
            policy: RepositoryPolicy::default(),
            local: false,
            writeable: false,
            processor: None,
            comparator: VersionComparator::default(),
            entries: Default::default(),
            stats: Default::default(),
            fail_reads: Default::default(),
        }
    }

    /// a local, writeable repository
    pub fn new_local(id: RepositoryId) -> MemoryRepository {
        MemoryRepository::new(id)
            .with_local(true)
            .with_writeable(true)
    }

    pub fn with_policy(mut self, policy: RepositoryPolicy) -> MemoryRepository {
        self.policy = policy;
        self
    }

    pub fn with_local(mut self, local: bool) -> MemoryRepository {
        self.local = local;
        self
    }

    pub fn with_writeable(mut self, writeable: bool) -> MemoryRepository {
        self.writeable = writeable;
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn DependencyProcessor>) -> MemoryRepository {
        self.processor = Some(processor);
        self
    }

    pub fn id(&self) -> &RepositoryId {
        &self.id
    }

    pub fn policy(&self) -> &RepositoryPolicy {
        &self.policy
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn is_writeable(&self) -> bool {
        self.writeable
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// makes every subsequent read fail, simulating an unreachable repository
    pub fn set_failing(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::Relaxed);
    }

    pub fn add_dependencies(&self, coordinate: &ArtifactCoordinate, dependencies: Vec<ArtifactCoordinate>) {
        let mut entries = self.write_entries();
        let entry = entries.entry(coordinate.ga()).or_default()
            .entry(coordinate.version.clone()).or_default();
        entry.dependencies = Some(dependencies);
    }

    /// registers a file; the version exists afterwards, with dependencies to be derived by the
    ///  processor unless they were added explicitly
    pub fn add_file(&self, coordinate: &ArtifactCoordinate, classifier: Option<&str>, extension: &str, data: Bytes) {
        let mut entries = self.write_entries();
        let entry = entries.entry(coordinate.ga()).or_default()
            .entry(coordinate.version.clone()).or_default();
        entry.files.insert((classifier.map(|c| c.to_string()), extension.to_string()), data);
    }

    pub fn contains(&self, coordinate: &ArtifactCoordinate) -> bool {
        self.read_entries()
            .get(&coordinate.ga())
            .map(|versions| versions.contains_key(&coordinate.version))
            .unwrap_or(false)
    }

    pub fn versions_of(&self, coordinate: &ArtifactCoordinate) -> Vec<String> {
        self.read_entries()
            .get(&coordinate.ga())
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, BTreeMap<String, MemoryEntry>>> {
        // NB: the data stays consistent even if a writer panicked, so poisoning is ignored
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, BTreeMap<String, BTreeMap<String, MemoryEntry>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> anyhow::Result<()> {
        if self.fail_reads.load(Ordering::Relaxed) {
            bail!("repository {} is not available", self.id);
        }
        Ok(())
    }

    fn file(&self, coordinate: &ArtifactCoordinate, classifier: Option<&str>, extension: &str) -> Option<Bytes> {
        self.read_entries()
            .get(&coordinate.ga())
            .and_then(|versions| versions.get(&coordinate.version))
            .and_then(|entry| entry.files.get(&(classifier.map(|c| c.to_string()), extension.to_string())))
            .cloned()
    }

    async fn dependencies_of(&self, query: &ArtifactCoordinate) -> anyhow::Result<Option<Vec<ArtifactCoordinate>>> {
        self.check_available()?;

        let explicit = {
            let entries = self.read_entries();
            match entries.get(&query.ga()).and_then(|versions| versions.get(&query.version)) {
                None => return Ok(None),
                Some(entry) => entry.dependencies.clone(),
            }
        };
        if explicit.is_some() {
            return Ok(explicit);
        }

        match &self.processor {
            Some(processor) => Ok(Some(processor.dependencies(query, self).await?.unwrap_or_default())),
            // an existing artifact without declared dependencies
            None => Ok(Some(Vec::new())),
        }
    }
}

#[async_trait]
impl MetadataReader for MemoryRepository {
    async fn read_raw_data(&self, coordinate: &ArtifactCoordinate, classifier: Option<&str>, artifact_type: &str) -> anyhow::Result<Option<Bytes>> {
        self.stats.raw_data.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        Ok(self.file(coordinate, classifier, extension_for_type(artifact_type)))
    }
}

#[async_trait]
impl RepositoryReader for MemoryRepository {
    async fn read_versions(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Vec<ArtifactMetadata>> {
        let mut result = ReadResults::new();
        for query in queries {
            self.stats.versions.fetch_add(1, Ordering::Relaxed);
            trace!("{}: reading versions for {}", self.id, query);

            let listing = self.check_available().map(|_| {
                let versions = self.versions_of(query);
                if versions.is_empty() { None } else { Some(versions) }
            });
            result.insert(query.clone(), versions_outcome(query, listing, &self.policy, &self.comparator));
        }
        result
    }

    async fn read_dependencies(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Vec<ArtifactCoordinate>> {
        let mut result = ReadResults::new();
        for query in queries {
            self.stats.dependencies.fetch_add(1, Ordering::Relaxed);
            trace!("{}: reading dependencies of {}", self.id, query);
            result.insert(query.clone(), QueryOutcome::from_result(self.dependencies_of(query).await));
        }
        result
    }

    async fn read_artifacts(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Artifact> {
        let mut result = ReadResults::new();
        for query in queries {
            self.stats.artifacts.fetch_add(1, Ordering::Relaxed);

            let outcome = match self.check_available() {
                Err(e) => QueryOutcome::Failed(e),
                Ok(()) => {
                    match self.file(query, query.classifier.as_deref(), extension_for_type(&query.artifact_type)) {
                        None => QueryOutcome::NotFound,
                        Some(data) => {
                            let mut artifact = Artifact::new(ArtifactMetadata::new(query.clone()), data);
                            artifact.metadata.artifact_exists = true;
                            if let Ok(Some(deps)) = self.dependencies_of(query).await {
                                artifact.metadata.dependencies = deps;
                                artifact.metadata.resolved = true;
                            }
                            artifact.pom = self.file(query, None, "pom");
                            QueryOutcome::Found(artifact)
                        }
                    }
                }
            };
            result.insert(query.clone(), outcome);
        }
        result
    }
}

#[async_trait]
impl RepositoryWriter for MemoryRepository {
    async fn write_artifacts(&self, artifacts: &[Artifact]) -> anyhow::Result<()> {
        if !self.writeable {
            bail!("repository {} is not writeable", self.id);
        }

        let mut entries = self.write_entries();
        for artifact in artifacts {
            let coordinate = &artifact.metadata.coordinate;
            trace!("{}: writing {}", self.id, coordinate);

            let entry = entries.entry(coordinate.ga()).or_default()
                .entry(coordinate.version.clone()).or_default();
            entry.files.insert(
                (coordinate.classifier.clone(), extension_for_type(&coordinate.artifact_type).to_string()),
                artifact.data.clone(),
            );
            if let Some(pom) = &artifact.pom {
                entry.files.insert((None, "pom".to_string()), pom.clone());
            }
            if artifact.metadata.resolved {
                entry.dependencies = Some(artifact.metadata.dependencies.clone());
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{coord, memory_repo};

    #[tokio::test]
    async fn test_read_versions_and_dependencies() {
        let repo = memory_repo("mem", &[
            ("g:a:1.0", &["g:b:1.0"]),
            ("g:a:1.5", &[]),
            ("g:a:2.0", &[]),
        ]);

        let versions = repo.read_versions(&[coord("g:a:[1.0,2.0)"), coord("g:x:1.0")]).await;
        let found: Vec<String> = versions.get(&coord("g:a:[1.0,2.0)")).unwrap().found().unwrap()
            .iter().map(|md| md.version().to_string()).collect();
        assert_eq!(found, vec!["1.0", "1.5"]);
        assert!(matches!(versions.get(&coord("g:x:1.0")), Some(QueryOutcome::NotFound)));

        let deps = repo.read_dependencies(&[coord("g:a:1.0"), coord("g:a:1.5"), coord("g:a:3.0")]).await;
        assert_eq!(deps.get(&coord("g:a:1.0")).unwrap().found().unwrap(), &vec![coord("g:b:1.0")]);
        assert_eq!(deps.get(&coord("g:a:1.5")).unwrap().found().unwrap(), &Vec::<ArtifactCoordinate>::new());
        assert!(matches!(deps.get(&coord("g:a:3.0")), Some(QueryOutcome::NotFound)));

        assert_eq!(repo.stats().versions(), 2);
        assert_eq!(repo.stats().dependencies(), 3);
    }

    #[tokio::test]
    async fn test_failing_repository() {
        let repo = memory_repo("mem", &[("g:a:1.0", &[])]);
        repo.set_failing(true);

        let versions = repo.read_versions(&[coord("g:a:1.0")]).await;
        assert!(versions.get(&coord("g:a:1.0")).unwrap().is_failed());
        let deps = repo.read_dependencies(&[coord("g:a:1.0")]).await;
        assert!(deps.get(&coord("g:a:1.0")).unwrap().is_failed());
    }

    #[tokio::test]
    async fn test_write_and_read_artifacts() {
        let repo = MemoryRepository::new_local(RepositoryId("local".to_string()));
        let mut md = ArtifactMetadata::new(coord("g:a:1.0"));
        md.dependencies = vec![coord("g:b:2.0")];
        md.resolved = true;
        let artifact = Artifact::new(md, Bytes::from_static(b"jar")).with_pom(Bytes::from_static(b"<project/>"));

        repo.write_artifacts(&[artifact.clone()]).await.unwrap();
        repo.write_artifacts(&[artifact]).await.unwrap();

        assert_eq!(repo.versions_of(&coord("g:a:1.0")), vec!["1.0"]);
        let read = repo.read_artifacts(&[coord("g:a:1.0"), coord("g:a:1.0:sources")]).await;
        let found = read.get(&coord("g:a:1.0")).unwrap().found().unwrap();
        assert_eq!(found.data, Bytes::from_static(b"jar"));
        assert_eq!(found.pom, Some(Bytes::from_static(b"<project/>")));
        assert_eq!(found.metadata.dependencies, vec![coord("g:b:2.0")]);
        assert!(matches!(read.get(&coord("g:a:1.0:sources")), Some(QueryOutcome::NotFound)));

        let raw = repo.read_raw_data(&coord("g:a:1.0"), None, "pom").await.unwrap();
        assert_eq!(raw, Some(Bytes::from_static(b"<project/>")));
    }

    #[tokio::test]
    async fn test_read_only_repository_rejects_writes() {
        let repo = memory_repo("mem", &[]);
        let artifact = Artifact::new(ArtifactMetadata::new(coord("g:a:1.0")), Bytes::new());
        assert!(repo.write_artifacts(&[artifact]).await.is_err());
    }
}
