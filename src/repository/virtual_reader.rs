//! One logical reader over an ordered list of repositories.
//!
//! Local repositories are asked before remote ones. Version listings go through a shared LRU
//!  [`VersionCache`], and answers of remote repositories are remembered in a [`MetadataCache`]
//!  according to their update policy. Artifacts fetched from remote repositories are written
//!  back into the first local writeable repository.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactMetadata};
use crate::maven::version::{MavenVersion, VersionComparator, VersionSpec};
use crate::repository::metadata_cache::{FsMetadataCache, MetadataCache};
use crate::repository::version_cache::VersionCache;
use crate::repository::*;

/// directory below a local write-back repository's root that holds the metadata cache
pub const METADATA_CACHE_DIR: &str = ".resolver-cache";

/// Misuse of the reader. These abort the whole call, unlike per-query failures which are
///  reported in the [`ReadResults`].
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("the virtual repository reader was used before init")]
    NotInitialized,
    #[error("empty query")]
    EmptyQuery,
    #[error("the virtual repository reader is initialized with {existing:?}, cannot re-initialize it with {requested:?}")]
    InitMismatch {
        existing: Vec<RepositoryId>,
        requested: Vec<RepositoryId>,
    },
    #[error("none of the repositories {0:?} is readable")]
    NoRepositories(Vec<RepositoryId>),
}

struct ReaderState {
    /// ids in the order passed to `init`
    configured: Vec<RepositoryId>,
    /// local readable repositories, then remote readable ones
    repositories: Vec<Repository>,
    write_back: Option<Repository>,
    metadata_cache: Option<Arc<dyn MetadataCache>>,
    fingerprint: String,
}
impl ReaderState {
    fn position(&self, id: &RepositoryId) -> Option<usize> {
        self.repositories.iter().position(|r| r.id() == id)
    }

    fn version_cache_key(&self, query: &ArtifactCoordinate) -> String {
        format!("{}@{}", query.canonical(), self.fingerprint)
    }

    /// the metadata cache applies to remote repositories only
    fn metadata_cache_for(&self, repository: &Repository) -> Option<&Arc<dyn MetadataCache>> {
        if repository.is_local() {
            None
        }
        else {
            self.metadata_cache.as_ref()
        }
    }
}

/// What the repositories that had no answer for a query said
#[derive(Default)]
struct Misses {
    consulted: usize,
    failures: Vec<anyhow::Error>,
}
impl Misses {
    fn not_found(&mut self) {
        self.consulted += 1;
    }

    fn failed(&mut self, e: anyhow::Error) {
        self.consulted += 1;
        self.failures.push(e);
    }

    /// `Failed` only if every consulted repository failed: a repository that legitimately does
    ///  not have the artifact makes it "not found"
    fn into_outcome<T>(mut self, query: &ArtifactCoordinate) -> QueryOutcome<T> {
        if self.consulted > 0 && self.failures.len() == self.consulted {
            let first = self.failures.remove(0);
            QueryOutcome::Failed(first.context(format!("all {} repositories consulted for {} failed", self.consulted, query)))
        }
        else {
            QueryOutcome::NotFound
        }
    }
}

struct PendingVersions {
    query: ArtifactCoordinate,
    spec: VersionSpec,
    candidates: Vec<ArtifactMetadata>,
    misses: Misses,
    done: bool,
}
impl PendingVersions {
    fn record(&mut self, repository: &Repository, outcome: QueryOutcome<Vec<ArtifactMetadata>>) {
        match outcome {
            QueryOutcome::Found(versions) => {
                let accepted: Vec<ArtifactMetadata> = versions.into_iter()
                    .filter(|md| repository.is_accepted_quality(MavenVersion::parse(md.version()).quality()))
                    .map(|md| md.tracked_by(repository.id().clone()))
                    .collect();
                if accepted.is_empty() {
                    self.misses.not_found();
                    return;
                }
                trace!("{} has {} version(s) for {}", repository.id(), accepted.len(), self.query);
                self.candidates.extend(accepted);

                if self.spec.is_singleton() || (self.spec.is_virtual() && repository.is_sufficient()) {
                    self.done = true;
                }
            }
            QueryOutcome::NotFound => self.misses.not_found(),
            QueryOutcome::Failed(e) => {
                debug!("{} failed to list versions for {}: {:#}", repository.id(), self.query, e);
                self.misses.failed(e);
            }
        }
    }

    fn finish(self, comparator: &VersionComparator) -> QueryOutcome<Vec<ArtifactMetadata>> {
        if self.candidates.is_empty() {
            return self.misses.into_outcome(&self.query);
        }

        // the first repository to list a version wins
        let mut seen = HashSet::new();
        let mut versions: Vec<ArtifactMetadata> = self.candidates.into_iter()
            .filter(|md| seen.insert(md.version().to_string()))
            .collect();

        if self.spec.is_virtual() {
            let best = versions.into_iter()
                .reduce(|best, md| match comparator.compare(md.version(), best.version()) {
                    Ordering::Greater => md,
                    _ => best,
                });
            return QueryOutcome::Found(best.into_iter().collect());
        }

        versions.sort_by(|a, b| comparator.compare(a.version(), b.version()));
        QueryOutcome::Found(versions)
    }
}

fn accepts(repository: &Repository, spec: &VersionSpec) -> bool {
    match spec {
        VersionSpec::Exact(version) => repository.is_accepted_quality(MavenVersion::parse(version).quality()),
        VersionSpec::Range(_) => true,
        VersionSpec::Virtual(version) => repository.is_accepted_quality(version.quality()),
    }
}

fn accepts_version(repository: &Repository, coordinate: &ArtifactCoordinate) -> bool {
    repository.is_accepted_quality(coordinate.parsed_version().quality())
}

/// cached results carry the declaration of whoever asked first
fn redeclare(query: &ArtifactCoordinate, versions: Vec<ArtifactMetadata>) -> Vec<ArtifactMetadata> {
    versions.into_iter()
        .map(|mut md| {
            let version = md.coordinate.version.clone();
            md.coordinate = query.with_version(version);
            md
        })
        .collect()
}

fn listed_versions(query: &ArtifactCoordinate, versions: Vec<String>) -> QueryOutcome<Vec<ArtifactMetadata>> {
    if versions.is_empty() {
        QueryOutcome::NotFound
    }
    else {
        QueryOutcome::Found(versions.into_iter()
            .map(|v| ArtifactMetadata::new(query.with_version(v)))
            .collect())
    }
}


/// Multiplexes reads over an ordered list of repositories. Must be initialized with [`init`]
///  before the first read.
///
/// [`init`]: VirtualRepositoryReader::init
pub struct VirtualRepositoryReader {
    version_cache: Arc<VersionCache>,
    injected_metadata_cache: Option<Arc<dyn MetadataCache>>,
    comparator: VersionComparator,
    write_back_enabled: bool,
    state: OnceLock<ReaderState>,
}
impl VirtualRepositoryReader {
    pub fn new(version_cache: Arc<VersionCache>) -> VirtualRepositoryReader {
        VirtualRepositoryReader {
            version_cache,
            injected_metadata_cache: None,
            comparator: VersionComparator::default(),
            write_back_enabled: true,
            state: OnceLock::new(),
        }
    }

    /// replaces the file based cache that is otherwise created below the write-back repository
    pub fn with_metadata_cache(mut self, metadata_cache: Arc<dyn MetadataCache>) -> VirtualRepositoryReader {
        self.injected_metadata_cache = Some(metadata_cache);
        self
    }

    pub fn with_comparator(mut self, comparator: VersionComparator) -> VirtualRepositoryReader {
        self.comparator = comparator;
        self
    }

    pub fn with_write_back(mut self, write_back: bool) -> VirtualRepositoryReader {
        self.write_back_enabled = write_back;
        self
    }

    /// Idempotent for the same repository list. Calling it again with a different list is an
    ///  error rather than a silent reconfiguration.
    pub fn init(&self, repositories: Vec<Repository>) -> Result<(), ReaderError> {
        let requested: Vec<RepositoryId> = repositories.iter().map(|r| r.id().clone()).collect();

        if self.state.get().is_none() {
            let state = self.create_state(repositories, requested.clone())?;
            // NB: a concurrent init may have won the race, in which case its state is checked below
            let _ = self.state.set(state);
        }

        let state = self.state()?;
        if state.configured != requested {
            return Err(ReaderError::InitMismatch {
                existing: state.configured.clone(),
                requested,
            });
        }
        Ok(())
    }

    fn create_state(&self, repositories: Vec<Repository>, configured: Vec<RepositoryId>) -> Result<ReaderState, ReaderError> {
        let (local, remote): (Vec<Repository>, Vec<Repository>) = repositories.iter()
            .filter(|r| r.is_readable())
            .cloned()
            .partition(|r| r.is_local());
        if local.is_empty() && remote.is_empty() {
            return Err(ReaderError::NoRepositories(configured));
        }

        let write_back = repositories.iter()
            .find(|r| r.is_local() && r.is_writeable())
            .cloned();

        let metadata_cache = match (&self.injected_metadata_cache, &write_back) {
            (Some(injected), _) => Some(injected.clone()),
            (None, Some(Repository::Local(target))) => {
                let cache: Arc<dyn MetadataCache> = Arc::new(FsMetadataCache::new(target.root().join(METADATA_CACHE_DIR)));
                Some(cache)
            }
            _ => None,
        };

        debug!("virtual repository reader: local {:?}, remote {:?}, write-back {:?}", local, remote, write_back);

        Ok(ReaderState {
            fingerprint: configured.iter().map(|id| id.0.as_str()).collect::<Vec<_>>().join(","),
            configured,
            repositories: local.into_iter().chain(remote).collect(),
            write_back,
            metadata_cache,
        })
    }

    fn state(&self) -> Result<&ReaderState, ReaderError> {
        self.state.get().ok_or(ReaderError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    /// the readable repositories in the order they are asked
    pub fn repositories(&self) -> Result<&[Repository], ReaderError> {
        Ok(&self.state()?.repositories)
    }

    pub fn write_back_target(&self) -> Result<Option<&Repository>, ReaderError> {
        Ok(self.state()?.write_back.as_ref())
    }

    pub fn comparator(&self) -> &VersionComparator {
        &self.comparator
    }

    pub fn version_cache(&self) -> &Arc<VersionCache> {
        &self.version_cache
    }

    /// The versions matching each query, ascending. A virtual query (LATEST, RELEASE, X-SNAPSHOT)
    ///  yields only the single best candidate across all repositories. Every returned version
    ///  is tracked by the repository that listed it.
    pub async fn read_versions(&self, queries: &[ArtifactCoordinate]) -> Result<ReadResults<Vec<ArtifactMetadata>>, ReaderError> {
        let state = self.state()?;
        if queries.is_empty() {
            return Err(ReaderError::EmptyQuery);
        }

        let mut results = ReadResults::new();
        let mut pending: Vec<PendingVersions> = Vec::new();
        let mut pending_index: HashMap<ArtifactCoordinate, usize> = HashMap::new();

        for query in queries {
            if results.get(query).is_some() || pending_index.contains_key(query) {
                continue;
            }
            if let Some(cached) = self.version_cache.get(&state.version_cache_key(query)) {
                results.insert(query.clone(), QueryOutcome::Found(redeclare(query, cached)));
                continue;
            }
            match VersionSpec::parse(&query.version) {
                Ok(spec) => {
                    pending_index.insert(query.clone(), pending.len());
                    pending.push(PendingVersions {
                        query: query.clone(),
                        spec,
                        candidates: Vec::new(),
                        misses: Misses::default(),
                        done: false,
                    });
                }
                Err(e) => results.insert(query.clone(), QueryOutcome::Failed(e)),
            }
        }

        for repository in &state.repositories {
            let mut to_read = Vec::new();
            for p in pending.iter_mut().filter(|p| !p.done && accepts(repository, &p.spec)) {
                match self.cached_versions(state, repository, &p.query).await {
                    Some(versions) => {
                        let outcome = listed_versions(&p.query, versions);
                        p.record(repository, outcome);
                    }
                    None => to_read.push(p.query.clone()),
                }
            }
            if to_read.is_empty() {
                continue;
            }

            trace!("asking {:?} for versions of {} queries", repository, to_read.len());
            for (query, outcome) in repository.reader().read_versions(&to_read).await {
                self.remember_versions(state, repository, &query, &outcome).await;
                if let Some(&i) = pending_index.get(&query) {
                    pending[i].record(repository, outcome);
                }
            }
        }

        for p in pending {
            let query = p.query.clone();
            let outcome = p.finish(&self.comparator);
            if let QueryOutcome::Found(versions) = &outcome {
                self.version_cache.put(state.version_cache_key(&query), versions.clone());
            }
            results.insert(query, outcome);
        }
        Ok(results.ordered_by(queries))
    }

    async fn cached_versions(&self, state: &ReaderState, repository: &Repository, query: &ArtifactCoordinate) -> Option<Vec<String>> {
        let cache = state.metadata_cache_for(repository)?;
        match cache.get_versions(repository.id(), query, repository.update_policy()).await {
            Ok(versions) => versions,
            Err(e) => {
                warn!("error reading metadata cache for {} in {}: {:#}", query, repository.id(), e);
                None
            }
        }
    }

    async fn remember_versions(&self, state: &ReaderState, repository: &Repository, query: &ArtifactCoordinate, outcome: &QueryOutcome<Vec<ArtifactMetadata>>) {
        let cache = match state.metadata_cache_for(repository) {
            Some(cache) => cache,
            None => return,
        };
        let versions: Vec<String> = match outcome {
            QueryOutcome::Found(versions) => versions.iter().map(|md| md.version().to_string()).collect(),
            QueryOutcome::NotFound => Vec::new(),
            QueryOutcome::Failed(_) => return,
        };
        if let Err(e) = cache.put_versions(repository.id(), query, &versions).await {
            warn!("error writing metadata cache for {} in {}: {:#}", query, repository.id(), e);
        }
    }

    /// The declared dependencies of a single artifact, see [`read_dependencies_batch`].
    ///
    /// [`read_dependencies_batch`]: VirtualRepositoryReader::read_dependencies_batch
    pub async fn read_dependencies(&self, query: &ArtifactMetadata) -> Result<QueryOutcome<Vec<ArtifactCoordinate>>, ReaderError> {
        let mut results = self.read_dependencies_batch(std::slice::from_ref(query)).await?;
        Ok(results.remove(&query.coordinate).unwrap_or(QueryOutcome::NotFound))
    }

    /// The declared dependencies of each queried artifact. A query tracked by a repository is
    ///  answered by that repository alone; others are looked up in all repositories in order,
    ///  and the first one that knows the artifact wins (even if it declares no dependencies).
    pub async fn read_dependencies_batch(&self, queries: &[ArtifactMetadata]) -> Result<ReadResults<Vec<ArtifactCoordinate>>, ReaderError> {
        let state = self.state()?;
        if queries.is_empty() {
            return Err(ReaderError::EmptyQuery);
        }

        let mut seen = HashSet::new();
        let mut tracked: BTreeMap<usize, Vec<ArtifactCoordinate>> = BTreeMap::new();
        let mut untracked = Vec::new();
        for md in queries {
            if !seen.insert(&md.coordinate) {
                continue;
            }
            match md.tracker.as_ref().and_then(|t| state.position(t)) {
                Some(i) => tracked.entry(i).or_default().push(md.coordinate.clone()),
                None => untracked.push(md.coordinate.clone()),
            }
        }

        let mut results = ReadResults::new();
        for (i, coordinates) in tracked {
            let repository = &state.repositories[i];
            trace!("{} dependency queries go to their tracker {}", coordinates.len(), repository.id());
            for (query, outcome) in self.scan_dependencies(state, std::slice::from_ref(repository), coordinates).await {
                results.insert(query, outcome);
            }
        }
        if !untracked.is_empty() {
            for (query, outcome) in self.scan_dependencies(state, &state.repositories, untracked).await {
                results.insert(query, outcome);
            }
        }

        let order: Vec<ArtifactCoordinate> = queries.iter().map(|md| md.coordinate.clone()).collect();
        Ok(results.ordered_by(&order))
    }

    async fn scan_dependencies(&self, state: &ReaderState, repositories: &[Repository], queries: Vec<ArtifactCoordinate>) -> ReadResults<Vec<ArtifactCoordinate>> {
        let mut results = ReadResults::new();
        let mut pending: Vec<(ArtifactCoordinate, Misses)> = queries.into_iter()
            .map(|q| (q, Misses::default()))
            .collect();

        for repository in repositories {
            if pending.is_empty() {
                break;
            }

            let cache = state.metadata_cache_for(repository);
            let mut to_read = Vec::new();
            for (query, _) in pending.iter().filter(|(q, _)| accepts_version(repository, q)) {
                let cached = match cache {
                    Some(cache) => cache.get_dependencies(repository.id(), query, repository.update_policy()).await
                        .unwrap_or_else(|e| {
                            warn!("error reading metadata cache for {} in {}: {:#}", query, repository.id(), e);
                            None
                        }),
                    None => None,
                };
                match cached {
                    Some(dependencies) => results.insert(query.clone(), QueryOutcome::Found(dependencies)),
                    None => to_read.push(query.clone()),
                }
            }

            if !to_read.is_empty() {
                trace!("asking {:?} for dependencies of {} artifacts", repository, to_read.len());
                let mut outcomes = repository.reader().read_dependencies(&to_read).await;
                for query in &to_read {
                    let misses = match pending.iter_mut().find(|(q, _)| q == query) {
                        Some((_, misses)) => misses,
                        None => continue,
                    };
                    match outcomes.remove(query) {
                        Some(QueryOutcome::Found(dependencies)) => {
                            if let Some(cache) = cache {
                                if let Err(e) = cache.put_dependencies(repository.id(), query, &dependencies).await {
                                    warn!("error writing metadata cache for {} in {}: {:#}", query, repository.id(), e);
                                }
                            }
                            results.insert(query.clone(), QueryOutcome::Found(dependencies));
                        }
                        Some(QueryOutcome::Failed(e)) => {
                            debug!("{} failed to read dependencies of {}: {:#}", repository.id(), query, e);
                            misses.failed(e);
                        }
                        Some(QueryOutcome::NotFound) | None => misses.not_found(),
                    }
                }
            }

            pending.retain(|(q, _)| results.get(q).is_none());
        }

        for (query, misses) in pending {
            let outcome = misses.into_outcome(&query);
            results.insert(query, outcome);
        }
        results
    }

    /// Fetches the artifacts. Tracked exact queries go straight to their tracker, ranges and
    ///  virtual versions are resolved to their best version first, and everything else is
    ///  looked up in all repositories in order. Artifacts coming from remote repositories are
    ///  written back (see [`write_back`]) unless that is switched off.
    ///
    /// Results are keyed by the original queries and follow their order.
    ///
    /// [`write_back`]: VirtualRepositoryReader::write_back
    pub async fn read_artifacts(&self, queries: &[ArtifactMetadata]) -> Result<ReadResults<Artifact>, ReaderError> {
        let state = self.state()?;
        if queries.is_empty() {
            return Err(ReaderError::EmptyQuery);
        }

        let mut results = ReadResults::new();
        // (original query, concrete coordinate)
        let mut tracked: BTreeMap<usize, Vec<(ArtifactCoordinate, ArtifactCoordinate)>> = BTreeMap::new();
        let mut untracked: Vec<(ArtifactCoordinate, ArtifactCoordinate)> = Vec::new();
        let mut to_resolve: Vec<ArtifactCoordinate> = Vec::new();

        for md in queries {
            let query = &md.coordinate;
            match VersionSpec::parse(&query.version) {
                Err(e) => results.insert(query.clone(), QueryOutcome::Failed(e)),
                Ok(VersionSpec::Exact(_)) => match md.tracker.as_ref().and_then(|t| state.position(t)) {
                    Some(i) => tracked.entry(i).or_default().push((query.clone(), query.clone())),
                    None => untracked.push((query.clone(), query.clone())),
                },
                Ok(_) => to_resolve.push(query.clone()),
            }
        }

        if !to_resolve.is_empty() {
            for (query, outcome) in self.read_versions(&to_resolve).await? {
                match outcome {
                    QueryOutcome::Found(versions) => {
                        let best = versions.into_iter()
                            .reduce(|best, md| match self.comparator.compare(md.version(), best.version()) {
                                Ordering::Greater => md,
                                _ => best,
                            });
                        match best {
                            Some(best) => {
                                trace!("fetching {} for {}", best.coordinate, query);
                                match best.tracker.as_ref().and_then(|t| state.position(t)) {
                                    Some(i) => tracked.entry(i).or_default().push((query, best.coordinate)),
                                    None => untracked.push((query, best.coordinate)),
                                }
                            }
                            None => results.insert(query, QueryOutcome::NotFound),
                        }
                    }
                    QueryOutcome::NotFound => results.insert(query, QueryOutcome::NotFound),
                    QueryOutcome::Failed(e) => results.insert(query, QueryOutcome::Failed(e)),
                }
            }
        }

        let mut fetched_remotely = Vec::new();

        for (i, pairs) in tracked {
            let repository = &state.repositories[i];
            let concrete: Vec<ArtifactCoordinate> = pairs.iter().map(|(_, c)| c.clone()).collect();
            let outcomes = repository.reader().read_artifacts(&concrete).await;
            for (query, coordinate) in pairs {
                match outcomes.get(&coordinate).and_then(|o| o.found()) {
                    Some(artifact) => {
                        let artifact = self.received(repository, artifact.clone(), &mut fetched_remotely);
                        results.insert(query, QueryOutcome::Found(artifact));
                    }
                    None => {
                        debug!("{} no longer has {}, looking elsewhere", repository.id(), coordinate);
                        untracked.push((query, coordinate));
                    }
                }
            }
        }

        let mut pending: Vec<(ArtifactCoordinate, ArtifactCoordinate, Misses)> = untracked.into_iter()
            .map(|(q, c)| (q, c, Misses::default()))
            .collect();
        for repository in &state.repositories {
            if pending.is_empty() {
                break;
            }

            let concrete: Vec<ArtifactCoordinate> = pending.iter()
                .filter(|(_, c, _)| accepts_version(repository, c))
                .map(|(_, c, _)| c.clone())
                .collect();
            if concrete.is_empty() {
                continue;
            }

            let outcomes = repository.reader().read_artifacts(&concrete).await;
            let mut still_pending = Vec::new();
            for (query, coordinate, mut misses) in pending {
                match outcomes.get(&coordinate) {
                    Some(QueryOutcome::Found(artifact)) => {
                        let artifact = self.received(repository, artifact.clone(), &mut fetched_remotely);
                        results.insert(query, QueryOutcome::Found(artifact));
                        continue;
                    }
                    Some(QueryOutcome::Failed(e)) => misses.failed(anyhow::anyhow!("{}: {:#}", repository.id(), e)),
                    Some(QueryOutcome::NotFound) => misses.not_found(),
                    None => {}
                }
                still_pending.push((query, coordinate, misses));
            }
            pending = still_pending;
        }
        for (query, _, misses) in pending {
            let outcome = misses.into_outcome(&query);
            results.insert(query, outcome);
        }

        if self.write_back_enabled && !fetched_remotely.is_empty() {
            if let Err(e) = self.write_back(&fetched_remotely).await {
                warn!("writing back {} artifacts failed: {:#}", fetched_remotely.len(), e);
            }
        }

        let order: Vec<ArtifactCoordinate> = queries.iter().map(|md| md.coordinate.clone()).collect();
        Ok(results.ordered_by(&order))
    }

    fn received(&self, repository: &Repository, mut artifact: Artifact, fetched_remotely: &mut Vec<Artifact>) -> Artifact {
        artifact.metadata.tracker = Some(repository.id().clone());
        if !repository.is_local() {
            fetched_remotely.push(artifact.clone());
        }
        artifact
    }

    /// Copies artifacts into the local write-back repository. Returns the number of artifacts
    ///  written, 0 if there is no write-back repository.
    pub async fn write_back(&self, artifacts: &[Artifact]) -> anyhow::Result<usize> {
        let state = self.state()?;
        let target = match &state.write_back {
            Some(target) => target,
            None => return Ok(0),
        };
        let writer = match target.writer() {
            Some(writer) => writer,
            None => return Ok(0),
        };

        let to_write: Vec<Artifact> = artifacts.iter()
            .filter(|a| a.metadata.tracker.as_ref() != Some(target.id()))
            .filter(|a| !a.metadata.coordinate.parsed_version().is_virtual())
            .cloned()
            .collect();
        if to_write.is_empty() {
            return Ok(0);
        }

        debug!("writing back {} artifacts to {}", to_write.len(), target.id());
        writer.write_artifacts(&to_write).await?;
        Ok(to_write.len())
    }
}

#[async_trait]
impl MetadataReader for VirtualRepositoryReader {
    async fn read_raw_data(&self, coordinate: &ArtifactCoordinate, classifier: Option<&str>, artifact_type: &str) -> anyhow::Result<Option<Bytes>> {
        let state = self.state()?;
        let mut misses = Misses::default();
        for repository in &state.repositories {
            match repository.reader().read_raw_data(coordinate, classifier, artifact_type).await {
                Ok(Some(data)) => return Ok(Some(data)),
                Ok(None) => misses.not_found(),
                Err(e) => misses.failed(e),
            }
        }
        match misses.into_outcome::<Bytes>(coordinate) {
            QueryOutcome::Failed(e) => Err(e),
            _ => Ok(None),
        }
    }
}
