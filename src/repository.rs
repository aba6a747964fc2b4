//! The repository abstraction: a closed set of repository kinds behind capability traits.
//!
//! Every batched read returns a [`ReadResults`] with one [`QueryOutcome`] per query, so callers
//!  can tell "this repository does not have it" apart from "asking this repository failed".

pub mod local_repo;
pub mod memory_repo;
pub mod metadata_cache;
pub mod remote_repo;
pub mod version_cache;
pub mod virtual_reader;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::maven::coordinates::{ArtifactCoordinate, ArtifactMetadata};
use crate::maven::version::{MavenVersion, Quality, QualityRange, VersionComparator, VersionSpec};
use crate::repository::local_repo::LocalRepository;
use crate::repository::memory_repo::MemoryRepository;
use crate::repository::remote_repo::RemoteRepository;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(pub String);
impl Display for RepositoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl From<&str> for RepositoryId {
    fn from(value: &str) -> Self {
        RepositoryId(value.to_string())
    }
}

/// How long cached metadata of a remote repository stays fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    Always,
    #[default]
    Daily,
    Never,
    /// minutes
    Interval(u32),
}
impl UpdatePolicy {
    pub fn is_fresh(&self, stored: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            UpdatePolicy::Always => false,
            UpdatePolicy::Never => true,
            UpdatePolicy::Daily => stored.with_timezone(&Local).date_naive() == now.with_timezone(&Local).date_naive(),
            UpdatePolicy::Interval(minutes) => now.signed_duration_since(stored) < chrono::Duration::minutes(*minutes as i64),
        }
    }
}
impl FromStr for UpdatePolicy {
    type Err = anyhow::Error;

    /// `always`, `daily`, `never` or `interval:<minutes>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(UpdatePolicy::Always),
            "daily" => Ok(UpdatePolicy::Daily),
            "never" => Ok(UpdatePolicy::Never),
            other => match other.strip_prefix("interval:") {
                Some(minutes) => Ok(UpdatePolicy::Interval(minutes.parse()?)),
                None => Err(anyhow!("not a valid update policy: {:?}", s)),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPolicy {
    pub releases: bool,
    pub snapshots: bool,
    /// a virtual version found here needs no further repositories to be consulted
    pub sufficient: bool,
    /// the qualities admitted into version range results
    pub range_qualities: QualityRange,
    pub update_policy: UpdatePolicy,
}
impl Default for RepositoryPolicy {
    fn default() -> Self {
        RepositoryPolicy {
            releases: true,
            snapshots: true,
            sufficient: false,
            range_qualities: QualityRange::ReleasesOnly,
            update_policy: UpdatePolicy::Daily,
        }
    }
}
impl RepositoryPolicy {
    /// Whether the repository can contribute results of the given quality. LATEST and RELEASE
    ///  queries are answered by any repository that serves releases or snapshots.
    pub fn is_accepted_quality(&self, quality: Quality) -> bool {
        match quality {
            Quality::Release => self.releases,
            Quality::Snapshot | Quality::TimestampedSnapshot => self.snapshots,
            Quality::Latest => self.releases || self.snapshots,
            Quality::ReleaseMarker => self.releases,
        }
    }
}


#[derive(Debug)]
pub enum QueryOutcome<T> {
    Found(T),
    NotFound,
    Failed(anyhow::Error),
}
impl <T> QueryOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            QueryOutcome::Found(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_found(self) -> Option<T> {
        match self {
            QueryOutcome::Found(t) => Some(t),
            _ => None,
        }
    }

    pub fn from_result(result: anyhow::Result<Option<T>>) -> QueryOutcome<T> {
        match result {
            Ok(Some(t)) => QueryOutcome::Found(t),
            Ok(None) => QueryOutcome::NotFound,
            Err(e) => QueryOutcome::Failed(e),
        }
    }
}

/// Per-query outcomes of a batched read, in the order the queries were answered
#[derive(Debug)]
pub struct ReadResults<T> {
    /// removed entries leave a `None` behind, so indices stay valid
    entries: Vec<Option<(ArtifactCoordinate, QueryOutcome<T>)>>,
    index: HashMap<ArtifactCoordinate, usize>,
}
impl <T> Default for ReadResults<T> {
    fn default() -> Self {
        ReadResults {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}
impl <T> ReadResults<T> {
    pub fn new() -> ReadResults<T> {
        Default::default()
    }

    /// replaces an earlier outcome for the same query
    pub fn insert(&mut self, query: ArtifactCoordinate, outcome: QueryOutcome<T>) {
        match self.index.get(&query) {
            Some(&i) => self.entries[i] = Some((query, outcome)),
            None => {
                self.index.insert(query.clone(), self.entries.len());
                self.entries.push(Some((query, outcome)));
            }
        }
    }

    pub fn get(&self, query: &ArtifactCoordinate) -> Option<&QueryOutcome<T>> {
        let i = *self.index.get(query)?;
        self.entries[i].as_ref().map(|(_, o)| o)
    }

    pub fn remove(&mut self, query: &ArtifactCoordinate) -> Option<QueryOutcome<T>> {
        let i = self.index.remove(query)?;
        self.entries[i].take().map(|(_, o)| o)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactCoordinate, &QueryOutcome<T>)> {
        self.entries.iter().flatten().map(|(q, o)| (q, o))
    }

    /// re-orders the outcomes to follow `queries`; outcomes for other queries go last
    pub fn ordered_by(self, queries: &[ArtifactCoordinate]) -> ReadResults<T> {
        let mut remaining = self.entries;
        let mut result = ReadResults::new();
        for q in queries {
            if let Some(&i) = self.index.get(q) {
                if let Some((query, outcome)) = remaining[i].take() {
                    result.insert(query, outcome);
                }
            }
        }
        for (query, outcome) in remaining.into_iter().flatten() {
            result.insert(query, outcome);
        }
        result
    }
}
impl <T> IntoIterator for ReadResults<T> {
    type Item = (ArtifactCoordinate, QueryOutcome<T>);
    type IntoIter = std::iter::Flatten<std::vec::IntoIter<Option<(ArtifactCoordinate, QueryOutcome<T>)>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter().flatten()
    }
}


/// An artifact's binary together with its POM (if any)
#[derive(Debug, Clone)]
pub struct Artifact {
    pub metadata: ArtifactMetadata,
    pub data: Bytes,
    pub pom: Option<Bytes>,
}
impl Artifact {
    pub fn new(metadata: ArtifactMetadata, data: Bytes) -> Artifact {
        Artifact {
            metadata,
            data,
            pom: None,
        }
    }

    pub fn with_pom(mut self, pom: Bytes) -> Artifact {
        self.pom = Some(pom);
        self
    }
}


/// Raw access to a repository's documents, e.g. for a dependency processor to load POMs
#[async_trait]
pub trait MetadataReader: Send + Sync {
    /// `None` if the document does not exist
    async fn read_raw_data(&self, coordinate: &ArtifactCoordinate, classifier: Option<&str>, artifact_type: &str) -> anyhow::Result<Option<Bytes>>;
}

#[async_trait]
pub trait RepositoryReader: MetadataReader {
    /// the versions matching each query's version (exact, range or virtual), ascending
    async fn read_versions(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Vec<ArtifactMetadata>>;

    /// the declared dependencies of each queried version; an artifact without dependencies is
    ///  `Found` with an empty list
    async fn read_dependencies(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Vec<ArtifactCoordinate>>;

    async fn read_artifacts(&self, queries: &[ArtifactCoordinate]) -> ReadResults<Artifact>;
}

#[async_trait]
pub trait RepositoryWriter: Send + Sync {
    /// idempotent: writing the same artifact twice leaves the repository as after the first write
    async fn write_artifacts(&self, artifacts: &[Artifact]) -> anyhow::Result<()>;
}

/// Derives an artifact's declared dependencies from its metadata documents
#[async_trait]
pub trait DependencyProcessor: Send + Sync {
    async fn dependencies(&self, coordinate: &ArtifactCoordinate, reader: &dyn MetadataReader) -> anyhow::Result<Option<Vec<ArtifactCoordinate>>>;
}


#[derive(Clone)]
pub enum Repository {
    Local(Arc<LocalRepository>),
    Memory(Arc<MemoryRepository>),
    Remote(Arc<RemoteRepository>),
}
impl Repository {
    pub fn id(&self) -> &RepositoryId {
        match self {
            Repository::Local(r) => r.id(),
            Repository::Memory(r) => r.id(),
            Repository::Remote(r) => r.id(),
        }
    }

    pub fn policy(&self) -> &RepositoryPolicy {
        match self {
            Repository::Local(r) => r.policy(),
            Repository::Memory(r) => r.policy(),
            Repository::Remote(r) => r.policy(),
        }
    }

    pub fn is_local(&self) -> bool {
        match self {
            Repository::Local(_) => true,
            Repository::Memory(r) => r.is_local(),
            Repository::Remote(_) => false,
        }
    }

    pub fn is_readable(&self) -> bool {
        let policy = self.policy();
        policy.releases || policy.snapshots
    }

    pub fn is_writeable(&self) -> bool {
        match self {
            Repository::Local(_) => true,
            Repository::Memory(r) => r.is_writeable(),
            Repository::Remote(_) => false,
        }
    }

    pub fn is_accepted_quality(&self, quality: Quality) -> bool {
        self.policy().is_accepted_quality(quality)
    }

    pub fn version_range_quality_range(&self) -> QualityRange {
        self.policy().range_qualities
    }

    pub fn is_sufficient(&self) -> bool {
        self.policy().sufficient
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        self.policy().update_policy
    }

    pub fn reader(&self) -> &dyn RepositoryReader {
        match self {
            Repository::Local(r) => &**r,
            Repository::Memory(r) => &**r,
            Repository::Remote(r) => &**r,
        }
    }

    pub fn writer(&self) -> Option<&dyn RepositoryWriter> {
        match self {
            Repository::Local(r) => Some(&**r),
            Repository::Memory(r) if r.is_writeable() => Some(&**r),
            _ => None,
        }
    }
}
impl From<LocalRepository> for Repository {
    fn from(value: LocalRepository) -> Self {
        Repository::Local(Arc::new(value))
    }
}
impl From<MemoryRepository> for Repository {
    fn from(value: MemoryRepository) -> Self {
        Repository::Memory(Arc::new(value))
    }
}
impl From<RemoteRepository> for Repository {
    fn from(value: RemoteRepository) -> Self {
        Repository::Remote(Arc::new(value))
    }
}
impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Repository::Local(_) => "local",
            Repository::Memory(_) => "memory",
            Repository::Remote(_) => "remote",
        };
        write!(f, "{}({})", kind, self.id())
    }
}


/// Picks the versions out of a repository's listing that answer `query`, ascending.
///
/// * exact: the listed version(s) comparing equal
/// * range: contained versions; snapshots only if the policy's range qualities admit them
/// * LATEST: everything the policy accepts
/// * RELEASE: releases
/// * `X-SNAPSHOT`: the bare snapshot and all deployed builds of X
pub fn select_versions(query: &ArtifactCoordinate, available: &[String], policy: &RepositoryPolicy, comparator: &VersionComparator) -> anyhow::Result<Vec<String>> {
    let spec = VersionSpec::parse(&query.version)?;

    let mut result: Vec<String> = available.iter()
        .filter(|v| policy.is_accepted_quality(MavenVersion::parse(v).quality()))
        .filter(|v| {
            let version = MavenVersion::parse(v);
            match &spec {
                VersionSpec::Exact(exact) => comparator.compare(v, exact) == Ordering::Equal,
                VersionSpec::Range(range) => {
                    policy.range_qualities.contains(version.quality()) && range.contains(v, comparator)
                }
                VersionSpec::Virtual(MavenVersion::Latest) => true,
                VersionSpec::Virtual(MavenVersion::ReleaseMarker) => version.quality() == Quality::Release,
                VersionSpec::Virtual(MavenVersion::Snapshot { version: base, .. }) => {
                    matches!(&version, MavenVersion::Snapshot { version: v_base, .. } if v_base == base)
                }
                VersionSpec::Virtual(_) => false,
            }
        })
        .cloned()
        .collect();

    result.sort_by(|a, b| comparator.compare(a, b));
    result.dedup();
    Ok(result)
}

/// The repository-side answer to a version query, given the repository's listing for the GA
pub(crate) fn versions_outcome(query: &ArtifactCoordinate, listing: anyhow::Result<Option<Vec<String>>>, policy: &RepositoryPolicy, comparator: &VersionComparator) -> QueryOutcome<Vec<ArtifactMetadata>> {
    let available = match listing {
        Ok(Some(available)) => available,
        Ok(None) => return QueryOutcome::NotFound,
        Err(e) => return QueryOutcome::Failed(e),
    };

    match select_versions(query, &available, policy, comparator) {
        Ok(versions) if versions.is_empty() => QueryOutcome::NotFound,
        Ok(versions) => QueryOutcome::Found(versions.into_iter()
            .map(|v| ArtifactMetadata::new(query.with_version(v)))
            .collect()),
        Err(e) => QueryOutcome::Failed(e),
    }
}


#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;
    use crate::test_support::coord;

    fn listing() -> Vec<String> {
        ["1.0", "1.1", "1.5", "2.0", "2.1-SNAPSHOT", "2.1-20240101.120000-1", "2.1-20240102.120000-2", "1.5-rc1"]
            .iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case::exact("g:a:1.1", QualityRange::ReleasesOnly, vec!["1.1"])]
    #[case::exact_normalized("g:a:1.1.0", QualityRange::ReleasesOnly, vec!["1.1"])]
    #[case::exact_missing("g:a:3.0", QualityRange::ReleasesOnly, vec![])]
    #[case::range("g:a:[1.0,2.0)", QualityRange::ReleasesOnly, vec!["1.0", "1.1", "1.5-rc1", "1.5"])]
    #[case::range_without_snapshots("g:a:[2.0,)", QualityRange::ReleasesOnly, vec!["2.0"])]
    #[case::range_with_snapshots("g:a:[2.0,)", QualityRange::All, vec!["2.0", "2.1-SNAPSHOT", "2.1-20240101.120000-1", "2.1-20240102.120000-2"])]
    #[case::range_snapshots_only("g:a:[2.0,)", QualityRange::SnapshotsOnly, vec!["2.1-SNAPSHOT", "2.1-20240101.120000-1", "2.1-20240102.120000-2"])]
    #[case::latest("g:a:LATEST", QualityRange::ReleasesOnly, vec!["1.0", "1.1", "1.5-rc1", "1.5", "2.0", "2.1-SNAPSHOT", "2.1-20240101.120000-1", "2.1-20240102.120000-2"])]
    #[case::release("g:a:RELEASE", QualityRange::ReleasesOnly, vec!["1.0", "1.1", "1.5-rc1", "1.5", "2.0"])]
    #[case::snapshot("g:a:2.1-SNAPSHOT", QualityRange::ReleasesOnly, vec!["2.1-SNAPSHOT", "2.1-20240101.120000-1", "2.1-20240102.120000-2"])]
    fn test_select_versions(#[case] query: &str, #[case] range_qualities: QualityRange, #[case] expected: Vec<&str>) {
        let policy = RepositoryPolicy {
            range_qualities,
            ..Default::default()
        };
        let actual = select_versions(&coord(query), &listing(), &policy, &VersionComparator::default()).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_select_versions_release_only_repository() {
        let policy = RepositoryPolicy {
            snapshots: false,
            ..Default::default()
        };
        let actual = select_versions(&coord("g:a:LATEST"), &listing(), &policy, &VersionComparator::default()).unwrap();
        assert_eq!(actual, vec!["1.0", "1.1", "1.5-rc1", "1.5", "2.0"]);
        assert!(select_versions(&coord("g:a:2.1-SNAPSHOT"), &listing(), &policy, &VersionComparator::default()).unwrap().is_empty());
    }

    #[test]
    fn test_read_results_ordering() {
        let mut results: ReadResults<u32> = ReadResults::new();
        results.insert(coord("g:b:1"), QueryOutcome::Found(2));
        results.insert(coord("g:a:1"), QueryOutcome::NotFound);
        results.insert(coord("g:c:1"), QueryOutcome::Failed(anyhow!("boom")));
        results.insert(coord("g:b:1"), QueryOutcome::Found(3));

        assert_eq!(results.len(), 3);
        assert_eq!(results.get(&coord("g:b:1")).and_then(|o| o.found()), Some(&3));

        let ordered = results.ordered_by(&[coord("g:a:1"), coord("g:b:1")]);
        let keys: Vec<String> = ordered.iter().map(|(q, _)| q.gav()).collect();
        assert_eq!(keys, vec!["g:a:1", "g:b:1", "g:c:1"]);
        assert!(ordered.get(&coord("g:c:1")).unwrap().is_failed());
    }

    #[test]
    fn test_read_results_remove() {
        let mut results: ReadResults<u32> = ReadResults::new();
        results.insert(coord("g:a:1"), QueryOutcome::Found(1));
        results.insert(coord("g:b:1"), QueryOutcome::Found(2));
        results.insert(coord("g:c:1"), QueryOutcome::Found(3));

        assert!(results.remove(&coord("g:b:1")).unwrap().is_found());
        assert_eq!(results.get(&coord("g:c:1")).and_then(|o| o.found()), Some(&3));
        assert!(results.get(&coord("g:b:1")).is_none());
        assert!(results.remove(&coord("g:b:1")).is_none());
        assert_eq!(results.len(), 2);

        results.insert(coord("g:b:1"), QueryOutcome::Found(4));
        results.insert(coord("g:d:1"), QueryOutcome::NotFound);
        assert!(results.remove(&coord("g:a:1")).is_some());

        let keys: Vec<String> = results.iter().map(|(q, _)| q.gav()).collect();
        assert_eq!(keys, vec!["g:c:1", "g:b:1", "g:d:1"]);
        assert_eq!(results.len(), 3);

        let ordered = results.ordered_by(&[coord("g:d:1"), coord("g:a:1")]);
        let drained: Vec<String> = ordered.into_iter().map(|(q, _)| q.gav()).collect();
        assert_eq!(drained, vec!["g:d:1", "g:c:1", "g:b:1"]);
    }

    #[rstest]
    #[case::always("always", UpdatePolicy::Always)]
    #[case::daily("daily", UpdatePolicy::Daily)]
    #[case::never("never", UpdatePolicy::Never)]
    #[case::interval("interval:30", UpdatePolicy::Interval(30))]
    fn test_parse_update_policy(#[case] s: &str, #[case] expected: UpdatePolicy) {
        assert_eq!(s.parse::<UpdatePolicy>().unwrap(), expected);
    }

    #[test]
    fn test_update_policy_freshness() {
        let now = Utc::now();
        let ten_minutes_ago = now - chrono::Duration::minutes(10);
        assert!(!UpdatePolicy::Always.is_fresh(now, now));
        assert!(UpdatePolicy::Never.is_fresh(now - chrono::Duration::days(400), now));
        assert!(UpdatePolicy::Interval(30).is_fresh(ten_minutes_ago, now));
        assert!(!UpdatePolicy::Interval(5).is_fresh(ten_minutes_ago, now));
        assert!(!UpdatePolicy::Daily.is_fresh(now - chrono::Duration::days(2), now));
        assert!("weekly".parse::<UpdatePolicy>().is_err());
    }
}
