use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::try_exists;
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::maven::coordinates::ArtifactCoordinate;
use crate::maven::paths::ga_directory;
use crate::maven::version::{MavenVersion, Quality};
use crate::repository::{RepositoryId, UpdatePolicy};
use crate::util::atomic_fs::write_atomically;

const CACHE_FILE: &str = "resolver-status.json";

/// Remembers what remote repositories answered, so that they need not be asked again while the
///  answer is fresh according to the repository's update policy.
#[async_trait]
pub trait MetadataCache: Send + Sync {
    async fn get_versions(&self, repository: &RepositoryId, query: &ArtifactCoordinate, update_policy: UpdatePolicy) -> anyhow::Result<Option<Vec<String>>>;
    async fn put_versions(&self, repository: &RepositoryId, query: &ArtifactCoordinate, versions: &[String]) -> anyhow::Result<()>;

    async fn get_dependencies(&self, repository: &RepositoryId, coordinate: &ArtifactCoordinate, update_policy: UpdatePolicy) -> anyhow::Result<Option<Vec<ArtifactCoordinate>>>;
    async fn put_dependencies(&self, repository: &RepositoryId, coordinate: &ArtifactCoordinate, dependencies: &[ArtifactCoordinate]) -> anyhow::Result<()>;
}

#[derive(Serialize, Deserialize)]
struct TimedEntry<T> {
    /// millis since the epoch
    stored: i64,
    value: T,
}
impl <T> TimedEntry<T> {
    fn stored(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.stored).single()
    }
}

#[derive(Serialize, Deserialize, Default)]
struct CacheFile {
    #[serde(default)]
    versions: BTreeMap<String, TimedEntry<Vec<String>>>,
    #[serde(default)]
    dependencies: BTreeMap<String, TimedEntry<Vec<ArtifactCoordinate>>>,
}

/// JSON files per repository and GA below a root directory
pub struct FsMetadataCache {
    root: PathBuf,
    write_lock: Mutex<()>,
}
impl FsMetadataCache {
    pub fn new(root: PathBuf) -> FsMetadataCache {
        FsMetadataCache {
            root,
            write_lock: Mutex::new(()),
        }
    }

    fn file_path(&self, repository: &RepositoryId, coordinate: &ArtifactCoordinate) -> PathBuf {
        self.root
            .join(sanitize(&repository.0))
            .join(ga_directory(coordinate))
            .join(CACHE_FILE)
    }

    async fn read_file(&self, repository: &RepositoryId, coordinate: &ArtifactCoordinate) -> anyhow::Result<CacheFile> {
        let path = self.file_path(repository, coordinate);
        if !try_exists(&path).await? {
            return Ok(CacheFile::default());
        }
        match serde_json::from_slice(&tokio::fs::read(&path).await?) {
            Ok(file) => Ok(file),
            Err(e) => {
                warn!("discarding unreadable metadata cache file {}: {}", path.display(), e);
                Ok(CacheFile::default())
            }
        }
    }

    async fn update_file(&self, repository: &RepositoryId, coordinate: &ArtifactCoordinate, f: impl FnOnce(&mut CacheFile) + Send) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file(repository, coordinate).await?;
        f(&mut file);
        write_atomically(&self.file_path(repository, coordinate), &serde_json::to_vec_pretty(&file)?).await
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

fn is_fresh<T>(entry: &TimedEntry<T>, update_policy: UpdatePolicy) -> bool {
    match entry.stored() {
        Some(stored) => update_policy.is_fresh(stored, Utc::now()),
        None => false,
    }
}

#[async_trait]
impl MetadataCache for FsMetadataCache {
    async fn get_versions(&self, repository: &RepositoryId, query: &ArtifactCoordinate, update_policy: UpdatePolicy) -> anyhow::Result<Option<Vec<String>>> {
        let file = self.read_file(repository, query).await?;
        let result = file.versions.get(&query.version)
            .filter(|e| is_fresh(e, update_policy))
            .map(|e| e.value.clone());
        trace!("metadata cache {} for versions {} in {}", if result.is_some() { "hit" } else { "miss" }, query, repository);
        Ok(result)
    }

    async fn put_versions(&self, repository: &RepositoryId, query: &ArtifactCoordinate, versions: &[String]) -> anyhow::Result<()> {
        let entry = TimedEntry { stored: Utc::now().timestamp_millis(), value: versions.to_vec() };
        let key = query.version.clone();
        self.update_file(repository, query, move |file| {
            file.versions.insert(key, entry);
        }).await
    }

    async fn get_dependencies(&self, repository: &RepositoryId, coordinate: &ArtifactCoordinate, update_policy: UpdatePolicy) -> anyhow::Result<Option<Vec<ArtifactCoordinate>>> {
        // a released version's dependencies never change
        let update_policy = if MavenVersion::parse(&coordinate.version).quality() == Quality::Release {
            UpdatePolicy::Never
        }
        else {
            update_policy
        };

        let file = self.read_file(repository, coordinate).await?;
        Ok(file.dependencies.get(&coordinate.version)
            .filter(|e| is_fresh(e, update_policy))
            .map(|e| e.value.clone()))
    }

    async fn put_dependencies(&self, repository: &RepositoryId, coordinate: &ArtifactCoordinate, dependencies: &[ArtifactCoordinate]) -> anyhow::Result<()> {
        let entry = TimedEntry { stored: Utc::now().timestamp_millis(), value: dependencies.to_vec() };
        let key = coordinate.version.clone();
        self.update_file(repository, coordinate, move |file| {
            file.dependencies.insert(key, entry);
        }).await
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::coord;

    #[tokio::test]
    async fn test_versions_round_trip_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsMetadataCache::new(dir.path().to_path_buf());
        let repo = RepositoryId("central".to_string());
        let query = coord("g:a:[1.0,2.0)");

        assert!(cache.get_versions(&repo, &query, UpdatePolicy::Never).await.unwrap().is_none());
        cache.put_versions(&repo, &query, &["1.0".to_string(), "1.5".to_string()]).await.unwrap();

        assert_eq!(cache.get_versions(&repo, &query, UpdatePolicy::Daily).await.unwrap(), Some(vec!["1.0".to_string(), "1.5".to_string()]));
        assert!(cache.get_versions(&repo, &query, UpdatePolicy::Always).await.unwrap().is_none());
        assert!(cache.get_versions(&repo, &coord("g:a:LATEST"), UpdatePolicy::Never).await.unwrap().is_none());
        assert!(cache.get_versions(&RepositoryId("other".to_string()), &query, UpdatePolicy::Never).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_dependencies_never_expire() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsMetadataCache::new(dir.path().to_path_buf());
        let repo = RepositoryId("central".to_string());

        cache.put_dependencies(&repo, &coord("g:a:1.0"), &[coord("g:b:2.0")]).await.unwrap();
        cache.put_dependencies(&repo, &coord("g:a:1.1-SNAPSHOT"), &[coord("g:b:2.1")]).await.unwrap();

        assert_eq!(cache.get_dependencies(&repo, &coord("g:a:1.0"), UpdatePolicy::Always).await.unwrap(), Some(vec![coord("g:b:2.0")]));
        assert!(cache.get_dependencies(&repo, &coord("g:a:1.1-SNAPSHOT"), UpdatePolicy::Always).await.unwrap().is_none());
        assert_eq!(cache.get_dependencies(&repo, &coord("g:a:1.1-SNAPSHOT"), UpdatePolicy::Daily).await.unwrap(), Some(vec![coord("g:b:2.1")]));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FsMetadataCache::new(dir.path().to_path_buf());
        let repo = RepositoryId("central".to_string());
        let path = cache.file_path(&repo, &coord("g:a:1.0"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();

        assert!(cache.get_dependencies(&repo, &coord("g:a:1.0"), UpdatePolicy::Never).await.unwrap().is_none());
        cache.put_dependencies(&repo, &coord("g:a:1.0"), &[]).await.unwrap();
        assert_eq!(cache.get_dependencies(&repo, &coord("g:a:1.0"), UpdatePolicy::Never).await.unwrap(), Some(vec![]));
    }
}
