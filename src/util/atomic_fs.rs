use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::anyhow;
use tokio::fs::{create_dir_all, remove_file, rename, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};
use uuid::Uuid;

/// Writes a file so that readers see either the previous content or the complete new content:
///  the data goes to a uniquely named sibling first, which is then renamed into place.
pub async fn write_atomically(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path.parent()
        .ok_or_else(|| anyhow!("no parent directory for {}", path.display()))?;
    create_dir_all(parent).await?;

    let file_name = path.file_name()
        .ok_or_else(|| anyhow!("no file name in {}", path.display()))?
        .to_string_lossy();
    let temp_path = parent.join(format!(".{}.{}.writing", file_name, Uuid::new_v4().as_hyphenated()));

    trace!("writing {} via {}", path.display(), temp_path.display());

    let result = async {
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        drop(file);
        rename(&temp_path, path).await?;
        anyhow::Ok(())
    }.await;

    if result.is_err() {
        if let Err(e) = remove_file(&temp_path).await {
            trace!("could not clean up {}: {}", temp_path.display(), e);
        }
    }
    result
}

/// An exclusive lock represented by a lock file that is created with `create_new`. Lock files
///  older than the configured timeout are considered stale (left behind by a crashed process)
///  and broken.
pub struct FileLock {
    path: PathBuf,
}
impl FileLock {
    pub async fn acquire(path: PathBuf, stale_after: Duration) -> anyhow::Result<FileLock> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }

        let mut delay = Duration::from_millis(2);
        loop {
            match OpenOptions::new().create_new(true).write(true).open(&path).await {
                Ok(_) => {
                    trace!("acquired lock {}", path.display());
                    return Ok(FileLock { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path, stale_after).await {
                        warn!("breaking stale lock {}", path.display());
                        // NB: a concurrent breaker may have removed it already
                        let _ = remove_file(&path).await;
                        continue;
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_millis(100));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn is_stale(path: &Path, stale_after: Duration) -> bool {
        match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => SystemTime::now().duration_since(modified)
                .map(|age| age > stale_after)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn release(self) -> anyhow::Result<()> {
        trace!("releasing lock {}", self.path.display());
        remove_file(&self.path).await?;
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use super::*;

    #[tokio::test]
    async fn test_write_atomically_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/file.txt");

        write_atomically(&path, b"first").await.unwrap();
        write_atomically(&path, b"second").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");
        let mut entries = tokio::fs::read_dir(path.parent().unwrap()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("x.lock");
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock_path = lock_path.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let lock = FileLock::acquire(lock_path, Duration::from_secs(60)).await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                lock.release().await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("x.lock");
        tokio::fs::write(&lock_path, b"").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let lock = FileLock::acquire(lock_path.clone(), Duration::from_millis(1)).await.unwrap();
        lock.release().await.unwrap();
        assert!(!lock_path.exists());
    }
}
