use std::{collections::HashMap, io::ErrorKind, path::{Path, PathBuf}, sync::Arc};

use async_trait::async_trait;
use tokio::{
    fs,
    sync::{mpsc, oneshot, RwLock},
};
use tracing::{debug, error, warn};

use super::PreferenceStore;
use crate::errors::SettingsError;

type Entries = Arc<RwLock<HashMap<String, String>>>;

enum Commit {
    Write,
    Flush(oneshot::Sender<Result<(), SettingsError>>),
}

/// File-backed preference store.
///
/// Keeps every `key -> json text` entry in memory and persists the whole map
/// as one JSON object. Changes are visible to `get` as soon as `set`/`delete`
/// return; a background task coalesces them and rewrites the file. Dropping
/// the store lets that task finish the pending commits.
pub struct JsonFilePreferenceStore {
    entries: Entries,
    file_path: PathBuf,
    commits: mpsc::UnboundedSender<Commit>,
}

impl JsonFilePreferenceStore {
    /// Open the store at `path`. Creates the file with an empty map if missing.
    /// Must be called from within a tokio runtime.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, SettingsError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SettingsError::Store(format!("{}: {e}", parent.display())))?;
        }

        let map: HashMap<String, String> = match fs::read(&file_path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SettingsError::Store(format!("{}: {e}", file_path.display())))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let empty: HashMap<String, String> = HashMap::new();
                fs::write(&file_path, serde_json::to_vec(&empty).map_err(SettingsError::store)?)
                    .await
                    .map_err(SettingsError::store)?;
                empty
            }
            Err(e) => return Err(SettingsError::Store(format!("{}: {e}", file_path.display()))),
        };
        debug!(path = %file_path.display(), entries = map.len(), "preference file opened");

        let entries: Entries = Arc::new(RwLock::new(map));
        let (commits, rx) = mpsc::unbounded_channel();
        tokio::spawn(commit_loop(Arc::clone(&entries), file_path.clone(), rx));

        Ok(Arc::new(Self { entries, file_path, commits }))
    }

    pub fn path(&self) -> &Path { &self.file_path }

    /// List all keys currently held by the store.
    pub async fn keys(&self) -> Vec<String> {
        let map = self.entries.read().await;
        map.keys().cloned().collect()
    }

    fn schedule(&self, commit: Commit) -> bool {
        if self.commits.send(commit).is_err() {
            error!(path = %self.file_path.display(), "preference commit task is gone; change not persisted");
            return false;
        }
        true
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn get(&self, key: &str) -> Option<String> {
        let map = self.entries.read().await;
        map.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        let mut map = self.entries.write().await;
        map.insert(key.to_owned(), value);
        drop(map);
        self.schedule(Commit::Write);
    }

    async fn delete(&self, key: &str) {
        let mut map = self.entries.write().await;
        let existed = map.remove(key).is_some();
        drop(map);
        if existed {
            self.schedule(Commit::Write);
        }
    }

    async fn flush(&self) -> Result<(), SettingsError> {
        let (tx, rx) = oneshot::channel();
        if !self.schedule(Commit::Flush(tx)) {
            return Err(SettingsError::Store("commit task stopped".into()));
        }
        rx.await.map_err(|_| SettingsError::Store("commit task stopped".into()))?
    }
}

/// Drain queued commits in batches. A batch rewrites the file once if it holds
/// any write (or an earlier write failed), then answers its flush waiters.
async fn commit_loop(entries: Entries, file_path: PathBuf, mut rx: mpsc::UnboundedReceiver<Commit>) {
    let mut pending = false;
    let mut last: Result<(), String> = Ok(());

    while let Some(first) = rx.recv().await {
        let mut waiters = Vec::new();
        let mut next = Some(first);
        while let Some(commit) = next {
            match commit {
                Commit::Write => pending = true,
                Commit::Flush(tx) => waiters.push(tx),
            }
            next = rx.try_recv().ok();
        }

        if pending {
            last = persist(&entries, &file_path).await;
            match &last {
                Ok(()) => pending = false,
                Err(e) => warn!(path = %file_path.display(), error = %e, "preference commit failed"),
            }
        }

        for tx in waiters {
            let _ = tx.send(last.clone().map_err(SettingsError::Store));
        }
    }
    debug!(path = %file_path.display(), "preference commit task stopped");
}

async fn persist(entries: &Entries, file_path: &Path) -> Result<(), String> {
    let data = {
        let map = entries.read().await;
        serde_json::to_vec(&*map).map_err(|e| e.to_string())?
    };
    let mut tmp = file_path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, data).await.map_err(|e| e.to_string())?;
    fs::rename(&tmp, file_path).await.map_err(|e| e.to_string())?;
    debug!(path = %file_path.display(), "preference file committed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("settings_prefs_{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn json_file_store_crud_persists() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let store = JsonFilePreferenceStore::open(&tmp).await?;

        // initially empty
        assert!(store.keys().await.is_empty());

        store.set("a", "1".into()).await;
        store.set("b", "\"two\"".into()).await;
        // visible before commit
        assert_eq!(store.get("a").await.as_deref(), Some("1"));

        store.delete("b").await;
        store.flush().await?;

        let reloaded = JsonFilePreferenceStore::open(&tmp).await?;
        assert_eq!(reloaded.keys().await, vec!["a".to_string()]);
        assert_eq!(reloaded.get("a").await.as_deref(), Some("1"));
        assert!(reloaded.get("b").await.is_none());

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_created_empty() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("settings_dir_{}", Uuid::new_v4()));
        let path = dir.join("nested").join("prefs.json");
        let store = JsonFilePreferenceStore::open(&path).await?;
        assert_eq!(store.path(), path.as_path());
        assert!(store.keys().await.is_empty());
        assert_eq!(tokio::fs::read_to_string(&path).await?, "{}");

        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn unusable_parent_directory_is_reported() -> Result<(), anyhow::Error> {
        let blocker = tmp_path();
        tokio::fs::write(&blocker, b"not a directory").await?;
        let res = JsonFilePreferenceStore::open(blocker.join("prefs.json")).await;
        match res {
            Err(SettingsError::Store(msg)) => assert!(msg.contains(&*blocker.to_string_lossy())),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("store opened under a regular file"),
        }

        let _ = tokio::fs::remove_file(&blocker).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_is_rejected() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        tokio::fs::write(&tmp, b"[1, 2").await?;
        let res = JsonFilePreferenceStore::open(&tmp).await;
        assert!(matches!(res, Err(SettingsError::Store(_))));

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn dropped_store_still_commits() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let store = JsonFilePreferenceStore::open(&tmp).await?;
        store.set("k", "true".into()).await;
        store.flush().await?;
        store.set("k", "false".into()).await;
        drop(store);

        let mut seen = None;
        for _ in 0..50 {
            let reloaded = JsonFilePreferenceStore::open(&tmp).await?;
            seen = reloaded.get("k").await;
            if seen.as_deref() == Some("false") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(seen.as_deref(), Some("false"));

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn flush_without_changes_is_ok() -> Result<(), anyhow::Error> {
        let tmp = tmp_path();
        let store = JsonFilePreferenceStore::open(&tmp).await?;
        store.delete("never-set").await;
        store.flush().await?;
        store.flush().await?;

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }
}
