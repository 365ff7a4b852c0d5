//! File-backed session storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tg_bridge_core::{SessionKey, SessionStore, StorageError};

/// One `<digest>.session` file per account under a fixed directory.
///
/// Writes go through a sibling temp file and a rename: atomic-enough for
/// single-writer use, no concurrent-writer guarantee.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(format!("{key}.session"))
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            tokio::fs::set_permissions(&self.dir, perms).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, key: &SessionKey) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no session file");
                Err(StorageError::NotFound)
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn save(&self, key: &SessionKey, data: &[u8]) -> Result<(), StorageError> {
        self.ensure_dir().await?;
        let path = self.path_for(key);
        let tmp = tmp_path(&path);
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "session saved");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_store() -> FileSessionStore {
        let dir = std::env::temp_dir().join(format!("tg-bridge-test-{}", uuid::Uuid::new_v4()));
        FileSessionStore::new(dir)
    }

    #[tokio::test]
    async fn load_unwritten_key_is_not_found() {
        let store = scratch_store();
        let key = SessionKey::for_account("+15550000001");
        assert!(matches!(
            store.load(&key).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = scratch_store();
        let key = SessionKey::for_account("+15550000002");
        let blob = b"opaque session bytes \x00\x01\x02".to_vec();

        store.save(&key, &blob).await.unwrap();
        let loaded = store.load(&key).await.unwrap();
        assert_eq!(loaded, blob);
    }

    #[tokio::test]
    async fn save_overwrites_previous_blob() {
        let store = scratch_store();
        let key = SessionKey::for_account("+15550000003");

        store.save(&key, b"first").await.unwrap();
        store.save(&key, b"second").await.unwrap();
        assert_eq!(store.load(&key).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn keys_do_not_collide() {
        let store = scratch_store();
        let a = SessionKey::for_account("+15550000004");
        let b = SessionKey::for_account("+15550000005");

        store.save(&a, b"aaa").await.unwrap();
        store.save(&b, b"bbb").await.unwrap();
        assert_eq!(store.load(&a).await.unwrap(), b"aaa");
        assert_eq!(store.load(&b).await.unwrap(), b"bbb");
    }
}
