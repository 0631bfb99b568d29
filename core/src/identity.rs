//! Persistent client identity.
//!
//! The client id is a UUID v4 generated on first run and persisted under the
//! agent's state directory; it never changes for the life of the
//! installation directory.

use crate::Result;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::warn;
use uuid::Uuid;

/// File name under the state directory holding the UUID.
pub const CLIENT_ID_FILE: &str = ".elchi_client_id";

static CLIENT_ID: OnceCell<String> = OnceCell::const_new();

/// Process-wide client id. Concurrent callers observe the same value; the
/// first caller reads or creates the on-disk file.
pub async fn get_or_create_client_id(state_dir: &Path) -> Result<String> {
    CLIENT_ID
        .get_or_try_init(|| async { read_or_generate(state_dir).await })
        .await
        .cloned()
}

/// Read the persisted client id, generating and persisting a fresh UUID v4
/// when the file is absent. Unlike [`get_or_create_client_id`] this is not
/// cached, which is what restart semantics (and tests) want.
pub async fn read_or_generate(state_dir: &Path) -> Result<String> {
    let path = state_dir.join(CLIENT_ID_FILE);

    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => {
            let id = contents.trim();
            if Uuid::parse_str(id).is_ok() {
                return Ok(id.to_string());
            }
            warn!(path = %path.display(), "client-id file is corrupt, regenerating");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    tokio::fs::create_dir_all(state_dir).await?;
    let id = Uuid::new_v4().to_string();
    write_private(&path, &id).await?;
    Ok(id)
}

/// Write via a temp file in the same directory, chmod 0600, then rename so
/// a crash never leaves a partial id behind.
async fn write_private(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let id = read_or_generate(dir.path()).await.unwrap();
        assert!(Uuid::parse_str(&id).is_ok());

        let on_disk = std::fs::read_to_string(dir.path().join(CLIENT_ID_FILE)).unwrap();
        assert_eq!(on_disk.trim(), id);
    }

    #[tokio::test]
    async fn test_stable_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let first = read_or_generate(dir.path()).await.unwrap();
        let second = read_or_generate(dir.path()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_file_mode_is_0600() {
        let dir = tempfile::tempdir().unwrap();
        read_or_generate(dir.path()).await.unwrap();
        let meta = std::fs::metadata(dir.path().join(CLIENT_ID_FILE)).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_file_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CLIENT_ID_FILE), "not-a-uuid").unwrap();
        let id = read_or_generate(dir.path()).await.unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_callers_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let a = tokio::spawn({
            let path = path.clone();
            async move { get_or_create_client_id(&path).await.unwrap() }
        });
        let b = tokio::spawn(async move { get_or_create_client_id(&path).await.unwrap() });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a, b);
    }
}
