//! Atomic config file writes with backup snapshots.

use elchi_core::Result;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// `<file>.backup` sibling path.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".backup");
    path.with_file_name(name)
}

/// File contents, or None when absent.
pub async fn read_if_exists(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via temp file + rename so readers never observe a partial file.
pub async fn write_atomic(path: &Path, contents: &str, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_file_name(format!(
        ".{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(mode)).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Snapshot the current file to `<file>.backup`. Returns None when the file
/// does not exist yet.
pub async fn snapshot(path: &Path) -> Result<Option<PathBuf>> {
    match read_if_exists(path).await? {
        Some(contents) => {
            let backup = backup_path(path);
            write_atomic(&backup, &contents, 0o600).await?;
            Ok(Some(backup))
        }
        None => Ok(None),
    }
}

/// Restore from a snapshot taken by [`snapshot`]. With no snapshot the file
/// is removed, returning the directory to its pre-call contents.
pub async fn restore(path: &Path, backup: Option<&Path>) -> Result<()> {
    match backup {
        Some(backup) => {
            let contents = tokio::fs::read_to_string(backup).await?;
            write_atomic(path, &contents, 0o600).await?;
        }
        None => match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}
