//! Removal of staging files left behind by crashed processes

use hubcas_errors::Error;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::fs;

/// Suffix of every staging file name
pub const STAGING_SUFFIX: &str = ".hubcas-partial";

/// Whether a directory entry name belongs to a staging file
#[must_use]
pub fn is_staging_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

/// Delete staging files in `dir` last modified at least `grace` ago.
///
/// Younger files may belong to a transfer still running in another process.
/// A missing directory sweeps nothing.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a stale file
/// cannot be removed.
pub async fn sweep_orphaned_staging(dir: &Path, grace: Duration) -> Result<usize, Error> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(Error::io_with_path(&e, dir)),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::io_with_path(&e, dir))?
    {
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_staging_file) {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < grace {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed orphaned staging file");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io_with_path(&e, &path)),
        }
    }

    Ok(removed)
}
