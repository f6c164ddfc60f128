use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
#[error("cannot create directory {path:?}")]
pub struct DirectoryError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Create `path` and any missing parents. Succeeds if it already exists as a directory.
pub async fn ensure_directory(path: &Path) -> Result<(), DirectoryError> {
    match tokio::fs::create_dir_all(path).await {
        Ok(()) => Ok(()),
        // create_dir_all tolerates races on intermediate components but not on the leaf
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(source) => Err(DirectoryError {
            path: path.to_owned(),
            source,
        }),
    }
}
