//! JSON document helpers shared by every file-backed store.

use std::{error::Error, io::ErrorKind, path::Path};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::fs;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by the file-backed stores (state snapshot, lock file, song index, settings).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The file could not be read or written.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was attempted.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The file exists but is not the expected JSON.
    #[error("malformed document at {path}: {source}")]
    Malformed {
        /// Offending file.
        path: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Wrap an IO failure that happened while touching `path`.
    pub fn io(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::unavailable(format!("failed to {action} {}", path.display()), source)
    }

    /// Wrap a JSON (de)serialization failure for the document at `path`.
    pub fn malformed(path: &Path, source: serde_json::Error) -> Self {
        StorageError::Malformed {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Read and decode a JSON document, returning `None` when the file does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::io("read", path, err)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| StorageError::malformed(path, err))
}

/// Write `value` as pretty JSON next to `path` and atomically rename it into place.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|err| StorageError::malformed(path, err))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| StorageError::io("create directory for", path, err))?;
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, json)
        .await
        .map_err(|err| StorageError::io("write", &tmp_path, err))?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|err| StorageError::io("replace", path, err))
}
