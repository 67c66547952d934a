//! Offloading of oversized payloads.
//!
//! A `json_dump` value never goes into the log line. It is written to a
//! [`PayloadStore`] and only the returned reference is logged.

use chrono::Local;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::normalize::Clock;

/// Reference logged when a payload could not be archived.
pub const UNAVAILABLE_REF: &str = "NA";

/// Error type returned by [`PayloadStore`] implementations.
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("archive I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Write-payload-return-reference protocol of the archival store.
pub trait PayloadStore: Send + Sync {
    /// Persist `data` under the date `bucket` (`YYYYMMDD`) with the given
    /// unique `id`, returning a reference that locates it.
    fn put(&self, bucket: &str, id: &str, data: &[u8]) -> Result<String, ArchiveError>;
}

/// Stores payloads as `<root>/<YYYYMMDD>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FsPayloadStore {
    root: PathBuf,
}

impl FsPayloadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsPayloadStore { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl PayloadStore for FsPayloadStore {
    fn put(&self, bucket: &str, id: &str, data: &[u8]) -> Result<String, ArchiveError> {
        let dir = self.root.join(bucket);
        // create_dir_all treats an existing directory as success, so racing
        // archive calls for the same day are fine.
        fs::create_dir_all(&dir).map_err(|source| ArchiveError::Io { path: dir.clone(), source })?;

        let path = dir.join(format!("{id}.json"));
        fs::write(&path, data).map_err(|source| ArchiveError::Io { path: path.clone(), source })?;

        let path = std::path::absolute(&path).unwrap_or(path);
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Best-effort archiver in front of a [`PayloadStore`].
#[derive(Clone)]
pub struct PayloadArchiver {
    store: Arc<dyn PayloadStore>,
    clock: Clock,
}

impl PayloadArchiver {
    pub fn new(store: Arc<dyn PayloadStore>) -> Self {
        PayloadArchiver { store, clock: Arc::new(Local::now) }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Archive `data` and return its reference, or [`UNAVAILABLE_REF`].
    ///
    /// Strings are written verbatim; other values as compact JSON. Errors
    /// are reported as a warning and never returned: the payload is lost.
    pub fn archive(&self, data: &serde_json::Value) -> String {
        match self.try_archive(data) {
            Ok(reference) => reference,
            Err(e) => {
                tracing::warn!(error = %e, "json dump could not be archived, payload dropped");
                UNAVAILABLE_REF.to_string()
            }
        }
    }

    fn try_archive(&self, data: &serde_json::Value) -> Result<String, ArchiveError> {
        let bytes = match data {
            serde_json::Value::String(s) => s.clone().into_bytes(),
            other => serde_json::to_vec(other)?,
        };
        let bucket = (self.clock)().format("%Y%m%d").to_string();
        let id = uuid::Uuid::new_v4().to_string();
        self.store.put(&bucket, &id, &bytes)
    }
}
