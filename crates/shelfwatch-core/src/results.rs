use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::ScrapeError;
use crate::operation::OperationKind;
use crate::seller::Seller;

/// Persists scrape results as external artifacts.
///
/// `write` returns an opaque path string that is stored on the
/// operation (`data_file`) and later handed back to `read`/`remove` —
/// retrieval and cleanup depend only on that round trip.
pub trait ResultStore: Send + Sync + Clone {
    fn write(
        &self,
        seller: Seller,
        kind: OperationKind,
        data: &serde_json::Value,
    ) -> impl Future<Output = Result<String, ScrapeError>> + Send;

    fn read(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<serde_json::Value, ScrapeError>> + Send;

    /// Removes the artifact. Missing files report `NotFound`; callers
    /// on cleanup paths ignore that case.
    fn remove(&self, path: &str) -> impl Future<Output = Result<(), ScrapeError>> + Send;
}

/// Deterministic result file name: seller, kind, and an RFC 3339
/// timestamp with `:` and `.` replaced by `-`. This scheme is part of
/// the durable contract — cleanup and retrieval rely on it.
pub fn result_file_name(seller: Seller, kind: OperationKind, when: DateTime<Utc>) -> String {
    let stamp = when
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{seller}_{kind}_{stamp}.json")
}

/// Result store backed by one JSON file per operation under a results
/// directory.
#[derive(Debug, Clone)]
pub struct FileResultStore {
    dir: PathBuf,
}

impl FileResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn map_io(e: std::io::Error, path: &str) -> ScrapeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScrapeError::NotFound(format!("result file not found: {path}"))
        } else {
            ScrapeError::Persistence(format!("{path}: {e}"))
        }
    }
}

impl ResultStore for FileResultStore {
    async fn write(
        &self,
        seller: Seller,
        kind: OperationKind,
        data: &serde_json::Value,
    ) -> Result<String, ScrapeError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ScrapeError::Persistence(format!("{}: {e}", self.dir.display())))?;

        let path = self.dir.join(result_file_name(seller, kind, Utc::now()));
        let bytes = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ScrapeError::Persistence(format!("{}: {e}", path.display())))?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn read(&self, path: &str) -> Result<serde_json::Value, ScrapeError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Self::map_io(e, path))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn remove(&self, path: &str) -> Result<(), ScrapeError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| Self::map_io(e, path))
    }
}
