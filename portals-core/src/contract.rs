//! # contract: collaborator interfaces for the ingestion pipeline
//!
//! The pipeline talks to the outside world through two traits only:
//!
//! - [`ObjectStore`]: list, download and upload objects in a bucket (S3 or
//!   anything speaking the same model).
//! - [`Publisher`]: commit a downloaded tarball into a repository under a
//!   target path.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; the generated `MockObjectStore`
//!   and `MockPublisher` are exported with the `test-export-mocks` feature so
//!   the CLI crate and integration tests can script collaborator behaviour.
//!
//! ## Error Contract
//! - All calls are synchronous from the caller's point of view (awaited), may
//!   fail, and are never retried by the core.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: i64,
}

/// Failures reported by an [`ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("listing bucket {bucket} failed: {message}")]
    List { bucket: String, message: String },
    #[error("downloading {bucket}/{key} failed: {message}")]
    Download {
        bucket: String,
        key: String,
        message: String,
    },
    #[error("uploading {bucket}/{key} failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures reported by a [`Publisher`].
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to launch publish command: {0}")]
    Launch(#[source] std::io::Error),
    #[error("publish into {repository} exited with {status}")]
    Failed { repository: String, status: String },
}

/// Access to the buckets of one portal.
///
/// Implementations handle pagination and credentials internally; the core
/// only sees whole listings and finished transfers.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object in `bucket`.
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectSummary>, StoreError>;

    /// Download `bucket/key` into the already existing file at `destination`,
    /// returning the number of bytes written.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<u64, StoreError>;

    /// Store `body` at `bucket/key`.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// Commits tarballs into a repository.
///
/// The repository accepts a single open transaction at a time; callers must
/// hold the repository lock (see [`crate::repository`]) around `publish`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Ingest `tarball` into `repository` below `target_path`.
    /// An empty `target_path` means the repository root.
    async fn publish(
        &self,
        repository: &str,
        tarball: &Path,
        target_path: &str,
    ) -> Result<(), PublishError>;
}
