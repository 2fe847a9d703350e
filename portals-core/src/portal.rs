//! A portal wires one data bucket to one repository.
//!
//! It bundles everything an item needs while it travels through the
//! pipeline: where to download from, where to report status, which
//! repository (and lock) to publish into and where to stage the tarball.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::contract::{ObjectStore, Publisher};
use crate::repository::Repository;
use crate::status::StatusReporter;

pub struct Portal {
    data_bucket: String,
    store: Arc<dyn ObjectStore>,
    status: StatusReporter,
    publisher: Arc<dyn Publisher>,
    repository: Arc<Repository>,
    scratch_dir: PathBuf,
}

impl Portal {
    pub fn new(
        data_bucket: impl Into<String>,
        status_bucket: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        publisher: Arc<dyn Publisher>,
        repository: Arc<Repository>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        let status = StatusReporter::new(Arc::clone(&store), status_bucket);
        Self {
            data_bucket: data_bucket.into(),
            store,
            status,
            publisher,
            repository,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn data_bucket(&self) -> &str {
        &self.data_bucket
    }

    pub fn status_bucket(&self) -> &str {
        self.status.bucket()
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn status(&self) -> &StatusReporter {
        &self.status
    }

    pub fn publisher(&self) -> &dyn Publisher {
        self.publisher.as_ref()
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }
}

impl std::fmt::Debug for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Portal")
            .field("data_bucket", &self.data_bucket)
            .field("status_bucket", &self.status.bucket())
            .field("repository", &self.repository.name())
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}
