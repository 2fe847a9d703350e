//! The per-object state machine driven by the pipeline.
//!
//! An object found in a data bucket moves through
//! `Remote -> Local -> Ingested -> Output`. Any failure turns it into
//! [`ErrorItem`], which skips the remaining work but still reaches cleanup,
//! so a temporary file created along the way is removed exactly once no
//! matter which step failed.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

use crate::contract::ObjectSummary;
use crate::pipeline::{Output, Staged};
use crate::portal::Portal;
use crate::status::ItemState;

/// Length of the occurrence hash used in status marker names.
pub const CONTENT_HASH_LEN: usize = 10;

/// Short hash identifying one occurrence of `key`: re-uploading an object
/// under the same key changes its modification time and thus its hash.
pub fn content_hash(key: &str, last_modified_unix: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(last_modified_unix.to_string().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(CONTENT_HASH_LEN);
    digest
}

/// Path inside the repository where the content of `key` is published:
/// every `/`-separated segment but the last. An empty string is the
/// repository root.
pub fn target_path(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[..idx],
        None => "",
    }
}

/// Whether `key` names a tarball the portal should ingest.
pub fn is_tarball(key: &str) -> bool {
    key.rsplit('.').next() == Some("tar")
}

/// An object known to exist in the data bucket, not yet downloaded.
#[derive(Debug)]
pub struct RemoteItem {
    portal: Arc<Portal>,
    key: String,
    content_hash: String,
}

/// A downloaded object; owns the temporary file holding its bytes.
#[derive(Debug)]
pub struct LocalItem {
    remote: RemoteItem,
    local: TempPath,
}

/// A published object whose temporary file still has to be removed.
#[derive(Debug)]
pub struct IngestedItem {
    remote: RemoteItem,
    local: TempPath,
}

/// An object whose processing failed. Carries the temporary file, if one
/// was created, so cleanup can still remove it.
#[derive(Debug)]
pub struct ErrorItem {
    key: String,
    local: Option<TempPath>,
}

/// The live state of one object in flight.
#[derive(Debug)]
pub enum StagedItem {
    Remote(RemoteItem),
    Local(LocalItem),
    Ingested(IngestedItem),
    Error(ErrorItem),
}

impl RemoteItem {
    pub fn new(portal: Arc<Portal>, object: &ObjectSummary) -> Self {
        let content_hash = content_hash(&object.key, object.last_modified.timestamp());
        Self {
            portal,
            key: object.key.clone(),
            content_hash,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn bucket(&self) -> &str {
        self.portal.data_bucket()
    }

    pub fn status_bucket(&self) -> &str {
        self.portal.status_bucket()
    }

    pub fn repository(&self) -> &str {
        self.portal.repository().name()
    }

    fn report(&self, state: ItemState) {
        self.portal
            .status()
            .emit(&self.key, &self.content_hash, state);
    }

    /// Fetch the object into a fresh temporary file.
    pub async fn download(self) -> StagedItem {
        self.report(ItemState::Downloading);

        let local = match tempfile::Builder::new()
            .prefix("portal")
            .suffix(".tar")
            .tempfile_in(self.portal.scratch_dir())
        {
            Ok(file) => file.into_temp_path(),
            Err(e) => {
                error!(
                    error = ?e,
                    key = %self.key,
                    scratch_dir = %self.portal.scratch_dir().display(),
                    "Failed to create temporary file"
                );
                return StagedItem::Error(ErrorItem::new(self.key, None));
            }
        };

        match self
            .portal
            .store()
            .download(self.bucket(), &self.key, &local)
            .await
        {
            Ok(bytes) => {
                info!(
                    key = %self.key,
                    hash = %self.content_hash,
                    bucket = %self.bucket(),
                    bytes,
                    path = %local.display(),
                    "Downloaded object"
                );
                StagedItem::Local(LocalItem {
                    remote: self,
                    local,
                })
            }
            Err(e) => {
                error!(error = ?e, key = %self.key, bucket = %self.bucket(), "Download failed");
                StagedItem::Error(ErrorItem::new(self.key, Some(local)))
            }
        }
    }
}

impl LocalItem {
    pub fn key(&self) -> &str {
        &self.remote.key
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Publish the tarball into the portal's repository while holding its
    /// transaction lock.
    pub async fn publish(self) -> StagedItem {
        let portal = Arc::clone(&self.remote.portal);
        let repository = portal.repository();
        let target = target_path(&self.remote.key);

        let result = {
            let _transaction = repository.lock().await;
            self.remote.report(ItemState::Ingesting);
            debug!(key = %self.remote.key, repository = %repository.name(), target_path = %target, "Repository transaction acquired");
            portal
                .publisher()
                .publish(repository.name(), &self.local, target)
                .await
        };

        match result {
            Ok(()) => {
                info!(
                    key = %self.remote.key,
                    hash = %self.remote.content_hash,
                    repository = %repository.name(),
                    target_path = %target,
                    "Published tarball"
                );
                StagedItem::Ingested(IngestedItem {
                    remote: self.remote,
                    local: self.local,
                })
            }
            Err(e) => {
                error!(
                    error = ?e,
                    key = %self.remote.key,
                    repository = %repository.name(),
                    "Publish failed"
                );
                StagedItem::Error(ErrorItem::new(self.remote.key, Some(self.local)))
            }
        }
    }
}

impl IngestedItem {
    pub fn key(&self) -> &str {
        &self.remote.key
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    pub fn cleanup(self) -> Output {
        self.remote.report(ItemState::Deleting);
        remove_local(&self.remote.key, self.local);
        Output
    }
}

impl ErrorItem {
    pub fn new(key: impl Into<String>, local: Option<TempPath>) -> Self {
        Self {
            key: key.into(),
            local,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local.as_deref()
    }

    pub fn cleanup(self) -> Output {
        match self.local {
            Some(local) => remove_local(&self.key, local),
            None => debug!(key = %self.key, "Failed item left nothing on disk"),
        }
        Output
    }
}

fn remove_local(key: &str, local: TempPath) {
    let path = local.to_path_buf();
    match local.close() {
        Ok(()) => debug!(key = %key, path = %path.display(), "Removed temporary file"),
        Err(e) => error!(error = ?e, key = %key, path = %path.display(), "Failed to remove temporary file"),
    }
}

impl StagedItem {
    pub fn remote(portal: Arc<Portal>, object: &ObjectSummary) -> Self {
        StagedItem::Remote(RemoteItem::new(portal, object))
    }

    pub fn key(&self) -> &str {
        match self {
            StagedItem::Remote(item) => item.key(),
            StagedItem::Local(item) => item.key(),
            StagedItem::Ingested(item) => item.key(),
            StagedItem::Error(item) => item.key(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StagedItem::Error(_))
    }

    /// Turn an item that reached the wrong stage into an error, keeping any
    /// temporary file it owns.
    fn misrouted(self, stage: &'static str) -> ErrorItem {
        warn!(key = %self.key(), stage, "Item reached a stage out of order");
        match self {
            StagedItem::Remote(item) => ErrorItem::new(item.key, None),
            StagedItem::Local(item) => ErrorItem::new(item.remote.key, Some(item.local)),
            StagedItem::Ingested(item) => ErrorItem::new(item.remote.key, Some(item.local)),
            StagedItem::Error(item) => item,
        }
    }
}

#[async_trait]
impl Staged for StagedItem {
    async fn download(self) -> Self {
        match self {
            StagedItem::Remote(item) => item.download().await,
            StagedItem::Error(_) => self,
            other => StagedItem::Error(other.misrouted("download")),
        }
    }

    async fn publish(self) -> Self {
        match self {
            StagedItem::Local(item) => item.publish().await,
            StagedItem::Error(_) => self,
            other => StagedItem::Error(other.misrouted("publish")),
        }
    }

    async fn cleanup(self) -> Output {
        match self {
            StagedItem::Ingested(item) => item.cleanup(),
            StagedItem::Error(item) => item.cleanup(),
            other => other.misrouted("cleanup").cleanup(),
        }
    }
}
