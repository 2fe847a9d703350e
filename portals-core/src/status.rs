//! Progress markers written to a portal's status bucket.
//!
//! Every transition of an item writes a small object named
//! `<key>.<hash>.<STATE>` whose body is the time the transition started.
//! Writes run on detached tasks: a slow or failing status bucket never holds
//! up the pipeline, and failures only show up in the logs.

use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::contract::ObjectStore;

pub const MARKER_CONTENT_TYPE: &str = "text";

/// States reported for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Downloading,
    Ingesting,
    Deleting,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Downloading => "DOWNLOADING",
            ItemState::Ingesting => "INGESTING",
            ItemState::Deleting => "DELETING",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object key of the marker for `key` (occurrence `hash`) in `state`.
pub fn marker_key(key: &str, hash: &str, state: ItemState) -> String {
    format!("{key}.{hash}.{state}")
}

/// Fire-and-forget writer of status markers into one bucket.
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    tracker: TaskTracker,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Record that `key` entered `state`. Returns immediately; the upload
    /// happens on a background task.
    ///
    /// Only the timestamps in the marker bodies follow the order of the
    /// `emit` calls. The writes themselves may land in any order.
    pub fn emit(&self, key: &str, hash: &str, state: ItemState) {
        let marker = marker_key(key, hash, state);
        let body = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .into_bytes();
        let store = Arc::clone(&self.store);
        let bucket = self.bucket.clone();

        self.tracker.spawn(async move {
            match store
                .upload(&bucket, &marker, body, MARKER_CONTENT_TYPE)
                .await
            {
                Ok(()) => debug!(bucket = %bucket, marker = %marker, "Status marker written"),
                Err(e) => {
                    error!(error = ?e, bucket = %bucket, marker = %marker, "Failed to write status marker")
                }
            }
        });
    }

    /// Wait until every marker emitted so far has been written (or failed).
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("bucket", &self.bucket)
            .field("pending", &self.tracker.len())
            .finish()
    }
}
