#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use portals_core::contract::{MockObjectStore, ObjectSummary, Publisher, StoreError};
use portals_core::portal::Portal;
use portals_core::repository::Repository;

pub const DATA_BUCKET: &str = "data";
pub const STATUS_BUCKET: &str = "data.status";

pub fn object(key: &str, last_modified_unix: i64) -> ObjectSummary {
    ObjectSummary {
        key: key.to_string(),
        last_modified: Utc.timestamp_opt(last_modified_unix, 0).unwrap(),
        size: 16,
    }
}

/// What the scripted store saw.
#[derive(Default, Clone)]
pub struct Recorder {
    /// Destination of every download call.
    pub downloads: Arc<Mutex<Vec<PathBuf>>>,
    /// (key, body) of every uploaded status marker.
    pub markers: Arc<Mutex<Vec<(String, String)>>>,
}

impl Recorder {
    pub fn downloads(&self) -> Vec<PathBuf> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn marker_keys(&self) -> HashSet<String> {
        self.markers
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Timestamp written in the marker with the given suffix.
    pub fn marker_time(&self, suffix: &str) -> Option<DateTime<Utc>> {
        self.markers
            .lock()
            .unwrap()
            .iter()
            .find(|(key, _)| key.ends_with(suffix))
            .map(|(_, body)| {
                DateTime::parse_from_rfc3339(body)
                    .unwrap()
                    .with_timezone(&Utc)
            })
    }
}

/// A store whose downloads write a few bytes into the destination. Keys in
/// `failing` write a partial file and then fail.
pub fn scripted_store(recorder: &Recorder, failing: &[&str]) -> MockObjectStore {
    let failing: HashSet<String> = failing.iter().map(|k| k.to_string()).collect();
    let downloads = Arc::clone(&recorder.downloads);
    let markers = Arc::clone(&recorder.markers);

    let mut store = MockObjectStore::new();
    store
        .expect_download()
        .returning(move |bucket: &str, key: &str, destination: &Path| {
            downloads.lock().unwrap().push(destination.to_path_buf());
            if failing.contains(key) {
                std::fs::write(destination, b"part")?;
                return Err(StoreError::Download {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message: "connection reset".into(),
                });
            }
            std::fs::write(destination, b"tarball-bytes")?;
            Ok(13)
        });
    store
        .expect_upload()
        .returning(move |_bucket: &str, key: &str, body: Vec<u8>, _content_type: &str| {
            markers
                .lock()
                .unwrap()
                .push((key.to_string(), String::from_utf8(body).unwrap()));
            Ok(())
        });
    store
}

pub fn portal(
    store: MockObjectStore,
    publisher: impl Publisher + 'static,
    repository: Arc<Repository>,
    scratch_dir: &Path,
) -> Arc<Portal> {
    Arc::new(Portal::new(
        DATA_BUCKET,
        STATUS_BUCKET,
        Arc::new(store),
        Arc::new(publisher),
        repository,
        scratch_dir,
    ))
}

pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}
