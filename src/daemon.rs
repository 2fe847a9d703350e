//! Long-running commands: the ingestion daemon, the status-bucket pinger and
//! the bucket listing.
//!
//! The daemon builds everything once from the configuration: one repository
//! table, one publisher, one shared pipeline and one poll loop per portal.
//! Ctrl-C closes the pipeline's submission channel and waits for the drain
//! cascade to finish before returning.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use portals_core::config::Config;
use portals_core::contract::{ObjectStore, Publisher, StoreError};
use portals_core::item::StagedItem;
use portals_core::pipeline::new_pipeline;
use portals_core::poller;
use portals_core::portal::Portal;
use portals_core::publish::IngestPublisher;
use portals_core::repository::RepositoryTable;
use portals_core::status::MARKER_CONTENT_TYPE;
use tracing::{debug, error, info};

use crate::storage::S3ObjectStore;

pub const PING_KEY: &str = "PING";
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Run the ingestion pipeline until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let scratch_dir: PathBuf = config
        .pipeline
        .scratch_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let interval = Duration::from_secs(config.pipeline.poll_interval_secs);
    let repositories = RepositoryTable::from_names(config.repository_names());
    let publisher: Arc<dyn Publisher> = Arc::new(IngestPublisher::new(&config.publisher.command));

    let (submit, output) =
        new_pipeline::<StagedItem>(config.pipeline.buffer_size, config.pipeline.workers);

    let mut portals = Vec::with_capacity(config.portals.len());
    let mut pollers = Vec::with_capacity(config.portals.len());
    for portal_config in &config.portals {
        let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::connect(portal_config).await);
        let repository = repositories
            .get(&portal_config.repository)
            .with_context(|| format!("No repository named {}", portal_config.repository))?;
        let portal = Arc::new(Portal::new(
            portal_config.bucket.clone(),
            portal_config.status_bucket(),
            store,
            Arc::clone(&publisher),
            repository,
            scratch_dir.clone(),
        ));
        pollers.push(tokio::spawn(poller::run(
            Arc::clone(&portal),
            submit.clone(),
            interval,
        )));
        portals.push(portal);
    }
    info!(
        portals = portals.len(),
        repositories = repositories.len(),
        scratch_dir = %scratch_dir.display(),
        "Portals running"
    );

    let drain = tokio::spawn(async move {
        let mut completed: u64 = 0;
        while output.recv().await.is_ok() {
            completed += 1;
            debug!(completed, "Item left the pipeline");
        }
        completed
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested, draining pipeline");

    submit.close();
    join_all(pollers).await;
    let completed = drain.await.context("Output drain task failed")?;
    for portal in &portals {
        portal.status().flush().await;
    }
    info!(completed, "Pipeline drained");
    Ok(())
}

/// Write a `PING` object holding the current time into `bucket`.
pub async fn ping_once(store: &dyn ObjectStore, bucket: &str) -> Result<(), StoreError> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    store
        .upload(bucket, PING_KEY, timestamp.into_bytes(), MARKER_CONTENT_TYPE)
        .await
}

/// Ping every status bucket every [`PING_INTERVAL`] until Ctrl-C.
pub async fn ping(config: &Config) -> Result<()> {
    let mut loops = Vec::with_capacity(config.portals.len());
    for portal_config in &config.portals {
        let store = S3ObjectStore::connect(portal_config).await;
        let bucket = portal_config.status_bucket();
        loops.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PING_INTERVAL);
            loop {
                ticker.tick().await;
                match ping_once(&store, &bucket).await {
                    Ok(()) => info!(status_bucket = %bucket, "Successfully pinged the status bucket"),
                    Err(e) => error!(error = ?e, status_bucket = %bucket, "Error in pinging the status bucket"),
                }
            }
        }));
    }

    tokio::select! {
        _ = join_all(loops) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Shutdown requested, stopping ping loops");
        }
    }
    Ok(())
}

/// Print every object of every data and status bucket.
pub async fn list_files(config: &Config) -> Result<()> {
    for portal_config in &config.portals {
        let store = S3ObjectStore::connect(portal_config).await;
        for bucket in [portal_config.bucket.clone(), portal_config.status_bucket()] {
            match store.list(&bucket).await {
                Ok(objects) => {
                    println!("Bucket: {bucket}");
                    for object in objects {
                        println!("Name:          {}", object.key);
                        println!("Last modified: {}", object.last_modified);
                        println!("Size:          {}", object.size);
                        println!();
                    }
                }
                Err(e) => {
                    error!(error = ?e, bucket = %bucket, "Error in listing the objects in the bucket");
                }
            }
        }
    }
    Ok(())
}
