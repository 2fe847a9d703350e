//! Source poller: turns bucket listings into pipeline submissions.
//!
//! Each portal runs its own loop listing the data bucket over and over and
//! submitting every `.tar` object it sees. Nothing remembers what was already
//! submitted: an object still present on the next listing is ingested again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::contract::StoreError;
use crate::item::{is_tarball, StagedItem};
use crate::pipeline::Sender;
use crate::portal::Portal;

/// Outcome of one listing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub listed: usize,
    pub submitted: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    List(#[from] StoreError),
    #[error("pipeline submission channel is closed")]
    PipelineClosed,
}

/// List the portal's data bucket once and submit every tarball, waiting for
/// room in the pipeline when it is full.
pub async fn poll_once(
    portal: &Arc<Portal>,
    submit: &Sender<StagedItem>,
) -> Result<PollReport, PollError> {
    let objects = portal.store().list(portal.data_bucket()).await?;
    let mut report = PollReport {
        listed: objects.len(),
        submitted: 0,
    };

    for object in objects.iter().filter(|o| is_tarball(&o.key)) {
        let item = StagedItem::remote(Arc::clone(portal), object);
        debug!(bucket = %portal.data_bucket(), key = %object.key, "Submitting object");
        submit
            .send(item)
            .await
            .map_err(|_| PollError::PipelineClosed)?;
        report.submitted += 1;
    }
    Ok(report)
}

/// Poll the portal until the pipeline stops accepting items. Listing errors
/// are logged and the bucket is listed again.
pub async fn run(portal: Arc<Portal>, submit: Sender<StagedItem>, interval: Duration) {
    info!(
        bucket = %portal.data_bucket(),
        repository = %portal.repository().name(),
        "Starting poll loop"
    );
    while !submit.is_closed() {
        match poll_once(&portal, &submit).await {
            Ok(report) => {
                debug!(
                    bucket = %portal.data_bucket(),
                    listed = report.listed,
                    submitted = report.submitted,
                    "Listing pass complete"
                );
            }
            Err(PollError::PipelineClosed) => break,
            Err(PollError::List(e)) => {
                error!(error = ?e, bucket = %portal.data_bucket(), "Failed to list bucket");
            }
        }
        if interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(interval).await;
        }
    }
    info!(bucket = %portal.data_bucket(), "Pipeline closed, stopping poll loop");
}
