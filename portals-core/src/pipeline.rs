//! Four-stage worker-pool pipeline.
//!
//! ```text
//!  submit ─▶ [download] ─▶ downloaded ─▶ [publish] ─▶ published ─▶ [cleanup] ─▶ cleaned ─▶ [forward] ─▶ output
//! ```
//!
//! Every stage runs `workers` tasks pulling from a shared bounded channel, so
//! a slow stage fills its inbound channel and blocks the stage before it,
//! all the way back to whoever submits. At most `buffer + workers` items sit
//! between two stages.
//!
//! Shutdown is a drain cascade: once the submission channel is closed and
//! empty, the download workers return; the stage supervisor waits for all of
//! them and closes the `downloaded` channel, which lets the publish workers
//! drain and return, and so on until the output channel closes. No item
//! accepted by the pipeline is dropped on the way.

use std::future::Future;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, warn};

pub use async_channel::{Receiver, Sender};

/// Marks that one item left the pipeline. Carries nothing: the outcome of an
/// item is visible through its status markers and the logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Output;

/// Something that can be driven through the pipeline stages.
///
/// Each call either performs the step or, for an item that already failed,
/// passes it along untouched; `cleanup` must release whatever the item still
/// holds.
#[async_trait]
pub trait Staged: Send + Sized + 'static {
    async fn download(self) -> Self;
    async fn publish(self) -> Self;
    async fn cleanup(self) -> Output;
}

/// Spawn the stage workers and return the submission side and the output
/// side of the pipeline. Must be called from within a tokio runtime.
///
/// Close (or drop every clone of) the returned sender to shut the pipeline
/// down; the output receiver yields `Err` once every submitted item has come
/// out the other end.
///
/// The output receiver must be drained until it yields `Err`, even when its
/// values are ignored. Dropping it stops every stage in turn, and items
/// still in flight are dropped without passing through cleanup: their
/// temporary files are removed on drop but no DELETING marker is written.
pub fn new_pipeline<T: Staged>(buffer_size: usize, workers: usize) -> (Sender<T>, Receiver<Output>) {
    let buffer_size = buffer_size.max(1);
    let workers = workers.max(1);

    let (submit_tx, submit_rx) = async_channel::bounded::<T>(buffer_size);
    let (downloaded_tx, downloaded_rx) = async_channel::bounded::<T>(buffer_size);
    let (published_tx, published_rx) = async_channel::bounded::<T>(buffer_size);
    let (cleaned_tx, cleaned_rx) = async_channel::bounded::<Output>(buffer_size);
    let (output_tx, output_rx) = async_channel::bounded::<Output>(buffer_size);

    spawn_stage("download", workers, submit_rx, downloaded_tx, |item: T| {
        item.download()
    });
    spawn_stage("publish", workers, downloaded_rx, published_tx, |item: T| {
        item.publish()
    });
    spawn_stage("cleanup", workers, published_rx, cleaned_tx, |item: T| {
        item.cleanup()
    });
    spawn_stage("forward", workers, cleaned_rx, output_tx, |output: Output| async move {
        output
    });

    debug!(buffer_size, workers, "Pipeline started");
    (submit_tx, output_rx)
}

/// Run `workers` tasks applying `step` to every item of `input`, and a
/// supervisor closing `output` once all of them have returned.
fn spawn_stage<I, O, F, Fut>(
    stage: &'static str,
    workers: usize,
    input: Receiver<I>,
    output: Sender<O>,
    step: F,
) where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let input = input.clone();
        let output = output.clone();
        let step = step.clone();
        handles.push(tokio::spawn(async move {
            while let Ok(item) = input.recv().await {
                let next = step(item).await;
                if output.send(next).await.is_err() {
                    warn!(stage, worker, "Downstream channel closed, stopping worker");
                    break;
                }
            }
            debug!(stage, worker, "Stage worker finished");
        }));
    }
    drop(input);

    tokio::spawn(async move {
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(stage, error = ?e, "Stage worker panicked");
            }
        }
        output.close();
        debug!(stage, "Stage drained, downstream channel closed");
    });
}
