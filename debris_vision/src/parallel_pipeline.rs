// THEORY:
// `JobPool` runs independent jobs concurrently. A single dispatcher task owns
// the inbound queue and hands jobs round-robin to a fixed set of workers; each
// job carries a oneshot sender so its result finds its way back to the caller
// regardless of which worker ran it.
//
// Estimation is CPU-bound and synchronous, so workers never run it on the async
// executor directly: each job moves into `spawn_blocking` together with its own
// debug sink. Jobs share nothing but the read-only `EstimatorConfig` they were
// submitted with, so results never depend on which worker or in which order
// jobs complete.

use crate::config::EstimatorConfig;
use crate::debug_sink::DebugSink;
use crate::error::{PipelineError, Result};
use crate::photo::PhotoBatch;
use crate::pipeline::{JobEstimate, VolumePipeline};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// One unit of work for the pool.
pub struct JobRequest {
    pub batch: PhotoBatch,
    pub config: EstimatorConfig,
    pub sink: Option<Box<dyn DebugSink>>,
}

impl JobRequest {
    pub fn new(batch: PhotoBatch, config: EstimatorConfig) -> Self {
        Self {
            batch,
            config,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn DebugSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

/// What a finished job hands back: the estimate and the sink it wrote into.
pub struct JobOutcome {
    pub estimate: JobEstimate,
    pub sink: Option<Box<dyn DebugSink>>,
}

struct JobTask {
    request: JobRequest,
    result_sender: oneshot::Sender<Result<JobOutcome>>,
}

pub struct JobPool {
    task_sender: mpsc::UnboundedSender<JobTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl JobPool {
    /// A pool with one worker per logical CPU.
    pub fn new() -> Self {
        Self::with_workers(num_cpus::get())
    }

    /// Must be called from within a tokio runtime.
    pub fn with_workers(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<JobTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<JobTask>())
            .unzip();

        // Dispatcher
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    error!(worker = worker_idx, "worker channel closed, dropping job");
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let mut workers = Vec::with_capacity(worker_count);
        for (worker_id, mut worker_receiver) in worker_receivers.into_iter().enumerate() {
            let worker = tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    debug!(worker = worker_id, photos = task.request.batch.len(), "job picked up");
                    let outcome = Self::run_blocking(task.request).await;
                    let _ = task.result_sender.send(outcome);
                }
            });
            workers.push(worker);
        }

        Self { task_sender, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    async fn run_blocking(request: JobRequest) -> Result<JobOutcome> {
        tokio::task::spawn_blocking(move || {
            let JobRequest { batch, config, mut sink } = request;
            let pipeline = VolumePipeline::new(config);
            let estimate = match sink.as_mut() {
                Some(sink) => pipeline.estimate(&batch, Some(sink.as_mut() as &mut dyn DebugSink))?,
                None => pipeline.estimate(&batch, None)?,
            };
            Ok(JobOutcome { estimate, sink })
        })
        .await
        .map_err(|_| PipelineError::WorkerPool("estimation task panicked"))?
    }

    /// Submits one job and waits for its result.
    pub async fn estimate(&self, request: JobRequest) -> Result<JobOutcome> {
        let (result_sender, result_receiver) = oneshot::channel();

        self.task_sender
            .send(JobTask { request, result_sender })
            .map_err(|_| PipelineError::WorkerPool("failed to send job to worker pool"))?;

        result_receiver
            .await
            .map_err(|_| PipelineError::WorkerPool("failed to receive result from worker"))?
    }

    /// Runs every job concurrently; results come back in submission order.
    pub async fn estimate_all(&self, requests: Vec<JobRequest>) -> Vec<Result<JobOutcome>> {
        join_all(requests.into_iter().map(|request| self.estimate(request))).await
    }
}

impl Default for JobPool {
    fn default() -> Self {
        Self::new()
    }
}
