// THEORY:
// This file is the main entry point for the `debris_vision` library crate.
// It defines the public API exposed to callers such as the `debris_tester`
// command-line runner or a quoting service.
//
// The primary export is `VolumePipeline`, together with the report types it
// produces (`JobEstimate`, `SceneReport`, `VolumeRange`). `JobPool` runs many
// jobs concurrently on top of it. The stage modules under `core_modules` are
// public so each heuristic can be used and tested on its own, but a normal
// caller only needs a `PhotoBatch`, an `EstimatorConfig` and the pipeline.

pub mod config;
pub mod core_modules;
pub mod debug_sink;
pub mod error;
pub mod parallel_pipeline;
pub mod photo;
pub mod pipeline;

pub use config::EstimatorConfig;
pub use debug_sink::{DebugSink, DirectorySink, MemorySink};
pub use error::{PipelineError, Result};
pub use parallel_pipeline::{JobOutcome, JobPool, JobRequest};
pub use photo::{ImageSource, Photo, PhotoBatch};
pub use pipeline::{Assumption, JobEstimate, Material, PhotoError, SceneReport, VolumePipeline, VolumeRange};
