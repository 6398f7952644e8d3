// THEORY:
// Every failure the engine can surface lives in one enum. The heuristics never
// fail on geometry: zero-area frames, empty masks and zero-norm embeddings are
// absorbed by numeric floors inside each stage. What remains are failures of
// the outside world: a photo or mask that will not decode, an empty batch that
// should never have reached the pipeline, and debug writes that could not land.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A photo or its mask could not be read or decoded.
    #[error("failed to decode image for photo '{photo}': {source}")]
    ImageDecode {
        photo: String,
        #[source]
        source: image::ImageError,
    },

    /// A batch with zero photos. Raised by `PhotoBatch::new`, before the pipeline runs.
    #[error("a job needs at least one photo")]
    EmptyInput,

    /// A debug artifact could not be written. Never fatal to an estimate.
    #[error("failed to write debug artifact '{name}': {source}")]
    DebugSink {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker pool shut down before a job could be handed off or answered.
    #[error("worker pool unavailable: {0}")]
    WorkerPool(&'static str),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
