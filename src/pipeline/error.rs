// Pipeline errors
//
// Configuration errors are reported synchronously from `configure` and leave
// the previous configuration in place. Delivery errors come back from
// `deliver_frame` once every dispatched worker has reported.

use crate::display::ColorDepth;
use std::io;
use thiserror::Error;

/// Errors raised while validating or applying a pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("filter index {0} is not in the catalog")]
    UnknownFilter(usize),

    #[error("unknown filter name `{0}`")]
    UnknownFilterName(String),

    #[error("blend index {0} is not in the catalog")]
    UnknownBlend(usize),

    #[error("unknown blend name `{0}`")]
    UnknownBlendName(String),

    #[error("unsupported color depth: {0} bits")]
    UnknownDepth(u32),

    #[error("{name} does not support {depth} pixels")]
    UnsupportedDepth {
        name: &'static str,
        depth: ColorDepth,
    },

    #[error("frame geometry {width}x{height} is empty")]
    EmptyFrame { width: usize, height: usize },

    #[error("{workers} workers cannot split a frame of {height} rows")]
    TooManyWorkers { workers: usize, height: usize },

    #[error("frame geometry {width}x{height} at {scale}x does not fit in memory")]
    Geometry {
        width: usize,
        height: usize,
        scale: usize,
    },

    #[error("failed to allocate {bytes} bytes of frame storage")]
    Allocation { bytes: usize },

    #[error("failed to spawn band worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },
}

/// Fault reported by a band worker for a single frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFault {
    #[error("band geometry mismatch: expected {expected} bytes, got {actual}")]
    Geometry { expected: usize, actual: usize },

    #[error("filter panicked: {0}")]
    Panicked(String),
}

/// Errors raised while delivering a frame through the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is not configured")]
    NotConfigured,

    #[error("source frame is {actual} bytes, expected {expected}")]
    SourceSize { expected: usize, actual: usize },

    #[error("band worker {index} failed: {fault}")]
    Worker { index: usize, fault: WorkerFault },

    #[error("band worker {index} is no longer running")]
    WorkerLost { index: usize },
}
