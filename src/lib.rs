// Frameband Library
// Band-parallel filter pipeline for presenting emulator frames

// Public modules
pub mod blend;
pub mod config;
pub mod display;
pub mod filter;
pub mod pipeline;

// Re-export main types for convenience
pub use blend::BlendId;
pub use config::VideoConfig;
pub use display::{
    Backend, CapturePresenter, ColorDepth, FrameBuffer, FrameSource, FrameView, OsdState,
    PatternSource, PresentError, Presenter, SnapshotPresenter, WindowConfig,
};
pub use filter::FilterId;
pub use pipeline::{
    ConfigError, FramePipeline, LifecycleState, PipelineError, PipelineSettings, WorkerFault,
};
