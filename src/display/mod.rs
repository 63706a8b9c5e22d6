// Display module - Frame storage, on-screen text and presentation
//
// This module provides:
// - Packed frame buffers for 16, 24 and 32-bit pixels
// - A small bitmap font for status lines and messages
// - The presentation contract and its window, snapshot and capture backends
// - Synthetic frame sources for driving the pipeline without a machine core

pub mod framebuffer;
pub mod osd;
pub mod present;
pub mod source;
pub mod window;

pub use framebuffer::{ColorDepth, FrameBuffer};
pub use osd::{draw_text, OsdState};
pub use present::{Backend, CapturePresenter, FrameView, PresentError, Presenter, SnapshotPresenter};
pub use source::{FrameSource, Pattern, PatternSource};
pub use window::{run_window, PipelineWindow, WindowConfig, WindowPresenter};
