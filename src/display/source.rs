// Frame sources - Producers of raw frames for the pipeline
//
// The pipeline only sees packed bytes. Anything that can hand out one frame
// at a time with a fixed geometry can drive it.

use super::framebuffer::{ColorDepth, FrameBuffer};
use crate::pipeline::ConfigError;

/// Producer of raw frames with a fixed geometry
pub trait FrameSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn depth(&self) -> ColorDepth;

    /// Produce the next frame
    ///
    /// The returned slice is `width * height * depth.bytes_per_pixel()` bytes.
    fn next_frame(&mut self) -> &[u8];
}

/// Image drawn by [`PatternSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Static color bars
    Bars,
    /// Diagonal gradient that scrolls one pixel per frame
    Gradient,
}

/// Synthetic machine core producing test images
#[derive(Debug)]
pub struct PatternSource {
    frame: FrameBuffer,
    pattern: Pattern,
    phase: usize,
}

impl PatternSource {
    pub fn new(
        width: usize,
        height: usize,
        depth: ColorDepth,
        pattern: Pattern,
    ) -> Result<Self, ConfigError> {
        let mut frame = FrameBuffer::allocate(width, height, depth, 1)?;
        if pattern == Pattern::Bars {
            frame.test_pattern();
        }
        Ok(Self {
            frame,
            pattern,
            phase: 0,
        })
    }

    /// Number of frames produced so far
    pub fn phase(&self) -> usize {
        self.phase
    }
}

impl FrameSource for PatternSource {
    fn width(&self) -> usize {
        self.frame.width()
    }

    fn height(&self) -> usize {
        self.frame.height()
    }

    fn depth(&self) -> ColorDepth {
        self.frame.depth()
    }

    fn next_frame(&mut self) -> &[u8] {
        if self.pattern == Pattern::Gradient {
            self.frame.gradient_pattern(self.phase);
        }
        self.phase += 1;
        self.frame.as_bytes()
    }
}
