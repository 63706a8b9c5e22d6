// Presentation - Hands finished frames to a display backend
//
// Backends receive a borrowed `FrameView`, so they cannot keep the pixels past
// the call; the pipeline is free to overwrite its destination on the next
// frame. The set of backends is closed and picked once at startup.

use super::framebuffer::{unpack_rgb, ColorDepth};
use super::window::WindowPresenter;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by presentation backends
#[derive(Debug, Error)]
pub enum PresentError {
    #[error("no finished frame to present")]
    NothingRetained,

    #[error("window surface is not ready")]
    SurfaceNotReady,

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("pixels error: {0}")]
    Pixels(#[from] pixels::Error),

    #[error("texture error: {0}")]
    Texture(#[from] pixels::TextureError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("PNG encoding error: {0}")]
    PngEncoding(#[from] png::EncodingError),
}

/// Borrowed, finished frame ready for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    pixels: &'a [u8],
    width: usize,
    height: usize,
    scale: usize,
    depth: ColorDepth,
}

impl<'a> FrameView<'a> {
    pub fn new(
        pixels: &'a [u8],
        width: usize,
        height: usize,
        scale: usize,
        depth: ColorDepth,
    ) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width * scale * height * scale * depth.bytes_per_pixel()
        );
        Self {
            pixels,
            width,
            height,
            scale,
            depth,
        }
    }

    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    /// Unscaled source width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Unscaled source height
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    pub fn depth(&self) -> ColorDepth {
        self.depth
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.depth.bytes_per_pixel()
    }

    pub fn output_width(&self) -> usize {
        self.width * self.scale
    }

    pub fn output_height(&self) -> usize {
        self.height * self.scale
    }

    /// Convert the frame to RGBA8 for display
    ///
    /// # Panics
    /// Panics if `output` is smaller than `output_width * output_height * 4`
    pub fn to_rgba(&self, output: &mut [u8]) {
        let pixel_count = self.output_width() * self.output_height();
        assert!(
            output.len() >= pixel_count * 4,
            "Output buffer too small for RGBA conversion"
        );

        for (pixel, out) in self
            .pixels
            .chunks_exact(self.bytes_per_pixel())
            .zip(output.chunks_exact_mut(4))
        {
            let [r, g, b] = unpack_rgb(self.depth, pixel);
            out.copy_from_slice(&[r, g, b, 0xFF]);
        }
    }
}

/// A surface that can draw finished frames
pub trait Presenter {
    /// Draw `frame`; the view is only valid for the duration of the call
    fn present(&mut self, frame: FrameView<'_>) -> Result<(), PresentError>;
}

/// Frame kept by [`CapturePresenter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub pixels: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub scale: usize,
    pub depth: ColorDepth,
}

/// Headless backend that keeps a copy of the last presented frame
#[derive(Debug, Default)]
pub struct CapturePresenter {
    last: Option<CapturedFrame>,
    presented: u64,
}

impl CapturePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last frame presented, if any
    pub fn last(&self) -> Option<&CapturedFrame> {
        self.last.as_ref()
    }

    /// Number of frames presented so far
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Presenter for CapturePresenter {
    fn present(&mut self, frame: FrameView<'_>) -> Result<(), PresentError> {
        match &mut self.last {
            // Reuse the allocation when the geometry is unchanged
            Some(last) if last.pixels.len() == frame.pixels().len() => {
                last.pixels.copy_from_slice(frame.pixels());
                last.width = frame.width();
                last.height = frame.height();
                last.scale = frame.scale();
                last.depth = frame.depth();
            }
            _ => {
                self.last = Some(CapturedFrame {
                    pixels: frame.pixels().to_vec(),
                    width: frame.width(),
                    height: frame.height(),
                    scale: frame.scale(),
                    depth: frame.depth(),
                });
            }
        }
        self.presented += 1;
        Ok(())
    }
}

/// Backend that writes every presented frame to a PNG file
#[derive(Debug)]
pub struct SnapshotPresenter {
    directory: PathBuf,
    written: Vec<PathBuf>,
    rgba: Vec<u8>,
}

impl SnapshotPresenter {
    /// Create a snapshot backend writing into `directory`
    ///
    /// The directory is created on first use.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            written: Vec::new(),
            rgba: Vec::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Paths written so far, oldest first
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn next_path(&self) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.directory.join(format!(
            "frame_{}_{:05}.png",
            timestamp,
            self.written.len()
        ))
    }
}

impl Presenter for SnapshotPresenter {
    fn present(&mut self, frame: FrameView<'_>) -> Result<(), PresentError> {
        fs::create_dir_all(&self.directory)?;

        self.rgba
            .resize(frame.output_width() * frame.output_height() * 4, 0);
        frame.to_rgba(&mut self.rgba);

        let path = self.next_path();
        save_png(
            &path,
            &self.rgba,
            frame.output_width() as u32,
            frame.output_height() as u32,
        )?;
        self.written.push(path);
        Ok(())
    }
}

/// Save RGBA data as a PNG file
fn save_png(path: &Path, data: &[u8], width: u32, height: u32) -> Result<(), PresentError> {
    let file = fs::File::create(path)?;
    let w = io::BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;

    Ok(())
}

/// Presentation backend chosen at configuration time
pub enum Backend {
    /// `winit` window drawn through `pixels`
    Window(WindowPresenter),
    /// PNG files on disk
    Snapshot(SnapshotPresenter),
    /// In-memory copy, for headless runs
    Capture(CapturePresenter),
}

impl Presenter for Backend {
    fn present(&mut self, frame: FrameView<'_>) -> Result<(), PresentError> {
        match self {
            Backend::Window(window) => window.present(frame),
            Backend::Snapshot(snapshot) => snapshot.present(frame),
            Backend::Capture(capture) => capture.present(frame),
        }
    }
}
