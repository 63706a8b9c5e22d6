// Frame Buffer - Stores packed pixel data tagged with geometry
//
// Pixels are stored as packed bytes so one buffer type can carry every
// supported color depth:
// - 16-bit: RGB565, native-endian u16
// - 24-bit: R, G, B bytes
// - 32-bit: 0xAARRGGBB, native-endian u32
//
// A buffer is `width × height` logical pixels enlarged by `scale`, so the
// stored image is `(width * scale) × (height * scale)` pixels.

use super::present::FrameView;
use crate::pipeline::ConfigError;
use serde::{Deserialize, Serialize};

/// Pixel depth of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorDepth {
    /// RGB565
    Bits16,
    /// Packed RGB888
    Bits24,
    /// 0xAARRGGBB
    Bits32,
}

impl ColorDepth {
    /// Parse a depth from its bit count (16, 24 or 32)
    pub fn from_bits(bits: u32) -> Result<Self, ConfigError> {
        match bits {
            16 => Ok(ColorDepth::Bits16),
            24 => Ok(ColorDepth::Bits24),
            32 => Ok(ColorDepth::Bits32),
            other => Err(ConfigError::UnknownDepth(other)),
        }
    }

    /// Number of bits per pixel
    pub fn bits(self) -> u32 {
        match self {
            ColorDepth::Bits16 => 16,
            ColorDepth::Bits24 => 24,
            ColorDepth::Bits32 => 32,
        }
    }

    /// Number of bytes per pixel
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        self.bits() as usize / 8
    }
}

impl std::fmt::Display for ColorDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Encode an RGB triple into `out` using the given depth
#[inline]
pub fn pack_rgb(depth: ColorDepth, rgb: [u8; 3], out: &mut [u8]) {
    let [r, g, b] = rgb;
    match depth {
        ColorDepth::Bits16 => {
            let value = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
            out[..2].copy_from_slice(&value.to_ne_bytes());
        }
        ColorDepth::Bits24 => out[..3].copy_from_slice(&rgb),
        ColorDepth::Bits32 => {
            let value = 0xFF00_0000 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            out[..4].copy_from_slice(&value.to_ne_bytes());
        }
    }
}

/// Decode one pixel of the given depth into an RGB triple
#[inline]
pub fn unpack_rgb(depth: ColorDepth, pixel: &[u8]) -> [u8; 3] {
    match depth {
        ColorDepth::Bits16 => {
            let value = u16::from_ne_bytes([pixel[0], pixel[1]]);
            let r = ((value >> 11) & 0x1F) as u8;
            let g = ((value >> 5) & 0x3F) as u8;
            let b = (value & 0x1F) as u8;
            // Replicate the high bits so full intensity maps to 0xFF
            [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
        }
        ColorDepth::Bits24 => [pixel[0], pixel[1], pixel[2]],
        ColorDepth::Bits32 => {
            let value = u32::from_ne_bytes([pixel[0], pixel[1], pixel[2], pixel[3]]);
            [(value >> 16) as u8, (value >> 8) as u8, value as u8]
        }
    }
}

/// Frame buffer holding one packed image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    depth: ColorDepth,
    scale: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create an unscaled frame buffer filled with zeroes
    ///
    /// # Panics
    /// Panics if the size overflows or the allocation fails; use
    /// [`FrameBuffer::allocate`] to surface either as an error.
    pub fn new(width: usize, height: usize, depth: ColorDepth) -> Self {
        Self {
            width,
            height,
            depth,
            scale: 1,
            data: vec![0; width * height * depth.bytes_per_pixel()],
        }
    }

    /// Allocate a zeroed frame buffer of `width × height` pixels enlarged by `scale`
    ///
    /// # Errors
    /// Returns `ConfigError::Geometry` if the byte size overflows `usize` and
    /// `ConfigError::Allocation` if the buffer cannot be reserved.
    pub fn allocate(
        width: usize,
        height: usize,
        depth: ColorDepth,
        scale: usize,
    ) -> Result<Self, ConfigError> {
        let len = Self::byte_len(width, height, depth, scale).ok_or(ConfigError::Geometry {
            width,
            height,
            scale,
        })?;
        Ok(Self {
            width,
            height,
            depth,
            scale,
            data: zeroed_bytes(len)?,
        })
    }

    /// Number of bytes needed for a buffer of the given geometry, `None` on overflow
    pub fn byte_len(
        width: usize,
        height: usize,
        depth: ColorDepth,
        scale: usize,
    ) -> Option<usize> {
        width
            .checked_mul(scale)?
            .checked_mul(height)?
            .checked_mul(scale)?
            .checked_mul(depth.bytes_per_pixel())
    }

    /// Logical (unscaled) width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Logical (unscaled) height
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> ColorDepth {
        self.depth
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    /// Width of the stored image in pixels
    pub fn output_width(&self) -> usize {
        self.width * self.scale
    }

    /// Height of the stored image in pixels
    pub fn output_height(&self) -> usize {
        self.height * self.scale
    }

    /// Length of one stored row in bytes
    pub fn row_bytes(&self) -> usize {
        self.output_width() * self.depth.bytes_per_pixel()
    }

    /// Get the raw pixel bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable access to the raw pixel bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy raw pixel bytes from a slice of identical length
    ///
    /// # Panics
    /// Panics if the lengths differ
    pub fn copy_from_bytes(&mut self, bytes: &[u8]) {
        self.data.copy_from_slice(bytes);
    }

    /// Borrow the buffer as a presentable view
    pub fn view(&self) -> FrameView<'_> {
        FrameView::new(&self.data, self.width, self.height, self.scale, self.depth)
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        assert!(x < self.output_width(), "X coordinate {} out of bounds", x);
        assert!(y < self.output_height(), "Y coordinate {} out of bounds", y);
        (y * self.output_width() + x) * self.depth.bytes_per_pixel()
    }

    /// Set a 32-bit pixel in stored-image coordinates
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds or the buffer is not 32-bit
    #[inline]
    pub fn set_pixel32(&mut self, x: usize, y: usize, value: u32) {
        assert_eq!(self.depth, ColorDepth::Bits32, "not a 32-bit frame");
        let offset = self.offset(x, y);
        self.data[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }

    /// Get a 32-bit pixel in stored-image coordinates
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds or the buffer is not 32-bit
    #[inline]
    pub fn pixel32(&self, x: usize, y: usize) -> u32 {
        assert_eq!(self.depth, ColorDepth::Bits32, "not a 32-bit frame");
        let offset = self.offset(x, y);
        let p = &self.data[offset..offset + 4];
        u32::from_ne_bytes([p[0], p[1], p[2], p[3]])
    }

    /// Set a pixel from an RGB triple, encoded for this buffer's depth
    pub fn set_rgb(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let offset = self.offset(x, y);
        let depth = self.depth;
        pack_rgb(depth, rgb, &mut self.data[offset..]);
    }

    /// Read a pixel as an RGB triple
    pub fn rgb(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = self.offset(x, y);
        unpack_rgb(self.depth, &self.data[offset..])
    }

    /// Fill every pixel of a 32-bit buffer with `value`
    pub fn fill32(&mut self, value: u32) {
        assert_eq!(self.depth, ColorDepth::Bits32, "not a 32-bit frame");
        let bytes = value.to_ne_bytes();
        for pixel in self.data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&bytes);
        }
    }

    /// Fill the buffer with color bars for debugging
    pub fn test_pattern(&mut self) {
        const BARS: [[u8; 3]; 8] = [
            [0xFF, 0xFF, 0xFF],
            [0xFF, 0xFF, 0x00],
            [0x00, 0xFF, 0xFF],
            [0x00, 0xFF, 0x00],
            [0xFF, 0x00, 0xFF],
            [0xFF, 0x00, 0x00],
            [0x00, 0x00, 0xFF],
            [0x00, 0x00, 0x00],
        ];
        let width = self.output_width();
        for y in 0..self.output_height() {
            for x in 0..width {
                let bar = BARS[(x * BARS.len() / width.max(1)).min(BARS.len() - 1)];
                self.set_rgb(x, y, bar);
            }
        }
    }

    /// Fill the buffer with a diagonal gradient shifted by `phase`
    pub fn gradient_pattern(&mut self, phase: usize) {
        let width = self.output_width().max(1);
        let height = self.output_height().max(1);
        for y in 0..self.output_height() {
            for x in 0..self.output_width() {
                let r = ((x + phase) * 255 / width) as u8;
                let g = ((y + phase / 2) * 255 / height) as u8;
                let b = (((x + y + phase) / 4) & 0xFF) as u8;
                self.set_rgb(x, y, [r, g, b]);
            }
        }
    }
}

/// Reserve a zeroed byte vector, reporting allocation failure instead of aborting
pub(crate) fn zeroed_bytes(len: usize) -> Result<Vec<u8>, ConfigError> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| ConfigError::Allocation { bytes: len })?;
    bytes.resize(len, 0);
    Ok(bytes)
}
