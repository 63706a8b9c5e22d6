// Filter kernels - 32-bit pixel transforms
//
// Every kernel reads `width × height` packed 32-bit pixels from `src` and
// writes `(width * scale) × (height * scale)` pixels into `dst`.
// Kernels that look at the row above or below clamp at the first and last
// row they are given, so a band boundary shows up as a seam.

use std::sync::OnceLock;

/// Shade applied to scanline and grid rows (5/8 intensity)
const SHADE_NUMERATOR: u16 = 5;
const SHADE_DENOMINATOR: u16 = 8;

static SHADE_TABLE: OnceLock<[u8; 256]> = OnceLock::new();

fn shade_table() -> &'static [u8; 256] {
    SHADE_TABLE.get_or_init(|| {
        let mut table = [0u8; 256];
        for (value, slot) in table.iter_mut().enumerate() {
            *slot = (value as u16 * SHADE_NUMERATOR / SHADE_DENOMINATOR) as u8;
        }
        table
    })
}

/// Build the shading lookup table used by the scanline-style kernels
pub(crate) fn init_shade_table(_depth: crate::display::ColorDepth, _src_width: usize) {
    shade_table();
}

#[inline]
fn read(buf: &[u8], index: usize) -> u32 {
    let p = &buf[index * 4..index * 4 + 4];
    u32::from_ne_bytes([p[0], p[1], p[2], p[3]])
}

#[inline]
fn write(buf: &mut [u8], index: usize, value: u32) {
    buf[index * 4..index * 4 + 4].copy_from_slice(&value.to_ne_bytes());
}

/// Per-byte floor average of two pixels
#[inline]
pub(crate) fn average(a: u32, b: u32) -> u32 {
    (a & b) + (((a ^ b) & 0xFEFE_FEFE) >> 1)
}

#[inline]
fn shade(table: &[u8; 256], pixel: u32) -> u32 {
    let r = table[(pixel >> 16 & 0xFF) as usize] as u32;
    let g = table[(pixel >> 8 & 0xFF) as usize] as u32;
    let b = table[(pixel & 0xFF) as usize] as u32;
    (pixel & 0xFF00_0000) | (r << 16) | (g << 8) | b
}

/// Nearest-neighbour enlargement by an integer factor
fn stretch(src: &[u8], dst: &mut [u8], width: usize, height: usize, scale: usize) {
    let src_row = width * 4;
    let dst_row = width * scale * 4;
    for y in 0..height {
        let line = &src[y * src_row..(y + 1) * src_row];
        let first = y * scale * dst_row;
        let out = &mut dst[first..first + dst_row];
        for (pixel, run) in line.chunks_exact(4).zip(out.chunks_exact_mut(4 * scale)) {
            for slot in run.chunks_exact_mut(4) {
                slot.copy_from_slice(pixel);
            }
        }
        for k in 1..scale {
            dst.copy_within(first..first + dst_row, first + k * dst_row);
        }
    }
}

pub fn stretch1x(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    stretch(src, dst, width, height, 1);
}

pub fn stretch2x(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    stretch(src, dst, width, height, 2);
}

pub fn stretch3x(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    stretch(src, dst, width, height, 3);
}

pub fn stretch4x(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    stretch(src, dst, width, height, 4);
}

/// 2x with every second output row blanked to black
pub fn scanlines(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    let out_width = width * 2;
    for y in 0..height {
        for x in 0..width {
            let pixel = read(src, y * width + x);
            let top = (2 * y) * out_width + 2 * x;
            let bottom = top + out_width;
            write(dst, top, pixel);
            write(dst, top + 1, pixel);
            write(dst, bottom, pixel & 0xFF00_0000);
            write(dst, bottom + 1, pixel & 0xFF00_0000);
        }
    }
}

/// 2x with horizontal smoothing and a shaded copy of each line below it
pub fn tv_mode(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    let table = shade_table();
    let out_width = width * 2;
    for y in 0..height {
        for x in 0..width {
            let pixel = read(src, y * width + x);
            let right = read(src, y * width + (x + 1).min(width - 1));
            let between = average(pixel, right);
            let top = (2 * y) * out_width + 2 * x;
            let bottom = top + out_width;
            write(dst, top, pixel);
            write(dst, top + 1, between);
            write(dst, bottom, shade(table, pixel));
            write(dst, bottom + 1, shade(table, between));
        }
    }
}

/// 2x blocks with a shaded grid on the right column and bottom row
pub fn pixelate(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    let table = shade_table();
    let out_width = width * 2;
    for y in 0..height {
        for x in 0..width {
            let pixel = read(src, y * width + x);
            let dark = shade(table, pixel);
            let top = (2 * y) * out_width + 2 * x;
            let bottom = top + out_width;
            write(dst, top, pixel);
            write(dst, top + 1, dark);
            write(dst, bottom, dark);
            write(dst, bottom + 1, dark);
        }
    }
}

/// 2x bilinear interpolation between each pixel and its right/lower neighbours
pub fn bilinear(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    let out_width = width * 2;
    for y in 0..height {
        let below = (y + 1).min(height - 1);
        for x in 0..width {
            let right = (x + 1).min(width - 1);
            let e = read(src, y * width + x);
            let f = read(src, y * width + right);
            let h = read(src, below * width + x);
            let i = read(src, below * width + right);
            let top = (2 * y) * out_width + 2 * x;
            let bottom = top + out_width;
            write(dst, top, e);
            write(dst, top + 1, average(e, f));
            write(dst, bottom, average(e, h));
            write(dst, bottom + 1, average(average(e, f), average(h, i)));
        }
    }
}

/// AdvanceMAME Scale2x edge-preserving enlargement
pub fn scale2x(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    let out_width = width * 2;
    for y in 0..height {
        let above = y.saturating_sub(1);
        let below = (y + 1).min(height - 1);
        for x in 0..width {
            let left = x.saturating_sub(1);
            let right = (x + 1).min(width - 1);
            let b = read(src, above * width + x);
            let d = read(src, y * width + left);
            let e = read(src, y * width + x);
            let f = read(src, y * width + right);
            let h = read(src, below * width + x);

            let (e0, e1, e2, e3) = if b != h && d != f {
                (
                    if d == b { d } else { e },
                    if b == f { f } else { e },
                    if d == h { d } else { e },
                    if h == f { f } else { e },
                )
            } else {
                (e, e, e, e)
            };

            let top = (2 * y) * out_width + 2 * x;
            let bottom = top + out_width;
            write(dst, top, e0);
            write(dst, top + 1, e1);
            write(dst, bottom, e2);
            write(dst, bottom + 1, e3);
        }
    }
}
