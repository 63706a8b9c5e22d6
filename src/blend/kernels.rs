// Inter-frame blend kernels
//
// Blends update the accumulator in place: on return it holds the blended
// band that the main filter consumes, and it carries the history into the
// next frame.

use crate::filter::kernels::average;

/// Largest per-channel change (8-bit scale) still treated as flicker
pub const SMART_THRESHOLD: u8 = 0x30;

#[inline]
fn average16(a: u16, b: u16) -> u16 {
    (a & b) + (((a ^ b) & 0xF7DE) >> 1)
}

#[inline]
fn channel_delta32(a: u32, b: u32) -> u8 {
    [16, 8, 0]
        .iter()
        .map(|shift| ((a >> shift) as u8).abs_diff((b >> shift) as u8))
        .max()
        .unwrap_or(0)
}

#[inline]
fn channel_delta16(a: u16, b: u16) -> u8 {
    // Compare on an 8-bit scale so one threshold serves both depths
    let r = (((a >> 11) & 0x1F) as u8 * 8).abs_diff(((b >> 11) & 0x1F) as u8 * 8);
    let g = (((a >> 5) & 0x3F) as u8 * 4).abs_diff(((b >> 5) & 0x3F) as u8 * 4);
    let bl = ((a & 0x1F) as u8 * 8).abs_diff((b & 0x1F) as u8 * 8);
    r.max(g).max(bl)
}

fn blend32(src: &[u8], accum: &mut [u8], pick: impl Fn(u32, u32) -> u32) {
    for (s, acc) in src.chunks_exact(4).zip(accum.chunks_exact_mut(4)) {
        let current = u32::from_ne_bytes([s[0], s[1], s[2], s[3]]);
        let previous = u32::from_ne_bytes([acc[0], acc[1], acc[2], acc[3]]);
        acc.copy_from_slice(&pick(current, previous).to_ne_bytes());
    }
}

fn blend16(src: &[u8], accum: &mut [u8], pick: impl Fn(u16, u16) -> u16) {
    for (s, acc) in src.chunks_exact(2).zip(accum.chunks_exact_mut(2)) {
        let current = u16::from_ne_bytes([s[0], s[1]]);
        let previous = u16::from_ne_bytes([acc[0], acc[1]]);
        acc.copy_from_slice(&pick(current, previous).to_ne_bytes());
    }
}

/// Average every pixel with the accumulated history
pub fn motion_blur32(src: &[u8], accum: &mut [u8], width: usize, height: usize) {
    let len = width * height * 4;
    blend32(&src[..len], &mut accum[..len], average);
}

pub fn motion_blur16(src: &[u8], accum: &mut [u8], width: usize, height: usize) {
    let len = width * height * 2;
    blend16(&src[..len], &mut accum[..len], average16);
}

/// Average only small changes; larger ones snap to the new frame
pub fn smart32(src: &[u8], accum: &mut [u8], width: usize, height: usize) {
    let len = width * height * 4;
    blend32(&src[..len], &mut accum[..len], |current, previous| {
        if channel_delta32(current, previous) <= SMART_THRESHOLD {
            average(current, previous)
        } else {
            current
        }
    });
}

pub fn smart16(src: &[u8], accum: &mut [u8], width: usize, height: usize) {
    let len = width * height * 2;
    blend16(&src[..len], &mut accum[..len], |current, previous| {
        if channel_delta16(current, previous) <= SMART_THRESHOLD {
            average16(current, previous)
        } else {
            current
        }
    });
}
