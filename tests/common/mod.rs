// Common test utilities for pipeline integration tests
//
// Frame generators and reference runs shared by the integration suites.

#![allow(dead_code)]

use frameband::{FilterId, FramePipeline, PipelineSettings};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Geometry used by the soak tests
pub const SOAK_WIDTH: usize = 64;
pub const SOAK_HEIGHT: usize = 48;

/// Filters whose output rows depend only on the matching source row
///
/// These give the same result no matter how the frame is split into bands.
pub const ROW_LOCAL_FILTERS: [FilterId; 8] = [
    FilterId::None,
    FilterId::Stretch1x,
    FilterId::Stretch2x,
    FilterId::Stretch3x,
    FilterId::Stretch4x,
    FilterId::Scanlines,
    FilterId::TvMode,
    FilterId::Pixelate,
];

/// Deterministic generator so failures can be reproduced
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Frame of random 32-bit pixels
pub fn noise_frame(rng: &mut StdRng, width: usize, height: usize) -> Vec<u8> {
    let mut frame = vec![0u8; width * height * 4];
    rng.fill(&mut frame[..]);
    frame
}

/// Frame with every 32-bit pixel set to `value`
pub fn filled_frame(width: usize, height: usize, value: u32) -> Vec<u8> {
    value.to_ne_bytes().repeat(width * height)
}

/// Configure a pipeline, panicking on error
pub fn pipeline(settings: PipelineSettings) -> FramePipeline {
    let mut pipeline = FramePipeline::new();
    pipeline
        .configure(settings)
        .unwrap_or_else(|e| panic!("configure {:?} failed: {}", settings, e));
    pipeline
}

/// Deliver a frame and return an owned copy of the result
pub fn deliver(pipeline: &mut FramePipeline, source: &[u8]) -> Vec<u8> {
    pipeline
        .deliver_frame(source)
        .unwrap_or_else(|e| panic!("deliver_frame failed: {}", e))
        .pixels()
        .to_vec()
}
