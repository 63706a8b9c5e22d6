// Blend catalog - Static registry of inter-frame blend filters
//
// A blend combines the current frame with state accumulated from earlier
// frames. Each entry may provide a 16-bit and a 32-bit variant; "no blending"
// is an explicit entry with no transform at all.

pub mod kernels;

use crate::display::ColorDepth;
use crate::pipeline::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Blend transform: reads `src`, updates `accum` in place
pub type BlendFn = fn(src: &[u8], accum: &mut [u8], width: usize, height: usize);

/// Inter-frame blend identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendId {
    #[default]
    None,
    MotionBlur,
    Smart,
}

impl BlendId {
    pub const ALL: [BlendId; 3] = [BlendId::None, BlendId::MotionBlur, BlendId::Smart];

    /// Look up a blend by catalog index
    pub fn from_index(index: usize) -> Result<Self, ConfigError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ConfigError::UnknownBlend(index))
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn key(self) -> &'static str {
        match self {
            BlendId::None => "none",
            BlendId::MotionBlur => "motion-blur",
            BlendId::Smart => "smart",
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

impl FromStr for BlendId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownBlendName(s.to_string()))
    }
}

impl std::fmt::Display for BlendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(name_of(*self))
    }
}

/// Catalog entry for one blend
#[derive(Debug)]
pub struct BlendDescriptor {
    pub id: BlendId,
    pub name: &'static str,
    pub transform16: Option<BlendFn>,
    pub transform32: Option<BlendFn>,
}

static BLENDS: [BlendDescriptor; 3] = [
    BlendDescriptor {
        id: BlendId::None,
        name: "No interframe blending",
        transform16: None,
        transform32: None,
    },
    BlendDescriptor {
        id: BlendId::MotionBlur,
        name: "Interframe motion blur",
        transform16: Some(kernels::motion_blur16),
        transform32: Some(kernels::motion_blur32),
    },
    BlendDescriptor {
        id: BlendId::Smart,
        name: "Smart interframe blending",
        transform16: Some(kernels::smart16),
        transform32: Some(kernels::smart32),
    },
];

pub fn descriptor(id: BlendId) -> &'static BlendDescriptor {
    let entry = &BLENDS[id.index()];
    debug_assert_eq!(entry.id, id, "blend table out of order");
    entry
}

pub fn name_of(id: BlendId) -> &'static str {
    descriptor(id).name
}

/// Select the blend variant for `depth`
///
/// Returns `Ok(None)` for "no blending".
///
/// # Errors
/// Returns `ConfigError::UnsupportedDepth` when the blend has no variant for
/// the requested depth.
pub fn activate(id: BlendId, depth: ColorDepth) -> Result<Option<BlendFn>, ConfigError> {
    let entry = descriptor(id);
    if id == BlendId::None {
        return Ok(None);
    }

    let variant = match depth {
        ColorDepth::Bits16 => entry.transform16,
        ColorDepth::Bits24 => None,
        ColorDepth::Bits32 => entry.transform32,
    };

    variant.map(Some).ok_or(ConfigError::UnsupportedDepth {
        name: entry.name,
        depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity_at_every_depth() {
        for depth in [ColorDepth::Bits16, ColorDepth::Bits24, ColorDepth::Bits32] {
            assert!(activate(BlendId::None, depth).unwrap().is_none());
        }
    }

    #[test]
    fn test_depth_selects_variant() {
        let blur32 = activate(BlendId::MotionBlur, ColorDepth::Bits32)
            .unwrap()
            .unwrap();
        let blur16 = activate(BlendId::MotionBlur, ColorDepth::Bits16)
            .unwrap()
            .unwrap();
        let mut accum32 = 0xFF00_0000u32.to_ne_bytes();
        blur32(&0xFF00_00FEu32.to_ne_bytes(), &mut accum32, 1, 1);
        assert_eq!(u32::from_ne_bytes(accum32), 0xFF00_007F);

        // the 16-bit variant consumes two bytes per pixel
        let mut accum16 = 0x0000u16.to_ne_bytes();
        blur16(&0xFFFFu16.to_ne_bytes(), &mut accum16, 1, 1);
        assert_eq!(u16::from_ne_bytes(accum16), 0x7BEF);
    }

    #[test]
    fn test_24_bit_blend_is_rejected() {
        assert!(matches!(
            activate(BlendId::Smart, ColorDepth::Bits24),
            Err(ConfigError::UnsupportedDepth { .. })
        ));
    }

    #[test]
    fn test_lookup() {
        assert_eq!(BlendId::from_index(1).unwrap(), BlendId::MotionBlur);
        assert!(BlendId::from_index(3).is_err());
        assert_eq!("motion-blur".parse::<BlendId>().unwrap(), BlendId::MotionBlur);
        assert_eq!(name_of(BlendId::Smart), "Smart interframe blending");
    }
}
