// Filter catalog - Static registry of enlargement filters
//
// Each filter has a display name, an enlargement factor (1x-4x), a 32-bit
// pixel transform and an optional one-time initializer. The table is fixed
// at compile time and never mutated.

pub mod kernels;

use crate::display::ColorDepth;
use crate::pipeline::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Pixel transform: `src` holds `width × height` 32-bit pixels, `dst` holds
/// the same area enlarged by the filter's factor
pub type FilterFn = fn(src: &[u8], dst: &mut [u8], width: usize, height: usize);

/// One-time initializer run when a filter is activated
pub type FilterInitFn = fn(depth: ColorDepth, src_width: usize);

/// Filter identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterId {
    /// No filter; frames are copied unchanged
    #[default]
    None,
    Stretch1x,
    Stretch2x,
    Stretch3x,
    Stretch4x,
    Scanlines,
    TvMode,
    Pixelate,
    Bilinear,
    Scale2x,
}

impl FilterId {
    /// All filters in catalog order
    pub const ALL: [FilterId; 10] = [
        FilterId::None,
        FilterId::Stretch1x,
        FilterId::Stretch2x,
        FilterId::Stretch3x,
        FilterId::Stretch4x,
        FilterId::Scanlines,
        FilterId::TvMode,
        FilterId::Pixelate,
        FilterId::Bilinear,
        FilterId::Scale2x,
    ];

    /// Look up a filter by catalog index
    pub fn from_index(index: usize) -> Result<Self, ConfigError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ConfigError::UnknownFilter(index))
    }

    /// Position of this filter in the catalog
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name used in configuration files and on the command line
    pub fn key(self) -> &'static str {
        match self {
            FilterId::None => "none",
            FilterId::Stretch1x => "stretch1x",
            FilterId::Stretch2x => "stretch2x",
            FilterId::Stretch3x => "stretch3x",
            FilterId::Stretch4x => "stretch4x",
            FilterId::Scanlines => "scanlines",
            FilterId::TvMode => "tv-mode",
            FilterId::Pixelate => "pixelate",
            FilterId::Bilinear => "bilinear",
            FilterId::Scale2x => "scale2x",
        }
    }

    /// The filter after this one, wrapping around
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

impl FromStr for FilterId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownFilterName(s.to_string()))
    }
}

impl std::fmt::Display for FilterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(name_of(*self))
    }
}

/// Catalog entry for one filter
#[derive(Debug)]
pub struct FilterDescriptor {
    pub id: FilterId,
    pub name: &'static str,
    pub enlarge_factor: usize,
    /// `None` for the identity filter
    pub transform: Option<FilterFn>,
    pub init: Option<FilterInitFn>,
}

static FILTERS: [FilterDescriptor; 10] = [
    FilterDescriptor {
        id: FilterId::None,
        name: "None",
        enlarge_factor: 1,
        transform: None,
        init: None,
    },
    FilterDescriptor {
        id: FilterId::Stretch1x,
        name: "Stretch 1x",
        enlarge_factor: 1,
        transform: Some(kernels::stretch1x),
        init: None,
    },
    FilterDescriptor {
        id: FilterId::Stretch2x,
        name: "Stretch 2x",
        enlarge_factor: 2,
        transform: Some(kernels::stretch2x),
        init: None,
    },
    FilterDescriptor {
        id: FilterId::Stretch3x,
        name: "Stretch 3x",
        enlarge_factor: 3,
        transform: Some(kernels::stretch3x),
        init: None,
    },
    FilterDescriptor {
        id: FilterId::Stretch4x,
        name: "Stretch 4x",
        enlarge_factor: 4,
        transform: Some(kernels::stretch4x),
        init: None,
    },
    FilterDescriptor {
        id: FilterId::Scanlines,
        name: "Scanlines",
        enlarge_factor: 2,
        transform: Some(kernels::scanlines),
        init: None,
    },
    FilterDescriptor {
        id: FilterId::TvMode,
        name: "TV Mode",
        enlarge_factor: 2,
        transform: Some(kernels::tv_mode),
        init: Some(kernels::init_shade_table),
    },
    FilterDescriptor {
        id: FilterId::Pixelate,
        name: "Pixelate",
        enlarge_factor: 2,
        transform: Some(kernels::pixelate),
        init: Some(kernels::init_shade_table),
    },
    FilterDescriptor {
        id: FilterId::Bilinear,
        name: "Bilinear",
        enlarge_factor: 2,
        transform: Some(kernels::bilinear),
        init: None,
    },
    FilterDescriptor {
        id: FilterId::Scale2x,
        name: "AdvanceMAME Scale2x",
        enlarge_factor: 2,
        transform: Some(kernels::scale2x),
        init: None,
    },
];

/// Get the catalog entry for a filter
pub fn descriptor(id: FilterId) -> &'static FilterDescriptor {
    let entry = &FILTERS[id.index()];
    debug_assert_eq!(entry.id, id, "filter table out of order");
    entry
}

/// Enlargement factor of a filter
pub fn enlarge_factor_of(id: FilterId) -> usize {
    descriptor(id).enlarge_factor
}

/// Display name of a filter
pub fn name_of(id: FilterId) -> &'static str {
    descriptor(id).name
}

/// Prepare a filter for use and return its transform
///
/// Runs the filter's initializer, if any. Returns `Ok(None)` for the identity
/// filter; the caller copies frames unchanged in that case.
///
/// # Errors
/// Returns `ConfigError::UnsupportedDepth` when a real filter is requested for
/// anything other than 32-bit pixels.
pub fn activate(
    id: FilterId,
    depth: ColorDepth,
    src_width: usize,
) -> Result<Option<FilterFn>, ConfigError> {
    let entry = descriptor(id);
    let Some(transform) = entry.transform else {
        return Ok(None);
    };

    if depth != ColorDepth::Bits32 {
        return Err(ConfigError::UnsupportedDepth {
            name: entry.name,
            depth,
        });
    }

    if let Some(init) = entry.init {
        init(depth, src_width);
    }

    Ok(Some(transform))
}
