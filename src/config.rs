// Configuration management
//
// Handles video pipeline settings and their persistence as TOML.

use crate::blend::BlendId;
use crate::display::osd::DEFAULT_MESSAGE_DURATION;
use crate::display::{ColorDepth, OsdState, WindowConfig};
use crate::filter::FilterId;
use crate::pipeline::{ConfigError, PipelineSettings};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Default configuration file path
pub const CONFIG_FILE: &str = "frameband.toml";

/// Upper bound for the default worker count
const MAX_DEFAULT_THREADS: usize = 8;

/// Video pipeline configuration
///
/// Stores all user-configurable settings for filtering and presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Enlargement filter
    pub filter: FilterId,

    /// Inter-frame blend
    pub blend: BlendId,

    /// Band worker threads (0 filters on the presenting thread)
    pub threads: usize,

    /// Source pixel depth in bits (16, 24 or 32)
    pub color_depth: u32,

    /// Window scale relative to the source (1-8)
    pub window_scale: u32,

    /// Target FPS
    pub fps: u32,

    /// Enable VSync
    pub vsync: bool,

    /// Directory for PNG snapshots
    pub snapshot_dir: PathBuf,

    /// On-screen display settings
    pub osd: OsdConfig,
}

/// On-screen display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsdConfig {
    /// Mix text into the picture instead of drawing a backdrop
    pub transparent: bool,

    /// Show timed messages
    pub show_messages: bool,

    /// How long a message stays on screen
    pub message_seconds: f32,
}

/// Worker count used when none is configured
pub fn default_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_THREADS)
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            filter: FilterId::None,
            blend: BlendId::None,
            threads: default_threads(),
            color_depth: 32,
            window_scale: 3,
            fps: 60,
            vsync: true,
            snapshot_dir: PathBuf::from("snapshots"),
            osd: OsdConfig::default(),
        }
    }
}

impl Default for OsdConfig {
    fn default() -> Self {
        OsdConfig {
            transparent: false,
            show_messages: true,
            message_seconds: 3.0,
        }
    }
}

impl VideoConfig {
    /// Load configuration from file or create default
    ///
    /// If the configuration file doesn't exist, creates a default configuration
    /// and saves it to the file. A file that exists but cannot be read or
    /// parsed is left untouched and the defaults are used for this run.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use frameband::config::VideoConfig;
    ///
    /// let config = VideoConfig::load_or_default("frameband.toml");
    /// ```
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("could not write default config to '{}': {}", path.display(), e);
                }
                config
            }
            Err(e) => {
                warn!("ignoring config '{}': {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, io::Error> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), io::Error> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }

    /// Pipeline settings for a source of the given size
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownDepth` for a color depth other than 16, 24
    /// or 32 bits. Filter and worker validation happens in `configure`.
    pub fn pipeline_settings(
        &self,
        width: usize,
        height: usize,
    ) -> Result<PipelineSettings, ConfigError> {
        Ok(PipelineSettings::new(width, height)
            .with_filter(self.filter)
            .with_blend(self.blend)
            .with_workers(self.threads)
            .with_depth(ColorDepth::from_bits(self.color_depth)?))
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig::new()
            .with_scale(self.window_scale)
            .with_fps(self.fps)
            .with_vsync(self.vsync)
    }

    pub fn osd_state(&self) -> OsdState {
        OsdState::new()
            .with_transparent(self.osd.transparent)
            .with_messages(self.osd.show_messages)
            .with_duration(
                Duration::try_from_secs_f32(self.osd.message_seconds.max(0.0))
                    .unwrap_or(DEFAULT_MESSAGE_DURATION),
            )
    }
}
