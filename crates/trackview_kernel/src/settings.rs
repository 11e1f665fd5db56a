//! Viewer settings
//!
//! Settings the frame pipeline reads at startup and whenever the user changes
//! them. Missing keys fall back to defaults.
//!
//! # Example Config File
//!
//! ```toml
//! viewing_fov = 45.0
//! viewing_distance = 2000.0
//! window_size = "1280x720"
//! fullscreen = false
//!
//! [shadows]
//! dynamic_shadows = true
//! shadow_map_count = 4
//! shadow_map_distance = 0.0
//! shader_model = 3
//!
//! [profiling]
//! enabled = true
//! frame_count = 1000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trackview_render::ShadowSettings;

/// Narrowest accepted vertical field of view, degrees
pub const MIN_VIEWING_FOV: f32 = 10.0;

/// Widest accepted vertical field of view, degrees
pub const MAX_VIEWING_FOV: f32 = 120.0;

/// Shortest accepted viewing distance, meters
pub const MIN_VIEWING_DISTANCE: f32 = 1.0;

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid window size '{0}', expected WIDTHxHEIGHT")]
    InvalidWindowSize(String),
}

/// Automatic exit after a profiling run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingSettings {
    /// Enable the profiling exit
    pub enabled: bool,
    /// Exit after this many drawn frames (0 = no limit)
    pub frame_count: u64,
    /// Exit after this many real seconds (0 = no limit)
    pub time_seconds: f32,
}

impl ProfilingSettings {
    /// Check if a limit has been reached
    pub fn limit_reached(&self, frames_drawn: u64, real_seconds: f64) -> bool {
        if !self.enabled {
            return false;
        }
        let frames_done = self.frame_count > 0 && frames_drawn >= self.frame_count;
        let time_done = self.time_seconds > 0.0 && real_seconds >= f64::from(self.time_seconds);
        frames_done || time_done
    }
}

/// Settings consumed by the frame pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Vertical field of view, degrees
    pub viewing_fov: f32,
    /// Viewing distance, meters
    pub viewing_distance: f32,
    /// Wait for vertical blank on present
    pub vertical_sync: bool,
    /// Windowed size as "WIDTHxHEIGHT"
    pub window_size: String,
    /// Start in fullscreen
    pub fullscreen: bool,
    /// Prepare frames on a worker thread
    pub threaded_updater: bool,
    /// Simulated seconds per real second
    pub simulation_rate: f32,
    /// Dynamic shadow settings
    pub shadows: ShadowSettings,
    /// Profiling exit limits
    pub profiling: ProfilingSettings,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            viewing_fov: 45.0,
            viewing_distance: 2000.0,
            vertical_sync: true,
            window_size: "1024x768".to_string(),
            fullscreen: false,
            threaded_updater: true,
            simulation_rate: 1.0,
            shadows: ShadowSettings::default(),
            profiling: ProfilingSettings::default(),
        }
    }
}

impl ViewerSettings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Clamp values to valid ranges and check the window size
    pub fn validate(&mut self) -> Result<(), SettingsError> {
        self.viewing_fov = if self.viewing_fov.is_finite() {
            self.viewing_fov.clamp(MIN_VIEWING_FOV, MAX_VIEWING_FOV)
        } else {
            ViewerSettings::default().viewing_fov
        };
        if !self.viewing_distance.is_finite() || self.viewing_distance < MIN_VIEWING_DISTANCE {
            self.viewing_distance = MIN_VIEWING_DISTANCE;
        }
        if !self.simulation_rate.is_finite() || self.simulation_rate < 0.0 {
            self.simulation_rate = 1.0;
        }
        if !self.profiling.time_seconds.is_finite() || self.profiling.time_seconds < 0.0 {
            self.profiling.time_seconds = 0.0;
        }
        self.shadows.validate();
        self.window_size()?;
        Ok(())
    }

    /// Windowed size in pixels
    pub fn window_size(&self) -> Result<(u32, u32), SettingsError> {
        parse_window_size(&self.window_size)
    }
}

/// Parse a "WIDTHxHEIGHT" string
pub fn parse_window_size(value: &str) -> Result<(u32, u32), SettingsError> {
    let invalid = || SettingsError::InvalidWindowSize(value.to_string());

    let (width, height) = value.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}
