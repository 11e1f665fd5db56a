//! Shadow Configuration
//!
//! User-facing shadow settings and the rules that turn them into an effective
//! cascade count for the active shader tier.

use serde::{Deserialize, Serialize};

use super::cascade::{CascadeParameters, MAX_CASCADES};
use super::ShadowError;

/// Lowest shader model that can sample a shadow map at all
pub const MIN_SHADOW_SHADER_MODEL: u32 = 2;

/// Lowest shader model that supports more than one cascade
pub const MULTI_CASCADE_SHADER_MODEL: u32 = 3;

/// Camera near plane used for shadow partitioning
pub const SHADOW_NEAR_PLANE: f32 = 0.5;

/// Shadow settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Enable dynamic shadows
    pub dynamic_shadows: bool,

    /// Requested cascade count (negative values disable shadows)
    pub shadow_map_count: i32,

    /// Explicit shadow distance (0 = half the viewing distance)
    pub shadow_map_distance: f32,

    /// Shader model tier of the graphics device
    pub shader_model: u32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            dynamic_shadows: true,
            shadow_map_count: 4,
            shadow_map_distance: 0.0,
            shader_model: MULTI_CASCADE_SHADER_MODEL,
        }
    }
}

impl ShadowSettings {
    /// Create a configuration with shadows disabled
    pub fn disabled() -> Self {
        Self {
            dynamic_shadows: false,
            ..Default::default()
        }
    }

    /// Clamp values to valid ranges
    pub fn validate(&mut self) {
        self.shadow_map_count = self.shadow_map_count.clamp(0, MAX_CASCADES as i32);
        if !self.shadow_map_distance.is_finite() || self.shadow_map_distance < 0.0 {
            self.shadow_map_distance = 0.0;
        }
    }

    /// Cascade count the pipeline will actually run with
    ///
    /// Fails when shadows were requested but the shader tier cannot sample a
    /// shadow map at all.
    pub fn effective_cascade_count(&self) -> Result<u32, ShadowError> {
        if !self.dynamic_shadows || self.shadow_map_count <= 0 {
            return Ok(0);
        }
        if self.shader_model < MIN_SHADOW_SHADER_MODEL {
            return Err(ShadowError::UnsupportedShaderModel {
                shader_model: self.shader_model,
                requested: self.shadow_map_count,
            });
        }
        if self.shader_model < MULTI_CASCADE_SHADER_MODEL {
            return Ok(1);
        }
        Ok((self.shadow_map_count as u32).min(MAX_CASCADES as u32))
    }

    /// Build configurator inputs for the current frustum
    pub fn cascade_parameters(
        &self,
        fov_degrees: f32,
        aspect_ratio: f32,
        viewing_distance: f32,
    ) -> Result<CascadeParameters, ShadowError> {
        Ok(CascadeParameters {
            count: self.effective_cascade_count()?,
            fov_radians: fov_degrees.to_radians(),
            aspect_ratio,
            near_plane: SHADOW_NEAR_PLANE,
            viewing_distance,
            shadow_distance: self.shadow_map_distance,
        })
    }
}
