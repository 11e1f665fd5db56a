//! Shadow Mapping Setup
//!
//! Backend-agnostic cascaded shadow map configuration.
//!
//! # Architecture
//!
//! - **Config**: User shadow settings and shader-tier rules
//! - **Cascade**: Frustum partitioning into cascades
//!
//! # Usage
//!
//! ```ignore
//! use trackview_render::shadow::*;
//!
//! let settings = ShadowSettings::default();
//! let params = settings.cascade_parameters(45.0, 16.0 / 9.0, 2000.0)?;
//! let cascades = configure_cascades(&params)?;
//!
//! for (i, limit) in cascades.limit().iter().enumerate() {
//!     println!("cascade {} ends at {}", i, limit);
//! }
//! ```

pub mod config;
pub mod cascade;

use thiserror::Error;

pub use config::{
    ShadowSettings,
    MIN_SHADOW_SHADER_MODEL,
    MULTI_CASCADE_SHADER_MODEL,
    SHADOW_NEAR_PLANE,
};

pub use cascade::{
    configure_cascades,
    CascadeParameters,
    ShadowCascadeSet,
    MAX_CASCADES,
};

/// Shadow configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShadowError {
    #[error("Invalid shadow range: near {near}, far {far}")]
    InvalidRange { near: f32, far: f32 },

    #[error("Invalid field of view: {0} rad")]
    InvalidFieldOfView(f32),

    #[error("Invalid aspect ratio: {0}")]
    InvalidAspectRatio(f32),

    #[error("Shader model {shader_model} cannot render {requested} shadow cascades")]
    UnsupportedShaderModel { shader_model: u32, requested: i32 },
}
