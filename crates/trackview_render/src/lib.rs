//! # trackview_render - Frame Content and Shadow Setup
//!
//! Backend-agnostic rendering pieces of the trackview frame pipeline:
//! - [`Frame`]: camera matrices and render items for one tick
//! - [`GraphicsDevice`]: the seam to the actual GPU submission layer
//! - [`ProfilingState`]: per-sequence and per-cascade primitive counters
//! - [`shadow`]: shadow settings and cascade partitioning
//!
//! Scheduling of frames across threads lives in `trackview_kernel`.

pub mod device;
pub mod frame;
pub mod shadow;
pub mod stats;

pub use device::{DeviceError, GraphicsDevice, HeadlessDevice};
pub use frame::{CameraMatrices, Frame, PrimitiveId, RenderItem, RenderSequence};
pub use shadow::{
    configure_cascades, CascadeParameters, ShadowCascadeSet, ShadowError, ShadowSettings,
    MAX_CASCADES,
};
pub use stats::{PrimitiveCounters, ProfilingState};

/// Commonly used types
pub mod prelude {
    pub use crate::device::{DeviceError, GraphicsDevice};
    pub use crate::frame::{Frame, PrimitiveId, RenderItem, RenderSequence};
    pub use crate::shadow::{ShadowCascadeSet, ShadowSettings};
    pub use crate::stats::ProfilingState;
}
