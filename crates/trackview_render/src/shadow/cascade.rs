//! Cascaded Shadow Map Partitioning
//!
//! Splits the shadowed part of the view frustum into up to [`MAX_CASCADES`]
//! slices and derives, for each slice, the bounding sphere that its shadow
//! map has to cover. The result is a plain owned [`ShadowCascadeSet`] that is
//! handed to frame preparation; nothing here is global.
//!
//! # Split scheme
//!
//! Boundaries use the practical split scheme weighted 3:1 towards the
//! logarithmic split:
//!
//! ```text
//! Clog(i)     = n * (f/n)^(i/m)
//! Cuniform(i) = n + (f-n) * i/m
//! C(i)        = (3 * Clog(i) + Cuniform(i)) / 4
//! ```
//!
//! The math runs in `f64` and is narrowed only when stored. The last boundary
//! is pinned to the far edge exactly.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::ShadowError;

/// Maximum supported cascade count
pub const MAX_CASCADES: usize = 4;

/// Weight of the logarithmic split in the blended boundary
const LOG_SPLIT_WEIGHT: f64 = 3.0;

/// Inputs of the cascade configurator
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeParameters {
    /// Requested cascade count (clamped to `MAX_CASCADES`)
    pub count: u32,
    /// Vertical field of view in radians
    pub fov_radians: f32,
    /// Viewport width / height
    pub aspect_ratio: f32,
    /// Camera near plane
    pub near_plane: f32,
    /// Camera viewing distance
    pub viewing_distance: f32,
    /// Explicit shadow distance (0 = half the viewing distance)
    pub shadow_distance: f32,
}

impl CascadeParameters {
    /// Far edge of the shadowed range
    pub fn far_plane(&self) -> f32 {
        if self.shadow_distance > 0.0 {
            self.shadow_distance
        } else {
            self.viewing_distance / 2.0
        }
    }

    /// Effective cascade count after clamping
    pub fn clamped_count(&self) -> usize {
        (self.count as usize).min(MAX_CASCADES)
    }

    fn validate(&self) -> Result<(), ShadowError> {
        let near = self.near_plane;
        let far = self.far_plane();

        if !self.fov_radians.is_finite()
            || self.fov_radians <= 0.0
            || self.fov_radians >= std::f32::consts::PI
        {
            return Err(ShadowError::InvalidFieldOfView(self.fov_radians));
        }
        if !self.aspect_ratio.is_finite() || self.aspect_ratio <= 0.0 {
            return Err(ShadowError::InvalidAspectRatio(self.aspect_ratio));
        }
        if !near.is_finite() || !far.is_finite() || near <= 0.0 || far <= near {
            return Err(ShadowError::InvalidRange { near, far });
        }
        Ok(())
    }
}

/// Per-cascade shadow map placement
///
/// Parallel arrays indexed by cascade. `limit` is strictly increasing and its
/// last entry equals the far edge of the shadowed range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowCascadeSet {
    distance: Vec<i32>,
    diameter: Vec<i32>,
    limit: Vec<f32>,
}

impl ShadowCascadeSet {
    /// A set with shadows disabled
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Number of cascades
    pub fn count(&self) -> usize {
        self.limit.len()
    }

    /// Whether shadows are disabled
    pub fn is_empty(&self) -> bool {
        self.limit.is_empty()
    }

    /// Distance of each cascade's sphere center from the camera
    pub fn distance(&self) -> &[i32] {
        &self.distance
    }

    /// Diameter of each cascade's bounding sphere
    pub fn diameter(&self) -> &[i32] {
        &self.diameter
    }

    /// Far edge of each cascade along the view axis
    pub fn limit(&self) -> &[f32] {
        &self.limit
    }

    /// Get the cascade covering a given view-space depth
    pub fn cascade_for_depth(&self, view_depth: f32) -> Option<usize> {
        self.limit.iter().position(|&limit| view_depth < limit)
    }
}

/// Compute cascade placement for the given frustum and shadow settings
///
/// A count of zero yields an empty set without inspecting the frustum
/// parameters.
pub fn configure_cascades(params: &CascadeParameters) -> Result<ShadowCascadeSet, ShadowError> {
    let count = params.clamped_count();
    if count == 0 {
        return Ok(ShadowCascadeSet::disabled());
    }
    params.validate()?;

    let near = params.near_plane as f64;
    let far = params.far_plane() as f64;
    let tan_half_fov = (params.fov_radians as f64 / 2.0).tan();
    let aspect = params.aspect_ratio as f64;
    let m = count as f64;

    let mut set = ShadowCascadeSet {
        distance: Vec::with_capacity(count),
        diameter: Vec::with_capacity(count),
        limit: Vec::with_capacity(count),
    };

    let mut last_split = near;
    for index in 0..count {
        let i = (index + 1) as f64;
        let split = if index + 1 == count {
            far
        } else {
            let log_split = near * (far / near).powf(i / m);
            let uniform_split = near + (far - near) * i / m;
            (LOG_SPLIT_WEIGHT * log_split + uniform_split) / (LOG_SPLIT_WEIGHT + 1.0)
        };

        let near_corner = frustum_corner(tan_half_fov, aspect, last_split);
        let far_corner = frustum_corner(tan_half_fov, aspect, split);

        // The slice is symmetric around the view axis, so the centroid of its
        // eight corners sits on the axis halfway between the two boundaries.
        let center = DVec3::new(0.0, 0.0, (last_split + split) / 2.0);
        let radius = far_corner
            .distance(center)
            .max(near_corner.distance(center));

        set.distance.push(center.z.round() as i32);
        set.diameter.push((2.0 * radius).ceil() as i32);
        set.limit.push(split as f32);

        last_split = split;
    }

    log::debug!(
        "Configured {} shadow cascades up to {:.1}: limits {:?}",
        count,
        far,
        set.limit
    );

    Ok(set)
}

/// Upper-right frustum corner at view-axis depth `z`
fn frustum_corner(tan_half_fov: f64, aspect: f64, z: f64) -> DVec3 {
    let height = tan_half_fov * z;
    DVec3::new(height * aspect, height, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn params(count: u32) -> CascadeParameters {
        CascadeParameters {
            count,
            fov_radians: 60f32.to_radians(),
            aspect_ratio: 4.0 / 3.0,
            near_plane: 0.5,
            viewing_distance: 2000.0,
            shadow_distance: 0.0,
        }
    }

    #[test]
    fn test_zero_count_is_empty() {
        let set = configure_cascades(&params(0)).unwrap();
        assert!(set.is_empty());
        assert!(set.distance().is_empty());
        assert!(set.diameter().is_empty());
        assert!(set.limit().is_empty());
    }

    #[test]
    fn test_zero_count_ignores_bad_frustum() {
        let mut p = params(0);
        p.near_plane = -1.0;
        assert!(configure_cascades(&p).unwrap().is_empty());
    }

    #[test]
    fn test_four_cascades_reference_frustum() {
        let set = configure_cascades(&params(4)).unwrap();

        assert_eq!(set.count(), 4);
        assert_eq!(set.limit()[3], 1000.0);
        for i in 1..4 {
            assert!(set.distance()[i] > set.distance()[i - 1]);
            assert!(set.limit()[i] > set.limit()[i - 1]);
        }
        for &distance in set.distance() {
            assert!(distance < 1000);
        }
    }

    #[test]
    fn test_first_split_blends_log_and_uniform() {
        let set = configure_cascades(&params(4)).unwrap();

        let log_split = 0.5 * (2000.0f64).powf(0.25);
        let uniform_split = 0.5 + 999.5 / 4.0;
        let expected = (3.0 * log_split + uniform_split) / 4.0;
        assert_relative_eq!(set.limit()[0], expected as f32, epsilon = 1e-3);
    }

    #[test]
    fn test_diameter_covers_far_corners() {
        let p = params(3);
        let set = configure_cascades(&p).unwrap();
        let tan_half = (p.fov_radians / 2.0).tan();

        for i in 0..set.count() {
            let far = set.limit()[i];
            let h = tan_half * far;
            let w = h * p.aspect_ratio;
            let dz = far - set.distance()[i] as f32;
            let reach = 2.0 * (h * h + w * w + dz * dz).sqrt();
            // Rounding the center moves it by at most half a unit.
            assert!(set.diameter()[i] as f32 + 1.5 >= reach);
        }
    }

    #[test]
    fn test_count_clamped_to_max() {
        let set = configure_cascades(&params(9)).unwrap();
        assert_eq!(set.count(), MAX_CASCADES);
    }

    #[test]
    fn test_explicit_shadow_distance() {
        let mut p = params(2);
        p.shadow_distance = 300.0;
        let set = configure_cascades(&p).unwrap();
        assert_eq!(set.limit()[1], 300.0);
    }

    #[test]
    fn test_single_cascade_covers_whole_range() {
        let set = configure_cascades(&params(1)).unwrap();
        assert_eq!(set.limit(), &[1000.0]);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut p = params(4);
        p.near_plane = 0.0;
        assert!(matches!(configure_cascades(&p), Err(ShadowError::InvalidRange { .. })));

        let mut p = params(4);
        p.viewing_distance = 0.8;
        assert!(matches!(configure_cascades(&p), Err(ShadowError::InvalidRange { .. })));

        let mut p = params(4);
        p.fov_radians = f32::NAN;
        assert!(matches!(configure_cascades(&p), Err(ShadowError::InvalidFieldOfView(_))));

        let mut p = params(4);
        p.aspect_ratio = 0.0;
        assert!(matches!(configure_cascades(&p), Err(ShadowError::InvalidAspectRatio(_))));
    }

    #[test]
    fn test_cascade_for_depth() {
        let set = configure_cascades(&params(4)).unwrap();

        assert_eq!(set.cascade_for_depth(1.0), Some(0));
        assert_eq!(set.cascade_for_depth(set.limit()[1] - 0.01), Some(1));
        assert_eq!(set.cascade_for_depth(999.0), Some(3));
        assert_eq!(set.cascade_for_depth(1500.0), None);
        assert_eq!(ShadowCascadeSet::disabled().cascade_for_depth(1.0), None);
    }

    #[test]
    fn test_configurator_is_pure() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let p = CascadeParameters {
                count: rng.gen_range(1..=MAX_CASCADES as u32),
                fov_radians: rng.gen_range(20.0f32..120.0).to_radians(),
                aspect_ratio: rng.gen_range(0.5f32..3.0),
                near_plane: rng.gen_range(0.1f32..2.0),
                viewing_distance: rng.gen_range(100.0f32..10000.0),
                shadow_distance: if rng.gen_bool(0.5) { rng.gen_range(50.0f32..2000.0) } else { 0.0 },
            };

            let first = configure_cascades(&p).unwrap();
            let second = configure_cascades(&p).unwrap();

            assert_eq!(first.distance(), second.distance());
            assert_eq!(first.diameter(), second.diameter());
            let bits = |set: &ShadowCascadeSet| -> Vec<u32> {
                set.limit().iter().map(|l| l.to_bits()).collect()
            };
            assert_eq!(bits(&first), bits(&second));

            for i in 1..first.count() {
                assert!(first.limit()[i] > first.limit()[i - 1]);
            }
            assert_eq!(*first.limit().last().unwrap(), p.far_plane());
        }
    }

    #[test]
    fn test_cascade_set_serialization() {
        let set = configure_cascades(&params(2)).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let restored: ShadowCascadeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, set);
    }
}
