//! Demo scene
//!
//! A camera orbiting a grid of track-side objects. Enough content to exercise
//! every draw sequence and every shadow cascade.

use glam::{Mat4, Vec3};
use trackview_kernel::{ElapsedTime, FramePreparer, PrepareError, ScreenListener, Subsystem};
use trackview_render::{Frame, PrimitiveId, RenderItem, RenderSequence, ShadowCascadeSet};

const GRID_SIZE: i32 = 8;
const GRID_SPACING: f32 = 40.0;
const ORBIT_RADIUS: f32 = 180.0;
const ORBIT_HEIGHT: f32 = 25.0;
const ORBIT_SPEED: f32 = 0.2;
const NEAR_PLANE: f32 = 0.5;

/// Orbiting camera over a static grid
pub struct DemoScene {
    fov_radians: f32,
    aspect_ratio: f32,
    viewing_distance: f32,
    clock: f32,
}

impl DemoScene {
    pub fn new(fov_degrees: f32, aspect_ratio: f32, viewing_distance: f32) -> Self {
        Self {
            fov_radians: fov_degrees.to_radians(),
            aspect_ratio,
            viewing_distance,
            clock: 0.0,
        }
    }

    fn camera(&self) -> (Mat4, Mat4) {
        let angle = self.clock * ORBIT_SPEED;
        let eye = Vec3::new(
            ORBIT_RADIUS * angle.cos(),
            ORBIT_HEIGHT,
            ORBIT_RADIUS * angle.sin(),
        );
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(
            self.fov_radians,
            self.aspect_ratio,
            NEAR_PLANE,
            self.viewing_distance,
        );
        (view, projection)
    }
}

impl FramePreparer for DemoScene {
    fn prepare_frame(
        &mut self,
        frame: &mut Frame,
        elapsed: ElapsedTime,
        shadows: &ShadowCascadeSet,
    ) -> Result<(), PrepareError> {
        self.clock += elapsed.clock_seconds;
        let (view, projection) = self.camera();
        frame.set_camera(view, projection);

        frame.add_item(RenderItem::new(PrimitiveId(0), RenderSequence::Sky, Mat4::IDENTITY));

        let half = GRID_SIZE / 2;
        let mut id = 1;
        for x in -half..half {
            for z in -half..half {
                let position = Vec3::new(x as f32 * GRID_SPACING, 0.0, z as f32 * GRID_SPACING);
                let item = RenderItem::new(
                    PrimitiveId(id),
                    RenderSequence::World,
                    Mat4::from_translation(position),
                );
                id += 1;
                frame.add_item(item);

                // Right-handed view space looks down -Z
                let depth = -view.transform_point3(position).z;
                if depth < NEAR_PLANE {
                    continue;
                }
                if let Some(cascade) = shadows.cascade_for_depth(depth) {
                    frame.add_shadow_caster(cascade, item);
                }
            }
        }

        frame.add_item(RenderItem::new(PrimitiveId(id), RenderSequence::Overlay, Mat4::IDENTITY));
        Ok(())
    }
}

/// Logs screen changes
pub struct LogScreenListener;

impl ScreenListener for LogScreenListener {
    fn screen_changed(&mut self, width: u32, height: u32) {
        log::info!("Screen changed to {}x{}", width, height);
    }
}

/// Stand-in for a collaborator the shutdown cascade stops
pub struct DemoSubsystem {
    name: &'static str,
}

impl DemoSubsystem {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Subsystem for DemoSubsystem {
    fn name(&self) -> &str {
        self.name
    }

    fn stop(&mut self) {
        log::info!("{} stopped", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackview_render::{configure_cascades, CascadeParameters};

    #[test]
    fn test_demo_scene_fills_frame() {
        let shadows = configure_cascades(&CascadeParameters {
            count: 4,
            fov_radians: 45f32.to_radians(),
            aspect_ratio: 4.0 / 3.0,
            near_plane: 0.5,
            viewing_distance: 2000.0,
            shadow_distance: 0.0,
        })
        .unwrap();

        let mut scene = DemoScene::new(45.0, 4.0 / 3.0, 2000.0);
        let mut frame = Frame::new(0, shadows.count());
        scene
            .prepare_frame(&mut frame, ElapsedTime::new(0.016, 0.016), &shadows)
            .unwrap();

        assert!(frame.camera().is_some());
        assert_eq!(frame.items(RenderSequence::Sky).len(), 1);
        assert_eq!(frame.items(RenderSequence::World).len(), (GRID_SIZE * GRID_SIZE) as usize);
        assert_eq!(frame.items(RenderSequence::Overlay).len(), 1);

        let casters: usize = (0..shadows.count()).map(|c| frame.shadow_casters(c).len()).sum();
        assert!(casters > 0);
    }
}
