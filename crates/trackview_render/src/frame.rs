//! Frame content
//!
//! A [`Frame`] holds everything needed to draw one tick: the camera matrices
//! and the render items grouped by draw sequence, plus the shadow casters of
//! each cascade. Frames are allocated once and recycled; [`Frame::clear`]
//! keeps the allocations of the item lists.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::device::{DeviceError, GraphicsDevice};
use crate::stats::ProfilingState;

/// Draw order of render items
///
/// Items of an earlier sequence are always drawn before items of a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RenderSequence {
    /// Sky dome and celestial bodies
    Sky,
    /// Opaque world geometry
    World,
    /// Alpha-blended world geometry
    WorldBlended,
    /// Light glows and halos
    Lights,
    /// Rain and snow particles
    Precipitation,
    /// Cab interior
    Interior,
    /// 3D text labels
    Labels,
    /// Screen-space overlay
    Overlay,
}

impl RenderSequence {
    /// Number of sequences
    pub const COUNT: usize = 8;

    /// All sequences in draw order
    pub const ALL: [RenderSequence; Self::COUNT] = [
        Self::Sky,
        Self::World,
        Self::WorldBlended,
        Self::Lights,
        Self::Precipitation,
        Self::Interior,
        Self::Labels,
        Self::Overlay,
    ];

    /// Index in draw order
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Identifier of a primitive owned by the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimitiveId(pub u64);

/// A primitive placed in the world for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    /// Scene primitive to draw
    pub primitive: PrimitiveId,
    /// Draw sequence bucket
    pub sequence: RenderSequence,
    /// World transform
    pub transform: Mat4,
}

impl RenderItem {
    /// Create a render item
    pub fn new(primitive: PrimitiveId, sequence: RenderSequence, transform: Mat4) -> Self {
        Self {
            primitive,
            sequence,
            transform,
        }
    }
}

/// Camera matrices for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub projection: Mat4,
}

impl CameraMatrices {
    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// One double-buffer unit
#[derive(Debug)]
pub struct Frame {
    /// Buffer slot this frame was allocated for
    slot: usize,
    /// Number of times the frame has been cleared
    generation: u64,
    /// Camera for this frame
    camera: Option<CameraMatrices>,
    /// Render items bucketed by sequence
    items: Vec<Vec<RenderItem>>,
    /// Shadow casters per cascade
    shadow_casters: Vec<Vec<RenderItem>>,
}

impl Frame {
    /// Create an empty frame for a buffer slot
    pub fn new(slot: usize, cascade_count: usize) -> Self {
        Self {
            slot,
            generation: 0,
            camera: None,
            items: vec![Vec::new(); RenderSequence::COUNT],
            shadow_casters: vec![Vec::new(); cascade_count],
        }
    }

    /// Get the buffer slot
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Get the clear generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop all content, keeping allocations
    pub fn clear(&mut self) {
        self.generation += 1;
        self.camera = None;
        for bucket in &mut self.items {
            bucket.clear();
        }
        for casters in &mut self.shadow_casters {
            casters.clear();
        }
    }

    /// Change the number of shadow cascades this frame collects casters for
    pub fn set_cascade_count(&mut self, cascade_count: usize) {
        self.shadow_casters.resize_with(cascade_count, Vec::new);
    }

    /// Number of shadow cascades
    pub fn cascade_count(&self) -> usize {
        self.shadow_casters.len()
    }

    /// Set the camera matrices for this frame
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        if self.camera.is_some() {
            log::warn!("Camera set twice on frame slot {}", self.slot);
        }
        self.camera = Some(CameraMatrices { view, projection });
    }

    /// Get the camera matrices
    pub fn camera(&self) -> Option<&CameraMatrices> {
        self.camera.as_ref()
    }

    /// Queue a render item
    pub fn add_item(&mut self, item: RenderItem) {
        self.items[item.sequence.index()].push(item);
    }

    /// Queue a shadow caster for a cascade
    ///
    /// Returns `false` if the cascade does not exist.
    pub fn add_shadow_caster(&mut self, cascade: usize, item: RenderItem) -> bool {
        match self.shadow_casters.get_mut(cascade) {
            Some(casters) => {
                casters.push(item);
                true
            }
            None => false,
        }
    }

    /// Get items of one sequence
    pub fn items(&self, sequence: RenderSequence) -> &[RenderItem] {
        &self.items[sequence.index()]
    }

    /// Get shadow casters of one cascade
    pub fn shadow_casters(&self, cascade: usize) -> &[RenderItem] {
        self.shadow_casters
            .get(cascade)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of render items
    pub fn item_count(&self) -> usize {
        self.items.iter().map(Vec::len).sum()
    }

    /// Check if the frame has nothing to draw
    pub fn is_empty(&self) -> bool {
        self.camera.is_none() && self.item_count() == 0
    }

    /// Submit the frame to a graphics device
    ///
    /// Shadow casters are drawn first, cascade by cascade, then the items in
    /// sequence order. Every submitted primitive is counted in `stats`. A
    /// frame without a camera submits nothing.
    pub fn draw(
        &self,
        device: &mut dyn GraphicsDevice,
        stats: &mut ProfilingState,
    ) -> Result<(), DeviceError> {
        let Some(camera) = self.camera.as_ref() else {
            log::trace!("Frame slot {} has no camera yet, nothing to draw", self.slot);
            return Ok(());
        };

        for (cascade, casters) in self.shadow_casters.iter().enumerate() {
            for item in casters {
                device.draw_shadow_caster(cascade, item)?;
                stats.record_shadow(cascade);
            }
        }

        device.set_camera(camera)?;
        for sequence in RenderSequence::ALL {
            for item in &self.items[sequence.index()] {
                device.draw_item(item)?;
                stats.record(sequence);
            }
        }

        device.present()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;

    fn item(id: u64, sequence: RenderSequence) -> RenderItem {
        RenderItem::new(PrimitiveId(id), sequence, Mat4::IDENTITY)
    }

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(1, 3);
        assert_eq!(frame.slot(), 1);
        assert_eq!(frame.cascade_count(), 3);
        assert!(frame.is_empty());
        assert_eq!(frame.generation(), 0);
    }

    #[test]
    fn test_items_bucketed_by_sequence() {
        let mut frame = Frame::new(0, 0);
        frame.add_item(item(1, RenderSequence::Overlay));
        frame.add_item(item(2, RenderSequence::World));
        frame.add_item(item(3, RenderSequence::World));

        assert_eq!(frame.item_count(), 3);
        assert_eq!(frame.items(RenderSequence::World).len(), 2);
        assert_eq!(frame.items(RenderSequence::Overlay)[0].primitive, PrimitiveId(1));
    }

    #[test]
    fn test_shadow_caster_out_of_range() {
        let mut frame = Frame::new(0, 2);
        assert!(frame.add_shadow_caster(1, item(1, RenderSequence::World)));
        assert!(!frame.add_shadow_caster(2, item(2, RenderSequence::World)));
        assert_eq!(frame.shadow_casters(1).len(), 1);
        assert!(frame.shadow_casters(5).is_empty());
    }

    #[test]
    fn test_clear_resets_content() {
        let mut frame = Frame::new(0, 1);
        frame.set_camera(Mat4::IDENTITY, Mat4::IDENTITY);
        frame.add_item(item(1, RenderSequence::Sky));
        frame.add_shadow_caster(0, item(1, RenderSequence::World));

        frame.clear();

        assert!(frame.is_empty());
        assert!(frame.camera().is_none());
        assert!(frame.shadow_casters(0).is_empty());
        assert_eq!(frame.generation(), 1);
    }

    #[test]
    fn test_draw_order_and_counters() {
        let mut frame = Frame::new(0, 1);
        frame.set_camera(Mat4::IDENTITY, Mat4::IDENTITY);
        frame.add_item(item(3, RenderSequence::Overlay));
        frame.add_item(item(2, RenderSequence::World));
        frame.add_item(item(1, RenderSequence::Sky));
        frame.add_shadow_caster(0, item(2, RenderSequence::World));

        let mut device = HeadlessDevice::new((800, 600));
        let mut stats = ProfilingState::new(1);
        frame.draw(&mut device, &mut stats).unwrap();

        assert_eq!(
            device.drawn(),
            &[PrimitiveId(1), PrimitiveId(2), PrimitiveId(3)]
        );
        assert_eq!(device.shadow_draws(), 1);
        assert_eq!(device.presents(), 1);
        assert_eq!(stats.current().sequence_count(RenderSequence::World), 1);
        assert_eq!(stats.current().shadow_count(0), 1);
    }

    #[test]
    fn test_draw_without_camera_is_noop() {
        let mut frame = Frame::new(0, 0);
        frame.add_item(item(1, RenderSequence::World));

        let mut device = HeadlessDevice::new((800, 600));
        let mut stats = ProfilingState::new(0);
        frame.draw(&mut device, &mut stats).unwrap();

        assert!(device.drawn().is_empty());
        assert_eq!(device.presents(), 0);
    }

    #[test]
    fn test_set_cascade_count() {
        let mut frame = Frame::new(0, 4);
        frame.add_shadow_caster(3, item(1, RenderSequence::World));
        frame.set_cascade_count(1);
        assert_eq!(frame.cascade_count(), 1);
        assert!(frame.shadow_casters(3).is_empty());
    }
}
