//! Graphics device seam
//!
//! The frame pipeline never talks to a GPU API directly. Everything it needs
//! from the device goes through [`GraphicsDevice`]; primitive issuance itself
//! belongs to the implementor.

use thiserror::Error;

use crate::frame::{CameraMatrices, PrimitiveId, RenderItem};

/// Graphics device errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("Graphics device lost")]
    DeviceLost,

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Display mode change failed: {0}")]
    ModeChange(String),
}

/// Operations the frame pipeline needs from a graphics device
pub trait GraphicsDevice {
    /// Bind the camera for the main pass
    fn set_camera(&mut self, camera: &CameraMatrices) -> Result<(), DeviceError>;

    /// Draw a primitive into a shadow cascade
    fn draw_shadow_caster(&mut self, cascade: usize, item: &RenderItem) -> Result<(), DeviceError>;

    /// Draw a primitive in the main pass
    fn draw_item(&mut self, item: &RenderItem) -> Result<(), DeviceError>;

    /// Present the back buffer
    fn present(&mut self) -> Result<(), DeviceError>;

    /// Current viewport size
    fn viewport_size(&self) -> (u32, u32);

    /// Bounds of the primary display
    fn primary_display_bounds(&self) -> (u32, u32);

    /// Resize the back buffer and switch between fullscreen and windowed
    fn apply_back_buffer(&mut self, size: (u32, u32), fullscreen: bool) -> Result<(), DeviceError>;

    /// Show or hide the mouse cursor
    fn set_mouse_visible(&mut self, visible: bool);
}

/// A device without a GPU that records what it was asked to do
#[derive(Debug)]
pub struct HeadlessDevice {
    viewport: (u32, u32),
    display_bounds: (u32, u32),
    fullscreen: bool,
    mouse_visible: bool,
    drawn: Vec<PrimitiveId>,
    shadow_draws: u64,
    presents: u64,
    mode_changes: u64,
    pending_failure: Option<DeviceError>,
}

impl HeadlessDevice {
    /// Create a device with the given viewport, on a 1920x1080 display
    pub fn new(viewport: (u32, u32)) -> Self {
        Self {
            viewport,
            display_bounds: (1920, 1080),
            fullscreen: false,
            mouse_visible: false,
            drawn: Vec::new(),
            shadow_draws: 0,
            presents: 0,
            mode_changes: 0,
            pending_failure: None,
        }
    }

    /// Set the primary display bounds
    pub fn with_display_bounds(mut self, bounds: (u32, u32)) -> Self {
        self.display_bounds = bounds;
        self
    }

    /// Fail the next present with the given error
    pub fn fail_next_present(&mut self, error: DeviceError) {
        self.pending_failure = Some(error);
    }

    /// Simulate an external window resize
    pub fn resize_viewport(&mut self, size: (u32, u32)) {
        self.viewport = size;
    }

    /// Primitives drawn in the main pass of the latest frame
    pub fn drawn(&self) -> &[PrimitiveId] {
        &self.drawn
    }

    /// Total shadow caster draws
    pub fn shadow_draws(&self) -> u64 {
        self.shadow_draws
    }

    /// Total successful presents
    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Total back buffer changes
    pub fn mode_changes(&self) -> u64 {
        self.mode_changes
    }

    /// Whether the device is in fullscreen mode
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Whether the mouse cursor is visible
    pub fn is_mouse_visible(&self) -> bool {
        self.mouse_visible
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn set_camera(&mut self, _camera: &CameraMatrices) -> Result<(), DeviceError> {
        self.drawn.clear();
        Ok(())
    }

    fn draw_shadow_caster(&mut self, _cascade: usize, _item: &RenderItem) -> Result<(), DeviceError> {
        self.shadow_draws += 1;
        Ok(())
    }

    fn draw_item(&mut self, item: &RenderItem) -> Result<(), DeviceError> {
        self.drawn.push(item.primitive);
        Ok(())
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        if let Some(error) = self.pending_failure.take() {
            return Err(error);
        }
        self.presents += 1;
        Ok(())
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn primary_display_bounds(&self) -> (u32, u32) {
        self.display_bounds
    }

    fn apply_back_buffer(&mut self, size: (u32, u32), fullscreen: bool) -> Result<(), DeviceError> {
        if size.0 == 0 || size.1 == 0 {
            return Err(DeviceError::ModeChange(format!("{}x{}", size.0, size.1)));
        }
        self.viewport = size;
        self.fullscreen = fullscreen;
        self.mode_changes += 1;
        Ok(())
    }

    fn set_mouse_visible(&mut self, visible: bool) {
        self.mouse_visible = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_back_buffer() {
        let mut device = HeadlessDevice::new((1024, 768)).with_display_bounds((2560, 1440));
        assert_eq!(device.primary_display_bounds(), (2560, 1440));

        device.apply_back_buffer((2560, 1440), true).unwrap();
        assert_eq!(device.viewport_size(), (2560, 1440));
        assert!(device.is_fullscreen());
        assert_eq!(device.mode_changes(), 1);

        assert!(device.apply_back_buffer((0, 768), false).is_err());
        assert_eq!(device.mode_changes(), 1);
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let mut device = HeadlessDevice::new((800, 600));
        device.fail_next_present(DeviceError::DeviceLost);

        assert_eq!(device.present(), Err(DeviceError::DeviceLost));
        assert!(device.present().is_ok());
        assert_eq!(device.presents(), 1);
    }
}
