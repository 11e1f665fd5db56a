//! Display mode control
//!
//! Fullscreen toggles and cursor visibility are requested from any thread but
//! only ever applied by the render thread, at the top of a tick and before
//! any buffer is touched. [`DisplayModeController::apply_pending`] is that
//! safe point.

use trackview_render::{DeviceError, GraphicsDevice};

use crate::signals::PipelineSignals;

/// Current display configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    /// Last windowed size, restored when leaving fullscreen
    pub window_size: (u32, u32),
    /// Size of the back buffer in use
    pub back_buffer_size: (u32, u32),
    /// Whether the device is in fullscreen mode
    pub fullscreen: bool,
}

impl DisplayState {
    /// Width over height of the back buffer
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.back_buffer_size;
        width as f32 / height.max(1) as f32
    }
}

/// Notified after the back buffer changes size or mode
pub trait ScreenListener: Send {
    /// The screen is now `width` x `height` pixels
    fn screen_changed(&mut self, width: u32, height: u32);
}

/// What [`DisplayModeController::apply_pending`] changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayUpdate {
    /// A fullscreen toggle was applied
    pub mode_changed: bool,
    /// The back buffer size differs from the previous tick
    pub resized: bool,
    /// Back buffer size after the update
    pub size: (u32, u32),
}

/// Applies queued display changes on the render thread
pub struct DisplayModeController {
    signals: PipelineSignals,
    state: DisplayState,
    applied_mouse_visible: Option<bool>,
    listeners: Vec<Box<dyn ScreenListener>>,
}

impl DisplayModeController {
    /// Create a controller for a windowed display of `window_size`
    pub fn new(signals: PipelineSignals, window_size: (u32, u32)) -> Self {
        Self {
            signals,
            state: DisplayState {
                window_size,
                back_buffer_size: window_size,
                fullscreen: false,
            },
            applied_mouse_visible: None,
            listeners: Vec::new(),
        }
    }

    /// Register a screen listener
    pub fn add_listener(&mut self, listener: Box<dyn ScreenListener>) {
        self.listeners.push(listener);
    }

    /// Get the display state
    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Replace the windowed size before the first back buffer is applied
    pub fn set_window_size(&mut self, window_size: (u32, u32)) {
        self.state.window_size = window_size;
        if !self.state.fullscreen {
            self.state.back_buffer_size = window_size;
        }
    }

    /// Queue a fullscreen toggle, callable from any thread through the signals
    pub fn request_fullscreen_toggle(&self) {
        self.signals.request_fullscreen_toggle();
    }

    /// Apply the windowed back buffer at startup
    pub fn apply_initial(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), DeviceError> {
        device.apply_back_buffer(self.state.window_size, false)?;
        self.state.back_buffer_size = self.state.window_size;
        self.state.fullscreen = false;
        log::debug!(
            "Initial back buffer {}x{}",
            self.state.window_size.0,
            self.state.window_size.1
        );
        Ok(())
    }

    /// Apply pending mode changes and detect viewport changes
    ///
    /// A consumed toggle is never retried, even if the device refuses it.
    pub fn apply_pending(&mut self, device: &mut dyn GraphicsDevice) -> Result<DisplayUpdate, DeviceError> {
        let visible = self.signals.mouse_visible();
        if self.applied_mouse_visible != Some(visible) {
            device.set_mouse_visible(visible);
            self.applied_mouse_visible = Some(visible);
        }

        let previous = self.state.back_buffer_size;
        let mut mode_changed = false;

        if self.signals.take_fullscreen_toggle() {
            let fullscreen = !self.state.fullscreen;
            let size = if fullscreen {
                device.primary_display_bounds()
            } else {
                self.state.window_size
            };
            device.apply_back_buffer(size, fullscreen)?;

            self.state.fullscreen = fullscreen;
            self.state.back_buffer_size = size;
            mode_changed = true;
            log::info!(
                "Switched to {} at {}x{}",
                if fullscreen { "fullscreen" } else { "windowed" },
                size.0,
                size.1
            );
        }

        let viewport = device.viewport_size();
        if viewport != self.state.back_buffer_size {
            // Resized by the window system
            if !self.state.fullscreen {
                self.state.window_size = viewport;
            }
            self.state.back_buffer_size = viewport;
            log::debug!("Viewport changed to {}x{}", viewport.0, viewport.1);
        }

        let resized = self.state.back_buffer_size != previous;
        if mode_changed || resized {
            let (width, height) = self.state.back_buffer_size;
            for listener in &mut self.listeners {
                listener.screen_changed(width, height);
            }
        }

        Ok(DisplayUpdate {
            mode_changed,
            resized,
            size: self.state.back_buffer_size,
        })
    }
}

impl std::fmt::Debug for DisplayModeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayModeController")
            .field("state", &self.state)
            .field("applied_mouse_visible", &self.applied_mouse_visible)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
