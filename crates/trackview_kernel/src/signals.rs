//! Cross-thread pipeline signals
//!
//! Simple last-write-wins flags set by input or menu code on any thread and
//! consumed by the render thread at the top of a tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct SignalFlags {
    fullscreen_toggle: AtomicBool,
    mouse_visible: AtomicBool,
    stop: AtomicBool,
}

/// Shared handle to the pipeline flags
#[derive(Debug, Clone, Default)]
pub struct PipelineSignals {
    flags: Arc<SignalFlags>,
}

impl PipelineSignals {
    /// Create a fresh set of flags
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the render thread to toggle fullscreen at the next tick
    pub fn request_fullscreen_toggle(&self) {
        self.flags.fullscreen_toggle.store(true, Ordering::Release);
    }

    /// Check whether a fullscreen toggle is pending
    pub fn fullscreen_toggle_pending(&self) -> bool {
        self.flags.fullscreen_toggle.load(Ordering::Acquire)
    }

    /// Consume a pending fullscreen toggle
    ///
    /// Returns `true` exactly once per request.
    pub fn take_fullscreen_toggle(&self) -> bool {
        self.flags.fullscreen_toggle.swap(false, Ordering::AcqRel)
    }

    /// Set the desired mouse cursor visibility
    pub fn set_mouse_visible(&self, visible: bool) {
        self.flags.mouse_visible.store(visible, Ordering::Release);
    }

    /// Desired mouse cursor visibility
    pub fn mouse_visible(&self) -> bool {
        self.flags.mouse_visible.load(Ordering::Acquire)
    }

    /// Ask the render loop to shut down
    pub fn request_stop(&self) {
        self.flags.stop.store(true, Ordering::Release);
    }

    /// Check whether a stop has been requested
    pub fn stop_requested(&self) -> bool {
        self.flags.stop.load(Ordering::Acquire)
    }
}
