//! Render scheduler
//!
//! The per-tick driver of the pipeline and its composition root.
//!
//! # Architecture
//!
//! ```text
//! tick():
//!   1. DisplayModeController::apply_pending   (mouse, fullscreen, resize)
//!   2. stop requested?  -> shutdown cascade
//!   3. FrameClock::sample                     (degenerate -> skip 4)
//!   4. wait_till_finished, swap, start_update(next)
//!   5. current.draw() inside the FaultBarrier
//!   6. ProfilingState::end_frame
//! ```
//!
//! # Example
//!
//! ```ignore
//! let updater = build_updater(settings.threaded_updater, scene)?;
//! let mut scheduler = RenderScheduler::new(settings, device, updater)
//!     .with_loader(Box::new(loader))
//!     .with_audio(Box::new(audio));
//!
//! scheduler.initialize()?;
//! scheduler.run()?;
//! ```

use std::sync::Arc;

use trackview_render::{
    configure_cascades, DeviceError, GraphicsDevice, PrimitiveCounters, ProfilingState,
    ShadowCascadeSet,
};

use crate::buffer::FrameBuffer;
use crate::display::{DisplayModeController, DisplayState, ScreenListener};
use crate::error::{PipelineError, PipelineResult};
use crate::fault::{DebuggerSignal, ErrorReporter, FaultBarrier, FramePhase, LogReporter};
use crate::settings::ViewerSettings;
use crate::signals::PipelineSignals;
use crate::statistics::FrameStatistics;
use crate::time::{ElapsedTime, FrameClock, TimeSource};
use crate::update::FrameUpdater;

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, not yet initialized
    Initializing,
    /// Ticking
    Running,
    /// Shutdown cascade in progress
    Terminating,
    /// All subsystems stopped
    Terminated,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new frame was swapped in or an update was started
    Advanced,
    /// The tick was too short; the current frame was drawn again
    Redrawn,
    /// The scheduler has shut down
    Terminated,
}

/// A collaborator stopped by the shutdown cascade
pub trait Subsystem: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Stop the subsystem
    fn stop(&mut self);
}

/// Drives the render/update pipeline one tick at a time
pub struct RenderScheduler<D: GraphicsDevice> {
    state: SchedulerState,
    settings: ViewerSettings,
    device: D,
    updater: Box<dyn FrameUpdater>,
    loader: Option<Box<dyn Subsystem>>,
    audio: Option<Box<dyn Subsystem>>,
    signals: PipelineSignals,
    display: DisplayModeController,
    clock: FrameClock,
    barrier: FaultBarrier,
    buffer: FrameBuffer,
    cascades: Arc<ShadowCascadeSet>,
    cascade_aspect: f32,
    profiling: ProfilingState,
    statistics: FrameStatistics,
    frames_drawn: u64,
    updates_started: u64,
    update_faults: u64,
}

impl<D: GraphicsDevice> RenderScheduler<D> {
    /// Create a scheduler; call [`initialize`](Self::initialize) before ticking
    pub fn new(settings: ViewerSettings, device: D, updater: Box<dyn FrameUpdater>) -> Self {
        let signals = PipelineSignals::new();
        let display = DisplayModeController::new(signals.clone(), device.viewport_size());

        Self {
            state: SchedulerState::Initializing,
            settings,
            device,
            updater,
            loader: None,
            audio: None,
            signals,
            display,
            clock: FrameClock::system(),
            barrier: FaultBarrier::new(Box::new(LogReporter), DebuggerSignal::from_env()),
            buffer: FrameBuffer::new(0),
            cascades: Arc::new(ShadowCascadeSet::disabled()),
            cascade_aspect: 0.0,
            profiling: ProfilingState::new(0),
            statistics: FrameStatistics::new(),
            frames_drawn: 0,
            updates_started: 0,
            update_faults: 0,
        }
    }

    /// Set the asset loader stopped during shutdown
    pub fn with_loader(mut self, loader: Box<dyn Subsystem>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the audio subsystem stopped during shutdown
    pub fn with_audio(mut self, audio: Box<dyn Subsystem>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Set the reporter for contained faults
    pub fn with_error_reporter(mut self, reporter: Box<dyn ErrorReporter>) -> Self {
        self.barrier.set_reporter(reporter);
        self
    }

    /// Set the debugger-attached signal
    pub fn with_debugger_signal(mut self, debugger: DebuggerSignal) -> Self {
        self.barrier.set_debugger(debugger);
        self
    }

    /// Register a listener for screen size and mode changes
    pub fn with_screen_listener(mut self, listener: Box<dyn ScreenListener>) -> Self {
        self.display.add_listener(listener);
        self
    }

    /// Use a different time source
    pub fn with_time_source(mut self, source: Arc<dyn TimeSource>) -> Self {
        self.clock = FrameClock::new(source);
        self
    }

    /// Bring the pipeline up
    ///
    /// Applies the windowed back buffer, computes the shadow cascades and
    /// allocates both frames. Any failure here is fatal.
    pub fn initialize(&mut self) -> PipelineResult<()> {
        if self.state != SchedulerState::Initializing {
            return Err(PipelineError::InvalidState {
                expected: SchedulerState::Initializing,
                actual: self.state,
            });
        }
        log::info!("Render scheduler initializing...");

        self.settings.validate()?;
        let window_size = self.settings.window_size()?;
        self.display.set_window_size(window_size);
        self.display.apply_initial(&mut self.device)?;
        if self.settings.fullscreen {
            self.signals.request_fullscreen_toggle();
        }

        let cascades = self.compute_cascades()?;
        let cascade_count = cascades.count();
        self.cascades = Arc::new(cascades);
        self.cascade_aspect = self.display.state().aspect_ratio();
        self.buffer = FrameBuffer::new(cascade_count);
        self.profiling = ProfilingState::new(cascade_count);

        self.clock.set_simulation_rate(self.settings.simulation_rate);
        self.clock.reset();

        self.state = SchedulerState::Running;
        log::info!(
            "Render scheduler running: {}x{}, {} shadow cascades",
            window_size.0,
            window_size.1,
            cascade_count
        );
        Ok(())
    }

    /// Run one iteration of the render loop
    pub fn tick(&mut self) -> PipelineResult<TickOutcome> {
        match self.state {
            SchedulerState::Running => {}
            SchedulerState::Terminated => return Ok(TickOutcome::Terminated),
            SchedulerState::Terminating => {
                self.shutdown();
                return Ok(TickOutcome::Terminated);
            }
            SchedulerState::Initializing => {
                return Err(PipelineError::InvalidState {
                    expected: SchedulerState::Running,
                    actual: self.state,
                });
            }
        }

        self.apply_display()?;

        if self.signals.stop_requested() {
            self.shutdown();
            return Ok(TickOutcome::Terminated);
        }

        let elapsed = self.clock.sample();
        self.statistics.record(elapsed);
        let outcome = if elapsed.is_degenerate() {
            log::trace!("Degenerate tick ({}s), redrawing", elapsed.real_seconds);
            TickOutcome::Redrawn
        } else {
            self.advance(elapsed)?;
            TickOutcome::Advanced
        };

        self.draw()?;
        self.profiling.end_frame();
        self.frames_drawn += 1;

        if self
            .settings
            .profiling
            .limit_reached(self.frames_drawn, self.statistics.total_real_seconds)
            && !self.signals.stop_requested()
        {
            log::info!(
                "Profiling limit reached after {} frames ({:.1} fps)",
                self.frames_drawn,
                self.statistics.frame_rate.value()
            );
            self.signals.request_stop();
        }

        Ok(outcome)
    }

    /// Tick until the scheduler terminates
    ///
    /// Initializes first if needed. An error aborts the loop after running
    /// the shutdown cascade.
    pub fn run(&mut self) -> PipelineResult<()> {
        if self.state == SchedulerState::Initializing {
            self.initialize()?;
        }

        loop {
            match self.tick() {
                Ok(TickOutcome::Terminated) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    log::error!("Render loop aborted: {}", e);
                    self.shutdown();
                    return Err(e);
                }
            }
        }
    }

    /// Stop every subsystem exactly once
    ///
    /// Order is updater, then asset loader, then audio. Calling it again is a
    /// no-op.
    pub fn shutdown(&mut self) {
        if self.state == SchedulerState::Terminated {
            return;
        }
        log::info!("Render scheduler terminating...");
        self.state = SchedulerState::Terminating;
        self.signals.request_stop();

        self.updater.stop();
        for subsystem in [self.loader.as_mut(), self.audio.as_mut()].into_iter().flatten() {
            log::debug!("Stopping {}", subsystem.name());
            subsystem.stop();
        }

        self.state = SchedulerState::Terminated;
        log::info!(
            "Render scheduler terminated after {} frames ({} contained faults)",
            self.frames_drawn,
            self.barrier.contained_count()
        );
    }

    /// Replace the settings and recompute the shadow cascades
    ///
    /// The window size and fullscreen flag only take effect at startup.
    pub fn apply_settings(&mut self, mut settings: ViewerSettings) -> PipelineResult<()> {
        settings.validate()?;
        let previous = std::mem::replace(&mut self.settings, settings);
        if let Err(e) = self.update_shadow_parameters() {
            self.settings = previous;
            return Err(e);
        }
        self.clock.set_simulation_rate(self.settings.simulation_rate);
        Ok(())
    }

    /// Recompute the shadow cascades from the current settings and aspect ratio
    pub fn update_shadow_parameters(&mut self) -> PipelineResult<()> {
        let cascades = self.compute_cascades()?;
        self.cascade_aspect = self.display.state().aspect_ratio();
        if *self.cascades == cascades {
            return Ok(());
        }

        let count = cascades.count();
        if count != self.cascades.count() {
            self.buffer.set_cascade_count(count);
            self.profiling.set_cascade_count(count);
        }
        self.cascades = Arc::new(cascades);
        log::debug!("Shadow cascades updated: {:?}", self.cascades.limit());
        Ok(())
    }

    /// Pause or speed up simulated time
    pub fn set_simulation_rate(&mut self, rate: f32) {
        self.clock.set_simulation_rate(rate);
    }

    fn compute_cascades(&self) -> PipelineResult<ShadowCascadeSet> {
        let params = self.settings.shadows.cascade_parameters(
            self.settings.viewing_fov,
            self.display.state().aspect_ratio(),
            self.settings.viewing_distance,
        )?;
        Ok(configure_cascades(&params)?)
    }

    fn apply_display(&mut self) -> PipelineResult<()> {
        let display = &mut self.display;
        let device = &mut self.device;
        let mut update = None;

        self.barrier.contain(FramePhase::Display, || {
            update = Some(display.apply_pending(&mut *device)?);
            Ok::<(), DeviceError>(())
        })?;

        // A contained listener fault can hide the resize from `update`
        let resized = update.map_or(false, |update| update.resized);
        if resized || self.display.state().aspect_ratio() != self.cascade_aspect {
            if let Err(e) = self.update_shadow_parameters() {
                log::warn!("Keeping previous shadow cascades: {}", e);
            }
        }
        Ok(())
    }

    fn advance(&mut self, elapsed: ElapsedTime) -> PipelineResult<()> {
        if let Some(report) = self.updater.wait_till_finished() {
            // Prepared against the cascades active when the update started
            let mut frame = report.frame;
            frame.set_cascade_count(self.cascades.count());
            self.buffer.restore_next(frame)?;
            match report.fault {
                Some(fault) => {
                    self.update_faults += 1;
                    self.barrier.route(fault)?;
                    log::debug!(
                        "Update failed, slot {} stays current",
                        self.buffer.current().slot()
                    );
                }
                None => self.buffer.swap()?,
            }
        }

        let frame = self.buffer.lend_next()?;
        if let Err(rejected) = self
            .updater
            .start_update(frame, elapsed, Arc::clone(&self.cascades))
        {
            self.buffer.restore_next(rejected.frame)?;
            return Err(rejected.error);
        }
        self.updates_started += 1;
        Ok(())
    }

    fn draw(&mut self) -> PipelineResult<()> {
        let frame = self.buffer.current();
        let device = &mut self.device;
        let profiling = &mut self.profiling;

        self.barrier
            .contain(FramePhase::Draw, || frame.draw(&mut *device, profiling))?;
        Ok(())
    }

    /// Get the lifecycle state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Get the cross-thread signals
    pub fn signals(&self) -> &PipelineSignals {
        &self.signals
    }

    /// Get the active settings
    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    /// Get the graphics device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Get the graphics device mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Get the display state
    pub fn display_state(&self) -> &DisplayState {
        self.display.state()
    }

    /// Get the active shadow cascades
    pub fn cascades(&self) -> &ShadowCascadeSet {
        &self.cascades
    }

    /// Get the frame buffer
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Primitive counters of the last drawn frame
    pub fn last_frame_counters(&self) -> &PrimitiveCounters {
        self.profiling.last_frame()
    }

    /// Get the frame-rate statistics
    pub fn statistics(&self) -> &FrameStatistics {
        &self.statistics
    }

    /// Number of frames drawn
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Number of updates started
    pub fn updates_started(&self) -> u64 {
        self.updates_started
    }

    /// Number of updates that faulted
    pub fn update_faults(&self) -> u64 {
        self.update_faults
    }

    /// Number of faults contained by the barrier
    pub fn contained_faults(&self) -> u64 {
        self.barrier.contained_count()
    }
}

impl<D: GraphicsDevice> Drop for RenderScheduler<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<D: GraphicsDevice> std::fmt::Debug for RenderScheduler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("state", &self.state)
            .field("frames_drawn", &self.frames_drawn)
            .field("updates_started", &self.updates_started)
            .field("cascades", &self.cascades.count())
            .finish()
    }
}
