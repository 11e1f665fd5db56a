//! # trackview_kernel - Render/Update Frame Pipeline
//!
//! Overlaps scene preparation with GPU submission across two threads while
//! keeping a consistent double-buffered frame.
//!
//! ## Core Principles
//!
//! 1. **The draw phase never sees a frame being written** - the "next" frame
//!    is owned by the update worker until it is handed back
//! 2. **One update in flight** - bounded(1) channels in both directions
//! 3. **A bad frame never ends the session** - draw and update failures are
//!    contained and reported unless a debugger is attached
//! 4. **Shutdown is ordered and happens once** - updater, loader, audio
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      RenderScheduler                         │
//! │  ┌──────────────┐ ┌────────────┐ ┌────────────┐ ┌──────────┐ │
//! │  │ DisplayMode  │ │ FrameClock │ │ FrameBuffer│ │  Fault   │ │
//! │  │ Controller   │ │            │ │ cur / next │ │ Barrier  │ │
//! │  └──────────────┘ └────────────┘ └─────┬──────┘ └──────────┘ │
//! └────────────────────────────────────────┼─────────────────────┘
//!                                          │ bounded(1)
//!                                 ┌────────▼────────┐
//!                                 │ UpdateScheduler │ "updater" thread
//!                                 │  FramePreparer  │
//!                                 └─────────────────┘
//! ```

pub mod buffer;
pub mod display;
pub mod error;
pub mod fault;
pub mod scheduler;
pub mod settings;
pub mod signals;
pub mod statistics;
pub mod time;
pub mod update;

pub use buffer::FrameBuffer;
pub use display::{DisplayModeController, DisplayState, DisplayUpdate, ScreenListener};
pub use error::{PipelineError, PipelineResult};
pub use fault::{DebuggerSignal, ErrorReporter, Fault, FaultBarrier, FramePhase, LogReporter};
pub use scheduler::{RenderScheduler, SchedulerState, Subsystem, TickOutcome};
pub use settings::{parse_window_size, ProfilingSettings, SettingsError, ViewerSettings};
pub use signals::PipelineSignals;
pub use statistics::{FrameStatistics, SmoothedData, SmoothedDataWithPercentiles};
pub use time::{ElapsedTime, FrameClock, ManualTimeSource, SystemTimeSource, TimeSource};
pub use update::{
    build_updater, FramePreparer, FrameUpdater, InlineUpdater, PrepareError, UpdateRejected,
    UpdateReport, UpdateScheduler,
};

/// Commonly used types
pub mod prelude {
    pub use crate::error::{PipelineError, PipelineResult};
    pub use crate::scheduler::{RenderScheduler, Subsystem, TickOutcome};
    pub use crate::settings::ViewerSettings;
    pub use crate::time::ElapsedTime;
    pub use crate::update::{build_updater, FramePreparer, PrepareError};
    pub use trackview_render::prelude::*;
}
