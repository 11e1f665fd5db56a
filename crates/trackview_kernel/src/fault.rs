//! Fault containment
//!
//! A failure while drawing (or preparing) one frame must not end the viewing
//! session. [`FaultBarrier`] runs a phase, catches returned errors and panics,
//! and hands them to an [`ErrorReporter`].
//!
//! When a debugger is attached the barrier steps aside: errors are returned to
//! the caller and panics unwind normally so they break where they happen.
//!
//! # Usage
//!
//! ```ignore
//! let mut barrier = FaultBarrier::new(Box::new(LogReporter), DebuggerSignal::from_env());
//! barrier.contain(FramePhase::Draw, || frame.draw(&mut device, &mut stats))?;
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::error::PipelineResult;

/// Environment variable that marks a debugger as attached
pub const DEBUGGER_ENV: &str = "TRACKVIEW_DEBUGGER";

/// Tick phase a fault was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// Display mode change
    Display,
    /// Frame preparation on the update worker
    Update,
    /// Frame submission
    Draw,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePhase::Display => write!(f, "display"),
            FramePhase::Update => write!(f, "update"),
            FramePhase::Draw => write!(f, "draw"),
        }
    }
}

/// A failure captured in one phase of a tick
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{phase} fault: {message}")]
pub struct Fault {
    /// Phase the failure happened in
    pub phase: FramePhase,
    /// Error or panic message
    pub message: String,
    /// Whether the failure was a panic
    pub panicked: bool,
}

impl Fault {
    /// Fault from a returned error
    pub fn error(phase: FramePhase, error: impl fmt::Display) -> Self {
        Self {
            phase,
            message: error.to_string(),
            panicked: false,
        }
    }

    /// Fault from a panic payload
    pub fn from_panic(phase: FramePhase, payload: &(dyn Any + Send)) -> Self {
        Self {
            phase,
            message: panic_message(payload),
            panicked: true,
        }
    }
}

/// Extract the message of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Receives contained faults
pub trait ErrorReporter: Send {
    /// Report a fault that was contained
    fn report_error(&self, fault: &Fault);
}

/// Reporter that writes faults to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report_error(&self, fault: &Fault) {
        if fault.panicked {
            log::error!("Contained panic in {} phase: {}", fault.phase, fault.message);
        } else {
            log::warn!("Contained error in {} phase: {}", fault.phase, fault.message);
        }
    }
}

/// Shared "debugger attached" flag
#[derive(Debug, Clone, Default)]
pub struct DebuggerSignal(Arc<AtomicBool>);

impl DebuggerSignal {
    /// Create a signal with the given state
    pub fn new(attached: bool) -> Self {
        Self(Arc::new(AtomicBool::new(attached)))
    }

    /// Read the initial state from `TRACKVIEW_DEBUGGER`
    pub fn from_env() -> Self {
        let attached = std::env::var(DEBUGGER_ENV)
            .map(|value| !value.is_empty() && value != "0")
            .unwrap_or(false);
        Self::new(attached)
    }

    /// Check if a debugger is attached
    pub fn attached(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark a debugger as attached or detached
    pub fn set_attached(&self, attached: bool) {
        self.0.store(attached, Ordering::Release);
    }
}

/// Runs tick phases with failure containment
pub struct FaultBarrier {
    reporter: Box<dyn ErrorReporter>,
    debugger: DebuggerSignal,
    contained: u64,
}

impl FaultBarrier {
    /// Create a barrier reporting to `reporter`
    pub fn new(reporter: Box<dyn ErrorReporter>, debugger: DebuggerSignal) -> Self {
        Self {
            reporter,
            debugger,
            contained: 0,
        }
    }

    /// Replace the error reporter
    pub fn set_reporter(&mut self, reporter: Box<dyn ErrorReporter>) {
        self.reporter = reporter;
    }

    /// Replace the debugger signal
    pub fn set_debugger(&mut self, debugger: DebuggerSignal) {
        self.debugger = debugger;
    }

    /// Get the debugger signal
    pub fn debugger(&self) -> &DebuggerSignal {
        &self.debugger
    }

    /// Run `f`, containing any failure
    ///
    /// Returns the contained fault, if any. With a debugger attached a
    /// returned error becomes `Err` and a panic is not caught.
    pub fn contain<F, E>(&mut self, phase: FramePhase, f: F) -> PipelineResult<Option<Fault>>
    where
        F: FnOnce() -> Result<(), E>,
        E: fmt::Display,
    {
        if self.debugger.attached() {
            return match f() {
                Ok(()) => Ok(None),
                Err(e) => Err(Fault::error(phase, e).into()),
            };
        }

        let fault = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => return Ok(None),
            Ok(Err(e)) => Fault::error(phase, e),
            Err(payload) => Fault::from_panic(phase, payload.as_ref()),
        };
        self.report(&fault);
        Ok(Some(fault))
    }

    /// Route a fault captured elsewhere
    ///
    /// With a debugger attached the fault is returned as an error. Panics
    /// captured on another thread cannot be resumed here.
    pub fn route(&mut self, fault: Fault) -> PipelineResult<Fault> {
        if self.debugger.attached() {
            return Err(fault.into());
        }
        self.report(&fault);
        Ok(fault)
    }

    /// Number of faults contained so far
    pub fn contained_count(&self) -> u64 {
        self.contained
    }

    fn report(&mut self, fault: &Fault) {
        self.contained += 1;
        self.reporter.report_error(fault);
    }
}

impl fmt::Debug for FaultBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultBarrier")
            .field("debugger", &self.debugger.attached())
            .field("contained", &self.contained)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct RecordingReporter {
        faults: Arc<Mutex<Vec<Fault>>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report_error(&self, fault: &Fault) {
            self.faults.lock().push(fault.clone());
        }
    }

    fn barrier(attached: bool) -> (FaultBarrier, RecordingReporter) {
        let reporter = RecordingReporter::default();
        let barrier = FaultBarrier::new(Box::new(reporter.clone()), DebuggerSignal::new(attached));
        (barrier, reporter)
    }

    #[test]
    fn test_clean_phase_passes_through() {
        let (mut barrier, reporter) = barrier(false);
        let result = barrier.contain(FramePhase::Draw, || Ok::<(), String>(()));
        assert!(matches!(result, Ok(None)));
        assert!(reporter.faults.lock().is_empty());
        assert_eq!(barrier.contained_count(), 0);
    }

    #[test]
    fn test_error_is_contained_and_reported() {
        let (mut barrier, reporter) = barrier(false);
        let fault = barrier
            .contain(FramePhase::Draw, || Err("device lost"))
            .unwrap()
            .unwrap();

        assert_eq!(fault.phase, FramePhase::Draw);
        assert_eq!(fault.message, "device lost");
        assert!(!fault.panicked);
        assert_eq!(reporter.faults.lock().as_slice(), &[fault]);
        assert_eq!(barrier.contained_count(), 1);
    }

    #[test]
    fn test_panic_is_contained() {
        let (mut barrier, reporter) = barrier(false);
        let fault = barrier
            .contain(FramePhase::Draw, || -> Result<(), String> {
                panic!("bad primitive {}", 7)
            })
            .unwrap()
            .unwrap();

        assert!(fault.panicked);
        assert_eq!(fault.message, "bad primitive 7");
        assert_eq!(reporter.faults.lock().len(), 1);
    }

    #[test]
    fn test_debugger_propagates_errors() {
        let (mut barrier, reporter) = barrier(true);
        let result = barrier.contain(FramePhase::Draw, || Err("device lost"));

        match result {
            Err(PipelineError::Fault(fault)) => assert_eq!(fault.message, "device lost"),
            other => panic!("expected fault, got {:?}", other),
        }
        assert!(reporter.faults.lock().is_empty());
    }

    #[test]
    fn test_debugger_lets_panics_unwind() {
        let (mut barrier, reporter) = barrier(true);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = barrier.contain(FramePhase::Draw, || -> Result<(), String> {
                panic!("break here")
            });
        }));

        assert!(outcome.is_err());
        assert!(reporter.faults.lock().is_empty());
    }

    #[test]
    fn test_route_respects_debugger() {
        let (mut barrier, reporter) = barrier(false);
        let fault = Fault::error(FramePhase::Update, "scene failed");
        assert_eq!(barrier.route(fault.clone()).unwrap(), fault);
        assert_eq!(reporter.faults.lock().len(), 1);

        barrier.debugger().set_attached(true);
        assert!(barrier.route(fault).is_err());
        assert_eq!(reporter.faults.lock().len(), 1);
    }

    #[test]
    fn test_panic_message_payloads() {
        let text: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(text.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "Unknown panic");
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::error(FramePhase::Display, "mode change refused");
        assert_eq!(fault.to_string(), "display fault: mode change refused");
    }
}
