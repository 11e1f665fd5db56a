//! Frame preparation
//!
//! The update side of the pipeline fills the "next" frame from scene state
//! while the render side draws "current".
//!
//! # Architecture
//!
//! ```text
//!   render thread                        "updater" thread
//!   start_update(frame) --jobs(1)------> prepare_frame(&mut frame)
//!   wait_till_finished() <--reports(1)-- UpdateReport { frame, fault }
//! ```
//!
//! Both channels hold a single item, so at most one update is ever in
//! flight and the frame it works on is owned by the worker until it comes
//! back. A failing preparer never takes the worker down: the frame is cleared
//! and the failure travels back in the report.

use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use thiserror::Error;
use trackview_render::{Frame, ShadowCascadeSet};

use crate::error::{PipelineError, PipelineResult};
use crate::fault::{Fault, FramePhase};
use crate::time::ElapsedTime;

/// Error returned by a frame preparer
pub type PrepareError = Box<dyn StdError + Send + Sync>;

/// Fills a frame from scene state
///
/// Implemented by the camera and scene collaborators. A preparer that adds
/// nothing (for example while a scene load was canceled) is valid.
pub trait FramePreparer: Send {
    /// Populate `frame` for a tick of `elapsed` time
    fn prepare_frame(
        &mut self,
        frame: &mut Frame,
        elapsed: ElapsedTime,
        shadows: &ShadowCascadeSet,
    ) -> Result<(), PrepareError>;
}

impl<F> FramePreparer for F
where
    F: FnMut(&mut Frame, ElapsedTime, &ShadowCascadeSet) -> Result<(), PrepareError> + Send,
{
    fn prepare_frame(
        &mut self,
        frame: &mut Frame,
        elapsed: ElapsedTime,
        shadows: &ShadowCascadeSet,
    ) -> Result<(), PrepareError> {
        self(frame, elapsed, shadows)
    }
}

/// A finished update
#[derive(Debug)]
pub struct UpdateReport {
    /// The frame, populated unless the update faulted
    pub frame: Frame,
    /// Failure raised by the preparer
    pub fault: Option<Fault>,
}

/// An update that could not be started
///
/// Hands the frame back so the caller never loses a buffer.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct UpdateRejected {
    /// The frame that was offered
    pub frame: Frame,
    /// Why the update was refused
    pub error: PipelineError,
}

/// Update side of the pipeline
pub trait FrameUpdater: Send {
    /// Begin populating `frame`
    ///
    /// Fails if an update is already in flight or the updater was stopped.
    fn start_update(
        &mut self,
        frame: Frame,
        elapsed: ElapsedTime,
        shadows: Arc<ShadowCascadeSet>,
    ) -> Result<(), UpdateRejected>;

    /// Block until the update in flight completes
    ///
    /// Returns `None` when nothing is in flight.
    fn wait_till_finished(&mut self) -> Option<UpdateReport>;

    /// Check if an update is in flight
    fn is_busy(&self) -> bool;

    /// Finish any update in flight and release the worker
    fn stop(&mut self);
}

/// Run one preparation, containing any failure
fn run_update(
    preparer: &mut dyn FramePreparer,
    frame: &mut Frame,
    elapsed: ElapsedTime,
    shadows: &ShadowCascadeSet,
) -> Option<Fault> {
    frame.clear();
    frame.set_cascade_count(shadows.count());

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        preparer.prepare_frame(frame, elapsed, shadows)
    }));
    let fault = match result {
        Ok(Ok(())) => return None,
        Ok(Err(e)) => Fault::error(FramePhase::Update, e),
        Err(payload) => Fault::from_panic(FramePhase::Update, payload.as_ref()),
    };

    // Never hand out a half-populated frame
    frame.clear();
    Some(fault)
}

struct UpdateJob {
    frame: Frame,
    elapsed: ElapsedTime,
    shadows: Arc<ShadowCascadeSet>,
}

/// Threaded updater running the preparer on a worker named "updater"
pub struct UpdateScheduler {
    jobs: Option<Sender<UpdateJob>>,
    reports: Receiver<UpdateReport>,
    worker: Option<JoinHandle<()>>,
    in_flight: Option<usize>,
    started: u64,
}

impl UpdateScheduler {
    /// Start the worker thread
    pub fn spawn<P>(preparer: P) -> PipelineResult<Self>
    where
        P: FramePreparer + 'static,
    {
        let (job_tx, job_rx) = bounded::<UpdateJob>(1);
        let (report_tx, report_rx) = bounded::<UpdateReport>(1);

        let worker = thread::Builder::new()
            .name("updater".to_string())
            .spawn(move || Self::worker_loop(preparer, job_rx, report_tx))
            .map_err(|e| PipelineError::WorkerSpawn(e.to_string()))?;

        log::info!("Update worker started");

        Ok(Self {
            jobs: Some(job_tx),
            reports: report_rx,
            worker: Some(worker),
            in_flight: None,
            started: 0,
        })
    }

    fn worker_loop<P: FramePreparer>(
        mut preparer: P,
        jobs: Receiver<UpdateJob>,
        reports: Sender<UpdateReport>,
    ) {
        for job in jobs.iter() {
            let mut frame = job.frame;
            let fault = run_update(&mut preparer, &mut frame, job.elapsed, &job.shadows);
            if reports.send(UpdateReport { frame, fault }).is_err() {
                break;
            }
        }
        log::debug!("Update worker exiting");
    }

    /// Number of updates started
    pub fn started_count(&self) -> u64 {
        self.started
    }

    /// Check if the worker has been stopped
    pub fn is_stopped(&self) -> bool {
        self.jobs.is_none()
    }
}

impl FrameUpdater for UpdateScheduler {
    fn start_update(
        &mut self,
        frame: Frame,
        elapsed: ElapsedTime,
        shadows: Arc<ShadowCascadeSet>,
    ) -> Result<(), UpdateRejected> {
        if self.in_flight.is_some() {
            return Err(UpdateRejected {
                frame,
                error: PipelineError::UpdateInFlight,
            });
        }
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(UpdateRejected {
                frame,
                error: PipelineError::UpdaterStopped,
            });
        };

        let slot = frame.slot();
        jobs.send(UpdateJob {
            frame,
            elapsed,
            shadows,
        })
        .map_err(|e| UpdateRejected {
            frame: e.into_inner().frame,
            error: PipelineError::WorkerDisconnected,
        })?;

        self.in_flight = Some(slot);
        self.started += 1;
        log::trace!("Update started on slot {}", slot);
        Ok(())
    }

    fn wait_till_finished(&mut self) -> Option<UpdateReport> {
        let slot = self.in_flight.take()?;
        match self.reports.recv() {
            Ok(report) => Some(report),
            Err(_) => {
                log::error!("Update worker disconnected with slot {} in flight", slot);
                Some(UpdateReport {
                    frame: Frame::new(slot, 0),
                    fault: Some(Fault {
                        phase: FramePhase::Update,
                        message: PipelineError::WorkerDisconnected.to_string(),
                        panicked: true,
                    }),
                })
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn stop(&mut self) {
        let Some(jobs) = self.jobs.take() else {
            return;
        };
        drop(jobs);

        // Drain so the worker is not blocked on a full report slot
        let _ = self.wait_till_finished();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Update worker panicked");
            }
        }
        log::info!("Update worker stopped after {} updates", self.started);
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("in_flight", &self.in_flight)
            .field("started", &self.started)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Updater that prepares frames synchronously on the calling thread
pub struct InlineUpdater {
    preparer: Box<dyn FramePreparer>,
    pending: Option<UpdateReport>,
    stopped: bool,
}

impl InlineUpdater {
    /// Create an inline updater
    pub fn new<P>(preparer: P) -> Self
    where
        P: FramePreparer + 'static,
    {
        Self {
            preparer: Box::new(preparer),
            pending: None,
            stopped: false,
        }
    }
}

impl FrameUpdater for InlineUpdater {
    fn start_update(
        &mut self,
        mut frame: Frame,
        elapsed: ElapsedTime,
        shadows: Arc<ShadowCascadeSet>,
    ) -> Result<(), UpdateRejected> {
        if self.pending.is_some() {
            return Err(UpdateRejected {
                frame,
                error: PipelineError::UpdateInFlight,
            });
        }
        if self.stopped {
            return Err(UpdateRejected {
                frame,
                error: PipelineError::UpdaterStopped,
            });
        }

        let fault = run_update(self.preparer.as_mut(), &mut frame, elapsed, &shadows);
        self.pending = Some(UpdateReport { frame, fault });
        Ok(())
    }

    fn wait_till_finished(&mut self) -> Option<UpdateReport> {
        self.pending.take()
    }

    fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.pending = None;
            log::info!("Inline updater stopped");
        }
    }
}

impl std::fmt::Debug for InlineUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineUpdater")
            .field("busy", &self.pending.is_some())
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// Build the threaded or inline updater
pub fn build_updater<P>(threaded: bool, preparer: P) -> PipelineResult<Box<dyn FrameUpdater>>
where
    P: FramePreparer + 'static,
{
    if threaded {
        Ok(Box::new(UpdateScheduler::spawn(preparer)?))
    } else {
        log::info!("Using inline updater");
        Ok(Box::new(InlineUpdater::new(preparer)))
    }
}
