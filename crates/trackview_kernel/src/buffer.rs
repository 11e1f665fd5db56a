//! Double-buffered frames
//!
//! Exactly two [`Frame`]s exist for the lifetime of the pipeline. One is
//! "current" and is only read by the draw phase; the other is "next" and is
//! written by the update in flight.
//!
//! # Architecture
//!
//! ```text
//!   FrameBuffer                       update worker
//!   +-----------+   lend_next()      +-------------+
//!   | current   |  ------------->    | next (owned)|
//!   | next: None|  <-------------    |             |
//!   +-----------+   restore_next()   +-------------+
//! ```
//!
//! While "next" is on loan the buffer refuses to swap, so the draw phase can
//! never observe a frame that is still being populated.

use trackview_render::Frame;

use crate::error::{PipelineError, PipelineResult};

/// Owner of the current and next frames
#[derive(Debug)]
pub struct FrameBuffer {
    current: Frame,
    next: Option<Frame>,
    swaps: u64,
}

impl FrameBuffer {
    /// Allocate both frames
    pub fn new(cascade_count: usize) -> Self {
        Self {
            current: Frame::new(0, cascade_count),
            next: Some(Frame::new(1, cascade_count)),
            swaps: 0,
        }
    }

    /// Frame being drawn
    pub fn current(&self) -> &Frame {
        &self.current
    }

    /// Frame to be populated, if it is not on loan
    pub fn next(&self) -> Option<&Frame> {
        self.next.as_ref()
    }

    /// Check if the next frame is held by an update
    pub fn is_next_on_loan(&self) -> bool {
        self.next.is_none()
    }

    /// Exchange the current and next roles
    pub fn swap(&mut self) -> PipelineResult<()> {
        let next = self.next.as_mut().ok_or(PipelineError::UpdateInFlight)?;
        std::mem::swap(&mut self.current, next);
        self.swaps += 1;
        log::trace!(
            "Swapped frames, current slot is now {}",
            self.current.slot()
        );
        Ok(())
    }

    /// Hand the next frame to an update
    pub fn lend_next(&mut self) -> PipelineResult<Frame> {
        self.next.take().ok_or(PipelineError::UpdateInFlight)
    }

    /// Take back a frame returned by an update
    pub fn restore_next(&mut self, frame: Frame) -> PipelineResult<()> {
        if self.next.is_some() || frame.slot() == self.current.slot() {
            return Err(PipelineError::SlotOccupied(frame.slot()));
        }
        self.next = Some(frame);
        Ok(())
    }

    /// Resize the shadow caster lists of every frame the buffer holds
    pub fn set_cascade_count(&mut self, cascade_count: usize) {
        self.current.set_cascade_count(cascade_count);
        if let Some(next) = self.next.as_mut() {
            next.set_cascade_count(cascade_count);
        }
    }

    /// Number of swaps performed
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_has_distinct_slots() {
        let buffer = FrameBuffer::new(2);
        assert_eq!(buffer.current().slot(), 0);
        assert_eq!(buffer.next().map(Frame::slot), Some(1));
        assert_eq!(buffer.current().cascade_count(), 2);
        assert!(!buffer.is_next_on_loan());
    }

    #[test]
    fn test_swap_exchanges_roles() {
        let mut buffer = FrameBuffer::new(0);
        buffer.swap().unwrap();
        assert_eq!(buffer.current().slot(), 1);
        assert_eq!(buffer.next().map(Frame::slot), Some(0));
        assert_eq!(buffer.swap_count(), 1);
    }

    #[test]
    fn test_swap_rejected_while_on_loan() {
        let mut buffer = FrameBuffer::new(0);
        let frame = buffer.lend_next().unwrap();
        assert!(buffer.is_next_on_loan());

        assert!(matches!(buffer.swap(), Err(PipelineError::UpdateInFlight)));
        assert!(matches!(buffer.lend_next(), Err(PipelineError::UpdateInFlight)));
        assert_eq!(buffer.current().slot(), 0);

        buffer.restore_next(frame).unwrap();
        buffer.swap().unwrap();
        assert_eq!(buffer.current().slot(), 1);
    }

    #[test]
    fn test_restore_rejects_aliasing() {
        let mut buffer = FrameBuffer::new(0);

        // Slot already filled
        assert!(matches!(
            buffer.restore_next(Frame::new(1, 0)),
            Err(PipelineError::SlotOccupied(1))
        ));

        // Frame claiming the current slot
        let _lent = buffer.lend_next().unwrap();
        assert!(matches!(
            buffer.restore_next(Frame::new(0, 0)),
            Err(PipelineError::SlotOccupied(0))
        ));
        assert!(buffer.is_next_on_loan());
    }

    #[test]
    fn test_set_cascade_count_resizes_held_frames() {
        let mut buffer = FrameBuffer::new(4);
        buffer.set_cascade_count(1);
        assert_eq!(buffer.current().cascade_count(), 1);
        assert_eq!(buffer.next().map(Frame::cascade_count), Some(1));
    }
}
