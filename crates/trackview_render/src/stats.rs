//! Primitive Profiling Counters
//!
//! Counts submitted primitives per draw sequence and per shadow cascade. The
//! counters of the frame being drawn are rolled into "last frame" once the
//! draw is over, so readers always see a complete frame.
//!
//! # Example
//!
//! ```ignore
//! let mut profiling = ProfilingState::new(cascades.count());
//!
//! // Each frame
//! frame.draw(&mut device, &mut profiling)?;
//! let last = profiling.end_frame();
//! println!("{} primitives", last.total());
//! ```

use serde::{Deserialize, Serialize};

use crate::frame::RenderSequence;

/// Primitive counts for one frame
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveCounters {
    /// Primitives per draw sequence
    per_sequence: [u32; RenderSequence::COUNT],
    /// Primitives per shadow cascade
    per_cascade: Vec<u32>,
}

impl PrimitiveCounters {
    fn with_cascades(cascade_count: usize) -> Self {
        Self {
            per_sequence: [0; RenderSequence::COUNT],
            per_cascade: vec![0; cascade_count],
        }
    }

    /// Primitives drawn in a sequence
    pub fn sequence_count(&self, sequence: RenderSequence) -> u32 {
        self.per_sequence[sequence.index()]
    }

    /// Primitives drawn into a shadow cascade
    pub fn shadow_count(&self, cascade: usize) -> u32 {
        self.per_cascade.get(cascade).copied().unwrap_or(0)
    }

    /// Primitives drawn in the main pass
    pub fn total(&self) -> u32 {
        self.per_sequence.iter().sum()
    }

    /// Primitives drawn into all shadow cascades
    pub fn shadow_total(&self) -> u32 {
        self.per_cascade.iter().sum()
    }

    fn reset(&mut self) {
        self.per_sequence = [0; RenderSequence::COUNT];
        self.per_cascade.iter_mut().for_each(|c| *c = 0);
    }
}

/// Counters for the frame in progress and the last completed frame
#[derive(Clone, Debug, Default)]
pub struct ProfilingState {
    current: PrimitiveCounters,
    last: PrimitiveCounters,
}

impl ProfilingState {
    /// Create counters for the given number of shadow cascades
    pub fn new(cascade_count: usize) -> Self {
        Self {
            current: PrimitiveCounters::with_cascades(cascade_count),
            last: PrimitiveCounters::with_cascades(cascade_count),
        }
    }

    /// Change the number of shadow cascades, dropping all counts
    pub fn set_cascade_count(&mut self, cascade_count: usize) {
        *self = Self::new(cascade_count);
    }

    /// Count a main pass primitive
    pub fn record(&mut self, sequence: RenderSequence) {
        self.current.per_sequence[sequence.index()] += 1;
    }

    /// Count a shadow caster
    pub fn record_shadow(&mut self, cascade: usize) {
        if let Some(count) = self.current.per_cascade.get_mut(cascade) {
            *count += 1;
        }
    }

    /// Snapshot the frame just drawn and start counting a new one
    pub fn end_frame(&mut self) -> &PrimitiveCounters {
        self.last.clone_from(&self.current);
        self.current.reset();
        &self.last
    }

    /// Counters of the frame in progress
    pub fn current(&self) -> &PrimitiveCounters {
        &self.current
    }

    /// Counters of the last completed frame
    pub fn last_frame(&self) -> &PrimitiveCounters {
        &self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_frame_rolls_counters() {
        let mut profiling = ProfilingState::new(2);
        profiling.record(RenderSequence::World);
        profiling.record(RenderSequence::World);
        profiling.record(RenderSequence::Sky);
        profiling.record_shadow(1);

        let last = profiling.end_frame();
        assert_eq!(last.total(), 3);
        assert_eq!(last.sequence_count(RenderSequence::World), 2);
        assert_eq!(last.shadow_count(1), 1);

        assert_eq!(profiling.current().total(), 0);
        assert_eq!(profiling.current().shadow_total(), 0);
        assert_eq!(profiling.last_frame().total(), 3);

        profiling.end_frame();
        assert_eq!(profiling.last_frame().total(), 0);
    }

    #[test]
    fn test_unknown_cascade_ignored() {
        let mut profiling = ProfilingState::new(1);
        profiling.record_shadow(3);
        assert_eq!(profiling.current().shadow_total(), 0);
        assert_eq!(profiling.current().shadow_count(3), 0);
    }

    #[test]
    fn test_counters_serialize() {
        let mut profiling = ProfilingState::new(1);
        profiling.record(RenderSequence::Overlay);
        let last = profiling.end_frame().clone();

        let json = serde_json::to_string(&last).unwrap();
        let restored: PrimitiveCounters = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, last);
    }
}
