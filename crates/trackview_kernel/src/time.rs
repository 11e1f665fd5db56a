//! Frame timing
//!
//! [`FrameClock`] turns samples of a [`TimeSource`] into one [`ElapsedTime`]
//! per tick. Simulated clock time advances at the simulation rate; real time
//! always advances at wall-clock speed.

use std::ops::{Add, AddAssign};
use std::iter::Sum;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Ticks shorter than this (in real seconds) do not advance the scene
pub const MIN_TICK_SECONDS: f32 = 0.001;

/// Elapsed simulated and real time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElapsedTime {
    /// Simulated seconds
    pub clock_seconds: f32,
    /// Wall-clock seconds
    pub real_seconds: f32,
}

impl ElapsedTime {
    /// No elapsed time
    pub const ZERO: ElapsedTime = ElapsedTime {
        clock_seconds: 0.0,
        real_seconds: 0.0,
    };

    /// Create an elapsed time
    pub const fn new(clock_seconds: f32, real_seconds: f32) -> Self {
        Self {
            clock_seconds,
            real_seconds,
        }
    }

    /// Check if the tick is too short to advance the scene
    pub fn is_degenerate(&self) -> bool {
        self.real_seconds < MIN_TICK_SECONDS
    }
}

impl Add for ElapsedTime {
    type Output = ElapsedTime;

    fn add(self, other: ElapsedTime) -> ElapsedTime {
        ElapsedTime {
            clock_seconds: self.clock_seconds + other.clock_seconds,
            real_seconds: self.real_seconds + other.real_seconds,
        }
    }
}

impl AddAssign for ElapsedTime {
    fn add_assign(&mut self, other: ElapsedTime) {
        *self = *self + other;
    }
}

impl Sum for ElapsedTime {
    fn sum<I: Iterator<Item = ElapsedTime>>(iter: I) -> Self {
        iter.fold(ElapsedTime::ZERO, Add::add)
    }
}

/// Monotonic time source
pub trait TimeSource: Send + Sync {
    /// Time since an arbitrary fixed epoch
    fn now(&self) -> Duration;
}

/// Wall-clock time source
#[derive(Debug, Clone)]
pub struct SystemTimeSource {
    epoch: Instant,
}

impl SystemTimeSource {
    /// Create a time source starting now
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Manually advanced time source
///
/// Clones share the same time, so a test can keep one handle and give the
/// other to the clock.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Arc<Mutex<Duration>>,
}

impl ManualTimeSource {
    /// Create a time source at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Move time forward by fractional seconds
    pub fn advance_secs(&self, seconds: f64) {
        self.advance(Duration::from_secs_f64(seconds));
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

/// Produces one elapsed time sample per tick
pub struct FrameClock {
    source: Arc<dyn TimeSource>,
    last_sample: Duration,
    simulation_rate: f32,
}

impl FrameClock {
    /// Create a clock reading from a time source
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        let last_sample = source.now();
        Self {
            source,
            last_sample,
            simulation_rate: 1.0,
        }
    }

    /// Create a wall-clock driven clock
    pub fn system() -> Self {
        Self::new(Arc::new(SystemTimeSource::new()))
    }

    /// Restart measuring from the current time
    pub fn reset(&mut self) {
        self.last_sample = self.source.now();
    }

    /// Set how fast simulated time runs relative to real time
    pub fn set_simulation_rate(&mut self, rate: f32) {
        self.simulation_rate = rate.max(0.0);
    }

    /// Get the simulation rate
    pub fn simulation_rate(&self) -> f32 {
        self.simulation_rate
    }

    /// Sample the time elapsed since the previous sample
    pub fn sample(&mut self) -> ElapsedTime {
        let now = self.source.now();
        let real = now.saturating_sub(self.last_sample).as_secs_f32();
        self.last_sample = now;
        ElapsedTime::new(real * self.simulation_rate, real)
    }
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClock")
            .field("last_sample", &self.last_sample)
            .field("simulation_rate", &self.simulation_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_elapsed_time_addition() {
        let a = ElapsedTime::new(1.0, 0.5);
        let b = ElapsedTime::new(2.0, 0.25);

        assert_eq!(a + b, ElapsedTime::new(3.0, 0.75));
        assert_eq!(a + ElapsedTime::ZERO, a);
        assert_eq!(ElapsedTime::default(), ElapsedTime::ZERO);

        let mut acc = ElapsedTime::ZERO;
        acc += a;
        acc += b;
        assert_eq!(acc, a + b);

        let total: ElapsedTime = vec![a, b, a].into_iter().sum();
        assert_eq!(total, ElapsedTime::new(4.0, 1.25));
    }

    #[test]
    fn test_degenerate_threshold() {
        assert!(ElapsedTime::ZERO.is_degenerate());
        assert!(ElapsedTime::new(1.0, 0.0009).is_degenerate());
        assert!(!ElapsedTime::new(0.0, 0.001).is_degenerate());
    }

    #[test]
    fn test_manual_clock_sampling() {
        let source = ManualTimeSource::new();
        let mut clock = FrameClock::new(Arc::new(source.clone()));

        source.advance_secs(0.016);
        let elapsed = clock.sample();
        assert_relative_eq!(elapsed.real_seconds, 0.016, epsilon = 1e-6);
        assert_relative_eq!(elapsed.clock_seconds, 0.016, epsilon = 1e-6);

        // No time passed since the last sample
        assert!(clock.sample().is_degenerate());
    }

    #[test]
    fn test_simulation_rate() {
        let source = ManualTimeSource::new();
        let mut clock = FrameClock::new(Arc::new(source.clone()));

        clock.set_simulation_rate(0.0);
        source.advance_secs(0.5);
        let paused = clock.sample();
        assert_eq!(paused.clock_seconds, 0.0);
        assert_relative_eq!(paused.real_seconds, 0.5, epsilon = 1e-6);

        clock.set_simulation_rate(2.0);
        source.advance_secs(0.5);
        assert_relative_eq!(clock.sample().clock_seconds, 1.0, epsilon = 1e-6);

        clock.set_simulation_rate(-1.0);
        assert_eq!(clock.simulation_rate(), 0.0);
    }

    #[test]
    fn test_reset_discards_pending_time() {
        let source = ManualTimeSource::new();
        let mut clock = FrameClock::new(Arc::new(source.clone()));

        source.advance_secs(3.0);
        clock.reset();
        source.advance_secs(0.02);
        assert_relative_eq!(clock.sample().real_seconds, 0.02, epsilon = 1e-6);
    }

    #[test]
    fn test_system_clock_advances() {
        let mut clock = FrameClock::system();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.sample().real_seconds > 0.0);
    }
}
