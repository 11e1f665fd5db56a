//! Frame-rate statistics

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::time::ElapsedTime;

/// Default smoothing window, seconds
pub const DEFAULT_SMOOTH_PERIOD: f32 = 3.0;

/// Exponentially smoothed value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedData {
    smooth_period: f32,
    value: Option<f32>,
}

impl SmoothedData {
    /// Create a smoother over `smooth_period` seconds
    pub fn new(smooth_period: f32) -> Self {
        Self {
            smooth_period: smooth_period.max(f32::EPSILON),
            value: None,
        }
    }

    /// Add a sample that covers `period` seconds
    pub fn update(&mut self, period: f32, sample: f32) {
        self.value = Some(match self.value {
            Some(previous) if period < self.smooth_period => {
                let rate = (period / self.smooth_period).max(0.0);
                previous + (sample - previous) * rate
            }
            _ => sample,
        });
    }

    /// Smoothed value, zero before the first sample
    pub fn value(&self) -> f32 {
        self.value.unwrap_or(0.0)
    }

    /// Check if any sample has been recorded
    pub fn has_samples(&self) -> bool {
        self.value.is_some()
    }
}

impl Default for SmoothedData {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTH_PERIOD)
    }
}

/// Smoothed value that also keeps the samples of the last smoothing window
///
/// Percentiles are taken over the raw samples covering the last
/// `smooth_period` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothedDataWithPercentiles {
    smoothed: SmoothedData,
    window: VecDeque<(f32, f32)>,
    window_seconds: f32,
}

impl SmoothedDataWithPercentiles {
    /// Create a smoother over `smooth_period` seconds
    pub fn new(smooth_period: f32) -> Self {
        Self {
            smoothed: SmoothedData::new(smooth_period),
            window: VecDeque::new(),
            window_seconds: 0.0,
        }
    }

    /// Add a sample that covers `period` seconds
    pub fn update(&mut self, period: f32, sample: f32) {
        self.smoothed.update(period, sample);

        let period = period.max(0.0);
        self.window.push_back((period, sample));
        self.window_seconds += period;
        while self.window.len() > 1 && self.window_seconds > self.smoothed.smooth_period {
            if let Some((oldest, _)) = self.window.pop_front() {
                self.window_seconds -= oldest;
            }
        }
    }

    /// Smoothed value, zero before the first sample
    pub fn value(&self) -> f32 {
        self.smoothed.value()
    }

    /// Check if any sample has been recorded
    pub fn has_samples(&self) -> bool {
        self.smoothed.has_samples()
    }

    /// Sample at `percentile` (0-100) of the current window, zero when empty
    pub fn percentile(&self, percentile: f32) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f32> = self.window.iter().map(|&(_, sample)| sample).collect();
        sorted.sort_by(f32::total_cmp);

        let rank = percentile.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f32;
        sorted[rank as usize]
    }

    /// Median of the current window
    pub fn p50(&self) -> f32 {
        self.percentile(50.0)
    }

    /// 95th percentile of the current window
    pub fn p95(&self) -> f32 {
        self.percentile(95.0)
    }

    /// 99th percentile of the current window
    pub fn p99(&self) -> f32 {
        self.percentile(99.0)
    }

    /// Number of samples in the current window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

impl Default for SmoothedDataWithPercentiles {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTH_PERIOD)
    }
}

/// Frame-rate and frame-time statistics of the render loop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStatistics {
    /// Smoothed frames per second
    pub frame_rate: SmoothedData,
    /// Smoothed seconds per frame, with percentiles
    pub frame_time: SmoothedDataWithPercentiles,
    /// Real seconds covered by recorded ticks
    pub total_real_seconds: f64,
    /// Ticks that advanced the scene
    pub ticks: u64,
    /// Ticks too short to advance the scene
    pub degenerate_ticks: u64,
}

impl FrameStatistics {
    /// Create empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the elapsed time of one tick
    pub fn record(&mut self, elapsed: ElapsedTime) {
        self.total_real_seconds += f64::from(elapsed.real_seconds);
        if elapsed.is_degenerate() {
            self.degenerate_ticks += 1;
            return;
        }

        let real = elapsed.real_seconds;
        self.ticks += 1;
        self.frame_rate.update(real, 1.0 / real);
        self.frame_time.update(real, real);
    }
}
